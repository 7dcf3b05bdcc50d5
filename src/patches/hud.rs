// patches/hud.rs — HUD relayout for non-16:9 displays.
//
// Four sites, all gated on [Fix HUD]:
//   * HUD size: rewrite the canvas projection/layout block when the
//     resolution changed, so the HUD spans the full display;
//   * HUD objects: rescale the packed width/height of full-screen
//     background elements so they cover the widened canvas;
//   * markers: jump over the off-screen culling checks that were tuned for
//     a 16:9 frustum and hide world markers near the screen edge;
//   * skill select: copy the engine's corrected backdrop width over the
//     hardcoded one in the battle skill menu.

use crate::geometry::{self, NATIVE_HEIGHT, NATIVE_WIDTH};
use crate::hook::{self, Registers};
use crate::scanner::ModuleImage;
use crate::state::{self, FixContext};

use super::{find_site, hook_site};

const HUD_SIZE_SIG: &str =
    "4C ?? ?? ?? ?? ?? ?? 49 ?? ?? ?? ?? ?? ?? 4B ?? ?? ?? 83 ?? ?? 72 ?? 49 ?? ??";

const HUD_OBJECTS_SIG: &str =
    "89 ?? ?? 49 8B ?? ?? 48 8B ?? FF 90 ?? ?? ?? ?? 8B ?? 33 ?? 49 8B ?? ??";

const MARKERS_SIG: &str =
    "72 ?? 0F ?? ?? 72 ?? 48 8D ?? ?? ?? E8 ?? ?? ?? ?? 0F ?? ?? ?? ?? ?? ?? 72 ?? 0F ?? ?? 72 ?? B0 01";

const SKILL_SELECT_SIG: &str =
    "0F BF ?? ?? ?? ?? ?? 66 0F ?? ?? 0F BF ?? ?? ?? ?? ?? 0F 5B ?? 66 0F ?? ?? 0F 5B ?? F3 0F ?? ?? F3 0F ?? ?? ?? ?? ?? ?? 0F 28 ??";

/// `jmp +0x1d` over the marker culling comparisons.
const MARKERS_PATCH: [u8; 2] = [0xEB, 0x1D];

// Canvas object layout (r9 at the HUD-size site).
const CANVAS_PROJ_X: usize = 0x4A0; // f32, horizontal projection term
const CANVAS_PROJ_Y: usize = 0x4B4; // f32, vertical projection term
const CANVAS_WIDTH: usize = 0x690; // i32, layout width
const CANVAS_HEIGHT: usize = 0x694; // i32, layout height
const CANVAS_INV_X: usize = 0x7B0; // f32, 2 / layout width
const CANVAS_INV_Y: usize = 0x7C4; // f32, 2 / layout height

// HUD element container (r13 at the objects site).
const ELEMENT_PTR: usize = 0x08;
const ELEMENT_DIM_X: usize = 0xF0; // i16
const ELEMENT_DIM_Y: usize = 0xF2; // i16

pub unsafe fn install(ctx: &'static FixContext, image: &ModuleImage) {
    if !ctx.config.fix_hud {
        return;
    }

    if let Some(addr) = find_site(image, "HUD Size", HUD_SIZE_SIG) {
        hook_site("HUD Size", addr, on_canvas_layout);
    }
    if let Some(addr) = find_site(image, "HUD Objects", HUD_OBJECTS_SIG) {
        hook_site("HUD Objects", addr, on_element_pack);
    }
    if let Some(addr) = find_site(image, "Markers", MARKERS_SIG) {
        match hook::patch_bytes(addr, &MARKERS_PATCH) {
            Ok(()) => log::info!("Markers: culling checks disabled"),
            Err(e) => log::error!("Markers: {}", e),
        }
    }
    if let Some(addr) = find_site(image, "Skill Select", SKILL_SELECT_SIG) {
        hook_site("Skill Select", addr, on_skill_backdrop);
    }
}

unsafe fn write_f32(base: u64, offset: usize, value: f32) {
    std::ptr::write_unaligned((base as usize + offset) as *mut f32, value);
}

unsafe fn write_i32(base: u64, offset: usize, value: i32) {
    std::ptr::write_unaligned((base as usize + offset) as *mut i32, value);
}

unsafe fn read_i16(base: u64, offset: usize) -> i16 {
    std::ptr::read_unaligned((base as usize + offset) as *const i16)
}

/// Fires in the canvas resize path with r9 pointing at the canvas object.
/// Only rewrites the block when the resolution hook flagged a change; the
/// engine re-runs this path every frame.
unsafe extern "win64" fn on_canvas_layout(regs: *mut Registers, _user: usize) {
    let Some(ctx) = state::get() else { return };
    let regs = &*regs;
    if regs.r9 == 0 {
        return;
    }
    if !ctx.take_hud_resize() {
        return;
    }

    let g = ctx.geometry();
    let proj = geometry::hud_projection_scale();
    let canvas = regs.r9;

    if g.is_wider_than_native() {
        let width = (NATIVE_HEIGHT * g.aspect_ratio).ceil();
        write_f32(canvas, CANVAS_PROJ_X, proj / g.aspect_ratio);
        write_f32(canvas, CANVAS_PROJ_Y, proj);
        write_i32(canvas, CANVAS_WIDTH, width as i32);
        write_i32(canvas, CANVAS_HEIGHT, NATIVE_HEIGHT as i32);
        write_f32(canvas, CANVAS_INV_X, 2.0 / (NATIVE_HEIGHT * g.aspect_ratio));
        write_f32(canvas, CANVAS_INV_Y, 2.0 / NATIVE_HEIGHT);
    } else if g.is_narrower_than_native() {
        let height = (NATIVE_WIDTH / g.aspect_ratio).ceil();
        write_f32(canvas, CANVAS_PROJ_X, proj / geometry::NATIVE_ASPECT);
        write_f32(canvas, CANVAS_PROJ_Y, proj / g.aspect_ratio);
        write_i32(canvas, CANVAS_WIDTH, NATIVE_WIDTH as i32);
        write_i32(canvas, CANVAS_HEIGHT, height as i32);
        write_f32(canvas, CANVAS_INV_X, 2.0 / NATIVE_WIDTH);
        write_f32(canvas, CANVAS_INV_Y, 2.0 / (NATIVE_WIDTH / g.aspect_ratio));
    } else {
        write_f32(canvas, CANVAS_PROJ_X, proj / geometry::NATIVE_ASPECT);
        write_f32(canvas, CANVAS_PROJ_Y, proj);
        write_i32(canvas, CANVAS_WIDTH, NATIVE_WIDTH as i32);
        write_i32(canvas, CANVAS_HEIGHT, NATIVE_HEIGHT as i32);
        write_f32(canvas, CANVAS_INV_X, 2.0 / NATIVE_WIDTH);
        write_f32(canvas, CANVAS_INV_Y, 2.0 / NATIVE_HEIGHT);
    }
}

/// Full-screen backgrounds are authored oversized so they bleed past a 16:9
/// frame. Anything matching these packed dimensions gets stretched to the
/// widened canvas instead of staying centered.
pub(crate) fn is_fullscreen_background(x: i32, y: i32) -> bool {
    (x > 1921 && y > 1081) || (x > 1999 && y > 1079) || (x == 4000 && y == 1000)
}

/// Fires where the engine packs an element's width/height into eax as
/// (y << 16) | x. r13 holds the element container.
unsafe extern "win64" fn on_element_pack(regs: *mut Registers, _user: usize) {
    let Some(ctx) = state::get() else { return };
    let regs = &mut *regs;
    if regs.r13 == 0 {
        return;
    }
    let element = std::ptr::read_unaligned((regs.r13 as usize + ELEMENT_PTR) as *const u64);
    if element == 0 {
        return;
    }
    let x = read_i16(element, ELEMENT_DIM_X) as i32;
    let y = read_i16(element, ELEMENT_DIM_Y) as i32;
    if !is_fullscreen_background(x, y) {
        return;
    }

    let g = ctx.geometry();
    if g.is_wider_than_native() {
        let scaled = (x as f32 * g.aspect_multiplier).ceil() as i64 as u16;
        regs.rax = ((y as u16 as u64) << 16) | scaled as u64;
    } else if g.is_narrower_than_native() {
        let scaled = (x as f32 / g.aspect_ratio).ceil() as i64 as u16;
        regs.rax = ((scaled as u64) << 16) | x as u16 as u64;
    }
}

/// Fires in the battle skill menu with rbx holding the backdrop element.
/// The engine already computed an aspect-correct width one field over;
/// copy it across when not running at 16:9.
unsafe extern "win64" fn on_skill_backdrop(regs: *mut Registers, _user: usize) {
    const BACKDROP_WIDTH: usize = 0x1E0;
    const CORRECTED_WIDTH: usize = 0x1F4;

    let Some(ctx) = state::get() else { return };
    let regs = &*regs;
    if regs.rbx == 0 {
        return;
    }
    let g = ctx.geometry();
    if g.aspect_ratio == geometry::NATIVE_ASPECT {
        return;
    }
    let corrected =
        std::ptr::read_unaligned((regs.rbx as usize + CORRECTED_WIDTH) as *const f32);
    write_f32(regs.rbx, BACKDROP_WIDTH, corrected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullscreen_backgrounds_detected() {
        assert!(is_fullscreen_background(2020, 1180));
        assert!(is_fullscreen_background(2060, 1080));
        assert!(is_fullscreen_background(4000, 1000));
    }

    #[test]
    fn regular_elements_left_alone() {
        assert!(!is_fullscreen_background(1920, 1080));
        assert!(!is_fullscreen_background(256, 64));
        assert!(!is_fullscreen_background(1921, 1081));
        assert!(!is_fullscreen_background(4000, 999));
    }
}
