// patches/resolution.rs — Resolution tracking and the custom-resolution slot.
//
// Three sites:
//   * a mid-hook where the engine commits the active render resolution,
//     which is where the shared geometry gets recomputed;
//   * the supported-resolutions table in .rdata, whose 3840x2160 entry is
//     overwritten with the configured dimensions;
//   * a mid-hook in the options-menu string lookup that rewrites the
//     "3840x2160" label in place so the menu shows the real dimensions.

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::config::FixConfig;
use crate::hook::{self, Registers};
use crate::scanner::ModuleImage;
use crate::state::{self, FixContext};

use super::{find_site, hook_site};

// mov edx/r8d argument moves ahead of the virtual resize call.
const CURRENT_RESOLUTION_SIG: &str =
    "41 ?? ?? 8B ?? 48 8B ?? FF 90 ?? ?? ?? ?? 84 ?? 0F 84 ?? ?? ?? ?? 44 8B ??";

// First bytes of the resolution table: 960x540 followed by 1024x576.
const RESOLUTION_LIST_SIG: &str = "C0 03 00 00 1C 02 00 00 00 04 00 00 40 02 00 00";

// Tail of the small-string helper the options menu formats labels through.
const RESOLUTION_STRING_SIG: &str =
    "48 85 ?? 74 ?? 48 83 ?? ?? ?? 72 ?? 48 8B ?? 48 83 ?? ?? 5B C3";

// 3840x2160 entry within the table.
const LIST_UHD_WIDTH: usize = 0x38;
const LIST_UHD_HEIGHT: usize = 0x3C;

const UHD_LABEL: &[u8] = b"3840x2160";

/// Replacement menu label, nul included. Set before the string hook goes in.
static LABEL: OnceCell<Vec<u8>> = OnceCell::new();
static LABEL_REWRITTEN: AtomicBool = AtomicBool::new(false);

pub unsafe fn install(ctx: &'static FixContext, image: &ModuleImage) {
    if let Some(addr) = find_site(image, "Current Resolution", CURRENT_RESOLUTION_SIG) {
        hook_site("Current Resolution", addr, on_resolution_commit);
    }

    if !ctx.config.custom_res_enabled {
        return;
    }
    let (width, height) = desired_resolution(&ctx.config);
    if width <= 0 || height <= 0 {
        log::error!("Custom Resolution: no usable dimensions, leaving list untouched");
        return;
    }

    if let Some(addr) = find_site(image, "Resolution List", RESOLUTION_LIST_SIG) {
        let written = hook::write::<i32>(addr + LIST_UHD_WIDTH, width)
            .and(hook::write::<i32>(addr + LIST_UHD_HEIGHT, height));
        match written {
            Ok(()) => log::info!(
                "Resolution List: replaced 3840x2160 with {}x{}",
                width,
                height
            ),
            Err(e) => log::error!("Resolution List: {}", e),
        }
    }

    let mut label = format!("{}x{}", width, height).into_bytes();
    label.push(0);
    if label.len() > UHD_LABEL.len() + 1 {
        // Longer labels would overrun the engine's small-string buffer.
        log::info!("Resolution String: label {}x{} too long, menu keeps 3840x2160", width, height);
        return;
    }
    let _ = LABEL.set(label);

    if let Some(addr) = find_site(image, "Resolution String", RESOLUTION_STRING_SIG) {
        hook_site("Resolution String", addr, on_resolution_label);
    }
}

/// Configured dimensions, or the desktop's when either axis is unset.
unsafe fn desired_resolution(config: &FixConfig) -> (i32, i32) {
    if config.custom_res_width > 0 && config.custom_res_height > 0 {
        return (config.custom_res_width, config.custom_res_height);
    }
    let (w, h) = desktop_resolution();
    log::info!("Custom Resolution: using desktop resolution {}x{}", w, h);
    (w, h)
}

/// Physical dimensions of the current display mode. GetSystemMetrics is
/// DPI-virtualized and reports scaled pixels on a high-DPI desktop, so the
/// mode is queried directly; the metrics are only the last resort.
unsafe fn desktop_resolution() -> (i32, i32) {
    use winapi::um::wingdi::DEVMODEA;
    use winapi::um::winuser::{
        EnumDisplaySettingsA, GetSystemMetrics, ENUM_CURRENT_SETTINGS, SM_CXSCREEN, SM_CYSCREEN,
    };

    let mut mode: DEVMODEA = std::mem::zeroed();
    mode.dmSize = std::mem::size_of::<DEVMODEA>() as u16;
    if EnumDisplaySettingsA(std::ptr::null(), ENUM_CURRENT_SETTINGS, &mut mode) != 0 {
        return (mode.dmPelsWidth as i32, mode.dmPelsHeight as i32);
    }
    (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN))
}

/// Fires whenever the engine commits a render resolution; rdx/r8d carry the
/// dimensions. Recomputes geometry and flags the HUD for a relayout.
unsafe extern "win64" fn on_resolution_commit(regs: *mut Registers, _user: usize) {
    let Some(ctx) = state::get() else { return };
    let regs = &*regs;
    let width = regs.rdx as i32;
    let height = regs.r8 as i32;
    if let Some(g) = ctx.update_resolution(width, height) {
        ctx.request_hud_resize();
        log::info!(
            "Current Resolution: {}x{}, aspect {:.5}, HUD {:.0}x{:.0} (offset {:.0}, {:.0})",
            g.width,
            g.height,
            g.aspect_ratio,
            g.hud_width,
            g.hud_height,
            g.hud_width_offset,
            g.hud_height_offset
        );
    }
}

/// Fires in the menu's string lookup with rax pointing at the label text.
/// First time the 4K label comes through, rewrite it in place.
unsafe extern "win64" fn on_resolution_label(regs: *mut Registers, _user: usize) {
    if LABEL_REWRITTEN.load(Ordering::Acquire) {
        return;
    }
    let regs = &*regs;
    if regs.rax == 0 {
        return;
    }
    let text = regs.rax as *mut u8;
    if !is_uhd_label(text) {
        return;
    }
    if let Some(label) = LABEL.get() {
        std::ptr::copy_nonoverlapping(label.as_ptr(), text, label.len());
        log::info!("Resolution String: menu label rewritten");
    }
    LABEL_REWRITTEN.store(true, Ordering::Release);
}

/// Compare the nul-terminated label at `text` against "3840x2160" one byte
/// at a time. Every menu label flows through the hook, including ones
/// shorter than the 4K label; stopping at the first mismatch (a nul byte
/// mismatches too) never reads past a shorter string's terminator.
unsafe fn is_uhd_label(text: *const u8) -> bool {
    for (i, &expected) in UHD_LABEL.iter().enumerate() {
        if *text.add(i) != expected {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uhd_label_matches_exactly() {
        let label = *b"3840x2160\0";
        assert!(unsafe { is_uhd_label(label.as_ptr()) });
    }

    #[test]
    fn shorter_label_rejected_without_reading_past_it() {
        // Buffers sized to the string: a compare that ran past the nul
        // would read out of bounds here.
        let small = *b"800x600\0";
        assert!(!unsafe { is_uhd_label(small.as_ptr()) });

        let truncated = *b"3840x21\0";
        assert!(!unsafe { is_uhd_label(truncated.as_ptr()) });
    }

    #[test]
    fn similar_prefix_rejected_at_first_differing_byte() {
        let other = *b"3840x1600\0";
        assert!(!unsafe { is_uhd_label(other.as_ptr()) });
    }

    #[test]
    fn configured_dimensions_preferred_over_desktop() {
        let config = FixConfig {
            custom_res_enabled: true,
            custom_res_width: 3440,
            custom_res_height: 1440,
            ..FixConfig::default()
        };
        assert_eq!(unsafe { desired_resolution(&config) }, (3440, 1440));
    }
}
