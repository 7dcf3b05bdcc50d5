// patches/fov.rs — Field-of-view correction and user multipliers.
//
// Two mid-hooks, one each for the gameplay and battle cameras, anchored on
// the instruction right after the engine loads the camera's vertical FOV
// (radians) into an xmm register. The anchor must sit past the load: the
// hook stub runs the callback first and the relocated original instruction
// after it, so a hook placed on the load itself would have its rewrite
// clobbered when the load replays. Wider-than-16:9 displays get a vert+
// correction so the vertical view is preserved; the configured multiplier
// is applied on top. At native aspect with a 1.0 multiplier both hooks are
// identity and simply pass the value through.

use crate::geometry::{self, NATIVE_ASPECT};
use crate::hook::Registers;
use crate::scanner::ModuleImage;
use crate::state;

use super::{find_site, hook_site};

// movaps/mulss chain right after the gameplay camera's FOV load; the FOV is
// already live in xmm0 here.
const GAMEPLAY_FOV_SIG: &str =
    "0F 28 ?? F3 0F 59 ?? ?? ?? ?? ?? 0F 2F ?? 72 ?? F3 0F 11 ?? ?? ?? 00 00";

// Battle camera blend math right after its target-FOV load; the FOV is
// already live in xmm1 here.
const BATTLE_FOV_SIG: &str =
    "F3 0F 5C ?? F3 0F 59 ?? ?? ?? ?? ?? F3 0F 58 ?? 0F 28 ?? F3 0F 11 ?? ?? ?? 00 00";

pub unsafe fn install(image: &ModuleImage) {
    if let Some(addr) = find_site(image, "Gameplay FOV", GAMEPLAY_FOV_SIG) {
        hook_site("Gameplay FOV", addr, on_gameplay_fov);
    }
    if let Some(addr) = find_site(image, "Battle FOV", BATTLE_FOV_SIG) {
        hook_site("Battle FOV", addr, on_battle_fov);
    }
}

/// Rewrite the f32 in the low lane of an xmm register, upper lanes intact.
fn rewrite_low_lane(xmm: &mut u128, f: impl FnOnce(f32) -> f32) {
    let fov = f32::from_bits(*xmm as u32);
    if !fov.is_finite() || fov <= 0.0 {
        return;
    }
    *xmm = (*xmm & !0xFFFF_FFFFu128) | f(fov).to_bits() as u128;
}

fn adjust(fov: f32, aspect_ratio: f32, multiplier: f32) -> f32 {
    let fov = if aspect_ratio > NATIVE_ASPECT {
        geometry::corrected_fov(fov, aspect_ratio)
    } else {
        fov
    };
    fov * multiplier
}

unsafe extern "win64" fn on_gameplay_fov(regs: *mut Registers, _user: usize) {
    let Some(ctx) = state::get() else { return };
    let regs = &mut *regs;
    let aspect = ctx.geometry().aspect_ratio;
    rewrite_low_lane(&mut regs.xmm0, |fov| {
        adjust(fov, aspect, ctx.config.gameplay_fov_mult)
    });
}

unsafe extern "win64" fn on_battle_fov(regs: *mut Registers, _user: usize) {
    let Some(ctx) = state::get() else { return };
    let regs = &mut *regs;
    let aspect = ctx.geometry().aspect_ratio;
    rewrite_low_lane(&mut regs.xmm1, |fov| {
        adjust(fov, aspect, ctx.config.battle_fov_mult)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Signature;

    #[test]
    fn sites_anchor_past_the_fov_load() {
        for sig in [GAMEPLAY_FOV_SIG, BATTLE_FOV_SIG] {
            assert!(Signature::parse(sig).is_ok());
            // A hook on the movss load itself would replay the load after
            // the callback and clobber the rewritten register.
            assert!(
                !sig.starts_with("F3 0F 10"),
                "site must anchor after the FOV load, not on it"
            );
        }
    }

    #[test]
    fn native_aspect_and_unit_multiplier_is_identity() {
        let fov = 0.87f32;
        assert_eq!(adjust(fov, NATIVE_ASPECT, 1.0), fov);
    }

    #[test]
    fn ultrawide_gets_vert_plus() {
        let fov = 0.87f32;
        assert!(adjust(fov, 3440.0 / 1440.0, 1.0) > fov);
    }

    #[test]
    fn narrower_aspect_is_not_corrected() {
        let fov = 0.87f32;
        assert_eq!(adjust(fov, 4.0 / 3.0, 1.0), fov);
    }

    #[test]
    fn multiplier_applies_after_correction() {
        let fov = 0.87f32;
        let corrected = geometry::corrected_fov(fov, 21.0 / 9.0);
        assert_eq!(adjust(fov, 21.0 / 9.0, 1.5), corrected * 1.5);
    }

    #[test]
    fn low_lane_rewrite_preserves_upper_lanes() {
        let upper = 0xDEAD_BEEF_u128 << 64;
        let mut xmm = upper | f32::to_bits(0.9) as u128;
        rewrite_low_lane(&mut xmm, |f| f * 2.0);
        assert_eq!(xmm >> 64, 0xDEAD_BEEF);
        assert_eq!(f32::from_bits(xmm as u32), 1.8);
    }

    #[test]
    fn non_finite_and_zero_fov_left_alone() {
        let mut xmm = f32::to_bits(f32::NAN) as u128;
        let before = xmm;
        rewrite_low_lane(&mut xmm, |f| f * 2.0);
        assert_eq!(xmm, before);

        let mut zero = 0u128;
        rewrite_low_lane(&mut zero, |f| f + 1.0);
        assert_eq!(zero, 0);
    }
}
