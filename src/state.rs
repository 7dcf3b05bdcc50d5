// state.rs — Cross-cutting state shared between hook callbacks.
//
// The resolution hook writes, the HUD/FOV hooks read. Callbacks run on
// whatever host thread reaches the hooked instruction and the host gives no
// ordering guarantee between its threads, so everything here is behind a
// mutex or an atomic. Geometry is recomputed under the same lock that holds
// the resolution, so a reader never sees a new resolution paired with stale
// offsets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::config::FixConfig;
use crate::geometry::Geometry;

struct DisplayState {
    width: i32,
    height: i32,
    geometry: Geometry,
}

pub struct FixContext {
    pub config: FixConfig,
    display: Mutex<DisplayState>,
    /// Set by the resolution hook, cleared by the HUD-size hook once it has
    /// rewritten the layout for the new dimensions.
    pub hud_needs_resize: AtomicBool,
    /// One-shot: the intro sequencer is only ever skipped once per run.
    pub intro_skipped: AtomicBool,
}

static CONTEXT: OnceCell<FixContext> = OnceCell::new();

impl FixContext {
    fn new(config: FixConfig) -> Self {
        // Until the resolution hook fires, assume native.
        let geometry = Geometry::compute(1920, 1080)
            .unwrap_or_else(|| unreachable!("native geometry is always computable"));
        Self {
            config,
            display: Mutex::new(DisplayState {
                width: 0,
                height: 0,
                geometry,
            }),
            hud_needs_resize: AtomicBool::new(true),
            intro_skipped: AtomicBool::new(false),
        }
    }

    /// Record an observed resolution. Returns the freshly derived geometry
    /// if the resolution actually changed, None if it was already current
    /// or the dimensions were degenerate.
    pub fn update_resolution(&self, width: i32, height: i32) -> Option<Geometry> {
        let geometry = Geometry::compute(width, height)?;
        let mut display = match self.display.lock() {
            Ok(d) => d,
            Err(poisoned) => poisoned.into_inner(),
        };
        if display.width == width && display.height == height {
            return None;
        }
        display.width = width;
        display.height = height;
        display.geometry = geometry;
        Some(geometry)
    }

    /// Snapshot of the current geometry. Copy, not a guard: hook callbacks
    /// must not hold the lock while poking game memory.
    pub fn geometry(&self) -> Geometry {
        match self.display.lock() {
            Ok(d) => d.geometry,
            Err(poisoned) => poisoned.into_inner().geometry,
        }
    }

    pub fn take_hud_resize(&self) -> bool {
        self.hud_needs_resize.swap(false, Ordering::AcqRel)
    }

    pub fn request_hud_resize(&self) {
        self.hud_needs_resize.store(true, Ordering::Release);
    }

    /// True exactly once, the first time it is called.
    pub fn claim_intro_skip(&self) -> bool {
        !self.intro_skipped.swap(true, Ordering::AcqRel)
    }
}

/// Publish the context. Called once from the worker thread after config
/// load, before any hook is installed.
pub fn init(config: FixConfig) -> &'static FixContext {
    CONTEXT.get_or_init(|| FixContext::new(config))
}

/// Fetch the context from a hook callback. None only if a hook fired before
/// initialization finished, in which case the callback bails out.
pub fn get() -> Option<&'static FixContext> {
    CONTEXT.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NATIVE_ASPECT;

    fn ctx() -> FixContext {
        FixContext::new(FixConfig::default())
    }

    #[test]
    fn starts_with_native_geometry() {
        let c = ctx();
        assert_eq!(c.geometry().aspect_ratio, NATIVE_ASPECT);
    }

    #[test]
    fn resolution_change_publishes_matching_geometry() {
        let c = ctx();
        let g = c.update_resolution(3440, 1440).unwrap();
        assert_eq!(g, c.geometry());
        assert!(c.geometry().is_wider_than_native());
    }

    #[test]
    fn repeated_resolution_is_not_a_change() {
        let c = ctx();
        assert!(c.update_resolution(2560, 1440).is_some());
        assert!(c.update_resolution(2560, 1440).is_none());
        // Geometry stays valid for readers either way.
        assert_eq!(c.geometry().width, 2560);
    }

    #[test]
    fn degenerate_resolution_ignored() {
        let c = ctx();
        assert!(c.update_resolution(0, 1080).is_none());
        assert_eq!(c.geometry().aspect_ratio, NATIVE_ASPECT);
    }

    #[test]
    fn hud_resize_flag_is_take_once() {
        let c = ctx();
        assert!(c.take_hud_resize());
        assert!(!c.take_hud_resize());
        c.request_hud_resize();
        assert!(c.take_hud_resize());
    }

    #[test]
    fn intro_skip_claims_exactly_once() {
        let c = ctx();
        assert!(c.claim_intro_skip());
        assert!(!c.claim_intro_skip());
    }
}
