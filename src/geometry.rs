// geometry.rs — Display geometry derived from the observed resolution.
//
// Recomputed whenever the resolution-change hook sees new dimensions, then
// read by the HUD and FOV hooks. The game lays its HUD out for 16:9; on a
// wider display the HUD keeps full height and is centered horizontally, on
// a narrower one it keeps full width and is centered vertically.

/// Aspect ratio the game was authored for.
pub const NATIVE_ASPECT: f32 = 16.0 / 9.0;

/// HUD layout dimensions at native aspect.
pub const NATIVE_WIDTH: f32 = 1920.0;
pub const NATIVE_HEIGHT: f32 = 1080.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub width: i32,
    pub height: i32,
    pub aspect_ratio: f32,
    pub aspect_multiplier: f32,
    pub hud_width: f32,
    pub hud_height: f32,
    pub hud_width_offset: f32,
    pub hud_height_offset: f32,
}

impl Geometry {
    /// Derive geometry for a render target of `width` x `height` pixels.
    /// Non-positive dimensions carry no information and yield None.
    pub fn compute(width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }

        let aspect_ratio = width as f32 / height as f32;
        let aspect_multiplier = aspect_ratio / NATIVE_ASPECT;

        // Height-fill first (covers wider-than-native and exactly native,
        // where the horizontal offset collapses to zero), width-fill if the
        // display is narrower.
        let mut hud_width = height as f32 * NATIVE_ASPECT;
        let mut hud_height = height as f32;
        let mut hud_width_offset = (width as f32 - hud_width) / 2.0;
        let mut hud_height_offset = 0.0;
        if aspect_ratio < NATIVE_ASPECT {
            hud_width = width as f32;
            hud_height = width as f32 / NATIVE_ASPECT;
            hud_width_offset = 0.0;
            hud_height_offset = (height as f32 - hud_height) / 2.0;
        }

        Some(Self {
            width,
            height,
            aspect_ratio,
            aspect_multiplier,
            hud_width,
            hud_height,
            hud_width_offset,
            hud_height_offset,
        })
    }

    pub fn is_wider_than_native(&self) -> bool {
        self.aspect_ratio > NATIVE_ASPECT
    }

    pub fn is_narrower_than_native(&self) -> bool {
        self.aspect_ratio < NATIVE_ASPECT
    }
}

/// Projection scale the HUD renderer uses for its fixed 45-degree FOV:
/// 1 / tan(fov/2).
pub fn hud_projection_scale() -> f32 {
    1.0 / (std::f32::consts::FRAC_PI_4 / 2.0).tan()
}

/// Vert+ field-of-view correction: widen the horizontal FOV so the vertical
/// FOV stays what it was at native aspect. Only meaningful for ratios wider
/// than native; callers branch before applying it.
pub fn corrected_fov(fov_radians: f32, aspect_ratio: f32) -> f32 {
    2.0 * ((fov_radians / 2.0).tan() * (aspect_ratio / NATIVE_ASPECT)).atan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_and_multiplier_are_exact() {
        let g = Geometry::compute(2560, 1080).unwrap();
        assert_eq!(g.aspect_ratio, 2560.0 / 1080.0);
        assert_eq!(g.aspect_multiplier, (2560.0 / 1080.0) / NATIVE_ASPECT);
    }

    #[test]
    fn recompute_is_idempotent() {
        let a = Geometry::compute(3440, 1440).unwrap();
        let b = Geometry::compute(3440, 1440).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn native_resolution_has_zero_offsets() {
        let g = Geometry::compute(1920, 1080).unwrap();
        assert_eq!(g.aspect_ratio, NATIVE_ASPECT);
        assert_eq!(g.aspect_multiplier, 1.0);
        assert_eq!(g.hud_width_offset, 0.0);
        assert_eq!(g.hud_height_offset, 0.0);
    }

    #[test]
    fn ultrawide_centers_horizontally_only() {
        let g = Geometry::compute(3440, 1440).unwrap();
        assert!(g.is_wider_than_native());
        assert!(g.hud_width_offset > 0.0);
        assert_eq!(g.hud_height_offset, 0.0);
        assert_eq!(g.hud_height, 1440.0);
    }

    #[test]
    fn portrait_centers_vertically_only() {
        let g = Geometry::compute(1200, 1600).unwrap();
        assert!(g.is_narrower_than_native());
        assert_eq!(g.hud_width_offset, 0.0);
        assert!(g.hud_height_offset > 0.0);
        assert_eq!(g.hud_width, 1200.0);
    }

    #[test]
    fn degenerate_dimensions_rejected() {
        assert!(Geometry::compute(0, 1080).is_none());
        assert!(Geometry::compute(1920, 0).is_none());
        assert!(Geometry::compute(-1920, 1080).is_none());
    }

    #[test]
    fn fov_correction_widens_on_ultrawide() {
        let fov = 0.9f32;
        let wide = corrected_fov(fov, 3440.0 / 1440.0);
        assert!(wide > fov);
        // At native aspect the correction is the identity up to rounding.
        let same = corrected_fov(fov, NATIVE_ASPECT);
        assert!((same - fov).abs() < 1e-4);
    }

    #[test]
    fn hud_projection_scale_matches_45_degree_fov() {
        // 1 / tan(pi/8)
        assert!((hud_projection_scale() - 2.4142135).abs() < 1e-4);
    }
}
