//! Camera matrices for the raycaster.

use glam::{Mat4, Quat, Vec3};
use volray_core::CameraState;

/// Vertical field of view in degrees.
pub const FOV_DEGREES: f32 = 67.0;

/// Near clipping plane.
pub const NEAR: f32 = 0.001;

/// Far clipping plane.
pub const FAR: f32 = 5.0;

/// A perspective camera looking down -Z at the volume center.
///
/// The volume rotates in front of the eye; the eye only moves along the view axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Rotation, eye distance and viewport.
    pub state: CameraState,
    /// Field of view in radians.
    pub fov: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
}

impl Camera {
    /// Creates a camera for a viewport of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_state(CameraState::new(width, height))
    }

    #[must_use]
    pub fn from_state(state: CameraState) -> Self {
        Self {
            state,
            fov: FOV_DEGREES.to_radians(),
            near: NEAR,
            far: FAR,
        }
    }

    /// Returns width / height of the viewport.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        let viewport = self.state.viewport.as_vec2();
        viewport.x / viewport.y.max(1.0)
    }

    /// Maps the unit cube to a box centered at the origin, scaled then rotated.
    #[must_use]
    pub fn model_matrix(&self, scale: Vec3) -> Mat4 {
        Mat4::from_quat(self.state.rotation)
            * Mat4::from_scale(scale)
            * Mat4::from_translation(Vec3::splat(-0.5))
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(Vec3::new(0.0, 0.0, self.state.depth), Vec3::ZERO, Vec3::Y)
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio(), self.near, self.far)
    }

    /// Left-multiplies the volume rotation.
    pub fn rotate(&mut self, incremental: Quat) {
        self.state.rotate(incremental);
    }

    /// Moves the eye along the view axis.
    pub fn zoom(&mut self, delta: f32) {
        self.state.zoom(delta);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.state.resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use volray_core::interaction::{DEFAULT_DEPTH, MIN_DEPTH};

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::new(800, 600);
        assert_eq!(camera.state.depth, DEFAULT_DEPTH);
        assert!((camera.aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
        assert!((camera.fov.to_degrees() - FOV_DEGREES).abs() < 1e-4);
    }

    #[test]
    fn test_model_matrix_centers_cube() {
        let camera = Camera::new(100, 100);
        let model = camera.model_matrix(Vec3::new(1.0, 1.0, 2.0));
        assert!(model
            .transform_point3(Vec3::splat(0.5))
            .abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(model
            .transform_point3(Vec3::ONE)
            .abs_diff_eq(Vec3::new(0.5, 0.5, 1.0), 1e-6));
    }

    #[test]
    fn test_cube_center_projects_to_screen_center() {
        let camera = Camera::new(640, 480);
        let clip = camera.projection_matrix()
            * camera.view_matrix()
            * camera.model_matrix(Vec3::ONE)
            * Vec4::new(0.5, 0.5, 0.5, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_rotation_applies_to_model() {
        let mut camera = Camera::new(100, 100);
        camera.rotate(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let model = camera.model_matrix(Vec3::ONE);
        // The +X face center turns towards -Z
        assert!(model
            .transform_point3(Vec3::new(1.0, 0.5, 0.5))
            .abs_diff_eq(Vec3::new(0.0, 0.0, -0.5), 1e-6));
    }

    #[test]
    fn test_zoom_clamped() {
        let mut camera = Camera::new(100, 100);
        camera.zoom(-10.0);
        assert_eq!(camera.state.depth, MIN_DEPTH);
        assert!(camera.view_matrix().w_axis.z < 0.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_rotation_keeps_cube_centered(
            axis in (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0),
            angle in -3.14f32..3.14,
        ) {
            let axis = Vec3::new(axis.0, axis.1, axis.2);
            proptest::prop_assume!(axis.length() > 1e-3);
            let mut camera = Camera::new(100, 100);
            camera.rotate(Quat::from_axis_angle(axis.normalize(), angle));
            let model = camera.model_matrix(Vec3::ONE);
            proptest::prop_assert!(model.transform_point3(Vec3::splat(0.5)).length() < 1e-5);
            let corner = model.transform_point3(Vec3::ONE).length();
            proptest::prop_assert!((corner - 3f32.sqrt() / 2.0).abs() < 1e-4);
        }
    }
}
