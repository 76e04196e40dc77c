use glam::{IVec3, Quat, Vec2, Vec3};
use std::fmt;

const MOUSE_SENSITIVITY: f32 = 1.0e-3;
const MOVE_SPEED: f32 = 6.0;
const ROLL_SPEED: f32 = 1.25;

/// First-person fly camera.
///
/// Keeps an explicit orthonormal basis instead of yaw/pitch angles so roll
/// composes freely with the other rotations; the basis is renormalized every
/// advance to keep numerical drift out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyCamera {
    pub eye: Vec3,
    pub fwd: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            eye: Vec3::ZERO,
            fwd: Vec3::Z,
            up: Vec3::Y,
            // Must equal fwd x up, the same recompute advance() performs.
            right: Vec3::NEG_X,
        }
    }
}

impl FlyCamera {
    /// Advances the camera one frame.
    ///
    /// `movement` is the net held-key vector (strafe, forward/back, roll) and
    /// `mouse_delta` the per-frame cursor delta with +y pointing up.
    ///
    /// Rotation order is pitch, then yaw around the post-pitch up vector,
    /// then roll around forward. These rotations do not commute; reordering
    /// them changes the control semantics.
    pub fn advance(&mut self, movement: IVec3, mouse_delta: Vec2, dt: f32) {
        let dt = dt.max(0.0);

        self.right = self.fwd.cross(self.up).normalize();

        let around_right = Quat::from_axis_angle(self.right, mouse_delta.y * MOUSE_SENSITIVITY);
        self.up = around_right * self.up;

        let around_up = Quat::from_axis_angle(self.up, -mouse_delta.x * MOUSE_SENSITIVITY);
        self.fwd = around_up * (around_right * self.fwd);

        let around_fwd = Quat::from_axis_angle(self.fwd, movement.z as f32 * ROLL_SPEED * dt);
        self.up = around_fwd * self.up;
        self.right = around_fwd * (around_up * self.right);

        let step = MOVE_SPEED * dt;
        self.eye += self.right * (movement.x as f32 * step) + self.fwd * (movement.y as f32 * step);

        self.fwd = self.fwd.normalize();
        self.up = self.up.normalize();
        self.right = self.right.normalize();
    }
}

impl fmt::Display for FlyCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "E: {}", self.eye)?;
        writeln!(f, "F: {}", self.fwd)?;
        writeln!(f, "U: {}", self.up)?;
        write!(f, "R: {}", self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::FlyCamera;
    use glam::{IVec3, Vec2, Vec3};

    const EPS: f32 = 1e-5;

    fn assert_orthonormal(cam: &FlyCamera) {
        assert!((cam.fwd.length() - 1.0).abs() < EPS);
        assert!((cam.up.length() - 1.0).abs() < EPS);
        assert!((cam.right.length() - 1.0).abs() < EPS);
        assert!(cam.fwd.dot(cam.up).abs() < EPS);
        assert!(cam.fwd.dot(cam.right).abs() < EPS);
        assert!(cam.up.dot(cam.right).abs() < EPS);
    }

    #[test]
    fn default_right_matches_the_recomputed_cross_product() {
        let cam = FlyCamera::default();
        assert_eq!(cam.right, cam.fwd.cross(cam.up));
    }

    #[test]
    fn zero_input_zero_dt_is_identity() {
        let mut cam = FlyCamera::default();
        let before = cam;
        cam.advance(IVec3::ZERO, Vec2::ZERO, 0.0);
        assert!(cam.eye.distance(before.eye) < EPS);
        assert!(cam.fwd.distance(before.fwd) < EPS);
        assert!(cam.up.distance(before.up) < EPS);
        assert!(cam.right.distance(before.right) < EPS);
    }

    #[test]
    fn negative_dt_is_clamped() {
        let mut cam = FlyCamera::default();
        let before = cam;
        cam.advance(IVec3::new(1, 1, 1), Vec2::ZERO, -0.5);
        assert!(cam.eye.distance(before.eye) < EPS);
        assert!(cam.up.distance(before.up) < EPS);
    }

    #[test]
    fn basis_stays_orthonormal_under_arbitrary_input() {
        let mut cam = FlyCamera::default();
        let moves = [
            (IVec3::new(1, 0, 0), Vec2::new(30.0, -12.0)),
            (IVec3::new(0, 1, 1), Vec2::new(-80.0, 45.0)),
            (IVec3::new(-1, -1, 0), Vec2::new(5.0, 300.0)),
            (IVec3::new(0, 0, -1), Vec2::new(-250.0, -4.0)),
        ];
        for _ in 0..200 {
            for (movement, mouse) in moves {
                cam.advance(movement, mouse, 1.0 / 60.0);
                assert_orthonormal(&cam);
            }
        }
    }

    #[test]
    fn forward_key_translates_along_forward() {
        let mut cam = FlyCamera::default();
        cam.advance(IVec3::new(0, 1, 0), Vec2::ZERO, 0.5);
        assert!(cam.eye.distance(Vec3::new(0.0, 0.0, 3.0)) < EPS);
    }

    #[test]
    fn roll_rotates_up_and_right_around_forward() {
        let mut cam = FlyCamera::default();
        // Roll speed 1.25 rad/s for 0.4 s = 0.5 rad.
        cam.advance(IVec3::new(0, 0, 1), Vec2::ZERO, 0.4);
        assert!(cam.fwd.distance(Vec3::Z) < EPS);
        let angle = 0.5f32;
        let expected_up = Vec3::new(-angle.sin(), angle.cos(), 0.0);
        assert!(cam.up.distance(expected_up) < 1e-4);
        assert_orthonormal(&cam);
    }
}
