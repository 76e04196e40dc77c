use glam::{IVec3, Vec2};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Accumulated input between frames.
///
/// `movement` is the net vector of currently held movement keys (strafe x,
/// forward/back y, roll z), adjusted only by matching press/release pairs;
/// the caller filters key repeats. Mouse deltas accumulate only while the
/// cursor is captured and are consumed once per frame.
#[derive(Debug, Default)]
pub struct InputState {
    movement: IVec3,
    mouse_delta: Vec2,
    captured: bool,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) {
        let delta = match key {
            PhysicalKey::Code(KeyCode::KeyW) => IVec3::new(0, 1, 0),
            PhysicalKey::Code(KeyCode::KeyS) => IVec3::new(0, -1, 0),
            PhysicalKey::Code(KeyCode::KeyA) => IVec3::new(-1, 0, 0),
            PhysicalKey::Code(KeyCode::KeyD) => IVec3::new(1, 0, 0),
            PhysicalKey::Code(KeyCode::KeyQ) => IVec3::new(0, 0, -1),
            PhysicalKey::Code(KeyCode::KeyE) => IVec3::new(0, 0, 1),
            _ => return,
        };
        if pressed {
            self.movement += delta;
        } else {
            self.movement -= delta;
        }
    }

    pub fn movement(&self) -> IVec3 {
        self.movement
    }

    pub fn captured(&self) -> bool {
        self.captured
    }

    pub fn set_captured(&mut self, captured: bool) {
        self.captured = captured;
        self.mouse_delta = Vec2::ZERO;
    }

    /// Raw mouse motion in window coordinates (y grows downward); flipped
    /// here so positive y means aiming up.
    pub fn accumulate_mouse(&mut self, dx: f64, dy: f64) {
        if self.captured {
            self.mouse_delta += Vec2::new(dx as f32, -dy as f32);
        }
    }

    /// Returns and clears the per-frame mouse delta.
    pub fn take_mouse_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.mouse_delta)
    }
}
