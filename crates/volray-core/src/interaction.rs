//! Pointer-driven camera navigation.
//!
//! Input events go through [`InteractionState::handle`], a pure transition
//! that returns the next state together with the [`Intent`]s the viewer
//! must carry out (rotate, zoom, toggle fast rendering, arm the idle timer).

use std::time::{Duration, Instant};

use glam::{Quat, UVec2, Vec2, Vec3};

/// Eye distance along the view axis at start-up.
pub const DEFAULT_DEPTH: f32 = 1.1;

/// Closest the eye may get to the volume center.
pub const MIN_DEPTH: f32 = 0.05;

/// Farthest the eye may get from the volume center.
pub const MAX_DEPTH: f32 = 4.0;

/// Accumulated wheel delta that triggers one zoom step.
pub const WHEEL_THRESHOLD: f32 = 120.0;

/// Eye distance change per zoom step.
pub const ZOOM_STEP: f32 = 0.05;

/// Quiet time after the last wheel tick before full quality returns.
pub const IDLE_DELAY: Duration = Duration::from_millis(250);

/// Orientation and distance of the viewer relative to the volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub rotation: Quat,
    pub depth: f32,
    pub viewport: UVec2,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            depth: DEFAULT_DEPTH,
            viewport: UVec2::new(1, 1),
        }
    }
}

impl CameraState {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: UVec2::new(width.max(1), height.max(1)),
            ..Self::default()
        }
    }

    /// Applies an incremental rotation on top of the current one.
    pub fn rotate(&mut self, incremental: Quat) {
        self.rotation = (incremental * self.rotation).normalize();
    }

    /// Moves the eye along the view axis, keeping it within range.
    pub fn zoom(&mut self, delta: f32) {
        self.depth = (self.depth + delta).clamp(MIN_DEPTH, MAX_DEPTH);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = UVec2::new(width.max(1), height.max(1));
    }

    /// Lifts a pointer position (pixels, y down) onto the unit arcball.
    ///
    /// Positions inside the ball land on the front hemisphere, positions
    /// outside are projected onto its rim. The result never exceeds unit length.
    #[must_use]
    pub fn arcball_vector(&self, position: Vec2) -> Vec3 {
        let normalized = 2.0 * position / self.viewport.as_vec2() - Vec2::ONE;
        let p = Vec2::new(normalized.x, -normalized.y);

        let length_sq = p.length_squared();
        if length_sq <= 1.0 {
            p.extend((1.0 - length_sq).sqrt())
        } else {
            p.normalize().extend(0.0)
        }
    }

    /// Incremental rotation taking the arcball point under `from` to the one under `to`.
    #[must_use]
    pub fn arcball_rotation(&self, from: Vec2, to: Vec2) -> Option<Quat> {
        let vb = self.arcball_vector(from);
        let va = self.arcball_vector(to);
        let axis = vb.cross(va);
        if axis.length_squared() <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        let angle = va.dot(vb).clamp(-1.0, 1.0).acos();
        Some(Quat::from_axis_angle(axis.normalize(), angle))
    }
}

/// Raw input, already stripped of any windowing-toolkit types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Primary button pressed at a pixel position.
    Press(Vec2),
    /// Pointer moved to a pixel position.
    Move(Vec2),
    /// Primary button released.
    Release,
    /// Vertical wheel delta, 120 units per notch.
    Wheel(f32),
    /// Viewport resized.
    Resize(u32, u32),
}

/// Something the viewer must do in response to input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Left-multiply the camera rotation.
    Rotate(Quat),
    /// Change the eye distance.
    Zoom(f32),
    /// Switch between the low and high sample count.
    SetFastMode(bool),
    /// (Re)start the idle timer that turns fast mode off.
    ArmIdleTimer,
    /// Resize render targets.
    Resize(u32, u32),
    /// Draw a new frame.
    Redraw,
}

/// Navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InteractionState {
    pub camera: CameraState,
    pub dragging: bool,
    pub last_pointer: Vec2,
    pub wheel_accum: f32,
}

impl InteractionState {
    #[must_use]
    pub fn new(camera: CameraState) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    /// Dispatches an input event to the matching transition.
    #[must_use]
    pub fn handle(self, event: InputEvent) -> (Self, Vec<Intent>) {
        match event {
            InputEvent::Press(position) => self.on_press(position),
            InputEvent::Move(position) => self.on_move(position),
            InputEvent::Release => self.on_release(),
            InputEvent::Wheel(delta) => self.on_wheel(delta),
            InputEvent::Resize(width, height) => self.on_resize(width, height),
        }
    }

    #[must_use]
    pub fn on_press(mut self, position: Vec2) -> (Self, Vec<Intent>) {
        self.dragging = true;
        self.last_pointer = position;
        (self, vec![Intent::SetFastMode(true), Intent::Redraw])
    }

    #[must_use]
    pub fn on_move(mut self, position: Vec2) -> (Self, Vec<Intent>) {
        if !self.dragging {
            self.last_pointer = position;
            return (self, Vec::new());
        }

        let rotation = self.camera.arcball_rotation(self.last_pointer, position);
        self.last_pointer = position;
        match rotation {
            Some(q) => {
                self.camera.rotate(q);
                (self, vec![Intent::Rotate(q), Intent::Redraw])
            }
            None => (self, Vec::new()),
        }
    }

    #[must_use]
    pub fn on_release(mut self) -> (Self, Vec<Intent>) {
        self.dragging = false;
        (self, vec![Intent::SetFastMode(false), Intent::Redraw])
    }

    /// Accumulates wheel deltas into fixed zoom steps.
    ///
    /// Reversing direction discards the accumulated delta. Every tick engages
    /// fast mode and re-arms the idle timer.
    #[must_use]
    pub fn on_wheel(mut self, delta: f32) -> (Self, Vec<Intent>) {
        if delta * self.wheel_accum < 0.0 {
            self.wheel_accum = 0.0;
        }
        self.wheel_accum += delta;

        let mut intents = Vec::with_capacity(4);
        let step = if self.wheel_accum >= WHEEL_THRESHOLD {
            Some(-ZOOM_STEP)
        } else if self.wheel_accum <= -WHEEL_THRESHOLD {
            Some(ZOOM_STEP)
        } else {
            None
        };
        if let Some(step) = step {
            self.wheel_accum = 0.0;
            self.camera.zoom(step);
            intents.push(Intent::Zoom(step));
        }

        intents.extend([Intent::SetFastMode(true), Intent::ArmIdleTimer, Intent::Redraw]);
        (self, intents)
    }

    #[must_use]
    pub fn on_resize(mut self, width: u32, height: u32) -> (Self, Vec<Intent>) {
        self.camera.resize(width, height);
        (self, vec![Intent::Resize(width, height), Intent::Redraw])
    }
}

/// Single-shot deadline that turns fast mode off after a quiet period.
///
/// Arming again pushes the deadline back; [`IdleTimer::poll`] reports the
/// expiry exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new(IDLE_DELAY)
    }
}

impl IdleTimer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Starts the timer, superseding any pending deadline.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
