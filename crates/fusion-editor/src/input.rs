use std::collections::HashSet;

use glam::Vec2;

/// Cursor travel, in pixels, before a held button counts as a drag.
pub const DRAG_THRESHOLD: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Window input fed to the editor by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    CursorMoved(Vec2),
    MouseButton { button: MouseButton, state: ButtonState },
}

/// Mouse state, updated each frame.
#[derive(Debug, Default)]
pub struct InputState {
    buttons_held: HashSet<MouseButton>,
    buttons_just_pressed: HashSet<MouseButton>,
    buttons_just_released: HashSet<MouseButton>,
    cursor_position: Vec2,
    // Cursor position when each held button went down
    press_origin: Vec<(MouseButton, Vec2)>,
    // Buttons that crossed the drag threshold since they were pressed
    dragging: HashSet<MouseButton>,
    // Synthetic input queue (for scripted runs and tests)
    synthetic: Vec<InputEvent>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the start of each frame to clear transient state.
    pub fn begin_frame(&mut self) {
        self.buttons_just_pressed.clear();
        self.buttons_just_released.clear();

        let queued: Vec<InputEvent> = self.synthetic.drain(..).collect();
        for event in &queued {
            self.handle_event(event);
        }
    }

    /// Process one window event.
    pub fn handle_event(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::CursorMoved(position) => {
                self.cursor_position = position;
                for (button, origin) in &self.press_origin {
                    if origin.distance(position) >= DRAG_THRESHOLD {
                        self.dragging.insert(*button);
                    }
                }
            }
            InputEvent::MouseButton { button, state } => match state {
                ButtonState::Pressed => {
                    if !self.buttons_held.contains(&button) {
                        self.buttons_just_pressed.insert(button);
                        self.press_origin.retain(|(b, _)| *b != button);
                        self.press_origin.push((button, self.cursor_position));
                    }
                    self.buttons_held.insert(button);
                }
                ButtonState::Released => {
                    self.buttons_held.remove(&button);
                    self.buttons_just_released.insert(button);
                    self.press_origin.retain(|(b, _)| *b != button);
                    self.dragging.remove(&button);
                }
            },
        }
    }

    /// Queue an event to be applied at the next `begin_frame`.
    pub fn inject(&mut self, event: InputEvent) {
        self.synthetic.push(event);
    }

    /// Queue a full left click at `position` for the next frame.
    pub fn inject_click(&mut self, position: Vec2) {
        self.inject(InputEvent::CursorMoved(position));
        self.inject(InputEvent::MouseButton {
            button: MouseButton::Left,
            state: ButtonState::Pressed,
        });
        self.inject(InputEvent::MouseButton {
            button: MouseButton::Left,
            state: ButtonState::Released,
        });
    }

    pub fn just_pressed(&self, button: MouseButton) -> bool {
        self.buttons_just_pressed.contains(&button)
    }

    pub fn just_released(&self, button: MouseButton) -> bool {
        self.buttons_just_released.contains(&button)
    }

    pub fn is_held(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button)
    }

    /// Held and moved at least [`DRAG_THRESHOLD`] pixels since the press.
    pub fn is_dragging(&self, button: MouseButton) -> bool {
        self.is_held(button) && self.dragging.contains(&button)
    }

    pub fn cursor_position(&self) -> Vec2 {
        self.cursor_position
    }
}
