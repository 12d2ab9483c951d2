use std::collections::VecDeque;

use glam::Vec3;

/// Something the editor did to the scene this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    Selected { entity: hecs::Entity },
    Deselected { entity: hecs::Entity },
    PickMissed,
    Spawned { entity: hecs::Entity, position: Vec3 },
    TransformPushed { entity: hecs::Entity, shape_rebuilt: bool },
    /// The selected entity vanished from the registry before it was touched.
    StaleSelection { entity: hecs::Entity },
}

/// A logged event with the frame it was emitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub frame: u64,
    pub event: EditorEvent,
}

/// Editor event queue with ring buffer logging.
pub struct EventLog {
    listeners: Vec<(u64, Box<dyn Fn(&EditorEvent)>)>,
    next_listener_id: u64,
    log: VecDeque<LoggedEvent>,
    log_capacity: usize,
    frame: u64,
    pending: Vec<EditorEvent>,
}

impl EventLog {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            listeners: Vec::new(),
            next_listener_id: 0,
            log: VecDeque::with_capacity(log_capacity),
            log_capacity,
            frame: 0,
            pending: Vec::new(),
        }
    }

    /// Queue an event for the next flush.
    pub fn emit(&mut self, event: EditorEvent) {
        tracing::debug!("editor event: {:?}", event);
        self.pending.push(event);
    }

    /// Register a listener. Returns an ID for removal.
    pub fn listen<F>(&mut self, callback: F) -> u64
    where
        F: Fn(&EditorEvent) + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(callback)));
        id
    }

    pub fn remove_listener(&mut self, listener_id: u64) {
        self.listeners.retain(|(id, _)| *id != listener_id);
    }

    /// Notify listeners, move pending events into the ring buffer and
    /// return them.
    pub fn flush(&mut self) -> Vec<EditorEvent> {
        let events: Vec<EditorEvent> = self.pending.drain(..).collect();

        for event in &events {
            for (_id, callback) in &self.listeners {
                callback(event);
            }

            if self.log.len() >= self.log_capacity {
                self.log.pop_front();
            }
            self.log.push_back(LoggedEvent {
                frame: self.frame,
                event: event.clone(),
            });
        }

        events
    }

    /// Events not flushed yet.
    pub fn pending(&self) -> &[EditorEvent] {
        &self.pending
    }

    pub fn next_frame(&mut self) {
        self.frame += 1;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn get_log(&self) -> &VecDeque<LoggedEvent> {
        &self.log
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(256)
    }
}
