use crate::physics::PhysicsWorld;

/// Advances the simulation in fixed increments, independent of frame rate.
#[derive(Debug, Clone)]
pub struct PhysicsStepper {
    pub fixed_dt: f32,
    pub max_substeps: u32,
    accumulator: f32,
    steps_taken: u64,
}

impl PhysicsStepper {
    pub fn new(fixed_dt: f32, max_substeps: u32) -> Self {
        Self {
            fixed_dt: fixed_dt.max(1e-4),
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
            steps_taken: 0,
        }
    }

    /// Step the world exactly once.
    pub fn advance(&mut self, world: &mut PhysicsWorld) {
        world.step(self.fixed_dt);
        self.steps_taken += 1;
    }

    /// Consume `elapsed` seconds of wall-clock time in fixed steps. Returns
    /// the number of steps taken. Backlog beyond `max_substeps` is dropped
    /// so a long stall does not trigger a catch-up spiral.
    pub fn advance_elapsed(&mut self, world: &mut PhysicsWorld, elapsed: f32) -> u32 {
        self.advance_elapsed_with(world, elapsed, |_| {})
    }

    /// Like [`advance_elapsed`](Self::advance_elapsed), running `after_step`
    /// after every single step.
    pub fn advance_elapsed_with<F>(&mut self, world: &mut PhysicsWorld, elapsed: f32, mut after_step: F) -> u32
    where
        F: FnMut(&mut PhysicsWorld),
    {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulator += elapsed;
        }

        let mut steps = 0;
        while self.accumulator >= self.fixed_dt && steps < self.max_substeps {
            self.advance(world);
            after_step(world);
            self.accumulator -= self.fixed_dt;
            steps += 1;
        }

        if self.accumulator >= self.fixed_dt {
            tracing::debug!(
                "Dropping {:.3}s of physics backlog after {} substeps",
                self.accumulator,
                steps
            );
            self.accumulator %= self.fixed_dt;
        }
        steps
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

/// Wall-clock frame timer.
#[derive(Debug, Default)]
pub struct FrameClock {
    last_frame_time: Option<instant::Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous tick, clamped to 0.1. The first tick
    /// returns zero.
    pub fn tick(&mut self) -> f32 {
        let now = instant::Instant::now();
        let delta = match self.last_frame_time {
            Some(last) => now.duration_since(last).as_secs_f32().min(0.1),
            None => 0.0,
        };
        self.last_frame_time = Some(now);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_advance_steps_once() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
        let mut stepper = PhysicsStepper::new(1.0 / 60.0, 4);
        stepper.advance(&mut world);
        assert_eq!(stepper.steps_taken(), 1);
    }

    #[test]
    fn test_accumulator_carries_remainder() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let mut stepper = PhysicsStepper::new(0.01, 8);

        assert_eq!(stepper.advance_elapsed(&mut world, 0.005), 0);
        assert_eq!(stepper.advance_elapsed(&mut world, 0.007), 1);
        assert!((stepper.accumulator - 0.002).abs() < 1e-4);
        assert_eq!(stepper.advance_elapsed(&mut world, 0.03), 3);
        assert_eq!(stepper.steps_taken(), 4);
    }

    #[test]
    fn test_backlog_is_capped() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let mut stepper = PhysicsStepper::new(0.01, 2);

        assert_eq!(stepper.advance_elapsed(&mut world, 1.0), 2);
        assert!(stepper.accumulator < stepper.fixed_dt);
        assert_eq!(stepper.advance_elapsed(&mut world, 0.0), 0);
    }

    #[test]
    fn test_invalid_elapsed_is_ignored() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let mut stepper = PhysicsStepper::new(0.01, 2);
        assert_eq!(stepper.advance_elapsed(&mut world, f32::NAN), 0);
        assert_eq!(stepper.advance_elapsed(&mut world, -1.0), 0);
    }

    #[test]
    fn test_hook_runs_after_every_step() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let mut stepper = PhysicsStepper::new(0.01, 8);
        let mut calls = 0;
        let steps = stepper.advance_elapsed_with(&mut world, 0.035, |_| calls += 1);
        assert_eq!(steps, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_frame_clock_first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 0.0);
        assert!(clock.tick() <= 0.1);
    }
}
