/// Turns animation-frame timestamps into per-frame time steps.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_time: f64,
    frames: u64,
    elapsed: f64,
}

impl FrameClock {
    /// Step assumed for the first frame (~60fps).
    pub const FIRST_STEP: f32 = 0.016;
    /// Longest step handed out; a stalled tab resumes without a jump.
    pub const MAX_STEP: f32 = 0.25;

    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `time` (milliseconds) and returns the seconds
    /// since the previous one.
    pub fn tick(&mut self, time: f64) -> f32 {
        let dt = if self.last_time > 0.0 {
            (((time - self.last_time) / 1000.0) as f32).clamp(0.0, Self::MAX_STEP)
        } else {
            Self::FIRST_STEP
        };
        self.last_time = time;
        self.frames += 1;
        self.elapsed += f64::from(dt);
        dt
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Simulated seconds so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Mean frames per second over the simulated time.
    pub fn average_fps(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.frames as f64 / self.elapsed
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(1000.0), FrameClock::FIRST_STEP);
        assert!((clock.tick(1020.0) - 0.02).abs() < 1e-6);
        assert_eq!(clock.tick(9000.0), FrameClock::MAX_STEP);
        assert_eq!(clock.tick(8000.0), 0.0);
        assert_eq!(clock.frames(), 4);
        assert!(clock.average_fps() > 0.0);
    }
}
