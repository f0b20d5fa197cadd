use std::time::Instant;

use crate::config::ClockMode;

/// Source of `performance.now()`, in milliseconds since session start.
#[derive(Debug, Clone)]
pub enum Clock {
    System { origin: Instant },
    /// Advanced only by frame timestamps.
    Manual { now_ms: f64 },
}

impl Clock {
    pub fn new(mode: ClockMode) -> Self {
        match mode {
            ClockMode::System => Clock::System {
                origin: Instant::now(),
            },
            ClockMode::Manual => Clock::Manual { now_ms: 0.0 },
        }
    }

    pub fn now(&self) -> f64 {
        match self {
            Clock::System { origin } => origin.elapsed().as_secs_f64() * 1000.0,
            Clock::Manual { now_ms } => *now_ms,
        }
    }

    /// Moves a manual clock forward to `time_ms`; never backwards.
    pub fn advance_to(&mut self, time_ms: f64) {
        if let Clock::Manual { now_ms } = self {
            if time_ms > *now_ms {
                *now_ms = time_ms;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let mut clock = Clock::new(ClockMode::Manual);
        assert_eq!(clock.now(), 0.0);
        clock.advance_to(16.5);
        clock.advance_to(10.0);
        assert_eq!(clock.now(), 16.5);
    }

    #[test]
    fn test_system_clock_ignores_advance() {
        let mut clock = Clock::new(ClockMode::System);
        clock.advance_to(1.0e9);
        assert!(clock.now() < 1.0e9);
    }
}
