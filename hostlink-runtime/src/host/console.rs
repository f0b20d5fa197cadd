use std::collections::VecDeque;

/// Target module console output is logged under.
pub const GUEST_TARGET: &str = "hostlink::guest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

impl ConsoleLevel {
    fn log_level(self) -> log::Level {
        match self {
            ConsoleLevel::Log => log::Level::Info,
            ConsoleLevel::Warn => log::Level::Warn,
            ConsoleLevel::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub text: String,
    /// Milliseconds on the session clock.
    pub at_ms: f64,
}

/// Bounded buffer of what the module printed.
#[derive(Debug)]
pub struct Console {
    lines: VecDeque<ConsoleLine>,
    capacity: usize,
    dropped: u64,
}

impl Console {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, level: ConsoleLevel, text: String, at_ms: f64) {
        log::log!(target: GUEST_TARGET, level.log_level(), "{text}");
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(ConsoleLine { level, text, at_ms });
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    /// Removes and returns everything buffered.
    pub fn drain(&mut self) -> Vec<ConsoleLine> {
        self.lines.drain(..).collect()
    }

    /// Lines discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let mut console = Console::new(2);
        console.push(ConsoleLevel::Log, "one".into(), 0.0);
        console.push(ConsoleLevel::Warn, "two".into(), 1.0);
        console.push(ConsoleLevel::Error, "three".into(), 2.0);
        let texts: Vec<_> = console.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert_eq!(console.dropped(), 1);
        assert_eq!(console.drain().len(), 2);
        assert_eq!(console.lines().count(), 0);
    }
}
