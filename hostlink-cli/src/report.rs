use std::fmt;

use chrono::{DateTime, Local};
use hostlink_runtime::host::console::{ConsoleLevel, ConsoleLine};
use hostlink_runtime::host::gl::DrawStats;

/// Formats one line of module console output for the terminal.
pub fn format_line(at: DateTime<Local>, line: &ConsoleLine) -> String {
    let level = match line.level {
        ConsoleLevel::Log => "log",
        ConsoleLevel::Warn => "warn",
        ConsoleLevel::Error => "error",
    };
    format!(
        "{} [{:>9.1}ms] {:<5} {}",
        at.format("%H:%M:%S%.3f"),
        line.at_ms,
        level,
        line.text
    )
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSummary {
    pub calls: u64,
    pub stats: DrawStats,
}

/// What a `run` did, printed when it finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u32,
    pub frame_callbacks: usize,
    pub tasks: usize,
    pub events_dispatched: usize,
    pub events_handled: usize,
    pub defaults_prevented: usize,
    pub live_handles: usize,
    pub live_closures: usize,
    pub closures_swept: usize,
    pub console_dropped: u64,
    pub contexts: Vec<ContextSummary>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frames: {} ({} callbacks, {} tasks)",
            self.frames, self.frame_callbacks, self.tasks
        )?;
        writeln!(
            f,
            "events: {} dispatched, {} handled, {} default prevented",
            self.events_dispatched, self.events_handled, self.defaults_prevented
        )?;
        writeln!(
            f,
            "heap: {} live handles, {} live closures, {} swept",
            self.live_handles, self.live_closures, self.closures_swept
        )?;
        for (i, ctx) in self.contexts.iter().enumerate() {
            writeln!(
                f,
                "webgl2 #{i}: {} calls, {} draws, {} vertices, {} clears",
                ctx.calls, ctx.stats.draw_calls, ctx.stats.vertices, ctx.stats.clears
            )?;
        }
        if self.console_dropped > 0 {
            writeln!(f, "console: {} lines dropped", self.console_dropped)?;
        }
        Ok(())
    }
}
