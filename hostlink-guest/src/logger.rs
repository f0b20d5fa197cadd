//! `log` records forwarded to the host console.

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Where formatted log lines go.
pub trait ConsoleSink: Send + Sync {
    fn write(&self, level: Level, line: &str);
}

/// A `log::Log` that formats records and hands them to a console sink:
/// errors to `console.error`, warnings to `console.warn`, the rest to
/// `console.log`.
pub struct ConsoleLogger<S> {
    sink: S,
    level: LevelFilter,
}

impl<S: ConsoleSink> ConsoleLogger<S> {
    pub const fn new(sink: S, level: LevelFilter) -> Self {
        Self { sink, level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

pub fn format_record(record: &Record<'_>) -> String {
    match (record.file(), record.line()) {
        (Some(file), Some(line)) => {
            format!("{} {}:{} {}", record.level(), file, line, record.args())
        }
        _ => format!("{} {} {}", record.level(), record.target(), record.args()),
    }
}

impl<S: ConsoleSink> Log for ConsoleLogger<S> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.sink.write(record.level(), &format_record(record));
        }
    }

    fn flush(&self) {}
}

/// The host's console imports.
#[cfg(target_arch = "wasm32")]
pub struct HostConsole;

#[cfg(target_arch = "wasm32")]
impl ConsoleSink for HostConsole {
    fn write(&self, level: Level, line: &str) {
        match level {
            Level::Error => crate::host::console::error(line),
            Level::Warn => crate::host::console::warn(line),
            _ => crate::host::console::log(line),
        }
    }
}

#[cfg(target_arch = "wasm32")]
static LOGGER: ConsoleLogger<HostConsole> = ConsoleLogger::new(HostConsole, LevelFilter::Trace);

/// Installs the console logger at `level`. Fails if a logger is already set.
#[cfg(target_arch = "wasm32")]
pub fn init_with_level(level: Level) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level.to_level_filter());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<(Level, String)>>);

    impl ConsoleSink for &'static Captured {
        fn write(&self, level: Level, line: &str) {
            self.0.lock().unwrap().push((level, line.to_string()));
        }
    }

    #[test]
    fn test_filters_and_formats() {
        let captured: &'static Captured = Box::leak(Box::default());
        let logger = ConsoleLogger::new(captured, LevelFilter::Info);

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("app")
                .args(format_args!("low fuel"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("hidden"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Error)
                .file(Some("src/app.rs"))
                .line(Some(12))
                .args(format_args!("boom"))
                .build(),
        );

        let lines = captured.0.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                (Level::Warn, "WARN app low fuel".to_string()),
                (Level::Error, "ERROR src/app.rs:12 boom".to_string()),
            ]
        );
    }
}
