use std::sync::{LazyLock, Mutex};

use log::{LevelFilter, Log, Metadata, Record};

/// Process-wide `log` sink that keeps every formatted record in memory.
pub struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

static LOGGER: LazyLock<CaptureLogger> = LazyLock::new(|| CaptureLogger {
    lines: Mutex::new(Vec::new()),
});

impl CaptureLogger {
    /// Installs the logger on first use. Tests share it, so filter by a unique marker.
    pub fn install() -> &'static CaptureLogger {
        let logger = LazyLock::force(&LOGGER);
        let _ = log::set_logger(logger);
        log::set_max_level(LevelFilter::Trace);
        logger
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .cloned()
            .collect()
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{} {}", record.level(), record.args()));
    }

    fn flush(&self) {}
}
