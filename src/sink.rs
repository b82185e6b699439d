use std::sync::Mutex;

/// Destination for the lines a CMake child prints.
///
/// Stdout and stderr are drained on separate threads, so implementations must
/// be shareable across them.
pub trait LogSink: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
}

/// Forwards child output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, line: &str) {
        tracing::info!("{line}");
    }

    fn error(&self, line: &str) {
        tracing::error!("{line}");
    }
}

/// Keeps every line in memory, in arrival order per level.
#[derive(Debug, Default)]
pub struct MemorySink {
    info: Mutex<Vec<String>>,
    error: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_lines(&self) -> Vec<String> {
        lock(&self.info).clone()
    }

    pub fn error_lines(&self) -> Vec<String> {
        lock(&self.error).clone()
    }
}

impl LogSink for MemorySink {
    fn info(&self, line: &str) {
        lock(&self.info).push(line.to_string());
    }

    fn error(&self, line: &str) {
        lock(&self.error).push(line.to_string());
    }
}

// A poisoned lock only means a reader thread panicked mid-push; the lines are still usable.
fn lock(lines: &Mutex<Vec<String>>) -> std::sync::MutexGuard<'_, Vec<String>> {
    lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
