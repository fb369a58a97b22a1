use std::collections::HashSet;

/// Receives notices about events the replay engine had to skip or reinterpret.
///
/// Callers own the sink, so "warn once" is scoped to whatever lifetime they choose
/// (one replay, one session) rather than to the process.
pub trait Diagnostics {
    fn warn_once(&mut self, key: &str, message: &str);
}

/// Emits each distinct key once through `tracing`.
#[derive(Debug, Default)]
pub struct TracingDiagnostics {
    warned: HashSet<String>,
}

impl TracingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Diagnostics for TracingDiagnostics {
    fn warn_once(&mut self, key: &str, message: &str) {
        if self.warned.insert(key.to_string()) {
            tracing::warn!(key, "{}", message);
        }
    }
}

/// Records notices in memory, one per key.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    pub notices: Vec<(String, String)>,
}

impl CollectingDiagnostics {
    pub fn keys(&self) -> Vec<&str> {
        self.notices.iter().map(|(key, _)| key.as_str()).collect()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn warn_once(&mut self, key: &str, message: &str) {
        if !self.notices.iter().any(|(k, _)| k == key) {
            self.notices.push((key.to_string(), message.to_string()));
        }
    }
}
