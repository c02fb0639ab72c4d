//! Driver-station style key/value telemetry.

/// Mirrors the host's telemetry display: pairs are staged with
/// [`add_data`](TelemetrySink::add_data) and shown on [`update`](TelemetrySink::update).
pub trait TelemetrySink {
    fn add_data(&mut self, key: &str, value: &str);

    fn update(&mut self) {}
}

/// Emits one `tracing` event per pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn add_data(&mut self, key: &str, value: &str) {
        tracing::info!(target: "relic::telemetry", key, value, "telemetry");
    }
}

/// Collects pairs in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTelemetry {
    lines: Vec<(String, String)>,
    updates: usize,
}

impl MemoryTelemetry {
    pub fn lines(&self) -> &[(String, String)] {
        &self.lines
    }

    /// Last value staged under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn add_data(&mut self, key: &str, value: &str) {
        self.lines.push((key.to_string(), value.to_string()));
    }

    fn update(&mut self) {
        self.updates += 1;
    }
}
