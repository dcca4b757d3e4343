//! Run metrics using metrics-rs.
//!
//! Every crate records into the global `metrics` facade. The binary
//! installs [`CliRecorder`] when `--metrics` is passed and prints what was
//! collected once the command finishes.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;

use crate::cosim::MismatchKind;

// ============================================================================
// Metric descriptions
// ============================================================================

/// Register metric descriptions for this crate and the bus layer.
pub fn init() {
    describe_counter!(
        "rvcheck_instructions_checked",
        Unit::Count,
        "Reference instructions compared against the design"
    );
    describe_counter!(
        "rvcheck_mismatches",
        Unit::Count,
        "Architectural mismatches found"
    );
    describe_counter!(
        "rvcheck_cycles",
        Unit::Count,
        "Design cycles advanced by the checker"
    );
    describe_counter!(
        "rvcheck_mailbox_messages",
        Unit::Count,
        "Console messages relayed through the mailbox"
    );
    describe_counter!(
        "rvcheck_firmware_words",
        Unit::Count,
        "Firmware words written to the design's RAMs"
    );
    describe_gauge!(
        "rvcheck_trace_entries",
        Unit::Count,
        "Records in the parsed reference trace"
    );
    describe_histogram!(
        "rvcheck_commit_latency_cycles",
        Unit::Count,
        "Cycles between consecutive commits"
    );
    rvcheck_bus::init_metrics();
}

// ============================================================================
// Metric recording functions
// ============================================================================

pub fn record_instruction() {
    counter!("rvcheck_instructions_checked").increment(1);
}

pub fn record_mismatch(kind: &MismatchKind) {
    let label = match kind {
        MismatchKind::FetchPc | MismatchKind::NextPc => "pc",
        MismatchKind::Register { .. } => "register",
        MismatchKind::Memory { .. } => "memory",
        MismatchKind::Csr { .. } => "csr",
    };
    counter!("rvcheck_mismatches", "kind" => label).increment(1);
}

pub fn record_cycles(cycles: u64) {
    counter!("rvcheck_cycles").increment(cycles);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_commit_latency(cycles: u64) {
    histogram!("rvcheck_commit_latency_cycles").record(cycles as f64);
}

/// `direction` is `"ptc"` or `"ctp"`.
pub fn record_message(direction: &'static str) {
    counter!("rvcheck_mailbox_messages", "direction" => direction).increment(1);
}

pub fn record_firmware(port: &'static str, words: u64) {
    counter!("rvcheck_firmware_words", "port" => port).increment(words);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_trace(entries: usize) {
    gauge!("rvcheck_trace_entries").set(entries as f64);
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct CounterStorage {
    values: RwLock<HashMap<String, u64>>,
}

#[derive(Default)]
struct GaugeStorage {
    values: RwLock<HashMap<String, f64>>,
}

#[derive(Default)]
struct HistogramStorage {
    values: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<CounterStorage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<GaugeStorage>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<HistogramStorage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        let mut values = self.storage.values.write();
        values.entry(self.key.clone()).or_default().push(value);
    }
}

/// Recorder that keeps every metric in memory for a final summary.
#[derive(Default)]
pub struct CliRecorder {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install this recorder globally. Returns `None` if another recorder
    /// is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = CliRecorderHandle {
            counters: Arc::clone(&self.counters),
            gauges: Arc::clone(&self.gauges),
            histograms: Arc::clone(&self.histograms),
        };
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Read access to what an installed [`CliRecorder`] collected.
pub struct CliRecorderHandle {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.values.read().get(key).copied()
    }

    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.gauges.values.read().get(key).copied()
    }

    /// Print all collected metrics, sorted by key.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        let counters = self.counters.values.read();
        let gauges = self.gauges.values.read();
        let histograms = self.histograms.values.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();

        if !counters.is_empty() {
            println!("### Counters");
            let mut entries: Vec<_> = counters.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                println!("  {key}: {value}");
            }
            println!();
        }

        if !gauges.is_empty() {
            println!("### Gauges");
            let mut entries: Vec<_> = gauges.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                println!("  {key}: {value:.2}");
            }
            println!();
        }

        if !histograms.is_empty() {
            println!("### Histograms");
            let mut entries: Vec<_> = histograms.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, values) in entries {
                if values.is_empty() {
                    continue;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                println!(
                    "  {key}: count={}, min={min:.0}, max={max:.0}, avg={avg:.2}",
                    values.len()
                );
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use metrics::Label;

    use super::*;

    #[test]
    fn test_key_to_string() {
        let key = Key::from_name("rvcheck_cycles");
        assert_eq!(key_to_string(&key), "rvcheck_cycles");

        let key = Key::from_parts("rvcheck_mismatches", vec![Label::new("kind", "memory")]);
        assert_eq!(key_to_string(&key), "rvcheck_mismatches{kind=memory}");

        let key = Key::from_parts(
            "rvcheck_firmware_words",
            vec![Label::new("port", "instr"), Label::new("xlen", "32")],
        );
        assert_eq!(
            key_to_string(&key),
            "rvcheck_firmware_words{port=instr,xlen=32}"
        );
    }

    #[test]
    fn test_cli_recorder_storage() {
        let recorder = CliRecorder::new();

        let counter = CliCounter {
            key: "rvcheck_instructions_checked".to_string(),
            storage: Arc::clone(&recorder.counters),
        };
        metrics::CounterFn::increment(&counter, 3);
        metrics::CounterFn::increment(&counter, 2);
        assert_eq!(
            recorder
                .counters
                .values
                .read()
                .get("rvcheck_instructions_checked"),
            Some(&5)
        );

        let histogram = CliHistogram {
            key: "rvcheck_commit_latency_cycles".to_string(),
            storage: Arc::clone(&recorder.histograms),
        };
        metrics::HistogramFn::record(&histogram, 1.0);
        metrics::HistogramFn::record(&histogram, 2.0);
        assert_eq!(
            recorder
                .histograms
                .values
                .read()
                .get("rvcheck_commit_latency_cycles")
                .map(Vec::len),
            Some(2)
        );
    }
}
