//! Prometheus metric definitions and text rendering.
//!
//! Collection produces plain `MetricSample`s. Rendering registers them into
//! a fresh `Registry` that lives only for one response, so concurrent
//! scrapes of different targets never share metric state.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "pbs";

/// Static description of one metric family (name without the `pbs_` prefix).
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

const DATASTORE: &[&str] = &["datastore"];
const NAMESPACE_LABELS: &[&str] = &["datastore", "namespace"];
const VM_LABELS: &[&str] = &["datastore", "namespace", "vm_id", "vm_name"];

macro_rules! desc {
    ($ident:ident, $name:literal, $help:literal) => {
        desc!($ident, $name, $help, &[]);
    };
    ($ident:ident, $name:literal, $help:literal, $labels:expr) => {
        pub static $ident: MetricDesc = MetricDesc {
            name: $name,
            help: $help,
            labels: $labels,
        };
    };
}

desc!(UP, "up", "Was the last query of PBS successful.");
desc!(AVAILABLE, "available", "The available bytes of the underlying storage.", DATASTORE);
desc!(SIZE, "size", "The size of the underlying storage in bytes.", DATASTORE);
desc!(USED, "used", "The used bytes of the underlying storage.", DATASTORE);
desc!(SNAPSHOT_COUNT, "snapshot_count", "The total number of backups.", NAMESPACE_LABELS);
desc!(SNAPSHOT_VM_COUNT, "snapshot_vm_count", "The total number of backups per VM.", VM_LABELS);
desc!(
    SNAPSHOT_VM_LAST_TIMESTAMP,
    "snapshot_vm_last_timestamp",
    "The timestamp of the last backup of a VM.",
    VM_LABELS
);
desc!(
    SNAPSHOT_VM_LAST_VERIFY,
    "snapshot_vm_last_verify",
    "The verify status of the last backup of a VM.",
    VM_LABELS
);
desc!(HOST_CPU_USAGE, "host_cpu_usage", "The CPU usage of the host.");
desc!(HOST_MEMORY_FREE, "host_memory_free", "The free memory of the host.");
desc!(HOST_MEMORY_TOTAL, "host_memory_total", "The total memory of the host.");
desc!(HOST_MEMORY_USED, "host_memory_used", "The used memory of the host.");
desc!(HOST_SWAP_FREE, "host_swap_free", "The free swap of the host.");
desc!(HOST_SWAP_TOTAL, "host_swap_total", "The total swap of the host.");
desc!(HOST_SWAP_USED, "host_swap_used", "The used swap of the host.");
desc!(
    HOST_DISK_AVAILABLE,
    "host_disk_available",
    "The available disk of the local root disk in bytes."
);
desc!(HOST_DISK_TOTAL, "host_disk_total", "The total disk of the local root disk in bytes.");
desc!(HOST_DISK_USED, "host_disk_used", "The used disk of the local root disk in bytes.");
desc!(HOST_UPTIME, "host_uptime", "The uptime of the host.");
desc!(HOST_IO_WAIT, "host_io_wait", "The io wait of the host.");
desc!(HOST_LOAD1, "host_load1", "The load for 1 minute of the host.");
desc!(HOST_LOAD5, "host_load5", "The load for 5 minutes of the host.");
desc!(HOST_LOAD15, "host_load15", "The load for 15 minutes of the host.");

/// One observation. `labels` holds values in the order of `desc.labels`;
/// an empty string is still a present label.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub desc: &'static MetricDesc,
    pub labels: Vec<String>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(desc: &'static MetricDesc, labels: &[&str], value: f64) -> Self {
        debug_assert_eq!(desc.labels.len(), labels.len(), "label arity for {}", desc.name);
        Self {
            desc,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            value,
        }
    }

    pub fn unlabeled(desc: &'static MetricDesc, value: f64) -> Self {
        Self::new(desc, &[], value)
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    /// Value of a label by name, if the descriptor declares it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Encode `samples` in the Prometheus text format.
pub fn render(samples: &[MetricSample]) -> prometheus::Result<String> {
    encode(&registry_for(samples)?)
}

/// `render` plus the exporter's own `process_*` metrics, as served on every scrape.
pub fn render_scrape(samples: &[MetricSample]) -> prometheus::Result<String> {
    let registry = registry_for(samples)?;
    register_process_collector(&registry)?;
    encode(&registry)
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &Registry) -> prometheus::Result<()> {
    use prometheus::process_collector::ProcessCollector;
    registry.register(Box::new(ProcessCollector::for_self()))
}

// procfs is Linux only
#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &Registry) -> prometheus::Result<()> {
    Ok(())
}

fn registry_for(samples: &[MetricSample]) -> prometheus::Result<Registry> {
    let registry = Registry::new();

    let mut families: BTreeMap<&'static str, Vec<&MetricSample>> = BTreeMap::new();
    for sample in samples {
        families.entry(sample.name()).or_default().push(sample);
    }

    for family in families.values() {
        let desc = family[0].desc;
        let opts = Opts::new(desc.name, desc.help).namespace(NAMESPACE);

        if desc.labels.is_empty() {
            let gauge = Gauge::with_opts(opts)?;
            registry.register(Box::new(gauge.clone()))?;
            for sample in family {
                gauge.set(sample.value);
            }
        } else {
            let vec = GaugeVec::new(opts, desc.labels)?;
            registry.register(Box::new(vec.clone()))?;
            for sample in family {
                let values: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
                vec.get_metric_with_label_values(&values)?.set(sample.value);
            }
        }
    }

    Ok(registry)
}

fn encode(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::with_capacity(4096);
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_unlabeled_and_labeled() {
        let samples = vec![
            MetricSample::unlabeled(&UP, 1.0),
            MetricSample::new(&SIZE, &["ds1"], 1000.0),
            MetricSample::new(&SIZE, &["ds2"], 2000.0),
        ];
        let text = render(&samples).unwrap();
        assert!(text.contains("# HELP pbs_up Was the last query of PBS successful."));
        assert!(text.contains("# TYPE pbs_up gauge"));
        assert!(text.contains("pbs_up 1\n"));
        assert!(text.contains("pbs_size{datastore=\"ds1\"} 1000\n"));
        assert!(text.contains("pbs_size{datastore=\"ds2\"} 2000\n"));
    }

    #[test]
    fn test_render_keeps_empty_labels() {
        let samples = vec![MetricSample::new(
            &SNAPSHOT_VM_COUNT,
            &["ds1", "ns1", "100", ""],
            2.0,
        )];
        let text = render(&samples).unwrap();
        assert!(text.contains(
            "pbs_snapshot_vm_count{datastore=\"ds1\",namespace=\"ns1\",vm_id=\"100\",vm_name=\"\"} 2"
        ));
    }

    #[test]
    fn test_render_omits_absent_families() {
        let text = render(&[MetricSample::unlabeled(&UP, 0.0)]).unwrap();
        assert!(text.contains("pbs_up 0"));
        assert!(!text.contains("pbs_host_"));
        assert!(!text.contains("pbs_size"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let samples = vec![
            MetricSample::new(&USED, &["b"], 1.0),
            MetricSample::new(&USED, &["a"], 2.0),
            MetricSample::unlabeled(&HOST_LOAD1, 0.5),
        ];
        assert_eq!(render(&samples).unwrap(), render(&samples).unwrap());
    }

    #[test]
    fn test_render_scrape_keeps_samples() {
        let text = render_scrape(&[MetricSample::unlabeled(&UP, 0.0)]).unwrap();
        assert!(text.contains("pbs_up 0\n"));
        assert!(!render(&[]).unwrap().contains("process_"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_render_scrape_adds_process_metrics() {
        let text = render_scrape(&[MetricSample::unlabeled(&UP, 1.0)]).unwrap();
        assert!(text.contains("process_cpu_seconds_total"));
        assert!(text.contains("process_resident_memory_bytes"));
    }

    #[test]
    fn test_label_lookup() {
        let sample = MetricSample::new(&SNAPSHOT_COUNT, &["ds1", "ns1"], 3.0);
        assert_eq!(sample.label("namespace"), Some("ns1"));
        assert_eq!(sample.label("vm_id"), None);
        assert_eq!(sample.name(), "snapshot_count");
    }
}
