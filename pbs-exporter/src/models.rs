use serde::{Deserialize, Deserializer};

/// Every PBS endpoint wraps its payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatastoreUsage {
    #[serde(rename = "store")]
    pub name: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub avail: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NamespaceRef {
    #[serde(rename = "ns", default)]
    pub name: String,
}

impl NamespaceRef {
    /// Empty name is the datastore root, never enumerated on its own.
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Unknown,
    Ok,
    Failed,
    Other(String),
}

impl VerificationState {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationState::Ok)
    }
}

impl From<&str> for VerificationState {
    fn from(state: &str) -> Self {
        match state {
            "ok" => VerificationState::Ok,
            "failed" => VerificationState::Failed,
            "unknown" | "" => VerificationState::Unknown,
            other => VerificationState::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub backup_id: String,
    pub backup_time: i64,
    pub comment: String,
    pub verification: VerificationState,
}

impl<'de> Deserialize<'de> for SnapshotRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Verification {
            #[serde(default)]
            state: Option<String>,
        }

        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "backup-id")]
            backup_id: String,
            #[serde(rename = "backup-time")]
            backup_time: i64,
            #[serde(default)]
            comment: Option<String>,
            #[serde(default)]
            verification: Option<Verification>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let verification = raw
            .verification
            .and_then(|v| v.state)
            .map(|state| VerificationState::from(state.as_str()))
            .unwrap_or(VerificationState::Unknown);

        Ok(SnapshotRecord {
            backup_id: raw.backup_id,
            backup_time: raw.backup_time,
            comment: raw.comment.unwrap_or_default(),
            verification,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryUsage {
    pub free: u64,
    pub total: u64,
    pub used: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskUsage {
    pub avail: u64,
    pub total: u64,
    pub used: u64,
}

/// `nodes/{node}/status` as sent on the wire. Missing fields read as zero;
/// `loadavg` is unchecked here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeStatusPayload {
    pub cpu: f64,
    pub memory: MemoryUsage,
    pub swap: MemoryUsage,
    pub root: DiskUsage,
    pub uptime: u64,
    pub wait: f64,
    pub loadavg: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostStatus {
    pub cpu: f64,
    pub memory: MemoryUsage,
    pub swap: MemoryUsage,
    pub root: DiskUsage,
    pub uptime: u64,
    pub io_wait: f64,
    /// 1, 5 and 15 minute load averages
    pub load: [f64; 3],
}

impl TryFrom<NodeStatusPayload> for HostStatus {
    type Error = String;

    fn try_from(payload: NodeStatusPayload) -> Result<Self, Self::Error> {
        let load = match payload.loadavg.as_slice() {
            [one, five, fifteen, ..] => [*one, *five, *fifteen],
            short => {
                return Err(format!(
                    "loadavg has {} entries, expected at least 3",
                    short.len()
                ))
            }
        };

        Ok(HostStatus {
            cpu: payload.cpu,
            memory: payload.memory,
            swap: payload.swap,
            root: payload.root,
            uptime: payload.uptime,
            io_wait: payload.wait,
            load,
        })
    }
}
