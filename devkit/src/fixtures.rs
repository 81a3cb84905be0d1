/*!
JSON fixtures for the four PBS endpoints used by the exporter

Builders return complete `{"data": ...}` envelopes, ready for
`MockPbs::respond_json`. Path helpers produce the matching mock keys.
*/

use serde_json::{json, Value};

pub const DATASTORE_USAGE_PATH: &str = "/api2/json/status/datastore-usage";
pub const NODE_STATUS_PATH: &str = "/api2/json/nodes/localhost/status";

pub fn namespace_path(store: &str) -> String {
    format!("/api2/json/admin/datastore/{store}/namespace")
}

pub fn snapshots_path(store: &str, namespace: &str) -> String {
    format!("/api2/json/admin/datastore/{store}/snapshots?ns={namespace}")
}

/// One snapshot entry. `verify` = None leaves out the verification object.
pub fn snapshot(backup_id: &str, backup_time: i64, comment: &str, verify: Option<&str>) -> Value {
    let mut entry = json!({
        "backup-type": "vm",
        "backup-id": backup_id,
        "backup-time": backup_time,
        "comment": comment,
        "files": [],
        "owner": "root@pam",
    });
    if let Some(state) = verify {
        entry["verification"] = json!({ "state": state, "upid": "UPID:pbs:verify" });
    }
    entry
}

pub struct Fixtures;

impl Fixtures {
    /// `(store, total, used, avail)` per datastore
    pub fn datastore_usage(stores: &[(&str, u64, u64, u64)]) -> Value {
        let data: Vec<Value> = stores
            .iter()
            .map(|(store, total, used, avail)| {
                json!({
                    "store": store,
                    "total": total,
                    "used": used,
                    "avail": avail,
                    "gc-status": {},
                })
            })
            .collect();
        json!({ "data": data })
    }

    pub fn namespaces(names: &[&str]) -> Value {
        let data: Vec<Value> = names.iter().map(|ns| json!({ "ns": ns })).collect();
        json!({ "data": data })
    }

    pub fn snapshots(entries: Vec<Value>) -> Value {
        json!({ "data": entries })
    }

    pub fn node_status(loadavg: &[f64]) -> Value {
        json!({
            "data": {
                "cpu": 0.12,
                "wait": 0.03,
                "uptime": 86400,
                "loadavg": loadavg,
                "memory": { "free": 6_000_000_000u64, "total": 16_000_000_000u64, "used": 10_000_000_000u64 },
                "swap": { "free": 1_000_000_000u64, "total": 2_000_000_000u64, "used": 1_000_000_000u64 },
                "root": { "avail": 40_000_000_000u64, "total": 100_000_000_000u64, "used": 60_000_000_000u64 },
                "kversion": "Linux 6.8.12-pve",
            }
        })
    }

    /// PBS error body for a datastore under removal
    pub fn being_deleted() -> Value {
        json!({ "data": null, "message": "Datastore is being deleted\n" })
    }
}
