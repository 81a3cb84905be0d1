//! Per-VM folding of a namespace's snapshot list

use crate::models::{SnapshotRecord, VerificationState};
use std::collections::BTreeMap;

/// Everything emitted for one backup-id within a (datastore, namespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntityAggregate {
    pub count: u64,
    pub display_name: String,
    pub latest_timestamp: i64,
    pub latest_verification: VerificationState,
}

/// Single pass over `records`, keyed by backup-id in ascending order.
///
/// The display name is the last one seen for an id. The latest snapshot is
/// the first record holding the maximal backup time: a later record only
/// replaces it when strictly newer, so equal timestamps keep the earlier
/// record's verification state.
pub fn aggregate(records: &[SnapshotRecord]) -> BTreeMap<String, BackupEntityAggregate> {
    let mut entities: BTreeMap<String, BackupEntityAggregate> = BTreeMap::new();

    for record in records {
        match entities.get_mut(&record.backup_id) {
            Some(entity) => {
                entity.count += 1;
                entity.display_name.clone_from(&record.comment);
                if record.backup_time > entity.latest_timestamp {
                    entity.latest_timestamp = record.backup_time;
                    entity.latest_verification = record.verification.clone();
                }
            }
            None => {
                entities.insert(
                    record.backup_id.clone(),
                    BackupEntityAggregate {
                        count: 1,
                        display_name: record.comment.clone(),
                        latest_timestamp: record.backup_time,
                        latest_verification: record.verification.clone(),
                    },
                );
            }
        }
    }

    entities
}
