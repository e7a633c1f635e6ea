use crate::shared::entity::ID;
use serde::{Deserialize, Serialize};

/// Durable record that a notification for (user, class instance) was
/// accepted by the delivery channel. Existence of the entry is what makes
/// delivery at-most-once: an instance whose free spots flap back open never
/// notifies again, because the key is the instance's natural key alone.
///
/// Entries are written only after a confirmed dispatch and removed only by
/// the explicit clear escape hatch or the retention cleanup pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: ID,
    pub instance_key: String,
    /// When the delivery channel accepted the notification, millis UTC
    pub sent_at: i64,
    /// Start of the class the entry refers to. Retention cleanup is keyed on
    /// this, so an entry cannot expire while its class is still upcoming.
    pub instance_start_ts: i64,
}
