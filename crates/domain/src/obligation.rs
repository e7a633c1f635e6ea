use crate::class_instance::ClassInstance;
use crate::shared::entity::ID;
use std::cmp::Ordering;

/// The unit of work carried from matching into dispatch: one user to be
/// notified about one matched class instance, tagged with the filter that
/// produced the match. Obligations are rebuilt fresh every cycle and never
/// persisted; the notification ledger decides which of them are still owed.
#[derive(Debug, Clone)]
pub struct NotificationObligation {
    pub user_id: ID,
    pub filter_id: ID,
    pub instance: ClassInstance,
}

impl NotificationObligation {
    pub fn new(user_id: ID, filter_id: ID, instance: ClassInstance) -> Self {
        Self {
            user_id,
            filter_id,
            instance,
        }
    }

    /// The ledger key for this obligation
    pub fn instance_key(&self) -> &str {
        &self.instance.external_id
    }
}

impl PartialEq for NotificationObligation {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
            && self.filter_id == other.filter_id
            && self.instance.external_id == other.instance.external_id
    }
}

impl Eq for NotificationObligation {}

/// Stable dispatch order: user, then filter, then class start, then natural
/// key as the final tiebreak. Keeps dispatch deterministic and testable.
impl Ord for NotificationObligation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_id
            .cmp(&other.user_id)
            .then_with(|| self.filter_id.cmp(&other.filter_id))
            .then_with(|| self.instance.start_ts.cmp(&other.instance.start_ts))
            .then_with(|| self.instance.external_id.cmp(&other.instance.external_id))
    }
}

impl PartialOrd for NotificationObligation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
