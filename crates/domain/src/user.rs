use crate::shared::entity::{Entity, ID};
use serde::{Deserialize, Serialize};

/// Someone the monitor checks classes for. Created and maintained by the
/// external command interface; the monitoring core only reads the active set.
/// Credentials for the upstream portal live with the external credential
/// collaborator and are looked up by `upstream_login`, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: ID,
    /// Opaque routing handle the delivery channel sends notifications to,
    /// e.g. a chat id
    pub delivery_address: String,
    /// Login identifying this user towards the upstream portal
    pub upstream_login: String,
}

impl User {
    pub fn new(delivery_address: &str, upstream_login: &str) -> Self {
        Self {
            id: Default::default(),
            delivery_address: delivery_address.to_string(),
            upstream_login: upstream_login.to_string(),
        }
    }
}

impl Entity for User {
    fn id(&self) -> &ID {
        &self.id
    }
}
