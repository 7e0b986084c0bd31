use crate::constants::indexes;
use crate::store::StoredRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live push connection observing one tenant (restaurant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub connection_id: String,
    #[serde(alias = "restaurantId")]
    pub tenant_id: String,
    pub connected_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn new(connection_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            tenant_id: tenant_id.into(),
            connected_at: Utc::now(),
        }
    }
}

impl StoredRecord for Subscriber {
    fn key(&self) -> &str {
        &self.connection_id
    }

    fn index_value(&self, index_name: &str) -> Option<String> {
        (index_name == indexes::TENANT_ID).then(|| self.tenant_id.clone())
    }
}
