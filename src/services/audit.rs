//! Resolution of audit fields (`added_by`, `created_by`) to account summaries

use std::collections::HashMap;

use uuid::Uuid;

use crate::{error::AppResult, models::UserSummary, repository::Repository};

/// Account summaries loaded in one batch
pub struct AuditUsers(HashMap<Uuid, UserSummary>);

impl AuditUsers {
    pub async fn load<I>(repository: &Repository, ids: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let users: HashMap<Uuid, UserSummary> = repository
            .users
            .get_summaries(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let missing = ids.len().saturating_sub(users.len());
        if missing > 0 {
            tracing::debug!(missing, "Audit fields refer to removed accounts");
        }

        Ok(Self(users))
    }

    /// Summary for `id`, or a placeholder when the account is gone
    pub fn get(&self, id: Uuid) -> UserSummary {
        self.0.get(&id).cloned().unwrap_or_else(|| UserSummary::unknown(id))
    }
}
