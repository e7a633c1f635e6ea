use super::IUserFilterRepo;
use crate::repos::shared::inmemory_repo::*;
use classwatch_domain::{UserFilter, ID};

pub struct InMemoryUserFilterRepo {
    filters: std::sync::Mutex<Vec<UserFilter>>,
}

impl InMemoryUserFilterRepo {
    pub fn new() -> Self {
        Self {
            filters: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IUserFilterRepo for InMemoryUserFilterRepo {
    async fn insert(&self, filter: &UserFilter) -> anyhow::Result<()> {
        insert(filter, &self.filters);
        Ok(())
    }

    async fn find(&self, filter_id: &ID) -> Option<UserFilter> {
        find(filter_id, &self.filters)
    }

    async fn find_by_user(&self, user_id: &ID) -> Vec<UserFilter> {
        find_by(&self.filters, |filter| filter.user_id == *user_id)
    }

    async fn delete(&self, filter_id: &ID) -> Option<UserFilter> {
        delete(filter_id, &self.filters)
    }
}
