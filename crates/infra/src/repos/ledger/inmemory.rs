use super::ILedgerRepo;
use crate::repos::shared::repo::DeleteResult;
use classwatch_domain::{LedgerEntry, ID};
use std::sync::Mutex;

pub struct InMemoryLedgerRepo {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryLedgerRepo {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl ILedgerRepo for InMemoryLedgerRepo {
    async fn is_new(&self, user_id: &ID, instance_key: &str) -> anyhow::Result<bool> {
        let entries = self.entries.lock().unwrap();
        Ok(!entries
            .iter()
            .any(|e| e.user_id == *user_id && e.instance_key == instance_key))
    }

    async fn commit(&self, entry: &LedgerEntry) -> anyhow::Result<bool> {
        // Check and insert under a single guard: first writer wins
        let mut entries = self.entries.lock().unwrap();
        if entries
            .iter()
            .any(|e| e.user_id == entry.user_id && e.instance_key == entry.instance_key)
        {
            return Ok(false);
        }
        entries.push(entry.clone());
        Ok(true)
    }

    async fn clear(&self, user_id: &ID, instance_key: &str) -> Option<LedgerEntry> {
        let mut entries = self.entries.lock().unwrap();
        let pos = entries
            .iter()
            .position(|e| e.user_id == *user_id && e.instance_key == instance_key)?;
        Some(entries.remove(pos))
    }

    async fn clear_user(&self, user_id: &ID) -> anyhow::Result<DeleteResult> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.user_id != *user_id);
        Ok(DeleteResult {
            deleted_count: (before - entries.len()) as i64,
        })
    }

    async fn delete_all_before(&self, instance_start_before: i64) -> Vec<LedgerEntry> {
        let mut entries = self.entries.lock().unwrap();
        let (expired, kept): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|e| e.instance_start_ts <= instance_start_before);
        *entries = kept;
        expired
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(user_id: &ID, instance_key: &str, instance_start_ts: i64) -> LedgerEntry {
        LedgerEntry {
            user_id: user_id.clone(),
            instance_key: instance_key.into(),
            sent_at: 1000,
            instance_start_ts,
        }
    }

    #[tokio::test]
    async fn commit_is_first_writer_wins() {
        let repo = InMemoryLedgerRepo::new();
        let user = ID::new();
        assert!(repo.is_new(&user, "cls-1").await.unwrap());
        assert!(repo.commit(&entry(&user, "cls-1", 10)).await.unwrap());
        assert!(!repo.commit(&entry(&user, "cls-1", 10)).await.unwrap());
        assert!(!repo.is_new(&user, "cls-1").await.unwrap());
    }

    #[tokio::test]
    async fn pairs_are_scoped_per_user() {
        let repo = InMemoryLedgerRepo::new();
        let alice = ID::new();
        let bob = ID::new();
        assert!(repo.commit(&entry(&alice, "cls-1", 10)).await.unwrap());
        assert!(repo.is_new(&bob, "cls-1").await.unwrap());
    }

    #[tokio::test]
    async fn clear_forgets_a_single_pair() {
        let repo = InMemoryLedgerRepo::new();
        let user = ID::new();
        repo.commit(&entry(&user, "cls-1", 10)).await.unwrap();
        repo.commit(&entry(&user, "cls-2", 10)).await.unwrap();

        assert!(repo.clear(&user, "cls-1").await.is_some());
        assert!(repo.clear(&user, "cls-1").await.is_none());
        assert!(repo.is_new(&user, "cls-1").await.unwrap());
        assert!(!repo.is_new(&user, "cls-2").await.unwrap());
    }

    #[tokio::test]
    async fn clear_user_resets_only_that_user() {
        let repo = InMemoryLedgerRepo::new();
        let alice = ID::new();
        let bob = ID::new();
        repo.commit(&entry(&alice, "cls-1", 10)).await.unwrap();
        repo.commit(&entry(&alice, "cls-2", 10)).await.unwrap();
        repo.commit(&entry(&bob, "cls-1", 10)).await.unwrap();

        let res = repo.clear_user(&alice).await.unwrap();
        assert_eq!(res.deleted_count, 2);
        assert!(repo.is_new(&alice, "cls-1").await.unwrap());
        assert!(!repo.is_new(&bob, "cls-1").await.unwrap());
    }

    #[tokio::test]
    async fn retention_pass_removes_only_past_classes() {
        let repo = InMemoryLedgerRepo::new();
        let user = ID::new();
        repo.commit(&entry(&user, "past", 100)).await.unwrap();
        repo.commit(&entry(&user, "upcoming", 5000)).await.unwrap();

        let expired = repo.delete_all_before(1000).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].instance_key, "past");
        assert!(repo.is_new(&user, "past").await.unwrap());
        assert!(!repo.is_new(&user, "upcoming").await.unwrap());
    }
}
