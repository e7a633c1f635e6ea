use super::ICatalogRepo;
use classwatch_domain::{CatalogDimension, CatalogSnapshot};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct InMemoryCatalogRepo {
    snapshots: Mutex<HashMap<CatalogDimension, CatalogSnapshot>>,
}

impl InMemoryCatalogRepo {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl ICatalogRepo for InMemoryCatalogRepo {
    async fn save(&self, snapshot: &CatalogSnapshot) -> anyhow::Result<()> {
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.insert(snapshot.dimension, snapshot.clone());
        Ok(())
    }

    async fn find(&self, dimension: CatalogDimension) -> Option<CatalogSnapshot> {
        let snapshots = self.snapshots.lock().unwrap();
        snapshots.get(&dimension).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use classwatch_domain::CatalogEntry;

    #[tokio::test]
    async fn save_replaces_the_previous_snapshot() {
        let repo = InMemoryCatalogRepo::new();
        assert!(repo.find(CatalogDimension::Clubs).await.is_none());

        let first = CatalogSnapshot {
            dimension: CatalogDimension::Clubs,
            entries: vec![CatalogEntry {
                id: "7".into(),
                name: "Bemowo".into(),
            }],
            refreshed_at: 100,
        };
        repo.save(&first).await.unwrap();
        assert_eq!(repo.find(CatalogDimension::Clubs).await, Some(first));

        let second = CatalogSnapshot {
            dimension: CatalogDimension::Clubs,
            entries: vec![],
            refreshed_at: 200,
        };
        repo.save(&second).await.unwrap();
        assert_eq!(repo.find(CatalogDimension::Clubs).await, Some(second));
    }
}
