//! In-process token store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{StoreError, TokenStore};

#[derive(Debug)]
struct Record {
    token: String,
    expires_at: Option<Instant>,
}

impl Record {
    fn is_alive(&self) -> bool {
        self.expires_at.is_none_or(|at| at > Instant::now())
    }
}

#[derive(Debug, Default)]
struct Records {
    by_identity: HashMap<String, Record>,
    /// Active token to its identity.
    owners: HashMap<String, String>,
}

impl Records {
    fn remove(&mut self, identity: &str) -> Option<Record> {
        let record = self.by_identity.remove(identity)?;
        self.owners.remove(&record.token);
        Some(record)
    }

    fn purge_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .by_identity
            .iter()
            .filter(|(_, record)| !record.is_alive())
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in &expired {
            self.remove(identity);
        }
        expired.len()
    }
}

/// Token store kept in memory, lost on restart.
///
/// Suited to a single instance and to tests. Expired records are hidden
/// right away and dropped by [`MemoryStore::purge_expired`], which
/// [`MemoryStore::spawn_cleanup`] runs periodically.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Records>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.records
            .read()
            .await
            .by_identity
            .values()
            .filter(|record| record.is_alive())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired records, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.records.write().await.purge_expired()
    }

    /// Purge expired records every `period` until the store is dropped.
    pub fn spawn_cleanup(&self, period: Duration) -> JoinHandle<()> {
        let records = Arc::downgrade(&self.records);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let Some(records) = records.upgrade() else {
                    break;
                };

                let purged = records.write().await.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired refresh tokens dropped");
                }
            }
        })
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn has_token(&self, identity: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .by_identity
            .get(identity)
            .is_some_and(Record::is_alive))
    }

    async fn get_token(
        &self,
        identity: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .by_identity
            .get(identity)
            .filter(|record| record.is_alive())
            .map(|record| record.token.clone()))
    }

    async fn set_token(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let mut records = self.records.write().await;

        records.remove(identity);
        // a token moving to another identity leaves no record behind.
        if let Some(owner) = records.owners.get(token).cloned() {
            records.remove(&owner);
        }

        records.owners.insert(token.to_owned(), identity.to_owned());
        records.by_identity.insert(
            identity.to_owned(),
            Record {
                token: token.to_owned(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let identity = records
            .owners
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        match records.remove(&identity) {
            Some(record) if record.is_alive() => Ok(()),
            _ => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_token() {
        let store = MemoryStore::new();
        store.set_token("art", "vandelay", TTL).await.unwrap();

        assert!(store.has_token("art").await.unwrap());
        assert!(!store.has_token("obrien-murphy").await.unwrap());
        assert_eq!(
            store.get_token("art").await.unwrap().as_deref(),
            Some("vandelay")
        );
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = MemoryStore::new();
        store.set_token("art", "vandelay", TTL).await.unwrap();
        store.set_token("art", "industries", TTL).await.unwrap();

        assert_eq!(
            store.get_token("art").await.unwrap().as_deref(),
            Some("industries")
        );
        assert_eq!(store.len().await, 1);

        // the replaced value is no longer a record.
        assert!(matches!(
            store.delete_token("vandelay").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_token() {
        let store = MemoryStore::new();
        store.set_token("art", "vandelay", TTL).await.unwrap();
        store.delete_token("vandelay").await.unwrap();

        assert!(!store.has_token("art").await.unwrap());
        assert!(matches!(
            store.delete_token("vandelay").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expiration() {
        let store = MemoryStore::new();
        store
            .set_token("art", "vandelay", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(store.has_token("art").await.unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!store.has_token("art").await.unwrap());
        assert!(store.get_token("art").await.unwrap().is_none());
        assert!(matches!(
            store.delete_token("vandelay").await,
            Err(StoreError::NotFound)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = MemoryStore::new();
        store.set_token("art", "vandelay", Duration::ZERO).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.has_token("art").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store
            .set_token("art", "vandelay", Duration::from_millis(20))
            .await
            .unwrap();
        store.set_token("sofia", "kovalevskaya", TTL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.purge_expired().await, 0);
        {
            let records = store.records.read().await;
            assert_eq!(records.by_identity.len(), 1);
            assert!(!records.owners.contains_key("vandelay"));
        }
        store.delete_token("kovalevskaya").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_task() {
        let store = MemoryStore::new();
        store
            .set_token("art", "vandelay", Duration::from_millis(10))
            .await
            .unwrap();
        let cleanup = store.spawn_cleanup(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.records.read().await.by_identity.is_empty());

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), cleanup)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_index_follows_overwrite() {
        let store = MemoryStore::new();
        store.set_token("art", "vandelay", TTL).await.unwrap();
        store.set_token("art", "industries", TTL).await.unwrap();

        let records = store.records.read().await;
        assert_eq!(records.owners.len(), 1);
        assert_eq!(
            records.owners.get("industries").map(String::as_str),
            Some("art")
        );
    }
}
