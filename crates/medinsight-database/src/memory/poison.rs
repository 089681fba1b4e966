use async_trait::async_trait;
use chrono::{DateTime, Utc};

use medinsight_core::types::{PageRequest, PageResponse, PoisonMessageId};
use medinsight_core::{AppError, AppResult};
use medinsight_entity::dead_letter::PoisonMessage;

use super::MemoryStore;
use crate::store::PoisonMessageStore;

#[async_trait]
impl PoisonMessageStore for MemoryStore {
    async fn insert(&self, message: &PoisonMessage) -> AppResult<()> {
        self.poison.insert(message.id, message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PoisonMessageId) -> AppResult<Option<PoisonMessage>> {
        Ok(self.poison.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<PoisonMessage>> {
        let mut all: Vec<PoisonMessage> =
            self.poison.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| b.quarantined_at.cmp(&a.quarantined_at));
        Ok(PageResponse::from_vec(all, page))
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.poison.len() as u64)
    }

    async fn mark_replayed(&self, id: PoisonMessageId, at: DateTime<Utc>) -> AppResult<bool> {
        let mut entry = self
            .poison
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Poison message {id} not found")))?;
        if entry.replayed_at.is_some() {
            return Ok(false);
        }
        entry.replayed_at = Some(at);
        Ok(true)
    }

    async fn clear_replayed(&self, id: PoisonMessageId) -> AppResult<()> {
        if let Some(mut entry) = self.poison.get_mut(&id) {
            entry.replayed_at = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarantined() -> PoisonMessage {
        PoisonMessage {
            id: PoisonMessageId::new(),
            source_topic: "audit-events".into(),
            source_partition: 0,
            source_offset: 9,
            message_key: None,
            payload: b"{".to_vec(),
            error: "dlq down".into(),
            attempts: 3,
            quarantined_at: Utc::now(),
            replayed_at: None,
        }
    }

    #[tokio::test]
    async fn test_mark_replayed_claims_once() {
        let store = MemoryStore::new();
        let message = quarantined();
        PoisonMessageStore::insert(&store, &message).await.unwrap();

        assert!(PoisonMessageStore::mark_replayed(&store, message.id, Utc::now()).await.unwrap());
        assert!(!PoisonMessageStore::mark_replayed(&store, message.id, Utc::now()).await.unwrap());

        PoisonMessageStore::clear_replayed(&store, message.id).await.unwrap();
        assert!(PoisonMessageStore::mark_replayed(&store, message.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_replayed_unknown_id() {
        let store = MemoryStore::new();
        let err = PoisonMessageStore::mark_replayed(&store, PoisonMessageId::new(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind, medinsight_core::error::ErrorKind::NotFound);
    }
}
