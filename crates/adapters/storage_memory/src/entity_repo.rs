//! In-memory implementation of [`EntityRepository`].

use std::future::Future;

use entigate_app::ports::EntityRepository;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::EntityId;

use crate::{MemoryStorage, read, write};

impl EntityRepository for MemoryStorage {
    fn save_entity(
        &self,
        entity: Entity,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        write(&self.entities).insert(entity.id.clone(), entity);
        async { Ok(()) }
    }

    fn load_entities(&self) -> impl Future<Output = Result<Vec<Entity>, GatewayError>> + Send {
        let entities: Vec<Entity> = read(&self.entities).values().cloned().collect();
        async { Ok(entities) }
    }

    fn delete_entity(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        write(&self.entities).remove(&id);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigate_domain::entity::SyncStatus;
    use serde_json::json;

    fn entity(id: &str) -> Entity {
        Entity::builder()
            .id(id)
            .device_id("dev1")
            .domain("switch")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_keep_state_triple() {
        let storage = MemoryStorage::new();
        let mut stored = entity("e1");
        stored.data.desired = Some(json!({"on": true}));
        stored.data.sync_status = SyncStatus::Pending;
        storage.save_entity(stored.clone()).await.unwrap();

        let loaded = storage.load_entities().await.unwrap();
        assert_eq!(loaded, vec![stored]);
    }

    #[tokio::test]
    async fn should_delete_entity() {
        let storage = MemoryStorage::new();
        storage.save_entity(entity("e1")).await.unwrap();
        storage.save_entity(entity("e2")).await.unwrap();
        storage.delete_entity(EntityId::from("e1")).await.unwrap();

        let loaded = storage.load_entities().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, EntityId::from("e2"));
    }
}
