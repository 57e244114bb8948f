use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::AppError,
    models::{Aggregate, Kind, LineItem, ListQuery, Page, Role, User},
};

#[derive(Default)]
pub struct MemoryRepository {
    aggregates: RwLock<HashMap<(Kind, Uuid), Aggregate>>,
    line_items: RwLock<HashMap<(Kind, Uuid), Vec<LineItem>>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get(&self, kind: Kind, id: Uuid) -> Result<Option<Aggregate>, AppError> {
        Ok(self.aggregates.read().await.get(&(kind, id)).cloned())
    }

    async fn list(&self, kind: Kind, query: &ListQuery) -> Result<Page<Aggregate>, AppError> {
        let aggregates = self.aggregates.read().await;

        Ok(query.paginate(
            aggregates
                .values()
                .filter(|aggregate| aggregate.kind == kind)
                .cloned(),
        ))
    }

    async fn insert(&self, aggregate: &Aggregate) -> Result<(), AppError> {
        self.aggregates
            .write()
            .await
            .insert((aggregate.kind, aggregate.id), aggregate.clone());
        Ok(())
    }

    async fn save(&self, aggregate: &Aggregate, expected_version: u64) -> Result<bool, AppError> {
        let mut aggregates = self.aggregates.write().await;

        match aggregates.get_mut(&(aggregate.kind, aggregate.id)) {
            Some(stored) if stored.version == expected_version => {
                *stored = Aggregate {
                    version: expected_version + 1,
                    ..aggregate.clone()
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, kind: Kind, id: Uuid) -> Result<bool, AppError> {
        let removed = self.aggregates.write().await.remove(&(kind, id)).is_some();
        self.line_items.write().await.remove(&(kind, id));

        Ok(removed)
    }

    async fn line_items(&self, kind: Kind, parent_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        Ok(self
            .line_items
            .read()
            .await
            .get(&(kind, parent_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_line_items(&self, items: &[LineItem]) -> Result<(), AppError> {
        let mut line_items = self.line_items.write().await;

        for item in items {
            line_items
                .entry((item.kind, item.parent_id))
                .or_default()
                .push(item.clone());
        }

        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;

        if users.values().any(|existing| existing.username == user.username) {
            return Err(AppError::MalformedPayload(format!(
                "username {} is taken",
                user.username
            )));
        }

        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn count_admins(&self) -> Result<usize, AppError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.role == Role::Admin)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{AggregateDraft, LineItemBatch, LineItemDraft};

    fn stock() -> Aggregate {
        AggregateDraft {
            name: "Spare switches".to_string(),
            contact_name: "Jane".to_string(),
            ..Default::default()
        }
        .into_aggregate(Kind::Stock, Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_compares_versions() {
        let repository = MemoryRepository::new();
        let aggregate = stock();
        repository.insert(&aggregate).await.unwrap();

        let mut renamed = aggregate.clone();
        renamed.name = "Renamed".to_string();
        assert!(repository.save(&renamed, 0).await.unwrap());

        let stored = repository.get(Kind::Stock, aggregate.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.name, "Renamed");

        // stale writer still holding version 0
        assert!(!repository.save(&aggregate, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_kinds_are_separate() {
        let repository = MemoryRepository::new();
        let aggregate = stock();
        repository.insert(&aggregate).await.unwrap();

        assert!(repository.get(Kind::Project, aggregate.id).await.unwrap().is_none());
        assert_eq!(
            repository
                .list(Kind::Project, &ListQuery::default())
                .await
                .unwrap()
                .total,
            0
        );
    }

    #[tokio::test]
    async fn test_delete_takes_line_items_along() {
        let repository = MemoryRepository::new();
        let aggregate = stock();
        repository.insert(&aggregate).await.unwrap();

        let items = LineItemBatch {
            equipments: vec![LineItemDraft {
                part_number: "SFP-10G".to_string(),
                quantity: 2,
                description: String::new(),
            }],
        }
        .into_items(Kind::Stock, aggregate.id, Utc::now())
        .unwrap();
        repository.insert_line_items(&items).await.unwrap();
        assert_eq!(repository.line_items(Kind::Stock, aggregate.id).await.unwrap().len(), 1);

        assert!(repository.delete(Kind::Stock, aggregate.id).await.unwrap());
        assert!(repository.line_items(Kind::Stock, aggregate.id).await.unwrap().is_empty());
        assert!(!repository.delete(Kind::Stock, aggregate.id).await.unwrap());
    }
}
