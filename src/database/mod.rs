//! # Storage
//!
//! Projects, stocks, their equipment lines and user accounts.
//!
//! Two backends behind one [`Repository`] trait:
//! - Redis when `REDIS_URL` is set, records kept as JSON inside hashes
//! - In-memory maps otherwise (local runs and tests), nothing survives a restart
//!
//! ## Versioning
//!
//! Every record carries a `version`. [`Repository::save`] only writes when the stored version still
//! matches the one the caller read, and bumps it. Two racing updates can therefore never both act
//! on the same snapshot, which is what decides whether a stage-2 notification fires.
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Aggregate, Kind, LineItem, ListQuery, Page, User},
};

pub mod memory;
pub mod redis;

pub use self::memory::MemoryRepository;
pub use self::redis::RedisRepository;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn get(&self, kind: Kind, id: Uuid) -> Result<Option<Aggregate>, AppError>;

    async fn list(&self, kind: Kind, query: &ListQuery) -> Result<Page<Aggregate>, AppError>;

    async fn insert(&self, aggregate: &Aggregate) -> Result<(), AppError>;

    /// Writes `aggregate` with `version = expected_version + 1` if the stored
    /// copy is still at `expected_version`. False when it moved on or is gone.
    async fn save(&self, aggregate: &Aggregate, expected_version: u64) -> Result<bool, AppError>;

    /// Removes the record and its line items. False when nothing was there.
    async fn delete(&self, kind: Kind, id: Uuid) -> Result<bool, AppError>;

    async fn line_items(&self, kind: Kind, parent_id: Uuid) -> Result<Vec<LineItem>, AppError>;

    async fn insert_line_items(&self, items: &[LineItem]) -> Result<(), AppError>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError>;

    async fn count_admins(&self) -> Result<usize, AppError>;
}
