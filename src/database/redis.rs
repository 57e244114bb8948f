//! # Redis
//!
//! Durable backend.
//!
//! ## Layout
//!
//! - `procure:{kind}` hash: record id -> record JSON
//! - `procure:{kind}:version` hash: record id -> version, checked by the save script
//! - `procure:{kind}:items:{id}` list: equipment line JSON in insertion order
//! - `procure:users` hash: user id -> user JSON
//! - `procure:usernames` hash: username -> user id, `HSETNX` keeps names unique
//!
//! Listing reads the whole hash and filters in process. Record counts stay in the low thousands so
//! this is cheaper than maintaining secondary indexes.
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
    pipe,
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::Repository;
use crate::{
    error::AppError,
    models::{Aggregate, Kind, LineItem, ListQuery, Page, Role, User},
};

const USERS: &str = "procure:users";
const USERNAMES: &str = "procure:usernames";

/// KEYS[1] record hash, KEYS[2] version hash.
/// ARGV[1] id, ARGV[2] expected version, ARGV[3] record JSON, ARGV[4] new version.
const SAVE_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[2], ARGV[1])
if not current or current ~= ARGV[2] then
    return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
redis.call('HSET', KEYS[2], ARGV[1], ARGV[4])
return 1
";

pub struct RedisRepository {
    connection: ConnectionManager,
    save_script: Script,
}

impl RedisRepository {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self {
            connection,
            save_script: Script::new(SAVE_SCRIPT),
        })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn records_key(kind: Kind) -> String {
    format!("procure:{kind}")
}

fn versions_key(kind: Kind) -> String {
    format!("procure:{kind}:version")
}

fn items_key(kind: Kind, parent_id: Uuid) -> String {
    format!("procure:{kind}:items:{parent_id}")
}

fn encode<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| AppError::InternalError(Box::new(e)))
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    serde_json::from_str(raw).map_err(|e| AppError::InternalError(Box::new(e)))
}

#[async_trait]
impl Repository for RedisRepository {
    async fn get(&self, kind: Kind, id: Uuid) -> Result<Option<Aggregate>, AppError> {
        let raw: Option<String> = self
            .connection()
            .hget(records_key(kind), id.to_string())
            .await?;

        raw.as_deref().map(decode).transpose()
    }

    async fn list(&self, kind: Kind, query: &ListQuery) -> Result<Page<Aggregate>, AppError> {
        let raw: Vec<String> = self.connection().hvals(records_key(kind)).await?;

        let aggregates = raw
            .iter()
            .map(|record| decode::<Aggregate>(record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(query.paginate(aggregates))
    }

    async fn insert(&self, aggregate: &Aggregate) -> Result<(), AppError> {
        let id = aggregate.id.to_string();

        let () = pipe()
            .atomic()
            .hset(records_key(aggregate.kind), &id, encode(aggregate)?)
            .ignore()
            .hset(versions_key(aggregate.kind), &id, aggregate.version)
            .ignore()
            .query_async(&mut self.connection())
            .await?;

        Ok(())
    }

    async fn save(&self, aggregate: &Aggregate, expected_version: u64) -> Result<bool, AppError> {
        let next_version = expected_version + 1;
        let stored = Aggregate {
            version: next_version,
            ..aggregate.clone()
        };

        let written: i32 = self
            .save_script
            .key(records_key(aggregate.kind))
            .key(versions_key(aggregate.kind))
            .arg(aggregate.id.to_string())
            .arg(expected_version)
            .arg(encode(&stored)?)
            .arg(next_version)
            .invoke_async(&mut self.connection())
            .await?;

        Ok(written == 1)
    }

    async fn delete(&self, kind: Kind, id: Uuid) -> Result<bool, AppError> {
        let id_field = id.to_string();

        let (removed, _, _): (i64, i64, i64) = pipe()
            .atomic()
            .hdel(records_key(kind), &id_field)
            .hdel(versions_key(kind), &id_field)
            .del(items_key(kind, id))
            .query_async(&mut self.connection())
            .await?;

        Ok(removed > 0)
    }

    async fn line_items(&self, kind: Kind, parent_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let raw: Vec<String> = self
            .connection()
            .lrange(items_key(kind, parent_id), 0, -1)
            .await?;

        raw.iter().map(|item| decode(item)).collect()
    }

    async fn insert_line_items(&self, items: &[LineItem]) -> Result<(), AppError> {
        let mut pipeline = pipe();
        pipeline.atomic();

        for item in items {
            pipeline
                .rpush(items_key(item.kind, item.parent_id), encode(item)?)
                .ignore();
        }

        let () = pipeline.query_async(&mut self.connection()).await?;
        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let mut connection = self.connection();

        let id: Option<String> = connection.hget(USERNAMES, username).await?;
        let Some(id) = id else {
            return Ok(None);
        };

        let raw: Option<String> = connection.hget(USERS, id).await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut connection = self.connection();

        let claimed: bool = connection
            .hset_nx(USERNAMES, &user.username, user.id.to_string())
            .await?;
        if !claimed {
            return Err(AppError::MalformedPayload(format!(
                "username {} is taken",
                user.username
            )));
        }

        let () = connection
            .hset(USERS, user.id.to_string(), encode(user)?)
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let raw: Vec<String> = self.connection().hvals(USERS).await?;

        let mut users = raw
            .iter()
            .map(|user| decode::<User>(user))
            .collect::<Result<Vec<_>, _>>()?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let mut connection = self.connection();

        let raw: Option<String> = connection.hget(USERS, id.to_string()).await?;
        let Some(raw) = raw else {
            return Ok(false);
        };
        let user: User = decode(&raw)?;

        let () = pipe()
            .atomic()
            .hdel(USERS, id.to_string())
            .ignore()
            .hdel(USERNAMES, &user.username)
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(true)
    }

    async fn count_admins(&self) -> Result<usize, AppError> {
        Ok(self
            .list_users()
            .await?
            .iter()
            .filter(|user| user.role == Role::Admin)
            .count())
    }
}
