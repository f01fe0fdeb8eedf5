pub mod memory;
pub mod upstash;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::dao::storage::{StorageError, StorageResult};

/// Redis-flavoured command understood by every [`KvStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvCommand {
    Get {
        key: String,
    },
    /// Plain `SET`; a `None` ttl clears any previous expiry.
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Del {
        keys: Vec<String>,
    },
    HSet {
        key: String,
        field: String,
        value: String,
    },
    HGet {
        key: String,
        field: String,
    },
    HGetAll {
        key: String,
    },
    HIncrBy {
        key: String,
        field: String,
        delta: i64,
    },
    HLen {
        key: String,
    },
    RPush {
        key: String,
        values: Vec<String>,
    },
    LRange {
        key: String,
        start: i64,
        stop: i64,
    },
    SAdd {
        key: String,
        members: Vec<String>,
    },
    SMembers {
        key: String,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
    Ping,
}

impl KvCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            KvCommand::Get { .. } => "GET",
            KvCommand::Set { .. } => "SET",
            KvCommand::Del { .. } => "DEL",
            KvCommand::HSet { .. } => "HSET",
            KvCommand::HGet { .. } => "HGET",
            KvCommand::HGetAll { .. } => "HGETALL",
            KvCommand::HIncrBy { .. } => "HINCRBY",
            KvCommand::HLen { .. } => "HLEN",
            KvCommand::RPush { .. } => "RPUSH",
            KvCommand::LRange { .. } => "LRANGE",
            KvCommand::SAdd { .. } => "SADD",
            KvCommand::SMembers { .. } => "SMEMBERS",
            KvCommand::Expire { .. } => "EXPIRE",
            KvCommand::Ping => "PING",
        }
    }

    /// Flatten the command into its Redis argument vector, name first.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string()];
        match self {
            KvCommand::Get { key } | KvCommand::HGetAll { key } | KvCommand::HLen { key } => {
                args.push(key.clone());
            }
            KvCommand::SMembers { key } => args.push(key.clone()),
            KvCommand::Set { key, value, ttl } => {
                args.push(key.clone());
                args.push(value.clone());
                if let Some(ttl) = ttl {
                    args.push("EX".into());
                    args.push(ttl_secs(*ttl).to_string());
                }
            }
            KvCommand::Del { keys } => args.extend(keys.iter().cloned()),
            KvCommand::HSet { key, field, value } => {
                args.extend([key.clone(), field.clone(), value.clone()]);
            }
            KvCommand::HGet { key, field } => args.extend([key.clone(), field.clone()]),
            KvCommand::HIncrBy { key, field, delta } => {
                args.extend([key.clone(), field.clone(), delta.to_string()]);
            }
            KvCommand::RPush { key, values } => {
                args.push(key.clone());
                args.extend(values.iter().cloned());
            }
            KvCommand::LRange { key, start, stop } => {
                args.extend([key.clone(), start.to_string(), stop.to_string()]);
            }
            KvCommand::SAdd { key, members } => {
                args.push(key.clone());
                args.extend(members.iter().cloned());
            }
            KvCommand::Expire { key, ttl } => {
                args.extend([key.clone(), ttl_secs(*ttl).to_string()]);
            }
            KvCommand::Ping => {}
        }
        args
    }
}

/// Expiries travel in whole seconds; anything shorter rounds up to one.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Reply produced by a backend for a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvReply {
    Nil,
    Int(i64),
    Text(String),
    Array(Vec<KvReply>),
}

impl KvReply {
    pub(crate) fn into_text(self, command: &'static str) -> StorageResult<Option<String>> {
        match self {
            KvReply::Nil => Ok(None),
            KvReply::Text(text) => Ok(Some(text)),
            KvReply::Int(value) => Ok(Some(value.to_string())),
            KvReply::Array(_) => Err(StorageError::UnexpectedReply { command }),
        }
    }

    pub(crate) fn into_int(self, command: &'static str) -> StorageResult<i64> {
        match self {
            KvReply::Int(value) => Ok(value),
            KvReply::Text(text) => text
                .parse()
                .map_err(|_| StorageError::UnexpectedReply { command }),
            _ => Err(StorageError::UnexpectedReply { command }),
        }
    }

    pub(crate) fn into_strings(self, command: &'static str) -> StorageResult<Vec<String>> {
        match self {
            KvReply::Nil => Ok(Vec::new()),
            KvReply::Array(items) => items
                .into_iter()
                .map(|item| {
                    item.into_text(command)?
                        .ok_or(StorageError::UnexpectedReply { command })
                })
                .collect(),
            _ => Err(StorageError::UnexpectedReply { command }),
        }
    }

    /// Decode a flat `field, value, ...` array into an ordered map.
    pub(crate) fn into_pairs(
        self,
        command: &'static str,
    ) -> StorageResult<IndexMap<String, String>> {
        let flat = self.into_strings(command)?;
        if flat.len() % 2 != 0 {
            return Err(StorageError::UnexpectedReply { command });
        }
        let mut fields = IndexMap::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            fields.insert(field, value);
        }
        Ok(fields)
    }
}

/// Abstraction over the external key-value store holding session state.
///
/// `transaction` must apply every command as a single unit: either all of
/// them are visible to later readers or none are.
pub trait KvStore: Send + Sync {
    fn execute(&self, command: KvCommand) -> BoxFuture<'static, StorageResult<KvReply>>;
    fn transaction(
        &self,
        commands: Vec<KvCommand>,
    ) -> BoxFuture<'static, StorageResult<Vec<KvReply>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Short backend label used by health reporting.
    fn backend(&self) -> &'static str;
}

/// Typed facade over a shared [`KvStore`] handle.
#[derive(Clone)]
pub struct Kv {
    store: Arc<dyn KvStore>,
}

impl Kv {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        self.store.health_check().await
    }

    pub async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.store
            .execute(KvCommand::Get { key: key.into() })
            .await?
            .into_text("GET")
    }

    pub async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StorageResult<()> {
        self.store
            .execute(KvCommand::Set {
                key: key.into(),
                value,
                ttl,
            })
            .await?;
        Ok(())
    }

    pub async fn del(&self, keys: Vec<String>) -> StorageResult<i64> {
        self.store
            .execute(KvCommand::Del { keys })
            .await?
            .into_int("DEL")
    }

    pub async fn hset(&self, key: &str, field: &str, value: String) -> StorageResult<()> {
        self.store
            .execute(KvCommand::HSet {
                key: key.into(),
                field: field.into(),
                value,
            })
            .await?;
        Ok(())
    }

    pub async fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.store
            .execute(KvCommand::HGet {
                key: key.into(),
                field: field.into(),
            })
            .await?
            .into_text("HGET")
    }

    /// Fetch a whole hash, preserving the order the backend reports fields in.
    pub async fn hgetall(&self, key: &str) -> StorageResult<IndexMap<String, String>> {
        self.store
            .execute(KvCommand::HGetAll { key: key.into() })
            .await?
            .into_pairs("HGETALL")
    }

    pub async fn hincrby(&self, key: &str, field: &str, delta: i64) -> StorageResult<i64> {
        self.store
            .execute(KvCommand::HIncrBy {
                key: key.into(),
                field: field.into(),
                delta,
            })
            .await?
            .into_int("HINCRBY")
    }

    pub async fn hlen(&self, key: &str) -> StorageResult<i64> {
        self.store
            .execute(KvCommand::HLen { key: key.into() })
            .await?
            .into_int("HLEN")
    }

    pub async fn rpush(&self, key: &str, values: Vec<String>) -> StorageResult<i64> {
        self.store
            .execute(KvCommand::RPush {
                key: key.into(),
                values,
            })
            .await?
            .into_int("RPUSH")
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> StorageResult<Vec<String>> {
        self.store
            .execute(KvCommand::LRange {
                key: key.into(),
                start,
                stop,
            })
            .await?
            .into_strings("LRANGE")
    }

    pub async fn sadd(&self, key: &str, members: Vec<String>) -> StorageResult<i64> {
        self.store
            .execute(KvCommand::SAdd {
                key: key.into(),
                members,
            })
            .await?
            .into_int("SADD")
    }

    pub async fn smembers(&self, key: &str) -> StorageResult<Vec<String>> {
        self.store
            .execute(KvCommand::SMembers { key: key.into() })
            .await?
            .into_strings("SMEMBERS")
    }

    /// Returns `false` when the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        let applied = self
            .store
            .execute(KvCommand::Expire {
                key: key.into(),
                ttl,
            })
            .await?
            .into_int("EXPIRE")?;
        Ok(applied == 1)
    }

    /// Apply `commands` atomically.
    pub async fn transaction(&self, commands: Vec<KvCommand>) -> StorageResult<Vec<KvReply>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        self.store.transaction(commands).await
    }
}
