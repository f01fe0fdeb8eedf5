//! Process-local [`KvStore`] used when no external store is configured and by tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use tokio::{sync::Mutex, time::Instant};

use super::{KvCommand, KvReply, KvStore};
use crate::dao::storage::{StorageError, StorageResult};

/// Minimum delay between two sweeps of expired keys.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(IndexMap<String, String>),
    List(Vec<String>),
    Set(IndexSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

type Entries = HashMap<String, Entry>;

#[derive(Debug, Default)]
struct Keyspace {
    entries: Entries,
    last_sweep: Option<Instant>,
}

impl Keyspace {
    /// Drop every expired entry, at most once per [`SWEEP_INTERVAL`].
    fn sweep(&mut self, now: Instant) {
        if self
            .last_sweep
            .is_some_and(|last| now.duration_since(last) < SWEEP_INTERVAL)
        {
            return;
        }
        self.entries
            .retain(|_, entry| entry.expires_at.is_none_or(|deadline| deadline > now));
        self.last_sweep = Some(now);
    }
}

/// In-memory keyspace with per-key expiry.
///
/// A single mutex guards the whole keyspace so transactions are trivially atomic.
/// Expired keys are dropped when touched and by a periodic sweep.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn execute(&self, command: KvCommand) -> BoxFuture<'static, StorageResult<KvReply>> {
        let keyspace = self.keyspace.clone();
        Box::pin(async move {
            let mut guard = keyspace.lock().await;
            let now = Instant::now();
            guard.sweep(now);
            apply(&mut guard.entries, command, now)
        })
    }

    fn transaction(
        &self,
        commands: Vec<KvCommand>,
    ) -> BoxFuture<'static, StorageResult<Vec<KvReply>>> {
        let keyspace = self.keyspace.clone();
        Box::pin(async move {
            let mut guard = keyspace.lock().await;
            let now = Instant::now();
            guard.sweep(now);

            // Prior state of every written key, restored if a command fails.
            let mut undo: Vec<(String, Option<Entry>)> = Vec::new();
            let mut replies = Vec::with_capacity(commands.len());
            for command in commands {
                for key in written_keys(&command) {
                    if !undo.iter().any(|(saved, _)| saved == key) {
                        undo.push((key.to_string(), guard.entries.get(key).cloned()));
                    }
                }
                match apply(&mut guard.entries, command, now) {
                    Ok(reply) => replies.push(reply),
                    Err(err) => {
                        for (key, previous) in undo.into_iter().rev() {
                            match previous {
                                Some(entry) => guard.entries.insert(key, entry),
                                None => guard.entries.remove(&key),
                            };
                        }
                        return Err(err);
                    }
                }
            }
            Ok(replies)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Keys a command may create, modify or remove.
fn written_keys(command: &KvCommand) -> Vec<&str> {
    match command {
        KvCommand::Set { key, .. }
        | KvCommand::HSet { key, .. }
        | KvCommand::HIncrBy { key, .. }
        | KvCommand::RPush { key, .. }
        | KvCommand::SAdd { key, .. }
        | KvCommand::Expire { key, .. } => vec![key.as_str()],
        KvCommand::Del { keys } => keys.iter().map(String::as_str).collect(),
        KvCommand::Get { .. }
        | KvCommand::HGet { .. }
        | KvCommand::HGetAll { .. }
        | KvCommand::HLen { .. }
        | KvCommand::LRange { .. }
        | KvCommand::SMembers { .. }
        | KvCommand::Ping => Vec::new(),
    }
}

/// Drop `key` if it has expired and return the live entry, if any.
fn live<'a>(keyspace: &'a mut Entries, key: &str, now: Instant) -> Option<&'a mut Entry> {
    let expired = keyspace
        .get(key)
        .and_then(|entry| entry.expires_at)
        .is_some_and(|deadline| deadline <= now);
    if expired {
        keyspace.remove(key);
    }
    keyspace.get_mut(key)
}

fn wrong_type(key: &str, command: &KvCommand) -> StorageError {
    StorageError::WrongType {
        key: key.to_string(),
        command: command.name(),
    }
}

fn hash_mut<'a>(
    keyspace: &'a mut Entries,
    key: &str,
    command: &KvCommand,
    now: Instant,
) -> StorageResult<&'a mut IndexMap<String, String>> {
    if live(keyspace, key, now).is_none() {
        keyspace.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(IndexMap::new()),
                expires_at: None,
            },
        );
    }
    match keyspace.get_mut(key).map(|entry| &mut entry.value) {
        Some(Value::Hash(fields)) => Ok(fields),
        _ => Err(wrong_type(key, command)),
    }
}

fn len_reply(len: usize) -> KvReply {
    KvReply::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

/// Resolve Redis-style inclusive, possibly negative, list bounds.
fn list_window(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn apply(keyspace: &mut Entries, command: KvCommand, now: Instant) -> StorageResult<KvReply> {
    match &command {
        KvCommand::Ping => Ok(KvReply::Text("PONG".into())),
        KvCommand::Get { key } => match live(keyspace, key, now).map(|entry| &entry.value) {
            None => Ok(KvReply::Nil),
            Some(Value::Text(text)) => Ok(KvReply::Text(text.clone())),
            Some(_) => Err(wrong_type(key, &command)),
        },
        KvCommand::Set { key, value, ttl } => {
            keyspace.insert(
                key.clone(),
                Entry {
                    value: Value::Text(value.clone()),
                    expires_at: ttl.map(|ttl| now + ttl),
                },
            );
            Ok(KvReply::Text("OK".into()))
        }
        KvCommand::Del { keys } => {
            let removed = keys
                .iter()
                .filter(|key| live(keyspace, key, now).is_some())
                .count();
            for key in keys {
                keyspace.remove(key);
            }
            Ok(len_reply(removed))
        }
        KvCommand::HSet { key, field, value } => {
            let fields = hash_mut(keyspace, key, &command, now)?;
            let created = fields.insert(field.clone(), value.clone()).is_none();
            Ok(KvReply::Int(i64::from(created)))
        }
        KvCommand::HGet { key, field } => match live(keyspace, key, now).map(|entry| &entry.value)
        {
            None => Ok(KvReply::Nil),
            Some(Value::Hash(fields)) => Ok(fields
                .get(field)
                .map_or(KvReply::Nil, |value| KvReply::Text(value.clone()))),
            Some(_) => Err(wrong_type(key, &command)),
        },
        KvCommand::HGetAll { key } => match live(keyspace, key, now).map(|entry| &entry.value) {
            None => Ok(KvReply::Array(Vec::new())),
            Some(Value::Hash(fields)) => Ok(KvReply::Array(
                fields
                    .iter()
                    .flat_map(|(field, value)| {
                        [KvReply::Text(field.clone()), KvReply::Text(value.clone())]
                    })
                    .collect(),
            )),
            Some(_) => Err(wrong_type(key, &command)),
        },
        KvCommand::HIncrBy { key, field, delta } => {
            let fields = hash_mut(keyspace, key, &command, now)?;
            let current = match fields.get(field) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|_| wrong_type(key, &command))?,
                None => 0,
            };
            let next = current + delta;
            fields.insert(field.clone(), next.to_string());
            Ok(KvReply::Int(next))
        }
        KvCommand::HLen { key } => match live(keyspace, key, now).map(|entry| &entry.value) {
            None => Ok(KvReply::Int(0)),
            Some(Value::Hash(fields)) => Ok(len_reply(fields.len())),
            Some(_) => Err(wrong_type(key, &command)),
        },
        KvCommand::RPush { key, values } => {
            if live(keyspace, key, now).is_none() {
                keyspace.insert(
                    key.clone(),
                    Entry {
                        value: Value::List(Vec::new()),
                        expires_at: None,
                    },
                );
            }
            match keyspace.get_mut(key).map(|entry| &mut entry.value) {
                Some(Value::List(items)) => {
                    items.extend(values.iter().cloned());
                    Ok(len_reply(items.len()))
                }
                _ => Err(wrong_type(key, &command)),
            }
        }
        KvCommand::LRange { key, start, stop } => {
            match live(keyspace, key, now).map(|entry| &entry.value) {
                None => Ok(KvReply::Array(Vec::new())),
                Some(Value::List(items)) => {
                    let window = list_window(items.len(), *start, *stop)
                        .map(|(from, to)| {
                            items[from..=to]
                                .iter()
                                .cloned()
                                .map(KvReply::Text)
                                .collect()
                        })
                        .unwrap_or_default();
                    Ok(KvReply::Array(window))
                }
                Some(_) => Err(wrong_type(key, &command)),
            }
        }
        KvCommand::SAdd { key, members } => {
            if live(keyspace, key, now).is_none() {
                keyspace.insert(
                    key.clone(),
                    Entry {
                        value: Value::Set(IndexSet::new()),
                        expires_at: None,
                    },
                );
            }
            match keyspace.get_mut(key).map(|entry| &mut entry.value) {
                Some(Value::Set(set)) => {
                    let added = members
                        .iter()
                        .filter(|member| set.insert((*member).clone()))
                        .count();
                    Ok(len_reply(added))
                }
                _ => Err(wrong_type(key, &command)),
            }
        }
        KvCommand::SMembers { key } => match live(keyspace, key, now).map(|entry| &entry.value) {
            None => Ok(KvReply::Array(Vec::new())),
            Some(Value::Set(set)) => Ok(KvReply::Array(
                set.iter().cloned().map(KvReply::Text).collect(),
            )),
            Some(_) => Err(wrong_type(key, &command)),
        },
        KvCommand::Expire { key, ttl } => match live(keyspace, key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + *ttl);
                Ok(KvReply::Int(1))
            }
            None => Ok(KvReply::Int(0)),
        },
    }
}
