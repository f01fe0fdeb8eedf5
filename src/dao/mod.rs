/// KV store abstraction and its backends.
pub mod kv;
/// Persistence model definitions.
pub mod models;
/// Session aggregate repository on top of the KV store.
pub mod session;
/// Backend-agnostic storage errors.
pub mod storage;
