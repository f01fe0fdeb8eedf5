mod config;
mod error;
mod store;

pub use config::UpstashConfig;
pub use error::{UpstashDaoError, UpstashResult};
pub use store::UpstashKvStore;
