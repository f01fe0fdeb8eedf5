use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::dao::{
    kv::{KvCommand, KvReply, KvStore},
    storage::StorageResult,
};

use super::{
    config::UpstashConfig,
    error::{UpstashDaoError, UpstashResult},
};

const TRANSACTION_PATH: &str = "multi-exec";

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// [`KvStore`] speaking the Upstash Redis REST protocol.
#[derive(Clone)]
pub struct UpstashKvStore {
    client: Client,
    base_url: Arc<str>,
    token: Arc<str>,
}

impl UpstashKvStore {
    /// Build the HTTP client and make sure the endpoint answers a `PING`.
    pub async fn connect(config: UpstashConfig) -> UpstashResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| UpstashDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.url.trim_end_matches('/')),
            token: Arc::from(config.token),
        };

        store.send(KvCommand::Ping).await?;
        Ok(store)
    }

    async fn post<T>(&self, path: Option<&str>, label: &str, body: &T) -> UpstashResult<Value>
    where
        T: ?Sized + serde::Serialize,
    {
        let url = match path {
            Some(path) => format!("{}/{}", self.base_url, path),
            None => self.base_url.to_string(),
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.as_ref())
            .json(body)
            .send()
            .await
            .map_err(|source| UpstashDaoError::RequestSend {
                command: label.to_string(),
                source,
            })?;

        // Command-level failures come back as 400 with an `error` body.
        let status = response.status();
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            return Err(UpstashDaoError::RequestStatus {
                command: label.to_string(),
                status,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| UpstashDaoError::DecodeResponse {
                command: label.to_string(),
                source,
            })
    }

    async fn send(&self, command: KvCommand) -> UpstashResult<KvReply> {
        let label = command.name();
        let payload = self.post(None, label, &command.to_args()).await?;
        into_reply(label, payload)
    }

    async fn send_transaction(&self, commands: Vec<KvCommand>) -> UpstashResult<Vec<KvReply>> {
        let label = "MULTI/EXEC";
        let body = commands.iter().map(KvCommand::to_args).collect::<Vec<_>>();
        let payload = self.post(Some(TRANSACTION_PATH), label, &body).await?;

        match payload {
            Value::Array(items) => items
                .into_iter()
                .zip(commands.iter())
                .map(|(item, command)| into_reply(command.name(), item))
                .collect(),
            other => Err(into_reply(label, other)
                .err()
                .unwrap_or_else(|| UpstashDaoError::CommandFailed {
                    command: label.to_string(),
                    message: "transaction reply is not an array".into(),
                })),
        }
    }
}

fn into_reply(label: &str, payload: Value) -> UpstashResult<KvReply> {
    let response: CommandResponse =
        serde_json::from_value(payload).map_err(|err| UpstashDaoError::CommandFailed {
            command: label.to_string(),
            message: format!("malformed reply: {err}"),
        })?;

    if let Some(message) = response.error {
        return Err(UpstashDaoError::CommandFailed {
            command: label.to_string(),
            message,
        });
    }

    Ok(json_to_reply(response.result))
}

fn json_to_reply(value: Value) -> KvReply {
    match value {
        Value::Null => KvReply::Nil,
        Value::Bool(flag) => KvReply::Int(i64::from(flag)),
        Value::Number(number) => number
            .as_i64()
            .map(KvReply::Int)
            .unwrap_or_else(|| KvReply::Text(number.to_string())),
        Value::String(text) => KvReply::Text(text),
        Value::Array(items) => KvReply::Array(items.into_iter().map(json_to_reply).collect()),
        Value::Object(_) => KvReply::Text(value.to_string()),
    }
}

impl KvStore for UpstashKvStore {
    fn execute(&self, command: KvCommand) -> BoxFuture<'static, StorageResult<KvReply>> {
        let store = self.clone();
        Box::pin(async move { store.send(command).await.map_err(Into::into) })
    }

    fn transaction(
        &self,
        commands: Vec<KvCommand>,
    ) -> BoxFuture<'static, StorageResult<Vec<KvReply>>> {
        let store = self.clone();
        Box::pin(async move { store.send_transaction(commands).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.send(KvCommand::Ping).await?;
            Ok(())
        })
    }

    fn backend(&self) -> &'static str {
        "upstash"
    }
}
