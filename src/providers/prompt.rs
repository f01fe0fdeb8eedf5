//! Free-text prompt to game parameters, backed by the Gemini API.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ProviderError, ProviderResult, decode, http_client, require_env};

const PROVIDER: &str = "gemini";
const API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-2.5-flash";

/// Parameters extracted from a prompt, before the engine normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParsedPrompt {
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub decades: Vec<String>,
    #[serde(default)]
    pub moods: Vec<String>,
    /// Song count; models may answer with a fractional number.
    #[serde(default)]
    pub limit: Option<f64>,
}

/// Extracts game parameters from free text.
pub trait PromptParser: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &'static str;
    fn parse(&self, prompt: String) -> BoxFuture<'static, ProviderResult<ParsedPrompt>>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// [`PromptParser`] calling `generateContent` with a JSON response schema.
#[derive(Clone)]
pub struct GeminiPromptParser {
    client: Client,
    api_key: Arc<str>,
    api_url: Arc<str>,
}

impl GeminiPromptParser {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            api_key: Arc::from(api_key.into()),
            api_url: Arc::from(API_URL),
        })
    }

    /// Build a parser from `GOOGLE_AI_API_KEY`.
    pub fn from_env(timeout: Duration) -> ProviderResult<Self> {
        Self::new(require_env(PROVIDER, "GOOGLE_AI_API_KEY")?, timeout)
    }

    async fn generate(&self, prompt: String) -> ProviderResult<ParsedPrompt> {
        let response = self
            .client
            .post(format!("{}/models/{MODEL}:generateContent", self.api_url))
            .header("x-goog-api-key", &*self.api_key)
            .json(&request_body(&prompt))
            .send()
            .await
            .map_err(|source| ProviderError::RequestSend {
                provider: PROVIDER,
                source,
            })?;
        let body: GenerateResponse = decode(PROVIDER, response).await?;
        parse_reply(body)
    }
}

impl PromptParser for GeminiPromptParser {
    fn name(&self) -> &'static str {
        MODEL
    }

    fn parse(&self, prompt: String) -> BoxFuture<'static, ProviderResult<ParsedPrompt>> {
        let parser = self.clone();
        Box::pin(async move { parser.generate(prompt).await })
    }
}

fn instructions(prompt: &str) -> String {
    format!(
        "You generate music guessing games. Extract game parameters from this \
         description and answer with a JSON object only: \"{prompt}\".\n\
         Fields: artists (artist names), genres (e.g. pop, rock, hip-hop, k-pop), \
         decades (e.g. 1980s, 1990s), moods (e.g. happy, sad, energetic) and \
         limit (number of songs, 25 when not stated).\n\
         Only include fields the description mentions. Use lowercase values. \
         When the songs should be in a language other than English, add that \
         language to genres."
    )
}

fn request_body(prompt: &str) -> Value {
    let string_array = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
    json!({
        "contents": [{ "parts": [{ "text": instructions(prompt) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "artists": string_array,
                    "genres": string_array,
                    "decades": string_array,
                    "moods": string_array,
                    "limit": { "type": "NUMBER" }
                },
                "propertyOrdering": ["artists", "genres", "decades", "moods", "limit"]
            }
        }
    })
}

fn parse_reply(body: GenerateResponse) -> ProviderResult<ParsedPrompt> {
    let text = body
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.text)
        .ok_or_else(|| ProviderError::Payload {
            provider: PROVIDER,
            message: "no text in response".into(),
        })?;

    serde_json::from_str(&text).map_err(|err| ProviderError::Payload {
        provider: PROVIDER,
        message: format!("response is not a parameter object: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> GenerateResponse {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .unwrap()
    }

    #[test]
    fn structured_reply_is_decoded() {
        let parsed =
            parse_reply(reply(r#"{"artists":["Queen"],"decades":["1970s"],"limit":12.0}"#))
                .unwrap();
        assert_eq!(parsed.artists, vec!["Queen"]);
        assert_eq!(parsed.decades, vec!["1970s"]);
        assert!(parsed.genres.is_empty());
        assert_eq!(parsed.limit, Some(12.0));
    }

    #[test]
    fn empty_or_malformed_replies_fail() {
        let empty: GenerateResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(parse_reply(empty), Err(ProviderError::Payload { .. })));
        assert!(parse_reply(reply("not json")).is_err());
    }

    #[test]
    fn request_embeds_prompt_and_schema() {
        let body = request_body("eighties rock");
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"eighties rock\""));
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["limit"]["type"],
            "NUMBER"
        );
    }
}
