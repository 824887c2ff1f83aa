//! Enrichment gateway: optional rewrite of a generated summary by an external
//! text-generation provider.
//!
//! Each [`ProviderKind`] knows how to shape its request and where its answer
//! lives in the response; the gateway wraps whichever one is selected with the
//! same failure policy. [`EnrichmentGateway::enhance`] never fails: anything
//! short of a well-formed, non-empty answer returns the input unchanged.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Credentials, DocStyle, EnrichmentSection, ProviderKind};
use crate::contract::{HttpMethod, HttpRequest, Transport, TransportError};

const OPENAI_MODEL: &str = "gpt-4o-mini";
const CLAUDE_MODEL: &str = "claude-3-haiku-20240307";
const MISTRAL_MODEL: &str = "mistral-small-latest";
const GOOGLE_MODEL: &str = "gemini-2.5-flash";
const MAX_TOKENS: u32 = 1000;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Instruction payload sent to every provider.
pub fn build_prompt(markdown: &str, style: DocStyle) -> String {
    format!(
        "You are an expert DevOps documentation assistant.\n\
         Rewrite and enhance the following technical documentation in a clear, structured, and {style} style.\n\
         Keep all code blocks and technical details intact; only make the explanations easier to understand.\n\
         \n\
         Content:\n\
         {markdown}\n"
    )
}

fn json_headers(extra: &[(&str, &str)]) -> Vec<(String, String)> {
    std::iter::once(("Content-Type", "application/json"))
        .chain(extra.iter().copied())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl ProviderKind {
    /// The single POST that asks this provider to rewrite `prompt`.
    pub fn request(&self, api_key: &str, prompt: &str) -> HttpRequest {
        let bearer = format!("Bearer {api_key}");
        let (url, headers, body) = match self {
            ProviderKind::OpenAi => (
                "https://api.openai.com/v1/chat/completions".to_string(),
                json_headers(&[("Authorization", bearer.as_str())]),
                json!({
                    "model": OPENAI_MODEL,
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": MAX_TOKENS,
                }),
            ),
            ProviderKind::Mistral => (
                "https://api.mistral.ai/v1/chat/completions".to_string(),
                json_headers(&[("Authorization", bearer.as_str())]),
                json!({
                    "model": MISTRAL_MODEL,
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": MAX_TOKENS,
                }),
            ),
            ProviderKind::Claude => (
                "https://api.anthropic.com/v1/messages".to_string(),
                json_headers(&[("x-api-key", api_key), ("anthropic-version", ANTHROPIC_VERSION)]),
                json!({
                    "model": CLAUDE_MODEL,
                    "max_tokens": MAX_TOKENS,
                    "messages": [{ "role": "user", "content": prompt }],
                }),
            ),
            ProviderKind::Google => (
                format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{GOOGLE_MODEL}:generateContent"
                ),
                json_headers(&[("x-goog-api-key", api_key)]),
                json!({
                    "contents": [{ "parts": [{ "text": prompt }] }],
                }),
            ),
        };
        HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(body),
        }
    }

    /// The rewritten text inside a successful response, if present and non-blank.
    pub fn extract_text(&self, response: &Value) -> Option<String> {
        let pointer = match self {
            ProviderKind::OpenAi | ProviderKind::Mistral => "/choices/0/message/content",
            ProviderKind::Claude => "/content/0/text",
            ProviderKind::Google => "/candidates/0/content/parts/0/text",
        };
        response
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    }

    /// A cheap authenticated GET used to validate the credential.
    pub fn probe(&self, api_key: &str) -> HttpRequest {
        let (url, headers) = match self {
            ProviderKind::OpenAi => (
                "https://api.openai.com/v1/models",
                vec![("Authorization".to_string(), format!("Bearer {api_key}"))],
            ),
            ProviderKind::Mistral => (
                "https://api.mistral.ai/v1/models",
                vec![("Authorization".to_string(), format!("Bearer {api_key}"))],
            ),
            ProviderKind::Claude => (
                "https://api.anthropic.com/v1/models",
                vec![
                    ("x-api-key".to_string(), api_key.to_string()),
                    ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
                ],
            ),
            ProviderKind::Google => (
                "https://generativelanguage.googleapis.com/v1beta/models",
                vec![("x-goog-api-key".to_string(), api_key.to_string())],
            ),
        };
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers,
            body: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("no enrichment provider selected")]
    NoProvider,
    #[error("no API key configured for {0}")]
    MissingCredential(ProviderKind),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{provider} answered with HTTP {status}")]
    Status { provider: ProviderKind, status: u16 },
    #[error("{provider} returned malformed JSON: {message}")]
    MalformedResponse { provider: ProviderKind, message: String },
    #[error("{provider} response has no text at the expected location")]
    MissingText { provider: ProviderKind },
}

/// Result of [`EnrichmentGateway::check_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    NoProvider,
    MissingCredential(ProviderKind),
    Valid(ProviderKind),
    Rejected { provider: ProviderKind, status: u16 },
    Unreachable { provider: ProviderKind, message: String },
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::NoProvider => write!(f, "No provider selected."),
            ConnectionStatus::MissingCredential(p) => write!(f, "No API key set for {p}."),
            ConnectionStatus::Valid(p) => write!(f, "{p} key is valid."),
            ConnectionStatus::Rejected { provider, status } => write!(
                f,
                "Invalid {provider} API key or rate limit reached (HTTP {status})."
            ),
            ConnectionStatus::Unreachable { provider, message } => {
                write!(f, "Connection test failed for {provider}: {message}")
            }
        }
    }
}

pub struct EnrichmentGateway<T> {
    transport: T,
    provider: Option<ProviderKind>,
    credentials: Credentials,
}

impl<T: Transport> EnrichmentGateway<T> {
    pub fn new(transport: T, section: &EnrichmentSection) -> Self {
        Self {
            transport,
            provider: section.provider,
            credentials: section.credentials.clone(),
        }
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        self.provider
    }

    /// Rewrite `markdown`, or return it unchanged on any failure.
    pub async fn enhance(&self, markdown: &str, style: DocStyle) -> String {
        match self.try_enhance(markdown, style).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "[ENRICH] Keeping original documentation");
                markdown.to_string()
            }
        }
    }

    /// Same as [`enhance`](Self::enhance) but reports why nothing changed.
    /// Performs at most one network call and no retries.
    pub async fn try_enhance(&self, markdown: &str, style: DocStyle) -> Result<String, EnrichError> {
        let provider = self.provider.ok_or(EnrichError::NoProvider)?;
        let api_key = self
            .credentials
            .for_provider(provider)
            .ok_or(EnrichError::MissingCredential(provider))?;

        let request = provider.request(api_key, &build_prompt(markdown, style));
        debug!(%provider, url = %request.url, "[ENRICH] Sending request");
        let reply = self.transport.send(request).await?;

        if !reply.is_success() {
            debug!(%provider, status = reply.status, body = %reply.body, "[ENRICH] Provider rejected request");
            return Err(EnrichError::Status {
                provider,
                status: reply.status,
            });
        }
        let body: Value = serde_json::from_str(&reply.body).map_err(|e| EnrichError::MalformedResponse {
            provider,
            message: e.to_string(),
        })?;
        let text = provider
            .extract_text(&body)
            .ok_or(EnrichError::MissingText { provider })?;

        info!(%provider, chars = text.len(), "[ENRICH] Documentation enhanced");
        Ok(text)
    }

    /// Validate the configured credential against the provider.
    pub async fn check_connection(&self) -> ConnectionStatus {
        let Some(provider) = self.provider else {
            return ConnectionStatus::NoProvider;
        };
        let Some(api_key) = self.credentials.for_provider(provider) else {
            return ConnectionStatus::MissingCredential(provider);
        };
        match self.transport.send(provider.probe(api_key)).await {
            Ok(reply) if reply.is_success() => ConnectionStatus::Valid(provider),
            Ok(reply) => {
                info!(%provider, status = reply.status, body = %reply.body, "[ENRICH] Connection test rejected");
                ConnectionStatus::Rejected {
                    provider,
                    status: reply.status,
                }
            }
            Err(e) => ConnectionStatus::Unreachable {
                provider,
                message: e.to_string(),
            },
        }
    }
}
