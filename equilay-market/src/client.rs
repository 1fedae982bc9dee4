use crate::error::{MarketError, Result};
use crate::model::{GenerateContentRequest, GenerationResponse};
use async_trait::async_trait;
use equilay_state::{MarketFeed, StateError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::Instrument;
use url::Url;

/// Public Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Model used for market refreshes unless configured otherwise.
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-3-flash-preview";

/// Report text used when the model answers with no text at all.
pub const EMPTY_REPORT: &str = "No data found.";

/// Prompt sent on every market refresh.
pub const FIXTURES_PROMPT: &str = "Find today's horse racing fixtures for UK and Ireland. List the next 5 upcoming races with venue, time, and current top 3 runners with their approximate decimal odds. Return as a clean list.";

/// Client for search-grounded `generateContent` calls.
#[derive(Debug, Clone)]
pub struct GeminiSearchClient {
    http_client: Client,
    base_url: Url,
    model: String,
}

impl GeminiSearchClient {
    /// Create a client against the public endpoint.
    pub fn new(api_key: impl AsRef<str>, model: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint root, e.g. a proxy or a test server.
    pub fn with_base_url(
        api_key: impl AsRef<str>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let headers = HeaderMap::from_iter([(
            HeaderName::from_static("x-goog-api-key"),
            HeaderValue::from_str(api_key.as_ref()).map_err(MarketError::InvalidApiKey)?,
        )]);
        let http_client =
            Client::builder().default_headers(headers).build().map_err(MarketError::Request)?;

        let mut base_url = Url::parse(base_url)
            .map_err(|e| MarketError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { http_client, base_url, model: model.into() })
    }

    /// Model id requests are sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_url(&self, method: &str) -> Result<Url> {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        let suffix = format!("models/{model}:{method}");
        self.base_url.join(&suffix).map_err(|e| MarketError::InvalidUrl(format!("{suffix}: {e}")))
    }

    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MarketError::BadResponse { status: status.as_u16(), body })
        }
    }

    /// Send `prompt` with Google Search grounding and return the answer text.
    ///
    /// An answer with no text becomes [`EMPTY_REPORT`].
    #[tracing::instrument(skip_all, fields(model = %self.model, prompt.len = prompt.len()), err)]
    pub async fn generate_with_search(&self, prompt: &str) -> Result<String> {
        let url = self.build_url("generateContent")?;
        let request = GenerateContentRequest::search_grounded(prompt);

        let response = self
            .http_client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(MarketError::Request)?;
        let response: GenerationResponse =
            Self::check_response(response).await?.json().await.map_err(MarketError::Decode)?;

        if let Some(usage) = &response.usage_metadata {
            tracing::debug!(
                usage.prompt_tokens = usage.prompt_token_count,
                usage.candidates_tokens = usage.candidates_token_count,
                usage.total_tokens = usage.total_token_count,
                "generation usage evaluated"
            );
        }

        let text = response.text();
        if text.trim().is_empty() {
            tracing::debug!("search answer carried no text");
            return Ok(EMPTY_REPORT.to_string());
        }
        Ok(text)
    }
}

#[async_trait]
impl MarketFeed for GeminiSearchClient {
    async fn fetch_upcoming_races(&self) -> equilay_state::Result<String> {
        self.generate_with_search(FIXTURES_PROMPT)
            .instrument(equilay_telemetry::market_refresh_span(&self.model))
            .await
            .map_err(StateError::feed)
    }
}
