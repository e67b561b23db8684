use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";

/// Dataset categories the search is restricted to.
pub const DATA_TYPES: [&str; 3] = ["Survey (FNDDS)", "Foundation", "SR Legacy"];

#[derive(Debug, Error)]
pub enum ReferenceDbError {
    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("USDA API request failed: {0}")]
    Request(String),

    #[error("USDA API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("USDA API JSON parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<serde_json::Value>,
}

/// Structured food-reference database. Only the top-ranked hit is used.
#[async_trait::async_trait]
pub trait ReferenceDatabase: Send + Sync {
    /// Raw JSON of the first search result, or `None` when nothing matched.
    async fn search_first(&self, query: &str) -> Result<Option<serde_json::Value>, ReferenceDbError>;
}

/// USDA FoodData Central search client.
pub struct UsdaClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl UsdaClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn search_params<'a>(&'a self, query: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("query", query), ("api_key", self.api_key.as_str())];
        // One dataType pair per category; the API rejects a comma-joined list.
        params.extend(DATA_TYPES.iter().map(|data_type| ("dataType", *data_type)));
        params.push(("pageSize", "1"));
        params
    }
}

#[async_trait::async_trait]
impl ReferenceDatabase for UsdaClient {
    async fn search_first(&self, query: &str) -> Result<Option<serde_json::Value>, ReferenceDbError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ReferenceDbError::EmptyQuery);
        }

        log::info!("🔎 USDA search for '{}'", query);

        let response = self
            .client
            .get(format!("{}/foods/search", self.base_url))
            .query(&self.search_params(query))
            .send()
            .await
            .map_err(|e| ReferenceDbError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::error!("❌ USDA API error ({}): {}", status, message);
            return Err(ReferenceDbError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| ReferenceDbError::Parse(e.to_string()))?;

        log::debug!("📥 USDA returned {} food(s) for '{}'", search.foods.len(), query);
        Ok(search.foods.into_iter().next())
    }
}
