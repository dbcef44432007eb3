use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::Config;
use crate::state::Per100g;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Please enter a food to search.")]
    EmptyQuery,
    #[error("No USDA API key configured. Set usda_api_key in the config file or SSCULPT_USDA_API_KEY.")]
    MissingApiKey,
    #[error("Request to nutrient provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Nutrient provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response from nutrient provider: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Best match for a food search. Values are passed through from the
/// provider as-is (per 100 g or per standard serving, provider's choice).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FoodMatch {
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl FoodMatch {
    #[must_use]
    pub fn per_100g(&self) -> Per100g {
        let known = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0);
        Per100g {
            protein: known(self.protein),
            calories: known(self.calories),
        }
    }
}

/// Observable state of one lookup, for whatever is displaying it.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupStatus {
    Pending,
    Found(FoodMatch),
    NotFound,
    Failed(String),
}

impl LookupStatus {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Pending => "Searching USDA…".to_string(),
            Self::Found(food) => food.name.clone(),
            Self::NotFound => "No results found.".to_string(),
            Self::Failed(reason) => format!("Lookup failed (offline?): {reason}"),
        }
    }
}

impl From<Result<Option<FoodMatch>, LookupError>> for LookupStatus {
    fn from(result: Result<Option<FoodMatch>, LookupError>) -> Self {
        match result {
            Ok(Some(food)) => Self::Found(food),
            Ok(None) => Self::NotFound,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

#[async_trait]
pub trait NutrientLookup: Send + Sync {
    /// Returns the provider's first match for `query`, or `None` when nothing matched.
    async fn search(&self, query: &str) -> Result<Option<FoodMatch>, LookupError>;
}

// --- USDA FoodData Central wire format ---

#[derive(Deserialize, Debug)]
struct SearchResponse {
    foods: Option<Vec<FoodItem>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FoodItem {
    #[serde(default)]
    description: String,
    #[serde(default)]
    food_nutrients: Vec<FoodNutrient>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FoodNutrient {
    nutrient_name: Option<String>,
    unit_name: Option<String>,
    value: Option<f64>,
}

/// Picks the first food out of a search response body.
/// # Errors
/// `LookupError::Malformed` if the body is not the expected JSON shape.
pub fn parse_search_response(body: &str) -> Result<Option<FoodMatch>, LookupError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let Some(food) = response.foods.and_then(|foods| foods.into_iter().next()) else {
        return Ok(None);
    };

    let mut found = FoodMatch {
        name: food.description,
        ..FoodMatch::default()
    };
    for nutrient in food.food_nutrients {
        let Some(name) = nutrient.nutrient_name.as_deref() else {
            continue;
        };
        match name {
            "Energy" => {
                // Foundation foods list energy twice; keep the kcal figure
                let is_kj = nutrient
                    .unit_name
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case("kj"));
                if !is_kj {
                    found.calories = nutrient.value;
                }
            }
            "Protein" => found.protein = nutrient.value,
            "Carbohydrate, by difference" => found.carbs = nutrient.value,
            "Total lipid (fat)" => found.fat = nutrient.value,
            _ => {}
        }
    }
    Ok(Some(found))
}

pub struct UsdaClient {
    http_client: Client,
    search_url: Url,
    api_key: Option<String>,
    data_types: String,
}

impl UsdaClient {
    /// # Errors
    /// Returns `anyhow::Error` if the search URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.lookup_timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            search_url: config.lookup_url()?,
            api_key: config.api_key(),
            data_types: config.lookup_data_types.clone(),
        })
    }
}

#[async_trait]
impl NutrientLookup for UsdaClient {
    async fn search(&self, query: &str) -> Result<Option<FoodMatch>, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::EmptyQuery);
        }
        let api_key = self.api_key.as_deref().ok_or(LookupError::MissingApiKey)?;

        info!("Searching {} for '{}'", self.search_url, query);
        let response = self
            .http_client
            .get(self.search_url.clone())
            .query(&[
                ("api_key", api_key),
                ("query", query),
                ("dataType", self.data_types.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("Nutrient lookup request failed: {}", e);
                LookupError::Transport(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            error!("Nutrient lookup failed with status: {}. Body: {}", status, body);
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        debug!("Lookup response: {} bytes", body.len());
        let found = parse_search_response(&body)?;
        match &found {
            Some(food) => info!("Best match for '{}': {}", query, food.name),
            None => info!("No match for '{}'", query),
        }
        Ok(found)
    }
}
