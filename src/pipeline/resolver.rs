use serde_json::Value;
use std::sync::Arc;

use super::formatter::{self, SourceShape};
use super::strip_code_fences;
use crate::error::NutritionError;
use crate::models::{FoodCategory, NutrientVector, ReferenceFood, Resolution, ResolutionAttempt, Tier};
use crate::services::ml_bridge::{BridgeError, ModelBridge, PredictionRequest};
use crate::services::openrouter::{ChatMessage, CompletionClient, CompletionRequest};
use crate::services::usda::ReferenceDatabase;

const GENERATIVE_SYSTEM_PROMPT: &str = r#"You are a nutrition analysis expert. Provide realistic, USDA-compliant nutrition values for exactly the portion given.
Return ONLY a JSON object with this exact structure, no markdown formatting or additional text:
{
  "calories": number (kcal),
  "protein": number (g),
  "fats": number (g),
  "carbs": number (g),
  "fiber": number (g),
  "vitamins": {"A": number (mcg), "C": number (mg), "D": number (mcg), "E": number (mg)},
  "minerals": {"calcium": number (mg), "iron": number (mg), "potassium": number (mg), "sodium": number (mg)}
}"#;

/// One resolve request as every tier sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodQuery {
    pub food_name: String,
    pub quantity: f64,
    pub category: FoodCategory,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierOutput {
    pub nutrients: NutrientVector,
    pub reference: Option<ReferenceFood>,
}

impl From<NutrientVector> for TierOutput {
    fn from(nutrients: NutrientVector) -> Self {
        Self {
            nutrients,
            reference: None,
        }
    }
}

/// A ranked strategy in the fallback chain.
#[async_trait::async_trait]
pub trait NutrientSource: Send + Sync {
    fn tier(&self) -> Tier;

    async fn fetch(&self, query: &FoodQuery) -> Result<TierOutput, NutritionError>;
}

/// Tier 1: local predictive model behind a [`ModelBridge`].
pub struct LocalModelSource {
    bridge: Arc<dyn ModelBridge>,
}

impl LocalModelSource {
    pub fn new(bridge: Arc<dyn ModelBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait::async_trait]
impl NutrientSource for LocalModelSource {
    fn tier(&self) -> Tier {
        Tier::LocalModel
    }

    async fn fetch(&self, query: &FoodQuery) -> Result<TierOutput, NutritionError> {
        let status = self.bridge.check_availability().await;
        if !status.available {
            return Err(NutritionError::ModelUnavailable(
                status.reason.unwrap_or_else(|| "models not available".to_string()),
            ));
        }

        let request = PredictionRequest {
            food_name: query.food_name.clone(),
            portion_size: query.quantity,
            food_category: query.category.to_string(),
            portion_unit: query.unit.clone(),
        };

        let raw = self.bridge.predict(&request).await.map_err(|e| match e {
            BridgeError::NoJson | BridgeError::Parse(_) => NutritionError::MlPredictionParse(e.to_string()),
            other => NutritionError::NutritionUnavailable(format!("local model failed: {}", other)),
        })?;

        Ok(formatter::format(&raw, self.tier().into()).into())
    }
}

/// Tier 2: ask a language model for a nutrient object.
pub struct GenerativeSource {
    client: Arc<dyn CompletionClient>,
}

impl GenerativeSource {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn request(query: &FoodQuery) -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage::system(GENERATIVE_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Nutrition values for {}{} of {} (category: {}).",
                    query.quantity, query.unit, query.food_name, query.category
                )),
            ],
            max_tokens: Some(500),
            json_mode: true,
        }
    }
}

#[async_trait::async_trait]
impl NutrientSource for GenerativeSource {
    fn tier(&self) -> Tier {
        Tier::Generative
    }

    async fn fetch(&self, query: &FoodQuery) -> Result<TierOutput, NutritionError> {
        let content = self
            .client
            .complete(Self::request(query))
            .await
            .map_err(|e| NutritionError::NutritionUnavailable(format!("generative estimate failed: {}", e)))?;

        let raw: Value = serde_json::from_str(strip_code_fences(&content)).map_err(|e| {
            NutritionError::NutritionUnavailable(format!("generative estimate is not JSON: {}", e))
        })?;

        if !raw.is_object() {
            return Err(NutritionError::NutritionUnavailable(
                "generative estimate is not a JSON object".to_string(),
            ));
        }

        Ok(formatter::format(&raw, self.tier().into()).into())
    }
}

/// Tier 3: structured reference database, first hit only. Values are per
/// 100 g and are scaled to the portion for gram and millilitre units.
pub struct ReferenceDbSource {
    db: Arc<dyn ReferenceDatabase>,
}

impl ReferenceDbSource {
    pub fn new(db: Arc<dyn ReferenceDatabase>) -> Self {
        Self { db }
    }

    fn metadata(raw: &Value) -> ReferenceFood {
        ReferenceFood {
            fdc_id: raw.get("fdcId").and_then(Value::as_i64).unwrap_or_default(),
            description: raw
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            serving_size: raw
                .get("servingSize")
                .and_then(Value::as_f64)
                .filter(|size| *size > 0.0)
                .unwrap_or(100.0),
            serving_unit: raw
                .get("servingSizeUnit")
                .and_then(Value::as_str)
                .filter(|unit| !unit.is_empty())
                .unwrap_or("g")
                .to_string(),
        }
    }

    fn portion_factor(query: &FoodQuery) -> f64 {
        match query.unit.as_str() {
            "g" | "ml" => query.quantity / 100.0,
            _ => 1.0,
        }
    }
}

#[async_trait::async_trait]
impl NutrientSource for ReferenceDbSource {
    fn tier(&self) -> Tier {
        Tier::ReferenceDb
    }

    async fn fetch(&self, query: &FoodQuery) -> Result<TierOutput, NutritionError> {
        let food = self
            .db
            .search_first(&query.food_name)
            .await
            .map_err(|e| NutritionError::NutritionUnavailable(format!("Failed to fetch nutrition data: {}", e)))?
            .ok_or_else(|| {
                NutritionError::NutritionUnavailable(format!("No nutrition data found for {}", query.food_name))
            })?;

        let per_100g = formatter::format(&food, SourceShape::from(self.tier()));
        let factor = Self::portion_factor(query);
        let nutrients = if factor == 1.0 {
            per_100g
        } else {
            formatter::scale(&per_100g, factor)
        };

        Ok(TierOutput {
            nutrients,
            reference: Some(Self::metadata(&food)),
        })
    }
}

/// Tries each source in order and stops at the first success.
pub struct NutrientResolver {
    sources: Vec<Arc<dyn NutrientSource>>,
}

impl NutrientResolver {
    pub fn new(sources: Vec<Arc<dyn NutrientSource>>) -> Self {
        Self { sources }
    }

    /// Build a chain in the given tier order over shared clients.
    pub fn from_tiers(
        tiers: &[Tier],
        bridge: Arc<dyn ModelBridge>,
        client: Arc<dyn CompletionClient>,
        db: Arc<dyn ReferenceDatabase>,
    ) -> Self {
        let sources = tiers
            .iter()
            .map(|tier| -> Arc<dyn NutrientSource> {
                match tier {
                    Tier::LocalModel => Arc::new(LocalModelSource::new(bridge.clone())),
                    Tier::Generative => Arc::new(GenerativeSource::new(client.clone())),
                    Tier::ReferenceDb => Arc::new(ReferenceDbSource::new(db.clone())),
                }
            })
            .collect();

        Self::new(sources)
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.sources.iter().map(|s| s.tier()).collect()
    }

    pub async fn resolve(
        &self,
        food_name: &str,
        quantity: f64,
        category: FoodCategory,
        unit: &str,
    ) -> Result<Resolution, NutritionError> {
        let food_name = food_name.trim();
        if food_name.is_empty() {
            return Err(NutritionError::InvalidInput("food name is empty".to_string()));
        }

        let query = FoodQuery {
            food_name: food_name.to_string(),
            quantity,
            category,
            unit: unit.to_string(),
        };

        let mut attempts = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let tier = source.tier();
            match source.fetch(&query).await {
                Ok(output) => {
                    log::info!("✅ {} resolved {}{} of {}", tier, quantity, unit, food_name);
                    attempts.push(ResolutionAttempt {
                        tier,
                        succeeded: true,
                        error_detail: None,
                    });
                    log::debug!("📋 Resolution attempts for {}: {:?}", food_name, attempts);

                    return Ok(Resolution {
                        nutrients: output.nutrients,
                        tier,
                        reference: output.reference,
                        attempts,
                    });
                }
                Err(e) => {
                    log::warn!("⚠️ {} failed for {} ({}): {}", tier, food_name, e.kind(), e);
                    attempts.push(ResolutionAttempt {
                        tier,
                        succeeded: false,
                        error_detail: Some(e.to_string()),
                    });
                }
            }
        }

        log::debug!("📋 Resolution attempts for {}: {:?}", food_name, attempts);

        let detail = if attempts.is_empty() {
            "no nutrition tiers configured".to_string()
        } else {
            attempts
                .iter()
                .map(|a| format!("{}: {}", a.tier, a.error_detail.as_deref().unwrap_or("failed")))
                .collect::<Vec<_>>()
                .join("; ")
        };

        log::error!("❌ All nutrition tiers failed for {}", food_name);
        Err(NutritionError::NutritionUnavailable(detail))
    }
}
