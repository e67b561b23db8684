use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use std::sync::Arc;

use super::strip_code_fences;
use crate::error::NutritionError;
use crate::models::{CandidateItem, FoodCategory};
use crate::services::openrouter::{ChatMessage, CompletionClient, CompletionRequest};

const MAX_OUTPUT_TOKENS: u32 = 500;

#[derive(Debug, Deserialize)]
struct ImageAnalysis {
    food_items: Option<Vec<RawItem>>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: Option<String>,
    #[serde(alias = "namesom")]
    localized_name: Option<String>,
    #[serde(alias = "portionsize")]
    portion_size: Option<String>,
    category: Option<String>,
}

/// Guess the image MIME type from its magic bytes. JPEG when unsure.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse and validate the vision model's reply. One bad item rejects the batch.
pub fn parse_candidates(content: &str) -> Result<Vec<CandidateItem>, NutritionError> {
    let analysis: ImageAnalysis = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| NutritionError::ImageAnalysis(format!("response is not valid JSON: {}", e)))?;

    let items = analysis
        .food_items
        .ok_or_else(|| NutritionError::ImageAnalysis("Invalid response format: missing food_items".to_string()))?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| -> Result<CandidateItem, NutritionError> {
            let missing =
                || NutritionError::ImageAnalysis(format!("Invalid food item at index {}: missing required fields", index));

            Ok(CandidateItem {
                name: required(item.name).ok_or_else(missing)?,
                localized_name: required(item.localized_name).ok_or_else(missing)?,
                portion_text: required(item.portion_size).ok_or_else(missing)?,
                category: FoodCategory::from_label(&required(item.category).ok_or_else(missing)?),
            })
        })
        .collect()
}

/// Asks a vision-capable model which foods are in a photo.
pub struct ImageInterpreter {
    client: Arc<dyn CompletionClient>,
    local_language: String,
}

impl ImageInterpreter {
    pub fn new(client: Arc<dyn CompletionClient>, local_language: impl Into<String>) -> Self {
        Self {
            client,
            local_language: local_language.into(),
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You are a food analysis expert. Analyze the food items in the image and provide:
1. English name of each food item
2. {language} name of each food item
3. Estimated portion size in grams or ml (always include the unit, e.g., "100g" or "250ml")
4. Category: one of fruit, vegetable, protein, grain, dairy, nut, unknown
Return ONLY a JSON object with this exact structure, no markdown formatting or additional text:
{{
  "food_items": [
    {{
      "name": "food name in English",
      "localized_name": "food name in {language}",
      "portion_size": "estimated portion size with unit (e.g., 100g or 250ml)",
      "category": "fruit | vegetable | protein | grain | dairy | nut | unknown"
    }}
  ]
}}"#,
            language = self.local_language
        )
    }

    fn request(&self, image: &[u8]) -> CompletionRequest {
        let data_url = format!(
            "data:{};base64,{}",
            sniff_mime(image),
            general_purpose::STANDARD.encode(image)
        );

        CompletionRequest {
            messages: vec![
                ChatMessage::system(self.system_prompt()),
                ChatMessage::user_with_image(
                    "Please analyze this food image and return ONLY the JSON object with food items.",
                    data_url,
                ),
            ],
            max_tokens: Some(MAX_OUTPUT_TOKENS),
            json_mode: true,
        }
    }

    pub async fn interpret(&self, image: &[u8]) -> Result<Vec<CandidateItem>, NutritionError> {
        if image.is_empty() {
            return Err(NutritionError::InvalidInput("image is empty".to_string()));
        }

        log::debug!(
            "📸 Analyzing food image ({} bytes, {}) with {}",
            image.len(),
            sniff_mime(image),
            self.client.model()
        );

        let content = self
            .client
            .complete(self.request(image))
            .await
            .map_err(|e| NutritionError::ImageAnalysis(format!("Failed to analyze food image: {}", e)))?;

        let items = parse_candidates(&content).map_err(|e| {
            log::error!("❌ Rejected image analysis: {}", e);
            e
        })?;

        log::info!("🍽️ Image analysis found {} food item(s)", items.len());
        Ok(items)
    }
}
