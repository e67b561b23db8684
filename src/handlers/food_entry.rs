use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use super::summary::build_report;
use crate::error::NutritionError;
use crate::models::{AnalyzedItem, EntryReport, FoodDescription, FoodEntry};
use crate::pipeline::NutritionPipeline;
use crate::services::database::FoodEntrySink;

#[derive(Debug, Clone, Serialize)]
pub struct StoredItem {
    pub id: i64,
    #[serde(flatten)]
    pub item: AnalyzedItem,
}

/// Food-entry use cases: resolve through the pipeline, then persist.
pub struct FoodEntryHandler {
    pipeline: Arc<NutritionPipeline>,
    sink: Arc<dyn FoodEntrySink>,
}

impl FoodEntryHandler {
    pub fn new(pipeline: Arc<NutritionPipeline>, sink: Arc<dyn FoodEntrySink>) -> Self {
        Self { pipeline, sink }
    }

    /// Log a typed food. Only the localized name given: translate it first.
    pub async fn add_text_entry(
        &self,
        user_id: i64,
        food_name: Option<&str>,
        localized_name: Option<&str>,
    ) -> Result<StoredItem> {
        let food_name = food_name.map(str::trim).filter(|s| !s.is_empty());
        let localized_name = localized_name.map(str::trim).filter(|s| !s.is_empty());

        log::info!(
            "📨 Text entry from user {}: name={:?}, localized={:?}",
            user_id,
            food_name,
            localized_name
        );

        let item = match (food_name, localized_name) {
            (Some(english), localized) => {
                self.pipeline
                    .resolve_named(english, localized.unwrap_or(english))
                    .await?
            }
            (None, Some(localized)) => self.pipeline.analyze_text(localized).await?,
            (None, None) => {
                return Err(NutritionError::InvalidInput("food_name or localized name is required".to_string()).into())
            }
        };

        let id = self.sink.store(&FoodEntry::from_item(user_id, &item)).await?;
        log::info!("✅ Food entry {} saved: {} ({} kcal)", id, item.name, item.nutrients.calories);

        Ok(StoredItem { id, item })
    }

    /// Log every food found in a photo, zero-filled items included.
    pub async fn add_image_entry(&self, user_id: i64, image: Vec<u8>) -> Result<Vec<StoredItem>> {
        log::info!("📸 Image entry from user {} ({} bytes)", user_id, image.len());

        let items = self.pipeline.analyze(FoodDescription::Image { bytes: image }).await?;

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let id = self.sink.store(&FoodEntry::from_item(user_id, &item)).await?;
            stored.push(StoredItem { id, item });
        }

        let total: i64 = stored.iter().map(|s| s.item.nutrients.calories).sum();
        log::info!("✅ Saved {} item(s) from image, {} kcal total", stored.len(), total);
        Ok(stored)
    }

    pub async fn list_entries(&self, user_id: i64, range: Option<(NaiveDate, NaiveDate)>) -> Result<EntryReport> {
        let entries = self.sink.entries(user_id, range).await?;
        Ok(build_report(entries))
    }

    pub async fn delete_entry(&self, user_id: i64, id: i64) -> Result<bool> {
        let deleted = self.sink.delete(user_id, id).await?;
        if !deleted {
            log::warn!("⚠️ Food entry {} not found for user {}", id, user_id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fakes::{FakeBridge, FakeReference, MemorySink, Reply, ScriptedCompletion};
    use crate::pipeline::resolver::{GenerativeSource, LocalModelSource, ReferenceDbSource};
    use crate::pipeline::{ImageInterpreter, NameNormalizer, NutrientResolver};
    use serde_json::json;

    struct Harness {
        handler: FoodEntryHandler,
        sink: Arc<MemorySink>,
        text_llm: Arc<ScriptedCompletion>,
    }

    fn harness(text_llm: ScriptedCompletion, vision_reply: &str) -> Harness {
        let text_llm = Arc::new(text_llm);
        let vision = Arc::new(ScriptedCompletion::new().with_default(Reply::Text(vision_reply.to_string())));
        let reference = Arc::new(FakeReference::with_food(json!({
            "fdcId": 173944,
            "description": "Bananas, raw",
            "servingSize": 118.0,
            "servingSizeUnit": "g",
            "foodNutrients": [{"nutrientId": 1008, "value": 89.0}, {"nutrientId": 1003, "value": 1.09}]
        })));
        let bridge = Arc::new(FakeBridge::available(json!({"calories": 105.0, "protein": 1.3})));

        let pipeline = NutritionPipeline::new(
            NameNormalizer::new(text_llm.clone(), "Somali"),
            ImageInterpreter::new(vision, "Somali"),
            NutrientResolver::new(vec![
                Arc::new(LocalModelSource::new(bridge)),
                Arc::new(GenerativeSource::new(text_llm.clone())),
            ]),
            NutrientResolver::new(vec![Arc::new(ReferenceDbSource::new(reference))]),
        );

        let sink = Arc::new(MemorySink::default());
        Harness {
            handler: FoodEntryHandler::new(Arc::new(pipeline), sink.clone()),
            sink,
            text_llm,
        }
    }

    #[tokio::test]
    async fn test_english_name_skips_translation() {
        let h = harness(ScriptedCompletion::new(), "{}");

        let stored = h.handler.add_text_entry(7, Some("banana"), None).await.unwrap();

        assert_eq!(stored.id, 1);
        assert_eq!(stored.item.nutrients.calories, 89);
        assert_eq!(h.text_llm.calls(), 0);

        let entries = h.sink.stored();
        assert_eq!(entries[0].user_id, 7);
        assert_eq!(entries[0].localized_name, "banana");
        assert_eq!(entries[0].fdc_id, Some(173944));
        assert_eq!(entries[0].fdc_description.as_deref(), Some("Bananas, raw"));
        assert_eq!(entries[0].serving_size, Some(118.0));
        assert_eq!(entries[0].serving_unit.as_deref(), Some("g"));
    }

    #[tokio::test]
    async fn test_localized_name_is_translated() {
        let h = harness(ScriptedCompletion::new().with_reply("moos", Reply::Text("Banana".to_string())), "{}");

        let stored = h.handler.add_text_entry(7, None, Some("moos")).await.unwrap();

        assert_eq!(stored.item.name, "Banana");
        assert_eq!(stored.item.localized_name, "moos");
        assert_eq!(h.text_llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_names_rejected() {
        let h = harness(ScriptedCompletion::new(), "{}");

        let err = h.handler.add_text_entry(7, Some("  "), None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NutritionError>(),
            Some(NutritionError::InvalidInput(_))
        ));
        assert!(h.sink.stored().is_empty());
    }

    #[tokio::test]
    async fn test_image_entry_stores_each_item() {
        let vision = r#"{"food_items": [
            {"name": "Banana", "localized_name": "Moos", "portion_size": "120g", "category": "fruit"},
            {"name": "Tea", "localized_name": "Shaah", "portion_size": "250ml", "category": "unknown"}
        ]}"#;
        let h = harness(ScriptedCompletion::new(), vision);

        let stored = h.handler.add_image_entry(3, vec![0xFF, 0xD8]).await.unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].item.portion.unit, "ml");
        assert_eq!(h.sink.stored().len(), 2);
        assert_eq!(h.sink.stored()[0].portion_size, 120.0);

        let report = h.handler.list_entries(3, None).await.unwrap();
        assert_eq!(report.overall_summary.calories, 210);
        assert!(h.handler.delete_entry(3, stored[0].id).await.unwrap());
        assert!(!h.handler.delete_entry(4, stored[1].id).await.unwrap());
    }
}
