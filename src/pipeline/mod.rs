pub mod formatter;
pub mod image;
pub mod normalizer;
pub mod portion;
pub mod resolver;

#[cfg(test)]
pub mod fakes;

pub use image::ImageInterpreter;
pub use normalizer::NameNormalizer;
pub use portion::parse_portion;
pub use resolver::NutrientResolver;

use futures_util::future::join_all;

use crate::error::NutritionError;
use crate::models::{AnalyzedItem, CandidateItem, FoodCategory, FoodDescription, NutrientVector, ParsedPortion};

/// Remove markdown code fences some models wrap around JSON replies.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_prefix = ["```json", "```JSON", "```"]
        .iter()
        .find_map(|fence| trimmed.strip_prefix(fence))
        .unwrap_or(trimmed);

    without_prefix
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}

/// Text and photo entry points over the four pipeline components.
///
/// Photos are resolved with `image_resolver` (local model, generative
/// estimate by default). Typed names go through `text_resolver`, which is
/// the reference database alone unless configured otherwise.
pub struct NutritionPipeline {
    normalizer: NameNormalizer,
    interpreter: ImageInterpreter,
    image_resolver: NutrientResolver,
    text_resolver: NutrientResolver,
}

impl NutritionPipeline {
    pub fn new(
        normalizer: NameNormalizer,
        interpreter: ImageInterpreter,
        image_resolver: NutrientResolver,
        text_resolver: NutrientResolver,
    ) -> Self {
        Self {
            normalizer,
            interpreter,
            image_resolver,
            text_resolver,
        }
    }

    pub async fn analyze(&self, description: FoodDescription) -> Result<Vec<AnalyzedItem>, NutritionError> {
        match description {
            FoodDescription::Text { name } => Ok(vec![self.analyze_text(&name).await?]),
            FoodDescription::Image { bytes } => self.analyze_image(&bytes).await,
        }
    }

    /// Normalize a possibly non-English name, then resolve it.
    pub async fn analyze_text(&self, name: &str) -> Result<AnalyzedItem, NutritionError> {
        let english = self.normalizer.normalize(name).await?;
        self.resolve_named(&english, name.trim()).await
    }

    /// Resolve an already-English name. Failure here is terminal.
    pub async fn resolve_named(&self, english: &str, localized: &str) -> Result<AnalyzedItem, NutritionError> {
        let portion = ParsedPortion::default();
        let resolution = self
            .text_resolver
            .resolve(english, portion.quantity, FoodCategory::Unknown, &portion.unit)
            .await?;

        Ok(AnalyzedItem {
            name: english.trim().to_string(),
            localized_name: if localized.is_empty() { english.trim() } else { localized }.to_string(),
            portion,
            category: FoodCategory::Unknown,
            nutrients: resolution.nutrients,
            reference: resolution.reference,
        })
    }

    /// Interpret a photo and resolve every detected item concurrently.
    /// A failed item gets an all-zero vector instead of failing the batch.
    pub async fn analyze_image(&self, image: &[u8]) -> Result<Vec<AnalyzedItem>, NutritionError> {
        let candidates = self.interpreter.interpret(image).await?;
        Ok(join_all(candidates.into_iter().map(|candidate| self.enrich(candidate))).await)
    }

    async fn enrich(&self, candidate: CandidateItem) -> AnalyzedItem {
        let portion = parse_portion(&candidate.portion_text);

        let (nutrients, reference) = match self
            .image_resolver
            .resolve(&candidate.name, portion.quantity, candidate.category, &portion.unit)
            .await
        {
            Ok(resolution) => (resolution.nutrients, resolution.reference),
            Err(e) => {
                log::warn!("⚠️ Using zero nutrients for '{}': {}", candidate.name, e);
                (NutrientVector::zero(), None)
            }
        };

        AnalyzedItem {
            name: candidate.name,
            localized_name: candidate.localized_name,
            portion,
            category: candidate.category,
            nutrients,
            reference,
        }
    }
}
