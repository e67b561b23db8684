use thiserror::Error;

/// Failures that leave the nutrition pipeline. Each variant names the
/// external capability that could not deliver.
#[derive(Debug, Error)]
pub enum NutritionError {
    #[error("Translation service error: {0}")]
    TranslationService(String),

    #[error("Image analysis error: {0}")]
    ImageAnalysis(String),

    #[error("Nutrition data unavailable: {0}")]
    NutritionUnavailable(String),

    #[error("Local model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Failed to parse local model output: {0}")]
    MlPredictionParse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl NutritionError {
    /// Short machine-readable label, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            NutritionError::TranslationService(_) => "translation_service_error",
            NutritionError::ImageAnalysis(_) => "image_analysis_error",
            NutritionError::NutritionUnavailable(_) => "nutrition_unavailable",
            NutritionError::ModelUnavailable(_) => "model_unavailable",
            NutritionError::MlPredictionParse(_) => "ml_prediction_parse_error",
            NutritionError::InvalidInput(_) => "invalid_input",
        }
    }
}
