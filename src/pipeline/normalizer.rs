use std::sync::Arc;

use crate::error::NutritionError;
use crate::services::openrouter::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};

/// Turns a food name in English or the configured local language into a
/// canonical English name. No retries; callers decide what to do on failure.
pub struct NameNormalizer {
    client: Arc<dyn CompletionClient>,
    local_language: String,
}

impl NameNormalizer {
    pub fn new(client: Arc<dyn CompletionClient>, local_language: impl Into<String>) -> Self {
        Self {
            client,
            local_language: local_language.into(),
        }
    }

    fn request(&self, name: &str) -> CompletionRequest {
        let language = &self.local_language;
        CompletionRequest {
            messages: vec![
                ChatMessage::system(format!(
                    "You are a helpful assistant that determines if a food name is in English or {language} \
                     and translates {language} food names to English. Only respond with the English food name, nothing else."
                )),
                ChatMessage::user(format!(
                    "Is \"{name}\" in English? If yes, return it as is. If it's in {language}, translate it to English. \
                     Only respond with the English food name."
                )),
            ],
            ..Default::default()
        }
    }

    pub async fn normalize(&self, name: &str) -> Result<String, NutritionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NutritionError::InvalidInput("food name is empty".to_string()));
        }

        let translated = self.client.complete(self.request(name)).await.map_err(|e| {
            log::error!("❌ Translation error for '{}': {}", name, e);
            match e {
                CompletionError::Unauthorized => {
                    NutritionError::TranslationService("Invalid API key".to_string())
                }
                CompletionError::EmptyContent | CompletionError::Malformed(_) => {
                    NutritionError::TranslationService("invalid response".to_string())
                }
                other => NutritionError::TranslationService(format!("Failed to translate food name: {}", other)),
            }
        })?;

        let translated = translated.trim().to_string();
        if translated.is_empty() {
            return Err(NutritionError::TranslationService("invalid response".to_string()));
        }

        log::info!("🌍 Normalized '{}' -> '{}'", name, translated);
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fakes::{Reply, ScriptedCompletion};

    fn normalizer(client: ScriptedCompletion) -> (NameNormalizer, Arc<ScriptedCompletion>) {
        let client = Arc::new(client);
        (NameNormalizer::new(client.clone(), "Somali"), client)
    }

    #[tokio::test]
    async fn test_translates_and_trims() {
        let (normalizer, client) =
            normalizer(ScriptedCompletion::new().with_reply("bariis", Reply::Text(" Rice\n".to_string())));

        assert_eq!(normalizer.normalize("bariis").await.unwrap(), "Rice");

        let request = client.last_request().unwrap();
        assert_eq!(request.messages[0].role, "system");
        assert!(!request.json_mode);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_translation_error() {
        let (normalizer, _) = normalizer(ScriptedCompletion::new().with_default(Reply::Unauthorized));

        match normalizer.normalize("hilib").await {
            Err(NutritionError::TranslationService(message)) => assert_eq!(message, "Invalid API key"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_response() {
        let (normalizer, _) = normalizer(ScriptedCompletion::new().with_default(Reply::Empty));

        match normalizer.normalize("caano").await {
            Err(NutritionError::TranslationService(message)) => assert_eq!(message, "invalid response"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let (normalizer, _) = normalizer(ScriptedCompletion::new().with_default(Reply::Fail("boom".to_string())));
        assert!(matches!(
            normalizer.normalize("moos").await,
            Err(NutritionError::TranslationService(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_name_skips_upstream() {
        let (normalizer, client) = normalizer(ScriptedCompletion::new());
        assert!(matches!(
            normalizer.normalize("   ").await,
            Err(NutritionError::InvalidInput(_))
        ));
        assert_eq!(client.calls(), 0);
    }
}
