pub mod database;
pub mod ml_bridge; // Local model bridge (subprocess or loopback HTTP)
pub mod openrouter; // OpenRouter chat completions
pub mod usda; // FoodData Central search

pub use database::Database;
pub use ml_bridge::{initialize_models, HttpModelBridge, ModelBridge, SubprocessBridge};
pub use openrouter::OpenRouterService;
pub use usda::UsdaClient;
