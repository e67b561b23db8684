// Without the HTTP surface the handler layer has no caller.
#![cfg_attr(not(feature = "http-server"), allow(dead_code))]

mod config;
mod error;
mod handlers;
mod models;
mod pipeline;
mod services;
#[cfg(feature = "http-server")]
mod server; // REST API over the food-entry handler

use anyhow::{Context, Result};
use std::sync::Arc;

use config::Config;
use handlers::FoodEntryHandler;
use models::Tier;
use pipeline::{ImageInterpreter, NameNormalizer, NutrientResolver, NutritionPipeline};
use services::{
    initialize_models, Database, HttpModelBridge, ModelBridge, OpenRouterService, SubprocessBridge, UsdaClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting nutrition tracker...");

    let config = Config::from_env()?;

    let db = Arc::new(Database::new(&config.database_url).await?);
    log::info!("✅ PostgreSQL database initialized");

    let text_llm = Arc::new(OpenRouterService::with_base_url(
        config.openrouter_api_key.clone(),
        config.openrouter_model.clone(),
        config.openrouter_base_url.clone(),
    ));
    log::info!("✅ OpenRouter service initialized with model: {}", config.openrouter_model);

    let vision = Arc::new(OpenRouterService::with_base_url(
        config.vision_api_key.clone(),
        config.vision_model.clone(),
        config.vision_base_url.clone(),
    ));
    log::info!("✅ Vision service initialized with model: {}", config.vision_model);

    let usda = Arc::new(UsdaClient::with_base_url(
        config.usda_api_key.clone(),
        config.usda_base_url.clone(),
    ));

    let bridge: Arc<dyn ModelBridge> = match &config.ml_service_url {
        Some(url) => {
            log::info!("🧠 Using inference service at {}", url);
            Arc::new(HttpModelBridge::new(url.clone()))
        }
        None => {
            log::info!("🧠 Using model subprocess in {}", config.ml_dir.display());
            Arc::new(SubprocessBridge::new(config.ml_dir.clone(), config.ml_python.clone()))
        }
    };

    if config.train_on_startup
        && config.nutrition_tiers.contains(&Tier::LocalModel)
        && !initialize_models(bridge.as_ref()).await
    {
        log::warn!("⚠️ Local model tier disabled until models are trained");
    }

    let image_resolver =
        NutrientResolver::from_tiers(&config.nutrition_tiers, bridge.clone(), text_llm.clone(), usda.clone());
    let text_resolver = NutrientResolver::from_tiers(&[Tier::ReferenceDb], bridge.clone(), text_llm.clone(), usda);
    log::info!("✅ Image nutrition tiers: {:?}", image_resolver.tiers());

    let pipeline = Arc::new(NutritionPipeline::new(
        NameNormalizer::new(text_llm, config.local_language.clone()),
        ImageInterpreter::new(vision, config.local_language.clone()),
        image_resolver,
        text_resolver,
    ));

    let handler = Arc::new(FoodEntryHandler::new(pipeline, db));
    log::info!("✅ Food entry handler initialized");

    #[cfg(not(feature = "http-server"))]
    {
        log::warn!("⚠️ Built without http-server, {} will not be served", config.bind_addr);
        drop(handler);
    }

    #[cfg(feature = "http-server")]
    {
        let app = server::create_router(handler, bridge);
        let listener = tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

        log::info!("🌐 HTTP server starting on {}", config.bind_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ HTTP server stopped: {}", e);
            }
        });
    }

    log::info!("🎉 Nutrition tracker is ready!");

    // Keep running
    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;

    log::info!("🛑 Shutting down...");

    Ok(())
}
