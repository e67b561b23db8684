use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use crate::models::Tier;
use crate::services::{openrouter, usda};

pub const DEFAULT_TEXT_MODEL: &str = "deepseek/deepseek-r1:free";
pub const DEFAULT_VISION_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_TIERS: [Tier; 2] = [Tier::LocalModel, Tier::Generative];

#[derive(Debug, Clone)]
pub struct Config {
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    pub vision_api_key: String,
    pub vision_model: String,
    pub vision_base_url: String,
    pub usda_api_key: String,
    pub usda_base_url: String,
    pub database_url: String,
    pub ml_dir: PathBuf,
    pub ml_python: String,
    pub ml_service_url: Option<String>,
    pub nutrition_tiers: Vec<Tier>,
    pub train_on_startup: bool,
    pub bind_addr: String,
    pub local_language: String,
}

/// Parse a comma list such as `local_model,generative`. Blank entries are skipped.
pub fn parse_tiers(value: &str) -> Result<Vec<Tier>> {
    let tiers = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Tier>().map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;

    if tiers.is_empty() {
        return Err(anyhow!("NUTRITION_TIERS must name at least one tier"));
    }
    Ok(tiers)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{}'", other)),
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).with_context(|| format!("{} must be set", key));

        let openrouter_api_key = require("OPENROUTER_API_KEY")?;
        let openrouter_base_url =
            get("OPENROUTER_BASE_URL").unwrap_or_else(|| openrouter::DEFAULT_BASE_URL.to_string());

        let nutrition_tiers = match get("NUTRITION_TIERS") {
            Some(value) => parse_tiers(&value).context("invalid NUTRITION_TIERS")?,
            None => DEFAULT_TIERS.to_vec(),
        };

        let train_on_startup = match get("ML_TRAIN_ON_STARTUP") {
            Some(value) => parse_bool(&value).context("invalid ML_TRAIN_ON_STARTUP")?,
            None => true,
        };

        Ok(Self {
            vision_api_key: get("VISION_API_KEY").unwrap_or_else(|| openrouter_api_key.clone()),
            vision_model: get("VISION_MODEL").unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            vision_base_url: get("VISION_BASE_URL").unwrap_or_else(|| openrouter_base_url.clone()),
            openrouter_model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            openrouter_api_key,
            openrouter_base_url,
            usda_api_key: require("USDA_API_KEY")?,
            usda_base_url: get("USDA_BASE_URL").unwrap_or_else(|| usda::DEFAULT_BASE_URL.to_string()),
            database_url: require("DATABASE_URL")?,
            ml_dir: PathBuf::from(get("ML_DIR").unwrap_or_else(|| "ml".to_string())),
            ml_python: get("ML_PYTHON").unwrap_or_else(|| "python".to_string()),
            ml_service_url: get("ML_SERVICE_URL"),
            nutrition_tiers,
            train_on_startup,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            local_language: get("LOCAL_LANGUAGE").unwrap_or_else(|| "Somali".to_string()),
        })
    }
}
