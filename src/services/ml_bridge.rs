use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Every artifact the local model set needs. Missing any one of them
/// disables the whole tier.
pub const REQUIRED_ARTIFACTS: [&str; 16] = [
    "calories_model.pkl",
    "protein_model.pkl",
    "fat_model.pkl",
    "carbohydrates_model.pkl",
    "fiber_model.pkl",
    "vitamin_a_model.pkl",
    "vitamin_c_model.pkl",
    "vitamin_d_model.pkl",
    "vitamin_e_model.pkl",
    "calcium_model.pkl",
    "iron_model.pkl",
    "potassium_model.pkl",
    "sodium_model.pkl",
    "scaler.pkl",
    "label_encoders.pkl",
    "feature_names.json",
];

const CLI_SCRIPT: &str = "nutrition_cli.py";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to start model process: {0}")]
    Spawn(String),

    #[error("Model process exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("No JSON output found in model prediction")]
    NoJson,

    #[error("Failed to parse model prediction output: {0}")]
    Parse(String),

    #[error("Inference service request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ModelStatus {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub food_name: String,
    pub portion_size: f64,
    pub food_category: String,
    pub portion_unit: String,
}

/// Out-of-process nutrient predictor.
#[async_trait::async_trait]
pub trait ModelBridge: Send + Sync {
    async fn check_availability(&self) -> ModelStatus;

    /// Raw prediction object, field names as the model emits them.
    async fn predict(&self, request: &PredictionRequest) -> Result<serde_json::Value, BridgeError>;

    /// Train the model set. Returns the training log on success.
    async fn train(&self) -> Result<String, BridgeError>;
}

/// All-or-nothing probe of a model directory.
pub fn check_manifest(models_dir: &Path) -> ModelStatus {
    let entries = match std::fs::read_dir(models_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ModelStatus::unavailable("Models directory not found");
        }
        Err(e) => return ModelStatus::unavailable(format!("Error checking models: {}", e)),
    };

    let present: Vec<String> = entries
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();

    let missing: Vec<&str> = REQUIRED_ARTIFACTS
        .iter()
        .copied()
        .filter(|artifact| !present.iter().any(|p| p == artifact))
        .collect();

    if missing.is_empty() {
        ModelStatus::available()
    } else {
        ModelStatus::unavailable(format!("Missing model files: {}", missing.join(", ")))
    }
}

/// Find the first balanced `{...}` block in mixed process output.
/// Braces inside JSON strings are ignored.
pub fn extract_json_object(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in output[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&output[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a prediction payload out of raw stdout.
pub fn parse_prediction_output(stdout: &str) -> Result<serde_json::Value, BridgeError> {
    let json = extract_json_object(stdout).ok_or(BridgeError::NoJson)?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| BridgeError::Parse(e.to_string()))?;

    if !value.is_object() {
        return Err(BridgeError::Parse("prediction is not a JSON object".to_string()));
    }
    Ok(value)
}

/// Spawns the model CLI once per call. A crashing model only fails that call.
pub struct SubprocessBridge {
    ml_dir: PathBuf,
    python: String,
}

impl SubprocessBridge {
    pub fn new(ml_dir: impl Into<PathBuf>, python: impl Into<String>) -> Self {
        Self {
            ml_dir: ml_dir.into(),
            python: python.into(),
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        self.ml_dir.join("models")
    }

    fn predict_args(request: &PredictionRequest) -> Vec<String> {
        vec![
            CLI_SCRIPT.to_string(),
            "predict".to_string(),
            "--food-name".to_string(),
            request.food_name.clone(),
            "--portion-size".to_string(),
            request.portion_size.to_string(),
            "--food-category".to_string(),
            request.food_category.clone(),
            "--portion-unit".to_string(),
            request.portion_unit.clone(),
            "--json-output".to_string(),
        ]
    }

    async fn run(&self, args: &[String]) -> Result<String, BridgeError> {
        let output = Command::new(&self.python)
            .args(args)
            .current_dir(&self.ml_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BridgeError::Spawn(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            log::debug!("🐍 Model process stderr: {}", stderr);
        }

        if !output.status.success() {
            return Err(BridgeError::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl ModelBridge for SubprocessBridge {
    async fn check_availability(&self) -> ModelStatus {
        let models_dir = self.models_dir();
        tokio::task::spawn_blocking(move || check_manifest(&models_dir))
            .await
            .unwrap_or_else(|e| ModelStatus::unavailable(format!("Error checking models: {}", e)))
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<serde_json::Value, BridgeError> {
        log::info!(
            "🧠 Local model prediction: {}{} of {} ({})",
            request.portion_size,
            request.portion_unit,
            request.food_name,
            request.food_category
        );

        let stdout = self.run(&Self::predict_args(request)).await?;
        parse_prediction_output(&stdout)
    }

    async fn train(&self) -> Result<String, BridgeError> {
        log::info!("🏋️ Training local nutrition models in {}", self.ml_dir.display());
        let output = self
            .run(&[CLI_SCRIPT.to_string(), "train".to_string()])
            .await?;
        log::info!("✅ Local nutrition models trained");
        Ok(output)
    }
}

/// Typed client for a long-lived inference service on loopback, which
/// avoids a process spawn per prediction.
pub struct HttpModelBridge {
    base_url: String,
    client: reqwest::Client,
}

impl HttpModelBridge {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: Option<&PredictionRequest>,
    ) -> Result<serde_json::Value, BridgeError> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BridgeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let stderr = response.text().await.unwrap_or_default();
            return Err(BridgeError::Exit {
                code: Some(status.as_u16() as i32),
                stderr,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BridgeError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ModelBridge for HttpModelBridge {
    async fn check_availability(&self) -> ModelStatus {
        let response = match self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ModelStatus::unavailable(format!("Inference service unreachable: {}", e)),
        };

        response
            .json::<ModelStatus>()
            .await
            .unwrap_or_else(|e| ModelStatus::unavailable(format!("Invalid status response: {}", e)))
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<serde_json::Value, BridgeError> {
        log::info!(
            "🧠 Inference service prediction: {}{} of {}",
            request.portion_size,
            request.portion_unit,
            request.food_name
        );

        let value = self.post_json("/predict", Some(request)).await?;
        if !value.is_object() {
            return Err(BridgeError::Parse("prediction is not a JSON object".to_string()));
        }
        Ok(value)
    }

    async fn train(&self) -> Result<String, BridgeError> {
        let value = self.post_json("/train", None).await?;
        Ok(value.to_string())
    }
}

/// Train the models if the manifest is incomplete. Never fails; returns
/// whether the tier is usable afterwards.
pub async fn initialize_models(bridge: &dyn ModelBridge) -> bool {
    let status = bridge.check_availability().await;
    if status.available {
        log::info!("✅ Local nutrition models already available");
        return true;
    }

    log::info!(
        "🚀 Initializing local nutrition models ({})",
        status.reason.as_deref().unwrap_or("unavailable")
    );

    match bridge.train().await {
        Ok(_) => {
            let available = bridge.check_availability().await.available;
            if !available {
                log::warn!("⚠️ Training finished but the model manifest is still incomplete");
            }
            available
        }
        Err(e) => {
            log::error!("❌ Failed to initialize local nutrition models: {}", e);
            false
        }
    }
}
