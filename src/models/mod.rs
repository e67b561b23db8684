use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What a caller hands to the pipeline: a typed-in food name or a photo.
#[derive(Debug, Clone)]
pub enum FoodDescription {
    Text { name: String },
    Image { bytes: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Fruit,
    Vegetable,
    Protein,
    Grain,
    Dairy,
    Nut,
    Unknown,
}

impl std::fmt::Display for FoodCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FoodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodCategory::Fruit => "fruit",
            FoodCategory::Vegetable => "vegetable",
            FoodCategory::Protein => "protein",
            FoodCategory::Grain => "grain",
            FoodCategory::Dairy => "dairy",
            FoodCategory::Nut => "nut",
            FoodCategory::Unknown => "unknown",
        }
    }

    /// Lenient label mapping for upstream output. Anything unrecognized is `Unknown`.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fruit" | "fruits" => FoodCategory::Fruit,
            "vegetable" | "vegetables" => FoodCategory::Vegetable,
            "protein" | "meat" | "fish" => FoodCategory::Protein,
            "grain" | "grains" | "cereal" => FoodCategory::Grain,
            "dairy" => FoodCategory::Dairy,
            "nut" | "nuts" => FoodCategory::Nut,
            _ => FoodCategory::Unknown,
        }
    }
}

/// One food detected in a photo, before nutrient resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub name: String,
    pub localized_name: String,
    pub portion_text: String,
    pub category: FoodCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPortion {
    pub quantity: f64,
    pub unit: String,
}

impl Default for ParsedPortion {
    fn default() -> Self {
        Self {
            quantity: 100.0,
            unit: "g".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitamins {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
    #[serde(rename = "E")]
    pub e: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Minerals {
    pub calcium: f64,
    pub iron: f64,
    pub potassium: f64,
    pub sodium: f64,
}

/// Canonical nutrient output. Every field is always populated; missing
/// upstream values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientVector {
    pub calories: i64,
    pub protein: f64,
    pub fat: f64,
    pub carbohydrates: f64,
    pub fiber: f64,
    pub vitamins: Vitamins,
    pub minerals: Minerals,
}

impl NutrientVector {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Every numeric field in a fixed order, calories first.
    pub fn fields(&self) -> [f64; 13] {
        [
            self.calories as f64,
            self.protein,
            self.fat,
            self.carbohydrates,
            self.fiber,
            self.vitamins.a,
            self.vitamins.c,
            self.vitamins.d,
            self.vitamins.e,
            self.minerals.calcium,
            self.minerals.iron,
            self.minerals.potassium,
            self.minerals.sodium,
        ]
    }
}

/// A ranked strategy in the resolver's fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    LocalModel,
    Generative,
    ReferenceDb,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::LocalModel => "local_model",
            Tier::Generative => "generative",
            Tier::ReferenceDb => "reference_db",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local_model" | "ml" => Ok(Tier::LocalModel),
            "generative" | "generative_fallback" => Ok(Tier::Generative),
            "reference_db" | "usda" => Ok(Tier::ReferenceDb),
            other => Err(format!("unknown nutrition tier: {}", other)),
        }
    }
}

/// Request-scoped record of one tier attempt. Only logged, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionAttempt {
    pub tier: Tier,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

/// Reference-database provenance for a resolved vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFood {
    pub fdc_id: i64,
    pub description: String,
    pub serving_size: f64,
    pub serving_unit: String,
}

/// Output of a successful resolve: the vector plus which tier produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub nutrients: NutrientVector,
    pub tier: Tier,
    pub reference: Option<ReferenceFood>,
    pub attempts: Vec<ResolutionAttempt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedItem {
    pub name: String,
    pub localized_name: String,
    pub portion: ParsedPortion,
    pub category: FoodCategory,
    pub nutrients: NutrientVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceFood>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: Option<i64>,
    pub user_id: i64,
    pub food_name: String,
    pub localized_name: String,
    pub portion_size: f64,
    pub portion_unit: String,
    pub nutrients: NutrientVector,
    pub fdc_id: Option<i64>,
    pub fdc_description: Option<String>,
    pub serving_size: Option<f64>,
    pub serving_unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FoodEntry {
    pub fn from_item(user_id: i64, item: &AnalyzedItem) -> Self {
        let reference = item.reference.as_ref();
        Self {
            id: None,
            user_id,
            food_name: item.name.clone(),
            localized_name: item.localized_name.clone(),
            portion_size: item.portion.quantity,
            portion_unit: item.portion.unit.clone(),
            nutrients: item.nutrients,
            fdc_id: reference.map(|r| r.fdc_id),
            fdc_description: reference.map(|r| r.description.clone()),
            serving_size: reference.map(|r| r.serving_size),
            serving_unit: reference.map(|r| r.serving_unit.clone()),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: i64,
    pub protein: f64,
    pub fat: f64,
    pub carbohydrates: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: String,
    pub entries: Vec<FoodEntry>,
    pub summary: MacroTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryReport {
    pub daily_summaries: Vec<DailySummary>,
    pub overall_summary: MacroTotals,
    pub averages: MacroTotals,
}
