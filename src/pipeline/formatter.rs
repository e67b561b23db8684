//! Maps each upstream payload shape onto the canonical [`NutrientVector`].
//!
//! Every source spells its fields differently (`fat` vs `fats`,
//! `vitamin_a` vs `vitamins.A`, numeric nutrient IDs for the reference
//! database). Each shape is a row in a locator table laid out in the
//! order of [`NutrientVector::fields`]; adding a source means adding a table.

use serde_json::Value;

use crate::models::{Minerals, NutrientVector, Tier, Vitamins};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    LocalModel,
    Generative,
    ReferenceDb,
}

impl From<Tier> for SourceShape {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::LocalModel => SourceShape::LocalModel,
            Tier::Generative => SourceShape::Generative,
            Tier::ReferenceDb => SourceShape::ReferenceDb,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Locator {
    Path(&'static [&'static str]),
    NutrientId(u64),
}

type FieldTable = [Locator; 13];

const LOCAL_MODEL_FIELDS: FieldTable = [
    Locator::Path(&["calories"]),
    Locator::Path(&["protein"]),
    Locator::Path(&["fat"]),
    Locator::Path(&["carbohydrates"]),
    Locator::Path(&["fiber"]),
    Locator::Path(&["vitamin_a"]),
    Locator::Path(&["vitamin_c"]),
    Locator::Path(&["vitamin_d"]),
    Locator::Path(&["vitamin_e"]),
    Locator::Path(&["calcium"]),
    Locator::Path(&["iron"]),
    Locator::Path(&["potassium"]),
    Locator::Path(&["sodium"]),
];

const GENERATIVE_FIELDS: FieldTable = [
    Locator::Path(&["calories"]),
    Locator::Path(&["protein"]),
    Locator::Path(&["fats"]),
    Locator::Path(&["carbs"]),
    Locator::Path(&["fiber"]),
    Locator::Path(&["vitamins", "A"]),
    Locator::Path(&["vitamins", "C"]),
    Locator::Path(&["vitamins", "D"]),
    Locator::Path(&["vitamins", "E"]),
    Locator::Path(&["minerals", "calcium"]),
    Locator::Path(&["minerals", "iron"]),
    Locator::Path(&["minerals", "potassium"]),
    Locator::Path(&["minerals", "sodium"]),
];

// FoodData Central nutrient IDs.
const REFERENCE_DB_FIELDS: FieldTable = [
    Locator::NutrientId(1008), // energy, kcal
    Locator::NutrientId(1003),
    Locator::NutrientId(1004),
    Locator::NutrientId(1005),
    Locator::NutrientId(1079),
    Locator::NutrientId(1104),
    Locator::NutrientId(1162),
    Locator::NutrientId(1114),
    Locator::NutrientId(1109),
    Locator::NutrientId(1087),
    Locator::NutrientId(1089),
    Locator::NutrientId(1092),
    Locator::NutrientId(1093),
];

impl SourceShape {
    fn table(self) -> &'static FieldTable {
        match self {
            SourceShape::LocalModel => &LOCAL_MODEL_FIELDS,
            SourceShape::Generative => &GENERATIVE_FIELDS,
            SourceShape::ReferenceDb => &REFERENCE_DB_FIELDS,
        }
    }
}

/// Coerce anything that is not a finite, non-negative number to zero.
/// Numeric strings are accepted.
fn sanitize(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}

fn locate<'a>(raw: &'a Value, locator: Locator) -> Option<&'a Value> {
    match locator {
        Locator::Path(path) => path.iter().try_fold(raw, |node, key| node.get(*key)),
        Locator::NutrientId(id) => raw
            .get("foodNutrients")?
            .as_array()?
            .iter()
            .find(|n| n.get("nutrientId").and_then(Value::as_u64) == Some(id))?
            .get("value"),
    }
}

fn from_fields(fields: [f64; 13]) -> NutrientVector {
    let [calories, protein, fat, carbohydrates, fiber, a, c, d, e, calcium, iron, potassium, sodium] =
        fields;

    NutrientVector {
        calories: calories.round() as i64,
        protein,
        fat,
        carbohydrates,
        fiber,
        vitamins: Vitamins { a, c, d, e },
        minerals: Minerals {
            calcium,
            iron,
            potassium,
            sodium,
        },
    }
}

/// Pure mapping from a raw upstream payload to the canonical vector.
pub fn format(raw: &Value, shape: SourceShape) -> NutrientVector {
    let table = shape.table();
    from_fields(std::array::from_fn(|i| sanitize(locate(raw, table[i]))))
}

/// Multiply every field by `factor` (used for per-100 g reference values).
pub fn scale(vector: &NutrientVector, factor: f64) -> NutrientVector {
    let factor = if factor.is_finite() && factor > 0.0 { factor } else { 0.0 };
    from_fields(vector.fields().map(|v| v * factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHAPES: [SourceShape; 3] = [
        SourceShape::LocalModel,
        SourceShape::Generative,
        SourceShape::ReferenceDb,
    ];

    fn assert_zero_filled(v: &NutrientVector) {
        for field in v.fields() {
            assert!(field.is_finite() && field >= 0.0, "bad field {field} in {v:?}");
        }
    }

    #[test]
    fn test_local_model_shape() {
        let raw = json!({
            "calories": 52.4, "protein": 0.3, "fat": 0.2, "carbohydrates": 13.8,
            "fiber": 2.4, "vitamin_a": 3.0, "vitamin_c": 4.6, "vitamin_d": 0.0,
            "vitamin_e": 0.18, "calcium": 6.0, "iron": 0.12, "potassium": 107.0, "sodium": 1.0
        });
        let v = format(&raw, SourceShape::LocalModel);

        assert_eq!(v.calories, 52);
        assert_eq!(v.fat, 0.2);
        assert_eq!(v.carbohydrates, 13.8);
        assert_eq!(v.vitamins.c, 4.6);
        assert_eq!(v.minerals.potassium, 107.0);
    }

    #[test]
    fn test_generative_shape() {
        let raw = json!({
            "calories": 206, "protein": 4.3, "fats": 0.4, "carbs": 44.5, "fiber": 0.6,
            "vitamins": {"A": 0, "C": 0, "D": 0, "E": 0.1},
            "minerals": {"calcium": 16, "iron": 1.9, "potassium": 55, "sodium": 2}
        });
        let v = format(&raw, SourceShape::Generative);

        assert_eq!(v.calories, 206);
        assert_eq!(v.fat, 0.4);
        assert_eq!(v.carbohydrates, 44.5);
        assert_eq!(v.vitamins.e, 0.1);
        assert_eq!(v.minerals.iron, 1.9);
    }

    #[test]
    fn test_reference_db_nutrient_ids() {
        let raw = json!({
            "fdcId": 171688,
            "description": "Apples, raw, with skin",
            "foodNutrients": [
                {"nutrientId": 1003, "value": 0.26},
                {"nutrientId": 1004, "value": 0.17},
                {"nutrientId": 1005, "value": 13.81},
                {"nutrientId": 1008, "value": 52.0},
                {"nutrientId": 1079, "value": 2.4},
                {"nutrientId": 1162, "value": 4.6},
                {"nutrientId": 1093, "value": 1.0},
                {"nutrientId": 9999, "value": 500.0}
            ]
        });
        let v = format(&raw, SourceShape::ReferenceDb);

        assert_eq!(v.calories, 52);
        assert_eq!(v.protein, 0.26);
        assert_eq!(v.fat, 0.17);
        assert_eq!(v.carbohydrates, 13.81);
        assert_eq!(v.fiber, 2.4);
        assert_eq!(v.vitamins.c, 4.6);
        assert_eq!(v.vitamins.a, 0.0);
        assert_eq!(v.minerals.sodium, 1.0);
    }

    #[test]
    fn test_zero_fill_for_every_shape() {
        let inputs = [
            json!({}),
            json!(null),
            json!({"calories": null, "protein": "n/a", "fat": -3.0, "fats": [1],
                   "vitamins": null, "minerals": {"iron": {"x": 1}},
                   "foodNutrients": [{"nutrientId": 1008}, {"nutrientId": 1003, "value": "abc"}]}),
            json!({"foodNutrients": "oops"}),
        ];

        for shape in SHAPES {
            for raw in &inputs {
                let v = format(raw, shape);
                assert_zero_filled(&v);
                assert!(v.is_zero(), "{shape:?} on {raw} produced {v:?}");
            }
        }
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let v = format(&json!({"calories": "130.6", "protein": " 2.5 "}), SourceShape::LocalModel);
        assert_eq!(v.calories, 131);
        assert_eq!(v.protein, 2.5);
    }

    #[test]
    fn test_format_is_deterministic() {
        let raw = json!({"calories": 99.5, "protein": 1.1, "vitamins": {"A": 0.3}});
        for shape in SHAPES {
            let first = format(&raw, shape);
            let second = format(&raw, shape);
            assert_eq!(first, second);
            assert_eq!(
                first.fields().map(f64::to_bits),
                second.fields().map(f64::to_bits)
            );
        }
    }

    #[test]
    fn test_scale() {
        let raw = json!({"calories": 52, "protein": 0.26, "calcium": 6.0});
        let v = scale(&format(&raw, SourceShape::LocalModel), 1.5);
        assert_eq!(v.calories, 78);
        assert!((v.protein - 0.39).abs() < 1e-9);
        assert_eq!(v.minerals.calcium, 9.0);

        assert!(scale(&v, f64::NAN).is_zero());
    }
}
