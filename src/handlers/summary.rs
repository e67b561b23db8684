use std::collections::BTreeMap;

use crate::models::{DailySummary, EntryReport, FoodEntry, MacroTotals};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn total(entries: &[FoodEntry]) -> MacroTotals {
    let sum = entries.iter().fold(MacroTotals::default(), |acc, entry| MacroTotals {
        calories: acc.calories + entry.nutrients.calories,
        protein: acc.protein + entry.nutrients.protein,
        fat: acc.fat + entry.nutrients.fat,
        carbohydrates: acc.carbohydrates + entry.nutrients.carbohydrates,
    });

    MacroTotals {
        calories: sum.calories,
        protein: round2(sum.protein),
        fat: round2(sum.fat),
        carbohydrates: round2(sum.carbohydrates),
    }
}

/// Group entries by UTC day (newest day first) with per-day and overall
/// totals plus per-day averages.
pub fn build_report(entries: Vec<FoodEntry>) -> EntryReport {
    let mut by_day: BTreeMap<String, Vec<FoodEntry>> = BTreeMap::new();
    for entry in entries {
        let day = entry.created_at.format("%Y-%m-%d").to_string();
        by_day.entry(day).or_default().push(entry);
    }

    let daily_summaries: Vec<DailySummary> = by_day
        .into_iter()
        .rev()
        .map(|(date, entries)| DailySummary {
            summary: total(&entries),
            date,
            entries,
        })
        .collect();

    let overall = daily_summaries.iter().fold(MacroTotals::default(), |acc, day| MacroTotals {
        calories: acc.calories + day.summary.calories,
        protein: acc.protein + day.summary.protein,
        fat: acc.fat + day.summary.fat,
        carbohydrates: acc.carbohydrates + day.summary.carbohydrates,
    });
    let overall_summary = MacroTotals {
        protein: round2(overall.protein),
        fat: round2(overall.fat),
        carbohydrates: round2(overall.carbohydrates),
        ..overall
    };

    let days = daily_summaries.len().max(1) as f64;
    let averages = MacroTotals {
        calories: (overall_summary.calories as f64 / days).round() as i64,
        protein: round2(overall_summary.protein / days),
        fat: round2(overall_summary.fat / days),
        carbohydrates: round2(overall_summary.carbohydrates / days),
    };

    EntryReport {
        daily_summaries,
        overall_summary,
        averages,
    }
}
