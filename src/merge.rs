use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::category::Category;
use crate::parser::{DigitTally, DrawAggregate};
use crate::store::AggregateStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueStat {
    pub count: u32,
    /// Draws the value appeared in, recorded or not.
    pub draws: u32,
    /// First contributing dates in fold order, up to the date cap.
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFrequency {
    pub category: Category,
    pub values: BTreeMap<String, ValueStat>,
    pub digits: Vec<DigitTally>,
}

impl CategoryFrequency {
    fn new(category: Category) -> Self {
        Self {
            category,
            values: BTreeMap::new(),
            digits: vec![[0; 10]; category.value_len()],
        }
    }

    /// Values by descending count, ties broken by value.
    pub fn ranked(&self) -> Vec<(&str, &ValueStat)> {
        let mut ranked: Vec<(&str, &ValueStat)> =
            self.values.iter().map(|(v, s)| (v.as_str(), s)).collect();
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn total(&self) -> u32 {
        self.values.values().map(|s| s.count).sum()
    }
}

/// Frequency tables over a set of draws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedFrequency {
    pub categories: BTreeMap<Category, CategoryFrequency>,
    /// Display strings of each merged draw, untouched.
    pub display_results: BTreeMap<NaiveDate, BTreeMap<Category, String>>,
    pub draws: Vec<NaiveDate>,
}

impl MergedFrequency {
    pub fn category(&self, category: Category) -> Option<&CategoryFrequency> {
        self.categories.get(&category)
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.draws.iter().min()?, *self.draws.iter().max()?))
    }
}

/// Folds the aggregates of `dates` into frequency tables.
///
/// Dates are folded in the order given; a repeated date is folded once and
/// dates missing from the store are ignored. Each value records at most
/// `date_cap` contributing dates, the first ones seen.
pub fn merge(store: &AggregateStore, dates: &[NaiveDate], date_cap: usize) -> MergedFrequency {
    let start_time = Instant::now();

    let mut seen = HashSet::with_capacity(dates.len());
    let aggregates: Vec<Arc<DrawAggregate>> = dates
        .iter()
        .filter(|d| seen.insert(**d))
        .filter_map(|d| store.get(*d))
        .collect();

    let categories: BTreeMap<Category, CategoryFrequency> = Category::ALL
        .par_iter()
        .map(|&category| (category, fold_category(category, &aggregates, date_cap)))
        .collect();

    let display_results = aggregates
        .iter()
        .map(|agg| (agg.date, agg.display_results.clone()))
        .collect();
    let draws = aggregates.iter().map(|agg| agg.date).collect();

    info!(
        action = "complete",
        component = "merge_engine",
        draw_count = aggregates.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Merged frequency tables"
    );

    MergedFrequency {
        categories,
        display_results,
        draws,
    }
}

fn fold_category(category: Category, aggregates: &[Arc<DrawAggregate>], date_cap: usize) -> CategoryFrequency {
    let mut frequency = CategoryFrequency::new(category);

    for agg in aggregates {
        if let Some(counts) = agg.value_counts.get(&category) {
            for (value, count) in counts {
                let stat = frequency.values.entry(value.clone()).or_default();
                stat.count += count;
                stat.draws += 1;
                if stat.dates.len() < date_cap {
                    stat.dates.push(agg.date);
                }
            }
        }

        if let Some(digits) = agg.digit_counts.get(&category) {
            for (merged, tally) in frequency.digits.iter_mut().zip(digits) {
                for (total, n) in merged.iter_mut().zip(tally) {
                    *total += n;
                }
            }
        }
    }

    frequency
}
