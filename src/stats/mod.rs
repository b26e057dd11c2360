mod types;

pub use types::{trend_sentence, BrewStats, NO_FAVORITE_PLACEHOLDER, NO_TREND_PLACEHOLDER};

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};

use crate::models::CoffeeEntry;

const WEEKLY_WINDOW_DAYS: i64 = 7;

/// Summary metrics for the dashboard.
///
/// `entries` must already be newest first; the trend names the first entry.
/// `now` is passed in so the weekly window never depends on a hidden clock.
pub fn compute_stats(entries: &[CoffeeEntry], now: DateTime<Utc>) -> BrewStats {
    let Some(most_recent) = entries.first() else {
        return BrewStats::default();
    };

    let cutoff = now - Duration::days(WEEKLY_WINDOW_DAYS);
    let weekly_count = entries.iter().filter(|entry| entry.date >= cutoff).count();

    let rating_sum: f64 = entries
        .iter()
        .map(|entry| entry.taste.headline_rating())
        .sum();
    let average_rating = round_one_decimal(rating_sum / entries.len() as f64);

    BrewStats {
        total_entries: entries.len(),
        weekly_count,
        favorite_bean: favorite_bean(entries)
            .unwrap_or(NO_FAVORITE_PLACEHOLDER)
            .to_string(),
        average_rating,
        recent_trend: trend_sentence(&most_recent.bean_type),
    }
}

/// Most frequent bean type. On a tie the bean seen first in `entries` wins.
pub fn favorite_bean(entries: &[CoffeeEntry]) -> Option<&str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        counts
            .entry(entry.bean_type.as_str())
            .or_insert((index, 0))
            .1 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (a_first, a_count)), (_, (b_first, b_count))| {
            a_count.cmp(b_count).then(b_first.cmp(a_first))
        })
        .map(|(bean, _)| bean)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Caches the last `compute_stats` result.
///
/// The cache key is the identity of the snapshot `Arc` plus `now`. The
/// repository swaps in a new `Arc` on every load, so a reload always
/// recomputes while repeated reads of the same snapshot do not.
#[derive(Default)]
pub struct StatsMemo {
    key: Option<(Arc<Vec<CoffeeEntry>>, DateTime<Utc>)>,
    stats: BrewStats,
    computations: u64,
}

impl StatsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, entries: &Arc<Vec<CoffeeEntry>>, now: DateTime<Utc>) -> &BrewStats {
        let fresh = matches!(
            &self.key,
            Some((cached, cached_now)) if Arc::ptr_eq(cached, entries) && *cached_now == now
        );
        if !fresh {
            self.computations += 1;
            self.stats = compute_stats(entries, now);
            self.key = Some((Arc::clone(entries), now));
        }
        &self.stats
    }

    pub fn computations(&self) -> u64 {
        self.computations
    }
}
