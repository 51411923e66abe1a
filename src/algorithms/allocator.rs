//! Price-band allocation for personalized recommendations.
//!
//! A request for `N` products is split into three price bands around the
//! visitor's average observed price. Each band is queried separately; the
//! results are merged, deduplicated, optionally shuffled and cut to `N`.

use crate::models::{Product, ProductId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Budget,
    Upsell,
    Value,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Budget, Band::Upsell, Band::Value];

    /// Share of the requested count, in percent.
    pub fn share_percent(&self) -> usize {
        match self {
            Band::Budget => 60,
            Band::Upsell => 30,
            Band::Value => 10,
        }
    }

    /// Price range as multipliers of the average price, both ends inclusive.
    pub fn price_factors(&self) -> (f64, f64) {
        match self {
            Band::Budget => (0.8, 1.2),
            Band::Upsell => (1.2, 1.5),
            Band::Value => (0.5, 0.8),
        }
    }

    /// `ceil(share * limit)` computed on integers, so exact products such as
    /// 30% of 10 stay at 3 instead of picking up float rounding (`10.0 * 0.3 > 3.0`).
    pub fn sub_count(&self, limit: usize) -> usize {
        (self.share_percent() * limit + 99) / 100
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationInput {
    pub average_price: f64,
    pub top_categories: Vec<String>,
    pub top_brands: Vec<String>,
    pub limit: usize,
}

impl AllocationInput {
    /// Zero, negative or non-finite averages mean nothing is known about the visitor.
    pub fn is_unknown_visitor(&self) -> bool {
        !(self.average_price.is_finite() && self.average_price > 0.0)
    }
}

/// One catalog query derived from an allocation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandQuery {
    pub band: Band,
    pub min_price: f64,
    pub max_price: f64,
    pub count: usize,
}

pub fn plan_bands(average_price: f64, limit: usize) -> Vec<BandQuery> {
    Band::ALL
        .iter()
        .map(|band| {
            let (low, high) = band.price_factors();
            BandQuery {
                band: *band,
                min_price: average_price * low,
                max_price: average_price * high,
                count: band.sub_count(limit),
            }
        })
        .collect()
}

/// Concatenates band results in band order, keeps the first occurrence of each
/// product id, then shuffles unless `preserve_order` is set, and truncates to `limit`.
pub fn merge_bands<R: Rng + ?Sized>(
    bands: Vec<Vec<Product>>,
    limit: usize,
    preserve_order: bool,
    rng: &mut R,
) -> Vec<Product> {
    let mut seen: HashSet<ProductId> = HashSet::new();
    let mut merged: Vec<Product> = bands
        .into_iter()
        .flatten()
        .filter(|product| seen.insert(product.id))
        .collect();

    if !preserve_order {
        merged.shuffle(rng);
    }

    merged.truncate(limit);
    merged
}
