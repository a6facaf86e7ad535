//! Quote aggregation for one material.
//!
//! [`aggregate`] is pure: the same material and quotes always give the same
//! result, and nothing here touches a random source or the clock. Only
//! in-stock quotes count toward the best price, the average and the savings.
//! Radius filtering and sorting are presentation concerns applied by
//! [`ComparisonResult::ranked`]; they never change the aggregate figures.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Material, SupplierQuote};
use crate::ValidationError;

/// How potential savings are derived from in-stock prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsFormula {
    /// `(average - best) * quantity`, never negative.
    #[default]
    AverageVsBest,
    /// `(max - min) * quantity`.
    MaxVsMin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Price,
    Distance,
    Rating,
    Delivery,
}

impl SortKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Distance => "distance",
            Self::Rating => "rating",
            Self::Delivery => "delivery",
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "distance" => Ok(Self::Distance),
            "rating" => Ok(Self::Rating),
            "delivery" => Ok(Self::Delivery),
            other => Err(ValidationError::InvalidSortKey {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankingOptions {
    /// Quotes farther than this are left out of the ranked list.
    pub radius_km: Option<f64>,
    pub sort: SortKey,
}

/// Aggregate view of every quote received for one material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub material: Material,
    /// Every quote received, unfiltered and in arrival order.
    pub quotes: Vec<SupplierQuote>,
    /// Cheapest in-stock quote; absent when nothing is in stock.
    pub best_price: Option<SupplierQuote>,
    pub average_price: f64,
    pub potential_savings_total: f64,
}

impl ComparisonResult {
    /// Quotes within the radius, sorted by `options.sort`. Ties keep arrival order.
    pub fn ranked(&self, options: &RankingOptions) -> Vec<SupplierQuote> {
        let mut ranked: Vec<SupplierQuote> = self
            .quotes
            .iter()
            .filter(|quote| options.radius_km.is_none_or(|radius| quote.distance_km <= radius))
            .cloned()
            .collect();

        match options.sort {
            SortKey::Price => ranked.sort_by(|a, b| a.price.total_cmp(&b.price)),
            SortKey::Distance => ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km)),
            SortKey::Rating => ranked.sort_by(|a, b| rating_descending(a.rating, b.rating)),
            SortKey::Delivery => ranked.sort_by_key(|quote| quote.delivery_days),
        }
        ranked
    }
}

fn rating_descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Aggregates with the default savings formula.
pub fn aggregate(material: Material, quotes: Vec<SupplierQuote>) -> ComparisonResult {
    aggregate_with(material, quotes, SavingsFormula::default())
}

pub fn aggregate_with(
    material: Material,
    quotes: Vec<SupplierQuote>,
    formula: SavingsFormula,
) -> ComparisonResult {
    let in_stock: Vec<&SupplierQuote> = quotes.iter().filter(|quote| quote.in_stock).collect();

    // First occurrence wins ties.
    let best_price = in_stock
        .iter()
        .copied()
        .reduce(|best, quote| if quote.price < best.price { quote } else { best })
        .cloned();

    let average = if in_stock.is_empty() {
        0.0
    } else {
        in_stock.iter().map(|quote| quote.price).sum::<f64>() / in_stock.len() as f64
    };

    let savings_per_unit = match (&best_price, formula) {
        (None, _) => 0.0,
        (Some(best), SavingsFormula::AverageVsBest) => (average - best.price).max(0.0),
        (Some(best), SavingsFormula::MaxVsMin) => {
            let max = in_stock
                .iter()
                .map(|quote| quote.price)
                .fold(best.price, f64::max);
            max - best.price
        }
    };

    ComparisonResult {
        average_price: average,
        potential_savings_total: savings_per_unit * material.quantity,
        best_price,
        material,
        quotes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MaterialCategory;

    fn material(quantity: f64) -> Material {
        Material::new("m-1", "PPC Surebuild Cement 50kg", MaterialCategory::Cement, quantity, "bag")
            .expect("valid material")
    }

    fn quote(id: &str, price: f64, in_stock: bool, distance_km: f64) -> SupplierQuote {
        SupplierQuote::new(id, id, price, in_stock, distance_km).expect("valid quote")
    }

    #[test]
    fn max_vs_min_uses_price_spread() {
        let result = aggregate_with(
            material(2.0),
            vec![quote("a", 100.0, true, 1.0), quote("b", 150.0, true, 1.0), quote("c", 90.0, false, 1.0)],
            SavingsFormula::MaxVsMin,
        );
        assert_eq!(result.potential_savings_total, 100.0);
    }

    #[test]
    fn average_keeps_full_precision() {
        let result = aggregate(
            material(3.0),
            vec![quote("a", 100.0, true, 1.0), quote("b", 100.0, true, 1.0), quote("c", 101.0, true, 1.0)],
        );
        assert_eq!(result.average_price, 301.0 / 3.0);
        assert_eq!(result.potential_savings_total, (301.0 / 3.0 - 100.0) * 3.0);
    }

    #[test]
    fn ties_keep_first_quote() {
        let result = aggregate(
            material(1.0),
            vec![quote("first", 100.0, true, 1.0), quote("second", 100.0, true, 1.0)],
        );
        assert_eq!(result.best_price.map(|q| q.supplier_id).as_deref(), Some("first"));
    }

    #[test]
    fn nothing_in_stock_has_no_best_price() {
        let result = aggregate(material(3.0), vec![quote("a", 80.0, false, 1.0)]);
        assert!(result.best_price.is_none());
        assert_eq!(result.average_price, 0.0);
        assert_eq!(result.potential_savings_total, 0.0);
        assert_eq!(result.quotes.len(), 1);
    }

    #[test]
    fn rating_sort_puts_unrated_last_and_is_stable() {
        let result = aggregate(
            material(1.0),
            vec![
                quote("unrated-1", 10.0, true, 1.0),
                quote("good", 11.0, true, 1.0).with_rating(4.5),
                quote("best", 12.0, true, 1.0).with_rating(4.8),
                quote("unrated-2", 13.0, true, 1.0),
                quote("good-2", 14.0, true, 1.0).with_rating(4.5),
            ],
        );

        let order: Vec<String> = result
            .ranked(&RankingOptions {
                radius_km: None,
                sort: SortKey::Rating,
            })
            .into_iter()
            .map(|q| q.supplier_id)
            .collect();
        assert_eq!(order, vec!["best", "good", "good-2", "unrated-1", "unrated-2"]);
    }

    #[test]
    fn delivery_and_distance_sorts_ascend() {
        let result = aggregate(
            material(1.0),
            vec![
                quote("far", 10.0, true, 25.0).with_delivery(350.0, 2),
                quote("near", 20.0, false, 3.0).with_delivery(150.0, 3),
                quote("mid", 15.0, true, 9.0).with_delivery(200.0, 1),
            ],
        );

        let ids = |sort| -> Vec<String> {
            result
                .ranked(&RankingOptions { radius_km: None, sort })
                .into_iter()
                .map(|q| q.supplier_id)
                .collect()
        };
        assert_eq!(ids(SortKey::Distance), vec!["near", "mid", "far"]);
        assert_eq!(ids(SortKey::Delivery), vec!["mid", "far", "near"]);
        assert_eq!(ids(SortKey::Price), vec!["far", "mid", "near"]);
    }

    #[test]
    fn sort_key_parses_case_insensitively() {
        assert_eq!("Rating".parse::<SortKey>(), Ok(SortKey::Rating));
        assert!(matches!(
            "cheapest".parse::<SortKey>(),
            Err(ValidationError::InvalidSortKey { .. })
        ));
    }
}
