//! Behavior-driven tests for quote aggregation and comparison
//!
//! These tests verify WHAT a shopper sees when quotes for a material are
//! merged: the best in-stock price, the average, the savings, and the ranked
//! list after radius filtering.

use buildcompare_core::synthetic::RETAILERS;
use buildcompare_core::{
    aggregate, aggregate_with, CacheMode, DataMode, Location, Material, MaterialCategory,
    PriceQuery, PriceService, PricingConfig, RankingOptions, Region, SavingsFormula, SortKey,
    SupplierQuote, SyntheticGenerator, SyntheticPriceSource,
};
use std::sync::Arc;
use std::time::Duration;

fn cement(quantity: f64) -> Material {
    Material::new("m-cement", "PPC Surebuild Cement 50kg", MaterialCategory::Cement, quantity, "bag")
        .expect("valid material")
}

fn quote(id: &str, price: f64, in_stock: bool, distance_km: f64) -> SupplierQuote {
    SupplierQuote::new(id, id.to_uppercase(), price, in_stock, distance_km).expect("valid quote")
}

// =============================================================================
// Aggregation: Figures
// =============================================================================

#[test]
fn when_quotes_mix_stock_states_system_uses_only_in_stock_prices() {
    // Given: Two in-stock quotes and a cheaper-looking out-of-stock one
    let quotes = vec![
        quote("builders", 100.0, true, 5.0),
        quote("cashbuild", 150.0, true, 8.0),
        quote("leroy", 120.0, false, 3.0),
    ];

    // When: Two bags are compared
    let result = aggregate(cement(2.0), quotes);

    // Then: Best 100, average 125 and savings (125 - 100) * 2
    let best = result.best_price.as_ref().expect("best price");
    assert_eq!(best.price, 100.0);
    assert_eq!(best.supplier_id, "builders");
    assert_eq!(result.average_price, 125.0);
    assert_eq!(result.potential_savings_total, 50.0);
    assert_eq!(result.quotes.len(), 3, "raw quotes keep out-of-stock offers");
}

#[test]
fn when_same_quotes_are_aggregated_twice_system_returns_identical_results() {
    // Given: A quote list with awkward fractional prices
    let quotes = vec![
        quote("a", 99.99, true, 1.0).with_rating(4.2),
        quote("b", 101.37, true, 2.0),
        quote("c", 87.05, true, 12.5).with_delivery(350.0, 4),
    ];

    // When: The same input is aggregated twice
    let first = aggregate(cement(7.0), quotes.clone());
    let second = aggregate(cement(7.0), quotes);

    // Then: Every figure is bit-identical
    assert_eq!(first, second);
    assert_eq!(first.average_price.to_bits(), second.average_price.to_bits());
    assert_eq!(
        first.potential_savings_total.to_bits(),
        second.potential_savings_total.to_bits()
    );
}

#[test]
fn when_no_quotes_exist_system_returns_empty_result_without_error() {
    // Given: A material nobody quoted
    // When: It is aggregated
    let result = aggregate(cement(10.0), Vec::new());

    // Then: No best price, zero average and zero savings
    assert!(result.best_price.is_none());
    assert_eq!(result.average_price, 0.0);
    assert_eq!(result.potential_savings_total, 0.0);
    assert!(result.ranked(&RankingOptions::default()).is_empty());
}

#[test]
fn when_spread_formula_is_chosen_system_reports_max_minus_min() {
    // Given: The same quotes as the worked example
    let quotes = vec![
        quote("builders", 100.0, true, 5.0),
        quote("cashbuild", 150.0, true, 8.0),
        quote("leroy", 120.0, false, 3.0),
    ];

    // When: Savings use the max-vs-min formula
    let result = aggregate_with(cement(2.0), quotes, SavingsFormula::MaxVsMin);

    // Then: Savings are (150 - 100) * 2 and the other figures are unchanged
    assert_eq!(result.potential_savings_total, 100.0);
    assert_eq!(result.average_price, 125.0);
}

// =============================================================================
// Aggregation: Ranking
// =============================================================================

#[test]
fn when_radius_is_requested_system_drops_far_quotes_from_ranking_only() {
    // Given: One supplier 30 km away and one close by
    let result = aggregate(
        cement(1.0),
        vec![quote("far", 80.0, true, 30.0), quote("near", 95.0, true, 4.0)],
    );

    // When: The caller ranks within 20 km
    let ranked = result.ranked(&RankingOptions {
        radius_km: Some(20.0),
        sort: SortKey::Price,
    });

    // Then: The far quote is not ranked but remains in the raw quotes and figures
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].supplier_id, "near");
    assert!(result.quotes.iter().any(|quote| quote.distance_km == 30.0));
    assert_eq!(result.best_price.map(|quote| quote.supplier_id).as_deref(), Some("far"));
}

#[test]
fn when_sorting_by_price_system_keeps_arrival_order_for_ties() {
    // Given: Three quotes where two share a price
    let result = aggregate(
        cement(1.0),
        vec![
            quote("second-cheapest", 110.0, true, 1.0),
            quote("tie-first", 90.0, true, 1.0),
            quote("tie-second", 90.0, false, 1.0),
        ],
    );

    // When: Ranked by price
    let order: Vec<String> = result
        .ranked(&RankingOptions::default())
        .into_iter()
        .map(|quote| quote.supplier_id)
        .collect();

    // Then: Equal prices keep the order they arrived in
    assert_eq!(order, vec!["tie-first", "tie-second", "second-cheapest"]);
}

// =============================================================================
// Comparison: Multi-material Fan-out
// =============================================================================

fn slow_service(concurrency: usize) -> PriceService {
    let synthetic = Arc::new(SyntheticGenerator::with_seed(21));
    let config = PricingConfig {
        compare_concurrency: concurrency,
        ..PricingConfig::default()
    };
    RETAILERS
        .into_iter()
        .enumerate()
        .fold(PriceService::new(config, Arc::clone(&synthetic)), |service, (index, retailer)| {
            let latency = Duration::from_millis(40 * (3 - index as u64));
            service.with_source(Arc::new(
                SyntheticPriceSource::new(retailer, Arc::clone(&synthetic)).with_latency(latency),
            ))
        })
}

fn material(id: &str, name: &str, category: MaterialCategory) -> Material {
    Material::new(id, name, category, 3.0, "unit").expect("valid material")
}

#[tokio::test(start_paused = true)]
async fn when_many_materials_are_compared_system_preserves_request_order() {
    // Given: Six materials and sources with uneven latency
    let materials = vec![
        material("m-0", "Cement", MaterialCategory::Cement),
        material("m-1", "Face Brick", MaterialCategory::Bricks),
        material("m-2", "Rebar Y12", MaterialCategory::Steel),
        material("m-3", "Pine Timber", MaterialCategory::Timber),
        material("m-4", "Roof Sheeting", MaterialCategory::Roofing),
        material("m-5", "Weatherguard Paint", MaterialCategory::Paint),
    ];
    let service = slow_service(4);

    // When: They are compared with bounded concurrency
    let started = tokio::time::Instant::now();
    let report = service
        .compare_materials(materials, Location::Region(Region::Gauteng))
        .await;

    // Then: Results come back in request order, one quote per retailer
    assert_eq!(report.mode, DataMode::Live);
    let ids: Vec<&str> = report.results.iter().map(|result| result.material.id.as_str()).collect();
    assert_eq!(ids, vec!["m-0", "m-1", "m-2", "m-3", "m-4", "m-5"]);
    assert!(report.results.iter().all(|result| result.quotes.len() == 3));

    // And: Materials were priced concurrently rather than one after another
    assert!(started.elapsed() < Duration::from_millis(6 * 120));
}

#[tokio::test]
async fn when_every_source_comes_back_empty_system_labels_synthetic_fallback() {
    // Given: A service whose only source is throttled after the first call
    let config = PricingConfig {
        throttle_limit: 1,
        ..PricingConfig::default()
    };
    let synthetic = Arc::new(SyntheticGenerator::with_seed(8));
    let service = PriceService::new(config, Arc::clone(&synthetic))
        .with_source(Arc::new(SyntheticPriceSource::new(RETAILERS[1], synthetic)));
    let warm_up = PriceQuery::new("warm-up", Location::default()).expect("query");
    service.lookup(&warm_up, CacheMode::Bypass).await;

    // When: A material is compared with no budget left
    let report = service
        .compare_materials(
            vec![material("m-0", "Cement", MaterialCategory::Cement)],
            Location::Region(Region::CapeTown),
        )
        .await;

    // Then: Synthetic supplier quotes fill in and the report says so
    assert_eq!(report.mode, DataMode::MockFallback);
    assert_eq!(report.results[0].material.id, "m-0");
    assert_eq!(report.results[0].quotes.len(), 5);
    assert_eq!(report.results[0].quotes[0].supplier_id, "builders-sandton");
}
