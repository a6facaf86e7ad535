//! Synthetic suppliers, quotes, listings and materials.
//!
//! Used as the offline retailer feed and as the fallback when live analysis
//! or pricing yields nothing. Every value produced here is fabricated; callers
//! label responses built from it as `mock` or `mock-fallback`. Seed the
//! generator for reproducible output.

use std::sync::{Mutex, PoisonError};

use time::OffsetDateTime;

use crate::domain::{Material, MaterialCategory, PriceListing, Region, SupplierQuote};

/// Supplier record backing synthetic quotes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSupplier {
    pub id: &'static str,
    pub name: &'static str,
    pub province: &'static str,
    pub rating: f64,
    /// Chains charge a fixed delivery fee; independents vary.
    pub chain: bool,
}

pub const SUPPLIERS: [SyntheticSupplier; 10] = [
    SyntheticSupplier { id: "builders-sandton", name: "Builders Warehouse", province: "Gauteng", rating: 4.5, chain: true },
    SyntheticSupplier { id: "builders-fourways", name: "Builders Warehouse", province: "Gauteng", rating: 4.4, chain: true },
    SyntheticSupplier { id: "leroy-midrand", name: "Leroy Merlin", province: "Gauteng", rating: 4.3, chain: true },
    SyntheticSupplier { id: "leroy-greenstone", name: "Leroy Merlin", province: "Gauteng", rating: 4.2, chain: true },
    SyntheticSupplier { id: "cashbuild-midrand", name: "Cashbuild", province: "Gauteng", rating: 4.2, chain: true },
    SyntheticSupplier { id: "cashbuild-roodepoort", name: "Cashbuild", province: "Gauteng", rating: 4.0, chain: true },
    SyntheticSupplier { id: "mica-randburg", name: "Mica Hardware", province: "Gauteng", rating: 4.1, chain: true },
    SyntheticSupplier { id: "local-jhb-supplies", name: "JHB Building Supplies", province: "Gauteng", rating: 4.6, chain: false },
    SyntheticSupplier { id: "local-pretoria", name: "Pretoria Builders Yard", province: "Gauteng", rating: 4.4, chain: false },
    SyntheticSupplier { id: "local-capetown", name: "Cape Town Materials Co.", province: "Western Cape", rating: 4.4, chain: false },
];

/// Retailer whose listings the synthetic feed fabricates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRetailer {
    pub id: &'static str,
    pub name: &'static str,
    pub product_suffix: &'static str,
    pub min_price: f64,
    pub max_price: f64,
    pub link: &'static str,
}

pub const RETAILERS: [SyntheticRetailer; 3] = [
    SyntheticRetailer {
        id: "builders-warehouse",
        name: "Builders Warehouse",
        product_suffix: "Standard Grade",
        min_price: 80.0,
        max_price: 450.0,
        link: "https://www.builders.co.za",
    },
    SyntheticRetailer {
        id: "cashbuild",
        name: "Cashbuild",
        product_suffix: "Value Pack",
        min_price: 70.0,
        max_price: 420.0,
        link: "https://www.cashbuild.co.za",
    },
    SyntheticRetailer {
        id: "leroy-merlin",
        name: "Leroy Merlin",
        product_suffix: "Premium Quality",
        min_price: 90.0,
        max_price: 500.0,
        link: "https://leroymerlin.co.za",
    },
];

const SUPPLIERS_PER_QUOTE_SET: usize = 5;
const MIN_REGIONAL_SUPPLIERS: usize = 4;

/// Typical unit price in ZAR for a category.
pub const fn category_base_price(category: MaterialCategory) -> f64 {
    match category {
        MaterialCategory::Cement => 125.0,
        MaterialCategory::Bricks => 3.5,
        MaterialCategory::Steel => 185.0,
        MaterialCategory::Timber => 95.0,
        MaterialCategory::Plumbing => 250.0,
        MaterialCategory::Electrical => 180.0,
        MaterialCategory::Paint => 850.0,
        MaterialCategory::Roofing => 320.0,
        MaterialCategory::Tiles => 45.0,
        MaterialCategory::Hardware => 75.0,
        MaterialCategory::Labor | MaterialCategory::Other => 100.0,
    }
}

/// Base price for a material, refined by hints in its name.
pub fn base_price(material: &Material) -> f64 {
    let name = material.name.to_lowercase();
    let large_tin = name.contains("20l");

    if name.contains("primer") {
        if large_tin { 1150.0 } else { 350.0 }
    } else if name.contains("paint") || name.contains("dulux") || name.contains("plascon") {
        if large_tin { 1600.0 } else { 450.0 }
    } else if name.contains("cement") {
        110.0
    } else if name.contains("brick") {
        3.5
    } else {
        category_base_price(material.category)
    }
}

/// Seedable generator for synthetic data.
#[derive(Debug)]
pub struct SyntheticGenerator {
    rng: Mutex<fastrand::Rng>,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn with_rng<R>(&self, f: impl FnOnce(&mut fastrand::Rng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Quotes from up to five suppliers for `material`, priced within ±15% of its base price.
    pub fn quotes_for(&self, material: &Material, region: Region) -> Vec<SupplierQuote> {
        let base = base_price(material);
        let regional: Vec<&SyntheticSupplier> = SUPPLIERS
            .iter()
            .filter(|supplier| region.province().is_none_or(|province| supplier.province == province))
            .collect();
        let suppliers: Vec<&SyntheticSupplier> = if regional.len() >= MIN_REGIONAL_SUPPLIERS {
            regional.into_iter().take(SUPPLIERS_PER_QUOTE_SET).collect()
        } else {
            SUPPLIERS.iter().take(SUPPLIERS_PER_QUOTE_SET).collect()
        };

        self.with_rng(|rng| {
            suppliers
                .into_iter()
                .zip(1u32..)
                .map(|(supplier, delivery_days)| {
                    let variance = (rng.f64() - 0.5) * 0.3;
                    let delivery_fee = if supplier.chain {
                        350.0
                    } else {
                        f64::from(200 + rng.u32(0..150))
                    };
                    SupplierQuote {
                        supplier_id: supplier.id.to_owned(),
                        supplier_name: supplier.name.to_owned(),
                        price: round_to(base * (1.0 + variance), 2),
                        in_stock: rng.f64() > 0.2,
                        stock_quantity: Some(rng.u32(50..550)),
                        distance_km: round_to(5.0 + rng.f64() * 25.0, 1),
                        delivery_fee_flat: delivery_fee,
                        delivery_days,
                        rating: Some(supplier.rating),
                    }
                })
                .collect()
        })
    }

    /// One fabricated listing from `retailer` for `query`.
    pub fn listing(&self, retailer: &SyntheticRetailer, query: &str) -> PriceListing {
        self.with_rng(|rng| {
            let price = round_to(
                retailer.min_price + rng.f64() * (retailer.max_price - retailer.min_price),
                2,
            );
            let (in_stock, stock_quantity) = match retailer.id {
                "builders-warehouse" => (true, rng.u32(50..=500)),
                "cashbuild" => (true, rng.u32(30..=300)),
                _ => {
                    let in_stock = rng.bool();
                    let stock = if rng.f64() > 0.3 { rng.u32(10..=200) } else { 0 };
                    (in_stock, stock)
                }
            };

            PriceListing {
                supplier: retailer.name.to_owned(),
                product: format!("{} - {}", capitalize(query.trim()), retailer.product_suffix),
                price,
                currency: String::from("ZAR"),
                in_stock,
                stock_quantity: Some(stock_quantity),
                link: Some(retailer.link.to_owned()),
                distance_km: None,
                scraped_at: OffsetDateTime::now_utc(),
            }
        })
    }

    /// Plausible materials for an uploaded photo, chosen from hints in its file name.
    pub fn materials_for_file(&self, file_name: &str) -> Vec<Material> {
        let name = file_name.to_lowercase();
        let set = if name.contains("paint") || name.contains("decor") {
            2
        } else if name.contains("structure") || name.contains("slab") {
            1
        } else if name.contains("wall") || name.contains("brick") {
            0
        } else {
            self.with_rng(|rng| rng.usize(0..MATERIAL_SETS.len()))
        };

        MATERIAL_SETS[set]
            .iter()
            .enumerate()
            .map(|(index, (name, brand, category, quantity, unit))| Material {
                id: format!("mock-{}-{index}", uuid::Uuid::new_v4()),
                name: (*name).to_owned(),
                brand: Some((*brand).to_owned()),
                category: *category,
                quantity: *quantity,
                unit: (*unit).to_owned(),
            })
            .collect()
    }
}

type MaterialSeed = (&'static str, &'static str, MaterialCategory, f64, &'static str);

const MATERIAL_SETS: [[MaterialSeed; 3]; 3] = [
    [
        ("PPC Surebuild Cement 50kg", "PPC", MaterialCategory::Cement, 60.0, "bags"),
        ("Corobrik Satin Face Brick", "Corobrik", MaterialCategory::Bricks, 5000.0, "units"),
        ("Building Sand (Bulk)", "Generic", MaterialCategory::Other, 6.0, "m³"),
    ],
    [
        ("AfriSam All Purpose Cement", "AfriSam", MaterialCategory::Cement, 20.0, "bags"),
        ("Macsteel Ref 193 Mesh", "Macsteel", MaterialCategory::Steel, 15.0, "sheets"),
        ("Y12 Steel Rebar (6m)", "ArcelorMittal", MaterialCategory::Steel, 30.0, "bars"),
    ],
    [
        ("Dulux Weatherguard 20L", "Dulux", MaterialCategory::Paint, 5.0, "buckets"),
        ("Paint Roller Set", "Academy", MaterialCategory::Other, 3.0, "sets"),
        ("Polyfilla Exterior 2kg", "Polycell", MaterialCategory::Other, 10.0, "boxes"),
    ],
];

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn capitalize(value: &str) -> String {
    let lowered = value.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
