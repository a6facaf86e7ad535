use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{validate_non_negative, validate_positive, ValidationError};

/// Flat delivery fee assumed for listings that do not quote one.
pub const DEFAULT_DELIVERY_FEE: f64 = 150.0;

/// One supplier's offer for a requested material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierQuote {
    pub supplier_id: String,
    pub supplier_name: String,
    pub price: f64,
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
    pub distance_km: f64,
    pub delivery_fee_flat: f64,
    pub delivery_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl SupplierQuote {
    pub fn new(
        supplier_id: impl Into<String>,
        supplier_name: impl Into<String>,
        price: f64,
        in_stock: bool,
        distance_km: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_non_negative("distance_km", distance_km)?;

        Ok(Self {
            supplier_id: supplier_id.into(),
            supplier_name: supplier_name.into(),
            price,
            in_stock,
            stock_quantity: None,
            distance_km,
            delivery_fee_flat: DEFAULT_DELIVERY_FEE,
            delivery_days: if in_stock { 1 } else { 3 },
            rating: None,
        })
    }

    pub fn with_delivery(mut self, fee_flat: f64, days: u32) -> Self {
        self.delivery_fee_flat = fee_flat;
        self.delivery_days = days;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Converts the `index`-th listing of a price lookup into a quote.
    ///
    /// Listings carry no delivery terms, so the flat default fee applies and
    /// delivery takes one day when stocked and three otherwise. A listing
    /// without a distance is treated as being at the caller's location.
    pub fn from_listing(index: usize, listing: &PriceListing) -> Self {
        Self {
            supplier_id: format!("sup-{index}"),
            supplier_name: listing.supplier.clone(),
            price: listing.price,
            in_stock: listing.in_stock,
            stock_quantity: listing.stock_quantity,
            distance_km: listing.distance_km.unwrap_or(0.0),
            delivery_fee_flat: DEFAULT_DELIVERY_FEE,
            delivery_days: if listing.in_stock { 1 } else { 3 },
            rating: None,
        }
    }
}

/// Raw retailer listing as served by the price lookup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListing {
    pub supplier: String,
    pub product: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default = "OffsetDateTime::now_utc", with = "time::serde::rfc3339")]
    pub scraped_at: OffsetDateTime,
}

impl PriceListing {
    pub fn new(
        supplier: impl Into<String>,
        product: impl Into<String>,
        price: f64,
    ) -> Result<Self, ValidationError> {
        validate_positive("price", price)?;
        let supplier = supplier.into();
        if supplier.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "supplier" });
        }

        Ok(Self {
            supplier,
            product: product.into(),
            price,
            currency: default_currency(),
            in_stock: true,
            stock_quantity: None,
            link: None,
            distance_km: None,
            scraped_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn with_stock(mut self, in_stock: bool, stock_quantity: Option<u32>) -> Self {
        self.in_stock = in_stock;
        self.stock_quantity = stock_quantity;
        self
    }

    pub fn with_distance_km(mut self, distance_km: f64) -> Self {
        self.distance_km = Some(distance_km);
        self
    }

    /// Re-checks invariants on listings received from an upstream feed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_positive("price", self.price)?;
        validate_currency_code(&self.currency)?;
        if let Some(distance_km) = self.distance_km {
            validate_non_negative("distance_km", distance_km)?;
        }
        if self.supplier.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "supplier" });
        }
        Ok(())
    }
}

fn default_currency() -> String {
    String::from("ZAR")
}

const fn default_in_stock() -> bool {
    true
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_conversion_applies_delivery_defaults() {
        let listing = PriceListing::new("Cashbuild", "Cement - Value Pack", 99.5)
            .expect("valid listing")
            .with_stock(false, Some(0))
            .with_distance_km(12.5);

        let quote = SupplierQuote::from_listing(2, &listing);

        assert_eq!(quote.supplier_id, "sup-2");
        assert_eq!(quote.supplier_name, "Cashbuild");
        assert_eq!(quote.delivery_fee_flat, DEFAULT_DELIVERY_FEE);
        assert_eq!(quote.delivery_days, 3);
        assert_eq!(quote.distance_km, 12.5);
    }

    #[test]
    fn listing_deserializes_with_backend_defaults() {
        let listing: PriceListing = serde_json::from_str(
            r#"{"supplier":"Builders Warehouse","product":"Cement","price":120.0}"#,
        )
        .expect("minimal listing parses");

        assert_eq!(listing.currency, "ZAR");
        assert!(listing.in_stock);
        assert_eq!(listing.stock_quantity, None);
    }

    #[test]
    fn feed_listing_with_unknown_currency_fails_validation() {
        let listing: PriceListing = serde_json::from_str(
            r#"{"supplier":"Cashbuild","product":"Cement","price":99.0,"currency":"RAND"}"#,
        )
        .expect("listing parses");

        assert!(matches!(listing.validate(), Err(ValidationError::InvalidCurrency { .. })));
    }

    #[test]
    fn listing_rejects_zero_price() {
        let err = PriceListing::new("Cashbuild", "Sand", 0.0).expect_err("must fail");
        assert_eq!(err, ValidationError::NonPositiveValue { field: "price" });
    }

    #[test]
    fn validates_currency() {
        assert_eq!(validate_currency_code("zar").expect("must normalize"), "ZAR");
        assert!(matches!(
            validate_currency_code("RAND"),
            Err(ValidationError::InvalidCurrency { .. })
        ));
    }
}
