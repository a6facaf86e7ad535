//! # Domain Models
//!
//! Canonical domain types for material price comparison.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Material`] | Requested material line with quantity |
//! | [`MaterialCategory`] | Material category |
//! | [`SupplierQuote`] | One supplier's offer for a material |
//! | [`PriceListing`] | Raw retailer listing from a price lookup |
//! | [`Region`] | Named delivery region |
//! | [`Location`] | Region or coordinates with radius |
//! | [`DataMode`] | Whether a response is live or synthetic |
//!
//! Constructors validate numeric invariants (finite, non-negative prices and
//! distances, positive quantities) and return [`ValidationError`](crate::ValidationError).

mod location;
mod material;
mod mode;
mod quote;

pub use location::{Coordinates, Location, Region};
pub use material::{Material, MaterialCategory};
pub use mode::DataMode;
pub use quote::{validate_currency_code, PriceListing, SupplierQuote, DEFAULT_DELIVERY_FEE};
