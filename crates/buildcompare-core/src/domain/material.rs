use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{validate_positive, ValidationError};

/// Material category used for pricing heuristics and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialCategory {
    Cement,
    Bricks,
    Steel,
    Timber,
    Plumbing,
    Electrical,
    Paint,
    Roofing,
    Tiles,
    Hardware,
    Labor,
    Other,
}

impl MaterialCategory {
    pub const ALL: [Self; 12] = [
        Self::Cement,
        Self::Bricks,
        Self::Steel,
        Self::Timber,
        Self::Plumbing,
        Self::Electrical,
        Self::Paint,
        Self::Roofing,
        Self::Tiles,
        Self::Hardware,
        Self::Labor,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cement => "cement",
            Self::Bricks => "bricks",
            Self::Steel => "steel",
            Self::Timber => "timber",
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Paint => "paint",
            Self::Roofing => "roofing",
            Self::Tiles => "tiles",
            Self::Hardware => "hardware",
            Self::Labor => "labor",
            Self::Other => "other",
        }
    }

    /// Lenient parse used for model output: unknown labels become `Other`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::Other)
    }
}

impl Display for MaterialCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialCategory {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or(())
    }
}

/// A requested material line: what to price and how much of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub category: MaterialCategory,
    pub quantity: f64,
    pub unit: String,
}

impl Material {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: MaterialCategory,
        quantity: f64,
        unit: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        validate_positive("quantity", quantity)?;

        Ok(Self {
            id: id.into(),
            name,
            brand: None,
            category,
            quantity,
            unit: unit.into(),
        })
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Re-checks invariants on values that arrived through deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        validate_positive("quantity", self.quantity)
    }
}
