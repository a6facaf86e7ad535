use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{validate_non_negative, ValidationError};

/// Named delivery region for price lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    #[default]
    Gauteng,
    CapeTown,
    Durban,
    All,
}

impl Region {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gauteng => "gauteng",
            Self::CapeTown => "cape-town",
            Self::Durban => "durban",
            Self::All => "all",
        }
    }

    /// Province a region's suppliers are registered in, if it maps to one.
    pub const fn province(self) -> Option<&'static str> {
        match self {
            Self::Gauteng => Some("Gauteng"),
            Self::CapeTown => Some("Western Cape"),
            Self::Durban => Some("KwaZulu-Natal"),
            Self::All => None,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gauteng" => Ok(Self::Gauteng),
            "cape-town" => Ok(Self::CapeTown),
            "durban" => Ok(Self::Durban),
            "all" => Ok(Self::All),
            other => Err(ValidationError::InvalidRegion {
                value: other.to_owned(),
            }),
        }
    }
}

/// Caller position with a search radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64, radius_km: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::LatitudeOutOfRange { value: lat });
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ValidationError::LongitudeOutOfRange { value: lng });
        }
        validate_non_negative("radius", radius_km)?;

        Ok(Self { lat, lng, radius_km })
    }
}

/// Where a price lookup should be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Region(Region),
    Coordinates(Coordinates),
}

impl Default for Location {
    fn default() -> Self {
        Self::Region(Region::All)
    }
}

impl Location {
    /// Builds a location from optional query parameters.
    ///
    /// Coordinates win over a region when all three of `lat`, `lng` and
    /// `radius` are present. A partial coordinate set is rejected.
    pub fn from_parts(
        region: Option<&str>,
        lat: Option<f64>,
        lng: Option<f64>,
        radius_km: Option<f64>,
    ) -> Result<Self, ValidationError> {
        match (lat, lng, radius_km) {
            (Some(lat), Some(lng), Some(radius_km)) => {
                Ok(Self::Coordinates(Coordinates::new(lat, lng, radius_km)?))
            }
            (None, None, _) => match region {
                Some(region) => Ok(Self::Region(region.parse()?)),
                None => Ok(Self::default()),
            },
            _ => Err(ValidationError::IncompleteCoordinates),
        }
    }

    /// Stable key fragment used for caching lookups.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Region(region) => format!("region={region}"),
            Self::Coordinates(coords) => format!(
                "lat={:.3};lng={:.3};radius={:.1}",
                coords.lat, coords.lng, coords.radius_km
            ),
        }
    }

    pub const fn region(&self) -> Option<Region> {
        match self {
            Self::Region(region) => Some(*region),
            Self::Coordinates(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_take_precedence_over_region() {
        let location = Location::from_parts(Some("durban"), Some(-26.1), Some(28.0), Some(20.0))
            .expect("valid location");
        assert!(matches!(location, Location::Coordinates(_)));
    }

    #[test]
    fn partial_coordinates_are_rejected() {
        let err = Location::from_parts(None, Some(-26.1), None, Some(20.0)).expect_err("must fail");
        assert_eq!(err, ValidationError::IncompleteCoordinates);
    }

    #[test]
    fn missing_location_means_all_regions() {
        let location = Location::from_parts(None, None, None, None).expect("valid location");
        assert_eq!(location, Location::Region(Region::All));
    }

    #[test]
    fn region_parses_kebab_case() {
        assert_eq!("Cape-Town".parse::<Region>(), Ok(Region::CapeTown));
        assert!(matches!(
            "mars".parse::<Region>(),
            Err(ValidationError::InvalidRegion { .. })
        ));
    }
}
