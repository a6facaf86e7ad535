use thiserror::Error;

/// Validation and contract errors exposed by `buildcompare-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },

    #[error("field '{field}' cannot be empty")]
    EmptyField { field: &'static str },

    #[error("price query must be at least {min} characters: '{value}'")]
    QueryTooShort { value: String, min: usize },

    #[error("invalid region '{value}', expected one of gauteng, cape-town, durban, all")]
    InvalidRegion { value: String },
    #[error("invalid rate limit policy '{value}', expected one of default, scraping, auth")]
    InvalidPolicy { value: String },
    #[error("invalid sort key '{value}', expected one of price, distance, rating, delivery")]
    InvalidSortKey { value: String },
    #[error("unknown calculation type '{value}', expected one of bricks, paint, roof")]
    InvalidCalculation { value: String },

    #[error("latitude {value} is outside -90..=90")]
    LatitudeOutOfRange { value: f64 },
    #[error("longitude {value} is outside -180..=180")]
    LongitudeOutOfRange { value: f64 },
    #[error("location requires lat, lng and radius together")]
    IncompleteCoordinates,

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },
}

pub(crate) fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue { field })
    }
}

pub fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

pub(crate) fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nan_and_negative_values() {
        assert_eq!(
            validate_non_negative("price", f64::NAN),
            Err(ValidationError::NonFiniteValue { field: "price" })
        );
        assert_eq!(
            validate_non_negative("price", -1.0),
            Err(ValidationError::NegativeValue { field: "price" })
        );
        assert!(validate_non_negative("price", 0.0).is_ok());
    }

    #[test]
    fn positive_rejects_zero() {
        assert_eq!(
            validate_positive("quantity", 0.0),
            Err(ValidationError::NonPositiveValue { field: "quantity" })
        );
    }
}
