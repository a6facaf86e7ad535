//! Quantity take-offs from surface areas.
//!
//! Rates are site rules of thumb and already include waste:
//!
//! | Take-off | Rate |
//! |----------|------|
//! | Imperial brick, single skin | 55 per m² |
//! | Imperial brick, double skin | 110 per m² |
//! | Maxi brick | 35 per m² |
//! | Mortar per 1000 bricks | 3 × 50 kg cement, 0.6 m³ sand |
//! | Paint | 9 m² per litre per coat |
//! | Roof tiles | 11.5 per m², one underlay roll per 30 m² |

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::validate_positive;
use crate::synthetic::round_to;
use crate::ValidationError;

pub const DEFAULT_BRICKS_PER_SQM: u32 = 55;
pub const DEFAULT_COATS: u32 = 2;
const PAINT_SPREAD_SQM_PER_LITRE: f64 = 9.0;
const ROOF_TILES_PER_SQM: f64 = 11.5;
const UNDERLAY_ROLL_SQM: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcType {
    Bricks,
    Paint,
    Roof,
}

impl CalcType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bricks => "bricks",
            Self::Paint => "paint",
            Self::Roof => "roof",
        }
    }
}

impl Display for CalcType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalcType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bricks" => Ok(Self::Bricks),
            "paint" => Ok(Self::Paint),
            "roof" => Ok(Self::Roof),
            other => Err(ValidationError::InvalidCalculation {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrickEstimate {
    pub bricks_count: u64,
    pub cement_bags_50kg: u64,
    pub building_sand_m3: f64,
    pub brick_type_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaintEstimate {
    pub liters_needed: f64,
    pub buckets_20l: u64,
    /// Only quoted for jobs under one 20 L bucket; `0` otherwise.
    pub buckets_5l: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoofEstimate {
    pub tiles_count: u64,
    pub underlay_rolls: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TakeOff {
    Bricks(BrickEstimate),
    Paint(PaintEstimate),
    Roof(RoofEstimate),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationReport {
    pub calc_type: CalcType,
    pub input_area: f64,
    pub results: TakeOff,
}

/// Bricks per m² for a brick type; unknown types use a single skin of imperial bricks.
pub fn bricks_per_sqm(brick_type: &str) -> u32 {
    match brick_type.trim().to_ascii_lowercase().as_str() {
        "standard_double" => 110,
        "maxi" => 35,
        _ => DEFAULT_BRICKS_PER_SQM,
    }
}

pub fn bricks_needed(wall_area_sqm: f64, brick_type: &str) -> Result<BrickEstimate, ValidationError> {
    validate_positive("area", wall_area_sqm)?;

    let bricks = (wall_area_sqm * f64::from(bricks_per_sqm(brick_type))).ceil();
    let thousands = bricks / 1000.0;
    Ok(BrickEstimate {
        bricks_count: whole(bricks),
        cement_bags_50kg: whole((thousands * 3.0).ceil()),
        building_sand_m3: round_to(thousands * 0.6, 2),
        brick_type_used: brick_type.to_owned(),
    })
}

pub fn paint_needed(wall_area_sqm: f64, coats: u32) -> Result<PaintEstimate, ValidationError> {
    validate_positive("area", wall_area_sqm)?;

    let litres = wall_area_sqm * f64::from(coats) / PAINT_SPREAD_SQM_PER_LITRE;
    Ok(PaintEstimate {
        liters_needed: round_to(litres, 1),
        buckets_20l: whole((litres / 20.0).ceil()),
        buckets_5l: if litres < 20.0 {
            whole((litres / 5.0).ceil())
        } else {
            0
        },
    })
}

pub fn roof_tiles_needed(roof_area_sqm: f64) -> Result<RoofEstimate, ValidationError> {
    validate_positive("area", roof_area_sqm)?;

    Ok(RoofEstimate {
        tiles_count: whole((roof_area_sqm * ROOF_TILES_PER_SQM).ceil()),
        underlay_rolls: whole((roof_area_sqm / UNDERLAY_ROLL_SQM).ceil()),
    })
}

/// Runs one take-off. `variable` is the brick type for bricks and the number
/// of coats for paint (anything that is not a positive integer means two).
pub fn calculate(calc_type: CalcType, area: f64, variable: &str) -> Result<CalculationReport, ValidationError> {
    let results = match calc_type {
        CalcType::Bricks => TakeOff::Bricks(bricks_needed(area, variable)?),
        CalcType::Paint => {
            let coats = variable
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|coats| *coats > 0)
                .unwrap_or(DEFAULT_COATS);
            TakeOff::Paint(paint_needed(area, coats)?)
        }
        CalcType::Roof => TakeOff::Roof(roof_tiles_needed(area)?),
    };

    Ok(CalculationReport {
        calc_type,
        input_area: area,
        results,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(value: f64) -> u64 {
    value as u64
}
