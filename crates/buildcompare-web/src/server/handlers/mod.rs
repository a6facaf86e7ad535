//! HTTP request handlers.

mod analyze;
mod calculations;
mod chat;
mod estimator;
mod health;
mod prices;

pub use analyze::analyze;
pub use calculations::{technical, CalculationRequest};
pub use chat::{chat, ChatRequest, HEADER_ANSWER_TIER};
pub use estimator::boq;
pub use health::{health, HealthResponse};
pub use prices::{compare, prices, CompareRequest, CompareResponse, ComparedMaterial, PriceParams};
