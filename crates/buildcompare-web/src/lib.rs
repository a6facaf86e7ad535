//! HTTP front end for the BuildCompare dispatch core.
//!
//! | Route | Method | Policy |
//! |-------|--------|--------|
//! | `/health` | GET | none |
//! | `/api/analyze` | POST (multipart) | scraping |
//! | `/api/v1/prices` | GET | scraping |
//! | `/api/v1/compare` | POST | scraping |
//! | `/api/v1/estimator/boq` | POST | scraping |
//! | `/api/chat` | POST | default |
//! | `/calc/technical` | POST | default |
//!
//! Every rate-limited response carries `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining` and `X-RateLimit-Reset`; a `429` adds `Retry-After`.

pub mod config;
pub mod server;

pub use config::Config;
pub use server::{create_router, serve, AppState};
