//! AgreeWise core: configuration, document ingestion and request handling
//! around the `contracts` risk scorer.

pub mod commands;
pub mod config;
pub mod services;
pub mod utils;

pub use commands::{HandlerResponse, RequestError, RequestHandler};
pub use config::CoreConfig;
pub use contracts::{Evaluation, RiskAssessment, RiskLevel, Scorer};
