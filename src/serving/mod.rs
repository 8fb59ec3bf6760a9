//! Prediction serving: payload handling, the generated service runtime and
//! the usage-accounting gateway

pub mod cache;
pub mod gateway;
pub mod payload;
pub mod server;

pub use cache::{CacheStats, ModelCache};
pub use gateway::{CandidatePrediction, PredictionOutcome, ServingGateway};
pub use payload::{PredictionOutput, PredictionPayload};
pub use server::{endpoint_router, run_endpoint_server, PredictionService, ServiceState};
