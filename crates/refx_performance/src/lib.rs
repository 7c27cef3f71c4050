//! # refx Performance
//!
//! Talks to the external performance service that turns a beatmap and a play
//! description into star rating and pp.
//!
//! - [`ComputeClient`] wraps the `GET /calculate` contract for one request.
//! - [`PerformanceFanout`] issues many such requests at once and hands the
//!   results back in input order. A request that fails does not affect its
//!   siblings; its slot holds a zero result instead.
//!
//! Zero (`stars = 0.0, pp = 0.0`) is the "could not be computed" value. Use
//! [`ComputeClient::try_calculate`] when the cause matters.

pub mod client;
pub mod fanout;
pub mod request;

pub use client::{ComputeClient, ComputeConfig, PerformanceCalculator};
pub use fanout::PerformanceFanout;
pub use request::{
    DifficultyValues, PerformanceRequest, PerformanceResult, PerformanceValues, ScoreParams,
    ScoreResult,
};

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Invalid compute service configuration: {0}")]
    Config(String),
    #[error("Request to compute service failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Compute service answered with status {0}")]
    Status(u16),
    #[error("Undecodable compute service response: {0}")]
    Decode(#[source] reqwest::Error),
}
