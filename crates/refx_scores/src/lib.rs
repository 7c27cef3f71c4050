//! # refx Scores
//!
//! Read access to persisted scores and the leaderboard placement calculation
//! built on it. Storage is behind [`ScoreRepository`]: PostgreSQL in
//! production ([`PgScoreRepository`]), a map-backed store for tests and
//! single-process setups ([`InMemoryScoreRepository`]).

pub mod memory;
pub mod model;
pub mod postgres;
pub mod ranking;
pub mod repository;

pub use memory::InMemoryScoreRepository;
pub use model::{
    GameMode, MetricValue, Mods, PlacementQuery, ScoreRecord, ScoringMetric, SubmissionStatus,
    UNRESTRICTED,
};
pub use postgres::PgScoreRepository;
pub use ranking::RankingEngine;
pub use repository::ScoreRepository;

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to create connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    /// A row held a value the domain types cannot represent
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("Score {0} not found")]
    ScoreNotFound(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}
