/// Score storage abstraction
use crate::model::{PlacementQuery, ScoreRecord};
use crate::StoreError;
use async_trait::async_trait;

/// Read-only access to persisted scores.
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// Counts ranked scores that beat `query`: same beatmap and mode, status
    /// best, owner unrestricted, metric strictly greater.
    async fn count_better(&self, query: &PlacementQuery) -> Result<u64, StoreError>;

    async fn fetch_score(&self, score_id: i64) -> Result<Option<ScoreRecord>, StoreError>;

    /// Human-readable beatmap name, `Artist - Title [Version]`.
    async fn beatmap_embed(&self, map_md5: &str) -> Result<Option<String>, StoreError>;
}
