/// Leaderboard placement
use crate::model::{PlacementQuery, ScoreRecord};
use crate::repository::ScoreRepository;
use crate::RankingError;
use std::sync::Arc;
use tracing::debug;

/// Computes where a score sits on its beatmap's leaderboard.
///
/// Placement is one more than the number of ranked scores that strictly beat
/// it, so equal scores share a placement. Every call reads the store afresh;
/// nothing is cached.
#[derive(Clone)]
pub struct RankingEngine {
    repository: Arc<dyn ScoreRepository>,
}

impl std::fmt::Debug for RankingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingEngine").finish_non_exhaustive()
    }
}

impl RankingEngine {
    pub fn new(repository: Arc<dyn ScoreRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn ScoreRepository> {
        &self.repository
    }

    /// Returns the 1-based placement of `score`.
    pub async fn placement(&self, score: &ScoreRecord) -> Result<u32, RankingError> {
        let query = PlacementQuery::for_score(score);
        let better = self.repository.count_better(&query).await?;
        let placement = u32::try_from(better).unwrap_or(u32::MAX - 1) + 1;
        debug!("Score {} placed #{} on {}", score.id, placement, score.map_md5);
        Ok(placement)
    }

    /// Loads a score by id and returns it with its placement.
    pub async fn placement_of(&self, score_id: i64) -> Result<(ScoreRecord, u32), RankingError> {
        let score = self
            .repository
            .fetch_score(score_id)
            .await?
            .ok_or(RankingError::ScoreNotFound(score_id))?;
        let placement = self.placement(&score).await?;
        Ok((score, placement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GameMode, Mods, SubmissionStatus, UNRESTRICTED};
    use crate::{InMemoryScoreRepository, StoreError};
    use async_trait::async_trait;

    fn score(id: i64, user_id: i64, mode: GameMode, score: u64, pp: f64) -> ScoreRecord {
        ScoreRecord {
            id,
            map_md5: "a5b99395a42bd55bc5eb1d2411cbdf8b".to_string(),
            user_id,
            mode,
            score,
            pp,
            acc: 98.5,
            max_combo: 500,
            nmiss: 0,
            mods: Mods::NOMOD,
            status: SubmissionStatus::Best,
        }
    }

    async fn seeded(scores: Vec<ScoreRecord>) -> Arc<InMemoryScoreRepository> {
        let repo = Arc::new(InMemoryScoreRepository::new());
        for s in scores {
            repo.set_privileges(s.user_id, UNRESTRICTED).await;
            repo.insert_score(s).await;
        }
        repo
    }

    #[tokio::test]
    async fn test_empty_leaderboard_places_first() {
        let engine = RankingEngine::new(Arc::new(InMemoryScoreRepository::new()));
        let placement = engine
            .placement(&score(1, 1, GameMode::VanillaOsu, 1_000, 0.0))
            .await
            .unwrap();
        assert_eq!(placement, 1);
    }

    #[tokio::test]
    async fn test_higher_score_never_places_worse() {
        let repo = seeded(vec![
            score(1, 1, GameMode::VanillaOsu, 900_000, 0.0),
            score(2, 2, GameMode::VanillaOsu, 500_000, 0.0),
            score(3, 3, GameMode::VanillaOsu, 100_000, 0.0),
        ])
        .await;
        let engine = RankingEngine::new(repo);

        let mut last = u32::MAX;
        for value in [50_000, 300_000, 700_000, 1_000_000] {
            let placement = engine
                .placement(&score(99, 99, GameMode::VanillaOsu, value, 0.0))
                .await
                .unwrap();
            assert!(placement <= last, "{value} placed #{placement} after #{last}");
            last = placement;
        }
        assert_eq!(last, 1);
    }

    #[tokio::test]
    async fn test_stored_scores_place_strictly_by_score() {
        let repo = seeded(vec![
            score(1, 1, GameMode::VanillaOsu, 100_000, 0.0),
            score(2, 2, GameMode::VanillaOsu, 900_000, 0.0),
            score(3, 3, GameMode::VanillaOsu, 500_000, 0.0),
            score(4, 4, GameMode::VanillaOsu, 700_000, 0.0),
        ])
        .await;
        let engine = RankingEngine::new(repo);

        let mut placements = Vec::new();
        for id in 1..=4 {
            let (record, placement) = engine.placement_of(id).await.unwrap();
            placements.push((record.score, placement));
        }
        assert_eq!(
            placements,
            vec![(100_000, 4), (900_000, 1), (500_000, 3), (700_000, 2)]
        );
        for (a_score, a_place) in &placements {
            for (b_score, b_place) in &placements {
                if a_score > b_score {
                    assert!(a_place < b_place, "{a_score} #{a_place} vs {b_score} #{b_place}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_ties_share_placement() {
        let repo = seeded(vec![
            score(1, 1, GameMode::VanillaOsu, 800_000, 0.0),
            score(2, 2, GameMode::VanillaOsu, 500_000, 0.0),
            score(3, 3, GameMode::VanillaOsu, 500_000, 0.0),
        ])
        .await;
        let engine = RankingEngine::new(repo);

        let second = engine.placement_of(2).await.unwrap().1;
        let third = engine.placement_of(3).await.unwrap().1;
        assert_eq!(engine.placement_of(1).await.unwrap().1, 1);
        assert_eq!(second, 2);
        assert_eq!(third, 2);
    }

    #[tokio::test]
    async fn test_relax_ranks_by_pp() {
        let repo = seeded(vec![
            score(1, 1, GameMode::RelaxOsu, 100, 400.0),
            score(2, 2, GameMode::RelaxOsu, 999_999, 200.0),
        ])
        .await;
        let engine = RankingEngine::new(repo);

        assert_eq!(engine.placement_of(1).await.unwrap().1, 1);
        assert_eq!(engine.placement_of(2).await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn test_filters_exclude_other_rows() {
        let repo = seeded(vec![score(1, 1, GameMode::VanillaOsu, 100, 0.0)]).await;

        let mut other_map = score(2, 2, GameMode::VanillaOsu, 900, 0.0);
        other_map.map_md5 = "ffffffffffffffffffffffffffffffff".to_string();
        let other_mode = score(3, 3, GameMode::VanillaTaiko, 900, 0.0);
        let mut not_best = score(4, 4, GameMode::VanillaOsu, 900, 0.0);
        not_best.status = SubmissionStatus::Submitted;
        let restricted = score(5, 5, GameMode::VanillaOsu, 900, 0.0);

        for s in [other_map, other_mode, not_best] {
            repo.set_privileges(s.user_id, UNRESTRICTED).await;
            repo.insert_score(s).await;
        }
        repo.set_privileges(5, 0).await;
        repo.insert_score(restricted).await;

        let engine = RankingEngine::new(repo);
        assert_eq!(engine.placement_of(1).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_unknown_score() {
        let engine = RankingEngine::new(Arc::new(InMemoryScoreRepository::new()));
        assert!(matches!(
            engine.placement_of(42).await,
            Err(RankingError::ScoreNotFound(42))
        ));
    }

    struct BrokenStore;

    #[async_trait]
    impl ScoreRepository for BrokenStore {
        async fn count_better(&self, _query: &PlacementQuery) -> Result<u64, StoreError> {
            Err(StoreError::Corrupt("broken".to_string()))
        }

        async fn fetch_score(&self, _score_id: i64) -> Result<Option<ScoreRecord>, StoreError> {
            Ok(None)
        }

        async fn beatmap_embed(&self, _map_md5: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let engine = RankingEngine::new(Arc::new(BrokenStore));
        let result = engine
            .placement(&score(1, 1, GameMode::VanillaOsu, 1, 0.0))
            .await;
        assert!(matches!(result, Err(RankingError::Store(StoreError::Corrupt(_)))));
    }
}
