/// Concurrent batch calculation
use crate::client::PerformanceCalculator;
use crate::request::{ScoreParams, ScoreResult};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Runs one calculation per score, all at once, and returns the results in
/// input order.
///
/// Every slot is filled: a request that fails yields a zero result for that
/// score only. No request is cancelled because a sibling failed. With
/// `max_in_flight` set, at most that many scores are computed at a time.
#[derive(Clone)]
pub struct PerformanceFanout {
    calculator: Arc<dyn PerformanceCalculator>,
    max_in_flight: Option<usize>,
}

impl std::fmt::Debug for PerformanceFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceFanout")
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

impl PerformanceFanout {
    pub fn new(calculator: Arc<dyn PerformanceCalculator>) -> Self {
        Self {
            calculator,
            max_in_flight: None,
        }
    }

    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.map(|n| n.max(1));
        self
    }

    pub fn max_in_flight(&self) -> Option<usize> {
        self.max_in_flight
    }

    /// Computes pp and stars for every score on `beatmap_id`.
    pub async fn compute_many(&self, beatmap_id: u32, scores: &[ScoreParams]) -> Vec<ScoreResult> {
        debug!("Computing {} scores on beatmap {}", scores.len(), beatmap_id);
        let jobs = scores.iter().map(|score| self.compute(beatmap_id, score, false));
        self.gather(jobs).await
    }

    /// Same as [`compute_many`](Self::compute_many), also filling
    /// `hypothetical_pp` with the pp of each play at full combo.
    pub async fn compute_many_with_hypothetical(
        &self,
        beatmap_id: u32,
        scores: &[ScoreParams],
    ) -> Vec<ScoreResult> {
        debug!(
            "Computing {} scores with hypotheticals on beatmap {}",
            scores.len(),
            beatmap_id
        );
        let jobs = scores.iter().map(|score| self.compute(beatmap_id, score, true));
        self.gather(jobs).await
    }

    /// One score, including its hypothetical pp.
    pub async fn compute_one(&self, beatmap_id: u32, score: &ScoreParams) -> ScoreResult {
        self.compute(beatmap_id, score, true).await
    }

    async fn compute(&self, beatmap_id: u32, score: &ScoreParams, hypothetical: bool) -> ScoreResult {
        let request = score.to_request(beatmap_id);
        if !hypothetical {
            let result = self.calculator.calculate(&request).await;
            return ScoreResult::new(result, None);
        }

        let full_combo = request.hypothetical();
        let (result, full_combo_result) = futures::join!(
            self.calculator.calculate(&request),
            self.calculator.calculate(&full_combo)
        );
        ScoreResult::new(result, Some(full_combo_result.pp))
    }

    async fn gather<I, F>(&self, jobs: I) -> Vec<ScoreResult>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = ScoreResult>,
    {
        match self.max_in_flight {
            None => join_all(jobs).await,
            Some(limit) => stream::iter(jobs).buffered(limit).collect().await,
        }
    }
}
