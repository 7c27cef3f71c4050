/// Map-backed score store
use crate::model::{PlacementQuery, ScoreRecord, SubmissionStatus, UNRESTRICTED};
use crate::repository::ScoreRepository;
use crate::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct BeatmapInfo {
    artist: String,
    title: String,
    version: String,
}

#[derive(Debug, Default)]
struct Tables {
    scores: HashMap<i64, ScoreRecord>,
    privileges: HashMap<i64, u32>,
    maps: HashMap<String, BeatmapInfo>,
}

/// Applies the same filters as the SQL store over in-process tables.
///
/// Users without a privileges entry are treated as having none, so their
/// scores never rank.
#[derive(Debug, Default)]
pub struct InMemoryScoreRepository {
    tables: RwLock<Tables>,
}

impl InMemoryScoreRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_score(&self, score: ScoreRecord) {
        self.tables.write().await.scores.insert(score.id, score);
    }

    pub async fn set_privileges(&self, user_id: i64, privileges: u32) {
        self.tables.write().await.privileges.insert(user_id, privileges);
    }

    pub async fn insert_beatmap(&self, md5: &str, artist: &str, title: &str, version: &str) {
        self.tables.write().await.maps.insert(
            md5.to_owned(),
            BeatmapInfo {
                artist: artist.to_owned(),
                title: title.to_owned(),
                version: version.to_owned(),
            },
        );
    }
}

#[async_trait]
impl ScoreRepository for InMemoryScoreRepository {
    async fn count_better(&self, query: &PlacementQuery) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .scores
            .values()
            .filter(|s| s.map_md5 == query.map_md5)
            .filter(|s| s.mode == query.mode)
            .filter(|s| s.status == SubmissionStatus::Best)
            .filter(|s| {
                tables
                    .privileges
                    .get(&s.user_id)
                    .is_some_and(|p| p & UNRESTRICTED != 0)
            })
            .filter(|s| query.value.is_beaten_by(s))
            .count();
        Ok(count as u64)
    }

    async fn fetch_score(&self, score_id: i64) -> Result<Option<ScoreRecord>, StoreError> {
        Ok(self.tables.read().await.scores.get(&score_id).cloned())
    }

    async fn beatmap_embed(&self, map_md5: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .maps
            .get(map_md5)
            .map(|m| format!("{} - {} [{}]", m.artist, m.title, m.version)))
    }
}
