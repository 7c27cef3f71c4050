//! PostgreSQL score store.
//!
//! Expected schema (only the columns read here):
//!
//! ```sql
//! scores (id BIGINT, map_md5 TEXT, userid BIGINT, mode SMALLINT, score BIGINT,
//!         pp DOUBLE PRECISION, acc DOUBLE PRECISION, max_combo INT, nmiss INT,
//!         mods INT, status SMALLINT)
//! users  (id BIGINT, priv INT)
//! maps   (md5 TEXT, artist TEXT, title TEXT, version TEXT)
//! ```

use crate::model::{
    GameMode, MetricValue, Mods, PlacementQuery, ScoreRecord, SubmissionStatus, UNRESTRICTED,
};
use crate::repository::ScoreRepository;
use crate::StoreError;
use async_trait::async_trait;
use deadpool_postgres::{Config as DeadpoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

const FETCH_SCORE: &str = "SELECT id, map_md5, userid, mode, score, pp, acc, max_combo, nmiss, mods, status \
     FROM scores WHERE id = $1";

const FETCH_BEATMAP: &str = "SELECT artist, title, version FROM maps WHERE md5 = $1";

pub struct PgScoreRepository {
    pool: Pool,
}

impl std::fmt::Debug for PgScoreRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgScoreRepository")
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl PgScoreRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `url`. Connections are opened lazily, so this does
    /// not touch the network.
    pub fn from_url(url: &str, max_size: usize) -> Result<Self, StoreError> {
        let mut config = DeadpoolConfig::new();
        config.url = Some(url.to_owned());
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        config.pool = Some(deadpool_postgres::PoolConfig::new(max_size));

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;
        info!("Score database pool created (max {} connections)", max_size);
        Ok(Self { pool })
    }

    fn count_sql(query: &PlacementQuery) -> String {
        format!(
            "SELECT COUNT(*) FROM scores s \
             INNER JOIN users u ON u.id = s.userid \
             WHERE s.map_md5 = $1 AND s.mode = $2 \
             AND s.status = {} AND (u.priv & {}) <> 0 \
             AND s.{} > $3",
            u8::from(SubmissionStatus::Best),
            UNRESTRICTED,
            query.value.metric().column(),
        )
    }
}

fn score_from_row(row: &Row) -> Result<ScoreRecord, StoreError> {
    let mode: i16 = row.try_get("mode")?;
    let status: i16 = row.try_get("status")?;
    let score: i64 = row.try_get("score")?;
    let max_combo: i32 = row.try_get("max_combo")?;
    let nmiss: i32 = row.try_get("nmiss")?;
    let mods: i32 = row.try_get("mods")?;

    let mode = u8::try_from(mode)
        .map_err(|_| StoreError::Corrupt(format!("mode {mode}")))
        .and_then(|m| GameMode::try_from(m).map_err(StoreError::Corrupt))?;
    let status = u8::try_from(status)
        .map_err(|_| StoreError::Corrupt(format!("status {status}")))
        .and_then(|s| SubmissionStatus::try_from(s).map_err(StoreError::Corrupt))?;
    let non_negative = |column: &str, value: i64| {
        u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} {value}")))
    };

    Ok(ScoreRecord {
        id: row.try_get("id")?,
        map_md5: row.try_get("map_md5")?,
        user_id: row.try_get("userid")?,
        mode,
        score: non_negative("score", score)?,
        pp: row.try_get("pp")?,
        acc: row.try_get("acc")?,
        max_combo: non_negative("max_combo", max_combo.into())? as u32,
        nmiss: non_negative("nmiss", nmiss.into())? as u32,
        mods: Mods(mods as u32),
        status,
    })
}

#[async_trait]
impl ScoreRepository for PgScoreRepository {
    async fn count_better(&self, query: &PlacementQuery) -> Result<u64, StoreError> {
        let client = self.pool.get().await?;
        let sql = Self::count_sql(query);
        let mode = i16::from(query.mode.as_u8());

        let score_value: i64;
        let pp_value: f64;
        let threshold: &(dyn ToSql + Sync) = match query.value {
            MetricValue::Score(value) => {
                score_value = i64::try_from(value).unwrap_or(i64::MAX);
                &score_value
            }
            MetricValue::Pp(value) => {
                pp_value = value;
                &pp_value
            }
        };

        let row = client
            .query_one(sql.as_str(), &[&query.map_md5, &mode, threshold])
            .await?;
        let count: i64 = row.try_get(0)?;
        debug!(
            "{} better scores on {} (mode {})",
            count,
            query.map_md5,
            query.mode.as_u8()
        );
        Ok(count.max(0) as u64)
    }

    async fn fetch_score(&self, score_id: i64) -> Result<Option<ScoreRecord>, StoreError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(FETCH_SCORE, &[&score_id]).await?;
        row.as_ref().map(score_from_row).transpose()
    }

    async fn beatmap_embed(&self, map_md5: &str) -> Result<Option<String>, StoreError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(FETCH_BEATMAP, &[&map_md5]).await?;
        row.map(|row| {
            let artist: String = row.try_get("artist")?;
            let title: String = row.try_get("title")?;
            let version: String = row.try_get("version")?;
            Ok::<_, StoreError>(format!("{artist} - {title} [{version}]"))
        })
        .transpose()
    }
}
