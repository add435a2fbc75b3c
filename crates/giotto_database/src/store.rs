//! SQLite-backed pipeline store.

use crate::conversions::{job_to_row, row_to_state, state_to_row};
use crate::schema::{jobs, pipeline_states};
use crate::{
    ConnectionOptions, DatabaseResult, JobRow, PipelineStateRow, SqlitePool, establish_pool,
};
use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use giotto_core::{PipelineState, Progress};
use giotto_error::{DatabaseError, DatabaseErrorKind, GiottoResult};
use giotto_interface::PipelineStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Durable store for pipeline state using SQLite with connection pooling.
///
/// Every call checks a connection out of the pool on a blocking thread and
/// returns it when the call finishes, whether it succeeded or not.
///
/// # Example
///
/// ```no_run
/// use giotto_core::PipelineState;
/// use giotto_database::SqliteStore;
/// use giotto_interface::PipelineStore;
///
/// # async fn example() -> giotto_error::GiottoResult<()> {
/// let store = SqliteStore::open("giotto.db")?;
/// store.save(&PipelineState::new("r1", "output")).await?;
/// let loaded = store.load("r1", "output".as_ref()).await?;
/// assert!(loaded.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) a database file with default connection options.
    pub fn open(path: impl AsRef<Path>) -> GiottoResult<Self> {
        Self::open_with(path, ConnectionOptions::default())
    }

    /// Open (or create) a database file.
    pub fn open_with(path: impl AsRef<Path>, options: ConnectionOptions) -> GiottoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let pool = establish_pool(&path, options)?;
        info!(path = %path.display(), "Opened pipeline store");
        Ok(Self { pool, path })
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking closure against a pooled connection.
    async fn with_conn<T, F>(&self, f: F) -> GiottoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> DatabaseResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> DatabaseResult<T> {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Task(e.to_string())))?;
        Ok(result?)
    }
}

#[async_trait]
impl PipelineStore for SqliteStore {
    #[instrument(skip(self, state), fields(run_id = %state.run_id(), jobs = state.jobs().len()))]
    async fn save(&self, state: &PipelineState) -> GiottoResult<()> {
        let state_row = state_to_row(state)?;
        let job_rows = state
            .jobs()
            .iter()
            .enumerate()
            .map(|(position, job)| job_to_row(job, state.run_id(), position))
            .collect::<DatabaseResult<Vec<JobRow>>>()?;

        self.with_conn(move |conn| {
            conn.immediate_transaction::<_, DatabaseError, _>(|conn| {
                diesel::insert_into(pipeline_states::table)
                    .values(&state_row)
                    .on_conflict(pipeline_states::run_id)
                    .do_update()
                    .set(&state_row)
                    .execute(conn)?;

                for row in &job_rows {
                    diesel::insert_into(jobs::table)
                        .values(row)
                        .on_conflict(jobs::id)
                        .do_update()
                        .set(row)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await?;

        debug!("Saved pipeline state");
        Ok(())
    }

    #[instrument(skip(self, base_dir))]
    async fn load(&self, run_id: &str, base_dir: &Path) -> GiottoResult<Option<PipelineState>> {
        let run_id = run_id.to_string();
        let base_dir = base_dir.to_path_buf();

        let state = self
            .with_conn(move |conn| {
                let Some(row) = pipeline_states::table
                    .find(run_id.as_str())
                    .select(PipelineStateRow::as_select())
                    .first(conn)
                    .optional()?
                else {
                    return Ok(None);
                };

                let job_rows = jobs::table
                    .filter(jobs::run_id.eq(run_id.as_str()))
                    .order((jobs::position.asc(), jobs::created_at.asc()))
                    .select(JobRow::as_select())
                    .load(conn)?;

                row_to_state(row, job_rows, &base_dir).map(Some)
            })
            .await?;

        match &state {
            Some(s) => debug!(jobs = s.jobs().len(), "Loaded pipeline state"),
            None => debug!("No saved state for run"),
        }
        Ok(state)
    }

    #[instrument(skip(self))]
    async fn progress(&self, run_id: &str) -> GiottoResult<Progress> {
        let run_id = run_id.to_string();

        let counts: Vec<(String, i64)> = self
            .with_conn(move |conn| {
                Ok(jobs::table
                    .filter(jobs::run_id.eq(run_id.as_str()))
                    .group_by(jobs::status)
                    .select((jobs::status, count_star()))
                    .load(conn)?)
            })
            .await?;

        let (mut completed, mut failed, mut pending, mut skipped) = (0, 0, 0, 0);
        for (status, count) in counts {
            let count = count.max(0) as usize;
            match status.as_str() {
                "completed" => completed += count,
                "failed" => failed += count,
                "skipped" => skipped += count,
                // pending and in_progress
                _ => pending += count,
            }
        }
        Ok(Progress::from_counts(completed, failed, pending, skipped))
    }

    #[instrument(skip(self))]
    async fn list_runs(&self) -> GiottoResult<Vec<String>> {
        self.with_conn(|conn| {
            Ok(pipeline_states::table
                .select(pipeline_states::run_id)
                .order(pipeline_states::created_at.asc())
                .load(conn)?)
        })
        .await
    }
}
