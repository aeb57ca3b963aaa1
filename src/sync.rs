use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aggregate;
use crate::clock::Clock;
use crate::codeforces::ContestClient;
use crate::error::SyncError;
use crate::models::Student;
use crate::store::StudentStore;

pub const SUBMISSIONS_FROM: u32 = 1;

/// Refreshes one student's statistics from Codeforces.
///
/// Stored statistics act as a cache: a student whose statistics already hold a
/// solved problem for the current handle is returned as-is without touching
/// the API. Syncs and refreshes for the same handle run one at a time.
pub struct SyncEngine {
    client: Arc<dyn ContestClient>,
    store: Arc<dyn StudentStore>,
    clock: Arc<dyn Clock>,
    submission_count: u32,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn ContestClient>,
        store: Arc<dyn StudentStore>,
        clock: Arc<dyn Clock>,
        submission_count: u32,
    ) -> Self {
        Self {
            client,
            store,
            clock,
            submission_count,
            in_flight: DashMap::new(),
        }
    }

    pub fn client(&self) -> &Arc<dyn ContestClient> {
        &self.client
    }

    pub fn store(&self) -> &Arc<dyn StudentStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn sync(&self, handle: &str) -> Result<Student, SyncError> {
        self.with_handle_lock(handle, true).await
    }

    /// Like [`SyncEngine::sync`] but always refetches, ignoring cached
    /// statistics. The inactivity sweep needs a fresh heatmap every run.
    pub async fn refresh(&self, handle: &str) -> Result<Student, SyncError> {
        self.with_handle_lock(handle, false).await
    }

    async fn with_handle_lock(&self, handle: &str, use_cache: bool) -> Result<Student, SyncError> {
        let lock = self
            .in_flight
            .entry(handle.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        let result = self.sync_locked(handle, use_cache).await;

        drop(guard);
        // Only the map and this call hold the lock when nobody else is waiting.
        self.in_flight
            .remove_if(handle, |_, lock| Arc::strong_count(lock) <= 2);

        result
    }

    async fn sync_locked(&self, handle: &str, use_cache: bool) -> Result<Student, SyncError> {
        let mut student = self
            .store
            .find_by_handle(handle)
            .await
            .map_err(|err| SyncError::persist(handle, err))?
            .ok_or_else(|| SyncError::NotFound(handle.to_string()))?;

        if use_cache && student.has_fresh_cache() {
            debug!(handle = %handle, "serving cached statistics");
            return Ok(student);
        }

        let (profile, history, submissions) = tokio::try_join!(
            self.client.get_profile(handle),
            self.client.get_rating_history(handle),
            self.client
                .get_submissions(handle, SUBMISSIONS_FROM, self.submission_count),
        )
        .map_err(|err| {
            warn!(handle = %handle, error = %err, "codeforces fetch failed");
            SyncError::from_client(handle, err)
        })?;

        let now = self.clock.now();
        let statistics = aggregate::aggregate(&history, &submissions, now);

        student.current_rating = profile.rating.unwrap_or(0);
        student.max_rating = profile.max_rating.unwrap_or(0);
        student.last_synced = Some(now);
        student.synced_handle = Some(handle.to_string());
        student.statistics = Some(statistics);

        self.store
            .save(&student)
            .await
            .map_err(|err| SyncError::persist(handle, err))?;

        info!(
            handle = %handle,
            contests = student.statistics.as_ref().map_or(0, |s| s.contest_history.len()),
            solved = student.statistics.as_ref().map_or(0, |s| s.total_solved),
            "synced student from codeforces"
        );
        Ok(student)
    }
}
