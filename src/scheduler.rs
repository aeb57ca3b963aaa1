use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{JobBuilder, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

use crate::aggregate::is_inactive;
use crate::models::Student;
use crate::notify::{inactivity_message, Notifier};
use crate::sync::SyncEngine;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub students: usize,
    pub synced: usize,
    pub failed: usize,
    pub notified: usize,
    pub rearmed: usize,
}

/// Syncs every tracked student and sends one inactivity reminder per
/// inactivity episode.
pub struct InactivityScheduler {
    engine: Arc<SyncEngine>,
    notifier: Arc<dyn Notifier>,
    jobs: Mutex<Option<JobScheduler>>,
}

impl InactivityScheduler {
    pub fn new(engine: Arc<SyncEngine>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            notifier,
            jobs: Mutex::new(None),
        }
    }

    /// Registers the sweep on `schedule` (six-field cron, UTC) and starts it.
    pub async fn start(self: &Arc<Self>, schedule: &str) -> Result<(), JobSchedulerError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.is_some() {
            warn!("inactivity scheduler already running");
            return Ok(());
        }

        let scheduler = JobScheduler::new().await?;
        let this = Arc::clone(self);
        let job = JobBuilder::new()
            .with_timezone(Utc)
            .with_cron_job_type()
            .with_schedule(schedule)?
            .with_run_async(Box::new(move |_uuid, _lock| {
                let this = Arc::clone(&this);
                Box::pin(async move {
                    this.run_inactivity_sweep().await;
                })
            }))
            .build()?;

        scheduler.add(job).await?;
        scheduler.start().await?;
        info!(schedule = %schedule, "inactivity scheduler started");

        *jobs = Some(scheduler);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), JobSchedulerError> {
        if let Some(mut scheduler) = self.jobs.lock().await.take() {
            scheduler.shutdown().await?;
            info!("inactivity scheduler stopped");
        }
        Ok(())
    }

    pub async fn run_inactivity_sweep(&self) {
        let summary = self.sweep().await;
        info!(
            students = summary.students,
            synced = summary.synced,
            failed = summary.failed,
            notified = summary.notified,
            rearmed = summary.rearmed,
            "inactivity sweep finished"
        );
    }

    pub async fn sweep(&self) -> SweepSummary {
        info!("inactivity sweep started");
        let mut summary = SweepSummary::default();

        let students = match self.engine.store().list_tracked().await {
            Ok(students) => students,
            Err(err) => {
                error!(error = %err, "could not list students, skipping sweep");
                return summary;
            }
        };
        summary.students = students.len();

        for student in students {
            let Some(handle) = student.handle.clone() else {
                continue;
            };

            // Sequential on purpose: keeps load on the Codeforces API bounded.
            if let Err(err) = self.engine.refresh(&handle).await {
                summary.failed += 1;
                error!(handle = %handle, name = %student.name, error = %err, "sync failed");
                continue;
            }
            summary.synced += 1;

            let refreshed = match self.engine.store().find_by_handle(&handle).await {
                Ok(Some(refreshed)) => refreshed,
                Ok(None) => continue,
                Err(err) => {
                    error!(handle = %handle, error = %err, "could not re-read student");
                    continue;
                }
            };

            match self.apply_activity(refreshed).await {
                Some(Transition::Notified) => summary.notified += 1,
                Some(Transition::Rearmed) => summary.rearmed += 1,
                None => {}
            }
        }

        summary
    }

    async fn apply_activity(&self, mut student: Student) -> Option<Transition> {
        let handle = student.handle.clone().unwrap_or_default();
        let today = self.engine.clock().today();
        let inactive = student
            .heatmap()
            .map_or(true, |heatmap| is_inactive(heatmap, today));

        if inactive {
            if student.inactivity_notified || student.reminders_disabled {
                return None;
            }

            let message = inactivity_message(&student.name, &handle);
            if let Err(err) = self
                .notifier
                .send(&student.email, &message.subject, &message.body)
                .await
            {
                warn!(handle = %handle, error = %err, "inactivity notification not sent");
                return None;
            }

            student.inactivity_notified = true;
            student.reminder_count += 1;
            if let Err(err) = self.engine.store().save(&student).await {
                error!(handle = %handle, error = %err, "failed to record inactivity notification");
                return None;
            }
            info!(handle = %handle, name = %student.name, "inactivity notification sent");
            Some(Transition::Notified)
        } else {
            if !student.inactivity_notified {
                return None;
            }

            student.inactivity_notified = false;
            if let Err(err) = self.engine.store().save(&student).await {
                error!(handle = %handle, error = %err, "failed to clear inactivity flag");
                return None;
            }
            info!(handle = %handle, name = %student.name, "student active again");
            Some(Transition::Rearmed)
        }
    }
}

enum Transition {
    Notified,
    Rearmed,
}
