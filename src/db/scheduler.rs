use super::{DBClient, UserExt};
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Every hour, on the hour
const CLEANUP_SCHEDULE: &str = "0 0 * * * *";

impl DBClient {
    /// Start the background job that clears expired password-reset tokens.
    ///
    /// The returned scheduler must be kept alive for the job to keep running.
    pub async fn start_cleanup_task(&self) -> Result<JobScheduler, JobSchedulerError> {
        let sched = JobScheduler::new().await?;
        let db = self.clone();

        let job = Job::new_async(CLEANUP_SCHEDULE, move |uuid, _l| {
            let db = db.clone();
            Box::pin(async move {
                tracing::debug!("Running cleanup job {:?}", uuid);

                match db.clear_expired_reset_tokens(Utc::now()).await {
                    Ok(cleared) => {
                        tracing::info!(
                            "Cleanup job {:?} finished, cleared {} reset tokens",
                            uuid,
                            cleared
                        );
                    }
                    Err(e) => {
                        tracing::error!("Cleanup job {:?} failed: {:?}", uuid, e);
                    }
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;
        Ok(sched)
    }
}
