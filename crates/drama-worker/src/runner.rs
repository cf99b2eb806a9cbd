//! Poll loop and job lifecycle driver.
//!
//! One job at a time: claim, run the pipeline, report a terminal state,
//! poll again. Claim failures back off and retry forever; reporting
//! failures are logged and never retried.

use std::time::Duration;
use tracing::{error, info, warn, Instrument};

use crate::logging::job_span;
use crate::pipeline::Pipeline;
use drama_models::Job;
use drama_queue::QueueClient;

pub struct Runner {
    queue: QueueClient,
    pipeline: Pipeline,
    poll_interval: Duration,
    claim_backoff: Duration,
}

impl Runner {
    pub fn new(
        queue: QueueClient,
        pipeline: Pipeline,
        poll_interval: Duration,
        claim_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            pipeline,
            poll_interval,
            claim_backoff,
        }
    }

    /// Run until the surrounding task is cancelled.
    pub async fn run(&self) {
        info!("Worker polling for jobs");
        loop {
            let job = match self.queue.claim().await {
                Ok(job) => job,
                Err(e) => {
                    warn!(error = %e, "Claim failed, backing off");
                    tokio::time::sleep(self.claim_backoff).await;
                    continue;
                }
            };

            match job {
                Some(job) => self.run_job(job).await,
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    /// Drive one claimed job to a terminal report.
    async fn run_job(&self, job: Job) {
        let span = job_span(&job.id, "run_job");
        self.run_job_inner(job).instrument(span).await
    }

    async fn run_job_inner(&self, job: Job) {
        // A job without a source cannot even start; fail it without touching
        // the pipeline.
        if job.raw_key.is_none() {
            warn!(job_id = %job.id, "Claimed job has no rawKey");
            self.report_failure(&job, "Missing rawKey on job").await;
            return;
        }

        match self.pipeline.process(&job).await {
            Ok(result) => {
                if let Err(e) = self.queue.complete(&job.id, &result).await {
                    // The controller will see the job as stuck; nothing more
                    // this worker can do.
                    error!(job_id = %job.id, error = %e, "Completion report failed");
                } else {
                    info!(job_id = %job.id, "Job completed");
                }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Job failed");
                self.report_failure(&job, &e.to_string()).await;
            }
        }
    }

    async fn report_failure(&self, job: &Job, message: &str) {
        if let Err(e) = self.queue.progress(&job.id, 0, "failed", Some(message)).await {
            warn!(job_id = %job.id, error = %e, "Failure progress report failed");
        }
        if let Err(e) = self.queue.fail(&job.id, message).await {
            error!(job_id = %job.id, error = %e, "Failure report failed");
        }
    }
}
