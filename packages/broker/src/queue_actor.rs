//! Queue actor for managing the jobs of a single named queue.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use db::DbError;
use db::repositories::JobRepository;
use dispatch_core::{
    Delivery, Job, JobEvent, JobId, JobMessage, JobOptions, JobStatus, QueueConfig, QueueStats,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::client::SubmitReceipt;
use crate::error::BrokerError;
use crate::messages::QueueMessage;

/// Error recorded for a job that was still active when its process died and
/// had no attempts left.
const ABANDONED_AFTER_RESTART: &str = "abandoned after restart";

/// Schedule entry: earliest `run_at` first, older jobs first on ties.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledJob {
    job_id: JobId,
    run_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl ScheduledJob {
    fn of(job: &Job) -> Self {
        Self {
            job_id: job.id,
            run_at: job.run_at,
            created_at: job.created_at,
        }
    }
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest entry is on top.
        other
            .run_at
            .cmp(&self.run_at)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

/// Startup arguments for a queue actor.
pub struct QueueArgs {
    pub name: String,
    pub config: QueueConfig,
    pub events: broadcast::Sender<JobEvent>,
}

/// State for the queue actor.
pub struct QueueState {
    name: String,
    config: QueueConfig,
    /// Delivery order.
    schedule: BinaryHeap<ScheduledJob>,
    /// Jobs that have not reached a terminal state.
    jobs: HashMap<JobId, Job>,
    /// Ids currently handed to a worker.
    active: HashSet<JobId>,
    completed: u64,
    failed: u64,
    events: broadcast::Sender<JobEvent>,
}

impl QueueState {
    fn new(args: QueueArgs) -> Self {
        Self {
            name: args.name,
            config: args.config,
            schedule: BinaryHeap::new(),
            jobs: HashMap::new(),
            active: HashSet::new(),
            completed: 0,
            failed: 0,
            events: args.events,
        }
    }

    /// Broadcast an event.
    fn broadcast(&self, event: JobEvent) {
        tracing::debug!("{}", event.description());
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn enqueue(&mut self, job: Job) {
        self.schedule.push(ScheduledJob::of(&job));
        self.jobs.insert(job.id, job);
    }

    fn stats(&self) -> QueueStats {
        let now = Utc::now();
        let mut stats = QueueStats {
            completed: self.completed,
            failed: self.failed,
            ..Default::default()
        };
        for job in self.jobs.values() {
            match &job.status {
                JobStatus::Active { .. } => stats.active += 1,
                JobStatus::Delayed { until } if *until > now => stats.delayed += 1,
                JobStatus::Waiting | JobStatus::Delayed { .. } => stats.waiting += 1,
                JobStatus::Completed { .. } | JobStatus::Failed { .. } => {}
            }
        }
        stats
    }

    /// Build the job record for a submission.
    fn build_job(&self, options: JobOptions, message: JobMessage) -> Job {
        let name = options.name.unwrap_or_else(|| format!("JOB:{}", self.name));
        let mut job = Job::new(options.job_id, self.name.clone(), name, message)
            .with_max_attempts(options.attempts.unwrap_or(self.config.max_attempts));
        if let Some(delay) = options.delay {
            job = job.with_delay(delay);
        }
        job
    }

    /// Pop the next deliverable job, skipping stale schedule entries.
    fn next_ready(&mut self, now: DateTime<Utc>) -> Option<Job> {
        while let Some(entry) = self.schedule.peek() {
            if entry.run_at > now {
                return None;
            }
            let entry = self.schedule.pop()?;
            match self.jobs.get(&entry.job_id) {
                Some(job) if job.run_at == entry.run_at && job.is_ready(now) => {
                    return Some(job.clone());
                }
                _ => continue,
            }
        }
        None
    }

    /// Reload unfinished jobs persisted by an earlier run.
    ///
    /// A job left active with no attempts left is dead-lettered instead of
    /// being delivered again.
    async fn recover(&mut self) -> Result<usize, DbError> {
        let jobs = JobRepository::list_unfinished(&self.name).await?;
        let count = jobs.len();

        for mut job in jobs {
            if let JobStatus::Active { worker_id, .. } = &job.status {
                if !job.has_attempts_left() {
                    tracing::warn!(
                        "Job {} left active by worker {} has no attempts left",
                        job.id,
                        worker_id
                    );
                    self.bury(job, ABANDONED_AFTER_RESTART.to_string(), Utc::now())
                        .await;
                    continue;
                }
                tracing::info!(
                    "Redelivering job {} left active by worker {}",
                    job.id,
                    worker_id
                );
                job.status = JobStatus::Waiting;
                job.run_at = Utc::now();
                job = JobRepository::update(&job).await?;
            }
            self.enqueue(job);
        }

        Ok(count)
    }

    async fn submit(
        &mut self,
        options: JobOptions,
        message: JobMessage,
    ) -> Result<SubmitReceipt, BrokerError> {
        let job_id = options.job_id;

        // Finished ids are caught by the store, which keeps their history.
        if self.jobs.contains_key(&job_id) {
            return Ok(self.deduplicated(job_id));
        }

        let job = self.build_job(options, message);

        // Persist before acknowledging.
        match JobRepository::create(&job).await {
            Ok(_) => {}
            Err(DbError::AlreadyExists(_)) => return Ok(self.deduplicated(job_id)),
            Err(e) => return Err(e.into()),
        }

        let delayed_until = match &job.status {
            JobStatus::Delayed { until } => Some(*until),
            _ => None,
        };
        self.broadcast(JobEvent::JobSubmitted {
            job_id,
            queue_name: self.name.clone(),
            name: job.name.clone(),
            delayed_until,
            timestamp: Utc::now(),
        });
        self.enqueue(job);

        Ok(SubmitReceipt {
            job_id,
            deduplicated: false,
        })
    }

    fn deduplicated(&self, job_id: JobId) -> SubmitReceipt {
        tracing::info!("Job {} already known to {}, not enqueued again", job_id, self.name);
        self.broadcast(JobEvent::JobDeduplicated {
            job_id,
            queue_name: self.name.clone(),
            timestamp: Utc::now(),
        });
        SubmitReceipt {
            job_id,
            deduplicated: true,
        }
    }

    /// Hand the next ready job to `worker_id`, marking it active.
    async fn deliver(&mut self, worker_id: &str) -> Option<Delivery> {
        // Check concurrency limit
        if self.active.len() >= self.config.concurrency as usize {
            return None;
        }

        let now = Utc::now();
        let previous = self.next_ready(now)?;

        let mut job = previous.clone();
        job.attempts = job.attempts.saturating_add(1);
        job.status = JobStatus::Active {
            started_at: now,
            worker_id: worker_id.to_string(),
        };

        if let Err(e) = JobRepository::update(&job).await {
            tracing::warn!("Failed to mark job {} active: {}", job.id, e);
            self.enqueue(previous);
            return None;
        }

        let delivery = Delivery::from_job(&job);
        self.active.insert(job.id);
        self.jobs.insert(job.id, job);

        Some(delivery)
    }

    fn started(&self, job_id: JobId, attempt: u32, worker_id: String) {
        self.broadcast(JobEvent::JobStarted {
            job_id,
            queue_name: self.name.clone(),
            worker_id,
            attempt,
            timestamp: Utc::now(),
        });
    }

    /// Undo a delivery whose worker stopped waiting for the reply.
    async fn hand_back(&mut self, job_id: JobId) {
        self.active.remove(&job_id);
        let Some(mut job) = self.jobs.remove(&job_id) else {
            return;
        };
        job.attempts = job.attempts.saturating_sub(1);
        job.status = JobStatus::Waiting;

        tracing::warn!("Delivery of job {} was not received, putting it back", job_id);
        match JobRepository::update(&job).await {
            Ok(stored) => job = stored,
            Err(e) => tracing::warn!("Failed to put job {} back: {}", job_id, e),
        }
        self.enqueue(job);
    }

    /// Remove a job from the active set, if `worker_id` still holds it.
    fn take_active(&mut self, job_id: JobId, worker_id: &str) -> Option<Job> {
        let held_by_worker = matches!(
            self.jobs.get(&job_id).map(|j| &j.status),
            Some(JobStatus::Active { worker_id: holder, .. }) if holder == worker_id
        );
        if !held_by_worker {
            tracing::warn!(
                "Ignoring report for job {} from {}: not active there",
                job_id,
                worker_id
            );
            return None;
        }
        self.active.remove(&job_id);
        self.jobs.remove(&job_id)
    }

    async fn complete(&mut self, job_id: JobId, worker_id: &str, duration_ms: u64) {
        let Some(mut job) = self.take_active(job_id, worker_id) else {
            return;
        };

        let now = Utc::now();
        let started_at = match &job.status {
            JobStatus::Active { started_at, .. } => *started_at,
            _ => now,
        };
        job.status = JobStatus::Completed {
            started_at,
            completed_at: now,
        };

        self.completed += 1;

        if let Err(e) = JobRepository::archive(&job).await {
            tracing::warn!("Failed to archive job {}: {}", job_id, e);
        }

        self.broadcast(JobEvent::JobCompleted {
            job_id,
            queue_name: self.name.clone(),
            duration_ms,
            timestamp: now,
        });
    }

    async fn fail(&mut self, job_id: JobId, worker_id: &str, error: String, fatal: bool) {
        let Some(mut job) = self.take_active(job_id, worker_id) else {
            return;
        };

        let now = Utc::now();
        let attempts = job.attempts;
        let will_retry = !fatal && job.has_attempts_left();
        job.last_error = Some(error.clone());

        self.broadcast(JobEvent::JobFailed {
            job_id,
            queue_name: self.name.clone(),
            error: error.clone(),
            attempts,
            will_retry,
            timestamp: now,
        });

        if will_retry {
            let delay = self.config.backoff.delay_for(attempts);
            job = job.reschedule(now, delay);

            if let Err(e) = JobRepository::update(&job).await {
                tracing::warn!("Failed to reschedule job {}: {}", job_id, e);
            }

            self.broadcast(JobEvent::JobRetrying {
                job_id,
                queue_name: self.name.clone(),
                attempt: attempts + 1,
                delay_ms: delay.as_millis() as u64,
                timestamp: now,
            });
            self.enqueue(job);
        } else {
            self.bury(job, error, now).await;
        }
    }

    /// Fail a job for good and move it to the dead letters.
    async fn bury(&mut self, mut job: Job, error: String, now: DateTime<Utc>) {
        let job_id = job.id;
        let attempts = job.attempts;
        job.last_error = Some(error.clone());
        job.status = JobStatus::Failed {
            failed_at: now,
            error: error.clone(),
        };
        self.failed += 1;

        if let Err(e) = JobRepository::dead_letter(&job).await {
            tracing::warn!("Failed to dead-letter job {}: {}", job_id, e);
        }

        tracing::warn!(
            "Job {} dead-lettered after {} attempt(s): {}",
            job_id,
            attempts,
            error
        );
        self.broadcast(JobEvent::JobDeadLettered {
            job_id,
            queue_name: self.name.clone(),
            error,
            attempts,
            timestamp: now,
        });
    }
}

/// Queue actor that manages a single queue.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueState;
    type Arguments = QueueArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting queue actor: {}", args.name);

        let mut state = QueueState::new(args);
        match state.recover().await {
            Ok(0) => {}
            Ok(count) => tracing::info!("Recovered {} unfinished job(s) for {}", count, state.name),
            Err(e) => tracing::warn!("Failed to recover jobs for {}: {}", state.name, e),
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Submit {
                options,
                message,
                reply,
            } => {
                let _ = reply.send(state.submit(options, message).await);
            }

            QueueMessage::RequestDelivery { worker_id, reply } => {
                let delivery = state.deliver(&worker_id).await;
                let handed_out = delivery.as_ref().map(|d| (d.job_id, d.attempt));
                match (reply.send(delivery), handed_out) {
                    (Ok(()), Some((job_id, attempt))) => state.started(job_id, attempt, worker_id),
                    // The worker gave up waiting; nobody will run or report this job.
                    (Err(_), Some((job_id, _))) => state.hand_back(job_id).await,
                    (_, None) => {}
                }
            }

            QueueMessage::Ack {
                job_id,
                worker_id,
                duration_ms,
            } => {
                state.complete(job_id, &worker_id, duration_ms).await;
            }

            QueueMessage::Nack {
                job_id,
                worker_id,
                error,
                fatal,
            } => {
                state.fail(job_id, &worker_id, error, fatal).await;
            }

            QueueMessage::Configure { config } => {
                tracing::debug!("Reconfiguring queue {}: {:?}", state.name, config);
                state.config = config;
            }

            QueueMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.jobs.get(&job_id).cloned());
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down queue: {}", state.name);
                myself.stop(None);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::LazyLock;

    use chrono::Duration;
    use db::DbConfig;
    use dispatch_core::CorrelationId;
    use tokio::runtime::Runtime;

    use crate::broker::call;

    const RPC_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    fn scheduled(run_in_ms: i64, created_ago_ms: i64) -> ScheduledJob {
        let now = Utc::now();
        ScheduledJob {
            job_id: JobId::new(),
            run_at: now + Duration::milliseconds(run_in_ms),
            created_at: now - Duration::milliseconds(created_ago_ms),
        }
    }

    fn state() -> QueueState {
        let (events, _) = broadcast::channel(16);
        QueueState::new(QueueArgs {
            name: "unit".to_string(),
            config: QueueConfig::default(),
            events,
        })
    }

    #[test]
    fn earliest_run_at_comes_first() {
        let mut heap = BinaryHeap::new();
        let later = scheduled(500, 0);
        let sooner = scheduled(100, 0);
        heap.push(later.clone());
        heap.push(sooner.clone());
        assert_eq!(heap.pop(), Some(sooner));
        assert_eq!(heap.pop(), Some(later));
    }

    #[test]
    fn older_job_wins_a_tie() {
        let older = scheduled(0, 1_000);
        let mut newer = scheduled(0, 10);
        newer.run_at = older.run_at;
        let mut heap = BinaryHeap::from(vec![newer, older.clone()]);
        assert_eq!(heap.pop(), Some(older));
    }

    #[test]
    fn build_job_applies_options_and_queue_defaults() {
        let state = state();
        let correlation_id = CorrelationId::new();
        let message = JobMessage::new(correlation_id, "{}");

        let job = state.build_job(JobOptions::new(correlation_id.into()), message.clone());
        assert_eq!(job.name, "JOB:unit");
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.status, JobStatus::Waiting);

        let job = state.build_job(
            JobOptions::new(JobId::new())
                .with_name("custom")
                .with_attempts(7)
                .with_delay(std::time::Duration::from_secs(30)),
            message,
        );
        assert_eq!(job.name, "custom");
        assert_eq!(job.max_attempts, 7);
        assert!(matches!(job.status, JobStatus::Delayed { .. }));
    }

    #[test]
    fn next_ready_skips_future_and_stale_entries() {
        let mut state = state();
        let correlation_id = CorrelationId::new();
        let message = JobMessage::new(correlation_id, "{}");

        let delayed = state
            .build_job(JobOptions::new(JobId::new()), message.clone())
            .with_delay(std::time::Duration::from_secs(60));
        state.enqueue(delayed);
        assert!(state.next_ready(Utc::now()).is_none());

        let ready = state.build_job(JobOptions::new(JobId::new()), message);
        let ready_id = ready.id;
        state.enqueue(ready);
        // Stale duplicate entry for the same job.
        if let Some(job) = state.jobs.get(&ready_id) {
            state.schedule.push(ScheduledJob {
                run_at: job.run_at - Duration::seconds(1),
                ..ScheduledJob::of(job)
            });
        }

        let next = state.next_ready(Utc::now()).map(|j| j.id);
        assert_eq!(next, Some(ready_id));
    }

    #[test]
    fn stats_split_waiting_delayed_and_active() {
        let mut state = state();
        let message = JobMessage::new(CorrelationId::new(), "{}");

        let waiting = state.build_job(JobOptions::new(JobId::new()), message.clone());
        let delayed = state
            .build_job(JobOptions::new(JobId::new()), message.clone())
            .with_delay(std::time::Duration::from_secs(60));
        state.enqueue(waiting);
        state.enqueue(delayed);
        let mut active = state.build_job(JobOptions::new(JobId::new()), message);
        active.status = JobStatus::Active {
            started_at: Utc::now(),
            worker_id: "w".to_string(),
        };
        state.enqueue(active);

        let stats = state.stats();
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.delayed, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.outstanding(), 3);
    }

    /// Runtime shared by the tests that touch the in-memory store.
    static RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build test runtime")
    });

    fn with_store<F: Future>(future: F) -> F::Output {
        RUNTIME.block_on(async {
            db::init(DbConfig::memory())
                .await
                .expect("failed to initialize database");
            future.await
        })
    }

    async fn spawn_queue(concurrency: u32) -> ActorRef<QueueMessage> {
        let (events, _) = broadcast::channel(16);
        let args = QueueArgs {
            name: format!("unit-{}", uuid::Uuid::new_v4().simple()),
            config: QueueConfig::default().with_concurrency(concurrency),
            events,
        };
        let (queue, _) = Actor::spawn(None, QueueActor, args).await.unwrap();
        queue
    }

    async fn request_delivery(queue: &ActorRef<QueueMessage>, worker_id: &str) -> Option<Delivery> {
        let worker_id = worker_id.to_string();
        call(
            queue,
            |reply| QueueMessage::RequestDelivery { worker_id, reply },
            RPC_TIMEOUT,
        )
        .await
        .unwrap()
    }

    #[test]
    fn unreceived_delivery_goes_back_to_the_queue() {
        with_store(async {
            let queue = spawn_queue(1).await;

            let id = CorrelationId::new();
            let receipt = call(
                &queue,
                |reply| QueueMessage::Submit {
                    options: JobOptions::new(id.into()),
                    message: JobMessage::new(id, r#"{"foo":"bar"}"#),
                    reply,
                },
                RPC_TIMEOUT,
            )
            .await
            .unwrap()
            .unwrap();
            assert!(!receipt.deduplicated);

            // A worker whose request already timed out.
            let (reply, receiver) = ractor::concurrency::oneshot();
            drop(receiver);
            queue
                .send_message(QueueMessage::RequestDelivery {
                    worker_id: "timed-out".to_string(),
                    reply: reply.into(),
                })
                .unwrap();

            let stats = call(&queue, |reply| QueueMessage::GetStats { reply }, RPC_TIMEOUT)
                .await
                .unwrap();
            assert_eq!(stats.active, 0);
            assert_eq!(stats.waiting, 1);

            let stored = JobRepository::get(id.into()).await.unwrap();
            assert_eq!(stored.attempts, 0);
            assert_eq!(stored.status, JobStatus::Waiting);

            let delivery = request_delivery(&queue, "next").await.unwrap();
            assert_eq!(delivery.job_id, JobId::from(id));
            assert_eq!(delivery.attempt, 1);

            queue.stop(None);
        });
    }
}
