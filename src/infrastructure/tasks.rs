//! Background worker for reminder side effects.
//!
//! The checkout engine only enqueues; the worker performs the scheduler calls
//! after the request has completed. Scheduling is retried a bounded number of
//! times, cancellation runs once. On shutdown every job already enqueued is
//! still executed before the worker exits.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::domain::reminders::reminder_fire_time;
use crate::domain::{CheckoutRepository, ReminderHandle, ReminderScheduler};

#[derive(Debug, Clone, PartialEq)]
pub enum ReminderJob {
    /// Schedule the due-date reminder of a freshly created checkout
    Schedule {
        checkout_id: i32,
        due_date: DateTime<Utc>,
    },
    /// Cancel the reminder of a returned checkout
    Cancel {
        checkout_id: i32,
        handle: ReminderHandle,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

enum Message {
    Job(ReminderJob),
    Shutdown,
}

/// Cheap, cloneable handle used to submit reminder jobs
#[derive(Clone)]
pub struct ReminderQueue {
    tx: Option<mpsc::UnboundedSender<Message>>,
}

impl ReminderQueue {
    /// A queue that drops every job. Used when no worker runs.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Submit a job without waiting for it
    pub fn enqueue(&self, job: ReminderJob) {
        let Some(tx) = &self.tx else {
            tracing::debug!("Reminder queue disabled, dropping {:?}", job);
            return;
        };

        if let Err(mpsc::error::SendError(Message::Job(job))) = tx.send(Message::Job(job)) {
            tracing::warn!("Reminder worker stopped, dropping {:?}", job);
        }
    }
}

struct WorkerContext {
    scheduler: Arc<dyn ReminderScheduler>,
    checkouts: Arc<dyn CheckoutRepository>,
    timezone: FixedOffset,
    retry: RetryPolicy,
}

/// Owns the worker task; call [`ReminderWorker::shutdown`] to drain it
pub struct ReminderWorker {
    tx: mpsc::UnboundedSender<Message>,
    handle: JoinHandle<()>,
}

impl ReminderWorker {
    /// Stop accepting jobs, finish everything already queued and wait for it
    pub async fn shutdown(self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Err(e) = self.handle.await {
            tracing::error!("Reminder worker terminated abnormally: {}", e);
        }
        tracing::info!("Reminder worker stopped");
    }
}

/// Spawn the reminder worker on the current runtime
pub fn start(
    scheduler: Arc<dyn ReminderScheduler>,
    checkouts: Arc<dyn CheckoutRepository>,
    timezone: FixedOffset,
    retry: RetryPolicy,
) -> (ReminderQueue, ReminderWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ctx = Arc::new(WorkerContext {
        scheduler,
        checkouts,
        timezone,
        retry,
    });

    let handle = tokio::spawn(run(ctx, rx));

    (
        ReminderQueue {
            tx: Some(tx.clone()),
        },
        ReminderWorker { tx, handle },
    )
}

async fn run(ctx: Arc<WorkerContext>, mut rx: mpsc::UnboundedReceiver<Message>) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(Message::Job(job)) => {
                    in_flight.spawn(process(ctx.clone(), job));
                }
                Some(Message::Shutdown) | None => break,
            },
            Some(res) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = res {
                    tracing::error!("Reminder job panicked: {}", e);
                }
            }
        }
    }

    // Drain: nothing new is accepted, but queued jobs still run
    rx.close();
    while let Some(msg) = rx.recv().await {
        if let Message::Job(job) = msg {
            in_flight.spawn(process(ctx.clone(), job));
        }
    }

    if !in_flight.is_empty() {
        tracing::info!("Waiting for {} reminder job(s) to finish", in_flight.len());
    }
    while let Some(res) = in_flight.join_next().await {
        if let Err(e) = res {
            tracing::error!("Reminder job panicked: {}", e);
        }
    }
}

async fn process(ctx: Arc<WorkerContext>, job: ReminderJob) {
    match job {
        ReminderJob::Schedule {
            checkout_id,
            due_date,
        } => schedule(&ctx, checkout_id, due_date).await,
        ReminderJob::Cancel {
            checkout_id,
            handle,
        } => cancel(&ctx, checkout_id, &handle).await,
    }
}

async fn cancel(ctx: &WorkerContext, checkout_id: i32, handle: &str) {
    match ctx.scheduler.cancel(handle).await {
        Ok(cancelled) => tracing::debug!(
            "Reminder {} for checkout {} cancelled: {}",
            handle,
            checkout_id,
            cancelled
        ),
        Err(e) => tracing::warn!(
            "Failed to cancel reminder {} for checkout {}: {}",
            handle,
            checkout_id,
            e
        ),
    }
}

async fn schedule(ctx: &WorkerContext, checkout_id: i32, due_date: DateTime<Utc>) {
    let Some(fire_at) = reminder_fire_time(due_date, &ctx.timezone) else {
        tracing::warn!(
            "No valid reminder time for checkout {} due {}",
            checkout_id,
            due_date
        );
        return;
    };

    let attempts = ctx.retry.attempts.max(1);
    for attempt in 1..=attempts {
        match ctx.scheduler.schedule(checkout_id, fire_at).await {
            Ok(Some(handle)) => {
                match ctx
                    .checkouts
                    .set_reminder_message_id(checkout_id, Some(handle.clone()))
                    .await
                {
                    Ok(true) => {}
                    // Returned meanwhile; the return saw no handle to cancel
                    Ok(false) => {
                        tracing::info!(
                            "Checkout {} returned before reminder {} was saved, cancelling it",
                            checkout_id,
                            handle
                        );
                        cancel(ctx, checkout_id, &handle).await;
                    }
                    Err(e) => tracing::warn!(
                        "Reminder scheduled but handle not saved for checkout {}: {}",
                        checkout_id,
                        e
                    ),
                }
                return;
            }
            Ok(None) => return,
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Scheduling reminder for checkout {} failed (attempt {}/{}): {}",
                    checkout_id,
                    attempt,
                    attempts,
                    e
                );
                tokio::time::sleep(ctx.retry.backoff * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    "Giving up on reminder for checkout {} after {} attempts: {}",
                    checkout_id,
                    attempts,
                    e
                );
            }
        }
    }
}
