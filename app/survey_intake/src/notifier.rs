use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use chrono::FixedOffset;
use framework::exception::CoreRsResult;
use framework::task;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::classifier::Classifier;
use crate::code::error_code::NOTIFICATION_DROPPED;
use crate::code::error_code::NOTIFICATION_FAILED;
use crate::event::Event;
use crate::gate::WeeklyReportGate;
use crate::mail::MailTransport;
use crate::report;
use crate::report::Logo;
use crate::stats::StatisticsRules;
use crate::stats::compute_weekly_statistics;
use crate::store::EventLog;

#[derive(Debug)]
pub enum Notification {
    CriticalAlert(Box<Event>),
    WeeklyDigest { now: DateTime<FixedOffset> },
}

impl Notification {
    fn kind(&self) -> &'static str {
        match self {
            Notification::CriticalAlert(_) => "critical_alert",
            Notification::WeeklyDigest { .. } => "weekly_digest",
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifierStats {
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Everything the worker needs to compose and deliver notifications.
pub struct NotifierContext {
    pub transport: Arc<dyn MailTransport>,
    pub recipients: Vec<String>,
    pub logo: Logo,
    pub log: Arc<EventLog>,
    pub classifier: Arc<Classifier>,
    pub rules: StatisticsRules,
    pub gate: Arc<WeeklyReportGate>,
}

/// Queues notifications for a single background worker.
///
/// Enqueueing never waits, delivery is one best-effort attempt. Failures are logged
/// and counted, they never reach the caller.
pub struct Notifier {
    sender: Mutex<Option<mpsc::Sender<Notification>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl Notifier {
    pub fn start(context: NotifierContext, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker = task::spawn_worker("notifier", run(context, receiver, Arc::clone(&counters)));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            counters,
        }
    }

    pub fn send_critical_alert(&self, event: Event) -> bool {
        self.enqueue(Notification::CriticalAlert(Box::new(event)))
    }

    pub fn send_weekly_digest(&self, now: DateTime<FixedOffset>) -> bool {
        self.enqueue(Notification::WeeklyDigest { now })
    }

    fn enqueue(&self, notification: Notification) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            warn!(
                error_code = NOTIFICATION_DROPPED,
                kind = notification.kind(),
                "notifier is closed, drop notification"
            );
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        match sender.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(notification) | TrySendError::Closed(notification)) => {
                warn!(
                    error_code = NOTIFICATION_DROPPED,
                    kind = notification.kind(),
                    "notification queue unavailable, drop notification"
                );
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> NotifierStats {
        NotifierStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting notifications and waits until queued ones are processed.
    pub async fn close(&self) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker
            && let Err(err) = worker.await
        {
            error!("notifier worker panicked, error={err}");
        }
    }
}

async fn run(context: NotifierContext, mut receiver: mpsc::Receiver<Notification>, counters: Arc<Counters>) -> CoreRsResult<()> {
    while let Some(notification) = receiver.recv().await {
        let kind = notification.kind();
        match process(&context, notification).await {
            Ok(()) => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
                info!(kind, "notification sent");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(error_code = NOTIFICATION_FAILED, kind, "failed to send notification, error={e}");
            }
        }
    }
    Ok(())
}

async fn process(context: &NotifierContext, notification: Notification) -> CoreRsResult<()> {
    match notification {
        Notification::CriticalAlert(event) => {
            let mail = report::critical_alert(&event, &context.logo)?;
            context.transport.send(&mail, &context.recipients).await
        }
        Notification::WeeklyDigest { now } => {
            let result = send_weekly_digest(context, now).await;
            if result.is_ok() {
                context.gate.mark_sent(now).await;
            } else {
                context.gate.release();
            }
            result
        }
    }
}

async fn send_weekly_digest(context: &NotifierContext, now: DateTime<FixedOffset>) -> CoreRsResult<()> {
    let log = Arc::clone(&context.log);
    let classifier = Arc::clone(&context.classifier);
    let rules = context.rules.clone();
    let (period, statistics) =
        tokio::task::spawn_blocking(move || compute_weekly_statistics(&log, &classifier, &rules, now)).await??;
    info!(
        total_requests = statistics.total_requests,
        successful_surveys = statistics.successful_surveys,
        failed_surveys = statistics.failed_surveys,
        unique_users = statistics.unique_user_count(),
        "weekly statistics computed"
    );
    let mail = report::weekly_digest(&statistics, &period, &context.logo)?;
    context.transport.send(&mail, &context.recipients).await
}
