use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use tracing::info;

use crate::cache::NewsCache;
use crate::dispatch::DigestDispatcher;
use crate::subscribers::SubscriberStore;

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// A job bound to a local wall-clock time, run at most once per calendar day.
pub struct DailyTask {
    at: NaiveTime,
    last_run: Option<NaiveDate>,
}

impl DailyTask {
    pub fn new(at: NaiveTime) -> Self {
        Self { at, last_run: None }
    }

    /// Due when a scheduled instant has passed that `mark_run` has not yet
    /// accounted for. A missed instant fires on the next check rather than
    /// being skipped, including when the check lands after midnight: the
    /// comparison is against the day of the most recent scheduled instant,
    /// not the bare time-of-day.
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        match self.last_run {
            None => now.time() >= self.at,
            Some(last) => self.due_date_at(now).is_some_and(|due| last < due),
        }
    }

    /// The calendar day of the most recent scheduled instant at or before
    /// `now`: today once the scheduled time has passed, otherwise yesterday.
    fn due_date_at(&self, now: DateTime<Local>) -> Option<NaiveDate> {
        if now.time() >= self.at {
            Some(now.date_naive())
        } else {
            now.date_naive().pred_opt()
        }
    }

    /// Record which scheduled instant the run just satisfied. A late fire
    /// after midnight credits the previous day, so the current day's
    /// scheduled instant still fires on time.
    pub fn mark_run(&mut self, now: DateTime<Local>) {
        self.last_run = self.due_date_at(now).or(self.last_run);
    }
}

/// Polling loop driving the daily task. Ad-hoc triggers are spawned
/// separately and never touch this task's state.
pub async fn run_daily<F, Fut>(at: NaiveTime, job: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut task = DailyTask::new(at);
    info!("Scheduling daily digest for {}", at.format("%H:%M"));

    loop {
        let now = Local::now();
        if task.is_due(now) {
            info!("Daily digest due, running job");
            job().await;
            task.mark_run(now);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// The refresh-and-dispatch operation shared by the daily task and the
/// ad-hoc run-now trigger.
pub async fn run_digest_job(
    cache: Arc<NewsCache>,
    dispatcher: Arc<DigestDispatcher>,
    subscribers: Arc<SubscriberStore>,
) {
    let items = cache.get_or_refresh().await;
    let recipients: Vec<String> = subscribers.load().into_iter().collect();
    let report = dispatcher.dispatch(&items, &recipients).await;
    info!(
        "Digest job complete: {} sent, {} failed",
        report.sent.len(),
        report.failed.len()
    );
}
