//! Job scheduling capability handed to plugins through their context.
//!
//! Supported schedule expressions:
//! - `30s`, `5m`, `2h`, `1d` (fixed period)
//! - `@every 90s`
//! - `@hourly`, `@daily`
//! - `*/N * * * *` (every N minutes) and `* * * * *` (every minute)

use futures::future::BoxFuture;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

/// A repeatable unit of background work
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`Job`]
pub fn job<F, Fut>(f: F) -> Job
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Unsupported schedule expression: {0}")]
    Unsupported(String),

    #[error("Schedule period must be greater than zero: {0}")]
    ZeroPeriod(String),

    #[error("No async runtime available to run scheduled jobs")]
    NoRuntime,
}

/// Cleanup handle for a scheduled job.
///
/// `stop` is idempotent. Dropping the handle does not stop the job.
#[derive(Clone)]
pub struct JobHandle {
    id: Uuid,
    plugin_id: String,
    schedule: String,
    stopped: Arc<AtomicBool>,
    stop_fn: Arc<dyn Fn() + Send + Sync>,
}

impl JobHandle {
    pub fn new(
        plugin_id: impl Into<String>,
        schedule: impl Into<String>,
        stop_fn: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            plugin_id: plugin_id.into(),
            schedule: schedule.into(),
            stopped: Arc::new(AtomicBool::new(false)),
            stop_fn: Arc::new(stop_fn),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            (self.stop_fn)();
            debug!(plugin = %self.plugin_id, job = %self.id, "Stopped scheduled job");
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("plugin_id", &self.plugin_id)
            .field("schedule", &self.schedule)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Creates recurring jobs on behalf of plugins
pub trait JobScheduler: Send + Sync {
    fn schedule(&self, plugin_id: &str, schedule: &str, job: Job)
        -> Result<JobHandle, ScheduleError>;
}

/// Parse a schedule expression into its period
pub fn parse_schedule(expr: &str) -> Result<Duration, ScheduleError> {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    static MINUTE_STEP: OnceLock<Regex> = OnceLock::new();

    let duration = DURATION.get_or_init(|| {
        Regex::new(r"^(\d+)\s*(s|m|h|d)$").expect("duration pattern is valid")
    });
    let minute_step = MINUTE_STEP.get_or_init(|| {
        Regex::new(r"^\*(?:/(\d+))?\s+\*\s+\*\s+\*\s+\*$").expect("cron pattern is valid")
    });

    let trimmed = expr.trim();
    let unsupported = || ScheduleError::Unsupported(expr.to_string());

    let period = match trimmed {
        "@hourly" => Duration::from_secs(3600),
        "@daily" => Duration::from_secs(86_400),
        _ => {
            let body = trimmed.strip_prefix("@every").map(str::trim).unwrap_or(trimmed);
            if let Some(caps) = duration.captures(body) {
                let n: u64 = caps[1].parse().map_err(|_| unsupported())?;
                let unit = match &caps[2] {
                    "s" => 1,
                    "m" => 60,
                    "h" => 3600,
                    _ => 86_400,
                };
                Duration::from_secs(n.checked_mul(unit).ok_or_else(unsupported)?)
            } else if let Some(caps) = minute_step.captures(trimmed) {
                let n: u64 = match caps.get(1) {
                    Some(step) => step.as_str().parse().map_err(|_| unsupported())?,
                    None => 1,
                };
                Duration::from_secs(n.checked_mul(60).ok_or_else(unsupported)?)
            } else {
                return Err(unsupported());
            }
        }
    };

    if period.is_zero() {
        return Err(ScheduleError::ZeroPeriod(expr.to_string()));
    }
    Ok(period)
}

/// Tokio-backed scheduler running each job on a fixed period.
///
/// The first run happens one period after scheduling. Runs never overlap;
/// a tick missed because the previous run was slow is delayed, not burst.
#[derive(Debug, Default, Clone)]
pub struct IntervalScheduler;

impl IntervalScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl JobScheduler for IntervalScheduler {
    fn schedule(
        &self,
        plugin_id: &str,
        schedule: &str,
        job: Job,
    ) -> Result<JobHandle, ScheduleError> {
        let period = parse_schedule(schedule)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;

        let owner = plugin_id.to_string();
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Run on its own task so a panicking job only loses this run
                if let Err(e) = tokio::spawn(job()).await {
                    warn!(plugin = %owner, error = %e, "Scheduled job failed");
                }
            }
        });

        debug!(plugin = %plugin_id, schedule = %schedule, period = ?period, "Scheduled job");
        Ok(JobHandle::new(plugin_id, schedule, move || task.abort()))
    }
}
