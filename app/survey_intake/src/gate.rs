use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Days;
use chrono::FixedOffset;
use chrono::NaiveTime;
use chrono::TimeDelta;
use chrono::Weekday;
use framework::config_error;
use framework::exception;
use framework::exception::CoreRsResult;
use framework::exception::error_code::IO_ERROR;
use framework::json;
use serde::Deserialize;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing::warn;

use crate::code::error_code::REPORT_STATE_NOT_SAVED;

const STATE_FILE_NAME: &str = "weekly-report-state.json";
const TEMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyReportConfig {
    #[serde(default = "default_weekday")]
    pub weekday: Weekday,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,
}

impl Default for WeeklyReportConfig {
    fn default() -> Self {
        Self {
            weekday: default_weekday(),
            hour: default_hour(),
            minute: 0,
            window_minutes: default_window_minutes(),
            cooldown_hours: default_cooldown_hours(),
        }
    }
}

fn default_weekday() -> Weekday {
    Weekday::Mon
}

fn default_hour() -> u32 {
    8
}

fn default_window_minutes() -> i64 {
    15
}

fn default_cooldown_hours() -> i64 {
    20
}

/// Weekly send slot, a window of `window` length starting at `weekday` `time`.
#[derive(Debug, Clone)]
pub struct WeeklySchedule {
    weekday: Weekday,
    time: NaiveTime,
    window: TimeDelta,
    cooldown: TimeDelta,
}

impl WeeklySchedule {
    pub fn new(config: &WeeklyReportConfig) -> CoreRsResult<Self> {
        let time = NaiveTime::from_hms_opt(config.hour, config.minute, 0).ok_or_else(|| {
            config_error!(
                message = format!(
                    "invalid weekly report time, hour={}, minute={}",
                    config.hour, config.minute
                )
            )
        })?;
        if config.window_minutes <= 0 || config.window_minutes >= 7 * 24 * 60 {
            return Err(config_error!(
                message = format!("invalid weekly report window, window_minutes={}", config.window_minutes)
            ));
        }
        if config.cooldown_hours < 0 {
            return Err(config_error!(
                message = format!("invalid weekly report cooldown, cooldown_hours={}", config.cooldown_hours)
            ));
        }
        Ok(Self {
            weekday: config.weekday,
            time,
            window: TimeDelta::minutes(config.window_minutes),
            cooldown: TimeDelta::hours(config.cooldown_hours),
        })
    }

    // start inclusive, end exclusive, evaluated in the timezone of now
    pub fn in_window(&self, now: DateTime<FixedOffset>) -> bool {
        let local = now.naive_local();
        let days_back = (7 + local.weekday().num_days_from_monday() - self.weekday.num_days_from_monday()) % 7;
        let Some(date) = local.date().checked_sub_days(Days::new(u64::from(days_back))) else {
            return false;
        };
        let mut slot = date.and_time(self.time);
        if slot > local {
            slot -= TimeDelta::days(7);
        }
        local - slot < self.window
    }

    fn cooled_down(&self, last_sent: Option<DateTime<FixedOffset>>, now: DateTime<FixedOffset>) -> bool {
        last_sent.is_none_or(|last_sent| now - last_sent > self.cooldown)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GateState {
    last_sent: Option<DateTime<FixedOffset>>,
    #[serde(skip)]
    in_flight: bool,
}

/// Decides whether the weekly digest is due and remembers when it was last delivered.
///
/// `try_acquire` checks and marks the digest in flight under one lock, so concurrent
/// callers can't both pass the gate. The holder must call `mark_sent` or `release`.
pub struct WeeklyReportGate {
    schedule: WeeklySchedule,
    state: Mutex<GateState>,
    state_file: Option<PathBuf>,
}

impl WeeklyReportGate {
    pub fn in_memory(schedule: WeeklySchedule) -> Self {
        Self {
            schedule,
            state: Mutex::new(GateState::default()),
            state_file: None,
        }
    }

    /// Restores the last sent time from `dir`, a missing or unreadable file means never sent.
    pub fn persistent(schedule: WeeklySchedule, dir: PathBuf) -> Self {
        let state_file = dir.join(STATE_FILE_NAME);
        let state = if state_file.exists() {
            json::load_file::<GateState>(&state_file).unwrap_or_else(|e| {
                warn!("failed to load weekly report state, start from empty, error={e}");
                GateState::default()
            })
        } else {
            GateState::default()
        };
        if let Some(last_sent) = state.last_sent {
            info!("restored weekly report state, last_sent={}", last_sent.to_rfc3339());
        }
        Self {
            schedule,
            state: Mutex::new(state),
            state_file: Some(state_file),
        }
    }

    pub fn try_acquire(&self, now: DateTime<FixedOffset>) -> bool {
        if !self.schedule.in_window(now) {
            return false;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight || !self.schedule.cooled_down(state.last_sent, now) {
            return false;
        }
        state.in_flight = true;
        true
    }

    pub async fn mark_sent(&self, sent_at: DateTime<FixedOffset>) {
        let content = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.last_sent = Some(sent_at);
            state.in_flight = false;
            json::to_json(&*state)
        };
        let Some(ref state_file) = self.state_file else {
            return;
        };
        let result = match content {
            Ok(content) => save_state(state_file, content).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error_code = REPORT_STATE_NOT_SAVED, "failed to save weekly report state, error={e}");
        }
    }

    pub fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = false;
    }

    pub fn last_sent(&self) -> Option<DateTime<FixedOffset>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).last_sent
    }
}

// written to a temp file and renamed over the old one, readers see either the old or the new state
async fn save_state(state_file: &Path, content: String) -> CoreRsResult<()> {
    let temp_file = state_file.with_extension(TEMP_EXTENSION);
    let mut file = File::create(&temp_file).await.map_err(|err| io_error(&temp_file, err))?;
    file.write_all(content.as_bytes()).await.map_err(|err| io_error(&temp_file, err))?;
    file.sync_all().await.map_err(|err| io_error(&temp_file, err))?;
    drop(file);
    tokio::fs::rename(&temp_file, state_file)
        .await
        .map_err(|err| io_error(state_file, err))
}

fn io_error(path: &Path, err: std::io::Error) -> exception::Exception {
    exception!(
        code = IO_ERROR,
        message = format!("failed to write file, path={}", path.to_string_lossy()),
        source = err
    )
}
