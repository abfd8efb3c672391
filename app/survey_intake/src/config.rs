use std::env;
use std::path::Path;
use std::path::PathBuf;

use chrono::FixedOffset;
use framework::config_error;
use framework::exception::CoreRsResult;
use framework::json;
use serde::Deserialize;

use crate::classifier::ClassificationConfig;
use crate::gate::WeeklyReportConfig;
use crate::stats::StatisticsRules;

const MAIL_PASSWORD_ENV: &str = "MAIL_PASSWORD";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub log_dir: String,
    pub timezone_offset_hours: i32,
    #[serde(default)]
    pub logo_path: Option<String>,
    pub mail: MailConfig,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub statistics: StatisticsRules,
    #[serde(default)]
    pub weekly_report: WeeklyReportConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Deserialize, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
}

// keep the password out of logs
impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

impl AppConfig {
    pub fn load(path: &Path) -> CoreRsResult<Self> {
        let mut config: AppConfig = json::load_file(path)?;
        if let Ok(password) = env::var(MAIL_PASSWORD_ENV)
            && !password.is_empty()
        {
            config.mail.password = password;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreRsResult<()> {
        if self.log_dir.trim().is_empty() {
            return Err(config_error!(message = "log_dir must not be empty"));
        }
        self.timezone()?;
        if self.mail.host.trim().is_empty() || self.mail.from.trim().is_empty() {
            return Err(config_error!(message = "mail host and from must not be empty"));
        }
        if self.notifier.queue_capacity == 0 {
            return Err(config_error!(message = "notifier queue_capacity must be positive"));
        }
        Ok(())
    }

    pub fn timezone(&self) -> CoreRsResult<FixedOffset> {
        self.timezone_offset_hours
            .checked_mul(60 * 60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                config_error!(
                    message = format!(
                        "invalid timezone offset, timezone_offset_hours={}",
                        self.timezone_offset_hours
                    )
                )
            })
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.log_dir)
    }

    /// Trimmed recipients without blanks and duplicates, in configured order.
    pub fn recipients(&self) -> Vec<String> {
        let mut recipients: Vec<String> = Vec::with_capacity(self.recipients.len());
        for recipient in &self.recipients {
            let recipient = recipient.trim();
            if !recipient.is_empty() && !recipients.iter().any(|existing| existing.eq_ignore_ascii_case(recipient)) {
                recipients.push(recipient.to_owned());
            }
        }
        recipients
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::FixedOffset;
    use chrono::Weekday;

    use super::AppConfig;

    const CONFIG: &str = r#"{
        "log_dir": "./logs",
        "timezone_offset_hours": -3,
        "mail": {"host": "smtp.example.com", "port": 587, "username": "reports", "password": "secret", "from": "reports@example.com"},
        "recipients": ["hr@example.com", " ", "", "it@example.com", " hr@example.com", "HR@example.com"],
        "classification": {"critical_codes": ["ERR_SERVER"], "failed_survey_codes": ["ERR_ATTACHMENT_UPLOAD"]}
    }"#;

    fn config() -> AppConfig {
        framework::json::from_json(CONFIG).unwrap()
    }

    #[test]
    fn defaults() {
        let config = config();
        assert_eq!(config.weekly_report.weekday, Weekday::Mon);
        assert_eq!(config.weekly_report.hour, 8);
        assert_eq!(config.weekly_report.window_minutes, 15);
        assert_eq!(config.weekly_report.cooldown_hours, 20);
        assert_eq!(config.statistics.request_code_prefix, "INFO_REQUEST");
        assert_eq!(config.notifier.queue_capacity, 100);
        assert!(config.logo_path.is_none());
    }

    #[test]
    fn recipients() {
        assert_eq!(
            config().recipients(),
            vec!["hr@example.com".to_owned(), "it@example.com".to_owned()]
        );
    }

    #[test]
    fn timezone() {
        assert_eq!(config().timezone().unwrap(), FixedOffset::west_opt(3 * 3600).unwrap());

        let mut config = config();
        config.timezone_offset_hours = 30;
        assert!(config.timezone().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        fs::write(&path, CONFIG).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.mail.host, "smtp.example.com");
        assert!(!format!("{:?}", config.mail).contains("secret"));
    }

    #[test]
    fn reject_empty_sender() {
        let mut config = config();
        config.mail.from = " ".to_owned();
        assert!(config.validate().is_err());
    }
}
