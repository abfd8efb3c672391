use std::sync::Arc;

use framework::exception::CoreRsResult;
use serde_json::Value;

use crate::classifier::Classifier;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::event::Event;
use crate::gate::WeeklyReportGate;
use crate::gate::WeeklySchedule;
use crate::mail::MailTransport;
use crate::notifier::Notifier;
use crate::notifier::NotifierContext;
use crate::notifier::NotifierStats;
use crate::report::Logo;
use crate::store::EventLog;

/// Entry point for recording what the service does.
///
/// Every call appends to the event log first. Critical codes then queue an alert, and
/// a call landing in the weekly slot queues the digest. Neither is awaited here.
pub struct ActionLogger {
    clock: Arc<dyn Clock>,
    log: Arc<EventLog>,
    classifier: Arc<Classifier>,
    gate: Arc<WeeklyReportGate>,
    notifier: Notifier,
}

impl ActionLogger {
    pub fn start(config: &AppConfig, transport: Arc<dyn MailTransport>, clock: Arc<dyn Clock>) -> CoreRsResult<Self> {
        let log = Arc::new(EventLog::open(&config.log_dir())?);
        let classifier = Arc::new(Classifier::new(&config.classification));
        let schedule = WeeklySchedule::new(&config.weekly_report)?;
        let gate = Arc::new(WeeklyReportGate::persistent(schedule, config.log_dir()));
        let notifier = Notifier::start(
            NotifierContext {
                transport,
                recipients: config.recipients(),
                logo: Logo::load(config.logo_path.as_deref()),
                log: Arc::clone(&log),
                classifier: Arc::clone(&classifier),
                rules: config.statistics.clone(),
                gate: Arc::clone(&gate),
            },
            config.notifier.queue_capacity,
        );
        Ok(Self {
            clock,
            log,
            classifier,
            gate,
            notifier,
        })
    }

    /// Storage errors are returned, notification problems never are.
    pub async fn log_action(&self, code: &str, description: &str, origin: &str, data: Value) -> CoreRsResult<()> {
        let now = self.clock.now();
        let event = Event::new(now, code, description, origin, data);

        // alerts still go out when the event could not be persisted
        let appended = self.log.append(&event).await;

        if self.classifier.is_critical(code) {
            self.notifier.send_critical_alert(event);
        }

        if self.gate.try_acquire(now) && !self.notifier.send_weekly_digest(now) {
            self.gate.release();
        }

        appended
    }

    pub fn notifier_stats(&self) -> NotifierStats {
        self.notifier.stats()
    }

    pub async fn close(&self) {
        self.notifier.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use chrono::TimeDelta;
    use serde_json::json;

    use super::ActionLogger;
    use crate::code;
    use crate::clock::Clock;
    use crate::clock::test_clock::ManualClock;
    use crate::config::AppConfig;
    use crate::event::Event;
    use crate::mail::MailTransport;
    use crate::mail::test_transport::RecordingTransport;
    use crate::store::EventLog;

    // 2025-03-17 is a monday, digest slot is monday 08:00 - 08:15
    const INSIDE_WINDOW: &str = "2025-03-17T08:01:00-03:00";
    const OUTSIDE_WINDOW: &str = "2025-03-18T10:00:00-03:00";

    struct Fixture {
        dir: tempfile::TempDir,
        clock: Arc<ManualClock>,
        transport: Arc<RecordingTransport>,
        logger: ActionLogger,
    }

    fn fixture(now: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config: AppConfig = framework::json::from_json(&format!(
            r#"{{
                "log_dir": "{}",
                "timezone_offset_hours": -3,
                "mail": {{"host": "smtp.example.com", "port": 587, "username": "u", "from": "reports@example.com"}},
                "recipients": ["hr@example.com", "", "it@example.com", "hr@example.com"],
                "classification": {{
                    "critical_codes": ["ERR_SERVER", "ERR_HR_UNAVAILABLE"],
                    "failed_survey_codes": ["ERR_ATTACHMENT_UPLOAD"]
                }}
            }}"#,
            dir.path().to_string_lossy()
        ))
        .unwrap();
        let clock = Arc::new(ManualClock::at(now));
        let transport = Arc::new(RecordingTransport::default());
        let logger = ActionLogger::start(
            &config,
            Arc::clone(&transport) as Arc<dyn MailTransport>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap();
        Fixture {
            dir,
            clock,
            transport,
            logger,
        }
    }

    #[tokio::test]
    async fn critical_code_sends_one_alert() {
        let fixture = fixture(OUTSIDE_WINDOW);
        let data = json!({"national_id": "12345678901", "hr_response": {"status": 500, "message": "internal"}});
        fixture
            .logger
            .log_action(code::ERR_SERVER, "d", "x", data.clone())
            .await
            .unwrap();
        fixture.logger.close().await;

        let sent = fixture.transport.sent();
        assert_eq!(sent.len(), 1);
        let (mail, recipients) = &sent[0];
        assert!(mail.subject.contains(code::ERR_SERVER));
        assert!(mail.html_body.contains(&serde_json::to_string_pretty(&data).unwrap()));
        assert_eq!(recipients, &vec!["hr@example.com".to_owned(), "it@example.com".to_owned()]);
    }

    #[tokio::test]
    async fn non_critical_codes_send_nothing() {
        let fixture = fixture(OUTSIDE_WINDOW);
        for code in ["ERR_ATTACHMENT_UPLOAD", "ERR_VALIDATION", "WARN_SLOW_HR", "INFO_REQUEST"] {
            fixture.logger.log_action(code, "d", "x", json!({})).await.unwrap();
        }
        fixture.logger.close().await;

        assert!(fixture.transport.sent().is_empty());
        assert_eq!(fixture.logger.notifier_stats().sent, 0);
    }

    #[tokio::test]
    async fn alert_per_critical_call() {
        let fixture = fixture(OUTSIDE_WINDOW);
        for _ in 0..3 {
            fixture
                .logger
                .log_action("ERR_HR_UNAVAILABLE", "hr down", "person:lookup", json!({}))
                .await
                .unwrap();
        }
        fixture.logger.close().await;

        assert_eq!(fixture.transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn event_is_persisted() {
        let fixture = fixture(OUTSIDE_WINDOW);
        fixture
            .logger
            .log_action("INFO_REQUEST_PERSON", "lookup", "person:lookup", json!({"national_id": "1"}))
            .await
            .unwrap();
        fixture.logger.close().await;

        let events: Vec<Event> = EventLog::open(fixture.dir.path()).unwrap().read_all().unwrap().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, "INFO_REQUEST_PERSON");
        assert_eq!(events[0].origin, "person:lookup");
        assert_eq!(events[0].timestamp, fixture.clock.now());
        assert_eq!(events[0].data.get("national_id"), Some(&json!("1")));
    }

    #[tokio::test]
    async fn weekly_digest_sent_once_inside_window() {
        let fixture = fixture(INSIDE_WINDOW);
        for _ in 0..10 {
            fixture.logger.log_action("INFO_REQUEST", "request", "http:request", json!({})).await.unwrap();
            fixture.clock.advance(TimeDelta::minutes(1));
        }
        fixture.logger.close().await;

        let sent = fixture.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.subject.starts_with("[WEEKLY]"));
        assert!(sent[0].0.html_body.contains("<th align=\"left\">Total requests</th>"));
    }

    #[tokio::test]
    async fn weekly_digest_retried_after_failure() {
        let fixture = fixture(INSIDE_WINDOW);
        fixture.transport.set_failing(true);
        fixture.logger.log_action("INFO_REQUEST", "request", "http:request", json!({})).await.unwrap();
        // wait for the failed attempt to release the gate
        for _ in 0..100 {
            if fixture.logger.notifier_stats().failed == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(fixture.logger.notifier_stats().failed, 1);

        fixture.transport.set_failing(false);
        fixture.clock.advance(TimeDelta::minutes(1));
        fixture.logger.log_action("INFO_REQUEST", "request", "http:request", json!({})).await.unwrap();
        fixture.logger.close().await;

        assert_eq!(fixture.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn storage_error_is_returned_and_alert_still_sent() {
        let fixture = fixture(OUTSIDE_WINDOW);
        let log_path = EventLog::open(fixture.dir.path()).unwrap().path().to_path_buf();
        fs::create_dir(&log_path).unwrap();

        let result = fixture.logger.log_action(code::ERR_SERVER, "d", "x", json!({})).await;
        fixture.logger.close().await;

        assert!(result.is_err());
        assert_eq!(fixture.transport.sent().len(), 1);
    }
}
