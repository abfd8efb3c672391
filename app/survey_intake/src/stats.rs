use std::collections::HashSet;

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::TimeDelta;
use framework::exception::CoreRsResult;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::classifier::Classifier;
use crate::code;
use crate::event::Event;
use crate::store::EventLog;

pub const WINDOW_DAYS: i64 = 7;

/// Which codes and data fields feed the weekly counters.
#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsRules {
    #[serde(default = "default_request_code_prefix")]
    pub request_code_prefix: String,
    #[serde(default = "default_survey_success_codes")]
    pub survey_success_codes: Vec<String>,
    #[serde(default = "default_error_code_prefixes")]
    pub error_code_prefixes: Vec<String>,
    #[serde(default = "default_user_id_fields")]
    pub user_id_fields: Vec<String>,
}

impl Default for StatisticsRules {
    fn default() -> Self {
        Self {
            request_code_prefix: default_request_code_prefix(),
            survey_success_codes: default_survey_success_codes(),
            error_code_prefixes: default_error_code_prefixes(),
            user_id_fields: default_user_id_fields(),
        }
    }
}

fn default_request_code_prefix() -> String {
    code::INFO_REQUEST.to_owned()
}

fn default_survey_success_codes() -> Vec<String> {
    vec![code::INFO_SURVEY_SUCCESS.to_owned()]
}

fn default_error_code_prefixes() -> Vec<String> {
    vec![code::ERR_PREFIX.to_owned()]
}

fn default_user_id_fields() -> Vec<String> {
    vec!["national_id".to_owned(), "external_code".to_owned()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl ReportPeriod {
    pub fn trailing_week(now: DateTime<FixedOffset>) -> Self {
        Self {
            start: now - TimeDelta::days(WINDOW_DAYS),
            end: now,
        }
    }

    // both ends inclusive
    pub fn contains(&self, timestamp: DateTime<FixedOffset>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorCounts {
    pub critical: u64,
    pub normal: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOccurrence {
    pub description: String,
    pub count: u64,
}

#[derive(Debug, Default, Clone)]
pub struct Statistics {
    pub total_requests: u64,
    pub successful_surveys: u64,
    pub failed_surveys: u64,
    pub errors: ErrorCounts,
    pub unique_users: HashSet<String>,
    // first seen order, the description is the one of the first occurrence
    pub error_breakdown: IndexMap<String, ErrorOccurrence>,
}

impl Statistics {
    pub fn aggregate<I>(events: I, period: &ReportPeriod, classifier: &Classifier, rules: &StatisticsRules) -> Self
    where
        I: IntoIterator<Item = Event>,
    {
        let mut statistics = Statistics::default();
        for event in events {
            if period.contains(event.timestamp) {
                statistics.record(&event, classifier, rules);
            }
        }
        statistics
    }

    fn record(&mut self, event: &Event, classifier: &Classifier, rules: &StatisticsRules) {
        let code = event.code.as_str();
        if code.starts_with(&rules.request_code_prefix) {
            self.total_requests += 1;
        }
        if rules.survey_success_codes.iter().any(|success| success == code) {
            self.successful_surveys += 1;
        }
        if rules.error_code_prefixes.iter().any(|prefix| code.starts_with(prefix.as_str())) {
            self.error_breakdown
                .entry(code.to_owned())
                .or_insert_with(|| ErrorOccurrence {
                    description: event.description.clone(),
                    count: 0,
                })
                .count += 1;
            if classifier.is_critical(code) {
                self.errors.critical += 1;
            } else {
                self.errors.normal += 1;
            }
            if classifier.is_failed_survey(code) {
                self.failed_surveys += 1;
            }
        }
        if let Some(user_id) = event.user_id(&rules.user_id_fields) {
            self.unique_users.insert(user_id);
        }
    }

    pub fn unique_user_count(&self) -> usize {
        self.unique_users.len()
    }

    /// Error codes by occurrence, most frequent first.
    pub fn sorted_breakdown(&self) -> Vec<(&str, &ErrorOccurrence)> {
        let mut breakdown: Vec<(&str, &ErrorOccurrence)> = self
            .error_breakdown
            .iter()
            .map(|(code, occurrence)| (code.as_str(), occurrence))
            .collect();
        breakdown.sort_by(|left, right| right.1.count.cmp(&left.1.count));
        breakdown
    }
}

// full scan of the log, fine at a weekly cadence
pub fn compute_weekly_statistics(
    log: &EventLog,
    classifier: &Classifier,
    rules: &StatisticsRules,
    now: DateTime<FixedOffset>,
) -> CoreRsResult<(ReportPeriod, Statistics)> {
    let period = ReportPeriod::trailing_week(now);
    let statistics = Statistics::aggregate(log.read_all()?, &period, classifier, rules);
    Ok((period, statistics))
}
