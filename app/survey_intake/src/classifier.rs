use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub critical_codes: Vec<String>,
    #[serde(default)]
    pub failed_survey_codes: Vec<String>,
}

/// Membership lookup for event codes, classification never looks at code prefixes.
#[derive(Debug, Clone)]
pub struct Classifier {
    critical: HashSet<String>,
    failed_survey: HashSet<String>,
}

impl Classifier {
    pub fn new(config: &ClassificationConfig) -> Self {
        Self {
            critical: normalize(&config.critical_codes),
            failed_survey: normalize(&config.failed_survey_codes),
        }
    }

    pub fn is_critical(&self, code: &str) -> bool {
        self.critical.contains(code)
    }

    pub fn is_failed_survey(&self, code: &str) -> bool {
        self.failed_survey.contains(code)
    }
}

fn normalize(codes: &[String]) -> HashSet<String> {
    codes
        .iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
        .map(str::to_owned)
        .collect()
}
