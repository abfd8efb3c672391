// event codes written by this service itself, survey and hr codes are emitted by their own call sites
pub const INFO_SERVER_START: &str = "INFO_SERVER_START";
pub const INFO_SERVER_STOP: &str = "INFO_SERVER_STOP";

// default statistics markers, overridable by the statistics section of conf.json
pub const INFO_REQUEST: &str = "INFO_REQUEST";
pub const INFO_SURVEY_SUCCESS: &str = "INFO_SURVEY_SUCCESS";
pub const ERR_PREFIX: &str = "ERR_";
pub const ERR_SERVER: &str = "ERR_SERVER";

// error codes attached to console logs only, never appended to the event log
pub mod error_code {
    pub const MALFORMED_EVENT: &str = "MALFORMED_EVENT";
    pub const NOTIFICATION_FAILED: &str = "NOTIFICATION_FAILED";
    pub const NOTIFICATION_DROPPED: &str = "NOTIFICATION_DROPPED";
    pub const REPORT_STATE_NOT_SAVED: &str = "REPORT_STATE_NOT_SAVED";
}
