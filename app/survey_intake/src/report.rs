use std::fmt::Write;
use std::path::Path;

use chrono::SecondsFormat;
use framework::asset::read_asset;
use framework::exception::CoreRsResult;
use framework::json;
use tracing::warn;

use crate::event::Event;
use crate::stats::ReportPeriod;
use crate::stats::Statistics;

/// Content-ID of the inline logo part, referenced by the html body as `cid:logo`.
pub const LOGO_CONTENT_ID: &str = "logo";

// transparent 1x1 gif
const BLANK_IMAGE: [u8; 42] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0x21, 0xf9,
    0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub subject: String,
    pub html_body: String,
    pub logo: Logo,
}

/// Organization logo sent as an inline attachment, a blank image when the asset can't be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logo {
    bytes: Vec<u8>,
    mime_type: &'static str,
}

impl Logo {
    pub fn load(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::blank();
        };
        match read_asset(path) {
            Ok(bytes) => Self::from_bytes(bytes, mime_type(path)),
            Err(e) => {
                warn!("failed to load logo, use blank image instead, path={path}, error={e}");
                Self::blank()
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, mime_type: &'static str) -> Self {
        Self { bytes, mime_type }
    }

    pub fn blank() -> Self {
        Self::from_bytes(BLANK_IMAGE.to_vec(), "image/gif")
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }
}

// svg is left out, most mail clients refuse to render it
fn mime_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

pub fn critical_alert(event: &Event, logo: &Logo) -> CoreRsResult<Mail> {
    let data = json::to_json_pretty(&event.data).unwrap_or_else(|e| format!("failed to serialize data, error={e}"));

    let mut body = String::new();
    header(&mut body, "Critical error", "#b42318")?;
    body.push_str("<table cellpadding=\"6\" style=\"border-collapse:collapse\">");
    row(
        &mut body,
        "Timestamp",
        &event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
    )?;
    row(&mut body, "Code", &event.code)?;
    row(&mut body, "Description", &event.description)?;
    row(&mut body, "Origin", &event.origin)?;
    body.push_str("</table>");
    write!(
        body,
        "<h3>Data</h3><pre style=\"background:#f4f4f4;padding:12px\">{}</pre>",
        escape_html(&data)
    )?;
    body.push_str(FOOTER);

    Ok(Mail {
        subject: format!("[CRITICAL] {} at {}", event.code, event.origin),
        html_body: body,
        logo: logo.clone(),
    })
}

pub fn weekly_digest(statistics: &Statistics, period: &ReportPeriod, logo: &Logo) -> CoreRsResult<Mail> {
    let start = period.start.format("%Y-%m-%d").to_string();
    let end = period.end.format("%Y-%m-%d").to_string();

    let mut body = String::new();
    header(&mut body, "Weekly report", "#1d4ed8")?;
    write!(body, "<p>Period: <b>{start}</b> to <b>{end}</b></p>")?;

    body.push_str("<h3>Summary</h3><table border=\"1\" cellpadding=\"6\" style=\"border-collapse:collapse\">");
    row(&mut body, "Total requests", &statistics.total_requests.to_string())?;
    row(&mut body, "Successful surveys", &statistics.successful_surveys.to_string())?;
    row(&mut body, "Failed surveys", &statistics.failed_surveys.to_string())?;
    row(&mut body, "Critical errors", &statistics.errors.critical.to_string())?;
    row(&mut body, "Other errors", &statistics.errors.normal.to_string())?;
    row(&mut body, "Unique users", &statistics.unique_user_count().to_string())?;
    body.push_str("</table>");

    body.push_str("<h3>Errors by code</h3>");
    let breakdown = statistics.sorted_breakdown();
    if breakdown.is_empty() {
        body.push_str("<p>No errors were recorded in this period.</p>");
    } else {
        body.push_str("<table border=\"1\" cellpadding=\"6\" style=\"border-collapse:collapse\">");
        body.push_str("<tr><th>Code</th><th>Description</th><th>Count</th></tr>");
        for (code, occurrence) in breakdown {
            write!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(code),
                escape_html(&occurrence.description),
                occurrence.count
            )?;
        }
        body.push_str("</table>");
    }
    body.push_str(FOOTER);

    Ok(Mail {
        subject: format!("[WEEKLY] Survey intake report {start} - {end}"),
        html_body: body,
        logo: logo.clone(),
    })
}

const FOOTER: &str = "<p style=\"color:#888;font-size:12px\">Sent automatically by survey intake.</p></body></html>";

fn header(body: &mut String, title: &str, color: &str) -> std::fmt::Result {
    write!(
        body,
        "<html><body style=\"font-family:Arial,sans-serif\"><img src=\"cid:{LOGO_CONTENT_ID}\" alt=\"logo\" height=\"48\"/><h2 style=\"color:{color}\">{title}</h2>"
    )
}

fn row(body: &mut String, name: &str, value: &str) -> std::fmt::Result {
    write!(body, "<tr><th align=\"left\">{name}</th><td>{}</td></tr>", escape_html(value))
}

// all values end up in text nodes, quotes stay as is
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
