use caltrack_notify::EmailMessage;
use caltrack_registry::{CalibrationStatus, Instrument};

/// Render the reminder email for one instrument.
pub fn reminder_message(to: &str, instrument: &Instrument, status: CalibrationStatus) -> EmailMessage {
    let last = instrument
        .last_calibration_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let manufacturer = instrument.manufacturer.as_deref().unwrap_or("");

    let html_body = format!(
        "<h3>Calibration Reminder</h3>\n\
         <p>The following instrument requires calibration:</p>\n\
         <ul>\n\
         <li><strong>Instrument:</strong> {name}</li>\n\
         <li><strong>Manufacturer:</strong> {manufacturer}</li>\n\
         <li><strong>Last Calibration:</strong> {last}</li>\n\
         <li><strong>Status:</strong> {state}</li>\n\
         <li><strong>Days:</strong> {days}</li>\n\
         </ul>\n\
         <p>Please schedule calibration as soon as possible.</p>\n",
        name = escape_html(&instrument.name),
        manufacturer = escape_html(manufacturer),
        state = status.state.title(),
        days = status.days,
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Calibration Reminder: {}", instrument.name),
        html_body,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
