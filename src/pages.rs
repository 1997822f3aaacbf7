//! Server-rendered HTML for the two pages

use crate::browse::{NO_RECORDINGS, NO_TRANSCRIPT};
use crate::model::{FeedbackFilter, FeedbackRecord, FeedbackType};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const PLAYBACK_JS: &str = include_str!("../assets/playback.js");
const STYLE_CSS: &str = include_str!("../assets/style.css");

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

/// Recording form; the feedback type options are filled in from the enum
pub fn capture_page() -> String {
    let options = FeedbackType::ALL
        .iter()
        .map(|t| format!(r#"<option value="{0}">{0}</option>"#, t))
        .collect::<Vec<_>>()
        .join("");
    INDEX_HTML
        .replace("{{STYLE}}", STYLE_CSS)
        .replace("{{FEEDBACK_TYPE_OPTIONS}}", &options)
}

fn type_filter_options(selected: Option<FeedbackType>) -> String {
    let mut options = vec![format!(
        r#"<option value=""{}>(all types)</option>"#,
        if selected.is_none() { " selected" } else { "" }
    )];
    for t in FeedbackType::ALL {
        options.push(format!(
            r#"<option value="{0}"{1}>{0}</option>"#,
            t,
            if selected == Some(t) { " selected" } else { "" }
        ));
    }
    options.join("")
}

fn render_entry(record: &FeedbackRecord) -> String {
    let transcript = match record.feedback_text.as_deref() {
        Some(text) => escape_html(text),
        None => format!("<em>{}</em>", NO_TRANSCRIPT),
    };
    format!(
        r#"<details class="entry" data-audio-path="{path}">
  <summary>{label}</summary>
  <p class="transcript">📝 {transcript}</p>
  <div class="player"></div>
</details>
"#,
        path = escape_html(&record.audio_path),
        label = escape_html(&record.label()),
        transcript = transcript,
    )
}

/// Playback listing. Entries start collapsed; the script asks for a signed
/// URL the first time one is opened.
pub fn playback_page(filter: &FeedbackFilter, records: &[FeedbackRecord]) -> String {
    let body = if records.is_empty() {
        format!(r#"<p class="info">{}</p>"#, NO_RECORDINGS)
    } else {
        records.iter().map(render_entry).collect::<String>()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Playback</title>
<style>{style}</style>
</head>
<body class="wide">
<nav><a href="/">🎤 Record</a> · <a href="/playback">🎧 Playback</a></nav>
<h1>🎧 Playback</h1>
<form class="filters" method="get" action="/playback">
  <label>Filter by room (optional) <input type="text" name="room" value="{room}"></label>
  <label>Filter by type <select name="feedback_type">{types}</select></label>
  <button type="submit">Apply</button>
</form>
<section id="entries">
{body}</section>
<script>{script}</script>
</body>
</html>
"#,
        style = STYLE_CSS,
        room = escape_html(filter.room.as_deref().unwrap_or("")),
        types = type_filter_options(filter.feedback_type),
        body = body,
        script = PLAYBACK_JS,
    )
}

/// Plain error page for failures loading the listing
pub fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Playback</title><style>{}</style></head>
<body><nav><a href="/">🎤 Record</a> · <a href="/playback">🎧 Playback</a></nav>
<p class="error">{}</p></body>
</html>
"#,
        STYLE_CSS,
        escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(room: Option<&str>, text: Option<&str>) -> FeedbackRecord {
        FeedbackRecord::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap(),
            FeedbackType::Thermal,
            text.map(String::from),
            room.map(String::from),
            None,
            "voice/20240201_093000_abc.wav".to_string(),
        )
    }

    #[test]
    fn test_empty_listing_shows_placeholder() {
        let html = playback_page(&FeedbackFilter::default(), &[]);
        assert!(html.contains(NO_RECORDINGS));
        assert!(!html.contains("<details"));
    }

    #[test]
    fn test_entries_are_collapsed_and_escaped() {
        let records = vec![
            record(Some("ARC_1119"), Some("<b>hot</b>")),
            record(None, None),
        ];
        let html = playback_page(&FeedbackFilter::default(), &records);
        assert_eq!(html.matches("<details").count(), 2);
        assert!(!html.contains("<details open"));
        assert!(html.contains("ARC_1119 • thermal"));
        assert!(html.contains("(room?) • thermal"));
        assert!(html.contains("&lt;b&gt;hot&lt;/b&gt;"));
        assert!(html.contains(NO_TRANSCRIPT));
        assert!(html.contains(r#"data-audio-path="voice/20240201_093000_abc.wav""#));
    }

    #[test]
    fn test_filter_values_are_kept() {
        let filter = FeedbackFilter::new(Some("a\"rc".into()), Some(FeedbackType::Iaq), None);
        let html = playback_page(&filter, &[]);
        assert!(html.contains(r#"value="a&quot;rc""#));
        assert!(html.contains(r#"<option value="IAQ" selected>IAQ</option>"#));
    }

    #[test]
    fn test_capture_page_lists_types() {
        let html = capture_page();
        for t in FeedbackType::ALL {
            assert!(html.contains(&format!(r#"<option value="{0}">{0}</option>"#, t)));
        }
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_capture_page_reports_recording_failures() {
        let html = capture_page();
        assert!(html.contains("Microphone unavailable: "));
        assert!(html.contains("Could not decode the recording: "));
        assert!(html.contains("Transcription request failed: "));
        assert!(html.contains(r#"data.error || "Upload failed""#));
        // The spinner is cleared whichever way the request ends
        assert!(html.contains("} finally {"));
    }
}
