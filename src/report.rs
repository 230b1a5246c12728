//! JSON and HTML session reports.

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::analysis::AnalysisResult;
use crate::config::{OutputSettings, PrivacySettings};
use crate::error::KeydynError;
use crate::keystroke::KeystrokeEvent;

/// Rows shown in the HTML keystroke table
pub const KEYSTROKE_TABLE_LIMIT: usize = 50;

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct ReportMetadata<'a> {
    generated_at: String,
    tool_version: &'static str,
    privacy_settings: &'a PrivacySettings,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    metadata: ReportMetadata<'a>,
    analysis: &'a AnalysisResult,
    raw_data: &'a [KeystrokeEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    typed_text: Option<&'a str>,
}

/// Load keystroke events back from disk: either a bare event array or a JSON
/// report's `raw_data`. Anonymized reports yield no events.
pub fn read_events(path: &Path) -> Result<Vec<KeystrokeEvent>, KeydynError> {
    let body = fs::read_to_string(path).map_err(|e| KeydynError::io("reading events", e))?;
    let invalid_events = |source| KeydynError::Events {
        path: path.to_path_buf(),
        source,
    };

    let raw = match serde_json::from_str::<serde_json::Value>(&body).map_err(invalid_events)? {
        serde_json::Value::Object(mut report) => report.remove("raw_data").ok_or_else(|| {
            KeydynError::invalid_input(format!("{} has no raw_data", path.display()))
        })?,
        array @ serde_json::Value::Array(_) => array,
        _ => {
            return Err(KeydynError::invalid_input(format!(
                "{} is neither a keystroke event array nor a report",
                path.display()
            )));
        }
    };
    serde_json::from_value(raw).map_err(invalid_events)
}

#[derive(Debug, Clone)]
pub struct ReportGenerator {
    privacy: PrivacySettings,
    output: OutputSettings,
}

impl ReportGenerator {
    pub fn new(privacy: PrivacySettings, output: OutputSettings) -> Self {
        Self { privacy, output }
    }

    fn typed_text<'a>(&self, typed_text: &'a str) -> Option<&'a str> {
        (self.privacy.save_typed_text && !typed_text.is_empty()).then_some(typed_text)
    }

    pub fn render_json(
        &self,
        events: &[KeystrokeEvent],
        analysis: &AnalysisResult,
        typed_text: &str,
    ) -> Result<String, KeydynError> {
        let report = JsonReport {
            metadata: ReportMetadata {
                generated_at: Local::now().to_rfc3339(),
                tool_version: TOOL_VERSION,
                privacy_settings: &self.privacy,
            },
            analysis,
            raw_data: if self.privacy.anonymize_data {
                &events[..0]
            } else {
                events
            },
            typed_text: self.typed_text(typed_text),
        };
        serde_json::to_string_pretty(&report).map_err(|e| KeydynError::json("encoding report", e))
    }

    pub fn generate_json(
        &self,
        events: &[KeystrokeEvent],
        analysis: &AnalysisResult,
        typed_text: &str,
    ) -> Result<PathBuf, KeydynError> {
        let path = &self.output.json_path;
        let body = self.render_json(events, analysis, typed_text)?;
        write_report(path, &body)?;
        debug!(path = %path.display(), "wrote JSON report");
        Ok(path.clone())
    }

    pub fn render_html(
        &self,
        events: &[KeystrokeEvent],
        analysis: &AnalysisResult,
        typed_text: &str,
    ) -> String {
        let mut html = String::with_capacity(8 * 1024);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        html.push_str(
            "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str("    <title>Keystroke Dynamics Report</title>\n");
        let _ = writeln!(html, "    <style>{STYLE}</style>");
        html.push_str("</head>\n<body>\n<div class=\"container\">\n");

        html.push_str("<h1>⌨️ Keystroke Dynamics Report</h1>\n");
        let _ = writeln!(
            html,
            "<p class=\"subtitle\">Generated on {}</p>",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        if self.privacy.log_actual_keys {
            html.push_str(
                "<div class=\"warning-box\"><strong>⚠️ Privacy Notice:</strong> \
                 This report contains actual keystroke data. \
                 Keep it secure and delete when no longer needed.</div>\n",
            );
        }

        html.push_str("<div class=\"stats-grid\">\n");
        stat_card(&mut html, "Total Keystrokes", &analysis.total_keystrokes.to_string());
        stat_card(&mut html, "Typing Speed", &format!("{:.1} WPM", analysis.typing_speed));
        stat_card(&mut html, "Avg Interval", &format!("{:.3}s", analysis.avg_interval));
        stat_card(
            &mut html,
            "Session Duration",
            &format!("{:.1}s", analysis.session_duration),
        );
        html.push_str("</div>\n");

        if let Some(text) = self.typed_text(typed_text) {
            let _ = writeln!(
                html,
                "<div class=\"section\"><h2>📝 Typed Text</h2>\
                 <div class=\"typed-text-box\"><pre>{}</pre></div></div>",
                escape_html(text)
            );
        }

        html.push_str("<div class=\"section\">\n<h2>📊 Statistical Analysis</h2>\n<table>\n");
        html.push_str("<tr><th>Metric</th><th>Value</th></tr>\n");
        let rows = [
            ("Median Interval", format!("{:.3} seconds", analysis.median_interval)),
            ("Standard Deviation", format!("{:.3}", analysis.std_interval)),
            ("Min Interval", format!("{:.3} seconds", analysis.min_interval)),
            ("Max Interval", format!("{:.3} seconds", analysis.max_interval)),
            (
                "Keystrokes per Second",
                format!("{:.2}", analysis.keystrokes_per_second),
            ),
            (
                "Rhythm Consistency",
                format!("{:.2}%", analysis.rhythm_consistency * 100.0),
            ),
            (
                "Burst Typing Detected",
                if analysis.burst_typing_detected { "Yes" } else { "No" }.to_string(),
            ),
        ];
        for (metric, value) in rows {
            let _ = writeln!(html, "<tr><td>{metric}</td><td>{value}</td></tr>");
        }
        html.push_str("</table>\n</div>\n");

        if self.privacy.log_actual_keys && !events.is_empty() {
            keystroke_table(&mut html, &events[..events.len().min(KEYSTROKE_TABLE_LIMIT)]);
        }

        html.push_str(
            "<div class=\"footer\"><p>🔒 Privacy-Respecting | ⚖️ Ethical Use Only | \
             📈 Data Stored Locally</p></div>\n",
        );
        html.push_str("</div>\n</body>\n</html>\n");
        html
    }

    pub fn generate_html(
        &self,
        events: &[KeystrokeEvent],
        analysis: &AnalysisResult,
        typed_text: &str,
    ) -> Result<PathBuf, KeydynError> {
        let path = &self.output.html_path;
        write_report(path, &self.render_html(events, analysis, typed_text))?;
        debug!(path = %path.display(), "wrote HTML report");
        Ok(path.clone())
    }
}

fn write_report(path: &Path, body: &str) -> Result<(), KeydynError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| KeydynError::io("creating report dir", e))?;
    }
    fs::write(path, body).map_err(|e| KeydynError::io("writing report", e))
}

fn stat_card(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"stat-card\"><div class=\"stat-label\">{label}</div>\
         <div class=\"stat-value\">{value}</div></div>"
    );
}

fn keystroke_table(html: &mut String, events: &[KeystrokeEvent]) {
    let _ = writeln!(
        html,
        "<div class=\"section\">\n<h2>🔑 Keystroke Details (First {KEYSTROKE_TABLE_LIMIT})</h2>"
    );
    html.push_str(
        "<table>\n<thead><tr><th>#</th><th>Key</th><th>Interval</th>\
         <th>Elapsed Time</th></tr></thead>\n<tbody>\n",
    );
    for (i, event) in events.iter().enumerate() {
        let key = if event.readable_key.is_empty() {
            &event.key_label
        } else {
            &event.readable_key
        };
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td><span class=\"key-display\">{}</span></td>\
             <td>{:.3}s</td><td>{:.2}s</td></tr>",
            i + 1,
            escape_html(key),
            event.interval,
            event.elapsed_time
        );
    }
    html.push_str("</tbody>\n</table>\n</div>\n");
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
       background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
       min-height: 100vh; padding: 20px; }
.container { max-width: 1200px; margin: 0 auto; background: white; border-radius: 20px;
             padding: 40px; box-shadow: 0 20px 60px rgba(0,0,0,0.3); }
h1 { color: #667eea; margin-bottom: 10px; font-size: 2.5em; }
.subtitle { color: #666; margin-bottom: 30px; font-size: 1.1em; }
.stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(250px, 1fr));
              gap: 20px; margin: 30px 0; }
.stat-card { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white;
             padding: 25px; border-radius: 15px; box-shadow: 0 10px 30px rgba(102,126,234,0.3); }
.stat-label { font-size: 0.9em; opacity: 0.9; margin-bottom: 5px; }
.stat-value { font-size: 2em; font-weight: bold; }
.section { margin: 30px 0; padding: 20px; background: #f8f9fa; border-radius: 10px; }
.section h2 { color: #667eea; margin-bottom: 15px; }
table { width: 100%; border-collapse: collapse; margin-top: 15px; }
th, td { padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }
th { background: #667eea; color: white; }
tr:hover { background: #f0f0f0; }
.typed-text-box { background: #2d3748; color: #e2e8f0; padding: 20px; border-radius: 10px;
                  max-height: 400px; overflow-y: auto; font-family: 'Courier New', monospace;
                  font-size: 14px; line-height: 1.6; white-space: pre-wrap; word-wrap: break-word; }
.key-display { font-family: 'Courier New', monospace; background: #e8eaf6; padding: 2px 6px;
               border-radius: 4px; font-size: 0.9em; }
.footer { text-align: center; margin-top: 40px; color: #666; font-size: 0.9em; }
.warning-box { background: #fff3cd; border-left: 4px solid #ffc107; padding: 15px;
               margin: 20px 0; border-radius: 5px; }
.warning-box strong { color: #856404; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalyzerConfig};
    use tempfile::tempdir;

    fn sample() -> (Vec<KeystrokeEvent>, AnalysisResult) {
        let mut events = KeystrokeEvent::sequence_from_intervals(&[0.0, 0.2, 0.3, 0.25, 0.2]);
        events[0].key_label = "<".into();
        events[0].readable_key = "<".into();
        let analysis = analyze(&events, &AnalyzerConfig::default()).unwrap();
        (events, analysis)
    }

    fn generator(privacy: PrivacySettings, dir: &Path) -> ReportGenerator {
        ReportGenerator::new(
            privacy,
            OutputSettings {
                json_path: dir.join("out").join("report.json"),
                html_path: dir.join("out").join("report.html"),
                history_path: None,
            },
        )
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_json_report_anonymized() {
        let dir = tempdir().unwrap();
        let (events, analysis) = sample();
        let gen = generator(PrivacySettings::default(), dir.path());

        let path = gen.generate_json(&events, &analysis, "typed").unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(path).unwrap()).unwrap();

        assert_eq!(json["raw_data"].as_array().unwrap().len(), 0);
        assert!(json.get("typed_text").is_none());
        assert_eq!(json["analysis"]["total_keystrokes"], 5);
        assert_eq!(json["metadata"]["tool_version"], TOOL_VERSION);
        assert_eq!(json["metadata"]["privacy_settings"]["anonymize_data"], true);
    }

    #[test]
    fn test_json_report_with_raw_data_and_text() {
        let dir = tempdir().unwrap();
        let (events, analysis) = sample();
        let privacy = PrivacySettings {
            log_actual_keys: true,
            save_typed_text: true,
            anonymize_data: false,
        };
        let gen = generator(privacy, dir.path());

        let body = gen.render_json(&events, &analysis, "hello").unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(json["raw_data"].as_array().unwrap().len(), 5);
        assert_eq!(json["raw_data"][0]["key"], "<");
        assert_eq!(json["typed_text"], "hello");
    }

    #[test]
    fn test_empty_typed_text_is_omitted() {
        let dir = tempdir().unwrap();
        let (events, analysis) = sample();
        let privacy = PrivacySettings {
            save_typed_text: true,
            ..PrivacySettings::default()
        };
        let body = generator(privacy, dir.path())
            .render_json(&events, &analysis, "")
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json.get("typed_text").is_none());
        assert_eq!(json["metadata"]["privacy_settings"]["save_typed_text"], true);
    }

    #[test]
    fn test_html_report_default_privacy() {
        let dir = tempdir().unwrap();
        let (events, analysis) = sample();
        let gen = generator(PrivacySettings::default(), dir.path());

        let html = gen.render_html(&events, &analysis, "secret");
        assert!(html.contains("Total Keystrokes"));
        assert!(html.contains(&format!("{:.1} WPM", analysis.typing_speed)));
        assert!(html.contains("Burst Typing Detected"));
        assert!(!html.contains("Privacy Notice"));
        assert!(!html.contains("Keystroke Details"));
        assert!(!html.contains("secret"));
    }

    #[test]
    fn test_html_report_with_keys_escapes_labels() {
        let dir = tempdir().unwrap();
        let (events, analysis) = sample();
        let privacy = PrivacySettings {
            log_actual_keys: true,
            save_typed_text: true,
            anonymize_data: false,
        };
        let gen = generator(privacy, dir.path());

        let path = gen.generate_html(&events, &analysis, "a<b").unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("Privacy Notice"));
        assert!(html.contains("Keystroke Details (First 50)"));
        assert!(html.contains("<span class=\"key-display\">&lt;</span>"));
        assert!(html.contains("<pre>a&lt;b</pre>"));
    }

    #[test]
    fn test_read_events_from_report_and_array() {
        let dir = tempdir().unwrap();
        let (events, analysis) = sample();
        let privacy = PrivacySettings {
            anonymize_data: false,
            ..PrivacySettings::default()
        };
        let report = generator(privacy, dir.path())
            .generate_json(&events, &analysis, "")
            .unwrap();
        assert_eq!(read_events(&report).unwrap(), events);

        let array = dir.path().join("events.json");
        fs::write(&array, serde_json::to_string(&events).unwrap()).unwrap();
        assert_eq!(read_events(&array).unwrap().len(), 5);

        let anonymized = generator(PrivacySettings::default(), dir.path())
            .generate_json(&events, &analysis, "")
            .unwrap();
        assert!(read_events(&anonymized).unwrap().is_empty());
    }

    #[test]
    fn test_read_events_rejects_other_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.json");
        fs::write(&path, r#"{"hello": 1}"#).unwrap();
        assert!(matches!(
            read_events(&path),
            Err(KeydynError::InvalidInput { .. })
        ));
        assert!(matches!(
            read_events(&dir.path().join("missing.json")),
            Err(KeydynError::Io { .. })
        ));
    }

    #[test]
    fn test_read_events_keeps_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(
            &path,
            r#"{"raw_data": [{"timestamp": 1.0, "key": "KEY", "interval": "fast", "elapsed_time": 0.0}]}"#,
        )
        .unwrap();

        let err = read_events(&path).unwrap_err();
        assert!(matches!(err, KeydynError::Events { .. }));
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert!(source.contains("invalid type"), "{source}");
        assert!(err.to_string().contains("broken.json"));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(read_events(&path), Err(KeydynError::Events { .. })));
    }

    #[test]
    fn test_keystroke_table_is_truncated() {
        let dir = tempdir().unwrap();
        let events = KeystrokeEvent::sequence_from_intervals(&[0.1; 80]);
        let analysis = analyze(&events, &AnalyzerConfig::default()).unwrap();
        let privacy = PrivacySettings {
            log_actual_keys: true,
            ..PrivacySettings::default()
        };

        let html = generator(privacy, dir.path()).render_html(&events, &analysis, "");
        assert_eq!(
            html.matches("class=\"key-display\"").count(),
            KEYSTROKE_TABLE_LIMIT
        );
    }
}
