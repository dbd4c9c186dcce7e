//! Converts the model's raw reply into a canonical [`GradingResult`].
//!
//! Reply shapes handled, first match wins: a pure JSON object, a fenced JSON
//! object, and free-form text. Free-form text goes through an ordered list of
//! score patterns; a reply matching none of them is still a valid result with
//! no score.

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the canonical result was derived from the raw reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    StructuredJson,
    FreeTextWithHeuristicScore,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemFeedback {
    pub problem: String,
    pub score: f64,
    pub feedback: String,
}

/// Structured feedback record requested from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredFeedback {
    #[serde(default)]
    pub detailed_feedback: Vec<ProblemFeedback>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub overall_comment: String,
}

/// The structured reply shape. `score` is required and must be numeric;
/// anything else falls through to the heuristic path.
#[derive(Deserialize)]
struct StructuredReply {
    score: f64,
    #[serde(flatten)]
    feedback: StructuredFeedback,
}

/// Canonical grading outcome consumed by the presentation layer.
///
/// Invariants: `source == Error` exactly when `error_message` is set and
/// `score` is absent; a present score is always within 0..=100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingResult {
    pub score: Option<u8>,
    pub structured: Option<StructuredFeedback>,
    pub raw_text: String,
    pub timestamp: String,
    pub student_name: String,
    pub source: ResultSource,
    pub error_message: Option<String>,
}

impl GradingResult {
    /// Result for failures that happen before any raw reply exists, e.g.
    /// a service error on the outbound call.
    pub fn from_error(student_name: &str, message: impl Into<String>) -> Self {
        Self {
            score: None,
            structured: None,
            raw_text: String::new(),
            timestamp: now_iso(),
            student_name: student_name.to_string(),
            source: ResultSource::Error,
            error_message: Some(message.into()),
        }
    }
}

/// One recognizer for a score embedded in free-form model output.
///
/// Patterns are tried in order; the capture group must hold the integer
/// score. Additional locales plug in here without touching [`normalize`].
pub struct ScorePattern {
    name: &'static str,
    regex: Regex,
}

impl ScorePattern {
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn first_match(&self, text: &str) -> Option<i64> {
        self.regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|group| group.as_str().parse().ok())
    }
}

/// Built-in patterns: Hebrew score label, English score label, bare N/100.
pub fn default_score_patterns() -> Vec<ScorePattern> {
    vec![
        ScorePattern::new("hebrew-label", r"ציון\s*[:：]?\s*(\d{1,3})")
            .expect("built-in pattern is valid"),
        ScorePattern::new("english-label", r"(?i)score\s*[:：]?\s*(\d{1,3})")
            .expect("built-in pattern is valid"),
        ScorePattern::new("out-of-100", r"(\d{1,3})\s*/\s*100").expect("built-in pattern is valid"),
    ]
}

/// Normalizes a raw model reply. Pure except for the generated timestamp.
pub fn normalize(raw_text: &str, student_name: &str, patterns: &[ScorePattern]) -> GradingResult {
    let candidate = strip_code_fence(raw_text);

    if let Ok(reply) = serde_json::from_str::<StructuredReply>(candidate) {
        return GradingResult {
            score: Some(clamp_score(reply.score.round() as i64)),
            structured: Some(reply.feedback),
            raw_text: raw_text.to_string(),
            timestamp: now_iso(),
            student_name: student_name.to_string(),
            source: ResultSource::StructuredJson,
            error_message: None,
        };
    }

    let score = extract_heuristic_score(raw_text, patterns).map(clamp_score);

    GradingResult {
        score,
        structured: None,
        raw_text: raw_text.to_string(),
        timestamp: now_iso(),
        student_name: student_name.to_string(),
        source: ResultSource::FreeTextWithHeuristicScore,
        error_message: None,
    }
}

/// Scans free-form text with the ordered pattern list; first match wins.
pub fn extract_heuristic_score(text: &str, patterns: &[ScorePattern]) -> Option<i64> {
    for pattern in patterns {
        if let Some(value) = pattern.first_match(text) {
            debug!(pattern = pattern.name(), value, "heuristic score matched");
            return Some(value);
        }
    }
    None
}

/// Strips one surrounding fenced-code delimiter, tagged `json` or untagged.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.split_once('\n') {
        Some((tag, body)) if tag.trim().is_empty() || tag.trim().eq_ignore_ascii_case("json") => {
            body
        }
        Some(_) => return trimmed,
        None => rest,
    };

    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn clamp_score(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<ScorePattern> {
        default_score_patterns()
    }

    const STRUCTURED_REPLY: &str = r#"{"score": 92, "strengths": ["good"], "improvements": [], "suggestions": [], "overall_comment": "well done"}"#;

    #[test]
    fn pure_json_reply_is_structured() {
        let result = normalize(STRUCTURED_REPLY, "Dana", &patterns());
        assert_eq!(result.source, ResultSource::StructuredJson);
        assert_eq!(result.score, Some(92));
        assert_eq!(result.student_name, "Dana");
        let structured = result.structured.unwrap();
        assert_eq!(structured.strengths, vec!["good".to_string()]);
        assert_eq!(structured.overall_comment, "well done");
        assert!(result.error_message.is_none());
    }

    #[test]
    fn json_fenced_reply_is_structured() {
        let fenced = format!("```json\n{STRUCTURED_REPLY}\n```");
        let result = normalize(&fenced, "Dana", &patterns());
        assert_eq!(result.source, ResultSource::StructuredJson);
        assert_eq!(result.score, Some(92));
        assert_eq!(result.raw_text, fenced);
    }

    #[test]
    fn untagged_fence_is_stripped() {
        let fenced = format!("```\n{STRUCTURED_REPLY}\n```");
        let result = normalize(&fenced, "Dana", &patterns());
        assert_eq!(result.source, ResultSource::StructuredJson);
    }

    #[test]
    fn detailed_feedback_is_carried_across() {
        let reply = r#"{"score": 70, "detailed_feedback": [{"problem": "תרגיל 1", "score": 7, "feedback": "כמעט נכון"}], "overall_comment": ""}"#;
        let result = normalize(reply, "Noa", &patterns());
        let structured = result.structured.unwrap();
        assert_eq!(structured.detailed_feedback.len(), 1);
        assert_eq!(structured.detailed_feedback[0].problem, "תרגיל 1");
        assert_eq!(structured.detailed_feedback[0].score, 7.0);
    }

    #[test]
    fn missing_score_falls_through_to_heuristic() {
        let reply = r#"{"strengths": ["neat"], "overall_comment": "Score: 55"}"#;
        let result = normalize(reply, "Dana", &patterns());
        assert_eq!(result.source, ResultSource::FreeTextWithHeuristicScore);
        assert_eq!(result.score, Some(55));
        assert!(result.structured.is_none());
    }

    #[test]
    fn non_numeric_score_falls_through() {
        let reply = r#"{"score": "ninety", "overall_comment": "nice"}"#;
        let result = normalize(reply, "Dana", &patterns());
        assert_eq!(result.source, ResultSource::FreeTextWithHeuristicScore);
        assert_eq!(result.score, None);
    }

    #[test]
    fn hebrew_score_label_is_recognized() {
        let result = normalize("עבודה טובה! ציון: 87/100 בהצלחה", "Noa", &patterns());
        assert_eq!(result.source, ResultSource::FreeTextWithHeuristicScore);
        assert_eq!(result.score, Some(87));
        assert!(result.raw_text.contains("עבודה טובה"));
    }

    #[test]
    fn english_score_label_is_case_insensitive() {
        let result = normalize("Overall SCORE: 64 with caveats", "Noa", &patterns());
        assert_eq!(result.score, Some(64));
    }

    #[test]
    fn bare_out_of_hundred_is_recognized() {
        let result = normalize("I would give this 73 / 100 overall.", "Noa", &patterns());
        assert_eq!(result.score, Some(73));
    }

    #[test]
    fn unscored_free_text_is_not_an_error() {
        let result = normalize("General remarks with no grade at all.", "Noa", &patterns());
        assert_eq!(result.source, ResultSource::FreeTextWithHeuristicScore);
        assert_eq!(result.score, None);
        assert!(result.error_message.is_none());
        assert_eq!(result.raw_text, "General remarks with no grade at all.");
    }

    #[test]
    fn structured_score_above_range_is_clamped() {
        let result = normalize(r#"{"score": 150}"#, "Noa", &patterns());
        assert_eq!(result.score, Some(100));
    }

    #[test]
    fn structured_score_below_range_is_clamped() {
        let result = normalize(r#"{"score": -5}"#, "Noa", &patterns());
        assert_eq!(result.score, Some(0));
    }

    #[test]
    fn heuristic_score_above_range_is_clamped() {
        let result = normalize("ציון: 150/100", "Noa", &patterns());
        assert_eq!(result.score, Some(100));
    }

    #[test]
    fn normalization_is_idempotent_modulo_timestamp() {
        let raw = "ציון: 87/100 - עבודה יפה";
        let first = normalize(raw, "Noa", &patterns());
        let second = normalize(raw, "Noa", &patterns());
        assert_eq!(first.score, second.score);
        assert_eq!(first.source, second.source);
        assert_eq!(first.raw_text, second.raw_text);
        assert_eq!(first.structured, second.structured);
        assert_eq!(first.student_name, second.student_name);
        assert_eq!(first.error_message, second.error_message);
    }

    #[test]
    fn error_result_upholds_invariant() {
        let result = GradingResult::from_error("Noa", "quota exceeded");
        assert_eq!(result.source, ResultSource::Error);
        assert_eq!(result.score, None);
        assert_eq!(result.error_message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn fence_stripping_edge_cases() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
        // A rust-tagged fence is not a JSON candidate.
        assert!(strip_code_fence("```rust\nfn x() {}\n```").starts_with("```"));
    }

    #[test]
    fn custom_pattern_extends_the_policy() {
        let mut custom = patterns();
        custom.push(ScorePattern::new("points", r"(?i)points earned\s*=\s*(\d{1,3})").unwrap());
        assert_eq!(
            extract_heuristic_score("Points earned = 44", &custom),
            Some(44)
        );
    }

    #[test]
    fn pattern_order_decides_ties() {
        // Hebrew label outranks the bare N/100 form.
        let text = "90/100? לא. ציון: 12";
        assert_eq!(extract_heuristic_score(text, &patterns()), Some(12));
    }
}
