//! Best-effort extraction of structured insights from model output.
//!
//! Models wrap JSON in code fences, prepend chatter, or stop mid-object when
//! they hit the token limit. The pipeline below cleans those up step by step
//! and always produces a complete [`AiInsights`], recording in
//! [`ParseOutcome`] how much guessing it took.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::models::{ParseKind, Recommendation};

pub const DEFAULT_INSIGHTS: &str = "Keep logging your cycle and symptoms every day. \
With a little more data we can give you more personalized insights.";
pub const DEFAULT_CYCLE_PREDICTIONS: &str =
    "Predictions become more accurate as you log more cycles.";

const PROSE_MIN_CHARS: usize = 20;
const PROSE_MAX_CHARS: usize = 600;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static INSIGHTS_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""insights"\s*:\s*"((?:[^"\\]|\\.)*)"#).expect("valid regex"));

pub fn default_recommendations() -> Vec<Recommendation> {
    [
        ("nutrition", "Eat iron-rich foods and stay hydrated throughout your cycle."),
        ("exercise", "Choose movement that matches your energy, from walks to strength work."),
        ("sleep", "Aim for 7-9 hours of sleep and keep a regular bedtime."),
        ("self-care", "Track how you feel each day and make time to rest when you need it."),
    ]
    .into_iter()
    .map(|(category, text)| Recommendation {
        category: category.to_string(),
        text: text.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsights {
    pub insights: String,
    pub cycle_predictions: String,
    pub recommendations: Vec<Recommendation>,
}

impl Default for AiInsights {
    fn default() -> Self {
        Self {
            insights: DEFAULT_INSIGHTS.to_string(),
            cycle_predictions: DEFAULT_CYCLE_PREDICTIONS.to_string(),
            recommendations: default_recommendations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The response held valid JSON once fences and preamble were removed.
    Parsed(AiInsights),
    /// The JSON had to be repaired, or fields were pulled out of broken text.
    Recovered(AiInsights),
    /// Nothing usable; everything is default copy.
    Defaulted(AiInsights),
}

impl ParseOutcome {
    pub fn kind(&self) -> ParseKind {
        match self {
            ParseOutcome::Parsed(_) => ParseKind::Parsed,
            ParseOutcome::Recovered(_) => ParseKind::Recovered,
            ParseOutcome::Defaulted(_) => ParseKind::Defaulted,
        }
    }

    pub fn insights(&self) -> &AiInsights {
        match self {
            ParseOutcome::Parsed(i) | ParseOutcome::Recovered(i) | ParseOutcome::Defaulted(i) => i,
        }
    }

    pub fn into_insights(self) -> AiInsights {
        match self {
            ParseOutcome::Parsed(i) | ParseOutcome::Recovered(i) | ParseOutcome::Defaulted(i) => i,
        }
    }
}

pub fn parse_ai_response(raw: &str) -> ParseOutcome {
    let unfenced = strip_code_fences(raw);

    let Some(start) = unfenced.find('{') else {
        return prose_fallback(&unfenced);
    };
    let candidate = unfenced[start..].trim();

    let (candidate, repaired) = if candidate.ends_with('}') {
        (candidate.to_string(), false)
    } else {
        (balance_truncated(candidate), true)
    };

    let cleaned = normalize(&candidate);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => {
            let insights = from_fields(&map);
            if repaired {
                ParseOutcome::Recovered(insights)
            } else {
                ParseOutcome::Parsed(insights)
            }
        }
        _ => field_fallback(&unfenced),
    }
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```JSON", "").replace("```", "")
}

/// Close any string, array or object left open by a truncated response.
fn balance_truncated(json: &str) -> String {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                closers.pop();
            }
            _ => {}
        }
    }

    let mut out = json.to_string();
    if escaped {
        out.pop();
    }
    if in_string {
        out.push('"');
    }
    out.extend(closers.into_iter().rev());
    out
}

/// Drop trailing commas and collapse whitespace between tokens. String
/// contents are kept as-is, except raw control characters, which JSON does
/// not allow there and which become spaces.
fn normalize(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' | '\r' | '\t' => out.push(' '),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            c if c.is_whitespace() => {
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                out.push(' ');
            }
            ',' => {
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn from_fields(map: &serde_json::Map<String, Value>) -> AiInsights {
    let text_field = |key: &str, default: &str| match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(Value::String(_)) => default.to_string(),
        Some(other) => other.to_string(),
    };

    let recommendations = match map.get("recommendations") {
        Some(Value::Array(items)) => {
            let parsed: Vec<Recommendation> = items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect();
            if parsed.is_empty() && !items.is_empty() {
                default_recommendations()
            } else {
                parsed
            }
        }
        _ => default_recommendations(),
    };

    AiInsights {
        insights: text_field("insights", DEFAULT_INSIGHTS),
        cycle_predictions: text_field("cyclePredictions", DEFAULT_CYCLE_PREDICTIONS),
        recommendations,
    }
}

fn field_fallback(text: &str) -> ParseOutcome {
    let extracted = INSIGHTS_FIELD
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace(['\n', '\r', '\t'], " "))
        .and_then(|s| serde_json::from_str::<String>(&format!("\"{}\"", s)).ok())
        .filter(|s| !s.trim().is_empty());

    match extracted {
        Some(insights) => ParseOutcome::Recovered(AiInsights {
            insights,
            ..AiInsights::default()
        }),
        None => ParseOutcome::Defaulted(AiInsights::default()),
    }
}

/// Plain prose answers are still worth showing; markup is not.
fn prose_fallback(text: &str) -> ParseOutcome {
    let trimmed = WHITESPACE.replace_all(text.trim(), " ");
    if trimmed.chars().count() < PROSE_MIN_CHARS || trimmed.contains('<') {
        return ParseOutcome::Defaulted(AiInsights::default());
    }

    ParseOutcome::Recovered(AiInsights {
        insights: trimmed.chars().take(PROSE_MAX_CHARS).collect(),
        ..AiInsights::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AiInsights {
        AiInsights {
            insights: "You are in your luteal phase.".into(),
            cycle_predictions: "Next period around 2024-01-29.".into(),
            recommendations: vec![Recommendation {
                category: "sleep".into(),
                text: "Go to bed early.".into(),
            }],
        }
    }

    #[test]
    fn well_formed_json_round_trips() {
        let raw = serde_json::to_string(&sample()).unwrap();
        assert_eq!(parse_ai_response(&raw), ParseOutcome::Parsed(sample()));
    }

    #[test]
    fn spacing_inside_values_survives() {
        let spaced = AiInsights {
            insights: "Rest.  Drink water.   Stretch\tgently.".into(),
            cycle_predictions: "Period in  5 days, ] maybe }".into(),
            recommendations: vec![Recommendation {
                category: "self-care".into(),
                text: "  Warm bath ,}  ".into(),
            }],
        };
        let raw = serde_json::to_string(&spaced).unwrap();
        assert_eq!(parse_ai_response(&raw), ParseOutcome::Parsed(spaced.clone()));

        let pretty = serde_json::to_string_pretty(&spaced).unwrap();
        assert_eq!(parse_ai_response(&pretty), ParseOutcome::Parsed(spaced));
    }

    #[test]
    fn raw_newlines_inside_strings_become_spaces() {
        let outcome = parse_ai_response("{\"insights\": \"Line one\nline two\"}");
        assert_eq!(outcome.kind(), ParseKind::Parsed);
        assert_eq!(outcome.insights().insights, "Line one line two");
    }

    #[test]
    fn fenced_json_with_preamble_is_parsed() {
        let raw = format!(
            "Sure! Here is your analysis:\n```json\n{}\n```",
            serde_json::to_string_pretty(&sample()).unwrap()
        );
        assert_eq!(parse_ai_response(&raw), ParseOutcome::Parsed(sample()));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let outcome = parse_ai_response(r#"{"insights": "Only insights here"}"#);
        let insights = outcome.insights();
        assert_eq!(outcome.kind(), ParseKind::Parsed);
        assert_eq!(insights.insights, "Only insights here");
        assert_eq!(insights.cycle_predictions, DEFAULT_CYCLE_PREDICTIONS);
        assert_eq!(insights.recommendations, default_recommendations());
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let raw = r#"{"insights": "a", "cyclePredictions": "b", "recommendations": [{"category": "c", "text": "d"},],}"#;
        let outcome = parse_ai_response(raw);
        assert_eq!(outcome.kind(), ParseKind::Parsed);
        assert_eq!(outcome.insights().recommendations.len(), 1);
    }

    #[test]
    fn truncated_json_is_repaired() {
        let raw = r#"{"insights": "Energy dips are common", "cyclePredictions": "Period in 5 days", "recommendations": [{"category": "sleep", "text": "Rest mo"#;
        let outcome = parse_ai_response(raw);
        assert_eq!(outcome.kind(), ParseKind::Recovered);
        let insights = outcome.into_insights();
        assert_eq!(insights.insights, "Energy dips are common");
        assert_eq!(insights.recommendations[0].text, "Rest mo");
    }

    #[test]
    fn unrepairable_json_falls_back_to_regex() {
        let raw = r#"{"insights": "Cramps ease with heat \"pads\"", "cyclePredictions": "#;
        let outcome = parse_ai_response(raw);
        assert_eq!(outcome.kind(), ParseKind::Recovered);
        assert_eq!(outcome.insights().insights, r#"Cramps ease with heat "pads""#);
        assert_eq!(outcome.insights().recommendations, default_recommendations());
    }

    #[test]
    fn prose_is_kept_as_insights() {
        let outcome = parse_ai_response("Your cycle looks regular and your symptoms are mild.");
        assert_eq!(outcome.kind(), ParseKind::Recovered);
        assert!(outcome.insights().insights.starts_with("Your cycle looks regular"));
    }

    #[test]
    fn garbage_never_panics_and_defaults() {
        for raw in ["", "   ", "not json", "<html><body>502 Bad Gateway</body></html>", "{", "{\"", "}{", "```", "{\"insights\": 5"] {
            let outcome = parse_ai_response(raw);
            let insights = outcome.insights();
            assert!(!insights.insights.is_empty());
            assert!(!insights.cycle_predictions.is_empty());
            assert!(!insights.recommendations.is_empty());
        }
        assert_eq!(parse_ai_response("").kind(), ParseKind::Defaulted);
        assert_eq!(parse_ai_response("<html><body>502 Bad Gateway</body></html>").kind(), ParseKind::Defaulted);
    }
}
