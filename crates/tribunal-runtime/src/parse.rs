//! Oracle reply parsing.
//!
//! Panel members are instructed to reply with a bare JSON object, and most
//! of the time they do. The fallbacks below recover judgments from the
//! replies that arrive wrapped in code fences, embedded in prose, or
//! reduced to a labeled "Score: 85" line. Range validation happens in the
//! evaluator client, not here; this module only extracts.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

lazy_static! {
    static ref SCORE_PATTERNS: Vec<Regex> = vec![
        // "Score: 85", "**Score:** 85", "overall score is 85"
        Regex::new(r"(?i)\bscore\b[^0-9]{0,12}(\d{1,3}(?:\.\d+)?)").unwrap(),
        // "85/100"
        Regex::new(r"\b(\d{1,3}(?:\.\d+)?)\s*/\s*100\b").unwrap(),
    ];
}

/// A judgment extracted from one oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedJudgment {
    /// The numeric score, exactly as the oracle stated it.
    pub score: f64,

    /// The oracle's justification. Empty when the reply carried none.
    pub rationale: String,
}

/// The reply contained nothing recognizable as a score.
#[derive(Debug, Error)]
#[error("no recognizable score in reply starting {snippet:?}")]
pub struct JudgmentParseError {
    snippet: String,
}

impl JudgmentParseError {
    fn new(content: &str) -> Self {
        Self {
            snippet: content.trim().chars().take(80).collect(),
        }
    }
}

#[derive(Deserialize)]
struct JudgmentJson {
    score: ScoreField,
    #[serde(default)]
    rationale: String,
}

/// Models occasionally quote the number. Accept both forms.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreField {
    Number(f64),
    Text(String),
}

impl ScoreField {
    fn value(&self) -> Option<f64> {
        match self {
            ScoreField::Number(n) => Some(*n),
            ScoreField::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Extract a judgment from an oracle reply.
///
/// Tried in order:
/// 1. The whole reply as JSON (code fences stripped first)
/// 2. The outermost `{...}` block inside the reply
/// 3. A labeled score in plain text ("Score: 85", "85/100")
/// 4. A reply that is nothing but a number
pub fn parse_judgment(content: &str) -> Result<ParsedJudgment, JudgmentParseError> {
    let body = strip_code_fences(content);

    if let Some(judgment) = parse_json(body) {
        return Ok(judgment);
    }

    if let Some(block) = extract_json_block(body) {
        if let Some(judgment) = parse_json(block) {
            return Ok(judgment);
        }
    }

    if let Some(score) = extract_labeled_score(body) {
        // The surrounding text is the closest thing to a rationale we have.
        return Ok(ParsedJudgment {
            score,
            rationale: body.trim().to_string(),
        });
    }

    if let Ok(score) = body.trim().parse::<f64>() {
        return Ok(ParsedJudgment {
            score,
            rationale: String::new(),
        });
    }

    Err(JudgmentParseError::new(content))
}

fn parse_json(content: &str) -> Option<ParsedJudgment> {
    let parsed: JudgmentJson = serde_json::from_str(content.trim()).ok()?;
    let score = parsed.score.value()?;

    Some(ParsedJudgment {
        score,
        rationale: parsed.rationale,
    })
}

/// Strip a leading/trailing markdown code fence, including a language tag.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the fence line itself ("```json" etc.)
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };

    body.trim().strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost brace-delimited block, if any.
fn extract_json_block(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn extract_labeled_score(content: &str) -> Option<f64> {
    for pattern in SCORE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(content) {
            if let Ok(value) = caps[1].parse::<f64>() {
                return Some(value);
            }
        }
    }
    None
}
