//! System prompts for scoring panel members.
//!
//! Prompts are layered for cache efficiency:
//! 1. Base prompt (shared across all panel members) - cached
//! 2. Template-specific rubric - cached
//! 3. Dynamic content (the answer) - not cached
//!
//! Every ensemble member for a given answer receives the identical prompt;
//! the only variation between members is sampling temperature.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prompt template identifier.
///
/// Templates are enumerated rather than free-form so a caller can never
/// dispatch an ensemble with an unreviewed rubric. Adding a template means
/// adding a variant and its prompt constant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    /// Domain-agnostic answer quality rubric.
    General,
    /// Technical depth and correctness rubric.
    Technical,
    /// Behavioral/situational answer rubric.
    Behavioral,
}

impl TemplateId {
    /// All registered templates.
    pub const ALL: [TemplateId; 3] = [
        TemplateId::General,
        TemplateId::Technical,
        TemplateId::Behavioral,
    ];
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::General => write!(f, "general"),
            TemplateId::Technical => write!(f, "technical"),
            TemplateId::Behavioral => write!(f, "behavioral"),
        }
    }
}

impl FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(TemplateId::General),
            "technical" => Ok(TemplateId::Technical),
            "behavioral" => Ok(TemplateId::Behavioral),
            other => Err(format!(
                "unknown template '{}' (expected one of: general, technical, behavioral)",
                other
            )),
        }
    }
}

/// Base system prompt shared across all panel members.
///
/// The framing establishes the member as one independent judge on a panel,
/// not the final arbiter. Aggregation happens outside the model; each
/// member only ever produces one number and one rationale.
pub const BASE_SYSTEM_PROMPT: &str = r#"
You are one member of an independent scoring panel evaluating a candidate's
interview answer.

Your role is to score ONE answer against the rubric you are given.
You do not see other panel members or their scores.
You do not negotiate or average; aggregation happens outside this conversation.
You score only what is written, never what the candidate might have meant.

## Scoring Constraints
1. Apply ONLY the rubric you are given - do not invent criteria
2. Score the content, not the length; padding earns nothing
3. An answer that does not address the question scores below 60 regardless of polish
4. Keep the rationale to two or three sentences citing concrete parts of the answer

## Output Format (JSON)
{
  "score": <integer 0-100>,
  "rationale": "brief justification citing the answer"
}

Reply with the JSON object only. No prose before or after it.

## Score Bands
- 90-100: Exceptional - complete, precise, and shows depth beyond the question
- 80-89: Strong - correct and well-reasoned with minor gaps
- 70-79: Competent - sound core answer, missing depth or edge cases
- 60-69: Partial - addresses the question but with significant gaps
- Below 60: Inadequate - off-target, incorrect, or substantially incomplete

## Critical Reminder
You are one voice on a panel. Commit to a number; do not hedge with ranges.
"#;

/// General answer quality rubric.
pub const GENERAL_TEMPLATE_PROMPT: &str = r#"
## Scoring Domain: General Answer Quality

Scoring Question:
How well does this answer address the question asked, on its own terms?

## Rubric Criteria
- Directness: does the answer actually answer the question?
- Structure: is there a discernible line of reasoning?
- Specificity: concrete details over generic claims
- Self-awareness: limits and trade-offs acknowledged where relevant

## Scoring Reminder
Judge the answer as written. Do not reward confidence unsupported by content.
"#;

/// Technical answer rubric.
pub const TECHNICAL_TEMPLATE_PROMPT: &str = r#"
## Scoring Domain: Technical Depth

Scoring Question:
Is this answer technically correct, and does it show working depth rather
than recited terminology?

## Rubric Criteria
- Correctness: are the technical claims accurate?
- Depth: mechanism and reasoning, not just names of tools
- Trade-offs: are costs and alternatives acknowledged?
- Practicality: would this approach survive contact with production?

## Hard Limits
- A factually wrong core claim caps the score at 50
- Correct terminology with no mechanism behind it caps the score at 65

## Scoring Reminder
Terminology is not understanding. Score the mechanism the candidate can
actually articulate.
"#;

/// Behavioral answer rubric.
pub const BEHAVIORAL_TEMPLATE_PROMPT: &str = r#"
## Scoring Domain: Behavioral Response

Scoring Question:
Does this answer describe a concrete situation, the candidate's own actions,
and a real outcome?

## Rubric Criteria
- Situation: specific context, not a hypothetical composite
- Action: what THE CANDIDATE did, in first person
- Outcome: measurable or observable result
- Reflection: what they would repeat or change

## Common Failure Modes
- Team accomplishments with no identifiable personal contribution
- Hypothetical "I would..." answers to a "tell me about a time..." question
- Outcomes asserted without any supporting detail

## Scoring Reminder
Generic virtue statements score in the Partial band at best. Specifics move
the score.
"#;

/// Get the rubric prompt for a template.
pub fn template_for(id: TemplateId) -> &'static str {
    match id {
        TemplateId::General => GENERAL_TEMPLATE_PROMPT,
        TemplateId::Technical => TECHNICAL_TEMPLATE_PROMPT,
        TemplateId::Behavioral => BEHAVIORAL_TEMPLATE_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_retrieval() {
        let general = template_for(TemplateId::General);
        assert!(general.contains("General Answer Quality"));

        let technical = template_for(TemplateId::Technical);
        assert!(technical.contains("Technical Depth"));

        let behavioral = template_for(TemplateId::Behavioral);
        assert!(behavioral.contains("Behavioral Response"));
    }

    #[test]
    fn test_base_prompt_panel_framing() {
        assert!(BASE_SYSTEM_PROMPT.contains("scoring panel"));
        assert!(BASE_SYSTEM_PROMPT.contains("do not see other panel members"));
        assert!(BASE_SYSTEM_PROMPT.contains("aggregation happens outside"));
    }

    #[test]
    fn test_base_prompt_output_contract() {
        assert!(BASE_SYSTEM_PROMPT.contains(r#""score""#));
        assert!(BASE_SYSTEM_PROMPT.contains(r#""rationale""#));
        assert!(BASE_SYSTEM_PROMPT.contains("integer 0-100"));
        assert!(BASE_SYSTEM_PROMPT.contains("JSON object only"));
    }

    #[test]
    fn test_all_templates_have_scoring_question() {
        for id in TemplateId::ALL {
            assert!(
                template_for(id).contains("Scoring Question:"),
                "template {} missing its scoring question",
                id
            );
        }
    }

    #[test]
    fn test_all_templates_have_scoring_reminder() {
        for id in TemplateId::ALL {
            assert!(
                template_for(id).contains("Scoring Reminder"),
                "template {} missing its reminder",
                id
            );
        }
    }

    #[test]
    fn test_template_id_round_trip() {
        for id in TemplateId::ALL {
            let parsed: TemplateId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn test_unknown_template_rejected() {
        let err = "freeform".parse::<TemplateId>().unwrap_err();
        assert!(err.contains("freeform"));
        assert!(err.contains("general"));
    }
}
