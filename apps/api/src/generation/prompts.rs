// LLM prompt constants for document generation.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, LATEX_ONLY_SYSTEM};

/// System prompt for document generation.
pub fn generation_system() -> String {
    format!(
        "You are an expert resume writer who fills LaTeX templates with a candidate's \
        verified data. {LATEX_ONLY_SYSTEM}"
    )
}

/// Document generation prompt template.
/// Replace: {grounding_instruction}, {profile_json}, {experiences_json},
///          {template}, {feedback_section}
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

CANDIDATE PROFILE (source of truth):
{profile_json}

EXPERIENCES TO FEATURE, most relevant first:
{experiences_json}

LATEX TEMPLATE (keep its preamble, macros and section layout):
{template}
{feedback_section}
HARD RULES:
1. The compiled document MUST fit on exactly one page
2. Replace every template placeholder with real data, or delete the line
3. Never leave a list environment empty: remove the whole section instead
4. Escape LaTeX special characters (&, %, $, #, _) in candidate text
5. Return the complete document from \documentclass to \end{document}"#;

/// First line of the corrective feedback sent after a failed validation.
pub const FEEDBACK_INTRO: &str = "URGENT: THE GENERATED DOCUMENT IS INVALID.";

/// Closing instruction of the corrective feedback.
pub const FEEDBACK_INSTRUCTION: &str = "You MUST fix these problems. \
    If the problem is length (more than one page), condense intelligently: \
    shorten the oldest experiences to one or two bullets but keep detail for the most recent ones. \
    Do not delete everything at once; find the balance that fits on one page.";

/// Fixed intro, every issue verbatim on its own line, fixed instruction.
pub fn build_feedback(issues: &[String]) -> String {
    format!(
        "{FEEDBACK_INTRO}\nDetected problems:\n{}\n\nCORRECTION INSTRUCTION:\n{FEEDBACK_INSTRUCTION}",
        issues.join("\n")
    )
}

pub fn build_generation_prompt(
    profile_json: &str,
    experiences_json: &str,
    template: &str,
    feedback: Option<&str>,
) -> String {
    let feedback_section = match feedback {
        Some(f) if !f.trim().is_empty() => format!(
            "\nFEEDBACK ON YOUR PREVIOUS ATTEMPT (address every point):\n{f}\n"
        ),
        _ => String::new(),
    };

    GENERATION_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{profile_json}", profile_json)
        .replace("{experiences_json}", experiences_json)
        .replace("{template}", template)
        .replace("{feedback_section}", &feedback_section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_contains_every_issue_verbatim() {
        let issues = vec![
            "Page count violation: 2 pages (limit: 1)".to_string(),
            "Placeholder found: '[date]'".to_string(),
        ];
        let feedback = build_feedback(&issues);
        assert!(feedback.starts_with(FEEDBACK_INTRO));
        assert!(feedback.contains("Page count violation: 2 pages (limit: 1)\nPlaceholder found: '[date]'"));
        assert!(feedback.ends_with(FEEDBACK_INSTRUCTION));
    }

    #[test]
    fn test_prompt_without_feedback_has_no_feedback_section() {
        let prompt = build_generation_prompt("{}", "[]", "\\documentclass{article}", None);
        assert!(!prompt.contains("FEEDBACK ON YOUR PREVIOUS ATTEMPT"));
        assert!(prompt.contains("\\documentclass{article}"));
        assert!(!prompt.contains("{template}"));
    }

    #[test]
    fn test_prompt_with_feedback_embeds_it() {
        let prompt = build_generation_prompt("{}", "[]", "tpl", Some("fix the length"));
        assert!(prompt.contains("FEEDBACK ON YOUR PREVIOUS ATTEMPT"));
        assert!(prompt.contains("fix the length"));
    }
}
