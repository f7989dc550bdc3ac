// Shared prompt fragments. Each service that needs LLM calls defines its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// System prompt fragment that enforces raw LaTeX output.
pub const LATEX_ONLY_SYSTEM: &str = "You are a precise LaTeX author. \
    You MUST respond with a single complete LaTeX document only. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every document generation prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every statement must come from the candidate data provided. \
    Do NOT invent employers, dates, degrees, metrics or skills. \
    Never list the company the candidate is applying to as a past employer. \
    If the data does not support a claim, omit it entirely.";
