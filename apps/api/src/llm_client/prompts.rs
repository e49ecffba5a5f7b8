// Cross-cutting prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// The four interview rounds every classifier and generator must choose from.
pub const QUESTION_TYPES_INSTRUCTION: &str =
    r#"Question types (pick exactly one): "Behavioral", "Technical", "Coding", "System Design"."#;

/// Allowed difficulty labels.
pub const DIFFICULTY_INSTRUCTION: &str =
    r#"Difficulty (pick exactly one): "Easy", "Medium", "Hard"."#;
