// Gate and classification prompts.

/// Placeholders: {types}, {title}, {body}
pub const GATE_PROMPT_TEMPLATE: &str = r#"Decide if the following StackExchange-style question is suitable as an interview question.
Return JSON with keys: is_interview (true/false), suggested_type, reason (short).
Types: {types}.

Title:
{title}

Body (markdown):
```{body}```"#;

/// Placeholders: {types}, {difficulties}, {title}, {body}
pub const CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify the interview question and return JSON with keys: qtype, difficulty, evaluation_rubric.
{types}
{difficulties}
evaluation_rubric is an object with keys: signals (list of what a strong answer shows), red_flags (list), scoring (short scale description, e.g. "0-5 rubric").

Question Title:
{title}

Question Body (markdown):
```{body}```

Return ONLY the JSON."#;
