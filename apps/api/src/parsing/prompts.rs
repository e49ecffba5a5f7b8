// JD extraction prompts.

pub const JD_EXTRACT_SYSTEM: &str = "You extract structured fields from job descriptions. \
    Respond with only a JSON object: no markdown, no backticks, no commentary.";

/// Placeholder: {jd_text}
pub const JD_EXTRACT_PROMPT_TEMPLATE: &str = r#"Given the complete text of a job description, output a JSON object with exactly these keys:
{
  "job_title": "",
  "skills": [],
  "tools": [],
  "responsibilities": [],
  "experience": []
}

Input job description:
```{jd_text}```"#;
