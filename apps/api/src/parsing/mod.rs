//! JD Parser: turns a raw job description (pasted text or an uploaded file)
//! into structured fields via the LLM.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::llm_client::LlmClient;

pub mod handlers;
pub mod prompts;

use prompts::{JD_EXTRACT_PROMPT_TEMPLATE, JD_EXTRACT_SYSTEM};

const REQUIRED_KEYS: [&str; 5] = ["job_title", "skills", "tools", "responsibilities", "experience"];

/// Structured fields extracted from a job description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedJobDescription {
    pub job_title: String,
    pub skills: Vec<String>,
    pub tools: Vec<String>,
    pub responsibilities: Vec<String>,
    pub experience: Vec<String>,
}

pub async fn extract_structured(
    jd_text: &str,
    llm: &LlmClient,
) -> Result<ParsedJobDescription, AppError> {
    if jd_text.trim().is_empty() {
        return Err(AppError::Validation("jd_text cannot be empty".to_string()));
    }

    let prompt = JD_EXTRACT_PROMPT_TEMPLATE.replace("{jd_text}", jd_text);
    let raw: Value = llm
        .call_json(&prompt, JD_EXTRACT_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("JD extraction failed: {e}")))?;

    normalize_extraction(&raw)
}

/// Checks that every expected key is present and coerces values to strings.
fn normalize_extraction(raw: &Value) -> Result<ParsedJobDescription, AppError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| AppError::Llm("JD extraction did not return a JSON object".to_string()))?;

    if let Some(missing) = REQUIRED_KEYS.iter().find(|k| !obj.contains_key(**k)) {
        return Err(AppError::Llm(format!(
            "JD extraction response missing required key: {missing}"
        )));
    }

    let job_title = match &obj["job_title"] {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    Ok(ParsedJobDescription {
        job_title,
        skills: string_list(&obj["skills"]),
        tools: string_list(&obj["tools"]),
        responsibilities: string_list(&obj["responsibilities"]),
        experience: string_list(&obj["experience"]),
    })
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::String(_) | Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Reads JD text out of an uploaded `.txt` or `.pdf` file.
pub fn text_from_upload(file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
    let lower = file_name.to_ascii_lowercase();
    let text = if lower.ends_with(".pdf") {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| AppError::UnprocessableEntity(format!("Could not read PDF: {e}")))?
    } else if lower.ends_with(".txt") || lower.ends_with(".md") {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        return Err(AppError::Validation(format!(
            "Unsupported file type for '{file_name}'; upload a .txt or .pdf"
        )));
    };

    if text.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(format!(
            "No text could be extracted from '{file_name}'"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_extraction_coerces_fields() {
        let raw = json!({
            "job_title": "  Backend Engineer ",
            "skills": ["Rust", "", "SQL", 5],
            "tools": null,
            "responsibilities": "Own the API",
            "experience": ["3+ years"]
        });
        let parsed = normalize_extraction(&raw).unwrap();
        assert_eq!(parsed.job_title, "Backend Engineer");
        assert_eq!(parsed.skills, vec!["Rust", "SQL", "5"]);
        assert!(parsed.tools.is_empty());
        assert_eq!(parsed.responsibilities, vec!["Own the API"]);
        assert_eq!(parsed.experience, vec!["3+ years"]);
    }

    #[test]
    fn test_normalize_extraction_requires_all_keys() {
        let raw = json!({"job_title": "SRE", "skills": []});
        let err = normalize_extraction(&raw).unwrap_err();
        assert!(matches!(err, AppError::Llm(msg) if msg.contains("tools")));
    }

    #[test]
    fn test_null_title_becomes_empty() {
        let raw = json!({
            "job_title": null, "skills": [], "tools": [],
            "responsibilities": [], "experience": []
        });
        assert_eq!(normalize_extraction(&raw).unwrap().job_title, "");
    }

    #[test]
    fn test_text_upload_is_decoded() {
        let text = text_from_upload("jd.TXT", "Senior Rust Engineer".as_bytes()).unwrap();
        assert_eq!(text, "Senior Rust Engineer");
    }

    #[test]
    fn test_unsupported_upload_is_rejected() {
        let err = text_from_upload("jd.docx", b"PK").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_blank_upload_is_unprocessable() {
        let err = text_from_upload("jd.txt", b"   \n").unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[tokio::test]
    async fn test_extract_structured_rejects_empty_input() {
        let llm = LlmClient::with_api_url("test".into(), "http://127.0.0.1:9".into()).unwrap();
        let err = extract_structured("   ", &llm).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
