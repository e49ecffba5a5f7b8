// Question generation and interview packaging.
// All LLM calls go through llm_client via the QuestionGenerator seam.

pub mod handlers;
pub mod package;
pub mod prompts;
pub mod qna;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::crawl::pipeline::{crawl_for_role, CrawlSummary};
use crate::enrich::{classify_role_questions, ClassifySummary, DEFAULT_CLASSIFY_BATCH};
use crate::errors::AppError;
use crate::models::question::{Difficulty, QuestionType};
use crate::progress::Progress;
use crate::retrieval::availability::SourceMode;
use crate::state::AppState;
use qna::{generate_qna_for_role, QnaOptions};

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSummary {
    pub role_id: i64,
    pub mode: SourceMode,
    pub crawl: Option<CrawlSummary>,
    pub classify: Option<ClassifySummary>,
    /// Questions actually produced per type by the LLM batches.
    pub generated: BTreeMap<QuestionType, usize>,
}

/// Fills the question bank for a role.
///
/// `web` crawls and then classifies what came in; `llm` runs one generation
/// batch per configured type; `all` does both, web first.
pub async fn generate_for_role(
    state: &AppState,
    role_id: i64,
    mode: SourceMode,
    restrict_difficulty: Option<Difficulty>,
    progress: &Progress,
) -> Result<GenerateSummary, AppError> {
    let mut summary = GenerateSummary {
        role_id,
        mode,
        crawl: None,
        classify: None,
        generated: BTreeMap::new(),
    };

    if mode.includes_web() {
        let crawl = crawl_for_role(
            &state.db,
            &state.stackexchange,
            &state.config.crawl,
            role_id,
            progress,
        )
        .await?;
        summary.crawl = Some(crawl);

        let classify = classify_role_questions(
            &state.db,
            state.classifier.as_ref(),
            role_id,
            DEFAULT_CLASSIFY_BATCH,
            None,
            progress,
        )
        .await?;
        summary.classify = Some(classify);
    }

    if mode.includes_llm() {
        let options = QnaOptions {
            restrict_difficulty,
            ..QnaOptions::default()
        };
        for (&qtype, &count) in state.config.llm_gen_counts.iter().filter(|(_, c)| **c > 0) {
            let items = generate_qna_for_role(
                &state.db,
                state.generator.as_ref(),
                role_id,
                qtype,
                count,
                &options,
            )
            .await?;
            *summary.generated.entry(qtype).or_insert(0) += items.len();
        }
        progress.emit(format!(
            "[llm] Generated: {}",
            format_counts(&state.config.llm_gen_counts)
        ));
    }

    progress.emit("Done");
    Ok(summary)
}

/// `Technical=10, Coding=10`
fn format_counts(counts: &BTreeMap<QuestionType, usize>) -> String {
    counts
        .iter()
        .map(|(qtype, count)| format!("{qtype}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}
