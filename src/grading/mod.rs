pub mod normalize;
pub mod prompt;
pub mod report;

pub use normalize::{
    GradingResult, ResultSource, ScorePattern, StructuredFeedback, default_score_patterns,
};
pub use prompt::PromptLimits;
pub use report::{format_report, report_filename};

use tracing::error;

use crate::extract::{ExtractedContent, PageImage};
use crate::llm::GeminiClient;

/// Authoritative answer material, built once per session when the reference
/// file is uploaded and immutable afterwards.
#[derive(Debug, Clone)]
pub enum ReferenceMaterial {
    Text(String),
    Images(Vec<PageImage>),
}

impl ReferenceMaterial {
    pub fn from_extracted(content: ExtractedContent) -> Self {
        match content {
            ExtractedContent::Text(text) => ReferenceMaterial::Text(text),
            ExtractedContent::Images(pages) => ReferenceMaterial::Images(pages),
        }
    }

    /// Short operator-facing description of what was loaded.
    pub fn describe(&self) -> String {
        match self {
            ReferenceMaterial::Text(text) => {
                format!("reference loaded as text ({} characters)", text.chars().count())
            }
            ReferenceMaterial::Images(pages) => {
                format!("reference loaded as {} scanned page(s)", pages.len())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Homework,
    Quiz,
    Test,
    Practice,
}

impl AssignmentKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "homework" => Some(AssignmentKind::Homework),
            "quiz" => Some(AssignmentKind::Quiz),
            "test" => Some(AssignmentKind::Test),
            "practice" => Some(AssignmentKind::Practice),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssignmentKind::Homework => "Homework",
            AssignmentKind::Quiz => "Quiz",
            AssignmentKind::Test => "Test",
            AssignmentKind::Practice => "Practice",
        }
    }
}

/// One grading action, built per user request.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    pub student_name: String,
    pub assignment_kind: AssignmentKind,
    pub content: ExtractedContent,
}

/// Runs a single grading action: compose the prompt, one outbound model
/// call, normalize the reply. Service failures become an Error-kind result
/// rather than propagating.
pub async fn grade(
    client: &GeminiClient,
    reference: &ReferenceMaterial,
    request: &GradingRequest,
    limits: &PromptLimits,
    patterns: &[ScorePattern],
) -> GradingResult {
    let parts = prompt::compose(reference, request, limits);

    match client.generate(&parts).await {
        Ok(raw_text) => normalize::normalize(&raw_text, &request.student_name, patterns),
        Err(err) => {
            error!(%err, student = %request.student_name, "grading call failed");
            GradingResult::from_error(&request.student_name, err.to_string())
        }
    }
}
