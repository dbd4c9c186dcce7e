use thiserror::Error;

/// Failure while turning an uploaded document into text or page images.
///
/// These never escape the grading flow as panics; handlers render the
/// message directly to the operator.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("failed to read DOCX: {0}")]
    Docx(String),
    #[error("file is not valid UTF-8 text: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure while talking to the hosted model service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to model service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model service returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model reply contained no text")]
    EmptyReply,
    #[error("no compatible model found; {}", summarize_attempts(.0))]
    NoModelAvailable(Vec<(String, String)>),
}

fn summarize_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no candidates were configured".to_string();
    }
    let details: Vec<String> = attempts
        .iter()
        .map(|(model, reason)| format!("{model}: {reason}"))
        .collect();
    format!("tried {} candidate(s) [{}]", attempts.len(), details.join("; "))
}
