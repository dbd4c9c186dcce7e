use std::borrow::Cow;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    AppState,
    extract::{ExtractedContent, MediaKind},
    grading::{
        AssignmentKind, GradingRequest, GradingResult, ReferenceMaterial, format_report,
        report_filename,
    },
    web::{FileField, FormData, StoredReport, read_form, render_tool_page},
};

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "png", "jpg", "jpeg"];

const REFERENCE_FIELD: FileField = FileField {
    name: "reference",
    allowed_extensions: SUPPORTED_EXTENSIONS,
};

const HOMEWORK_FIELD: FileField = FileField {
    name: "homework",
    allowed_extensions: SUPPORTED_EXTENSIONS,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tools/grader", get(grader_page))
        .route("/tools/grader/reference", post(upload_reference))
        .route("/tools/grader/grade", post(grade_homework))
        .route("/tools/grader/report", get(download_report))
}

/// JSON error body shared by the grader endpoints.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

#[derive(Serialize)]
struct ReferenceResponse {
    detail: String,
}

#[derive(Serialize)]
struct GradeResponse {
    result: GradingResult,
    report_url: &'static str,
}

async fn grader_page() -> Html<String> {
    Html(page_markup())
}

async fn upload_reference(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let form = read_form(multipart, &[REFERENCE_FIELD])
        .await
        .map_err(|err| ApiError::bad_request(err.message()))?;
    let upload = form
        .file(REFERENCE_FIELD.name)
        .ok_or_else(|| ApiError::bad_request("no reference file was uploaded"))?;

    let content = extract_upload(&state, &upload.extension, &upload.bytes)?;
    let material = ReferenceMaterial::from_extracted(content);
    let detail = material.describe();
    info!(file = %upload.original_name, "{detail}");
    state.set_reference(material).await;

    Ok(Json(ReferenceResponse { detail }))
}

async fn grade_homework(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GradeResponse>, ApiError> {
    let Some(reference) = state.reference().await else {
        return Err(ApiError::bad_request(
            "upload a reference file before grading",
        ));
    };

    let form = read_form(multipart, &[HOMEWORK_FIELD])
        .await
        .map_err(|err| ApiError::bad_request(err.message()))?;

    let student_name = form
        .text("student_name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("student name is required"))?
        .to_string();

    let assignment_kind = form
        .text("assignment_kind")
        .and_then(AssignmentKind::parse)
        .unwrap_or(AssignmentKind::Homework);

    let content = homework_content(&state, &form)?;

    let request = GradingRequest {
        student_name,
        assignment_kind,
        content,
    };
    let result = crate::grading::grade(
        state.llm(),
        &reference,
        &request,
        &state.config().prompt_limits(),
        state.score_patterns(),
    )
    .await;

    let report = StoredReport {
        filename: report_filename(&request.student_name),
        body: format_report(&result, request.assignment_kind),
    };
    state.store_report(report).await;

    Ok(Json(GradeResponse {
        result,
        report_url: "/tools/grader/report",
    }))
}

async fn download_report(State(state): State<AppState>) -> Response {
    match state.last_report().await {
        Some(report) => (
            [
                (
                    header::CONTENT_TYPE,
                    "text/plain; charset=utf-8".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report.filename),
                ),
            ],
            report.body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no report has been generated yet").into_response(),
    }
}

/// Homework comes in as either an uploaded file or a pasted text field.
fn homework_content(state: &AppState, form: &FormData) -> Result<ExtractedContent, ApiError> {
    if let Some(upload) = form.file(HOMEWORK_FIELD.name) {
        return extract_upload(state, &upload.extension, &upload.bytes);
    }

    let pasted = form
        .text("homework_text")
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ApiError::bad_request("attach a homework file or paste its text"))?;

    Ok(ExtractedContent::Text(pasted.to_string()))
}

fn extract_upload(
    state: &AppState,
    extension: &str,
    bytes: &[u8],
) -> Result<ExtractedContent, ApiError> {
    let kind = MediaKind::from_extension(extension)
        .ok_or_else(|| ApiError::bad_request(format!("unsupported file type `.{extension}`")))?;

    state.extractor().extract(bytes, kind).map_err(|err| {
        warn!(%err, "content extraction failed");
        ApiError::bad_request(format!("could not read the uploaded file: {err}"))
    })
}

fn page_markup() -> String {
    render_tool_page(
        "Homework Grader",
        "Homework Grader",
        Cow::Borrowed(PAGE_BODY),
        PAGE_SCRIPT,
    )
}

const PAGE_BODY: &str = r#"        <section class="panel">
            <h2>1. Reference material</h2>
            <p class="note">Upload the answer key or worked solutions once per session (PDF, DOCX, TXT or an image).</p>
            <form id="reference-form">
                <input type="file" name="reference" accept=".pdf,.docx,.txt,.png,.jpg,.jpeg" required>
                <button type="submit">Load reference</button>
            </form>
            <div class="status-box" id="reference-status">No reference loaded.</div>
        </section>
        <section class="panel">
            <h2>2. Grade a submission</h2>
            <form id="grade-form">
                <label for="student-name">Student name</label>
                <input type="text" id="student-name" name="student_name" required>
                <label for="assignment-kind">Assignment type</label>
                <select id="assignment-kind" name="assignment_kind">
                    <option value="homework" selected>Homework</option>
                    <option value="quiz">Quiz</option>
                    <option value="test">Test</option>
                    <option value="practice">Practice</option>
                </select>
                <label for="homework-file">Homework file</label>
                <input type="file" id="homework-file" name="homework" accept=".pdf,.docx,.txt,.png,.jpg,.jpeg">
                <label for="homework-text">Or paste the homework text</label>
                <textarea id="homework-text" name="homework_text" dir="auto"></textarea>
                <button type="submit" id="grade-button">Grade</button>
            </form>
        </section>
        <section class="panel">
            <h2>3. Result</h2>
            <div class="score" id="score-line">&mdash;</div>
            <div class="status-box" id="result-box">Nothing graded yet.</div>
            <p><a id="report-link" href="/tools/grader/report" hidden>Download report</a></p>
        </section>"#;

const PAGE_SCRIPT: &str = r#"        async function submitForm(form, url) {
            const response = await fetch(url, { method: 'POST', body: new FormData(form) });
            const payload = await response.json();
            if (!response.ok) {
                throw new Error(payload.detail || 'request failed');
            }
            return payload;
        }

        document.getElementById('reference-form').addEventListener('submit', async (event) => {
            event.preventDefault();
            const status = document.getElementById('reference-status');
            try {
                const payload = await submitForm(event.target, '/tools/grader/reference');
                status.textContent = payload.detail;
            } catch (err) {
                status.textContent = 'Error: ' + err.message;
            }
        });

        document.getElementById('grade-form').addEventListener('submit', async (event) => {
            event.preventDefault();
            const button = document.getElementById('grade-button');
            const scoreLine = document.getElementById('score-line');
            const resultBox = document.getElementById('result-box');
            const reportLink = document.getElementById('report-link');
            button.disabled = true;
            resultBox.textContent = 'Grading, this can take a minute...';
            try {
                const payload = await submitForm(event.target, '/tools/grader/grade');
                const result = payload.result;
                scoreLine.textContent = result.score === null ? 'No score' : result.score + '/100';
                resultBox.textContent = result.error_message || result.raw_text;
                reportLink.href = payload.report_url;
                reportLink.hidden = false;
            } catch (err) {
                scoreLine.textContent = '\u2014';
                resultBox.textContent = 'Error: ' + err.message;
            } finally {
                button.disabled = false;
            }
        });"#;
