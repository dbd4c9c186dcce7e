use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    config::AppConfig,
    extract::DocumentExtractor,
    grading::{ReferenceMaterial, ScorePattern, default_score_patterns},
    llm::GeminiClient,
};

/// Last rendered report, kept for download until the next grading action.
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub filename: String,
    pub body: String,
}

/// Session-scoped application state.
///
/// The reference material is written once per upload and only read during
/// grading; the score patterns and config never change after startup.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    llm: GeminiClient,
    score_patterns: Arc<Vec<ScorePattern>>,
    reference: Arc<RwLock<Option<ReferenceMaterial>>>,
    last_report: Arc<RwLock<Option<StoredReport>>>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::from_env()?;

        let llm = GeminiClient::connect(&config.api_key, &config.model_candidates)
            .await
            .context("failed to initialize model client")?;
        info!(model = llm.model(), "connected to model service");

        Ok(Self {
            config: Arc::new(config),
            llm,
            score_patterns: Arc::new(default_score_patterns()),
            reference: Arc::new(RwLock::new(None)),
            last_report: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn llm(&self) -> &GeminiClient {
        &self.llm
    }

    pub fn score_patterns(&self) -> &[ScorePattern] {
        &self.score_patterns
    }

    pub fn extractor(&self) -> DocumentExtractor {
        DocumentExtractor::new(self.config.min_text_chars, self.config.render_dpi)
    }

    pub async fn set_reference(&self, material: ReferenceMaterial) {
        let mut guard = self.reference.write().await;
        *guard = Some(material);
    }

    pub async fn reference(&self) -> Option<ReferenceMaterial> {
        self.reference.read().await.clone()
    }

    pub async fn store_report(&self, report: StoredReport) {
        let mut guard = self.last_report.write().await;
        *guard = Some(report);
    }

    pub async fn last_report(&self) -> Option<StoredReport> {
        self.last_report.read().await.clone()
    }
}
