use std::{env, str::FromStr};

use anyhow::{Context, Result};

use crate::grading::PromptLimits;

/// Model identifiers probed in order at startup until one answers.
pub const DEFAULT_MODEL_CANDIDATES: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-pro",
];

const DEFAULT_MIN_TEXT_CHARS: usize = 50;
const DEFAULT_RENDER_DPI: u32 = 200;
const DEFAULT_TEXT_EXCERPT_CHARS: usize = 4000;
const DEFAULT_IMAGE_EXCERPT_CHARS: usize = 3000;
const DEFAULT_MAX_REFERENCE_IMAGES: usize = 3;
const DEFAULT_PORT: u16 = 8080;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model_candidates: Vec<String>,
    /// Minimum count of non-whitespace-trimmed characters for a PDF to count
    /// as machine text rather than a scanned document.
    pub min_text_chars: usize,
    pub render_dpi: u32,
    pub text_excerpt_chars: usize,
    pub image_excerpt_chars: usize,
    pub max_reference_images: usize,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY env var is missing")?;

        Ok(Self {
            api_key,
            model_candidates: parse_candidates(env::var("GRADER_MODEL_CANDIDATES").ok()),
            min_text_chars: parse_or_default(
                env::var("GRADER_MIN_TEXT_CHARS").ok(),
                DEFAULT_MIN_TEXT_CHARS,
            ),
            render_dpi: parse_or_default(env::var("GRADER_RENDER_DPI").ok(), DEFAULT_RENDER_DPI),
            text_excerpt_chars: parse_or_default(
                env::var("GRADER_TEXT_EXCERPT_CHARS").ok(),
                DEFAULT_TEXT_EXCERPT_CHARS,
            ),
            image_excerpt_chars: parse_or_default(
                env::var("GRADER_IMAGE_EXCERPT_CHARS").ok(),
                DEFAULT_IMAGE_EXCERPT_CHARS,
            ),
            max_reference_images: parse_or_default(
                env::var("GRADER_MAX_REFERENCE_IMAGES").ok(),
                DEFAULT_MAX_REFERENCE_IMAGES,
            ),
            port: parse_or_default(env::var("PORT").ok(), DEFAULT_PORT),
        })
    }

    pub fn prompt_limits(&self) -> PromptLimits {
        PromptLimits {
            text_excerpt_chars: self.text_excerpt_chars,
            image_excerpt_chars: self.image_excerpt_chars,
            max_reference_images: self.max_reference_images,
        }
    }
}

fn parse_candidates(raw: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = raw
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if parsed.is_empty() {
        DEFAULT_MODEL_CANDIDATES
            .iter()
            .map(|name| name.to_string())
            .collect()
    } else {
        parsed
    }
}

fn parse_or_default<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
