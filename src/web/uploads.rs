use std::{collections::HashMap, path::Path};

use axum::extract::Multipart;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned while validating uploaded form data.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Expectations for a single multipart file field. Every form here accepts
/// at most one file per field, buffered in memory for extraction.
#[derive(Debug, Clone, Copy)]
pub struct FileField {
    pub name: &'static str,
    pub allowed_extensions: &'static [&'static str],
}

/// One uploaded file, held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Parsed multipart form: buffered files plus plain text fields.
#[derive(Debug, Default)]
pub struct FormData {
    files: Vec<UploadedFile>,
    text_fields: HashMap<String, String>,
}

impl FormData {
    pub fn file(&self, field_name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|file| file.field_name == field_name)
    }

    pub fn text(&self, field_name: &str) -> Option<&str> {
        self.text_fields.get(field_name).map(String::as_str)
    }
}

/// Reads a multipart form into memory, validating file fields against the
/// provided allow-list.
pub async fn read_form(
    mut multipart: Multipart,
    file_fields: &[FileField],
) -> UploadResult<FormData> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("failed to parse upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field
                .text()
                .await
                .map_err(|err| UploadError::new(format!("failed to read `{field_name}`: {err}")))?;
            form.text_fields.insert(field_name, value);
            continue;
        }

        let Some(config) = file_fields.iter().find(|f| f.name == field_name) else {
            return Err(UploadError::new(format!(
                "unexpected file field `{field_name}`"
            )));
        };

        if form.file(&field_name).is_some() {
            return Err(UploadError::new(format!(
                "field `{field_name}` accepts a single file"
            )));
        }

        let original_name = field.file_name().unwrap_or("upload.bin").to_string();
        let extension = extension_of(&original_name);

        if !config
            .allowed_extensions
            .iter()
            .any(|allowed| *allowed == extension)
        {
            return Err(UploadError::new(format!(
                "field `{field_name}` does not accept `.{extension}` files"
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| UploadError::new(format!("failed to read upload data: {err}")))?;

        if bytes.is_empty() {
            return Err(UploadError::new(format!(
                "uploaded file for `{field_name}` is empty"
            )));
        }

        form.files.push(UploadedFile {
            field_name,
            original_name: sanitize_filename::sanitize(&original_name),
            extension,
            bytes: bytes.to_vec(),
        });
    }

    Ok(form)
}

/// Lowercased extension of an uploaded filename, empty when absent.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
