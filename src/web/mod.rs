pub mod router;
pub mod state;
pub mod templates;
pub mod uploads;

pub use state::{AppState, StoredReport};
pub use templates::{escape_html, render_tool_page};
pub use uploads::{FileField, FormData, UploadError, UploadedFile, read_form};
