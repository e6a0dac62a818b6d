//! Source document loading

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, instrument};

use crate::models::Document;
use crate::{KgbError, Result};

/// Read a UTF-8 text file and flatten it onto a single line.
///
/// Line breaks (`\n`, `\r\n` and bare `\r`) are removed; other whitespace is
/// kept as is.
#[instrument]
pub async fn load_document(path: &Path) -> Result<Document> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => KgbError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => KgbError::Io(e),
    })?;

    let text = raw.replace(['\r', '\n'], "");
    debug!("Loaded {} characters from {}", text.len(), path.display());

    Ok(Document {
        source: path.to_path_buf(),
        text,
    })
}
