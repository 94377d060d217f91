//! Call markup rendering for the inbound call webhook.

use std::path::{Path, PathBuf};

/// Placeholder replaced with the request's `Host` header.
pub const HOST_PLACEHOLDER: &str = "{host}";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("TeXML template not found at {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read TeXML template at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Substitutes `host` into every placeholder of `template`.
pub fn render(template: &str, host: &str) -> String {
    template.replace(HOST_PLACEHOLDER, host)
}

/// Reads the template from disk and renders it for `host`.
///
/// The file is read on every call so edits take effect without a restart.
pub async fn load_and_render(path: &Path, host: &str) -> Result<String, TemplateError> {
    let template = tokio::fs::read_to_string(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            TemplateError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            TemplateError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(render(&template, host))
}
