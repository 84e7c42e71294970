//! Templating of transferred files
//!
//! Files flagged as templates are rendered with Tera before they are put in
//! place. Rendered copies live in a private scratch directory that is
//! removed with the handler.

use crate::error::TemplatingError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Variable context
pub type Variables = HashMap<String, serde_json::Value>;

#[async_trait]
pub trait TemplatingHandler: Send + Sync {
    /// Render the file at `path`, returning the path of the rendered copy
    async fn render(&self, path: &Path) -> Result<PathBuf, TemplatingError>;
}

/// Tera-backed templating handler
pub struct TeraTemplating {
    context: Context,
    scratch: TempDir,
    rendered: AtomicUsize,
}

impl TeraTemplating {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            context: Context::new(),
            scratch: tempfile::Builder::new()
                .prefix("converge-templates")
                .tempdir()?,
            rendered: AtomicUsize::new(0),
        })
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// Add environment variables whose name starts with `CONVERGE_`
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        const ALLOWED_PREFIX: &str = "CONVERGE_";
        let mut count = 0;

        for (key, value) in std::env::vars() {
            if key.starts_with(ALLOWED_PREFIX) {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }

        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// Render a template string with the current context
    pub fn render_str(&self, template: &str) -> Result<String, tera::Error> {
        Tera::one_off(template, &self.context, false)
    }
}

#[async_trait]
impl TemplatingHandler for TeraTemplating {
    async fn render(&self, path: &Path) -> Result<PathBuf, TemplatingError> {
        let fail = |message: String| TemplatingError {
            file: path.to_path_buf(),
            message,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| fail(e.to_string()))?;
        let rendered = self
            .render_str(&content)
            .map_err(|e| fail(extract_tera_error_detail(&e)))?;

        let n = self.rendered.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string());
        let output = self.scratch.path().join(format!("{}-{}", n, name));
        tokio::fs::write(&output, rendered)
            .await
            .map_err(|e| fail(e.to_string()))?;

        debug!(template = %path.display(), output = %output.display(), "Rendered template");
        Ok(output)
    }
}

/// Flatten a Tera error and its sources into one line
fn extract_tera_error_detail(err: &tera::Error) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
