//! Schema-driven local responses
//!
//! In schema mode every request is first offered to a [`ResponseGenerator`].
//! If it produces a body the proxy answers on its own and never contacts the
//! origin.

pub mod document;

pub use document::{DeclarativeGenerator, SchemaDocument};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::http::target::ParsedQuery;

/// Produces a response body for a request, or `None` when it has no answer.
///
/// Called concurrently from many requests; implementations must not rely on
/// external locking.
pub trait ResponseGenerator: Send + Sync {
    fn generate(
        &self,
        segments: &[String],
        query: &ParsedQuery,
        schema: &SchemaHandle,
    ) -> Option<Bytes>;
}

/// The schema loaded at startup. Immutable and shared by every request.
#[derive(Debug)]
pub struct SchemaHandle {
    path: PathBuf,
    document: SchemaDocument,
}

impl SchemaHandle {
    /// Reads and parses the schema file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read schema {}", path.display()))?;
        let document = SchemaDocument::from_yaml(&source)
            .with_context(|| format!("Cannot load schema {}", path.display()))?;

        Ok(Self::new(path, document))
    }

    pub fn new(path: impl Into<PathBuf>, document: SchemaDocument) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }
}

/// Pairs a generator with the schema it answers from.
#[derive(Clone)]
pub struct LocalResponder {
    generator: Arc<dyn ResponseGenerator>,
    schema: Arc<SchemaHandle>,
}

impl LocalResponder {
    pub fn new(generator: Arc<dyn ResponseGenerator>, schema: Arc<SchemaHandle>) -> Self {
        Self { generator, schema }
    }

    /// Asks the generator for a response.
    ///
    /// The generator runs on the blocking pool. A generator that panics is
    /// logged and counts as having no answer.
    pub async fn respond(&self, segments: Vec<String>, query: ParsedQuery) -> Option<Bytes> {
        let generator = Arc::clone(&self.generator);
        let schema = Arc::clone(&self.schema);

        match tokio::task::spawn_blocking(move || generator.generate(&segments, &query, &schema))
            .await
        {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Response generator failed");
                None
            }
        }
    }
}
