// Corpus module
// Loads plain-text product documentation from disk for ingestion

#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::{Result, SupportError};

/// Raw document text plus an optional source identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: Option<String>,
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(source: Option<String>, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }
}

const SAMPLE_FAQ_FILE: &str = "sample_faq.txt";

const SAMPLE_FAQ: &str = "Q: What is our return policy?
A: Items can be returned within 30 days of purchase with receipt.

Q: How do I reset my password?
A: Go to the login page and click on \"Forgot Password\" to receive reset instructions.

Q: What payment methods do you accept?
A: We accept credit cards, PayPal, and bank transfers.
";

/// Read every `.txt` file in `dir` as one document, ordered by file name
#[inline]
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(SupportError::Configuration(format!(
            "Corpus directory does not exist: {}",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_text = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if path.is_file() && is_text {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        debug!("Loaded document {:?} ({} bytes)", source, text.len());
        documents.push(Document { source, text });
    }

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

/// Create `dir` with a sample FAQ document if it does not exist yet
///
/// Returns `true` when the sample corpus was written.
#[inline]
pub fn ensure_sample_corpus(dir: &Path) -> Result<bool> {
    if dir.exists() {
        return Ok(false);
    }

    fs::create_dir_all(dir)?;
    fs::write(dir.join(SAMPLE_FAQ_FILE), SAMPLE_FAQ)?;
    info!("Created sample corpus at {}", dir.display());
    Ok(true)
}
