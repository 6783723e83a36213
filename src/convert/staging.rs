//! Per-request scratch space on disk.
//!
//! Every conversion gets its own uniquely named directory with an `in/`
//! and an `out/` subdirectory. The whole tree is removed when the
//! [`StagingArea`] is dropped, whichever way the request ends.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;
use tracing::warn;

use super::PdfDocument;

/// Name of the single input file staged per request.
pub const INPUT_FILENAME: &str = "message.eml";

const DIR_PREFIX: &str = "eml2pdf-";

#[derive(Debug)]
pub struct StagingArea {
    root: TempDir,
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl StagingArea {
    /// Create a fresh staging area under `parent`, or the system temp dir.
    pub async fn create(parent: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);
        let root = match parent {
            Some(parent) => {
                fs::create_dir_all(parent).await?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let input_dir = root.path().join("in");
        let output_dir = root.path().join("out");
        fs::create_dir(&input_dir).await?;
        fs::create_dir(&output_dir).await?;

        Ok(Self {
            root,
            input_dir,
            output_dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the message verbatim as the one input file.
    pub async fn write_input(&self, eml: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.input_dir.join(INPUT_FILENAME);
        fs::write(&path, eml).await?;
        Ok(path)
    }

    /// PDF files in `out/`, sorted by name.
    pub async fn output_pdfs(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.output_dir).await?;
        let mut pdfs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && has_pdf_extension(&path) {
                pdfs.push(path);
            }
        }
        pdfs.sort();
        Ok(pdfs)
    }

    /// Read the first PDF in `out/` into memory, if any.
    pub async fn read_first_pdf(&self) -> std::io::Result<Option<PdfDocument>> {
        let Some(path) = self.output_pdfs().await?.into_iter().next() else {
            return Ok(None);
        };

        let bytes = fs::read(&path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "message.pdf".to_string());

        Ok(Some(PdfDocument { filename, bytes }))
    }

    /// Remove the staging tree now, logging instead of failing on errors.
    pub fn close(self) {
        let path = self.root.path().to_path_buf();
        if let Err(e) = self.root.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove staging area");
        }
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
