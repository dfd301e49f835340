use crate::error::{EtlError, Result, ResultExt as _};
use polars::prelude::*;
use std::path::{Path, PathBuf};

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Returns the first candidate that exists on disk.
///
/// Candidates are tried strictly in order, so callers encode their preference
/// (delimited text before columnar, conventional subdirectory before root)
/// in the order of the slice.
///
/// # Errors
///
/// Returns [`EtlError::NotFound`] listing every candidate when none exist.
pub fn locate_input(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| EtlError::NotFound {
            candidates: candidates.to_vec(),
        })
}

/// Loads a raw dataset, choosing the reader by file extension.
///
/// CSV files are read with schema inference disabled, so every column comes
/// back as `String` and empty fields as null.
///
/// # Errors
///
/// Fails on unreadable files or unsupported extensions.
pub fn load_df(path: &Path) -> Result<DataFrame> {
    let ext = extension_of(path);

    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(LazyFrame::collect)
            .with_context(|| format!("Failed to read CSV {}", path.display()))?,
        "parquet" => {
            let file = std::fs::File::open(path)?;
            ParquetReader::new(file)
                .finish()
                .with_context(|| format!("Failed to read Parquet {}", path.display()))?
        }
        _ => {
            return Err(EtlError::Config(format!(
                "Unsupported file extension '{ext}' for {}",
                path.display()
            )));
        }
    };

    tracing::debug!(path = %path.display(), rows = df.height(), "loaded dataset");
    Ok(df)
}

/// Writes a dataset as Parquet or CSV depending on the extension, creating
/// parent directories as needed.
///
/// # Errors
///
/// Fails on I/O errors or unsupported extensions.
pub fn save_df(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match extension_of(path).as_str() {
        "parquet" => {
            let file = std::fs::File::create(path)?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet {}", path.display()))?;
        }
        "csv" => {
            let file = std::fs::File::create(path)?;
            CsvWriter::new(file)
                .include_header(true)
                .finish(df)
                .with_context(|| format!("Failed to write CSV {}", path.display()))?;
        }
        other => {
            return Err(EtlError::Config(format!(
                "Unsupported output extension '{other}' for {}",
                path.display()
            )));
        }
    }

    tracing::debug!(path = %path.display(), rows = df.height(), "wrote dataset");
    Ok(())
}
