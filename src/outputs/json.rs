//! Run metadata as pretty-printed JSON.
//!
//! The file is written once after ranking and again after downloads, when
//! the entries carry their download records. Both writes replace the whole
//! file. Groupings use ordered maps, so two writes of the same state differ
//! only in `scraped_at`.

use crate::error::PersistenceError;
use crate::models::RunMetadata;
use crate::outputs::write_file;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const METADATA_FILE: &str = "image_metadata.json";

/// Serialize `metadata` as indented JSON.
pub fn render_metadata(metadata: &RunMetadata) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(metadata)?)
}

/// Write [`METADATA_FILE`] into `output_dir`, returning its path.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), total = metadata.total_images))]
pub async fn write_metadata(
    metadata: &RunMetadata,
    output_dir: &Path,
) -> Result<PathBuf, PersistenceError> {
    let json = render_metadata(metadata)?;
    let path = output_dir.join(METADATA_FILE);
    write_file(&path, json.as_bytes()).await?;
    Ok(path)
}
