//! Output files written at the end of a run.
//!
//! # Submodules
//!
//! - [`json`]: the full [`crate::models::RunMetadata`] record
//! - [`mapping`]: a per-subject image list for the front end
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── image_metadata.json
//! ├── image_mapping.json
//! └── downloaded/
//!     ├── goodfellas-prison-dinner.jpg
//!     └── big-night-1a2b3c.png
//! ```

pub mod json;
pub mod mapping;

use crate::error::PersistenceError;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Write `contents` to `path`, mapping failures to [`PersistenceError`].
#[instrument(level = "debug", skip(contents), fields(path = %path.display()))]
pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    fs::write(path, contents)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), bytes = contents.len(), "Wrote output file");
    Ok(())
}
