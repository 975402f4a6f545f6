//! tar.gz extraction for schema bundles.
//!
//! Switches deliver the OpenAPI schema either as plain text or wrapped in a
//! gzip-compressed tar archive. This module sniffs the gzip magic and pulls
//! the schema file out of the archive; callers fall back to the raw payload
//! when no extractable entry exists.

use std::io::Read;

use flate2::read::GzDecoder;
use thiserror::Error;

/// Leading bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether the payload starts with the gzip magic number.
pub fn looks_gzipped(data: &[u8]) -> bool {
    data.len() > 2 && data[..2] == GZIP_MAGIC
}

/// Failure to pull a schema entry out of an archive. Non-fatal for the
/// upload path — callers degrade to storing the raw payload.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read archive: {0}")]
    Read(#[from] std::io::Error),
    #[error("no openapi schema entry in archive")]
    NoSchemaEntry,
}

/// Extract the content of the first archive entry whose name ends in
/// `openapi.yaml` or `openapi.yml`.
pub fn extract_openapi(data: &[u8]) -> Result<String, ArchiveError> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_schema = {
            let path = entry.path()?;
            let name = path.to_string_lossy();
            name.ends_with("openapi.yaml") || name.ends_with("openapi.yml")
        };
        if is_schema {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return Ok(content);
        }
    }
    Err(ArchiveError::NoSchemaEntry)
}
