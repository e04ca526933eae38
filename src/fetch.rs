//! Byte-level access to input and output files.
//!
//! Paths ending in `.gz` are transparently gzip decoded on read and encoded
//! on write.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Reads a whole input file, decompressing `*.gz` files.
#[tracing::instrument(fields(source = %path.display()))]
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    if !is_gzip(path) {
        debug!(bytes = raw.len(), "Read input");
        return Ok(raw);
    }

    let mut decoded = Vec::new();
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut decoded)
        .with_context(|| format!("failed to decompress {}", path.display()))?;
    debug!(compressed = raw.len(), bytes = decoded.len(), "Read gzip input");
    Ok(decoded)
}

/// Writes `bytes` to `path` in one go, compressing for `*.gz` paths.
/// Missing parent directories are created.
pub fn write_sink(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let body = if is_gzip(path) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        encoder.finish()?
    } else {
        bytes.to_vec()
    };

    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
