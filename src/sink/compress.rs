// Archive compression behind a minimal interface

use crate::error::LogError;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io;
use std::path::Path;

/// Compresses a rotated archive into a sibling file.
pub trait Compress: Send + Sync {
    fn compress(&self, src: &Path, dst: &Path) -> Result<(), LogError>;

    /// File extension including the leading dot (e.g. `".gz"`).
    fn extension(&self) -> &'static str;
}

pub struct GzipCompressor;

impl Compress for GzipCompressor {
    fn compress(&self, src: &Path, dst: &Path) -> Result<(), LogError> {
        let mut input = File::open(src).map_err(LogError::Compression)?;
        let output = File::create(dst).map_err(LogError::Compression)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut input, &mut encoder).map_err(LogError::Compression)?;
        encoder.finish().map_err(LogError::Compression)?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        ".gz"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;

    #[test]
    fn test_gzip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("plain.log");
        let dst = dir.path().join("plain.log.gz");
        fs::write(&src, b"the quick brown fox\n").unwrap();

        GzipCompressor.compress(&src, &dst).unwrap();

        let mut decoder = GzDecoder::new(File::open(&dst).unwrap());
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).unwrap();
        assert_eq!(restored, b"the quick brown fox\n");
    }

    #[test]
    fn test_gzip_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = GzipCompressor
            .compress(&dir.path().join("absent"), &dir.path().join("out.gz"))
            .unwrap_err();
        assert!(matches!(err, LogError::Compression(_)));
    }

    #[test]
    fn test_extension() {
        assert_eq!(GzipCompressor.extension(), ".gz");
    }
}
