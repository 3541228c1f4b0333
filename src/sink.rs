//! Persistence sink: encodes the composite image and writes it to storage.
//!
//! The pipeline invokes the sink exactly once per completed session, with a
//! timestamp-derived, collision-unlikely filename distinguishing single-shot
//! captures from scrolled ones.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use image::RgbaImage;
use log::info;
use std::path::{Path, PathBuf};

/// Distinguishes the two capture paths in output filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// Single-shot capture, no scrolling
    Screenshot,
    /// Stitched scroll capture
    Scrollshot,
}

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::Screenshot => "screenshot",
            CaptureKind::Scrollshot => "scrollshot",
        }
    }
}

/// Accepts a finished composite and performs the save action
pub trait PersistenceSink {
    /// Encode `image` and write it to storage, returning the written path
    fn save(&self, image: &RgbaImage, kind: CaptureKind) -> Result<PathBuf>;
}

/// Sink that encodes to PNG and writes into a directory
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

/// `<kind>-<ISO 8601 timestamp with ':' and '.' replaced by '-'>.png`
pub fn suggested_filename(kind: CaptureKind, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}-{}.png", kind.as_str(), stamp)
}

impl PersistenceSink for FileSink {
    fn save(&self, image: &RgbaImage, kind: CaptureKind) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(suggested_filename(kind, Utc::now()));
        image
            .save(&path)
            .map_err(|e| Error::Encode(format!("failed to encode PNG: {}", e)))?;
        info!(
            "saved {} composite {}x{} to {}",
            kind.as_str(),
            image.width(),
            image.height(),
            path.display()
        );
        Ok(path)
    }
}
