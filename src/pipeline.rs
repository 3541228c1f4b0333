//! Pipeline facade: ties the driver, capturer, compositor and sink together.
//!
//! Two public operations mirror the two capture paths: a single-shot region
//! capture (no scrolling, no timeouts beyond the host primitive's own call)
//! and a scrolling capture. Both reserve the target in the session registry
//! for their whole duration, hand the sink exactly one image per completed
//! session, and write nothing on any abort path.

use crate::capturer::capture_frame;
use crate::compositor::compose;
use crate::driver::ScrollDriver;
use crate::session::SessionRegistry;
use crate::sink::{CaptureKind, PersistenceSink};
use crate::{CaptureConfig, CaptureTarget, Direction, LayoutConfig, Region, Result, ScrollOffset};
use log::info;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Summary of a completed capture
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Path of the written image file
    pub path: PathBuf,
    /// Number of frames stitched into the composite
    pub frames: usize,
    /// Composite width in physical pixels
    pub width: u32,
    /// Composite height in physical pixels
    pub height: u32,
}

/// Orchestrates capture sessions over any [`CaptureTarget`]
pub struct Pipeline<S: PersistenceSink> {
    config: CaptureConfig,
    registry: SessionRegistry,
    sink: S,
}

impl<S: PersistenceSink> Pipeline<S> {
    pub fn new(config: CaptureConfig, sink: S) -> Self {
        Self {
            config,
            registry: SessionRegistry::new(),
            sink,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// The per-target session bookkeeping
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Capture a single region at the current scroll position and save it as
    /// a `screenshot-<timestamp>.png`.
    pub async fn capture_region<T: CaptureTarget + ?Sized>(
        &self,
        target: &mut T,
        region: Region,
    ) -> Result<Outcome> {
        region.validate()?;
        let _session = self.registry.begin(&target.target_id())?;

        let frame = capture_frame(target, &region)?;
        let layout = LayoutConfig {
            direction: Direction::Vertical,
            device_pixel_ratio: region.device_pixel_ratio,
            total_width: region.width,
            total_height: region.height,
            origin: ScrollOffset {
                x: frame.scroll_x,
                y: frame.scroll_y,
            },
        };
        let image = compose(&[frame], &layout)?;
        let (width, height) = image.dimensions();
        let path = self.sink.save(&image, CaptureKind::Screenshot)?;

        info!("single-shot capture written to {}", path.display());
        Ok(Outcome {
            path,
            frames: 1,
            width,
            height,
        })
    }

    /// Run a scrolling capture along `direction` and save the stitched result
    /// as a `scrollshot-<timestamp>.png`.
    ///
    /// `cancel` is observed cooperatively at the driver's suspension points;
    /// a cancelled or failed session restores the scroll position and writes
    /// no file.
    pub async fn capture_scrolling<T: CaptureTarget + ?Sized>(
        &self,
        target: &mut T,
        region: Region,
        direction: Direction,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Outcome> {
        let _session = self.registry.begin(&target.target_id())?;

        let mut driver = ScrollDriver::new(self.config.clone());
        let (frames, layout) = driver.run(target, region, direction, cancel).await?;

        let count = frames.len();
        let image = compose(&frames, &layout)?;
        let (width, height) = image.dimensions();
        let path = self.sink.save(&image, CaptureKind::Scrollshot)?;

        info!(
            "scroll capture of {} frame(s) written to {}",
            count,
            path.display()
        );
        Ok(Outcome {
            path,
            frames: count,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FileSink;
    use crate::synthetic::SyntheticPage;

    fn fast_config() -> CaptureConfig {
        CaptureConfig {
            pre_scroll_delay_ms: 1,
            settle: crate::SettlePolicy {
                poll_interval_ms: 1,
                grace_ms: 1,
                timeout_ms: 50,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_single_shot_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(fast_config(), FileSink::new(dir.path()));
        let mut page = SyntheticPage::builder()
            .document(1280.0, 2500.0)
            .viewport(1280, 720)
            .device_pixel_ratio(2.0)
            .build();

        let region = Region::new(100.0, 50.0, 300.0, 200.0, 2.0);
        let outcome = pipeline.capture_region(&mut page, region).await.unwrap();

        assert_eq!((outcome.width, outcome.height), (600, 400));
        assert_eq!(outcome.frames, 1);
        let name = outcome.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("screenshot-") && name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_registry_guards_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(fast_config(), FileSink::new(dir.path()));
        let mut page = SyntheticPage::builder().build();

        let _held = pipeline.registry().begin(&page.target_id()).unwrap();

        let region = Region::new(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!(matches!(
            pipeline.capture_region(&mut page, region).await,
            Err(crate::Error::SessionAlreadyActive(_))
        ));
        assert!(matches!(
            pipeline
                .capture_scrolling(&mut page, region, Direction::Vertical, None)
                .await,
            Err(crate::Error::SessionAlreadyActive(_))
        ));
        // Rejected requests write nothing
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
