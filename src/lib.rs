//! Scrollshot capture engine
//!
//! A scrolling-screenshot pipeline: captures a selected rectangular region of
//! a web page, optionally across multiple scroll positions, and stitches the
//! captured frames into one composite raster image saved to disk.
//!
//! # Features
//!
//! - **CDP Backend** (`cdp` feature): drives a real page via headless Chrome
//! - **Synthetic Backend**: deterministic in-memory page, no browser required
//! - **Modular Design**: adapter trait for swappable capture backends
//!
//! # Example
//!
//! ```
//! use scrollshot::{CaptureConfig, Direction, FileSink, Pipeline, Region, SyntheticPage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut page = SyntheticPage::builder()
//!     .document(1280.0, 1600.0)
//!     .viewport(1280, 1000)
//!     .build();
//!
//! let sink = FileSink::new(std::env::temp_dir());
//! let pipeline = Pipeline::new(CaptureConfig::default(), sink);
//!
//! let region = Region::new(100.0, 50.0, 300.0, 200.0, 1.0);
//! let rt = tokio::runtime::Runtime::new()?;
//! let outcome = rt.block_on(pipeline.capture_scrolling(
//!     &mut page,
//!     region,
//!     Direction::Vertical,
//!     None,
//! ))?;
//! println!("Wrote {} ({} frames)", outcome.path.display(), outcome.frames);
//! # std::fs::remove_file(outcome.path).ok();
//! # Ok(())
//! # }
//! ```

use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod capturer;
pub mod compositor;
pub mod driver;
pub mod pipeline;
pub mod session;
pub mod sink;

// Synthetic in-memory backend (no browser required)
pub mod synthetic;

// CDP backend (feature-gated)
#[cfg(feature = "cdp")]
pub mod cdp;

pub use pipeline::{Outcome, Pipeline};
pub use session::{CaptureSession, SessionRegistry};
pub use sink::{CaptureKind, FileSink, PersistenceSink};
pub use synthetic::SyntheticPage;

/// Configuration for a capture pipeline
///
/// Defaults mirror the behavior of interactive scrolling-screenshot tools:
/// 20% frame overlap, a short pre-scroll delay so prior animations can
/// finish, and bounded settle/session waits so an unresponsive page can
/// never hang a session.
///
/// # Examples
///
/// ```
/// let cfg = scrollshot::CaptureConfig::default();
/// assert_eq!(cfg.overlap, 0.2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Fraction of each frame's extent that intentionally repeats in the
    /// next frame, masking settle-timing jitter. Must be in `[0, 1)`.
    pub overlap: f64,
    /// Delay before each scroll command, in milliseconds
    pub pre_scroll_delay_ms: u64,
    /// Policy for deciding when a commanded scroll has visually settled
    pub settle: SettlePolicy,
    /// Absolute wall-clock cap on a whole scroll session, in milliseconds
    pub session_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            overlap: 0.2,
            pre_scroll_delay_ms: 100,
            settle: SettlePolicy::default(),
            session_timeout_ms: 60_000,
        }
    }
}

impl CaptureConfig {
    /// Validate configuration invariants
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(Error::InvalidRegion(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        Ok(())
    }
}

/// Policy for deciding when a commanded scroll has visually settled.
///
/// The scroll offset is polled every `poll_interval_ms`; once it is unchanged
/// between two consecutive polls the motion is considered finished, and a
/// fixed `grace_ms` period follows for dynamic content. The whole wait is
/// capped by `timeout_ms` so a page that keeps moving cannot stall a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettlePolicy {
    /// Polling cadence for scroll-offset stability, in milliseconds
    pub poll_interval_ms: u64,
    /// Grace period for dynamic content after motion stops, in milliseconds
    pub grace_ms: u64,
    /// Cap on the whole settle wait, in milliseconds
    pub timeout_ms: u64,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
            grace_ms: 200,
            timeout_ms: 1000,
        }
    }
}

/// Scroll direction of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Vertical,
    Horizontal,
}

/// Viewport dimensions in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Document extent in logical pixels (scrollable width/height)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

/// A scroll position in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    /// Component along the scrolling axis of `direction`
    pub fn along(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Vertical => self.y,
            Direction::Horizontal => self.x,
        }
    }
}

/// A selection region in page coordinates (scroll-adjusted), together with
/// the device pixel ratio in effect when it was selected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Multiplier from logical pixels to physical device pixels (> 0)
    pub device_pixel_ratio: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Check the region invariants: positive extents and a positive dpr
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::InvalidRegion(format!(
                "extents must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.device_pixel_ratio <= 0.0 {
            return Err(Error::InvalidRegion(format!(
                "device pixel ratio must be positive, got {}",
                self.device_pixel_ratio
            )));
        }
        Ok(())
    }

    /// Extent along the scrolling axis of `direction`
    pub fn extent_along(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Vertical => self.height,
            Direction::Horizontal => self.width,
        }
    }

    /// Width in physical device pixels
    pub fn physical_width(&self) -> u32 {
        phys(self.width, self.device_pixel_ratio)
    }

    /// Height in physical device pixels
    pub fn physical_height(&self) -> u32 {
        phys(self.height, self.device_pixel_ratio)
    }
}

/// Convert a logical length to physical device pixels
pub(crate) fn phys(logical: f64, dpr: f64) -> u32 {
    (logical * dpr).round().max(0.0) as u32
}

/// One captured, cropped raster corresponding to one viewport state during a
/// session. Created by the frame capturer, owned by the driver until handed
/// to the compositor; immutable once created.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Cropped raster, exactly `(width x dpr, height x dpr)` physical pixels
    pub raw: RgbaImage,
    /// Captured area in page coordinates
    pub area: Region,
    /// Horizontal scroll position of the page at capture time
    pub scroll_x: f64,
    /// Vertical scroll position of the page at capture time
    pub scroll_y: f64,
}

impl FrameRecord {
    /// Scroll position along the axis of `direction` at capture time
    pub fn scroll_along(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Vertical => self.scroll_y,
            Direction::Horizontal => self.scroll_x,
        }
    }
}

/// Describes the compositor's output canvas, derived once a capture finishes
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub device_pixel_ratio: f64,
    /// Cross-axis/base width in logical pixels
    pub total_width: f64,
    /// Cross-axis/base height in logical pixels
    pub total_height: f64,
    /// Scroll offset recorded at session start; frame placement is relative
    /// to this origin
    pub origin: ScrollOffset,
}

/// Core trait for capture backends
///
/// This is the seam between the pipeline and the host platform: a backend
/// exposes page metrics, programmatic scrolling, and the host rasterization
/// primitive that turns the visible viewport into pixels. Backends are
/// synchronous; the pipeline layers cooperative waiting on top.
pub trait CaptureTarget {
    /// Stable identifier of the capture target (page/tab). At most one
    /// session may be active per target at a time.
    fn target_id(&self) -> String;

    /// Viewport dimensions in logical pixels
    fn viewport(&self) -> Result<ViewportSize>;

    /// Scrollable document extent in logical pixels
    fn document_extent(&self) -> Result<Extent>;

    /// Device pixel ratio currently in effect
    fn device_pixel_ratio(&self) -> Result<f64>;

    /// Current scroll position
    fn scroll_offset(&self) -> Result<ScrollOffset>;

    /// Scroll by a relative amount; the backend may animate and may clamp to
    /// the document bounds
    fn scroll_by(&mut self, dx: f64, dy: f64) -> Result<()>;

    /// Scroll to an absolute position, clamped to the document bounds
    fn scroll_to(&mut self, x: f64, y: f64) -> Result<()>;

    /// Rasterize the visible viewport into an image buffer at physical
    /// device resolution
    fn rasterize(&mut self) -> Result<RgbaImage>;
}
