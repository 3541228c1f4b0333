//! Compositor: stitches ordered frames into one output canvas.
//!
//! The canvas accumulates along the scroll axis: each frame lands at its
//! scroll offset relative to the session origin, scaled by the device pixel
//! ratio, while the stationary axis spans the configured region extent.
//! Frames are drawn in capture order with plain overwrite semantics; the
//! overlap between consecutive frames exists to mask settle-timing jitter,
//! and the later (more scrolled) frame represents the page's current state,
//! so it wins. No blending or feathering.

use crate::{phys, Direction, Error, FrameRecord, LayoutConfig, Result};
use image::{imageops, RgbaImage};
use log::debug;

/// Stitch `frames` into a single image described by `layout`.
///
/// Frames must already be in capture order; the compositor relies on the
/// driver's ordering guarantee and never re-sorts.
pub fn compose(frames: &[FrameRecord], layout: &LayoutConfig) -> Result<RgbaImage> {
    if frames.is_empty() {
        return Err(Error::EmptyFrameSet);
    }

    let dpr = layout.device_pixel_ratio;
    let origin = layout.origin.along(layout.direction);

    // Canvas extent: along the scroll axis, the furthest frame edge observed;
    // across it, the configured region extent.
    let along_extent = frames
        .iter()
        .map(|f| {
            let rel = (f.scroll_along(layout.direction) - origin).max(0.0);
            phys(rel + f.area.extent_along(layout.direction), dpr)
        })
        .max()
        .unwrap_or(0);

    let (out_width, out_height) = match layout.direction {
        Direction::Vertical => (phys(layout.total_width, dpr), along_extent),
        Direction::Horizontal => (along_extent, phys(layout.total_height, dpr)),
    };

    if out_width == 0 || out_height == 0 {
        return Err(Error::InvalidRegion(format!(
            "composite canvas would be {}x{}",
            out_width, out_height
        )));
    }

    let mut canvas = RgbaImage::new(out_width, out_height);

    for frame in frames {
        let rel = (frame.scroll_along(layout.direction) - origin).max(0.0);
        let (dst_x, dst_y) = match layout.direction {
            Direction::Vertical => (0i64, phys(rel, dpr) as i64),
            Direction::Horizontal => (phys(rel, dpr) as i64, 0i64),
        };
        imageops::replace(&mut canvas, &frame.raw, dst_x, dst_y);
    }

    debug!(
        "composed {} frame(s) into {}x{} canvas",
        frames.len(),
        out_width,
        out_height
    );

    Ok(canvas)
}
