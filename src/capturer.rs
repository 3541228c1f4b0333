//! Frame capturer: rasterizes the visible viewport and crops one frame.
//!
//! Only the visible viewport can be rasterized by the host primitive, so the
//! requested area is converted to viewport-local coordinates at the current
//! scroll position and clipped to the viewport before cropping. The output
//! buffer is always exactly `(width x dpr, height x dpr)` physical pixels;
//! clipped source pixels leave the corresponding output pixels transparent.

use crate::{phys, CaptureTarget, Error, FrameRecord, Region, Result};
use image::{imageops, RgbaImage};
use log::{debug, warn};

/// Capture one frame of `area` (page coordinates) at the target's current
/// scroll position.
///
/// Fails with [`Error::CaptureUnavailable`] when the host rasterization
/// primitive fails; callers must abort the session rather than skip the
/// frame, since a missing frame would desynchronize the stitched composite.
pub fn capture_frame<T: CaptureTarget + ?Sized>(
    target: &mut T,
    area: &Region,
) -> Result<FrameRecord> {
    area.validate()?;

    let scroll = target.scroll_offset()?;
    let viewport = target.viewport()?;
    let dpr = area.device_pixel_ratio;

    // Viewport-local position of the requested page-coordinate area
    let local_x = area.x - scroll.x;
    let local_y = area.y - scroll.y;

    // Clip to the viewport
    let clip_x = local_x.max(0.0);
    let clip_y = local_y.max(0.0);
    let clip_right = (local_x + area.width).min(viewport.width as f64);
    let clip_bottom = (local_y + area.height).min(viewport.height as f64);

    if clip_right <= clip_x || clip_bottom <= clip_y {
        return Err(Error::InvalidRegion(format!(
            "area ({}, {}) {}x{} lies outside the {}x{} viewport",
            local_x, local_y, area.width, area.height, viewport.width, viewport.height
        )));
    }
    if clip_x > local_x || clip_y > local_y || clip_right < local_x + area.width
        || clip_bottom < local_y + area.height
    {
        warn!(
            "capture area clipped to viewport: ({}, {}) {}x{}",
            clip_x,
            clip_y,
            clip_right - clip_x,
            clip_bottom - clip_y
        );
    }

    let raster = target.rasterize()?;

    let out_width = area.physical_width();
    let out_height = area.physical_height();
    let mut out = RgbaImage::new(out_width, out_height);

    // Source crop within the raster and its destination inside the output
    // buffer, both in physical pixels
    let src_x = phys(clip_x, dpr).min(raster.width());
    let src_y = phys(clip_y, dpr).min(raster.height());
    let dst_x = phys(clip_x - local_x, dpr);
    let dst_y = phys(clip_y - local_y, dpr);
    let crop_w = phys(clip_right - clip_x, dpr)
        .min(raster.width() - src_x)
        .min(out_width.saturating_sub(dst_x));
    let crop_h = phys(clip_bottom - clip_y, dpr)
        .min(raster.height() - src_y)
        .min(out_height.saturating_sub(dst_y));

    let view = imageops::crop_imm(&raster, src_x, src_y, crop_w, crop_h).to_image();
    imageops::replace(&mut out, &view, dst_x as i64, dst_y as i64);

    debug!(
        "captured frame {}x{} at scroll ({}, {})",
        out_width, out_height, scroll.x, scroll.y
    );

    Ok(FrameRecord {
        raw: out,
        area: *area,
        scroll_x: scroll.x,
        scroll_y: scroll.y,
    })
}
