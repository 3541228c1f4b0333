//! A deterministic in-memory capture backend.
//!
//! `SyntheticPage` implements [`CaptureTarget`] without a browser: it models
//! a scrollable document whose pixels encode their own page coordinates, so
//! tests can verify exactly which part of the page (and which capture) every
//! composite pixel came from. Scroll animation is simulated in poll steps:
//! each [`CaptureTarget::scroll_offset`] read advances a pending scroll by
//! one step, which is what the driver's settle polling observes on a real
//! page.

use crate::{phys, CaptureTarget, Error, Extent, Result, ScrollOffset, ViewportSize};
use image::{Rgba, RgbaImage};
use std::cell::{Cell, RefCell};

struct PendingScroll {
    from: ScrollOffset,
    target: ScrollOffset,
    remaining: u32,
    total: u32,
}

/// In-memory scrollable page
pub struct SyntheticPage {
    id: String,
    document: Extent,
    viewport: ViewportSize,
    dpr: f64,
    scroll: Cell<ScrollOffset>,
    pending: RefCell<Option<PendingScroll>>,
    animate_polls: u32,
    blocked: bool,
    fail_rasterize_at: Option<usize>,
    rasterize_calls: Cell<usize>,
}

/// Builder for [`SyntheticPage`]
pub struct SyntheticPageBuilder {
    id: String,
    document: Extent,
    viewport: ViewportSize,
    dpr: f64,
    animate_polls: u32,
    blocked: bool,
    fail_rasterize_at: Option<usize>,
}

impl SyntheticPage {
    pub fn builder() -> SyntheticPageBuilder {
        SyntheticPageBuilder {
            id: "synthetic".to_string(),
            document: Extent {
                width: 1280.0,
                height: 2500.0,
            },
            viewport: ViewportSize::default(),
            dpr: 1.0,
            animate_polls: 0,
            blocked: false,
            fail_rasterize_at: None,
        }
    }

    /// Number of rasterize calls made so far
    pub fn rasterize_count(&self) -> usize {
        self.rasterize_calls.get()
    }

    fn max_scroll(&self) -> ScrollOffset {
        ScrollOffset {
            x: (self.document.width - self.viewport.width as f64).max(0.0),
            y: (self.document.height - self.viewport.height as f64).max(0.0),
        }
    }

    fn clamp(&self, x: f64, y: f64) -> ScrollOffset {
        let max = self.max_scroll();
        ScrollOffset {
            x: x.clamp(0.0, max.x),
            y: y.clamp(0.0, max.y),
        }
    }

    fn begin_scroll(&mut self, target: ScrollOffset) {
        if self.blocked {
            return;
        }
        if self.animate_polls == 0 {
            self.scroll.set(target);
            return;
        }
        *self.pending.borrow_mut() = Some(PendingScroll {
            from: self.scroll.get(),
            target,
            remaining: self.animate_polls,
            total: self.animate_polls,
        });
    }

    /// The pixel the synthetic document holds at a page coordinate: the red
    /// channel stamps the rasterize call that produced it, green/blue encode
    /// the page y, alpha encodes the page x modulo 256.
    fn pixel_at(&self, page_x: f64, page_y: f64, call: usize) -> Rgba<u8> {
        let x = page_x.max(0.0) as u32;
        let y = page_y.max(0.0) as u32;
        Rgba([
            call.min(255) as u8,
            (y % 256) as u8,
            (y / 256).min(255) as u8,
            (x % 256) as u8,
        ])
    }
}

impl SyntheticPageBuilder {
    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Scrollable document extent in logical pixels
    pub fn document(mut self, width: f64, height: f64) -> Self {
        self.document = Extent { width, height };
        self
    }

    /// Viewport size in logical pixels
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = ViewportSize { width, height };
        self
    }

    pub fn device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.dpr = dpr;
        self
    }

    /// Simulate smooth scrolling: a commanded scroll completes only after
    /// this many scroll-offset polls (0 = instant)
    pub fn animate_polls(mut self, polls: u32) -> Self {
        self.animate_polls = polls;
        self
    }

    /// Ignore all scroll commands, modeling a page that blocks scrolling
    pub fn block_scrolling(mut self) -> Self {
        self.blocked = true;
        self
    }

    /// Fail the n-th rasterize call (1-based) with `CaptureUnavailable`
    pub fn fail_rasterize_at(mut self, call: usize) -> Self {
        self.fail_rasterize_at = Some(call);
        self
    }

    pub fn build(self) -> SyntheticPage {
        SyntheticPage {
            id: self.id,
            document: self.document,
            viewport: self.viewport,
            dpr: self.dpr,
            scroll: Cell::new(ScrollOffset::default()),
            pending: RefCell::new(None),
            animate_polls: self.animate_polls,
            blocked: self.blocked,
            fail_rasterize_at: self.fail_rasterize_at,
            rasterize_calls: Cell::new(0),
        }
    }
}

impl CaptureTarget for SyntheticPage {
    fn target_id(&self) -> String {
        self.id.clone()
    }

    fn viewport(&self) -> Result<ViewportSize> {
        Ok(self.viewport)
    }

    fn document_extent(&self) -> Result<Extent> {
        Ok(self.document)
    }

    fn device_pixel_ratio(&self) -> Result<f64> {
        Ok(self.dpr)
    }

    fn scroll_offset(&self) -> Result<ScrollOffset> {
        let mut pending = self.pending.borrow_mut();
        if let Some(p) = pending.as_mut() {
            p.remaining -= 1;
            if p.remaining == 0 {
                self.scroll.set(p.target);
                *pending = None;
            } else {
                let t = 1.0 - p.remaining as f64 / p.total as f64;
                self.scroll.set(ScrollOffset {
                    x: p.from.x + (p.target.x - p.from.x) * t,
                    y: p.from.y + (p.target.y - p.from.y) * t,
                });
            }
        }
        Ok(self.scroll.get())
    }

    fn scroll_by(&mut self, dx: f64, dy: f64) -> Result<()> {
        let cur = self.scroll.get();
        let target = self.clamp(cur.x + dx, cur.y + dy);
        self.begin_scroll(target);
        Ok(())
    }

    fn scroll_to(&mut self, x: f64, y: f64) -> Result<()> {
        // Restoration jumps are not animated
        let target = self.clamp(x, y);
        *self.pending.borrow_mut() = None;
        self.scroll.set(target);
        Ok(())
    }

    fn rasterize(&mut self) -> Result<RgbaImage> {
        let call = self.rasterize_calls.get() + 1;
        self.rasterize_calls.set(call);

        if self.fail_rasterize_at == Some(call) {
            return Err(Error::CaptureUnavailable(format!(
                "synthetic rasterize failure scripted at call {}",
                call
            )));
        }

        let scroll = self.scroll.get();
        let width = phys(self.viewport.width as f64, self.dpr);
        let height = phys(self.viewport.height as f64, self.dpr);

        let mut raster = RgbaImage::new(width, height);
        for py in 0..height {
            for px in 0..width {
                let page_x = scroll.x + px as f64 / self.dpr;
                let page_y = scroll.y + py as f64 / self.dpr;
                raster.put_pixel(px, py, self.pixel_at(page_x, page_y, call));
            }
        }
        Ok(raster)
    }
}

/// Decode the page y coordinate a synthetic pixel encodes
pub fn decode_page_y(pixel: &Rgba<u8>) -> u32 {
    pixel[1] as u32 + pixel[2] as u32 * 256
}

/// The rasterize call that produced a synthetic pixel
pub fn decode_call(pixel: &Rgba<u8>) -> u8 {
    pixel[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_clamps_to_document() {
        let mut page = SyntheticPage::builder()
            .document(1000.0, 2500.0)
            .viewport(1000, 1000)
            .build();
        page.scroll_by(0.0, 99_999.0).unwrap();
        assert_eq!(page.scroll_offset().unwrap().y, 1500.0);
        page.scroll_to(0.0, -50.0).unwrap();
        assert_eq!(page.scroll_offset().unwrap().y, 0.0);
    }

    #[test]
    fn test_animated_scroll_settles_after_polls() {
        let mut page = SyntheticPage::builder()
            .document(1000.0, 3000.0)
            .viewport(1000, 1000)
            .animate_polls(3)
            .build();
        page.scroll_by(0.0, 300.0).unwrap();

        let mid = page.scroll_offset().unwrap().y;
        assert!(mid > 0.0 && mid < 300.0);
        page.scroll_offset().unwrap();
        assert_eq!(page.scroll_offset().unwrap().y, 300.0);
        // Stable afterwards
        assert_eq!(page.scroll_offset().unwrap().y, 300.0);
    }

    #[test]
    fn test_rasterize_encodes_page_coordinates() {
        let mut page = SyntheticPage::builder()
            .document(1000.0, 2000.0)
            .viewport(1000, 500)
            .build();
        page.scroll_to(0.0, 700.0).unwrap();

        let raster = page.rasterize().unwrap();
        assert_eq!(raster.dimensions(), (1000, 500));
        assert_eq!(decode_page_y(raster.get_pixel(0, 0)), 700);
        assert_eq!(decode_page_y(raster.get_pixel(10, 123)), 823);
        assert_eq!(decode_call(raster.get_pixel(0, 0)), 1);
    }

    #[test]
    fn test_rasterize_respects_dpr() {
        let mut page = SyntheticPage::builder()
            .document(400.0, 400.0)
            .viewport(400, 300)
            .device_pixel_ratio(2.0)
            .build();
        let raster = page.rasterize().unwrap();
        assert_eq!(raster.dimensions(), (800, 600));
        // Two device pixels per logical pixel
        assert_eq!(decode_page_y(raster.get_pixel(0, 2)), 1);
    }

    #[test]
    fn test_scripted_rasterize_failure() {
        let mut page = SyntheticPage::builder().fail_rasterize_at(2).build();
        assert!(page.rasterize().is_ok());
        assert!(matches!(
            page.rasterize(),
            Err(Error::CaptureUnavailable(_))
        ));
        assert!(page.rasterize().is_ok());
    }
}
