//! Scroll driver: the capture-and-scroll state machine.
//!
//! The driver advances the page scroll position in lockstep with frame
//! capture: capture at the current position, scroll by a computed step, wait
//! for the page to visually settle, capture again, and stop once the scroll
//! offset reaches the maximum the document allows. All waiting is bounded,
//! per-settle by [`crate::SettlePolicy::timeout_ms`] and overall by
//! [`crate::CaptureConfig::session_timeout_ms`], so an unresponsive page can
//! never hang a session. Cancellation is observed at every suspension point.

use crate::capturer::capture_frame;
use crate::session::CaptureSession;
use crate::{
    CaptureConfig, CaptureTarget, Direction, Error, FrameRecord, LayoutConfig, Region, Result,
    ScrollOffset,
};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};

// Sub-pixel slack for the reachability test near the document boundary;
// smooth scrolling may settle fractionally short of the exact maximum.
const SCROLL_EPSILON: f64 = 0.5;

/// States of the scroll driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Armed,
    Scrolling,
    Settling,
    Capturing,
    Finishing,
    Cancelled,
}

/// Drives one scroll-capture session over a [`CaptureTarget`]
pub struct ScrollDriver {
    config: CaptureConfig,
    state: DriverState,
}

impl ScrollDriver {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, next: DriverState) {
        debug!("driver {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run a full scroll-capture session and return the ordered frames plus
    /// the layout the compositor needs.
    ///
    /// On every exit path (success, cancellation, capture failure, timeout)
    /// the page's scroll position is restored to the offset recorded at
    /// session start (best effort; a failed restore is logged, not escalated).
    pub async fn run<T: CaptureTarget + ?Sized>(
        &mut self,
        target: &mut T,
        region: Region,
        direction: Direction,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<(Vec<FrameRecord>, LayoutConfig)> {
        self.config.validate()?;
        region.validate()?;

        self.transition(DriverState::Armed);
        let origin = target.scroll_offset()?;
        info!(
            "scroll capture armed: {:?}, region {}x{} at ({}, {}), origin ({}, {})",
            direction, region.width, region.height, region.x, region.y, origin.x, origin.y
        );

        let result = self.drive(target, &region, direction, origin, &cancel).await;

        // Restoration point recorded at start; attempted on every path
        if let Err(e) = target.scroll_to(origin.x, origin.y) {
            warn!("failed to restore scroll position: {}", e);
        }

        match result {
            Ok(session) => {
                self.transition(DriverState::Idle);
                let layout = LayoutConfig {
                    direction,
                    device_pixel_ratio: region.device_pixel_ratio,
                    total_width: region.width,
                    total_height: region.height,
                    origin,
                };
                info!("scroll capture finished with {} frame(s)", session.frame_count());
                Ok((session.into_frames(), layout))
            }
            Err(e) => {
                // Partial frames are discarded with the session
                self.transition(DriverState::Cancelled);
                warn!("scroll capture aborted: {}", e);
                Err(e)
            }
        }
    }

    async fn drive<T: CaptureTarget + ?Sized>(
        &mut self,
        target: &mut T,
        region: &Region,
        direction: Direction,
        origin: ScrollOffset,
        cancel: &Option<Arc<AtomicBool>>,
    ) -> Result<CaptureSession> {
        let mut session = CaptureSession::new(direction, self.config.overlap, origin);

        let step = scroll_step(region, direction, self.config.overlap);
        if step < 1.0 {
            return Err(Error::InvalidRegion(format!(
                "scroll step of {} leaves no forward progress (overlap {})",
                step, self.config.overlap
            )));
        }

        // The selection rectangle stays fixed in the viewport while the page
        // scrolls underneath it
        let local_x = region.x - origin.x;
        let local_y = region.y - origin.y;

        loop {
            self.transition(DriverState::Capturing);
            let scroll = target.scroll_offset()?;
            let area = Region::new(
                local_x + scroll.x,
                local_y + scroll.y,
                region.width,
                region.height,
                region.device_pixel_ratio,
            );
            let frame = capture_frame(target, &area)?;
            session.push(frame);

            // Termination is a reachability test: animated scrolling can
            // overshoot or undershoot near the document boundary
            let viewport = target.viewport()?;
            let extent = target.document_extent()?;
            let max_scroll = match direction {
                Direction::Vertical => extent.height - viewport.height as f64,
                Direction::Horizontal => extent.width - viewport.width as f64,
            }
            .max(0.0);
            let current = scroll.along(direction);
            if current + SCROLL_EPSILON >= max_scroll {
                debug!(
                    "no scroll room left ({} >= {}), finishing",
                    current, max_scroll
                );
                break;
            }

            self.checkpoint(&session, cancel)?;

            // Let any previous animations finish before commanding the scroll
            sleep(Duration::from_millis(self.config.pre_scroll_delay_ms)).await;
            self.checkpoint(&session, cancel)?;

            self.transition(DriverState::Scrolling);
            match direction {
                Direction::Vertical => target.scroll_by(0.0, step)?,
                Direction::Horizontal => target.scroll_by(step, 0.0)?,
            }

            self.transition(DriverState::Settling);
            self.wait_for_settle(target, &session, cancel).await?;

            // Monotonicity guard: scrolling never reverses within a session,
            // and a page that refuses to move must not yield duplicate frames
            let settled = target.scroll_offset()?.along(direction);
            if settled <= current + SCROLL_EPSILON {
                warn!(
                    "scroll did not advance past {} (settled at {}), finishing",
                    current, settled
                );
                break;
            }
        }

        self.transition(DriverState::Finishing);
        Ok(session)
    }

    /// Bounded settle wait: poll the scroll offset until it is stable across
    /// two consecutive polls (the animation-completion signal), capped by the
    /// settle timeout, then hold a fixed grace period for dynamic content.
    async fn wait_for_settle<T: CaptureTarget + ?Sized>(
        &mut self,
        target: &T,
        session: &CaptureSession,
        cancel: &Option<Arc<AtomicBool>>,
    ) -> Result<()> {
        let policy = self.config.settle;
        let started = Instant::now();
        let mut last = target.scroll_offset()?;

        while started.elapsed() < Duration::from_millis(policy.timeout_ms) {
            self.checkpoint(session, cancel)?;
            sleep(Duration::from_millis(policy.poll_interval_ms)).await;
            let current = target.scroll_offset()?;
            if (current.x - last.x).abs() < SCROLL_EPSILON
                && (current.y - last.y).abs() < SCROLL_EPSILON
            {
                break;
            }
            last = current;
        }

        sleep(Duration::from_millis(policy.grace_ms)).await;
        self.checkpoint(session, cancel)
    }

    /// Observe cancellation and the session deadline. Called at every
    /// suspension point; cancellation is cooperative, never pre-emptive.
    fn checkpoint(
        &mut self,
        session: &CaptureSession,
        cancel: &Option<Arc<AtomicBool>>,
    ) -> Result<()> {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
        }
        if session.deadline_exceeded(self.config.session_timeout_ms) {
            return Err(Error::Timeout(self.config.session_timeout_ms));
        }
        Ok(())
    }
}

/// Scroll advance per iteration along the capture axis
pub(crate) fn scroll_step(region: &Region, direction: Direction, overlap: f64) -> f64 {
    (region.extent_along(direction) * (1.0 - overlap)).floor()
}
