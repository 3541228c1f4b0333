//! Capture sessions and the one-session-per-target registry.
//!
//! A [`CaptureSession`] is an explicit value passed through the pipeline
//! (append-only frame list plus the scroll origin to restore), and the
//! [`SessionRegistry`] maps target identifiers to active sessions so that
//! starting a second capture on the same page is rejected up front instead
//! of silently queuing.

use crate::{Direction, Error, FrameRecord, Result, ScrollOffset};
use log::debug;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State accumulated over one capture session
#[derive(Debug)]
pub struct CaptureSession {
    frames: Vec<FrameRecord>,
    pub direction: Direction,
    pub overlap: f64,
    /// Scroll offset at session start; the restoration point
    pub origin: ScrollOffset,
    started: Instant,
}

impl CaptureSession {
    pub fn new(direction: Direction, overlap: f64, origin: ScrollOffset) -> Self {
        Self {
            frames: Vec::new(),
            direction,
            overlap,
            origin,
            started: Instant::now(),
        }
    }

    /// Append a frame. The frame list only ever grows, in capture order.
    pub fn push(&mut self, frame: FrameRecord) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Consume the session, yielding the ordered frame list
    pub fn into_frames(self) -> Vec<FrameRecord> {
        self.frames
    }

    /// Wall-clock time since the session started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the absolute session budget has been exhausted
    pub fn deadline_exceeded(&self, timeout_ms: u64) -> bool {
        self.elapsed() >= Duration::from_millis(timeout_ms)
    }
}

/// Tracks which capture targets currently have an active session
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `target_id` for a new session. Fails with
    /// [`Error::SessionAlreadyActive`] when one is already running; the
    /// returned guard releases the reservation when dropped, on every exit
    /// path.
    pub fn begin(&self, target_id: &str) -> Result<SessionGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(target_id.to_string()) {
            return Err(Error::SessionAlreadyActive(target_id.to_string()));
        }
        debug!("session registered for target '{}'", target_id);
        Ok(SessionGuard {
            registry: self,
            target_id: target_id.to_string(),
        })
    }

    /// Whether a session is currently active for `target_id`
    pub fn is_active(&self, target_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(target_id)
    }

    fn release(&self, target_id: &str) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(target_id);
        debug!("session released for target '{}'", target_id);
    }
}

/// RAII reservation of a capture target
pub struct SessionGuard<'a> {
    registry: &'a SessionRegistry,
    target_id: String,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.target_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_rejects_second_session() {
        let registry = SessionRegistry::new();
        let guard = registry.begin("tab-1").unwrap();
        assert!(registry.is_active("tab-1"));

        match registry.begin("tab-1") {
            Err(Error::SessionAlreadyActive(id)) => assert_eq!(id, "tab-1"),
            other => panic!("expected SessionAlreadyActive, got {:?}", other.err()),
        }

        // A different target is unaffected
        let other = registry.begin("tab-2").unwrap();
        drop(other);
        drop(guard);
        assert!(!registry.is_active("tab-1"));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = SessionRegistry::new();
        {
            let _guard = registry.begin("tab-1").unwrap();
        }
        assert!(registry.begin("tab-1").is_ok());
    }

    #[test]
    fn test_session_is_append_only() {
        let session = CaptureSession::new(Direction::Vertical, 0.2, ScrollOffset::default());
        assert_eq!(session.frame_count(), 0);
        assert!(!session.deadline_exceeded(60_000));
    }
}
