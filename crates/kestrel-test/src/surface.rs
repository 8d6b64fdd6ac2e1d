//! Scripted window surface.

use std::collections::VecDeque;
use std::sync::Arc;

use kestrel_frame::{Extent, SurfaceProvider};
use parking_lot::Mutex;

#[derive(Debug)]
pub(crate) struct SurfaceState {
    pub(crate) extent: Extent,
    /// Sizes the window takes, one per swapchain creation, right after the
    /// swapchain was built.
    resizes_during_create: VecDeque<Extent>,
    /// Size the window takes when the host blocks on events.
    restore_on_wait: Option<Extent>,
    close_after: Option<u64>,
    polls: u64,
    waits: u64,
}

impl SurfaceState {
    pub(crate) fn swapchain_created(&mut self) {
        if let Some(extent) = self.resizes_during_create.pop_front() {
            self.extent = extent;
        }
    }
}

/// Window stand-in whose size and lifetime are scripted by the test.
///
/// Clones share state, so a test can keep one handle while the driver loop
/// borrows another.
#[derive(Debug, Clone)]
pub struct ScriptedSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl ScriptedSurface {
    pub fn new(extent: Extent) -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                extent,
                resizes_during_create: VecDeque::new(),
                restore_on_wait: None,
                close_after: None,
                polls: 0,
                waits: 0,
            })),
        }
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<SurfaceState>> {
        Arc::clone(&self.state)
    }

    /// Resize the window now.
    pub fn resize(&self, extent: Extent) {
        self.state.lock().extent = extent;
    }

    /// Resize the window right after the next swapchain is created, as if
    /// the user kept dragging while the rebuild ran. Queued calls apply to
    /// successive creations.
    pub fn resize_during_create(&self, extent: Extent) {
        self.state.lock().resizes_during_create.push_back(extent);
    }

    /// Restore the window to `extent` the next time the host waits for
    /// events.
    pub fn restore_on_wait(&self, extent: Extent) {
        self.state.lock().restore_on_wait = Some(extent);
    }

    /// Report `should_close` once the host has polled or waited `events`
    /// times.
    pub fn close_after(&self, events: u64) {
        self.state.lock().close_after = Some(events);
    }

    pub fn polls(&self) -> u64 {
        self.state.lock().polls
    }

    pub fn waits(&self) -> u64 {
        self.state.lock().waits
    }
}

impl SurfaceProvider for ScriptedSurface {
    fn framebuffer_extent(&self) -> Extent {
        self.state.lock().extent
    }

    fn poll_events(&mut self) {
        self.state.lock().polls += 1;
    }

    fn wait_events(&mut self) {
        let mut state = self.state.lock();
        state.waits += 1;
        if let Some(extent) = state.restore_on_wait.take() {
            state.extent = extent;
        }
    }

    fn should_close(&self) -> bool {
        let state = self.state.lock();
        state
            .close_after
            .is_some_and(|limit| state.polls + state.waits >= limit)
    }
}
