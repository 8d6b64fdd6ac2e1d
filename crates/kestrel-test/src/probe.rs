//! Frame recorder that remembers what it was asked to record.

use kestrel_frame::{FrameError, FrameRecorder, FrameTarget, Result};

use crate::sim::{SimCommand, SimGpu, SimSwapchain};

/// One recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedFrame {
    pub frame_number: u64,
    pub slot_index: usize,
    pub image_index: u32,
    pub command: usize,
}

#[derive(Debug, Default)]
pub struct RecordingProbe {
    pub frames: Vec<RecordedFrame>,
    /// Fail when asked to record this frame number.
    pub fail_on: Option<u64>,
}

impl RecordingProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe that fails recording of `frame_number`.
    pub fn failing_on(frame_number: u64) -> Self {
        Self {
            frames: Vec::new(),
            fail_on: Some(frame_number),
        }
    }

    /// Slot indices in recording order.
    pub fn slots(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.slot_index).collect()
    }

    /// Image indices in recording order.
    pub fn images(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.image_index).collect()
    }
}

impl FrameRecorder<SimGpu> for RecordingProbe {
    fn record(
        &mut self,
        context: &mut SimCommand,
        target: FrameTarget<'_, SimSwapchain>,
    ) -> Result<()> {
        if self.fail_on == Some(target.frame_number) {
            return Err(FrameError::Backend(format!(
                "Recording of frame {} failed",
                target.frame_number
            )));
        }

        context.recordings += 1;
        self.frames.push(RecordedFrame {
            frame_number: target.frame_number,
            slot_index: target.slot_index,
            image_index: target.image_index,
            command: context.id(),
        });
        Ok(())
    }
}
