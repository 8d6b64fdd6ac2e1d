//! Frame timing statistics.

use tracing::info;

/// Running FPS statistics, logged at shutdown.
#[derive(Debug, Clone)]
pub struct FrameStats {
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
    samples: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
            samples: 0,
        }
    }
}

impl FrameStats {
    /// Record one frame's delta time. Returns the instantaneous FPS.
    pub fn record(&mut self, dt: f32) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }
        let fps = 1.0 / f64::from(dt);
        self.min_fps = self.min_fps.min(fps);
        self.max_fps = self.max_fps.max(fps);
        self.fps_sum += fps;
        self.samples += 1;
        #[allow(clippy::cast_possible_truncation)]
        let fps = fps as f32;
        fps
    }

    pub const fn samples(&self) -> u64 {
        self.samples
    }

    pub fn min_fps(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.min_fps)
    }

    pub fn max_fps(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.max_fps)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.fps_sum / self.samples as f64)
    }

    /// Log the summary if any frame was recorded.
    pub fn log_summary(&self, total_frames: u64) {
        if let (Some(min), Some(max), Some(avg)) =
            (self.min_fps(), self.max_fps(), self.average_fps())
        {
            info!("FPS Statistics:");
            info!("  Min: {min:.1}");
            info!("  Max: {max:.1}");
            info!("  Avg: {avg:.1}");
            info!("  Total frames: {total_frames}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_no_summary() {
        let stats = FrameStats::default();
        assert_eq!(stats.samples(), 0);
        assert!(stats.average_fps().is_none());
        assert!(stats.min_fps().is_none());
    }

    #[test]
    fn tracks_min_max_and_average() {
        let mut stats = FrameStats::default();
        assert!((stats.record(0.5) - 2.0).abs() < 1e-6);
        stats.record(0.25);
        stats.record(0.0);

        assert_eq!(stats.samples(), 2);
        assert!((stats.min_fps().unwrap() - 2.0).abs() < 1e-9);
        assert!((stats.max_fps().unwrap() - 4.0).abs() < 1e-9);
        assert!((stats.average_fps().unwrap() - 3.0).abs() < 1e-9);
    }
}
