use std::time::Duration;

use opencv::{prelude::*, videoio};

use super::{mat_to_rgb, FrameRead, FrameSource};
use crate::shared::constants;
use crate::shared::error::{PipelineError, PipelineResult};

/// Container-backed source. CAP_ANY lets opencv pick the platform backend
/// (AVFoundation / Media Foundation / GStreamer-V4L2).
pub struct FileSource {
    capture: videoio::VideoCapture,
    fps: f64,
    duration_ms: Option<f64>,
    position_ms: f64,
    open: bool,
}

impl FileSource {
    pub fn open(path: &str) -> PipelineResult<Self> {
        let mut capture = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)?;
        let _ = capture.set(
            videoio::CAP_PROP_HW_ACCELERATION,
            videoio::VIDEO_ACCELERATION_ANY as f64,
        );

        if !capture.is_opened()? {
            return Err(PipelineError::Acquisition(format!(
                "failed to open video file: {}",
                path
            )));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        let duration_ms = if fps > 0.0 && frame_count > 0.0 {
            Some(frame_count / fps * 1000.0)
        } else {
            None
        };

        crate::utils::logger::debug(&format!(
            "opened {} (fps {:.2}, duration {:?} ms)",
            path, fps, duration_ms
        ));

        Ok(Self {
            capture,
            fps,
            duration_ms,
            position_ms: 0.0,
            open: true,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameSource for FileSource {
    fn read_next(&mut self) -> PipelineResult<FrameRead> {
        if !self.open {
            return Err(PipelineError::Acquisition("source is closed".to_string()));
        }

        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(FrameRead::EndOfStream);
        }
        self.position_ms = self.capture.get(videoio::CAP_PROP_POS_MSEC)?;
        Ok(FrameRead::Frame(mat_to_rgb(&frame)?))
    }

    fn seek(&mut self, delta_ms: f64) -> PipelineResult<()> {
        self.seek_to(self.position_ms + delta_ms)
    }

    fn seek_to(&mut self, position_ms: f64) -> PipelineResult<()> {
        if !self.open {
            return Err(PipelineError::Acquisition("source is closed".to_string()));
        }
        let mut target = position_ms.max(0.0);
        if let Some(duration) = self.duration_ms {
            target = target.min(duration);
        }
        self.capture.set(videoio::CAP_PROP_POS_MSEC, target)?;
        self.position_ms = self.capture.get(videoio::CAP_PROP_POS_MSEC)?;
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        self.position_ms
    }

    fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }

    fn frame_interval(&self) -> Duration {
        if self.fps > 0.0 {
            Duration::from_secs_f64(1.0 / self.fps)
        } else {
            Duration::from_millis(constants::DEFAULT_FRAME_INTERVAL_MS)
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.capture.release() {
                crate::utils::logger::error(&format!("decoder release failed: {}", e));
            }
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.close();
    }
}
