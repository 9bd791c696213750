use std::time::{Duration, Instant};

use opencv::{prelude::*, videoio};
use serde::Serialize;

use super::{mat_to_rgb, FrameRead, FrameSource};
use crate::shared::constants;
use crate::shared::error::{PipelineError, PipelineResult};

/// Live camera opened by index. Position is time since open; there is nothing
/// to seek in, and a failed read means the device is gone for this session.
pub struct DeviceSource {
    capture: videoio::VideoCapture,
    index: u32,
    opened_at: Instant,
    fps: f64,
    open: bool,
}

impl DeviceSource {
    pub fn open(index: u32) -> PipelineResult<Self> {
        let capture = videoio::VideoCapture::new(index as i32, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(PipelineError::Acquisition(format!(
                "camera {} is absent or busy",
                index
            )));
        }

        // Many drivers report 0 here; frame_interval() falls back to ~30 fps.
        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);

        crate::utils::logger::debug(&format!("opened camera {} (fps {:.2})", index, fps));

        Ok(Self {
            capture,
            index,
            opened_at: Instant::now(),
            fps,
            open: true,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl FrameSource for DeviceSource {
    fn read_next(&mut self) -> PipelineResult<FrameRead> {
        if !self.open {
            return Err(PipelineError::Acquisition("device is closed".to_string()));
        }

        let mut frame = Mat::default();
        let grabbed = self.capture.read(&mut frame).unwrap_or(false);
        if !grabbed || frame.empty() {
            // Disconnect or driver failure: terminal for this session.
            crate::utils::logger::error(&format!("camera {} stopped delivering", self.index));
            return Ok(FrameRead::EndOfStream);
        }
        Ok(FrameRead::Frame(mat_to_rgb(&frame)?))
    }

    fn seek(&mut self, _delta_ms: f64) -> PipelineResult<()> {
        Err(PipelineError::Unsupported("seek on a live device"))
    }

    fn seek_to(&mut self, _position_ms: f64) -> PipelineResult<()> {
        Err(PipelineError::Unsupported("seek on a live device"))
    }

    fn position_ms(&self) -> f64 {
        self.opened_at.elapsed().as_secs_f64() * 1000.0
    }

    fn duration_ms(&self) -> Option<f64> {
        None
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
                crate::utils::logger::error(&format!("camera release failed: {}", e));
            }
        }
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Result of trial-opening camera indices `0..probed`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub probed: u32,
    pub available: Vec<u32>,
}

/// Discovery pass over device indices. Each index is opened and released
/// immediately; this never runs on the playback hot path.
pub fn probe_devices(limit: u32) -> DeviceReport {
    let mut available = Vec::new();
    for index in 0..limit {
        let opened = videoio::VideoCapture::new(index as i32, videoio::CAP_ANY)
            .and_then(|mut cap| {
                let ok = cap.is_opened()?;
                cap.release()?;
                Ok(ok)
            })
            .unwrap_or(false);
        if opened {
            available.push(index);
        }
    }
    DeviceReport {
        probed: limit,
        available,
    }
}
