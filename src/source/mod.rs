mod device;
mod file;

pub use device::{probe_devices, DeviceReport, DeviceSource};
pub use file::FileSource;

use std::time::Duration;

#[cfg(target_os = "macos")]
use opencv::core as cv_core;
use opencv::{imgproc, prelude::*};

use crate::buffer::PixelBuffer;
use crate::shared::error::{PipelineError, PipelineResult};

/// Outcome of pulling one frame. End-of-stream is a terminal signal for the
/// playback state machine, not an error.
#[derive(Debug)]
pub enum FrameRead {
    Frame(PixelBuffer),
    EndOfStream,
}

/// Abstraction over file-decoded or live-device frame acquisition.
pub trait FrameSource {
    fn read_next(&mut self) -> PipelineResult<FrameRead>;

    /// Relative seek by `delta_ms` (may be negative). File sources clamp to
    /// `[0, duration]`; live devices report `Unsupported`.
    fn seek(&mut self, delta_ms: f64) -> PipelineResult<()>;

    /// Absolute seek, same support rules as `seek`.
    fn seek_to(&mut self, position_ms: f64) -> PipelineResult<()>;

    /// Current position in milliseconds. For a live device this is time since
    /// open rather than a seekable offset.
    fn position_ms(&self) -> f64;

    /// Total length when the container knows it; `None` for live devices.
    fn duration_ms(&self) -> Option<f64>;

    /// Natural cadence between frames (falls back to ~33 ms when the source
    /// reports no usable rate).
    fn frame_interval(&self) -> Duration;

    fn is_open(&self) -> bool;

    /// Releases the underlying decoder/device. Safe to call repeatedly; only
    /// the first call does anything.
    fn close(&mut self);
}

impl From<opencv::Error> for PipelineError {
    fn from(err: opencv::Error) -> Self {
        PipelineError::Acquisition(err.to_string())
    }
}

/// Converts a decoded BGR `Mat` into a tightly-packed RGB `PixelBuffer`.
pub fn mat_to_rgb(frame: &Mat) -> PipelineResult<PixelBuffer> {
    let mut rgb = Mat::default();
    #[cfg(target_os = "macos")]
    imgproc::cvt_color(
        frame,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        cv_core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    #[cfg(not(target_os = "macos"))]
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    if !rgb.is_continuous() {
        return Err(PipelineError::Acquisition(
            "decoded frame is not continuous".to_string(),
        ));
    }
    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb.data_bytes()?.to_vec();
    PixelBuffer::from_packed(width, height, 3, data)
}

/// Converts a pipeline buffer back to a BGR `Mat` for opencv encoders.
/// Single-channel buffers pass through as grayscale.
pub fn buffer_to_mat(buffer: &PixelBuffer) -> PipelineResult<Mat> {
    let mut tight: Vec<u8> = Vec::with_capacity(
        buffer.width() as usize * buffer.height() as usize * buffer.channels() as usize,
    );
    for row in buffer.tight_rows() {
        tight.extend_from_slice(row);
    }

    let flat = Mat::from_slice(&tight)?;
    let shaped = flat.reshape(buffer.channels() as i32, buffer.height() as i32)?;

    if buffer.channels() == 1 {
        return Ok(shaped.try_clone()?);
    }

    let mut bgr = Mat::default();
    #[cfg(target_os = "macos")]
    imgproc::cvt_color(
        &*shaped,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        cv_core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    #[cfg(not(target_os = "macos"))]
    imgproc::cvt_color(&shaped, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}
