use rayon::prelude::*;

use crate::buffer::PixelBuffer;
use crate::shared::constants;
use crate::shared::error::{PipelineError, PipelineResult};

/// User-selected transform. Parametrized variants carry `None` when the user
/// cancelled the numeric prompt; `apply` then leaves the buffer unmodified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterSelector {
    Identity,
    Grayscale,
    EdgeDetection,
    Negative,
    LogTransform { c: Option<f64> },
    GammaCorrection { gamma: Option<f64> },
}

impl FilterSelector {
    pub fn label(&self) -> &'static str {
        match self {
            FilterSelector::Identity => "identity",
            FilterSelector::Grayscale => "grayscale",
            FilterSelector::EdgeDetection => "edges",
            FilterSelector::Negative => "negative",
            FilterSelector::LogTransform { .. } => "log",
            FilterSelector::GammaCorrection { .. } => "gamma",
        }
    }
}

/// Applies `selector` to `buffer`, yielding a new buffer. Pure: the input is
/// never mutated and may be reused by the caller afterwards.
pub fn apply(buffer: &PixelBuffer, selector: &FilterSelector) -> PipelineResult<PixelBuffer> {
    match selector {
        FilterSelector::Identity => Ok(buffer.clone()),
        FilterSelector::Grayscale => Ok(buffer.intensity()),
        FilterSelector::EdgeDetection => edge_detect(
            buffer,
            constants::EDGE_THRESHOLD_LOW,
            constants::EDGE_THRESHOLD_HIGH,
        ),
        FilterSelector::Negative => {
            let gray = buffer.intensity();
            let (w, h) = (gray.width(), gray.height());
            let data = gray.into_data().into_iter().map(|v| 255 - v).collect();
            PixelBuffer::from_packed(w, h, 1, data)
        }
        // Cancelled prompt: hand the image back untouched.
        FilterSelector::LogTransform { c: None }
        | FilterSelector::GammaCorrection { gamma: None } => Ok(buffer.clone()),
        FilterSelector::LogTransform { c: Some(c) } => log_transform(buffer, *c),
        FilterSelector::GammaCorrection { gamma: Some(gamma) } => gamma_correct(buffer, *gamma),
    }
}

/// `out = c * ln(1 + v + eps)` on the intensity image. The formula is kept
/// unrescaled: values past 255 saturate at the u8 boundary, so large `c`
/// produces the same washed-out output the original tool displayed.
fn log_transform(buffer: &PixelBuffer, c: f64) -> PipelineResult<PixelBuffer> {
    let gray = buffer.intensity();
    let (w, h) = (gray.width(), gray.height());
    let data = gray
        .into_data()
        .into_iter()
        .map(|v| (c * (1.0 + v as f64 + constants::LOG_EPSILON).ln()) as u8)
        .collect();
    PixelBuffer::from_packed(w, h, 1, data)
}

/// 256-entry lookup table mapped over every channel of every pixel.
fn gamma_correct(buffer: &PixelBuffer, gamma: f64) -> PipelineResult<PixelBuffer> {
    if gamma <= 0.0 || !gamma.is_finite() {
        return Err(PipelineError::InvalidParameter(format!(
            "gamma must be > 0, got {}",
            gamma
        )));
    }

    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let v = ((i as f64 / 255.0).powf(1.0 / gamma)) * 255.0;
        *entry = v.round().clamp(0.0, 255.0) as u8;
    }

    let row_len = buffer.width() as usize * buffer.channels() as usize;
    let mut data: Vec<u8> = Vec::with_capacity(row_len * buffer.height() as usize);
    for row in buffer.tight_rows() {
        data.extend_from_slice(row);
    }
    data.par_chunks_mut(row_len).for_each(|row| {
        for v in row.iter_mut() {
            *v = lut[*v as usize];
        }
    });

    PixelBuffer::from_packed(buffer.width(), buffer.height(), buffer.channels(), data)
}

/// Sobel gradient magnitude with double thresholding. Pixels at or above `high`
/// are edges; pixels between `low` and `high` survive only next to a strong
/// edge. Output is a binary 0/255 single-channel map.
pub fn edge_detect(buffer: &PixelBuffer, low: f64, high: f64) -> PipelineResult<PixelBuffer> {
    let gray = buffer.intensity();
    let w = gray.width() as usize;
    let h = gray.height() as usize;
    let src = gray.data();

    const STRONG: u8 = 2;
    const WEAK: u8 = 1;

    let mut classes = vec![0u8; w * h];
    if w >= 3 && h >= 3 {
        classes
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                if y == 0 || y == h - 1 {
                    return;
                }
                for x in 1..w - 1 {
                    let px = |dx: isize, dy: isize| -> f64 {
                        src[(y as isize + dy) as usize * w + (x as isize + dx) as usize] as f64
                    };
                    let gx = -px(-1, -1) - 2.0 * px(-1, 0) - px(-1, 1)
                        + px(1, -1)
                        + 2.0 * px(1, 0)
                        + px(1, 1);
                    let gy = -px(-1, -1) - 2.0 * px(0, -1) - px(1, -1)
                        + px(-1, 1)
                        + 2.0 * px(0, 1)
                        + px(1, 1);
                    let mag = (gx * gx + gy * gy).sqrt();
                    row[x] = if mag >= high {
                        STRONG
                    } else if mag >= low {
                        WEAK
                    } else {
                        0
                    };
                }
            });
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let class = classes[y * w + x];
            let lit = match class {
                STRONG => true,
                WEAK => {
                    // Keep weak edges that touch a strong one (8-connectivity).
                    let mut connected = false;
                    'scan: for dy in -1isize..=1 {
                        for dx in -1isize..=1 {
                            let ny = y as isize + dy;
                            let nx = x as isize + dx;
                            if ny >= 0
                                && ny < h as isize
                                && nx >= 0
                                && nx < w as isize
                                && classes[ny as usize * w + nx as usize] == STRONG
                            {
                                connected = true;
                                break 'scan;
                            }
                        }
                    }
                    connected
                }
                _ => false,
            };
            if lit {
                out[y * w + x] = 255;
            }
        }
    }

    PixelBuffer::from_packed(gray.width(), gray.height(), 1, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_buffer() -> PixelBuffer {
        let data: Vec<u8> = (0..64u32).map(|i| (i * 4) as u8).collect();
        PixelBuffer::from_packed(8, 8, 1, data).unwrap()
    }

    #[test]
    fn test_identity_is_pixel_equal() {
        let buf = gradient_buffer();
        let out = apply(&buf, &FilterSelector::Identity).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_negative_round_trips() {
        let buf = gradient_buffer();
        let once = apply(&buf, &FilterSelector::Negative).unwrap();
        let twice = apply(&once, &FilterSelector::Negative).unwrap();
        assert_eq!(twice.data(), buf.intensity().data());
    }

    #[test]
    fn test_gamma_one_is_identity() {
        let data = vec![
            0, 0, 0, 10, 20, 30, 100, 150, 200, 255, 255, 255, 1, 2, 3, 40, 50, 60,
        ];
        let buf = PixelBuffer::from_packed(3, 2, 3, data).unwrap();
        let out = apply(&buf, &FilterSelector::GammaCorrection { gamma: Some(1.0) }).unwrap();
        assert_eq!(out.data(), buf.data());
    }

    #[test]
    fn test_gamma_must_be_positive() {
        let buf = gradient_buffer();
        let err = apply(&buf, &FilterSelector::GammaCorrection { gamma: Some(0.0) }).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));
        let err = apply(&buf, &FilterSelector::GammaCorrection { gamma: Some(-2.0) }).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));
    }

    #[test]
    fn test_cancelled_parameter_leaves_buffer_unmodified() {
        let buf = gradient_buffer();
        let out = apply(&buf, &FilterSelector::LogTransform { c: None }).unwrap();
        assert_eq!(out, buf);
        let out = apply(&buf, &FilterSelector::GammaCorrection { gamma: None }).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_grayscale_reduces_channels() {
        let buf = PixelBuffer::from_packed(2, 1, 3, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let out = apply(&buf, &FilterSelector::Grayscale).unwrap();
        assert_eq!(out.channels(), 1);
        assert_eq!(out.data().len(), 2);
    }

    #[test]
    fn test_log_transform_saturates_instead_of_wrapping() {
        let buf = PixelBuffer::from_packed(2, 1, 1, vec![0, 255]).unwrap();
        let out = apply(&buf, &FilterSelector::LogTransform { c: Some(100.0) }).unwrap();
        // c * ln(256) for v=255 is ~554.5: saturates at the u8 boundary.
        assert_eq!(out.data()[1], 255);
        // v=0 stays near zero: 100 * ln(1 + 1e-6) ~ 0.
        assert_eq!(out.data()[0], 0);
    }

    #[test]
    fn test_edge_detect_finds_step_edge() {
        // Left half black, right half white: a vertical edge in the middle.
        let mut data = vec![0u8; 8 * 8];
        for y in 0..8 {
            for x in 4..8 {
                data[y * 8 + x] = 255;
            }
        }
        let buf = PixelBuffer::from_packed(8, 8, 1, data).unwrap();
        let out = apply(&buf, &FilterSelector::EdgeDetection).unwrap();
        assert_eq!(out.channels(), 1);
        // The transition columns light up, far columns stay dark.
        assert_eq!(out.sample(3, 4, 0), 255);
        assert_eq!(out.sample(4, 4, 0), 255);
        assert_eq!(out.sample(1, 4, 0), 0);
        assert_eq!(out.sample(6, 4, 0), 0);
        // Output is binary.
        assert!(out.data().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn test_flat_buffer_has_no_edges() {
        let buf = PixelBuffer::filled(8, 8, 1, 128).unwrap();
        let out = apply(&buf, &FilterSelector::EdgeDetection).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }
}
