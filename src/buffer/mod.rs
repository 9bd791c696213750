use crate::shared::error::{PipelineError, PipelineResult};

/// Row-major raster data with explicit width/height/channel metadata.
///
/// Ownership moves through the pipeline one step at a time: a transform always
/// returns a new buffer, never aliases its input.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    stride: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Tightly-packed buffer (`stride == width * channels`).
    pub fn from_packed(width: u32, height: u32, channels: u8, data: Vec<u8>) -> PipelineResult<Self> {
        let stride = width as usize * channels as usize;
        Self::with_stride(width, height, channels, stride, data)
    }

    pub fn with_stride(
        width: u32,
        height: u32,
        channels: u8,
        stride: usize,
        data: Vec<u8>,
    ) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidParameter(format!(
                "dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if channels != 1 && channels != 3 {
            return Err(PipelineError::InvalidParameter(format!(
                "channel count must be 1 or 3, got {}",
                channels
            )));
        }
        if stride < width as usize * channels as usize {
            return Err(PipelineError::InvalidParameter(format!(
                "stride {} shorter than row payload {}",
                stride,
                width as usize * channels as usize
            )));
        }
        if data.len() != stride * height as usize {
            return Err(PipelineError::InvalidParameter(format!(
                "data length {} does not match stride {} * height {}",
                data.len(),
                stride,
                height
            )));
        }
        Ok(Self { width, height, channels, stride, data })
    }

    /// Blank single-color buffer.
    #[allow(dead_code)]
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> PipelineResult<Self> {
        let data = vec![value; width as usize * height as usize * channels as usize];
        Self::from_packed(width, height, channels, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    #[allow(dead_code)]
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    #[allow(dead_code)]
    pub fn is_tight(&self) -> bool {
        self.stride == self.width as usize * self.channels as usize
    }

    /// Iterator over the payload portion of each row (stride padding excluded).
    pub fn tight_rows(&self) -> impl Iterator<Item = &[u8]> {
        let payload = self.width as usize * self.channels as usize;
        self.data
            .chunks_exact(self.stride)
            .map(move |row| &row[..payload])
    }

    /// Sample channel `c` of pixel (x, y). Callers stay in bounds.
    #[allow(dead_code)]
    pub fn sample(&self, x: u32, y: u32, c: u8) -> u8 {
        let idx = y as usize * self.stride + x as usize * self.channels as usize + c as usize;
        self.data[idx]
    }

    /// Luminance-weighted reduction to a tightly-packed single channel
    /// (Rec.601: 0.299 R + 0.587 G + 0.114 B). Copies 1-channel input as-is.
    pub fn intensity(&self) -> PixelBuffer {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut out = Vec::with_capacity(w * h);

        if self.channels == 1 {
            for row in self.tight_rows() {
                out.extend_from_slice(row);
            }
        } else {
            for row in self.tight_rows() {
                for px in row.chunks_exact(3) {
                    let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                    out.push(y.round().clamp(0.0, 255.0) as u8);
                }
            }
        }

        PixelBuffer {
            width: self.width,
            height: self.height,
            channels: 1,
            stride: w,
            data: out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_invariants() {
        let buf = PixelBuffer::from_packed(2, 2, 3, vec![0u8; 12]).unwrap();
        assert_eq!(buf.stride(), 6);
        assert!(buf.is_tight());
        assert_eq!(buf.data().len(), 12);
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        // A 0x4 buffer satisfies the length equations trivially but has no
        // rows to iterate; it must be refused at construction.
        assert!(PixelBuffer::from_packed(0, 4, 1, vec![]).is_err());
        assert!(PixelBuffer::from_packed(4, 0, 1, vec![]).is_err());
        assert!(PixelBuffer::filled(0, 0, 3, 7).is_err());
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(PixelBuffer::from_packed(2, 2, 3, vec![0u8; 11]).is_err());
        assert!(PixelBuffer::with_stride(4, 2, 1, 3, vec![0u8; 6]).is_err());
        assert!(PixelBuffer::from_packed(1, 1, 4, vec![0u8; 4]).is_err());
    }

    #[test]
    fn test_strided_rows_skip_padding() {
        // 2x2 single channel with 1 byte of row padding
        let data = vec![1, 2, 99, 3, 4, 99];
        let buf = PixelBuffer::with_stride(2, 2, 1, 3, data).unwrap();
        let rows: Vec<&[u8]> = buf.tight_rows().collect();
        assert_eq!(rows, vec![&[1u8, 2][..], &[3u8, 4][..]]);
        assert!(!buf.is_tight());
    }

    #[test]
    fn test_intensity_weights() {
        // Pure red, green, blue, white pixels
        let data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let buf = PixelBuffer::from_packed(4, 1, 3, data).unwrap();
        let gray = buf.intensity();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.data(), &[76, 150, 29, 255]);
    }

    #[test]
    fn test_intensity_on_gray_is_copy() {
        let buf = PixelBuffer::from_packed(3, 1, 1, vec![10, 20, 30]).unwrap();
        assert_eq!(buf.intensity().data(), buf.data());
    }
}
