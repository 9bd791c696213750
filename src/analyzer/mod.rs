mod plot;

use crate::buffer::PixelBuffer;
use crate::shared::constants;

/// 256-bin intensity distribution. Derived, read-only; recomputed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: [u32; constants::HISTOGRAM_BINS],
}

impl Histogram {
    pub fn counts(&self) -> &[u32; constants::HISTOGRAM_BINS] {
        &self.counts
    }

    #[allow(dead_code)]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Counts intensity occurrences. The buffer is always reduced to a single
/// channel first, whatever its current channel count.
pub fn histogram(buffer: &PixelBuffer) -> Histogram {
    let gray = buffer.intensity();
    let mut counts = [0u32; constants::HISTOGRAM_BINS];
    for &v in gray.data() {
        counts[v as usize] += 1;
    }
    Histogram { counts }
}

/// Renders the distribution as a plotted chart buffer (white background, black
/// polyline, dashed grid, labeled axes, x-range fixed 0-256). Pure function of
/// the histogram.
pub fn render(hist: &Histogram) -> PixelBuffer {
    plot::render_chart(hist, constants::PLOT_WIDTH, constants::PLOT_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_sum_to_pixel_count() {
        let data: Vec<u8> = (0..30u32).map(|i| (i * 7 % 256) as u8).collect();
        let buf = PixelBuffer::from_packed(5, 6, 1, data).unwrap();
        let hist = histogram(&buf);
        assert_eq!(hist.total(), 30);
    }

    #[test]
    fn test_color_input_reduced_first() {
        // 2 white pixels: intensity 255 regardless of channel count.
        let buf = PixelBuffer::from_packed(2, 1, 3, vec![255u8; 6]).unwrap();
        let hist = histogram(&buf);
        assert_eq!(hist.counts()[255], 2);
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn test_uniform_buffer_fills_one_bin() {
        let buf = PixelBuffer::filled(4, 4, 1, 42).unwrap();
        let hist = histogram(&buf);
        assert_eq!(hist.counts()[42], 16);
        assert_eq!(hist.max_count(), 16);
    }

    #[test]
    fn test_render_dimensions_and_background() {
        let buf = PixelBuffer::filled(4, 4, 1, 0).unwrap();
        let chart = render(&histogram(&buf));
        assert_eq!(chart.width(), crate::shared::constants::PLOT_WIDTH);
        assert_eq!(chart.height(), crate::shared::constants::PLOT_HEIGHT);
        assert_eq!(chart.channels(), 1);
        // Mostly white canvas with some dark plot ink.
        assert!(chart.data().iter().any(|&v| v == 255));
        assert!(chart.data().iter().any(|&v| v == 0));
    }

    #[test]
    fn test_render_is_pure() {
        let buf = PixelBuffer::filled(3, 3, 1, 7).unwrap();
        let hist = histogram(&buf);
        assert_eq!(render(&hist), render(&hist));
    }
}
