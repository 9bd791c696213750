//! Static n-up image tiling. Pure array reshaping plus a small batch-decode
//! front end; no state machine or timing concerns.

use std::path::Path;

use fast_image_resize as fr;
use fr::images::Image;
use opencv::imgcodecs;
use opencv::prelude::MatTraitConst;

use crate::buffer::PixelBuffer;
use crate::shared::constants;
use crate::shared::error::{PipelineError, PipelineResult};
use crate::source::mat_to_rgb;

const BORDER_FILL: u8 = 255;

/// Decodes up to `count` images from `dir` (extension-filtered, name-sorted),
/// resizes each to `tile_width` x `tile_height` and pads it with a white
/// border of `border` pixels.
pub fn pick_images(
    dir: &Path,
    count: usize,
    tile_width: u32,
    tile_height: u32,
    border: u32,
) -> PipelineResult<Vec<PixelBuffer>> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| PipelineError::Acquisition(format!("cannot list {}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    constants::IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                })
                .unwrap_or(false)
        })
        .collect();
    names.sort();
    names.truncate(count);

    let mut tiles = Vec::with_capacity(names.len());
    for path in &names {
        let path_str = path.to_string_lossy();
        let mat = imgcodecs::imread(&path_str, imgcodecs::IMREAD_COLOR)?;
        if mat.empty() {
            return Err(PipelineError::Acquisition(format!(
                "unreadable image: {}",
                path.display()
            )));
        }
        let decoded = mat_to_rgb(&mat)?;
        let resized = resize_tile(&decoded, tile_width, tile_height)?;
        tiles.push(add_border(&resized, border)?);
    }
    Ok(tiles)
}

/// SIMD resize of a 3-channel buffer to exact target dimensions.
pub fn resize_tile(buffer: &PixelBuffer, width: u32, height: u32) -> PipelineResult<PixelBuffer> {
    if buffer.channels() != 3 {
        return Err(PipelineError::InvalidParameter(
            "collage tiles must be 3-channel".to_string(),
        ));
    }
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidParameter(
            "tile dimensions must be non-zero".to_string(),
        ));
    }

    let mut tight: Vec<u8> =
        Vec::with_capacity(buffer.width() as usize * buffer.height() as usize * 3);
    for row in buffer.tight_rows() {
        tight.extend_from_slice(row);
    }

    let src = Image::from_vec_u8(buffer.width(), buffer.height(), tight, fr::PixelType::U8x3)
        .map_err(|e| PipelineError::InvalidParameter(e.to_string()))?;
    let mut dst = Image::new(width, height, fr::PixelType::U8x3);
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src, &mut dst, None)
        .map_err(|e| PipelineError::InvalidParameter(e.to_string()))?;

    PixelBuffer::from_packed(width, height, 3, dst.buffer().to_vec())
}

/// Surrounds the buffer with a constant white border, the way the original
/// tool framed each tile before tiling.
pub fn add_border(buffer: &PixelBuffer, border: u32) -> PipelineResult<PixelBuffer> {
    if border == 0 {
        return Ok(buffer.clone());
    }
    let ch = buffer.channels() as usize;
    let out_w = buffer.width() + 2 * border;
    let out_h = buffer.height() + 2 * border;
    let out_row = out_w as usize * ch;
    let mut data = vec![BORDER_FILL; out_row * out_h as usize];

    for (y, row) in buffer.tight_rows().enumerate() {
        let dst_start = (y + border as usize) * out_row + border as usize * ch;
        data[dst_start..dst_start + row.len()].copy_from_slice(row);
    }
    PixelBuffer::from_packed(out_w, out_h, buffer.channels(), data)
}

/// Tiles equally-sized 3-channel images into a `rows` x `cols` grid, row-major.
/// Missing cells at the tail are filled with white. Pure function of its
/// inputs, independently testable with synthetic buffers.
pub fn compose_grid(tiles: &[PixelBuffer], rows: u32, cols: u32) -> PipelineResult<PixelBuffer> {
    if rows == 0 || cols == 0 {
        return Err(PipelineError::InvalidParameter(
            "grid must have at least one row and column".to_string(),
        ));
    }
    let first = tiles.first().ok_or_else(|| {
        PipelineError::InvalidParameter("no images to compose".to_string())
    })?;
    if tiles.len() > (rows * cols) as usize {
        return Err(PipelineError::InvalidParameter(format!(
            "{} images exceed a {}x{} grid",
            tiles.len(),
            rows,
            cols
        )));
    }
    let (tw, th) = (first.width(), first.height());
    for tile in tiles {
        if tile.width() != tw || tile.height() != th || tile.channels() != 3 {
            return Err(PipelineError::InvalidParameter(
                "all tiles must share dimensions and be 3-channel".to_string(),
            ));
        }
    }

    let out_w = cols * tw;
    let out_h = rows * th;
    let out_row = out_w as usize * 3;
    let tile_row = tw as usize * 3;
    let mut data = vec![BORDER_FILL; out_row * out_h as usize];

    for (i, tile) in tiles.iter().enumerate() {
        let grid_y = i as u32 / cols;
        let grid_x = i as u32 % cols;
        let x_off = grid_x as usize * tile_row;
        for (y, row) in tile.tight_rows().enumerate() {
            let dst_y = grid_y as usize * th as usize + y;
            let dst_start = dst_y * out_row + x_off;
            data[dst_start..dst_start + tile_row].copy_from_slice(row);
        }
    }

    PixelBuffer::from_packed(out_w, out_h, 3, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_tile(w: u32, h: u32, value: u8) -> PixelBuffer {
        PixelBuffer::filled(w, h, 3, value).unwrap()
    }

    #[test]
    fn test_grid_geometry() {
        let tiles = vec![
            solid_tile(4, 3, 10),
            solid_tile(4, 3, 20),
            solid_tile(4, 3, 30),
            solid_tile(4, 3, 40),
        ];
        let grid = compose_grid(&tiles, 2, 2).unwrap();
        assert_eq!(grid.width(), 8);
        assert_eq!(grid.height(), 6);
        // Top-left pixel of each quadrant carries its tile's value.
        assert_eq!(grid.sample(0, 0, 0), 10);
        assert_eq!(grid.sample(4, 0, 0), 20);
        assert_eq!(grid.sample(0, 3, 0), 30);
        assert_eq!(grid.sample(4, 3, 0), 40);
    }

    #[test]
    fn test_short_grid_pads_with_white() {
        let tiles = vec![solid_tile(2, 2, 0), solid_tile(2, 2, 0), solid_tile(2, 2, 0)];
        let grid = compose_grid(&tiles, 2, 2).unwrap();
        // Fourth cell (bottom-right) is white fill.
        assert_eq!(grid.sample(3, 3, 0), 255);
        assert_eq!(grid.sample(0, 0, 0), 0);
    }

    #[test]
    fn test_single_row_grid() {
        let tiles = vec![solid_tile(2, 2, 1), solid_tile(2, 2, 2), solid_tile(2, 2, 3)];
        let grid = compose_grid(&tiles, 1, 3).unwrap();
        assert_eq!(grid.width(), 6);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.sample(2, 1, 0), 2);
    }

    #[test]
    fn test_mismatched_tiles_rejected() {
        let tiles = vec![solid_tile(2, 2, 1), solid_tile(3, 2, 2)];
        assert!(compose_grid(&tiles, 1, 2).is_err());
    }

    #[test]
    fn test_too_many_tiles_rejected() {
        let tiles = vec![solid_tile(2, 2, 1); 5];
        assert!(compose_grid(&tiles, 2, 2).is_err());
    }

    #[test]
    fn test_border_surrounds_payload() {
        let tile = solid_tile(2, 2, 0);
        let bordered = add_border(&tile, 1).unwrap();
        assert_eq!(bordered.width(), 4);
        assert_eq!(bordered.height(), 4);
        assert_eq!(bordered.sample(0, 0, 0), 255);
        assert_eq!(bordered.sample(1, 1, 0), 0);
        assert_eq!(bordered.sample(3, 3, 2), 255);
    }

    #[test]
    fn test_zero_border_is_copy() {
        let tile = solid_tile(2, 2, 9);
        assert_eq!(add_border(&tile, 0).unwrap(), tile);
    }
}
