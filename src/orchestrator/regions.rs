//! Region finders: horizontal bands, text columns, certificate sections
//! and UI elements.
//!
//! All rectangles are `(x, y, width, height)` in the pixel space of the
//! image they were computed from.

use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

pub type Rect = (u32, u32, u32, u32);

/// A column projection counts pixels darker than this as ink.
const INK_LEVEL: u8 = 200;
/// Column-boundary threshold as a fraction of the mean ink per column.
const COLUMN_GAP_FRACTION: f64 = 0.3;
const MIN_COLUMN_BOUNDARIES: usize = 4;
const MIN_COLUMN_PAGE_WIDTH: u32 = 600;
const MIN_COLUMN_WIDTH: u32 = 100;

const MIN_UI_AREA: f64 = 200.0;
const MAX_UI_REGIONS: usize = 20;
const UI_PADDING: u32 = 5;
const MIN_UI_SIZE: (u32, u32) = (20, 10);

/// Number of bands for a tall image: `clamp(height / band_height, min, max)`.
pub fn band_count(height: u32, band_height: u32, min_bands: u32, max_bands: u32) -> u32 {
    (height / band_height.max(1)).max(min_bands).min(max_bands).max(1)
}

/// Equal-height bands, top to bottom; the last band absorbs the remainder.
pub fn bands(width: u32, height: u32, count: u32) -> Vec<Rect> {
    let count = count.max(1).min(height.max(1));
    let band_height = height / count;
    (0..count)
        .map(|i| {
            let y = i * band_height;
            let h = if i + 1 == count { height - y } else { band_height };
            (0, y, width, h)
        })
        .filter(|r| r.3 > 0 && r.2 > 0)
        .collect()
}

/// Header, body and footer thirds.
pub fn thirds(width: u32, height: u32) -> [Rect; 3] {
    let a = height / 3;
    let b = height * 2 / 3;
    [(0, 0, width, a), (0, a, width, b - a), (0, b, width, height - b)]
}

/// Left-to-right text columns found by ink projection.
///
/// Returns nothing unless the page is wide enough and at least four
/// boundaries are found; column candidates narrower than 100 px are dropped.
pub fn detect_columns(gray: &image::GrayImage) -> Vec<Rect> {
    let (w, h) = gray.dimensions();
    if w <= MIN_COLUMN_PAGE_WIDTH || h == 0 {
        return Vec::new();
    }
    let mut ink = vec![0u32; w as usize];
    for (x, _, p) in gray.enumerate_pixels() {
        if p.0[0] < INK_LEVEL {
            ink[x as usize] += 1;
        }
    }
    let mean = ink.iter().map(|v| *v as f64).sum::<f64>() / w as f64;
    let threshold = mean * COLUMN_GAP_FRACTION;

    let mut boundaries = Vec::new();
    for i in 1..ink.len() {
        let prev = ink[i - 1] as f64 > threshold;
        let cur = ink[i] as f64 > threshold;
        if prev != cur {
            boundaries.push(i as u32);
        }
    }
    if boundaries.len() < MIN_COLUMN_BOUNDARIES {
        return Vec::new();
    }

    boundaries
        .chunks_exact(2)
        .filter(|pair| pair[1] - pair[0] > MIN_COLUMN_WIDTH)
        .map(|pair| (pair[0], 0, pair[1] - pair[0], h))
        .collect()
}

/// Bounding boxes of outer ink blobs in a binarised (dark-on-light) image.
///
/// Boxes are padded, clamped, filtered for size and returned top to
/// bottom. Over-segmented images (20+ blobs) yield nothing.
pub fn ui_elements(binary: &image::GrayImage) -> Vec<Rect> {
    let (w, h) = binary.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut inverted = binary.clone();
    for p in inverted.pixels_mut() {
        p.0[0] = 255 - p.0[0];
    }

    let outer: Vec<Vec<Point<i32>>> = find_contours::<i32>(&inverted)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .filter(|points| polygon_area(points) > MIN_UI_AREA)
        .collect();
    if outer.is_empty() || outer.len() >= MAX_UI_REGIONS {
        return Vec::new();
    }

    let mut rects: Vec<Rect> = outer
        .iter()
        .filter_map(|points| bounding_rect(points))
        .map(|(x, y, bw, bh)| {
            let px = x.saturating_sub(UI_PADDING);
            let py = y.saturating_sub(UI_PADDING);
            let pw = (bw + 2 * UI_PADDING).min(w - px);
            let ph = (bh + 2 * UI_PADDING).min(h - py);
            (px, py, pw, ph)
        })
        .filter(|r| r.2 >= MIN_UI_SIZE.0 && r.3 >= MIN_UI_SIZE.1)
        .collect();
    rects.sort_by_key(|r| (r.1, r.0));
    rects
}

/// Shoelace area of a closed contour.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (twice.abs() as f64) / 2.0
}

fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some((
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn band_count_is_clamped() {
        assert_eq!(band_count(700, 500, 2, 4), 2);
        assert_eq!(band_count(1500, 500, 2, 4), 3);
        assert_eq!(band_count(9000, 500, 2, 4), 4);
    }

    #[test]
    fn bands_cover_full_height_in_order() {
        let rects = bands(100, 1001, 3);
        assert_eq!(rects, vec![(0, 0, 100, 333), (0, 333, 100, 333), (0, 666, 100, 335)]);
    }

    #[test]
    fn thirds_cover_height() {
        let [a, b, c] = thirds(10, 100);
        assert_eq!(a.3 + b.3 + c.3, 100);
        assert_eq!(c.1, 66);
    }

    #[test]
    fn two_columns_detected() {
        // 900 wide: ink in [100, 350) and [500, 800)
        let img = GrayImage::from_fn(900, 200, |x, y| {
            let inked = (100..350).contains(&x) || (500..800).contains(&x);
            if inked && y % 4 == 0 {
                Luma([10])
            } else {
                Luma([250])
            }
        });
        assert_eq!(detect_columns(&img), vec![(100, 0, 250, 200), (500, 0, 300, 200)]);
    }

    #[test]
    fn narrow_pages_have_no_columns() {
        let img = GrayImage::from_pixel(400, 200, Luma([255]));
        assert!(detect_columns(&img).is_empty());
    }

    #[test]
    fn ui_elements_found_top_to_bottom() {
        let mut img = GrayImage::from_pixel(300, 200, Luma([255]));
        for (x0, y0) in [(40u32, 120u32), (40, 20)] {
            for y in y0..y0 + 20 {
                for x in x0..x0 + 100 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let rects = ui_elements(&img);
        assert_eq!(rects.len(), 2);
        assert!(rects[0].1 < rects[1].1);
        assert_eq!(rects[0], (35, 15, 110, 30));
    }

    #[test]
    fn tiny_blobs_ignored() {
        let mut img = GrayImage::from_pixel(100, 100, Luma([255]));
        img.put_pixel(50, 50, Luma([0]));
        assert!(ui_elements(&img).is_empty());
    }
}
