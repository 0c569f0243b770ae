//! Grayscale filters used by the preprocessing recipes.
//!
//! Everything operates on `GrayImage` with dark text on a light
//! background. Binarised outputs are strictly 0 / 255.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::{filter3x3, gaussian_blur_f32, median_filter};
use imageproc::morphology;

/// Pixels above this count as near-white for the blank check.
const BLANK_WHITE: u8 = 240;
/// Pixels below this count as near-black for the blank check.
const BLANK_BLACK: u8 = 15;

/// Centre 9, neighbours -1, row-major.
const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// Fixed threshold: `> level` becomes white, everything else black.
pub fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > level { 255 } else { 0 };
    }
    out
}

/// Global Otsu threshold.
pub fn otsu(gray: &GrayImage) -> GrayImage {
    binarize(gray, otsu_level(gray))
}

/// Gaussian-weighted local threshold.
///
/// A pixel is white when it is brighter than the Gaussian-weighted mean
/// of its `block × block` neighbourhood minus `c`. The weighting sigma
/// follows the usual kernel-size rule, `0.3·((block−1)/2 − 1) + 0.8`.
/// `block = 11, c = 2` is the usual setting.
pub fn adaptive_gaussian(gray: &GrayImage, block: u32, c: i32) -> GrayImage {
    let block = block.max(3) | 1;
    let sigma = 0.3 * ((block - 1) as f32 * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(gray, sigma);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in out.enumerate_pixels_mut() {
        let v = gray.get_pixel(x, y).0[0] as i32;
        let m = mean.get_pixel(x, y).0[0] as i32;
        p.0[0] = if v > m - c { 255 } else { 0 };
    }
    out
}

/// 3×3 median. Removes salt-and-pepper speckle without smearing strokes.
pub fn denoise(gray: &GrayImage) -> GrayImage {
    median_filter(gray, 1, 1)
}

/// 3×3 high-pass sharpen: centre 9, neighbours -1.
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    filter3x3::<_, i32, u8>(gray, &SHARPEN_KERNEL)
}

/// Unsharp mask: `1.5·src − 0.5·blur(src)`.
pub fn unsharp(gray: &GrayImage, sigma: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, sigma);
    let mut out = gray.clone();
    for (x, y, p) in out.enumerate_pixels_mut() {
        let v = gray.get_pixel(x, y).0[0] as f32;
        let b = blurred.get_pixel(x, y).0[0] as f32;
        p.0[0] = (1.5 * v - 0.5 * b).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into a `grid.0 × grid.1` tile grid. Each tile's
/// histogram is clipped at `clip · tile_area / 256`, the excess spread
/// evenly, and the resulting CDF used as that tile's lookup table.
/// Pixels blend the four nearest tile tables bilinearly.
pub fn clahe(gray: &GrayImage, clip: f32, grid: (u32, u32)) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let tile_w = w.div_ceil(grid.0.max(1)).max(1);
    let tile_h = h.div_ceil(grid.1.max(1)).max(1);
    let nx = w.div_ceil(tile_w);
    let ny = h.div_ceil(tile_h);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((nx * ny) as usize);
    for ty in 0..ny {
        for tx in 0..nx {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip));
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let (ty0, ty1, wy) = neighbours(y, tile_h, ny);
        for x in 0..w {
            let (tx0, tx1, wx) = neighbours(x, tile_w, nx);
            let v = gray.get_pixel(x, y).0[0] as usize;
            let lut = |tx: u32, ty: u32| luts[(ty * nx + tx) as usize][v] as f32;
            let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
            let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
            let value = top * (1.0 - wy) + bottom * wy;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);
    let limit = ((clip * area as f32) / 256.0).max(1.0) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cum = 0u64;
    for (i, bin) in hist.iter().enumerate() {
        cum += *bin as u64;
        lut[i] = ((cum * 255 + area as u64 / 2) / area as u64).min(255) as u8;
    }
    lut
}

/// Tile indices on either side of a coordinate plus the blend weight.
fn neighbours(pos: u32, tile: u32, count: u32) -> (u32, u32, f32) {
    let f = ((pos as f32 + 0.5) / tile as f32 - 0.5).max(0.0);
    let lo = (f.floor() as u32).min(count - 1);
    let hi = (lo + 1).min(count - 1);
    let weight = if hi == lo { 0.0 } else { (f - lo as f32).clamp(0.0, 1.0) };
    (lo, hi, weight)
}

/// Morphological close on a binarised image (fills pinholes in white).
pub fn close(binary: &GrayImage) -> GrayImage {
    morphology::close(binary, Norm::LInf, 1)
}

/// Thicken dark strokes on a binarised image by one pixel.
///
/// Text is black on white, so growing the strokes is an erosion of
/// the white background.
pub fn thicken_strokes(binary: &GrayImage) -> GrayImage {
    morphology::erode(binary, Norm::LInf, 1)
}

/// Uniform scale with Catmull-Rom.
pub fn upscale(gray: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.max(1);
    imageops::resize(
        gray,
        gray.width() * factor,
        gray.height() * factor,
        FilterType::CatmullRom,
    )
}

/// Shrink so the longer side is at most `max_side`. Smaller images pass through.
pub fn limit_longest_side(gray: &GrayImage, max_side: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let longest = w.max(h);
    if longest <= max_side || longest == 0 {
        return gray.clone();
    }
    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(gray, nw, nh, FilterType::CatmullRom)
}

/// Downscale (Lanczos) so `width × height <= max_pixels`.
///
/// Returns `None` when the image is already within the cap.
pub fn cap_pixels(image: &DynamicImage, max_pixels: u64) -> Option<DynamicImage> {
    let (w, h) = (image.width() as u64, image.height() as u64);
    if max_pixels == 0 || w * h <= max_pixels {
        return None;
    }
    let scale = (max_pixels as f64 / (w * h) as f64).sqrt();
    let nw = ((w as f64 * scale).floor() as u32).max(1);
    let nh = ((h as f64 * scale).floor() as u32).max(1);
    Some(image.resize_exact(nw, nh, FilterType::Lanczos3))
}

/// True when more than 99% of pixels are near-white or near-black.
pub fn is_blank(gray: &GrayImage) -> bool {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return true;
    }
    let (mut white, mut black) = (0u64, 0u64);
    for p in gray.pixels() {
        let v = p.0[0];
        if v > BLANK_WHITE {
            white += 1;
        } else if v < BLANK_BLACK {
            black += 1;
        }
    }
    let limit = total as f64 * 0.99;
    white as f64 > limit || black as f64 > limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| Luma([((x * 255) / w.max(1)) as u8]))
    }

    fn only_extremes(img: &GrayImage) -> bool {
        img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
    }

    #[test]
    fn thresholds_are_binary() {
        let img = gradient(64, 16);
        assert!(only_extremes(&otsu(&img)));
        assert!(only_extremes(&adaptive_gaussian(&img, 11, 2)));
        assert!(only_extremes(&binarize(&img, 150)));
    }

    #[test]
    fn clahe_keeps_dimensions_and_spreads_contrast() {
        let img = GrayImage::from_fn(40, 30, |x, _| Luma([100 + (x % 10) as u8]));
        let out = clahe(&img, 2.0, (8, 8));
        assert_eq!(out.dimensions(), (40, 30));
        let (lo, hi) = out
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        assert!(hi - lo > 9, "range {}..{}", lo, hi);
    }

    #[test]
    fn clahe_handles_images_smaller_than_grid() {
        let img = gradient(3, 2);
        assert_eq!(clahe(&img, 2.0, (8, 8)).dimensions(), (3, 2));
    }

    #[test]
    fn sharpen_flat_image_is_identity() {
        let img = GrayImage::from_pixel(5, 5, Luma([120]));
        assert_eq!(sharpen(&img), img);
    }

    #[test]
    fn sharpen_boosts_step_edges() {
        let img = GrayImage::from_fn(6, 3, |x, _| Luma([if x < 3 { 100 } else { 140 }]));
        let out = sharpen(&img);
        assert!(out.get_pixel(2, 1).0[0] < 100);
        assert!(out.get_pixel(3, 1).0[0] > 140);
        assert_eq!(out.get_pixel(0, 1).0[0], 100);
    }

    #[test]
    fn adaptive_threshold_follows_uneven_lighting() {
        // Dim paper on the left, bright on the right, one 2px stroke across both.
        let img = GrayImage::from_fn(60, 40, |x, y| {
            let paper: u8 = if x < 30 { 150 } else { 230 };
            Luma([if (19..21).contains(&y) { paper - 80 } else { paper }])
        });
        let out = adaptive_gaussian(&img, 11, 2);
        assert_eq!(out.get_pixel(10, 20).0[0], 0);
        assert_eq!(out.get_pixel(50, 20).0[0], 0);
        assert_eq!(out.get_pixel(10, 5).0[0], 255);
        assert_eq!(out.get_pixel(50, 5).0[0], 255);
    }

    #[test]
    fn thicken_grows_dark_pixels() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([255]));
        img.put_pixel(2, 2, Luma([0]));
        let out = thicken_strokes(&img);
        let dark = out.pixels().filter(|p| p.0[0] == 0).count();
        assert_eq!(dark, 9);
    }

    #[test]
    fn cap_pixels_respects_limit() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(2000, 1000));
        let capped = cap_pixels(&img, 1_000_000).unwrap();
        assert!(capped.width() as u64 * capped.height() as u64 <= 1_000_000);
        assert!(cap_pixels(&capped, 1_000_000).is_none());
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(&GrayImage::from_pixel(10, 10, Luma([250]))));
        assert!(is_blank(&GrayImage::from_pixel(10, 10, Luma([3]))));
        assert!(!is_blank(&gradient(100, 10)));
    }

    #[test]
    fn longest_side_limit() {
        let img = GrayImage::new(4000, 1000);
        assert_eq!(limit_longest_side(&img, 2000).dimensions(), (2000, 500));
        assert_eq!(limit_longest_side(&img, 5000).dimensions(), (4000, 1000));
    }
}
