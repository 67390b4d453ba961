//! # Separable image filters
//!
//! Small spatial filters shared by the flow estimator and the magnitude
//! conditioning stage. All filters replicate the border.

use crate::frame::FloatImage;

/// Build a normalized 1-D Gaussian kernel of odd length `ksize`.
///
/// A non-positive `sigma` picks one from the kernel size the same way the
/// reference implementations do: `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    assert!(ksize % 2 == 1, "kernel size must be odd");
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize - 1) as f32 * 0.5 - 1.0) + 0.8
    };

    let r = (ksize / 2) as isize;
    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= sum);
    kernel
}

/// Correlate rows with a 1-D kernel, replicating the border.
fn correlate_rows(src: &FloatImage, kernel: &[f32]) -> FloatImage {
    let (w, h) = src.dim();
    let r = (kernel.len() / 2) as isize;
    let mut dst = FloatImage::zeros(w, h);

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (i, &k) in kernel.iter().enumerate() {
                let sx = (x as isize + i as isize - r).clamp(0, w as isize - 1) as usize;
                acc += k * src.get(sx, y);
            }
            dst.set(x, y, acc);
        }
    }

    dst
}

/// Correlate columns with a 1-D kernel, replicating the border.
fn correlate_cols(src: &FloatImage, kernel: &[f32]) -> FloatImage {
    let (w, h) = src.dim();
    let r = (kernel.len() / 2) as isize;
    let mut dst = FloatImage::zeros(w, h);

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (i, &k) in kernel.iter().enumerate() {
                let sy = (y as isize + i as isize - r).clamp(0, h as isize - 1) as usize;
                acc += k * src.get(x, sy);
            }
            dst.set(x, y, acc);
        }
    }

    dst
}

/// Separable Gaussian blur.
pub fn gaussian_blur(src: &FloatImage, ksize: usize, sigma: f32) -> FloatImage {
    let kernel = gaussian_kernel(ksize, sigma);
    correlate_cols(&correlate_rows(src, &kernel), &kernel)
}

/// Separable box blur with an odd window size.
pub fn box_blur(src: &FloatImage, ksize: usize) -> FloatImage {
    assert!(ksize % 2 == 1, "window size must be odd");
    let kernel = vec![1.0 / ksize as f32; ksize];
    correlate_cols(&correlate_rows(src, &kernel), &kernel)
}
