//! # Pyramidal dense displacement estimation
//!
//! Farneback-style flow: polynomial expansion of both frames, per-pixel
//! normal equations accumulated over the averaging window, solved coarse to
//! fine over an image pyramid with a fixed number of refinement iterations
//! per level.

use super::poly::{self, PolyExpansion, PolyKernel};
use crate::config::FlowParams;
use crate::filter;
use crate::frame::FloatImage;
use nalgebra as na;

/// Dense per-pixel displacement field, stored as separate x/y planes.
pub struct FlowField {
    u: FloatImage,
    v: FloatImage,
}

impl FlowField {
    /// Create a zero flow field.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            u: FloatImage::zeros(width, height),
            v: FloatImage::zeros(width, height),
        }
    }

    /// Get width and height of the field.
    pub fn dim(&self) -> (usize, usize) {
        self.u.dim()
    }

    /// Get the displacement vector at coordinates.
    pub fn get(&self, x: usize, y: usize) -> na::Vector2<f32> {
        na::Vector2::new(self.u.get(x, y), self.v.get(x, y))
    }

    /// Resample onto new dimensions, rescaling displacements by the size
    /// ratio so they stay in destination pixel units.
    fn resize_into(&self, width: usize, height: usize) -> Self {
        let (w, h) = self.dim();
        let sx = width as f32 / w as f32;
        let sy = height as f32 / h as f32;

        let mut u = self.u.resize_bilinear(width, height);
        let mut v = self.v.resize_bilinear(width, height);
        u.as_mut_slice().iter_mut().for_each(|p| *p *= sx);
        v.as_mut_slice().iter_mut().for_each(|p| *p *= sy);

        Self { u, v }
    }
}

/// Smallest pyramid level worth estimating on.
const MIN_LEVEL_SIZE: usize = 8;

/// Determinant threshold below which a pixel's normal equations are treated
/// as singular and its displacement left at zero.
const DET_EPS: f32 = 1e-9;

/// Compute dense flow from `prev` to `curr`.
///
/// Both frames must share dimensions. The returned field is in pixels of
/// the input resolution.
pub fn calc_flow(prev: &FloatImage, curr: &FloatImage, params: &FlowParams) -> FlowField {
    assert_eq!(prev.dim(), curr.dim());

    let kernel = PolyKernel::new(params.poly_n, params.poly_sigma);

    let pyr_prev = build_pyramid(prev, params);
    let pyr_curr = build_pyramid(curr, params);
    let levels = pyr_prev.len();

    let (cw, ch) = pyr_prev[levels - 1].dim();
    let mut flow = FlowField::zeros(cw, ch);

    for lvl in (0..levels).rev() {
        let p1 = &pyr_prev[lvl];
        let p2 = &pyr_curr[lvl];
        let (w, h) = p1.dim();

        if flow.dim() != (w, h) {
            flow = flow.resize_into(w, h);
        }

        let exp1 = poly::expand(p1, &kernel);
        let exp2 = poly::expand(p2, &kernel);

        for _ in 0..params.iterations {
            flow = refine(&exp1, &exp2, &flow, params.winsize);
        }
    }

    flow
}

/// Build the image pyramid, full resolution first.
///
/// Each level is presmoothed and resampled by the configured scale factor;
/// levels below the minimum size are dropped.
fn build_pyramid(img: &FloatImage, params: &FlowParams) -> Vec<FloatImage> {
    let mut pyramid = vec![img.clone()];

    for _ in 1..params.levels {
        let prev = pyramid.last().unwrap();
        let (w, h) = prev.dim();
        let nw = (w as f32 * params.pyr_scale).round() as usize;
        let nh = (h as f32 * params.pyr_scale).round() as usize;
        if nw < MIN_LEVEL_SIZE || nh < MIN_LEVEL_SIZE {
            break;
        }
        let smoothed = filter::gaussian_blur(prev, 5, 1.0);
        pyramid.push(smoothed.resize_bilinear(nw, nh));
    }

    pyramid
}

/// One displacement refinement pass.
///
/// For every pixel, average the two expansions along the current estimate,
/// accumulate `A^T A` / `A^T db` over the window as five channels, and solve
/// the 2x2 system.
fn refine(
    exp1: &PolyExpansion,
    exp2: &PolyExpansion,
    flow: &FlowField,
    winsize: usize,
) -> FlowField {
    let (w, h) = flow.dim();

    let mut g11 = FloatImage::zeros(w, h);
    let mut g12 = FloatImage::zeros(w, h);
    let mut g22 = FloatImage::zeros(w, h);
    let mut h1 = FloatImage::zeros(w, h);
    let mut h2 = FloatImage::zeros(w, h);

    for y in 0..h {
        for x in 0..w {
            let d = flow.get(x, y);
            let [bx1, by1, axx1, ayy1, axy1] = exp1.get(x, y);
            let [bx2, by2, axx2, ayy2, axy2] =
                exp2.sample_bilinear(x as f32 + d.x, y as f32 + d.y);

            // Averaged quadratic form; the cross coefficient is halved going
            // from axy*dx*dy to the symmetric matrix entry.
            let a11 = 0.5 * (axx1 + axx2);
            let a22 = 0.5 * (ayy1 + ayy2);
            let a12 = 0.25 * (axy1 + axy2);

            // db = 0.5 * (b1 - b2(x + d)) + A d makes the solved
            // displacement absolute rather than incremental.
            let db1 = 0.5 * (bx1 - bx2) + a11 * d.x + a12 * d.y;
            let db2 = 0.5 * (by1 - by2) + a12 * d.x + a22 * d.y;

            g11.set(x, y, a11 * a11 + a12 * a12);
            g12.set(x, y, a12 * (a11 + a22));
            g22.set(x, y, a12 * a12 + a22 * a22);
            h1.set(x, y, a11 * db1 + a12 * db2);
            h2.set(x, y, a12 * db1 + a22 * db2);
        }
    }

    // Averaging window.
    let g11 = filter::box_blur(&g11, winsize);
    let g12 = filter::box_blur(&g12, winsize);
    let g22 = filter::box_blur(&g22, winsize);
    let h1 = filter::box_blur(&h1, winsize);
    let h2 = filter::box_blur(&h2, winsize);

    let mut out = FlowField::zeros(w, h);

    for y in 0..h {
        for x in 0..w {
            let (a, b, c) = (g11.get(x, y), g12.get(x, y), g22.get(x, y));
            let det = a * c - b * b;
            if det.abs() > DET_EPS {
                let (r1, r2) = (h1.get(x, y), h2.get(x, y));
                out.u.set(x, y, (c * r1 - b * r2) / det);
                out.v.set(x, y, (a * r2 - b * r1) / det);
            }
        }
    }

    out
}
