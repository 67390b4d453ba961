//! # Quadratic polynomial expansion
//!
//! Approximates the neighbourhood of every pixel with a quadratic polynomial
//! `f(dx, dy) ~ c + bx*dx + by*dy + axx*dx^2 + ayy*dy^2 + axy*dx*dy` under a
//! Gaussian applicability, via two separable correlation passes. The linear
//! and quadratic coefficients feed the displacement solver; the constant
//! term is never needed.

use crate::frame::FloatImage;
use nalgebra as na;

/// Per-pixel expansion coefficients `[bx, by, axx, ayy, axy]`.
pub struct PolyExpansion {
    coefs: Vec<[f32; 5]>,
    width: usize,
}

impl PolyExpansion {
    /// Get width and height of the coefficient image.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.coefs.len() / self.width)
    }

    /// Get the coefficients at coordinates.
    pub fn get(&self, x: usize, y: usize) -> [f32; 5] {
        self.coefs[y * self.width + x]
    }

    /// Sample the coefficients at fractional coordinates with bilinear
    /// interpolation, clamped to the borders.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> [f32; 5] {
        let (w, h) = self.dim();
        let x = x.clamp(0.0, (w - 1) as f32);
        let y = y.clamp(0.0, (h - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let mut out = [0.0; 5];
        let p00 = self.get(x0, y0);
        let p10 = self.get(x1, y0);
        let p01 = self.get(x0, y1);
        let p11 = self.get(x1, y1);
        for i in 0..5 {
            let top = p00[i] * (1.0 - fx) + p10[i] * fx;
            let bot = p01[i] * (1.0 - fx) + p11[i] * fx;
            out[i] = top * (1.0 - fy) + bot * fy;
        }
        out
    }
}

/// Precomputed applicability kernels and inverted normal equations for a
/// given neighbourhood size and sigma.
pub struct PolyKernel {
    g: Vec<f32>,
    radius: isize,
    /// Inverse second moment, scales the linear coefficients.
    ig_lin: f32,
    /// Inverse cross moment, scales the mixed coefficient.
    ig_cross: f32,
    /// Row of the inverted (1, x^2, y^2) Gram matrix that extracts the
    /// quadratic coefficients: `axx = iq[0]*s00 + iq[1]*s20 + iq[2]*s02`.
    iq: [f32; 3],
}

impl PolyKernel {
    /// Build kernels for an odd neighbourhood size `poly_n` and Gaussian
    /// applicability `sigma`.
    pub fn new(poly_n: usize, sigma: f32) -> Self {
        assert!(poly_n % 2 == 1 && poly_n >= 3);
        let radius = (poly_n / 2) as isize;

        let mut g: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f32 = g.iter().sum();
        g.iter_mut().for_each(|v| *v /= sum);

        // 1-D moments of the normalized applicability. Separability gives
        // the 2-D moments directly: m22 = m2^2, and the x^4 moment is the
        // 1-D one since the other axis sums to 1.
        let m2: f32 = g
            .iter()
            .zip(-radius..=radius)
            .map(|(&w, i)| w * (i * i) as f32)
            .sum();
        let m4: f32 = g
            .iter()
            .zip(-radius..=radius)
            .map(|(&w, i)| w * ((i * i) * (i * i)) as f32)
            .sum();
        let m22 = m2 * m2;

        // Gram matrix of the basis (1, x^2, y^2) under the applicability.
        let q = na::Matrix3::new(1.0, m2, m2, m2, m4, m22, m2, m22, m4);
        let iq = q
            .try_inverse()
            .expect("applicability moments are degenerate");

        Self {
            g,
            radius,
            ig_lin: 1.0 / m2,
            ig_cross: 1.0 / m22,
            iq: [iq[(1, 0)], iq[(1, 1)], iq[(1, 2)]],
        }
    }
}

/// Expand every pixel of `src` into quadratic coefficients.
///
/// Borders are replicated, matching the filter module's convention.
pub fn expand(src: &FloatImage, kernel: &PolyKernel) -> PolyExpansion {
    let (w, h) = src.dim();
    let r = kernel.radius;

    // Vertical pass: correlate columns against g, y*g and y^2*g.
    let mut v0 = vec![0.0f32; w * h];
    let mut v1 = vec![0.0f32; w * h];
    let mut v2 = vec![0.0f32; w * h];

    for y in 0..h {
        for x in 0..w {
            let mut s0 = 0.0;
            let mut s1 = 0.0;
            let mut s2 = 0.0;
            for (i, &g) in kernel.g.iter().enumerate() {
                let dy = i as isize - r;
                let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                let f = src.get(x, sy);
                s0 += g * f;
                s1 += g * dy as f32 * f;
                s2 += g * (dy * dy) as f32 * f;
            }
            let idx = y * w + x;
            v0[idx] = s0;
            v1[idx] = s1;
            v2[idx] = s2;
        }
    }

    // Horizontal pass: combine into the six weighted projections and solve
    // the (precomputed) normal equations.
    let mut coefs = Vec::with_capacity(w * h);

    for y in 0..h {
        for x in 0..w {
            let mut s00 = 0.0;
            let mut s10 = 0.0;
            let mut s20 = 0.0;
            let mut s01 = 0.0;
            let mut s11 = 0.0;
            let mut s02 = 0.0;
            for (i, &g) in kernel.g.iter().enumerate() {
                let dx = i as isize - r;
                let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                let idx = y * w + sx;
                s00 += g * v0[idx];
                s10 += g * dx as f32 * v0[idx];
                s20 += g * (dx * dx) as f32 * v0[idx];
                s01 += g * v1[idx];
                s11 += g * dx as f32 * v1[idx];
                s02 += g * v2[idx];
            }

            let bx = kernel.ig_lin * s10;
            let by = kernel.ig_lin * s01;
            let axy = kernel.ig_cross * s11;
            let axx = kernel.iq[0] * s00 + kernel.iq[1] * s20 + kernel.iq[2] * s02;
            let ayy = kernel.iq[0] * s00 + kernel.iq[2] * s20 + kernel.iq[1] * s02;

            coefs.push([bx, by, axx, ayy, axy]);
        }
    }

    PolyExpansion { coefs, width: w }
}
