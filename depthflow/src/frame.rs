//! # Fixed size frame buffers
//!
//! Row-major, width-tagged pixel buffers for the three value domains the
//! pipeline moves through: raw 16-bit depth, 8-bit intensity, and f32
//! working images.

/// Raw depth sample at native sensor resolution.
///
/// Values are unsigned 16-bit depth measurements, row-major.
#[derive(Clone, Debug)]
pub struct DepthFrame {
    data: Vec<u16>,
    width: usize,
}

impl DepthFrame {
    /// Wrap a row-major buffer.
    ///
    /// # Arguments
    ///
    /// * `data` - row-major depth values, length must be a multiple of `width`.
    /// * `width` - width of the frame.
    pub fn from_vec(data: Vec<u16>, width: usize) -> Self {
        assert!(width > 0 && data.len() % width == 0);
        Self { data, width }
    }

    /// Get width and height of the frame.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.data.len() / self.width)
    }

    /// Get the samples in row-major order.
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }
}

/// 8-bit intensity frame.
///
/// Used both for normalized depth frames and for conditioned motion
/// magnitude fields - the two share dimensions and value range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayFrame {
    data: Vec<u8>,
    width: usize,
}

impl GrayFrame {
    pub fn from_vec(data: Vec<u8>, width: usize) -> Self {
        assert!(width > 0 && data.len() % width == 0);
        Self { data, width }
    }

    /// Get width and height of the frame.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.data.len() / self.width)
    }

    /// Get the pixels in row-major order.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get the pixel at coordinates.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Convert to a f32 working image.
    pub fn to_float(&self) -> FloatImage {
        FloatImage {
            data: self.data.iter().map(|&v| v as f32).collect(),
            width: self.width,
        }
    }
}

/// f32 working image used by the resampling and flow stages.
#[derive(Clone, Debug)]
pub struct FloatImage {
    data: Vec<f32>,
    width: usize,
}

impl FloatImage {
    /// Create a zero-filled image.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
        }
    }

    pub fn from_vec(data: Vec<f32>, width: usize) -> Self {
        assert!(width > 0 && data.len() % width == 0);
        Self { data, width }
    }

    /// Get width and height of the image.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.data.len() / self.width)
    }

    /// Get the pixels in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get the pixels in row-major order, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Get the pixel at coordinates.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Set the pixel at coordinates.
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Sample at fractional coordinates with bilinear interpolation.
    ///
    /// Coordinates are clamped to the image borders.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let (w, h) = self.dim();
        let x = x.clamp(0.0, (w - 1) as f32);
        let y = y.clamp(0.0, (h - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bot = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bot * fy
    }

    /// Resample to a new size with bilinear interpolation.
    ///
    /// Destination pixel centres map onto source pixel centres, so resizing
    /// to the same size is the identity.
    pub fn resize_bilinear(&self, new_width: usize, new_height: usize) -> FloatImage {
        let (w, h) = self.dim();
        let scale_x = w as f32 / new_width as f32;
        let scale_y = h as f32 / new_height as f32;

        let mut data = Vec::with_capacity(new_width * new_height);

        for y in 0..new_height {
            let sy = (y as f32 + 0.5) * scale_y - 0.5;
            for x in 0..new_width {
                let sx = (x as f32 + 0.5) * scale_x - 0.5;
                data.push(self.sample_bilinear(sx, sy));
            }
        }

        FloatImage {
            data,
            width: new_width,
        }
    }

    /// Rescale the image's own min/max onto [0,255] and round to 8 bits.
    ///
    /// A zero-variance image (min == max) collapses to uniform zero rather
    /// than dividing by zero.
    pub fn minmax_to_gray(&self) -> GrayFrame {
        let min = self.data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let data = if max > min {
            let scale = 255.0 / (max - min);
            self.data
                .iter()
                .map(|&v| ((v - min) * scale).round().clamp(0.0, 255.0) as u8)
                .collect()
        } else {
            vec![0u8; self.data.len()]
        };

        GrayFrame {
            data,
            width: self.width,
        }
    }
}

impl From<&DepthFrame> for FloatImage {
    fn from(frame: &DepthFrame) -> Self {
        Self {
            data: frame.data.iter().map(|&v| v as f32).collect(),
            width: frame.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn resize_identity() {
        let img = FloatImage::from_vec((0..12).map(|v| v as f32).collect(), 4);
        let out = img.resize_bilinear(4, 3);
        for (a, b) in img.as_slice().iter().zip(out.as_slice()) {
            assert_approx_eq!(a, b);
        }
    }

    #[test]
    fn resize_halves_dimensions() {
        let img = FloatImage::zeros(640, 480);
        let out = img.resize_bilinear(320, 240);
        assert_eq!(out.dim(), (320, 240));
    }

    #[test]
    fn resize_downsample_averages() {
        // 2x downsample of a 2x2 checker lands between the four pixels.
        let img = FloatImage::from_vec(vec![0.0, 100.0, 100.0, 0.0], 2);
        let out = img.resize_bilinear(1, 1);
        assert_approx_eq!(out.get(0, 0), 50.0);
    }

    #[test]
    fn bilinear_sample_midpoint() {
        let img = FloatImage::from_vec(vec![0.0, 10.0, 20.0, 30.0], 2);
        assert_approx_eq!(img.sample_bilinear(0.5, 0.5), 15.0);
        // Clamped outside the border.
        assert_approx_eq!(img.sample_bilinear(-5.0, -5.0), 0.0);
        assert_approx_eq!(img.sample_bilinear(5.0, 5.0), 30.0);
    }

    #[test]
    fn minmax_rescale_full_range() {
        let img = FloatImage::from_vec(vec![10.0, 20.0, 30.0], 3);
        let gray = img.minmax_to_gray();
        assert_eq!(gray.as_slice(), &[0, 128, 255]);
    }

    #[test]
    fn minmax_rescale_uniform_collapses_to_zero() {
        let img = FloatImage::from_vec(vec![42.0; 9], 3);
        let gray = img.minmax_to_gray();
        assert!(gray.as_slice().iter().all(|&v| v == 0));
    }
}
