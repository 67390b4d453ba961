//! # Pipeline configuration
//!
//! All resolution, flow and aggregation parameters live here, and every
//! divisibility invariant is validated once at startup. Frame-time code can
//! assume a valid geometry.

use crate::error::{Error, Result};

/// Dense flow estimator parameters.
///
/// Defaults mirror the classic Farneback parameter vector
/// `(0.5, 3, 15, 3, 5, 1.2)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlowParams {
    /// Pyramid scale factor between levels, in (0, 1).
    pub pyr_scale: f32,
    /// Number of pyramid levels, including the full resolution one.
    pub levels: usize,
    /// Averaging window size, odd.
    pub winsize: usize,
    /// Displacement refinement iterations per level.
    pub iterations: usize,
    /// Polynomial expansion neighbourhood size, odd.
    pub poly_n: usize,
    /// Gaussian applicability sigma for the polynomial expansion.
    pub poly_sigma: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

/// Full pipeline configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Native sensor width.
    pub raw_width: usize,
    /// Native sensor height.
    pub raw_height: usize,
    /// Spatial downsample factor applied by the normalizer.
    pub downsample: usize,
    /// Side length of one aggregation cell, in reduced-resolution pixels.
    pub cell_size: usize,
    pub flow: FlowParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_width: 640,
            raw_height: 480,
            downsample: 2,
            cell_size: 16,
            flow: FlowParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Reduced (post-downsample) frame dimensions.
    pub fn reduced_dim(&self) -> (usize, usize) {
        (
            self.raw_width / self.downsample,
            self.raw_height / self.downsample,
        )
    }

    /// Output grid dimensions.
    pub fn grid_dim(&self) -> (usize, usize) {
        let (w, h) = self.reduced_dim();
        (w / self.cell_size, h / self.cell_size)
    }

    /// Motion magnitude band of interest, `(min_speed, max_speed)`.
    ///
    /// Derived from the downsample factor so the band tracks the working
    /// resolution.
    pub fn speed_band(&self) -> (f32, f32) {
        (
            8.0 / self.downsample as f32,
            64.0 / self.downsample as f32,
        )
    }

    /// Validate every startup invariant.
    ///
    /// Returns `Error::Config` if any resolution/downsample/cell-size
    /// combination does not divide evenly, or a flow parameter is out of its
    /// valid range.
    pub fn validate(&self) -> Result<()> {
        if self.raw_width == 0 || self.raw_height == 0 {
            return Err(Error::Config("native resolution must be non-zero".into()));
        }

        if self.downsample == 0
            || self.raw_width % self.downsample != 0
            || self.raw_height % self.downsample != 0
        {
            return Err(Error::Config(format!(
                "downsample factor {} does not divide native resolution {}x{}",
                self.downsample, self.raw_width, self.raw_height
            )));
        }

        let (w, h) = self.reduced_dim();
        if self.cell_size == 0 || w % self.cell_size != 0 || h % self.cell_size != 0 {
            return Err(Error::Config(format!(
                "cell size {} does not divide reduced resolution {}x{}",
                self.cell_size, w, h
            )));
        }

        let f = &self.flow;
        if !(f.pyr_scale > 0.0 && f.pyr_scale < 1.0) {
            return Err(Error::Config(format!(
                "pyramid scale {} must lie in (0, 1)",
                f.pyr_scale
            )));
        }
        if f.levels == 0 {
            return Err(Error::Config("pyramid must have at least one level".into()));
        }
        if f.winsize % 2 == 0 || f.winsize == 0 {
            return Err(Error::Config(format!(
                "averaging window {} must be odd",
                f.winsize
            )));
        }
        if f.poly_n % 2 == 0 || f.poly_n < 3 {
            return Err(Error::Config(format!(
                "polynomial neighbourhood {} must be odd and at least 3",
                f.poly_n
            )));
        }
        if f.poly_sigma <= 0.0 {
            return Err(Error::Config("polynomial sigma must be positive".into()));
        }
        if f.iterations == 0 {
            return Err(Error::Config("at least one iteration required".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.reduced_dim(), (320, 240));
        assert_eq!(cfg.grid_dim(), (20, 15));
        assert_eq!(cfg.speed_band(), (4.0, 32.0));
    }

    #[test]
    fn indivisible_cell_size_rejected() {
        let cfg = PipelineConfig {
            cell_size: 7,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn indivisible_downsample_rejected() {
        let cfg = PipelineConfig {
            downsample: 3,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn even_winsize_rejected() {
        let cfg = PipelineConfig {
            flow: FlowParams {
                winsize: 14,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
