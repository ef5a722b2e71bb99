use thiserror::Error;

use crate::config::{DeconvolutionConfig, MzRange};
use crate::solution::IsotopicEnvelope;
use crate::spectrum::{Spectrum, SpectrumError};

/// An error that might occur during deconvolution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconvolutionError {
    #[error("Invalid charge range {min} to {max}, charges must be at least 1 and ordered")]
    InvalidChargeRange { min: i32, max: i32 },
    #[error("Invalid mass tolerance {0} ppm, it must be a positive number")]
    InvalidTolerance(f64),
    #[error("Invalid intensity ratio limit {0}, it must be greater than 1")]
    InvalidIntensityRatioLimit(f64),
    #[error("Invalid ambiguity ratio {0}, it must be in (0, 1]")]
    InvalidAmbiguityRatio(f64),
    #[error("Invalid m/z range {min} to {max}")]
    InvalidMzRange { min: f64, max: f64 },
    #[error("The isotopic model has no theoretical pattern for mass {mass}")]
    ModelUnavailable { mass: f64 },
    #[error("Invalid spectrum: {0}")]
    InvalidSpectrum(#[from] SpectrumError),
}

/// A strategy for explaining the peaks of a spectrum as isotopic envelopes.
///
/// Implementations must be pure functions of their inputs: deconvoluting the same
/// spectrum twice yields the same envelopes in the same order.
pub trait DeconvolutionAlgorithm {
    type Envelopes: Iterator<Item = IsotopicEnvelope>;

    /// Find the isotopic envelopes whose most abundant peak lies within `mz_range`.
    ///
    /// Configuration errors are reported before any peak is examined. An empty
    /// spectrum or a range outside of the spectrum is not an error, it simply
    /// produces no envelopes.
    fn deconvolute(
        &self,
        spectrum: &Spectrum,
        mz_range: MzRange,
        config: &DeconvolutionConfig,
    ) -> Result<Self::Envelopes, DeconvolutionError>;
}
