//! Parameters controlling a deconvolution run
use mzpeaks::Tolerance;

use crate::charge::ChargeRange;
use crate::deconv_traits::DeconvolutionError;

/// The ionization mode of the spectrum, which determines the sign of every charge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    #[inline]
    pub const fn sign(&self) -> i32 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
        }
    }

    /// Give a charge magnitude the sign of this polarity
    #[inline]
    pub const fn sign_charge(&self, charge: i32) -> i32 {
        charge.abs() * self.sign()
    }
}

/// An inclusive m/z interval of interest
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MzRange {
    pub min: f64,
    pub max: f64,
}

impl MzRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, mz: f64) -> bool {
        self.min <= mz && mz <= self.max
    }

    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            Err(DeconvolutionError::InvalidMzRange {
                min: self.min,
                max: self.max,
            })
        } else {
            Ok(())
        }
    }
}

impl From<(f64, f64)> for MzRange {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl Default for MzRange {
    fn default() -> Self {
        Self::new(0.0, f64::MAX)
    }
}

/// The knobs of the classic deconvolution algorithm.
///
/// Charges are given as magnitudes, the sign comes from [`Polarity`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeconvolutionConfig {
    pub min_charge: i32,
    pub max_charge: i32,
    /// The mass accuracy, in parts-per-million, an observed isotope must match its
    /// theoretical position with
    pub tolerance_ppm: f64,
    /// The multiplicative factor an observed isotope's intensity may deviate from the
    /// intensity predicted by the seed peak and the theoretical pattern, in either direction
    pub intensity_ratio_limit: f64,
    pub polarity: Polarity,
    /// The fraction of the most abundant observed peak's intensity the second most
    /// abundant peak must reach for an envelope to be flagged as ambiguous
    pub ambiguity_ratio: f64,
}

impl Default for DeconvolutionConfig {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 60,
            tolerance_ppm: 4.0,
            intensity_ratio_limit: 3.0,
            polarity: Polarity::Positive,
            ambiguity_ratio: 0.9,
        }
    }
}

impl DeconvolutionConfig {
    pub fn new(
        min_charge: i32,
        max_charge: i32,
        tolerance_ppm: f64,
        intensity_ratio_limit: f64,
        polarity: Polarity,
    ) -> Self {
        Self {
            min_charge,
            max_charge,
            tolerance_ppm,
            intensity_ratio_limit,
            polarity,
            ..Default::default()
        }
    }

    pub fn with_charge_range(mut self, min_charge: i32, max_charge: i32) -> Self {
        self.min_charge = min_charge;
        self.max_charge = max_charge;
        self
    }

    pub fn with_tolerance_ppm(mut self, tolerance_ppm: f64) -> Self {
        self.tolerance_ppm = tolerance_ppm;
        self
    }

    pub fn with_intensity_ratio_limit(mut self, intensity_ratio_limit: f64) -> Self {
        self.intensity_ratio_limit = intensity_ratio_limit;
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_ambiguity_ratio(mut self, ambiguity_ratio: f64) -> Self {
        self.ambiguity_ratio = ambiguity_ratio;
        self
    }

    pub fn charge_range(&self) -> ChargeRange {
        (self.min_charge, self.max_charge)
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::PPM(self.tolerance_ppm)
    }

    /// Check the parameters for values the algorithm cannot run with
    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        if self.min_charge < 1 || self.min_charge > self.max_charge {
            return Err(DeconvolutionError::InvalidChargeRange {
                min: self.min_charge,
                max: self.max_charge,
            });
        }
        if !self.tolerance_ppm.is_finite() || self.tolerance_ppm <= 0.0 {
            return Err(DeconvolutionError::InvalidTolerance(self.tolerance_ppm));
        }
        if !self.intensity_ratio_limit.is_finite() || self.intensity_ratio_limit <= 1.0 {
            return Err(DeconvolutionError::InvalidIntensityRatioLimit(
                self.intensity_ratio_limit,
            ));
        }
        if !(self.ambiguity_ratio > 0.0 && self.ambiguity_ratio <= 1.0) {
            return Err(DeconvolutionError::InvalidAmbiguityRatio(
                self.ambiguity_ratio,
            ));
        }
        Ok(())
    }
}
