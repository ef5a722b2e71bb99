use std::cmp::Ordering;

use mzpeaks::{CoordinateLike, DeconvolutedPeak, IntensityMeasurement, KnownCharge, Mass, MZ};

use crate::config::Polarity;
use crate::isotopic_model::{mass_to_mz, mz_to_mass};
use crate::scorer::ScoreType;

/// An observed peak assigned to an [`IsotopicEnvelope`]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvelopePeak {
    pub mz: f64,
    pub intensity: f64,
    /// The position of the peak in the spectrum it was observed in
    pub index: usize,
}

impl EnvelopePeak {
    pub fn new(mz: f64, intensity: f64, index: usize) -> Self {
        Self {
            mz,
            intensity,
            index,
        }
    }
}

/// A group of observed peaks explained as the isotopic pattern of one ion
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopicEnvelope {
    /// The observed peaks in the order they were matched, most abundant theoretical isotope first
    pub peaks: Vec<EnvelopePeak>,
    pub monoisotopic_mass: f64,
    /// The signed charge state, negative for negative mode spectra
    pub charge: i32,
    pub total_intensity: f64,
    pub score: ScoreType,
    /// The population standard deviation of the theoretical over observed intensity ratios
    pub isotope_ratio_std_dev: f64,
    /// The bucket of the isotopic model the envelope was matched against
    pub cluster_index: usize,
    pub most_abundant_observed_mz: f64,
    /// Set when the second most abundant peak is nearly as abundant as the most
    /// abundant one, a sign the charge or mass may be wrong
    pub second_most_abundant_observed_mz: Option<f64>,
}

impl IsotopicEnvelope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        peaks: Vec<EnvelopePeak>,
        monoisotopic_mass: f64,
        charge: i32,
        total_intensity: f64,
        score: ScoreType,
        isotope_ratio_std_dev: f64,
        cluster_index: usize,
        ambiguity_ratio: f64,
    ) -> Self {
        let mut by_intensity: Vec<&EnvelopePeak> = peaks.iter().collect();
        by_intensity.sort_by(|a, b| {
            b.intensity
                .total_cmp(&a.intensity)
                .then(a.mz.total_cmp(&b.mz))
        });
        let (most_abundant_observed_mz, second_most_abundant_observed_mz) =
            match by_intensity.as_slice() {
                [] => (0.0, None),
                [top] => (top.mz, None),
                [top, second, ..] => (
                    top.mz,
                    if second.intensity >= ambiguity_ratio * top.intensity {
                        Some(second.mz)
                    } else {
                        None
                    },
                ),
            };
        Self {
            peaks,
            monoisotopic_mass,
            charge,
            total_intensity,
            score,
            isotope_ratio_std_dev,
            cluster_index,
            most_abundant_observed_mz,
            second_most_abundant_observed_mz,
        }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn polarity(&self) -> Polarity {
        if self.charge < 0 {
            Polarity::Negative
        } else {
            Polarity::Positive
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.second_most_abundant_observed_mz.is_some()
    }

    /// The neutral mass of the most abundant observed peak at this envelope's charge
    pub fn most_abundant_observed_isotopic_mass(&self) -> f64 {
        mz_to_mass(self.most_abundant_observed_mz, self.charge, self.polarity())
    }

    /// The m/z of the monoisotopic peak at this envelope's charge
    pub fn monoisotopic_mz(&self) -> f64 {
        mass_to_mz(self.monoisotopic_mass, self.charge, self.polarity())
    }

    /// A copy of the observed peaks ordered by m/z
    pub fn peaks_by_mz(&self) -> Vec<EnvelopePeak> {
        let mut peaks = self.peaks.clone();
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        peaks
    }

    pub fn contains_mz(&self, mz: f64) -> bool {
        self.peaks.iter().any(|p| p.mz == mz)
    }

    /// Order two envelopes by score, highest first
    pub fn cmp_by_score_desc(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }
}

impl PartialOrd for IsotopicEnvelope {
    /// Envelopes are ordered by monoisotopic mass, then charge, then score
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let ord = self
            .monoisotopic_mass
            .total_cmp(&other.monoisotopic_mass)
            .then(self.charge.cmp(&other.charge))
            .then(self.score.total_cmp(&other.score));
        match ord {
            Ordering::Equal if self != other => None,
            ord => Some(ord),
        }
    }
}

impl CoordinateLike<Mass> for IsotopicEnvelope {
    fn coordinate(&self) -> f64 {
        self.monoisotopic_mass
    }
}

impl CoordinateLike<MZ> for IsotopicEnvelope {
    fn coordinate(&self) -> f64 {
        self.monoisotopic_mz()
    }
}

impl IntensityMeasurement for IsotopicEnvelope {
    fn intensity(&self) -> f32 {
        self.total_intensity as f32
    }
}

impl KnownCharge for IsotopicEnvelope {
    fn charge(&self) -> i32 {
        self.charge
    }
}

impl From<&IsotopicEnvelope> for DeconvolutedPeak {
    fn from(value: &IsotopicEnvelope) -> Self {
        DeconvolutedPeak::new(
            value.monoisotopic_mass,
            value.intensity(),
            value.charge,
            0,
        )
    }
}
