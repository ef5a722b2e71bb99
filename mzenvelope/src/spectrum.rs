//! A read-only, m/z-sorted peak list with nearest-peak lookup
use std::ops::Range;

use mzpeaks::{prelude::*, CentroidPeak, IndexType, MZPeakSetType, Tolerance};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    #[error("The m/z array has {mz} entries but the intensity array has {intensity}")]
    LengthMismatch { mz: usize, intensity: usize },
    #[error("The m/z array is not strictly ascending at index {index}")]
    Unsorted { index: usize },
}

/// A pair of parallel m/z and intensity arrays, strictly ascending in m/z.
///
/// A [`Spectrum`] never changes after construction, so it may be shared freely
/// between threads.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Spectrum {
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl Spectrum {
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Result<Self, SpectrumError> {
        if mz.len() != intensity.len() {
            return Err(SpectrumError::LengthMismatch {
                mz: mz.len(),
                intensity: intensity.len(),
            });
        }
        if let Some(index) = mz
            .windows(2)
            .position(|w| w[0].total_cmp(&w[1]).is_ge())
        {
            return Err(SpectrumError::Unsorted { index: index + 1 });
        }
        Ok(Self { mz, intensity })
    }

    /// Build a spectrum from any sequence of centroids, which must already be sorted by m/z
    pub fn from_peaks<'a, C: CentroidLike + 'a>(
        peaks: impl IntoIterator<Item = &'a C>,
    ) -> Result<Self, SpectrumError> {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = peaks
            .into_iter()
            .map(|p| (p.mz(), p.intensity() as f64))
            .unzip();
        Self::new(mz, intensity)
    }

    /// Convert the spectrum into a [`MZPeakSetType`] of [`CentroidPeak`]
    pub fn to_peak_set(&self) -> MZPeakSetType<CentroidPeak> {
        self.iter()
            .enumerate()
            .map(|(i, (mz, intensity))| CentroidPeak::new(mz, intensity as f32, i as IndexType))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    #[inline]
    pub fn mz(&self, index: usize) -> f64 {
        self.mz[index]
    }

    #[inline]
    pub fn intensity(&self, index: usize) -> f64 {
        self.intensity[index]
    }

    pub fn mz_array(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity_array(&self) -> &[f64] {
        &self.intensity
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    pub fn first_mz(&self) -> Option<f64> {
        self.mz.first().copied()
    }

    pub fn last_mz(&self) -> Option<f64> {
        self.mz.last().copied()
    }

    /// The total ion current, the sum of all intensities
    pub fn tic(&self) -> f64 {
        self.intensity.iter().sum()
    }

    /// The index of the most intense peak, the first one in case of ties
    pub fn base_peak(&self) -> Option<usize> {
        self.intensity
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, x)| match best {
                Some((_, b)) if b >= *x => best,
                _ => Some((i, *x)),
            })
            .map(|(i, _)| i)
    }

    /// The largest intensity among the peaks in `range`, zero if it is empty
    pub fn max_intensity_in(&self, range: Range<usize>) -> f64 {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.intensity[start..end]
            .iter()
            .copied()
            .fold(0.0, f64::max)
    }

    /// Find the index of the peak nearest to `mz` by binary search.
    ///
    /// Queries below the first peak resolve to the first peak, queries beyond
    /// the last peak resolve to the last one. An exact midpoint resolves to the
    /// lower peak. Returns `None` only when the spectrum is empty.
    pub fn closest_index(&self, mz: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let i = self.mz.partition_point(|x| *x < mz);
        let i = if i == 0 {
            0
        } else if i == self.len() {
            i - 1
        } else if mz - self.mz[i - 1] > self.mz[i] - mz {
            i
        } else {
            i - 1
        };
        Some(i)
    }

    /// All peak indices whose m/z lies within `ppm_tolerance` parts-per-million of `mz`
    pub fn indices_within_tolerance(&self, mz: f64, ppm_tolerance: f64) -> Range<usize> {
        let (low, high) = Tolerance::PPM(ppm_tolerance).bounds(mz);
        self.range_indices(low, high)
    }

    /// The half-open index range `[start, end)` of the peaks whose m/z lies within
    /// `[min, max]`.
    ///
    /// When no peak overlaps the interval the range is empty, `start >= end`.
    pub fn range_indices(&self, min: f64, max: f64) -> Range<usize> {
        let start = self.mz.partition_point(|x| *x < min);
        let end = self.mz.partition_point(|x| *x <= max);
        start..end
    }
}
