//! * High level APIs for running deconvolution operations
use mzpeaks::{CentroidLike, DeconvolutedPeak, MZPeakSetType, MassPeakSetType};
use tracing::debug;

use crate::{
    config::{DeconvolutionConfig, MzRange},
    deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError},
    deconvoluter::{ClassicDeconvoluter, EnvelopeIter},
    isotopic_model::{mz_to_mass, AveragineTable, IsotopeModel, IsotopicModels},
    solution::IsotopicEnvelope,
    spectrum::Spectrum,
};

/// A single-shot deconvolution of `spectrum`.
///
/// # Arguments
/// - `spectrum`: The centroided mass spectrum to process
/// - `mz_range`: The window whose peaks may seed an isotopic envelope
/// - `isotopic_model`: The model to look up theoretical isotopic patterns in
/// - `config`: The charge range, mass accuracy, and intensity ratio constraints
///
/// # Note
/// Building an [`AveragineTable`] is expensive. If you are processing many spectra, create
/// a [`DeconvolutionEngine`] once and call [`DeconvolutionEngine::deconvolute_spectrum`]
/// instead, or pass the same table by reference here.
///
/// # See also
/// [`DeconvolutionEngine::deconvolute_spectrum`]
pub fn deconvolute_spectrum<M: IsotopeModel>(
    spectrum: &Spectrum,
    mz_range: MzRange,
    isotopic_model: M,
    config: &DeconvolutionConfig,
) -> Result<EnvelopeIter, DeconvolutionError> {
    ClassicDeconvoluter::new(isotopic_model).deconvolute(spectrum, mz_range, config)
}

/// A reusable deconvolution context that owns an isotopic model and a configuration
#[derive(Debug, Clone)]
pub struct DeconvolutionEngine<M: IsotopeModel = AveragineTable> {
    deconvoluter: ClassicDeconvoluter<M>,
    config: DeconvolutionConfig,
}

impl DeconvolutionEngine<AveragineTable> {
    /// Build an engine over a freshly computed [`AveragineTable`] for `model` that covers
    /// every mass a peak at or below `max_mz` can have within the charge range of `config`.
    pub fn from_averagine(
        model: IsotopicModels,
        config: DeconvolutionConfig,
        max_mz: f64,
    ) -> Result<Self, DeconvolutionError> {
        config.validate()?;
        if !max_mz.is_finite() || max_mz <= 0.0 {
            return Err(DeconvolutionError::InvalidMzRange {
                min: 0.0,
                max: max_mz,
            });
        }
        let max_mass = mz_to_mass(max_mz, config.max_charge, config.polarity);
        debug!("Sizing averagine table to {max_mass:.2} Da for m/z up to {max_mz}");
        let table = AveragineTable::with_max_mass(model, max_mass);
        Self::new(table, config)
    }
}

impl<M: IsotopeModel> DeconvolutionEngine<M> {
    /// Create an engine, rejecting an invalid `config` up front
    pub fn new(
        isotopic_model: M,
        config: DeconvolutionConfig,
    ) -> Result<Self, DeconvolutionError> {
        config.validate()?;
        Ok(Self {
            deconvoluter: ClassicDeconvoluter::new(isotopic_model),
            config,
        })
    }

    pub fn config(&self) -> &DeconvolutionConfig {
        &self.config
    }

    pub fn isotopic_model(&self) -> &M {
        &self.deconvoluter.isotopic_model
    }

    /// Deconvolute `spectrum`, producing envelopes lazily in descending score order
    ///
    /// # Arguments
    /// - `spectrum`: The centroided mass spectrum to process
    /// - `mz_range`: The window whose peaks may seed an isotopic envelope
    pub fn deconvolute_spectrum(
        &self,
        spectrum: &Spectrum,
        mz_range: MzRange,
    ) -> Result<EnvelopeIter, DeconvolutionError> {
        self.deconvoluter.deconvolute(spectrum, mz_range, &self.config)
    }

    /// Deconvolute a centroided peak list over its whole m/z range and collect the
    /// envelopes into a neutral mass peak list.
    pub fn deconvolute_peaks<C: CentroidLike>(
        &self,
        peaks: &MZPeakSetType<C>,
    ) -> Result<MassPeakSetType<DeconvolutedPeak>, DeconvolutionError> {
        let spectrum = Spectrum::from_peaks(peaks.iter())?;
        let envelopes: Vec<IsotopicEnvelope> = self
            .deconvolute_spectrum(&spectrum, MzRange::default())?
            .collect();
        debug!(
            "Deconvoluted {} peaks into {} envelopes",
            spectrum.len(),
            envelopes.len()
        );
        Ok(envelopes.iter().map(DeconvolutedPeak::from).collect())
    }
}
