//! Classic averagine isotopic envelope deconvolution for centroided mass spectra.
//!
//! Peaks are grouped into [`IsotopicEnvelope`]s by matching them against theoretical
//! isotopic patterns looked up from an [`IsotopeModel`], most commonly a precomputed
//! [`AveragineTable`]. See [`api::deconvolute_spectrum`] and [`DeconvolutionEngine`].
pub mod api;
pub mod charge;
pub mod config;
pub mod deconv_traits;
pub mod deconvoluter;
pub mod isotopic_model;
pub mod scorer;
pub mod solution;
pub mod spectrum;

pub use crate::api::{deconvolute_spectrum, DeconvolutionEngine};
pub use crate::config::{DeconvolutionConfig, MzRange, Polarity};
pub use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
pub use crate::deconvoluter::{ClassicDeconvoluter, EnvelopeIter};
pub use crate::isotopic_model::{AveragineTable, IsotopeModel, IsotopicModels, TheoreticalCluster};
pub use crate::solution::{EnvelopePeak, IsotopicEnvelope};
pub use crate::spectrum::{Spectrum, SpectrumError};
