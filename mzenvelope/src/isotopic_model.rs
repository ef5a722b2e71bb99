/*! Isotopic models for looking up theoretical isotopic clusters by neutral mass */
use std::collections::hash_map::{self, HashMap};
use std::hash;

#[doc(hidden)]
pub use chemical_elements::isotopic_pattern::{
    BafflingRecursiveIsotopicPatternGenerator, Peak as TheoreticalPeak, TheoreticalIsotopicPattern,
};

use chemical_elements::{neutral_mass, ChemicalComposition, ElementSpecification, PROTON as _PROTON};

use tracing::{debug, trace};

use crate::config::Polarity;
use crate::deconv_traits::DeconvolutionError;

/// The mass of H+, a hydrogen atom minus an electron
pub const PROTON: f64 = _PROTON;

/// The mass difference between isotopes `C[13]` and `C[12]`. Not precisely universal, but the
/// majority of expected applications are carbon-based
pub const NEUTRON_SHIFT: f64 = 1.0033548378;

/// Convert an observed m/z to a neutral mass at a charge magnitude `charge` under `polarity`.
///
/// ```math
/// M = \begin{cases}
///     mz \cdot z - z \cdot m_p & \text{positive} \\
///     mz \cdot z + z \cdot m_p & \text{negative}
/// \end{cases}
/// ```
#[inline]
pub fn mz_to_mass(mz: f64, charge: i32, polarity: Polarity) -> f64 {
    let z = charge.abs() as f64;
    match polarity {
        Polarity::Positive => mz * z - z * PROTON,
        Polarity::Negative => mz * z + z * PROTON,
    }
}

/// The inverse of [`mz_to_mass`]
#[inline]
pub fn mass_to_mz(mass: f64, charge: i32, polarity: Polarity) -> f64 {
    let z = charge.abs() as f64;
    match polarity {
        Polarity::Positive => (mass + z * PROTON) / z,
        Polarity::Negative => (mass - z * PROTON) / z,
    }
}

/// A fractional elemental composition with non-ordinal element counts used to represent
/// "averaged" chemical compositions.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FractionalComposition<'a>(HashMap<ElementSpecification<'a>, f64>);

impl<'a> Extend<(ElementSpecification<'a>, f64)> for FractionalComposition<'a> {
    fn extend<T: IntoIterator<Item = (ElementSpecification<'a>, f64)>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl<'a> FromIterator<(ElementSpecification<'a>, f64)> for FractionalComposition<'a> {
    fn from_iter<T: IntoIterator<Item = (ElementSpecification<'a>, f64)>>(iter: T) -> Self {
        let mut this = Self::default();
        this.extend(iter);
        this
    }
}

impl<'a> FractionalComposition<'a> {
    #[inline]
    pub fn get<Q>(&self, k: &Q) -> Option<&f64>
    where
        ElementSpecification<'a>: std::borrow::Borrow<Q>,
        Q: hash::Hash + Eq + ?Sized,
    {
        self.0.get(k)
    }

    #[inline]
    pub fn iter(&self) -> hash_map::Iter<'_, ElementSpecification<'a>, f64> {
        self.0.iter()
    }

    /// The mass of one "average monomer"
    #[inline]
    pub fn mass(&self) -> f64 {
        self.iter()
            .map(|(e, c)| e.element.most_abundant_mass * *c)
            .sum()
    }

    pub fn insert(&mut self, k: ElementSpecification<'a>, v: f64) -> Option<f64> {
        self.0.insert(k, v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A set of named average monomer compositions for biomolecules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsotopicModels {
    #[default]
    Peptide,
    Glycan,
    Glycopeptide,
    PermethylatedGlycan,
    Heparin,
    HeparanSulfate,
}

impl IsotopicModels {
    fn composition(&self) -> Vec<(&'static str, f64)> {
        match self {
            IsotopicModels::Peptide => vec![
                ("H", 7.7583f64),
                ("C", 4.9384),
                ("S", 0.0417),
                ("O", 1.4773),
                ("N", 1.3577),
            ],
            IsotopicModels::Glycan => vec![("H", 11.8333), ("C", 7.0), ("O", 5.16666), ("N", 0.5)],
            IsotopicModels::Glycopeptide => vec![
                ("H", 15.75),
                ("C", 10.93),
                ("S", 0.02054),
                ("O", 6.4773),
                ("N", 1.6577),
            ],
            IsotopicModels::PermethylatedGlycan => {
                vec![("C", 12.0), ("H", 21.8333), ("N", 0.5), ("O", 5.16666)]
            }
            IsotopicModels::Heparin => {
                vec![("H", 10.5), ("C", 6.0), ("S", 0.5), ("O", 5.5), ("N", 0.5)]
            }
            IsotopicModels::HeparanSulfate => vec![
                ("H", 10.667),
                ("C", 6.0),
                ("S", 1.333),
                ("O", 9.0),
                ("N", 0.667),
            ],
        }
    }
}

/// A package of parameters used when generating theoretical isotopic patterns for a table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopicPatternParams {
    /// The cumulative abundance percentage of isotopic signal to retain
    pub truncate_after: f64,
    /// The minimum abundance percentage of isotopic signal a peak must have
    /// to be kept
    pub ignore_below: f64,
}

impl Default for IsotopicPatternParams {
    fn default() -> Self {
        Self {
            truncate_after: 0.999,
            ignore_below: 0.0001,
        }
    }
}

impl IsotopicPatternParams {
    pub fn new(truncate_after: f64, ignore_below: f64) -> Self {
        Self {
            truncate_after,
            ignore_below,
        }
    }
}

/// A theoretical isotopic cluster for a single neutral mass.
///
/// `theoretical_masses` and `theoretical_intensities` are parallel and ordered by
/// *descending* intensity, so index 0 is always the most abundant isotope. Intensities
/// are relative to that peak.
#[derive(Debug, Clone, PartialEq)]
pub struct TheoreticalCluster {
    pub theoretical_masses: Vec<f64>,
    pub theoretical_intensities: Vec<f64>,
    /// The mass of the most abundant isotope minus the monoisotopic mass
    pub monoisotopic_offset: f64,
    /// Which bucket of the owning model this cluster came from
    pub index: usize,
}

impl TheoreticalCluster {
    pub fn new(
        theoretical_masses: Vec<f64>,
        theoretical_intensities: Vec<f64>,
        monoisotopic_offset: f64,
        index: usize,
    ) -> Self {
        Self {
            theoretical_masses,
            theoretical_intensities,
            monoisotopic_offset,
            index,
        }
    }

    /// Build a cluster from isotopic peaks in any order, normalizing the intensities
    /// to the most abundant peak and sorting them from most to least abundant.
    ///
    /// The monoisotopic offset is never negative.
    pub fn from_isotopes(
        isotopes: impl IntoIterator<Item = (f64, f64)>,
        monoisotopic_mass: f64,
        index: usize,
    ) -> Self {
        let mut isotopes: Vec<(f64, f64)> = isotopes.into_iter().collect();
        isotopes.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.total_cmp(&b.0)));
        let top = isotopes.first().map(|(_, i)| *i).unwrap_or(1.0);
        let (theoretical_masses, theoretical_intensities): (Vec<_>, Vec<_>) =
            isotopes.into_iter().map(|(m, i)| (m, i / top)).unzip();
        let monoisotopic_offset = theoretical_masses
            .first()
            .map(|m| (m - monoisotopic_mass).max(0.0))
            .unwrap_or_default();
        Self::new(
            theoretical_masses,
            theoretical_intensities,
            monoisotopic_offset,
            index,
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.theoretical_masses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.theoretical_masses.is_empty()
    }

    /// The mass of the most abundant theoretical isotope
    #[inline]
    pub fn most_abundant_mass(&self) -> f64 {
        self.theoretical_masses[0]
    }

    /// The monoisotopic mass of the cluster
    #[inline]
    pub fn monoisotopic_mass(&self) -> f64 {
        self.most_abundant_mass() - self.monoisotopic_offset
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.theoretical_masses
            .iter()
            .copied()
            .zip(self.theoretical_intensities.iter().copied())
    }
}

/// The capability to look up the theoretical isotopic cluster closest to a given
/// neutral mass.
///
/// Implementations must be pure and read-only so that a single model can be shared
/// between concurrent lookups.
pub trait IsotopeModel: Send + Sync {
    /// Find the precomputed cluster whose most abundant isotope is nearest to `mass`
    fn nearest(&self, mass: f64) -> Result<&TheoreticalCluster, DeconvolutionError>;
}

impl<T: IsotopeModel + ?Sized> IsotopeModel for &T {
    fn nearest(&self, mass: f64) -> Result<&TheoreticalCluster, DeconvolutionError> {
        (**self).nearest(mass)
    }
}

impl<T: IsotopeModel + ?Sized> IsotopeModel for Box<T> {
    fn nearest(&self, mass: f64) -> Result<&TheoreticalCluster, DeconvolutionError> {
        (**self).nearest(mass)
    }
}

/// A model for converting a neutral mass into a theoretical isotopic pattern based upon
/// an "average monomer" and linear extension.
///
/// This is an implementation of Senko's Averagine [^1]
///
/// # References
/// [^1]: Senko M, Beu S, McLafferty F: Determination of Monoisotopic Masses and Ion
///       Populations for Large Biomolecules from Resolved Isotopic Distributions.
///       Journal of the American Society for Mass Spectrometry 1995, 6:229-233
///       <https://doi.org/10.1016/1044-0305(95)00017-8>
#[derive(Debug, Clone)]
pub struct IsotopicModel<'lifespan> {
    /// The "average" monomer composition
    pub base_composition: FractionalComposition<'lifespan>,
    /// The mass of the average monomer to interpolate with
    pub base_mass: f64,
    generator: BafflingRecursiveIsotopicPatternGenerator<'lifespan>,
}

impl<'lifespan: 'transient, 'transient> IsotopicModel<'lifespan> {
    pub fn new(base_composition: FractionalComposition<'lifespan>) -> Self {
        Self {
            base_mass: base_composition.mass(),
            base_composition,
            generator: BafflingRecursiveIsotopicPatternGenerator::new(),
        }
    }

    /// Scale the average monomer to `mass` and round each element to the nearest whole count
    pub fn scale(&self, mass: f64) -> ChemicalComposition<'transient> {
        let scale = mass / self.base_mass;

        let mut scaled = ChemicalComposition::new();
        for (elt, count) in self.base_composition.iter() {
            scaled.set(*elt, (*count * scale).round() as i32);
        }
        scaled
    }

    /// Generate the theoretical cluster for the averagine closest to `mass`, labeled
    /// with bucket `index`.
    pub fn theoretical_cluster(
        &mut self,
        mass: f64,
        params: IsotopicPatternParams,
        index: usize,
    ) -> TheoreticalCluster {
        let composition = self.scale(mass);
        let composition_mass = composition.mass();
        let peaks = self
            .generator
            .isotopic_variants(composition, 0, 1, PROTON);
        let tid = TheoreticalIsotopicPattern::from(peaks)
            .truncate_after(params.truncate_after)
            .ignore_below(params.ignore_below);
        let isotopes: Vec<(f64, f64)> = tid
            .iter()
            .map(|p| (neutral_mass(p.mz(), 1, PROTON), p.intensity() as f64))
            .collect();
        // Prefer the pattern's own monoisotopic peak so both masses share one rounding path
        let monoisotopic_mass = isotopes
            .iter()
            .map(|(m, _)| *m)
            .min_by(|a, b| a.total_cmp(b))
            .filter(|m| (m - composition_mass).abs() < NEUTRON_SHIFT / 2.0)
            .unwrap_or(composition_mass);
        TheoreticalCluster::from_isotopes(isotopes, monoisotopic_mass, index)
    }
}

impl From<IsotopicModels> for IsotopicModel<'_> {
    fn from(source: IsotopicModels) -> IsotopicModel<'static> {
        let composition: FractionalComposition<'static> = source
            .composition()
            .into_iter()
            .filter_map(|(e, c)| e.parse::<ElementSpecification>().ok().map(|e| (e, c)))
            .collect();
        IsotopicModel::new(composition)
    }
}

/// A table of averagine isotopic clusters precomputed on a regular mass grid.
///
/// Bucket `i` holds the cluster for an averagine of mass `i * bin_width`. Bucket 0 is
/// never populated, lookups always resolve to the populated bucket whose most abundant
/// isotope is closest to the query.
#[derive(Debug, Clone)]
pub struct AveragineTable {
    clusters: Vec<TheoreticalCluster>,
    most_abundant_masses: Vec<f64>,
    bin_width: f64,
}

impl AveragineTable {
    pub const DEFAULT_MAX_MASS: f64 = 100_000.0;
    pub const DEFAULT_BIN_WIDTH: f64 = 50.0;

    /// Precompute clusters for every `bin_width` step up to and including `max_mass`
    pub fn new(
        model: IsotopicModels,
        max_mass: f64,
        bin_width: f64,
        params: IsotopicPatternParams,
    ) -> Self {
        let mut generator: IsotopicModel = model.into();
        let n_bins = (max_mass / bin_width).ceil() as usize;
        trace!("Building averagine table with {n_bins} bins of {bin_width} Da");
        let clusters: Vec<TheoreticalCluster> = (1..=n_bins)
            .map(|i| generator.theoretical_cluster(i as f64 * bin_width, params, i))
            .filter(|c| !c.is_empty())
            .collect();
        let most_abundant_masses = clusters.iter().map(|c| c.most_abundant_mass()).collect();
        debug!(
            "Built averagine table for {model:?} with {} clusters",
            clusters.len()
        );
        Self {
            clusters,
            most_abundant_masses,
            bin_width,
        }
    }

    /// A table over masses up to `max_mass` with the default bin width and pattern parameters
    pub fn with_max_mass(model: IsotopicModels, max_mass: f64) -> Self {
        Self::new(
            model,
            max_mass,
            Self::DEFAULT_BIN_WIDTH,
            IsotopicPatternParams::default(),
        )
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TheoreticalCluster> {
        self.clusters.iter()
    }

    /// The largest most-abundant-isotope mass this table can serve
    pub fn max_mass(&self) -> f64 {
        self.most_abundant_masses
            .last()
            .copied()
            .unwrap_or_default()
    }

    fn closest_position(&self, mass: f64) -> usize {
        let masses = &self.most_abundant_masses;
        let i = masses.partition_point(|m| *m < mass);
        if i == 0 {
            0
        } else if i == masses.len() {
            i - 1
        } else if mass - masses[i - 1] > masses[i] - mass {
            i
        } else {
            i - 1
        }
    }
}

impl Default for AveragineTable {
    fn default() -> Self {
        Self::with_max_mass(IsotopicModels::Peptide, Self::DEFAULT_MAX_MASS)
    }
}

impl IsotopeModel for AveragineTable {
    fn nearest(&self, mass: f64) -> Result<&TheoreticalCluster, DeconvolutionError> {
        if !mass.is_finite()
            || mass <= 0.0
            || self.is_empty()
            || mass > self.max_mass() + self.bin_width
        {
            return Err(DeconvolutionError::ModelUnavailable { mass });
        }
        Ok(&self.clusters[self.closest_position(mass)])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    #[test]
    fn test_fc() {
        let model: IsotopicModel = IsotopicModels::Peptide.into();
        assert_eq!(model.base_composition.get("C").copied(), Some(4.9384));
        assert_eq!(model.base_composition.len(), 5);
        assert_is_close!(model.base_mass, 111.05, 0.1, "averagine mass");
    }

    #[test]
    fn test_mass_conversion() {
        let mass = mz_to_mass(500.0, 2, Polarity::Positive);
        assert_is_close!(mass, 1000.0 - 2.0 * PROTON, 1e-9, "mass");
        assert_is_close!(mass_to_mz(mass, 2, Polarity::Positive), 500.0, 1e-9, "m/z");

        let mass = mz_to_mass(500.0, 2, Polarity::Negative);
        assert_is_close!(mass, 1000.0 + 2.0 * PROTON, 1e-9, "mass");
        assert_is_close!(mass_to_mz(mass, 2, Polarity::Negative), 500.0, 1e-9, "m/z");
        assert_is_close!(mass_to_mz(mass, -2, Polarity::Negative), 500.0, 1e-9, "m/z");
    }

    #[test]
    fn test_cluster_from_isotopes() {
        let cluster = TheoreticalCluster::from_isotopes(
            [(1000.0, 30.0), (1001.0, 60.0), (1002.0, 45.0)],
            1000.0,
            3,
        );
        assert_eq!(cluster.theoretical_masses, vec![1001.0, 1002.0, 1000.0]);
        assert_eq!(cluster.theoretical_intensities, vec![1.0, 0.75, 0.5]);
        assert_is_close!(cluster.monoisotopic_offset, 1.0, 1e-12, "offset");
        assert_is_close!(cluster.monoisotopic_mass(), 1000.0, 1e-12, "monoisotopic mass");
        assert_eq!(cluster.index, 3);

        // Rounding noise must not push the apex below the monoisotopic mass
        let cluster = TheoreticalCluster::from_isotopes(
            [(691.365326, 100.0), (692.368681, 38.0)],
            691.365326 + 1e-13,
            14,
        );
        assert_eq!(cluster.monoisotopic_offset, 0.0);
        assert!(cluster.monoisotopic_mass() <= cluster.most_abundant_mass());
    }

    #[test]
    fn test_averagine_table() {
        let table = AveragineTable::with_max_mass(IsotopicModels::Peptide, 5000.0);
        assert_eq!(table.len(), 100);

        for cluster in table.iter() {
            assert_eq!(cluster.theoretical_intensities[0], 1.0);
            assert!(cluster.monoisotopic_mass() <= cluster.most_abundant_mass());
            assert!(cluster
                .theoretical_intensities
                .windows(2)
                .all(|w| w[0] >= w[1]));
            assert!(cluster.monoisotopic_offset >= 0.0);
        }

        // Small averagines are dominated by the monoisotopic peak
        let small = table.nearest(500.0).unwrap();
        assert_is_close!(small.monoisotopic_offset, 0.0, 1e-3, "offset");

        // Larger ones shift the apex away from the monoisotopic peak
        let large = table.nearest(4500.0).unwrap();
        assert!(large.monoisotopic_offset > 1.0);
        assert_is_close!(large.most_abundant_mass(), 4500.0, 50.0, "apex mass");
        assert!(large.len() > small.len());
    }

    #[test]
    fn test_averagine_table_unavailable() {
        let table = AveragineTable::with_max_mass(IsotopicModels::Peptide, 1000.0);
        assert!(table.nearest(f64::NAN).is_err());
        assert!(table.nearest(-10.0).is_err());
        assert!(matches!(
            table.nearest(5000.0),
            Err(DeconvolutionError::ModelUnavailable { .. })
        ));
        assert!(table.nearest(1020.0).is_ok());
    }
}
