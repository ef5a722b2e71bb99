//! The classic averagine isotopic envelope deconvolution algorithm.
//!
//! Every sufficiently intense peak in the requested window is treated as the most
//! abundant isotope of some ion. The charges suggested by the spacing of its
//! neighbors are each tested against the nearest averagine pattern, corroborated
//! with the same mass at adjacent charges, and the best scoring charge is kept.
//! The surviving envelopes are then greedily selected by score so that no two
//! share an observed peak.
use itertools::Itertools;
use mzpeaks::Tolerance;
use tracing::{debug, trace};

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use crate::charge::{adjacent_charges, spacing_charges};
use crate::config::{DeconvolutionConfig, MzRange};
use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
use crate::isotopic_model::{mass_to_mz, mz_to_mass, IsotopeModel, TheoreticalCluster};
use crate::scorer::{median, population_std_dev, ClassicEnvelopeScorer, EnvelopeScorer, ScoreType};
use crate::solution::{EnvelopePeak, IsotopicEnvelope};
use crate::spectrum::Spectrum;

/// Seeds more than this many times fainter than the window's base peak are skipped
pub const SEED_INTENSITY_FACTOR: f64 = 100.0;

/// Each multiple of this many charges requires one more corroborating adjacent charge state
pub const CHARGES_PER_CORROBORATION: i32 = 5;

#[derive(Debug, Default)]
pub struct DeconvoluterBuilder<M: IsotopeModel, S: EnvelopeScorer = ClassicEnvelopeScorer> {
    isotopic_model: Option<M>,
    scorer: Option<S>,
}

impl<M: IsotopeModel, S: EnvelopeScorer + Default> DeconvoluterBuilder<M, S> {
    pub fn new() -> Self {
        Self {
            isotopic_model: None,
            scorer: None,
        }
    }

    pub fn isotopic_model(mut self, value: M) -> Self {
        self.isotopic_model = Some(value);
        self
    }

    pub fn scoring(mut self, value: S) -> Self {
        self.scorer = Some(value);
        self
    }

    /// Build the deconvoluter, or `None` if no isotopic model was given
    pub fn create(self) -> Option<ClassicDeconvoluter<M, S>> {
        let model = self.isotopic_model?;
        Some(ClassicDeconvoluter::with_scorer(
            model,
            self.scorer.unwrap_or_default(),
        ))
    }
}

/// The classic deconvolution algorithm over an [`IsotopeModel`]
#[derive(Debug, Clone)]
pub struct ClassicDeconvoluter<M: IsotopeModel, S: EnvelopeScorer = ClassicEnvelopeScorer> {
    pub isotopic_model: M,
    pub scorer: S,
}

impl<M: IsotopeModel> ClassicDeconvoluter<M, ClassicEnvelopeScorer> {
    pub fn new(isotopic_model: M) -> Self {
        Self::with_scorer(isotopic_model, ClassicEnvelopeScorer::default())
    }
}

impl<M: IsotopeModel, S: EnvelopeScorer> ClassicDeconvoluter<M, S> {
    pub fn with_scorer(isotopic_model: M, scorer: S) -> Self {
        Self {
            isotopic_model,
            scorer,
        }
    }

    /// Find the best envelope for every seed peak in `mz_range`, before any selection
    /// between them, in seed order.
    pub fn candidate_envelopes(
        &self,
        spectrum: &Spectrum,
        mz_range: MzRange,
        config: &DeconvolutionConfig,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        config.validate()?;
        mz_range.validate()?;

        let window = spectrum.range_indices(mz_range.min, mz_range.max);
        if window.is_empty() {
            trace!("No peaks between {} and {}", mz_range.min, mz_range.max);
            return Ok(Vec::new());
        }
        let max_intensity = spectrum.max_intensity_in(window.clone());
        let search = EnvelopeSearch::new(spectrum, &self.isotopic_model, &self.scorer, config);
        let is_seed = |i: &usize| {
            let intensity = spectrum.intensity(*i);
            intensity > 0.0 && intensity * SEED_INTENSITY_FACTOR >= max_intensity
        };

        #[cfg(feature = "parallelism")]
        let found: Vec<Option<IsotopicEnvelope>> = window
            .clone()
            .into_par_iter()
            .filter(is_seed)
            .map(|i| search.best_envelope_for_seed(i))
            .collect::<Result<_, _>>()?;

        #[cfg(not(feature = "parallelism"))]
        let found: Vec<Option<IsotopicEnvelope>> = window
            .clone()
            .filter(is_seed)
            .map(|i| search.best_envelope_for_seed(i))
            .collect::<Result<_, _>>()?;

        let candidates: Vec<IsotopicEnvelope> = found.into_iter().flatten().collect();
        debug!(
            "Found {} candidate envelopes from {} peaks between {} and {}",
            candidates.len(),
            window.len(),
            mz_range.min,
            mz_range.max
        );
        Ok(candidates)
    }
}

impl<M: IsotopeModel, S: EnvelopeScorer> DeconvolutionAlgorithm for ClassicDeconvoluter<M, S> {
    type Envelopes = EnvelopeIter;

    #[tracing::instrument(level = "debug", skip_all)]
    fn deconvolute(
        &self,
        spectrum: &Spectrum,
        mz_range: MzRange,
        config: &DeconvolutionConfig,
    ) -> Result<Self::Envelopes, DeconvolutionError> {
        let candidates = self.candidate_envelopes(spectrum, mz_range, config)?;
        Ok(EnvelopeIter::new(candidates, spectrum.len()))
    }
}

/// A lazily evaluated sequence of envelopes ordered by descending score, skipping
/// any envelope that shares an observed peak with one already produced.
///
/// Envelopes with equal scores keep their seed order.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeIter {
    candidates: std::vec::IntoIter<IsotopicEnvelope>,
    used: Vec<bool>,
}

impl EnvelopeIter {
    pub fn new(candidates: Vec<IsotopicEnvelope>, peak_count: usize) -> Self {
        let candidates = candidates
            .into_iter()
            .sorted_by(|a, b| a.cmp_by_score_desc(b));
        Self {
            candidates,
            used: vec![false; peak_count],
        }
    }

    fn overlaps(&self, envelope: &IsotopicEnvelope) -> bool {
        envelope
            .peaks
            .iter()
            .any(|p| self.used.get(p.index).copied().unwrap_or_default())
    }
}

impl Iterator for EnvelopeIter {
    type Item = IsotopicEnvelope;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let envelope = self.candidates.next()?;
            if self.overlaps(&envelope) {
                trace!(
                    "Skipping envelope at {:.4} with charge {}, a peak is already used",
                    envelope.monoisotopic_mass,
                    envelope.charge
                );
                continue;
            }
            for p in envelope.peaks.iter() {
                if let Some(used) = self.used.get_mut(p.index) {
                    *used = true;
                }
            }
            return Some(envelope);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.candidates.size_hint().1)
    }
}

/// An envelope hypothesis still being assembled
#[derive(Debug, Clone)]
struct PutativeEnvelope {
    peaks: Vec<EnvelopePeak>,
    ratios: Vec<f64>,
    total_intensity: f64,
    monoisotopic_mass: f64,
    charge: i32,
    score: ScoreType,
    cluster_index: usize,
}

impl PutativeEnvelope {
    fn into_envelope(self, monoisotopic_mass: f64, ambiguity_ratio: f64) -> IsotopicEnvelope {
        let std_dev = population_std_dev(&self.ratios);
        IsotopicEnvelope::new(
            self.peaks,
            monoisotopic_mass,
            self.charge,
            self.total_intensity,
            self.score,
            std_dev,
            self.cluster_index,
            ambiguity_ratio,
        )
    }
}

/// The read-only state shared by every seed of one deconvolution call
struct EnvelopeSearch<'a, M: IsotopeModel, S: EnvelopeScorer> {
    spectrum: &'a Spectrum,
    model: &'a M,
    scorer: &'a S,
    config: &'a DeconvolutionConfig,
    tolerance: Tolerance,
}

impl<'a, M: IsotopeModel, S: EnvelopeScorer> EnvelopeSearch<'a, M, S> {
    fn new(
        spectrum: &'a Spectrum,
        model: &'a M,
        scorer: &'a S,
        config: &'a DeconvolutionConfig,
    ) -> Self {
        Self {
            spectrum,
            model,
            scorer,
            config,
            tolerance: config.tolerance(),
        }
    }

    fn lookup(&self, mass: f64) -> Result<&'a TheoreticalCluster, DeconvolutionError> {
        let cluster = self.model.nearest(mass)?;
        if cluster.is_empty() {
            return Err(DeconvolutionError::ModelUnavailable { mass });
        }
        Ok(cluster)
    }

    /// Test every charge suggested for the peak at `seed` and keep the best corroborated one
    fn best_envelope_for_seed(
        &self,
        seed: usize,
    ) -> Result<Option<IsotopicEnvelope>, DeconvolutionError> {
        let polarity = self.config.polarity;
        let seed_mz = self.spectrum.mz(seed);
        let mut best: Option<(PutativeEnvelope, Vec<f64>)> = None;

        for z in spacing_charges(self.spectrum, seed, self.config.charge_range()) {
            let charge = polarity.sign_charge(z);
            let mass = mz_to_mass(seed_mz, charge, polarity);
            let cluster = self.lookup(mass)?;

            let mut predictions = Vec::new();
            let mut putative = self.find_isotopic_envelope(seed, charge, cluster, &mut predictions);
            if putative.peaks.len() < 2 {
                continue;
            }

            let (n_adjacent, adjacent_score) =
                self.observe_adjacent_charge_states(seed_mz, charge, cluster, &mut predictions);
            putative.score += adjacent_score;

            trace!(
                "Seed {seed_mz:.4} at charge {charge} matched {} peaks with score {:.3}, {n_adjacent} adjacent charges",
                putative.peaks.len(),
                putative.score
            );

            let improves = best
                .as_ref()
                .map_or(true, |(b, _)| putative.score > b.score);
            if improves && z / CHARGES_PER_CORROBORATION <= n_adjacent as i32 {
                best = Some((putative, predictions));
            }
        }

        Ok(best.map(|(putative, predictions)| {
            let mono = median(&predictions).unwrap_or(putative.monoisotopic_mass);
            putative.into_envelope(mono, self.config.ambiguity_ratio)
        }))
    }

    /// Walk the theoretical isotopes of `cluster` from most to least abundant, matching
    /// each against the spectrum relative to the peak at `seed`. The walk stops at the
    /// first isotope that cannot be matched.
    ///
    /// One monoisotopic mass estimate per matched peak is appended to `predictions`.
    fn find_isotopic_envelope(
        &self,
        seed: usize,
        charge: i32,
        cluster: &TheoreticalCluster,
        predictions: &mut Vec<f64>,
    ) -> PutativeEnvelope {
        let polarity = self.config.polarity;
        let limit = self.config.intensity_ratio_limit;
        let masses = &cluster.theoretical_masses;
        let intensities = &cluster.theoretical_intensities;

        let seed_mz = self.spectrum.mz(seed);
        let seed_intensity = self.spectrum.intensity(seed);
        let seed_mass = mz_to_mass(seed_mz, charge, polarity);

        let peak_offset = seed_mass - masses[0];
        let monoisotopic_mass = seed_mass - cluster.monoisotopic_offset;
        predictions.push(monoisotopic_mass);

        let mut peaks = vec![EnvelopePeak::new(seed_mz, seed_intensity, seed)];
        let mut ratios = vec![intensities[0] / seed_intensity];
        let mut total_intensity = seed_intensity;

        for (theoretical_mass, theoretical_intensity) in cluster.iter().skip(1) {
            let target_mass = theoretical_mass + peak_offset;
            let Some(i) = self
                .spectrum
                .closest_index(mass_to_mz(target_mass, charge, polarity))
            else {
                break;
            };
            let observed_mz = self.spectrum.mz(i);
            let observed_intensity = self.spectrum.intensity(i);
            let observed_mass = mz_to_mass(observed_mz, charge, polarity);

            if !self.tolerance.test(observed_mass, target_mass) {
                break;
            }
            let expected = seed_intensity / intensities[0] * theoretical_intensity;
            if observed_intensity < expected / limit || observed_intensity > expected * limit {
                break;
            }
            if peaks.iter().any(|p| p.index == i) {
                break;
            }

            peaks.push(EnvelopePeak::new(observed_mz, observed_intensity, i));
            total_intensity += observed_intensity;
            ratios.push(theoretical_intensity / observed_intensity);
            predictions.push(monoisotopic_mass + observed_mass - target_mass);
        }

        let score = self.scorer.score(total_intensity, &ratios, charge);
        PutativeEnvelope {
            peaks,
            ratios,
            total_intensity,
            monoisotopic_mass,
            charge,
            score,
            cluster_index: cluster.index,
        }
    }

    /// Look for the most abundant isotope of the seed's mass at the charges next to `charge`,
    /// returning how many were found and their summed scores. Each direction stops at the
    /// first charge that is not found.
    fn observe_adjacent_charge_states(
        &self,
        seed_mz: f64,
        charge: i32,
        cluster: &TheoreticalCluster,
        predictions: &mut Vec<f64>,
    ) -> (usize, ScoreType) {
        let polarity = self.config.polarity;
        let most_abundant_mass = mz_to_mass(seed_mz, charge, polarity);
        let (below, above) = adjacent_charges(charge, self.config.charge_range(), polarity);

        let mut n_observed = 0;
        let mut score = 0.0;
        for direction in [below.collect_vec(), above.collect_vec()] {
            for z in direction {
                match self.find_charge_state_of_mass(most_abundant_mass, z, cluster, predictions) {
                    Some(s) => {
                        n_observed += 1;
                        score += s;
                    }
                    None => break,
                }
            }
        }
        (n_observed, score)
    }

    fn find_charge_state_of_mass(
        &self,
        mass: f64,
        charge: i32,
        cluster: &TheoreticalCluster,
        predictions: &mut Vec<f64>,
    ) -> Option<ScoreType> {
        let polarity = self.config.polarity;
        let i = self
            .spectrum
            .closest_index(mass_to_mz(mass, charge, polarity))?;
        let observed_mass = mz_to_mass(self.spectrum.mz(i), charge, polarity);
        if !self.tolerance.test(observed_mass, mass) {
            return None;
        }
        let corroborating = self.find_isotopic_envelope(i, charge, cluster, predictions);
        if corroborating.score > 0.0 {
            Some(corroborating.score)
        } else {
            // A lone peak adds exactly one estimate
            predictions.pop();
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Polarity;
    use crate::isotopic_model::{NEUTRON_SHIFT, PROTON};

    /// A model that returns the same pattern for every mass up to `max_mass`
    struct FixedShapeModel {
        cluster: TheoreticalCluster,
        max_mass: f64,
    }

    impl FixedShapeModel {
        fn new(shape: [f64; 4]) -> Self {
            let base = 1000.0;
            let cluster = TheoreticalCluster::from_isotopes(
                shape
                    .iter()
                    .enumerate()
                    .map(|(k, i)| (base + k as f64 * NEUTRON_SHIFT, *i)),
                base,
                7,
            );
            Self {
                cluster,
                max_mass: 20_000.0,
            }
        }
    }

    impl IsotopeModel for FixedShapeModel {
        fn nearest(&self, mass: f64) -> Result<&TheoreticalCluster, DeconvolutionError> {
            if mass > 0.0 && mass <= self.max_mass {
                Ok(&self.cluster)
            } else {
                Err(DeconvolutionError::ModelUnavailable { mass })
            }
        }
    }

    const SHAPE: [f64; 4] = [0.6, 1.0, 0.75, 0.3];

    /// The peaks of an isotopic series whose most abundant peak, the second isotope, is at `apex_mz`
    fn series(apex_mz: f64, charge: i32, shape: [f64; 4], scale: f64) -> Vec<(f64, f64)> {
        shape
            .iter()
            .enumerate()
            .map(|(k, i)| {
                (
                    apex_mz + (k as f64 - 1.0) * NEUTRON_SHIFT / charge as f64,
                    i * scale,
                )
            })
            .collect()
    }

    fn make_spectrum(groups: &[Vec<(f64, f64)>]) -> Spectrum {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = groups
            .iter()
            .flatten()
            .copied()
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .unzip();
        Spectrum::new(mz, intensity).unwrap()
    }

    fn config() -> DeconvolutionConfig {
        DeconvolutionConfig::default()
            .with_charge_range(1, 10)
            .with_tolerance_ppm(10.0)
            .with_intensity_ratio_limit(2.0)
    }

    fn run(
        spectrum: &Spectrum,
        config: &DeconvolutionConfig,
        shape: [f64; 4],
    ) -> Vec<IsotopicEnvelope> {
        let deconvoluter = ClassicDeconvoluter::new(FixedShapeModel::new(shape));
        deconvoluter
            .deconvolute(spectrum, MzRange::new(0.0, 5000.0), config)
            .unwrap()
            .collect()
    }

    fn check_result_invariants(envelopes: &[IsotopicEnvelope]) {
        for w in envelopes.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
        for (i, a) in envelopes.iter().enumerate() {
            assert!(a.len() >= 2);
            for b in envelopes.iter().skip(i + 1) {
                assert!(a.peaks.iter().all(|p| !b.contains_mz(p.mz)));
            }
        }
    }

    #[test_log::test]
    fn test_perfect_match() {
        let apex = 700.0;
        let spectrum = make_spectrum(&[series(apex, 2, SHAPE, 1000.0)]);
        let envelopes = run(&spectrum, &config(), SHAPE);
        check_result_invariants(&envelopes);

        assert_eq!(envelopes.len(), 1);
        let env = &envelopes[0];
        assert_eq!(env.charge, 2);
        assert_eq!(env.len(), 4);
        assert_eq!(env.cluster_index, 7);
        assert_eq!(env.most_abundant_observed_mz, apex);
        assert!(!env.is_ambiguous());
        assert_eq!(env.total_intensity, 2650.0);

        let expected = apex * 2.0 - 2.0 * PROTON - NEUTRON_SHIFT;
        assert!(
            (env.monoisotopic_mass - expected).abs() < 1e-6,
            "{} != {expected}",
            env.monoisotopic_mass
        );
        assert!(env.isotope_ratio_std_dev < 1e-12);
        let mzs: Vec<f64> = env.peaks_by_mz().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, spectrum.mz_array());
    }

    #[test_log::test]
    fn test_charge_ambiguity() {
        let spectrum = make_spectrum(&[
            series(500.0, 1, SHAPE, 1000.0),
            series(800.0, 2, SHAPE, 1000.0),
        ]);
        let envelopes = run(&spectrum, &config(), SHAPE);
        check_result_invariants(&envelopes);

        assert_eq!(envelopes.len(), 2);
        let mut charges: Vec<i32> = envelopes.iter().map(|e| e.charge).collect();
        charges.sort();
        assert_eq!(charges, vec![1, 2]);
        for env in envelopes.iter() {
            assert_eq!(env.len(), 4);
            let apex = if env.charge == 1 { 500.0 } else { 800.0 };
            assert_eq!(env.most_abundant_observed_mz, apex);
        }
    }

    #[test_log::test]
    fn test_intensity_floor() {
        let shape = [0.6, 1.0, 0.75, 0.005];
        let faint = vec![(900.0, 400.0), (900.0 + NEUTRON_SHIFT / 2.0, 300.0)];
        let spectrum = make_spectrum(&[series(700.0, 2, shape, 100_000.0), faint]);
        let envelopes = run(&spectrum, &config(), shape);
        check_result_invariants(&envelopes);

        assert_eq!(envelopes.len(), 1);
        let env = &envelopes[0];
        assert_eq!(env.len(), 4);
        // The faint fourth isotope supports the envelope without seeding one
        assert!(env.contains_mz(700.0 + NEUTRON_SHIFT));
        assert!(envelopes.iter().all(|e| !e.contains_mz(900.0)));
    }

    #[test_log::test]
    fn test_corroboration_required_for_high_charge() {
        let most_abundant_mass = 6000.0 - 10.0 * PROTON;
        let apex_at = |z: i32| (most_abundant_mass + z as f64 * PROTON) / z as f64;

        let lone = make_spectrum(&[series(apex_at(10), 10, SHAPE, 1000.0)]);
        let envelopes = run(&lone, &config(), SHAPE);
        check_result_invariants(&envelopes);
        assert!(envelopes.iter().all(|e| e.charge != 10));

        let corroborated = make_spectrum(&[
            series(apex_at(10), 10, SHAPE, 1000.0),
            series(apex_at(9), 9, SHAPE, 1000.0),
            series(apex_at(8), 8, SHAPE, 1000.0),
        ]);
        let envelopes = run(&corroborated, &config(), SHAPE);
        check_result_invariants(&envelopes);

        let mut charges: Vec<i32> = envelopes.iter().map(|e| e.charge).collect();
        charges.sort();
        assert_eq!(charges, vec![8, 9, 10]);

        let top = envelopes.iter().find(|e| e.charge == 10).unwrap();
        assert_eq!(top.len(), 4);
        let expected = most_abundant_mass - NEUTRON_SHIFT;
        assert!((top.monoisotopic_mass - expected).abs() < 1e-5);
        assert!((top.most_abundant_observed_isotopic_mass() - most_abundant_mass).abs() < 1e-6);
    }

    /// Ranks envelopes by intensity and peak count alone
    #[derive(Debug, Default, Clone, Copy)]
    struct IntensityCountScorer;

    impl EnvelopeScorer for IntensityCountScorer {
        fn score(&self, total_intensity: f64, ratios: &[f64], _charge: i32) -> ScoreType {
            if ratios.len() < 2 {
                0.0
            } else {
                total_intensity * ratios.len() as f64
            }
        }
    }

    #[test_log::test]
    fn test_uncorroborated_high_charge_gives_way() {
        let apex = 700.0;
        // A full charge 10 series and three peaks of a charge 2 series share the apex
        let high = series(apex, 10, SHAPE, 1000.0);
        let low: Vec<(f64, f64)> = series(apex, 2, SHAPE, 1000.0)
            .into_iter()
            .take(3)
            .filter(|(mz, _)| *mz != apex)
            .collect();
        let spectrum = make_spectrum(&[high, low]);

        let deconvoluter =
            ClassicDeconvoluter::with_scorer(FixedShapeModel::new(SHAPE), IntensityCountScorer);
        let config = config();
        let apex_index = spectrum.closest_index(apex).unwrap();
        let search = EnvelopeSearch::new(
            &spectrum,
            &deconvoluter.isotopic_model,
            &deconvoluter.scorer,
            &config,
        );

        // Charge 10 explains more intensity but has no neighboring charge state to back it
        let cluster = search.lookup(mz_to_mass(apex, 10, Polarity::Positive)).unwrap();
        let high_charge = search.find_isotopic_envelope(apex_index, 10, cluster, &mut Vec::new());
        let low_charge = search.find_isotopic_envelope(apex_index, 2, cluster, &mut Vec::new());
        assert_eq!(high_charge.peaks.len(), 4);
        assert_eq!(low_charge.peaks.len(), 3);
        assert!(high_charge.score > low_charge.score);

        let envelopes: Vec<_> = deconvoluter
            .deconvolute(&spectrum, MzRange::new(0.0, 5000.0), &config)
            .unwrap()
            .collect();
        check_result_invariants(&envelopes);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].charge, 2);
        assert_eq!(envelopes[0].len(), 3);
        assert_eq!(envelopes[0].most_abundant_observed_mz, apex);
        assert_eq!(envelopes[0].score, low_charge.score);
    }

    #[test]
    fn test_negative_polarity() {
        let apex = 700.0;
        let spectrum = make_spectrum(&[series(apex, 2, SHAPE, 1000.0)]);
        let config = config().with_polarity(Polarity::Negative);
        let envelopes = run(&spectrum, &config, SHAPE);

        assert_eq!(envelopes.len(), 1);
        let env = &envelopes[0];
        assert_eq!(env.charge, -2);
        assert_eq!(env.len(), 4);
        let expected = apex * 2.0 + 2.0 * PROTON - NEUTRON_SHIFT;
        assert!((env.monoisotopic_mass - expected).abs() < 1e-6);
    }

    #[test]
    fn test_scale_invariance() {
        let groups = [
            series(500.0, 1, SHAPE, 1000.0),
            series(800.0, 2, SHAPE, 1000.0),
        ];
        let spectrum = make_spectrum(&groups);
        let scaled = Spectrum::new(
            spectrum.mz_array().to_vec(),
            spectrum.intensity_array().iter().map(|i| i * 7.5).collect(),
        )
        .unwrap();

        let peak_sets = |envelopes: Vec<IsotopicEnvelope>| -> Vec<Vec<usize>> {
            envelopes
                .iter()
                .map(|e| e.peaks_by_mz().iter().map(|p| p.index).collect())
                .sorted()
                .collect()
        };

        let base = run(&spectrum, &config(), SHAPE);
        let base_total: f64 = base.iter().map(|e| e.total_intensity).sum();
        let other = run(&scaled, &config(), SHAPE);
        let other_total: f64 = other.iter().map(|e| e.total_intensity).sum();
        assert_eq!(peak_sets(base), peak_sets(other));
        assert!((other_total - base_total * 7.5).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let spectrum = make_spectrum(&[
            series(500.0, 1, SHAPE, 1000.0),
            series(800.0, 2, SHAPE, 2000.0),
            series(950.0, 3, SHAPE, 500.0),
        ]);
        let deconvoluter = ClassicDeconvoluter::new(FixedShapeModel::new(SHAPE));
        let iter = deconvoluter
            .deconvolute(&spectrum, MzRange::new(0.0, 5000.0), &config())
            .unwrap();
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        let third: Vec<_> = deconvoluter
            .deconvolute(&spectrum, MzRange::new(0.0, 5000.0), &config())
            .unwrap()
            .collect();
        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_empty_inputs() {
        let spectrum = make_spectrum(&[series(700.0, 2, SHAPE, 1000.0)]);
        let deconvoluter = ClassicDeconvoluter::new(FixedShapeModel::new(SHAPE));

        let mut it = deconvoluter
            .deconvolute(&Spectrum::default(), MzRange::new(0.0, 5000.0), &config())
            .unwrap();
        assert!(it.next().is_none());

        let mut it = deconvoluter
            .deconvolute(&spectrum, MzRange::new(1000.0, 2000.0), &config())
            .unwrap();
        assert!(it.next().is_none());

        let mut it = deconvoluter
            .deconvolute(&spectrum, MzRange::new(10.0, 20.0), &config())
            .unwrap();
        assert!(it.next().is_none());
    }

    #[test]
    fn test_window_limits_seeds() {
        let spectrum = make_spectrum(&[
            series(500.0, 1, SHAPE, 1000.0),
            series(800.0, 2, SHAPE, 1000.0),
        ]);
        let deconvoluter = ClassicDeconvoluter::new(FixedShapeModel::new(SHAPE));
        let envelopes: Vec<_> = deconvoluter
            .deconvolute(&spectrum, MzRange::new(790.0, 810.0), &config())
            .unwrap()
            .collect();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].charge, 2);
    }

    #[test]
    fn test_configuration_errors() {
        let spectrum = make_spectrum(&[series(700.0, 2, SHAPE, 1000.0)]);
        let deconvoluter = ClassicDeconvoluter::new(FixedShapeModel::new(SHAPE));
        let range = MzRange::new(0.0, 5000.0);

        let err = deconvoluter
            .deconvolute(&spectrum, range, &config().with_charge_range(4, 2))
            .unwrap_err();
        assert_eq!(err, DeconvolutionError::InvalidChargeRange { min: 4, max: 2 });

        let err = deconvoluter
            .deconvolute(&Spectrum::default(), range, &config().with_tolerance_ppm(-1.0))
            .unwrap_err();
        assert_eq!(err, DeconvolutionError::InvalidTolerance(-1.0));

        let err = deconvoluter
            .deconvolute(&spectrum, MzRange::new(10.0, 5.0), &config())
            .unwrap_err();
        assert!(matches!(err, DeconvolutionError::InvalidMzRange { .. }));
    }

    #[test]
    fn test_model_unavailable() {
        let spectrum = make_spectrum(&[series(700.0, 2, SHAPE, 1000.0)]);
        let mut model = FixedShapeModel::new(SHAPE);
        model.max_mass = 1000.0;
        let deconvoluter = ClassicDeconvoluter::new(model);
        let err = deconvoluter
            .deconvolute(&spectrum, MzRange::new(0.0, 5000.0), &config())
            .unwrap_err();
        assert!(matches!(err, DeconvolutionError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_builder() {
        let deconvoluter: Option<ClassicDeconvoluter<FixedShapeModel>> =
            DeconvoluterBuilder::new().create();
        assert!(deconvoluter.is_none());

        let deconvoluter = DeconvoluterBuilder::new()
            .isotopic_model(FixedShapeModel::new(SHAPE))
            .scoring(ClassicEnvelopeScorer::default())
            .create()
            .unwrap();
        let spectrum = make_spectrum(&[series(700.0, 2, SHAPE, 1000.0)]);
        let n = deconvoluter
            .deconvolute(&spectrum, MzRange::new(0.0, 5000.0), &config())
            .unwrap()
            .count();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_envelope_iter_selection() {
        let make = |score: f64, indices: &[usize]| {
            let peaks = indices
                .iter()
                .map(|i| EnvelopePeak::new(100.0 + *i as f64, 10.0, *i))
                .collect();
            IsotopicEnvelope::new(peaks, 1000.0, 1, 20.0, score, 0.0, 0, 0.9)
        };
        let candidates = vec![
            make(5.0, &[0, 1]),
            make(10.0, &[1, 2]),
            make(7.0, &[3, 4]),
            make(7.0, &[4, 5]),
        ];
        let selected: Vec<f64> = EnvelopeIter::new(candidates, 6)
            .map(|e| e.score)
            .collect();
        assert_eq!(selected, vec![10.0, 7.0]);
    }
}
