//! Charge state hypothesis generation
use std::cmp;

use crate::config::Polarity;
use crate::spectrum::Spectrum;

/// The largest m/z gap two isotopic peaks of a charge 1 ion could plausibly have
pub const MAX_ISOTOPE_SPACING: f64 = 1.1;

pub type ChargeRange = (i32, i32);

/// Iterate over every charge in an inclusive range, signed by a polarity
#[derive(Debug, Clone)]
pub struct ChargeRangeIter {
    sign: i32,
    front: i32,
    back: i32,
}

impl ChargeRangeIter {
    pub fn new(min: i32, max: i32, polarity: Polarity) -> ChargeRangeIter {
        let low = cmp::min(min.abs(), max.abs());
        let high = cmp::max(min.abs(), max.abs());
        ChargeRangeIter {
            sign: polarity.sign(),
            front: low,
            back: high,
        }
    }

    /// An iterator that yields nothing, used when `min` would exceed `max`
    pub fn empty(polarity: Polarity) -> ChargeRangeIter {
        ChargeRangeIter {
            sign: polarity.sign(),
            front: 1,
            back: 0,
        }
    }

    pub fn next_charge(&mut self) -> Option<i32> {
        if self.front > self.back {
            None
        } else {
            let z = self.front * self.sign;
            self.front += 1;
            Some(z)
        }
    }
}

impl Iterator for ChargeRangeIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.next_charge()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.back - self.front + 1).max(0) as usize;
        (n, Some(n))
    }
}

impl DoubleEndedIterator for ChargeRangeIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front > self.back {
            None
        } else {
            let z = self.back * self.sign;
            self.back -= 1;
            Some(z)
        }
    }
}

impl ExactSizeIterator for ChargeRangeIter {}

/// The charges adjacent to `charge` within `charge_range`, as a pair of iterators walking
/// away from it, first toward the lower bound, then toward the upper bound.
pub fn adjacent_charges(
    charge: i32,
    charge_range: ChargeRange,
    polarity: Polarity,
) -> (std::iter::Rev<ChargeRangeIter>, ChargeRangeIter) {
    let z = charge.abs();
    let (min_charge, max_charge) = charge_range;
    let below = if z - 1 >= min_charge {
        ChargeRangeIter::new(min_charge, z - 1, polarity)
    } else {
        ChargeRangeIter::empty(polarity)
    };
    let above = if z + 1 <= max_charge {
        ChargeRangeIter::new(z + 1, max_charge, polarity)
    } else {
        ChargeRangeIter::empty(polarity)
    };
    (below.rev(), above)
}

/// Infer the charge states a peak's isotopic pattern could have from the spacing
/// between it and the peaks that follow it.
///
/// Every neighbor less than [`MAX_ISOTOPE_SPACING`] away suggests the charges
/// `floor(1 / Δmz)` and `floor(1 / Δmz) + 1`. Charges outside `charge_range` are
/// dropped. The result is ordered by ascending magnitude, without sign.
pub fn spacing_charges(
    spectrum: &Spectrum,
    position: usize,
    charge_range: ChargeRange,
) -> ChargeListIter {
    let (min_charge, max_charge) = charge_range;
    if max_charge < 1 || min_charge > max_charge {
        return ChargeListIter::default();
    }
    let mzs = spectrum.mz_array();
    let Some(base) = mzs.get(position).copied() else {
        return ChargeListIter::default();
    };

    let mut charges: Vec<i32> = Vec::new();
    for other in mzs.iter().skip(position + 1) {
        let diff = other - base;
        if diff >= MAX_ISOTOPE_SPACING {
            break;
        }
        let raw_charge = 1.0 / diff;
        if !raw_charge.is_finite() {
            continue;
        }
        let lower = raw_charge.floor() as i32;
        charges.extend(
            [lower, lower.saturating_add(1)]
                .into_iter()
                .filter(|z| *z >= min_charge && *z <= max_charge),
        );
    }
    charges.sort_unstable();
    charges.dedup();
    charges.into()
}

#[derive(Debug, Default, Clone)]
pub struct ChargeListIter {
    valid: Vec<i32>,
    index: usize,
}

impl ChargeListIter {
    pub fn new(valid: Vec<i32>) -> Self {
        Self { valid, index: 0 }
    }

    pub fn next_charge(&mut self) -> Option<i32> {
        if self.index < self.valid.len() {
            let val = self.valid[self.index];
            self.index += 1;
            Some(val)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.valid.len() - self.index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for ChargeListIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.next_charge()
    }
}

impl From<Vec<i32>> for ChargeListIter {
    fn from(value: Vec<i32>) -> Self {
        Self::new(value)
    }
}
