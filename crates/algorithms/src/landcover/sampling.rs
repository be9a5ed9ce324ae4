//! Stratified random sampling of training pixels
//!
//! Draws a per-class quota of valid pixels from a class image, reads the
//! feature image at those pixels and splits the points into training and
//! testing sets with a uniform random draw per point.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

use bapcomp_core::{Error, RasterImage, Result};

/// How the total point budget is divided across classes
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// `total / n_classes` points for every class present
    Balanced,
    /// `total × weight` points for each listed class; other classes are skipped
    Weighted(Vec<(u16, f64)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlan {
    /// Point budget across all classes
    pub total: usize,
    pub allocation: Allocation,
    /// Fraction of points assigned to training, in `[0, 1]`
    pub train_fraction: f64,
}

impl Default for SamplePlan {
    fn default() -> Self {
        Self {
            total: 5000,
            allocation: Allocation::Balanced,
            train_fraction: 0.7,
        }
    }
}

/// One sampled pixel
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub row: usize,
    pub col: usize,
    pub class: u16,
    /// Feature values in [`SampleSet::feature_names`] order
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    pub feature_names: Vec<String>,
    pub training: Vec<Sample>,
    pub testing: Vec<Sample>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.training.len() + self.testing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.training.is_empty() && self.testing.is_empty()
    }

    /// Points drawn per class, training and testing together
    pub fn class_counts(&self) -> BTreeMap<u16, usize> {
        let mut counts = BTreeMap::new();
        for s in self.training.iter().chain(&self.testing) {
            *counts.entry(s.class).or_insert(0) += 1;
        }
        counts
    }
}

/// Sample pixels of `class_image` (first band) stratified by class.
///
/// Only pixels valid in both images are candidates. A class with fewer
/// candidates than its quota contributes all of them. The same `seed`
/// always yields the same points and split.
pub fn stratified_sample(
    class_image: &RasterImage,
    features: &RasterImage,
    plan: &SamplePlan,
    seed: u64,
) -> Result<SampleSet> {
    if class_image.shape() != features.shape() {
        let (er, ec) = class_image.shape();
        let (ar, ac) = features.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    if !(0.0..=1.0).contains(&plan.train_fraction) {
        return Err(Error::InvalidParameter {
            name: "train_fraction",
            value: plan.train_fraction.to_string(),
            reason: "must lie in [0, 1]".into(),
        });
    }

    let classes = &class_image.bands()[0].data;
    let (rows, cols) = class_image.shape();
    let mut candidates: BTreeMap<u16, Vec<(usize, usize)>> = BTreeMap::new();
    for row in 0..rows {
        for col in 0..cols {
            if !class_image.is_valid(row, col) || !features.is_valid(row, col) {
                continue;
            }
            let value = unsafe { classes.get_unchecked(row, col) };
            if value.is_finite() && value >= 0.0 && value <= u16::MAX as f64 {
                candidates
                    .entry(value.round() as u16)
                    .or_default()
                    .push((row, col));
            }
        }
    }

    let quotas = quotas(plan, &candidates)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut set = SampleSet {
        feature_names: features.band_names().into_iter().map(String::from).collect(),
        ..Default::default()
    };

    for (class, quota) in quotas {
        let Some(pixels) = candidates.get(&class) else {
            continue;
        };
        let picked: Vec<(usize, usize)> = pixels.choose_multiple(&mut rng, quota).copied().collect();
        for (row, col) in picked {
            let sample = Sample {
                row,
                col,
                class,
                features: features
                    .bands()
                    .iter()
                    .map(|b| unsafe { b.data.get_unchecked(row, col) })
                    .collect(),
            };
            if rng.gen::<f64>() < plan.train_fraction {
                set.training.push(sample);
            } else {
                set.testing.push(sample);
            }
        }
    }

    debug!(
        training = set.training.len(),
        testing = set.testing.len(),
        classes = candidates.len(),
        "stratified sample drawn"
    );
    Ok(set)
}

fn quotas(
    plan: &SamplePlan,
    candidates: &BTreeMap<u16, Vec<(usize, usize)>>,
) -> Result<Vec<(u16, usize)>> {
    match &plan.allocation {
        Allocation::Balanced => {
            if candidates.is_empty() {
                return Ok(Vec::new());
            }
            let per_class = (plan.total as f64 / candidates.len() as f64).round() as usize;
            Ok(candidates.keys().map(|&c| (c, per_class)).collect())
        }
        Allocation::Weighted(weights) => weights
            .iter()
            .map(|&(class, w)| {
                if !(w.is_finite() && w >= 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "weight",
                        value: w.to_string(),
                        reason: format!("weight for class {} must be non-negative", class),
                    });
                }
                Ok((class, (plan.total as f64 * w).round() as usize))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::{Band, Raster};
    use chrono::NaiveDate;
    use ndarray::Array2;

    fn ts() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 8, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// 10x10 image: rows 0..7 class 1, rows 7..10 class 2
    fn class_image() -> RasterImage {
        let mut r = Raster::new(10, 10);
        for row in 0..10 {
            for col in 0..10 {
                r.set(row, col, if row < 7 { 1.0 } else { 2.0 }).unwrap();
            }
        }
        RasterImage::new(vec![Band::new("landcover", r)], ts()).unwrap()
    }

    fn features() -> RasterImage {
        let mut nbr = Raster::new(10, 10);
        for row in 0..10 {
            for col in 0..10 {
                nbr.set(row, col, (row * 10 + col) as f64).unwrap();
            }
        }
        RasterImage::new(
            vec![Band::new("NBR", nbr), Band::new("elev", Raster::filled(10, 10, 42.0))],
            ts(),
        )
        .unwrap()
    }

    #[test]
    fn test_balanced_quota() {
        let plan = SamplePlan {
            total: 20,
            ..Default::default()
        };
        let set = stratified_sample(&class_image(), &features(), &plan, 7).unwrap();
        assert_eq!(set.len(), 20);
        assert_eq!(set.class_counts().get(&1), Some(&10));
        assert_eq!(set.class_counts().get(&2), Some(&10));
        assert_eq!(set.feature_names, vec!["NBR", "elev"]);

        for s in set.training.iter().chain(&set.testing) {
            assert_eq!(s.features[0], (s.row * 10 + s.col) as f64);
            assert_eq!(s.class, if s.row < 7 { 1 } else { 2 });
        }
    }

    #[test]
    fn test_weighted_quota_is_capped() {
        let plan = SamplePlan {
            total: 100,
            allocation: Allocation::Weighted(vec![(1, 0.15), (2, 0.85), (3, 0.5)]),
            train_fraction: 1.0,
        };
        let set = stratified_sample(&class_image(), &features(), &plan, 1).unwrap();
        let counts = set.class_counts();
        assert_eq!(counts.get(&1), Some(&15));
        // only 30 class-2 pixels exist
        assert_eq!(counts.get(&2), Some(&30));
        assert_eq!(counts.get(&3), None);
        assert!(set.testing.is_empty());
    }

    #[test]
    fn test_seed_is_reproducible() {
        let plan = SamplePlan::default();
        let a = stratified_sample(&class_image(), &features(), &plan, 99).unwrap();
        let b = stratified_sample(&class_image(), &features(), &plan, 99).unwrap();
        assert_eq!(a.training, b.training);
        assert_eq!(a.testing, b.testing);
    }

    #[test]
    fn test_masked_pixels_are_not_sampled() {
        let mut mask = Array2::from_elem((10, 10), true);
        for col in 0..10 {
            mask[(9, col)] = false;
        }
        let feats = features().with_mask(mask).unwrap();
        let plan = SamplePlan {
            total: 1000,
            ..Default::default()
        };
        let set = stratified_sample(&class_image(), &feats, &plan, 3).unwrap();
        assert_eq!(set.class_counts().get(&2), Some(&20));
        assert!(set.training.iter().chain(&set.testing).all(|s| s.row != 9));
    }

    #[test]
    fn test_invalid_plans() {
        let bad_split = SamplePlan {
            train_fraction: 1.5,
            ..Default::default()
        };
        assert!(stratified_sample(&class_image(), &features(), &bad_split, 0).is_err());

        let bad_weight = SamplePlan {
            allocation: Allocation::Weighted(vec![(1, -0.2)]),
            ..Default::default()
        };
        assert!(stratified_sample(&class_image(), &features(), &bad_weight, 0).is_err());
    }
}
