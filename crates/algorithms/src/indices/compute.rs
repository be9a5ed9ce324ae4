//! Per-image index computation

use ndarray::Array2;
use std::fmt;
use tracing::trace;

use super::SpectralIndex;
use crate::maybe_rayon::*;
use bapcomp_core::{Band, Error, Raster, RasterCollection, RasterImage, Result};

/// One index to compute, optionally sign-flipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRequest {
    pub index: SpectralIndex,
    /// Multiply the result by −1. Applies to every index, including the
    /// pass-through bands (B1 to B7) and TCB.
    pub flip: bool,
}

impl IndexRequest {
    pub fn new(index: SpectralIndex, flip: bool) -> Self {
        Self { index, flip }
    }
}

impl From<SpectralIndex> for IndexRequest {
    fn from(index: SpectralIndex) -> Self {
        Self { index, flip: false }
    }
}

impl fmt::Display for IndexRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flip {
            write!(f, "-{}", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// Compute `index` over `image` into a single band named after the index.
///
/// The output keeps the input's mask and metadata. Masked pixels are NaN;
/// zero denominators produce NaN or ±inf rather than an error.
pub fn compute_index(image: &RasterImage, index: SpectralIndex, flip: bool) -> Result<RasterImage> {
    let inputs: Vec<&Raster<f64>> = index
        .required_bands()
        .iter()
        .map(|name| image.band(name))
        .collect::<Result<_>>()?;
    let (rows, cols) = image.shape();
    let mask = image.mask();
    let sign = if flip { -1.0 } else { 1.0 };

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut pixel = Vec::with_capacity(inputs.len());
            for (col, out) in row_data.iter_mut().enumerate() {
                if !mask[(row, col)] {
                    continue;
                }
                pixel.clear();
                pixel.extend(inputs.iter().map(|band| unsafe { band.get_unchecked(row, col) }));
                *out = sign * index.evaluate(&pixel);
            }
            row_data
        })
        .collect();

    let mut output = inputs[0].with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    trace!(index = index.name(), flip, scene = image.scene_id(), "computed index");

    RasterImage::new(vec![Band::new(index.name(), output)], image.acquired())?
        .with_metadata_of(image)
        .with_mask(mask.clone())
}

/// Compute every request for every image, one band per request.
///
/// Each output image keeps its source's timestamp, mask and metadata.
/// Requesting the same index twice is a `DuplicateBand` error.
pub fn transform_collection(
    collection: &RasterCollection,
    requests: &[IndexRequest],
) -> Result<RasterCollection> {
    if requests.is_empty() {
        return Err(Error::InvalidParameter {
            name: "indices",
            value: "[]".into(),
            reason: "at least one index is required".into(),
        });
    }

    collection.try_map(|image| {
        let mut bands = Vec::with_capacity(requests.len());
        for req in requests {
            let single = compute_index(image, req.index, req.flip)?;
            bands.extend(single.bands().iter().cloned());
        }
        RasterImage::new(bands, image.acquired())?
            .with_metadata_of(image)
            .with_mask(image.mask().clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::HARMONIZED_BANDS;
    use chrono::NaiveDate;

    fn make_image(values: [f64; 6]) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(2010, 8, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bands = HARMONIZED_BANDS
            .iter()
            .zip(values)
            .map(|(name, v)| Band::new(*name, Raster::filled(3, 3, v)))
            .collect();
        RasterImage::new(bands, ts)
            .unwrap()
            .with_scene_id("LC08_200031_20100801")
    }

    const VEGETATION: [f64; 6] = [400.0, 700.0, 500.0, 3500.0, 1800.0, 900.0];

    #[test]
    fn test_ndvi_image() {
        let out = compute_index(&make_image(VEGETATION), SpectralIndex::Ndvi, false).unwrap();
        assert_eq!(out.band_names(), vec!["NDVI"]);
        let val = out.band("NDVI").unwrap().get(1, 1).unwrap();
        // (3500 - 500) / (3500 + 500) * 1000 = 750
        assert!((val - 750.0).abs() < 1e-10, "Expected 750, got {}", val);
        assert_eq!(out.scene_id(), "LC08_200031_20100801");
    }

    #[test]
    fn test_flip_negates_every_index() {
        let img = make_image(VEGETATION);
        for index in SpectralIndex::ALL {
            let plain = compute_index(&img, index, false).unwrap();
            let flipped = compute_index(&img, index, true).unwrap();
            let a = plain.band(index.name()).unwrap().get(0, 0).unwrap();
            let b = flipped.band(index.name()).unwrap().get(0, 0).unwrap();
            assert!((a + b).abs() < 1e-9, "{}: {} vs {}", index, a, b);
        }
    }

    #[test]
    fn test_flip_applies_to_bands_and_brightness() {
        let img = make_image(VEGETATION);
        let b5 = compute_index(&img, SpectralIndex::B5, true).unwrap();
        assert_eq!(b5.band("B5").unwrap().get(2, 2).unwrap(), -1800.0);

        let tcb = compute_index(&img, SpectralIndex::Tcb, false).unwrap();
        let tcb_flipped = compute_index(&img, SpectralIndex::Tcb, true).unwrap();
        let a = tcb.band("TCB").unwrap().get(1, 1).unwrap();
        let b = tcb_flipped.band("TCB").unwrap().get(1, 1).unwrap();
        assert!(a > 0.0, "Expected positive brightness, got {}", a);
        assert_eq!(b, -a);
    }

    #[test]
    fn test_deterministic() {
        let img = make_image(VEGETATION);
        let a = compute_index(&img, SpectralIndex::Ndfi, false).unwrap();
        let b = compute_index(&img, SpectralIndex::Ndfi, false).unwrap();
        assert_eq!(
            a.band("NDFI").unwrap().data().as_slice().unwrap(),
            b.band("NDFI").unwrap().data().as_slice().unwrap()
        );
    }

    #[test]
    fn test_masked_pixels_are_nan() {
        let mut mask = Array2::from_elem((3, 3), true);
        mask[(0, 2)] = false;
        let img = make_image(VEGETATION).with_mask(mask).unwrap();

        let out = compute_index(&img, SpectralIndex::Nbr, false).unwrap();
        assert!(!out.is_valid(0, 2));
        assert!(out.band("NBR").unwrap().get(0, 2).unwrap().is_nan());
        assert!(out.band("NBR").unwrap().get(0, 1).unwrap().is_finite());
    }

    #[test]
    fn test_zero_denominator_is_not_an_error() {
        let out = compute_index(&make_image([0.0; 6]), SpectralIndex::Ndmi, false).unwrap();
        assert!(out.band("NDMI").unwrap().get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_missing_band() {
        let img = make_image(VEGETATION).select(&["B4", "B3"]).unwrap();
        assert!(compute_index(&img, SpectralIndex::Ndvi, false).is_ok());
        assert!(matches!(
            compute_index(&img, SpectralIndex::Nbr, false),
            Err(Error::MissingBand { .. })
        ));
    }

    #[test]
    fn test_transform_collection() {
        let coll = RasterCollection::from_images(vec![make_image(VEGETATION), make_image(VEGETATION)]);
        let requests = [
            IndexRequest::new(SpectralIndex::Nbr, true),
            SpectralIndex::Tcw.into(),
        ];
        let out = transform_collection(&coll, &requests).unwrap();
        assert_eq!(out.len(), 2);
        let first = out.first().unwrap();
        assert_eq!(first.band_names(), vec!["NBR", "TCW"]);
        assert_eq!(first.acquired(), coll.first().unwrap().acquired());
        assert!(first.band("NBR").unwrap().get(0, 0).unwrap() < 0.0);

        assert!(transform_collection(&coll, &[]).is_err());
        let dup = [SpectralIndex::Nbr.into(), IndexRequest::new(SpectralIndex::Nbr, true)];
        assert!(matches!(
            transform_collection(&coll, &dup),
            Err(Error::DuplicateBand(_))
        ));
    }
}
