//! Per-band statistical reducers over a collection

use ndarray::Array2;
use std::fmt;
use std::str::FromStr;

use super::{check_stack, median_in_place};
use crate::maybe_rayon::*;
use bapcomp_core::{Band, Error, Raster, RasterCollection, RasterImage, Result};

/// Band name of [`clear_pixel_count`] output
pub const CLEAR_COUNT_BAND: &str = "clear_count";

/// Per-pixel reducer applied independently to each band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Median,
    Mean,
    Sum,
    Min,
    Max,
    /// Number of valid observations
    Count,
    /// Population standard deviation
    StdDev,
}

impl Reducer {
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Median => "median",
            Reducer::Mean => "mean",
            Reducer::Sum => "sum",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Count => "count",
            Reducer::StdDev => "stdDev",
        }
    }

    fn apply(&self, values: &mut [f64]) -> f64 {
        let n = values.len() as f64;
        match self {
            Reducer::Count => n,
            _ if values.is_empty() => f64::NAN,
            Reducer::Median => median_in_place(values),
            Reducer::Mean => values.iter().sum::<f64>() / n,
            Reducer::Sum => values.iter().sum(),
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::StdDev => {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                var.sqrt()
            }
        }
    }
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median" => Ok(Reducer::Median),
            "mean" => Ok(Reducer::Mean),
            "sum" => Ok(Reducer::Sum),
            "min" => Ok(Reducer::Min),
            "max" => Ok(Reducer::Max),
            "count" => Ok(Reducer::Count),
            "stddev" | "std" => Ok(Reducer::StdDev),
            _ => Err(Error::InvalidParameter {
                name: "reducer",
                value: s.to_string(),
                reason: "expected median, mean, sum, min, max, count or stdDev".into(),
            }),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduce every band of `collection` pixel by pixel over valid observations.
///
/// Output bands are named `<band>_<reducer>`. Pixels without any valid
/// observation are masked, except for [`Reducer::Count`] which reports 0.
/// The output carries the first image's timestamp.
pub fn reduce_collection(collection: &RasterCollection, reducer: Reducer) -> Result<RasterImage> {
    let images = collection.images();
    let ((rows, cols), band_names) = check_stack(images)?;
    let n_bands = band_names.len();

    let masks: Vec<&Array2<bool>> = images.iter().map(|img| img.mask()).collect();
    let mut out_bands = Vec::with_capacity(n_bands);

    for (b, name) in band_names.iter().enumerate() {
        let layers: Vec<&Raster<f64>> = images.iter().map(|img| &img.bands()[b].data).collect();

        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                let mut scratch = Vec::with_capacity(layers.len());
                for (col, out) in row_data.iter_mut().enumerate() {
                    scratch.clear();
                    for (layer, mask) in layers.iter().zip(&masks) {
                        if mask[(row, col)] {
                            scratch.push(unsafe { layer.get_unchecked(row, col) });
                        }
                    }
                    *out = reducer.apply(&mut scratch);
                }
                row_data
            })
            .collect();

        let mut raster = layers[0].with_same_meta::<f64>(rows, cols);
        raster.set_nodata(Some(f64::NAN));
        *raster.data_mut() =
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
        out_bands.push(Band::new(format!("{}_{}", name, reducer.name()), raster));
    }

    let mask = if reducer == Reducer::Count {
        Array2::from_elem((rows, cols), true)
    } else {
        valid_union(&masks, rows, cols)
    };

    RasterImage::new(out_bands, images[0].acquired())?.with_mask(mask)
}

/// Number of valid observations per pixel.
///
/// Counts the shared validity mask of each image, so every band agrees.
pub fn clear_pixel_count(collection: &RasterCollection) -> Result<Raster<u16>> {
    let images = collection.images();
    let ((rows, cols), _) = check_stack(images)?;

    let mut counts = images[0].bands()[0].data.with_same_meta::<u16>(rows, cols);
    for img in images {
        ndarray::Zip::from(counts.data_mut())
            .and(img.mask())
            .for_each(|c, &valid| {
                if valid {
                    *c = c.saturating_add(1);
                }
            });
    }
    Ok(counts)
}

fn valid_union(masks: &[&Array2<bool>], rows: usize, cols: usize) -> Array2<bool> {
    let mut out = Array2::from_elem((rows, cols), false);
    for mask in masks {
        ndarray::Zip::from(&mut out).and(*mask).for_each(|o, &m| *o = *o || m);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_image(values: [f64; 4], valid: [bool; 4]) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(2005, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let b = Raster::from_vec(values.to_vec(), 2, 2).unwrap();
        let mask = Array2::from_shape_vec((2, 2), valid.to_vec()).unwrap();
        RasterImage::new(vec![Band::new("B4", b)], ts)
            .unwrap()
            .with_mask(mask)
            .unwrap()
    }

    fn collection() -> RasterCollection {
        RasterCollection::from_images(vec![
            make_image([1.0, 2.0, 3.0, 4.0], [true, true, true, false]),
            make_image([3.0, 6.0, 5.0, 4.0], [true, true, false, false]),
            make_image([8.0, 10.0, 7.0, 4.0], [true, false, false, false]),
        ])
    }

    #[test]
    fn test_reducers() {
        let coll = collection();
        let at = |r: Reducer, row, col| {
            reduce_collection(&coll, r)
                .unwrap()
                .band(&format!("B4_{}", r.name()))
                .unwrap()
                .get(row, col)
                .unwrap()
        };

        assert_eq!(at(Reducer::Median, 0, 0), 3.0);
        assert_eq!(at(Reducer::Median, 0, 1), 4.0);
        assert_eq!(at(Reducer::Mean, 0, 0), 4.0);
        assert_eq!(at(Reducer::Sum, 0, 1), 8.0);
        assert_eq!(at(Reducer::Min, 0, 0), 1.0);
        assert_eq!(at(Reducer::Max, 0, 0), 8.0);
        assert_eq!(at(Reducer::Count, 1, 0), 1.0);
        assert_eq!(at(Reducer::Count, 1, 1), 0.0);

        // population std of {1, 3, 8}: mean 4, var (9 + 1 + 16) / 3
        let sd = at(Reducer::StdDev, 0, 0);
        assert!((sd - (26.0f64 / 3.0).sqrt()).abs() < 1e-12, "Expected sqrt(26/3), got {}", sd);
    }

    #[test]
    fn test_fully_masked_pixel() {
        let out = reduce_collection(&collection(), Reducer::Mean).unwrap();
        assert!(!out.is_valid(1, 1));
        assert!(out.band("B4_mean").unwrap().get(1, 1).unwrap().is_nan());

        let count = reduce_collection(&collection(), Reducer::Count).unwrap();
        assert!(count.is_valid(1, 1));
    }

    #[test]
    fn test_clear_pixel_count() {
        let counts = clear_pixel_count(&collection()).unwrap();
        assert_eq!(counts.data().iter().copied().collect::<Vec<_>>(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_empty_collection_is_error() {
        assert!(reduce_collection(&RasterCollection::new(), Reducer::Median).is_err());
        assert!(clear_pixel_count(&RasterCollection::new()).is_err());
    }

    #[test]
    fn test_parse_reducer() {
        assert_eq!("StdDev".parse::<Reducer>().unwrap(), Reducer::StdDev);
        assert!("mode".parse::<Reducer>().is_err());
    }
}
