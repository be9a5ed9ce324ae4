//! Per-pixel medoid compositing
//!
//! For every pixel the medoid is the observation closest (in summed squared
//! band distance) to the per-band median of all valid observations. Unlike
//! a median composite, every output pixel is a real observation from one
//! scene, so band values stay spectrally consistent.

use ndarray::Array2;
use tracing::debug;

use super::check_stack;
use crate::masking::quantize_u16;
use crate::maybe_rayon::*;
use bapcomp_core::{Algorithm, Band, Error, Raster, RasterCollection, RasterImage, Result};

/// Medoid composite plus, per pixel, the index of the winning image
#[derive(Debug, Clone)]
pub struct MedoidComposite {
    pub image: RasterImage,
    /// Collection index of the selected observation, `-1` where no image
    /// was valid
    pub winner: Raster<i32>,
}

/// Parameters for the medoid algorithm
#[derive(Debug, Clone, Default)]
pub struct MedoidParams {
    /// Composited instead of the collection when the collection is empty
    pub placeholder: Option<RasterImage>,
}

/// Medoid compositing algorithm
#[derive(Debug, Clone, Default)]
pub struct Medoid;

impl Algorithm for Medoid {
    type Input = RasterCollection;
    type Output = RasterImage;
    type Params = MedoidParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Medoid"
    }

    fn description(&self) -> &'static str {
        "Best-available-pixel composite choosing, per pixel, the observation nearest the band-wise median"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        match params.placeholder {
            Some(placeholder) => medoid(&input, &placeholder),
            None if input.is_empty() => Err(Error::InvalidParameter {
                name: "placeholder",
                value: "None".into(),
                reason: "an empty collection needs a placeholder image".into(),
            }),
            None => medoid_with_provenance_inner(&input, input.images()).map(|c| c.image),
        }
    }
}

/// Medoid composite of `collection`, or of `placeholder` when the
/// collection is empty.
///
/// The output takes its timestamp from the placeholder, so callers pin
/// the composite date by choosing the placeholder's timestamp.
pub fn medoid(collection: &RasterCollection, placeholder: &RasterImage) -> Result<RasterImage> {
    medoid_with_provenance(collection, placeholder).map(|c| c.image)
}

/// Medoid composite with the per-pixel winner index
pub fn medoid_with_provenance(
    collection: &RasterCollection,
    placeholder: &RasterImage,
) -> Result<MedoidComposite> {
    let images = if collection.is_empty() {
        std::slice::from_ref(placeholder)
    } else {
        collection.images()
    };
    let mut composite = medoid_with_provenance_inner(collection, images)?;
    composite.image = composite.image.with_timestamp(placeholder.acquired());
    Ok(composite)
}

fn medoid_with_provenance_inner(
    collection: &RasterCollection,
    images: &[RasterImage],
) -> Result<MedoidComposite> {
    let ((rows, cols), band_names) = check_stack(images)?;
    let n_bands = band_names.len();

    debug!(
        images = collection.len(),
        bands = n_bands,
        rows,
        cols,
        "computing medoid composite"
    );

    // bands[i][b] is band b of image i
    let bands: Vec<Vec<&Raster<f64>>> = images
        .iter()
        .map(|img| img.bands().iter().map(|b| &b.data).collect())
        .collect();
    let masks: Vec<&Array2<bool>> = images.iter().map(|img| img.mask()).collect();

    // Per row: band values (row-major per band) then winner indices
    let rows_out: Vec<(Vec<f64>, Vec<i32>)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut values = vec![0.0; n_bands * cols];
            let mut winners = vec![-1i32; cols];
            let mut valid_idx: Vec<usize> = Vec::with_capacity(images.len());
            let mut scratch: Vec<f64> = Vec::with_capacity(images.len());
            let mut medians = vec![0.0; n_bands];

            for col in 0..cols {
                valid_idx.clear();
                valid_idx.extend((0..images.len()).filter(|&i| masks[i][(row, col)]));
                if valid_idx.is_empty() {
                    continue;
                }

                for (b, median) in medians.iter_mut().enumerate() {
                    scratch.clear();
                    scratch.extend(
                        valid_idx
                            .iter()
                            .map(|&i| unsafe { bands[i][b].get_unchecked(row, col) }),
                    );
                    *median = median_in_place(&mut scratch);
                }

                let mut best = valid_idx[0];
                let mut best_dist = f64::INFINITY;
                for &i in &valid_idx {
                    let dist: f64 = medians
                        .iter()
                        .enumerate()
                        .map(|(b, m)| {
                            let d = unsafe { bands[i][b].get_unchecked(row, col) } - m;
                            d * d
                        })
                        .sum();
                    // strict comparison keeps the first image on ties
                    if dist < best_dist {
                        best_dist = dist;
                        best = i;
                    }
                }

                winners[col] = best as i32;
                for b in 0..n_bands {
                    let v = unsafe { bands[best][b].get_unchecked(row, col) };
                    values[b * cols + col] = quantize_u16(v);
                }
            }
            (values, winners)
        })
        .collect();

    let template = &images[0].bands()[0].data;
    let mut band_data: Vec<Vec<f64>> = vec![Vec::with_capacity(rows * cols); n_bands];
    let mut winner_data: Vec<i32> = Vec::with_capacity(rows * cols);
    for (values, winners) in rows_out {
        for (b, data) in band_data.iter_mut().enumerate() {
            data.extend_from_slice(&values[b * cols..(b + 1) * cols]);
        }
        winner_data.extend(winners);
    }

    let mask = Array2::from_shape_vec(
        (rows, cols),
        winner_data.iter().map(|&w| w >= 0).collect(),
    )
    .map_err(|e| Error::Other(e.to_string()))?;

    let out_bands = band_names
        .into_iter()
        .zip(band_data)
        .map(|(name, data)| Ok(Band::new(name, build_output(template, rows, cols, data)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut winner = template.with_same_meta::<i32>(rows, cols);
    winner.set_nodata(Some(-1));
    *winner.data_mut() = Array2::from_shape_vec((rows, cols), winner_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    let image = RasterImage::new(out_bands, images[0].acquired())?
        .with_mask(mask)?
        .with_property("source_count", collection.len().to_string());

    Ok(MedoidComposite { image, winner })
}

/// Median of `values`, averaging the two middle values for even counts.
/// Reorders `values`.
pub(crate) fn median_in_place(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

fn build_output(template: &Raster<f64>, rows: usize, cols: usize, data: Vec<f64>) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}
