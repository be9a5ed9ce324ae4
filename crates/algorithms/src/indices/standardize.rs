//! Per-pixel z-scores across a collection

use ndarray::Zip;

use crate::composite::{reduce_collection, Reducer};
use bapcomp_core::{Band, RasterCollection, RasterImage, Result};

/// Replace every band value with `(value − mean) / std`, where mean and
/// population standard deviation are taken per pixel over the collection's
/// valid observations.
///
/// Masks and metadata are kept; masked pixels become NaN. A pixel whose
/// history is constant divides by zero and yields NaN.
pub fn standardize(collection: &RasterCollection) -> Result<RasterCollection> {
    if collection.is_empty() {
        return Ok(RasterCollection::new());
    }
    let mean = reduce_collection(collection, Reducer::Mean)?;
    let std_dev = reduce_collection(collection, Reducer::StdDev)?;

    collection.try_map(|image| {
        let bands = image
            .bands()
            .iter()
            .map(|band| {
                let mu = mean.band(&format!("{}_{}", band.name, Reducer::Mean.name()))?;
                let sd = std_dev.band(&format!("{}_{}", band.name, Reducer::StdDev.name()))?;
                let mut z = band.data.clone();
                z.set_nodata(Some(f64::NAN));
                Zip::from(z.data_mut())
                    .and(image.mask())
                    .and(mu.data())
                    .and(sd.data())
                    .for_each(|v, &valid, &m, &s| {
                        *v = if valid { (*v - m) / s } else { f64::NAN };
                    });
                Ok(Band::new(band.name.clone(), z))
            })
            .collect::<Result<Vec<_>>>()?;
        RasterImage::new(bands, image.acquired())?
            .with_metadata_of(image)
            .with_mask(image.mask().clone())
    })
}
