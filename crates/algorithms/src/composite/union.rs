//! Timestamp join of two collections

use ndarray::Zip;

use bapcomp_core::{Band, Error, RasterCollection, RasterImage, Result};

/// Inner-join two collections on acquisition time and add matched images.
///
/// For every image of `a` and every image of `b` with the same timestamp,
/// both are unmasked with zero fill and summed band by band (by position).
/// The result keeps the `a` image's band names and metadata and is valid
/// everywhere. Output order follows `a`, then `b`.
pub fn union_collections(a: &RasterCollection, b: &RasterCollection) -> Result<RasterCollection> {
    let mut out = RasterCollection::new();
    for primary in a {
        for secondary in b.iter().filter(|s| s.acquired() == primary.acquired()) {
            out.push(add_unmasked(primary, secondary)?);
        }
    }
    Ok(out)
}

fn add_unmasked(primary: &RasterImage, secondary: &RasterImage) -> Result<RasterImage> {
    if primary.shape() != secondary.shape() {
        let (er, ec) = primary.shape();
        let (ar, ac) = secondary.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    if primary.band_count() != secondary.band_count() {
        return Err(Error::BandLayoutMismatch(format!(
            "cannot add {} bands to {} bands",
            secondary.band_count(),
            primary.band_count()
        )));
    }

    let p = primary.clone().unmasked(0.0);
    let s = secondary.clone().unmasked(0.0);

    let bands = p
        .bands()
        .iter()
        .zip(s.bands())
        .map(|(pb, sb)| {
            let mut sum = pb.data.clone();
            sum.set_nodata(None);
            Zip::from(sum.data_mut())
                .and(sb.data.data())
                .for_each(|x, &y| *x += y);
            Band::new(pb.name.clone(), sum)
        })
        .collect();

    Ok(RasterImage::new(bands, primary.acquired())?.with_metadata_of(primary))
}
