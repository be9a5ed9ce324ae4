//! Per-image preparation: band harmonization, reflectance scaling and masking

use ndarray::Array2;
use tracing::trace;

use crate::maybe_rayon::*;
use bapcomp_core::sensor::{FIXED_POINT, QA_BAND, SR_OFFSET, SR_SCALE};
use bapcomp_core::{Error, Raster, RasterElement, RasterImage, Result, Sensor, HARMONIZED_BANDS};

use super::category::MaskSpec;

/// Band name of the surface-water recurrence layer (percent, 0..100)
pub const WATER_RECURRENCE_BAND: &str = "recurrence";

/// Band name of the forest-type layer
pub const FOREST_TYPE_BAND: &str = "forest_type";

/// Recurrence above which a pixel counts as permanent water
pub const WATER_RECURRENCE_THRESHOLD: f64 = 99.0;

/// Ancillary layers consulted by the `waterplus` and `nonforest` categories.
///
/// Layers must sit on the grid of the images they mask.
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryLayers {
    pub water_recurrence: Option<RasterImage>,
    pub forest_type: Option<RasterImage>,
}

impl AuxiliaryLayers {
    pub fn is_empty(&self) -> bool {
        self.water_recurrence.is_none() && self.forest_type.is_none()
    }
}

/// Cast to unsigned 16-bit fixed point, kept as `f64`.
///
/// NaN becomes 0, values are clamped to `[0, 65535]` and truncated.
#[inline]
pub fn quantize_u16(value: f64) -> f64 {
    f64::from(u16::from_f64_saturating(value))
}

/// Collection 2 digital number to fixed-point reflectance (×10000, u16)
#[inline]
pub fn scale_reflectance(dn: f64) -> f64 {
    quantize_u16((dn * SR_SCALE + SR_OFFSET) * FIXED_POINT)
}

/// Validity test for one ancillary layer
struct AuxTest<'a> {
    data: &'a Raster<f64>,
    mask: &'a Array2<bool>,
    keep: fn(f64) -> bool,
}

impl AuxTest<'_> {
    #[inline]
    fn valid(&self, row: usize, col: usize) -> bool {
        if !self.mask[(row, col)] {
            return false;
        }
        let v = unsafe { self.data.get_unchecked(row, col) };
        !v.is_nan() && (self.keep)(v)
    }
}

fn aux_test<'a>(
    layer: Option<&'a RasterImage>,
    band: &'static str,
    shape: (usize, usize),
    keep: fn(f64) -> bool,
) -> Result<AuxTest<'a>> {
    let layer = layer.ok_or_else(|| Error::MissingBand {
        band: band.to_string(),
        available: "no auxiliary layer supplied".to_string(),
    })?;
    let data = layer.band(band)?;
    let (ar, ac) = data.shape();
    if (ar, ac) != shape {
        return Err(Error::SizeMismatch {
            er: shape.0,
            ec: shape.1,
            ar,
            ac,
        });
    }
    Ok(AuxTest {
        data,
        mask: layer.mask(),
        keep,
    })
}

/// Turn a raw sensor image into a harmonized, scaled, masked image.
///
/// The native reflectance bands are renamed to `B1 B2 B3 B4 B5 B7`, any
/// prior masking is discarded (masked pixels read as zero DN), values are
/// rescaled to u16 fixed-point reflectance and the selected mask categories
/// are ANDed into a fresh validity mask.
pub fn prepare_image(
    raw: &RasterImage,
    sensor: Sensor,
    mask_spec: &MaskSpec,
    aux: &AuxiliaryLayers,
) -> Result<RasterImage> {
    let native = sensor.profile().native_bands;
    let pairs: Vec<(&str, &str)> = native.iter().copied().zip(HARMONIZED_BANDS).collect();

    let selected = raw.select_renamed(&pairs)?.unmasked(0.0);
    let (rows, cols) = selected.shape();

    let mut bands = Vec::with_capacity(HARMONIZED_BANDS.len());
    for band in selected.bands() {
        let mut scaled = band.data.map(scale_reflectance);
        scaled.set_nodata(None);
        bands.push(bapcomp_core::Band::new(band.name.clone(), scaled));
    }

    let mask = if mask_spec.is_empty() {
        Array2::from_elem((rows, cols), true)
    } else {
        category_mask(raw, mask_spec, aux, (rows, cols))?
    };

    trace!(
        scene = raw.scene_id(),
        %sensor,
        valid = mask.iter().filter(|v| **v).count(),
        "prepared scene"
    );

    RasterImage::new(bands, raw.acquired())?
        .with_metadata_of(raw)
        .with_sensor(sensor)
        .with_mask(mask)
}

fn category_mask(
    raw: &RasterImage,
    mask_spec: &MaskSpec,
    aux: &AuxiliaryLayers,
    shape: (usize, usize),
) -> Result<Array2<bool>> {
    let (rows, cols) = shape;
    let qa_bits = u32::from(mask_spec.qa_bits());
    let qa = if qa_bits != 0 { Some(raw.band(QA_BAND)?) } else { None };

    let water = if mask_spec.needs_water_recurrence() {
        Some(aux_test(
            aux.water_recurrence.as_ref(),
            WATER_RECURRENCE_BAND,
            shape,
            |v| v <= WATER_RECURRENCE_THRESHOLD,
        )?)
    } else {
        None
    };
    let forest = if mask_spec.needs_forest_type() {
        Some(aux_test(aux.forest_type.as_ref(), FOREST_TYPE_BAND, shape, |v| v >= 0.0)?)
    } else {
        None
    };

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![true; cols];
            for (col, valid) in row_data.iter_mut().enumerate() {
                if let Some(qa) = qa {
                    let flags = unsafe { qa.get_unchecked(row, col) };
                    let flags = u32::from(u16::from_f64_saturating(flags));
                    if flags & qa_bits != 0 {
                        *valid = false;
                        continue;
                    }
                }
                if let Some(w) = &water {
                    if !w.valid(row, col) {
                        *valid = false;
                        continue;
                    }
                }
                if let Some(f) = &forest {
                    *valid = f.valid(row, col);
                }
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::MaskCategory;
    use bapcomp_core::Band;
    use chrono::NaiveDate;

    const ROWS: usize = 2;
    const COLS: usize = 3;

    fn raw_scene(sensor: Sensor, dn: f64, qa: &[f64]) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(2016, 7, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut bands: Vec<Band> = sensor
            .profile()
            .native_bands
            .iter()
            .map(|n| Band::new(*n, Raster::filled(ROWS, COLS, dn)))
            .collect();
        bands.push(Band::new(
            QA_BAND,
            Raster::from_vec(qa.to_vec(), ROWS, COLS).unwrap(),
        ));
        RasterImage::new(bands, ts)
            .unwrap()
            .with_scene_id("LC08_044034_20160701")
    }

    fn layer(band: &str, values: &[f64]) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let data = Raster::from_vec(values.to_vec(), ROWS, COLS).unwrap();
        RasterImage::new(vec![Band::new(band, data)], ts).unwrap()
    }

    #[test]
    fn test_scale_reflectance() {
        // (10000 * 0.0000275 - 0.2) * 10000 = 750
        assert!((scale_reflectance(10000.0) - 750.0).abs() < 1e-9);
        // negative reflectance clamps to zero
        assert_eq!(scale_reflectance(0.0), 0.0);
        assert_eq!(scale_reflectance(f64::NAN), 0.0);
        assert_eq!(scale_reflectance(65535.0), 16022.0);
    }

    #[test]
    fn test_harmonized_band_names() {
        let raw = raw_scene(Sensor::Lc08, 10000.0, &[0.0; 6]);
        let img = prepare_image(&raw, Sensor::Lc08, &MaskSpec::default(), &Default::default()).unwrap();
        assert_eq!(img.band_names(), HARMONIZED_BANDS.to_vec());
        assert_eq!(img.sensor(), Some(Sensor::Lc08));
        assert_eq!(img.scene_id(), "LC08_044034_20160701");
        assert_eq!(img.acquired(), raw.acquired());
    }

    #[test]
    fn test_qa_bits_mask_pixels() {
        // clear, cloud(3), shadow(4), snow(5), water(7), fill bit 0 only
        let qa = [0.0, 8.0, 16.0, 32.0, 128.0, 1.0];
        let raw = raw_scene(Sensor::Lt05, 10000.0, &qa);

        let img = prepare_image(&raw, Sensor::Lt05, &MaskSpec::default(), &Default::default()).unwrap();
        let valid: Vec<bool> = img.mask().iter().copied().collect();
        assert_eq!(valid, vec![true, false, false, false, false, true]);

        let clouds_only = MaskSpec::from_categories([MaskCategory::Cloud]);
        let img = prepare_image(&raw, Sensor::Lt05, &clouds_only, &Default::default()).unwrap();
        let valid: Vec<bool> = img.mask().iter().copied().collect();
        assert_eq!(valid, vec![true, false, true, true, true, true]);
    }

    #[test]
    fn test_empty_spec_keeps_everything() {
        let raw = raw_scene(Sensor::Le07, 10000.0, &[8.0; 6]);
        let img = prepare_image(&raw, Sensor::Le07, &MaskSpec::none(), &Default::default()).unwrap();
        assert_eq!(img.valid_count(), ROWS * COLS);
    }

    #[test]
    fn test_prior_mask_is_discarded() {
        let mut prior = Array2::from_elem((ROWS, COLS), true);
        prior[(0, 0)] = false;
        let raw = raw_scene(Sensor::Lc09, 10000.0, &[0.0; 6]).with_mask(prior).unwrap();

        let img = prepare_image(&raw, Sensor::Lc09, &MaskSpec::default(), &Default::default()).unwrap();
        assert!(img.is_valid(0, 0));
        // masked pixel was unmasked to DN 0, which scales below zero and clamps
        assert_eq!(img.band("B1").unwrap().get(0, 0).unwrap(), 0.0);
        assert_eq!(img.band("B1").unwrap().get(0, 1).unwrap(), 750.0);
    }

    #[test]
    fn test_waterplus_and_nonforest() {
        let raw = raw_scene(Sensor::Lc08, 10000.0, &[0.0; 6]);
        let aux = AuxiliaryLayers {
            water_recurrence: Some(layer(WATER_RECURRENCE_BAND, &[0.0, 100.0, 99.0, 0.0, 0.0, 0.0])),
            forest_type: Some(layer(FOREST_TYPE_BAND, &[1.0, 1.0, 1.0, -1.0, 0.0, f64::NAN])),
        };
        let spec = MaskSpec::parse(&["waterplus", "nonforest"]).unwrap();

        let img = prepare_image(&raw, Sensor::Lc08, &spec, &aux).unwrap();
        let valid: Vec<bool> = img.mask().iter().copied().collect();
        assert_eq!(valid, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn test_missing_inputs() {
        let raw = raw_scene(Sensor::Lc08, 10000.0, &[0.0; 6]);
        let spec = MaskSpec::parse(&["waterplus"]).unwrap();
        assert!(matches!(
            prepare_image(&raw, Sensor::Lc08, &spec, &Default::default()),
            Err(Error::MissingBand { .. })
        ));

        // LT05 bands are not present on an OLI scene
        assert!(matches!(
            prepare_image(&raw, Sensor::Lt05, &MaskSpec::none(), &Default::default()),
            Err(Error::MissingBand { .. })
        ));
    }
}
