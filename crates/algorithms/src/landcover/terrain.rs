//! Elevation and slope bands from a DEM

use ndarray::Array2;

use crate::maybe_rayon::*;
use bapcomp_core::{Band, Error, Raster, RasterImage, Result, CRS};

pub const ELEVATION_BAND: &str = "elev";
pub const SLOPE_BAND: &str = "slope";

/// Metres per degree of latitude on the authalic sphere
const METRES_PER_DEGREE: f64 = 111_195.0;

/// Append `elev` and `slope` (degrees) bands computed from `dem` (first band).
///
/// `dem` must share the image grid. Elevation is NaN where the DEM is
/// masked. Slope uses Horn's 3x3 method and is NaN on the outer ring of
/// pixels and wherever a neighbour is missing. WGS84 DEMs are converted to
/// metric cell sizes per row.
pub fn add_terrain_bands(image: &RasterImage, dem: &RasterImage) -> Result<RasterImage> {
    if image.shape() != dem.shape() {
        let (er, ec) = image.shape();
        let (ar, ac) = dem.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let mut elev = dem.bands()[0].data.clone();
    ndarray::Zip::from(elev.data_mut())
        .and(dem.mask())
        .for_each(|v, &valid| {
            if !valid {
                *v = f64::NAN;
            }
        });
    elev.set_nodata(Some(f64::NAN));

    let slope = horn_slope(&elev)?;

    image
        .clone()
        .add_band(Band::new(ELEVATION_BAND, elev))?
        .add_band(Band::new(SLOPE_BAND, slope))
}

/// Horn (1981) slope in degrees:
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
fn horn_slope(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let transform = dem.transform();
    let geographic = dem.crs().is_some_and(|crs| crs.is_equivalent(&CRS::wgs84()));

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            if row == 0 || row == rows - 1 {
                return row_data;
            }

            let (dx, dy) = if geographic {
                let (_, lat) = transform.pixel_to_geo(0, row);
                (
                    transform.pixel_width.abs() * METRES_PER_DEGREE * lat.to_radians().cos(),
                    transform.pixel_height.abs() * METRES_PER_DEGREE,
                )
            } else {
                (transform.pixel_width.abs(), transform.pixel_height.abs())
            };

            for col in 1..cols.saturating_sub(1) {
                let e = unsafe { dem.get_unchecked(row, col) };
                if e.is_nan() {
                    continue;
                }

                let a = unsafe { dem.get_unchecked(row - 1, col - 1) };
                let b = unsafe { dem.get_unchecked(row - 1, col) };
                let c = unsafe { dem.get_unchecked(row - 1, col + 1) };
                let d = unsafe { dem.get_unchecked(row, col - 1) };
                let f = unsafe { dem.get_unchecked(row, col + 1) };
                let g = unsafe { dem.get_unchecked(row + 1, col - 1) };
                let h = unsafe { dem.get_unchecked(row + 1, col) };
                let i = unsafe { dem.get_unchecked(row + 1, col + 1) };

                if [a, b, c, d, f, g, h, i].iter().any(|v| v.is_nan()) {
                    continue;
                }

                let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
                let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);
                row_data[col] = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
            }
            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::GeoTransform;
    use chrono::NaiveDate;

    fn ts() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 8, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn dem(f: impl Fn(usize, usize) -> f64) -> RasterImage {
        let mut r = Raster::new(10, 10);
        r.set_transform(GeoTransform::new(0.0, 300.0, 30.0, -30.0));
        for row in 0..10 {
            for col in 0..10 {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        RasterImage::new(vec![Band::new("elevation", r)], ts()).unwrap()
    }

    fn composite() -> RasterImage {
        RasterImage::new(vec![Band::new("NBR", Raster::filled(10, 10, 500.0))], ts()).unwrap()
    }

    #[test]
    fn test_slope_flat() {
        let out = add_terrain_bands(&composite(), &dem(|_, _| 100.0)).unwrap();
        assert_eq!(out.band_names(), vec!["NBR", "elev", "slope"]);
        let val = out.band(SLOPE_BAND).unwrap().get(5, 5).unwrap();
        assert!(val.abs() < 0.001, "Expected ~0 slope for flat surface, got {}", val);
        assert_eq!(out.band(ELEVATION_BAND).unwrap().get(0, 0).unwrap(), 100.0);
    }

    #[test]
    fn test_slope_45_degrees() {
        // rises 30 m per 30 m column
        let out = add_terrain_bands(&composite(), &dem(|_, col| col as f64 * 30.0)).unwrap();
        let val = out.band(SLOPE_BAND).unwrap().get(4, 4).unwrap();
        assert!((val - 45.0).abs() < 1e-9, "Expected 45, got {}", val);
        assert!(out.band(SLOPE_BAND).unwrap().get(0, 4).unwrap().is_nan());
    }

    #[test]
    fn test_masked_dem() {
        let mut mask = Array2::from_elem((10, 10), true);
        mask[(5, 5)] = false;
        let d = dem(|_, _| 10.0).with_mask(mask).unwrap();
        let out = add_terrain_bands(&composite(), &d).unwrap();
        assert!(out.band(ELEVATION_BAND).unwrap().get(5, 5).unwrap().is_nan());
        assert!(out.band(SLOPE_BAND).unwrap().get(4, 4).unwrap().is_nan());
        assert!(out.band(SLOPE_BAND).unwrap().get(2, 2).unwrap().is_finite());
    }

    #[test]
    fn test_grid_mismatch() {
        let small =
            RasterImage::new(vec![Band::new("elevation", Raster::filled(4, 4, 1.0))], ts()).unwrap();
        assert!(matches!(
            add_terrain_bands(&composite(), &small),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
