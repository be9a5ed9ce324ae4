//! CORINE land cover remapping into training class images

use ndarray::{Array2, Zip};

use bapcomp_core::{Band, Error, RasterImage, Result};

/// Band name of every class image produced here
pub const LANDCOVER_BAND: &str = "landcover";

/// The 44 CORINE level-3 codes, in nomenclature order
pub const CORINE_CODES: [u16; 44] = [
    111, 112, 121, 122, 123, 124, 131, 132, 133, 141, 142, // artificial surfaces
    211, 212, 213, 221, 222, 223, 231, 241, 242, 243, 244, // agricultural areas
    311, 312, 313, 321, 322, 323, 324, 331, 332, 333, 334, 335, // forest and semi-natural
    411, 412, 421, 422, 423, // wetlands
    511, 512, 521, 522, 523, // water bodies
];

const LEVEL_0: [u16; 44] = [
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, //
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, //
    0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0,
];

const LEVEL_1: [u16; 44] = [
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, //
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, //
    4, 4, 4, 4, 4, //
    5, 5, 5, 5, 5,
];

const LEVEL_2: [u16; 44] = [
    1, 1, // urban fabric
    2, 2, 2, 2, // industrial, commercial and transport
    3, 3, 3, // mine, dump and construction
    4, 4, // artificial non-agricultural vegetated
    5, 5, 5, // arable land
    6, 6, 6, // permanent crops
    7, // pastures
    8, 8, 8, 8, // heterogeneous agricultural
    9, 9, 9, // forests
    10, 10, 10, 10, // scrub and herbaceous
    11, 11, 11, 11, 11, // open spaces
    12, 12, // inland wetlands
    13, 13, 13, // maritime wetlands
    14, 14, // inland waters
    15, 15, 15, // marine waters
];

/// Target class scheme for [`corine_training_image`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorineLevel {
    /// Artificial, agricultural, forest; water and wetlands dropped
    Level0,
    /// Five classes
    Level1,
    /// Fifteen classes
    Level2,
    /// The original codes
    Level3,
    /// User mapping, one target class per entry of [`CORINE_CODES`]
    Custom(Vec<u16>),
}

impl CorineLevel {
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(CorineLevel::Level0),
            1 => Ok(CorineLevel::Level1),
            2 => Ok(CorineLevel::Level2),
            3 => Ok(CorineLevel::Level3),
            _ => Err(Error::InvalidParameter {
                name: "level",
                value: level.to_string(),
                reason: "CORINE class level must be 0, 1, 2 or 3".into(),
            }),
        }
    }

    /// Custom mapping, validated to have one entry per CORINE code
    pub fn custom(mapping: Vec<u16>) -> Result<Self> {
        check_mapping(&mapping)?;
        Ok(CorineLevel::Custom(mapping))
    }

    fn target(&self, code: u16) -> Option<u16> {
        let pos = CORINE_CODES.iter().position(|&c| c == code)?;
        match self {
            CorineLevel::Level0 => Some(LEVEL_0[pos]),
            CorineLevel::Level1 => Some(LEVEL_1[pos]),
            CorineLevel::Level2 => Some(LEVEL_2[pos]),
            CorineLevel::Level3 => Some(code),
            CorineLevel::Custom(mapping) => mapping.get(pos).copied(),
        }
    }
}

fn check_mapping(mapping: &[u16]) -> Result<()> {
    if mapping.len() != CORINE_CODES.len() {
        return Err(Error::InvalidParameter {
            name: "mapping",
            value: format!("{} entries", mapping.len()),
            reason: format!("expected {} entries", CORINE_CODES.len()),
        });
    }
    Ok(())
}

/// Remap the first band of a CORINE image into a `landcover` class band.
///
/// Pixels holding a value outside [`CORINE_CODES`] are masked. At
/// [`CorineLevel::Level0`] water bodies and wetlands map to 0 and are
/// masked too.
pub fn corine_training_image(corine: &RasterImage, level: &CorineLevel) -> Result<RasterImage> {
    if let CorineLevel::Custom(mapping) = level {
        check_mapping(mapping)?;
    }

    let source = &corine.bands()[0].data;
    let (rows, cols) = source.shape();
    let mut classes = source.with_same_meta::<f64>(rows, cols);
    classes.set_nodata(None);
    let mut mask = Array2::from_elem((rows, cols), false);

    Zip::from(classes.data_mut())
        .and(&mut mask)
        .and(source.data())
        .and(corine.mask())
        .for_each(|out, m, &code, &valid| {
            let target = if valid && code.is_finite() && code >= 0.0 && code <= u16::MAX as f64 {
                level.target(code.round() as u16)
            } else {
                None
            };
            match target {
                Some(0) if *level == CorineLevel::Level0 => {}
                Some(class) => {
                    *out = class as f64;
                    *m = true;
                }
                None => {}
            }
        });

    RasterImage::new(vec![Band::new(LANDCOVER_BAND, classes)], corine.acquired())?
        .with_metadata_of(corine)
        .with_mask(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::Raster;
    use chrono::NaiveDate;

    fn corine(codes: &[f64]) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(2018, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let band = Raster::from_vec(codes.to_vec(), 1, codes.len()).unwrap();
        RasterImage::new(vec![Band::new("landcover", band)], ts).unwrap()
    }

    fn classes(img: &RasterImage) -> Vec<Option<f64>> {
        (0..img.cols())
            .map(|c| {
                img.is_valid(0, c)
                    .then(|| img.band(LANDCOVER_BAND).unwrap().get(0, c).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_tables_cover_every_code() {
        for table in [LEVEL_0, LEVEL_1, LEVEL_2] {
            assert_eq!(table.len(), CORINE_CODES.len());
        }
        assert_eq!(*LEVEL_2.iter().max().unwrap(), 15);
        assert_eq!(*LEVEL_1.iter().max().unwrap(), 5);
    }

    #[test]
    fn test_level_0_drops_water_and_wetlands() {
        let img = corine(&[112.0, 211.0, 312.0, 411.0, 512.0]);
        let out = corine_training_image(&img, &CorineLevel::Level0).unwrap();
        assert_eq!(out.band_names(), vec![LANDCOVER_BAND]);
        assert_eq!(classes(&out), vec![Some(1.0), Some(2.0), Some(3.0), None, None]);
    }

    #[test]
    fn test_levels() {
        let img = corine(&[112.0, 231.0, 335.0, 421.0, 523.0]);
        let l1 = corine_training_image(&img, &CorineLevel::Level1).unwrap();
        assert_eq!(classes(&l1), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);

        let l2 = corine_training_image(&img, &CorineLevel::Level2).unwrap();
        assert_eq!(classes(&l2), vec![Some(1.0), Some(7.0), Some(11.0), Some(13.0), Some(15.0)]);

        let l3 = corine_training_image(&img, &CorineLevel::Level3).unwrap();
        assert_eq!(classes(&l3)[2], Some(335.0));
    }

    #[test]
    fn test_unknown_codes_are_masked() {
        let img = corine(&[999.0, 48.0, f64::NAN, 311.0]);
        let out = corine_training_image(&img, &CorineLevel::Level1).unwrap();
        assert_eq!(classes(&out), vec![None, None, None, Some(3.0)]);
    }

    #[test]
    fn test_custom_mapping() {
        assert!(CorineLevel::custom(vec![1; 10]).is_err());
        let mut mapping = vec![9; 44];
        mapping[0] = 4;
        let level = CorineLevel::custom(mapping).unwrap();
        let out = corine_training_image(&corine(&[111.0, 523.0]), &level).unwrap();
        assert_eq!(classes(&out), vec![Some(4.0), Some(9.0)]);

        assert!(corine_training_image(&corine(&[111.0]), &CorineLevel::Custom(vec![1])).is_err());
        assert!(CorineLevel::from_level(4).is_err());
    }
}
