//! Supported spectral indices and their per-pixel formulas

use std::fmt;
use std::str::FromStr;

use bapcomp_core::{Error, Result};

use super::tasseled_cap::{tc_angle, tc_brightness, tc_greenness, tc_wetness};
use super::unmix::ndfi;

/// Indices computable from a harmonized six-band image.
///
/// Band values are u16 fixed-point reflectance (reflectance × 10000).
/// Ratio indices are scaled by 1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralIndex {
    B1,
    B2,
    B3,
    B4,
    B5,
    B7,
    /// Normalized Burn Ratio, (B4 − B7)/(B4 + B7)
    Nbr,
    /// Normalized Difference Moisture Index, (B4 − B5)/(B4 + B5)
    Ndmi,
    /// Normalized Difference Vegetation Index, (B4 − B3)/(B4 + B3)
    Ndvi,
    /// Normalized Difference Snow Index, (B2 − B5)/(B2 + B5)
    Ndsi,
    /// Green NDVI, (B4 − B2)/(B4 + B2)
    Gndvi,
    /// Enhanced Vegetation Index, 2.5 (B4 − B3)/(B4 + 6 B3 − 7.5 B1 + 1),
    /// evaluated on the fixed-point bands
    Evi,
    /// Tasseled-cap brightness
    Tcb,
    /// Tasseled-cap greenness
    Tcg,
    /// Tasseled-cap wetness
    Tcw,
    /// Tasseled-cap angle, atan(TCG/TCB) in degrees × 100
    Tca,
    /// Normalized Difference Fraction Index from spectral unmixing
    Ndfi,
}

const ALL_BANDS: &[&str] = &["B1", "B2", "B3", "B4", "B5", "B7"];

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 17] = [
        SpectralIndex::B1,
        SpectralIndex::B2,
        SpectralIndex::B3,
        SpectralIndex::B4,
        SpectralIndex::B5,
        SpectralIndex::B7,
        SpectralIndex::Nbr,
        SpectralIndex::Ndmi,
        SpectralIndex::Ndvi,
        SpectralIndex::Ndsi,
        SpectralIndex::Gndvi,
        SpectralIndex::Evi,
        SpectralIndex::Tcb,
        SpectralIndex::Tcg,
        SpectralIndex::Tcw,
        SpectralIndex::Tca,
        SpectralIndex::Ndfi,
    ];

    /// Canonical upper-case name, also the output band name
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::B1 => "B1",
            SpectralIndex::B2 => "B2",
            SpectralIndex::B3 => "B3",
            SpectralIndex::B4 => "B4",
            SpectralIndex::B5 => "B5",
            SpectralIndex::B7 => "B7",
            SpectralIndex::Nbr => "NBR",
            SpectralIndex::Ndmi => "NDMI",
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Ndsi => "NDSI",
            SpectralIndex::Gndvi => "GNDVI",
            SpectralIndex::Evi => "EVI",
            SpectralIndex::Tcb => "TCB",
            SpectralIndex::Tcg => "TCG",
            SpectralIndex::Tcw => "TCW",
            SpectralIndex::Tca => "TCA",
            SpectralIndex::Ndfi => "NDFI",
        }
    }

    /// Input bands, in the order [`SpectralIndex::evaluate`] expects them
    pub fn required_bands(&self) -> &'static [&'static str] {
        match self {
            SpectralIndex::B1 => &["B1"],
            SpectralIndex::B2 => &["B2"],
            SpectralIndex::B3 => &["B3"],
            SpectralIndex::B4 => &["B4"],
            SpectralIndex::B5 => &["B5"],
            SpectralIndex::B7 => &["B7"],
            SpectralIndex::Nbr => &["B4", "B7"],
            SpectralIndex::Ndmi => &["B4", "B5"],
            SpectralIndex::Ndvi => &["B4", "B3"],
            SpectralIndex::Ndsi => &["B2", "B5"],
            SpectralIndex::Gndvi => &["B4", "B2"],
            SpectralIndex::Evi => &["B4", "B3", "B1"],
            SpectralIndex::Tcb
            | SpectralIndex::Tcg
            | SpectralIndex::Tcw
            | SpectralIndex::Tca
            | SpectralIndex::Ndfi => ALL_BANDS,
        }
    }

    /// Evaluate the index for one pixel.
    ///
    /// `v` holds the values of [`SpectralIndex::required_bands`] in order.
    /// Degenerate denominators follow IEEE semantics (NaN or ±inf).
    pub fn evaluate(&self, v: &[f64]) -> f64 {
        match self {
            SpectralIndex::B1
            | SpectralIndex::B2
            | SpectralIndex::B3
            | SpectralIndex::B4
            | SpectralIndex::B5
            | SpectralIndex::B7 => v[0],
            SpectralIndex::Nbr
            | SpectralIndex::Ndmi
            | SpectralIndex::Ndvi
            | SpectralIndex::Ndsi
            | SpectralIndex::Gndvi => (v[0] - v[1]) / (v[0] + v[1]) * 1000.0,
            SpectralIndex::Evi => {
                let (nir, red, blue) = (v[0], v[1], v[2]);
                2.5 * ((nir - red) / (nir + 6.0 * red - 7.5 * blue + 1.0)) * 1000.0
            }
            SpectralIndex::Tcb => tc_brightness(six(v)),
            SpectralIndex::Tcg => tc_greenness(six(v)),
            SpectralIndex::Tcw => tc_wetness(six(v)),
            SpectralIndex::Tca => tc_angle(six(v)),
            SpectralIndex::Ndfi => ndfi(six(v)),
        }
    }
}

const NAN_PIXEL: [f64; 6] = [f64::NAN; 6];

#[inline]
fn six(v: &[f64]) -> &[f64; 6] {
    v.get(..6)
        .and_then(|s| <&[f64; 6]>::try_from(s).ok())
        .unwrap_or(&NAN_PIXEL)
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        SpectralIndex::ALL
            .into_iter()
            .find(|i| i.name() == upper)
            .ok_or_else(|| Error::UnknownIndex(s.to_string()))
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("nbr".parse::<SpectralIndex>().unwrap(), SpectralIndex::Nbr);
        assert_eq!("Tca".parse::<SpectralIndex>().unwrap(), SpectralIndex::Tca);
        assert_eq!("b7".parse::<SpectralIndex>().unwrap(), SpectralIndex::B7);
        let err = "NDWI".parse::<SpectralIndex>().unwrap_err();
        assert!(matches!(err, Error::UnknownIndex(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_normalized_differences() {
        let val = SpectralIndex::Ndvi.evaluate(&[3000.0, 1000.0]);
        // (3000 - 1000) / (3000 + 1000) * 1000 = 500
        assert!((val - 500.0).abs() < 1e-10, "Expected 500, got {}", val);

        let nbr = SpectralIndex::Nbr.evaluate(&[2000.0, 2000.0]);
        assert!(nbr.abs() < 1e-10);

        assert!(SpectralIndex::Ndmi.evaluate(&[0.0, 0.0]).is_nan());
    }

    #[test]
    fn test_evi_fixed_point() {
        // 2.5 * 2000 / (3000 + 6000 - 3750 + 1) * 1000 = 952.19958...
        let val = SpectralIndex::Evi.evaluate(&[3000.0, 1000.0, 500.0]);
        let expected = 2.5 * 2000.0 / 5251.0 * 1000.0;
        assert!((val - 952.199_581_032_184_4).abs() < 1e-6, "Expected ~952.2, got {}", val);
        assert!((val - expected).abs() < 1e-9, "Expected {}, got {}", expected, val);
    }

    #[test]
    fn test_band_pass_through() {
        assert_eq!(SpectralIndex::B5.evaluate(&[1234.0]), 1234.0);
        assert_eq!(SpectralIndex::B5.required_bands(), &["B5"]);
    }
}
