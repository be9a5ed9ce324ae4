//! Landsat sensor profiles
//!
//! Each sensor maps its native surface-reflectance band names onto the
//! harmonized six-band layout `B1 B2 B3 B4 B5 B7` (blue, green, red, NIR,
//! SWIR1, SWIR2) used by everything downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Harmonized band names, in order
pub const HARMONIZED_BANDS: [&str; 6] = ["B1", "B2", "B3", "B4", "B5", "B7"];

/// Name of the pixel quality band in Collection 2 Level-2 products
pub const QA_BAND: &str = "QA_PIXEL";

/// Collection 2 surface reflectance scale factor
pub const SR_SCALE: f64 = 0.0000275;

/// Collection 2 surface reflectance offset
pub const SR_OFFSET: f64 = -0.2;

/// Multiplier applied after scaling to obtain fixed-point reflectance
pub const FIXED_POINT: f64 = 10_000.0;

/// Supported Landsat sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sensor {
    /// Landsat 5 Thematic Mapper
    Lt05,
    /// Landsat 7 Enhanced Thematic Mapper Plus
    Le07,
    /// Landsat 8 OLI
    Lc08,
    /// Landsat 9 OLI-2
    Lc09,
}

/// Static band table for one sensor
#[derive(Debug, Clone, Copy)]
pub struct SensorProfile {
    pub sensor: Sensor,
    pub code: &'static str,
    pub spacecraft: &'static str,
    /// Native band names in harmonized order
    pub native_bands: [&'static str; 6],
}

const PROFILES: [SensorProfile; 4] = [
    SensorProfile {
        sensor: Sensor::Lt05,
        code: "LT05",
        spacecraft: "LANDSAT_5",
        native_bands: ["SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7"],
    },
    SensorProfile {
        sensor: Sensor::Le07,
        code: "LE07",
        spacecraft: "LANDSAT_7",
        native_bands: ["SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7"],
    },
    SensorProfile {
        sensor: Sensor::Lc08,
        code: "LC08",
        spacecraft: "LANDSAT_8",
        native_bands: ["SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7"],
    },
    SensorProfile {
        sensor: Sensor::Lc09,
        code: "LC09",
        spacecraft: "LANDSAT_9",
        native_bands: ["SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7"],
    },
];

impl Sensor {
    /// All sensors in launch order, the default merge order
    pub const ALL: [Sensor; 4] = [Sensor::Lt05, Sensor::Le07, Sensor::Lc08, Sensor::Lc09];

    pub fn profile(&self) -> &'static SensorProfile {
        let idx = match self {
            Sensor::Lt05 => 0,
            Sensor::Le07 => 1,
            Sensor::Lc08 => 2,
            Sensor::Lc09 => 3,
        };
        &PROFILES[idx]
    }

    pub fn code(&self) -> &'static str {
        self.profile().code
    }

    /// Collection 2 Tier 1 Level-2 dataset identifier
    pub fn dataset_id(&self) -> String {
        format!("LANDSAT/{}/C02/T1_L2", self.code())
    }

    /// Value of the `SPACECRAFT_ID` scene property
    pub fn spacecraft_id(&self) -> &'static str {
        self.profile().spacecraft
    }

    /// Native band name for a harmonized band name
    pub fn native_band(&self, harmonized: &str) -> Option<&'static str> {
        HARMONIZED_BANDS
            .iter()
            .position(|b| *b == harmonized)
            .map(|i| self.profile().native_bands[i])
    }
}

impl FromStr for Sensor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        PROFILES
            .iter()
            .find(|p| p.code == upper)
            .map(|p| p.sensor)
            .ok_or_else(|| Error::UnknownSensor(s.to_string()))
    }
}

impl TryFrom<String> for Sensor {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Sensor> for String {
    fn from(s: Sensor) -> String {
        s.code().to_string()
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("lc08".parse::<Sensor>().unwrap(), Sensor::Lc08);
        assert_eq!(" LT05 ".parse::<Sensor>().unwrap(), Sensor::Lt05);
        assert!(matches!("LM01".parse::<Sensor>(), Err(Error::UnknownSensor(_))));
    }

    #[test]
    fn oli_bands_shift_by_one() {
        assert_eq!(Sensor::Lc08.native_band("B1"), Some("SR_B2"));
        assert_eq!(Sensor::Lc09.native_band("B5"), Some("SR_B6"));
        assert_eq!(Sensor::Le07.native_band("B7"), Some("SR_B7"));
        assert_eq!(Sensor::Lt05.native_band("B6"), None);
    }

    #[test]
    fn dataset_identifiers() {
        assert_eq!(Sensor::Le07.dataset_id(), "LANDSAT/LE07/C02/T1_L2");
        assert_eq!(Sensor::Le07.spacecraft_id(), "LANDSAT_7");
    }
}
