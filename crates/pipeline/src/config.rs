//! Series configuration and its validated form

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use bapcomp_algorithms::indices::{IndexRequest, SpectralIndex};
use bapcomp_algorithms::masking::MaskSpec;
use bapcomp_core::{DayWindow, Error, GridSpec, NominalDate, RasterImage, Result, Sensor};

/// What to do when one year of a series fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Return the first failure, by year
    #[default]
    Abort,
    /// Substitute the placeholder composite and record the failure
    Placeholder,
}

/// Scenes to leave out of every collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSpec {
    /// Scene identifiers; only the final `/` segment is compared
    #[serde(default)]
    pub scene_ids: Vec<String>,
    /// Drop Landsat 7 scenes acquired after the scan line corrector failure
    #[serde(default)]
    pub slc_off: bool,
}

impl ExclusionSpec {
    pub fn is_empty(&self) -> bool {
        self.scene_ids.is_empty() && !self.slc_off
    }

    /// Whether `image`, queried as `sensor`, must be dropped
    pub fn excludes(&self, image: &RasterImage, sensor: Sensor) -> bool {
        let id = image.scene_id();
        if self
            .scene_ids
            .iter()
            .any(|excluded| excluded.rsplit('/').next() == Some(id))
        {
            return true;
        }
        self.slc_off && is_landsat_7(image, sensor) && slc_failure().is_some_and(|t| image.acquired() > t)
    }
}

fn is_landsat_7(image: &RasterImage, sensor: Sensor) -> bool {
    match image.property("SPACECRAFT_ID") {
        Some(spacecraft) => spacecraft == Sensor::Le07.spacecraft_id(),
        None => image.sensor().unwrap_or(sensor) == Sensor::Le07,
    }
}

/// Landsat 7 scan line corrector failure, 2003-06-01T00:00
fn slc_failure() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2003, 6, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// User-facing series configuration, as read from JSON or CLI flags.
///
/// Names are kept as strings until [`SeriesConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default = "default_start_day")]
    pub start_day: String,
    #[serde(default = "default_end_day")]
    pub end_day: String,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<String>,
    #[serde(default = "default_masks")]
    pub masks: Vec<String>,
    #[serde(default)]
    pub exclusions: ExclusionSpec,
    #[serde(default)]
    pub indices: Vec<String>,
    /// Sign flip per entry of `indices`; missing entries are `false`
    #[serde(default)]
    pub flip: Vec<bool>,
    #[serde(default)]
    pub nominal_date: NominalDate,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_years: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    pub grid: GridSpec,
}

fn default_start_day() -> String {
    "06-01".to_string()
}

fn default_end_day() -> String {
    "09-30".to_string()
}

fn default_sensors() -> Vec<String> {
    Sensor::ALL.iter().map(|s| s.code().to_string()).collect()
}

fn default_masks() -> Vec<String> {
    MaskSpec::default().categories().map(|c| c.name().to_string()).collect()
}

fn default_concurrency() -> usize {
    4
}

impl SeriesConfig {
    /// Configuration with every optional field at its default
    pub fn new(start_year: i32, end_year: i32, grid: GridSpec) -> Self {
        Self {
            start_year,
            end_year,
            start_day: default_start_day(),
            end_day: default_end_day(),
            sensors: default_sensors(),
            masks: default_masks(),
            exclusions: ExclusionSpec::default(),
            indices: Vec::new(),
            flip: Vec::new(),
            nominal_date: NominalDate::default(),
            max_concurrent_years: default_concurrency(),
            failure_policy: FailurePolicy::default(),
            grid,
        }
    }

    /// Check every field and resolve names into typed values.
    ///
    /// Fails on the first invalid field; nothing is queried.
    pub fn validate(&self) -> Result<SeriesRequest> {
        if self.end_year < self.start_year {
            return Err(Error::InvalidYearRange {
                start: self.start_year,
                end: self.end_year,
            });
        }
        let window = DayWindow::parse(&self.start_day, &self.end_day)?;
        let masks = MaskSpec::parse(&self.masks)?;

        let sensors = self
            .sensors
            .iter()
            .map(|s| s.parse::<Sensor>())
            .collect::<Result<Vec<_>>>()?;
        if sensors.is_empty() {
            return Err(Error::InvalidParameter {
                name: "sensors",
                value: "[]".into(),
                reason: "at least one sensor is required".into(),
            });
        }

        if self.flip.len() > self.indices.len() {
            return Err(Error::InvalidParameter {
                name: "flip",
                value: format!("{} entries", self.flip.len()),
                reason: format!("only {} indices are listed", self.indices.len()),
            });
        }
        let indices = self
            .indices
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let index = name.parse::<SpectralIndex>()?;
                Ok(IndexRequest::new(index, self.flip.get(i).copied().unwrap_or(false)))
            })
            .collect::<Result<Vec<_>>>()?;

        if self.max_concurrent_years == 0 {
            return Err(Error::InvalidParameter {
                name: "max_concurrent_years",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(Error::InvalidDimensions {
                width: self.grid.cols,
                height: self.grid.rows,
            });
        }

        Ok(SeriesRequest {
            start_year: self.start_year,
            end_year: self.end_year,
            window,
            sensors,
            masks,
            exclusions: self.exclusions.clone(),
            indices,
            nominal_date: self.nominal_date,
            grid: self.grid.clone(),
            max_concurrent_years: self.max_concurrent_years,
            failure_policy: self.failure_policy,
        })
    }
}

/// Validated, immutable description of a series run
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    start_year: i32,
    end_year: i32,
    window: DayWindow,
    sensors: Vec<Sensor>,
    masks: MaskSpec,
    exclusions: ExclusionSpec,
    indices: Vec<IndexRequest>,
    nominal_date: NominalDate,
    grid: GridSpec,
    max_concurrent_years: usize,
    failure_policy: FailurePolicy,
}

impl SeriesRequest {
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn year_count(&self) -> usize {
        (self.end_year - self.start_year + 1) as usize
    }

    pub fn window(&self) -> &DayWindow {
        &self.window
    }

    /// Sensors in merge order
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn masks(&self) -> &MaskSpec {
        &self.masks
    }

    pub fn exclusions(&self) -> &ExclusionSpec {
        &self.exclusions
    }

    pub fn indices(&self) -> &[IndexRequest] {
        &self.indices
    }

    pub fn nominal_date(&self) -> NominalDate {
        self.nominal_date
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn max_concurrent_years(&self) -> usize {
        self.max_concurrent_years
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::{Band, GeoTransform, Raster};

    fn grid() -> GridSpec {
        GridSpec::new(4, 4, GeoTransform::new(0.0, 120.0, 30.0, -30.0))
    }

    fn scene(id: &str, sensor: Sensor, y: i32, m: u32, d: u32) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        RasterImage::new(vec![Band::new("SR_B4", Raster::new(4, 4))], ts)
            .unwrap()
            .with_scene_id(id)
            .with_sensor(sensor)
    }

    #[test]
    fn test_defaults() {
        let req = SeriesConfig::new(2000, 2002, grid()).validate().unwrap();
        assert_eq!(req.years(), 2000..=2002);
        assert_eq!(req.year_count(), 3);
        assert_eq!(req.sensors(), &Sensor::ALL);
        assert_eq!(req.masks(), &MaskSpec::default());
        assert_eq!(req.max_concurrent_years(), 4);
        assert_eq!(req.failure_policy(), FailurePolicy::Abort);
        assert_eq!(req.nominal_date(), NominalDate::default());
    }

    #[test]
    fn test_validation_errors() {
        let mut cfg = SeriesConfig::new(2005, 2001, grid());
        assert!(matches!(cfg.validate(), Err(Error::InvalidYearRange { .. })));

        cfg = SeriesConfig::new(2001, 2005, grid());
        cfg.masks = vec!["cloud".into(), "fog".into()];
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::UnknownMaskCategory(ref n) if n == "fog"));
        assert!(err.is_validation());

        cfg = SeriesConfig::new(2001, 2005, grid());
        cfg.start_day = "6-1".into();
        assert!(matches!(cfg.validate(), Err(Error::InvalidMonthDay(_))));

        cfg = SeriesConfig::new(2001, 2005, grid());
        cfg.indices = vec!["NBR".into(), "NDWI".into()];
        assert!(matches!(cfg.validate(), Err(Error::UnknownIndex(_))));

        cfg = SeriesConfig::new(2001, 2005, grid());
        cfg.sensors = vec!["LC07".into()];
        assert!(matches!(cfg.validate(), Err(Error::UnknownSensor(_))));

        cfg = SeriesConfig::new(2001, 2005, grid());
        cfg.max_concurrent_years = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_flip_alignment() {
        let mut cfg = SeriesConfig::new(2001, 2001, grid());
        cfg.indices = vec!["nbr".into(), "tcw".into()];
        cfg.flip = vec![true];
        let req = cfg.validate().unwrap();
        assert_eq!(
            req.indices(),
            &[
                IndexRequest::new(SpectralIndex::Nbr, true),
                IndexRequest::new(SpectralIndex::Tcw, false)
            ]
        );

        cfg.flip = vec![true, false, true];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_config() {
        let json = r#"{
            "start_year": 1995,
            "end_year": 1997,
            "start_day": "11-01",
            "end_day": "03-31",
            "sensors": ["lt05", "LE07"],
            "masks": ["cloud", "waterplus"],
            "exclusions": { "scene_ids": ["LANDSAT/LT05/C02/T1_L2/LT05_203031_19960712"], "slc_off": true },
            "nominal_date": "07-15",
            "failure_policy": "placeholder",
            "grid": {
                "rows": 4, "cols": 4,
                "transform": { "origin_x": 0.0, "origin_y": 120.0, "pixel_width": 30.0, "pixel_height": -30.0 },
                "crs": { "epsg": 32630 }
            }
        }"#;
        let cfg: SeriesConfig = serde_json::from_str(json).unwrap();
        let req = cfg.validate().unwrap();
        assert!(req.window().wraps());
        assert_eq!(req.sensors(), &[Sensor::Lt05, Sensor::Le07]);
        assert_eq!(req.failure_policy(), FailurePolicy::Placeholder);
        assert_eq!(req.nominal_date().timestamp(1996).to_string(), "1996-07-15 00:00:00");

        assert!(serde_json::from_str::<SeriesConfig>(r#"{"start_year": 1, "end_year": 2, "grid": 3}"#).is_err());
    }

    #[test]
    fn test_exclusions() {
        let spec = ExclusionSpec {
            scene_ids: vec!["LANDSAT/LC08/C02/T1_L2/LC08_046028_20170815".into()],
            slc_off: true,
        };
        assert!(spec.excludes(&scene("LC08_046028_20170815", Sensor::Lc08, 2017, 8, 15), Sensor::Lc08));
        assert!(!spec.excludes(&scene("LC08_046028_20170831", Sensor::Lc08, 2017, 8, 31), Sensor::Lc08));

        // SLC failure
        assert!(spec.excludes(&scene("LE07_a", Sensor::Le07, 2003, 6, 1), Sensor::Le07));
        assert!(!spec.excludes(&scene("LE07_b", Sensor::Le07, 2003, 5, 31), Sensor::Le07));
        assert!(!spec.excludes(&scene("LT05_c", Sensor::Lt05, 2005, 7, 1), Sensor::Lt05));

        let none = ExclusionSpec::default();
        assert!(none.is_empty());
        assert!(!none.excludes(&scene("LE07_a", Sensor::Le07, 2010, 6, 1), Sensor::Le07));
    }
}
