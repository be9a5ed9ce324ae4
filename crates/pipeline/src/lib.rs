//! # BAPcomp Pipeline
//!
//! Assembly of annual best-available-pixel composite series.
//!
//! A [`SeriesConfig`] is validated into an immutable [`SeriesRequest`]
//! before any query is issued. Each year then runs as its own task:
//! scenes of every sensor are queried for the seasonal window, exclusions
//! removed, images harmonized and masked, and the merged collection reduced
//! to a medoid composite dated at the nominal day of the year.
//!
//! ```ignore
//! let request = SeriesConfig::new(2000, 2020, grid).validate()?;
//! let series = build_series(Arc::new(service), &request).await?;
//! let nbr = series.index_series(request.indices())?;
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod series;

pub use collection::{build_year_window, combined_collection, load_auxiliary, remove_images, sensor_collection};
pub use config::{ExclusionSpec, FailurePolicy, SeriesConfig, SeriesRequest};
pub use error::{PipelineError, Result};
pub use series::{
    build_series, clear_pixel_count_series, collection_id_list, placeholder_image, spawn_series,
    CompositeSeries, SeriesCanceller, SeriesEntry, SeriesJob, YearFailure,
};
