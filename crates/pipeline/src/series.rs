//! Annual composite series: one medoid per year, assembled concurrently

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::collection::{build_year_window, combined_collection};
use crate::config::{FailurePolicy, SeriesRequest};
use crate::error::{PipelineError, Result};
use bapcomp_algorithms::composite::{clear_pixel_count, medoid};
use bapcomp_algorithms::indices::{transform_collection, IndexRequest};
use bapcomp_core::{Raster, RasterCollection, RasterImage, Sensor, HARMONIZED_BANDS};
use bapcomp_imagery::ImageryService;

/// Composite of one year
#[derive(Debug, Clone)]
pub struct SeriesEntry {
    pub year: i32,
    pub image: RasterImage,
    /// Prepared scenes that fed the medoid
    pub source_count: usize,
    /// The year failed and the placeholder stands in for it
    pub substituted: bool,
}

/// A year replaced by its placeholder under [`FailurePolicy::Placeholder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearFailure {
    pub year: i32,
    /// Sensor whose query failed, if the failure was a scene query
    pub sensor: Option<Sensor>,
    pub reason: String,
}

/// One composite per year, ordered by year
#[derive(Debug, Clone, Default)]
pub struct CompositeSeries {
    entries: Vec<SeriesEntry>,
    failures: Vec<YearFailure>,
}

impl CompositeSeries {
    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    pub fn failures(&self) -> &[YearFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, year: i32) -> Option<&SeriesEntry> {
        self.entries.iter().find(|e| e.year == year)
    }

    pub fn years(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.year).collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &RasterImage> + '_ {
        self.entries.iter().map(|e| &e.image)
    }

    /// The composites as a collection, in year order
    pub fn to_collection(&self) -> RasterCollection {
        self.images().cloned().collect()
    }

    /// Index stack of every composite, one band per request
    pub fn index_series(&self, requests: &[IndexRequest]) -> Result<RasterCollection> {
        Ok(transform_collection(&self.to_collection(), requests)?)
    }
}

/// Fully masked harmonized image dated at the nominal day of `year`
pub fn placeholder_image(request: &SeriesRequest, year: i32) -> bapcomp_core::Result<RasterImage> {
    RasterImage::placeholder(
        &HARMONIZED_BANDS,
        request.grid(),
        request.nominal_date().timestamp(year),
    )
}

// ---------------------------------------------------------------------------
// Year tasks
// ---------------------------------------------------------------------------

async fn composite_year<S: ImageryService>(
    service: &S,
    year: i32,
    request: &SeriesRequest,
) -> Result<SeriesEntry> {
    let collection = combined_collection(service, year, request).await?;
    let source_count = collection.len();
    let placeholder =
        placeholder_image(request, year).map_err(|source| PipelineError::Composite { year, source })?;

    let image = tokio::task::spawn_blocking(move || medoid(&collection, &placeholder))
        .await
        .map_err(|e| PipelineError::TaskFailed {
            year,
            reason: e.to_string(),
        })?
        .map_err(|source| PipelineError::Composite { year, source })?;

    debug!(year, sources = source_count, valid = image.valid_count(), "composited year");
    Ok(SeriesEntry {
        year,
        image,
        source_count,
        substituted: false,
    })
}

fn substitute(request: &SeriesRequest, year: i32) -> Result<SeriesEntry> {
    let placeholder =
        placeholder_image(request, year).map_err(|source| PipelineError::Composite { year, source })?;
    let image = medoid(&RasterCollection::new(), &placeholder)
        .map_err(|source| PipelineError::Composite { year, source })?;
    Ok(SeriesEntry {
        year,
        image,
        source_count: 0,
        substituted: true,
    })
}

type CancelMap = Arc<Mutex<BTreeMap<i32, oneshot::Sender<()>>>>;

/// Cancels individual years of a running [`SeriesJob`]
#[derive(Debug, Clone)]
pub struct SeriesCanceller {
    senders: CancelMap,
}

impl SeriesCanceller {
    /// Cancel one year. Returns false when the year is unknown, already
    /// cancelled or already finished.
    pub fn cancel_year(&self, year: i32) -> bool {
        match self.senders.lock().remove(&year) {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Years still running and not yet cancelled
    pub fn pending_years(&self) -> Vec<i32> {
        self.senders.lock().keys().copied().collect()
    }
}

/// Handle to a running series
pub struct SeriesJob {
    tasks: JoinSet<(i32, Result<SeriesEntry>)>,
    canceller: SeriesCanceller,
    request: Arc<SeriesRequest>,
}

impl SeriesJob {
    pub fn canceller(&self) -> SeriesCanceller {
        self.canceller.clone()
    }

    /// Cancel one year without touching the others
    pub fn cancel_year(&self, year: i32) -> bool {
        self.canceller.cancel_year(year)
    }

    /// Wait for every year and assemble the series in year order.
    ///
    /// Under [`FailurePolicy::Abort`] the failure of the earliest failing
    /// year is returned once all tasks have finished.
    pub async fn wait(mut self) -> Result<CompositeSeries> {
        let mut slots: BTreeMap<i32, Result<SeriesEntry>> = BTreeMap::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((year, outcome)) => {
                    slots.insert(year, outcome);
                }
                Err(e) => warn!(error = %e, "year task did not complete"),
            }
        }

        let request = &self.request;
        let mut series = CompositeSeries::default();
        for year in request.years() {
            let outcome = slots.remove(&year).unwrap_or_else(|| {
                Err(PipelineError::TaskFailed {
                    year,
                    reason: "task did not complete".into(),
                })
            });
            match outcome {
                Ok(entry) => series.entries.push(entry),
                Err(err) => match request.failure_policy() {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Placeholder => {
                        warn!(year, error = %err, "substituting placeholder");
                        let sensor = match &err {
                            PipelineError::Query { sensor, .. } => *sensor,
                            _ => None,
                        };
                        series.failures.push(YearFailure {
                            year,
                            sensor,
                            reason: err.to_string(),
                        });
                        series.entries.push(substitute(request, year)?);
                    }
                },
            }
        }

        info!(
            years = series.len(),
            failures = series.failures.len(),
            "series complete"
        );
        Ok(series)
    }
}

/// Start one task per year, at most `max_concurrent_years` at a time
pub fn spawn_series<S>(service: Arc<S>, request: SeriesRequest) -> SeriesJob
where
    S: ImageryService + 'static,
{
    let request = Arc::new(request);
    let semaphore = Arc::new(Semaphore::new(request.max_concurrent_years()));
    let senders: CancelMap = Arc::new(Mutex::new(BTreeMap::new()));
    let mut tasks = JoinSet::new();

    info!(
        start = request.start_year(),
        end = request.end_year(),
        sensors = request.sensors().len(),
        "starting series"
    );

    for year in request.years() {
        let (tx, cancel_rx) = oneshot::channel();
        senders.lock().insert(year, tx);

        let service = Arc::clone(&service);
        let request = Arc::clone(&request);
        let semaphore = Arc::clone(&semaphore);
        let senders = Arc::clone(&senders);
        tasks.spawn(async move {
            let work = async {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::TaskFailed {
                        year,
                        reason: e.to_string(),
                    })?;
                composite_year(service.as_ref(), year, &request).await
            };
            // a pending cancellation wins over work that is ready
            let outcome = tokio::select! {
                biased;
                Ok(()) = cancel_rx => Err(PipelineError::Cancelled { year }),
                res = work => res,
            };
            senders.lock().remove(&year);
            (year, outcome)
        });
    }

    SeriesJob {
        tasks,
        canceller: SeriesCanceller { senders },
        request,
    }
}

/// Composite every year of `request`
pub async fn build_series<S>(service: Arc<S>, request: &SeriesRequest) -> Result<CompositeSeries>
where
    S: ImageryService + 'static,
{
    spawn_series(service, request.clone()).wait().await
}

/// Valid observations per pixel and year; empty years count zero
pub async fn clear_pixel_count_series<S: ImageryService>(
    service: &S,
    request: &SeriesRequest,
) -> Result<Vec<(i32, Raster<u16>)>> {
    let mut out = Vec::with_capacity(request.year_count());
    for year in request.years() {
        let collection = combined_collection(service, year, request).await?;
        let counts = if collection.is_empty() {
            Raster::on_grid(request.grid())
        } else {
            clear_pixel_count(&collection).map_err(|source| PipelineError::Composite { year, source })?
        };
        out.push((year, counts));
    }
    Ok(out)
}

/// `dataset/scene_id` of every scene that would feed the series
pub async fn collection_id_list<S: ImageryService>(
    service: &S,
    request: &SeriesRequest,
) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for year in request.years() {
        for &sensor in request.sensors() {
            let collection = build_year_window(
                service,
                year,
                request.window(),
                sensor,
                request.grid(),
                request.exclusions(),
            )
            .await?;
            let dataset = sensor.dataset_id();
            ids.extend(collection.iter().map(|img| format!("{}/{}", dataset, img.scene_id())));
        }
    }
    Ok(ids)
}
