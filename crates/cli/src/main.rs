//! bapcomp CLI - annual best-available-pixel Landsat composites

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bapcomp_algorithms::landcover::{class_area, corine_training_image, CorineLevel};
use bapcomp_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use bapcomp_core::{Band, RasterImage};
use bapcomp_imagery::{CachedImageryService, CatalogImageryService};
use bapcomp_pipeline::{
    build_series, clear_pixel_count_series, collection_id_list, FailurePolicy, SeriesConfig,
    SeriesRequest,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bapcomp")]
#[command(author, version, about = "Annual best-available-pixel Landsat composites", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a series configuration without querying anything
    Validate {
        #[command(flatten)]
        series: SeriesArgs,
    },
    /// Build the medoid composite of every year and write its bands
    Composite {
        #[command(flatten)]
        series: SeriesArgs,
        #[command(flatten)]
        source: SourceArgs,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the identifiers of every scene feeding the series
    Ids {
        #[command(flatten)]
        series: SeriesArgs,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Count clear observations per pixel and year
    ClearCount {
        #[command(flatten)]
        series: SeriesArgs,
        #[command(flatten)]
        source: SourceArgs,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remap a CORINE raster into training classes and report class areas
    Corine {
        /// Input CORINE land cover raster
        input: PathBuf,
        /// Output class raster
        output: PathBuf,
        /// Nomenclature level: 0, 1, 2 or 3
        #[arg(short, long, default_value = "1")]
        level: u8,
    },
}

/// Series configuration file plus flag overrides
#[derive(Args)]
struct SeriesArgs {
    /// Series configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,
    /// Override the first year
    #[arg(long)]
    start_year: Option<i32>,
    /// Override the last year
    #[arg(long)]
    end_year: Option<i32>,
    /// Override the sensors, e.g. LT05,LE07
    #[arg(long, value_delimiter = ',')]
    sensors: Option<Vec<String>>,
    /// Override the mask categories, e.g. cloud,shadow
    #[arg(long, value_delimiter = ',')]
    masks: Option<Vec<String>>,
    /// Override the indices, e.g. NBR,TCA
    #[arg(long, value_delimiter = ',')]
    indices: Option<Vec<String>>,
    /// Sign flip per index, e.g. true,false
    #[arg(long, value_delimiter = ',')]
    flip: Option<Vec<bool>>,
    /// Substitute placeholders for failed years instead of aborting
    #[arg(long)]
    keep_going: bool,
}

impl SeriesArgs {
    fn load(&self) -> Result<SeriesConfig> {
        let text = std::fs::read_to_string(&self.config)
            .with_context(|| format!("Failed to read {}", self.config.display()))?;
        let mut cfg: SeriesConfig = serde_json::from_str(&text).context("Invalid series configuration")?;

        if let Some(year) = self.start_year {
            cfg.start_year = year;
        }
        if let Some(year) = self.end_year {
            cfg.end_year = year;
        }
        if let Some(sensors) = &self.sensors {
            cfg.sensors = sensors.clone();
        }
        if let Some(masks) = &self.masks {
            cfg.masks = masks.clone();
        }
        if let Some(indices) = &self.indices {
            cfg.indices = indices.clone();
        }
        if let Some(flip) = &self.flip {
            cfg.flip = flip.clone();
        }
        if self.keep_going {
            cfg.failure_policy = FailurePolicy::Placeholder;
        }
        Ok(cfg)
    }

    fn request(&self) -> Result<SeriesRequest> {
        let cfg = self.load()?;
        cfg.validate().context("Invalid series configuration")
    }
}

/// Where scenes and auxiliary layers come from
#[derive(Args)]
struct SourceArgs {
    /// Scene catalog (JSON manifest of per-band GeoTIFFs)
    #[arg(long)]
    catalog: PathBuf,
    /// Auxiliary layers kept in memory
    #[arg(long, default_value = "8")]
    cache_size: usize,
}

type Service = CachedImageryService<CatalogImageryService>;

impl SourceArgs {
    fn open(&self) -> Result<Service> {
        let catalog = CatalogImageryService::open(&self.catalog)
            .with_context(|| format!("Failed to open catalog {}", self.catalog.display()))?;
        info!("Catalog: {} scenes", catalog.manifest().scenes.len());
        Ok(CachedImageryService::new(catalog, self.cache_size))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// One GeoTIFF per band, named `<stem>_<band>.tif`
fn write_bands(image: &RasterImage, dir: &Path, stem: &str, options: &GeoTiffOptions) -> Result<()> {
    for Band { name, data } in image.bands() {
        let path = dir.join(format!("{}_{}.tif", stem, name));
        write_geotiff(data, &path, Some(options.clone()))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

async fn run_composite(series: &SeriesArgs, source: &SourceArgs, output: &Path) -> Result<()> {
    let request = series.request()?;
    let service = Arc::new(source.open()?);
    std::fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;

    let start = Instant::now();
    let pb = spinner(&format!(
        "Compositing {}-{}...",
        request.start_year(),
        request.end_year()
    ));
    let result = build_series(Arc::clone(&service), &request).await;
    pb.finish_and_clear();
    let composites = result.context("Series failed")?;

    let pb = spinner("Writing output...");
    let reflectance = GeoTiffOptions::uint16(Some(0.0));
    for entry in composites.entries() {
        write_bands(&entry.image, output, &entry.year.to_string(), &reflectance)?;
    }
    if !request.indices().is_empty() {
        let indices = composites.index_series(request.indices())?;
        for (entry, image) in composites.entries().iter().zip(indices.iter()) {
            write_bands(image, output, &entry.year.to_string(), &GeoTiffOptions::default())?;
        }
    }
    pb.finish_and_clear();

    for entry in composites.entries() {
        let note = if entry.substituted { " (placeholder)" } else { "" };
        println!(
            "{}: {} scenes, {} clear pixels{}",
            entry.year,
            entry.source_count,
            entry.image.valid_count(),
            note
        );
    }
    for failure in composites.failures() {
        println!("  failed {}: {}", failure.year, failure.reason);
    }
    let (hits, misses) = service.stats();
    info!("Auxiliary cache: {} hits, {} misses", hits, misses);
    done("Composites", output, start.elapsed());
    Ok(())
}

async fn run_ids(series: &SeriesArgs, source: &SourceArgs) -> Result<()> {
    let request = series.request()?;
    let service = source.open()?;
    let ids = collection_id_list(&service, &request).await?;
    for id in &ids {
        println!("{}", id);
    }
    info!("{} scenes", ids.len());
    Ok(())
}

async fn run_clear_count(series: &SeriesArgs, source: &SourceArgs, output: &Path) -> Result<()> {
    let request = series.request()?;
    let service = source.open()?;
    std::fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;

    let start = Instant::now();
    let pb = spinner("Counting clear observations...");
    let counts = clear_pixel_count_series(&service, &request).await;
    pb.finish_and_clear();

    for (year, raster) in counts? {
        let path = output.join(format!("{}_clear_count.tif", year));
        write_geotiff(&raster, &path, Some(GeoTiffOptions::uint16(None)))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    done("Clear counts", output, start.elapsed());
    Ok(())
}

fn run_corine(input: &Path, output: &Path, level: u8) -> Result<()> {
    let start = Instant::now();
    let pb = spinner("Reading raster...");
    let raster = read_geotiff::<f64, _>(input).context("Failed to read raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());

    let corine = RasterImage::new(vec![Band::new("corine", raster)], Default::default())?;
    let classes = corine_training_image(&corine, &CorineLevel::from_level(level)?)?;

    let mut out = classes.bands()[0].data.clone();
    for ((row, col), v) in out.data_mut().indexed_iter_mut() {
        if !classes.is_valid(row, col) {
            *v = 0.0;
        }
    }
    write_geotiff(&out, output, Some(GeoTiffOptions::uint16(Some(0.0)))).context("Failed to write output")?;

    println!("Class areas (km²):");
    for (class, area) in class_area(&classes)? {
        println!("  {:>4}: {:.3}", class, area);
    }
    done("Land cover", output, start.elapsed());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Validate { series } => {
            let request = series.request()?;
            println!(
                "Valid: {} years ({}-{}), {} sensors, window {}..{}, {} indices",
                request.year_count(),
                request.start_year(),
                request.end_year(),
                request.sensors().len(),
                request.window().start(),
                request.window().end(),
                request.indices().len()
            );
        }
        Commands::Composite {
            series,
            source,
            output,
        } => run_composite(&series, &source, &output).await?,
        Commands::Ids { series, source } => run_ids(&series, &source).await?,
        Commands::ClearCount {
            series,
            source,
            output,
        } => run_clear_count(&series, &source, &output).await?,
        Commands::Corine {
            input,
            output,
            level,
        } => run_corine(&input, &output, level)?,
    }

    Ok(())
}
