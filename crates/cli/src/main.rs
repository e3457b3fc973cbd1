use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde_json::json;

use facemark_core::boundary::handle_registry::{
    DetectionRecord, DetectorHandle, HandleRegistry, ImageSource,
};
use facemark_core::detection::domain::face_features::{feature_bounds, FacialFeature};
use facemark_core::detection::domain::shape::{LandmarkPoint, Shape};
use facemark_core::detection::infrastructure::annotator::write_annotated;
use facemark_core::detection::infrastructure::feature_retouch::write_retouched;
use facemark_core::detection::infrastructure::model_resolver;
use facemark_core::detection::infrastructure::model_store::FsFileAccess;
use facemark_core::pipeline::detection_session::DetectionSession;
use facemark_core::pipeline::pipeline_logger::{LogPipelineLogger, StatsPipelineLogger};
use facemark_core::shared::config::{DetectorConfig, PipelineKind};
use facemark_core::shared::constants::{
    CLASSIFIER_MODEL_NAME, IMAGE_EXTENSIONS, LANDMARK_MODEL_NAME, PEOPLE_MODEL_NAME,
};
use facemark_core::shared::rect::Rectangle;

/// Face landmark and pedestrian detection for still images.
#[derive(Parser)]
#[command(name = "facemark")]
struct Cli {
    /// Input image file.
    input: PathBuf,

    /// Face region classifier model (JSON cascade).
    #[arg(long)]
    classifier: Option<PathBuf>,

    /// Facial landmark model (JSON shape predictor).
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Detect pedestrians instead of faces.
    #[arg(long)]
    pedestrian: bool,

    /// Pedestrian HOG + SVM model (JSON).
    #[arg(long)]
    people_model: Option<PathBuf>,

    /// Directory searched for default models after the user model directory.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Detector configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report every face instead of only the largest one.
    #[arg(long)]
    all_objects: bool,

    /// Cascade pyramid scale step (> 1.0).
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Minimum raw hits a face cluster needs to be reported.
    #[arg(long)]
    min_neighbors: Option<u32>,

    /// Smallest face window side, in pixels.
    #[arg(long)]
    min_size: Option<u32>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Also report bounding boxes of facial features on 68-point shapes.
    #[arg(long)]
    features: bool,

    /// Write a copy of the input with detections drawn on it.
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Saturation change for a facial feature, as FEATURE:RATE
    /// (e.g. mouth:0.6). Repeatable; needs --retouched.
    #[arg(long, value_parser = parse_adjustment)]
    brighten: Vec<(FacialFeature, f32)>,

    /// Write a copy of the input with the --brighten changes applied.
    #[arg(long)]
    retouched: Option<PathBuf>,

    /// Log per-stage timings.
    #[arg(long)]
    timings: bool,
}

fn main() {
    let cli = Cli::parse();
    let default_level = if cli.timings { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    validate(&cli)?;
    let config = build_config(&cli)?;

    let registry = HandleRegistry::global();
    let handle = open_detector(registry, &cli, &config);

    let count = registry.detect(handle, ImageSource::Path(&cli.input));
    let records = (0..count)
        .map(|i| registry.get_result(handle, i))
        .collect::<Result<Vec<_>, _>>()?;

    let features = if cli.features {
        let (w, h) = image::image_dimensions(&cli.input)?;
        records.iter().map(|r| face_feature_boxes(r, w, h)).collect()
    } else {
        Vec::new()
    };

    if cli.json {
        print_json(&records, &features, cli.features)?;
    } else {
        print_lines(&records, &features);
    }

    if let Some(out) = &cli.annotate {
        let detections = registry.with_session(handle, |s| s.results())?;
        let extra: Vec<Rectangle> = features
            .iter()
            .flat_map(|boxes| boxes.iter().map(|(_, r)| *r))
            .collect();
        let img = image::open(&cli.input)?.to_rgb8();
        write_annotated(out, &img, &detections, &extra)?;
        log::info!("Annotated image written to {}", out.display());
    }

    if let Some(out) = &cli.retouched {
        let detections = registry.with_session(handle, |s| s.results())?;
        let img = image::open(&cli.input)?.to_rgb8();
        let changed = write_retouched(out, &img, &detections, &cli.brighten)?;
        log::info!("Retouched {changed} feature(s) into {}", out.display());
    }

    if cli.timings {
        registry.with_session(handle, |s| s.logger().summary())?;
    }
    registry.deinit(handle);
    Ok(())
}

fn open_detector(registry: &HandleRegistry, cli: &Cli, config: &DetectorConfig) -> DetectorHandle {
    let bundled = cli.models_dir.as_deref();
    let model_path = |explicit: &Option<PathBuf>, name: &str| {
        explicit
            .clone()
            .unwrap_or_else(|| model_resolver::resolve_or_empty(name, bundled))
    };

    let session = match config.pipeline {
        PipelineKind::Face => DetectionSession::open_face(
            &model_path(&cli.classifier, CLASSIFIER_MODEL_NAME),
            &model_path(&cli.landmarks, LANDMARK_MODEL_NAME),
            config,
            &FsFileAccess,
        ),
        PipelineKind::Pedestrian => DetectionSession::open_pedestrian(
            &model_path(&cli.people_model, PEOPLE_MODEL_NAME),
            config,
            &FsFileAccess,
        ),
    };
    let session = if cli.timings {
        session.with_logger(Box::new(StatsPipelineLogger::new()))
    } else {
        session.with_logger(Box::new(LogPipelineLogger))
    };
    registry.register(session)
}

fn build_config(cli: &Cli) -> Result<DetectorConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::load_or_default(),
    };
    if cli.pedestrian {
        config.pipeline = PipelineKind::Pedestrian;
    }
    if cli.all_objects {
        config.cascade.biggest_only = false;
    }
    if let Some(f) = cli.scale_factor {
        config.cascade.scale_factor = f;
    }
    if let Some(n) = cli.min_neighbors {
        config.cascade.min_neighbors = n;
    }
    if let Some(s) = cli.min_size {
        config.cascade.min_size = (s, s);
    }
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !is_image(&cli.input) {
        return Err(format!("Unsupported image type: {}", cli.input.display()).into());
    }
    if cli.pedestrian && (cli.classifier.is_some() || cli.landmarks.is_some()) {
        return Err("--classifier and --landmarks do not apply with --pedestrian".into());
    }
    if cli.people_model.is_some() && !cli.pedestrian {
        return Err("--people-model requires --pedestrian".into());
    }
    if cli.pedestrian && (!cli.brighten.is_empty() || cli.retouched.is_some()) {
        return Err("--brighten and --retouched do not apply with --pedestrian".into());
    }
    if cli.brighten.is_empty() != cli.retouched.is_none() {
        return Err("--brighten and --retouched must be given together".into());
    }
    Ok(())
}

fn parse_adjustment(arg: &str) -> Result<(FacialFeature, f32), String> {
    let (name, rate) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected FEATURE:RATE, got '{arg}'"))?;
    let feature =
        FacialFeature::from_name(name).ok_or_else(|| format!("unknown facial feature '{name}'"))?;
    let rate: f32 = rate.parse().map_err(|e| format!("invalid rate '{rate}': {e}"))?;
    if !rate.is_finite() {
        return Err(format!("invalid rate '{rate}'"));
    }
    Ok((feature, rate))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Named feature boxes for a 68-point face record; empty otherwise.
fn face_feature_boxes(record: &DetectionRecord, w: u32, h: u32) -> Vec<(&'static str, Rectangle)> {
    let shape = Shape::new(
        record
            .landmarks
            .iter()
            .map(|&(x, y)| LandmarkPoint::new(x, y))
            .collect(),
    );
    FacialFeature::ALL
        .iter()
        .filter_map(|&f| {
            let points = shape.feature_points(f)?;
            feature_bounds(points, w, h).map(|r| (f.name(), r))
        })
        .collect()
}

fn print_lines(records: &[DetectionRecord], features: &[Vec<(&'static str, Rectangle)>]) {
    if records.is_empty() {
        println!("No detections");
        return;
    }
    for (i, r) in records.iter().enumerate() {
        println!(
            "{i}: {} [{}, {}, {}, {}] landmarks={}",
            r.label,
            r.left,
            r.top,
            r.right,
            r.bottom,
            r.landmarks.len()
        );
        for (name, b) in features.get(i).into_iter().flatten() {
            let (l, t, rt, bt) = b.edges();
            println!("    {name}: [{l}, {t}, {rt}, {bt}]");
        }
    }
}

fn print_json(
    records: &[DetectionRecord],
    features: &[Vec<(&'static str, Rectangle)>],
    with_features: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = if with_features {
        let items: Vec<_> = records
            .iter()
            .zip(features)
            .map(|(r, boxes)| {
                let feature_map: serde_json::Map<String, serde_json::Value> = boxes
                    .iter()
                    .map(|(name, b)| ((*name).to_string(), json!(b)))
                    .collect();
                json!({ "detection": r, "features": feature_map })
            })
            .collect();
        json!(items)
    } else {
        json!(records)
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
