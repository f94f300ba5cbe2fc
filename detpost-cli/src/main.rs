use clap::Parser;
use detpost::{
    non_max_suppression, Annotation, ApReport, Backend, Evaluator, MatchConfig, NmsConfig,
    PredictionView, Xyxy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Detection post-processing and evaluation (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

fn backend(parallel: bool) -> Backend {
    if parallel {
        Backend::Parallel
    } else {
        Backend::Sequential
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NmsConfigJson {
    conf_thres: f32,
    nms_thres: f32,
    parallel: bool,
}

impl Default for NmsConfigJson {
    fn default() -> Self {
        let cfg = NmsConfig::default();
        Self {
            conf_thres: cfg.conf_thres,
            nms_thres: cfg.nms_thres,
            parallel: false,
        }
    }
}

impl From<&NmsConfigJson> for NmsConfig {
    fn from(value: &NmsConfigJson) -> Self {
        Self {
            conf_thres: value.conf_thres,
            nms_thres: value.nms_thres,
            backend: backend(value.parallel),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EvalConfigJson {
    iou_threshold: f32,
    class_aware: bool,
    parallel: bool,
}

impl Default for EvalConfigJson {
    fn default() -> Self {
        let cfg = MatchConfig::default();
        Self {
            iou_threshold: cfg.iou_threshold,
            class_aware: cfg.class_aware,
            parallel: false,
        }
    }
}

impl From<&EvalConfigJson> for MatchConfig {
    fn from(value: &EvalConfigJson) -> Self {
        Self {
            iou_threshold: value.iou_threshold,
            class_aware: value.class_aware,
            backend: backend(value.parallel),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    predictions_path: String,
    annotations_path: String,
    names_path: Option<String>,
    output_path: Option<String>,
    nms: NmsConfigJson,
    eval: EvalConfigJson,
}

/// Raw network output: `images × candidates × attrs`, flattened row-major.
#[derive(Debug, Deserialize)]
struct PredictionsFile {
    images: usize,
    candidates: usize,
    attrs: usize,
    data: Vec<f32>,
}

/// Corner-form ground truth in the same pixel frame as the predictions.
#[derive(Debug, Deserialize)]
struct AnnotationRecord {
    image_id: usize,
    class_id: usize,
    bbox: [f32; 4],
}

#[derive(Debug, Serialize)]
struct ClassRecord {
    class_id: usize,
    name: Option<String>,
    precision: f32,
    recall: f32,
    ap: f32,
    f1: f32,
    ground_truth: usize,
    predictions: usize,
}

#[derive(Debug, Serialize)]
struct Output {
    images: usize,
    detections: usize,
    map: f32,
    classes: Vec<ClassRecord>,
}

impl Output {
    fn new(report: &ApReport, names: &[String], images: usize, detections: usize) -> Self {
        let classes = report
            .classes()
            .iter()
            .map(|m| ClassRecord {
                class_id: m.class_id,
                name: names.get(m.class_id).cloned(),
                precision: m.precision,
                recall: m.recall,
                ap: m.ap,
                f1: m.f1,
                ground_truth: m.num_ground_truth,
                predictions: m.num_predictions,
            })
            .collect();
        Self {
            images,
            detections,
            map: report.mean_ap(),
            classes,
        }
    }
}

fn load_names(path: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("detpost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.predictions_path.is_empty() || config.annotations_path.is_empty() {
        return Err("predictions_path and annotations_path must be set in the config".into());
    }

    let predictions: PredictionsFile =
        serde_json::from_str(&fs::read_to_string(&config.predictions_path)?)?;
    let records: Vec<AnnotationRecord> =
        serde_json::from_str(&fs::read_to_string(&config.annotations_path)?)?;
    let annotations: Vec<Annotation> = records
        .iter()
        .map(|r| Annotation {
            image_id: r.image_id,
            class_id: r.class_id,
            bbox: Xyxy::from_array(r.bbox),
        })
        .collect();
    let names = match &config.names_path {
        Some(path) => load_names(path)?,
        None => Vec::new(),
    };

    let view = PredictionView::new(
        &predictions.data,
        predictions.images,
        predictions.candidates,
        predictions.attrs,
    )?;
    let outputs = non_max_suppression(view, &NmsConfig::from(&config.nms))?;

    let mut evaluator = Evaluator::new(MatchConfig::from(&config.eval))?;
    evaluator.add_batch(&outputs, &annotations)?;
    let report = evaluator.report()?;

    let output = Output::new(&report, &names, evaluator.images(), evaluator.detections());
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
