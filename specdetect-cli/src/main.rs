use clap::Parser;
use serde::{Deserialize, Serialize};
use specdetect::{
    Algorithm, BandGrid, Cube, DetectConfig, DetectionResults, Detector, InterpolatingResampler,
    OutputMode, ProgressSink, ResampleMethod, ResamplerOptions, Roi, RunOutcome, Severity,
    TargetSignature, UnitKind, Units, WavelengthUnit,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "specdetect CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for progress and profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AlgorithmConfig {
    Ace,
    Cem,
    Sam,
}

impl From<AlgorithmConfig> for Algorithm {
    fn from(value: AlgorithmConfig) -> Self {
        match value {
            AlgorithmConfig::Ace => Algorithm::Ace,
            AlgorithmConfig::Cem => Algorithm::Cem,
            AlgorithmConfig::Sam => Algorithm::Sam,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ModeConfig {
    Independent,
    WinnerTakeAll,
}

impl From<ModeConfig> for OutputMode {
    fn from(value: ModeConfig) -> Self {
        match value {
            ModeConfig::Independent => OutputMode::Independent,
            ModeConfig::WinnerTakeAll => OutputMode::WinnerTakeAll,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MethodConfig {
    Linear,
    Spline,
    Gaussian,
}

impl From<MethodConfig> for ResampleMethod {
    fn from(value: MethodConfig) -> Self {
        match value {
            MethodConfig::Linear => ResampleMethod::Linear,
            MethodConfig::Spline => ResampleMethod::Spline,
            MethodConfig::Gaussian => ResampleMethod::Gaussian,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WavelengthUnitConfig {
    #[default]
    Microns,
    Nanometers,
    InverseCentimeters,
}

impl From<WavelengthUnitConfig> for WavelengthUnit {
    fn from(value: WavelengthUnitConfig) -> Self {
        match value {
            WavelengthUnitConfig::Microns => WavelengthUnit::Microns,
            WavelengthUnitConfig::Nanometers => WavelengthUnit::Nanometers,
            WavelengthUnitConfig::InverseCentimeters => WavelengthUnit::InverseCentimeters,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum UnitKindConfig {
    Reflectance,
    Radiance,
    Emissivity,
    Transmittance,
    Custom,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct UnitsConfig {
    kind: UnitKindConfig,
    #[serde(default = "default_scale")]
    scale_from_standard: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl From<UnitsConfig> for Units {
    fn from(value: UnitsConfig) -> Self {
        let kind = match value.kind {
            UnitKindConfig::Reflectance => UnitKind::Reflectance,
            UnitKindConfig::Radiance => UnitKind::Radiance,
            UnitKindConfig::Emissivity => UnitKind::Emissivity,
            UnitKindConfig::Transmittance => UnitKind::Transmittance,
            UnitKindConfig::Custom => UnitKind::Custom,
        };
        Units::new(kind, value.scale_from_standard)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ResamplerConfigJson {
    method: MethodConfig,
    drop_out_window: f64,
    default_fwhm: f64,
}

impl Default for ResamplerConfigJson {
    fn default() -> Self {
        let opts = ResamplerOptions::default();
        Self {
            method: MethodConfig::Linear,
            drop_out_window: opts.drop_out_window,
            default_fwhm: opts.default_fwhm,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    scene_path: String,
    output_path: Option<String>,
    algorithm: AlgorithmConfig,
    threshold: Option<f64>,
    mode: ModeConfig,
    threads: usize,
    results_name: Option<String>,
    roi_statistics: bool,
    resampler: ResamplerConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        let cfg = DetectConfig::default();
        Self {
            scene_path: String::new(),
            output_path: None,
            algorithm: AlgorithmConfig::Ace,
            threshold: cfg.threshold,
            mode: ModeConfig::Independent,
            threads: cfg.threads,
            results_name: cfg.results_name,
            roi_statistics: cfg.roi_statistics,
            resampler: ResamplerConfigJson::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignatureJson {
    name: String,
    #[serde(default)]
    wavelengths: Vec<f64>,
    #[serde(default)]
    wavelength_unit: WavelengthUnitConfig,
    amplitudes: Vec<f64>,
    #[serde(default)]
    in_scene: bool,
    #[serde(default)]
    units: Option<UnitsConfig>,
}

impl From<SignatureJson> for TargetSignature {
    fn from(value: SignatureJson) -> Self {
        let mut sig = if value.in_scene && value.wavelengths.is_empty() {
            TargetSignature::in_scene(value.name, value.amplitudes)
        } else {
            TargetSignature::new(value.name, value.wavelengths, value.amplitudes)
                .with_wavelength_unit(value.wavelength_unit.into())
        };
        if let Some(units) = value.units {
            sig = sig.with_units(units.into());
        }
        sig
    }
}

/// A cube stored inline as band-interleaved-by-pixel samples.
#[derive(Debug, Deserialize)]
struct SceneJson {
    rows: usize,
    columns: usize,
    bands: usize,
    data: Vec<f32>,
    #[serde(default)]
    wavelengths: Vec<f64>,
    #[serde(default)]
    fwhm: Vec<f64>,
    #[serde(default)]
    wavelength_unit: WavelengthUnitConfig,
    #[serde(default)]
    units: Option<UnitsConfig>,
    /// Row-major pixel selection over the whole cube.
    #[serde(default)]
    roi_mask: Option<Vec<bool>>,
    signatures: Vec<SignatureJson>,
}

#[derive(Debug, Serialize)]
struct TargetRecord {
    name: String,
    matches: usize,
    valid_max: Option<f32>,
    rows: usize,
    columns: usize,
    row_offset: usize,
    column_offset: usize,
}

#[derive(Debug, Serialize)]
struct FailureRecord {
    index: usize,
    name: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct LabelRecord {
    label: u32,
    name: Option<String>,
    pixels: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Output {
    Independent {
        threshold: f64,
        targets: Vec<TargetRecord>,
        failures: Vec<FailureRecord>,
    },
    WinnerTakeAll {
        name: String,
        threshold: f64,
        labels: Vec<LabelRecord>,
    },
    Aborted,
}

/// Routes progress messages into tracing events.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, message: &str, percent: u8, severity: Severity) {
        match severity {
            Severity::Normal => tracing::debug!(percent, "{message}"),
            Severity::Warning => tracing::warn!(percent, "{message}"),
            Severity::Error => tracing::error!(percent, "{message}"),
            Severity::Abort => tracing::warn!(percent, aborted = true, "{message}"),
        }
    }
}

fn summarize(outcome: RunOutcome, threshold: f64) -> Output {
    let results = match outcome {
        RunOutcome::Completed(results) => results,
        RunOutcome::Aborted => return Output::Aborted,
    };
    match results {
        DetectionResults::Independent { targets, failures } => Output::Independent {
            threshold,
            targets: targets
                .iter()
                .map(|t| {
                    let (row_offset, column_offset) = t.raster.offset();
                    TargetRecord {
                        name: t.name.clone(),
                        matches: t.match_count(),
                        valid_max: t.raster.valid_max(),
                        rows: t.raster.rows(),
                        columns: t.raster.columns(),
                        row_offset,
                        column_offset,
                    }
                })
                .collect(),
            failures: failures
                .into_iter()
                .map(|f| FailureRecord {
                    index: f.index,
                    name: f.name,
                    error: f.error.to_string(),
                })
                .collect(),
        },
        DetectionResults::WinnerTakeAll {
            name,
            merged,
            threshold,
        } => Output::WinnerTakeAll {
            name,
            threshold,
            labels: merged
                .histogram()
                .into_iter()
                .enumerate()
                .map(|(label, pixels)| {
                    let label = label as u32;
                    LabelRecord {
                        label,
                        name: merged.label_name(label).map(str::to_owned),
                        pixels,
                    }
                })
                .collect(),
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("specdetect=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.scene_path.is_empty() {
        return Err("scene_path must be set in the config".into());
    }

    let scene_text = fs::read_to_string(&config.scene_path)?;
    let scene: SceneJson = serde_json::from_str(&scene_text)?;

    let mut cube = Cube::new(scene.data, scene.rows, scene.columns, scene.bands)?;
    if !scene.wavelengths.is_empty() {
        let grid =
            BandGrid::with_unit(&scene.wavelengths, &scene.fwhm, scene.wavelength_unit.into())?;
        cube = cube.with_band_grid(grid)?;
    }
    if let Some(units) = scene.units {
        cube = cube.with_units(units.into());
    }
    let signatures: Vec<TargetSignature> =
        scene.signatures.into_iter().map(TargetSignature::from).collect();

    let algorithm: Algorithm = config.algorithm.into();
    let detect_config = DetectConfig {
        algorithm,
        threshold: config.threshold,
        mode: config.mode.into(),
        threads: config.threads,
        results_name: config.results_name,
        roi_statistics: config.roi_statistics,
    };
    let threshold = detect_config.effective_threshold();
    let resampler = InterpolatingResampler::new(ResamplerOptions {
        method: config.resampler.method.into(),
        drop_out_window: config.resampler.drop_out_window,
        default_fwhm: config.resampler.default_fwhm,
    });

    let progress = LogProgress;
    let mut detector = Detector::new(&cube)
        .with_config(detect_config)
        .with_resampler(resampler)
        .with_progress(&progress);
    if let Some(mask) = &scene.roi_mask {
        detector = detector.with_roi(Roi::from_mask(scene.rows, scene.columns, mask)?);
    }

    let outcome = detector.run(&signatures)?;
    let output = summarize(outcome, threshold);
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
