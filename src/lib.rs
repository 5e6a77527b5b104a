pub mod camera;
pub mod diagnostics;
pub mod logging;
pub mod preview;
pub mod roi;
pub mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use camera::backend::UnavailableBackend;
use camera::chain::FallbackChain;
use camera::error::CameraError;
use camera::gst::GstLaunchBackend;
use camera::synthetic::SyntheticSource;
use camera::types::{Size, SourceKind};
use diagnostics::stats::DiagnosticSnapshot;
use preview::capture::CaptureSession;
use roi::crop::CropRect;
use roi::error::RoiError;
use roi::selection::{RoiEngine, FREE_SELECT};
use settings::controls::ControlInputs;
use settings::error::ConfigError;
use settings::types::AppConfig;

/// Top-level error for the headless runner.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Roi(#[from] RoiError),

    #[error("failed to initialise logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("usage: roicam [config.json] [ROI size token] [seconds] ({0})")]
    Usage(String),
}

/// Create the capture chain for this process.
///
/// When `ROICAM_SYNTHETIC=1` is set, both device backends are replaced so
/// the session runs on synthetic frames.
pub fn create_capture_chain(config: &AppConfig) -> FallbackChain {
    if SyntheticSource::is_forced() {
        tracing::info!("ROICAM_SYNTHETIC set, camera backends disabled");
        return FallbackChain::new(
            Box::new(UnavailableBackend),
            Box::new(UnavailableBackend),
            config,
        );
    }
    let session = &config.session;
    let backend = |name: &str| {
        GstLaunchBackend::new(name, &session.launcher)
            .with_timeouts(session.open_timeout(), session.read_timeout())
    };
    FallbackChain::new(
        Box::new(backend("primary")),
        Box::new(backend("secondary")),
        config,
    )
}

/// Command-line arguments of the headless runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub config_path: PathBuf,
    pub roi_token: String,
    pub duration: Duration,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            roi_token: FREE_SELECT.to_string(),
            duration: Duration::from_secs(5),
        }
    }
}

impl RunArgs {
    /// Parse positional arguments (program name already stripped).
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, AppError> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        if let Some(path) = args.next() {
            parsed.config_path = PathBuf::from(path);
        }
        if let Some(token) = args.next() {
            parsed.roi_token = token;
        }
        if let Some(seconds) = args.next() {
            let seconds: f64 = seconds
                .parse()
                .map_err(|_| AppError::Usage(format!("invalid duration {seconds:?}")))?;
            parsed.duration = Duration::try_from_secs_f64(seconds)
                .map_err(|_| AppError::Usage(format!("invalid duration {seconds}")))?;
        }
        if let Some(extra) = args.next() {
            return Err(AppError::Usage(format!("unexpected argument {extra:?}")));
        }
        Ok(parsed)
    }
}

/// What a headless run observed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub source: SourceKind,
    pub diagnostics: DiagnosticSnapshot,
    pub selection_label: Option<String>,
    pub crop: Option<CropRect>,
    /// Dimensions of the buffer handed to persistence.
    pub captured: Option<Size>,
    pub captured_bytes: usize,
}

/// Load config, stream for the requested time, and crop the latest frame.
pub fn run(args: &RunArgs) -> Result<RunReport, AppError> {
    let config = settings::store::load(&args.config_path)?;
    let chain = create_capture_chain(&config);
    run_with_chain(Arc::new(config), chain, &args.roi_token, args.duration)
}

/// `run` with an explicit capture chain.
pub fn run_with_chain(
    config: Arc<AppConfig>,
    chain: FallbackChain,
    roi_token: &str,
    duration: Duration,
) -> Result<RunReport, AppError> {
    let settings = ControlInputs::initial(&config.camera).to_settings(&config.camera);
    let mut roi = RoiEngine::new(config.camera.resolution());
    if let Err(e) = roi.apply_size_token(roi_token) {
        tracing::warn!("ignoring ROI request: {e}");
    }

    let mut session = CaptureSession::new(Arc::clone(&config), chain);
    let source = session.start(settings)?;
    std::thread::sleep(duration);

    let diagnostics = session.diagnostics();
    tracing::info!(
        fps = diagnostics.fps,
        frames = diagnostics.frame_count,
        read_failures = diagnostics.read_failures,
        "capture diagnostics"
    );

    let selection = roi.current_selection();
    let image = session.crop_latest(selection.as_ref(), None);
    session.stop()?;

    let report = RunReport {
        source,
        diagnostics,
        selection_label: roi.label(),
        crop: image.as_ref().and_then(|image| image.crop),
        captured: image.as_ref().map(|image| Size::new(image.width, image.height)),
        captured_bytes: image.as_ref().map_or(0, |image| image.data.len()),
    };
    match (&report.crop, &report.captured) {
        (Some(crop), _) => tracing::info!(?crop, "cropped latest frame"),
        (None, Some(size)) => tracing::info!(%size, "captured full frame"),
        (None, None) => tracing::warn!("no frame was produced"),
    }
    Ok(report)
}
