// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ocrs recognition backend (feature `ocr`).
//
// ocrs runs two rten models: one finds word boxes, the other reads the text
// lines built from them. Both files must already be on disk; `ocrs-cli`
// downloads them into its cache (`$XDG_CACHE_HOME/ocrs` or `~/.cache/ocrs`) on
// first run, and `EngineOptions::model_dir` can point elsewhere.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lesewerk_core::config::EngineOptions;
use lesewerk_core::error::{LesewerkError, Result};
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument, warn};

use crate::engine::RecognitionBackend;
use crate::image::{ChannelOrder, NormalizedImage};

/// Languages the bundled Latin-alphabet models can read.
const SUPPORTED_LANGUAGES: &[&str] = &["en", "latin"];

const DETECTION_MODEL: &str = "text-detection.rten";
const RECOGNITION_MODEL: &str = "text-recognition.rten";

/// The ocrs-cli model cache.
fn cache_dir() -> PathBuf {
    let cache_home = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")));
    match cache_home {
        Some(base) => base.join("ocrs"),
        None => PathBuf::from("ocrs-models"),
    }
}

/// Locations of the two model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::from_dir(cache_dir())
    }
}

impl ModelPaths {
    /// Both models under `dir`, with their standard file names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            detection: dir.as_ref().join(DETECTION_MODEL),
            recognition: dir.as_ref().join(RECOGNITION_MODEL),
        }
    }

    /// Model directory from the engine options, or the default cache.
    pub fn for_options(options: &EngineOptions) -> Self {
        match &options.model_dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::default(),
        }
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [("detection", &self.detection), ("recognition", &self.recognition)] {
            if !path.exists() {
                return Err(LesewerkError::EngineNotReady(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// `ocrs`-based recognition backend. CPU only.
pub struct OcrsBackend {
    engine: OcrsEngine,
}

impl OcrsBackend {
    /// Load both models and build the engine. Meant to run once per process
    /// behind an `EngineHandle`.
    ///
    /// # Errors
    ///
    /// Returns [`LesewerkError::EngineNotReady`] if either model file is
    /// missing or cannot be parsed, or the engine rejects the models.
    ///
    /// # Performance
    ///
    /// Model loading takes seconds. Inference in an unoptimised build is
    /// orders of magnitude slower, so the workspace builds `ocrs` and `rten`
    /// at `opt-level = 3` even for dev profiles.
    #[instrument(skip_all, fields(
        detection = %paths.detection.display(),
        recognition = %paths.recognition.display(),
    ))]
    pub fn load(paths: &ModelPaths, options: &EngineOptions) -> Result<Self> {
        paths.validate()?;
        report_unsupported_options(options);

        let detection_model = load_model("detection", &paths.detection)?;
        let recognition_model = load_model("recognition", &paths.recognition)?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            LesewerkError::EngineNotReady(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("ocrs engine loaded");
        Ok(Self { engine })
    }

    /// Factory for an `EngineHandle`: loads the backend from `options` when
    /// first needed.
    pub fn factory(
        options: EngineOptions,
    ) -> impl Fn() -> Result<Arc<dyn RecognitionBackend>> + Send + Sync + 'static {
        move || {
            let paths = ModelPaths::for_options(&options);
            let backend: Arc<dyn RecognitionBackend> = Arc::new(Self::load(&paths, &options)?);
            Ok(backend)
        }
    }
}

impl RecognitionBackend for OcrsBackend {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &NormalizedImage) -> Result<Vec<String>> {
        let (width, height) = (image.width(), image.height());

        let source = ImageSource::from_bytes(image.as_bytes(), (width, height)).map_err(|err| {
            LesewerkError::Recognition(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self.engine.prepare_input(source).map_err(|err| {
            LesewerkError::Recognition(format!("OCR preprocessing failed: {}", err))
        })?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| LesewerkError::Recognition(format!("word detection failed: {}", err)))?;
        debug!(word_count = word_rects.len(), "Words detected");

        let line_rects = self.engine.find_text_lines(&input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| {
                LesewerkError::Recognition(format!("line recognition failed: {}", err))
            })?;

        // Lines the model could not decode come back as `None` and are skipped.
        let lines: Vec<String> = line_texts
            .iter()
            .flatten()
            .map(|line| line.to_string())
            .collect();

        debug!(line_count = lines.len(), "OCR recognition complete");
        Ok(lines)
    }
}

fn load_model(kind: &str, path: &Path) -> Result<Model> {
    debug!(kind, path = %path.display(), "Loading model");
    Model::load_file(path).map_err(|err| {
        LesewerkError::EngineNotReady(format!(
            "cannot load {kind} model {}: {err}",
            path.display()
        ))
    })
}

/// Log options the ocrs models cannot act on.
fn report_unsupported_options(options: &EngineOptions) {
    let language = options.language.to_ascii_lowercase();
    if !SUPPORTED_LANGUAGES.contains(&language.as_str()) {
        warn!(
            language = %options.language,
            "Recognition models only cover the Latin alphabet"
        );
    }
    if options.orientation_classification {
        warn!("Orientation classification is not available; rotated lines are read as-is");
    }
    if options.accelerator_enabled {
        info!("No accelerator backend available; running on CPU");
    }
    let defaults = EngineOptions::default();
    if options.detection_threshold != defaults.detection_threshold
        || options.box_threshold != defaults.box_threshold
    {
        warn!(
            detection_threshold = options.detection_threshold,
            box_threshold = options.box_threshold,
            "Detection thresholds are fixed by the model; configured values ignored"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_share_the_cache_dir() {
        let paths = ModelPaths::default();
        assert_eq!(paths, ModelPaths::from_dir(cache_dir()));
        assert_eq!(paths.detection.parent(), paths.recognition.parent());
        assert!(paths.detection.ends_with(DETECTION_MODEL));
    }

    #[test]
    fn options_model_dir_wins() {
        let options = EngineOptions {
            model_dir: Some(PathBuf::from("/tmp/my-models")),
            ..Default::default()
        };
        let paths = ModelPaths::for_options(&options);
        assert_eq!(paths.detection, Path::new("/tmp/my-models/text-detection.rten"));
        assert_eq!(paths.recognition, Path::new("/tmp/my-models/text-recognition.rten"));
    }

    #[test]
    fn missing_models_are_engine_not_ready() {
        let paths = ModelPaths::from_dir("/nonexistent/path/ocr-models");
        let err = paths.validate().unwrap_err();
        assert!(err.is_process_fatal());
    }

    #[test]
    fn factory_failure_is_cached_by_handle() {
        let options = EngineOptions {
            model_dir: Some(PathBuf::from("/nonexistent/path/ocr-models")),
            ..Default::default()
        };
        let handle = crate::engine::EngineHandle::new(OcrsBackend::factory(options), false);
        assert!(handle.ensure_ready().is_err());
        assert!(matches!(
            handle.status(),
            lesewerk_core::types::EngineStatus::Failed(_)
        ));
    }
}
