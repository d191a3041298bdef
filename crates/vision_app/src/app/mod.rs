//! Command handlers behind the `vision-ad` binary.

mod settings;
mod summary;

pub use settings::Settings;

use crate::client::VisionAdClient;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use vision_core::{
    BatchArchive, EvaluationResult, LabelClass, LabeledImageSet, ScanOptions, evaluate,
    expand_inputs, export_csv, export_json, scored_images,
};

/// What to evaluate and where to write it.
pub struct EvaluateRequest {
    pub normal: Vec<PathBuf>,
    pub abnormal: Vec<PathBuf>,
    pub threshold: Option<f64>,
    /// Evaluate this saved batch archive instead of running a new batch.
    pub archive: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub artifacts: Option<PathBuf>,
}

pub struct CliApp {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl CliApp {
    pub fn new(settings: Settings, settings_path: Option<PathBuf>) -> Self {
        Self {
            settings,
            settings_path,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.settings.recursive,
        }
    }

    fn client(&self) -> Result<VisionAdClient> {
        let client = VisionAdClient::new(&self.settings.base_url, self.settings.timeouts())
            .context("cannot create HTTP client")?;
        Ok(match &self.settings.scratch_dir {
            Some(dir) => client.with_scratch_dir(dir),
            None => client,
        })
    }

    pub fn run_single(&self, image: &Path, save: Option<&Path>) -> Result<()> {
        let client = self.client()?;
        let inference = client
            .inference_single(image)
            .with_context(|| format!("inference failed for {}", image.display()))?;
        println!("Anomaly Score: {:.6}", inference.score);
        println!(
            "Overlay: {}x{}",
            inference.overlay.width(),
            inference.overlay.height()
        );
        if let Some(path) = save {
            inference
                .overlay
                .save(path)
                .with_context(|| format!("cannot save overlay to {}", path.display()))?;
            println!("Overlay saved: {}", path.display());
        }
        Ok(())
    }

    pub fn run_batch(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let images = expand_inputs(inputs, self.scan_options())?;
        if images.is_empty() {
            anyhow::bail!("no images found in the given inputs");
        }
        println!("Running batch inference on {} images...", images.len());
        self.client()?
            .inference_batch(&images, output)
            .context("batch inference failed")?;
        println!("Batch result saved: {}", output.display());
        Ok(())
    }

    pub fn run_evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationResult> {
        let opts = self.scan_options();
        let normal = LabeledImageSet::new(
            LabelClass::Normal,
            expand_inputs(&request.normal, opts).context("cannot collect normal images")?,
        );
        let abnormal = LabeledImageSet::new(
            LabelClass::Abnormal,
            expand_inputs(&request.abnormal, opts).context("cannot collect abnormal images")?,
        );
        for set in [&normal, &abnormal] {
            if set.is_empty() {
                anyhow::bail!("select at least one {} image", set.class);
            }
        }
        let threshold = request.threshold.unwrap_or(self.settings.threshold);
        tracing::info!(
            "evaluating {} normal and {} abnormal images at threshold {}",
            normal.len(),
            abnormal.len(),
            threshold
        );

        let result = match &request.archive {
            Some(path) => {
                let mut archive = BatchArchive::open(path)
                    .with_context(|| format!("cannot open batch archive {}", path.display()))?;
                let scores = archive.scores()?;
                if let Some(dest) = &request.artifacts {
                    let written = archive.extract_artifacts(dest)?;
                    println!("Extracted {} overlays to {}", written.len(), dest.display());
                }
                evaluate(&scores, &normal.paths, &abnormal.paths, threshold)?
            }
            None => self
                .client()?
                .calculate_f1_score(&normal.paths, &abnormal.paths, threshold)
                .context("F1 score calculation failed")?,
        };

        print!("{}", summary::render(&result));

        if let Some(path) = &request.csv {
            export_csv(&scored_images(&result, &normal.paths, &abnormal.paths), path)?;
            println!("Per-image results written: {}", path.display());
        }
        if let Some(path) = &request.json {
            export_json(&result, path)?;
            println!("Result written: {}", path.display());
        }
        Ok(result)
    }

    pub fn run_config(&self, save: bool) -> Result<()> {
        match &self.settings_path {
            Some(path) => println!("# {}", path.display()),
            None => println!("# no configuration directory available"),
        }
        print!(
            "{}",
            toml::to_string_pretty(&self.settings).context("cannot serialize settings")?
        );
        if save {
            let path = self
                .settings_path
                .as_deref()
                .context("no settings path to save to")?;
            self.settings.save(path)?;
        }
        Ok(())
    }
}
