//! Blocking client for the Vision AD inference service.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response, multipart};
use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vision_core::{EvaluationError, EvaluationResult, evaluate, extract_scores};

const SINGLE_ENDPOINT: &str = "/InferenceVisionAD_Single";
const BATCH_ENDPOINT: &str = "/InferenceVisionAD_Batch";
const SCORE_HEADER: &str = "X-Anomaly-Score";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to {0}; is the server running?")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error: {0}")]
    Status(StatusCode),

    #[error("invalid X-Anomaly-Score header: {0}")]
    InvalidScoreHeader(String),

    #[error("no images selected")]
    NoImages,

    #[error("cannot read result image: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result of a single-image inference.
pub struct SingleInference {
    pub score: f64,
    /// Overlay rendered by the service.
    pub overlay: image::DynamicImage,
}

/// Request timeouts per endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub single: Duration,
    pub batch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            single: Duration::from_secs(60),
            batch: Duration::from_secs(300),
        }
    }
}

pub struct VisionAdClient {
    base_url: String,
    http: Client,
    timeouts: Timeouts,
    scratch_dir: Option<PathBuf>,
}

impl VisionAdClient {
    pub fn new(base_url: &str, timeouts: Timeouts) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!("vision-ad/", env!("VISION_AD_VERSION")))
            .build()
            .map_err(ClientError::Http)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            timeouts,
            scratch_dir: None,
        })
    }

    /// Keep temporary batch archives in `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Score one image and fetch its overlay.
    pub fn inference_single(&self, image_path: &Path) -> Result<SingleInference, ClientError> {
        let form = multipart::Form::new().part("file", image_part(image_path)?);
        let response = self
            .http
            .post(self.endpoint(SINGLE_ENDPOINT))
            .multipart(form)
            .timeout(self.timeouts.single)
            .send()
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response)?;

        let score = match response.headers().get(SCORE_HEADER) {
            Some(value) => {
                let text = value
                    .to_str()
                    .map_err(|e| ClientError::InvalidScoreHeader(e.to_string()))?;
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| ClientError::InvalidScoreHeader(text.to_string()))?
            }
            None => {
                tracing::warn!("response has no {} header, using 0.0", SCORE_HEADER);
                0.0
            }
        };
        let body = response.bytes().map_err(|e| self.transport_error(e))?;
        let overlay = image::load_from_memory(&body)?;
        tracing::info!("{}: anomaly score {:.6}", image_path.display(), score);
        Ok(SingleInference { score, overlay })
    }

    /// Run a batch inference and save the returned archive at `output`.
    ///
    /// The archive is streamed into a temporary file next to `output` and
    /// only moved into place once the whole response has been received, so
    /// a failed call leaves any existing file at `output` untouched.
    pub fn inference_batch<P: AsRef<Path>>(
        &self,
        image_paths: &[P],
        output: &Path,
    ) -> Result<(), ClientError> {
        if image_paths.is_empty() {
            return Err(ClientError::NoImages);
        }
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut partial = tempfile::Builder::new()
            .prefix(".vision_ad_")
            .suffix(".zip.part")
            .tempfile_in(dir)?;
        self.inference_batch_to(image_paths, partial.as_file_mut())?;
        partial.as_file_mut().flush()?;
        partial.persist(output).map_err(|e| ClientError::Io(e.error))?;
        tracing::info!("batch result saved to {}", output.display());
        Ok(())
    }

    /// Run a batch inference and stream the returned archive into `out`.
    pub fn inference_batch_to<P, W>(&self, image_paths: &[P], out: &mut W) -> Result<u64, ClientError>
    where
        P: AsRef<Path>,
        W: Write + ?Sized,
    {
        if image_paths.is_empty() {
            return Err(ClientError::NoImages);
        }
        let mut form = multipart::Form::new();
        for path in image_paths {
            form = form.part("files", image_part(path.as_ref())?);
        }
        tracing::info!("sending {} images for batch inference", image_paths.len());
        let mut response = self
            .http
            .post(self.endpoint(BATCH_ENDPOINT))
            .multipart(form)
            .timeout(self.timeouts.batch)
            .send()
            .map_err(|e| self.transport_error(e))?;
        response = check_status(response)?;
        response.copy_to(out).map_err(|e| self.transport_error(e))
    }

    /// Run both label sets through one batch inference and evaluate the
    /// returned scores at `threshold`.
    ///
    /// The archive is held in a temporary file that is removed when this
    /// call returns, whether it succeeds or not.
    pub fn calculate_f1_score(
        &self,
        normal: &[PathBuf],
        abnormal: &[PathBuf],
        threshold: f64,
    ) -> Result<EvaluationResult, ClientError> {
        let all: Vec<&Path> = normal
            .iter()
            .chain(abnormal.iter())
            .map(PathBuf::as_path)
            .collect();
        if all.is_empty() {
            return Err(ClientError::NoImages);
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("vision_ad_").suffix(".zip");
        let mut scratch = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let written = self.inference_batch_to(&all, scratch.as_file_mut())?;
        tracing::debug!("batch archive {} ({} bytes)", scratch.path().display(), written);

        let file = scratch.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        let scores = extract_scores(&*file)?;
        Ok(evaluate(&scores, normal, abnormal, threshold)?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connect(self.base_url.clone())
        } else {
            ClientError::Http(err)
        }
    }
}

fn check_status(response: Response) -> Result<Response, ClientError> {
    match response.status() {
        StatusCode::OK => Ok(response),
        status => Err(ClientError::Status(status)),
    }
}

fn image_part(path: &Path) -> Result<multipart::Part, ClientError> {
    let data = fs::read(path)?;
    let name = vision_core::base_name(&path.to_string_lossy()).to_string();
    multipart::Part::bytes(data)
        .file_name(name)
        .mime_str("image/jpeg")
        .map_err(ClientError::Http)
}
