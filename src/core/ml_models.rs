// Pose model cache
// Resolves a model location (file or URL) to a cached local file

use crate::models::pose::{PoseError, PoseResult};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Model source configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Local file path
    LocalFile(PathBuf),
    /// Direct URL
    Url(String),
}

impl ModelSource {
    /// Stable text form, recorded next to cached models
    pub fn describe(&self) -> String {
        match self {
            ModelSource::LocalFile(path) => format!("file:{}", path.display()),
            ModelSource::Url(url) => url.clone(),
        }
    }
}

/// ML model metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub source: ModelSource,
}

impl ModelInfo {
    /// Interpret a command-line model argument: http(s) URLs are downloaded,
    /// anything else is a local path. The cache name is the last path segment.
    pub fn from_location(location: &str) -> Self {
        let is_url = location.starts_with("http://") || location.starts_with("https://");
        let name = location
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("pose-model.onnx")
            .to_string();

        let source = if is_url {
            ModelSource::Url(location.to_string())
        } else {
            ModelSource::LocalFile(PathBuf::from(location))
        };

        Self { name, source }
    }
}

/// Model manager for caching and loading pose models
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager with cache directory
    pub fn new(cache_dir: PathBuf) -> PoseResult<Self> {
        fs::create_dir_all(&cache_dir).map_err(|e| {
            let message = format!("Cannot create cache {}: {}", cache_dir.display(), e);
            PoseError::ModelLoadFailed(message)
        })?;
        Ok(Self { cache_dir })
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Check if a model is cached from the same source
    pub fn is_cached(&self, model: &ModelInfo) -> bool {
        let recorded = fs::read_to_string(self.source_record_path(&model.name));
        self.get_model_path(&model.name).exists()
            && recorded.map_or(false, |source| source == model.source.describe())
    }

    /// Get the local path for a model
    pub fn get_model_path(&self, model_name: &str) -> PathBuf {
        self.cache_dir.join(model_name)
    }

    // Sidecar naming the source a cached model came from
    fn source_record_path(&self, model_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.source", model_name))
    }

    /// Copy or download a model into the cache unless it is already there.
    ///
    /// The file is written under a `.part` name and renamed when complete, so an
    /// interrupted fetch never looks cached.
    pub async fn ensure_model(&self, model: &ModelInfo) -> PoseResult<PathBuf> {
        let model_path = self.get_model_path(&model.name);

        if self.is_cached(model) {
            info!("Model {} already cached at {:?}", model.name, model_path);
            return Ok(model_path);
        }

        info!("Fetching model {} from {:?}", model.name, model.source);
        let partial_path = self.cache_dir.join(format!("{}.part", model.name));
        let write_failed = |e: std::io::Error| {
            PoseError::ModelLoadFailed(format!("Cannot store {} in cache: {}", model.name, e))
        };

        match &model.source {
            ModelSource::LocalFile(path) => {
                tokio::fs::copy(path, &partial_path).await.map_err(|e| {
                    PoseError::ModelLoadFailed(format!("Cannot copy {}: {}", path.display(), e))
                })?;
            }
            ModelSource::Url(url) => {
                let bytes = Self::download(url.clone()).await?;
                tokio::fs::write(&partial_path, &bytes).await.map_err(write_failed)?;
                info!("Downloaded {} bytes for {}", bytes.len(), model.name);
            }
        }

        let record_path = self.source_record_path(&model.name);
        if record_path.exists() {
            tokio::fs::remove_file(&record_path).await.map_err(write_failed)?;
        }
        tokio::fs::rename(&partial_path, &model_path).await.map_err(write_failed)?;
        tokio::fs::write(&record_path, model.source.describe())
            .await
            .map_err(write_failed)?;

        Ok(model_path)
    }

    async fn download(url: String) -> PoseResult<Vec<u8>> {
        tokio::task::spawn_blocking(move || -> PoseResult<Vec<u8>> {
            let response = reqwest::blocking::get(&url)
                .and_then(|r| r.error_for_status())
                .map_err(|e| {
                    PoseError::ModelLoadFailed(format!("Download of {} failed: {}", url, e))
                })?;
            let bytes = response
                .bytes()
                .map_err(|e| PoseError::ModelLoadFailed(format!("Reading {} failed: {}", url, e)))?;
            Ok(bytes.to_vec())
        })
        .await
        .map_err(|e| PoseError::ModelLoadFailed(format!("Download task failed: {}", e)))?
    }

    /// Clear the model cache
    pub fn clear_cache(&self) -> std::io::Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Get cache size in bytes
    pub fn get_cache_size(&self) -> std::io::Result<u64> {
        let mut total_size = 0u64;

        if self.cache_dir.exists() {
            for entry in fs::read_dir(&self.cache_dir)? {
                let metadata = entry?.metadata()?;
                if metadata.is_file() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}
