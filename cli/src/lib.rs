use recognition::{ImageProcessor, RecognitionCommand, RecognitionError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("Failed to read input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Batch file lists no jobs")]
    EmptyBatch,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One image to process
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub operation: RecognitionCommand,
}

/// Batch file listing independent jobs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BatchJobs {
    pub jobs: Vec<Job>,
}

/// What a finished job produced
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub output: PathBuf,
    pub bytes_written: usize,
}

impl BatchJobs {
    /// Load a batch from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a batch from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let batch: BatchJobs = toml::from_str(content)?;
        batch.ensure_not_empty()
    }

    /// Load a batch from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a batch from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        let batch: BatchJobs = serde_json::from_str(content)?;
        batch.ensure_not_empty()
    }

    /// Auto-detect file format and load the batch
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    fn ensure_not_empty(self) -> Result<Self, CliError> {
        if self.jobs.is_empty() {
            return Err(CliError::EmptyBatch);
        }
        Ok(self)
    }
}

/// Read the input, run the operation and write the output.
/// Nothing is written unless the operation succeeded.
pub fn run_job(processor: &ImageProcessor, job: &Job) -> Result<JobReport, CliError> {
    let bytes = fs::read(&job.input).map_err(|source| CliError::ReadInput {
        path: job.input.clone(),
        source,
    })?;

    let encoded = processor.execute(job.operation, &bytes)?;

    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&job.output, &encoded)?;

    Ok(JobReport {
        output: job.output.clone(),
        bytes_written: encoded.len(),
    })
}
