//! Periodic still capture through an external camera program

use anyhow::Context;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::CameraConfig;

/// Fires on the first sample, then once every `every` samples
#[derive(Debug, Clone)]
pub struct CaptureSchedule {
    every: u32,
    since_last: Option<u32>,
}

impl CaptureSchedule {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            since_last: None,
        }
    }

    /// Advance by one sample and report whether a capture is due
    pub fn tick(&mut self) -> bool {
        let due = match self.since_last {
            None => true,
            Some(n) => n + 1 >= self.every,
        };
        self.since_last = if due {
            Some(0)
        } else {
            self.since_last.map(|n| n + 1)
        };
        due
    }
}

pub struct Camera {
    config: CameraConfig,
    image_dir: PathBuf,
    schedule: CaptureSchedule,
}

impl Camera {
    pub fn new(config: CameraConfig, image_dir: impl Into<PathBuf>) -> Self {
        let schedule = CaptureSchedule::new(config.every_samples);
        Self {
            config,
            image_dir: image_dir.into(),
            schedule,
        }
    }

    /// `<image_dir>/img_YYYYMMDD/img_YYYYMMDD_HHMM.jpg`
    pub fn image_path(&self, at: DateTime<Local>) -> PathBuf {
        image_path(&self.image_dir, at)
    }

    /// Capture if the schedule says so; returns the image written
    pub async fn on_sample(&mut self, at: DateTime<Local>) -> anyhow::Result<Option<PathBuf>> {
        if !self.schedule.tick() {
            return Ok(None);
        }
        self.capture(at).await.map(Some)
    }

    pub async fn capture(&self, at: DateTime<Local>) -> anyhow::Result<PathBuf> {
        let path = self.image_path(at);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create image directory {:?}", dir))?;
        }

        let args = expand_args(&self.config, &path);
        tracing::debug!("Running {} {:?}", self.config.command, args);

        let output = Command::new(&self.config.command)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.command))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        tracing::info!("Captured image {:?}", path);
        Ok(path)
    }
}

fn image_path(image_dir: &Path, at: DateTime<Local>) -> PathBuf {
    image_dir
        .join(format!("img_{}", at.format("%Y%m%d")))
        .join(format!("img_{}.jpg", at.format("%Y%m%d_%H%M")))
}

fn expand_args(config: &CameraConfig, path: &Path) -> Vec<String> {
    let path = path.display().to_string();
    let width = config.width.to_string();
    let height = config.height.to_string();
    config
        .args
        .iter()
        .map(|arg| {
            arg.replace("{path}", &path)
                .replace("{width}", &width)
                .replace("{height}", &height)
        })
        .collect()
}
