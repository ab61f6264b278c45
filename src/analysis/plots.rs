use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::sandbox::PLOT_FILE;
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotInfo {
    pub id: String,
    pub url: String,
    pub bytes: usize,
}

/// Rendered charts on disk: one file per plot plus a copy of the latest.
#[derive(Debug, Clone)]
pub struct PlotStore {
    dir: PathBuf,
}

impl PlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn valid_id(id: &str) -> bool {
        Uuid::parse_str(id).is_ok()
    }

    pub async fn save(&self, png: &[u8]) -> AppResult<PlotInfo> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = Uuid::new_v4().to_string();
        tokio::fs::write(self.dir.join(format!("{}.png", id)), png).await?;
        tokio::fs::write(self.dir.join(PLOT_FILE), png).await?;

        info!(plot_id = %id, bytes = png.len(), "Plot saved");
        Ok(PlotInfo {
            url: format!("/plot/{}", id),
            id,
            bytes: png.len(),
        })
    }

    pub async fn latest(&self) -> AppResult<Vec<u8>> {
        match tokio::fs::read(self.dir.join(PLOT_FILE)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("no plot has been generated yet".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: &str) -> AppResult<Vec<u8>> {
        if !Self::valid_id(id) {
            return Err(AppError::NotFound(format!("plot {}", id)));
        }
        match tokio::fs::read(self.dir.join(format!("{}.png", id))).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(format!("plot {}", id))),
            Err(e) => Err(e.into()),
        }
    }
}
