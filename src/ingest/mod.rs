//! ARGO ETL: download profile files from a directory listing, clean them and
//! load them into the `Data` and `Observation` tables.

pub mod listing;
pub mod profile;
pub mod qc;

#[cfg(feature = "netcdf")]
pub mod netcdf_reader;

pub use crate::models::{ObservationRow, ProfileMeta};
pub use profile::{Channel, RawProfile};

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::{Client, Url};
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::db::DatabaseOperations;
use crate::utils::with_retry;

const DOWNLOAD_ATTEMPTS: u32 = 3;

pub type ProfileLoader = fn(&Path) -> Result<RawProfile>;

#[cfg(feature = "netcdf")]
pub use netcdf_reader::load_profile;

#[cfg(not(feature = "netcdf"))]
pub fn load_profile(path: &Path) -> Result<RawProfile> {
    Err(anyhow!(
        "cannot read {}: built without NetCDF support (enable the `netcdf` feature)",
        path.display()
    ))
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub skip_download: bool,
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub profiles: usize,
    pub observations: usize,
    pub failed: usize,
}

async fn download_file(client: Client, url: Url, path: PathBuf) -> Result<()> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;

    let partial = path.with_extension("nc.part");
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    tokio::fs::rename(&partial, &path).await?;
    Ok(())
}

/// Fetch every `.nc` file linked from `base_url` into `dir`, skipping files
/// that already exist.
pub async fn download_all(client: &Client, base_url: &str, dir: &Path) -> Result<DownloadSummary> {
    let base = Url::parse(base_url).with_context(|| format!("invalid source URL {}", base_url))?;
    tokio::fs::create_dir_all(dir).await?;

    info!(url = %base, "Fetching file list");
    let html = client
        .get(base.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let mut summary = DownloadSummary::default();
    for link in listing::nc_links(&html) {
        let Some(name) = listing::file_name(&link) else {
            continue;
        };
        let path = dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            summary.skipped += 1;
            continue;
        }

        let url = base.join(&link)?;
        info!(url = %url, "Downloading");
        let (client, target) = (client.clone(), path.clone());
        with_retry(
            move || Box::pin(download_file(client.clone(), url.clone(), target.clone())),
            DOWNLOAD_ATTEMPTS,
            Duration::from_secs(2),
        )
        .await
        .with_context(|| format!("Failed to download {}", link))?;
        summary.downloaded += 1;
    }

    info!(downloaded = summary.downloaded, skipped = summary.skipped, "Download finished");
    Ok(summary)
}

/// All `.nc` files under `dir`, sorted.
pub fn profile_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "nc") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Load and insert each file. A file that fails to parse or insert is logged
/// and skipped; its transaction is rolled back.
pub async fn ingest_files(
    pool: &SqlitePool,
    files: &[PathBuf],
    loader: ProfileLoader,
    mut collected: Option<&mut Vec<ObservationRow>>,
) -> IngestSummary {
    let mut summary = IngestSummary {
        files: files.len(),
        ..Default::default()
    };

    for (i, path) in files.iter().enumerate() {
        info!(file = %path.display(), index = i + 1, total = files.len(), "Processing profile");

        let target = path.clone();
        let loaded = tokio::task::spawn_blocking(move || loader(&target))
            .await
            .map_err(|e| anyhow!("loader task failed: {}", e))
            .and_then(|r| r);

        let profile = match loaded {
            Ok(profile) => profile,
            Err(e) => {
                error!(file = %path.display(), error = %format!("{:#}", e), "Failed to load profile");
                summary.failed += 1;
                continue;
            }
        };

        let observations = profile.observations();
        match DatabaseOperations::insert_profile(pool, &profile.meta(), &observations).await {
            Ok(data_id) => {
                info!(data_id, observations = observations.len(), "Profile inserted");
                summary.profiles += 1;
                summary.observations += observations.len();
                if let Some(rows) = collected.as_deref_mut() {
                    rows.extend(observations);
                }
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to insert profile");
                summary.failed += 1;
            }
        }
    }
    summary
}

pub fn export_csv(rows: &[ObservationRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Download, parse and load the whole source directory.
pub async fn run(config: &Config, pool: &SqlitePool, options: IngestOptions) -> Result<IngestSummary> {
    let dir = PathBuf::from(&config.ingest.data_dir);

    if options.skip_download {
        info!(dir = %dir.display(), "Skipping download");
    } else {
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;
        download_all(&client, &config.ingest.source_url, &dir).await?;
    }

    let files = if dir.exists() { profile_files(&dir)? } else { Vec::new() };
    if files.is_empty() {
        warn!(dir = %dir.display(), "No .nc files found");
        return Ok(IngestSummary::default());
    }

    let mut rows = Vec::new();
    let collect = options.csv.is_some().then_some(&mut rows);
    let summary = ingest_files(pool, &files, load_profile, collect).await;

    if let Some(csv_path) = &options.csv {
        export_csv(&rows, csv_path)?;
        info!(path = %csv_path.display(), rows = rows.len(), "Observations exported");
    }

    info!(
        files = summary.files,
        profiles = summary.profiles,
        observations = summary.observations,
        failed = summary.failed,
        "Ingest finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn fake_loader(path: &Path) -> Result<RawProfile> {
        if path.to_string_lossy().contains("broken") {
            return Err(anyhow!("corrupt file"));
        }
        Ok(RawProfile {
            platform_number: "4902911".to_string(),
            cycle_number: Some(13),
            pres: Channel {
                values: vec![Some(5.0), Some(10.0)],
                qc: "11".to_string(),
                ..Default::default()
            },
            temp: Channel {
                values: vec![Some(22.0), Some(21.5)],
                qc: "11".to_string(),
                ..Default::default()
            },
            station_parameters: "PRES TEMP".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_ingest_skips_failing_files() {
        let pool = test_pool().await;
        let files = vec![
            PathBuf::from("a.nc"),
            PathBuf::from("broken.nc"),
            PathBuf::from("c.nc"),
        ];
        let mut rows = Vec::new();
        let summary = ingest_files(&pool, &files, fake_loader, Some(&mut rows)).await;

        assert_eq!(
            summary,
            IngestSummary {
                files: 3,
                profiles: 2,
                observations: 4,
                failed: 1
            }
        );
        assert_eq!(rows.len(), 4);
        assert_eq!(DatabaseOperations::count_profiles(&pool).await.unwrap(), 2);
        assert_eq!(DatabaseOperations::count_observations(&pool).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_download_all_skips_existing() {
        let mut server = mockito::Server::new_async().await;
        let listing = server
            .mock("GET", "/argo/")
            .with_status(200)
            .with_body(r#"<a href="old.nc">old</a><a href="new.nc">new</a><a href="notes.txt">x</a>"#)
            .create_async()
            .await;
        let file = server
            .mock("GET", "/argo/new.nc")
            .with_status(200)
            .with_body("CDF-bytes")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.nc"), b"existing").unwrap();

        let summary = download_all(&Client::new(), &format!("{}/argo/", server.url()), dir.path())
            .await
            .unwrap();

        listing.assert_async().await;
        file.assert_async().await;
        assert_eq!(summary, DownloadSummary { downloaded: 1, skipped: 1 });
        assert_eq!(std::fs::read(dir.path().join("new.nc")).unwrap(), b"CDF-bytes");
        assert_eq!(std::fs::read(dir.path().join("old.nc")).unwrap(), b"existing");
    }

    #[test]
    fn test_profile_files_recurse_and_sort() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.nc"), b"").unwrap();
        std::fs::write(dir.path().join("sub").join("a.nc"), b"").unwrap();
        std::fs::write(dir.path().join("skip.txt"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("cycle.nc").join("deep")).unwrap();
        std::fs::write(dir.path().join("cycle.nc").join("deep").join("c.nc"), b"").unwrap();

        let files = profile_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("b.nc"),
                dir.path().join("cycle.nc").join("deep").join("c.nc"),
                dir.path().join("sub").join("a.nc"),
            ]
        );
    }

    #[test]
    fn test_profile_files_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(profile_files(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("observations.csv");
        let rows = fake_loader(Path::new("a.nc")).unwrap().observations();
        export_csv(&rows, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "pressure,temp,psal,station_param,equation,coefficient,comment,history_software"
        );
        assert_eq!(text.lines().count(), 3);
    }
}
