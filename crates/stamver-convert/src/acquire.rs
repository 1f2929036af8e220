// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Dataset acquisition from the platform's team files.
//!
//! Archives are downloaded into the local storage directory and unpacked next
//! to themselves. The storage directory only ever grows: an archive whose
//! unpacked directory already exists is neither downloaded nor extracted
//! again.

use crate::{Error, Platform, Progress, TeamID};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::{
    collections::BTreeMap,
    fs::File,
    io,
    path::{Path, PathBuf},
};
use tokio::sync::mpsc::Sender;
use url::Url;

/// Where the dataset archives come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetSource {
    /// A single archive, named after the last segment of the URL path.
    Url(String),
    /// Several archives, keyed by file name.
    Archives(BTreeMap<String, String>),
}

/// Derives a local file name from the last segment of a URL path.
///
/// The segment is percent-decoded, so `my%20data.zip` becomes `my data.zip`.
pub fn file_name_from_url(url: &str) -> Result<String, Error> {
    let parsed = Url::parse(url)?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidParameters(format!("URL has no file name: {}", url)))?;

    let name = urlencoding::decode(segment)
        .map_err(|e| Error::InvalidParameters(format!("Invalid file name in {}: {}", url, e)))?;
    Ok(name.into_owned())
}

/// Strips the archive extension from a file name. Tarballs lose both
/// extensions, so `masks.tar.gz` and `masks.tgz` both give `masks`.
pub fn archive_stem(file_name: &str) -> Result<&str, Error> {
    let stem = [".tar.gz", ".tgz", ".tar"]
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .or_else(|| Path::new(file_name).file_stem().and_then(|s| s.to_str()))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidParameters(format!("Invalid archive name: {}", file_name)))?;
    Ok(stem)
}

/// Log line for an archive whose unpacked directory already exists.
fn already_unpacked_notice(file_name: &str, unpacked: &Path) -> String {
    format!(
        "Archive '{}' was already unpacked to '{}'. Skipping...",
        file_name,
        unpacked.display()
    )
}

/// Extracts `path` if it is a ZIP, tar or gzipped tar archive and returns the
/// extracted directory.
///
/// The archive is unpacked into a directory named after its
/// [`archive_stem`], next to the archive itself. Files that are not archives
/// are returned unchanged. Other archive formats are rejected with
/// [`Error::UnsupportedFormat`].
pub fn unpack_if_archive(path: &Path) -> Result<PathBuf, Error> {
    let Some(kind) = infer::get_from_path(path)? else {
        return Ok(path.to_path_buf());
    };

    if kind.matcher_type() != infer::MatcherType::Archive {
        return Ok(path.to_path_buf());
    }

    let format = match kind.mime_type() {
        "application/zip" => ArchiveFormat::Zip,
        "application/x-tar" => ArchiveFormat::Tar,
        "application/gzip" => ArchiveFormat::TarGz,
        _ => {
            return Err(Error::UnsupportedFormat(format!(
                "{} archive {}",
                kind.extension(),
                path.display()
            )));
        }
    };

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidParameters(format!("Invalid path: {}", path.display())))?;
    let stem = archive_stem(file_name)?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let target = parent.join(stem);

    if target.exists() {
        debug!("{} is already extracted", target.display());
        return Ok(target);
    }

    // Extract next to the target and rename, so an interrupted run never
    // leaves a directory that looks complete.
    let staging = parent.join(format!("{}.partial", stem));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    match format {
        ArchiveFormat::Zip => unpack_zip(path, &staging)?,
        // tar skips entries that would land outside the destination.
        ArchiveFormat::Tar => tar::Archive::new(File::open(path)?).unpack(&staging)?,
        ArchiveFormat::TarGz => {
            tar::Archive::new(GzDecoder::new(File::open(path)?)).unpack(&staging)?
        }
    }

    std::fs::rename(&staging, &target)?;
    Ok(target)
}

#[derive(Clone, Copy, Debug)]
enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

fn unpack_zip(path: &Path, staging: &Path) -> Result<(), Error> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let out = staging.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(dir) = out.parent() {
            std::fs::create_dir_all(dir)?;
        }
        io::copy(&mut entry, &mut File::create(&out)?)?;
    }
    Ok(())
}

/// Makes sure the dataset exists unpacked under `storage_dir` and returns the
/// local dataset root.
///
/// Archives are fetched from `<teamfiles_dir>/<file name>`. For a single URL
/// the archive is always downloaded and the unpacked directory is returned.
/// For a set of archives, each one whose unpacked directory already exists is
/// skipped, and the storage directory itself is returned.
pub async fn download_dataset<P: Platform>(
    platform: &P,
    team_id: TeamID,
    source: &DatasetSource,
    teamfiles_dir: &str,
    storage_dir: &Path,
    progress: Option<Sender<Progress>>,
) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(storage_dir)?;

    match source {
        DatasetSource::Url(url) => {
            let file_name = file_name_from_url(url)?;
            let local_path = fetch_archive(
                platform,
                team_id,
                teamfiles_dir,
                &file_name,
                storage_dir,
                progress,
            )
            .await?;
            info!("Start unpacking archive '{}'...", file_name);
            unpack_if_archive(&local_path)
        }
        DatasetSource::Archives(archives) => {
            for file_name in archives.keys() {
                let unpacked = storage_dir.join(archive_stem(file_name)?);

                if unpacked.exists() {
                    info!("{}", already_unpacked_notice(file_name, &unpacked));
                    continue;
                }

                let local_path = fetch_archive(
                    platform,
                    team_id,
                    teamfiles_dir,
                    file_name,
                    storage_dir,
                    progress.clone(),
                )
                .await?;
                info!("Start unpacking archive '{}'...", file_name);
                unpack_if_archive(&local_path)?;
            }
            Ok(storage_dir.to_path_buf())
        }
    }
}

async fn fetch_archive<P: Platform>(
    platform: &P,
    team_id: TeamID,
    teamfiles_dir: &str,
    file_name: &str,
    storage_dir: &Path,
    progress: Option<Sender<Progress>>,
) -> Result<PathBuf, Error> {
    let remote_path = format!("{}/{}", teamfiles_dir.trim_end_matches('/'), file_name);
    let local_path = storage_dir.join(file_name);

    // The whole directory is used as the progress total.
    let total = platform.directory_size(team_id, teamfiles_dir).await?;
    info!("Downloading '{}' to {}", file_name, local_path.display());
    platform
        .download_file(team_id, &remote_path, &local_path, total, progress)
        .await?;
    Ok(local_path)
}
