// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Remote annotation-platform abstraction.
//!
//! The conversion pipeline only talks to the platform through the
//! [`Platform`] trait. [`Client`](crate::Client) implements it over HTTP;
//! other implementations (an offline recorder, a different backend) can be
//! swapped in without touching acquisition or upload code.

use crate::{
    Annotation, DatasetID, DatasetInfo, Error, ImageID, ImageInfo, Progress, ProjectID,
    ProjectInfo, ProjectMeta, TeamID, WorkspaceID,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tokio::sync::mpsc::Sender;

/// Operations the conversion pipeline needs from the annotation platform.
#[allow(async_fn_in_trait)]
pub trait Platform {
    /// Creates a project, renaming it if the name is already taken in the
    /// workspace.
    async fn create_project(
        &self,
        workspace_id: WorkspaceID,
        name: &str,
    ) -> Result<ProjectInfo, Error>;

    /// Replaces the project's classes and tag metas.
    async fn update_project_meta(
        &self,
        project_id: ProjectID,
        meta: &ProjectMeta,
    ) -> Result<(), Error>;

    /// Creates a dataset, renaming it if the name is already taken in the
    /// project.
    async fn create_dataset(&self, project_id: ProjectID, name: &str)
    -> Result<DatasetInfo, Error>;

    /// Uploads local images into a dataset under the given names.
    ///
    /// The returned infos are in the same order as `names`.
    async fn upload_image_paths(
        &self,
        dataset_id: DatasetID,
        names: &[String],
        paths: &[PathBuf],
    ) -> Result<Vec<ImageInfo>, Error>;

    /// Uploads one annotation per image.
    async fn upload_annotations(
        &self,
        dataset_id: DatasetID,
        image_ids: &[ImageID],
        annotations: &[Annotation],
    ) -> Result<(), Error>;

    /// Total size in bytes of all files under a team-files directory.
    async fn directory_size(&self, team_id: TeamID, dir: &str) -> Result<u64, Error>;

    /// Downloads a team file to a local path.
    ///
    /// Progress is reported in bytes against `total`; when `total` is zero
    /// the response's content length is used instead.
    async fn download_file(
        &self,
        team_id: TeamID,
        remote_path: &str,
        local_path: &Path,
        total: u64,
        progress: Option<Sender<Progress>>,
    ) -> Result<(), Error>;
}

/// Returns `name` if it is not taken, otherwise the first free
/// `name_001`, `name_002`, ... variant.
pub fn free_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_owned();
    }

    (1..)
        .map(|suffix| format!("{}_{:03}", name, suffix))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_owned())
}
