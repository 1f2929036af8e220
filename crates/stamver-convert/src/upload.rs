// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    DatasetLayout, Error, Platform, Progress, ProjectInfo, StampSchema, WorkspaceID,
    create_annotation,
};
use log::info;
use std::path::PathBuf;
use tokio::sync::mpsc::Sender;

/// Number of images uploaded per round-trip.
pub const BATCH_SIZE: usize = 30;
/// Name of the single dataset created in the project.
pub const DATASET_NAME: &str = "ds";

/// Creates a project holding the StaVer dataset found at `layout` and uploads
/// every scan with its derived annotation.
///
/// The project name is made unique within the workspace. Images are uploaded
/// in batches of [`BATCH_SIZE`]; each batch's annotations are uploaded right
/// after its images, and progress is reported in images after every batch.
/// The first failure aborts the run; batches already uploaded stay on the
/// platform.
pub async fn convert_and_upload<P: Platform>(
    platform: &P,
    workspace_id: WorkspaceID,
    project_name: &str,
    layout: &DatasetLayout,
    progress: Option<Sender<Progress>>,
) -> Result<ProjectInfo, Error> {
    let schema = StampSchema::new();

    let project = platform.create_project(workspace_id, project_name).await?;
    platform
        .update_project_meta(project.id(), &schema.project_meta())
        .await?;
    let dataset = platform.create_dataset(project.id(), DATASET_NAME).await?;

    let names = layout.image_names()?;
    let total = names.len();
    let mut current = 0;
    info!("Create dataset {}: {} images", dataset.name(), total);

    for batch in names.chunks(BATCH_SIZE) {
        let paths: Vec<PathBuf> = batch
            .iter()
            .map(|name| layout.images_dir().join(name))
            .collect();

        let images = platform
            .upload_image_paths(dataset.id(), batch, &paths)
            .await?;
        let image_ids: Vec<_> = images.iter().map(|image| image.id()).collect();

        let annotations = paths
            .iter()
            .map(|path| create_annotation(&schema, layout, path))
            .collect::<Result<Vec<_>, _>>()?;
        platform
            .upload_annotations(dataset.id(), &image_ids, &annotations)
            .await?;

        current += batch.len();
        info!("Create dataset {}: {}/{}", dataset.name(), current, total);
        if let Some(progress) = &progress {
            let _ = progress.send(Progress { current, total }).await;
        }
    }

    Ok(project)
}
