// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    Annotation, Error, Platform, ProjectMeta,
    api::{
        DatasetID, DatasetInfo, FileInfo, ImageID, ImageInfo, Page, ProjectID, ProjectInfo,
        TeamID, WorkspaceID,
    },
    platform::free_name,
};
use base64::Engine as _;
use futures::StreamExt as _;
use log::{Level, debug, error, info, log_enabled, trace};
use reqwest::{
    Body,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use sha2::{Digest as _, Sha256};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    sync::mpsc::Sender,
};
use tokio_util::codec::{BytesCodec, FramedRead};
use url::Url;

const API_PATH: &str = "public/api/v3";
const PER_PAGE: u32 = 500;

/// Progress information for long-running operations.
///
/// Downloads report bytes, uploads report images. Consumers receive these
/// over a `tokio::sync::mpsc` channel and typically drive a progress bar.
///
/// # Examples
///
/// ```rust
/// use stamver_convert::Progress;
///
/// let progress = Progress {
///     current: 30,
///     total: 65,
/// };
/// let percentage = (progress.current as f64 / progress.total as f64) * 100.0;
/// println!(
///     "Progress: {:.1}% ({}/{})",
///     percentage, progress.current, progress.total
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Current number of completed items.
    pub current: usize,
    /// Total number of items to process.
    pub total: usize,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client for the annotation platform's public API.
///
/// Every API method is a `POST` of a JSON body to
/// `{server}/public/api/v3/<method>` authenticated with the `x-api-key`
/// header. Requests are never retried: a failed call aborts the conversion.
///
/// # Examples
///
/// ```no_run
/// use stamver_convert::{Client, WorkspaceID};
///
/// # async fn example() -> Result<(), stamver_convert::Error> {
/// let client = Client::new("https://app.supervisely.com", "api-token")?;
/// let projects = client.projects(WorkspaceID::from(12)).await?;
/// println!("Found {} projects", projects.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("has_token", &!self.token.is_empty())
            .finish()
    }
}

impl Client {
    /// Creates a client for the given server address and API token.
    ///
    /// The read timeout defaults to 60 seconds and can be changed with the
    /// `STAMVER_TIMEOUT` environment variable. It bounds each read of a
    /// response, not the whole transfer, so large archive downloads are not
    /// cut short.
    pub fn new(server: &str, token: &str) -> Result<Self, Error> {
        if token.is_empty() {
            return Err(Error::InvalidParameters("API token is empty".to_owned()));
        }

        let url = Url::parse(server)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidParameters(format!(
                "Server address must be http(s): {}",
                server
            )));
        }

        let timeout_secs = std::env::var("STAMVER_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Client {
            http,
            url: url.as_str().trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        })
    }

    /// Base URL of the server.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}/{}", self.url, API_PATH, method)
    }

    /// Lists the projects of a workspace.
    pub async fn projects(&self, workspace_id: WorkspaceID) -> Result<Vec<ProjectInfo>, Error> {
        self.list_all("projects.list", json!({ "workspaceId": workspace_id }))
            .await
    }

    /// Lists the datasets of a project.
    pub async fn datasets(&self, project_id: ProjectID) -> Result<Vec<DatasetInfo>, Error> {
        self.list_all("datasets.list", json!({ "projectId": project_id }))
            .await
    }

    /// Lists team files under `dir`, recursively.
    pub async fn files(&self, team_id: TeamID, dir: &str) -> Result<Vec<FileInfo>, Error> {
        self.rpc(
            "file-storage.list",
            &json!({ "teamId": team_id, "path": dir, "recursive": true }),
        )
        .await
    }

    async fn list_all<T>(&self, method: &str, params: serde_json::Value) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let mut params = params.clone();
            if let Some(obj) = params.as_object_mut() {
                obj.insert("page".to_owned(), json!(page));
                obj.insert("per_page".to_owned(), json!(PER_PAGE));
            }

            let result: Page<T> = self.rpc(method, &params).await?;
            let count = result.entities.len();
            items.extend(result.entities);

            if count == 0 || page >= result.pages_count {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Calls an API method with `params` as the JSON body and decodes the
    /// response.
    ///
    /// Prefer the typed methods; this is for platform methods the client does
    /// not wrap.
    pub async fn rpc<Params, RpcResult>(
        &self,
        method: &str,
        params: &Params,
    ) -> Result<RpcResult, Error>
    where
        Params: Serialize + ?Sized,
        RpcResult: DeserializeOwned,
    {
        if log_enabled!(Level::Trace) {
            trace!(
                "API Request {}: {}",
                method,
                serde_json::ser::to_string_pretty(params)?
            );
        }

        let res = self
            .http
            .post(self.api_url(method))
            .header("Accept", "application/json")
            .header("x-api-key", &self.token)
            .json(params)
            .send()
            .await?;

        self.process_response(res).await
    }

    async fn process_response<RpcResult>(&self, res: reqwest::Response) -> Result<RpcResult, Error>
    where
        RpcResult: DeserializeOwned,
    {
        let status = res.status();
        let body = res.bytes().await?;

        if log_enabled!(Level::Trace) {
            trace!("API Response: {}", String::from_utf8_lossy(&body));
        }

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.or(b.message))
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(Error::ApiError(status.as_u16(), message));
        }

        match serde_json::from_slice(&body) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!("Invalid JSON Response: {}", String::from_utf8_lossy(&body));
                Err(err.into())
            }
        }
    }
}

/// Content hash the platform uses to deduplicate image blobs.
async fn hash_file(path: &Path) -> Result<String, Error> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

impl Platform for Client {
    async fn create_project(
        &self,
        workspace_id: WorkspaceID,
        name: &str,
    ) -> Result<ProjectInfo, Error> {
        let taken: HashSet<String> = self
            .projects(workspace_id)
            .await?
            .into_iter()
            .map(|p| p.name().to_owned())
            .collect();
        let name = free_name(name, &taken);

        let project: ProjectInfo = self
            .rpc(
                "projects.add",
                &json!({
                    "workspaceId": workspace_id,
                    "name": name,
                    "description": "",
                    "type": "images",
                }),
            )
            .await?;
        info!("Created project {}", project);
        Ok(project)
    }

    async fn update_project_meta(
        &self,
        project_id: ProjectID,
        meta: &ProjectMeta,
    ) -> Result<(), Error> {
        let _: serde_json::Value = self
            .rpc(
                "projects.meta.update",
                &json!({ "id": project_id, "meta": meta }),
            )
            .await?;
        Ok(())
    }

    async fn create_dataset(
        &self,
        project_id: ProjectID,
        name: &str,
    ) -> Result<DatasetInfo, Error> {
        let taken: HashSet<String> = self
            .datasets(project_id)
            .await?
            .into_iter()
            .map(|d| d.name().to_owned())
            .collect();
        let name = free_name(name, &taken);

        let dataset: DatasetInfo = self
            .rpc(
                "datasets.add",
                &json!({ "projectId": project_id, "name": name, "description": "" }),
            )
            .await?;
        info!("Created dataset {}", dataset);
        Ok(dataset)
    }

    async fn upload_image_paths(
        &self,
        dataset_id: DatasetID,
        names: &[String],
        paths: &[PathBuf],
    ) -> Result<Vec<ImageInfo>, Error> {
        if names.len() != paths.len() {
            return Err(Error::InvalidParameters(format!(
                "{} image names for {} paths",
                names.len(),
                paths.len()
            )));
        }

        let mut hashes = Vec::with_capacity(paths.len());
        let mut form = Form::new();

        for (idx, path) in paths.iter().enumerate() {
            let hash = hash_file(path).await?;
            let file = File::open(path).await?;
            let length = file.metadata().await?.len();
            let stream = FramedRead::new(file, BytesCodec::new());
            let part = Part::stream_with_length(Body::wrap_stream(stream), length)
                .file_name(hash.clone())
                .mime_str("application/octet-stream")?;
            form = form.part(format!("{}-file", idx), part);
            hashes.push(hash);
        }

        debug!("Uploading {} image blobs", paths.len());
        let res = self
            .http
            .post(self.api_url("images.bulk.upload"))
            .header("x-api-key", &self.token)
            .multipart(form)
            .send()
            .await?;
        let _: serde_json::Value = self.process_response(res).await?;

        #[derive(Serialize)]
        struct NewImage<'a> {
            title: &'a str,
            hash: &'a str,
        }

        let images: Vec<NewImage> = names
            .iter()
            .zip(&hashes)
            .map(|(title, hash)| NewImage { title, hash })
            .collect();

        let infos: Vec<ImageInfo> = self
            .rpc(
                "images.bulk.add",
                &json!({ "datasetId": dataset_id, "images": images }),
            )
            .await?;

        if infos.len() != names.len() {
            return Err(Error::InvalidResponse);
        }
        Ok(infos)
    }

    async fn upload_annotations(
        &self,
        dataset_id: DatasetID,
        image_ids: &[ImageID],
        annotations: &[Annotation],
    ) -> Result<(), Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ImageAnnotation<'a> {
            image_id: ImageID,
            annotation: &'a Annotation,
        }

        if image_ids.len() != annotations.len() {
            return Err(Error::InvalidParameters(format!(
                "{} annotations for {} images",
                annotations.len(),
                image_ids.len()
            )));
        }

        let annotations: Vec<ImageAnnotation> = image_ids
            .iter()
            .zip(annotations)
            .map(|(&image_id, annotation)| ImageAnnotation {
                image_id,
                annotation,
            })
            .collect();

        let _: serde_json::Value = self
            .rpc(
                "annotations.bulk.add",
                &json!({ "datasetId": dataset_id, "annotations": annotations }),
            )
            .await?;
        Ok(())
    }

    async fn directory_size(&self, team_id: TeamID, dir: &str) -> Result<u64, Error> {
        let size: u64 = self
            .files(team_id, dir)
            .await?
            .iter()
            .filter(|f| f.is_file())
            .map(FileInfo::size)
            .sum();
        debug!("Team files directory {} holds {} bytes", dir, size);
        Ok(size)
    }

    async fn download_file(
        &self,
        team_id: TeamID,
        remote_path: &str,
        local_path: &Path,
        total: u64,
        progress: Option<Sender<Progress>>,
    ) -> Result<(), Error> {
        let resp = self
            .http
            .post(self.api_url("file-storage.download"))
            .header("x-api-key", &self.token)
            .json(&json!({ "teamId": team_id, "path": remote_path }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ApiError(status.as_u16(), body));
        }

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let total = if total > 0 {
            total as usize
        } else {
            resp.content_length().unwrap_or(0) as usize
        };

        let mut file = File::create(local_path).await?;
        let mut current = 0;
        let mut stream = resp.bytes_stream();

        if let Some(progress) = &progress {
            let _ = progress.send(Progress { current, total }).await;
        }

        while let Some(item) = stream.next().await {
            let chunk = item?;
            file.write_all(&chunk).await?;
            current += chunk.len();
            if let Some(progress) = &progress {
                let _ = progress.send(Progress { current, total }).await;
            }
        }
        file.flush().await?;

        debug!("Downloaded {} ({} bytes)", remote_path, current);
        Ok(())
    }
}
