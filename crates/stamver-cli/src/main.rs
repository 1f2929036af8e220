// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use stamver_convert::{
    Client, DatasetLayout, DatasetSource, Error, Progress, StampSchema, TeamID, WorkspaceID,
    convert_and_upload, create_annotation, download_dataset,
};
use std::{collections::BTreeMap, path::PathBuf};
use tokio::{sync::mpsc, task::JoinHandle};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Annotation platform server address
    #[clap(long, env = "SERVER_ADDRESS")]
    server: Option<String>,

    /// Annotation platform API token
    #[clap(long, env = "API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Team owning the team files that hold the dataset archives
    #[clap(long, env = "TEAM_ID")]
    team_id: Option<u64>,

    /// Workspace in which the project is created
    #[clap(long, env = "WORKSPACE_ID")]
    workspace_id: Option<u64>,

    /// Local storage directory for downloaded and unpacked archives
    #[clap(long, env = "SLY_APP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Converter Command
    #[command(subcommand)]
    cmd: Command,
}

/// Where the dataset archives are downloaded from.
#[derive(clap::Args, Debug, Clone, PartialEq)]
struct SourceArgs {
    /// URL of the single dataset archive; the archive is named after the
    /// last segment of the URL path.
    #[clap(long, conflicts_with = "archives")]
    url: Option<String>,

    /// Named archive as NAME=URL, may be repeated.  Archives already
    /// unpacked in the data directory are skipped.
    #[clap(long = "archive", value_parser = parse_archive)]
    archives: Vec<(String, String)>,

    /// Team files directory holding the archives
    #[clap(long)]
    teamfiles_dir: Option<String>,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Download and unpack the dataset archives, then print the local dataset
    /// path.
    Download {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Convert the dataset into a new project and upload images and
    /// annotations.  The dataset is downloaded first unless --dataset-root is
    /// provided.
    Convert {
        /// Project name, suffixed with _001, _002, ... if already taken
        project_name: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Local dataset root containing the stamver directory
        #[clap(long)]
        dataset_root: Option<PathBuf>,
    },
    /// Print the annotation derived for a single scan image, without
    /// contacting the platform.
    Annotate {
        /// Local dataset root containing the stamver directory
        dataset_root: PathBuf,

        /// Scan image file name, including extension
        image_name: String,
    },
}

fn parse_archive(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, url)) if !name.is_empty() && !url.is_empty() => {
            Ok((name.to_owned(), url.to_owned()))
        }
        _ => Err(format!("expected NAME=URL, got '{}'", s)),
    }
}

impl SourceArgs {
    fn source(&self) -> Result<DatasetSource, Error> {
        match (&self.url, self.archives.is_empty()) {
            (Some(url), true) => Ok(DatasetSource::Url(url.clone())),
            (None, false) => Ok(DatasetSource::Archives(
                self.archives.iter().cloned().collect::<BTreeMap<_, _>>(),
            )),
            _ => Err(Error::InvalidParameters(
                "Must provide either --url or at least one --archive".to_owned(),
            )),
        }
    }

    fn teamfiles_dir(&self) -> Result<&str, Error> {
        self.teamfiles_dir
            .as_deref()
            .ok_or_else(|| Error::InvalidParameters("Missing --teamfiles-dir".to_owned()))
    }
}

fn client(args: &Args) -> Result<Client, Error> {
    let server = args.server.as_deref().ok_or_else(|| {
        Error::InvalidParameters("Missing --server or SERVER_ADDRESS".to_owned())
    })?;
    let token = args
        .token
        .as_deref()
        .ok_or_else(|| Error::InvalidParameters("Missing --token or API_TOKEN".to_owned()))?;
    Client::new(server, token)
}

fn team_id(args: &Args) -> Result<TeamID, Error> {
    args.team_id
        .map(TeamID::from)
        .ok_or_else(|| Error::InvalidParameters("Missing --team-id or TEAM_ID".to_owned()))
}

fn workspace_id(args: &Args) -> Result<WorkspaceID, Error> {
    args.workspace_id.map(WorkspaceID::from).ok_or_else(|| {
        Error::InvalidParameters("Missing --workspace-id or WORKSPACE_ID".to_owned())
    })
}

fn data_dir(args: &Args) -> Result<PathBuf, Error> {
    match &args.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => ProjectDirs::from("ai", "EdgeFirst", "StaVer")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                Error::InvalidParameters(
                    "No home directory, provide --data-dir or SLY_APP_DATA_DIR".to_owned(),
                )
            }),
    }
}

/// Spawns a task rendering progress messages into a bar.
fn progress_bar(template: &str, message: &str) -> (mpsc::Sender<Progress>, JoinHandle<()>) {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(template)
            .unwrap()
            .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    bar.set_message(message.to_owned());

    let (tx, mut rx) = mpsc::channel::<Progress>(1);
    let handle = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if progress.total > 0 {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.current as u64);
            }
        }
        bar.finish();
    });

    (tx, handle)
}

async fn handle_download(
    args: &Args,
    client: &Client,
    source: &SourceArgs,
) -> Result<PathBuf, Error> {
    let (tx, bar) = progress_bar(
        "[{elapsed_precise}] {msg}: [{wide_bar:.yellow}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        "Downloading",
    );

    let root = download_dataset(
        client,
        team_id(args)?,
        &source.source()?,
        source.teamfiles_dir()?,
        &data_dir(args)?,
        Some(tx),
    )
    .await?;

    let _ = bar.await;
    Ok(root)
}

async fn handle_convert(
    args: &Args,
    project_name: &str,
    source: &SourceArgs,
    dataset_root: Option<PathBuf>,
) -> Result<(), Error> {
    let client = client(args)?;
    let workspace_id = workspace_id(args)?;

    let root = match dataset_root {
        Some(root) => root,
        None => handle_download(args, &client, source).await?,
    };
    debug!("Converting dataset at {}", root.display());

    let (tx, bar) = progress_bar(
        "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
        "Uploading images",
    );

    let project = convert_and_upload(
        &client,
        workspace_id,
        project_name,
        &DatasetLayout::new(&root),
        Some(tx),
    )
    .await?;

    let _ = bar.await;
    println!("{}", project);
    Ok(())
}

fn handle_annotate(dataset_root: PathBuf, image_name: String) -> Result<(), Error> {
    let layout = DatasetLayout::new(dataset_root);
    let image_path = layout.images_dir().join(&image_name);
    if !image_path.is_file() {
        return Err(Error::InvalidParameters(format!(
            "Image not found: {}",
            image_path.display()
        )));
    }

    let annotation = create_annotation(&StampSchema::new(), &layout, &image_path)?;
    println!("{}", serde_json::to_string_pretty(&annotation)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match &args.cmd {
        Command::Download { source } => {
            let client = client(&args)?;
            let root = handle_download(&args, &client, source).await?;
            println!("{}", root.display());
            Ok(())
        }
        Command::Convert {
            project_name,
            source,
            dataset_root,
        } => handle_convert(&args, project_name, source, dataset_root.clone()).await,
        Command::Annotate {
            dataset_root,
            image_name,
        } => handle_annotate(dataset_root.clone(), image_name.clone()),
    }
}
