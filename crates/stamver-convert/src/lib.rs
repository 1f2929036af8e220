// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # StaVer Converter Library
//!
//! Converts the StaVer document-stamp dataset into an annotation-platform
//! project. The pipeline has three stages:
//!
//! - **Acquisition**: download the dataset archives from the team files and
//!   unpack them into local storage ([`download_dataset`]).
//! - **Annotation derivation**: turn each scan's ground-truth mask and text
//!   record into stamp bitmap labels and image tags ([`create_annotation`]).
//! - **Upload**: create the project, its schema, and a dataset, then upload
//!   images and annotations in batches ([`convert_and_upload`]).
//!
//! The pipeline talks to the platform through the [`Platform`] trait, which
//! [`Client`] implements over the platform's HTTP API.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stamver_convert::{
//!     Client, DatasetLayout, DatasetSource, Error, TeamID, WorkspaceID, convert_and_upload,
//!     download_dataset,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let client = Client::new("https://app.supervisely.com", "api-token")?;
//!
//!     let source = DatasetSource::Url("https://example.com/stamver.zip".to_owned());
//!     let root = download_dataset(
//!         &client,
//!         TeamID::from(8),
//!         &source,
//!         "/stamver",
//!         Path::new("/tmp/stamver"),
//!         None,
//!     )
//!     .await?;
//!
//!     let layout = DatasetLayout::new(&root);
//!     let project =
//!         convert_and_upload(&client, WorkspaceID::from(12), "StaVer", &layout, None).await?;
//!     println!("Created project {}", project);
//!
//!     Ok(())
//! }
//! ```

mod acquire;
mod annotation;
mod api;
mod client;
mod convert;
mod error;
mod meta;
mod platform;
mod upload;

pub use crate::{
    acquire::{DatasetSource, download_dataset, file_name_from_url, unpack_if_archive},
    annotation::{Annotation, Bitmap, ImageSize, Label},
    api::{
        DatasetID, DatasetInfo, FileInfo, ImageID, ImageInfo, ProjectID, ProjectInfo, TeamID,
        WorkspaceID,
    },
    client::{Client, Progress},
    convert::{
        DatasetLayout, MAX_SEPARABLE_COMPONENTS, MIN_COMPONENT_AREA, StampInfo, create_annotation,
        stamp_mask, stamp_regions,
    },
    error::Error,
    meta::{
        GeometryType, NUMBER_OF_STAMPS_TAG, OVERLAP_TAG, ObjClass, ProjectMeta, SIGNATURE_TAG,
        STAMP_CLASS, StampSchema, Tag, TagMeta, TagValue, TagValueType,
    },
    platform::{Platform, free_name},
    upload::{BATCH_SIZE, DATASET_NAME, convert_and_upload},
};
