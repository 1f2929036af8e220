// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Declares a platform identifier newtype.
///
/// Platform identifiers are plain decimal integers on the wire and in the
/// user interface, so unlike opaque UUIDs they round-trip through `Display`
/// and `FromStr` unchanged.
macro_rules! platform_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }

        impl From<$name> for u64 {
            fn from(val: $name) -> Self {
                val.0
            }
        }

        impl $name {
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map($name).map_err(|e| {
                    Error::InvalidParameters(format!("{} '{}': {}", $label, s, e))
                })
            }
        }
    };
}

platform_id!(
    /// Team owning the team-files storage the dataset archives live in.
    TeamID,
    "team id"
);
platform_id!(
    /// Workspace the converted project is created in.
    WorkspaceID,
    "workspace id"
);
platform_id!(
    /// Unique identifier for a project.
    ///
    /// ```rust
    /// use stamver_convert::ProjectID;
    ///
    /// let project_id: ProjectID = "1234".parse().unwrap();
    /// assert_eq!(project_id.value(), 1234);
    /// assert_eq!(project_id.to_string(), "1234");
    /// ```
    ProjectID,
    "project id"
);
platform_id!(
    /// Unique identifier for a dataset within a project.
    DatasetID,
    "dataset id"
);
platform_id!(
    /// Identifier assigned to an image when it is added to a dataset.
    ImageID,
    "image id"
);

/// Project information returned by the platform.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    id: ProjectID,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    workspace_id: Option<WorkspaceID>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl Display for ProjectInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)
    }
}

impl ProjectInfo {
    pub fn new(id: ProjectID, name: &str) -> Self {
        ProjectInfo {
            id,
            name: name.to_owned(),
            description: String::new(),
            workspace_id: None,
            created_at: None,
        }
    }

    pub fn id(&self) -> ProjectID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn workspace_id(&self) -> Option<WorkspaceID> {
        self.workspace_id
    }

    pub fn created_at(&self) -> Option<&DateTime<Utc>> {
        self.created_at.as_ref()
    }
}

/// Dataset information returned by the platform.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    id: DatasetID,
    name: String,
    #[serde(default)]
    project_id: Option<ProjectID>,
}

impl Display for DatasetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)
    }
}

impl DatasetInfo {
    pub fn new(id: DatasetID, name: &str, project_id: ProjectID) -> Self {
        DatasetInfo {
            id,
            name: name.to_owned(),
            project_id: Some(project_id),
        }
    }

    pub fn id(&self) -> DatasetID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_id(&self) -> Option<ProjectID> {
        self.project_id
    }
}

/// Image information returned after an image is added to a dataset.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    id: ImageID,
    name: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    hash: Option<String>,
}

impl ImageInfo {
    pub fn new(id: ImageID, name: &str) -> Self {
        ImageInfo {
            id,
            name: name.to_owned(),
            width: None,
            height: None,
            hash: None,
        }
    }

    pub fn id(&self) -> ImageID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}

/// Entry of the team-files storage listing.
#[derive(Deserialize, Clone, Debug)]
pub struct FileInfo {
    name: String,
    path: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    meta: Option<FileMeta>,
}

#[derive(Deserialize, Clone, Debug, Default)]
struct FileMeta {
    #[serde(default)]
    size: Option<u64>,
}

impl FileInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }

    /// Size in bytes, zero when the listing did not report one.
    pub fn size(&self) -> u64 {
        self.meta.as_ref().and_then(|m| m.size).unwrap_or(0)
    }
}

/// One page of a paginated `*.list` response.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub pages_count: u32,
    pub entities: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parse_and_display() {
        let id: DatasetID = "42".parse().unwrap();
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(u64::from(id), 42);

        assert!(matches!(
            "ds-42".parse::<DatasetID>(),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_project_info_deserialize() {
        let json = r#"{
            "id": 917,
            "name": "StaVer",
            "description": "",
            "workspaceId": 12,
            "createdAt": "2023-05-17T10:01:02.000Z",
            "type": "images"
        }"#;
        let project: ProjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(project.id(), ProjectID::from(917));
        assert_eq!(project.name(), "StaVer");
        assert_eq!(project.workspace_id(), Some(WorkspaceID::from(12)));
        assert!(project.created_at().is_some());
        assert_eq!(project.to_string(), "[917] StaVer");
    }

    #[test]
    fn test_file_info_size() {
        let json = r#"[
            {"type": "file", "name": "stamver.zip", "path": "/data/stamver.zip", "meta": {"size": 1024}},
            {"type": "folder", "name": "nested", "path": "/data/nested/"}
        ]"#;
        let files: Vec<FileInfo> = serde_json::from_str(json).unwrap();
        assert!(files[0].is_file());
        assert_eq!(files[0].size(), 1024);
        assert!(!files[1].is_file());
        assert_eq!(files[1].size(), 0);
    }

    #[test]
    fn test_page_deserialize() {
        let json = r#"{"total": 1, "perPage": 500, "pagesCount": 1,
            "entities": [{"id": 3, "name": "ds", "projectId": 917}]}"#;
        let page: Page<DatasetInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(page.pages_count, 1);
        assert_eq!(page.entities[0].name(), "ds");
        assert_eq!(page.entities[0].project_id(), Some(ProjectID::from(917)));
    }
}
