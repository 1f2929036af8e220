// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Project schema: object classes, tag metas, and the fixed StaVer schema.
//!
//! The schema is an immutable value built once per run and handed by
//! reference to everything that creates tags or labels. Tags are only ever
//! created through [`TagMeta::tag`], which checks the value against the meta's
//! domain, so an annotation can never carry a value the project meta would
//! reject.

use crate::Error;
use serde::{Serialize, Serializer};

/// Name of the single object class.
pub const STAMP_CLASS: &str = "stamp";
/// Tag recording whether a signature is present on the scan.
pub const SIGNATURE_TAG: &str = "signature";
/// Tag recording whether a stamp overlaps printed text.
pub const OVERLAP_TAG: &str = "overlap_with_printed_text";
/// Tag recording the number of stamps on the scan.
pub const NUMBER_OF_STAMPS_TAG: &str = "number_of_stamps";

/// Geometry stored by an object class.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    Bitmap,
}

/// A named, geometry-typed object category.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjClass {
    #[serde(rename = "title")]
    name: String,
    #[serde(rename = "shape")]
    geometry: GeometryType,
    color: String,
    geometry_config: serde_json::Map<String, serde_json::Value>,
}

impl ObjClass {
    pub fn new(name: &str, geometry: GeometryType, color: &str) -> Self {
        ObjClass {
            name: name.to_owned(),
            geometry,
            color: color.to_owned(),
            geometry_config: serde_json::Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Value domain of a tag meta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagValueType {
    /// Any numeric value.
    AnyNumber,
    /// One of a fixed list of strings.
    OneOfString(Vec<String>),
}

impl TagValueType {
    fn as_str(&self) -> &'static str {
        match self {
            TagValueType::AnyNumber => "any_number",
            TagValueType::OneOfString(_) => "oneof_string",
        }
    }
}

/// A tag value as stored on an annotation.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Number(i64),
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_owned())
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Number(value)
    }
}

/// A named tag definition with an allowed value domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagMeta {
    name: String,
    value_type: TagValueType,
    color: String,
}

impl TagMeta {
    pub fn new(name: &str, value_type: TagValueType, color: &str) -> Self {
        TagMeta {
            name: name.to_owned(),
            value_type,
            color: color.to_owned(),
        }
    }

    /// Creates a tag of this meta, rejecting values outside its domain.
    pub fn tag(&self, value: impl Into<TagValue>) -> Result<Tag, Error> {
        let value = value.into();
        let valid = match (&self.value_type, &value) {
            (TagValueType::AnyNumber, TagValue::Number(_)) => true,
            (TagValueType::OneOfString(allowed), TagValue::Text(text)) => allowed.contains(text),
            _ => false,
        };

        if !valid {
            return Err(Error::InvalidTagValue(format!(
                "{:?} is not a valid value for tag '{}'",
                value, self.name
            )));
        }

        Ok(Tag {
            name: self.name.clone(),
            value,
        })
    }
}

impl Serialize for TagMeta {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Wire<'a> {
            name: &'a str,
            value_type: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            values: Option<&'a [String]>,
            color: &'a str,
            applicable_type: &'static str,
            classes: [&'a str; 0],
        }

        let values = match &self.value_type {
            TagValueType::OneOfString(values) => Some(values.as_slice()),
            _ => None,
        };

        Wire {
            name: &self.name,
            value_type: self.value_type.as_str(),
            values,
            color: &self.color,
            applicable_type: "all",
            classes: [],
        }
        .serialize(serializer)
    }
}

/// A tag attached to an image annotation.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Tag {
    name: String,
    value: TagValue,
}

impl Tag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }
}

/// Object classes and tag metas of a project, as uploaded to the platform.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProjectMeta {
    classes: Vec<ObjClass>,
    #[serde(rename = "tags")]
    tag_metas: Vec<TagMeta>,
    #[serde(rename = "projectType")]
    project_type: &'static str,
}

impl ProjectMeta {
    pub fn new(classes: Vec<ObjClass>, tag_metas: Vec<TagMeta>) -> Self {
        ProjectMeta {
            classes,
            tag_metas,
            project_type: "images",
        }
    }

    pub fn classes(&self) -> &[ObjClass] {
        &self.classes
    }

    pub fn tag_metas(&self) -> &[TagMeta] {
        &self.tag_metas
    }
}

/// The fixed StaVer schema: one `stamp` bitmap class and three tag metas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampSchema {
    pub stamp: ObjClass,
    pub signature: TagMeta,
    pub overlap: TagMeta,
    pub number_of_stamps: TagMeta,
}

impl Default for StampSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl StampSchema {
    pub fn new() -> Self {
        StampSchema {
            stamp: ObjClass::new(STAMP_CLASS, GeometryType::Bitmap, "#E24F3B"),
            signature: TagMeta::new(
                SIGNATURE_TAG,
                TagValueType::OneOfString(vec!["present".to_owned(), "not_present".to_owned()]),
                "#3B8DE2",
            ),
            overlap: TagMeta::new(
                OVERLAP_TAG,
                TagValueType::OneOfString(vec!["true".to_owned(), "false".to_owned()]),
                "#52C41A",
            ),
            number_of_stamps: TagMeta::new(NUMBER_OF_STAMPS_TAG, TagValueType::AnyNumber, "#FAAD14"),
        }
    }

    pub fn project_meta(&self) -> ProjectMeta {
        ProjectMeta::new(
            vec![self.stamp.clone()],
            vec![
                self.signature.clone(),
                self.overlap.clone(),
                self.number_of_stamps.clone(),
            ],
        )
    }
}
