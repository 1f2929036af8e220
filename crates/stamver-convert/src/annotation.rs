// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{Error, ObjClass, Tag};
use base64::Engine as _;
use flate2::{Compression, write::ZlibEncoder};
use image::{ExtendedColorType, GrayImage, ImageEncoder as _, codecs::png::PngEncoder};
use serde::{Serialize, Serializer, ser::Error as _};
use std::io::Write as _;

/// A boolean pixel mask cropped to its bounding box.
///
/// The origin is the top-left corner of the bounding box in image
/// coordinates. On the wire the mask is a single-channel PNG (255 for set
/// pixels), zlib-compressed and base64-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    origin: (u32, u32),
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Bitmap {
    /// Builds a bitmap from the pixel coordinates of its set pixels.
    ///
    /// Returns `None` when there are no points.
    pub fn from_points(points: &[(u32, u32)]) -> Option<Self> {
        let left = points.iter().map(|&(x, _)| x).min()?;
        let top = points.iter().map(|&(_, y)| y).min()?;
        let right = points.iter().map(|&(x, _)| x).max()?;
        let bottom = points.iter().map(|&(_, y)| y).max()?;

        let width = right - left + 1;
        let height = bottom - top + 1;
        let mut data = vec![false; (width * height) as usize];
        for &(x, y) in points {
            data[((y - top) * width + (x - left)) as usize] = true;
        }

        Some(Bitmap {
            origin: (left, top),
            width,
            height,
            data,
        })
    }

    /// Builds a bitmap from every non-zero pixel of `mask`.
    pub fn from_mask(mask: &GrayImage) -> Option<Self> {
        let points: Vec<(u32, u32)> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] != 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        Self::from_points(&points)
    }

    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of set pixels.
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&set| set).count()
    }

    /// Whether the pixel at image coordinates `(x, y)` is set.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (left, top) = self.origin;
        if x < left || y < top || x >= left + self.width || y >= top + self.height {
            return false;
        }
        self.data[((y - top) * self.width + (x - left)) as usize]
    }

    /// Encodes the cropped mask as a single-channel PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, Error> {
        let pixels: Vec<u8> = self
            .data
            .iter()
            .map(|&set| if set { 255 } else { 0 })
            .collect();

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            &pixels,
            self.width,
            self.height,
            ExtendedColorType::L8,
        )?;
        Ok(png)
    }

    /// Encodes the mask in the platform's bitmap wire format.
    pub fn to_base64(&self) -> Result<String, Error> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.to_png()?)?;
        let compressed = encoder.finish()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
    }
}

impl Serialize for Bitmap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Wire {
            data: String,
            origin: [u32; 2],
        }

        let data = self.to_base64().map_err(S::Error::custom)?;
        Wire {
            data,
            origin: [self.origin.0, self.origin.1],
        }
        .serialize(serializer)
    }
}

/// A bitmap region tied to an object class.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    class_name: String,
    bitmap: Bitmap,
}

impl Label {
    pub fn new(class: &ObjClass, bitmap: Bitmap) -> Self {
        Label {
            class_name: class.name().to_owned(),
            bitmap,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

impl Serialize for Label {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            class_title: &'a str,
            description: &'a str,
            tags: [&'a str; 0],
            geometry_type: &'a str,
            bitmap: &'a Bitmap,
        }

        Wire {
            class_title: &self.class_name,
            description: "",
            tags: [],
            geometry_type: "bitmap",
            bitmap: &self.bitmap,
        }
        .serialize(serializer)
    }
}

/// Image size as stored on an annotation.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
}

/// Labels and tags of one image.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Annotation {
    description: String,
    size: ImageSize,
    tags: Vec<Tag>,
    #[serde(rename = "objects")]
    labels: Vec<Label>,
}

impl Annotation {
    pub fn new(size: ImageSize, labels: Vec<Label>, tags: Vec<Tag>) -> Self {
        Annotation {
            description: String::new(),
            size,
            tags,
            labels,
        }
    }

    /// An annotation without labels or tags.
    pub fn empty(size: ImageSize) -> Self {
        Self::new(size, Vec::new(), Vec::new())
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.tags.is_empty()
    }
}
