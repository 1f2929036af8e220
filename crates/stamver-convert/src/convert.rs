// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-image annotation derivation from the StaVer sidecar files.
//!
//! ## Dataset layout
//!
//! Relative to the unpacked dataset root:
//!
//! - `stamver/scans/scans/<name>.<ext>`: scan images
//! - `stamver/ground-truth-maps/ground-truth-maps/<name>-gt.png`: stamp masks,
//!   where a first-channel value of 0 marks stamp ink
//! - `stamver/info/info/<name>.txt`: a header line followed by
//!   `<signature_absent>\t<has_overlap>\t<stamp_count>`
//!
//! ## Stamp regions
//!
//! The binarized mask is split into 8-connected components, with the
//! background counted as one of them. Sparse masks (fewer than
//! [`MAX_SEPARABLE_COMPONENTS`] components, so at most three stamps on a
//! background) yield one label per stamp component of at least
//! [`MIN_COMPONENT_AREA`] pixels. Dense masks are not
//! reliably separable into individual stamps and yield a single label
//! covering the whole mask.

use crate::{Annotation, Bitmap, Error, ImageSize, Label, StampSchema, Tag};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use log::debug;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Component count, background included, from which a mask is labelled as a
/// whole.
pub const MAX_SEPARABLE_COMPONENTS: usize = 5;
/// Minimum pixel area of a component kept as its own label.
pub const MIN_COMPONENT_AREA: usize = 10;

const MASK_SUFFIX: &str = "-gt.png";
const INFO_EXTENSION: &str = "txt";

/// Locations of the scans, masks, and info files of an unpacked dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLayout {
    images: PathBuf,
    masks: PathBuf,
    info: PathBuf,
}

impl DatasetLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let stamver = root.as_ref().join("stamver");
        DatasetLayout {
            images: stamver.join("scans").join("scans"),
            masks: stamver
                .join("ground-truth-maps")
                .join("ground-truth-maps"),
            info: stamver.join("info").join("info"),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images
    }

    pub fn masks_dir(&self) -> &Path {
        &self.masks
    }

    pub fn info_dir(&self) -> &Path {
        &self.info
    }

    /// Mask paired with the image named `name` (file name without extension).
    pub fn mask_path(&self, name: &str) -> PathBuf {
        self.masks.join(format!("{}{}", name, MASK_SUFFIX))
    }

    /// Text annotation paired with the image named `name`.
    pub fn info_path(&self, name: &str) -> PathBuf {
        self.info.join(format!("{}.{}", name, INFO_EXTENSION))
    }

    /// File names of the scan images, sorted.
    ///
    /// Only regular files with an image extension are listed; anything else
    /// in the scans directory is skipped.
    pub fn image_names(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(&self.images)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(is_valid_image_extension);
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                debug!("Skipping file with a non UTF-8 name {}", path.display());
                continue;
            };

            if is_image {
                names.push(name.to_owned());
            } else {
                debug!("Skipping non-image file {}", path.display());
            }
        }

        names.sort();
        Ok(names)
    }
}

fn is_valid_image_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    matches!(
        ext_lower.as_str(),
        "jpg" | "jpeg" | "png" | "bmp" | "tiff" | "tif" | "webp"
    )
}

/// The record of a StaVer text annotation file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StampInfo {
    pub signature_present: bool,
    pub overlaps_text: bool,
    pub stamp_count: i64,
}

impl FromStr for StampInfo {
    type Err = Error;

    /// Parses the whole file content; the first line is a header.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let line = content
            .lines()
            .nth(1)
            .ok_or_else(|| Error::InvalidAnnotation("missing data line".to_owned()))?;

        let fields: Vec<&str> = line.trim_end().split('\t').map(str::trim).collect();
        let [signature_absent, overlap, count] = fields.as_slice() else {
            return Err(Error::InvalidAnnotation(format!(
                "expected 3 tab-separated fields, found {} in {:?}",
                fields.len(),
                line
            )));
        };

        let stamp_count = count.parse::<i64>().map_err(|e| {
            Error::InvalidAnnotation(format!("invalid stamp count {:?}: {}", count, e))
        })?;

        Ok(StampInfo {
            signature_present: *signature_absent != "1",
            overlaps_text: *overlap != "0",
            stamp_count,
        })
    }
}

impl StampInfo {
    /// Reads and parses a text annotation file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        std::fs::read_to_string(path)?
            .parse()
            .map_err(|err| match err {
                Error::InvalidAnnotation(msg) => {
                    Error::InvalidAnnotation(format!("{}: {}", path.display(), msg))
                }
                err => err,
            })
    }

    /// Image tags for this record, in schema order.
    pub fn tags(&self, schema: &StampSchema) -> Result<Vec<Tag>, Error> {
        let signature = if self.signature_present {
            "present"
        } else {
            "not_present"
        };
        let overlap = if self.overlaps_text { "true" } else { "false" };

        Ok(vec![
            schema.signature.tag(signature)?,
            schema.overlap.tag(overlap)?,
            schema.number_of_stamps.tag(self.stamp_count)?,
        ])
    }
}

/// Binarizes a ground-truth mask: 255 where the first channel is 0.
pub fn stamp_mask(mask: &DynamicImage) -> GrayImage {
    let rgb = mask.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        if rgb.get_pixel(x, y).0[0] == 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Splits a binarized stamp mask into bitmap regions.
pub fn stamp_regions(stamp: &GrayImage) -> Vec<Bitmap> {
    let components = connected_components(stamp, Connectivity::Eight, Luma([0u8]));

    let mut regions: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (x, y, label) in components.enumerate_pixels() {
        if label.0[0] != 0 {
            regions.entry(label.0[0]).or_default().push((x, y));
        }
    }

    let has_background = stamp.pixels().any(|p| p.0[0] == 0);
    let count = regions.len() + usize::from(has_background);

    if count < MAX_SEPARABLE_COMPONENTS {
        let bitmaps: Vec<Bitmap> = regions
            .values()
            .filter_map(|points| Bitmap::from_points(points))
            .filter(|bitmap| bitmap.area() >= MIN_COMPONENT_AREA)
            .collect();
        debug!(
            "{} components, {} kept as separate stamps",
            count,
            bitmaps.len()
        );
        bitmaps
    } else {
        debug!("{} components, labelling mask as a whole", count);
        Bitmap::from_mask(stamp).into_iter().collect()
    }
}

/// Converts decoded header dimensions, rejecting ones that do not fit the
/// annotation format.
fn image_size(path: &Path, width: usize, height: usize) -> Result<ImageSize, Error> {
    let dim = |value: usize, what: &str| {
        u32::try_from(value).map_err(|_| {
            Error::InvalidParameters(format!(
                "{}: image {} {} is out of range",
                path.display(),
                what,
                value
            ))
        })
    };
    Ok(ImageSize {
        height: dim(height, "height")?,
        width: dim(width, "width")?,
    })
}

/// Derives the annotation of one scan image.
///
/// An image without a text annotation file gets an empty annotation. When
/// the text file exists, its paired mask must exist and be readable.
pub fn create_annotation(
    schema: &StampSchema,
    layout: &DatasetLayout,
    image_path: &Path,
) -> Result<Annotation, Error> {
    let dims = imagesize::size(image_path)?;
    let size = image_size(image_path, dims.width, dims.height)?;

    let name = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            Error::InvalidParameters(format!("Invalid image path: {}", image_path.display()))
        })?;

    let info_path = layout.info_path(name);
    if !info_path.is_file() {
        debug!("No annotation for {}", name);
        return Ok(Annotation::empty(size));
    }

    let tags = StampInfo::read(&info_path)?.tags(schema)?;

    let mask = image::open(layout.mask_path(name))?;
    let labels = stamp_regions(&stamp_mask(&mask))
        .into_iter()
        .map(|bitmap| Label::new(&schema.stamp, bitmap))
        .collect();

    Ok(Annotation::new(size, labels, tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TagValue;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Paints a `w`x`h` block of stamp pixels into a binarized mask.
    fn fill(mask: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                mask.put_pixel(xx, yy, Luma([255]));
            }
        }
    }

    fn write_fixture(root: &Path, name: &str, info: Option<&str>, mask: Option<&GrayImage>) {
        let layout = DatasetLayout::new(root);
        std::fs::create_dir_all(layout.images_dir()).unwrap();
        std::fs::create_dir_all(layout.masks_dir()).unwrap();
        std::fs::create_dir_all(layout.info_dir()).unwrap();

        RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]))
            .save(layout.images_dir().join(format!("{}.png", name)))
            .unwrap();

        if let Some(info) = info {
            std::fs::write(layout.info_path(name), info).unwrap();
        }

        if let Some(stamp) = mask {
            // Ground truth stores ink as 0 on a white page.
            let gt = GrayImage::from_fn(stamp.width(), stamp.height(), |x, y| {
                if stamp.get_pixel(x, y).0[0] != 0 {
                    Luma([0])
                } else {
                    Luma([255])
                }
            });
            gt.save(layout.mask_path(name)).unwrap();
        }
    }

    #[test]
    fn test_parse_signature_present_no_overlap() {
        let info: StampInfo = "signature\toverlap\tstamps\n0\t0\t3".parse().unwrap();
        let tags = info.tags(&StampSchema::new()).unwrap();

        assert_eq!(tags[0].name(), "signature");
        assert_eq!(tags[0].value(), &TagValue::Text("present".to_owned()));
        assert_eq!(tags[1].name(), "overlap_with_printed_text");
        assert_eq!(tags[1].value(), &TagValue::Text("false".to_owned()));
        assert_eq!(tags[2].name(), "number_of_stamps");
        assert_eq!(tags[2].value(), &TagValue::Number(3));
    }

    #[test]
    fn test_parse_signature_absent_with_overlap() {
        let info: StampInfo = "header\n1\t1\t0\n".parse().unwrap();
        let tags = info.tags(&StampSchema::new()).unwrap();

        assert_eq!(tags[0].value(), &TagValue::Text("not_present".to_owned()));
        assert_eq!(tags[1].value(), &TagValue::Text("true".to_owned()));
        assert_eq!(tags[2].value(), &TagValue::Number(0));
    }

    #[test]
    fn test_parse_nonzero_overlap_and_crlf() {
        let info: StampInfo = "header\r\n0\t2\t1\r\n".parse().unwrap();
        assert!(info.signature_present);
        assert!(info.overlaps_text);
        assert_eq!(info.stamp_count, 1);
    }

    #[test]
    fn test_parse_malformed() {
        for content in ["header only", "header\n0\t0", "header\n0\t0\tmany", ""] {
            assert!(
                matches!(content.parse::<StampInfo>(), Err(Error::InvalidAnnotation(_))),
                "{:?} should be rejected",
                content
            );
        }
    }

    #[test]
    fn test_stamp_mask_binarizes_first_channel() {
        let mut gt = RgbImage::from_pixel(3, 1, Rgb([255, 255, 255]));
        gt.put_pixel(0, 0, Rgb([0, 0, 0]));
        gt.put_pixel(1, 0, Rgb([0, 200, 200]));
        gt.put_pixel(2, 0, Rgb([10, 0, 0]));

        let stamp = stamp_mask(&DynamicImage::ImageRgb8(gt));
        assert_eq!(stamp.get_pixel(0, 0).0[0], 255);
        assert_eq!(stamp.get_pixel(1, 0).0[0], 255);
        assert_eq!(stamp.get_pixel(2, 0).0[0], 0);
    }

    #[test]
    fn test_sparse_mask_one_label_per_component() {
        let mut stamp = GrayImage::new(60, 20);
        fill(&mut stamp, 0, 0, 5, 5);
        fill(&mut stamp, 20, 0, 4, 4);
        fill(&mut stamp, 40, 10, 10, 10);

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions.iter().map(Bitmap::area).sum::<usize>(), 25 + 16 + 100);
    }

    #[test]
    fn test_sparse_mask_drops_small_components() {
        let mut stamp = GrayImage::new(40, 10);
        fill(&mut stamp, 0, 0, 5, 2); // exactly 10 px, kept
        fill(&mut stamp, 10, 0, 3, 3); // 9 px, dropped
        fill(&mut stamp, 20, 0, 1, 1); // 1 px, dropped

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 10);
        assert_eq!(regions[0].origin(), (0, 0));
    }

    #[test]
    fn test_diagonal_pixels_are_one_component() {
        let mut stamp = GrayImage::new(12, 12);
        for i in 0..12 {
            stamp.put_pixel(i, i, Luma([255]));
        }

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 12);
    }

    #[test]
    fn test_dense_mask_single_label() {
        let mut stamp = GrayImage::new(100, 10);
        for i in 0..5 {
            fill(&mut stamp, i * 20, 0, 3, 3);
        }
        // A speck below the area threshold still belongs to the whole mask.
        stamp.put_pixel(99, 9, Luma([255]));

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 5 * 9 + 1);
        assert_eq!(regions[0].origin(), (0, 0));
        assert_eq!((regions[0].width(), regions[0].height()), (100, 10));
    }

    #[test]
    fn test_four_stamps_labelled_as_whole() {
        // Four stamps plus the background make five components.
        let mut stamp = GrayImage::new(80, 10);
        for i in 0..4 {
            fill(&mut stamp, i * 20, 0, 5, 5);
        }

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 4 * 25);
        assert_eq!((regions[0].width(), regions[0].height()), (65, 5));
    }

    #[test]
    fn test_three_stamps_labelled_separately() {
        let mut stamp = GrayImage::new(80, 10);
        for i in 0..3 {
            fill(&mut stamp, i * 20, 0, 5, 5);
        }

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 3);
        assert_eq!(
            regions.iter().map(Bitmap::origin).collect::<Vec<_>>(),
            vec![(0, 0), (20, 0), (40, 0)]
        );
    }

    #[test]
    fn test_full_mask_has_no_background() {
        let mut stamp = GrayImage::new(6, 4);
        fill(&mut stamp, 0, 0, 6, 4);

        let regions = stamp_regions(&stamp);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 24);
    }

    #[test]
    fn test_empty_mask_no_labels() {
        assert!(stamp_regions(&GrayImage::new(8, 8)).is_empty());
    }

    #[test]
    fn test_create_annotation_without_info_file() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), "scan-001", None, None);
        let layout = DatasetLayout::new(dir.path());

        let annotation = create_annotation(
            &StampSchema::new(),
            &layout,
            &layout.images_dir().join("scan-001.png"),
        )
        .unwrap();

        assert!(annotation.is_empty());
        assert_eq!(
            annotation.size(),
            ImageSize {
                height: 48,
                width: 64
            }
        );
    }

    #[test]
    fn test_create_annotation_with_mask() {
        let dir = TempDir::new().unwrap();
        let mut stamp = GrayImage::new(64, 48);
        fill(&mut stamp, 2, 2, 10, 10);
        fill(&mut stamp, 30, 20, 8, 6);
        write_fixture(dir.path(), "scan-002", Some("h\n0\t1\t2\n"), Some(&stamp));
        let layout = DatasetLayout::new(dir.path());

        let annotation = create_annotation(
            &StampSchema::new(),
            &layout,
            &layout.images_dir().join("scan-002.png"),
        )
        .unwrap();

        assert_eq!(annotation.tags().len(), 3);
        assert_eq!(annotation.labels().len(), 2);
        assert!(annotation.labels().iter().all(|l| l.class_name() == "stamp"));
        assert_eq!(annotation.labels()[0].bitmap().origin(), (2, 2));
        assert_eq!(annotation.labels()[1].bitmap().origin(), (30, 20));
    }

    #[test]
    fn test_create_annotation_missing_mask_fails() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), "scan-003", Some("h\n0\t0\t1\n"), None);
        let layout = DatasetLayout::new(dir.path());

        let result = create_annotation(
            &StampSchema::new(),
            &layout,
            &layout.images_dir().join("scan-003.png"),
        );
        assert!(matches!(result, Err(Error::ImageError(_))));
    }

    #[test]
    fn test_create_annotation_malformed_info_fails() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), "scan-004", Some("h\n0\t0\n"), None);
        let layout = DatasetLayout::new(dir.path());

        let result = create_annotation(
            &StampSchema::new(),
            &layout,
            &layout.images_dir().join("scan-004.png"),
        );
        match result {
            Err(Error::InvalidAnnotation(msg)) => assert!(msg.contains("scan-004.txt")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_image_names_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), "b", None, None);
        write_fixture(dir.path(), "a", None, None);
        let layout = DatasetLayout::new(dir.path());
        std::fs::write(layout.images_dir().join("README.txt"), "notes").unwrap();
        std::fs::create_dir(layout.images_dir().join("nested.png")).unwrap();

        assert_eq!(layout.image_names().unwrap(), vec!["a.png", "b.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_image_names_skips_non_utf8_names() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt as _};

        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), "a", None, None);
        let layout = DatasetLayout::new(dir.path());
        let name = OsStr::from_bytes(b"scan-\xff.png");
        std::fs::write(layout.images_dir().join(name), "png").unwrap();

        assert_eq!(layout.image_names().unwrap(), vec!["a.png"]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_image_size_out_of_range() {
        let path = Path::new("huge.png");
        assert_eq!(
            image_size(path, 64, 48).unwrap(),
            ImageSize {
                height: 48,
                width: 64
            }
        );
        assert!(matches!(
            image_size(path, usize::MAX, 48),
            Err(Error::InvalidParameters(msg)) if msg.contains("width")
        ));
        assert!(matches!(
            image_size(path, 64, u32::MAX as usize + 1),
            Err(Error::InvalidParameters(msg)) if msg.contains("height")
        ));
    }

    #[test]
    fn test_layout_paths() {
        let layout = DatasetLayout::new("/data");
        assert_eq!(
            layout.mask_path("x"),
            PathBuf::from("/data/stamver/ground-truth-maps/ground-truth-maps/x-gt.png")
        );
        assert_eq!(
            layout.info_path("x"),
            PathBuf::from("/data/stamver/info/info/x.txt")
        );
        assert_eq!(
            layout.images_dir(),
            Path::new("/data/stamver/scans/scans")
        );
    }
}
