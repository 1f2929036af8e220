// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

/// Error type for every stage of the StaVer conversion pipeline.
///
/// Failures are fatal to the whole run: nothing in the pipeline retries or
/// recovers, so each variant carries enough context to explain the abort.
/// The one non-error case worth noting is a missing text annotation, which
/// produces an empty annotation instead of an error.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// HTTP request error from the reqwest client.
    HttpError(reqwest::Error),
    /// The platform answered with a non-success status and message.
    ApiError(u16, String),
    /// URL parsing error.
    UrlParseError(url::ParseError),
    /// Image decoding or encoding error.
    ImageError(image::ImageError),
    /// Image header could not be read to determine dimensions.
    ImageSizeError(imagesize::ImageError),
    /// ZIP archive could not be read or extracted.
    ZipError(zip::result::ZipError),
    /// Text annotation file is malformed.
    InvalidAnnotation(String),
    /// Tag value outside the domain allowed by its tag meta.
    InvalidTagValue(String),
    /// Server returned an invalid or unexpected response.
    InvalidResponse,
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
    /// Unsupported file or archive format.
    UnsupportedFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlParseError(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err)
    }
}

impl From<imagesize::ImageError> for Error {
    fn from(err: imagesize::ImageError) -> Self {
        Error::ImageSizeError(err)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::HttpError(e) => write!(f, "HTTP error: {}", e),
            Error::ApiError(status, msg) => write!(f, "API error {}: {}", status, msg),
            Error::UrlParseError(e) => write!(f, "URL parse error: {}", e),
            Error::ImageError(e) => write!(f, "Image error: {}", e),
            Error::ImageSizeError(e) => write!(f, "Image size error: {}", e),
            Error::ZipError(e) => write!(f, "ZIP error: {}", e),
            Error::InvalidAnnotation(s) => write!(f, "Invalid annotation: {}", s),
            Error::InvalidTagValue(s) => write!(f, "Invalid tag value: {}", s),
            Error::InvalidResponse => write!(f, "Invalid server response"),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
            Error::UnsupportedFormat(s) => write!(f, "Unsupported format: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::HttpError(e) => Some(e),
            Error::UrlParseError(e) => Some(e),
            Error::ImageError(e) => Some(e),
            Error::ImageSizeError(e) => Some(e),
            Error::ZipError(e) => Some(e),
            _ => None,
        }
    }
}
