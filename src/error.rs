//! Error and warning types.
//!
//! Only [`CodecError`] aborts an operation. Element-level problems found while
//! decoding a document are collected as [`Warning`]s and returned next to the
//! reconstructed dataset.

use std::io;

use thiserror::Error;

use crate::model::{TagId, Vr};

#[derive(Debug, Error)]
pub enum CodecError {
    /// The document markup cannot be parsed at all.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Malformed tag id: {0:?}")]
    MalformedTagId(String),

    /// The binary DICOM stream is truncated or structurally invalid.
    #[error("Malformed DICOM stream: {0}")]
    MalformedBinary(String),

    #[error("Unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Missing element {name} {tag}")]
    MissingElement { tag: TagId, name: &'static str },

    #[error("Invalid value for {tag} ({vr}): {reason}")]
    InvalidValue { tag: TagId, vr: Vr, reason: String },

    #[error("Unknown tag keyword: {0}")]
    UnknownKeyword(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Date formatting error: {0}")]
    Time(#[from] time::error::Format),
}

impl CodecError {
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self::MalformedDocument(message.into())
    }

    pub fn malformed_binary(message: impl Into<String>) -> Self {
        Self::MalformedBinary(message.into())
    }

    pub fn invalid_value(tag: TagId, vr: Vr, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            tag,
            vr,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// A value whose text does not parse for its VR family.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode {vr} value {text:?}: {reason}")]
pub struct ValueDecodeError {
    pub vr: Vr,
    pub text: String,
    pub reason: String,
}

/// A non-fatal condition raised while decoding a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// The element was dropped.
    #[error("element #{position}: malformed tag id {text:?}, element skipped")]
    MalformedTagId { position: usize, text: String },

    /// The element was dropped.
    #[error("element {tag}: unknown VR {vr:?}, element skipped")]
    UnknownVr { tag: TagId, vr: String },

    /// The element was kept with an empty value.
    #[error("element {tag}: {source}")]
    ValueDecode {
        tag: TagId,
        #[source]
        source: ValueDecodeError,
    },

    #[error("element {tag}: duplicate tag, later value overwrites the earlier one")]
    DuplicateTag { tag: TagId },

    #[error("missing required tag {name} {tag}")]
    MissingRequiredTag { tag: TagId, name: &'static str },
}
