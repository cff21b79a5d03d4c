//! Lossy-aware codec between DICOM datasets and an XML document form.
//!
//! [`encoder`] turns a [`Dataset`] into a [`Document`]; [`decoder`] rebuilds a
//! dataset from document text, collecting element-level [`Warning`]s instead
//! of failing. [`parser`] and [`writer`] move datasets in and out of DICOM
//! Part 10 files.

pub mod charset;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod dictionary;
pub mod document;
pub mod encoder;
pub mod error;
pub mod image;
pub mod model;
pub mod observability;
pub mod parser;
pub mod redact;
pub mod validator;
pub mod writer;

pub use decoder::{decode, decode_with, DecodeOptions, Decoded};
pub use document::{Document, ElementRecord};
pub use encoder::{encode, encode_with, EncodeOptions};
pub use error::{CodecError, Result, ValueDecodeError, Warning};
pub use model::{DataElement, Dataset, DicomValue, TagId, TransferSyntax, Vr, VrFamily};
