//! Songmark fingerprint file format library

pub mod json_format;

pub use json_format::{
    FpEncoding, FpError, FpJsonFile, FpJsonMetadata, FpJsonRecord, ALGORITHM_ID, FORMAT_VERSION,
};
