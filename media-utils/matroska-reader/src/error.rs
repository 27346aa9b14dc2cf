// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is terminal: the whole parse is abandoned.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("first element is not the EBML master element (found ID {found:#x})")]
    NotEbml { found: u64 },
    #[error("root element is not a segment element (found ID {found:#x})")]
    NoSegment { found: u64 },
    #[error("malformed variable size integer at offset {offset}")]
    MalformedVarInt { offset: usize },
    #[error("out of data at offset {offset}: needed {needed} octets, {remaining} remaining")]
    OutOfData {
        offset: usize,
        needed: u64,
        remaining: usize,
    },
    #[error("not enough data to read {what} at offset {offset}")]
    NotEnoughData { what: &'static str, offset: usize },
    #[error("truncated SimpleBlock at offset {offset}")]
    TruncatedBlock { offset: usize },
    #[error("{element} declared {declared} octets of data but {consumed} were consumed")]
    MalformedDocument {
        element: &'static str,
        declared: u64,
        consumed: u64,
    },
    #[error("{element} may not have an unknown size")]
    UnknownSizeNotAllowed { element: &'static str },
    #[error("Xiph lacing is not supported")]
    UnsupportedLacing,
    #[error("{total} octets of fixed-size laced data do not divide into {frame_count} frames")]
    UnevenFixedLacing { total: u64, frame_count: u64 },
    #[error("invalid lacing: {reason}")]
    InvalidLacing { reason: &'static str },
    #[error("unsigned integer element of {length} octets does not fit in 64 bits")]
    IntegerTooLarge { length: u64 },
    #[error("float element has invalid size {length}")]
    InvalidFloatSize { length: u64 },
    #[error("date element has invalid size {length}")]
    InvalidDateSize { length: u64 },
    #[error("date element is out of range")]
    DateOutOfRange,
    #[error("string element is not valid UTF-8: {source}")]
    InvalidUtf8 {
        #[from]
        source: std::string::FromUtf8Error,
    },
    #[error("config parse error: {source}")]
    Config {
        #[from]
        source: toml::de::Error,
    },
}
