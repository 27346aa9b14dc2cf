// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Read-only demuxing of Matroska (MKV) and WebM files.
//!
//! The whole input is parsed in one pass into a [MatroskaDocument] holding
//! the EBML header, segment information, tracks and clusters with their
//! decoded frames. Any structural problem aborts the parse with a single
//! [Error].
//!
//! ```no_run
//! # fn main() -> matroska_reader::Result<()> {
//! let doc = matroska_reader::parse_from_file("movie.mkv")?;
//! for (cluster, block) in doc.blocks() {
//!     println!("{:?} {}", doc.presentation_time(cluster, block), block.frames().len());
//! }
//! # Ok(())
//! # }
//! ```

pub use config::{parse_config_file, ReaderConfig, UnevenLacingPolicy};
pub use document::{
    AudioTrack, Block, Cluster, EbmlHeader, Lacing, MatroskaDocument, SegmentInformation,
    TrackEntry, TrackType, VideoTrack, DEFAULT_TIMESTAMP_SCALE,
};
pub use ebml_types::{ElementKind, Tag};
pub use error::{Error, Result};
pub use reader::MatroskaReader;
pub use streamer::ByteStreamer;

mod block;
mod config;
mod document;
mod ebml_types;
mod element;
mod error;
mod reader;
mod streamer;

/// Map a file into memory and parse it with the default configuration.
pub fn parse_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<MatroskaDocument> {
    parse_from_file_with_config(path, ReaderConfig::default())
}

pub fn parse_from_file_with_config<P: AsRef<std::path::Path>>(
    path: P,
    config: ReaderConfig,
) -> Result<MatroskaDocument> {
    let file = std::fs::File::open(path.as_ref())?;
    // SAFETY: the mapping is only read while this function runs and the
    // document copies out everything it keeps. Truncating the file
    // concurrently is not supported.
    let mapped = unsafe { memmap2::Mmap::map(&file)? };
    tracing::debug!(
        "mapped {} ({} octets)",
        path.as_ref().display(),
        mapped.len()
    );
    parse_from_buffer_with_config(&mapped, config)
}

/// Parse a document that is already resident in memory.
pub fn parse_from_buffer(data: &[u8]) -> Result<MatroskaDocument> {
    parse_from_buffer_with_config(data, ReaderConfig::default())
}

pub fn parse_from_buffer_with_config(
    data: &[u8],
    config: ReaderConfig,
) -> Result<MatroskaDocument> {
    MatroskaReader::new(data, config).parse()
}
