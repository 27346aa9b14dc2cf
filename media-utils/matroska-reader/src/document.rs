// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::BTreeMap;

/// Nanoseconds per tick when the segment does not specify a scale.
pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbmlHeader {
    pub(crate) doc_type: String,
    pub(crate) doc_type_version: u64,
    pub(crate) doc_type_read_version: u64,
    pub(crate) version: u64,
    pub(crate) read_version: u64,
    pub(crate) max_id_length: u64,
    pub(crate) max_size_length: u64,
}

impl Default for EbmlHeader {
    fn default() -> Self {
        Self {
            doc_type: "matroska".to_string(),
            doc_type_version: 1,
            doc_type_read_version: 1,
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
        }
    }
}

impl EbmlHeader {
    /// e.g. "matroska" or "webm"
    #[inline]
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }
    #[inline]
    pub fn doc_type_version(&self) -> u64 {
        self.doc_type_version
    }
    #[inline]
    pub fn doc_type_read_version(&self) -> u64 {
        self.doc_type_read_version
    }
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }
    #[inline]
    pub fn read_version(&self) -> u64 {
        self.read_version
    }
    #[inline]
    pub fn max_id_length(&self) -> u64 {
        self.max_id_length
    }
    #[inline]
    pub fn max_size_length(&self) -> u64 {
        self.max_size_length
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentInformation {
    pub(crate) timestamp_scale: Option<u64>,
    pub(crate) muxing_app: String,
    pub(crate) writing_app: String,
    pub(crate) duration: Option<f64>,
    pub(crate) date_utc: Option<chrono::DateTime<chrono::Utc>>,
    pub(crate) title: Option<String>,
}

impl SegmentInformation {
    /// Nanoseconds per tick, if the file specifies it.
    #[inline]
    pub fn timestamp_scale(&self) -> Option<u64> {
        self.timestamp_scale
    }
    #[inline]
    pub fn timestamp_scale_or_default(&self) -> u64 {
        self.timestamp_scale.unwrap_or(DEFAULT_TIMESTAMP_SCALE)
    }
    #[inline]
    pub fn muxing_app(&self) -> &str {
        &self.muxing_app
    }
    #[inline]
    pub fn writing_app(&self) -> &str {
        &self.writing_app
    }
    /// Duration of the segment in ticks.
    #[inline]
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }
    #[inline]
    pub fn date_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.date_utc
    }
    #[inline]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
    Complex,
    Logo,
    Subtitle,
    Buttons,
    Control,
    Metadata,
    Other(u64),
}

impl From<u64> for TrackType {
    fn from(value: u64) -> Self {
        use TrackType::*;
        match value {
            0x01 => Video,
            0x02 => Audio,
            0x03 => Complex,
            0x10 => Logo,
            0x11 => Subtitle,
            0x12 => Buttons,
            0x20 => Control,
            0x21 => Metadata,
            other => Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoTrack {
    pub pixel_width: u64,
    pub pixel_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioTrack {
    pub channels: u64,
    pub bit_depth: u64,
    pub sampling_frequency: f64,
}

impl Default for AudioTrack {
    fn default() -> Self {
        Self {
            channels: 1,
            bit_depth: 0,
            sampling_frequency: 8000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub(crate) track_number: u64,
    pub(crate) track_uid: u64,
    pub(crate) track_type: TrackType,
    pub(crate) name: Option<String>,
    pub(crate) language: String,
    pub(crate) codec_id: String,
    pub(crate) codec_private: Option<Vec<u8>>,
    pub(crate) flag_default: bool,
    pub(crate) default_duration: Option<u64>,
    pub(crate) video_track: Option<VideoTrack>,
    pub(crate) audio_track: Option<AudioTrack>,
}

impl Default for TrackEntry {
    fn default() -> Self {
        Self {
            track_number: 0,
            track_uid: 0,
            track_type: TrackType::Other(0),
            name: None,
            language: "eng".to_string(),
            codec_id: String::new(),
            codec_private: None,
            flag_default: true,
            default_duration: None,
            video_track: None,
            audio_track: None,
        }
    }
}

impl TrackEntry {
    #[inline]
    pub fn track_number(&self) -> u64 {
        self.track_number
    }
    #[inline]
    pub fn track_uid(&self) -> u64 {
        self.track_uid
    }
    #[inline]
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    #[inline]
    pub fn language(&self) -> &str {
        &self.language
    }
    #[inline]
    pub fn codec_id(&self) -> &str {
        &self.codec_id
    }
    #[inline]
    pub fn codec_private(&self) -> Option<&[u8]> {
        self.codec_private.as_deref()
    }
    #[inline]
    pub fn flag_default(&self) -> bool {
        self.flag_default
    }
    /// Nanoseconds per frame, if the track declares it.
    #[inline]
    pub fn default_duration(&self) -> Option<u64> {
        self.default_duration
    }
    #[inline]
    pub fn video_track(&self) -> Option<&VideoTrack> {
        self.video_track.as_ref()
    }
    #[inline]
    pub fn audio_track(&self) -> Option<&AudioTrack> {
        self.audio_track.as_ref()
    }
}

/// Lacing mode, from bits 1 and 2 of the SimpleBlock flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lacing {
    None,
    Xiph,
    FixedSize,
    Ebml,
}

impl Lacing {
    pub(crate) fn from_flags(flags: u8) -> Self {
        match (flags & 0b110) >> 1 {
            0 => Lacing::None,
            1 => Lacing::Xiph,
            2 => Lacing::FixedSize,
            _ => Lacing::Ebml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub(crate) track_number: u64,
    pub(crate) timestamp: i16,
    pub(crate) only_keyframes: bool,
    pub(crate) invisible: bool,
    pub(crate) discardable: bool,
    pub(crate) lacing: Lacing,
    pub(crate) frames: Vec<Vec<u8>>,
}

impl Block {
    /// Not checked against the tracks of the document.
    #[inline]
    pub fn track_number(&self) -> u64 {
        self.track_number
    }
    /// Ticks relative to the enclosing cluster's timestamp.
    #[inline]
    pub fn timestamp(&self) -> i16 {
        self.timestamp
    }
    #[inline]
    pub fn only_keyframes(&self) -> bool {
        self.only_keyframes
    }
    #[inline]
    pub fn invisible(&self) -> bool {
        self.invisible
    }
    #[inline]
    pub fn discardable(&self) -> bool {
        self.discardable
    }
    #[inline]
    pub fn lacing(&self) -> Lacing {
        self.lacing
    }
    /// Frames in the order they were laced.
    #[inline]
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cluster {
    pub(crate) timestamp: u64,
    pub(crate) blocks: Vec<Block>,
}

impl Cluster {
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
    /// Blocks in file order.
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

/// A fully parsed Matroska file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatroskaDocument {
    pub(crate) header: EbmlHeader,
    pub(crate) segment_information: Option<SegmentInformation>,
    pub(crate) tracks: BTreeMap<u64, TrackEntry>,
    pub(crate) clusters: Vec<Cluster>,
}

impl MatroskaDocument {
    pub(crate) fn new(header: EbmlHeader) -> Self {
        Self {
            header,
            segment_information: None,
            tracks: BTreeMap::new(),
            clusters: Vec::new(),
        }
    }

    #[inline]
    pub fn header(&self) -> &EbmlHeader {
        &self.header
    }
    #[inline]
    pub fn segment_information(&self) -> Option<&SegmentInformation> {
        self.segment_information.as_ref()
    }
    #[inline]
    pub fn tracks(&self) -> &BTreeMap<u64, TrackEntry> {
        &self.tracks
    }
    #[inline]
    pub fn track(&self, track_number: u64) -> Option<&TrackEntry> {
        self.tracks.get(&track_number)
    }
    #[inline]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// All blocks in file order, each with its cluster.
    pub fn blocks(&self) -> impl Iterator<Item = (&Cluster, &Block)> {
        self.clusters
            .iter()
            .flat_map(|cluster| cluster.blocks.iter().map(move |block| (cluster, block)))
    }

    fn timestamp_scale(&self) -> u64 {
        self.segment_information
            .as_ref()
            .map(SegmentInformation::timestamp_scale_or_default)
            .unwrap_or(DEFAULT_TIMESTAMP_SCALE)
    }

    /// Presentation time of a block from the start of the segment.
    ///
    /// Returns `None` if the block would be presented before the segment
    /// start or the time does not fit in a `Duration`.
    pub fn presentation_time(
        &self,
        cluster: &Cluster,
        block: &Block,
    ) -> Option<std::time::Duration> {
        let ticks = i128::from(cluster.timestamp) + i128::from(block.timestamp);
        let nanos = ticks.checked_mul(i128::from(self.timestamp_scale()))?;
        let nanos = u64::try_from(nanos).ok()?;
        Some(std::time::Duration::from_nanos(nanos))
    }
}
