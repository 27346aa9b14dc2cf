// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::{
    config::ReaderConfig,
    document::{
        AudioTrack, Cluster, EbmlHeader, MatroskaDocument, SegmentInformation, TrackEntry,
        TrackType, VideoTrack,
    },
    ebml_types::Tag,
    element::MasterElement,
    error::{Error, Result},
    streamer::ByteStreamer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ExpectHeader,
    ExpectSegment,
    ParsingSegmentChildren,
    Done,
}

/// Parses one Matroska document from a resident buffer.
pub struct MatroskaReader<'a> {
    pub(crate) streamer: ByteStreamer<'a>,
    pub(crate) config: ReaderConfig,
    /// Buffer offsets at which the enclosing known-size master elements end.
    pub(crate) scope_ends: Vec<usize>,
    state: ParseState,
}

impl<'a> MatroskaReader<'a> {
    pub fn new(data: &'a [u8], config: ReaderConfig) -> Self {
        Self {
            streamer: ByteStreamer::new(data),
            config,
            scope_ends: Vec::new(),
            state: ParseState::ExpectHeader,
        }
    }

    fn transition(&mut self, next: ParseState) {
        trace!("parse state {:?} -> {next:?}", self.state);
        self.state = next;
    }

    pub fn parse(mut self) -> Result<MatroskaDocument> {
        let first_element_id = self.streamer.read_variable_size_integer(false)?;
        trace!("First element ID is {first_element_id:#010x}");
        if Tag::from(first_element_id) != Tag::EBML {
            return Err(Error::NotEbml {
                found: first_element_id,
            });
        }
        let header = self.parse_ebml_header()?;
        debug!("Parsed EBML header");
        self.transition(ParseState::ExpectSegment);

        let root_element_id = self.streamer.read_variable_size_integer(false)?;
        if Tag::from(root_element_id) != Tag::Segment {
            return Err(Error::NoSegment {
                found: root_element_id,
            });
        }
        self.transition(ParseState::ParsingSegmentChildren);

        let mut document = MatroskaDocument::new(header);
        self.parse_segment_elements(&mut document)?;
        self.transition(ParseState::Done);

        if self.streamer.has_octet() {
            debug!(
                "{} octets after the segment were not read",
                self.streamer.remaining()
            );
        }
        Ok(document)
    }

    fn parse_ebml_header(&mut self) -> Result<EbmlHeader> {
        self.read_master()
    }

    fn parse_segment_elements(&mut self, document: &mut MatroskaDocument) -> Result<()> {
        debug!("Parsing segment elements");
        self.read_master_into(&mut SegmentChildren(document))?;
        debug!("Parsed segment elements");
        Ok(())
    }

    fn parse_information(&mut self) -> Result<SegmentInformation> {
        self.read_master()
    }

    fn parse_tracks(&mut self, tracks: &mut BTreeMap<u64, TrackEntry>) -> Result<()> {
        self.read_master_into(&mut TrackList(tracks))
    }

    fn parse_track_entry(&mut self) -> Result<TrackEntry> {
        self.read_master()
    }

    fn parse_video_track_information(&mut self) -> Result<VideoTrack> {
        self.read_master()
    }

    fn parse_audio_track_information(&mut self) -> Result<AudioTrack> {
        self.read_master()
    }

    fn parse_cluster(&mut self) -> Result<Cluster> {
        self.read_master()
    }
}

impl MasterElement for EbmlHeader {
    const TAG: Tag = Tag::EBML;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::DocType => {
                self.doc_type = reader.read_string_element()?;
                debug!("Read DocType attribute: {}", self.doc_type);
            }
            Tag::DocTypeVersion => {
                self.doc_type_version = reader.read_u64_element()?;
                debug!("Read DocTypeVersion attribute: {}", self.doc_type_version);
            }
            Tag::DocTypeReadVersion => self.doc_type_read_version = reader.read_u64_element()?,
            Tag::EBMLVersion => self.version = reader.read_u64_element()?,
            Tag::EBMLReadVersion => self.read_version = reader.read_u64_element()?,
            Tag::EBMLMaxIDLength => self.max_id_length = reader.read_u64_element()?,
            Tag::EBMLMaxSizeLength => self.max_size_length = reader.read_u64_element()?,
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

struct SegmentChildren<'d>(&'d mut MatroskaDocument);

impl MasterElement for SegmentChildren<'_> {
    const TAG: Tag = Tag::Segment;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        let document = &mut *self.0;
        match tag {
            Tag::Info => {
                let info = reader.parse_information()?;
                if document.segment_information.is_some() {
                    debug!("Replacing earlier segment information");
                }
                document.segment_information = Some(info);
            }
            Tag::Tracks => reader.parse_tracks(&mut document.tracks)?,
            Tag::Cluster => {
                let cluster = reader.parse_cluster()?;
                document.clusters.push(cluster);
            }
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

impl MasterElement for SegmentInformation {
    const TAG: Tag = Tag::Info;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::TimestampScale => {
                let timestamp_scale = reader.read_u64_element()?;
                self.timestamp_scale = Some(timestamp_scale);
                debug!("Read TimestampScale attribute: {timestamp_scale}");
            }
            Tag::MuxingApp => {
                self.muxing_app = reader.read_string_element()?;
                debug!("Read MuxingApp attribute: {}", self.muxing_app);
            }
            Tag::WritingApp => {
                self.writing_app = reader.read_string_element()?;
                debug!("Read WritingApp attribute: {}", self.writing_app);
            }
            Tag::Duration => self.duration = Some(reader.read_float_element()?),
            Tag::DateUTC => self.date_utc = Some(reader.read_date_element()?),
            Tag::Title => self.title = Some(reader.read_string_element()?),
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

struct TrackList<'t>(&'t mut BTreeMap<u64, TrackEntry>);

impl MasterElement for TrackList<'_> {
    const TAG: Tag = Tag::Tracks;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::TrackEntry => {
                debug!("Parsing track");
                let track_entry = reader.parse_track_entry()?;
                let track_number = track_entry.track_number;
                if self.0.insert(track_number, track_entry).is_some() {
                    warn!("Track {track_number} appears more than once, keeping the last");
                }
                debug!("Track {track_number} added to document");
            }
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

impl MasterElement for TrackEntry {
    const TAG: Tag = Tag::TrackEntry;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::TrackNumber => {
                self.track_number = reader.read_u64_element()?;
                trace!("Read TrackNumber attribute: {}", self.track_number);
            }
            Tag::TrackUID => {
                self.track_uid = reader.read_u64_element()?;
                trace!("Read TrackUID attribute: {}", self.track_uid);
            }
            Tag::TrackType => {
                let track_type = reader.read_u64_element()?;
                self.track_type = TrackType::from(track_type);
                trace!("Read TrackType attribute: {track_type}");
            }
            Tag::Language => {
                self.language = reader.read_string_element()?;
                trace!("Read Track's Language attribute: {}", self.language);
            }
            Tag::CodecID => {
                self.codec_id = reader.read_string_element()?;
                trace!("Read Track's CodecID attribute: {}", self.codec_id);
            }
            Tag::Name => self.name = Some(reader.read_string_element()?),
            Tag::CodecPrivate => self.codec_private = Some(reader.read_binary_element()?),
            Tag::FlagDefault => self.flag_default = reader.read_u64_element()? != 0,
            Tag::DefaultDuration => self.default_duration = Some(reader.read_u64_element()?),
            Tag::Video => self.video_track = Some(reader.parse_video_track_information()?),
            Tag::Audio => self.audio_track = Some(reader.parse_audio_track_information()?),
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

impl MasterElement for VideoTrack {
    const TAG: Tag = Tag::Video;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::PixelWidth => {
                self.pixel_width = reader.read_u64_element()?;
                trace!("Read VideoTrack's PixelWidth attribute: {}", self.pixel_width);
            }
            Tag::PixelHeight => {
                self.pixel_height = reader.read_u64_element()?;
                trace!("Read VideoTrack's PixelHeight attribute: {}", self.pixel_height);
            }
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

impl MasterElement for AudioTrack {
    const TAG: Tag = Tag::Audio;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::Channels => {
                self.channels = reader.read_u64_element()?;
                trace!("Read AudioTrack's Channels attribute: {}", self.channels);
            }
            Tag::BitDepth => {
                self.bit_depth = reader.read_u64_element()?;
                trace!("Read AudioTrack's BitDepth attribute: {}", self.bit_depth);
            }
            Tag::SamplingFrequency => self.sampling_frequency = reader.read_float_element()?,
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}

impl MasterElement for Cluster {
    const TAG: Tag = Tag::Cluster;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()> {
        match tag {
            Tag::SimpleBlock => {
                let block = reader.parse_simple_block()?;
                self.blocks.push(block);
            }
            Tag::Timestamp => self.timestamp = reader.read_u64_element()?,
            _ => reader.skip_element()?,
        }
        Ok(())
    }
}
