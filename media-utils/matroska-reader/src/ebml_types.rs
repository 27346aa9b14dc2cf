// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// How the body of an element is encoded.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ElementKind {
    Master,
    Unsigned,
    Float,
    Date,
    /// ASCII string
    String,
    Utf8,
    Binary,
}

#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct Hex(u64);

impl std::fmt::Debug for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

macro_rules! impl_tags {
    ( $( ($name:ident, $val:literal, $kind:ident) ),* $(,)? ) => {
        /// An EBML element ID. The numeric value includes the length marker
        /// bits.
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
        pub enum Tag {
            $(
                $name,
            )*
            Other(Hex),
        }

        impl Tag {
            pub fn kind(&self) -> ElementKind {
                match self {
                    $(
                        Tag::$name => ElementKind::$kind,
                    )*
                    Tag::Other(_) => ElementKind::Binary,
                }
            }

            pub fn id(&self) -> u64 {
                match self {
                    $(
                        Tag::$name => $val,
                    )*
                    Tag::Other(Hex(id)) => *id,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        Tag::$name => stringify!($name),
                    )*
                    Tag::Other(_) => "unknown element",
                }
            }
        }

        impl From<u64> for Tag {
            fn from(id: u64) -> Tag {
                match id {
                    $(
                        $val => Tag::$name,
                    )*
                    id => Tag::Other(Hex(id)),
                }
            }
        }
    };
}

// See https://www.matroska.org/technical/elements.html
// https://github.com/ietf-wg-cellar/matroska-specification/blob/master/ebml_matroska.xml

impl_tags!(
    // EBML header
    (EBML, 0x1a45_dfa3, Master),
    (EBMLVersion, 0x4286, Unsigned),
    (EBMLReadVersion, 0x42f7, Unsigned),
    (EBMLMaxIDLength, 0x42f2, Unsigned),
    (EBMLMaxSizeLength, 0x42f3, Unsigned),
    (DocType, 0x4282, String),
    (DocTypeVersion, 0x4287, Unsigned),
    (DocTypeReadVersion, 0x4285, Unsigned),
    // Global elements
    (Void, 0xec, Binary),
    (CRC32, 0xbf, Binary),
    // Segment and its top-level children
    (Segment, 0x1853_8067, Master),
    (SeekHead, 0x114d_9b74, Master),
    (Info, 0x1549_a966, Master),
    (Tracks, 0x1654_ae6b, Master),
    (Cluster, 0x1f43_b675, Master),
    (Cues, 0x1c53_bb6b, Master),
    (Chapters, 0x1043_a770, Master),
    (Tags, 0x1254_c367, Master),
    (Attachments, 0x1941_a469, Master),
    // Info
    (TimestampScale, 0x2a_d7b1, Unsigned),
    (Duration, 0x4489, Float),
    (DateUTC, 0x4461, Date),
    (Title, 0x7ba9, Utf8),
    (MuxingApp, 0x4d80, Utf8),
    (WritingApp, 0x5741, Utf8),
    // Tracks
    (TrackEntry, 0xae, Master),
    (TrackNumber, 0xd7, Unsigned),
    (TrackUID, 0x73c5, Unsigned),
    (TrackType, 0x83, Unsigned),
    (FlagDefault, 0x88, Unsigned),
    (DefaultDuration, 0x23_e383, Unsigned),
    (Name, 0x536e, Utf8),
    (Language, 0x22_b59c, String),
    (CodecID, 0x86, String),
    (CodecPrivate, 0x63a2, Binary),
    (Video, 0xe0, Master),
    (PixelWidth, 0xb0, Unsigned),
    (PixelHeight, 0xba, Unsigned),
    (Audio, 0xe1, Master),
    (SamplingFrequency, 0xb5, Float),
    (Channels, 0x9f, Unsigned),
    (BitDepth, 0x6264, Unsigned),
    // Cluster
    (Timestamp, 0xe7, Unsigned),
    (SimpleBlock, 0xa3, Binary),
);

impl Tag {
    /// Whether a master element of this type may be written with an
    /// unknown size, as live muxers do for `Segment` and `Cluster`.
    pub fn allows_unknown_size(&self) -> bool {
        matches!(self, Tag::Segment | Tag::Cluster)
    }

    /// Whether encountering `next` ends an unknown-size element of this type.
    pub(crate) fn is_ended_by(&self, next: Tag) -> bool {
        match self {
            Tag::Segment => next == Tag::EBML,
            Tag::Cluster => matches!(
                next,
                Tag::EBML
                    | Tag::Segment
                    | Tag::SeekHead
                    | Tag::Info
                    | Tag::Tracks
                    | Tag::Cluster
                    | Tag::Cues
                    | Tag::Chapters
                    | Tag::Tags
                    | Tag::Attachments
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn known_and_unknown_ids() {
        assert_eq!(Tag::from(0x1a45_dfa3), Tag::EBML);
        assert_eq!(Tag::from(0xa3), Tag::SimpleBlock);
        assert_eq!(Tag::SimpleBlock.kind(), ElementKind::Binary);
        assert_eq!(Tag::Cluster.name(), "Cluster");

        let other = Tag::from(0x4321);
        assert_eq!(other.id(), 0x4321);
        assert_eq!(other.kind(), ElementKind::Binary);
        assert_eq!(format!("{other:?}"), "Other(0x4321)");
    }

    #[test]
    fn unknown_size_termination() {
        assert!(Tag::Cluster.is_ended_by(Tag::Cluster));
        assert!(Tag::Cluster.is_ended_by(Tag::Cues));
        assert!(!Tag::Cluster.is_ended_by(Tag::SimpleBlock));
        assert!(!Tag::Segment.is_ended_by(Tag::Cluster));
        assert!(Tag::Segment.is_ended_by(Tag::EBML));
        assert!(!Tag::TrackEntry.allows_unknown_size());
    }
}
