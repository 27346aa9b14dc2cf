// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! SimpleBlock decoding.
//!
//! see https://www.matroska.org/technical/notes.html#block-lacing
//! and https://matroska.sourceforge.net/technical/specs/index.html#simpleblock_structure

use tracing::{trace, warn};

use crate::{
    config::UnevenLacingPolicy,
    document::{Block, Lacing},
    error::{Error, Result},
    reader::MatroskaReader,
};

/// Frame sizes of a laced block, plus octets after the last frame that
/// belong to the block but to no frame.
struct FrameLayout {
    sizes: Vec<u64>,
    trailing: u64,
}

impl MatroskaReader<'_> {
    /// Parse a SimpleBlock whose ID has already been read.
    pub(crate) fn parse_simple_block(&mut self) -> Result<Block> {
        let block_offset = self.streamer.position();
        let truncated = Error::TruncatedBlock {
            offset: block_offset,
        };

        let content_size = self.streamer.read_variable_size_integer(true)?;
        if content_size > self.streamer.remaining() as u64 {
            return Err(truncated);
        }

        let octets_read_before_track_number = self.streamer.octets_read();
        let track_number = self.streamer.read_variable_size_integer(true)?;

        if self.streamer.remaining() < 3 {
            return Err(truncated);
        }
        let timestamp = self.streamer.read_i16()?;
        let flags = self.streamer.read_octet()?;
        let lacing = Lacing::from_flags(flags);

        let header_size = self.streamer.octets_read() - octets_read_before_track_number;
        let total_frame_content_size = content_size.checked_sub(header_size).ok_or(truncated)?;
        trace!(
            "SimpleBlock for track {track_number} with {total_frame_content_size} \
            octets of {lacing:?} laced frame data"
        );

        let layout = match lacing {
            Lacing::None => FrameLayout {
                sizes: vec![total_frame_content_size],
                trailing: 0,
            },
            Lacing::Xiph => return Err(Error::UnsupportedLacing),
            Lacing::FixedSize => self.fixed_size_lacing(total_frame_content_size)?,
            Lacing::Ebml => self.ebml_lacing(total_frame_content_size)?,
        };

        let mut frames = Vec::with_capacity(layout.sizes.len());
        for size in layout.sizes {
            let frame = usize::try_from(size)
                .ok()
                .and_then(|size| self.streamer.read_bytes(size).ok())
                .ok_or(Error::TruncatedBlock {
                    offset: block_offset,
                })?;
            frames.push(frame.to_vec());
        }
        if layout.trailing > 0 {
            self.streamer
                .drop_octets(layout.trailing as usize)
                .map_err(|_| Error::TruncatedBlock {
                    offset: block_offset,
                })?;
        }

        Ok(Block {
            track_number,
            timestamp,
            only_keyframes: flags & (1 << 7) != 0,
            invisible: flags & (1 << 3) != 0,
            discardable: flags & 1 != 0,
            lacing,
            frames,
        })
    }

    /// Read the frame count octet of a laced block.
    fn read_lace_frame_count(&mut self, total_frame_content_size: u64) -> Result<u64> {
        if total_frame_content_size == 0 {
            return Err(Error::InvalidLacing {
                reason: "laced block has no lacing header",
            });
        }
        Ok(u64::from(self.streamer.read_octet()?) + 1)
    }

    fn fixed_size_lacing(&mut self, total_frame_content_size: u64) -> Result<FrameLayout> {
        let frame_count = self.read_lace_frame_count(total_frame_content_size)?;
        let frame_data = total_frame_content_size - 1;
        let individual_frame_size = frame_data / frame_count;
        let remainder = frame_data % frame_count;
        if remainder != 0 {
            match self.config.uneven_fixed_lacing {
                UnevenLacingPolicy::Reject => {
                    return Err(Error::UnevenFixedLacing {
                        total: frame_data,
                        frame_count,
                    });
                }
                UnevenLacingPolicy::Discard => {
                    warn!(
                        "{frame_data} octets of fixed-size laced data do not divide into \
                        {frame_count} frames, discarding {remainder} octets"
                    );
                }
            }
        }
        Ok(FrameLayout {
            sizes: vec![individual_frame_size; frame_count as usize],
            trailing: remainder,
        })
    }

    fn ebml_lacing(&mut self, total_frame_content_size: u64) -> Result<FrameLayout> {
        let octets_read_before_frame_sizes = self.streamer.octets_read();
        let frame_count = self.read_lace_frame_count(total_frame_content_size)?;
        let mut sizes = Vec::with_capacity(frame_count as usize);

        // Sizes are coded for every frame but the last.
        if frame_count > 1 {
            let first_frame_size = self.streamer.read_variable_size_integer(true)?;
            sizes.push(first_frame_size);
            let mut previous_frame_size = first_frame_size;
            for _ in 0..frame_count - 2 {
                let difference = self.streamer.read_variable_sized_signed_integer()?;
                let frame_size = previous_frame_size.checked_add_signed(difference).ok_or(
                    Error::InvalidLacing {
                        reason: "frame size delta underflows",
                    },
                )?;
                sizes.push(frame_size);
                previous_frame_size = frame_size;
            }
        }

        let frame_size_sum = sizes
            .iter()
            .try_fold(0u64, |sum, size| sum.checked_add(*size))
            .ok_or(Error::InvalidLacing {
                reason: "frame sizes overflow",
            })?;
        let lacing_header_size = self.streamer.octets_read() - octets_read_before_frame_sizes;
        let last_frame_size = total_frame_content_size
            .checked_sub(lacing_header_size)
            .and_then(|rest| rest.checked_sub(frame_size_sum))
            .ok_or(Error::InvalidLacing {
                reason: "laced frame sizes exceed the block size",
            })?;
        sizes.push(last_frame_size);

        Ok(FrameLayout { sizes, trailing: 0 })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ReaderConfig;
    use test_log::test;

    fn parse(bytes: &[u8], config: ReaderConfig) -> Result<Block> {
        let mut reader = MatroskaReader::new(bytes, config);
        reader.parse_simple_block()
    }

    /// Prefix block content with its one-octet size.
    fn sized(content: &[u8]) -> Vec<u8> {
        assert!(content.len() < 0x7f);
        let mut bytes = vec![0x80 | content.len() as u8];
        bytes.extend_from_slice(content);
        bytes
    }

    #[test]
    fn no_lacing() {
        let bytes = sized(&[0x81, 0x00, 0x05, 0x80, 1, 2, 3, 4, 5]);
        let block = parse(&bytes, ReaderConfig::default()).unwrap();
        assert_eq!(block.track_number(), 1);
        assert_eq!(block.timestamp(), 5);
        assert!(block.only_keyframes());
        assert!(!block.invisible());
        assert!(!block.discardable());
        assert_eq!(block.lacing(), Lacing::None);
        assert_eq!(block.frames(), &[vec![1, 2, 3, 4, 5]]);
    }

    #[test]
    fn flags_and_negative_timestamp() {
        let bytes = sized(&[0x82, 0xff, 0xf6, 0x09, 0xaa]);
        let block = parse(&bytes, ReaderConfig::default()).unwrap();
        assert_eq!(block.track_number(), 2);
        assert_eq!(block.timestamp(), -10);
        assert!(!block.only_keyframes());
        assert!(block.invisible());
        assert!(block.discardable());
        assert_eq!(block.frames(), &[vec![0xaa]]);
    }

    #[test]
    fn fixed_size_lacing() {
        let mut content = vec![0x81, 0x00, 0x00, 0x04, 0x02];
        content.extend(1..=9u8);
        let block = parse(&sized(&content), ReaderConfig::default()).unwrap();
        assert_eq!(block.lacing(), Lacing::FixedSize);
        assert_eq!(
            block.frames(),
            &[vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]
        );
    }

    #[test]
    fn uneven_fixed_size_lacing_rejected() {
        let mut content = vec![0x81, 0x00, 0x00, 0x04, 0x02];
        content.extend(1..=10u8);
        let result = parse(&sized(&content), ReaderConfig::default());
        assert!(matches!(
            result,
            Err(Error::UnevenFixedLacing {
                total: 10,
                frame_count: 3
            })
        ));
    }

    #[test]
    fn uneven_fixed_size_lacing_discarded() {
        let mut content = vec![0x81, 0x00, 0x00, 0x04, 0x02];
        content.extend(1..=10u8);
        let mut bytes = sized(&content);
        bytes.push(0xee);

        let config = ReaderConfig {
            uneven_fixed_lacing: UnevenLacingPolicy::Discard,
        };
        let mut reader = MatroskaReader::new(&bytes, config);
        let block = reader.parse_simple_block().unwrap();
        assert_eq!(
            block.frames(),
            &[vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]
        );
        // the leftover octet is consumed with the block
        assert_eq!(reader.streamer.data(), &[0xee]);
    }

    #[test]
    fn ebml_lacing_infers_last_frame() {
        // sizes 5, then +2 -> 7, then -3 -> 4; the last frame gets the rest
        let mut content = vec![0x81, 0x00, 0x00, 0x06, 0x03, 0x85, 0xc1, 0xbc];
        let frame_sizes = [5usize, 7, 4, 6];
        let mut expected = Vec::new();
        let mut value = 0u8;
        for size in frame_sizes {
            let frame: Vec<u8> = (0..size)
                .map(|_| {
                    value += 1;
                    value
                })
                .collect();
            content.extend_from_slice(&frame);
            expected.push(frame);
        }
        let block = parse(&sized(&content), ReaderConfig::default()).unwrap();
        assert_eq!(block.lacing(), Lacing::Ebml);
        assert_eq!(block.frames(), expected.as_slice());
    }

    #[test]
    fn ebml_lacing_single_frame() {
        let content = [0x81, 0x00, 0x00, 0x06, 0x00, 7, 8];
        let block = parse(&sized(&content), ReaderConfig::default()).unwrap();
        assert_eq!(block.frames(), &[vec![7, 8]]);
    }

    #[test]
    fn ebml_lacing_delta_underflow() {
        let content = [0x81, 0x00, 0x00, 0x06, 0x02, 0x82, 0xba, 0, 0, 0];
        assert!(matches!(
            parse(&sized(&content), ReaderConfig::default()),
            Err(Error::InvalidLacing { .. })
        ));
    }

    #[test]
    fn ebml_lacing_sizes_exceed_block() {
        let content = [0x81, 0x00, 0x00, 0x06, 0x01, 0x90, 0, 0];
        assert!(matches!(
            parse(&sized(&content), ReaderConfig::default()),
            Err(Error::InvalidLacing { .. })
        ));
    }

    #[test]
    fn xiph_lacing_unsupported() {
        let content = [0x81, 0x00, 0x00, 0x02, 0x01, 0x01, 0, 0];
        assert!(matches!(
            parse(&sized(&content), ReaderConfig::default()),
            Err(Error::UnsupportedLacing)
        ));
    }

    #[test]
    fn truncated_payload() {
        let bytes = sized(&[0x81, 0x00, 0x05, 0x80, 1, 2, 3, 4, 5]);
        let result = parse(&bytes[..bytes.len() - 1], ReaderConfig::default());
        assert!(matches!(result, Err(Error::TruncatedBlock { offset: 0 })));
    }

    #[test]
    fn header_larger_than_block() {
        let bytes = [0x82, 0x81, 0x00, 0x00, 0x80];
        assert!(matches!(
            parse(&bytes, ReaderConfig::default()),
            Err(Error::TruncatedBlock { .. })
        ));
    }
}
