// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Generic reading of EBML elements: master element bodies and scalar
//! values.

use tracing::{debug, trace};

use crate::{
    ebml_types::Tag,
    error::{Error, Result},
    reader::MatroskaReader,
    streamer::ElementSize,
};

/// 2001-01-01T00:00:00 UTC in nanoseconds since the Unix epoch.
const MATROSKA_EPOCH_NANOS: i64 = 978_307_200_000_000_000;

/// A container whose body is a sequence of child elements.
///
/// `read_child` is called once per child, after the child's ID has been
/// read. It must consume exactly that child (its size and its body); IDs it
/// does not care about go to [MatroskaReader::skip_element].
pub(crate) trait MasterElement {
    const TAG: Tag;
    fn read_child(&mut self, reader: &mut MatroskaReader<'_>, tag: Tag) -> Result<()>;
}

impl MatroskaReader<'_> {
    pub(crate) fn read_element_id(&mut self) -> Result<Tag> {
        let id = self.streamer.read_variable_size_integer(false)?;
        Ok(Tag::from(id))
    }

    pub(crate) fn read_master<T: MasterElement + Default>(&mut self) -> Result<T> {
        let mut target = T::default();
        self.read_master_into(&mut target)?;
        Ok(target)
    }

    /// Read the size of a master element, then its children until the size
    /// is used up.
    pub(crate) fn read_master_into<T: MasterElement>(&mut self, target: &mut T) -> Result<()> {
        let name = T::TAG.name();
        match self.streamer.read_element_size()? {
            ElementSize::Known(declared) => {
                debug!("{name} has {declared} octets of data.");
                if declared > self.streamer.remaining() as u64 {
                    return Err(Error::OutOfData {
                        offset: self.streamer.position(),
                        needed: declared,
                        remaining: self.streamer.remaining(),
                    });
                }
                // `declared` fits in the remaining buffer, so this cannot overflow.
                self.scope_ends.push(self.streamer.position() + declared as usize);
                self.streamer.push_octets_read();
                while self.streamer.octets_read() < declared {
                    self.read_one_child(target)?;
                    trace!(
                        "Read {} octets of the {name} so far.",
                        self.streamer.octets_read()
                    );
                }
                let consumed = self.streamer.pop_octets_read().unwrap_or_default();
                self.scope_ends.pop();
                if consumed != declared {
                    return Err(Error::MalformedDocument {
                        element: name,
                        declared,
                        consumed,
                    });
                }
            }
            ElementSize::Unknown => {
                if !T::TAG.allows_unknown_size() {
                    return Err(Error::UnknownSizeNotAllowed { element: name });
                }
                debug!("{name} has unknown size.");
                // An unknown-size element also ends where its known-size
                // parent ends.
                let parent_end = self.scope_ends.last().copied();
                self.streamer.push_octets_read();
                loop {
                    if parent_end.is_some_and(|end| self.streamer.position() >= end) {
                        trace!("{name} of unknown size ended with its parent.");
                        break;
                    }
                    let Some(next) = self.streamer.peek_element_id()? else {
                        break;
                    };
                    if T::TAG.is_ended_by(Tag::from(next)) {
                        break;
                    }
                    self.read_one_child(target)?;
                }
                let consumed = self.streamer.pop_octets_read().unwrap_or_default();
                debug!("{name} of unknown size ended after {consumed} octets.");
            }
        }
        Ok(())
    }

    fn read_one_child<T: MasterElement>(&mut self, target: &mut T) -> Result<()> {
        let tag = self.read_element_id()?;
        trace!(
            "{} child element ID is {:#010x} ({:?})",
            T::TAG.name(),
            tag.id(),
            tag.kind()
        );
        target.read_child(self, tag)
    }

    /// Read an element's size and check that its body is present.
    fn read_scalar_length(&mut self, what: &'static str) -> Result<usize> {
        let offset = self.streamer.position();
        let length = self.streamer.read_variable_size_integer(true)?;
        match usize::try_from(length) {
            Ok(length) if length <= self.streamer.remaining() => Ok(length),
            _ => Err(Error::NotEnoughData { what, offset }),
        }
    }

    pub(crate) fn read_u64_element(&mut self) -> Result<u64> {
        let length = self.read_scalar_length("u64 element")?;
        self.streamer.read_u64_be(length)
    }

    pub(crate) fn read_float_element(&mut self) -> Result<f64> {
        let length = self.read_scalar_length("float element")?;
        self.streamer.read_f64_be(length)
    }

    pub(crate) fn read_date_element(&mut self) -> Result<chrono::DateTime<chrono::Utc>> {
        use chrono::TimeZone;

        let length = self.read_scalar_length("date element")?;
        let bytes = self.streamer.read_bytes(length)?;
        let bytes: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidDateSize {
            length: length as u64,
        })?;
        let nanos = MATROSKA_EPOCH_NANOS
            .checked_add(i64::from_be_bytes(bytes))
            .ok_or(Error::DateOutOfRange)?;
        Ok(chrono::Utc.timestamp_nanos(nanos))
    }

    pub(crate) fn read_string_element(&mut self) -> Result<String> {
        let length = self.read_scalar_length("string element")?;
        let bytes = self.streamer.read_bytes(length)?;
        // EBML allows strings to be padded with NUL octets.
        let end = bytes
            .iter()
            .rposition(|octet| *octet != 0)
            .map_or(0, |idx| idx + 1);
        Ok(String::from_utf8(bytes[..end].to_vec())?)
    }

    pub(crate) fn read_binary_element(&mut self) -> Result<Vec<u8>> {
        let length = self.read_scalar_length("binary element")?;
        Ok(self.streamer.read_bytes(length)?.to_vec())
    }

    /// Skip an element whose ID has already been read.
    pub(crate) fn skip_element(&mut self) -> Result<()> {
        let length = self.read_scalar_length("element")?;
        self.streamer.drop_octets(length)
    }
}
