// Copyright 2017-2022 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use bitstream_io::BitRead;

use crate::error::{Error, Result};

type BitReader<R> = bitstream_io::BitReader<R, bitstream_io::BigEndian>;

/// A decoded EBML variable size integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VarInt {
    /// the value with the length marker bits removed
    value: u64,
    /// encoded length in octets, 1..=8
    length: usize,
}

impl VarInt {
    fn value(&self, strip_marker_bits: bool) -> u64 {
        if strip_marker_bits {
            self.value
        } else {
            self.value | (1 << (7 * self.length))
        }
    }

    fn signed_value(&self) -> i64 {
        // At most 56 value bits, so this never wraps.
        let bias = (1i64 << (7 * self.length - 1)) - 1;
        self.value as i64 - bias
    }

    /// All value bits set means "unknown size".
    pub(crate) fn is_unknown(&self) -> bool {
        self.value == (1 << (7 * self.length)) - 1
    }
}

/// The size field of an element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementSize {
    Known(u64),
    Unknown,
}

fn decode_variable_size_integer(buf: &[u8], offset: usize) -> Result<VarInt> {
    let first = *buf.first().ok_or(Error::OutOfData {
        offset,
        needed: 1,
        remaining: 0,
    })?;
    if first == 0 {
        // no marker bit within the first octet
        return Err(Error::MalformedVarInt { offset });
    }
    let mut r = BitReader::new(buf);
    let prefix = r
        .read_unary1()
        .map_err(|_| Error::MalformedVarInt { offset })?;
    let length = prefix as usize + 1;
    if buf.len() < length {
        return Err(Error::MalformedVarInt { offset });
    }
    let value = r
        .read::<u64>(7 * length as u32)
        .map_err(|_| Error::MalformedVarInt { offset })?;
    Ok(VarInt { value, length })
}

/// Forward-only cursor over a fully resident buffer.
///
/// Besides the cursor itself, the streamer keeps a stack of counters of
/// octets consumed. Entering a master element pushes a fresh counter so that
/// the element can measure its own progress against its declared size;
/// leaving it folds the count into the enclosing counter.
pub struct ByteStreamer<'a> {
    data: &'a [u8],
    position: usize,
    octets_read: Vec<u64>,
}

impl<'a> ByteStreamer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            octets_read: vec![0],
        }
    }

    /// Offset of the cursor from the start of the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    #[inline]
    pub fn has_octet(&self) -> bool {
        self.remaining() > 0
    }

    /// The unconsumed part of the buffer. Does not advance the cursor.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// The unconsumed part of the buffer as text, if it is valid UTF-8.
    pub fn data_as_chars(&self) -> Option<&'a str> {
        std::str::from_utf8(self.data()).ok()
    }

    fn advance(&mut self, n: usize) {
        self.position += n;
        if let Some(count) = self.octets_read.last_mut() {
            *count += n as u64;
        }
    }

    fn out_of_data(&self, needed: u64) -> Error {
        Error::OutOfData {
            offset: self.position,
            needed,
            remaining: self.remaining(),
        }
    }

    pub fn read_octet(&mut self) -> Result<u8> {
        let octet = *self.data().first().ok_or_else(|| self.out_of_data(1))?;
        self.advance(1);
        Ok(octet)
    }

    /// Read two octets as a big-endian signed integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Borrow the next `n` octets and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.out_of_data(n as u64));
        }
        let bytes = &self.data[self.position..self.position + n];
        self.advance(n);
        Ok(bytes)
    }

    /// Read a big-endian unsigned integer of `len` octets, at most 8. Zero
    /// octets read as 0.
    pub fn read_u64_be(&mut self, len: usize) -> Result<u64> {
        if len > 8 {
            return Err(Error::IntegerTooLarge { length: len as u64 });
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes
            .iter()
            .fold(0u64, |acc, octet| (acc << 8) | u64::from(*octet)))
    }

    /// Read a big-endian IEEE 754 float of 0, 4 or 8 octets. Zero octets
    /// read as 0.0.
    pub fn read_f64_be(&mut self, len: usize) -> Result<f64> {
        if !matches!(len, 0 | 4 | 8) {
            return Err(Error::InvalidFloatSize { length: len as u64 });
        }
        match *self.read_bytes(len)? {
            [a, b, c, d] => Ok(f32::from_be_bytes([a, b, c, d]).into()),
            [a, b, c, d, e, f, g, h] => Ok(f64::from_be_bytes([a, b, c, d, e, f, g, h])),
            _ => Ok(0.0),
        }
    }

    pub fn drop_octets(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_var_int(&mut self) -> Result<VarInt> {
        let v = decode_variable_size_integer(self.data(), self.position)?;
        self.advance(v.length);
        Ok(v)
    }

    /// Decode an EBML variable size integer.
    ///
    /// Values (sizes, track numbers) are read with `strip_marker_bits` set.
    /// Element IDs are conventionally compared with the length marker
    /// included, so those are read with it cleared.
    pub fn read_variable_size_integer(&mut self, strip_marker_bits: bool) -> Result<u64> {
        Ok(self.read_var_int()?.value(strip_marker_bits))
    }

    /// Decode a signed variable size integer, as used for the size deltas of
    /// EBML lacing. The range for each length is centered on zero.
    pub fn read_variable_sized_signed_integer(&mut self) -> Result<i64> {
        Ok(self.read_var_int()?.signed_value())
    }

    pub(crate) fn read_element_size(&mut self) -> Result<ElementSize> {
        let v = self.read_var_int()?;
        if v.is_unknown() {
            Ok(ElementSize::Unknown)
        } else {
            Ok(ElementSize::Known(v.value))
        }
    }

    /// Decode the next element ID without consuming it. Returns `None` at the
    /// end of the buffer.
    pub fn peek_element_id(&self) -> Result<Option<u64>> {
        if !self.has_octet() {
            return Ok(None);
        }
        let v = decode_variable_size_integer(self.data(), self.position)?;
        Ok(Some(v.value(false)))
    }

    pub fn push_octets_read(&mut self) {
        self.octets_read.push(0);
    }

    /// Leave the innermost scope, returning the octets it consumed. The root
    /// scope is never popped; `None` is returned instead.
    pub fn pop_octets_read(&mut self) -> Option<u64> {
        if self.octets_read.len() <= 1 {
            return None;
        }
        let popped = self.octets_read.pop()?;
        if let Some(parent) = self.octets_read.last_mut() {
            *parent += popped;
        }
        Some(popped)
    }

    /// Octets consumed within the innermost scope.
    #[inline]
    pub fn octets_read(&self) -> u64 {
        self.octets_read.last().copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn variable_size_integer_lengths() {
        let table: &[(&[u8], u64, u64)] = &[
            (&[0x81], 1, 0x81),
            (&[0x40, 0x02], 2, 0x4002),
            (&[0x20, 0x00, 0x03], 3, 0x20_0003),
            (&[0x10, 0x00, 0x00, 0x04], 4, 0x1000_0004),
            (&[0x08, 0x00, 0x00, 0x00, 0x05], 5, 0x08_0000_0005),
            (&[0x04, 0x00, 0x00, 0x00, 0x00, 0x06], 6, 0x0400_0000_0006),
            (&[0x02, 0, 0, 0, 0, 0, 0x07], 7, 0x02_0000_0000_0007),
            (&[0x01, 0, 0, 0, 0, 0, 0, 0x08], 8, 0x0100_0000_0000_0008),
        ];
        for (bytes, stripped, with_marker) in table {
            let mut s = ByteStreamer::new(bytes);
            assert_eq!(s.read_variable_size_integer(true).unwrap(), *stripped);
            assert_eq!(s.remaining(), 0);

            let mut s = ByteStreamer::new(bytes);
            assert_eq!(s.read_variable_size_integer(false).unwrap(), *with_marker);
            assert_eq!(s.octets_read(), bytes.len() as u64);
        }
    }

    #[test]
    fn element_id_keeps_marker() {
        let bytes = [0x1a, 0x45, 0xdf, 0xa3, 0x1a, 0x45, 0xdf, 0xa3];
        let mut s = ByteStreamer::new(&bytes);
        assert_eq!(s.read_variable_size_integer(false).unwrap(), 0x1a45_dfa3);
        assert_eq!(s.read_variable_size_integer(true).unwrap(), 0x0a45_dfa3);
    }

    #[test]
    fn multi_octet_value_bits() {
        let mut s = ByteStreamer::new(&[0x5f, 0xff]);
        assert_eq!(s.read_variable_size_integer(true).unwrap(), 0x1fff);
    }

    #[test]
    fn signed_deltas() {
        let table: &[(&[u8], i64)] = &[
            (&[0xbf], 0),
            (&[0xc0], 1),
            (&[0xbe], -1),
            (&[0xc1], 2),
            (&[0xbc], -3),
            (&[0x80], -63),
            (&[0xfe], 63),
            (&[0x5f, 0xff], 0),
            (&[0x60, 0x00], 1),
            (&[0x5f, 0xfe], -1),
            (&[0x40, 0x00], -8191),
        ];
        for (bytes, expected) in table {
            let mut s = ByteStreamer::new(bytes);
            assert_eq!(
                s.read_variable_sized_signed_integer().unwrap(),
                *expected,
                "decoding {bytes:02x?}"
            );
        }
    }

    #[test]
    fn malformed_variable_size_integers() {
        let mut s = ByteStreamer::new(&[0x00, 0x81]);
        assert!(matches!(
            s.read_variable_size_integer(true),
            Err(Error::MalformedVarInt { offset: 0 })
        ));

        // declares two octets but only one is present
        let mut s = ByteStreamer::new(&[0x40]);
        assert!(matches!(
            s.read_variable_size_integer(true),
            Err(Error::MalformedVarInt { .. })
        ));
        assert_eq!(s.position(), 0);

        let mut s = ByteStreamer::new(&[]);
        assert!(matches!(
            s.read_variable_size_integer(true),
            Err(Error::OutOfData { .. })
        ));
    }

    #[test]
    fn unknown_size() {
        let mut s = ByteStreamer::new(&[0xff, 0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(s.read_element_size().unwrap(), ElementSize::Unknown);
        assert_eq!(s.read_element_size().unwrap(), ElementSize::Unknown);

        let mut s = ByteStreamer::new(&[0xfe]);
        assert_eq!(s.read_element_size().unwrap(), ElementSize::Known(0x7e));
    }

    #[test]
    fn fixed_width_reads() {
        let mut s = ByteStreamer::new(&[0xff, 0xfe, 0x07]);
        assert!(s.has_octet());
        assert_eq!(s.read_i16().unwrap(), -2);
        assert_eq!(s.data(), &[0x07]);
        assert_eq!(s.read_octet().unwrap(), 0x07);
        assert!(!s.has_octet());
        assert!(matches!(s.read_octet(), Err(Error::OutOfData { .. })));
    }

    #[test]
    fn remaining_as_text() {
        let mut s = ByteStreamer::new(b"\x01webm");
        assert_eq!(s.data_as_chars(), Some("\u{1}webm"));
        s.drop_octets(1).unwrap();
        assert_eq!(s.data_as_chars(), Some("webm"));
        assert_eq!(s.position(), 1);
        assert_eq!(ByteStreamer::new(&[0xc3]).data_as_chars(), None);
    }

    #[test]
    fn drop_past_end_fails() {
        let mut s = ByteStreamer::new(&[1, 2, 3]);
        s.drop_octets(2).unwrap();
        assert!(matches!(
            s.drop_octets(2),
            Err(Error::OutOfData {
                offset: 2,
                needed: 2,
                remaining: 1
            })
        ));
        assert_eq!(s.position(), 2);
    }

    #[test]
    fn peek_does_not_advance() {
        let s = ByteStreamer::new(&[0xa3, 0x81]);
        assert_eq!(s.peek_element_id().unwrap(), Some(0xa3));
        assert_eq!(s.position(), 0);
        let s = ByteStreamer::new(&[]);
        assert_eq!(s.peek_element_id().unwrap(), None);
    }

    #[test]
    fn nested_octet_counters() {
        let data = [0u8; 16];
        let mut s = ByteStreamer::new(&data);
        s.drop_octets(2).unwrap();
        assert_eq!(s.octets_read(), 2);

        s.push_octets_read();
        assert_eq!(s.octets_read(), 0);
        s.drop_octets(3).unwrap();

        s.push_octets_read();
        s.read_octet().unwrap();
        assert_eq!(s.octets_read(), 1);
        assert_eq!(s.pop_octets_read(), Some(1));

        assert_eq!(s.octets_read(), 4);
        assert_eq!(s.pop_octets_read(), Some(4));
        assert_eq!(s.octets_read(), 6);

        // the root scope stays in place
        assert_eq!(s.pop_octets_read(), None);
        assert_eq!(s.octets_read(), 6);
    }

    #[test]
    fn big_endian_scalars() {
        let mut s = ByteStreamer::new(&[0x01, 0x02, 0x03, 0xff]);
        assert_eq!(s.read_u64_be(0).unwrap(), 0);
        assert_eq!(s.read_u64_be(3).unwrap(), 0x01_0203);
        assert_eq!(s.read_u64_be(1).unwrap(), 0xff);

        let mut s = ByteStreamer::new(&[0u8; 9]);
        assert!(matches!(
            s.read_u64_be(9),
            Err(Error::IntegerTooLarge { length: 9 })
        ));
        assert_eq!(s.position(), 0);

        let mut data = 1.5f32.to_be_bytes().to_vec();
        data.extend_from_slice(&(-0.25f64).to_be_bytes());
        let mut s = ByteStreamer::new(&data);
        assert_eq!(s.read_f64_be(0).unwrap(), 0.0);
        assert_eq!(s.read_f64_be(4).unwrap(), 1.5);
        assert_eq!(s.read_f64_be(8).unwrap(), -0.25);
        assert!(!s.has_octet());

        let mut s = ByteStreamer::new(&[0u8; 2]);
        assert!(matches!(
            s.read_f64_be(2),
            Err(Error::InvalidFloatSize { length: 2 })
        ));
        assert!(matches!(
            ByteStreamer::new(&[0u8; 3]).read_f64_be(4),
            Err(Error::OutOfData { .. })
        ));
    }
}
