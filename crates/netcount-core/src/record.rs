//! Record parser for the kernel interface list (`NET_RT_IFLIST`).
//!
//! The buffer is a concatenation of routing messages. Every message starts
//! with its own length and kind; interface-info messages (`RTM_IFINFO`) carry
//! the interface flags and byte counters, followed by a link-layer address
//! (`sockaddr_dl`) holding the interface name as an explicit-length span.
//!
//! Decoding works on byte slices only: each field is taken with a bounds
//! checked `get` and assembled in native byte order, so a short or lying
//! record yields a [`ParseError`] instead of an out-of-bounds read.

use std::iter::FusedIterator;

use serde::Serialize;

use crate::counter::CounterWidth;
use crate::error::{ParseError, ParseErrorKind};

/// One interface's raw counters as seen in a single interface-info record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawObservation {
    /// Interface name (e.g. `"en0"`); never empty when produced by the parser.
    pub name: String,
    /// Raw inbound byte counter, already masked to the layout's counter width.
    pub raw_in: u64,
    /// Raw outbound byte counter, already masked to the layout's counter width.
    pub raw_out: u64,
    /// `IFF_UP` is set.
    pub up: bool,
    /// `IFF_LOOPBACK` is set.
    pub loopback: bool,
}

/// Field offsets and constants describing one platform's record format.
///
/// Offsets of the header fields are relative to the start of the record; the
/// link-layer offsets are relative to the start of the `sockaddr_dl`, which
/// begins `header_len` bytes into the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// `u16` total record length.
    pub length_offset: usize,
    /// `u8` record kind.
    pub kind_offset: usize,
    /// Kind value of interface-info records.
    pub ifinfo_kind: u8,
    /// `u32` interface flag word.
    pub flags_offset: usize,
    pub flag_up: u32,
    pub flag_loopback: u32,
    /// Inbound byte counter.
    pub in_bytes_offset: usize,
    /// Outbound byte counter.
    pub out_bytes_offset: usize,
    pub counter_width: CounterWidth,
    /// Size of the interface-info header preceding the link-layer address.
    pub header_len: usize,
    /// `u8` address family inside the link-layer address.
    pub link_family_offset: usize,
    /// Address family value of link-layer descriptors.
    pub link_family: u8,
    /// `u8` length of the interface name.
    pub name_len_offset: usize,
    /// First byte of the interface name.
    pub name_offset: usize,
}

impl RecordLayout {
    /// Darwin `if_msghdr` + `if_data` + `sockaddr_dl`, as returned by
    /// `sysctl(NET_RT_IFLIST)`.
    pub const DARWIN: Self = Self {
        length_offset: 0,      // ifm_msglen
        kind_offset: 3,        // ifm_type
        ifinfo_kind: 0x0e,     // RTM_IFINFO
        flags_offset: 8,       // ifm_flags
        flag_up: 0x1,          // IFF_UP
        flag_loopback: 0x8,    // IFF_LOOPBACK
        in_bytes_offset: 56,   // ifm_data.ifi_ibytes
        out_bytes_offset: 60,  // ifm_data.ifi_obytes
        counter_width: CounterWidth::W32,
        header_len: 112,       // sizeof(struct if_msghdr)
        link_family_offset: 1, // sdl_family
        link_family: 18,       // AF_LINK
        name_len_offset: 5,    // sdl_nlen
        name_offset: 8,        // sdl_data
    };

    /// Bytes every record must have before its length and kind can be read.
    pub fn prefix_len(&self) -> usize {
        (self.length_offset + 2).max(self.kind_offset + 1)
    }

    /// Smallest interface-info record holding all fixed fields.
    pub fn ifinfo_min_len(&self) -> usize {
        let counters = self.counter_width.storage_bytes();
        (self.header_len + self.name_offset)
            .max(self.flags_offset + 4)
            .max(self.in_bytes_offset + counters)
            .max(self.out_bytes_offset + counters)
    }

    /// Split the next record off the front of `buf`.
    fn frame<'a>(&self, buf: &'a [u8]) -> Result<&'a [u8], ParseErrorKind> {
        let remaining = buf.len();
        if remaining < self.prefix_len() {
            return Err(ParseErrorKind::TruncatedHeader { remaining });
        }
        let declared = read_u16(buf, self.length_offset)
            .map(usize::from)
            .ok_or(ParseErrorKind::TruncatedHeader { remaining })?;
        if declared == 0 {
            return Err(ParseErrorKind::ZeroLength);
        }
        if declared < self.prefix_len() {
            return Err(ParseErrorKind::ShortRecord {
                declared,
                required: self.prefix_len(),
            });
        }
        buf.get(..declared).ok_or(ParseErrorKind::Overrun {
            declared,
            remaining,
        })
    }

    /// Decode one framed record, or say why it was skipped.
    fn decode(&self, record: &[u8]) -> Result<Decoded, ParseErrorKind> {
        let kind = record[self.kind_offset];
        if kind != self.ifinfo_kind {
            return Ok(Decoded::Skipped(Skip::Kind(kind)));
        }

        let declared = record.len();
        let required = self.ifinfo_min_len();
        if declared < required {
            return Err(ParseErrorKind::ShortRecord { declared, required });
        }
        let short = ParseErrorKind::ShortRecord { declared, required };

        let flags = read_u32(record, self.flags_offset).ok_or(short)?;
        let loopback = flags & self.flag_loopback != 0;
        if loopback {
            return Ok(Decoded::Skipped(Skip::Loopback));
        }

        let link = &record[self.header_len..];
        let family = *link.get(self.link_family_offset).ok_or(short)?;
        if family != self.link_family {
            return Ok(Decoded::Skipped(Skip::NotLinkLayer(family)));
        }

        let name_len = usize::from(*link.get(self.name_len_offset).ok_or(short)?);
        if name_len == 0 {
            return Ok(Decoded::Skipped(Skip::EmptyName));
        }
        let available = link.len() - self.name_offset;
        let name = link
            .get(self.name_offset..self.name_offset + name_len)
            .ok_or(ParseErrorKind::NameOverrun {
                name_len,
                available,
            })?;

        let raw_in = self.read_counter(record, self.in_bytes_offset).ok_or(short)?;
        let raw_out = self
            .read_counter(record, self.out_bytes_offset)
            .ok_or(short)?;

        Ok(Decoded::Observation(RawObservation {
            name: String::from_utf8_lossy(name).into_owned(),
            raw_in,
            raw_out,
            up: flags & self.flag_up != 0,
            loopback,
        }))
    }

    fn read_counter(&self, record: &[u8], offset: usize) -> Option<u64> {
        let raw = match self.counter_width.storage_bytes() {
            1 => u64::from(*record.get(offset)?),
            2 => u64::from(read_u16(record, offset)?),
            4 => u64::from(read_u32(record, offset)?),
            _ => read_u64(record, offset)?,
        };
        Some(self.counter_width.mask(raw))
    }
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::DARWIN
    }
}

fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_ne_bytes(bytes.try_into().ok()?))
}

fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_ne_bytes(bytes.try_into().ok()?))
}

fn read_u64(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset + 8)?;
    Some(u64::from_ne_bytes(bytes.try_into().ok()?))
}

enum Decoded {
    Observation(RawObservation),
    Skipped(Skip),
}

#[derive(Debug)]
enum Skip {
    Kind(u8),
    Loopback,
    NotLinkLayer(u8),
    EmptyName,
}

/// Lazy iterator over the qualifying records of one buffer.
///
/// Yields one [`RawObservation`] per interface-info record that passes the
/// filters. A malformed record yields a single `Err` and ends the iteration.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buf: &'a [u8],
    cursor: usize,
    layout: RecordLayout,
    skipped: usize,
    failed: bool,
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8], layout: RecordLayout) -> Self {
        Self {
            buf,
            cursor: 0,
            layout,
            skipped: 0,
            failed: false,
        }
    }

    /// Records passed over so far (other kinds, loopback, non link-layer, unnamed).
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Byte offset of the next record to decode.
    pub fn offset(&self) -> usize {
        self.cursor
    }
}

impl Iterator for Records<'_> {
    type Item = Result<RawObservation, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.cursor < self.buf.len() {
            let offset = self.cursor;
            let buf = self.buf;
            let decoded = match self.layout.frame(&buf[offset..]) {
                Ok(record) => {
                    self.cursor += record.len();
                    self.layout.decode(record)
                }
                Err(kind) => Err(kind),
            };

            match decoded {
                Ok(Decoded::Observation(obs)) => return Some(Ok(obs)),
                Ok(Decoded::Skipped(reason)) => {
                    log::trace!("skipping record at offset {offset}: {reason:?}");
                    self.skipped += 1;
                }
                Err(kind) => {
                    self.failed = true;
                    return Some(Err(ParseError { offset, kind }));
                }
            }
        }
        None
    }
}

impl FusedIterator for Records<'_> {}

/// Parse `buf` with the given layout.
pub fn parse(buf: &[u8], layout: RecordLayout) -> Records<'_> {
    Records::new(buf, layout)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders for Darwin-layout records.

    use super::RecordLayout;

    pub const RTM_NEWADDR: u8 = 0x0c;
    pub const IFF_UP: u32 = 0x1;
    pub const IFF_LOOPBACK: u32 = 0x8;
    pub const AF_INET: u8 = 2;

    pub fn ifinfo_with_family(
        name: &str,
        flags: u32,
        raw_in: u32,
        raw_out: u32,
        family: u8,
    ) -> Vec<u8> {
        let l = RecordLayout::DARWIN;
        let link_start = l.header_len;
        let len = link_start + l.name_offset + name.len().max(12);
        let mut rec = vec![0u8; len];
        rec[l.length_offset..l.length_offset + 2].copy_from_slice(&(len as u16).to_ne_bytes());
        rec[2] = 5; // RTM_VERSION
        rec[l.kind_offset] = l.ifinfo_kind;
        rec[l.flags_offset..l.flags_offset + 4].copy_from_slice(&flags.to_ne_bytes());
        rec[l.in_bytes_offset..l.in_bytes_offset + 4].copy_from_slice(&raw_in.to_ne_bytes());
        rec[l.out_bytes_offset..l.out_bytes_offset + 4].copy_from_slice(&raw_out.to_ne_bytes());
        rec[link_start] = (l.name_offset + name.len().max(12)) as u8; // sdl_len
        rec[link_start + l.link_family_offset] = family;
        rec[link_start + l.name_len_offset] = name.len() as u8;
        let name_at = link_start + l.name_offset;
        rec[name_at..name_at + name.len()].copy_from_slice(name.as_bytes());
        rec
    }

    pub fn ifinfo(name: &str, flags: u32, raw_in: u32, raw_out: u32) -> Vec<u8> {
        ifinfo_with_family(name, flags, raw_in, raw_out, RecordLayout::DARWIN.link_family)
    }

    pub fn other_kind(kind: u8, len: usize) -> Vec<u8> {
        let mut rec = vec![0xAAu8; len];
        rec[0..2].copy_from_slice(&(len as u16).to_ne_bytes());
        rec[3] = kind;
        rec
    }
}
