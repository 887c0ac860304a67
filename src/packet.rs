//! Transport stream packet header, adaptation field, and packet-size autodetection.

use crate::byte_reader::{read_bitfield, ByteReader};
use crate::error::{Error, Result};
use log::warn;
use modular_bitfield_msb::prelude::*;
use std::fmt::{Debug, Formatter};

/// The two packet sizes a transport stream file may use.
///
/// `Timestamped192` carries a 4-byte opaque prefix (commonly a capture timestamp) before each
/// 188-byte TS packet; `Raw188` has no such prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketSize {
    /// Plain 188-byte TS packets.
    Raw188,
    /// 192-byte packets: 4 opaque bytes followed by a 188-byte TS packet.
    Timestamped192,
}

impl PacketSize {
    /// The size in bytes of one packet at this [`PacketSize`].
    pub fn byte_len(self) -> usize {
        match self {
            PacketSize::Raw188 => 188,
            PacketSize::Timestamped192 => 192,
        }
    }

    fn start_offset(self) -> usize {
        match self {
            PacketSize::Raw188 => 0,
            PacketSize::Timestamped192 => 4,
        }
    }
}

/// TSC information carried in a packet header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, BitfieldSpecifier)]
#[bits = 2]
pub enum TransportScramblingControl {
    /// Not scrambled.
    NotScrambled,
    /// Reserved; do not use.
    Reserved,
    /// Scrambled with the even key.
    ScrambledEvenKey,
    /// Scrambled with the odd key.
    ScrambledOddKey,
}

/// Link-layer header found at the start of every TS packet (after any 4-byte TTS prefix).
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub sync_byte: B8,
    pub transport_error_indicator: bool,
    pub payload_unit_start_indicator: bool,
    pub transport_priority: bool,
    pub pid: B13,
    pub transport_scrambling_control: TransportScramblingControl,
    pub has_adaptation_field: bool,
    pub has_payload: bool,
    pub continuity_counter: B4,
}

/// Header for the optional adaptation field, naming which conditional sub-fields follow.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct AdaptationFieldHeader {
    pub length: B8,
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub elementary_stream_priority_indicator: bool,
    pub has_pcr: bool,
    pub has_opcr: bool,
    pub has_splice_countdown: bool,
    pub has_transport_private_data: bool,
    pub has_adaptation_field_extension: bool,
}

/// Header for the adaptation field extension, naming which of its own sub-fields follow.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct AdaptationFieldExtensionHeader {
    pub length: B8,
    pub ltw_flag: bool,
    pub piecewise_rate_flag: bool,
    pub seamless_splice_flag: bool,
    #[skip]
    reserved: B5,
}

/// Legal time window, signaling when a packet may legally be removed from a decoder buffer.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct LegalTimeWindow {
    pub valid_flag: bool,
    pub offset: B15,
}

/// Piecewise rate used while splicing, in units of 188-byte packets per 300 27MHz clock ticks.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct PiecewiseRate {
    #[skip]
    reserved: B2,
    pub rate: B22,
}

/// Seamless splice information: the splice type and the DTS of the next access unit.
#[derive(Debug, Clone, Copy)]
pub struct SeamlessSplice {
    /// Splice type, defined by the associated stream's coding.
    pub splice_type: u8,
    /// DTS of the first access unit following the splice point, a 33-bit 90kHz timestamp.
    pub dts_next_au: u64,
}

/// Program clock reference (PCR): synchronizes the decoder's clock with the encoder's.
#[derive(Default, Copy, Clone)]
pub struct PcrTimestamp {
    /// 33 bits of a 90kHz base clock. May be formatted with [`crate::pts_format_args`].
    pub base: u64,
    /// 9 bits of a 27MHz clock rolling over every 300 counts to the base.
    pub extension: u16,
}

impl Debug for PcrTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcrTimestamp")
            .field("base", &crate::pts_format_args!(self.base))
            .field("extension", &self.extension)
            .finish()
    }
}

fn parse_marked_33(b: &[u8; 5]) -> u64 {
    let mut ts: u64 = ((b[0] & 0x0E) as u64) << 29;
    ts |= (b[1] as u64) << 22;
    ts |= ((b[2] & 0xFE) as u64) << 14;
    ts |= (b[3] as u64) << 7;
    ts |= ((b[4] & 0xFE) as u64) >> 1;
    ts
}

fn parse_pcr(b: &[u8; 6]) -> PcrTimestamp {
    let mut base: u64 = (b[0] as u64) << 25;
    base |= (b[1] as u64) << 17;
    base |= (b[2] as u64) << 9;
    base |= (b[3] as u64) << 1;
    base |= (b[4] as u64) >> 7;

    let mut extension: u16 = ((b[4] & 0x1) as u16) << 8;
    extension |= b[5] as u16;
    PcrTimestamp { base, extension }
}

/// Optional extension of the adaptation field.
#[derive(Debug)]
pub struct AdaptationFieldExtension {
    /// Which sub-fields are present.
    pub header: AdaptationFieldExtensionHeader,
    /// Legal time window, if present.
    pub ltw: Option<LegalTimeWindow>,
    /// Piecewise rate, if present.
    pub piecewise_rate: Option<PiecewiseRate>,
    /// Seamless splice info, if present.
    pub seamless_splice: Option<SeamlessSplice>,
}

fn read_adaptation_field_extension(
    reader: &mut ByteReader,
) -> Result<AdaptationFieldExtension> {
    let header: AdaptationFieldExtensionHeader = read_bitfield!(reader, AdaptationFieldExtensionHeader);
    let extension_length = header.length() as usize;
    if extension_length == 0 {
        return Ok(AdaptationFieldExtension {
            header,
            ltw: None,
            piecewise_rate: None,
            seamless_splice: None,
        });
    }
    let mut ext_reader = reader.sub_reader(extension_length)?;
    let ltw = if header.ltw_flag() {
        if ext_reader.remaining_len() < 2 {
            return Err(Error::MalformedAdaptationField("short read of LTW"));
        }
        Some(read_bitfield!(ext_reader, LegalTimeWindow))
    } else {
        None
    };
    let piecewise_rate = if header.piecewise_rate_flag() {
        if ext_reader.remaining_len() < 3 {
            return Err(Error::MalformedAdaptationField("short read of piecewise rate"));
        }
        Some(read_bitfield!(ext_reader, PiecewiseRate))
    } else {
        None
    };
    let seamless_splice = if header.seamless_splice_flag() {
        if ext_reader.remaining_len() < 5 {
            return Err(Error::MalformedAdaptationField("short read of seamless splice"));
        }
        let bytes = ext_reader.read_array_ref::<5>()?;
        Some(SeamlessSplice {
            splice_type: (bytes[0] & 0xF0) >> 4,
            dts_next_au: parse_marked_33(bytes),
        })
    } else {
        None
    };
    Ok(AdaptationFieldExtension {
        header,
        ltw,
        piecewise_rate,
        seamless_splice,
    })
}

/// Non-payload packet metadata.
#[derive(Debug)]
pub struct AdaptationField {
    /// Header describing which fields are contained.
    pub header: AdaptationFieldHeader,
    /// Program Clock Reference, if present.
    pub pcr: Option<PcrTimestamp>,
    /// Original Program Clock Reference, if present.
    pub opcr: Option<PcrTimestamp>,
    /// Splice countdown, if present; number of packets until a splicing point.
    pub splice_countdown: Option<i8>,
    /// Transport private data, if present.
    pub transport_private_data: Option<Vec<u8>>,
    /// Adaptation field extension, if present.
    pub extension: Option<AdaptationFieldExtension>,
}

fn read_adaptation_field(reader: &mut ByteReader) -> Result<AdaptationField> {
    let adaptation_field_length = reader.read_u8()? as usize;
    if adaptation_field_length > 183 {
        warn!("adaptation field length {} exceeds maximum", adaptation_field_length);
        return Err(Error::MalformedAdaptationField("length exceeds 183"));
    }
    if adaptation_field_length == 0 {
        // No following byte at all, not even the flags byte: an adaptation field of length 0 is
        // exactly the one length byte just read.
        let header = AdaptationFieldHeader::from_bytes([0, 0]);
        return Ok(AdaptationField {
            header,
            pcr: None,
            opcr: None,
            splice_countdown: None,
            transport_private_data: None,
            extension: None,
        });
    }
    let flags_byte = reader.read_u8()?;
    let header = AdaptationFieldHeader::from_bytes([adaptation_field_length as u8, flags_byte]);
    let mut a_reader = reader.sub_reader(adaptation_field_length - 1)?;

    let pcr = if header.has_pcr() {
        if a_reader.remaining_len() < 6 {
            return Err(Error::MalformedAdaptationField("short read of PCR"));
        }
        Some(parse_pcr(a_reader.read_array_ref::<6>()?))
    } else {
        None
    };
    let opcr = if header.has_opcr() {
        if a_reader.remaining_len() < 6 {
            return Err(Error::MalformedAdaptationField("short read of OPCR"));
        }
        Some(parse_pcr(a_reader.read_array_ref::<6>()?))
    } else {
        None
    };
    let splice_countdown = if header.has_splice_countdown() {
        if a_reader.remaining_len() < 1 {
            return Err(Error::MalformedAdaptationField("short read of splice countdown"));
        }
        Some(a_reader.read_u8()? as i8)
    } else {
        None
    };
    let transport_private_data = if header.has_transport_private_data() {
        if a_reader.remaining_len() < 1 {
            return Err(Error::MalformedAdaptationField(
                "short read of private data length",
            ));
        }
        let len = a_reader.read_u8()? as usize;
        Some(a_reader.read(len)?.to_vec())
    } else {
        None
    };
    let extension = if header.has_adaptation_field_extension() {
        Some(read_adaptation_field_extension(&mut a_reader)?)
    } else {
        None
    };

    Ok(AdaptationField {
        header,
        pcr,
        opcr,
        splice_countdown,
        transport_private_data,
        extension,
    })
}

/// One parsed 188- or 192-byte transport stream packet, borrowing from the buffer it was read
/// from.
#[derive(Debug)]
pub struct TsPacket<'a> {
    bytes: &'a [u8],
    packet_size: PacketSize,
    header: PacketHeader,
    adaptation_field: Option<AdaptationField>,
    payload_offset: usize,
}

impl<'a> TsPacket<'a> {
    /// Parses one packet, autodetecting whether it is 188 or 192 bytes by checking for the sync
    /// byte at offset 0 and then offset 4.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if !bytes.is_empty() && bytes[0] == 0x47 {
            Self::parse_with_size(bytes, PacketSize::Raw188)
        } else if bytes.len() > 4 && bytes[4] == 0x47 {
            Self::parse_with_size(bytes, PacketSize::Timestamped192)
        } else {
            Err(Error::LostSync(bytes.first().copied().unwrap_or(0)))
        }
    }

    /// Parses one packet at a known [`PacketSize`], without autodetection.
    pub fn parse_with_size(bytes: &'a [u8], packet_size: PacketSize) -> Result<Self> {
        let start_offset = packet_size.start_offset();
        if bytes.len() < start_offset + 188 {
            return Err(Error::PacketOverrun {
                requested: start_offset + 188,
                available: bytes.len(),
            });
        }
        let packet_bytes = &bytes[..packet_size.byte_len()];
        let mut reader = ByteReader::new(&packet_bytes[start_offset..]);
        let header: PacketHeader = read_bitfield!(reader, PacketHeader);
        if header.sync_byte() != 0x47 {
            return Err(Error::LostSync(header.sync_byte()));
        }

        let mut adaptation_field = None;
        if header.has_adaptation_field() && header.pid() != 0x1fff {
            adaptation_field = Some(read_adaptation_field(&mut reader)?);
        } else if header.has_adaptation_field() {
            // NULL packets are parsed for header completeness only.
            adaptation_field = read_adaptation_field(&mut reader).ok();
        }

        let payload_offset = packet_size.byte_len() - reader.remaining_len();

        Ok(TsPacket {
            bytes: packet_bytes,
            packet_size,
            header,
            adaptation_field,
            payload_offset,
        })
    }

    /// The detected/assumed packet size.
    pub fn packet_size(&self) -> PacketSize {
        self.packet_size
    }

    /// The link-layer header.
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// The packet's PID.
    pub fn pid(&self) -> u16 {
        self.header.pid()
    }

    /// Whether the payload-unit-start indicator is set.
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.header.payload_unit_start_indicator()
    }

    /// Whether this packet carries an adaptation field.
    pub fn has_adaptation_field(&self) -> bool {
        self.header.has_adaptation_field()
    }

    /// Whether this packet carries a payload.
    pub fn has_payload(&self) -> bool {
        self.header.has_payload()
    }

    /// The parsed adaptation field, if present.
    pub fn adaptation_field(&self) -> Option<&AdaptationField> {
        self.adaptation_field.as_ref()
    }

    /// The packet's payload bytes, if present.
    pub fn payload(&self) -> Option<&'a [u8]> {
        if self.has_payload() {
            Some(&self.bytes[self.payload_offset..])
        } else {
            None
        }
    }

    /// An owned snapshot of the entire packet, including any 4-byte TTS prefix.
    pub fn copy(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat_packet_188() -> Vec<u8> {
        let mut p = vec![0xFFu8; 188];
        p[0] = 0x47;
        p[1] = 0x40; // PUSI set, PID high bits 0
        p[2] = 0x00; // PID = 0x0000 (PAT)
        p[3] = 0x10; // no AF, has payload, CC=0
        p[4] = 0x00; // pointer field
        p
    }

    #[test]
    fn autodetects_188() {
        let p = pat_packet_188();
        let packet = TsPacket::parse(&p).unwrap();
        assert_eq!(packet.packet_size(), PacketSize::Raw188);
        assert_eq!(packet.pid(), 0);
        assert!(packet.payload_unit_start_indicator());
        assert!(!packet.has_adaptation_field());
    }

    #[test]
    fn autodetects_192() {
        let mut p = vec![0xAB, 0xCD, 0xEF, 0x01];
        p.extend_from_slice(&pat_packet_188());
        let packet = TsPacket::parse(&p).unwrap();
        assert_eq!(packet.packet_size(), PacketSize::Timestamped192);
        assert_eq!(packet.pid(), 0);
    }

    #[test]
    fn lost_sync_is_reported() {
        let mut p = pat_packet_188();
        p[0] = 0x00;
        assert!(matches!(TsPacket::parse(&p), Err(Error::LostSync(0x00))));
    }

    #[test]
    fn adaptation_field_with_pcr() {
        let mut p = vec![0xFFu8; 188];
        p[0] = 0x47;
        p[1] = 0x00;
        p[2] = 0x11;
        p[3] = 0x20; // AF only, no payload
        p[4] = 7; // adaptation_field_length
        p[5] = 0x10; // has_pcr
        // PCR base=1, extension=0: base's LSB is the top bit of the 5th PCR byte.
        p[6] = 0x00;
        p[7] = 0x00;
        p[8] = 0x00;
        p[9] = 0x00;
        p[10] = 0x80;
        p[11] = 0x00;
        let packet = TsPacket::parse(&p).unwrap();
        assert!(!packet.has_payload());
        let af = packet.adaptation_field().unwrap();
        assert_eq!(af.pcr.unwrap().base, 1);
    }

    #[test]
    fn zero_length_adaptation_field_does_not_consume_a_flags_byte() {
        let mut p = vec![0xFFu8; 188];
        p[0] = 0x47;
        p[1] = 0x40; // PUSI set
        p[2] = 0x00;
        p[3] = 0x30; // AF present, has payload, CC=0
        p[4] = 0; // adaptation_field_length = 0
        p[5] = 0xAB; // first byte of payload, immediately after the single length byte
        let packet = TsPacket::parse(&p).unwrap();
        let af = packet.adaptation_field().unwrap();
        assert_eq!(af.header.length(), 0);
        assert!(af.pcr.is_none());
        assert_eq!(packet.payload().unwrap()[0], 0xAB);
    }
}
