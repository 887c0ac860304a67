//! PSI section header parsing and multi-packet section reassembly.
//!
//! A PSI section may span several TS packets: a packet with `payload_unit_start_indicator=1`
//! carries a pointer field, the 8-byte section header, and as much of the body as fits;
//! subsequent packets on the same PID with `payload_unit_start_indicator=0` carry raw
//! continuation bytes until the declared `section_length` is satisfied.

use crate::byte_reader::ByteReader;
use crate::cat_tsdt::{CatInfo, TsdtInfo};
use crate::error::{Error, Result};
use crate::nit::NitInfo;
use crate::pat::PatInfo;
use crate::pmt::PmtInfo;
use enum_dispatch::enum_dispatch;
use modular_bitfield_msb::prelude::*;
use smallvec::SmallVec;

#[cfg(feature = "crc-validate")]
use crc::{Crc, CRC_32_MPEG_2};

#[cfg(feature = "crc-validate")]
const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Well-known table ids this crate understands.
pub mod table_id {
    /// Program Association Table.
    pub const PAT: u8 = 0x00;
    /// Conditional Access Table.
    pub const CAT: u8 = 0x01;
    /// Program Map Table.
    pub const PMT: u8 = 0x02;
    /// Transport Stream Description Table.
    pub const TSDT: u8 = 0x03;
    /// Network Information Table, actual network.
    pub const NIT_ACTUAL: u8 = 0x40;
    /// Network Information Table, other network.
    pub const NIT_OTHER: u8 = 0x41;
}

/// An opaque, tagged descriptor: a 1-byte tag followed by a 1-byte length and that many bytes.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Descriptor tag.
    pub tag: u8,
    /// Descriptor payload bytes.
    pub data: SmallVec<[u8; 8]>,
}

impl Descriptor {
    pub(crate) fn read_one(reader: &mut ByteReader) -> Result<Descriptor> {
        let tag_len = reader.read_array_ref::<2>()?;
        let mut data = SmallVec::<[u8; 8]>::new();
        data.extend_from_slice(reader.read(tag_len[1] as usize)?);
        Ok(Descriptor {
            tag: tag_len[0],
            data,
        })
    }

    pub(crate) fn read_all(reader: &mut ByteReader) -> Result<Vec<Descriptor>> {
        let mut out = Vec::new();
        while reader.remaining_len() > 0 {
            out.push(Descriptor::read_one(reader)?);
        }
        Ok(out)
    }
}

#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PsiSectionHeader {
    pub table_id: B8,
    pub section_syntax_indicator: bool,
    pub hard_zero: bool,
    #[skip]
    reserved: B2,
    pub section_length: B12,
}

#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PsiTableSyntax {
    pub table_id_extension: B16,
    #[skip]
    reserved: B2,
    pub version_number: B5,
    pub current_next_indicator: bool,
    pub section_number: B8,
    pub last_section_number: B8,
}

/// Identifying metadata of an assembled PSI section, handed to each table-specific parser.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeaderInfo {
    /// PID the section was carried on.
    pub pid: u16,
    /// Table id, e.g. [`table_id::PAT`].
    pub table_id: u8,
    /// 16-bit field whose meaning depends on the table (transport_stream_id for PAT, program
    /// number for PMT, network_id for NIT).
    pub table_id_extension: u16,
    /// Version number of the table definition.
    pub version_number: u8,
    /// Whether this section is currently applicable.
    pub current_next_indicator: bool,
    /// This section's number.
    pub section_number: u8,
    /// The highest section number in the table this section belongs to.
    pub last_section_number: u8,
}

/// A fully assembled and parsed PSI table.
#[derive(Debug)]
pub enum Table {
    /// Program Association Table.
    Pat(PatInfo),
    /// Program Map Table.
    Pmt(PmtInfo),
    /// Conditional Access Table.
    Cat(CatInfo),
    /// Transport Stream Description Table.
    Tsdt(TsdtInfo),
    /// Network Information Table.
    Nit(NitInfo),
}

#[enum_dispatch]
trait SectionFinisher {
    fn finish_section(&self, body: &[u8], info: &SectionHeaderInfo) -> Result<Table>;
}

struct PatFinisher;
impl SectionFinisher for PatFinisher {
    fn finish_section(&self, body: &[u8], info: &SectionHeaderInfo) -> Result<Table> {
        crate::pat::parse_pat_section(body, info).map(Table::Pat)
    }
}

struct PmtFinisher;
impl SectionFinisher for PmtFinisher {
    fn finish_section(&self, body: &[u8], info: &SectionHeaderInfo) -> Result<Table> {
        crate::pmt::parse_pmt_section(body, info).map(Table::Pmt)
    }
}

struct CatFinisher;
impl SectionFinisher for CatFinisher {
    fn finish_section(&self, body: &[u8], info: &SectionHeaderInfo) -> Result<Table> {
        crate::cat_tsdt::parse_cat_section(body, info).map(Table::Cat)
    }
}

struct TsdtFinisher;
impl SectionFinisher for TsdtFinisher {
    fn finish_section(&self, body: &[u8], info: &SectionHeaderInfo) -> Result<Table> {
        crate::cat_tsdt::parse_tsdt_section(body, info).map(Table::Tsdt)
    }
}

struct NitFinisher {
    actual: bool,
}
impl SectionFinisher for NitFinisher {
    fn finish_section(&self, body: &[u8], info: &SectionHeaderInfo) -> Result<Table> {
        crate::nit::parse_nit_section(body, info, self.actual).map(Table::Nit)
    }
}

#[enum_dispatch(SectionFinisher)]
enum SectionKind {
    Pat(PatFinisher),
    Pmt(PmtFinisher),
    Cat(CatFinisher),
    Tsdt(TsdtFinisher),
    Nit(NitFinisher),
}

fn section_kind_for_table_id(table_id: u8) -> Option<SectionKind> {
    match table_id {
        table_id::PAT => Some(SectionKind::Pat(PatFinisher)),
        table_id::PMT => Some(SectionKind::Pmt(PmtFinisher)),
        table_id::CAT => Some(SectionKind::Cat(CatFinisher)),
        table_id::TSDT => Some(SectionKind::Tsdt(TsdtFinisher)),
        table_id::NIT_ACTUAL => Some(SectionKind::Nit(NitFinisher { actual: true })),
        table_id::NIT_OTHER => Some(SectionKind::Nit(NitFinisher { actual: false })),
        _ => None,
    }
}

/// Accumulates a PSI section's body across one or more continuation packets.
pub(crate) struct SectionAssembler {
    info: SectionHeaderInfo,
    kind: SectionKind,
    #[cfg_attr(not(feature = "crc-validate"), allow(dead_code))]
    header_bytes: [u8; 8],
    data: Vec<u8>,
    remaining: usize,
}

impl SectionAssembler {
    fn append_bytes(&mut self, payload: &[u8]) -> bool {
        let take = payload.len().min(self.remaining);
        self.data.extend_from_slice(&payload[..take]);
        self.remaining -= take;
        self.remaining == 0
    }

    /// Appends a continuation packet's raw payload. Returns the parsed table once complete.
    pub fn append(&mut self, payload: &[u8]) -> Result<Option<Table>> {
        if self.append_bytes(payload) {
            self.finish().map(Some)
        } else {
            Ok(None)
        }
    }

    fn finish(&mut self) -> Result<Table> {
        let body_len = self.data.len() - 4;

        #[cfg(feature = "crc-validate")]
        {
            let mut digest = CRC.digest();
            digest.update(&self.header_bytes);
            digest.update(&self.data[..body_len]);
            let calculated = digest.finalize();
            let expected = u32::from_be_bytes(self.data[body_len..].try_into().unwrap());
            if calculated != expected {
                return Err(Error::SectionCrcMismatch {
                    expected,
                    calculated,
                });
            }
        }

        self.kind.finish_section(&self.data[..body_len], &self.info)
    }
}

/// Outcome of trying to start a section from a `payload_unit_start_indicator=1` packet's
/// payload.
pub(crate) enum StartOutcome {
    /// The section completed within this single packet.
    Complete(Table),
    /// The section needs more continuation packets.
    Pending(SectionAssembler),
    /// The payload was not a recognized PSI section (not a section at all, or an uninteresting
    /// table id).
    NotASection,
}

/// Attempts to start a PSI section from `payload`, the payload of a
/// `payload_unit_start_indicator=1` packet (pointer field included).
pub(crate) fn start_section(pid: u16, payload: &[u8]) -> Result<StartOutcome> {
    if payload.is_empty() {
        return Ok(StartOutcome::NotASection);
    }
    let mut reader = ByteReader::new(payload);
    let pointer_field = reader.read_u8()?;
    if reader.remaining_len() < pointer_field as usize {
        return Ok(StartOutcome::NotASection);
    }
    reader.skip(pointer_field as usize)?;

    if reader.remaining_len() < 3 {
        return Ok(StartOutcome::NotASection);
    }
    let header_bytes_0 = *reader.read_array_ref::<3>()?;
    let header = PsiSectionHeader::from_bytes(header_bytes_0);
    if !header.section_syntax_indicator() || header.hard_zero() || header.table_id() == 0xFF {
        return Ok(StartOutcome::NotASection);
    }
    let section_length = header.section_length();
    if section_length >= 0x3FD {
        return Err(Error::MalformedSection("section_length 0x3FD or greater"));
    }

    let kind = match section_kind_for_table_id(header.table_id()) {
        Some(k) => k,
        None => return Ok(StartOutcome::NotASection),
    };

    if section_length < 5 {
        return Err(Error::MalformedSection(
            "section_length too small for table syntax",
        ));
    }
    if reader.remaining_len() < 5 {
        return Err(Error::MalformedSection("short read of PSI table syntax"));
    }
    let header_bytes_1 = *reader.read_array_ref::<5>()?;
    let syntax = PsiTableSyntax::from_bytes(header_bytes_1);

    let mut header_bytes = [0u8; 8];
    header_bytes[..3].copy_from_slice(&header_bytes_0);
    header_bytes[3..].copy_from_slice(&header_bytes_1);

    let info = SectionHeaderInfo {
        pid,
        table_id: header.table_id(),
        table_id_extension: syntax.table_id_extension(),
        version_number: syntax.version_number(),
        current_next_indicator: syntax.current_next_indicator(),
        section_number: syntax.section_number(),
        last_section_number: syntax.last_section_number(),
    };

    let body_and_crc_len = (section_length - 5) as usize;
    let mut assembler = SectionAssembler {
        info,
        kind,
        header_bytes,
        data: Vec::with_capacity(body_and_crc_len),
        remaining: body_and_crc_len,
    };

    let rest = reader.read_to_end();
    if assembler.append_bytes(rest) {
        Ok(StartOutcome::Complete(assembler.finish()?))
    } else {
        Ok(StartOutcome::Pending(assembler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat_payload() -> Vec<u8> {
        // pointer_field=0, table_id=0x00, ssi=1, hard_zero=0, section_length=13 (0x00D)
        let mut v = vec![0x00, 0x00, 0xB0, 0x0D];
        // table_id_extension=1, version=0, cni=1, section_number=0, last_section_number=0
        v.extend_from_slice(&[0x00, 0x01, 0xC1, 0x00, 0x00]);
        // one PAT entry: program_number=1, pmt_pid=0x0020
        v.extend_from_slice(&[0x00, 0x01, 0xE0, 0x20]);
        // CRC32 placeholder (not validated by default)
        v.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        v
    }

    #[test]
    fn completes_within_one_packet() {
        let payload = pat_payload();
        match start_section(0x0000, &payload).unwrap() {
            StartOutcome::Complete(Table::Pat(pat)) => {
                assert_eq!(pat.transport_stream_id, 1);
                assert_eq!(pat.programs.len(), 1);
                assert_eq!(pat.programs[0].pmt_pid, 0x0020);
            }
            other => panic!("expected a complete PAT, got {:?}", matches_name(&other)),
        }
    }

    fn matches_name(o: &StartOutcome) -> &'static str {
        match o {
            StartOutcome::Complete(_) => "Complete",
            StartOutcome::Pending(_) => "Pending",
            StartOutcome::NotASection => "NotASection",
        }
    }

    #[test]
    fn splits_across_continuation_packet() {
        let payload = pat_payload();
        let (first, second) = payload.split_at(payload.len() - 2);
        match start_section(0x0000, first).unwrap() {
            StartOutcome::Pending(mut assembler) => {
                let table = assembler.append(second).unwrap().unwrap();
                match table {
                    Table::Pat(pat) => assert_eq!(pat.programs[0].pmt_pid, 0x0020),
                    _ => panic!("expected PAT"),
                }
            }
            _ => panic!("expected a pending assembler"),
        }
    }

    #[test]
    fn non_section_payload_is_rejected() {
        let payload = [0x00, 0x00, 0x00, 0x01, 0xE0, 0x00];
        match start_section(0x0100, &payload).unwrap() {
            StartOutcome::NotASection => {}
            _ => panic!("expected NotASection"),
        }
    }
}
