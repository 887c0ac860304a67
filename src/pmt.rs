//! Program Map Table parsing and stream type labeling.

use crate::byte_reader::ByteReader;
use crate::error::Result;
use crate::psi::{Descriptor, SectionHeaderInfo};

/// One elementary stream declared by a PMT.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream type, see [`stream_type_to_str`].
    pub stream_type: u8,
    /// PID carrying this elementary stream.
    pub elementary_pid: u16,
    /// Descriptors attached to this stream.
    pub es_descriptors: Vec<Descriptor>,
}

/// Parsed Program Map Table.
#[derive(Debug, Clone)]
pub struct PmtInfo {
    /// PID the PMT itself was carried on.
    pub pmt_pid: u16,
    /// Program number, carried as the section's `table_id_extension`.
    pub program_number: u16,
    /// PID carrying this program's PCR.
    pub pcr_pid: u16,
    /// Program-level descriptors.
    pub program_info_descriptors: Vec<Descriptor>,
    /// Every elementary stream declared by the PMT, in file order.
    pub streams: Vec<StreamInfo>,
    /// Packet number (0-based) at which this PMT was found complete.
    pub packet_number: u64,
}

pub(crate) fn parse_pmt_section(body: &[u8], info: &SectionHeaderInfo) -> Result<PmtInfo> {
    let mut reader = ByteReader::new(body);
    let head = reader.read_array_ref::<4>()?;
    let pcr_pid = u16::from_be_bytes([head[0], head[1]]) & 0x1FFF;
    let program_info_length = (u16::from_be_bytes([head[2], head[3]]) & 0x0FFF) as usize;

    let mut info_reader = reader.sub_reader(program_info_length)?;
    let program_info_descriptors = Descriptor::read_all(&mut info_reader)?;

    let mut streams = Vec::new();
    while reader.remaining_len() >= 5 {
        let es_head = reader.read_array_ref::<5>()?;
        let stream_type = es_head[0];
        let elementary_pid = u16::from_be_bytes([es_head[1], es_head[2]]) & 0x1FFF;
        let es_info_length = (u16::from_be_bytes([es_head[3], es_head[4]]) & 0x0FFF) as usize;
        let mut es_reader = reader.sub_reader(es_info_length)?;
        let es_descriptors = Descriptor::read_all(&mut es_reader)?;
        streams.push(StreamInfo {
            stream_type,
            elementary_pid,
            es_descriptors,
        });
    }

    Ok(PmtInfo {
        pmt_pid: info.pid,
        program_number: info.table_id_extension,
        pcr_pid,
        program_info_descriptors,
        streams,
        packet_number: 0,
    })
}

/// Human-readable label for an ISO/IEC 13818-1 PMT stream type.
///
/// Values in `0x15..=0x7F` not otherwise named return `"ISO 13818-1 Reserved"`; values `>= 0x80`
/// not otherwise named return `"User Private"`.
pub fn stream_type_to_str(stream_type: u8) -> &'static str {
    match stream_type {
        0x00 => "ITU-T Reserved",
        0x01 => "MPEG-1 Video",
        0x02 => "MPEG-2 Video",
        0x03 => "MPEG-1 Audio",
        0x04 => "MPEG-2 Audio",
        0x05 => "MPEG-2 Private Sections",
        0x06 => "MPEG-2 Private PES Data",
        0x07 => "MHEG",
        0x08 => "DSM-CC",
        0x09 => "ITU-T H.222.1",
        0x0A => "MPEG-2 Type A Multi-Protocol Encapsulation",
        0x0B => "MPEG-2 Type B DSM-CC",
        0x0C => "MPEG-2 Type C DSM-CC",
        0x0D => "MPEG-2 Type D DSM-CC",
        0x0E => "MPEG-2 Auxiliary",
        0x0F => "AAC Audio",
        0x10 => "MPEG-4 Video",
        0x11 => "LATM AAC Audio",
        0x12 => "MPEG-4 PES Data",
        0x13 => "MPEG-4 Sections",
        0x14 => "DSM-CC Synchronized Download Protocol",
        0x1B => "H.264 Video",
        0x24 => "HEVC Video",
        0x81 => "A52/AC-3 Audio",
        0x86 => "DTS-HD Master Audio",
        0x87 => "E-AC-3 Audio",
        0x15..=0x7F => "ISO 13818-1 Reserved",
        _ => "User Private",
    }
}
