//! Network Information Table parsing.
//!
//! Collected as opt-in, best-effort metadata alongside PAT/PMT: a file with no NIT, or one this
//! crate fails to parse, is still a perfectly valid transport stream.

use crate::byte_reader::ByteReader;
use crate::error::Result;
use crate::psi::{Descriptor, SectionHeaderInfo};

/// One transport stream entry within a NIT.
#[derive(Debug, Clone)]
pub struct NitTransportStreamInfo {
    /// Transport stream id.
    pub transport_stream_id: u16,
    /// Original network id.
    pub original_network_id: u16,
    /// Descriptors attached to this transport stream entry.
    pub transport_descriptors: Vec<Descriptor>,
}

/// Parsed Network Information Table.
#[derive(Debug, Clone)]
pub struct NitInfo {
    /// Network id, carried as the section's `table_id_extension`.
    pub network_id: u16,
    /// `true` for `table_id == 0x40` ("actual" network), `false` for `0x41` ("other" network).
    pub actual: bool,
    /// Network-level descriptors.
    pub network_descriptors: Vec<Descriptor>,
    /// Every transport stream entry declared by the NIT, in file order.
    pub transport_streams: Vec<NitTransportStreamInfo>,
    /// Packet number (0-based) at which this NIT was found complete.
    pub packet_number: u64,
}

pub(crate) fn parse_nit_section(
    body: &[u8],
    info: &SectionHeaderInfo,
    actual: bool,
) -> Result<NitInfo> {
    let mut reader = ByteReader::new(body);

    let network_descriptor_length = (reader.read_be_u16()? & 0x0FFF) as usize;
    let mut network_reader = reader.sub_reader(network_descriptor_length)?;
    let network_descriptors = Descriptor::read_all(&mut network_reader)?;

    let transport_stream_loop_length = (reader.read_be_u16()? & 0x0FFF) as usize;
    let mut loop_reader = reader.sub_reader(transport_stream_loop_length)?;
    let mut transport_streams = Vec::new();
    while loop_reader.remaining_len() >= 6 {
        let head = loop_reader.read_array_ref::<6>()?;
        let transport_stream_id = u16::from_be_bytes([head[0], head[1]]);
        let original_network_id = u16::from_be_bytes([head[2], head[3]]);
        let transport_descriptors_length =
            (u16::from_be_bytes([head[4], head[5]]) & 0x0FFF) as usize;
        let mut ts_reader = loop_reader.sub_reader(transport_descriptors_length)?;
        transport_streams.push(NitTransportStreamInfo {
            transport_stream_id,
            original_network_id,
            transport_descriptors: Descriptor::read_all(&mut ts_reader)?,
        });
    }

    Ok(NitInfo {
        network_id: info.table_id_extension,
        actual,
        network_descriptors,
        transport_streams,
        packet_number: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SectionHeaderInfo {
        SectionHeaderInfo {
            pid: 0x0010,
            table_id: crate::psi::table_id::NIT_ACTUAL,
            table_id_extension: 0x0001,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        }
    }

    #[test]
    fn parses_network_and_transport_stream_loops() {
        let body = [
            0x00, 0x00, // network_descriptor_length=0
            0x00, 0x06, // transport_stream_loop_length=6
            0x00, 0x02, 0x00, 0x03, 0x00, 0x00, // ts_id=2, onid=3, descriptors_len=0
        ];
        let nit = parse_nit_section(&body, &info(), true).unwrap();
        assert_eq!(nit.network_id, 0x0001);
        assert!(nit.actual);
        assert_eq!(nit.transport_streams.len(), 1);
        assert_eq!(nit.transport_streams[0].transport_stream_id, 2);
        assert_eq!(nit.transport_streams[0].original_network_id, 3);
    }
}
