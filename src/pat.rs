//! Program Association Table parsing.

use crate::byte_reader::ByteReader;
use crate::error::Result;
use crate::psi::SectionHeaderInfo;

/// One program declared by a PAT, other than the network-PID entry.
#[derive(Debug, Clone, Copy)]
pub struct ProgramInfo {
    /// Program number.
    pub program_number: u16,
    /// PID of this program's PMT.
    pub pmt_pid: u16,
}

/// Parsed Program Association Table.
#[derive(Debug, Clone)]
pub struct PatInfo {
    /// Transport stream id, carried as the section's `table_id_extension`.
    pub transport_stream_id: u16,
    /// PID of the Network Information Table, as declared by the `program_number == 0` entry.
    /// Defaults to `0x1FFF` if no such entry was present.
    pub network_pid: u16,
    /// Every non-network-PID program declared by the PAT, in file order.
    pub programs: Vec<ProgramInfo>,
    /// Packet number (0-based) at which this PAT was found complete.
    pub packet_number: u64,
}

const DEFAULT_NETWORK_PID: u16 = 0x1FFF;

pub(crate) fn parse_pat_section(body: &[u8], info: &SectionHeaderInfo) -> Result<PatInfo> {
    let mut reader = ByteReader::new(body);
    let mut network_pid = DEFAULT_NETWORK_PID;
    let mut programs = Vec::with_capacity(reader.remaining_len() / 4);
    while reader.remaining_len() >= 4 {
        let entry = reader.read_array_ref::<4>()?;
        let program_number = u16::from_be_bytes([entry[0], entry[1]]);
        let pid = u16::from_be_bytes([entry[2], entry[3]]) & 0x1FFF;
        if program_number == 0 {
            network_pid = pid;
        } else {
            programs.push(ProgramInfo {
                program_number,
                pmt_pid: pid,
            });
        }
    }
    Ok(PatInfo {
        transport_stream_id: info.table_id_extension,
        network_pid,
        programs,
        packet_number: 0,
    })
}
