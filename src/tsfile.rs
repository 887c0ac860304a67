//! Buffered, random-access reader over a transport stream file, plus the top-level metadata
//! collection pass that discovers PAT/PMT/CAT/TSDT/NIT.

use crate::cat_tsdt::{CatInfo, TsdtInfo};
use crate::error::Result;
use crate::nit::NitInfo;
use crate::packet::{PacketSize, TsPacket};
use crate::pat::PatInfo;
use crate::pes::PesHeaderPeek;
use crate::pmt::PmtInfo;
use crate::psi::{self, SectionAssembler, StartOutcome, Table};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// LCM(188, 192, 4096): large enough to hold a whole number of packets at either packet size,
/// and a whole number of typical filesystem blocks.
const BUFFER_SIZE: u64 = 577_536;
/// Number of leading packets that must decode cleanly for a file to be considered a valid
/// transport stream.
const VALID_PACKETS: u64 = 10;

const PID_PAT: u16 = 0x0000;
const PID_CAT: u16 = 0x0001;
const PID_TSDT: u16 = 0x0002;
const PID_NIT_DEFAULT: u16 = 0x0010;
const PID_NULL: u16 = 0x1FFF;

/// A buffered, random-access transport stream file.
///
/// Opening a file validates the first [`VALID_PACKETS`](constant@VALID_PACKETS) packets and then
/// performs a single linear scan collecting PAT/PMT (and, opportunistically, CAT/TSDT/NIT)
/// metadata. After that, [`TsFile::view_packet_by_number`] and friends provide cheap random
/// access without re-reading the whole file into memory.
pub struct TsFile {
    file: File,
    file_size: u64,
    buffer: Vec<u8>,
    buffer_file_offset: u64,
    valid_buffer_size: usize,
    is_eof: bool,
    packet_size: Option<PacketSize>,
    is_valid: bool,
    last_packet_offset: Option<u64>,
    pat_info: Option<PatInfo>,
    pmt_info_list: Vec<PmtInfo>,
    cat_info: Option<CatInfo>,
    tsdt_info: Option<TsdtInfo>,
    nit_info_list: Vec<NitInfo>,
}

impl TsFile {
    /// Opens `path`, validates it, and collects its PAT/PMT/CAT/TSDT/NIT metadata.
    ///
    /// Returns `Err` only for I/O failures (the file could not be opened, seeked, or sized). A
    /// file that opens fine but does not decode as a transport stream is reported via
    /// [`TsFile::is_valid`] returning `false`, with empty metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;

        let mut ts_file = TsFile {
            file,
            file_size,
            buffer: vec![0u8; BUFFER_SIZE as usize],
            buffer_file_offset: u64::MAX,
            valid_buffer_size: 0,
            is_eof: file_size == 0,
            packet_size: None,
            is_valid: false,
            last_packet_offset: None,
            pat_info: None,
            pmt_info_list: Vec::new(),
            cat_info: None,
            tsdt_info: None,
            nit_info_list: Vec::new(),
        };

        ts_file.validate()?;
        if ts_file.is_valid {
            ts_file.collect_metadata()?;
        }
        Ok(ts_file)
    }

    /// Total size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Whether the first packets decoded cleanly at a detected packet size.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// The detected packet size, if the file validated.
    pub fn packet_size(&self) -> Option<PacketSize> {
        self.packet_size
    }

    /// The parsed PAT, if found during metadata collection.
    pub fn pat_info(&self) -> Option<&PatInfo> {
        self.pat_info.as_ref()
    }

    /// Every PMT found during metadata collection.
    pub fn pmt_info_list(&self) -> &[PmtInfo] {
        &self.pmt_info_list
    }

    /// The parsed CAT, if one was observed during the scan.
    pub fn cat_info(&self) -> Option<&CatInfo> {
        self.cat_info.as_ref()
    }

    /// The parsed TSDT, if one was observed during the scan.
    pub fn tsdt_info(&self) -> Option<&TsdtInfo> {
        self.tsdt_info.as_ref()
    }

    /// Every distinct NIT (actual or other) observed during the scan.
    pub fn nit_info_list(&self) -> &[NitInfo] {
        &self.nit_info_list
    }

    /// PID expected to carry the NIT: the PAT's `program_number == 0` entry once the PAT has
    /// been found, or [`PID_NIT_DEFAULT`] until then.
    fn nit_pid(&self) -> u16 {
        self.pat_info
            .as_ref()
            .map(|p| p.network_pid)
            .unwrap_or(PID_NIT_DEFAULT)
    }

    fn read_from_offset(&mut self, offset: u64) -> Result<()> {
        debug_assert_eq!(offset % BUFFER_SIZE, 0);
        if self.buffer_file_offset == offset {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut total_read = 0usize;
        loop {
            let n = self.file.read(&mut self.buffer[total_read..])?;
            if n == 0 {
                break;
            }
            total_read += n;
            if total_read == self.buffer.len() {
                break;
            }
        }
        self.valid_buffer_size = total_read;
        self.buffer_file_offset = offset;
        self.is_eof = total_read < self.buffer.len();
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.read_from_offset(0)?;
        self.packet_size = None;
        self.is_valid = false;

        let first = match TsPacket::parse(&self.buffer[..self.valid_buffer_size]) {
            Ok(p) => p,
            Err(_) => return Ok(()),
        };
        let packet_size = first.packet_size();
        let max_valid_offset = (VALID_PACKETS as usize) * packet_size.byte_len();
        if max_valid_offset > self.buffer.len() {
            return Ok(());
        }

        let mut offset = packet_size.byte_len();
        while offset < max_valid_offset {
            if TsPacket::parse_with_size(&self.buffer[offset..self.valid_buffer_size], packet_size)
                .is_err()
            {
                return Ok(());
            }
            offset += packet_size.byte_len();
        }

        self.packet_size = Some(packet_size);
        self.is_valid = true;
        Ok(())
    }

    fn collect_metadata(&mut self) -> Result<()> {
        let packet_size = self.packet_size.expect("validate() sets packet_size when is_valid");
        let mut want_pids: HashSet<u16> = HashSet::new();
        let mut found_pids: HashSet<u16> = HashSet::new();
        let mut pending: HashMap<u16, SectionAssembler> = HashMap::new();
        let mut seen_cat = false;
        let mut seen_tsdt = false;
        let mut seen_nit: HashSet<(u16, bool)> = HashSet::new();

        want_pids.insert(PID_PAT);

        let mut last_file_offset = 0u64;
        self.read_from_offset(last_file_offset)?;

        while !self.is_eof && !want_pids.is_empty() {
            let mut packet_count: u64 = 0;
            let max_packets = self.valid_buffer_size as u64 / packet_size.byte_len() as u64;

            while !want_pids.is_empty() && packet_count < max_packets {
                let packet_offset = (packet_count as usize) * packet_size.byte_len();
                let packet_number = last_file_offset / packet_size.byte_len() as u64 + packet_count;

                // Parse and copy out what we need as owned values so the borrow of
                // `self.buffer` ends here, before any of the `self.*_info` writes below.
                let (pid, pusi, payload_owned) = match TsPacket::parse_with_size(
                    &self.buffer[packet_offset..self.valid_buffer_size],
                    packet_size,
                ) {
                    Ok(packet) => (
                        packet.pid(),
                        packet.payload_unit_start_indicator(),
                        packet.payload().map(|p| p.to_vec()),
                    ),
                    Err(e) => {
                        warn!("invalid TS packet at packet {}: {}", packet_count, e);
                        packet_count += 1;
                        continue;
                    }
                };

                if let Some(payload) = payload_owned {
                    if pid != PID_NULL {
                        if pusi {
                            let is_pes = matches!(PesHeaderPeek::peek(&payload), Ok(Some(_)));
                            if !is_pes {
                                if want_pids.contains(&pid) && !found_pids.contains(&pid) {
                                    match psi::start_section(pid, &payload) {
                                        Ok(StartOutcome::Complete(table)) => apply_table(
                                            self,
                                            pid,
                                            table,
                                            packet_number,
                                            &mut want_pids,
                                            &mut found_pids,
                                            &mut seen_cat,
                                            &mut seen_tsdt,
                                            &mut seen_nit,
                                        ),
                                        Ok(StartOutcome::Pending(assembler)) => {
                                            pending.insert(pid, assembler);
                                        }
                                        Ok(StartOutcome::NotASection) => {}
                                        Err(e) => {
                                            warn!("malformed PSI section on PID {:#06x}: {}", pid, e)
                                        }
                                    }
                                } else if (pid == PID_CAT && !seen_cat)
                                    || (pid == PID_TSDT && !seen_tsdt)
                                    || pid == self.nit_pid()
                                {
                                    match psi::start_section(pid, &payload) {
                                        Ok(StartOutcome::Complete(table)) => apply_table(
                                            self,
                                            pid,
                                            table,
                                            packet_number,
                                            &mut want_pids,
                                            &mut found_pids,
                                            &mut seen_cat,
                                            &mut seen_tsdt,
                                            &mut seen_nit,
                                        ),
                                        Ok(StartOutcome::Pending(_)) | Ok(StartOutcome::NotASection) => {}
                                        Err(e) => {
                                            warn!("malformed PSI section on PID {:#06x}: {}", pid, e)
                                        }
                                    }
                                }
                            }
                        } else if let Some(assembler) = pending.get_mut(&pid) {
                            match assembler.append(&payload) {
                                Ok(Some(table)) => {
                                    pending.remove(&pid);
                                    apply_table(
                                        self,
                                        pid,
                                        table,
                                        packet_number,
                                        &mut want_pids,
                                        &mut found_pids,
                                        &mut seen_cat,
                                        &mut seen_tsdt,
                                        &mut seen_nit,
                                    );
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    warn!(
                                        "malformed section continuation on PID {:#06x}: {}",
                                        pid, e
                                    );
                                    pending.remove(&pid);
                                }
                            }
                        }
                    }
                }

                packet_count += 1;
            }

            if !want_pids.is_empty() && !self.is_eof {
                last_file_offset += BUFFER_SIZE;
                self.read_from_offset(last_file_offset)?;
            }
        }

        if !want_pids.is_empty() {
            debug!(
                "metadata scan reached EOF with {} PID(s) still outstanding",
                want_pids.len()
            );
        }

        Ok(())
    }

    /// Returns the packet at `packet_number` (0-based), or `Ok(None)` if it is past the end of
    /// the file.
    pub fn view_packet_by_number(&mut self, packet_number: u64) -> Result<Option<TsPacket<'_>>> {
        let packet_size = match self.packet_size {
            Some(p) => p,
            None => return Ok(None),
        };
        let packet_offset = packet_number * packet_size.byte_len() as u64;
        if packet_offset >= self.file_size {
            return Ok(None);
        }
        let buffer_offset = packet_offset % BUFFER_SIZE;
        if self.buffer_file_offset > packet_offset
            || self.buffer_file_offset + BUFFER_SIZE < packet_offset
        {
            self.read_from_offset(packet_offset - buffer_offset)?;
        }
        self.last_packet_offset = Some(packet_offset);
        let buffer_offset = buffer_offset as usize;
        Ok(Some(TsPacket::parse_with_size(
            &self.buffer[buffer_offset..self.valid_buffer_size],
            packet_size,
        )?))
    }

    /// Returns the packet following the last one viewed (or the first packet, if none has been
    /// viewed yet). Returns `Ok(None)` at end of file.
    pub fn view_next_packet(&mut self) -> Result<Option<TsPacket<'_>>> {
        let packet_size = match self.packet_size {
            Some(p) => p,
            None => return Ok(None),
        };
        let packet_offset = match self.last_packet_offset {
            None => 0,
            Some(last) => {
                if last + packet_size.byte_len() as u64 >= self.file_size {
                    return Ok(None);
                }
                last + packet_size.byte_len() as u64
            }
        };
        let buffer_offset = packet_offset % BUFFER_SIZE;
        if buffer_offset == 0 {
            self.read_from_offset(packet_offset)?;
        }
        self.last_packet_offset = Some(packet_offset);
        let buffer_offset = buffer_offset as usize;
        Ok(Some(TsPacket::parse_with_size(
            &self.buffer[buffer_offset..self.valid_buffer_size],
            packet_size,
        )?))
    }

    /// Returns the packet preceding the last one viewed. Returns `Ok(None)` if there is no
    /// previous packet (nothing viewed yet, or already at packet 0).
    pub fn view_previous_packet(&mut self) -> Result<Option<TsPacket<'_>>> {
        let packet_size = match self.packet_size {
            Some(p) => p,
            None => return Ok(None),
        };
        let last = match self.last_packet_offset {
            None => return Ok(None),
            Some(last) => last,
        };
        if last < packet_size.byte_len() as u64 {
            return Ok(None);
        }
        let packet_offset = last - packet_size.byte_len() as u64;
        let buffer_offset = packet_offset % BUFFER_SIZE;
        if buffer_offset == BUFFER_SIZE - packet_size.byte_len() as u64 {
            self.read_from_offset(packet_offset - buffer_offset)?;
        }
        self.last_packet_offset = Some(packet_offset);
        let buffer_offset = buffer_offset as usize;
        Ok(Some(TsPacket::parse_with_size(
            &self.buffer[buffer_offset..self.valid_buffer_size],
            packet_size,
        )?))
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_table(
    ts_file: &mut TsFile,
    pid: u16,
    table: Table,
    packet_number: u64,
    want_pids: &mut HashSet<u16>,
    found_pids: &mut HashSet<u16>,
    seen_cat: &mut bool,
    seen_tsdt: &mut bool,
    seen_nit: &mut HashSet<(u16, bool)>,
) {
    match table {
        Table::Pat(mut pat) => {
            pat.packet_number = packet_number;
            for program in &pat.programs {
                want_pids.insert(program.pmt_pid);
            }
            ts_file.pat_info = Some(pat);
            found_pids.insert(pid);
            want_pids.remove(&pid);
        }
        Table::Pmt(mut pmt) => {
            pmt.packet_number = packet_number;
            ts_file.pmt_info_list.push(pmt);
            found_pids.insert(pid);
            want_pids.remove(&pid);
        }
        Table::Cat(mut cat) => {
            if !*seen_cat {
                cat.packet_number = packet_number;
                ts_file.cat_info = Some(cat);
                *seen_cat = true;
            }
        }
        Table::Tsdt(mut tsdt) => {
            if !*seen_tsdt {
                tsdt.packet_number = packet_number;
                ts_file.tsdt_info = Some(tsdt);
                *seen_tsdt = true;
            }
        }
        Table::Nit(mut nit) => {
            if seen_nit.insert((nit.network_id, nit.actual)) {
                nit.packet_number = packet_number;
                ts_file.nit_info_list.push(nit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pat_packet() -> [u8; 188] {
        let mut p = [0xFFu8; 188];
        p[0] = 0x47;
        p[1] = 0x40;
        p[2] = 0x00;
        p[3] = 0x10;
        let body = [
            0x00, // pointer field
            0x00, 0xB0, 0x0D, // table_id=0, ssi=1, section_length=13
            0x00, 0x01, 0xC1, 0x00, 0x00, // tsid=1, version/cni, section 0/0
            0x00, 0x01, 0xE0, 0x20, // program 1 -> pmt pid 0x20
            0xDE, 0xAD, 0xBE, 0xEF,
        ];
        p[4..4 + body.len()].copy_from_slice(&body);
        p
    }

    fn null_packet() -> [u8; 188] {
        let mut p = [0xFFu8; 188];
        p[0] = 0x47;
        p[1] = 0x1F;
        p[2] = 0xFF;
        p[3] = 0x10;
        p
    }

    #[test]
    fn opens_and_collects_pat() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..(VALID_PACKETS + 1) {
            tmp.write_all(&pat_packet()).unwrap();
        }
        for _ in 0..5 {
            tmp.write_all(&null_packet()).unwrap();
        }
        tmp.flush().unwrap();

        let ts_file = TsFile::open(tmp.path()).unwrap();
        assert!(ts_file.is_valid());
        assert_eq!(ts_file.packet_size(), Some(PacketSize::Raw188));
        let pat = ts_file.pat_info().expect("PAT should have been found");
        assert_eq!(pat.transport_stream_id, 1);
        assert_eq!(pat.programs[0].pmt_pid, 0x0020);
    }

    #[test]
    fn invalid_file_is_reported_not_fatal() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 32]).unwrap();
        tmp.flush().unwrap();

        let ts_file = TsFile::open(tmp.path()).unwrap();
        assert!(!ts_file.is_valid());
        assert!(ts_file.pat_info().is_none());
    }

    #[test]
    fn view_next_then_previous_round_trips() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..(VALID_PACKETS + 2) {
            tmp.write_all(&pat_packet()).unwrap();
        }
        tmp.flush().unwrap();

        let mut ts_file = TsFile::open(tmp.path()).unwrap();
        let first = ts_file.view_next_packet().unwrap().unwrap().copy();
        let _second = ts_file.view_next_packet().unwrap().unwrap().copy();
        let back = ts_file.view_previous_packet().unwrap().unwrap().copy();
        assert_eq!(first, back);
    }
}
