//! File-level scenarios exercising [`tsinfo::TsFile`] against small synthetic transport streams.

use std::io::Write;
use tempfile::NamedTempFile;
use tsinfo::{PacketSize, TsFile, TsPacket};

const VALID_PACKETS: usize = 10;

fn pat_section_bytes(program_count: u16) -> Vec<u8> {
    let body_len = (program_count as usize) * 4 + 4; // entries + CRC placeholder
    let section_length = body_len + 5;
    assert!(section_length < 0x3FD);

    let mut section = Vec::new();
    section.push(0x00); // table_id = PAT
    section.push(0xB0 | ((section_length >> 8) as u8 & 0x0F)); // ssi=1, hard_zero=0
    section.push((section_length & 0xFF) as u8);
    section.extend_from_slice(&[0x00, 0x01]); // transport_stream_id = 1
    section.push(0xC1); // version=0, current_next=1
    section.push(0x00); // section_number
    section.push(0x00); // last_section_number
    for n in 1..=program_count {
        section.extend_from_slice(&n.to_be_bytes());
        section.extend_from_slice(&(0xE000u16 | (0x20 + n)).to_be_bytes());
    }
    section.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]); // CRC placeholder
    section
}

fn raw_packet(pusi: bool, pid: u16, payload_prefix: Option<u8>, payload: &[u8]) -> [u8; 188] {
    let mut p = [0xFFu8; 188];
    p[0] = 0x47;
    p[1] = if pusi { 0x40 } else { 0x00 } | ((pid >> 8) as u8 & 0x1F);
    p[2] = (pid & 0xFF) as u8;
    p[3] = 0x10; // no adaptation field, has payload, CC=0
    let mut offset = 4;
    if let Some(prefix) = payload_prefix {
        p[offset] = prefix;
        offset += 1;
    }
    p[offset..offset + payload.len()].copy_from_slice(payload);
    p
}

fn corrupt_sync_byte(packet: &mut [u8; 188]) {
    packet[0] = 0x00;
}

#[test]
fn scenario_1_single_packet_pat_in_188_byte_stream() {
    let section = pat_section_bytes(1);
    let packet = raw_packet(true, 0x0000, Some(0x00), &section);

    let mut tmp = NamedTempFile::new().unwrap();
    for _ in 0..VALID_PACKETS {
        tmp.write_all(&packet).unwrap();
    }
    tmp.flush().unwrap();

    let ts_file = TsFile::open(tmp.path()).unwrap();
    assert!(ts_file.is_valid());
    assert_eq!(ts_file.packet_size(), Some(PacketSize::Raw188));
    let pat = ts_file.pat_info().unwrap();
    assert_eq!(pat.transport_stream_id, 1);
    assert_eq!(pat.programs.len(), 1);
    assert_eq!(pat.programs[0].pmt_pid, 0x0021);
    assert_eq!(pat.network_pid, 0x1FFF);
}

#[test]
fn scenario_2_same_content_as_192_byte_tts() {
    let section = pat_section_bytes(1);
    let packet_188 = raw_packet(true, 0x0000, Some(0x00), &section);

    let mut tmp = NamedTempFile::new().unwrap();
    for i in 0..VALID_PACKETS {
        tmp.write_all(&[0xAB, 0xCD, 0xEF, i as u8]).unwrap();
        tmp.write_all(&packet_188).unwrap();
    }
    tmp.flush().unwrap();

    let ts_file = TsFile::open(tmp.path()).unwrap();
    assert!(ts_file.is_valid());
    assert_eq!(ts_file.packet_size(), Some(PacketSize::Timestamped192));
    let pat = ts_file.pat_info().unwrap();
    assert_eq!(pat.transport_stream_id, 1);
    assert_eq!(pat.programs[0].pmt_pid, 0x0021);
}

#[test]
fn scenario_4_corrupted_packet_after_valid_header_does_not_crash() {
    let section = pat_section_bytes(1);
    let good = raw_packet(true, 0x0000, Some(0x00), &section);

    let mut tmp = NamedTempFile::new().unwrap();
    for _ in 0..VALID_PACKETS {
        tmp.write_all(&good).unwrap();
    }
    let mut corrupted = good;
    corrupt_sync_byte(&mut corrupted);
    tmp.write_all(&corrupted).unwrap();
    for _ in 0..9 {
        tmp.write_all(&good).unwrap();
    }
    tmp.flush().unwrap();

    let mut ts_file = TsFile::open(tmp.path()).unwrap();
    assert!(ts_file.is_valid());

    for n in 0..VALID_PACKETS as u64 {
        assert!(ts_file.view_packet_by_number(n).unwrap().is_some());
    }
    match ts_file.view_packet_by_number(VALID_PACKETS as u64) {
        Err(tsinfo::Error::LostSync(0x00)) => {}
        other => panic!("expected a lost-sync error at packet 10, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn scenario_5_section_spans_two_packets_via_continuation() {
    let section = pat_section_bytes(60); // large enough to overflow one packet's payload
    let pointer_and_header_and_syntax = 1 + 3 + 5;
    let first_capacity = 184 - pointer_and_header_and_syntax;
    let first_body = &section[8..8 + first_capacity.min(section.len() - 8)];
    let rest = &section[8 + first_body.len()..];
    assert!(!rest.is_empty(), "test fixture must actually require a continuation packet");

    let mut first_payload = vec![0x00]; // pointer field
    first_payload.extend_from_slice(&section[..8]);
    first_payload.extend_from_slice(first_body);
    let first_packet = raw_packet(true, 0x0000, None, &first_payload);
    let second_packet = raw_packet(false, 0x0000, None, rest);

    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&first_packet).unwrap();
    tmp.write_all(&second_packet).unwrap();
    for _ in 0..(VALID_PACKETS - 2) {
        tmp.write_all(&raw_packet(true, 0x1FFF, None, &[])).unwrap();
    }
    tmp.flush().unwrap();

    let ts_file = TsFile::open(tmp.path()).unwrap();
    assert!(ts_file.is_valid());
    let pat = ts_file.pat_info().unwrap();
    assert_eq!(pat.programs.len(), 60);
    assert_eq!(pat.programs[0].pmt_pid, 0x0021);
    assert_eq!(pat.programs[59].pmt_pid, 0x0021 + 59);
}

#[test]
fn scenario_6_adaptation_only_packet_decodes_pcr() {
    let mut p = [0xFFu8; 188];
    p[0] = 0x47;
    p[1] = 0x00;
    p[2] = 0x11;
    p[3] = 0x20; // AFC = adaptation only, no payload
    p[4] = 7; // adaptation_field_length
    p[5] = 0x10; // has_pcr
    p[6..12].copy_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x80, 0x00]); // base=1, ext=0

    let packet = TsPacket::parse(&p).unwrap();
    assert!(!packet.has_payload());
    assert!(packet.payload().is_none());
    let af = packet.adaptation_field().unwrap();
    assert_eq!(af.pcr.unwrap().base, 1);
    assert_eq!(af.pcr.unwrap().extension, 0);
}
