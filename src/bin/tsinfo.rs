use std::env;
use std::process::ExitCode;
use tsinfo::{stream_type_to_str, TsFile};

fn main() -> ExitCode {
    if let Err(e) = tsinfo::logging::init_from_env() {
        eprintln!("warning: failed to install logger: {}", e);
    }

    let mut args = env::args();
    if args.len() < 2 {
        eprintln!("usage: tsinfo <FILE>");
        return ExitCode::FAILURE;
    }
    let file_path = args.nth(1).unwrap();

    let ts_file = match TsFile::open(&file_path) {
        Ok(ts_file) => ts_file,
        Err(e) => {
            eprintln!("Unable to open the file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !ts_file.is_valid() {
        eprintln!("Not a valid TS file");
        return ExitCode::FAILURE;
    }

    println!("File size: {} bytes", ts_file.file_size());

    if let Some(pat) = ts_file.pat_info() {
        println!("Found PAT in packet {}", pat.packet_number);
        println!(
            "  Transport Stream ID: {:#06x} ({})",
            pat.transport_stream_id, pat.transport_stream_id
        );
        for program in &pat.programs {
            println!(
                "  Program: {} PID: {:#06x} ({})",
                program.program_number, program.pmt_pid, program.pmt_pid
            );
        }
    }

    for pmt in ts_file.pmt_info_list() {
        println!(
            "Found PMT PID: {:#06x} ({}) in packet {}",
            pmt.pmt_pid, pmt.pmt_pid, pmt.packet_number
        );
        println!("  Program: {}", pmt.program_number);
        println!("  PCR PID: {:#06x} ({})", pmt.pcr_pid, pmt.pcr_pid);
        for stream in &pmt.streams {
            println!(
                "  PID: {:#06x} ({}) - {} ({:#04x})",
                stream.elementary_pid,
                stream.elementary_pid,
                stream_type_to_str(stream.stream_type),
                stream.stream_type
            );
        }
    }

    if let Some(cat) = ts_file.cat_info() {
        println!("Found CAT in packet {}", cat.packet_number);
    }
    if let Some(tsdt) = ts_file.tsdt_info() {
        println!("Found TSDT in packet {}", tsdt.packet_number);
    }
    for nit in ts_file.nit_info_list() {
        println!(
            "Found NIT ({}) in packet {}: Network ID {:#06x}",
            if nit.actual { "actual" } else { "other" },
            nit.packet_number,
            nit.network_id
        );
    }

    ExitCode::SUCCESS
}
