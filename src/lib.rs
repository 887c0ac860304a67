//! Library for reading MPEG-2 transport stream PSI tables: PAT, PMT, CAT, TSDT and NIT.
//!
//! # Usage
//! Simply add this crate as a dependency in your `Cargo.toml`.
//!
//! ```toml
//! [dependencies]
//! tsinfo = "~0.1.0"
//! ```
//!
//! Open a file and inspect whatever metadata the scan found:
//!
//! ```no_run
//! use tsinfo::TsFile;
//!
//! # fn main() -> tsinfo::Result<()> {
//! let ts_file = TsFile::open("capture.ts")?;
//! if let Some(pat) = ts_file.pat_info() {
//!     println!("transport_stream_id = {}", pat.transport_stream_id);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, unsafe_code, warnings)]

mod byte_reader;
mod cat_tsdt;
mod error;
/// Logging sink and environment-variable configuration, see [`logging::ModuleLogger`].
pub mod logging;
mod nit;
mod packet;
mod pat;
mod pes;
mod pmt;
mod psi;
mod tsfile;

pub use byte_reader::ByteReader;
pub use cat_tsdt::{CatInfo, TsdtInfo};
pub use error::{Error, Result};
pub use nit::{NitInfo, NitTransportStreamInfo};
pub use packet::{
    AdaptationField, AdaptationFieldExtension, AdaptationFieldExtensionHeader,
    AdaptationFieldHeader, LegalTimeWindow, PacketHeader, PacketSize, PcrTimestamp, PiecewiseRate,
    SeamlessSplice, TransportScramblingControl, TsPacket,
};
pub use pat::{PatInfo, ProgramInfo};
pub use pes::PesHeaderPeek;
pub use pmt::{stream_type_to_str, PmtInfo, StreamInfo};
pub use psi::{table_id, Descriptor, SectionHeaderInfo, Table};
pub use tsfile::TsFile;

/// Expands to [`format_args`] for a 90kHz timestamp of any integer type.
///
/// Format is `<hours>:<minutes>:<seconds>:<90kHz-ticks>`.
///
/// # Example
///
/// ```
/// use tsinfo::pts_format_args;
/// assert_eq!(std::fmt::format(pts_format_args!(900000)), "0:0:10:0");
/// ```
#[macro_export]
macro_rules! pts_format_args {
    ($pts:expr) => {
        format_args!(
            "{}:{}:{}:{}",
            $pts / (90000 * 60 * 60),
            $pts / (90000 * 60) % 60,
            $pts / 90000 % 60,
            $pts % 90000
        )
    };
}
