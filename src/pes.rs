//! Minimal PES recognition used only to reject PES payloads while hunting for PSI sections.
//!
//! Decoding PES payloads beyond their header start-code and stream id is out of scope; see
//! [`PesHeaderPeek`].

use crate::byte_reader::ByteReader;
use crate::error::Result;

const PES_START_CODE_PREFIX: u32 = 0x000001;

/// The result of looking at the first few bytes of a payload-unit-start packet's payload to
/// decide whether it carries a PES packet rather than a PSI section.
#[derive(Debug, Clone, Copy)]
pub struct PesHeaderPeek {
    /// Stream id of the PES packet (e.g. an audio or video stream id).
    pub stream_id: u8,
    /// Declared PES packet length; 0 means "unbounded", as is common for video elementary
    /// streams.
    pub packet_length: u16,
}

impl PesHeaderPeek {
    /// Attempts to recognize a PES header at the start of `payload`. Returns `Ok(None)` if the
    /// 24-bit start-code prefix `0x000001` is not present, which is the caller's signal to treat
    /// the payload as a PSI section candidate instead.
    pub fn peek(payload: &[u8]) -> Result<Option<Self>> {
        if payload.len() < 6 {
            return Ok(None);
        }
        let mut reader = ByteReader::new(payload);
        let start_code = reader.read_be_u24()?;
        if start_code != PES_START_CODE_PREFIX {
            return Ok(None);
        }
        let stream_id = reader.read_u8()?;
        let packet_length = reader.read_be_u16()?;
        Ok(Some(PesHeaderPeek {
            stream_id,
            packet_length,
        }))
    }
}
