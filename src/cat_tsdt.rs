//! Conditional Access Table and Transport Stream Description Table parsing.
//!
//! Both tables carry nothing but a single descriptor loop filling the whole section body; real
//! descriptor interpretation is out of scope, so the loop is exposed as opaque [`Descriptor`]s.

use crate::byte_reader::ByteReader;
use crate::error::Result;
use crate::psi::{Descriptor, SectionHeaderInfo};

/// Parsed Conditional Access Table.
#[derive(Debug, Clone)]
pub struct CatInfo {
    /// CA descriptors declared by the table.
    pub descriptors: Vec<Descriptor>,
    /// Packet number (0-based) at which this CAT was found complete.
    pub packet_number: u64,
}

/// Parsed Transport Stream Description Table.
#[derive(Debug, Clone)]
pub struct TsdtInfo {
    /// Descriptors declared by the table.
    pub descriptors: Vec<Descriptor>,
    /// Packet number (0-based) at which this TSDT was found complete.
    pub packet_number: u64,
}

pub(crate) fn parse_cat_section(body: &[u8], _info: &SectionHeaderInfo) -> Result<CatInfo> {
    let mut reader = ByteReader::new(body);
    Ok(CatInfo {
        descriptors: Descriptor::read_all(&mut reader)?,
        packet_number: 0,
    })
}

pub(crate) fn parse_tsdt_section(body: &[u8], _info: &SectionHeaderInfo) -> Result<TsdtInfo> {
    let mut reader = ByteReader::new(body);
    Ok(TsdtInfo {
        descriptors: Descriptor::read_all(&mut reader)?,
        packet_number: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SectionHeaderInfo {
        SectionHeaderInfo {
            pid: 0x0001,
            table_id: crate::psi::table_id::CAT,
            table_id_extension: 0xFFFF,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        }
    }

    #[test]
    fn parses_ca_descriptor_loop() {
        let body = [0x09, 0x04, 0x00, 0x01, 0x00, 0x00];
        let cat = parse_cat_section(&body, &info()).unwrap();
        assert_eq!(cat.descriptors.len(), 1);
        assert_eq!(cat.descriptors[0].tag, 0x09);
        assert_eq!(cat.descriptors[0].data.as_slice(), &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn empty_body_yields_no_descriptors() {
        let tsdt = parse_tsdt_section(&[], &info()).unwrap();
        assert!(tsdt.descriptors.is_empty());
    }
}
