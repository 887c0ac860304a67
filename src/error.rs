use thiserror::Error;

/// Errors that may be encountered while parsing or traversing a transport stream.
#[derive(Error, Debug)]
pub enum Error {
    /// Propagated from the underlying file or buffer I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A [`ByteReader`](crate::byte_reader::ByteReader) read past the end of its slice.
    #[error("attempted to read {requested} bytes with only {available} remaining")]
    PacketOverrun {
        /// Number of bytes the read requested.
        requested: usize,
        /// Number of bytes actually left in the reader.
        available: usize,
    },

    /// A packet's sync byte was not `0x47`.
    #[error("lost sync: expected sync byte 0x47, found {0:#04x}")]
    LostSync(u8),

    /// A packet declared a malformed adaptation field (bad length or short read of a sub-field).
    #[error("malformed adaptation field: {0}")]
    MalformedAdaptationField(&'static str),

    /// A PSI section header failed one of its structural invariants.
    #[error("malformed PSI section header: {0}")]
    MalformedSection(&'static str),

    /// Computed CRC32 did not match the trailing 4 bytes of the section.
    ///
    /// Only constructible when the `crc-validate` feature is enabled.
    #[error("section CRC32 mismatch: expected {expected:#010x}, calculated {calculated:#010x}")]
    SectionCrcMismatch {
        /// CRC32 read from the section's trailing 4 bytes.
        expected: u32,
        /// CRC32 calculated over the section header and body.
        calculated: u32,
    },
}

/// [`std::result::Result`] alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
