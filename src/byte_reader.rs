use crate::error::{Error, Result};

/// Bounds-checked cursor over a borrowed byte slice.
///
/// Unlike the [`std::io::Read`] implementation for `&[u8]`, every read is checked against the
/// remaining slice length and reported via [`Error::PacketOverrun`] rather than panicking or
/// silently truncating.
#[derive(Debug)]
pub struct ByteReader<'a> {
    slice: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Initializes a reader over `slice`.
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice }
    }

    /// Creates a fixed-`length` sub-reader at the current position, then advances this reader
    /// past it.
    ///
    /// Gives nested data of known length its own bounds-checked cursor, rather than trusting
    /// every caller along the way to track an inner length by hand.
    pub fn sub_reader(&mut self, length: usize) -> Result<ByteReader<'a>> {
        Ok(ByteReader::new(self.read(length)?))
    }

    /// Number of bytes remaining in the reader.
    pub fn remaining_len(&self) -> usize {
        self.slice.len()
    }

    /// Advances the reader without extracting any data.
    pub fn skip(&mut self, length: usize) -> Result<()> {
        self.read(length).map(|_| ())
    }

    /// Extracts a fixed-`length` sub-slice and advances past it.
    pub fn read(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.slice.len() {
            Err(Error::PacketOverrun {
                requested: length,
                available: self.slice.len(),
            })
        } else {
            let (left, right) = self.slice.split_at(length);
            self.slice = right;
            Ok(left)
        }
    }

    /// Extracts a sub-slice of everything remaining.
    pub fn read_to_end(&mut self) -> &'a [u8] {
        let all = self.slice;
        self.slice = &[];
        all
    }

    /// Same as [`ByteReader::read`], converted to an array reference of length `N`.
    #[allow(unsafe_code)]
    pub fn read_array_ref<const N: usize>(&mut self) -> Result<&'a [u8; N]> {
        unsafe {
            // Bounds checking performed by read().
            Ok(&*(self.read(N)?.as_ptr() as *const [u8; N]))
        }
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array_ref::<1>()?[0])
    }

    /// Reads two bytes as a big-endian `u16`.
    pub fn read_be_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(*self.read_array_ref::<2>()?))
    }

    /// Reads three bytes as a big-endian 24-bit value.
    pub fn read_be_u24(&mut self) -> Result<u32> {
        let b = *self.read_array_ref::<3>()?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Reads four bytes as a big-endian `u32`.
    pub fn read_be_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(*self.read_array_ref::<4>()?))
    }

    /// Reads five bytes as a big-endian 33-bit value (used for PCR/PTS/DTS bases).
    pub fn read_be_u33(&mut self) -> Result<u64> {
        let b = *self.read_array_ref::<5>()?;
        Ok(u64::from_be_bytes([
            0,
            0,
            0,
            b[0] & 0x1,
            b[1],
            b[2],
            b[3],
            b[4],
        ]))
    }

    /// Extracts a fixed-`length` sub-slice without advancing.
    pub fn peek(&self, length: usize) -> Result<&'a [u8]> {
        if length > self.slice.len() {
            Err(Error::PacketOverrun {
                requested: length,
                available: self.slice.len(),
            })
        } else {
            Ok(&self.slice[..length])
        }
    }

    /// Same as [`ByteReader::peek`], converted to an array reference of length `N`.
    #[allow(unsafe_code)]
    pub fn peek_array_ref<const N: usize>(&self) -> Result<&'a [u8; N]> {
        unsafe {
            // Bounds checking performed by peek().
            Ok(&*(self.peek(N)?.as_ptr() as *const [u8; N]))
        }
    }
}

/// Reads a [`modular_bitfield_msb`] bitfield from a [`ByteReader`], consuming exactly as many
/// bytes as the bitfield type occupies.
macro_rules! read_bitfield {
    ($reader:expr, $type:ty) => {
        <$type>::from_bytes(*$reader.read_array_ref::<{ std::mem::size_of::<$type>() }>()?)
    };
}

pub(crate) use read_bitfield;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_order() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_be_u16().unwrap(), 0x0203);
        assert_eq!(r.remaining_len(), 2);
        assert_eq!(r.read_to_end(), &[0x04, 0x05]);
    }

    #[test]
    fn overrun_is_reported() {
        let data = [0x01];
        let mut r = ByteReader::new(&data);
        match r.read_be_u16() {
            Err(Error::PacketOverrun {
                requested: 2,
                available: 1,
            }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn sub_reader_is_bounds_checked_independently() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut r = ByteReader::new(&data);
        let mut sub = r.sub_reader(2).unwrap();
        assert_eq!(sub.read_u8().unwrap(), 0xAA);
        assert_eq!(sub.read_u8().unwrap(), 0xBB);
        assert!(sub.read_u8().is_err());
        assert_eq!(r.read_be_u16().unwrap(), 0xCCDD);
    }
}
