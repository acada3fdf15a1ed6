//! Fixed-width little-endian codec for values stored in a region.
//!
//! Everything that lives inside a region is read and written through [`Record`]
//! rather than by casting pointers, so the byte layout is identical for every
//! process attaching to the region regardless of where it is mapped.

use byteorder::{ByteOrder, LittleEndian};

use crate::Ref;

/// A value with a fixed on-region width.
pub trait Record: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decode from the first `SIZE` bytes of `buf`.
    fn decode(buf: &[u8]) -> Self;

    /// Encode into the first `SIZE` bytes of `buf`.
    fn encode(&self, buf: &mut [u8]);
}

impl Record for u8 {
    const SIZE: usize = 1;

    fn decode(buf: &[u8]) -> Self {
        buf[0]
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = *self;
    }
}

impl Record for bool {
    const SIZE: usize = 1;

    fn decode(buf: &[u8]) -> Self {
        buf[0] != 0
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = u8::from(*self);
    }
}

macro_rules! int_record {
    ($ty:ty, $size:expr, $read:ident, $write:ident) => {
        impl Record for $ty {
            const SIZE: usize = $size;

            #[inline]
            fn decode(buf: &[u8]) -> Self {
                LittleEndian::$read(buf)
            }

            #[inline]
            fn encode(&self, buf: &mut [u8]) {
                LittleEndian::$write(buf, *self)
            }
        }
    };
}

int_record!(i32, 4, read_i32, write_i32);
int_record!(u32, 4, read_u32, write_u32);
int_record!(i64, 8, read_i64, write_i64);
int_record!(u64, 8, read_u64, write_u64);
int_record!(f64, 8, read_f64, write_f64);

impl<T: ?Sized> Record for Ref<T> {
    const SIZE: usize = 8;

    #[inline]
    fn decode(buf: &[u8]) -> Self {
        Ref::from_offset(LittleEndian::read_u64(buf))
    }

    #[inline]
    fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u64(buf, self.offset())
    }
}

/// Sequential field decoder used by composite records.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn read<T: Record>(&mut self) -> T {
        let v = T::decode(&self.buf[self.pos..]);
        self.pos += T::SIZE;
        v
    }

    pub fn skip(&mut self, bytes: usize) {
        self.pos += bytes;
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Sequential field encoder, the mirror of [`FieldReader`].
pub struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn write<T: Record>(&mut self, value: &T) {
        value.encode(&mut self.buf[self.pos..]);
        self.pos += T::SIZE;
    }

    /// Zero `bytes` of padding.
    pub fn pad(&mut self, bytes: usize) {
        self.buf[self.pos..self.pos + bytes].fill(0);
        self.pos += bytes;
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
