//! Append-only byte sink with little-endian primitive writers.
//!
//! Everything the binary writers emit goes through this type; the Crate
//! writer back-patches the table-of-contents offset through [`Sink::patch_u64`].

/// In-memory output buffer with a monotone write position.
#[derive(Default)]
pub struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Consume the sink and return the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// View the accumulated bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Append raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a u16, little-endian.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a u32, little-endian.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an i32, little-endian.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a 48-bit value as u32 then u16, both little-endian.
    ///
    /// Used for the offset part of value-rep "pointer" triples; the upper
    /// 16 bits of `value` are discarded.
    #[inline]
    pub fn write_u48(&mut self, value: u64) {
        self.write_u32(value as u32);
        self.write_u16((value >> 32) as u16);
    }

    /// Append a u64, little-endian.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an i64, little-endian.
    ///
    /// Callers widening an `i32` get sign extension into the upper four
    /// bytes via `i64::from`.
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an f32, IEEE-754 little-endian.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an f64, IEEE-754 little-endian.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Overwrite a previously written 8-byte slot.
    ///
    /// The slot must be entirely inside the already written range.
    pub fn patch_u64(&mut self, offset: u64, value: u64) {
        let offset = offset as usize;
        self.buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}
