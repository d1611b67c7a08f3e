//! Little-endian field access over bounds-checked byte slices.
//!
//! Firmware headers are decoded byte by byte so that the result does not
//! depend on host endianness or on the alignment of the source buffer.

/// Read a `u16` stored little-endian at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let b = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from(b[0]) | (u16::from(b[1]) << 8))
}

/// Read a 24-bit value stored little-endian at `offset`.
pub(crate) fn read_u24_le(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(3)?)?;
    Some(u32::from(b[0]) | (u32::from(b[1]) << 8) | (u32::from(b[2]) << 16))
}

/// Read a `u32` stored little-endian at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(
        u32::from(b[0])
            | (u32::from(b[1]) << 8)
            | (u32::from(b[2]) << 16)
            | (u32::from(b[3]) << 24),
    )
}

/// Format a Bluetooth device address in the usual colon form, most significant byte first.
pub(crate) struct BdAddrDisplay<'a>(pub &'a [u8; 6]);

impl core::fmt::Display for BdAddrDisplay<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddrDisplay<'_> {
    fn format(&self, f: defmt::Formatter) {
        let a = self.0;
        defmt::write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5],
            a[4],
            a[3],
            a[2],
            a[1],
            a[0]
        )
    }
}
