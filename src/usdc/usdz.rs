//! USDZ container: a STORED zip holding one Crate layer.
//!
//! USDZ runtimes memory-map the archive, so the layer payload must start on
//! a 64-byte boundary; the local header's extra field carries the padding.
//! CRC-32 and timestamps are left zero, consumers do not check them.

use crate::usdc::sink::Sink;

/// Name of the single archived layer.
pub const ENTRY_NAME: &str = "tmp.usdc";

/// Payload alignment required by USDZ readers.
pub const PAYLOAD_ALIGNMENT: usize = 64;

const LOCAL_HEADER_SIG: u32 = 0x0403_4B50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4B50;
const END_OF_CENTRAL_SIG: u32 = 0x0605_4B50;
const ZIP_VERSION: u16 = 20;

/// Wrap a Crate layer into a single-entry STORED zip.
pub fn pack(usdc: &[u8]) -> Vec<u8> {
    let name = ENTRY_NAME.as_bytes();
    // 34 = local header minus name (30) plus the extra field's own header (4).
    let extra_size = PAYLOAD_ALIGNMENT - (34 + name.len()) % PAYLOAD_ALIGNMENT;
    let len = usdc.len() as u32;

    let mut sink = Sink::with_capacity(usdc.len() + 256);

    // Local file header.
    sink.write_u32(LOCAL_HEADER_SIG);
    sink.write_u16(ZIP_VERSION);
    sink.write_u16(0); // flags
    sink.write_u16(0); // method: STORED
    sink.write_u16(0); // mod time
    sink.write_u16(0); // mod date
    sink.write_u32(0); // crc-32
    sink.write_u32(len);
    sink.write_u32(len);
    sink.write_u16(name.len() as u16);
    sink.write_u16((extra_size + 4) as u16);
    sink.write_bytes(name);

    // Alignment extra field.
    sink.write_u16(0x0001);
    sink.write_u16(extra_size as u16);
    sink.write_bytes(&vec![0u8; extra_size]);

    debug_assert_eq!(sink.pos() as usize % PAYLOAD_ALIGNMENT, 0);
    sink.write_bytes(usdc);

    // Central directory, one entry.
    let central_start = sink.pos();
    sink.write_u32(CENTRAL_HEADER_SIG);
    sink.write_u16(ZIP_VERSION); // version made by
    sink.write_u16(ZIP_VERSION); // version needed
    sink.write_u16(0); // flags
    sink.write_u16(0); // method
    sink.write_u16(0); // mod time
    sink.write_u16(0); // mod date
    sink.write_u32(0); // crc-32
    sink.write_u32(len);
    sink.write_u32(len);
    sink.write_u16(name.len() as u16);
    sink.write_u16(0); // extra length
    sink.write_u16(0); // comment length
    sink.write_u16(0); // disk number
    sink.write_u16(0); // internal attributes
    sink.write_u32(0); // external attributes
    sink.write_u32(0); // local header offset
    sink.write_bytes(name);
    let central_size = sink.pos() - central_start;

    // End of central directory.
    sink.write_u32(END_OF_CENTRAL_SIG);
    sink.write_u16(0); // this disk
    sink.write_u16(0); // central directory disk
    sink.write_u16(1); // entries on this disk
    sink.write_u16(1); // entries total
    sink.write_u32(central_size as u32);
    sink.write_u32(central_start as u32);
    sink.write_u16(0); // comment length

    sink.into_bytes()
}
