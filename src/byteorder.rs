//! Explicit byte-order helpers.
//!
//! KMC1/KMC2 on-disk integers are little-endian; KFF on-disk integers are
//! big-endian. Host layout is never relied upon (design note 9,
//! "Endianness"): every value that crosses the disk boundary goes through one
//! of these helpers rather than `to_ne_bytes`/`from_ne_bytes`.

pub fn read_u64_le(buf: &[u8]) -> u64 {
    u64::from_le_bytes(buf[..8].try_into().expect("8-byte slice"))
}

pub fn write_u64_le(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}

pub fn read_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[..4].try_into().expect("4-byte slice"))
}

pub fn write_u32_le(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

pub fn read_u64_be(buf: &[u8]) -> u64 {
    u64::from_be_bytes(buf[..8].try_into().expect("8-byte slice"))
}

pub fn write_u64_be(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_be_bytes());
}

pub fn read_i64_be(buf: &[u8]) -> i64 {
    i64::from_be_bytes(buf[..8].try_into().expect("8-byte slice"))
}

pub fn write_i64_be(buf: &mut [u8], val: i64) {
    buf[..8].copy_from_slice(&val.to_be_bytes());
}

/// Read a little-endian counter of 0..=4 bytes (KMC `counter_size`). A
/// `counter_size` of 0 means "implicit counter 1", handled by the caller.
pub fn read_counter_le(buf: &[u8], counter_size: u8) -> u32 {
    let mut out = [0u8; 4];
    out[..counter_size as usize].copy_from_slice(&buf[..counter_size as usize]);
    u32::from_le_bytes(out)
}

pub fn write_counter_le(buf: &mut [u8], counter_size: u8, val: u32) {
    let bytes = val.to_le_bytes();
    buf[..counter_size as usize].copy_from_slice(&bytes[..counter_size as usize]);
}

/// Read a big-endian (MSB-first) counter of 0..=4 bytes (KFF record
/// `data_size`). A `data_size` of 0 means "implicit counter 1", handled by
/// the caller.
pub fn read_counter_be(buf: &[u8], counter_size: u8) -> u32 {
    let n = counter_size as usize;
    let mut out = [0u8; 4];
    out[4 - n..].copy_from_slice(&buf[..n]);
    u32::from_be_bytes(out)
}

pub fn write_counter_be(buf: &mut [u8], counter_size: u8, val: u32) {
    let n = counter_size as usize;
    let bytes = val.to_be_bytes();
    buf[..n].copy_from_slice(&bytes[4 - n..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_roundtrip_all_sizes() {
        for size in 0..=4u8 {
            let max = if size == 0 { 0 } else { (1u64 << (8 * size)) - 1 };
            let val = max.min(12345) as u32;
            let mut buf = [0u8; 4];
            write_counter_le(&mut buf, size, val);
            if size == 0 {
                continue;
            }
            assert_eq!(read_counter_le(&buf, size), val);
        }
    }

    #[test]
    fn counter_be_roundtrip_all_sizes() {
        for size in 0..=4u8 {
            let max = if size == 0 { 0 } else { (1u64 << (8 * size)) - 1 };
            let val = max.min(12345) as u32;
            let mut buf = [0u8; 4];
            write_counter_be(&mut buf, size, val);
            if size == 0 {
                continue;
            }
            assert_eq!(read_counter_be(&buf, size), val);
        }
    }

    #[test]
    fn counter_be_is_msb_first() {
        let mut buf = [0u8; 4];
        write_counter_be(&mut buf, 2, 0x0102);
        assert_eq!(&buf[..2], &[0x01, 0x02]);
    }

    #[test]
    fn u64_le_roundtrip() {
        let mut buf = [0u8; 8];
        write_u64_le(&mut buf, 0x0102_0304_0506_0708);
        assert_eq!(read_u64_le(&buf), 0x0102_0304_0506_0708);
        assert_eq!(buf[0], 0x08);
    }

    #[test]
    fn u64_be_roundtrip() {
        let mut buf = [0u8; 8];
        write_u64_be(&mut buf, 0x0102_0304_0506_0708);
        assert_eq!(read_u64_be(&buf), 0x0102_0304_0506_0708);
        assert_eq!(buf[0], 0x01);
    }
}
