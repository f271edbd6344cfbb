//! Integer stream codec used by Crate index arrays.
//!
//! Values are turned into successive deltas, the most frequent delta becomes
//! the "common value", and each element is described by a 2-bit code: common
//! (no payload), i8, i16 or i32 delta. The code table shares its buffer with
//! the 4-byte common value, so element `i` lives in 2-bit slot `i + 16`.

use std::collections::HashMap;

/// Encode a sequence of 32-bit integers. Empty input yields empty output.
pub fn encode_ints(values: &[i32]) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut deltas = Vec::with_capacity(values.len());
    let mut prev = 0i32;
    for &v in values {
        deltas.push(v.wrapping_sub(prev));
        prev = v;
    }

    // Most frequent delta; ties go to the numerically largest one.
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for &d in &deltas {
        *counts.entry(d).or_insert(0) += 1;
    }
    let mut common = i32::MIN;
    let mut best = 0usize;
    for (&d, &c) in &counts {
        if c > best || (c == best && d > common) {
            best = c;
            common = d;
        }
    }

    let table_len = (values.len() * 2 + 7) / 8;
    let mut out = vec![0u8; 4 + table_len];
    out[0..4].copy_from_slice(&common.to_le_bytes());

    let mut payload = Vec::new();
    for (i, &d) in deltas.iter().enumerate() {
        let code: u8 = if d == common {
            0
        } else if (-128..=127).contains(&d) {
            payload.push(d as u8);
            1
        } else if (-32768..=32767).contains(&d) {
            payload.extend_from_slice(&(d as i16).to_le_bytes());
            2
        } else {
            payload.extend_from_slice(&d.to_le_bytes());
            3
        };
        let slot = i + 16;
        out[slot >> 2] |= code << ((slot & 3) * 2);
    }

    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inverse of `encode_ints`, for round-trip checks.
    fn decode_ints(data: &[u8], count: usize) -> Vec<i32> {
        if count == 0 {
            assert!(data.is_empty());
            return Vec::new();
        }
        let common = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let table_len = (count * 2 + 7) / 8;
        let mut cursor = 4 + table_len;
        let mut out = Vec::with_capacity(count);
        let mut prev = 0i32;
        for i in 0..count {
            let slot = i + 16;
            let code = (data[slot >> 2] >> ((slot & 3) * 2)) & 3;
            let delta = match code {
                0 => common,
                1 => {
                    let d = data[cursor] as i8 as i32;
                    cursor += 1;
                    d
                }
                2 => {
                    let d = i16::from_le_bytes([data[cursor], data[cursor + 1]]) as i32;
                    cursor += 2;
                    d
                }
                _ => {
                    let d = i32::from_le_bytes([
                        data[cursor],
                        data[cursor + 1],
                        data[cursor + 2],
                        data[cursor + 3],
                    ]);
                    cursor += 4;
                    d
                }
            };
            prev = prev.wrapping_add(delta);
            out.push(prev);
        }
        assert_eq!(cursor, data.len());
        out
    }

    #[test]
    fn test_all_same_delta() {
        // Every delta is 5: common value, two zeroed code bytes, no payload.
        let encoded = encode_ints(&[5, 10, 15, 20, 25]);
        assert_eq!(encoded, vec![5, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_empty() {
        assert!(encode_ints(&[]).is_empty());
        assert!(decode_ints(&[], 0).is_empty());
    }

    #[test]
    fn test_round_trip_mixed_widths() {
        let values = vec![0, 1, 2, -1, 300, 299, 70_000, -70_000, 70_000, 0];
        let encoded = encode_ints(&values);
        assert_eq!(decode_ints(&encoded, values.len()), values);
    }

    #[test]
    fn test_round_trip_sentinels() {
        // Field-set style input with -1 group terminators.
        let values = vec![0, 1, 2, -1, 3, 4, -1, 5, -1];
        let encoded = encode_ints(&values);
        assert_eq!(decode_ints(&encoded, values.len()), values);
    }

    #[test]
    fn test_round_trip_extremes() {
        let values = vec![i32::MAX, i32::MIN, 0, i32::MIN, i32::MAX];
        let encoded = encode_ints(&values);
        assert_eq!(decode_ints(&encoded, values.len()), values);
    }

    #[test]
    fn test_tie_breaks_to_largest_delta() {
        // Deltas are [1, 1, 9, 9]: counts tie, so 9 must win.
        let values = vec![1, 2, 11, 20];
        let encoded = encode_ints(&values);
        assert_eq!(&encoded[0..4], &9i32.to_le_bytes());
        assert_eq!(decode_ints(&encoded, values.len()), values);
    }

    #[test]
    fn test_single_value() {
        let encoded = encode_ints(&[42]);
        // One element: delta 42 is common; 4 + 1 table byte, no payload.
        assert_eq!(encoded, vec![42, 0, 0, 0, 0]);
        assert_eq!(decode_ints(&encoded, 1), vec![42]);
    }
}
