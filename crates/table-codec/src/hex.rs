use crate::TableError;

/// Decodes a little-endian hex byte string into an unsigned integer.
///
/// Odd-length input is padded with a leading zero before the byte pairs are
/// read, so `"400"` decodes the bytes `04 00`.
pub fn decode_le(hex: &str) -> Result<u64, TableError> {
    let padded;
    let hex = if hex.len() % 2 == 0 {
        hex
    } else {
        padded = ["0", hex].concat();
        &padded
    };

    let invalid = || TableError::InvalidHex { input: hex.to_owned() };

    let mut value: u64 = 0;
    for (pair, byte) in hex.as_bytes().chunks(2).enumerate() {
        let byte = u8::from_str_radix(
            std::str::from_utf8(byte).map_err(|_| invalid())?,
            16,
        )
        .map_err(|_| invalid())?;

        if byte != 0 {
            if pair >= 8 {
                return Err(TableError::HexOverflow { input: hex.to_owned() });
            }
            value |= u64::from(byte) << (pair * 8);
        }
    }

    Ok(value)
}

/// Encodes an unsigned integer as a little-endian hex byte string of exactly
/// `digits` hex digits, zero-padding or truncating the high bytes as needed.
///
/// This is the exact inverse of `decode_le` for any value representable in
/// the requested width.
pub fn encode_le(value: u64, digits: usize) -> String {
    assert!(digits % 2 == 0, "digit count must describe whole bytes");

    let mut out = String::with_capacity(digits);
    for byte in value.to_le_bytes().iter().take(digits / 2) {
        out.push_str(&format!("{:02x}", byte));
    }

    // Widths beyond eight bytes are padding only.
    while out.len() < digits {
        out.push_str("00");
    }

    out
}

/// Renders a byte slice as lowercase hex, for display purposes.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_le_is_little_endian() {
        assert_eq!(decode_le("0100"), Ok(1));
        assert_eq!(decode_le("0001"), Ok(256));
        assert_eq!(decode_le("00040000"), Ok(1024));
    }

    #[test]
    fn decode_le_pads_odd_input() {
        assert_eq!(decode_le("400"), Ok(4));
        assert_eq!(decode_le("0"), Ok(0));
    }

    #[test]
    fn decode_le_rejects_garbage() {
        assert!(decode_le("zz").is_err());
        assert!(decode_le("12g4").is_err());
    }

    #[test]
    fn decode_le_overflow() {
        assert_eq!(decode_le("ffffffffffffffff"), Ok(u64::max_value()));
        assert!(decode_le("000000000000000001").is_err());
        // Trailing zero bytes beyond eight are harmless.
        assert_eq!(decode_le("010000000000000000"), Ok(1));
    }

    #[test]
    fn encode_le_pads_to_width() {
        assert_eq!(encode_le(1024, 8), "00040000");
        assert_eq!(encode_le(1, 4), "0100");
        assert_eq!(encode_le(256, 4), "0001");
        assert_eq!(encode_le(0, 2), "00");
    }

    #[test]
    fn encode_le_truncates_high_bytes() {
        assert_eq!(encode_le(0x0102_0304, 4), "0403");
    }

    #[test]
    fn round_trip() {
        for &(value, digits) in
            &[(0u64, 2), (1, 8), (255, 2), (256, 4), (1024, 8), (0xdead_beef, 8), (u64::max_value(), 16)]
        {
            let encoded = encode_le(value, digits);
            assert_eq!(encoded.len(), digits);
            assert_eq!(decode_le(&encoded), Ok(value), "width {} value {}", digits, value);
        }
    }

    #[test]
    fn to_hex_renders_bytes() {
        assert_eq!(to_hex(&[0x55, 0xaa]), "55aa");
        assert_eq!(to_hex(&[]), "");
    }
}
