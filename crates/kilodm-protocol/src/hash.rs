use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 hash of the input bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut k = Keccak::v256();
    let mut out = [0u8; 32];
    k.update(data);
    k.finalize(&mut out);
    out
}

/// 16-bit digest: the first two bytes of keccak256, big-endian.
///
/// Used both as the frame checksum and as the content signature that keys
/// buffered peer messages.
pub fn digest16(data: &[u8]) -> u16 {
    let h = keccak256(data);
    u16::from_be_bytes([h[0], h[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest16_is_prefix_of_keccak() {
        let h = keccak256(b"kilobot");
        assert_eq!(digest16(b"kilobot"), u16::from_be_bytes([h[0], h[1]]));
    }

    #[test]
    fn digest16_differs_on_content() {
        assert_ne!(digest16(&[0u8; 10]), digest16(&[1u8; 10]));
    }

    #[test]
    fn empty_input_is_defined() {
        // keccak256("") = c5d2460186f7233c...
        assert_eq!(digest16(&[]), 0xc5d2);
    }
}
