//! Radar frame codec.
//!
//! The radar emits fixed 4-byte frames: two header bytes, the speed byte and
//! a terminator that must be `0x00`. Anything else is line noise and is
//! dropped without error.

/// Length of one radar frame in bytes.
pub const FRAME_LEN: usize = 4;

/// Terminator byte that marks a frame as valid.
pub const FRAME_TERMINATOR: u8 = 0x00;

/// Offset of the speed byte inside a frame.
const SPEED_OFFSET: usize = 2;

/// One raw frame as read from the transport.
pub type RawFrame = [u8; FRAME_LEN];

/// Decode a speed value from `bytes`.
///
/// Returns `None` for short reads and for frames whose terminator is not
/// [`FRAME_TERMINATOR`]. Extra trailing bytes are ignored.
///
/// # Examples
///
/// ```
/// use speedsign_core::frame::decode_frame;
///
/// assert_eq!(decode_frame(&[0xAA, 0x55, 72, 0x00]), Some(72));
/// assert_eq!(decode_frame(&[0xAA, 0x55, 72, 0x01]), None);
/// assert_eq!(decode_frame(&[0xAA, 0x55]), None);
/// ```
pub fn decode_frame(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < FRAME_LEN {
        return None;
    }
    if bytes[FRAME_LEN - 1] != FRAME_TERMINATOR {
        return None;
    }
    Some(u32::from(bytes[SPEED_OFFSET]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_frame() {
        assert_eq!(decode_frame(&[0x00, 0x00, 45, 0x00]), Some(45));
    }

    #[test]
    fn test_decode_ignores_header_bytes() {
        assert_eq!(decode_frame(&[0xFF, 0x12, 99, 0x00]), Some(99));
    }

    #[test]
    fn test_decode_zero_speed_is_a_sample() {
        assert_eq!(decode_frame(&[0xAA, 0x55, 0, 0x00]), Some(0));
    }

    #[test]
    fn test_decode_max_byte() {
        assert_eq!(decode_frame(&[0xAA, 0x55, 255, 0x00]), Some(255));
    }

    #[test]
    fn test_decode_bad_terminator() {
        assert_eq!(decode_frame(&[0xAA, 0x55, 80, 0x0D]), None);
    }

    #[test]
    fn test_decode_short_read() {
        assert_eq!(decode_frame(&[]), None);
        assert_eq!(decode_frame(&[0xAA]), None);
        assert_eq!(decode_frame(&[0xAA, 0x55, 80]), None);
    }

    #[test]
    fn test_decode_long_read_uses_first_frame() {
        assert_eq!(decode_frame(&[0xAA, 0x55, 33, 0x00, 0x99]), Some(33));
    }
}
