//! Brother P-touch raster command frames
//!
//! Every function returns one complete frame, ready to be handed to a
//! [`Transport`](crate::backend::Transport). Frames carry no state between
//! each other; the printer expects them in the order used by
//! [`PrintSession`](crate::printer::PrintSession).
//!
//! Reference: Raster Command Reference for PT-E550W/P750W/P710BT

use crate::tape::LINE_LENGTH_BYTES;

/// Number of zero bytes sent to flush a half-received command
pub const INVALIDATE_LENGTH: usize = 100;

const RASTER_TRANSFER: u8 = 0x47; // 'G'
const ZERO_RASTER: u8 = 0x5A; // 'Z'

/// Settings carried by [`set_advanced_mode`]
#[derive(Clone, Copy, Debug, Default)]
pub struct AdvancedMode {
    pub draft: bool,
    pub half_cut: bool,
    pub no_chain: bool,
    pub special_tape: bool,
    pub high_resolution: bool,
    pub no_clear: bool,
}

impl AdvancedMode {
    /// Chain printing off: the last label is fed and cut after printing
    pub fn no_chain() -> Self {
        AdvancedMode {
            no_chain: true,
            ..Default::default()
        }
    }
}

/// Invalidate sequence
///
/// Clears whatever the printer received before, so it starts parsing
/// from a known state.
pub fn invalidate() -> Vec<u8> {
    vec![0x00; INVALIDATE_LENGTH]
}

/// ESC @
pub fn initialize() -> Vec<u8> {
    b"\x1B\x40".to_vec()
}

/// ESC i S
///
/// The printer answers with a 32-byte status reply.
pub fn status_information_request() -> Vec<u8> {
    b"\x1B\x69\x53".to_vec()
}

/// Switch dynamic command mode to raster mode
pub fn enter_dynamic_command_mode() -> Vec<u8> {
    b"\x1B\x69\x61\x01".to_vec()
}

/// Enable automatic status notification
///
/// With notification on, the printer reports completion and errors
/// on its own after the print command.
pub fn enable_status_notification() -> Vec<u8> {
    b"\x1B\x69\x21\x00".to_vec()
}

/// Print information command
///
/// Declares the tape width and the number of raster lines that follow so
/// the printer can validate the job before it starts.
///
/// # Arguments
/// * `raster_byte_length` - Length of the packed raster stream
/// * `media_width` - Media width in mm, as reported by the printer
pub fn print_information(raster_byte_length: usize, media_width: u8) -> Vec<u8> {
    // recover mode (0x80) | media width valid (0x04)
    let flag = 0x80 | 0x04;
    let raster_number = (raster_byte_length / LINE_LENGTH_BYTES) as u32;

    let mut frame = b"\x1B\x69\x7A".to_vec();
    frame.push(flag);
    frame.push(0x00); // media type
    frame.push(media_width);
    frame.push(0x00); // media length
    frame.extend_from_slice(&raster_number.to_le_bytes());
    frame.push(0x00); // starting page
    frame.push(0x00);
    frame
}

/// Various mode settings
///
/// # Arguments
/// * `auto_cut` - Cut after each label
/// * `mirror` - Mirror printing
pub fn set_mode(auto_cut: bool, mirror: bool) -> Vec<u8> {
    let param = (auto_cut as u8) << 6  // 0x40
              | (mirror as u8)   << 7; // 0x80
    vec![0x1B, 0x69, 0x4D, param]
}

/// Advanced mode settings
pub fn set_advanced_mode(mode: AdvancedMode) -> Vec<u8> {
    let param = (mode.draft as u8)                 // 0x01
              | (mode.half_cut as u8)        << 2  // 0x04
              | (mode.no_chain as u8)        << 3  // 0x08
              | (mode.special_tape as u8)    << 4  // 0x10
              | (mode.high_resolution as u8) << 6  // 0x40
              | (mode.no_clear as u8)        << 7; // 0x80
    vec![0x1B, 0x69, 0x4B, param]
}

/// Specify margin amount (feed before and after the label)
///
/// # Arguments
/// * `dots` - Margin in print-head dots; one dot per raster line
pub fn margin_amount(dots: u16) -> Vec<u8> {
    let mut frame = b"\x1B\x69\x64".to_vec();
    frame.extend_from_slice(&dots.to_le_bytes());
    frame
}

/// Select TIFF (PackBits) compression for the raster lines that follow
pub fn set_compression_mode() -> Vec<u8> {
    b"\x4D\x02".to_vec()
}

/// Zero raster graphics: one blank line
pub fn zero_raster_line() -> Vec<u8> {
    vec![ZERO_RASTER]
}

/// Raster graphics transfer frames, one per line of `rasterized_image`
///
/// Blank lines use the one-byte zero raster command; others are
/// PackBits-compressed and prefixed with their compressed length.
pub fn gen_raster_commands(rasterized_image: &[u8]) -> impl Iterator<Item = Vec<u8>> + '_ {
    rasterized_image
        .chunks(LINE_LENGTH_BYTES)
        .map(|line| {
            if line.iter().all(|&b| b == 0x00) {
                return zero_raster_line();
            }
            let packed_line = pack_bits(line);
            let mut frame = Vec::with_capacity(packed_line.len() + 3);
            frame.push(RASTER_TRANSFER);
            frame.extend_from_slice(&(packed_line.len() as u16).to_le_bytes());
            frame.extend_from_slice(&packed_line);
            frame
        })
}

/// Print command: print without feeding, the tape stays in place
pub fn print_without_feeding() -> Vec<u8> {
    vec![0x0C]
}

/// Print command with feeding: print, then feed and cut the label
pub fn print_with_feeding() -> Vec<u8> {
    vec![0x1A]
}

fn take_consecutive_run(data: &[u8]) -> &[u8] {
    if data.len() < 2 || data[0] != data[1] {
        return &[];
    }

    let first_byte = data[0];
    let mut len = 1;

    while len < data.len() && data[len] == first_byte && len < 128 {
        len += 1;
    }

    &data[..len]
}

fn take_literal_run(data: &[u8]) -> &[u8] {
    let mut len = 0;

    while len < data.len() && len < 128 {
        if !take_consecutive_run(&data[len..]).is_empty() {
            break;
        }
        len += 1;
    }

    &data[..len]
}

/// PackBits run length encoding
///
/// - Run data (2..=128 equal bytes): `1 - count` as two's complement + byte
/// - Literal data (1..=128 bytes): `count - 1` + raw bytes
pub fn pack_bits(data: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut remaining = data;

    while !remaining.is_empty() {
        let consecutive_run = take_consecutive_run(remaining);

        let count = if !consecutive_run.is_empty() {
            let count = consecutive_run.len();
            compressed.push((257 - count) as u8);
            compressed.push(consecutive_run[0]);
            count
        } else {
            let literal_run = take_literal_run(remaining);
            let count = literal_run.len();
            compressed.push((count - 1) as u8);
            compressed.extend_from_slice(literal_run);
            count
        };

        remaining = &remaining[count..];
    }

    compressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unpack_bits(mut data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some((&header, rest)) = data.split_first() {
            if header < 0x80 {
                let count = header as usize + 1;
                out.extend_from_slice(&rest[..count]);
                data = &rest[count..];
            } else {
                let count = 257 - header as usize;
                out.extend(std::iter::repeat_n(rest[0], count));
                data = &rest[1..];
            }
        }
        out
    }

    #[test]
    fn test_fixed_frames() {
        assert_eq!(invalidate(), vec![0x00; 100]);
        assert_eq!(initialize(), vec![0x1B, 0x40]);
        assert_eq!(status_information_request(), vec![0x1B, 0x69, 0x53]);
        assert_eq!(enter_dynamic_command_mode(), vec![0x1B, 0x69, 0x61, 0x01]);
        assert_eq!(enable_status_notification(), vec![0x1B, 0x69, 0x21, 0x00]);
        assert_eq!(set_compression_mode(), vec![0x4D, 0x02]);
        assert_eq!(print_with_feeding(), vec![0x1A]);
        assert_eq!(print_without_feeding(), vec![0x0C]);
    }

    #[test]
    fn test_print_information() {
        // 24mm tape, 300 lines of 16 bytes
        let frame = print_information(300 * 16, 24);
        assert_eq!(
            frame,
            vec![
                0x1B, 0x69, 0x7A, 0x84, 0x00, 0x18, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x00,
            ]
        );

        let frame = print_information(16, 12);
        assert_eq!(frame[5], 12);
        assert_eq!(&frame[7..11], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_mode_settings() {
        assert_eq!(set_mode(true, false), vec![0x1B, 0x69, 0x4D, 0x40]);
        assert_eq!(set_mode(true, true), vec![0x1B, 0x69, 0x4D, 0xC0]);
        assert_eq!(
            set_advanced_mode(AdvancedMode::no_chain()),
            vec![0x1B, 0x69, 0x4B, 0x08]
        );
        let all = AdvancedMode {
            draft: true,
            half_cut: true,
            no_chain: true,
            special_tape: true,
            high_resolution: true,
            no_clear: true,
        };
        assert_eq!(set_advanced_mode(all), vec![0x1B, 0x69, 0x4B, 0xDD]);
    }

    #[test]
    fn test_margin_amount() {
        assert_eq!(margin_amount(0), vec![0x1B, 0x69, 0x64, 0x00, 0x00]);
        assert_eq!(margin_amount(0x0123), vec![0x1B, 0x69, 0x64, 0x23, 0x01]);
    }

    #[test]
    fn test_raster_commands_one_frame_per_line() {
        let mut raster = vec![0x00u8; 16];
        raster.extend_from_slice(&[0xFF; 16]);
        raster.extend_from_slice(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        raster.extend_from_slice(&[0x00; 8]);

        let frames: Vec<Vec<u8>> = gen_raster_commands(&raster).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![0x5A]);
        assert_eq!(frames[1], vec![0x47, 0x02, 0x00, 0xF1, 0xFF]);
        assert_eq!(frames[2][0], 0x47);
        let len = u16::from_le_bytes([frames[2][1], frames[2][2]]) as usize;
        assert_eq!(len, frames[2].len() - 3);
        assert_eq!(unpack_bits(&frames[2][3..]), raster[32..48].to_vec());
    }

    #[test]
    fn test_raster_commands_empty() {
        assert_eq!(gen_raster_commands(&[]).count(), 0);
    }

    #[test]
    fn test_pack_bits_all_zero() {
        assert_eq!(pack_bits(&[0x00; 70]), vec![0xBB, 0x00]);
    }

    #[test]
    fn test_pack_bits_long_run_is_split() {
        let result = pack_bits(&[0xFF; 200]);
        // 128 + 72
        assert_eq!(result, vec![0x81, 0xFF, 0xB9, 0xFF]);
        assert_eq!(unpack_bits(&result), vec![0xFF; 200]);
    }

    #[test]
    fn test_pack_bits_empty() {
        assert_eq!(pack_bits(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_pack_bits_single_byte() {
        assert_eq!(pack_bits(&[0x42]), vec![0x00, 0x42]);
    }

    #[test]
    fn test_pack_bits_mixed_data() {
        let mixed_data = [0x23, 0xBA, 0xBF, 0xFF, 0xFF, 0xFF, 0xA2, 0x22, 0x2B];
        let expected = vec![
            0x02, 0x23, 0xBA, 0xBF, // literal x3
            0xFE, 0xFF, // run x3
            0x02, 0xA2, 0x22, 0x2B, // literal x3
        ];
        assert_eq!(pack_bits(&mixed_data), expected);
    }

    #[test]
    fn test_pack_bits_alternating() {
        let alt_data: Vec<u8> = (0..200)
            .map(|i| if i % 2 == 0 { 0x00 } else { 0xFF })
            .collect();
        let result = pack_bits(&alt_data);
        assert_eq!(result[0], 0x7F);
        assert_eq!(unpack_bits(&result), alt_data);
    }
}
