//! Error types shared by every layer of the driver

use crate::status::ErrorCondition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A write moved no bytes, or the printer never answered
    #[error("IO timeout while talking to printer")]
    TransportTimeout,

    #[error("Status reply too short: expected {expected} bytes, got {actual}")]
    ShortFrame { expected: usize, actual: usize },

    #[error("Malformed status reply: {0}")]
    MalformedFrame(String),

    /// Neither image axis matches the printable height of the tape
    #[error(
        "At least one dimension needs to fit the tape width: {expected} vs ({width}, {height})"
    )]
    Dimension {
        expected: u32,
        width: u32,
        height: u32,
    },

    #[error("Unsupported color space for printing: {0}")]
    UnsupportedColorSpace(String),

    /// Raster buffer cannot be packed into whole bytes
    #[error("Raster buffer length {len} is not a multiple of 8")]
    Alignment { len: usize },

    #[error("Printer reported: {}", join_conditions(.0))]
    Printer(Vec<ErrorCondition>),

    #[error("Unsupported media width: {0} mm")]
    UnsupportedMediaWidth(u8),

    #[error("Printer status is unknown, open the session first")]
    StatusUnknown,

    #[error("No supported printer found, make sure the device is switched on")]
    NoPrinter,

    #[error("Unusable USB device: {0}")]
    Device(String),

    #[error("Invalid image: {0}")]
    Image(String),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("PNG decoding error: {0}")]
    Png(#[from] png::DecodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_conditions(conditions: &[ErrorCondition]) -> String {
    conditions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_error_lists_every_condition() {
        let err = Error::Printer(vec![ErrorCondition::NoMedia, ErrorCondition::CoverOpen]);
        assert_eq!(err.to_string(), "Printer reported: no-media, cover-open");
    }

    #[test]
    fn test_dimension_error_mentions_both_sizes() {
        let err = Error::Dimension {
            expected: 128,
            width: 40,
            height: 30,
        };
        assert_eq!(
            err.to_string(),
            "At least one dimension needs to fit the tape width: 128 vs (40, 30)"
        );
    }
}
