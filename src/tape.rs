use crate::error::{Error, Result};

/// Number of pins on the print head of every supported model
pub const PRINT_HEAD_PINS: u32 = 128;

/// Bytes in one packed raster line (one bit per head pin)
pub const LINE_LENGTH_BYTES: usize = (PRINT_HEAD_PINS / 8) as usize;

/// Shortest cut length the printer accepts: 25.4 mm at 180 dpi
pub const MINIMUM_TAPE_POINTS: u32 = 174;

/// Every status reply is exactly this long
pub const STATUS_MESSAGE_LENGTH: usize = 32;

pub const USB_VENDOR_BROTHER: u16 = 0x04f9;

/// Supported printers, identified by USB product ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
    E550W,
    P750W,
    P710BT,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::E550W, Model::P750W, Model::P710BT];

    pub fn product_id(&self) -> u16 {
        match self {
            Model::E550W => 0x2060,
            Model::P750W => 0x2062,
            Model::P710BT => 0x20af,
        }
    }

    pub fn from_product_id(product_id: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.product_id() == product_id)
    }

    pub fn head_pins(&self) -> u32 {
        match self {
            Model::E550W | Model::P750W | Model::P710BT => PRINT_HEAD_PINS,
        }
    }

    /// Look up the tape geometry for `width_mm` on this model
    pub fn tape_spec(&self, width_mm: u8) -> Result<TapeSpec> {
        let tape = Tape::from_width_mm(width_mm)?;
        Ok(TapeSpec::with_head_pins(tape, self.head_pins()))
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Model::E550W => write!(f, "PT-E550W"),
            Model::P750W => write!(f, "PT-P750W"),
            Model::P710BT => write!(f, "PT-P710BT"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tape {
    TZe3,
    TZe6,
    TZe9,
    TZe12,
    TZe18,
    TZe24,
}

impl Tape {
    /// Tape loaded in the printer, from the width in its status reply
    pub fn from_width_mm(mm: u8) -> Result<Self> {
        match mm {
            4 => Ok(Tape::TZe3),
            6 => Ok(Tape::TZe6),
            9 => Ok(Tape::TZe9),
            12 => Ok(Tape::TZe12),
            18 => Ok(Tape::TZe18),
            24 => Ok(Tape::TZe24),
            _ => Err(Error::UnsupportedMediaWidth(mm)),
        }
    }
}

impl std::fmt::Display for Tape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tape::TZe3 => write!(f, "3.5mm"),
            Tape::TZe6 => write!(f, "6mm"),
            Tape::TZe9 => write!(f, "9mm"),
            Tape::TZe12 => write!(f, "12mm"),
            Tape::TZe18 => write!(f, "18mm"),
            Tape::TZe24 => write!(f, "24mm"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapeSpec {
    pub name: Tape,       // Tape name
    pub width_mm: u8,     // Width as reported in the status reply
    pub margin_pins: u32, // Inactive pins on each side of the printable area
    pub print_pins: u32,  // Printable height in pixels
    pub total_pins: u32,  // Total printer pins
}

impl TapeSpec {
    pub fn new(tape_name: Tape) -> Self {
        Self::with_head_pins(tape_name, PRINT_HEAD_PINS)
    }

    /// Geometry of `tape_name` centred on a head with `head_pins` pins
    #[rustfmt::skip]
    pub fn with_head_pins(tape_name: Tape, head_pins: u32) -> Self {
        let (width_mm, margin_pins) = match tape_name {
            Tape::TZe3  =>  (4, 52),
            Tape::TZe6  =>  (6, 48),
            Tape::TZe9  =>  (9, 39),
            Tape::TZe12 => (12, 29),
            Tape::TZe18 => (18,  8),
            Tape::TZe24 => (24,  0),
        };
        TapeSpec {
            name: tape_name,
            width_mm,
            margin_pins,
            print_pins: head_pins - margin_pins * 2,
            total_pins: head_pins,
        }
    }
}
