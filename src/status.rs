use crate::error::{Error, Result};
use crate::tape::STATUS_MESSAGE_LENGTH;

/// Byte offsets inside a status reply
pub mod offsets {
    pub const ERROR_INFORMATION_1: usize = 8;
    pub const ERROR_INFORMATION_2: usize = 9;
    pub const MEDIA_WIDTH: usize = 10;
    pub const MEDIA_TYPE: usize = 11;
    pub const MODE: usize = 15;
    pub const MEDIA_LENGTH: usize = 17;
    pub const STATUS_TYPE: usize = 18;
    pub const PHASE_TYPE: usize = 19;
    pub const PHASE_NUMBER: usize = 20;
    pub const NOTIFICATION_NUMBER: usize = 22;
    pub const TAPE_COLOR_INFORMATION: usize = 24;
    pub const TEXT_COLOR_INFORMATION: usize = 25;
    pub const HARDWARE_SETTINGS: usize = 26;
}

/// Declares a one-byte status code enum with strict decoding
macro_rules! status_code {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $code),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(code: u8) -> Result<Self> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(Error::MalformedFrame(format!(
                        "unknown {} code 0x{:02X}",
                        stringify!($name),
                        code
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Debug::fmt(self, f)
            }
        }
    };
}

status_code!(MediaType {
    NoMedia = 0x00,
    LaminatedTape = 0x01,
    NonLaminatedTape = 0x03,
    HeatShrinkTube = 0x11,
    IncompatibleTape = 0xFF,
});

status_code!(StatusType {
    Reply = 0x00,
    PrintingCompleted = 0x01,
    ErrorOccurred = 0x02,
    TurnedOff = 0x04,
    Notification = 0x05,
    PhaseChange = 0x06,
});

status_code!(PhaseType {
    Editing = 0x00,
    Printing = 0x01,
});

status_code!(NotificationNumber {
    NotAvailable = 0x00,
    CoverOpen = 0x01,
    CoverClosed = 0x02,
});

status_code!(TapeColor {
    White = 0x01,
    Other = 0x02,
    Clear = 0x03,
    Red = 0x04,
    Blue = 0x05,
    Yellow = 0x06,
    Green = 0x07,
    Black = 0x08,
    ClearWhiteText = 0x09,
    MatteWhite = 0x20,
    MatteClear = 0x21,
    MatteSilver = 0x22,
    SatinGold = 0x23,
    SatinSilver = 0x24,
    BlueD = 0x30,
    RedD = 0x31,
    FluorescentOrange = 0x40,
    FluorescentYellow = 0x41,
    BerryPinkS = 0x50,
    LightGrayS = 0x51,
    LimeGreenS = 0x52,
    YellowF = 0x60,
    PinkF = 0x61,
    BlueF = 0x62,
    WhiteHeatShrinkTube = 0x70,
    WhiteFlexId = 0x90,
    YellowFlexId = 0x91,
    Cleaning = 0xF0,
    Stencil = 0xF1,
    Incompatible = 0xFF,
});

status_code!(TextColor {
    White = 0x01,
    Other = 0x02,
    Red = 0x04,
    Blue = 0x05,
    Black = 0x08,
    Gold = 0x0A,
    BlueF = 0x62,
    Cleaning = 0xF0,
    Stencil = 0xF1,
    Incompatible = 0xFF,
});

/// Hardware condition reported through the two error bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCondition {
    NoMedia,
    EndOfMedia,
    CutterJam,
    LowBattery,
    PrinterInUse,
    HighVoltageAdapter,
    WrongMedia,
    ExpansionBufferFull,
    CommunicationError,
    CommunicationBufferFull,
    CoverOpen,
    Overheating,
    TapeLeaderNotDetected,
    SystemError,
    /// Error reply without any recognised flag
    Unknown,
}

#[rustfmt::skip]
const ERROR_INFORMATION_1: [(u8, ErrorCondition); 6] = [
    (0x01, ErrorCondition::NoMedia),
    (0x02, ErrorCondition::EndOfMedia),
    (0x04, ErrorCondition::CutterJam),
    (0x08, ErrorCondition::LowBattery),
    (0x10, ErrorCondition::PrinterInUse),
    (0x40, ErrorCondition::HighVoltageAdapter),
];

#[rustfmt::skip]
const ERROR_INFORMATION_2: [(u8, ErrorCondition); 8] = [
    (0x01, ErrorCondition::WrongMedia),
    (0x02, ErrorCondition::ExpansionBufferFull),
    (0x04, ErrorCondition::CommunicationError),
    (0x08, ErrorCondition::CommunicationBufferFull),
    (0x10, ErrorCondition::CoverOpen),
    (0x20, ErrorCondition::Overheating),
    (0x40, ErrorCondition::TapeLeaderNotDetected),
    (0x80, ErrorCondition::SystemError),
];

impl std::fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCondition::NoMedia => "no-media",
            ErrorCondition::EndOfMedia => "end-of-media",
            ErrorCondition::CutterJam => "cutter-jam",
            ErrorCondition::LowBattery => "low-battery",
            ErrorCondition::PrinterInUse => "printer-in-use",
            ErrorCondition::HighVoltageAdapter => "high-voltage-adapter",
            ErrorCondition::WrongMedia => "wrong-media",
            ErrorCondition::ExpansionBufferFull => "expansion-buffer-full",
            ErrorCondition::CommunicationError => "communication-error",
            ErrorCondition::CommunicationBufferFull => "communication-buffer-full",
            ErrorCondition::CoverOpen => "cover-open",
            ErrorCondition::Overheating => "overheating",
            ErrorCondition::TapeLeaderNotDetected => "tape-leader-not-detected",
            ErrorCondition::SystemError => "system-error",
            ErrorCondition::Unknown => "unknown-error",
        };
        f.write_str(name)
    }
}

/// Decoded status reply
///
/// Built once per read with [`Status::decode`]; the enumerated fields are
/// validated up front so the accessors cannot fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    raw_data: [u8; STATUS_MESSAGE_LENGTH],
    media_type: MediaType,
    status_type: StatusType,
    tape_color: TapeColor,
    text_color: TextColor,
}

impl Status {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < STATUS_MESSAGE_LENGTH {
            return Err(Error::ShortFrame {
                expected: STATUS_MESSAGE_LENGTH,
                actual: data.len(),
            });
        }

        let mut raw_data = [0u8; STATUS_MESSAGE_LENGTH];
        raw_data.copy_from_slice(&data[..STATUS_MESSAGE_LENGTH]);

        Ok(Status {
            media_type: MediaType::try_from(raw_data[offsets::MEDIA_TYPE])?,
            status_type: StatusType::try_from(raw_data[offsets::STATUS_TYPE])?,
            tape_color: TapeColor::try_from(raw_data[offsets::TAPE_COLOR_INFORMATION])?,
            text_color: TextColor::try_from(raw_data[offsets::TEXT_COLOR_INFORMATION])?,
            raw_data,
        })
    }

    pub fn raw_data(&self) -> &[u8; STATUS_MESSAGE_LENGTH] {
        &self.raw_data
    }

    pub fn error_info1(&self) -> u8 {
        self.raw_data[offsets::ERROR_INFORMATION_1]
    }

    pub fn error_info2(&self) -> u8 {
        self.raw_data[offsets::ERROR_INFORMATION_2]
    }

    pub fn has_errors(&self) -> bool {
        self.error_info1() != 0x00 || self.error_info2() != 0x00
    }

    pub fn media_width_mm(&self) -> u8 {
        self.raw_data[offsets::MEDIA_WIDTH]
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn media_length_mm(&self) -> u8 {
        self.raw_data[offsets::MEDIA_LENGTH]
    }

    pub fn auto_cut(&self) -> bool {
        self.raw_data[offsets::MODE] & 0x40 != 0
    }

    pub fn mirror_printing(&self) -> bool {
        self.raw_data[offsets::MODE] & 0x80 != 0
    }

    pub fn status_type(&self) -> StatusType {
        self.status_type
    }

    /// `None` for phase codes the printer documents no meaning for
    pub fn phase_type(&self) -> Option<PhaseType> {
        PhaseType::try_from(self.raw_data[offsets::PHASE_TYPE]).ok()
    }

    pub fn phase_number(&self) -> u16 {
        u16::from_be_bytes([
            self.raw_data[offsets::PHASE_NUMBER],
            self.raw_data[offsets::PHASE_NUMBER + 1],
        ])
    }

    pub fn notification(&self) -> Option<NotificationNumber> {
        NotificationNumber::try_from(self.raw_data[offsets::NOTIFICATION_NUMBER]).ok()
    }

    pub fn tape_color(&self) -> TapeColor {
        self.tape_color
    }

    pub fn text_color(&self) -> TextColor {
        self.text_color
    }

    pub fn hardware_settings(&self) -> u8 {
        self.raw_data[offsets::HARDWARE_SETTINGS]
    }

    /// Every condition flagged in the error bytes, byte 1 first, low bit first
    pub fn error_conditions(&self) -> Vec<ErrorCondition> {
        let error_info1 = self.error_info1();
        let error_info2 = self.error_info2();

        let mut conditions: Vec<ErrorCondition> = ERROR_INFORMATION_1
            .iter()
            .filter(|(mask, _)| error_info1 & mask != 0)
            .chain(
                ERROR_INFORMATION_2
                    .iter()
                    .filter(|(mask, _)| error_info2 & mask != 0),
            )
            .map(|&(_, condition)| condition)
            .collect();

        if conditions.is_empty() && self.status_type == StatusType::ErrorOccurred {
            conditions.push(ErrorCondition::Unknown);
        }
        conditions
    }
}

/// Field values for building a status reply by hand
///
/// Mostly useful for feeding simulated printers.
#[derive(Clone, Debug)]
pub struct StatusFields {
    pub error_info1: u8,
    pub error_info2: u8,
    pub media_width_mm: u8,
    pub media_type: u8,
    pub mode: u8,
    pub media_length_mm: u8,
    pub status_type: u8,
    pub phase_type: u8,
    pub phase_number: u16,
    pub notification: u8,
    pub tape_color: u8,
    pub text_color: u8,
    pub hardware_settings: u8,
}

impl Default for StatusFields {
    fn default() -> Self {
        StatusFields {
            error_info1: 0,
            error_info2: 0,
            media_width_mm: 24,
            media_type: MediaType::LaminatedTape.code(),
            mode: 0,
            media_length_mm: 0,
            status_type: StatusType::Reply.code(),
            phase_type: PhaseType::Editing.code(),
            phase_number: 0,
            notification: NotificationNumber::NotAvailable.code(),
            tape_color: TapeColor::White.code(),
            text_color: TextColor::Black.code(),
            hardware_settings: 0,
        }
    }
}

impl StatusFields {
    pub fn to_bytes(&self) -> [u8; STATUS_MESSAGE_LENGTH] {
        let mut data = [0u8; STATUS_MESSAGE_LENGTH];
        // Print head mark, size and fixed header
        data[0] = 0x80;
        data[1] = STATUS_MESSAGE_LENGTH as u8;
        data[2] = b'B';
        data[3] = b'0';
        data[offsets::ERROR_INFORMATION_1] = self.error_info1;
        data[offsets::ERROR_INFORMATION_2] = self.error_info2;
        data[offsets::MEDIA_WIDTH] = self.media_width_mm;
        data[offsets::MEDIA_TYPE] = self.media_type;
        data[offsets::MODE] = self.mode;
        data[offsets::MEDIA_LENGTH] = self.media_length_mm;
        data[offsets::STATUS_TYPE] = self.status_type;
        data[offsets::PHASE_TYPE] = self.phase_type;
        data[offsets::PHASE_NUMBER..offsets::PHASE_NUMBER + 2]
            .copy_from_slice(&self.phase_number.to_be_bytes());
        data[offsets::NOTIFICATION_NUMBER] = self.notification;
        data[offsets::TAPE_COLOR_INFORMATION] = self.tape_color;
        data[offsets::TEXT_COLOR_INFORMATION] = self.text_color;
        data[offsets::HARDWARE_SETTINGS] = self.hardware_settings;
        data
    }
}
