#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use strum::{Display, EnumCount, EnumIter, FromRepr};

use enum_map::Enum;

/// Direction of signal flow through a plug, seen from the device.
#[derive(Copy, Clone, Debug, Display, Enum, EnumIter, EnumCount, FromRepr, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PlugDirection {
    Input,
    Output,
}

/// Addressing mode shared by every plug address on the wire.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AddressMode {
    Unit = 0x00,
    Subunit = 0x01,
    FunctionBlock = 0x02,
}

/// The three kinds of unit-level plugs.
#[derive(Copy, Clone, Debug, Display, Enum, EnumIter, EnumCount, FromRepr, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum UnitPlugType {
    Isoc,
    External,
    Async,
}

/// Subunit types from the AV/C general specification.
#[derive(Copy, Clone, Debug, Display, Enum, EnumIter, EnumCount, FromRepr, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SubunitType {
    Monitor,
    Audio,
    Printer,
    Disc,
    Tape,
    Tuner,
    Ca,
    Camera,
    Reserved,
    Panel,
    BulletinBoard,
    CameraStorage,
    Music,
}

/// What a plug carries, as reported by the extended plug info command.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PlugType {
    IsoStream = 0x00,
    AsyncStream = 0x01,
    Midi = 0x02,
    Sync = 0x03,
    Analog = 0x04,
    Digital = 0x05,
    Clock = 0x06,
}

/// Speaker placement of one channel inside a cluster.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ChannelPosition {
    NotAvailable = 0x00,
    LeftFront = 0x01,
    RightFront = 0x02,
    Center = 0x03,
    Subwoofer = 0x04,
    LeftSurround = 0x05,
    RightSurround = 0x06,
    LeftOfCenter = 0x07,
    RightOfCenter = 0x08,
    Surround = 0x09,
    SideLeft = 0x0a,
    SideRight = 0x0b,
    Top = 0x0c,
    Bottom = 0x0d,
    LeftFrontEffect = 0x0e,
    RightFrontEffect = 0x0f,
    NoPosition = 0x10,
}

/// Physical port class reported in cluster info responses.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PortType {
    Speaker = 0x00,
    Headphone = 0x01,
    Microphone = 0x02,
    Line = 0x03,
    Spdif = 0x04,
    Adat = 0x05,
    Tdif = 0x06,
    Madi = 0x07,
    Analog = 0x08,
    Digital = 0x09,
    Midi = 0x0a,
    NoType = 0x0b,
}

/// Role a function block plays inside its subunit.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum FunctionBlockPurpose {
    InputGain = 0x00,
    OutputVolume = 0x01,
    NothingSpecial = 0xff,
}

/// Sampling frequency codes from the AV/C stream format specification.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SamplingRate {
    R22050 = 0x00,
    R24000 = 0x01,
    R32000 = 0x02,
    R44100 = 0x03,
    R48000 = 0x04,
    R96000 = 0x05,
    R176400 = 0x06,
    R192000 = 0x07,
    R88200 = 0x0a,
    DontCare = 0x0f,
}

impl SamplingRate {
    /// The frequency in Hz, or `None` for the wildcard code.
    pub fn hz(&self) -> Option<u32> {
        match self {
            SamplingRate::R22050 => Some(22050),
            SamplingRate::R24000 => Some(24000),
            SamplingRate::R32000 => Some(32000),
            SamplingRate::R44100 => Some(44100),
            SamplingRate::R48000 => Some(48000),
            SamplingRate::R88200 => Some(88200),
            SamplingRate::R96000 => Some(96000),
            SamplingRate::R176400 => Some(176400),
            SamplingRate::R192000 => Some(192000),
            SamplingRate::DontCare => None,
        }
    }
}

/// Whether the sampling rate of a stream can be steered by the connected
/// controller.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum RateControl {
    Supported = 0x00,
    DontCare = 0x01,
    NotSupported = 0x02,
}

/// The two stream format families BeBoB devices report.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FormatKind {
    Compound,
    Sync,
}

/// Data type carried by one channel group of a stream format.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    Iec60958_3,
    Iec61937_3,
    Iec61937_4,
    Iec61937_5,
    Iec61937_6,
    Iec61937_7,
    MultiBitLinearAudioRaw,
    MultiBitLinearAudioDvd,
    OneBitAudioPlainRaw,
    OneBitAudioPlainSacd,
    OneBitAudioEncodedRaw,
    OneBitAudioEncodedSacd,
    HighPrecisionMultiBitLinearAudio,
    MidiConformant,
    SyncStream,
    DontCare,
    Reserved,
}

impl DataType {
    /// Maps a raw format tag. Out-of-table tags decode as `Reserved`
    /// rather than failing, since devices use vendor codes here.
    pub fn from_tag(tag: u8) -> DataType {
        match tag {
            0x00 => DataType::Iec60958_3,
            0x01 => DataType::Iec61937_3,
            0x02 => DataType::Iec61937_4,
            0x03 => DataType::Iec61937_5,
            0x04 => DataType::Iec61937_6,
            0x05 => DataType::Iec61937_7,
            0x06 => DataType::MultiBitLinearAudioRaw,
            0x07 => DataType::MultiBitLinearAudioDvd,
            0x08 => DataType::OneBitAudioPlainRaw,
            0x09 => DataType::OneBitAudioPlainSacd,
            0x0a => DataType::OneBitAudioEncodedRaw,
            0x0b => DataType::OneBitAudioEncodedSacd,
            0x0c => DataType::HighPrecisionMultiBitLinearAudio,
            0x0d => DataType::MidiConformant,
            0x40 => DataType::SyncStream,
            0xff => DataType::DontCare,
            _ => DataType::Reserved,
        }
    }
}

/// Identification read from the unit itself before any plug traffic.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitInfo {
    pub unit_type: SubunitType,
    pub unit_id: u8,
    pub company_id: CompanyId,
}

/// A 24-bit OUI as reported in UNIT INFO responses.
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompanyId(pub [u8; 3]);

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}:{:02x}:{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl std::fmt::Debug for CompanyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}
