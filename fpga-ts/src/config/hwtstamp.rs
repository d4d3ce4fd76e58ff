//! The hardware timestamping control request
//!
//! The request uses the layout and constants of the Linux `hwtstamp_config`
//! structure, so it can be passed through an ioctl unchanged.

/// Errno reported for invalid arguments
const EINVAL: i32 = 22;
/// Errno reported when the request cannot be copied
const EFAULT: i32 = 14;

/// Transmit timestamping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(i32)]
pub enum TxType {
    #[default]
    Off = 0,
    On = 1,
}

impl TryFrom<i32> for TxType {
    type Error = HwTstampError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TxType::Off),
            1 => Ok(TxType::On),
            _ => Err(HwTstampError::UnsupportedTxType(value)),
        }
    }
}

/// Receive timestamping filter
///
/// The capture unit timestamps all PTPv2 event messages, so the narrower
/// filters are widened to [`RxFilter::PtpV2L4Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(i32)]
pub enum RxFilter {
    #[default]
    None = 0,
    PtpV2L4Event = 6,
    PtpV2L4Sync = 7,
    PtpV2L4DelayReq = 8,
}

impl TryFrom<i32> for RxFilter {
    type Error = HwTstampError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RxFilter::None),
            6 => Ok(RxFilter::PtpV2L4Event),
            7 => Ok(RxFilter::PtpV2L4Sync),
            8 => Ok(RxFilter::PtpV2L4DelayReq),
            _ => Err(HwTstampError::UnsupportedRxFilter(value)),
        }
    }
}

impl RxFilter {
    pub fn is_enabled(self) -> bool {
        self != RxFilter::None
    }

    /// The filter the hardware actually applies
    pub fn normalized(self) -> Self {
        match self {
            RxFilter::None => RxFilter::None,
            RxFilter::PtpV2L4Event | RxFilter::PtpV2L4Sync | RxFilter::PtpV2L4DelayReq => {
                RxFilter::PtpV2L4Event
            }
        }
    }
}

/// A validated timestamping configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct HwTstampConfig {
    pub tx_type: TxType,
    pub rx_filter: RxFilter,
}

impl HwTstampConfig {
    pub fn normalized(self) -> Self {
        HwTstampConfig {
            tx_type: self.tx_type,
            rx_filter: self.rx_filter.normalized(),
        }
    }
}

impl TryFrom<RawHwTstampConfig> for HwTstampConfig {
    type Error = HwTstampError;

    fn try_from(raw: RawHwTstampConfig) -> Result<Self, Self::Error> {
        // reserved for future extensions
        if raw.flags != 0 {
            return Err(HwTstampError::ReservedFlags(raw.flags));
        }

        Ok(HwTstampConfig {
            tx_type: raw.tx_type.try_into()?,
            rx_filter: raw.rx_filter.try_into()?,
        })
    }
}

/// The request as it travels between caller and driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct RawHwTstampConfig {
    pub flags: u32,
    pub tx_type: i32,
    pub rx_filter: i32,
}

impl RawHwTstampConfig {
    /// Size of the structure in bytes
    pub const SIZE: usize = 12;

    pub fn from_ne_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let word = |i: usize| [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];

        RawHwTstampConfig {
            flags: u32::from_ne_bytes(word(0)),
            tx_type: i32::from_ne_bytes(word(4)),
            rx_filter: i32::from_ne_bytes(word(8)),
        }
    }

    pub fn to_ne_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.flags.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.tx_type.to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.rx_filter.to_ne_bytes());
        bytes
    }
}

impl From<HwTstampConfig> for RawHwTstampConfig {
    fn from(config: HwTstampConfig) -> Self {
        RawHwTstampConfig {
            flags: 0,
            tx_type: config.tx_type as i32,
            rx_filter: config.rx_filter as i32,
        }
    }
}

/// The request could not be copied from or to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportFault;

/// Moves a [`RawHwTstampConfig`] between the caller and the driver
pub trait ConfigTransport {
    fn read(&self) -> Result<RawHwTstampConfig, TransportFault>;

    fn write(&mut self, config: &RawHwTstampConfig) -> Result<(), TransportFault>;
}

/// Transport over a caller provided byte buffer in native byte order
#[derive(Debug)]
pub struct SliceTransport<'a> {
    buffer: &'a mut [u8],
}

impl<'a> SliceTransport<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        SliceTransport { buffer }
    }
}

impl ConfigTransport for SliceTransport<'_> {
    fn read(&self) -> Result<RawHwTstampConfig, TransportFault> {
        let bytes = self
            .buffer
            .get(..RawHwTstampConfig::SIZE)
            .ok_or(TransportFault)?;

        let mut raw = [0; RawHwTstampConfig::SIZE];
        raw.copy_from_slice(bytes);
        Ok(RawHwTstampConfig::from_ne_bytes(raw))
    }

    fn write(&mut self, config: &RawHwTstampConfig) -> Result<(), TransportFault> {
        self.buffer
            .get_mut(..RawHwTstampConfig::SIZE)
            .ok_or(TransportFault)?
            .copy_from_slice(&config.to_ne_bytes());
        Ok(())
    }
}

/// Reasons a timestamping request is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum HwTstampError {
    #[cfg_attr(feature = "std", error("reserved flags {0:#010x} must be zero"))]
    ReservedFlags(u32),
    #[cfg_attr(feature = "std", error("tx_type {0} not supported"))]
    UnsupportedTxType(i32),
    #[cfg_attr(feature = "std", error("rx_filter {0} not supported"))]
    UnsupportedRxFilter(i32),
    #[cfg_attr(feature = "std", error("could not transfer timestamping request"))]
    Fault,
}

impl HwTstampError {
    /// Whether the request itself was malformed, as opposed to unreachable
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self, HwTstampError::Fault)
    }

    /// The (positive) errno an ioctl would report for this error
    pub fn errno(&self) -> i32 {
        if self.is_invalid_argument() {
            EINVAL
        } else {
            EFAULT
        }
    }
}

impl From<TransportFault> for HwTstampError {
    fn from(_: TransportFault) -> Self {
        HwTstampError::Fault
    }
}
