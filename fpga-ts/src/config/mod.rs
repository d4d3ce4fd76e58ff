mod hwtstamp;

pub use hwtstamp::{
    ConfigTransport, HwTstampConfig, HwTstampError, RawHwTstampConfig, RxFilter, SliceTransport,
    TransportFault, TxType,
};

/// How the correlation pass resolves a timestamp and a packet whose sequence
/// ids differ.
///
/// In both policies exactly one of the two entries is dropped and the other
/// is kept for the next comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ResyncPolicy {
    /// Drop the entry with the higher sequence id.
    ///
    /// A timestamp ahead of its packet is discarded, a packet ahead of its
    /// timestamp is released without timestamp. This is what the capture
    /// driver has always done.
    #[default]
    DiscardLeading,
    /// Drop the entry with the lower sequence id.
    ///
    /// A packet whose timestamp was lost is released as soon as a later
    /// timestamp shows up, and a timestamp without packet is discarded once
    /// a later packet is queued. This lets both streams recover from isolated
    /// drops on either side.
    DiscardLagging,
}
