use crate::time::Time;

/// Marker in the upper half of the first word of every timestamp record
pub const START_OF_TS: u16 = 0x5354;

/// Size of a timestamp record in FIFO words
///
/// | word | bits 31..16 | bits 15..0   |
/// |------|-------------|--------------|
/// | 0    | marker      | seconds high |
/// | 1    | sequence id | reserved     |
/// | 2    | seconds low              | |
/// | 3    | nanoseconds              | |
pub const RECORD_WORDS: usize = 4;

/// A timestamp as captured by the FPGA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimestampRecord {
    pub start_of_ts: u16,
    /// PTP sequence id of the packet that triggered the capture
    pub sequence_id: u16,
    /// Upper 16 bits of the 48 bit seconds counter
    pub seconds_hi: u16,
    /// Lower 32 bits of the 48 bit seconds counter
    pub seconds: u32,
    pub nanoseconds: u32,
}

impl TimestampRecord {
    /// Build a valid record. Only the lower 48 bits of `seconds` are kept.
    pub const fn new(sequence_id: u16, seconds: u64, nanoseconds: u32) -> Self {
        TimestampRecord {
            start_of_ts: START_OF_TS,
            sequence_id,
            seconds_hi: (seconds >> 32) as u16,
            seconds: seconds as u32,
            nanoseconds,
        }
    }

    /// Whether `word` can be the first word of a record
    pub const fn is_start_word(word: u32) -> bool {
        (word >> 16) as u16 == START_OF_TS
    }

    /// Assemble a record from its first word and the words that follow it
    pub fn from_parts(start: u32, rest: [u32; RECORD_WORDS - 1]) -> Self {
        TimestampRecord {
            start_of_ts: (start >> 16) as u16,
            seconds_hi: start as u16,
            sequence_id: (rest[0] >> 16) as u16,
            seconds: rest[1],
            nanoseconds: rest[2],
        }
    }

    pub fn from_words(words: [u32; RECORD_WORDS]) -> Self {
        Self::from_parts(words[0], [words[1], words[2], words[3]])
    }

    pub fn to_words(&self) -> [u32; RECORD_WORDS] {
        [
            (self.start_of_ts as u32) << 16 | self.seconds_hi as u32,
            (self.sequence_id as u32) << 16,
            self.seconds,
            self.nanoseconds,
        ]
    }

    /// Whether the record starts with [`START_OF_TS`]
    pub fn has_start_of_ts(&self) -> bool {
        self.start_of_ts == START_OF_TS
    }

    /// The full 48 bit seconds value
    pub fn seconds(&self) -> u64 {
        (self.seconds_hi as u64) << 32 | self.seconds as u64
    }

    /// `seconds * 1_000_000_000 + nanoseconds`
    pub fn time(&self) -> Time {
        Time::from_parts(self.seconds(), self.nanoseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_layout() {
        let record = TimestampRecord::new(0x1234, 0xabcd_0102_0304, 999);

        assert_eq!(
            record.to_words(),
            [0x5354_abcd, 0x1234_0000, 0x0102_0304, 999]
        );
        assert!(TimestampRecord::is_start_word(record.to_words()[0]));
        assert!(!TimestampRecord::is_start_word(record.to_words()[1]));
    }

    #[test]
    fn decode_hardware_words() {
        let record = TimestampRecord::from_words([0x5354_0001, 0x0005_ffff, 0x0000_0002, 7]);

        assert!(record.has_start_of_ts());
        assert_eq!(record.sequence_id, 5);
        assert_eq!(record.seconds(), 0x1_0000_0002);
        assert_eq!(
            record.time().nanos(),
            0x1_0000_0002u128 * 1_000_000_000 + 7
        );
    }

    #[test]
    fn missing_marker_is_reported() {
        let record = TimestampRecord::from_words([0x1234_0000, 0, 0, 0]);
        assert!(!record.has_start_of_ts());
    }

    #[test]
    fn seconds_are_truncated_to_48_bits() {
        let record = TimestampRecord::new(0, u64::MAX, 0);
        assert_eq!(record.seconds(), (1 << 48) - 1);
    }
}
