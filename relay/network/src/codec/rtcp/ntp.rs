//! 64-bit NTP timestamps as carried in Sender Reports.

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
pub const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

/// NTP timestamp: whole seconds since 1900 plus a 32-bit binary fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct NtpTime {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTime {
    pub fn new(seconds: u32, fraction: u32) -> Self {
        NtpTime { seconds, fraction }
    }

    /// Converts wall-clock milliseconds since the Unix epoch.
    pub fn from_unix_ms(unix_ms: u64) -> Self {
        let seconds = unix_ms / 1000 + NTP_UNIX_OFFSET_SECS;
        let fraction = ((unix_ms % 1000) << 32) / 1000;
        NtpTime {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }

    /// Milliseconds since the Unix epoch (saturating at zero for pre-1970 values).
    pub fn to_unix_ms(self) -> u64 {
        let seconds = (self.seconds as u64).saturating_sub(NTP_UNIX_OFFSET_SECS);
        seconds * 1000 + ((self.fraction as u64 * 1000) >> 32)
    }

    /// Middle 32 bits, the form echoed back in report blocks as `lsr`.
    pub fn compact(self) -> u32 {
        (self.seconds << 16) | (self.fraction >> 16)
    }

    pub fn from_u64(value: u64) -> Self {
        NtpTime {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    pub fn as_u64(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }
}

/// Converts a compact-NTP delay (1/65536 s units) to milliseconds.
pub fn compact_to_ms(compact: u32) -> u64 {
    ((compact >> 16) as u64) * 1000 + ((compact & 0xFFFF) as u64 * 1000) / 65536
}

/// Converts milliseconds to compact-NTP units.
pub fn ms_to_compact(ms: u64) -> u32 {
    ((ms * 65536) / 1000) as u32
}
