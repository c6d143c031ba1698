//! Completion status classification.
//!
//! A completed descriptor succeeded only when the driver, transport and device
//! status are all zero and the full transfer happened. The check is a plain
//! gate; callers log the raw fields themselves. Sense data is decoded for the
//! log line only and never changes the verdict.

use crate::cdb::Direction;
use crate::sys::SgIoV4;

/// Status fields reported on completion of one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionStatus {
    /// Host driver status.
    pub driver: u32,
    /// Transport (host adapter) status.
    pub transport: u32,
    /// SCSI status byte from the device.
    pub device: u32,
    /// Bytes of the data phase that were not transferred.
    pub residual: i32,
}

impl CompletionStatus {
    /// Extract the status of a completed descriptor.
    ///
    /// The residual comes from the data phase matching `direction`.
    #[must_use]
    pub fn from_wire(hdr: &SgIoV4, direction: Direction) -> Self {
        Self {
            driver: hdr.driver_status,
            transport: hdr.transport_status,
            device: hdr.device_status,
            residual: match direction {
                Direction::Read => hdr.din_resid,
                Direction::Write => hdr.dout_resid,
            },
        }
    }

    /// Check if the request completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        check(self.driver, self.transport, self.device, self.residual)
    }

    /// Check the three status fields only, accepting a short data phase.
    ///
    /// Commands with variable-length responses (INQUIRY) complete with a
    /// residual that is not an error.
    #[must_use]
    pub fn status_ok(&self) -> bool {
        check(self.driver, self.transport, self.device, 0)
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "driver {:#x} transport {:#x} device {:#x} resid {}",
            self.driver, self.transport, self.device, self.residual
        )
    }
}

/// Success gate over the four completion status fields.
#[must_use]
pub fn check(driver: u32, transport: u32, device: u32, residual: i32) -> bool {
    driver == 0 && transport == 0 && device == 0 && residual == 0
}

/// Sense key, additional sense code and qualifier from a sense buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenseData {
    /// Response code (0x70/0x71 fixed format, 0x72/0x73 descriptor format).
    pub response_code: u8,
    /// Sense key (low nibble).
    pub key: u8,
    /// Additional sense code.
    pub asc: u8,
    /// Additional sense code qualifier.
    pub ascq: u8,
}

impl SenseData {
    /// Decode the first `len` valid bytes of a sense buffer.
    ///
    /// Returns `None` when the buffer is empty or uses an unknown format.
    #[must_use]
    pub fn parse(sense: &[u8]) -> Option<Self> {
        let response_code = *sense.first()? & 0x7f;
        match response_code {
            0x70 | 0x71 if sense.len() >= 14 => Some(Self {
                response_code,
                key: sense[2] & 0x0f,
                asc: sense[12],
                ascq: sense[13],
            }),
            0x72 | 0x73 if sense.len() >= 4 => Some(Self {
                response_code,
                key: sense[1] & 0x0f,
                asc: sense[2],
                ascq: sense[3],
            }),
            _ => None,
        }
    }

    /// Human-readable name of the sense key.
    #[must_use]
    pub fn key_name(&self) -> &'static str {
        match self.key {
            0x0 => "NO SENSE",
            0x1 => "RECOVERED ERROR",
            0x2 => "NOT READY",
            0x3 => "MEDIUM ERROR",
            0x4 => "HARDWARE ERROR",
            0x5 => "ILLEGAL REQUEST",
            0x6 => "UNIT ATTENTION",
            0x7 => "DATA PROTECT",
            0x8 => "BLANK CHECK",
            0x9 => "VENDOR SPECIFIC",
            0xa => "COPY ABORTED",
            0xb => "ABORTED COMMAND",
            0xd => "VOLUME OVERFLOW",
            0xe => "MISCOMPARE",
            _ => "RESERVED",
        }
    }
}

impl std::fmt::Display for SenseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} asc {:#04x} ascq {:#04x}", self.key_name(), self.asc, self.ascq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_is_success() {
        assert!(check(0, 0, 0, 0));
        assert!(CompletionStatus::default().is_success());
    }

    #[test]
    fn test_device_status_fails() {
        assert!(!check(0, 0, 2, 0));
    }

    #[test]
    fn test_each_field_fails_on_its_own() {
        assert!(!check(1, 0, 0, 0));
        assert!(!check(0, 1, 0, 0));
        assert!(!check(0, 0, 0, 512));
        assert!(!check(0, 0, 0, -1));
    }

    #[test]
    fn test_residual_follows_direction() {
        let hdr = SgIoV4 { din_resid: 512, dout_resid: 0, ..Default::default() };
        assert!(!CompletionStatus::from_wire(&hdr, Direction::Read).is_success());
        assert!(CompletionStatus::from_wire(&hdr, Direction::Write).is_success());
    }

    #[test]
    fn test_status_ok_tolerates_residual() {
        let short = CompletionStatus { residual: 28, ..Default::default() };
        assert!(short.status_ok());
        assert!(!short.is_success());
        assert!(!CompletionStatus { device: 2, ..Default::default() }.status_ok());
    }

    #[test]
    fn test_status_display_lists_all_fields() {
        let status = CompletionStatus { driver: 0x8, transport: 0, device: 0x2, residual: 0 };
        assert_eq!(status.to_string(), "driver 0x8 transport 0x0 device 0x2 resid 0");
    }

    #[test]
    fn test_parse_fixed_format_sense() {
        let mut sense = [0u8; 18];
        sense[0] = 0xf0; // valid bit set
        sense[2] = 0x05;
        sense[12] = 0x24;
        sense[13] = 0x00;
        let parsed = SenseData::parse(&sense).unwrap();
        assert_eq!(parsed.response_code, 0x70);
        assert_eq!(parsed.key, 0x5);
        assert_eq!(parsed.asc, 0x24);
        assert_eq!(parsed.key_name(), "ILLEGAL REQUEST");
        assert_eq!(parsed.to_string(), "ILLEGAL REQUEST asc 0x24 ascq 0x00");
    }

    #[test]
    fn test_parse_descriptor_format_sense() {
        let sense = [0x72, 0x03, 0x11, 0x04, 0, 0, 0, 0];
        let parsed = SenseData::parse(&sense).unwrap();
        assert_eq!(parsed.key_name(), "MEDIUM ERROR");
        assert_eq!((parsed.asc, parsed.ascq), (0x11, 0x04));
    }

    #[test]
    fn test_parse_rejects_empty_or_unknown() {
        assert!(SenseData::parse(&[]).is_none());
        assert!(SenseData::parse(&[0x00; 18]).is_none());
        assert!(SenseData::parse(&[0x70, 0, 0]).is_none());
    }
}
