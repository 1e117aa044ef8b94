//! CMSIS-DAP command identifiers and response status codes.

/// Command identifiers, as carried in the first byte of every request and
/// response record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum DapCommand {
    Info = 0x00,
    HostStatus = 0x01,
    Connect = 0x02,
    Disconnect = 0x03,
    TransferConfigure = 0x04,
    Transfer = 0x05,
    TransferBlock = 0x06,
    TransferAbort = 0x07,
    WriteAbort = 0x08,
    Delay = 0x09,
    ResetTarget = 0x0A,
    SwjPins = 0x10,
    SwjClock = 0x11,
    SwjSequence = 0x12,
    SwdConfigure = 0x13,
    JtagSequence = 0x14,
    JtagConfigure = 0x15,
    JtagIdcode = 0x16,
    SwoTransport = 0x17,
    SwoMode = 0x18,
    SwoBaudrate = 0x19,
    SwoControl = 0x1A,
    SwoStatus = 0x1B,
    SwoData = 0x1C,
    SwdSequence = 0x1D,
    SwoExtendedStatus = 0x1E,
    QueueCommands = 0x7E,
    ExecuteCommands = 0x7F,
}

impl DapCommand {
    /// Decode a command byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        let command = match value {
            0x00 => Self::Info,
            0x01 => Self::HostStatus,
            0x02 => Self::Connect,
            0x03 => Self::Disconnect,
            0x04 => Self::TransferConfigure,
            0x05 => Self::Transfer,
            0x06 => Self::TransferBlock,
            0x07 => Self::TransferAbort,
            0x08 => Self::WriteAbort,
            0x09 => Self::Delay,
            0x0A => Self::ResetTarget,
            0x10 => Self::SwjPins,
            0x11 => Self::SwjClock,
            0x12 => Self::SwjSequence,
            0x13 => Self::SwdConfigure,
            0x14 => Self::JtagSequence,
            0x15 => Self::JtagConfigure,
            0x16 => Self::JtagIdcode,
            0x17 => Self::SwoTransport,
            0x18 => Self::SwoMode,
            0x19 => Self::SwoBaudrate,
            0x1A => Self::SwoControl,
            0x1B => Self::SwoStatus,
            0x1C => Self::SwoData,
            0x1D => Self::SwdSequence,
            0x1E => Self::SwoExtendedStatus,
            0x7E => Self::QueueCommands,
            0x7F => Self::ExecuteCommands,
            _ => return None,
        };
        Some(command)
    }

    /// Command byte as sent on the wire.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Acknowledge values reported by transfer commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DapStatus {
    /// Target acknowledged the transfer
    Ok = 1,
    /// Target asked the host to retry
    Wait = 2,
    /// Target reported a fault
    Fault = 4,
    /// No acknowledge from the target
    NoAck = 7,
}

impl DapStatus {
    /// Decode the three acknowledge bits of a status byte.
    pub fn from_ack(status: u8) -> Option<Self> {
        match status & 0x07 {
            1 => Some(Self::Ok),
            2 => Some(Self::Wait),
            4 => Some(Self::Fault),
            7 => Some(Self::NoAck),
            _ => None,
        }
    }

    /// Value written to the consumer page's status word.
    pub fn to_u32(self) -> u32 {
        u32::from(self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_round_trip() {
        for byte in 0..=u8::MAX {
            if let Some(command) = DapCommand::from_u8(byte) {
                assert_eq!(command.to_u8(), byte);
            }
        }
        assert_eq!(DapCommand::from_u8(0x7F), Some(DapCommand::ExecuteCommands));
        assert_eq!(DapCommand::from_u8(0x20), None);
    }

    #[test]
    fn ack_bits_ignore_error_flags() {
        assert_eq!(DapStatus::from_ack(0x01), Some(DapStatus::Ok));
        assert_eq!(DapStatus::from_ack(0x0C), Some(DapStatus::Fault));
        assert_eq!(DapStatus::from_ack(0x00), None);
        assert_eq!(DapStatus::NoAck.to_u32(), 7);
    }
}
