//! U2FHID transport for a virtual U2F device.
//!
//! Speaks fixed 64-byte frames over HID reports: channel multiplexing,
//! multi-frame message reassembly, response fragmentation, channel locking
//! and error framing. Complete messages are handed to the
//! [`u2f_core`] APDU dispatcher; everything here is a single-threaded
//! state machine driven by report arrivals.

mod channel;
mod packet;
mod protocol;
mod reassembly;
mod server;

pub use channel::{ChannelId, Channels, BROADCAST_CHANNEL_ID};
pub use packet::Packet;
pub use protocol::U2fHid;
pub use server::{run, HidDriver, OutputReport};

use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub const U2FHID_PROTOCOL_VERSION: u8 = 2;

pub const DEVICE_VERSION_MAJOR: u8 = 1;
pub const DEVICE_VERSION_MINOR: u8 = 0;
pub const DEVICE_VERSION_BUILD: u8 = 0;

/// HID Report Descriptor for this device: FIDO alliance usage page, one
/// 64-byte input and one 64-byte output report of unsigned bytes. Existing
/// U2F host stacks match on these exact bytes.
pub const REPORT_DESCRIPTOR: [u8; 34] = [
    0x06, 0xd0, 0xf1, /* Usage Page: FIDO Alliance Page (0xF1D0)     */
    0x09, 0x01, /*       Usage: U2F Authenticator Device (0x01)      */
    0xa1, 0x01, /*       Collection: Application                     */
    0x09, 0x20, /*       - Usage: Data In (0x20)                     */
    0x15, 0x00, /*       - Logical Minimum (0)                       */
    0x26, 0xff, 0x00, /* - Logical Maximum (255)                     */
    0x75, 0x08, /*       - Report Size (8)                           */
    0x95, 0x40, /*       - Report Count (64)                         */
    0x81, 0x02, /*       - Input (Data, Absolute, Variable)          */
    0x09, 0x21, /*       - Usage: Data Out (0x21)                    */
    0x15, 0x00, /*       - Logical Minimum (0)                       */
    0x26, 0xff, 0x00, /* - Logical Maximum (255)                     */
    0x75, 0x08, /*       - Report Size (8)                           */
    0x95, 0x40, /*       - Report Count (64)                         */
    0x91, 0x02, /*       - Output (Data, Absolute, Variable)         */
    0xc0, /*             End Collection                              */
];

/// HID report classes of the underlying transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportType {
    Input,
    Output,
    Feature,
}

const COMMAND_TYPE_MASK: u8 = 0b0111_1111;

// Command identifiers
const U2FHID_PING: u8 = 0x01; // Echo data through local processor only
const U2FHID_MSG: u8 = 0x03; // Send U2F message frame
const U2FHID_LOCK: u8 = 0x04; // Send lock channel command
const U2FHID_INIT: u8 = 0x06; // Channel initialization
const U2FHID_WINK: u8 = 0x08; // Send device identification wink
const U2FHID_ERROR: u8 = 0x3f; // Error response

const COMMAND_INIT_DATA_LEN: usize = 8;

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub enum CommandType {
    Ping,
    Msg,
    Lock,
    Init,
    Wink,
    Error,
    Unknown { identifier: u8 },
}

impl CommandType {
    pub fn from_byte(byte: u8) -> CommandType {
        match byte & COMMAND_TYPE_MASK {
            U2FHID_PING => CommandType::Ping,
            U2FHID_MSG => CommandType::Msg,
            U2FHID_LOCK => CommandType::Lock,
            U2FHID_INIT => CommandType::Init,
            U2FHID_WINK => CommandType::Wink,
            U2FHID_ERROR => CommandType::Error,
            identifier => CommandType::Unknown { identifier },
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            CommandType::Ping => U2FHID_PING,
            CommandType::Msg => U2FHID_MSG,
            CommandType::Lock => U2FHID_LOCK,
            CommandType::Init => U2FHID_INIT,
            CommandType::Wink => U2FHID_WINK,
            CommandType::Error => U2FHID_ERROR,
            CommandType::Unknown { identifier } => identifier,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CapabilityFlags: u8 {
        const WINK = 0b0000_0001; // Device supports the WINK command
        const LOCK = 0b0000_0010; // Device supports the LOCK command
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCommand = 0x01,
    InvalidParameter = 0x02,
    InvalidMessageLength = 0x03,
    InvalidMessageSequencing = 0x04,
    MessageTimedOut = 0x05,
    ChannelBusy = 0x06,
    CommandRequiresChannelLock = 0x0a,
    InvalidChannel = 0x0b,
    Other = 0x7f,
}

impl ErrorCode {
    pub(crate) fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A partially reassembled message expires this long after its first frame.
pub const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest lock a channel may request, in seconds.
pub const MAX_LOCK_SECONDS: u8 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    // In REPORT_DESCRIPTOR, input and output reports carry 64 bytes of
    // data each; this must match the frame codec's report length.
    #[test]
    fn report_descriptor_report_lengths() {
        assert_eq!(REPORT_DESCRIPTOR[15], 8);
        assert_eq!(usize::from(REPORT_DESCRIPTOR[17]), packet::HID_REPORT_LEN);
        assert_eq!(REPORT_DESCRIPTOR[28], 8);
        assert_eq!(usize::from(REPORT_DESCRIPTOR[30]), packet::HID_REPORT_LEN);
    }

    #[test]
    fn command_bytes_round_trip() {
        for command in [
            CommandType::Ping,
            CommandType::Msg,
            CommandType::Lock,
            CommandType::Init,
            CommandType::Wink,
            CommandType::Error,
        ] {
            assert_eq!(CommandType::from_byte(command.to_byte() | 0x80), command);
        }
        assert_eq!(
            CommandType::from_byte(0xbb),
            CommandType::Unknown { identifier: 0x3b }
        );
    }
}
