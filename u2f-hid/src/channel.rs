use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

/// All channels listen on the broadcast id; INIT requests arrive here.
pub const BROADCAST_CHANNEL_ID: ChannelId = ChannelId(0xffff_ffff);

const MAX_CHANNEL_ID: ChannelId = ChannelId(BROADCAST_CHANNEL_ID.0 - 1);
const MIN_CHANNEL_ID: ChannelId = ChannelId(1);

/// 32-bit identifier multiplexing logical streams over one HID interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Serialize, Deserialize, Hash)]
pub struct ChannelId(pub u32);

impl ChannelId {
    pub fn read<R: ReadBytesExt>(read: &mut R) -> io::Result<ChannelId> {
        Ok(ChannelId(read.read_u32::<BigEndian>()?))
    }

    pub fn write<W: WriteBytesExt>(&self, write: &mut W) -> io::Result<()> {
        write.write_u32::<BigEndian>(self.0)
    }
}

/// Mints channel ids monotonically. Zero and the broadcast id are never
/// handed out; channels live until the device resets.
#[derive(Debug)]
pub struct Channels {
    next_allocation: ChannelId,
}

impl Channels {
    pub fn new() -> Channels {
        Channels {
            next_allocation: MIN_CHANNEL_ID,
        }
    }

    pub fn allocate(&mut self) -> Result<ChannelId, ()> {
        if self.next_allocation > MAX_CHANNEL_ID {
            return Err(());
        }
        let allocation = self.next_allocation;
        self.next_allocation = ChannelId(allocation.0 + 1);
        Ok(allocation)
    }

    /// A channel is addressable if it is the broadcast channel or has been
    /// allocated at some point.
    pub fn is_valid(&self, channel_id: ChannelId) -> bool {
        channel_id == BROADCAST_CHANNEL_ID
            || (channel_id >= MIN_CHANNEL_ID && channel_id < self.next_allocation)
    }
}

impl Default for Channels {
    fn default() -> Channels {
        Channels::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_write_is_big_endian() {
        let mut buf = Vec::new();
        ChannelId(0x01020304).write(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4]);
    }

    #[test]
    fn broadcast_channel_is_valid() {
        let channels = Channels::new();
        assert!(channels.is_valid(BROADCAST_CHANNEL_ID));
    }

    #[test]
    fn allocated_channel_is_valid_and_nonzero() {
        let mut channels = Channels::new();
        let channel_id = channels.allocate().unwrap();
        assert!(channels.is_valid(channel_id));
        assert_ne!(channel_id.0, 0);
        assert_ne!(channel_id, BROADCAST_CHANNEL_ID);
    }

    #[test]
    fn unallocated_channel_is_invalid() {
        let mut channels = Channels::new();
        channels.allocate().unwrap();
        assert!(!channels.is_valid(ChannelId(2)));
        assert!(!channels.is_valid(ChannelId(0)));
    }

    #[test]
    fn allocations_are_sequential() {
        let mut channels = Channels::new();
        let first = channels.allocate().unwrap();
        let second = channels.allocate().unwrap();
        assert_eq!(second.0, first.0 + 1);
    }
}
