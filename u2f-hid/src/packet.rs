use std::cmp;
use std::collections::VecDeque;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::CommandType;

pub(crate) const HID_REPORT_LEN: usize = 64;
pub(crate) const INITIAL_PACKET_DATA_LEN: usize = HID_REPORT_LEN - 7;
pub(crate) const CONTINUATION_PACKET_DATA_LEN: usize = HID_REPORT_LEN - 5;

const FRAME_TYPE_INIT: u8 = 0b1000_0000;
const FRAME_TYPE_MASK: u8 = 0b1000_0000;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug)]
pub enum Packet {
    /// First frame of a message; starts a new transaction on its channel.
    ///
    /// Offset  Length  Mnemonic  Description
    /// ------------------------------------------------------------------
    /// 0       4       CID       Channel identifier
    /// 4       1       CMD       Command identifier (bit 7 always set)
    /// 5       1       BCNTH     High part of payload length
    /// 6       1       BCNTL     Low part of payload length
    /// 7       57      DATA      Payload data
    Initialization {
        channel_id: ChannelId,
        command: CommandType,
        data: Vec<u8>,
        payload_len: u16,
    },
    /// Carries the rest of a message that did not fit the first frame, in
    /// strictly ascending sequence order.
    ///
    /// Offset  Length  Mnemonic  Description
    /// ------------------------------------------------------------------
    /// 0       4       CID       Channel identifier
    /// 4       1       SEQ       Packet sequence 0x00..0x7f (bit 7 cleared)
    /// 5       59      DATA      Payload data
    Continuation {
        channel_id: ChannelId,
        sequence_number: u8,
        data: Vec<u8>,
    },
}

impl Packet {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Packet::Initialization { channel_id, .. } => *channel_id,
            Packet::Continuation { channel_id, .. } => *channel_id,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Packet {
        assert_eq!(bytes.len(), HID_REPORT_LEN);
        let mut reader = Cursor::new(bytes);

        let channel_id = ChannelId::read(&mut reader).unwrap();
        let first_byte = reader.read_u8().unwrap();
        if first_byte & FRAME_TYPE_MASK == FRAME_TYPE_INIT {
            let command = CommandType::from_byte(first_byte);
            let payload_len = reader.read_u16::<BigEndian>().unwrap();
            let mut data = vec![0u8; INITIAL_PACKET_DATA_LEN];
            reader.read_exact(&mut data[..]).unwrap();
            Packet::Initialization {
                channel_id,
                command,
                data,
                payload_len,
            }
        } else {
            let sequence_number = first_byte;
            let mut data = vec![0u8; CONTINUATION_PACKET_DATA_LEN];
            reader.read_exact(&mut data[..]).unwrap();
            Packet::Continuation {
                channel_id,
                sequence_number,
                data,
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HID_REPORT_LEN);
        match self {
            Packet::Initialization {
                channel_id,
                command,
                data,
                payload_len,
            } => {
                assert!(data.len() <= INITIAL_PACKET_DATA_LEN);
                channel_id.write(&mut bytes).unwrap();
                bytes.push(command.to_byte() | FRAME_TYPE_INIT);
                bytes.write_u16::<BigEndian>(*payload_len).unwrap();
                bytes.extend_from_slice(data);
            }
            Packet::Continuation {
                channel_id,
                sequence_number,
                data,
            } => {
                assert!(data.len() <= CONTINUATION_PACKET_DATA_LEN);
                assert_eq!(sequence_number & FRAME_TYPE_MASK, 0);
                channel_id.write(&mut bytes).unwrap();
                bytes.push(*sequence_number);
                bytes.extend_from_slice(data);
            }
        }

        // Zero-pad to the fixed report length
        bytes.resize(HID_REPORT_LEN, 0u8);
        bytes
    }

    /// Fragments a complete message: an initialization frame with the
    /// total length, then continuation frames with ascending sequence
    /// numbers.
    pub(crate) fn encode_message(
        channel_id: ChannelId,
        command: CommandType,
        data: &[u8],
    ) -> VecDeque<Packet> {
        let mut packets = VecDeque::new();
        let payload_len = data.len() as u16;
        let split_index = cmp::min(data.len(), INITIAL_PACKET_DATA_LEN);
        let (initial, remaining) = data.split_at(split_index);
        packets.push_back(Packet::Initialization {
            channel_id,
            command,
            payload_len,
            data: initial.to_vec(),
        });
        for (i, chunk) in remaining.chunks(CONTINUATION_PACKET_DATA_LEN).enumerate() {
            packets.push_back(Packet::Continuation {
                channel_id,
                sequence_number: (i as u8) & 0x7f,
                data: chunk.to_vec(),
            });
        }
        packets
    }
}
