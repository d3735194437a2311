use std::time::Instant;

use crate::channel::ChannelId;
use crate::{CommandType, TRANSACTION_TIMEOUT};

/// Bound on concurrently reassembling messages; one per channel at most.
pub(crate) const MAX_PENDING_MESSAGES: usize = 10;

/// One in-flight multi-frame message.
struct Slot {
    channel_id: ChannelId,
    command: CommandType,
    payload: Vec<u8>,
    payload_len: usize,
    next_sequence_number: u8,
    expires_at: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn is_complete(&self) -> bool {
        self.payload.len() >= self.payload_len
    }

    /// Appends continuation data, truncating to the declared length so the
    /// accumulated payload never exceeds it.
    fn append(&mut self, sequence_number: u8, data: &[u8]) -> bool {
        if sequence_number != self.next_sequence_number & 0x7f {
            return false;
        }
        let remaining = self.payload_len - self.payload.len();
        self.payload.extend_from_slice(&data[..remaining.min(data.len())]);
        self.next_sequence_number = self.next_sequence_number.wrapping_add(1);
        true
    }
}

#[derive(Debug)]
pub(crate) enum AppendOutcome {
    Accepted,
    Complete {
        command: CommandType,
        payload: Vec<u8>,
    },
    /// No live slot for the channel: never started, cancelled, or expired.
    NoPendingMessage,
    BadSequence,
}

/// Bounded table of reassembly slots. A slot is free once it is past its
/// expiry, so abandoned transfers cost nothing to reclaim.
pub(crate) struct Reassembly {
    slots: Vec<Slot>,
}

impl Reassembly {
    pub(crate) fn new() -> Reassembly {
        Reassembly {
            slots: Vec::with_capacity(MAX_PENDING_MESSAGES),
        }
    }

    /// Drops any open message on `channel_id`; a fresh initialization
    /// frame wins over a half-received message.
    pub(crate) fn cancel(&mut self, channel_id: ChannelId) {
        self.slots.retain(|slot| slot.channel_id != channel_id);
    }

    /// Opens a slot for a message whose payload exceeds the first frame.
    /// Returns false when every slot is taken by a live transfer.
    pub(crate) fn start(
        &mut self,
        channel_id: ChannelId,
        command: CommandType,
        payload_len: usize,
        first_frame_data: &[u8],
        now: Instant,
    ) -> bool {
        self.slots.retain(|slot| !slot.is_expired(now));
        if self.slots.len() >= MAX_PENDING_MESSAGES {
            return false;
        }
        let mut payload = Vec::with_capacity(payload_len);
        payload.extend_from_slice(&first_frame_data[..payload_len.min(first_frame_data.len())]);
        self.slots.push(Slot {
            channel_id,
            command,
            payload,
            payload_len,
            next_sequence_number: 0,
            expires_at: now + TRANSACTION_TIMEOUT,
        });
        true
    }

    pub(crate) fn append(
        &mut self,
        channel_id: ChannelId,
        sequence_number: u8,
        data: &[u8],
        now: Instant,
    ) -> AppendOutcome {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.channel_id == channel_id && !slot.is_expired(now));
        let Some(index) = index else {
            return AppendOutcome::NoPendingMessage;
        };
        if !self.slots[index].append(sequence_number, data) {
            self.slots.remove(index);
            return AppendOutcome::BadSequence;
        }
        if self.slots[index].is_complete() {
            let slot = self.slots.remove(index);
            return AppendOutcome::Complete {
                command: slot.command,
                payload: slot.payload,
            };
        }
        AppendOutcome::Accepted
    }
}
