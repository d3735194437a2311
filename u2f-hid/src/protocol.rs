use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use u2f_core::{CredentialBackend, U2f};

use crate::channel::{ChannelId, Channels, BROADCAST_CHANNEL_ID};
use crate::packet::{Packet, HID_REPORT_LEN};
use crate::reassembly::{AppendOutcome, Reassembly};
use crate::{
    CapabilityFlags, CommandType, ErrorCode, ReportType, COMMAND_INIT_DATA_LEN,
    DEVICE_VERSION_BUILD, DEVICE_VERSION_MAJOR, DEVICE_VERSION_MINOR, MAX_LOCK_SECONDS,
    REPORT_DESCRIPTOR, U2FHID_PROTOCOL_VERSION,
};

/// An active lock window. Channels other than the holder observe it until
/// it elapses; there is no explicit release besides a zero-second lock.
struct ChannelLock {
    channel_id: ChannelId,
    until: Instant,
}

/// The U2FHID device: converts output reports into complete messages,
/// dispatches them, and queues the framed responses.
///
/// Strictly single-threaded and cooperative: a report is processed to
/// completion, possibly queuing several response frames, before the next
/// one is accepted. Every request frame of valid form produces at least
/// one response frame.
pub struct U2fHid<B> {
    service: U2f<B>,
    channels: Channels,
    lock: Option<ChannelLock>,
    reassembly: Reassembly,
    output: VecDeque<Packet>,
}

impl<B: CredentialBackend> U2fHid<B> {
    pub fn new(backend: B) -> U2fHid<B> {
        U2fHid {
            service: U2f::new(backend),
            channels: Channels::new(),
            lock: None,
            reassembly: Reassembly::new(),
            output: VecDeque::new(),
        }
    }

    /// The fixed report descriptor this device presents.
    pub fn descriptor(&self) -> &'static [u8] {
        &REPORT_DESCRIPTOR
    }

    /// Reports are unnumbered.
    pub fn is_numbered_report(&self) -> bool {
        false
    }

    /// Input and output reports are both this many bytes.
    pub fn report_size(&self) -> usize {
        HID_REPORT_LEN
    }

    /// Feeds one output report from the host. Returns whether the report
    /// was consumed as a U2FHID frame.
    pub fn receive_output_report(
        &mut self,
        report_type: ReportType,
        report_num: u8,
        data: &[u8],
    ) -> bool {
        self.receive_output_report_at(report_type, report_num, data, Instant::now())
    }

    fn receive_output_report_at(
        &mut self,
        report_type: ReportType,
        report_num: u8,
        data: &[u8],
        now: Instant,
    ) -> bool {
        if report_type != ReportType::Output || report_num != 0 {
            return false;
        }
        // Reports are declared unnumbered, but some host drivers insert
        // the report-id byte anyway; tolerate exactly one leading byte.
        let frame = match data.len() {
            HID_REPORT_LEN => data,
            len if len == HID_REPORT_LEN + 1 => &data[1..],
            len => {
                debug!(len, "report has unexpected size");
                return false;
            }
        };
        self.handle_frame(Packet::from_bytes(frame), now);
        true
    }

    /// Next queued response report, 64 bytes, zero-padded.
    pub fn next_report(&mut self) -> Option<Vec<u8>> {
        self.output.pop_front().map(|packet| packet.to_bytes())
    }

    fn handle_frame(&mut self, packet: Packet, now: Instant) {
        let channel_id = packet.channel_id();
        if !self.channels.is_valid(channel_id) {
            debug!(?channel_id, "frame on unallocated channel");
            self.send_error(channel_id, ErrorCode::InvalidChannel);
            return;
        }

        match packet {
            Packet::Initialization {
                channel_id,
                command,
                data,
                payload_len,
            } => {
                // A new message wins over a half-received one.
                self.reassembly.cancel(channel_id);

                let payload_len = usize::from(payload_len);
                if payload_len <= data.len() {
                    self.handle_request(channel_id, command, &data[..payload_len], now);
                } else if !self
                    .reassembly
                    .start(channel_id, command, payload_len, &data, now)
                {
                    debug!(?channel_id, "no free reassembly slot");
                    self.send_error(channel_id, ErrorCode::ChannelBusy);
                }
            }
            Packet::Continuation {
                channel_id,
                sequence_number,
                data,
            } => match self.reassembly.append(channel_id, sequence_number, &data, now) {
                AppendOutcome::Accepted => {}
                AppendOutcome::Complete { command, payload } => {
                    self.handle_request(channel_id, command, &payload, now)
                }
                AppendOutcome::NoPendingMessage => {
                    debug!(?channel_id, "continuation without a pending message");
                    self.send_error(channel_id, ErrorCode::InvalidMessageSequencing);
                }
                AppendOutcome::BadSequence => {
                    debug!(?channel_id, sequence_number, "invalid message sequencing");
                    self.send_error(channel_id, ErrorCode::InvalidMessageSequencing);
                }
            },
        }
    }

    fn handle_request(
        &mut self,
        channel_id: ChannelId,
        command: CommandType,
        payload: &[u8],
        now: Instant,
    ) {
        trace!(?channel_id, ?command, len = payload.len(), "handle request");

        // A lock held elsewhere excludes everything except INIT and PING:
        // channel re-acquisition and liveness probes must not be starvable.
        if self.locked_against(channel_id, now)
            && !matches!(command, CommandType::Init | CommandType::Ping)
        {
            debug!(?channel_id, "refused while another channel holds the lock");
            self.send_error(channel_id, ErrorCode::CommandRequiresChannelLock);
            return;
        }

        match command {
            CommandType::Init => self.handle_init(channel_id, payload),
            CommandType::Ping => self.send(channel_id, CommandType::Ping, payload),
            CommandType::Msg => self.handle_msg(channel_id, payload),
            CommandType::Wink => self.handle_wink(channel_id, payload),
            CommandType::Lock => self.handle_lock(channel_id, payload, now),
            CommandType::Error | CommandType::Unknown { .. } => {
                debug!(?command, "unknown command");
                self.send_error(channel_id, ErrorCode::InvalidCommand);
            }
        }
    }

    fn handle_init(&mut self, channel_id: ChannelId, payload: &[u8]) {
        if channel_id != BROADCAST_CHANNEL_ID {
            debug!(?channel_id, "INIT must use the broadcast channel");
            self.send_error(channel_id, ErrorCode::InvalidCommand);
            return;
        }
        if payload.len() != COMMAND_INIT_DATA_LEN {
            self.send_error(channel_id, ErrorCode::InvalidMessageLength);
            return;
        }
        let new_channel_id = match self.channels.allocate() {
            Ok(id) => id,
            Err(()) => {
                warn!("channel ids exhausted");
                self.send_error(channel_id, ErrorCode::Other);
                return;
            }
        };

        let mut capabilities = CapabilityFlags::LOCK;
        if self.service.supports_wink() {
            capabilities |= CapabilityFlags::WINK;
        }

        let mut response = Vec::with_capacity(17);
        response.extend_from_slice(payload); // nonce, echoed
        new_channel_id.write(&mut response).unwrap();
        response.push(U2FHID_PROTOCOL_VERSION);
        response.push(DEVICE_VERSION_MAJOR);
        response.push(DEVICE_VERSION_MINOR);
        response.push(DEVICE_VERSION_BUILD);
        response.push(capabilities.bits());

        debug!(?new_channel_id, "channel initialized");
        self.send(BROADCAST_CHANNEL_ID, CommandType::Init, &response);
    }

    fn handle_msg(&mut self, channel_id: ChannelId, payload: &[u8]) {
        if channel_id == BROADCAST_CHANNEL_ID {
            self.send_error(channel_id, ErrorCode::InvalidCommand);
            return;
        }
        match self.service.process_apdu(payload) {
            Ok(response) => self.send(channel_id, CommandType::Msg, &response),
            Err(err) => {
                debug!(%err, "rejecting MSG");
                self.send_error(channel_id, ErrorCode::InvalidParameter);
            }
        }
    }

    fn handle_wink(&mut self, channel_id: ChannelId, payload: &[u8]) {
        if channel_id == BROADCAST_CHANNEL_ID {
            self.send_error(channel_id, ErrorCode::InvalidCommand);
            return;
        }
        if !payload.is_empty() {
            self.send_error(channel_id, ErrorCode::InvalidMessageLength);
            return;
        }
        if !self.service.supports_wink() {
            self.send_error(channel_id, ErrorCode::InvalidCommand);
            return;
        }
        self.service.wink();
        self.send(channel_id, CommandType::Wink, &[]);
    }

    fn handle_lock(&mut self, channel_id: ChannelId, payload: &[u8], now: Instant) {
        if payload.len() != 1 {
            self.send_error(channel_id, ErrorCode::InvalidMessageLength);
            return;
        }
        let seconds = payload[0];
        if seconds > MAX_LOCK_SECONDS {
            debug!(seconds, "lock timeout out of range");
            self.send_error(channel_id, ErrorCode::InvalidParameter);
            return;
        }
        // Zero seconds makes a lock that is already past, i.e. a release.
        self.lock = Some(ChannelLock {
            channel_id,
            until: now + Duration::from_secs(u64::from(seconds)),
        });
        debug!(?channel_id, seconds, "lock");
        self.send(channel_id, CommandType::Lock, &[]);
    }

    fn locked_against(&self, channel_id: ChannelId, now: Instant) -> bool {
        match &self.lock {
            Some(lock) => lock.channel_id != channel_id && now < lock.until,
            None => false,
        }
    }

    fn send(&mut self, channel_id: ChannelId, command: CommandType, payload: &[u8]) {
        self.output
            .extend(Packet::encode_message(channel_id, command, payload));
    }

    fn send_error(&mut self, channel_id: ChannelId, code: ErrorCode) {
        self.output.extend(Packet::encode_message(
            channel_id,
            CommandType::Error,
            &[code.to_byte()],
        ));
    }
}

#[cfg(test)]
mod tests {
    use u2f_core::backend::UnsafeBackend;

    use super::*;
    use crate::TRANSACTION_TIMEOUT;

    const NONCE: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

    fn device() -> U2fHid<UnsafeBackend> {
        U2fHid::new(UnsafeBackend::new().unwrap())
    }

    /// Feeds a complete message through the public report interface.
    fn send_message(
        device: &mut U2fHid<UnsafeBackend>,
        channel_id: ChannelId,
        command: CommandType,
        payload: &[u8],
    ) {
        send_message_at(device, channel_id, command, payload, Instant::now());
    }

    fn send_message_at(
        device: &mut U2fHid<UnsafeBackend>,
        channel_id: ChannelId,
        command: CommandType,
        payload: &[u8],
        now: Instant,
    ) {
        for packet in Packet::encode_message(channel_id, command, payload) {
            assert!(device.receive_output_report_at(
                ReportType::Output,
                0,
                &packet.to_bytes(),
                now
            ));
        }
    }

    /// Drains and reassembles the next queued response message.
    fn next_response(device: &mut U2fHid<UnsafeBackend>) -> (ChannelId, CommandType, Vec<u8>) {
        let first = Packet::from_bytes(&device.next_report().expect("no response frame"));
        let (channel_id, command, mut payload, payload_len) = match first {
            Packet::Initialization {
                channel_id,
                command,
                data,
                payload_len,
            } => (channel_id, command, data, usize::from(payload_len)),
            Packet::Continuation { .. } => panic!("response began with a continuation frame"),
        };

        let mut expected_sequence_number = 0;
        while payload.len() < payload_len {
            match Packet::from_bytes(&device.next_report().expect("response is incomplete")) {
                Packet::Continuation {
                    channel_id: continuation_channel,
                    sequence_number,
                    mut data,
                } => {
                    assert_eq!(continuation_channel, channel_id);
                    assert_eq!(sequence_number, expected_sequence_number);
                    expected_sequence_number += 1;
                    payload.append(&mut data);
                }
                Packet::Initialization { .. } => panic!("unexpected initialization frame"),
            }
        }
        payload.truncate(payload_len);
        (channel_id, command, payload)
    }

    fn init_channel(device: &mut U2fHid<UnsafeBackend>) -> ChannelId {
        send_message(device, BROADCAST_CHANNEL_ID, CommandType::Init, &NONCE);
        let (channel_id, command, payload) = next_response(device);
        assert_eq!(channel_id, BROADCAST_CHANNEL_ID);
        assert_eq!(command, CommandType::Init);
        let mut cid = [0u8; 4];
        cid.copy_from_slice(&payload[8..12]);
        ChannelId(u32::from_be_bytes(cid))
    }

    fn expect_error(device: &mut U2fHid<UnsafeBackend>, channel_id: ChannelId, code: ErrorCode) {
        let (response_channel, command, payload) = next_response(device);
        assert_eq!(response_channel, channel_id);
        assert_eq!(command, CommandType::Error);
        assert_eq!(payload, vec![code.to_byte()]);
    }

    #[test]
    fn init_mints_a_channel() {
        let mut device = device();
        send_message(&mut device, BROADCAST_CHANNEL_ID, CommandType::Init, &NONCE);

        let (channel_id, command, payload) = next_response(&mut device);
        assert_eq!(channel_id, BROADCAST_CHANNEL_ID);
        assert_eq!(command, CommandType::Init);
        assert_eq!(payload.len(), 17);
        assert_eq!(&payload[..8], &NONCE);

        let new_cid = u32::from_be_bytes(payload[8..12].try_into().unwrap());
        assert_ne!(new_cid, 0);
        assert_ne!(new_cid, BROADCAST_CHANNEL_ID.0);

        assert_eq!(payload[12], U2FHID_PROTOCOL_VERSION);
        assert_eq!(payload[13], DEVICE_VERSION_MAJOR);
        assert_eq!(payload[14], DEVICE_VERSION_MINOR);
        assert_eq!(payload[15], DEVICE_VERSION_BUILD);
        // LOCK always; WINK because the backend supports it.
        assert_eq!(payload[16] & 0b10, 0b10);
        assert_eq!(payload[16] & 0b01, 0b01);
    }

    #[test]
    fn init_responses_mint_distinct_channels() {
        let mut device = device();
        let first = init_channel(&mut device);
        let second = init_channel(&mut device);
        assert_ne!(first, second);
    }

    #[test]
    fn init_on_a_specific_channel_is_rejected() {
        let mut device = device();
        let channel = init_channel(&mut device);
        send_message(&mut device, channel, CommandType::Init, &NONCE);
        expect_error(&mut device, channel, ErrorCode::InvalidCommand);
    }

    #[test]
    fn init_with_bad_nonce_length_is_rejected() {
        let mut device = device();
        send_message(
            &mut device,
            BROADCAST_CHANNEL_ID,
            CommandType::Init,
            &[0; 4],
        );
        expect_error(&mut device, BROADCAST_CHANNEL_ID, ErrorCode::InvalidMessageLength);
    }

    #[test]
    fn ping_echoes_byte_for_byte() {
        let mut device = device();
        let channel = init_channel(&mut device);

        let payload: Vec<u8> = (0u8..200).collect();
        send_message(&mut device, channel, CommandType::Ping, &payload);

        let (response_channel, command, response) = next_response(&mut device);
        assert_eq!(response_channel, channel);
        assert_eq!(command, CommandType::Ping);
        assert_eq!(response, payload);
    }

    #[test]
    fn sequence_jump_yields_invalid_seq() {
        let mut device = device();
        let channel = init_channel(&mut device);
        let now = Instant::now();

        let payload = [0x55u8; 200];
        let packets: Vec<Packet> =
            Packet::encode_message(channel, CommandType::Ping, &payload).into();
        assert_eq!(packets.len(), 4);

        // First frame, then skip from sequence 0 to sequence 2.
        device.handle_frame(Packet::from_bytes(&packets[0].to_bytes()), now);
        device.handle_frame(Packet::from_bytes(&packets[1].to_bytes()), now);
        device.handle_frame(Packet::from_bytes(&packets[3].to_bytes()), now);
        expect_error(&mut device, channel, ErrorCode::InvalidMessageSequencing);
    }

    #[test]
    fn reassembly_expires_after_the_transaction_timeout() {
        let mut device = device();
        let channel = init_channel(&mut device);
        let now = Instant::now();

        let payload = [0x55u8; 200];
        let packets: Vec<Packet> =
            Packet::encode_message(channel, CommandType::Ping, &payload).into();
        device.handle_frame(Packet::from_bytes(&packets[0].to_bytes()), now);

        let later = now + TRANSACTION_TIMEOUT + Duration::from_millis(1);
        device.handle_frame(Packet::from_bytes(&packets[1].to_bytes()), later);
        expect_error(&mut device, channel, ErrorCode::InvalidMessageSequencing);
    }

    #[test]
    fn new_message_cancels_pending_reassembly() {
        let mut device = device();
        let channel = init_channel(&mut device);
        let now = Instant::now();

        let packets: Vec<Packet> =
            Packet::encode_message(channel, CommandType::Ping, &[0x55; 200]).into();
        device.handle_frame(Packet::from_bytes(&packets[0].to_bytes()), now);

        // A short message on the same channel supersedes the transfer.
        send_message_at(&mut device, channel, CommandType::Ping, b"hello", now);
        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Ping);
        assert_eq!(response, b"hello");

        // The old transfer's continuation now has nothing to continue.
        device.handle_frame(Packet::from_bytes(&packets[1].to_bytes()), now);
        expect_error(&mut device, channel, ErrorCode::InvalidMessageSequencing);
    }

    #[test]
    fn lock_excludes_other_channels_until_expiry() {
        let mut device = device();
        let holder = init_channel(&mut device);
        let other = init_channel(&mut device);
        let now = Instant::now();

        send_message_at(&mut device, holder, CommandType::Lock, &[2], now);
        let (_, command, _) = next_response(&mut device);
        assert_eq!(command, CommandType::Lock);

        // MSG from another channel is excluded.
        send_message_at(&mut device, other, CommandType::Msg, &[0x00, 0x03, 0x00, 0x00], now);
        expect_error(&mut device, other, ErrorCode::CommandRequiresChannelLock);

        // PING stays serviceable.
        send_message_at(&mut device, other, CommandType::Ping, b"probe", now);
        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Ping);
        assert_eq!(response, b"probe");

        // The holder itself is unaffected.
        send_message_at(&mut device, holder, CommandType::Msg, &[0x00, 0x03, 0x00, 0x00], now);
        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Msg);
        assert_eq!(response, b"U2F_V2\x90\x00");

        // After expiry all channels resume.
        let later = now + Duration::from_secs(3);
        send_message_at(&mut device, other, CommandType::Msg, &[0x00, 0x03, 0x00, 0x00], later);
        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Msg);
        assert_eq!(response, b"U2F_V2\x90\x00");
    }

    #[test]
    fn zero_second_lock_releases() {
        let mut device = device();
        let holder = init_channel(&mut device);
        let other = init_channel(&mut device);
        let now = Instant::now();

        send_message_at(&mut device, holder, CommandType::Lock, &[2], now);
        next_response(&mut device);
        send_message_at(&mut device, holder, CommandType::Lock, &[0], now);
        next_response(&mut device);

        send_message_at(&mut device, other, CommandType::Msg, &[0x00, 0x03, 0x00, 0x00], now);
        let (_, command, _) = next_response(&mut device);
        assert_eq!(command, CommandType::Msg);
    }

    #[test]
    fn lock_rejects_out_of_range_timeouts() {
        let mut device = device();
        let channel = init_channel(&mut device);
        send_message(&mut device, channel, CommandType::Lock, &[11]);
        expect_error(&mut device, channel, ErrorCode::InvalidParameter);

        send_message(&mut device, channel, CommandType::Lock, &[1, 2]);
        expect_error(&mut device, channel, ErrorCode::InvalidMessageLength);
    }

    #[test]
    fn msg_register_and_authenticate_round_trip() {
        let mut device = device();
        let channel = init_channel(&mut device);

        let mut register = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x40];
        register.extend_from_slice(&[0xbb; 32]); // challenge
        register.extend_from_slice(&[0xaa; 32]); // application
        send_message(&mut device, channel, CommandType::Msg, &register);

        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Msg);
        assert_eq!(&response[response.len() - 2..], &[0x90, 0x00]);
        assert_eq!(response[0], 0x05);
        let handle_len = usize::from(response[66]);
        let key_handle = response[67..67 + handle_len].to_vec();

        let mut authenticate = vec![0x00, 0x02, 0x03, 0x00, 0x00];
        let body_len = 65 + key_handle.len();
        authenticate.push((body_len >> 8) as u8);
        authenticate.push(body_len as u8);
        authenticate.extend_from_slice(&[0xcc; 32]);
        authenticate.extend_from_slice(&[0xaa; 32]);
        authenticate.push(key_handle.len() as u8);
        authenticate.extend_from_slice(&key_handle);
        send_message(&mut device, channel, CommandType::Msg, &authenticate);

        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Msg);
        assert_eq!(&response[response.len() - 2..], &[0x90, 0x00]);
        assert_eq!(response[0], 0x01); // user present
    }

    #[test]
    fn msg_on_broadcast_channel_is_rejected() {
        let mut device = device();
        send_message(
            &mut device,
            BROADCAST_CHANNEL_ID,
            CommandType::Msg,
            &[0x00, 0x03, 0x00, 0x00],
        );
        expect_error(&mut device, BROADCAST_CHANNEL_ID, ErrorCode::InvalidCommand);
    }

    #[test]
    fn undecodable_apdu_is_an_invalid_parameter() {
        let mut device = device();
        let channel = init_channel(&mut device);
        send_message(&mut device, channel, CommandType::Msg, &[0x00]);
        expect_error(&mut device, channel, ErrorCode::InvalidParameter);
    }

    #[test]
    fn wink_invokes_the_backend() {
        let mut device = device();
        let channel = init_channel(&mut device);
        send_message(&mut device, channel, CommandType::Wink, &[]);
        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Wink);
        assert!(response.is_empty());

        send_message(&mut device, channel, CommandType::Wink, &[1]);
        expect_error(&mut device, channel, ErrorCode::InvalidMessageLength);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut device = device();
        let channel = init_channel(&mut device);
        send_message(
            &mut device,
            channel,
            CommandType::Unknown { identifier: 0x42 },
            &[],
        );
        expect_error(&mut device, channel, ErrorCode::InvalidCommand);
    }

    #[test]
    fn unallocated_channel_is_rejected() {
        let mut device = device();
        send_message(&mut device, ChannelId(7), CommandType::Ping, b"hello");
        expect_error(&mut device, ChannelId(7), ErrorCode::InvalidChannel);
    }

    #[test]
    fn reports_with_a_leading_framing_byte_are_accepted() {
        let mut device = device();
        let channel = init_channel(&mut device);

        let packet = Packet::encode_message(channel, CommandType::Ping, b"ok")
            .pop_front()
            .unwrap();
        let mut report = vec![0u8];
        report.extend_from_slice(&packet.to_bytes());
        assert!(device.receive_output_report(ReportType::Output, 0, &report));

        let (_, command, response) = next_response(&mut device);
        assert_eq!(command, CommandType::Ping);
        assert_eq!(response, b"ok");
    }

    #[test]
    fn wrong_report_kinds_are_not_consumed() {
        let mut device = device();
        let report = [0u8; 64];
        assert!(!device.receive_output_report(ReportType::Input, 0, &report));
        assert!(!device.receive_output_report(ReportType::Output, 1, &report));
        assert!(!device.receive_output_report(ReportType::Output, 0, &[0u8; 32]));
    }

    #[test]
    fn fragmented_request_and_response_round_trip() {
        // A payload needing one init frame plus two continuations, with a
        // response fragmented the same way.
        let mut device = device();
        let channel = init_channel(&mut device);

        let payload: Vec<u8> = (0..160u16).map(|v| v as u8).collect();
        send_message(&mut device, channel, CommandType::Ping, &payload);

        let frames: Vec<Vec<u8>> = std::iter::from_fn(|| device.next_report()).collect();
        assert_eq!(frames.len(), 3);

        let mut reassembled = Vec::new();
        for (index, frame) in frames.iter().enumerate() {
            match Packet::from_bytes(frame) {
                Packet::Initialization {
                    command,
                    data,
                    payload_len,
                    ..
                } => {
                    assert_eq!(index, 0);
                    assert_eq!(command, CommandType::Ping);
                    assert_eq!(usize::from(payload_len), payload.len());
                    reassembled.extend_from_slice(&data);
                }
                Packet::Continuation {
                    sequence_number,
                    data,
                    ..
                } => {
                    assert_eq!(usize::from(sequence_number), index - 1);
                    reassembled.extend_from_slice(&data);
                }
            }
        }
        reassembled.truncate(payload.len());
        assert_eq!(reassembled, payload);
    }
}
