use std::io;

use tracing::{info, trace};
use u2f_core::CredentialBackend;

use crate::protocol::U2fHid;
use crate::ReportType;

/// One report read from the host driver.
#[derive(Debug)]
pub struct OutputReport {
    pub report_type: ReportType,
    pub report_num: u8,
    pub data: Vec<u8>,
}

/// Seam to the OS-specific virtual-HID driver.
pub trait HidDriver {
    /// Blocks until the host delivers a report; `None` once the device is
    /// torn down.
    fn recv_output_report(&mut self) -> io::Result<Option<OutputReport>>;

    /// Delivers one 64-byte input report to the host.
    fn send_input_report(&mut self, report_num: u8, data: &[u8]) -> io::Result<()>;
}

/// Services the virtual device until the driver closes or fails: each
/// incoming report is processed to completion and its response frames are
/// written back before the next report is read.
pub fn run<B, D>(device: &mut U2fHid<B>, driver: &mut D) -> io::Result<()>
where
    B: CredentialBackend,
    D: HidDriver,
{
    info!("servicing U2F HID device");
    while let Some(report) = driver.recv_output_report()? {
        let consumed =
            device.receive_output_report(report.report_type, report.report_num, &report.data);
        if !consumed {
            trace!("ignored report");
            continue;
        }
        while let Some(frame) = device.next_report() {
            driver.send_input_report(0, &frame)?;
        }
    }
    info!("device closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use u2f_core::backend::UnsafeBackend;

    use super::*;
    use crate::channel::BROADCAST_CHANNEL_ID;
    use crate::packet::Packet;
    use crate::CommandType;

    /// Driver fake: feeds queued reports in, collects frames out.
    struct ScriptedDriver {
        incoming: VecDeque<OutputReport>,
        sent: Vec<Vec<u8>>,
    }

    impl HidDriver for ScriptedDriver {
        fn recv_output_report(&mut self) -> io::Result<Option<OutputReport>> {
            Ok(self.incoming.pop_front())
        }

        fn send_input_report(&mut self, _report_num: u8, data: &[u8]) -> io::Result<()> {
            self.sent.push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn run_pumps_requests_and_responses() {
        let mut device = U2fHid::new(UnsafeBackend::new().unwrap());
        let mut incoming = VecDeque::new();
        for packet in Packet::encode_message(
            BROADCAST_CHANNEL_ID,
            CommandType::Init,
            &[0, 1, 2, 3, 4, 5, 6, 7],
        ) {
            incoming.push_back(OutputReport {
                report_type: ReportType::Output,
                report_num: 0,
                data: packet.to_bytes(),
            });
        }
        // A report the device must ignore rather than answer.
        incoming.push_back(OutputReport {
            report_type: ReportType::Feature,
            report_num: 0,
            data: vec![0; 64],
        });

        let mut driver = ScriptedDriver {
            incoming,
            sent: Vec::new(),
        };
        run(&mut device, &mut driver).unwrap();

        assert_eq!(driver.sent.len(), 1);
        let response = Packet::from_bytes(&driver.sent[0]);
        assert_eq!(response.channel_id(), BROADCAST_CHANNEL_ID);
    }
}
