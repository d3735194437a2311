//! Fingerprint capture seam and the presence-scan worker.
//!
//! The capture driver stack is an external collaborator: it plugs in
//! through [`CaptureSource`] and delivers [`CaptureEvent`]s. One worker
//! thread owns the scan timer and the source's activation state; the
//! protocol thread never waits on it, it only reads the shared live
//! template.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Extracted fingerprint template bytes (e.g. ISO 19794-2).
pub type Template = Vec<u8>;

/// One image delivered by a reader.
#[derive(Clone, Debug)]
pub struct CaptureFrame {
    pub reader: String,
    pub data: Vec<u8>,
}

/// Events a capture source delivers while activated.
#[derive(Clone, Debug)]
pub enum CaptureEvent {
    ReaderPlugged { reader: String },
    ReaderUnplugged { reader: String },
    FingerPlaced,
    FingerRemoved,
    FrameReceived(CaptureFrame),
    Captured(CaptureFrame),
    AskUserRemove,
    PlugEnumerationFinished,
    FakeFingerDetected,
    FakeFingerRemoved,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("biometric license missing or invalid")]
    License,

    #[error("fingerprint reader failure: {0}")]
    Reader(String),

    #[error("template extraction failed")]
    Extraction,

    #[error("template matching failed")]
    Matching,
}

/// Handle a capture source uses to deliver events to the scan worker.
#[derive(Clone)]
pub struct EventSink(Sender<ScanMessage>);

impl EventSink {
    pub fn send(&self, event: CaptureEvent) {
        // A send after worker shutdown is harmless.
        let _ = self.0.send(ScanMessage::Capture(event));
    }
}

/// Driver seam for a fingerprint reader stack.
pub trait CaptureSource: Send + Sync + 'static {
    /// Powers up the readers and streams events into `sink` until
    /// [`deactivate`](CaptureSource::deactivate).
    fn activate(&self, sink: EventSink) -> Result<(), CaptureError>;

    fn deactivate(&self);

    /// Extracts a template from a captured image, in the source's
    /// preferred exchange format.
    fn extract(&self, frame: &CaptureFrame) -> Result<Template, CaptureError>;

    /// Similarity score between two templates; higher is more similar.
    fn match_score(&self, enrolled: &[u8], candidate: &[u8]) -> Result<i32, CaptureError>;
}

pub(crate) enum ScanMessage {
    Capture(CaptureEvent),
    /// Open (or extend) the scan window.
    Begin,
    /// The live template was consumed; end the scan.
    Finish,
    Shutdown,
}

/// A finger was scanned this recently; the template stays usable until
/// `armed_until` or consumption.
struct ArmedTemplate {
    template: Template,
    armed_until: Instant,
}

#[derive(Default)]
struct LiveTemplate {
    slot: Mutex<Option<ArmedTemplate>>,
}

impl LiveTemplate {
    fn peek(&self) -> Option<Template> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|armed| Instant::now() < armed.armed_until)
            .map(|armed| armed.template.clone())
    }

    fn take(&self) -> Option<Template> {
        let mut slot = self.slot.lock().unwrap();
        slot.take()
            .filter(|armed| Instant::now() < armed.armed_until)
            .map(|armed| armed.template)
    }

    fn arm(&self, template: Template, armed_until: Instant) {
        *self.slot.lock().unwrap() = Some(ArmedTemplate {
            template,
            armed_until,
        });
    }

    fn clear(&self) {
        self.slot.lock().unwrap().take();
    }
}

/// How long a scan waits for a finger once requested.
const SCAN_WINDOW: Duration = Duration::from_secs(5);

/// How long an extracted template stays usable.
const ARMED_WINDOW: Duration = Duration::from_secs(5);

/// Single-owner scan task: receives capture events and control messages on
/// one channel, terminates the scan on timeout, and publishes the live
/// template for the presence checks to read.
pub(crate) struct ScanWorker {
    tx: Sender<ScanMessage>,
    live: Arc<LiveTemplate>,
    thread: Option<JoinHandle<()>>,
}

impl ScanWorker {
    pub(crate) fn spawn(source: Arc<dyn CaptureSource>) -> std::io::Result<ScanWorker> {
        let (tx, rx) = mpsc::channel();
        let live = Arc::new(LiveTemplate::default());
        let thread = thread::Builder::new().name("presence-scan".into()).spawn({
            let live = Arc::clone(&live);
            let sink = EventSink(tx.clone());
            move || run(rx, sink, source, live)
        })?;
        Ok(ScanWorker {
            tx,
            live,
            thread: Some(thread),
        })
    }

    pub(crate) fn request_scan(&self) {
        let _ = self.tx.send(ScanMessage::Begin);
    }

    pub(crate) fn finish_scan(&self) {
        let _ = self.tx.send(ScanMessage::Finish);
    }

    pub(crate) fn peek_template(&self) -> Option<Template> {
        self.live.peek()
    }

    pub(crate) fn take_template(&self) -> Option<Template> {
        self.live.take()
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(ScanMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(
    rx: Receiver<ScanMessage>,
    sink: EventSink,
    source: Arc<dyn CaptureSource>,
    live: Arc<LiveTemplate>,
) {
    // None while idle; while scanning or armed, the instant the scan dies.
    let mut deadline: Option<Instant> = None;
    let mut active = false;

    loop {
        let message = match deadline {
            Some(at) => {
                let now = Instant::now();
                if now >= at {
                    debug!("scan window elapsed");
                    live.clear();
                    if active {
                        source.deactivate();
                        active = false;
                    }
                    deadline = None;
                    continue;
                }
                match rx.recv_timeout(at - now) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            ScanMessage::Begin => {
                deadline = Some(Instant::now() + SCAN_WINDOW);
                if !active {
                    debug!("initiating capture");
                    match source.activate(sink.clone()) {
                        Ok(()) => active = true,
                        Err(err) => {
                            warn!(%err, "failed to activate capture source");
                            deadline = None;
                        }
                    }
                }
            }
            ScanMessage::Capture(event) => match event {
                CaptureEvent::Captured(frame) => match source.extract(&frame) {
                    Ok(template) => {
                        debug!(reader = %frame.reader, "template extracted");
                        let armed_until = Instant::now() + ARMED_WINDOW;
                        live.arm(template, armed_until);
                        deadline = Some(armed_until);
                    }
                    Err(err) => warn!(%err, "template extraction failed"),
                },
                CaptureEvent::FingerRemoved | CaptureEvent::ReaderUnplugged { .. } => {
                    live.clear();
                }
                CaptureEvent::FakeFingerDetected => {
                    warn!("fake finger detected, discarding template");
                    live.clear();
                }
                CaptureEvent::ReaderPlugged { reader } => {
                    debug!(reader, "fingerprint reader attached");
                }
                other => trace!(?other, "capture event"),
            },
            ScanMessage::Finish => {
                live.clear();
                if active {
                    source.deactivate();
                    active = false;
                }
                deadline = None;
            }
            ScanMessage::Shutdown => break,
        }
    }

    if active {
        source.deactivate();
    }
    live.clear();
}
