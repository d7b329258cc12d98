//! Scripted fake transports for exercising the engine without a radio.
//!
//! A [`FakeTransport`] answers the init handshake on its own, optionally
//! auto-acknowledges display and mic frames, records every write, and can
//! inject arbitrary notifications or a mid-operation disconnect.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::protocol::{Opcode, RESPONSE_ACK, RESPONSE_NACK};
use crate::infrastructure::bluetooth::transport::{TransportEvent, UnitTransport, WriteMode};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
struct Inner {
    writes: Vec<(Vec<u8>, WriteMode)>,
    notify_tx: Option<mpsc::UnboundedSender<TransportEvent>>,
}

pub struct FakeTransport {
    name: String,
    inner: Mutex<Inner>,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    auto_init_ack: AtomicBool,
    ack_text: AtomicBool,
    ack_mic: AtomicBool,
    nack_mic: AtomicBool,
}

impl FakeTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(Inner::default()),
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            auto_init_ack: AtomicBool::new(true),
            ack_text: AtomicBool::new(true),
            ack_mic: AtomicBool::new(true),
            nack_mic: AtomicBool::new(false),
        }
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_auto_init_ack(&self, ack: bool) {
        self.auto_init_ack.store(ack, Ordering::SeqCst);
    }

    /// When false the unit stays silent after display chunks.
    pub fn set_ack_text(&self, ack: bool) {
        self.ack_text.store(ack, Ordering::SeqCst);
    }

    pub fn set_ack_mic(&self, ack: bool) {
        self.ack_mic.store(ack, Ordering::SeqCst);
    }

    /// Respond to mic commands with a failure byte instead of an ack.
    pub fn set_nack_mic(&self, nack: bool) {
        self.nack_mic.store(nack, Ordering::SeqCst);
    }

    /// Inject a device-originated notification.
    pub fn emit(&self, data: Vec<u8>) {
        if let Some(tx) = &self.inner.lock().unwrap().notify_tx {
            let _ = tx.send(TransportEvent::Notification(data));
        }
    }

    /// Simulate link loss: the event stream ends with `Disconnected` and
    /// further writes fail.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(tx) = &self.inner.lock().unwrap().notify_tx {
            let _ = tx.send(TransportEvent::Disconnected);
        }
    }

    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .writes
            .iter()
            .map(|(frame, _)| frame.clone())
            .collect()
    }

    pub fn frames_with_opcode(&self, opcode: u8) -> Vec<Vec<u8>> {
        self.written_frames()
            .into_iter()
            .filter(|f| f.first() == Some(&opcode))
            .collect()
    }

    fn auto_respond(&self, frame: &[u8]) {
        let Some(&opcode) = frame.first() else { return };
        if opcode == Opcode::Init as u8 && self.auto_init_ack.load(Ordering::SeqCst) {
            self.emit(vec![Opcode::Init as u8, RESPONSE_ACK]);
        } else if opcode == Opcode::EvenAi as u8 && self.ack_text.load(Ordering::SeqCst) {
            self.emit(vec![Opcode::EvenAi as u8, RESPONSE_ACK]);
        } else if opcode == Opcode::MicControl as u8 {
            if self.nack_mic.load(Ordering::SeqCst) {
                self.emit(vec![Opcode::MicControl as u8, RESPONSE_NACK]);
            } else if self.ack_mic.load(Ordering::SeqCst) {
                self.emit(vec![Opcode::MicControl as u8, RESPONSE_ACK]);
            }
        }
    }
}

#[async_trait]
impl UnitTransport for FakeTransport {
    fn peripheral_name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), LinkError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(LinkError::ConnectFailed {
                peripheral: self.name.clone(),
                reason: "scripted connect failure".into(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn discover_uart(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, LinkError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().notify_tx = Some(tx);
        Ok(rx)
    }

    async fn write(&self, frame: &[u8], mode: WriteMode) -> Result<(), LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::WriteFailed {
                peripheral: self.name.clone(),
                reason: "not connected".into(),
            });
        }
        self.inner
            .lock()
            .unwrap()
            .writes
            .push((frame.to_vec(), mode));
        self.auto_respond(frame);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
