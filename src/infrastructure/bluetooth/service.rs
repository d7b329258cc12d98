//! Glasses Service
//!
//! The facade that wires the two link sessions, the coordinator, the pager
//! and the session state machine together, owns the notification pump and
//! the AI trigger-timeout task, and exposes the operation surface consumers
//! call (text display, voice, translation, quick notes, dashboard).

use crate::domain::models::{BatteryReport, GlassesEvent, QuickNote, SessionState, UnitRole};
use crate::domain::settings::SettingsService;
use crate::error::{CommandError, LinkError};
use crate::infrastructure::bluetooth::coordinator::{CoordinatorConfig, DualUnitCoordinator};
use crate::infrastructure::bluetooth::pager::{self, PendingText};
use crate::infrastructure::bluetooth::protocol::{
    self, Notification, TextChunk, TranslateLanguage, DISPLAY_WIDTH,
};
use crate::infrastructure::bluetooth::session::LinkSession;
use crate::infrastructure::bluetooth::transport::{TransportEvent, UnitTransport, WriteMode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{Action, SessionStateMachine};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub coordinator: CoordinatorConfig,
    /// Window after an AI trigger in which a stop order must arrive before
    /// the mic is force-closed. Suppressed in continuous-listening mode.
    pub trigger_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            trigger_timeout: Duration::from_secs(6),
        }
    }
}

/// Public handle to the engine. Cheap to clone.
#[derive(Clone)]
pub struct GlassesService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    coordinator: Arc<DualUnitCoordinator>,
    state: Mutex<SessionStateMachine>,
    pending: Mutex<Option<PendingText>>,
    settings: Arc<Mutex<SettingsService>>,
    events: mpsc::UnboundedSender<GlassesEvent>,
    trigger_task: Mutex<Option<JoinHandle<()>>>,
    trigger_timeout: Duration,
    note_ids: AtomicU64,
}

impl GlassesService {
    /// Build the engine over two classified transports. Returns the event
    /// stream consumers subscribe to.
    pub fn new(
        left: Arc<dyn UnitTransport>,
        right: Arc<dyn UnitTransport>,
        settings: Arc<Mutex<SettingsService>>,
        config: ServiceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<GlassesEvent>) {
        let left_session = LinkSession::new(UnitRole::Left, left);
        let right_session = LinkSession::new(UnitRole::Right, right);
        let coordinator = Arc::new(DualUnitCoordinator::new(
            left_session,
            right_session,
            config.coordinator,
        ));

        let continuous = settings.lock().unwrap().get().continuous_listening;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ServiceInner {
            coordinator,
            state: Mutex::new(SessionStateMachine::new(continuous)),
            pending: Mutex::new(None),
            settings,
            events: events_tx,
            trigger_task: Mutex::new(None),
            trigger_timeout: config.trigger_timeout,
            note_ids: AtomicU64::new(1),
        });
        (Self { inner }, events_rx)
    }

    /// Bring both sessions to `Ready` (connect, discover, init handshake),
    /// start the notification pumps and the heartbeat. The dual session is
    /// operational only when both units make it.
    pub async fn connect(&self) -> Result<(), LinkError> {
        let init_timeout = self.inner.coordinator.config().init_ack_timeout;

        let left = self.inner.coordinator.session(UnitRole::Left).clone();
        let left_rx = left.establish(init_timeout).await?;

        let right = self.inner.coordinator.session(UnitRole::Right).clone();
        let right_rx = match right.establish(init_timeout).await {
            Ok(rx) => rx,
            Err(e) => {
                // No half-open dual session
                left.reset();
                return Err(e);
            }
        };

        self.inner.spawn_pump(UnitRole::Left, left_rx);
        self.inner.spawn_pump(UnitRole::Right, right_rx);
        self.inner.coordinator.start_heartbeat();

        info!("both units ready, dual session operational");
        let _ = self.inner.events.send(GlassesEvent::ConnectionReady);
        Ok(())
    }

    pub fn is_operational(&self) -> bool {
        self.inner.coordinator.both_ready()
    }

    pub fn session_state(&self, role: UnitRole) -> SessionState {
        self.inner.coordinator.session(role).state()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.state.lock().unwrap().is_listening()
    }

    /// Display a text payload. Fits-on-one-page text goes out as a single
    /// final transfer; longer text becomes a pending delivery whose later
    /// pages are sent only on device page orders.
    pub async fn send_text(&self, text: &str) -> Result<(), CommandError> {
        let layout = pager::layout(text, DISPLAY_WIDTH);
        *self.inner.pending.lock().unwrap() = if layout.is_multi_page() {
            Some(layout.clone())
        } else {
            None
        };

        let result = self.inner.send_page(&layout).await;
        if result.is_err() {
            *self.inner.pending.lock().unwrap() = None;
        }
        result
    }

    /// Advance the pending delivery one page. No-op on the last page or
    /// without a pending delivery.
    pub async fn page_forward(&self) -> Result<(), CommandError> {
        self.inner
            .move_page(|pending| pending.forward())
            .await
    }

    /// Go back one page. No-op on the first page.
    pub async fn page_backward(&self) -> Result<(), CommandError> {
        self.inner
            .move_page(|pending| pending.backward())
            .await
    }

    /// Open the Right unit's microphone (continuous-listening entry point).
    /// Local state is adjusted optimistically and rolled back on a mic nack.
    pub async fn start_voice_recording(&self) -> Result<(), CommandError> {
        let actions = self.inner.state.lock().unwrap().start_voice();
        self.inner.apply_actions(actions).await
    }

    pub async fn stop_voice_recording(&self) -> Result<(), CommandError> {
        let actions = self.inner.state.lock().unwrap().stop_voice();
        self.inner.apply_actions(actions).await
    }

    /// Put the glasses into translation mode for the given language pair.
    pub async fn start_translation(
        &self,
        source: TranslateLanguage,
        target: TranslateLanguage,
    ) -> Result<(), CommandError> {
        let coordinator = &self.inner.coordinator;
        coordinator
            .send_to_both(&protocol::translate_config(), WriteMode::WithResponse)
            .await?;
        coordinator
            .send_to_both(
                &protocol::translate_setup(source, target),
                WriteMode::WithResponse,
            )
            .await?;
        coordinator
            .send_to_both(&protocol::translate_start(), WriteMode::WithResponse)
            .await?;

        self.inner.state.lock().unwrap().start_translation();
        {
            let mut settings = self.inner.settings.lock().unwrap();
            settings.get_mut().translate_source = source as u8;
            settings.get_mut().translate_target = target as u8;
            if let Err(e) = settings.save() {
                warn!(error = %e, "failed to persist language prefs");
            }
        }
        Ok(())
    }

    /// Push one caption update: the recognized source line and its
    /// translation share a sequence value so the firmware pairs them.
    pub async fn send_translation(
        &self,
        original: &str,
        translated: &str,
    ) -> Result<(), CommandError> {
        let seq = self.inner.coordinator.next_translate_seq();
        self.inner
            .coordinator
            .send_to_both(
                &protocol::translate_original(seq, original),
                WriteMode::WithResponse,
            )
            .await?;
        self.inner
            .coordinator
            .send_to_both(
                &protocol::translate_translated(seq, translated),
                WriteMode::WithResponse,
            )
            .await
    }

    pub async fn stop_translation(&self) -> Result<(), CommandError> {
        self.inner.state.lock().unwrap().stop_translation();
        self.exit_all().await
    }

    /// Append a quick note and resynchronize the device mirror. The list
    /// holds four slots; adding a fifth evicts the oldest note.
    pub async fn add_quick_note(&self, text: &str) -> Result<(), CommandError> {
        let notes = {
            let mut settings = self.inner.settings.lock().unwrap();
            let list = &mut settings.get_mut().quick_notes;
            list.push(QuickNote {
                id: self.inner.note_ids.fetch_add(1, Ordering::Relaxed),
                text: text.to_string(),
                created_at: std::time::SystemTime::now(),
            });
            while list.len() > 4 {
                list.remove(0);
            }
            let snapshot = list.clone();
            if let Err(e) = settings.save() {
                warn!(error = %e, "failed to persist quick notes");
            }
            snapshot
        };
        self.inner.coordinator.resync_quick_notes(&notes).await
    }

    pub async fn update_quick_note(&self, id: u64, text: &str) -> Result<(), CommandError> {
        let notes = {
            let mut settings = self.inner.settings.lock().unwrap();
            let list = &mut settings.get_mut().quick_notes;
            if let Some(note) = list.iter_mut().find(|n| n.id == id) {
                note.text = text.to_string();
            }
            let snapshot = list.clone();
            if let Err(e) = settings.save() {
                warn!(error = %e, "failed to persist quick notes");
            }
            snapshot
        };
        self.inner.coordinator.resync_quick_notes(&notes).await
    }

    pub async fn remove_quick_note(&self, id: u64) -> Result<(), CommandError> {
        let notes = {
            let mut settings = self.inner.settings.lock().unwrap();
            let list = &mut settings.get_mut().quick_notes;
            list.retain(|n| n.id != id);
            let snapshot = list.clone();
            if let Err(e) = settings.save() {
                warn!(error = %e, "failed to persist quick notes");
            }
            snapshot
        };
        self.inner.coordinator.resync_quick_notes(&notes).await
    }

    pub async fn clear_quick_notes(&self) -> Result<(), CommandError> {
        {
            let mut settings = self.inner.settings.lock().unwrap();
            settings.get_mut().quick_notes.clear();
            if let Err(e) = settings.save() {
                warn!(error = %e, "failed to persist quick notes");
            }
        }
        self.inner.coordinator.resync_quick_notes(&[]).await
    }

    pub async fn set_brightness(&self, level: u8, auto: bool) -> Result<(), CommandError> {
        self.inner
            .coordinator
            .send_to_both(&protocol::brightness(level, auto), WriteMode::WithResponse)
            .await?;
        let mut settings = self.inner.settings.lock().unwrap();
        settings.get_mut().brightness = level.min(63);
        settings.get_mut().auto_brightness = auto;
        if let Err(e) = settings.save() {
            warn!(error = %e, "failed to persist brightness");
        }
        Ok(())
    }

    pub async fn set_silent_mode(&self, enabled: bool) -> Result<(), CommandError> {
        self.inner
            .coordinator
            .send_to_both(&protocol::silent_mode(enabled), WriteMode::WithResponse)
            .await?;
        let mut settings = self.inner.settings.lock().unwrap();
        settings.get_mut().silent_mode = enabled;
        if let Err(e) = settings.save() {
            warn!(error = %e, "failed to persist silent mode");
        }
        Ok(())
    }

    pub async fn set_dashboard_mode(&self, mode: u8) -> Result<(), CommandError> {
        self.send_dashboard(protocol::dashboard_mode(mode), |s| s.dashboard_mode = mode)
            .await
    }

    pub async fn set_dashboard_position(&self, height: u8) -> Result<(), CommandError> {
        self.send_dashboard(protocol::dashboard_position(height), |s| {
            s.dashboard_height = height.min(8)
        })
        .await
    }

    pub async fn set_dashboard_distance(&self, metres: u8) -> Result<(), CommandError> {
        self.send_dashboard(protocol::dashboard_distance(metres), |s| {
            s.dashboard_distance = metres.clamp(1, 5)
        })
        .await
    }

    pub async fn set_dashboard_tilt(&self, degrees: u8) -> Result<(), CommandError> {
        self.send_dashboard(protocol::dashboard_tilt(degrees), |s| {
            s.dashboard_tilt = degrees.min(60)
        })
        .await
    }

    async fn send_dashboard(
        &self,
        frame: Vec<u8>,
        persist: impl FnOnce(&mut crate::domain::settings::Settings),
    ) -> Result<(), CommandError> {
        self.inner
            .coordinator
            .send_to_both(&frame, WriteMode::WithResponse)
            .await?;
        let mut settings = self.inner.settings.lock().unwrap();
        persist(settings.get_mut());
        if let Err(e) = settings.save() {
            warn!(error = %e, "failed to persist dashboard settings");
        }
        Ok(())
    }

    /// Refresh the dashboard clock and weather tile. Time format and unit
    /// preferences come from the persisted settings.
    pub async fn send_dashboard_clock(
        &self,
        epoch_secs: u32,
        weather_icon: u8,
        temperature_c: i8,
    ) -> Result<(), CommandError> {
        let (use_fahrenheit, use_24_hour) = {
            let settings = self.inner.settings.lock().unwrap();
            (settings.get().use_fahrenheit, settings.get().use_24_hour)
        };
        self.inner
            .coordinator
            .send_to_both(
                &protocol::dashboard_clock(
                    epoch_secs,
                    weather_icon,
                    temperature_c,
                    use_fahrenheit,
                    use_24_hour,
                ),
                WriteMode::WithResponse,
            )
            .await
    }

    pub fn set_continuous_listening(&self, enabled: bool) {
        self.inner
            .state
            .lock()
            .unwrap()
            .set_continuous_listening(enabled);
        let mut settings = self.inner.settings.lock().unwrap();
        settings.get_mut().continuous_listening = enabled;
        if let Err(e) = settings.save() {
            warn!(error = %e, "failed to persist continuous listening");
        }
    }

    /// Leave every active function on both units and reset local state.
    pub async fn exit_all(&self) -> Result<(), CommandError> {
        let actions = self.inner.state.lock().unwrap().reset();
        self.inner.apply_actions(actions).await?;
        self.inner
            .coordinator
            .send_to_both(&protocol::exit_all_functions(), WriteMode::WithResponse)
            .await
    }
}

impl ServiceInner {
    fn spawn_pump(self: &Arc<Self>, role: UnitRole, mut rx: mpsc::UnboundedReceiver<TransportEvent>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    TransportEvent::Notification(data) => {
                        inner.handle_notification(role, &data).await;
                    }
                    TransportEvent::Disconnected => {
                        inner.on_disconnect(role);
                        break;
                    }
                }
            }
        });
    }

    async fn handle_notification(self: &Arc<Self>, role: UnitRole, data: &[u8]) {
        match Notification::decode(data) {
            Notification::TextAck { ok: true } => self.coordinator.note_text_ack(role),
            Notification::TextAck { ok: false } => {
                warn!(%role, "display chunk rejected by unit");
            }
            Notification::MicAck { ok } => {
                let actions = self.state.lock().unwrap().on_mic_ack(ok);
                if let Err(e) = self.apply_actions(actions).await {
                    warn!(%role, error = %e, "mic ack follow-up failed");
                }
            }
            Notification::Order(order) => {
                debug!(%role, ?order, "device order");
                let actions = self.state.lock().unwrap().on_order(order);
                if let Err(e) = self.apply_actions(actions).await {
                    warn!(%role, ?order, error = %e, "order follow-up failed");
                }
            }
            Notification::MicData(pcm) => {
                let _ = self.events.send(GlassesEvent::VoiceChunk(pcm));
            }
            Notification::Battery {
                percent,
                charging,
                millivolts,
            } => {
                let _ = self.events.send(GlassesEvent::Battery(BatteryReport {
                    role,
                    percent,
                    charging,
                    millivolts,
                }));
            }
            // Handshake traffic after readiness carries no information
            Notification::InitAck => {}
            Notification::Unknown { opcode, payload } => {
                debug!(%role, opcode, len = payload.len(), "ignoring unknown notification");
            }
        }
    }

    fn on_disconnect(self: &Arc<Self>, role: UnitRole) {
        warn!(%role, "unit disconnected");
        self.coordinator.on_unit_disconnected(role);
        self.cancel_trigger_timer();
        *self.pending.lock().unwrap() = None;
        let _ = self.events.send(GlassesEvent::ConnectionLost(role));
    }

    async fn apply_actions(self: &Arc<Self>, actions: Vec<Action>) -> Result<(), CommandError> {
        for action in actions {
            match action {
                Action::SendMicControl(on) => {
                    self.coordinator
                        .session(UnitRole::Right)
                        .write(&protocol::mic_control(on), WriteMode::WithResponse)
                        .await?;
                }
                Action::RestartTriggerTimeout => self.restart_trigger_timer(),
                Action::CancelTriggerTimeout => self.cancel_trigger_timer(),
                Action::SendExitAll => {
                    self.coordinator
                        .send_to_both(&protocol::exit_all_functions(), WriteMode::WithResponse)
                        .await?;
                }
                Action::ChangePage => {
                    // The ack wait for the new page runs off the pump task,
                    // otherwise the acks it needs could never be consumed.
                    let inner = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(e) = inner.move_page(|p| p.change_page()).await {
                            warn!(error = %e, "device page change failed");
                        }
                    });
                }
                Action::ClearPending => {
                    *self.pending.lock().unwrap() = None;
                }
                Action::Emit(event) => {
                    let _ = self.events.send(event);
                }
            }
        }
        Ok(())
    }

    fn restart_trigger_timer(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.trigger_timeout).await;
            debug!("AI trigger window elapsed");
            let actions = inner.state.lock().unwrap().on_trigger_timeout();
            if let Err(e) = inner.apply_actions(actions).await {
                warn!(error = %e, "trigger timeout handling failed");
            }
        });
        // Replace, never stack
        if let Some(old) = self.trigger_task.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    fn cancel_trigger_timer(&self) {
        if let Some(handle) = self.trigger_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Move the pending delivery with `step` and send the resulting page.
    /// A step that does not move (boundary page) is a no-op.
    async fn move_page(
        self: &Arc<Self>,
        step: impl FnOnce(&mut PendingText) -> bool,
    ) -> Result<(), CommandError> {
        let snapshot = {
            let mut guard = self.pending.lock().unwrap();
            match guard.as_mut() {
                Some(pending) => {
                    if step(pending) {
                        Some(pending.clone())
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        let Some(pending) = snapshot else {
            return Ok(());
        };
        let _ = self.events.send(GlassesEvent::PageChanged {
            current: pending.current_page(),
            total: pending.max_pages(),
        });
        let result = self.send_page(&pending).await;
        if result.is_err() {
            *self.pending.lock().unwrap() = None;
        }
        result
    }

    /// Send one page as wire-sized chunks, strictly in order: chunk N+1 is
    /// not dispatched until chunk N succeeded, and a chunk failure aborts
    /// the rest of the page.
    async fn send_page(&self, pending: &PendingText) -> Result<(), CommandError> {
        let text = pending.page_text();
        let chunks = pager::chunk_payload(&text);
        let total_chunks = chunks.len() as u8;
        for (index, payload) in chunks.into_iter().enumerate() {
            let frame = TextChunk {
                seq: self.coordinator.next_evenai_seq(),
                total_chunks,
                chunk_index: index as u8,
                status: pending.status() as u8,
                new_screen: true,
                current_page: pending.current_page(),
                max_pages: pending.max_pages(),
                payload,
            }
            .encode();
            self.coordinator.send_chunk_with_retry(&frame, index).await?;
        }
        Ok(())
    }
}
