//! Dual-Unit Coordinator
//!
//! The single place that fans logical operations out to both link sessions
//! and reduces their two acknowledgement streams into one outcome. Owns the
//! sequence counters, the ack-flag pair, the retry/timeout policy and the
//! heartbeat task; no other component touches them.

use crate::domain::models::{QuickNote, UnitRole};
use crate::error::CommandError;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::session::LinkSession;
use crate::infrastructure::bluetooth::transport::WriteMode;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Timing and retry policy.
///
/// The ack window is 300 ms with three attempts per chunk; the source
/// history carried both 300 ms and 800 ms variants, and with three attempts
/// the shorter window wins on worst-case latency.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long one attempt waits for both units to acknowledge.
    pub ack_timeout: Duration,
    /// How long a session waits for the init acknowledgement.
    pub init_ack_timeout: Duration,
    /// Attempts per text chunk before the transfer is abandoned.
    pub text_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Pause between the left and right write of one fan-out.
    pub inter_unit_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(300),
            init_ack_timeout: Duration::from_millis(800),
            text_attempts: 3,
            retry_delay: Duration::from_millis(50),
            inter_unit_delay: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Default)]
struct AckState {
    generation: u64,
    left: bool,
    right: bool,
    failed: bool,
}

/// The per-send acknowledgement pair.
///
/// A generation counter ties flags to one attempt: flags from a previous
/// attempt (or a late ack after a reset) can never satisfy a newer wait,
/// and a disconnect fails the current wait immediately.
struct AckTracker {
    state: Mutex<AckState>,
    notify: Notify,
}

impl AckTracker {
    fn new() -> Self {
        Self {
            state: Mutex::new(AckState::default()),
            notify: Notify::new(),
        }
    }

    /// Start a new attempt: both flags false, previous waiters invalidated.
    fn begin(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.left = false;
        state.right = false;
        state.failed = false;
        let generation = state.generation;
        drop(state);
        self.notify.notify_waiters();
        generation
    }

    fn mark(&self, role: UnitRole) {
        let mut state = self.state.lock().unwrap();
        match role {
            UnitRole::Left => state.left = true,
            UnitRole::Right => state.right = true,
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Invalidate the in-flight wait (unit lost, write failed).
    fn fail(&self) {
        self.state.lock().unwrap().failed = true;
        self.notify.notify_waiters();
    }

    /// True only once both the left-tagged and right-tagged acks of this
    /// generation have been observed. A single unit's ack never suffices.
    async fn wait(&self, generation: u64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state.lock().unwrap();
                if state.generation != generation || state.failed {
                    return false;
                }
                if state.left && state.right {
                    return true;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let state = self.state.lock().unwrap();
                return state.generation == generation
                    && !state.failed
                    && state.left
                    && state.right;
            }
        }
    }
}

/// Coordinates the two link sessions as one logical device.
pub struct DualUnitCoordinator {
    left: LinkSession,
    right: LinkSession,
    config: CoordinatorConfig,
    acks: AckTracker,
    evenai_seq: AtomicU8,
    translate_seq: AtomicU8,
    heartbeat_seq: AtomicU8,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    /// Serializes quick-note resyncs so the mirrored list is never partial.
    resync_lock: tokio::sync::Mutex<()>,
}

impl DualUnitCoordinator {
    pub fn new(left: LinkSession, right: LinkSession, config: CoordinatorConfig) -> Self {
        debug_assert_eq!(left.role(), UnitRole::Left);
        debug_assert_eq!(right.role(), UnitRole::Right);
        Self {
            left,
            right,
            config,
            acks: AckTracker::new(),
            evenai_seq: AtomicU8::new(0),
            translate_seq: AtomicU8::new(0),
            heartbeat_seq: AtomicU8::new(0),
            heartbeat: Mutex::new(None),
            resync_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn session(&self, role: UnitRole) -> &LinkSession {
        match role {
            UnitRole::Left => &self.left,
            UnitRole::Right => &self.right,
        }
    }

    pub fn both_ready(&self) -> bool {
        self.left.is_ready() && self.right.is_ready()
    }

    fn require_both(&self) -> Result<(), CommandError> {
        for session in [&self.left, &self.right] {
            if !session.is_ready() {
                return Err(CommandError::UnitMissing(session.role()));
            }
        }
        Ok(())
    }

    /// Next display-chunk sequence number. One increment per chunk; the left
    /// and right copy of a chunk share the value so firmware can dedupe.
    /// Wraps 255 → 0.
    pub fn next_evenai_seq(&self) -> u8 {
        self.evenai_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Independent counter for translation captions, same wraparound rule.
    pub fn next_translate_seq(&self) -> u8 {
        self.translate_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Write one frame to both units, left first then right, with the
    /// configured gap between the two writes. Fails fast when either unit
    /// is missing; a write failure resets that unit's session and
    /// invalidates any ack wait that depended on it.
    pub async fn send_to_both(&self, frame: &[u8], mode: WriteMode) -> Result<(), CommandError> {
        self.require_both()?;
        for (i, session) in [&self.left, &self.right].into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.inter_unit_delay).await;
            }
            if let Err(e) = session.write(frame, mode).await {
                warn!(role = %session.role(), error = %e, "fan-out write failed");
                session.reset();
                self.acks.fail();
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Fan out a frame and wait until both units acknowledge, one attempt.
    pub async fn send_acknowledged(&self, frame: &[u8]) -> Result<(), CommandError> {
        let generation = self.acks.begin();
        self.send_to_both(frame, WriteMode::WithoutResponse).await?;
        if self.acks.wait(generation, self.config.ack_timeout).await {
            Ok(())
        } else {
            Err(CommandError::AckTimeout)
        }
    }

    /// Fan out a display chunk with the full retry policy: ack flags reset
    /// per attempt, a fixed delay between attempts, and definitive failure
    /// once the attempts are exhausted.
    pub async fn send_chunk_with_retry(
        &self,
        frame: &[u8],
        chunk_index: usize,
    ) -> Result<(), CommandError> {
        let attempts = self.config.text_attempts;
        for attempt in 1..=attempts {
            self.require_both()?;
            let generation = self.acks.begin();
            self.send_to_both(frame, WriteMode::WithoutResponse).await?;
            if self.acks.wait(generation, self.config.ack_timeout).await {
                trace!(chunk_index, attempt, "chunk acknowledged by both units");
                return Ok(());
            }
            debug!(chunk_index, attempt, "chunk ack timed out");
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }
        warn!(chunk_index, attempts, "chunk failed all attempts, abandoning transfer");
        Err(CommandError::ExhaustedRetries {
            chunk: chunk_index,
            attempts,
        })
    }

    /// Record a display acknowledgement from one unit.
    pub fn note_text_ack(&self, role: UnitRole) {
        self.acks.mark(role);
    }

    /// A unit dropped: reset its session and fail any in-flight ack wait.
    /// An operation requiring both units must never resolve successfully on
    /// the surviving unit's ack alone.
    pub fn on_unit_disconnected(&self, role: UnitRole) {
        self.session(role).reset();
        self.acks.fail();
    }

    /// Start (or restart) the heartbeat task: a fixed-interval beacon to
    /// both units, fire-and-forget, never retried, no effect on readiness.
    pub fn start_heartbeat(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.config.heartbeat_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                let seq = coordinator.heartbeat_seq.fetch_add(1, Ordering::Relaxed);
                let frame = protocol::heartbeat(seq);
                for session in [&coordinator.left, &coordinator.right] {
                    if let Err(e) = session.write(&frame, WriteMode::WithoutResponse).await {
                        debug!(role = %session.role(), error = %e, "heartbeat skipped");
                    }
                }
            }
        });
        // Replace, never stack.
        if let Some(old) = self.heartbeat.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    pub fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Rewrite the device-mirrored quick-note slots: clear all four, then
    /// write the surviving notes in order. Serialized so the mirror never
    /// observes a partial list.
    pub async fn resync_quick_notes(&self, notes: &[QuickNote]) -> Result<(), CommandError> {
        let _guard = self.resync_lock.lock().await;
        self.require_both()?;
        for slot in 1..=4u8 {
            self.send_to_both(&protocol::quick_note_delete(slot), WriteMode::WithResponse)
                .await?;
        }
        for (i, note) in notes.iter().take(4).enumerate() {
            let slot = i as u8 + 1;
            let name = format!("Note {slot}");
            self.send_to_both(
                &protocol::quick_note_add(slot, &name, &note.text),
                WriteMode::WithResponse,
            )
            .await?;
        }
        Ok(())
    }
}

impl Drop for DualUnitCoordinator {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::{Notification, Opcode};
    use crate::infrastructure::bluetooth::testkit::FakeTransport;
    use crate::infrastructure::bluetooth::transport::TransportEvent;
    use tokio::sync::mpsc;

    /// Build a coordinator over two established fake sessions and pump
    /// their notification streams into the ack tracker, the way the
    /// service's event pump does in production.
    async fn ready_coordinator(
        left: Arc<FakeTransport>,
        right: Arc<FakeTransport>,
    ) -> Arc<DualUnitCoordinator> {
        let left_session = LinkSession::new(UnitRole::Left, left);
        let right_session = LinkSession::new(UnitRole::Right, right);
        let config = CoordinatorConfig::default();
        let left_rx = left_session.establish(config.init_ack_timeout).await.unwrap();
        let right_rx = right_session
            .establish(config.init_ack_timeout)
            .await
            .unwrap();

        let coordinator = Arc::new(DualUnitCoordinator::new(
            left_session,
            right_session,
            config,
        ));
        spawn_pump(&coordinator, UnitRole::Left, left_rx);
        spawn_pump(&coordinator, UnitRole::Right, right_rx);
        coordinator
    }

    fn spawn_pump(
        coordinator: &Arc<DualUnitCoordinator>,
        role: UnitRole,
        mut rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let coordinator = Arc::clone(coordinator);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    TransportEvent::Notification(data) => {
                        if let Notification::TextAck { ok: true } = Notification::decode(&data) {
                            coordinator.note_text_ack(role);
                        }
                    }
                    TransportEvent::Disconnected => coordinator.on_unit_disconnected(role),
                }
            }
        });
    }

    fn text_frame() -> Vec<u8> {
        protocol::TextChunk {
            seq: 0,
            total_chunks: 1,
            chunk_index: 0,
            status: 0x40,
            new_screen: true,
            current_page: 1,
            max_pages: 1,
            payload: b"hi".to_vec(),
        }
        .encode()
    }

    #[tokio::test(start_paused = true)]
    async fn acked_send_succeeds_when_both_units_ack() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        let coordinator = ready_coordinator(left.clone(), right.clone()).await;

        coordinator.send_acknowledged(&text_frame()).await.unwrap();
        assert_eq!(left.frames_with_opcode(Opcode::EvenAi as u8).len(), 1);
        assert_eq!(right.frames_with_opcode(Opcode::EvenAi as u8).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_unit_ack_never_satisfies_the_aggregate() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        right.set_ack_text(false); // right stays silent
        let coordinator = ready_coordinator(left, right).await;

        let err = coordinator.send_acknowledged(&text_frame()).await.unwrap_err();
        assert!(matches!(err, CommandError::AckTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_retry_makes_exactly_three_attempts() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        left.set_ack_text(false);
        right.set_ack_text(false);
        let coordinator = ready_coordinator(left.clone(), right.clone()).await;

        let err = coordinator
            .send_chunk_with_retry(&text_frame(), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::ExhaustedRetries { chunk: 0, attempts: 3 }
        ));
        assert_eq!(left.frames_with_opcode(Opcode::EvenAi as u8).len(), 3);
        assert_eq!(right.frames_with_opcode(Opcode::EvenAi as u8).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_unit_fails_fast_without_partial_send() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        let left_session = LinkSession::new(UnitRole::Left, left.clone());
        let right_session = LinkSession::new(UnitRole::Right, right);
        let config = CoordinatorConfig::default();
        let _rx = left_session.establish(config.init_ack_timeout).await.unwrap();
        // right never establishes
        let coordinator = DualUnitCoordinator::new(left_session, right_session, config);

        let err = coordinator
            .send_to_both(&text_frame(), WriteMode::WithoutResponse)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnitMissing(UnitRole::Right)));
        assert!(left.frames_with_opcode(Opcode::EvenAi as u8).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_mid_wait_fails_even_with_one_ack() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        right.set_ack_text(false); // right never acks; left acks promptly
        let coordinator = ready_coordinator(left, right.clone()).await;

        let send = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.send_acknowledged(&text_frame()).await })
        };
        // Let the send get in flight, then drop the right unit.
        tokio::time::sleep(Duration::from_millis(120)).await;
        right.drop_link();

        let result = send.await.unwrap();
        assert!(result.is_err());
        assert!(!coordinator.both_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn evenai_seq_wraps_at_256() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        let coordinator = ready_coordinator(left, right).await;

        for expected in 0..=255u8 {
            assert_eq!(coordinator.next_evenai_seq(), expected);
        }
        assert_eq!(coordinator.next_evenai_seq(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_reaches_both_units_with_running_counter() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        let coordinator = ready_coordinator(left.clone(), right.clone()).await;

        coordinator.start_heartbeat();
        tokio::time::sleep(Duration::from_secs(31)).await;
        coordinator.stop_heartbeat();

        let beats = left.frames_with_opcode(Opcode::Heartbeat as u8);
        assert!(beats.len() >= 2);
        assert_eq!(beats[0][3], 0);
        assert_eq!(beats[1][3], 1);
        assert!(!right.frames_with_opcode(Opcode::Heartbeat as u8).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quick_note_resync_clears_before_rewriting() {
        let left = Arc::new(FakeTransport::new("G1_L_1"));
        let right = Arc::new(FakeTransport::new("G1_R_1"));
        let coordinator = ready_coordinator(left.clone(), right).await;

        let notes = vec![
            QuickNote {
                id: 1,
                text: "milk".into(),
                created_at: std::time::SystemTime::UNIX_EPOCH,
            },
            QuickNote {
                id: 2,
                text: "eggs".into(),
                created_at: std::time::SystemTime::UNIX_EPOCH,
            },
        ];
        coordinator.resync_quick_notes(&notes).await.unwrap();

        let frames = left.frames_with_opcode(Opcode::QuickNote as u8);
        assert_eq!(frames.len(), 6); // 4 deletes + 2 adds
        // All four slots cleared first
        for (i, frame) in frames[..4].iter().enumerate() {
            assert_eq!(frame[1], i as u8 + 1);
            assert_eq!(&frame[2..4], &[0x00, 0x00]);
        }
        // Then the adds, in order
        assert_eq!(frames[4][1], 1);
        assert_eq!(frames[5][1], 2);
    }
}
