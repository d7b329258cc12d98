//! Session State Machine
//!
//! Tracks the AI-listen, voice and translation axes and turns device-origin
//! orders into actions for the service to execute. Pure state: no I/O, no
//! timers — the service owns the trigger-timeout task and feeds its expiry
//! back in through [`SessionStateMachine::on_trigger_timeout`].

use crate::domain::models::GlassesEvent;
use crate::infrastructure::bluetooth::protocol::DeviceOrder;

/// AI interaction mode.
///
/// ```text
/// Idle ──trigger order──▶ Requested ──mic ack──▶ MicOn
/// Requested / MicOn ──stop order, timeout, or nack──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiMode {
    #[default]
    Idle,
    /// The device asked for AI; the mic-on command is in flight.
    Requested,
    MicOn,
}

/// Whether the microphone stream is live. Listening can be driven by the
/// AI mode or by continuous-listening mode; the axes are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationState {
    #[default]
    Inactive,
    Active,
}

/// What the service must do in response to a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a mic on/off frame to the Right unit (the only one with a mic).
    SendMicControl(bool),
    /// (Re)arm the AI trigger timeout; always replaces a pending one.
    RestartTriggerTimeout,
    CancelTriggerTimeout,
    /// Send exit-all-functions to both units.
    SendExitAll,
    /// Advance the pending multi-page text delivery.
    ChangePage,
    /// The device finished displaying; drop the pending delivery.
    ClearPending,
    Emit(GlassesEvent),
}

#[derive(Debug, Default)]
pub struct SessionStateMachine {
    ai: AiMode,
    voice: VoiceState,
    translation: TranslationState,
    continuous_listening: bool,
}

impl SessionStateMachine {
    pub fn new(continuous_listening: bool) -> Self {
        Self {
            continuous_listening,
            ..Self::default()
        }
    }

    pub fn ai_mode(&self) -> AiMode {
        self.ai
    }

    pub fn voice_state(&self) -> VoiceState {
        self.voice
    }

    pub fn translation_state(&self) -> TranslationState {
        self.translation
    }

    pub fn is_listening(&self) -> bool {
        self.voice == VoiceState::Listening
    }

    pub fn set_continuous_listening(&mut self, enabled: bool) {
        self.continuous_listening = enabled;
    }

    /// React to a device-origin order. Orders are one-way events; the only
    /// responses are state updates and the returned actions.
    pub fn on_order(&mut self, order: DeviceOrder) -> Vec<Action> {
        match order {
            DeviceOrder::TriggerAi => {
                self.ai = AiMode::Requested;
                vec![Action::RestartTriggerTimeout, Action::SendMicControl(true)]
            }
            DeviceOrder::StopRecording => {
                let was_listening = self.is_listening();
                self.ai = AiMode::Idle;
                if !self.continuous_listening {
                    self.voice = VoiceState::Idle;
                }
                let mut actions = vec![Action::CancelTriggerTimeout];
                if was_listening && !self.is_listening() {
                    actions.push(Action::Emit(GlassesEvent::AiListening(false)));
                }
                actions
            }
            DeviceOrder::ChangePage => vec![Action::ChangePage],
            DeviceOrder::DisplayReady => vec![Action::ClearPending],
            DeviceOrder::ReadyForAi => vec![Action::Emit(GlassesEvent::ConnectionReady)],
            DeviceOrder::WearOn => vec![Action::Emit(GlassesEvent::WearChanged { worn: true })],
            DeviceOrder::WearOff => vec![Action::Emit(GlassesEvent::WearChanged { worn: false })],
            DeviceOrder::CaseOpen => vec![Action::Emit(GlassesEvent::CaseChanged { open: true })],
            DeviceOrder::CaseClose => vec![Action::Emit(GlassesEvent::CaseChanged { open: false })],
            DeviceOrder::SilentModeOn => {
                vec![Action::Emit(GlassesEvent::SilentModeChanged { enabled: true })]
            }
            DeviceOrder::SilentModeOff => {
                vec![Action::Emit(GlassesEvent::SilentModeChanged { enabled: false })]
            }
            DeviceOrder::DisplayOn => vec![Action::Emit(GlassesEvent::DisplayPower { on: true })],
            DeviceOrder::DisplayOff => vec![Action::Emit(GlassesEvent::DisplayPower { on: false })],
            // Progress reports, nothing to do
            DeviceOrder::DisplayBusy | DeviceOrder::DisplayUpdate | DeviceOrder::DisplayComplete => {
                Vec::new()
            }
        }
    }

    /// Mic command confirmation from the Right unit. The local state was
    /// adjusted optimistically; a nack rolls it back.
    pub fn on_mic_ack(&mut self, ok: bool) -> Vec<Action> {
        match (self.ai, ok) {
            (AiMode::Requested, true) => {
                self.ai = AiMode::MicOn;
                self.voice = VoiceState::Listening;
                vec![Action::Emit(GlassesEvent::AiListening(true))]
            }
            (AiMode::Requested, false) => {
                self.ai = AiMode::Idle;
                vec![Action::CancelTriggerTimeout]
            }
            _ => Vec::new(),
        }
    }

    /// The AI trigger window elapsed without a stop order. Force-close the
    /// microphone and leave all functions — unless continuous listening is
    /// active, in which case the timeout is suppressed entirely.
    pub fn on_trigger_timeout(&mut self) -> Vec<Action> {
        if self.continuous_listening {
            return Vec::new();
        }
        let was_listening = self.is_listening();
        self.ai = AiMode::Idle;
        self.voice = VoiceState::Idle;
        let mut actions = vec![Action::SendMicControl(false), Action::SendExitAll];
        if was_listening {
            actions.push(Action::Emit(GlassesEvent::AiListening(false)));
        }
        actions
    }

    /// Local request to start voice capture (continuous-listening path).
    pub fn start_voice(&mut self) -> Vec<Action> {
        self.voice = VoiceState::Listening;
        vec![
            Action::SendMicControl(true),
            Action::Emit(GlassesEvent::AiListening(true)),
        ]
    }

    /// Local request to stop voice capture.
    pub fn stop_voice(&mut self) -> Vec<Action> {
        let was_listening = self.is_listening();
        self.ai = AiMode::Idle;
        self.voice = VoiceState::Idle;
        let mut actions = vec![Action::SendMicControl(false), Action::CancelTriggerTimeout];
        if was_listening {
            actions.push(Action::Emit(GlassesEvent::AiListening(false)));
        }
        actions
    }

    pub fn start_translation(&mut self) {
        self.translation = TranslationState::Active;
    }

    pub fn stop_translation(&mut self) {
        self.translation = TranslationState::Inactive;
    }

    /// Exit-all-functions: every axis reverts to idle.
    pub fn reset(&mut self) -> Vec<Action> {
        let was_listening = self.is_listening();
        self.ai = AiMode::Idle;
        self.voice = VoiceState::Idle;
        self.translation = TranslationState::Inactive;
        let mut actions = vec![Action::CancelTriggerTimeout, Action::ClearPending];
        if was_listening {
            actions.push(Action::Emit(GlassesEvent::AiListening(false)));
        }
        actions
    }
}
