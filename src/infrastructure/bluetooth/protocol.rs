//! G1 Glasses Wire Protocol
//!
//! Pure encode/decode between typed command values and the flat byte frames
//! the glasses speak. Frames carry a single opcode byte followed by
//! opcode-specific fields at fixed offsets; there is no self-describing
//! schema and no uniform length prefix.
//!
//! Nothing in this module performs I/O or holds state.

/// Nordic UART service exposed by each unit.
pub const UART_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Write characteristic (host → device).
pub const UART_TX_CHAR_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Notify characteristic (device → host).
pub const UART_RX_CHAR_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Largest text payload per display chunk. Pages longer than this are split
/// into multiple chunks sharing one sequence number per chunk.
pub const MAX_CHUNK_PAYLOAD: usize = 191;

/// Display line budget in characters.
pub const DISPLAY_WIDTH: usize = 40;

/// Lines shown per page.
pub const LINES_PER_PAGE: usize = 4;

/// Acknowledgement byte in command-response notifications.
pub const RESPONSE_ACK: u8 = 0xC9;

/// Failure byte in command-response notifications.
pub const RESPONSE_NACK: u8 = 0xCA;

/// Command opcodes (first byte of every frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Brightness = 0x01,
    SilentMode = 0x03,
    DashboardClock = 0x06,
    TranslateTranslated = 0x0D,
    MicControl = 0x0E,
    TranslateOriginal = 0x0F,
    TranslateConfig = 0x1C,
    QuickNote = 0x1E,
    ExitAllFunctions = 0x18,
    Heartbeat = 0x25,
    DashboardConfig = 0x26,
    BatteryStatus = 0x2D,
    TranslateSetup = 0x39,
    Init = 0x4D,
    EvenAi = 0x4E,
    TranslateStart = 0x50,
    TransferMicData = 0xF1,
    DeviceOrder = 0xF5,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::Brightness,
            0x03 => Self::SilentMode,
            0x06 => Self::DashboardClock,
            0x0D => Self::TranslateTranslated,
            0x0E => Self::MicControl,
            0x0F => Self::TranslateOriginal,
            0x1C => Self::TranslateConfig,
            0x1E => Self::QuickNote,
            0x18 => Self::ExitAllFunctions,
            0x25 => Self::Heartbeat,
            0x26 => Self::DashboardConfig,
            0x2D => Self::BatteryStatus,
            0x39 => Self::TranslateSetup,
            0x4D => Self::Init,
            0x4E => Self::EvenAi,
            0x50 => Self::TranslateStart,
            0xF1 => Self::TransferMicData,
            0xF5 => Self::DeviceOrder,
            _ => return None,
        })
    }
}

/// Device-originated event codes carried in `[0xF5, order]` notifications.
///
/// Each is a one-way report; none requires an application response beyond a
/// state update and its derived actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceOrder {
    DisplayReady = 0x00,
    ChangePage = 0x01,
    DisplayOn = 0x02,
    DisplayOff = 0x03,
    SilentModeOn = 0x04,
    SilentModeOff = 0x05,
    WearOn = 0x06,
    WearOff = 0x07,
    CaseOpen = 0x08,
    DisplayComplete = 0x09,
    CaseClose = 0x0B,
    ReadyForAi = 0x0E,
    DisplayUpdate = 0x0F,
    DisplayBusy = 0x11,
    TriggerAi = 0x17,
    StopRecording = 0x18,
}

impl DeviceOrder {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::DisplayReady,
            0x01 => Self::ChangePage,
            0x02 => Self::DisplayOn,
            0x03 => Self::DisplayOff,
            0x04 => Self::SilentModeOn,
            0x05 => Self::SilentModeOff,
            0x06 => Self::WearOn,
            0x07 => Self::WearOff,
            0x08 => Self::CaseOpen,
            0x09 => Self::DisplayComplete,
            0x0B => Self::CaseClose,
            0x0E => Self::ReadyForAi,
            0x0F => Self::DisplayUpdate,
            0x11 => Self::DisplayBusy,
            0x17 => Self::TriggerAi,
            0x18 => Self::StopRecording,
            _ => return None,
        })
    }
}

/// High nibble of the display-status byte in a text chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisplayStatus {
    NormalText = 0x30,
    FinalText = 0x40,
    ManualPage = 0x50,
    ErrorText = 0x60,
    SimpleText = 0x70,
}

/// Language codes for translation frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TranslateLanguage {
    Chinese = 0x01,
    English = 0x02,
    Japanese = 0x03,
    Korean = 0x04,
    French = 0x05,
    German = 0x06,
    Spanish = 0x07,
    Russian = 0x08,
    Dutch = 0x09,
    Norwegian = 0x0A,
    Danish = 0x0B,
    Swedish = 0x0C,
    Finnish = 0x0D,
    Italian = 0x0E,
    Arabic = 0x0F,
    Hindi = 0x10,
    Bengali = 0x11,
    Cantonese = 0x12,
}

/// One display chunk of an EvenAI text transfer.
///
/// # Wire layout (header 9 bytes, then payload)
///
/// ```text
/// [0] : 0x4E
/// [1] : sequence number (shared by the left and right copy of a chunk)
/// [2] : total chunks in this page
/// [3] : chunk index within this page
/// [4] : display status | new-screen flag (bit 0)
/// [5] : reserved (0)
/// [6] : reserved (0)
/// [7] : current page, 1-based
/// [8] : max pages
/// [9…]: UTF-8 payload, at most MAX_CHUNK_PAYLOAD bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub seq: u8,
    pub total_chunks: u8,
    pub chunk_index: u8,
    pub status: u8,
    pub new_screen: bool,
    pub current_page: u8,
    pub max_pages: u8,
    pub payload: Vec<u8>,
}

impl TextChunk {
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(9 + self.payload.len());
        frame.push(Opcode::EvenAi as u8);
        frame.push(self.seq);
        frame.push(self.total_chunks);
        frame.push(self.chunk_index);
        frame.push(self.status | if self.new_screen { 0x01 } else { 0x00 });
        frame.push(0x00);
        frame.push(0x00);
        frame.push(self.current_page);
        frame.push(self.max_pages);
        frame.extend_from_slice(&self.payload);
        frame
    }

    /// Decode an outbound chunk frame. Returns `None` when the header is
    /// shorter than 9 bytes or the opcode is not EvenAI.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() < 9 || frame[0] != Opcode::EvenAi as u8 {
            return None;
        }
        Some(Self {
            seq: frame[1],
            total_chunks: frame[2],
            chunk_index: frame[3],
            status: frame[4] & 0xF0,
            new_screen: frame[4] & 0x01 != 0,
            current_page: frame[7],
            max_pages: frame[8],
            payload: frame[9..].to_vec(),
        })
    }
}

/// `[0x4D, 0x01]` — init handshake, acknowledged by the device before the
/// session may be declared ready.
pub fn init() -> Vec<u8> {
    vec![Opcode::Init as u8, 0x01]
}

/// `[0x25, len_lo, len_hi, seq, 0x04, seq]` — liveness beacon carrying a
/// running one-byte counter. Fire-and-forget, never acknowledged.
pub fn heartbeat(seq: u8) -> Vec<u8> {
    let length: u16 = 6;
    vec![
        Opcode::Heartbeat as u8,
        (length & 0xFF) as u8,
        (length >> 8) as u8,
        seq,
        0x04,
        seq,
    ]
}

/// `[0x0E, 0x01/0x00]` — open or close the Right unit's microphone.
pub fn mic_control(on: bool) -> Vec<u8> {
    vec![Opcode::MicControl as u8, if on { 0x01 } else { 0x00 }]
}

/// `[0x18]` — leave every active function (text, AI, translation).
pub fn exit_all_functions() -> Vec<u8> {
    vec![Opcode::ExitAllFunctions as u8]
}

/// `[0x01, level, auto]` with the level clamped to the panel's 0–63 range.
pub fn brightness(level: u8, auto: bool) -> Vec<u8> {
    vec![
        Opcode::Brightness as u8,
        level.min(63),
        if auto { 0x01 } else { 0x00 },
    ]
}

/// `[0x03, 0x0C/0x0A, 0x00]` — silent mode on/off.
pub fn silent_mode(enabled: bool) -> Vec<u8> {
    vec![
        Opcode::SilentMode as u8,
        if enabled { 0x0C } else { 0x0A },
        0x00,
    ]
}

/// `[0x1E, slot, name_len, name…, text_len, text…]`.
///
/// Name and text are truncated at 255 bytes on a UTF-8 character boundary.
pub fn quick_note_add(slot: u8, name: &str, text: &str) -> Vec<u8> {
    let name = truncate_utf8(name, u8::MAX as usize);
    let text = truncate_utf8(text, u8::MAX as usize);
    let mut frame = Vec::with_capacity(4 + name.len() + text.len());
    frame.push(Opcode::QuickNote as u8);
    frame.push(slot);
    frame.push(name.len() as u8);
    frame.extend_from_slice(name.as_bytes());
    frame.push(text.len() as u8);
    frame.extend_from_slice(text.as_bytes());
    frame
}

/// `[0x1E, slot, 0x00, 0x00]` — an empty name and text clears the slot.
pub fn quick_note_delete(slot: u8) -> Vec<u8> {
    vec![Opcode::QuickNote as u8, slot, 0x00, 0x00]
}

/// `[0x26, 0x06, mode]`.
pub fn dashboard_mode(mode: u8) -> Vec<u8> {
    vec![Opcode::DashboardConfig as u8, 0x06, mode]
}

/// `[0x26, 0x02, height]`, height level clamped to 0–8.
pub fn dashboard_position(height: u8) -> Vec<u8> {
    vec![Opcode::DashboardConfig as u8, 0x02, height.min(8)]
}

/// `[0x26, 0x03, metres]`, clamped to 1–5 m.
pub fn dashboard_distance(metres: u8) -> Vec<u8> {
    vec![Opcode::DashboardConfig as u8, 0x03, metres.clamp(1, 5)]
}

/// `[0x26, 0x04, degrees]`, clamped to 0–60°.
pub fn dashboard_tilt(degrees: u8) -> Vec<u8> {
    vec![Opcode::DashboardConfig as u8, 0x04, degrees.min(60)]
}

/// Dashboard time/weather refresh.
///
/// ```text
/// [0]   : 0x06
/// [1-4] : unix epoch seconds (u32 little-endian)
/// [5]   : weather icon code
/// [6]   : temperature in °C (two's complement)
/// [7]   : 0x01 when temperatures are shown in fahrenheit
/// [8]   : 0x01 when the clock uses 24-hour format
/// ```
pub fn dashboard_clock(
    epoch_secs: u32,
    weather_icon: u8,
    temperature_c: i8,
    use_fahrenheit: bool,
    use_24_hour: bool,
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9);
    frame.push(Opcode::DashboardClock as u8);
    frame.extend_from_slice(&epoch_secs.to_le_bytes());
    frame.push(weather_icon);
    frame.push(temperature_c as u8);
    frame.push(if use_fahrenheit { 0x01 } else { 0x00 });
    frame.push(if use_24_hour { 0x01 } else { 0x00 });
    frame
}

/// `[0x39, source, target]`.
pub fn translate_setup(source: TranslateLanguage, target: TranslateLanguage) -> Vec<u8> {
    vec![Opcode::TranslateSetup as u8, source as u8, target as u8]
}

/// `[0x50]`.
pub fn translate_start() -> Vec<u8> {
    vec![Opcode::TranslateStart as u8]
}

/// `[0x1C, 0x01]` — switch the glasses into translation mode.
pub fn translate_config() -> Vec<u8> {
    vec![Opcode::TranslateConfig as u8, 0x01]
}

/// `[0x0F, seq] + utf8` — source-language caption line.
pub fn translate_original(seq: u8, text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + text.len());
    frame.push(Opcode::TranslateOriginal as u8);
    frame.push(seq);
    frame.extend_from_slice(text.as_bytes());
    frame
}

/// `[0x0D, seq] + utf8` — target-language caption line.
pub fn translate_translated(seq: u8, text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + text.len());
    frame.push(Opcode::TranslateTranslated as u8);
    frame.push(seq);
    frame.extend_from_slice(text.as_bytes());
    frame
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// A decoded inbound notification.
///
/// Decoding is total: unknown opcodes and truncated known frames come back
/// as [`Notification::Unknown`] so the caller can log and move on. An
/// unexpected frame is never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `[0x4D, …]` — the init command was accepted.
    InitAck,
    /// `[0x0E, 0xC9/0xCA]` — mic open/close confirmation.
    MicAck { ok: bool },
    /// `[0x4E, 0xC9/0xCA]` — per-chunk display acknowledgement.
    TextAck { ok: bool },
    /// `[0xF5, order]`.
    Order(DeviceOrder),
    /// `[0xF1, seq, audio…]` — raw audio with the 2-byte header stripped.
    MicData(Vec<u8>),
    /// `[0x2D, percent, flags, mv_lo, mv_hi]`.
    Battery {
        percent: u8,
        charging: bool,
        millivolts: u16,
    },
    /// Anything else, preserved verbatim for the caller.
    Unknown { opcode: u8, payload: Vec<u8> },
}

impl Notification {
    /// Parse a notification payload from the RX characteristic.
    ///
    /// # Frame layouts
    ///
    /// ```text
    /// InitAck  : [0x4D, …]
    /// MicAck   : [0x0E, response]
    /// TextAck  : [0x4E, response, …]
    /// Order    : [0xF5, order_code]
    /// MicData  : [0xF1, seq, pcm…]           (payload at offset 2)
    /// Battery  : [0x2D, percent, flags, mv]  (mv = little-endian mV/10)
    /// ```
    pub fn decode(data: &[u8]) -> Notification {
        let Some(&opcode) = data.first() else {
            return Notification::Unknown {
                opcode: 0,
                payload: Vec::new(),
            };
        };

        match Opcode::from_u8(opcode) {
            Some(Opcode::Init) => Notification::InitAck,
            Some(Opcode::MicControl) if data.len() >= 2 => Notification::MicAck {
                ok: data[1] == RESPONSE_ACK,
            },
            Some(Opcode::EvenAi) if data.len() >= 2 => Notification::TextAck {
                ok: data[1] == RESPONSE_ACK,
            },
            Some(Opcode::DeviceOrder) if data.len() >= 2 => match DeviceOrder::from_u8(data[1]) {
                Some(order) => Notification::Order(order),
                None => Notification::Unknown {
                    opcode,
                    payload: data[1..].to_vec(),
                },
            },
            Some(Opcode::TransferMicData) if data.len() > 2 => {
                Notification::MicData(data[2..].to_vec())
            }
            Some(Opcode::BatteryStatus) if data.len() >= 5 => Notification::Battery {
                percent: data[1].min(100),
                charging: data[2] & 0x01 != 0,
                millivolts: u16::from_le_bytes([data[3], data[4]]).saturating_mul(10),
            },
            _ => Notification::Unknown {
                opcode,
                payload: data.get(1..).unwrap_or_default().to_vec(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_chunk_round_trip_preserves_opcode_and_payload() {
        let chunk = TextChunk {
            seq: 7,
            total_chunks: 3,
            chunk_index: 1,
            status: DisplayStatus::ManualPage as u8,
            new_screen: true,
            current_page: 2,
            max_pages: 5,
            payload: b"hello world".to_vec(),
        };
        let frame = chunk.encode();
        assert_eq!(frame[0], 0x4E);
        assert_eq!(frame[4], 0x51); // manual page | new screen
        assert_eq!(TextChunk::decode(&frame), Some(chunk));
    }

    #[test]
    fn text_chunk_decode_rejects_short_frames() {
        assert_eq!(TextChunk::decode(&[0x4E, 1, 1]), None);
        assert_eq!(TextChunk::decode(&[0x25, 0, 0, 0, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn heartbeat_carries_running_counter_twice() {
        let frame = heartbeat(0x2A);
        assert_eq!(frame, vec![0x25, 0x06, 0x00, 0x2A, 0x04, 0x2A]);
    }

    #[test]
    fn mic_and_init_frames() {
        assert_eq!(mic_control(true), vec![0x0E, 0x01]);
        assert_eq!(mic_control(false), vec![0x0E, 0x00]);
        assert_eq!(init(), vec![0x4D, 0x01]);
        assert_eq!(exit_all_functions(), vec![0x18]);
    }

    #[test]
    fn brightness_is_clamped_to_panel_range() {
        assert_eq!(brightness(200, false), vec![0x01, 63, 0x00]);
        assert_eq!(brightness(10, true), vec![0x01, 10, 0x01]);
    }

    #[test]
    fn dashboard_values_are_clamped() {
        assert_eq!(dashboard_position(12), vec![0x26, 0x02, 8]);
        assert_eq!(dashboard_distance(0), vec![0x26, 0x03, 1]);
        assert_eq!(dashboard_tilt(90), vec![0x26, 0x04, 60]);
        assert_eq!(dashboard_mode(2), vec![0x26, 0x06, 2]);
    }

    #[test]
    fn dashboard_clock_layout() {
        let frame = dashboard_clock(0x0102_0304, 5, -7, false, true);
        assert_eq!(
            frame,
            vec![0x06, 0x04, 0x03, 0x02, 0x01, 5, (-7i8) as u8, 0x00, 0x01]
        );
    }

    #[test]
    fn quick_note_frames() {
        let frame = quick_note_add(2, "N1", "milk");
        assert_eq!(frame, vec![0x1E, 2, 2, b'N', b'1', 4, b'm', b'i', b'l', b'k']);
        assert_eq!(quick_note_delete(3), vec![0x1E, 3, 0x00, 0x00]);
    }

    #[test]
    fn translate_frames() {
        assert_eq!(
            translate_setup(TranslateLanguage::English, TranslateLanguage::Japanese),
            vec![0x39, 0x02, 0x03]
        );
        assert_eq!(translate_start(), vec![0x50]);
        assert_eq!(translate_config(), vec![0x1C, 0x01]);
        assert_eq!(translate_original(9, "hi"), vec![0x0F, 9, b'h', b'i']);
        assert_eq!(translate_translated(9, "こ")[..2], [0x0D, 9]);
    }

    #[test]
    fn decode_text_ack_both_ways() {
        assert_eq!(
            Notification::decode(&[0x4E, RESPONSE_ACK]),
            Notification::TextAck { ok: true }
        );
        assert_eq!(
            Notification::decode(&[0x4E, RESPONSE_NACK]),
            Notification::TextAck { ok: false }
        );
    }

    #[test]
    fn decode_battery_scales_millivolts() {
        let n = Notification::decode(&[0x2D, 87, 0x01, 0x90, 0x01]);
        assert_eq!(
            n,
            Notification::Battery {
                percent: 87,
                charging: true,
                millivolts: 4000
            }
        );
    }

    #[test]
    fn decode_mic_data_strips_two_byte_header() {
        let n = Notification::decode(&[0xF1, 0x05, 1, 2, 3]);
        assert_eq!(n, Notification::MicData(vec![1, 2, 3]));
    }

    #[test]
    fn unknown_opcode_is_not_an_error() {
        let n = Notification::decode(&[0x7B, 0xAA, 0xBB]);
        assert_eq!(
            n,
            Notification::Unknown {
                opcode: 0x7B,
                payload: vec![0xAA, 0xBB]
            }
        );
    }

    #[test]
    fn truncated_known_frame_decodes_as_unknown() {
        // A device order with the code byte missing
        let n = Notification::decode(&[0xF5]);
        assert!(matches!(n, Notification::Unknown { opcode: 0xF5, .. }));
        // Battery frame cut short
        let n = Notification::decode(&[0x2D, 50]);
        assert!(matches!(n, Notification::Unknown { opcode: 0x2D, .. }));
    }

    #[test]
    fn empty_notification_decodes_as_unknown() {
        assert!(matches!(
            Notification::decode(&[]),
            Notification::Unknown { .. }
        ));
    }

    #[test]
    fn device_orders_round_trip() {
        for code in [0x00, 0x01, 0x06, 0x07, 0x08, 0x0B, 0x17, 0x18] {
            let order = DeviceOrder::from_u8(code).unwrap();
            assert_eq!(order as u8, code);
        }
        assert_eq!(DeviceOrder::from_u8(0x7F), None);
    }
}
