// SPDX-License-Identifier: MIT
//
// Input parser — raw terminal bytes to structured input codes.
//
// Handles the full grammar the device pipeline enables:
//
// - Plain keys (printable ASCII, Enter, Tab, Backspace)
// - Legacy CSI sequences (arrows, Home/End, tilde-terminated editing and
//   function keys, including the Tera Term style `ESC[11~`..`ESC[14~`)
// - SS3 sequences (`ESC O` + letter, F1–F4 and navigation)
// - SGR 1006 mouse reports (press / drag / release / wheel)
// - DSR cursor-position replies (`ESC[row;colR`)
// - Focus in/out (`ESC[I` / `ESC[O`), consumed as non-events
//
// # Streaming contract
//
// The parser consumes the longest complete prefix of the buffer and
// returns `(code, bytes_consumed)`. `consumed == 0` means *incomplete* —
// an escape sequence is still in flight and more bytes are needed. The
// pipeline resolves the lone-ESC ambiguity by timeout: if the buffer is
// exactly `[ESC]` when the select deadline fires, that ESC was a real
// Escape keypress (§ device loop).
//
// Payload-bearing codes (`Mouse`, `CursorPos`) stash their data in the
// parser; `Device::inspect` pairs a code with the latest payload. Number
// parsing works directly on `&[u8]` — no intermediate allocation.

use crate::screen::{Coord, TermSize};

// ─── Input Codes ────────────────────────────────────────────────────────────

/// Everything the input pipeline can hand to a caller.
///
/// A closed code space: meta signals, event markers (whose payloads are
/// retrieved via `Device::inspect`), and the keyboard keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCode {
    // ── Meta signals ────────────────────────────────────────────
    /// Timeout, or input that parsed to nothing.
    None,
    /// The pipeline was interrupted (`Device::force_pause`, signals).
    Interrupt,
    /// Another thread owns the input pipeline.
    Busy,

    // ── Event markers ───────────────────────────────────────────
    /// A mouse event; payload via `Device::inspect` / `Device::mouse_state`.
    Mouse,
    /// The terminal was resized (SIGWINCH); payload is the new size.
    Resize,
    /// A cursor-position report arrived (internal rendezvous traffic).
    CursorPos,

    // ── Keys ────────────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Esc,
    ArrowUp,
    ArrowDown,
    ArrowRight,
    ArrowLeft,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function keys F1–F12.
    F(u8),
    /// A character key, byte-for-byte as read from the terminal.
    Char(char),
}

impl InputCode {
    /// The digit value of `Char('0')..=Char('9')`, `None` otherwise.
    #[must_use]
    pub const fn to_digit(self) -> Option<u32> {
        match self {
            Self::Char(c @ '0'..='9') => Some(c as u32 - '0' as u32),
            _ => None,
        }
    }

    /// Stable display name: `"ENTER"`, `"ARROW_UP"`, `"F5"`, `"a"`, …
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::None => "NONE".into(),
            Self::Interrupt => "INTERRUPT".into(),
            Self::Busy => "BUSY".into(),
            Self::Mouse => "MOUSE_EVENT".into(),
            Self::Resize => "RESIZE_EVENT".into(),
            Self::CursorPos => "CURSOR_EVENT".into(),
            Self::Enter => "ENTER".into(),
            Self::Tab => "TAB".into(),
            Self::Backspace => "BACKSPACE".into(),
            Self::Esc => "ESC".into(),
            Self::ArrowUp => "ARROW_UP".into(),
            Self::ArrowDown => "ARROW_DOWN".into(),
            Self::ArrowRight => "ARROW_RIGHT".into(),
            Self::ArrowLeft => "ARROW_LEFT".into(),
            Self::Insert => "INSERT".into(),
            Self::Delete => "DELETE".into(),
            Self::Home => "HOME".into(),
            Self::End => "END".into(),
            Self::PageUp => "PAGE_UP".into(),
            Self::PageDown => "PAGE_DOWN".into(),
            Self::F(n) => format!("F{n}"),
            Self::Char(' ') => "SPACE".into(),
            Self::Char(c) if c.is_ascii_graphic() => c.to_string(),
            Self::Char(c) => format!("UNKNOWN_KEY( {} )", c as u32),
        }
    }
}

// ─── Mouse Model ────────────────────────────────────────────────────────────

/// Which physical button an SGR report named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    #[default]
    Unknown,
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseAction {
    Press,
    Drag,
    Release,
    WheelUp,
    WheelDown,
    #[default]
    Unknown,
}

/// Decoded SGR mouse report. Coordinates are 1-based, exactly as the
/// terminal sent them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseState {
    /// Column, 1-based.
    pub x: u16,
    /// Row, 1-based.
    pub y: u16,
    pub button: MouseButton,
    pub action: MouseAction,
}

// ─── Event ──────────────────────────────────────────────────────────────────

/// An input code paired with its payload — the result of
/// `Device::inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Timeout or empty input.
    None,
    /// The pipeline was paused.
    Interrupt,
    /// The pipeline was owned by another thread.
    Busy,
    /// A keyboard key.
    Key(InputCode),
    /// A mouse action with position.
    Mouse(MouseState),
    /// The terminal changed size.
    Resize(TermSize),
    /// Reply to a cursor-position request, 0-based.
    CursorPos(Coord),
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Streaming input parser with payload side-storage.
///
/// Feed it the pipeline's byte buffer; it reports one code and how many
/// bytes that code consumed. Zero consumed bytes signal an incomplete
/// escape sequence.
#[derive(Debug, Default)]
pub struct Parser {
    last_mouse: MouseState,
    last_cursor: Coord,
}

impl Parser {
    /// Create a parser with empty payload slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_mouse: MouseState {
                x: 0,
                y: 0,
                button: MouseButton::Unknown,
                action: MouseAction::Unknown,
            },
            last_cursor: Coord { x: 0, y: 0 },
        }
    }

    /// The most recently parsed mouse report.
    #[inline]
    #[must_use]
    pub const fn last_mouse(&self) -> MouseState {
        self.last_mouse
    }

    /// The most recently parsed cursor-position reply, 0-based.
    #[inline]
    #[must_use]
    pub const fn last_cursor(&self) -> Coord {
        self.last_cursor
    }

    /// Parse one code from the front of `buf`.
    ///
    /// Returns `(code, bytes_consumed)`; `(None, 0)` means the buffer
    /// holds an incomplete sequence and needs more bytes. Every complete
    /// input consumes at least one byte, so draining callers always make
    /// progress.
    pub fn parse(&mut self, buf: &[u8]) -> (InputCode, usize) {
        let Some(&first) = buf.first() else {
            return (InputCode::None, 0);
        };

        match first {
            0x1B => self.parse_escape(buf),
            0x08 | 0x7F => (InputCode::Backspace, 1),
            0x09 => (InputCode::Tab, 1),
            0x0A | 0x0D => (InputCode::Enter, 1),
            // Everything else is a character key. Control bytes and UTF-8
            // fragments pass through byte-wise, mirroring the raw stream.
            b => (InputCode::Char(b as char), 1),
        }
    }

    // ── ESC-prefixed sequences ──────────────────────────────────────────

    fn parse_escape(&mut self, buf: &[u8]) -> (InputCode, usize) {
        // A lone ESC is ambiguous: either the Escape key or the start of
        // a sequence. Report incomplete; the pipeline's timeout decides.
        if buf.len() < 2 {
            return (InputCode::None, 0);
        }

        match buf[1] {
            b'[' => self.parse_csi(buf),
            b'O' => parse_ss3(buf),
            // Unknown follow-up byte: the ESC stands alone.
            _ => (InputCode::Esc, 1),
        }
    }

    fn parse_csi(&mut self, buf: &[u8]) -> (InputCode, usize) {
        if buf.len() < 3 {
            return (InputCode::None, 0);
        }

        match buf[2] {
            // SGR mouse: ESC [ <
            b'<' => self.parse_sgr_mouse(buf),

            // Focus in/out: consumed, reported as a non-event.
            b'I' | b'O' => (InputCode::None, 3),

            // Parameterised form: scan to the final byte.
            b'0'..=b'9' => self.parse_csi_number(buf),

            b'A' => (InputCode::ArrowUp, 3),
            b'B' => (InputCode::ArrowDown, 3),
            b'C' => (InputCode::ArrowRight, 3),
            b'D' => (InputCode::ArrowLeft, 3),
            b'H' => (InputCode::Home, 3),
            b'F' => (InputCode::End, 3),

            // Unrecognised introducer: the ESC stands alone and the rest
            // of the buffer re-parses as ordinary bytes.
            _ => (InputCode::Esc, 1),
        }
    }

    /// `ESC [ <digits…> final` — function keys, editing keys, DSR replies.
    fn parse_csi_number(&mut self, buf: &[u8]) -> (InputCode, usize) {
        // Find the terminator (0x40..=0x7E).
        let Some(t_pos) = (2..buf.len()).find(|&i| (0x40..=0x7E).contains(&buf[i])) else {
            return (InputCode::None, 0);
        };

        let seq_len = t_pos + 1;
        let params = &buf[2..t_pos];

        match buf[t_pos] {
            // Cursor Position Report: ESC [ row ; col R → 0-based coord.
            b'R' => {
                let (row, rest) = parse_u16(params);
                let Some(rest) = rest.strip_prefix(b";") else {
                    return (InputCode::None, seq_len);
                };
                let (col, _) = parse_u16(rest);

                self.last_cursor = Coord {
                    x: i32::from(col) - 1,
                    y: i32::from(row) - 1,
                };
                (InputCode::CursorPos, seq_len)
            }

            // Editing / function keys: ESC [ n [;mods] ~
            b'~' => {
                let (n, _) = parse_u16(params);
                let code = match n {
                    1 | 7 => InputCode::Home,
                    2 => InputCode::Insert,
                    3 => InputCode::Delete,
                    4 | 8 => InputCode::End,
                    5 => InputCode::PageUp,
                    6 => InputCode::PageDown,
                    // Tera Term sends F1–F4 in the numeric form too.
                    11..=15 => InputCode::F(u8::try_from(n - 10).unwrap_or(0)),
                    17..=21 => InputCode::F(u8::try_from(n - 11).unwrap_or(0)),
                    23 | 24 => InputCode::F(u8::try_from(n - 12).unwrap_or(0)),
                    _ => InputCode::None,
                };
                (code, seq_len)
            }

            // Anything else (modifier-only reports, private sequences):
            // consumed and ignored.
            _ => (InputCode::None, seq_len),
        }
    }

    /// SGR 1006 mouse: `ESC [ < B ; X ; Y (M|m)`.
    fn parse_sgr_mouse(&mut self, buf: &[u8]) -> (InputCode, usize) {
        let Some(m_pos) = (3..buf.len()).find(|&i| buf[i] == b'M' || buf[i] == b'm') else {
            return (InputCode::None, 0);
        };

        let seq_len = m_pos + 1;
        let is_release = buf[m_pos] == b'm';

        let (raw_btn, rest) = parse_u16(&buf[3..m_pos]);
        let rest = rest.strip_prefix(b";").unwrap_or(rest);
        let (x, rest) = parse_u16(rest);
        let rest = rest.strip_prefix(b";").unwrap_or(rest);
        let (y, _) = parse_u16(rest);

        // Coordinates stay 1-based, exactly as received.
        let (button, action) = decode_mouse(raw_btn, is_release);
        self.last_mouse = MouseState { x, y, button, action };

        (InputCode::Mouse, seq_len)
    }
}

/// SS3: `ESC O` + one letter (F1–F4 and navigation on some terminals).
fn parse_ss3(buf: &[u8]) -> (InputCode, usize) {
    if buf.len() < 3 {
        return (InputCode::None, 0);
    }

    match buf[2] {
        b'P' => (InputCode::F(1), 3),
        b'Q' => (InputCode::F(2), 3),
        b'R' => (InputCode::F(3), 3),
        b'S' => (InputCode::F(4), 3),
        b'H' => (InputCode::Home, 3),
        b'F' => (InputCode::End, 3),
        // Not an SS3 we know: the ESC stands alone.
        _ => (InputCode::Esc, 1),
    }
}

/// Decode the SGR button field plus terminator into button + action.
fn decode_mouse(raw_btn: u16, is_release: bool) -> (MouseButton, MouseAction) {
    // Wheel events set bit 6 and have no press/release cycle.
    if raw_btn >= 64 {
        let action = match raw_btn {
            64 => MouseAction::WheelUp,
            65 => MouseAction::WheelDown,
            _ => MouseAction::Unknown,
        };
        return (MouseButton::Unknown, action);
    }

    let (btn_bits, action) = if is_release {
        (raw_btn, MouseAction::Release)
    } else if raw_btn & 32 != 0 {
        // Bit 5: motion with a button held.
        (raw_btn - 32, MouseAction::Drag)
    } else {
        (raw_btn, MouseAction::Press)
    };

    let button = match btn_bits & 3 {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::Unknown,
    };

    (button, action)
}

/// Parse a decimal from the front of `bytes`: `(value, remainder)`.
fn parse_u16(bytes: &[u8]) -> (u16, &[u8]) {
    let mut val: u16 = 0;
    let mut pos = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        val = val
            .saturating_mul(10)
            .saturating_add(u16::from(bytes[pos] - b'0'));
        pos += 1;
    }
    (val, &bytes[pos..])
}

// ─── Tests ──────────────────────────────────────────────────────────────────
