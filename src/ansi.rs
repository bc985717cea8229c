// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit — that's the flush writer's job. This
// module just knows the byte-level encoding of every terminal command the
// crate uses.
//
// Cursor positions are 0-indexed in the API and converted to 1-indexed on
// the wire (the ANSI standard is 1-based).
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (a Vec).

use std::io::{self, Write};

use crate::color::Color;

// ─── Cursor ─────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` with CUP (`ESC[row;colH`), 0-indexed input.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Move the cursor up `n` rows (`ESC[nA`).
#[inline]
pub fn cursor_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}A")
}

/// Move the cursor down `n` rows (`ESC[nB`).
#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}B")
}

/// Move the cursor right `n` columns (`ESC[nC`).
#[inline]
pub fn cursor_right(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}C")
}

/// Move the cursor left `n` columns (`ESC[nD`).
#[inline]
pub fn cursor_left(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}D")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ─────────────────────────────────────────────────────────────────

/// Clear the screen and home the cursor (`ESC[2J ESC[1;1H`).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J\x1b[1;1H")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Color ──────────────────────────────────────────────────────────────────

/// Set the foreground color. [`Color::None`] writes nothing.
pub fn fg(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Rgb(r, g, b) => write!(w, "\x1b[38;2;{r};{g};{b}m"),
        Color::Reset => reset(w),
        Color::None => Ok(()),
    }
}

/// Set the background color. [`Color::None`] writes nothing.
pub fn bg(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Rgb(r, g, b) => write!(w, "\x1b[48;2;{r};{g};{b}m"),
        Color::Reset => reset(w),
        Color::None => Ok(()),
    }
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Enable SGR mouse tracking: clicks (1000), drag motion (1002), SGR
/// coordinate format (1006).
#[inline]
pub fn enable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h\x1b[?1002h\x1b[?1006h")
}

/// Disable SGR mouse tracking.
#[inline]
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1000l\x1b[?1002l\x1b[?1006l")
}

// ─── Device Status Report ───────────────────────────────────────────────────

/// Ask the terminal for the cursor position (`ESC[6n`). The reply arrives
/// on stdin as `ESC[row;colR` and is parsed by the input pipeline.
#[inline]
pub fn request_cursor_pos(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: run an emitter against a Vec and return the output string.
    fn emit(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn cursor_to_converts_to_one_based() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(emit(|w| cursor_to(w, 7, 4)), "\x1b[5;8H");
    }

    #[test]
    fn cursor_to_handles_max_coords() {
        assert_eq!(
            emit(|w| cursor_to(w, u16::MAX, u16::MAX)),
            format!("\x1b[{0};{0}H", u32::from(u16::MAX) + 1)
        );
    }

    #[test]
    fn relative_moves() {
        assert_eq!(emit(|w| cursor_up(w, 3)), "\x1b[3A");
        assert_eq!(emit(|w| cursor_down(w, 1)), "\x1b[1B");
        assert_eq!(emit(|w| cursor_right(w, 12)), "\x1b[12C");
        assert_eq!(emit(|w| cursor_left(w, 2)), "\x1b[2D");
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(emit(cursor_hide), "\x1b[?25l");
        assert_eq!(emit(cursor_show), "\x1b[?25h");
    }

    #[test]
    fn clear_homes_cursor() {
        assert_eq!(emit(clear_screen), "\x1b[2J\x1b[1;1H");
    }

    #[test]
    fn fg_rgb() {
        assert_eq!(
            emit(|w| fg(w, Color::Rgb(1, 22, 255))),
            "\x1b[38;2;1;22;255m"
        );
    }

    #[test]
    fn bg_rgb() {
        assert_eq!(emit(|w| bg(w, Color::Rgb(0, 0, 0))), "\x1b[48;2;0;0;0m");
    }

    #[test]
    fn reset_color_is_sgr0() {
        assert_eq!(emit(|w| fg(w, Color::Reset)), "\x1b[0m");
        assert_eq!(emit(|w| bg(w, Color::Reset)), "\x1b[0m");
    }

    #[test]
    fn none_color_writes_nothing() {
        assert_eq!(emit(|w| fg(w, Color::None)), "");
        assert_eq!(emit(|w| bg(w, Color::None)), "");
    }

    #[test]
    fn mouse_toggle_sequences() {
        assert_eq!(emit(enable_mouse), "\x1b[?1000h\x1b[?1002h\x1b[?1006h");
        assert_eq!(emit(disable_mouse), "\x1b[?1000l\x1b[?1002l\x1b[?1006l");
    }

    #[test]
    fn dsr_request() {
        assert_eq!(emit(request_cursor_pos), "\x1b[6n");
    }
}
