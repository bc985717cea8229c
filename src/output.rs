// SPDX-License-Identifier: MIT
//
// Output buffering and stateful cell emission.
//
// Two pieces work together to minimise terminal I/O:
//
//   OutputBuffer — accumulates the whole frame's ANSI bytes in memory so a
//   flush is a single write() syscall. No per-escape overhead, no partially
//   written frames for the terminal to render mid-update.
//
//   FlushWriter — tracks what the terminal already has (cursor position,
//   current foreground, current background) and emits only the escapes that
//   change something. A run of same-colored cells on one row costs exactly
//   one cursor move, two SGR sequences, and the glyph bytes.
//
// The cursor tracking must be width-aware: printing a double-width glyph
// advances the terminal cursor two columns, so the writer advances its
// shadow cursor by the glyph's width class, not by one.

use std::io::{self, Write};

use crate::ansi;
use crate::cell::Cell;
use crate::color::Color;
use crate::width::width_of;

// ─── OutputBuffer ───────────────────────────────────────────────────────────

/// A byte buffer that accumulates ANSI output for a single `write()` call.
///
/// Default capacity: 16 KB — enough for most frames without reallocation.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    /// Create an empty buffer with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a Unicode codepoint as UTF-8.
    ///
    /// Invalid codepoints (including 0, the empty-glyph marker, which must
    /// never reach emission) produce `?` instead of garbage bytes.
    pub fn write_codepoint(&mut self, cp: u32) {
        match char::from_u32(cp) {
            Some(ch) if cp != 0 => {
                let mut enc = [0u8; 4];
                self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
            }
            _ => self.buf.push(b'?'),
        }
    }

    /// Clear the buffer for reuse (keeps the allocation).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write the accumulated bytes to stdout in one call, flush the stream,
    /// and clear the buffer. Retries short writes until drained
    /// (`write_all`).
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&self.buf)?;
            stdout.flush()?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Write the accumulated bytes to an arbitrary writer and clear the
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // No-op: real flushing happens via flush_stdout() / flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── FlushWriter ────────────────────────────────────────────────────────────

/// Stateful cell emitter: skips cursor moves and SGR sequences that would
/// not change the terminal's state.
///
/// Tracking state lives for one flush pass and is re-created per pass:
/// colors start unknown (`color_set == false`, so the first cell always
/// emits both), and the shadow cursor starts at an impossible position so
/// the first cell always emits a move.
pub struct FlushWriter {
    term_x: i32,
    term_y: i32,
    last_fg: Color,
    last_bg: Color,
    color_set: bool,
}

impl FlushWriter {
    /// Create a writer with no tracked terminal state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            term_x: -1,
            term_y: -1,
            last_fg: Color::None,
            last_bg: Color::None,
            color_set: false,
        }
    }

    /// Emit one cell at grid position `(x, y)`, 0-indexed.
    ///
    /// Emits a CUP only when the shadow cursor is elsewhere, each SGR only
    /// when the color differs from the last emitted one, then the glyph.
    /// The shadow cursor advances by the glyph's column width.
    pub fn write_cell(&mut self, out: &mut OutputBuffer, x: u16, y: u16, cell: &Cell) {
        // 1-based wire position.
        let tx = i32::from(x) + 1;
        let ty = i32::from(y) + 1;

        if ty != self.term_y || tx != self.term_x {
            ansi::cursor_to(out, x, y).ok();
            self.term_y = ty;
            self.term_x = tx;
        }

        if !self.color_set || cell.fg != self.last_fg {
            ansi::fg(out, cell.fg).ok();
            self.last_fg = cell.fg;
        }
        if !self.color_set || cell.bg != self.last_bg {
            ansi::bg(out, cell.bg).ok();
            self.last_bg = cell.bg;
        }
        self.color_set = true;

        out.write_codepoint(cell.ch);

        // The terminal advanced by the glyph's visual width; mirror it so a
        // wide glyph's successor two columns over needs no cursor move.
        #[allow(clippy::cast_possible_wrap)] // width is 0..=2
        {
            self.term_x += width_of(cell.ch) as i32;
        }
    }
}

impl Default for FlushWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
