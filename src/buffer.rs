// SPDX-License-Identifier: MIT
//
// Buffer — the double-buffered cell grid and differential flush.
//
// User code paints into the back matrix with `draw_string` / `draw_box`;
// `flush` compares back against front (the last state pushed to the
// terminal), emits the minimal escape stream for the differences, and
// commits back into front. In a typical frame only a handful of cells
// change, so a full-screen "repaint" costs a few dozen bytes.
//
// Layout: flat `Vec<Cell>` per matrix, row-major, so the flush scan is a
// linear walk and a row's cells share cache lines.
//
// Wide glyphs: the head cell holds the codepoint, the next cell is a trail
// (empty glyph, `wide_trail` set). The flush never emits trails — printing
// the head already covered both columns — but still syncs them into front.
// Paint operations break a wide pair whenever one of its halves is
// overwritten, keeping the trail invariant: every trail's left neighbour is
// a double-width head.
//
// Draw coordinates are signed so callers can scroll content partially off
// the left/top edge; anything outside the grid clips silently.

use std::io::{self, Write};

use crate::cell::Cell;
use crate::color::Color;
use crate::output::{FlushWriter, OutputBuffer};
use crate::width::{decode_utf8, width_of};

// ─── FlushStats ─────────────────────────────────────────────────────────────

/// Observable outcome of one flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    /// Cells that differed from the front matrix and were emitted.
    pub cells_written: usize,
    /// Cells skipped: unchanged, or wide trails synced without emission.
    pub cells_skipped: usize,
    /// Bytes of escape-stream output produced.
    pub bytes_written: usize,
}

impl FlushStats {
    /// Total cells visited (`written + skipped`).
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_written + self.cells_skipped
    }
}

// ─── Buffer ─────────────────────────────────────────────────────────────────

/// Double-buffered terminal canvas.
///
/// Created empty (0×0); [`resize`](Self::resize) allocates both matrices.
/// The front matrix starts from the sentinel state (spaces, white on
/// black), so the first flush emits exactly the cells a caller painted.
///
/// # Examples
///
/// ```
/// use termx::buffer::Buffer;
/// use termx::color::Color;
///
/// let mut buf = Buffer::new();
/// buf.resize(80, 24);
/// buf.draw_string(2, 1, "hello", Color::GREEN, Color::BLACK);
///
/// let mut sink = Vec::new();
/// let stats = buf.flush_to(&mut sink).unwrap();
/// assert_eq!(stats.cells_written, 5);
/// ```
pub struct Buffer {
    width: u16,
    height: u16,
    front: Vec<Cell>,
    back: Vec<Cell>,
    out: OutputBuffer,
}

impl Buffer {
    // ─── Construction & shape ────────────────────────────────────────────

    /// Create an empty (0×0) buffer. Call [`resize`](Self::resize) before
    /// drawing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            front: Vec::new(),
            back: Vec::new(),
            out: OutputBuffer::new(),
        }
    }

    /// Buffer width in columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Buffer height in rows.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Reallocate both matrices for a new size.
    ///
    /// No-op when the dimensions already match. The front matrix is seeded
    /// with the sentinel ([`Cell::BLANK`]) so the next flush repaints every
    /// cell that differs from a blank screen.
    pub fn resize(&mut self, width: u16, height: u16) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;

        let size = usize::from(width) * usize::from(height);
        self.front.clear();
        self.front.resize(size, Cell::BLANK);
        self.back.clear();
        self.back.resize(size, Cell::BLANK);
    }

    /// Re-seed the front matrix with the sentinel so the next flush
    /// repaints the full back state. Use after the physical screen was
    /// cleared or corrupted behind the buffer's back.
    pub fn invalidate(&mut self) {
        self.front.fill(Cell::BLANK);
    }

    /// Reset the back matrix to spaces over `bg` (white ink). The front
    /// matrix — the terminal's current state — is untouched.
    pub fn clear(&mut self, bg: Color) {
        self.back.fill(Cell::blank(bg));
    }

    // ─── Cell access ─────────────────────────────────────────────────────

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// The pending (back) cell at `(x, y)`, or `None` out of bounds.
    #[inline]
    #[must_use]
    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.back[self.index(x, y)])
        } else {
            None
        }
    }

    /// The committed (front) cell at `(x, y)`, or `None` out of bounds.
    #[inline]
    #[must_use]
    pub fn committed_cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.front[self.index(x, y)])
        } else {
            None
        }
    }

    // ─── Painting ────────────────────────────────────────────────────────

    /// Put one cell at an in-bounds position, breaking any wide pair the
    /// write lands on. `x`/`y` must already be validated by the caller.
    fn put_cell(&mut self, x: u16, y: u16, cell: Cell) {
        let idx = self.index(x, y);

        // Overwriting a trail: the head to the left loses its right half.
        if self.back[idx].wide_trail && x > 0 {
            let head = self.index(x - 1, y);
            self.back[head].ch = u32::from(b' ');
        }

        // Overwriting a head whose trail survives: orphaned trail becomes
        // a blank cell (unless the new cell is itself double-width, in
        // which case draw_string writes the new trail right after).
        if !cell.wide_trail && width_of(cell.ch) < 2 && x + 1 < self.width {
            let next = self.index(x + 1, y);
            if self.back[next].wide_trail {
                self.back[next] = Cell::BLANK;
            }
        }

        self.back[idx] = cell;
    }

    /// Draw `text` starting at column `x`, row `y`.
    ///
    /// Codepoints advance the cursor by their visual width; zero-width
    /// codepoints are skipped (they fold into the preceding glyph, which a
    /// cell cannot represent). Double-width glyphs claim a trail cell.
    /// Rows outside the grid are skipped entirely; columns clip per cell.
    pub fn draw_string(&mut self, x: i32, y: i32, text: &str, fg: Color, bg: Color) {
        if y < 0 || y >= i32::from(self.height) {
            return;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let row = y as u16;

        let bytes = text.as_bytes();
        let mut cursor_x = x;
        let mut i = 0;

        while i < bytes.len() && cursor_x < i32::from(self.width) {
            let (cp, len) = decode_utf8(&bytes[i..]);
            i += len;

            let w = width_of(cp);
            if w == 0 {
                continue;
            }

            if cursor_x >= 0 {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let col = cursor_x as u16;

                self.put_cell(
                    col,
                    row,
                    Cell {
                        ch: cp,
                        fg,
                        bg,
                        wide_trail: false,
                    },
                );

                if w == 2 && col + 1 < self.width {
                    // The trail overwrite can itself orphan a wide pair
                    // starting one column to the right.
                    if col + 2 < self.width {
                        let next = self.index(col + 2, row);
                        if self.back[next].wide_trail {
                            self.back[next] = Cell::BLANK;
                        }
                    }
                    let trail = self.index(col + 1, row);
                    self.back[trail] = Cell::trail(fg, bg);
                }
            }

            #[allow(clippy::cast_possible_wrap)] // w is 1 or 2
            {
                cursor_x += w as i32;
            }
        }
    }

    /// Draw a box with heavy line-drawing glyphs and fill its interior
    /// with spaces over `bg`. `red_border` paints the frame red regardless
    /// of `fg` (error/alert styling).
    #[allow(clippy::too_many_arguments, clippy::similar_names)]
    pub fn draw_box(&mut self, x: i32, y: i32, w: i32, h: i32, fg: Color, bg: Color, red_border: bool) {
        let border = if red_border { Color::RED } else { fg };

        self.draw_string(x, y, "┏", border, bg);
        self.draw_string(x + w - 1, y, "┓", border, bg);
        self.draw_string(x, y + h - 1, "┗", border, bg);
        self.draw_string(x + w - 1, y + h - 1, "┛", border, bg);

        for i in (x + 1)..(x + w - 1) {
            self.draw_string(i, y, "━", border, bg);
            self.draw_string(i, y + h - 1, "━", border, bg);
        }
        for j in (y + 1)..(y + h - 1) {
            self.draw_string(x, j, "┃", border, bg);
            self.draw_string(x + w - 1, j, "┃", border, bg);
        }

        for j in (y + 1)..(y + h - 1) {
            for i in (x + 1)..(x + w - 1) {
                self.draw_string(i, j, " ", fg, bg);
            }
        }
    }

    // ─── Flush ───────────────────────────────────────────────────────────

    /// Diff back against front and accumulate the minimal escape stream.
    fn render(&mut self) -> FlushStats {
        let mut stats = FlushStats::default();
        let mut writer = FlushWriter::new();
        self.out.clear();

        for y in 0..self.height {
            for x in 0..self.width {
                let idx = self.index(x, y);
                let back = self.back[idx];

                if back == self.front[idx] {
                    stats.cells_skipped += 1;
                    continue;
                }

                // Wide trails sync without emission: the head's glyph
                // already painted this column.
                if back.wide_trail {
                    self.front[idx] = back;
                    stats.cells_skipped += 1;
                    continue;
                }

                writer.write_cell(&mut self.out, x, y, &back);
                self.front[idx] = back;
                stats.cells_written += 1;
            }
        }

        stats.bytes_written = self.out.len();
        stats
    }

    /// Push the pending frame to stdout.
    ///
    /// Emits the minimal escape stream for the back/front difference as a
    /// single write, then commits back into front. A flush with an
    /// unchanged back matrix writes exactly zero bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails. The diff has already
    /// been committed to the front matrix by then; call
    /// [`invalidate`](Self::invalidate) to force a repaint if the terminal
    /// state is in doubt.
    pub fn flush(&mut self) -> io::Result<FlushStats> {
        let stats = self.render();
        self.out.flush_stdout()?;
        Ok(stats)
    }

    /// Push the pending frame to an arbitrary writer (testing seam).
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<FlushStats> {
        let stats = self.render();
        self.out.flush_to(w)?;
        Ok(stats)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
