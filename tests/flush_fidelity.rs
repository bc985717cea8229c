// SPDX-License-Identifier: MIT
//
// Flush fidelity: a simulated terminal consuming the flush byte stream
// must end up showing exactly the back buffer.
//
// The simulator understands precisely the vocabulary the renderer emits —
// CUP cursor moves, truecolor SGR foreground/background, glyph bytes —
// and models the one piece of physical behavior the diff relies on:
// printing a double-width glyph covers *two* columns and advances the
// cursor by two.

use proptest::prelude::*;

use termx::buffer::Buffer;
use termx::cell::Cell;
use termx::color::Color;
use termx::width::{visual_width, width_of};

// ── Terminal model ──────────────────────────────────────────────────────

/// What one model cell is showing.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TermCell {
    ch: u32,
    fg: Color,
    bg: Color,
}

/// Power-on state mirrors the renderer's resize sentinel.
const TERM_BLANK: TermCell = TermCell {
    ch: b' ' as u32,
    fg: Color::WHITE,
    bg: Color::BLACK,
};

/// A minimal ANSI terminal: a grid, a cursor, and the current colors.
struct VirtualTerm {
    width: u16,
    height: u16,
    cells: Vec<TermCell>,
    // 0-based cursor.
    cx: u16,
    cy: u16,
    fg: Color,
    bg: Color,
}

impl VirtualTerm {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![TERM_BLANK; usize::from(width) * usize::from(height)],
            cx: 0,
            cy: 0,
            fg: Color::WHITE,
            bg: Color::BLACK,
        }
    }

    fn cell(&self, x: u16, y: u16) -> TermCell {
        self.cells[usize::from(y) * usize::from(self.width) + usize::from(x)]
    }

    fn put(&mut self, x: u16, y: u16, cell: TermCell) {
        if x < self.width && y < self.height {
            self.cells[usize::from(y) * usize::from(self.width) + usize::from(x)] = cell;
        }
    }

    /// Consume a renderer output stream.
    fn feed(&mut self, bytes: &[u8]) {
        let s = std::str::from_utf8(bytes).expect("renderer emits valid UTF-8");
        let b = s.as_bytes();
        let mut i = 0;

        while i < b.len() {
            if b[i] == 0x1B {
                i += self.consume_escape(&b[i..]);
                continue;
            }

            // A glyph: decode one char and print it.
            let ch = s[i..].chars().next().expect("in-bounds char");
            self.print(ch);
            i += ch.len_utf8();
        }
    }

    fn consume_escape(&mut self, seq: &[u8]) -> usize {
        assert_eq!(seq[0], 0x1B);
        assert_eq!(seq.get(1), Some(&b'['), "only CSI expected from flush");

        let end = (2..seq.len())
            .find(|&i| (0x40..=0x7E).contains(&seq[i]))
            .expect("terminated CSI");
        let params: Vec<u16> = seq[2..end]
            .split(|&c| c == b';')
            .map(|p| {
                std::str::from_utf8(p)
                    .expect("ascii params")
                    .parse::<u16>()
                    .unwrap_or(0)
            })
            .collect();

        match seq[end] {
            b'H' => {
                // CUP is 1-based.
                self.cy = params.first().copied().unwrap_or(1).saturating_sub(1);
                self.cx = params.get(1).copied().unwrap_or(1).saturating_sub(1);
            }
            b'm' => match params.as_slice() {
                [38, 2, r, g, b] => {
                    self.fg = Color::Rgb(*r as u8, *g as u8, *b as u8);
                }
                [48, 2, r, g, b] => {
                    self.bg = Color::Rgb(*r as u8, *g as u8, *b as u8);
                }
                [0] | [] => {
                    self.fg = Color::WHITE;
                    self.bg = Color::BLACK;
                }
                other => panic!("unexpected SGR {other:?}"),
            },
            final_byte => panic!("unexpected CSI final {final_byte:?}"),
        }

        end + 1
    }

    fn print(&mut self, ch: char) {
        let w = width_of(ch as u32);
        self.put(
            self.cx,
            self.cy,
            TermCell {
                ch: ch as u32,
                fg: self.fg,
                bg: self.bg,
            },
        );
        if w == 2 {
            // The glyph physically covers the next column too.
            self.put(
                self.cx + 1,
                self.cy,
                TermCell {
                    ch: 0,
                    fg: self.fg,
                    bg: self.bg,
                },
            );
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            self.cx = self.cx.saturating_add(w.max(1) as u16);
        }
    }

    /// Compare the screen against a buffer's back matrix.
    fn matches(&self, buf: &Buffer) -> Result<(), String> {
        for y in 0..self.height {
            for x in 0..self.width {
                let want: &Cell = buf.cell(x, y).expect("in bounds");
                let got = self.cell(x, y);
                if got.ch != want.ch || got.fg != want.fg || got.bg != want.bg {
                    return Err(format!(
                        "cell ({x}, {y}): terminal shows {got:?}, buffer wants {want:?}"
                    ));
                }
            }
        }
        Ok(())
    }
}

fn flushed(buf: &mut Buffer) -> Vec<u8> {
    let mut out = Vec::new();
    buf.flush_to(&mut out).unwrap();
    out
}

// ── Directed scenarios ──────────────────────────────────────────────────

#[test]
fn simple_text_roundtrip() {
    let mut buf = Buffer::new();
    buf.resize(12, 3);
    buf.draw_string(1, 1, "hello", Color::RED, Color::BLACK);

    let mut term = VirtualTerm::new(12, 3);
    term.feed(&flushed(&mut buf));
    term.matches(&buf).unwrap();
}

#[test]
fn wide_glyphs_roundtrip() {
    let mut buf = Buffer::new();
    buf.resize(12, 2);
    buf.draw_string(0, 0, "가나a", Color::WHITE, Color::GRAY);
    buf.draw_string(3, 1, "中", Color::CYAN, Color::BLACK);

    let mut term = VirtualTerm::new(12, 2);
    term.feed(&flushed(&mut buf));
    term.matches(&buf).unwrap();
}

#[test]
fn incremental_frames_converge() {
    let mut buf = Buffer::new();
    buf.resize(16, 4);
    let mut term = VirtualTerm::new(16, 4);

    buf.draw_string(0, 0, "frame one", Color::WHITE, Color::BLACK);
    term.feed(&flushed(&mut buf));
    term.matches(&buf).unwrap();

    buf.clear(Color::BLACK);
    buf.draw_string(2, 2, "가운데", Color::YELLOW, Color::BLUE);
    term.feed(&flushed(&mut buf));
    term.matches(&buf).unwrap();

    // Overwrite half of a wide pair; the diff must repaint the broken
    // head as well as the new glyph.
    buf.draw_string(3, 2, "x", Color::WHITE, Color::BLACK);
    term.feed(&flushed(&mut buf));
    term.matches(&buf).unwrap();
}

#[test]
fn box_roundtrip() {
    let mut buf = Buffer::new();
    buf.resize(10, 5);
    buf.draw_box(1, 0, 8, 5, Color::GREEN, Color::BLACK, false);

    let mut term = VirtualTerm::new(10, 5);
    term.feed(&flushed(&mut buf));
    term.matches(&buf).unwrap();
}

#[test]
fn visual_width_of_emitted_rows_matches_grid() {
    // The emitted glyph run for a full row never exceeds the row width.
    let mut buf = Buffer::new();
    buf.resize(8, 1);
    buf.draw_string(0, 0, "가나다라", Color::WHITE, Color::BLACK);

    let out = flushed(&mut buf);
    let text = String::from_utf8(out).unwrap();
    assert!(visual_width(&text) <= 8);
}

// ── Property: arbitrary paint programs ──────────────────────────────────

fn palette() -> impl Strategy<Value = Color> {
    prop_oneof![
        Just(Color::WHITE),
        Just(Color::BLACK),
        Just(Color::RED),
        Just(Color::GREEN),
        Just(Color::BLUE),
        Just(Color::GRAY),
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Color::Rgb(r, g, b)),
    ]
}

fn fragment() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            proptest::char::range('a', 'z').prop_map(String::from),
            proptest::char::range('가', '깋').prop_map(String::from),
            Just("🔥".to_string()),
            Just(" ".to_string()),
        ],
        0..10,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn arbitrary_frames_render_faithfully(
        frames in proptest::collection::vec(
            proptest::collection::vec(
                (-3i32..20, -2i32..8, fragment(), palette(), palette()),
                0..6,
            ),
            1..4,
        )
    ) {
        let mut buf = Buffer::new();
        buf.resize(16, 5);
        let mut term = VirtualTerm::new(16, 5);

        for frame in &frames {
            for (x, y, s, fg, bg) in frame {
                buf.draw_string(*x, *y, s, *fg, *bg);
            }
            term.feed(&flushed(&mut buf));
            if let Err(e) = term.matches(&buf) {
                prop_assert!(false, "{}", e);
            }
        }
    }
}
