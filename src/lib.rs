// SPDX-License-Identifier: MIT
//
// termx — a flicker-free terminal UI backend for POSIX terminals.
//
// Three subsystems, tightly coupled:
//
//   - An input pipeline that multiplexes raw stdin, an eventfd, and the
//     resize/interrupt signals through one select() loop, parses the
//     byte stream into keys / mouse / cursor replies, and keeps the
//     terminal in raw mode with restoration guaranteed on every exit
//     path — normal, panic, or fatal signal.
//   - A double-buffered differential renderer that diffs each frame
//     against the last flushed state and emits the minimum cursor-move +
//     SGR + glyph stream to synchronise the terminal.
//   - A width engine that keeps cursor accounting honest for East-Asian
//     wide glyphs, emoji, and zero-width joiners.
//
// This crate intentionally avoids external TUI frameworks (ratatui,
// crossterm) in favor of direct terminal control via ANSI escape
// sequences and raw termios. Every byte sent to the terminal is
// accounted for. Every frame is diffed. Every escape code is earned.
//
// Targets ANSI/xterm-compatible truecolor terminals on POSIX. No
// alternate screen, no scrollback management, no terminfo.

#[allow(clippy::missing_errors_doc)] // ANSI functions all just forward io::Write errors.
pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod device;
pub mod input;
pub mod output;
pub mod screen;
pub mod terminal;
pub mod width;

pub use buffer::{Buffer, FlushStats};
pub use cell::Cell;
pub use color::Color;
pub use device::Device;
pub use input::{Event, InputCode, MouseAction, MouseButton, MouseState};
pub use screen::{Coord, TermSize};
