// SPDX-License-Identifier: MIT
//
// Device — the input pipeline.
//
// Safety: `unsafe` is confined to the select() call and the eventfd /
// stdin reads, all raw POSIX fd operations.
#![allow(unsafe_code)]
//
// One loop multiplexes everything a terminal can throw at the process:
//
//   stdin bytes ──┐
//                 ├── select() ── parse ── one InputCode to the caller
//   eventfd ──────┘
//
// The eventfd carries out-of-band sentinels: SIGWINCH writes the resize
// code from the signal handler, `force_pause` writes the interrupt code
// from any thread. Both unblock the select immediately.
//
// # Single-writer gate
//
// Exactly one thread may sit in the select/parse loop; stdin is not
// shareable. The gate is one atomic flag claimed with compare-exchange —
// the only synchronisation on the hot path. Losers get `Busy` immediately
// and the flag is released by a scoped guard on every exit path.
//
// # The lone-ESC problem
//
// `ESC` is both a key and the first byte of every escape sequence. The
// parser refuses to decide on a bare ESC; the loop decides by time: when
// the select deadline fires and the buffer holds exactly that one byte,
// no sequence is coming — it was the Escape key. Interactive callers
// should poll with a timeout of at least ~16ms so a real Escape keypress
// is never misread as the head of an arrow sequence split across reads.
//
// # Cursor-position rendezvous
//
// `get_cursor_pos` writes `ESC[6n` and needs the `ESC[row;colR` reply off
// stdin. If another thread owns the loop, the requester parks on a
// single-shot channel; the owner intercepts the reply in its drain step
// and hands the coordinate over instead of returning it to its own
// caller. With no owner, the requester runs the loop itself (discarding
// concurrent key events — the documented cost of direct mode).

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::ansi;
use crate::input::{Event, InputCode, MouseState, Parser};
use crate::screen::{self, Coord};
use crate::terminal;

// ─── Pipeline State ─────────────────────────────────────────────────────────

/// The single-writer gate: true while some thread owns the select loop.
static INPUT_RUNNING: AtomicBool = AtomicBool::new(false);

/// Byte buffer + parser payload slots. Locked only around buffer access,
/// never across a select.
static PARSE: Mutex<ParseState> = Mutex::new(ParseState::new());

/// The cursor rendezvous: at most one parked waiter at a time.
static CURSOR_SLOT: Mutex<Option<SyncSender<Coord>>> = Mutex::new(None);

/// Read size for one stdin drain; plenty for interactive input bursts
/// (a keypress is 1–11 bytes, a mouse report at most ~20).
const STDIN_READ_CHUNK: usize = 256;

struct ParseState {
    buf: Vec<u8>,
    parser: Parser,
}

impl ParseState {
    const fn new() -> Self {
        Self {
            buf: Vec::new(),
            parser: Parser::new(),
        }
    }
}

fn lock<'a, T>(m: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Gate ───────────────────────────────────────────────────────────────────

/// Scoped claim on the single-writer gate. Dropping releases the flag, so
/// every return path — value, error, panic — frees the pipeline.
struct GateGuard;

impl GateGuard {
    /// Try to claim the gate. `None` means another thread owns it.
    ///
    /// The guard must only exist on a successful claim — its Drop stores
    /// `false` unconditionally, so a guard constructed on the losing path
    /// would release the winner's claim.
    fn try_claim() -> Option<Self> {
        if INPUT_RUNNING
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(Self)
        } else {
            None
        }
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        INPUT_RUNNING.store(false, Ordering::Release);
    }
}

// ─── Select ─────────────────────────────────────────────────────────────────

enum Readiness {
    TimedOut,
    Ready { stdin: bool, event: bool },
    Interrupted,
    Failed,
}

/// Wait for stdin or the eventfd to become readable.
fn await_readable(event_fd: i32, timeout: Option<Duration>) -> Readiness {
    let mut readfds: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe {
        libc::FD_ZERO(&raw mut readfds);
        libc::FD_SET(libc::STDIN_FILENO, &raw mut readfds);
        libc::FD_SET(event_fd, &raw mut readfds);
    }
    let max_fd = event_fd.max(libc::STDIN_FILENO);

    let mut tv = libc::timeval { tv_sec: 0, tv_usec: 0 };
    let tv_ptr = match timeout {
        Some(t) => {
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            {
                tv.tv_sec = t.as_secs() as libc::time_t;
                tv.tv_usec = t.subsec_micros() as libc::suseconds_t;
            }
            &raw mut tv
        }
        None => std::ptr::null_mut(),
    };

    let activity = unsafe {
        libc::select(
            max_fd + 1,
            &raw mut readfds,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            tv_ptr,
        )
    };

    if activity < 0 {
        if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
            return Readiness::Interrupted;
        }
        return Readiness::Failed;
    }
    if activity == 0 {
        return Readiness::TimedOut;
    }

    Readiness::Ready {
        stdin: unsafe { libc::FD_ISSET(libc::STDIN_FILENO, &raw const readfds) },
        event: unsafe { libc::FD_ISSET(event_fd, &raw const readfds) },
    }
}

// ─── Device ─────────────────────────────────────────────────────────────────

/// The input pipeline. All operations are process-global associated
/// functions; the pipeline initialises itself on first use (raw mode,
/// signal handlers, eventfd).
pub struct Device;

impl Device {
    // ─── Input ───────────────────────────────────────────────────────────

    /// Block until an input arrives and return its code.
    ///
    /// Payload-bearing codes (`Mouse`, `Resize`, `CursorPos`) carry their
    /// data via [`inspect`](Self::inspect). Returns `Busy` immediately if
    /// another thread owns the pipeline.
    ///
    /// # Errors
    ///
    /// Fails if pipeline initialisation fails (eventfd creation, termios).
    pub fn get_input() -> io::Result<InputCode> {
        Ok(Self::get_input_for(None)?.unwrap_or(InputCode::None))
    }

    /// Wait up to `timeout` for an input. `None` on timeout.
    ///
    /// The recommended interactive timeout is ≥ 16ms — it doubles as the
    /// lone-ESC disambiguation window.
    ///
    /// # Errors
    ///
    /// Fails if pipeline initialisation fails (eventfd creation, termios).
    pub fn get_input_timeout(timeout: Duration) -> io::Result<Option<InputCode>> {
        Self::get_input_for(Some(timeout))
    }

    /// Pair a code with the payload parsed alongside it.
    #[must_use]
    pub fn inspect(code: InputCode) -> Event {
        match code {
            InputCode::None => Event::None,
            InputCode::Interrupt => Event::Interrupt,
            InputCode::Busy => Event::Busy,
            InputCode::Mouse => Event::Mouse(lock(&PARSE).parser.last_mouse()),
            InputCode::Resize => Event::Resize(screen::size()),
            InputCode::CursorPos => Event::CursorPos(lock(&PARSE).parser.last_cursor()),
            key => Event::Key(key),
        }
    }

    /// The most recently parsed mouse report.
    #[must_use]
    pub fn mouse_state() -> MouseState {
        lock(&PARSE).parser.last_mouse()
    }

    // ─── Cursor position ─────────────────────────────────────────────────

    /// Ask the terminal where its cursor is, waiting up to `timeout` for
    /// the reply. Returns the 0-based position, or `None` on timeout (or
    /// when another cursor request is already in flight).
    ///
    /// With another thread in [`get_input`](Self::get_input), the request
    /// parks on the rendezvous and that thread delivers the reply. With no
    /// owner, this call drives the pipeline itself — concurrent key and
    /// mouse input may be discarded in that mode.
    ///
    /// # Errors
    ///
    /// Fails if initialisation or the stdout write fails.
    pub fn get_cursor_pos(timeout: Duration) -> io::Result<Option<Coord>> {
        terminal::init()?;

        if INPUT_RUNNING.load(Ordering::Acquire) {
            // Observer mode: park on the rendezvous before sending the
            // request so the owner can never race past an empty slot.
            let Some(rx) = install_cursor_waiter() else {
                return Ok(None);
            };

            request_cursor_pos()?;

            let result = rx.recv_timeout(timeout).ok();
            clear_cursor_waiter();
            return Ok(result);
        }

        // Direct mode: drive the loop ourselves and fish for the reply.
        request_cursor_pos()?;

        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(None);
            }

            match Self::get_input_for(Some(timeout - elapsed))? {
                Some(InputCode::CursorPos) => {
                    return Ok(Some(lock(&PARSE).parser.last_cursor()));
                }
                // Busy means someone claimed the gate since we checked;
                // keep trying until the deadline.
                _ => {}
            }
        }
    }

    // ─── Flow control ────────────────────────────────────────────────────

    /// Enable or disable mouse reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails.
    pub fn enable_mouse(enable: bool) -> io::Result<()> {
        terminal::enable_mouse(enable)
    }

    /// Interrupt the pipeline from any thread and drop raw mode.
    ///
    /// The thread in `get_input` wakes with `Interrupt`; the terminal is
    /// usable for normal line-mode I/O until [`resume`](Self::resume).
    pub fn force_pause() {
        let fd = terminal::event_fd();
        if fd != -1 {
            let val = terminal::EVENT_CODE_INTERRUPT;
            unsafe {
                libc::write(fd, (&raw const val).cast::<libc::c_void>(), 8);
            }
        }

        let _ = terminal::set_raw_mode(false);
    }

    /// Re-enter raw mode after a pause.
    ///
    /// Any input call also re-enables raw mode on its way in, so this is
    /// a convenience for resuming without immediately reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the termios switch fails.
    pub fn resume() -> io::Result<()> {
        terminal::set_raw_mode(true)
    }

    /// Restore the terminal and release the pipeline's OS resources.
    pub fn deinit() {
        terminal::deinit();
    }

    // ─── The loop ────────────────────────────────────────────────────────

    /// The select/parse loop. `timeout == None` blocks indefinitely.
    ///
    /// Returns `Ok(None)` on timeout, `Ok(Some(Busy))` when the gate is
    /// taken, and `Ok(Some(code))` for everything else.
    fn get_input_for(timeout: Option<Duration>) -> io::Result<Option<InputCode>> {
        terminal::init()?;

        let Some(_gate) = GateGuard::try_claim() else {
            return Ok(Some(InputCode::Busy));
        };

        // Re-entry after force_pause: every input call verifies raw mode.
        terminal::set_raw_mode(true)?;

        let event_fd = terminal::event_fd();
        let start = Instant::now();

        loop {
            // A. Drain complete sequences already buffered.
            if let Some(code) = drain_one() {
                return Ok(Some(code));
            }

            // B. Remaining time.
            let remaining = match timeout {
                None => None,
                Some(t) => {
                    let elapsed = start.elapsed();
                    if elapsed >= t {
                        return Ok(None);
                    }
                    Some(t - elapsed)
                }
            };

            // C. Wait for bytes or a sentinel.
            match await_readable(event_fd, remaining) {
                Readiness::Interrupted => continue,
                Readiness::Failed => return Ok(None),

                Readiness::TimedOut => {
                    // The deadline is the ESC disambiguator: a buffer
                    // holding exactly one ESC is a real Escape keypress.
                    let mut st = lock(&PARSE);
                    if st.buf == [0x1B] {
                        st.buf.clear();
                        return Ok(Some(InputCode::Esc));
                    }
                    return Ok(None);
                }

                Readiness::Ready { stdin, event } => {
                    if event {
                        match read_eventfd(event_fd) {
                            Some(terminal::EVENT_CODE_INTERRUPT) => {
                                return Ok(Some(InputCode::Interrupt));
                            }
                            Some(terminal::EVENT_CODE_RESIZE) => {
                                return Ok(Some(InputCode::Resize));
                            }
                            // Coalesced or unknown sentinel sums: treat as
                            // a spurious wakeup and re-select.
                            _ => {}
                        }
                    }

                    if stdin && !read_stdin_chunk() {
                        // EOF: stdin is gone, nothing will ever arrive.
                        return Ok(None);
                    }
                }
            }
        }
    }
}

// ─── Loop Helpers ───────────────────────────────────────────────────────────

/// Drain one deliverable code from the buffer.
///
/// Consumes complete sequences until one produces a code worth returning.
/// Cursor replies are diverted into the rendezvous when a waiter is
/// parked; non-events (focus noise, unknown CSI) are swallowed.
fn drain_one() -> Option<InputCode> {
    let mut st = lock(&PARSE);

    while !st.buf.is_empty() {
        let (code, consumed) = {
            let ParseState { buf, parser } = &mut *st;
            parser.parse(buf)
        };
        if consumed == 0 {
            // Incomplete suffix: leave it for the next read.
            return None;
        }
        st.buf.drain(..consumed);

        if code == InputCode::CursorPos {
            let coord = st.parser.last_cursor();
            if fulfil_cursor_waiter(coord) {
                // Intercepted for a parked get_cursor_pos; keep draining.
                continue;
            }
        }

        if code != InputCode::None {
            return Some(code);
        }
    }

    None
}

/// Append one chunk of stdin to the parse buffer. False on EOF.
fn read_stdin_chunk() -> bool {
    let mut chunk = [0u8; STDIN_READ_CHUNK];
    let n = unsafe {
        libc::read(
            libc::STDIN_FILENO,
            chunk.as_mut_ptr().cast::<libc::c_void>(),
            chunk.len(),
        )
    };

    if n > 0 {
        #[allow(clippy::cast_sign_loss)]
        lock(&PARSE).buf.extend_from_slice(&chunk[..n as usize]);
        return true;
    }
    // n < 0 is a transient error (EINTR/EAGAIN); only 0 means EOF.
    n != 0
}

/// Read the eventfd counter (resets it to zero).
fn read_eventfd(fd: i32) -> Option<u64> {
    let mut val: u64 = 0;
    let n = unsafe { libc::read(fd, (&raw mut val).cast::<libc::c_void>(), 8) };
    (n == 8).then_some(val)
}

/// Send the DSR cursor-position request.
fn request_cursor_pos() -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    ansi::request_cursor_pos(&mut stdout)?;
    stdout.flush()
}

// ─── Cursor Rendezvous ──────────────────────────────────────────────────────

/// Park a waiter in the rendezvous slot. `None` when a waiter is already
/// parked (one in-flight cursor request at a time).
fn install_cursor_waiter() -> Option<Receiver<Coord>> {
    let mut slot = lock(&CURSOR_SLOT);
    if slot.is_some() {
        return None;
    }
    let (tx, rx) = mpsc::sync_channel(1);
    *slot = Some(tx);
    Some(rx)
}

/// Deliver a cursor reply to the parked waiter, clearing the slot.
/// False when nobody is waiting.
fn fulfil_cursor_waiter(coord: Coord) -> bool {
    match lock(&CURSOR_SLOT).take() {
        Some(tx) => {
            // A waiter that already timed out dropped its receiver; the
            // failed send is fine — the slot is cleared either way.
            let _ = tx.try_send(coord);
            true
        }
        None => false,
    }
}

/// Drop the waiter slot after a wait, delivered or not.
fn clear_cursor_waiter() {
    lock(&CURSOR_SLOT).take();
}

// ─── Tests ──────────────────────────────────────────────────────────────────
