// SPDX-License-Identifier: MIT
//
// Terminal control — raw mode, the signal/eventfd bridge, and crash-safe
// restoration.
//
// Safety: this module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), eventfd, sigaction, isatty, and raw fd writes. These are the
// standard POSIX interfaces for terminal control — there is no safe
// alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// This module owns the terminal's raw state and the process-global pieces
// the input pipeline hangs off:
//
//   - The saved termios and the raw-mode toggle (ECHO and ICANON cleared,
//     VMIN=1 / VTIME=0, cursor hidden while raw).
//   - The eventfd that signal handlers and `Device::force_pause` write
//     sentinels into; the pipeline's select() watches it next to stdin.
//   - SIGWINCH → resize sentinel; SIGINT / SIGTERM → restore the terminal
//     directly from the handler (normal unwinding is not signal-safe) and
//     `_exit`.
//
// The strongest invariant in the crate lives here: on *every* exit path —
// normal deinit, panic, fatal signal — termios is restored, the cursor is
// shown again, and mouse tracking is switched off. The panic hook writes a
// pre-built restore sequence straight to fd 1, bypassing Rust's stdout
// lock, because the panic may have happened while that lock was held.
//
// The eventfd number is published in a process-wide atomic so the signal
// handlers need nothing but a relaxed load and a write() — both
// async-signal-safe. The saved termios sits in a OnceLock for the same
// reason: set exactly once at init, readable without locking.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, Once, OnceLock, PoisonError};

use crate::ansi;

// ─── Eventfd Sentinels ──────────────────────────────────────────────────────

/// Written to the eventfd by `Device::force_pause`.
pub(crate) const EVENT_CODE_INTERRUPT: u64 = 1;
/// Written to the eventfd by the SIGWINCH handler.
pub(crate) const EVENT_CODE_RESIZE: u64 = 2;

// ─── Process-Global State ───────────────────────────────────────────────────

/// The eventfd the pipeline selects on. -1 while uninitialised. Signal
/// handlers read this with a relaxed load; nothing else is allowed there.
static EVENT_FD: AtomicI32 = AtomicI32::new(-1);

/// Whether raw mode is currently active.
static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Whether mouse tracking is currently enabled.
static MOUSE_TRACKING: AtomicBool = AtomicBool::new(false);

/// Original termios, captured before the first raw-mode entry. OnceLock so
/// the fatal-signal handler can read it lock-free.
static ORIG_TERMIOS: OnceLock<libc::termios> = OnceLock::new();

/// Serialises raw-mode toggles; the toggle itself is idempotent.
static TOGGLE_LOCK: Mutex<()> = Mutex::new(());

/// Init/deinit bracket. True while the bridge is live.
static INIT_STATE: Mutex<bool> = Mutex::new(false);

/// Previous signal dispositions, restored at deinit.
static OLD_ACTIONS: Mutex<Option<[libc::sigaction; 3]>> = Mutex::new(None);

/// Panic hook installation guard — at most once per process.
static PANIC_HOOK: Once = Once::new();

/// Everything a broken terminal needs, in one write: mouse tracking off,
/// SGR reset, cursor visible. Termios restore follows separately.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[?1006l\x1b[?1002l\x1b[?1000l\x1b[0m\x1b[?25h";

fn lock<'a, T>(m: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Whether stdin is connected to a terminal.
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

/// Whether the terminal is currently in raw mode.
#[inline]
#[must_use]
pub fn is_raw_mode() -> bool {
    RAW_MODE.load(Ordering::Acquire)
}

/// Whether mouse tracking is currently enabled.
#[inline]
#[must_use]
pub fn is_mouse_tracking() -> bool {
    MOUSE_TRACKING.load(Ordering::Acquire)
}

/// The pipeline's eventfd, or -1 before init.
#[inline]
pub(crate) fn event_fd() -> i32 {
    EVENT_FD.load(Ordering::Acquire)
}

// ─── Init / Deinit ──────────────────────────────────────────────────────────

/// Bring up the signal/eventfd bridge and enter raw mode.
///
/// Idempotent; the input pipeline calls this lazily on first use. Creates
/// the eventfd, publishes it for the signal handlers, installs the
/// SIGWINCH/SIGINT/SIGTERM handlers and the panic hook, snapshots termios,
/// and switches the terminal to raw mode.
///
/// # Errors
///
/// Fails if the eventfd cannot be created — without it neither resize
/// delivery nor cross-thread interruption works, so this is fatal.
pub fn init() -> io::Result<()> {
    let mut live = lock(&INIT_STATE);
    if *live {
        return Ok(());
    }

    let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    EVENT_FD.store(fd, Ordering::Release);

    install_signal_handlers();
    install_panic_hook();

    set_raw_mode(true)?;

    *live = true;
    Ok(())
}

/// Tear the bridge down: leave raw mode, stop mouse tracking, restore the
/// previous signal dispositions, and close the eventfd.
pub fn deinit() {
    let mut live = lock(&INIT_STATE);
    if !*live {
        return;
    }

    if is_mouse_tracking() {
        let _ = enable_mouse(false);
    }
    let _ = set_raw_mode(false);

    if let Some(old) = lock(&OLD_ACTIONS).take() {
        unsafe {
            libc::sigaction(libc::SIGWINCH, &raw const old[0], std::ptr::null_mut());
            libc::sigaction(libc::SIGINT, &raw const old[1], std::ptr::null_mut());
            libc::sigaction(libc::SIGTERM, &raw const old[2], std::ptr::null_mut());
        }
    }

    let fd = EVENT_FD.swap(-1, Ordering::AcqRel);
    if fd != -1 {
        unsafe { libc::close(fd) };
    }

    *live = false;
}

// ─── Raw Mode ───────────────────────────────────────────────────────────────

/// Toggle raw mode under the toggle lock. Idempotent.
///
/// Raw mode clears `ECHO` and `ICANON` only — signals (ISIG) stay enabled
/// so Ctrl-C reaches the SIGINT handler — and sets `VMIN=1, VTIME=0` so a
/// read blocks for at least one byte. The cursor hides while raw and
/// returns on restore.
///
/// # Errors
///
/// Returns an error if `tcsetattr` fails.
pub(crate) fn set_raw_mode(enable: bool) -> io::Result<()> {
    let _guard = lock(&TOGGLE_LOCK);

    if RAW_MODE.load(Ordering::Acquire) == enable {
        return Ok(());
    }
    if !is_tty() {
        return Ok(());
    }

    if enable {
        let mut attrs = *orig_termios()?;

        attrs.c_lflag &= !(libc::ECHO | libc::ICANON);
        attrs.c_cc[libc::VMIN] = 1;
        attrs.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw const attrs) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut stdout = io::stdout().lock();
        ansi::cursor_hide(&mut stdout)?;
        stdout.flush()?;

        RAW_MODE.store(true, Ordering::Release);
    } else {
        if let Some(orig) = ORIG_TERMIOS.get() {
            if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, orig) } != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        let mut stdout = io::stdout().lock();
        ansi::cursor_show(&mut stdout)?;
        stdout.flush()?;

        RAW_MODE.store(false, Ordering::Release);
    }

    Ok(())
}

/// The saved original termios, snapshotting it on first use.
fn orig_termios() -> io::Result<&'static libc::termios> {
    if let Some(t) = ORIG_TERMIOS.get() {
        return Ok(t);
    }

    let mut t: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut t) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ORIG_TERMIOS.get_or_init(|| t))
}

// ─── Mouse Tracking ─────────────────────────────────────────────────────────

/// Enable or disable SGR mouse tracking (modes 1000 + 1002 + 1006).
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn enable_mouse(enable: bool) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    if enable {
        ansi::enable_mouse(&mut stdout)?;
    } else {
        ansi::disable_mouse(&mut stdout)?;
    }
    stdout.flush()?;

    MOUSE_TRACKING.store(enable, Ordering::Release);
    Ok(())
}

// ─── Signal Bridge ──────────────────────────────────────────────────────────

fn install_signal_handlers() {
    let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
    sa.sa_sigaction = handle_signal as *const () as usize;
    sa.sa_flags = 0;
    unsafe { libc::sigemptyset(&raw mut sa.sa_mask) };

    let mut old: [libc::sigaction; 3] = unsafe { std::mem::zeroed() };
    unsafe {
        libc::sigaction(libc::SIGWINCH, &raw const sa, &raw mut old[0]);
        libc::sigaction(libc::SIGINT, &raw const sa, &raw mut old[1]);
        libc::sigaction(libc::SIGTERM, &raw const sa, &raw mut old[2]);
    }
    *lock(&OLD_ACTIONS) = Some(old);
}

/// The signal handler. Only async-signal-safe calls: atomic loads,
/// `write`, `tcsetattr`, `_exit`.
extern "C" fn handle_signal(sig: libc::c_int) {
    match sig {
        libc::SIGWINCH => {
            let fd = EVENT_FD.load(Ordering::Relaxed);
            if fd != -1 {
                let val = EVENT_CODE_RESIZE;
                unsafe {
                    libc::write(fd, (&raw const val).cast::<libc::c_void>(), 8);
                }
            }
        }
        libc::SIGINT | libc::SIGTERM => {
            restore_terminal_for_exit();
            unsafe {
                libc::write(libc::STDOUT_FILENO, c"\n".as_ptr().cast::<libc::c_void>(), 1);
                libc::_exit(0);
            }
        }
        _ => {}
    }
}

/// Best-effort terminal restore usable from signal handlers: raw writes to
/// fd 1 plus a termios restore. No locks, no allocation.
fn restore_terminal_for_exit() {
    if MOUSE_TRACKING.load(Ordering::Relaxed) {
        const SEQ: &[u8] = b"\x1b[?1000l\x1b[?1002l\x1b[?1006l";
        unsafe {
            libc::write(libc::STDOUT_FILENO, SEQ.as_ptr().cast::<libc::c_void>(), SEQ.len());
        }
    }

    if RAW_MODE.load(Ordering::Relaxed) {
        if let Some(orig) = ORIG_TERMIOS.get() {
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, orig);
            }
        }
        const SHOW: &[u8] = b"\x1b[?25h";
        unsafe {
            libc::write(libc::STDOUT_FILENO, SHOW.as_ptr().cast::<libc::c_void>(), SHOW.len());
        }
    }
}

// ─── Panic Hook ─────────────────────────────────────────────────────────────

/// Install a panic hook that restores the terminal before the panic
/// message prints. Without it, a panic in raw mode leaves the user's shell
/// with no echo and a hidden cursor — and the error itself unreadable.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            // Raw write to fd 1, bypassing the stdout lock: the panic may
            // have fired while that lock was held mid-flush.
            unsafe {
                libc::write(
                    libc::STDOUT_FILENO,
                    EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                    EMERGENCY_RESTORE.len(),
                );
            }
            if let Some(orig) = ORIG_TERMIOS.get() {
                unsafe {
                    libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, orig);
                }
            }
            original(info);
        }));
    });
}

// ─── Tests ──────────────────────────────────────────────────────────────────
