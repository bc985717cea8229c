// SPDX-License-Identifier: MIT
//
// Color — truecolor value type for cell and screen painting.
//
// Three-state model: a concrete RGB triple, the SGR reset, or no color at
// all. `None` is the quiet variant — it serialises to an empty string so a
// "don't touch the color" draw call costs zero bytes on the wire. This is
// also the total-function error value: parsing a bad hex string yields
// `None` rather than an error.
//
// The crate targets truecolor terminals only, so RGB serialises straight to
// the 24-bit SGR forms (38;2 / 48;2) with no 256-color quantisation.

use std::fmt;

/// A terminal color: truecolor RGB, the SGR reset, or no color.
///
/// # Examples
///
/// ```
/// use termx::color::Color;
///
/// let c = Color::from_hex("#ff8800");
/// assert_eq!(c, Color::Rgb(255, 136, 0));
/// assert_eq!(c.to_ansi_fg(), "\x1b[38;2;255;136;0m");
///
/// // Invalid input degrades to the no-op color.
/// assert_eq!(Color::from_hex("not-a-color"), Color::None);
/// assert_eq!(Color::None.to_ansi_fg(), "");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// 24-bit RGB.
    Rgb(u8, u8, u8),
    /// SGR reset — restores the terminal's default colors and attributes.
    Reset,
    /// No color: serialises to nothing, draws nothing.
    #[default]
    None,
}

impl Color {
    // ─── Presets ─────────────────────────────────────────────────────────

    pub const BLACK: Self = Self::Rgb(0, 0, 0);
    pub const WHITE: Self = Self::Rgb(255, 255, 255);
    pub const RED: Self = Self::Rgb(255, 0, 0);
    pub const GREEN: Self = Self::Rgb(0, 255, 0);
    pub const BLUE: Self = Self::Rgb(0, 0, 255);
    pub const YELLOW: Self = Self::Rgb(255, 255, 0);
    pub const CYAN: Self = Self::Rgb(0, 255, 255);
    pub const MAGENTA: Self = Self::Rgb(255, 0, 255);
    pub const GRAY: Self = Self::Rgb(128, 128, 128);
    pub const RESET: Self = Self::Reset;

    // ─── Construction ────────────────────────────────────────────────────

    /// Create a color from an RGB triple.
    #[inline]
    #[must_use]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb(r, g, b)
    }

    /// Parse a six-hex-digit color string, with or without a leading `#`.
    ///
    /// Total: anything that is not exactly six hex digits yields
    /// [`Color::None`].
    #[must_use]
    pub fn from_hex(s: &str) -> Self {
        let hex = s.strip_prefix('#').unwrap_or(s);

        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::None;
        }

        // The length/digit check above makes these conversions infallible.
        let parse = |range| u8::from_str_radix(&hex[range], 16).unwrap_or(0);
        Self::Rgb(parse(0..2), parse(2..4), parse(4..6))
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Whether this color produces output when serialised.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::None)
    }

    // ─── Serialisation ───────────────────────────────────────────────────

    /// The SGR sequence that sets this color as the foreground.
    ///
    /// `Rgb` → `ESC[38;2;R;G;Bm`, `Reset` → `ESC[0m`, `None` → `""`.
    #[must_use]
    pub fn to_ansi_fg(self) -> String {
        match self {
            Self::Rgb(r, g, b) => format!("\x1b[38;2;{r};{g};{b}m"),
            Self::Reset => "\x1b[0m".to_string(),
            Self::None => String::new(),
        }
    }

    /// The SGR sequence that sets this color as the background.
    ///
    /// `Rgb` → `ESC[48;2;R;G;Bm`, `Reset` → `ESC[0m`, `None` → `""`.
    #[must_use]
    pub fn to_ansi_bg(self) -> String {
        match self {
            Self::Rgb(r, g, b) => format!("\x1b[48;2;{r};{g};{b}m"),
            Self::Reset => "\x1b[0m".to_string(),
            Self::None => String::new(),
        }
    }

    /// Uppercase `#RRGGBB` form, or the empty string for non-RGB colors.
    #[must_use]
    pub fn to_hex(self) -> String {
        match self {
            Self::Rgb(r, g, b) => format!("#{r:02X}{g:02X}{b:02X}"),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb(r, g, b) => write!(f, "rgb({r}, {g}, {b})"),
            Self::Reset => f.write_str("reset"),
            Self::None => f.write_str("none"),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
