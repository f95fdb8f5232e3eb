use std::sync::LazyLock;

use regex::Regex;

/// Color given to notes created without one.
pub const DEFAULT_NOTE_COLOR: &str = "#D8E2DC";

/// Quick-pick swatches offered by the editor.
pub const COLOR_PALETTE: [&str; 5] = ["#fff24b", "#66a3ff", "#ff215d", "#a940fc", "#58ff4a"];

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("hex color pattern is valid")
});

/// Returns true for `#RGB` and `#RRGGBB` hex codes.
pub fn is_valid_hex_color(color: &str) -> bool {
    HEX_COLOR.is_match(color)
}
