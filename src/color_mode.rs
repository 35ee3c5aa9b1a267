use log::debug;
use ratatui::style::Color;
use std::sync::OnceLock;

/// True when the terminal advertises 24-bit color support.
///
/// Probed once from `COLORTERM` and cached for the process lifetime.
pub fn supports_true_color() -> bool {
    static TRUE_COLOR: OnceLock<bool> = OnceLock::new();
    *TRUE_COLOR.get_or_init(|| {
        let colorterm = std::env::var("COLORTERM").unwrap_or_default();
        let supported =
            colorterm.eq_ignore_ascii_case("truecolor") || colorterm.eq_ignore_ascii_case("24bit");
        debug!("true color support: {supported} (COLORTERM={colorterm:?})");
        supported
    })
}

/// Best displayable color for a 24-bit RGB value: direct RGB on true-color
/// terminals, the nearest xterm-256 index otherwise.
pub fn smart_color(rgb: u32) -> Color {
    let r = ((rgb >> 16) & 0xFF) as u8;
    let g = ((rgb >> 8) & 0xFF) as u8;
    let b = (rgb & 0xFF) as u8;

    if supports_true_color() {
        Color::Rgb(r, g, b)
    } else {
        Color::Indexed(nearest_indexed(r, g, b))
    }
}

/// Map RGB to the xterm-256 palette: the grayscale ramp for near-gray
/// values, the 6x6x6 color cube for everything else.
fn nearest_indexed(r: u8, g: u8, b: u8) -> u8 {
    if r.abs_diff(g) < 12 && g.abs_diff(b) < 12 && r.abs_diff(b) < 12 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        if gray < 8 {
            return 16; // cube black
        }
        if gray > 238 {
            return 231; // cube white
        }
        return 232 + ((gray - 8) / 10) as u8;
    }

    let to_cube = |c: u8| -> u8 {
        if c < 48 {
            0
        } else if c < 114 {
            1
        } else {
            ((c as u16 - 35) / 40) as u8
        }
    };

    16 + 36 * to_cube(r) + 6 * to_cube(g) + to_cube(b)
}
