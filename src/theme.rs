use crate::color_mode::smart_color;
use once_cell::sync::Lazy;
use ratatui::style::{Color, Modifier, Style};

// Color palette structure
#[derive(Clone)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Comments, invisibles
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Light background
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
    pub base_0e: Color, // Purple
    pub base_0f: Color, // Brown
}

/// Per-role text styles applied by the compositor. Hosts either derive a
/// bundle from a palette or assemble one field by field.
#[derive(Clone, Debug)]
pub struct InlineStyles {
    pub base: Style,
    pub code: Style,
    pub emphasis: Style,
    pub strong: Style,
    pub strikethrough: Style,
    pub link: Style,
    pub image: Style,
}

impl InlineStyles {
    pub fn from_palette(palette: &Base16Palette) -> Self {
        Self {
            base: Style::default().fg(palette.base_05),
            code: Style::default().fg(palette.base_0b).bg(palette.base_01),
            emphasis: Style::default().add_modifier(Modifier::ITALIC),
            strong: Style::default()
                .fg(palette.base_08)
                .add_modifier(Modifier::BOLD),
            strikethrough: Style::default().add_modifier(Modifier::CROSSED_OUT),
            link: Style::default()
                .fg(palette.base_0c)
                .add_modifier(Modifier::UNDERLINED),
            image: Style::default().fg(palette.base_0d),
        }
    }
}

impl Default for InlineStyles {
    fn default() -> Self {
        Self::from_palette(&OCEANIC_NEXT)
    }
}

pub const DEFAULT_PALETTE_NAME: &str = "Oceanic Next";

/// Built-in palette lookup by display name.
pub fn palette_by_name(name: &str) -> Option<&'static Base16Palette> {
    match name {
        "Oceanic Next" => Some(&OCEANIC_NEXT),
        "Kanagawa" => Some(&KANAGAWA),
        _ => None,
    }
}

pub fn all_palette_names() -> &'static [&'static str] {
    &["Oceanic Next", "Kanagawa"]
}

// ============================================================================
// Built-in theme palettes
// ============================================================================

// Oceanic Next theme
pub static OCEANIC_NEXT: Lazy<Base16Palette> = Lazy::new(|| Base16Palette {
    base_00: smart_color(0x1B2B34),
    base_01: smart_color(0x343D46),
    base_02: smart_color(0x4F5B66),
    base_03: smart_color(0x65737E),
    base_04: smart_color(0xA7ADBA),
    base_05: smart_color(0xC0C5CE),
    base_06: smart_color(0xCDD3DE),
    base_07: smart_color(0xF0F4F8),
    base_08: smart_color(0xEC5F67),
    base_09: smart_color(0xF99157),
    base_0a: smart_color(0xFAC863),
    base_0b: smart_color(0x99C794),
    base_0c: smart_color(0x5FB3B3),
    base_0d: smart_color(0x6699CC),
    base_0e: smart_color(0xC594C5),
    base_0f: smart_color(0xAB7967),
});

// Kanagawa theme - Japanese-inspired warm tones
pub static KANAGAWA: Lazy<Base16Palette> = Lazy::new(|| Base16Palette {
    base_00: smart_color(0x1F1F28),
    base_01: smart_color(0x2A2A37),
    base_02: smart_color(0x223249),
    base_03: smart_color(0x727169),
    base_04: smart_color(0xC8C093),
    base_05: smart_color(0xDCD7BA),
    base_06: smart_color(0xDCD7BA),
    base_07: smart_color(0xE6E0C2),
    base_08: smart_color(0xC34043),
    base_09: smart_color(0xFFA066),
    base_0a: smart_color(0xDCA561),
    base_0b: smart_color(0x98BB6C),
    base_0c: smart_color(0x7FB4CA),
    base_0d: smart_color(0x7E9CD8),
    base_0e: smart_color(0x957FB8),
    base_0f: smart_color(0xD27E99),
});
