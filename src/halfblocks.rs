use crate::context::CellMetrics;
use image::{DynamicImage, GenericImageView, imageops::FilterType};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

/// Height for regular images in terminal cells
pub const IMAGE_HEIGHT_REGULAR: u16 = 15;
/// Height for wide images (aspect ratio > 3:1) in terminal cells
pub const IMAGE_HEIGHT_WIDE: u16 = 7;
/// Aspect ratio threshold for wide images
pub const WIDE_IMAGE_ASPECT_RATIO: f32 = 3.0;
/// Column cap for the one-row glyph strip used inside merged text
pub const INLINE_GLYPH_MAX_COLS: u16 = 16;

const UPPER_HALF_BLOCK: &str = "▀";

/// Cell footprint for an image: fixed height from the tall/wide rule,
/// width derived from the aspect ratio and the cell raster, capped at
/// `max_width`.
pub fn cell_size(width: u32, height: u32, cell: CellMetrics, max_width: u16) -> (u16, u16) {
    let aspect = width as f32 / height.max(1) as f32;
    let rows = if aspect > WIDE_IMAGE_ASPECT_RATIO || height < 150 {
        IMAGE_HEIGHT_WIDE
    } else {
        IMAGE_HEIGHT_REGULAR
    };
    let cols = cols_for(aspect, rows, cell).min(max_width.max(1));
    (cols, rows)
}

/// Columns that keep the displayed aspect ratio at the given row count.
/// Cells are taller than wide, so a square image needs roughly twice as
/// many columns as rows.
fn cols_for(aspect: f32, rows: u16, cell: CellMetrics) -> u16 {
    let cell_ratio = cell.height_px as f32 / cell.width_px.max(1) as f32;
    ((aspect * rows as f32 * cell_ratio).round() as u16).max(1)
}

/// Render an image into half-block cell art. Each cell shows two vertically
/// stacked pixels: the upper one as the `▀` foreground, the lower as the
/// background.
pub fn render_cells(image: &DynamicImage, cols: u16, rows: u16) -> Vec<Line<'static>> {
    if cols == 0 || rows == 0 {
        return Vec::new();
    }
    let resized = image.resize_exact(cols as u32, rows as u32 * 2, FilterType::Nearest);
    let rgba = resized.to_rgba8();

    let mut lines = Vec::with_capacity(rows as usize);
    for row in 0..rows as u32 {
        let mut spans = Vec::with_capacity(cols as usize);
        for col in 0..cols as u32 {
            let top = rgba.get_pixel(col, row * 2);
            let bottom = rgba.get_pixel(col, row * 2 + 1);
            spans.push(Span::styled(
                UPPER_HALF_BLOCK,
                Style::default()
                    .fg(Color::Rgb(top[0], top[1], top[2]))
                    .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
            ));
        }
        lines.push(Line::from(spans));
    }
    lines
}

/// One-row strip for images riding inline inside merged text. At cell
/// raster this is a 2-pixel-tall thumbnail; width follows the aspect
/// ratio, capped so a banner cannot swallow the line.
pub fn glyph_strip(image: &DynamicImage, cell: CellMetrics) -> Vec<Span<'static>> {
    let (width, height) = image.dimensions();
    let aspect = width as f32 / height.max(1) as f32;
    let cols = cols_for(aspect, 1, cell).min(INLINE_GLYPH_MAX_COLS);
    render_cells(image, cols, 1)
        .into_iter()
        .flat_map(|line| line.spans)
        .collect()
}
