use crate::compose::{self, InlineSpan, LinkTarget};
use crate::context::RenderContext;
use crate::halfblocks;
use crate::node::{ImageData, InlineNode};
use crate::resolver::ImageTable;
use image::GenericImageView;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use std::sync::Arc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use url::Url;

/// One ordered unit of a mixed inline flow: a styled text run or a
/// discrete, individually addressable image.
pub enum FlowUnit {
    Text(Vec<InlineSpan>),
    Image(ImageData),
}

/// A clickable range inside a flow text item, in columns relative to the
/// item's left edge.
#[derive(Clone, Debug)]
pub struct LinkRange {
    pub start_col: u16,
    pub end_col: u16,
    pub target: Arc<LinkTarget>,
}

/// An image sized and rendered for its slot: half-block art when resolved,
/// an alt-text placeholder while the reference is still unresolved.
pub struct PlacedImage {
    pub data: ImageData,
    pub url: Option<Url>,
    pub cols: u16,
    pub rows: u16,
    pub resolved: bool,
    pub lines: Vec<Line<'static>>,
}

pub enum FlowItemKind {
    Text {
        line: Line<'static>,
        links: Vec<LinkRange>,
    },
    Image(PlacedImage),
}

/// One laid-out box. Positions are relative to the layout origin.
pub struct FlowItem {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub kind: FlowItemKind,
}

#[derive(Default)]
pub struct FlowLayout {
    pub items: Vec<FlowItem>,
    pub width: u16,
    pub height: u16,
}

/// Partition a sequence for the mixed-flow path: every image-bearing node
/// stands alone, maximal runs of everything else merge into single text
/// units rendered through the compositor. Source order is preserved.
pub fn partition_units(
    nodes: &[InlineNode],
    context: &RenderContext,
    images: &ImageTable,
) -> Vec<FlowUnit> {
    let mut units = Vec::new();
    let mut run_start = 0;
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(data) = node.image_data() {
            if idx > run_start {
                units.push(FlowUnit::Text(compose::collect_spans(
                    &nodes[run_start..idx],
                    context,
                    images,
                )));
            }
            units.push(FlowUnit::Image(data));
            run_start = idx + 1;
        }
    }
    if run_start < nodes.len() {
        units.push(FlowUnit::Text(compose::collect_spans(
            &nodes[run_start..],
            context,
            images,
        )));
    }
    units
}

/// Lay units out left to right. With flow-wrap support, rows fill until
/// horizontal space runs out and then advance by the tallest member plus
/// the derived unit spacing; text re-flows at word granularity. Without
/// it, everything stacks on a single row and the host clips the overflow.
pub fn layout(
    units: &[FlowUnit],
    context: &RenderContext,
    images: &ImageTable,
    width: u16,
) -> FlowLayout {
    let width = width.max(1);
    let (h_gap, v_gap) = context.unit_spacing();
    let mut engine = Engine {
        width,
        h_gap,
        v_gap,
        wrap: context.flow_wrap,
        x: 0,
        y: 0,
        row_items: Vec::new(),
        row_height: 0,
        pending: Vec::new(),
        pending_start: 0,
        last_unit: None,
        items: Vec::new(),
    };

    for atom in atomize(units) {
        match atom {
            Atom::Word { cells, width, unit } => engine.place_word(cells, width, unit),
            Atom::Space { cells, width, unit } => engine.place_space(cells, width, unit),
            Atom::Break => engine.place_break(),
            Atom::Image { data, unit } => engine.place_image(data, unit, context, images),
        }
    }
    engine.finish()
}

/// One display cell of text, annotated with the style and link scope of
/// the span it came from.
struct TextCell {
    ch: char,
    width: u16,
    style: Style,
    link: Option<Arc<LinkTarget>>,
}

enum Atom {
    Word {
        cells: Vec<TextCell>,
        width: u16,
        unit: usize,
    },
    Space {
        cells: Vec<TextCell>,
        width: u16,
        unit: usize,
    },
    Break,
    Image {
        data: ImageData,
        unit: usize,
    },
}

fn atomize(units: &[FlowUnit]) -> Vec<Atom> {
    let mut atoms = Vec::new();
    for (unit_index, unit) in units.iter().enumerate() {
        match unit {
            FlowUnit::Image(data) => atoms.push(Atom::Image {
                data: data.clone(),
                unit: unit_index,
            }),
            FlowUnit::Text(spans) => {
                let mut word: Vec<TextCell> = Vec::new();
                let mut space: Vec<TextCell> = Vec::new();
                for span in spans {
                    match span {
                        InlineSpan::HardBreak => {
                            flush_cells(&mut word, unit_index, false, &mut atoms);
                            flush_cells(&mut space, unit_index, true, &mut atoms);
                            atoms.push(Atom::Break);
                        }
                        InlineSpan::Text { span, link } => {
                            for ch in span.content.chars() {
                                let cell = TextCell {
                                    ch,
                                    width: ch.width().unwrap_or(0) as u16,
                                    style: span.style,
                                    link: link.clone(),
                                };
                                if ch.is_whitespace() {
                                    flush_cells(&mut word, unit_index, false, &mut atoms);
                                    space.push(cell);
                                } else {
                                    flush_cells(&mut space, unit_index, true, &mut atoms);
                                    word.push(cell);
                                }
                            }
                        }
                    }
                }
                flush_cells(&mut word, unit_index, false, &mut atoms);
                flush_cells(&mut space, unit_index, true, &mut atoms);
            }
        }
    }
    atoms
}

fn flush_cells(cells: &mut Vec<TextCell>, unit: usize, is_space: bool, atoms: &mut Vec<Atom>) {
    if cells.is_empty() {
        return;
    }
    let width = cells.iter().map(|c| c.width).sum();
    let cells = std::mem::take(cells);
    atoms.push(if is_space {
        Atom::Space { cells, width, unit }
    } else {
        Atom::Word { cells, width, unit }
    });
}

struct Engine {
    width: u16,
    h_gap: u16,
    v_gap: u16,
    wrap: bool,
    x: u16,
    y: u16,
    row_items: Vec<FlowItem>,
    row_height: u16,
    pending: Vec<TextCell>,
    pending_start: u16,
    last_unit: Option<usize>,
    items: Vec<FlowItem>,
}

impl Engine {
    fn has_row_content(&self) -> bool {
        !self.row_items.is_empty() || !self.pending.is_empty()
    }

    /// Unit spacing applies between adjacent boxes of different units,
    /// never at a row start.
    fn gap_for(&self, unit: usize) -> u16 {
        if !self.has_row_content() {
            return 0;
        }
        match self.last_unit {
            Some(prev) if prev != unit => self.h_gap,
            _ => 0,
        }
    }

    fn place_word(&mut self, cells: Vec<TextCell>, width: u16, unit: usize) {
        if self.wrap && width > self.width {
            self.place_split_word(cells, unit);
            return;
        }
        let gap = self.gap_for(unit);
        if self.wrap && self.has_row_content() && self.x + gap + width > self.width {
            self.wrap_row();
        }
        let gap = self.gap_for(unit);
        self.append_cells(cells, width, unit, gap);
    }

    /// A word wider than the whole area fills rows cell by cell.
    fn place_split_word(&mut self, cells: Vec<TextCell>, unit: usize) {
        let mut iter = cells.into_iter().peekable();
        while iter.peek().is_some() {
            let gap = self.gap_for(unit);
            let avail = self.width.saturating_sub(self.x + gap);
            let mut chunk = Vec::new();
            let mut chunk_width = 0;
            while let Some(cell) = iter.peek() {
                if chunk_width + cell.width > avail {
                    break;
                }
                let cell = iter.next().expect("peeked");
                chunk_width += cell.width;
                chunk.push(cell);
            }
            if chunk.is_empty() {
                if self.x == 0 && !self.has_row_content() {
                    // a single cell wider than the area; place it and clip
                    let cell = iter.next().expect("peeked");
                    let cell_width = cell.width;
                    self.append_cells(vec![cell], cell_width, unit, 0);
                } else {
                    self.wrap_row();
                }
                continue;
            }
            let gap = self.gap_for(unit);
            self.append_cells(chunk, chunk_width, unit, gap);
        }
    }

    fn place_space(&mut self, cells: Vec<TextCell>, width: u16, unit: usize) {
        if !self.has_row_content() {
            return; // leading whitespace never opens a row
        }
        if self.wrap && self.x + width > self.width {
            self.wrap_row();
            return; // the space itself dies at the wrap point
        }
        self.append_cells(cells, width, unit, 0);
    }

    fn place_break(&mut self) {
        if self.wrap {
            self.flush_text(true);
            self.flush_row();
        } else {
            self.flush_text(false);
        }
    }

    fn place_image(
        &mut self,
        data: ImageData,
        unit: usize,
        context: &RenderContext,
        images: &ImageTable,
    ) {
        let url = context.resolve_image_url(&data.source);
        let placed = build_placed(data, url, context, images, self.width);
        let gap = self.gap_for(unit);
        if self.wrap && self.has_row_content() && self.x + gap + placed.cols > self.width {
            self.wrap_row();
        }
        self.flush_text(false);
        let gap = self.gap_for(unit);
        self.x += gap;

        let (cols, rows) = (placed.cols, placed.rows);
        self.row_items.push(FlowItem {
            x: self.x,
            y: 0,
            width: cols,
            height: rows,
            kind: FlowItemKind::Image(placed),
        });
        self.row_height = self.row_height.max(rows);
        self.x += cols;
        self.last_unit = Some(unit);
    }

    fn append_cells(&mut self, cells: Vec<TextCell>, width: u16, unit: usize, gap: u16) {
        if gap > 0 {
            self.flush_text(false);
            self.x += gap;
        }
        if self.pending.is_empty() {
            self.pending_start = self.x;
        }
        self.pending.extend(cells);
        self.x += width;
        self.row_height = self.row_height.max(1);
        self.last_unit = Some(unit);
    }

    fn wrap_row(&mut self) {
        self.flush_text(true);
        self.flush_row();
    }

    /// Close the pending text run into one item, merging consecutive cells
    /// that share a style and link scope back into spans.
    fn flush_text(&mut self, trim_trailing: bool) {
        if trim_trailing {
            while self
                .pending
                .last()
                .map(|cell| cell.ch.is_whitespace())
                .unwrap_or(false)
            {
                if let Some(cell) = self.pending.pop() {
                    self.x = self.x.saturating_sub(cell.width);
                }
            }
        }
        if self.pending.is_empty() {
            return;
        }
        let cells = std::mem::take(&mut self.pending);
        let width: u16 = cells.iter().map(|c| c.width).sum();

        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut links: Vec<LinkRange> = Vec::new();
        let mut run = String::new();
        let mut run_style = cells[0].style;
        let mut run_link = cells[0].link.clone();
        let mut run_start: u16 = 0;
        let mut col: u16 = 0;

        for cell in &cells {
            let same_link = match (&cell.link, &run_link) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            if !(cell.style == run_style && same_link) {
                if !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), run_style));
                    if let Some(target) = run_link.clone() {
                        links.push(LinkRange {
                            start_col: run_start,
                            end_col: col,
                            target,
                        });
                    }
                }
                run_style = cell.style;
                run_link = cell.link.clone();
                run_start = col;
            }
            run.push(cell.ch);
            col += cell.width;
        }
        if !run.is_empty() {
            spans.push(Span::styled(run, run_style));
            if let Some(target) = run_link {
                links.push(LinkRange {
                    start_col: run_start,
                    end_col: col,
                    target,
                });
            }
        }

        self.row_items.push(FlowItem {
            x: self.pending_start,
            y: 0,
            width,
            height: 1,
            kind: FlowItemKind::Text {
                line: Line::from(spans),
                links,
            },
        });
        self.row_height = self.row_height.max(1);
    }

    fn flush_row(&mut self) {
        let height = if self.row_items.is_empty() {
            1
        } else {
            self.row_height.max(1)
        };
        let row = std::mem::take(&mut self.row_items);
        for mut item in row {
            item.y = self.y;
            self.items.push(item);
        }
        self.y += height + self.v_gap;
        self.x = 0;
        self.row_height = 0;
        self.last_unit = None;
        self.pending_start = 0;
    }

    fn finish(mut self) -> FlowLayout {
        self.flush_text(true);
        if !self.row_items.is_empty() {
            self.flush_row();
        }
        let height = self
            .items
            .iter()
            .map(|item| item.y + item.height)
            .max()
            .unwrap_or(0);
        FlowLayout {
            items: self.items,
            width: self.width,
            height,
        }
    }
}

fn build_placed(
    data: ImageData,
    url: Option<Url>,
    context: &RenderContext,
    images: &ImageTable,
    max_width: u16,
) -> PlacedImage {
    if context.cell_art {
        if let Some(image) = images.get(&data.source) {
            let (px_w, px_h) = image.dimensions();
            let (cols, rows) = halfblocks::cell_size(px_w, px_h, context.cell_metrics, max_width);
            return PlacedImage {
                lines: halfblocks::render_cells(image, cols, rows),
                cols,
                rows,
                resolved: true,
                url,
                data,
            };
        }
    }

    let label = if data.alt.is_empty() {
        "[image]".to_string()
    } else {
        format!("[image: {}]", data.alt)
    };
    let cols = (label.as_str().width() as u16).clamp(1, max_width.max(1));
    PlacedImage {
        lines: vec![Line::from(Span::styled(label, context.styles.image))],
        cols,
        rows: 1,
        resolved: false,
        url,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{image, solid_image, test_context, text};

    fn text_unit(content: &str) -> FlowUnit {
        FlowUnit::Text(compose::collect_spans(
            &[text(content)],
            &test_context(),
            &ImageTable::new(),
        ))
    }

    fn item_string(item: &FlowItem) -> String {
        match &item.kind {
            FlowItemKind::Text { line, .. } => {
                line.spans.iter().map(|s| s.content.as_ref()).collect()
            }
            FlowItemKind::Image(placed) => format!("<image {}>", placed.data.source),
        }
    }

    #[test]
    fn test_partition_keeps_source_order() {
        let nodes = vec![text("See "), image("a.png", "A"), text(" here")];
        let units = partition_units(&nodes, &test_context(), &ImageTable::new());
        assert_eq!(units.len(), 3);
        assert!(matches!(units[0], FlowUnit::Text(_)));
        assert!(matches!(units[1], FlowUnit::Image(_)));
        assert!(matches!(units[2], FlowUnit::Text(_)));
    }

    #[test]
    fn test_text_wraps_at_word_boundaries() {
        let units = vec![text_unit("alpha beta gamma")];
        let layout = layout(&units, &test_context(), &ImageTable::new(), 11);

        assert_eq!(layout.items.len(), 2);
        assert_eq!(item_string(&layout.items[0]), "alpha beta");
        assert_eq!(layout.items[0].y, 0);
        assert_eq!(item_string(&layout.items[1]), "gamma");
        assert_eq!(layout.items[1].y, 1);
        assert_eq!(layout.height, 2);
    }

    #[test]
    fn test_oversized_word_splits_across_rows() {
        let units = vec![text_unit("abcdefghij")];
        let layout = layout(&units, &test_context(), &ImageTable::new(), 4);

        let rendered: Vec<String> = layout.items.iter().map(item_string).collect();
        assert_eq!(rendered, vec!["abcd", "efgh", "ij"]);
        assert_eq!(layout.height, 3);
    }

    #[test]
    fn test_unresolved_image_becomes_alt_placeholder() {
        let nodes = vec![image("a.png", "A chart")];
        let units = partition_units(&nodes, &test_context(), &ImageTable::new());
        let layout = layout(&units, &test_context(), &ImageTable::new(), 40);

        assert_eq!(layout.items.len(), 1);
        let FlowItemKind::Image(placed) = &layout.items[0].kind else {
            panic!("expected an image item");
        };
        assert!(!placed.resolved);
        assert_eq!(placed.rows, 1);
        let label: String = placed.lines[0]
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(label, "[image: A chart]");
    }

    #[test]
    fn test_resolved_image_takes_its_art_footprint() {
        let mut images = ImageTable::new();
        images.insert(
            "a.png".to_string(),
            Arc::new(solid_image(400, 400, [9, 9, 9])),
        );
        let nodes = vec![image("a.png", "A")];
        let units = partition_units(&nodes, &test_context(), &images);
        let layout = layout(&units, &test_context(), &images, 80);

        assert_eq!(layout.items.len(), 1);
        assert_eq!(layout.items[0].width, 30);
        assert_eq!(layout.items[0].height, 15);
        assert_eq!(layout.height, 15);
    }

    #[test]
    fn test_unit_gap_between_text_and_image() {
        let mut images = ImageTable::new();
        images.insert(
            "a.png".to_string(),
            Arc::new(solid_image(100, 100, [9, 9, 9])),
        );
        let nodes = vec![text("hi"), image("a.png", "A")];
        let units = partition_units(&nodes, &test_context(), &images);
        let layout = layout(&units, &test_context(), &images, 80);

        assert_eq!(layout.items.len(), 2);
        assert_eq!(layout.items[0].width, 2);
        // one spacing column between the text box and the image box
        assert_eq!(layout.items[1].x, 3);
    }

    #[test]
    fn test_full_row_pushes_image_down() {
        let mut images = ImageTable::new();
        images.insert(
            "a.png".to_string(),
            Arc::new(solid_image(400, 400, [9, 9, 9])),
        );
        let nodes = vec![text("aaaaaaaa"), image("a.png", "A")];
        let units = partition_units(&nodes, &test_context(), &images);
        let layout = layout(&units, &test_context(), &images, 10);

        assert_eq!(layout.items[0].y, 0);
        assert_eq!(layout.items[1].y, 1);
        assert_eq!(layout.items[1].x, 0);
    }

    #[test]
    fn test_hard_break_forces_new_row() {
        let spans = compose::collect_spans(
            &[text("a"), InlineNode::LineBreak, text("b")],
            &test_context(),
            &ImageTable::new(),
        );
        let layout = layout(&[FlowUnit::Text(spans)], &test_context(), &ImageTable::new(), 40);
        assert_eq!(layout.items.len(), 2);
        assert_eq!(layout.items[0].y, 0);
        assert_eq!(layout.items[1].y, 1);
    }

    #[test]
    fn test_single_row_fallback_never_wraps() {
        let mut images = ImageTable::new();
        images.insert(
            "a.png".to_string(),
            Arc::new(solid_image(400, 400, [9, 9, 9])),
        );
        let nodes = vec![text("some leading words"), image("a.png", "A"), text("tail")];
        let context = test_context().with_flow_wrap(false);
        let units = partition_units(&nodes, &context, &images);
        let layout = layout(&units, &context, &images, 10);

        assert!(layout.items.len() >= 3);
        for item in &layout.items {
            assert_eq!(item.y, 0);
        }
        assert_eq!(layout.height, 15);
    }
}
