use crate::compose;
use crate::context::RenderContext;
use crate::flow::{self, FlowItemKind, FlowLayout, FlowUnit};
use crate::node::{self, InlineNode};
use crate::provider::ImageProvider;
use crate::resolver::{ImageResolver, ImageTable};
use log::debug;
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use std::sync::Arc;
use url::Url;

/// How a sequence is rendered. Merged text composes everything into one
/// wrapped block; mixed flow gives each top-level image its own box so it
/// can be tapped individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    MergedText,
    MixedFlow,
}

/// Outcome of a pointer activation inside the rendered area.
#[derive(Clone, Debug, PartialEq)]
pub enum Activation {
    None,
    /// The tap action fired for an image; carries its resolved source.
    Tapped(Option<Url>),
    /// A link (or linked image without a tap action) wants the host to
    /// open this destination.
    Navigate(Url),
}

struct LayoutCache {
    width: u16,
    layout: FlowLayout,
}

/// Widget-like wrapper around one inline sequence. Owns the resolver and
/// the published image table, caches the layout per width, and remembers
/// its last drawn area so pointer events can be routed back to items.
pub struct InlineView {
    nodes: Vec<InlineNode>,
    context: RenderContext,
    resolver: ImageResolver,
    images: ImageTable,
    sequence_id: u64,
    cache: Option<LayoutCache>,
    last_area: Option<Rect>,
}

impl InlineView {
    pub fn new(provider: Arc<dyn ImageProvider>, context: RenderContext) -> Self {
        Self {
            nodes: Vec::new(),
            context,
            resolver: ImageResolver::new(provider),
            images: ImageTable::new(),
            sequence_id: node::sequence_identity(&[]),
            cache: None,
            last_area: None,
        }
    }

    pub fn nodes(&self) -> &[InlineNode] {
        &self.nodes
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn images(&self) -> &ImageTable {
        &self.images
    }

    /// Replace the sequence. Resolution restarts only when the content
    /// identity actually changed; setting the same nodes again is free and
    /// keeps the already published table.
    pub fn set_nodes(&mut self, nodes: Vec<InlineNode>) {
        let identity = node::sequence_identity(&nodes);
        if identity == self.sequence_id {
            self.nodes = nodes;
            return;
        }
        debug!("inline sequence replaced, restarting image resolution");
        self.sequence_id = identity;
        self.nodes = nodes;
        self.images = ImageTable::new();
        self.resolver.request(&self.nodes, &self.context);
        self.cache = None;
    }

    /// Swap the render context. Never restarts resolution; the table keys
    /// on sequence content, not presentation.
    pub fn set_context(&mut self, context: RenderContext) {
        self.context = context;
        self.cache = None;
    }

    pub fn strategy(&self) -> Strategy {
        if self.context.image_tap_action.is_some() && node::has_images(&self.nodes) {
            Strategy::MixedFlow
        } else {
            Strategy::MergedText
        }
    }

    /// Pump pending image resolution. Returns true when a fresh table was
    /// published and the view needs a redraw.
    pub fn poll_images(&mut self) -> bool {
        if let Some(table) = self.resolver.poll() {
            self.images = table;
            self.cache = None;
            return true;
        }
        false
    }

    /// Resolve the current sequence synchronously. Useful for one-shot
    /// rendering where there is no event loop to poll from. A request
    /// already in flight for these nodes is drained, not restarted.
    pub fn resolve_images_blocking(&mut self) {
        if self.resolver.is_pending() {
            if let Some(table) = self.resolver.wait() {
                self.images = table;
                self.cache = None;
            }
            return;
        }
        self.images = self.resolver.resolve_blocking(&self.nodes, &self.context);
        self.cache = None;
    }

    pub fn is_resolving(&self) -> bool {
        self.resolver.is_pending()
    }

    pub fn height_for_width(&mut self, width: u16) -> u16 {
        self.ensure_layout(width);
        self.cache.as_ref().map(|c| c.layout.height).unwrap_or(0)
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.last_area = Some(area);
        if area.width == 0 || area.height == 0 {
            return;
        }
        self.ensure_layout(area.width);
        let Some(cache) = &self.cache else {
            return;
        };
        for item in &cache.layout.items {
            if item.x >= area.width {
                continue;
            }
            let max_width = area.width - item.x;
            match &item.kind {
                FlowItemKind::Text { line, .. } => {
                    if item.y < area.height {
                        buf.set_line(area.x + item.x, area.y + item.y, line, max_width);
                    }
                }
                FlowItemKind::Image(placed) => {
                    for (row, line) in placed.lines.iter().enumerate() {
                        let y = item.y + row as u16;
                        if y >= area.height {
                            break;
                        }
                        buf.set_line(area.x + item.x, area.y + y, line, max_width);
                    }
                }
            }
        }
    }

    /// Route a pointer press at absolute screen coordinates. Images with a
    /// tap action fire it and report `Tapped`; otherwise linked images and
    /// link text resolve to `Navigate` for the host to open.
    pub fn activate_at(&self, column: u16, row: u16) -> Activation {
        let Some(area) = self.last_area else {
            return Activation::None;
        };
        if !area.contains(Position::new(column, row)) {
            return Activation::None;
        }
        let Some(cache) = &self.cache else {
            return Activation::None;
        };
        let local_x = column - area.x;
        let local_y = row - area.y;

        for item in &cache.layout.items {
            let inside_x = local_x >= item.x && local_x < item.x + item.width;
            let inside_y = local_y >= item.y && local_y < item.y + item.height;
            if !(inside_x && inside_y) {
                continue;
            }
            return match &item.kind {
                FlowItemKind::Image(placed) => {
                    if let Some(action) = &self.context.image_tap_action {
                        action(placed.url.as_ref());
                        return Activation::Tapped(placed.url.clone());
                    }
                    placed
                        .data
                        .destination
                        .as_deref()
                        .and_then(|dest| self.context.resolve_link_url(dest))
                        .map(Activation::Navigate)
                        .unwrap_or(Activation::None)
                }
                FlowItemKind::Text { links, .. } => {
                    let col = local_x - item.x;
                    links
                        .iter()
                        .find(|range| col >= range.start_col && col < range.end_col)
                        .and_then(|range| range.target.url.clone())
                        .map(Activation::Navigate)
                        .unwrap_or(Activation::None)
                }
            };
        }
        Activation::None
    }

    fn ensure_layout(&mut self, width: u16) {
        let stale = match &self.cache {
            Some(cache) => cache.width != width,
            None => true,
        };
        if stale {
            self.cache = Some(LayoutCache {
                width,
                layout: self.build_layout(width),
            });
        }
    }

    fn build_layout(&self, width: u16) -> FlowLayout {
        let units = match self.strategy() {
            Strategy::MixedFlow => flow::partition_units(&self.nodes, &self.context, &self.images),
            Strategy::MergedText => {
                let spans = compose::collect_spans(&self.nodes, &self.context, &self.images);
                vec![FlowUnit::Text(spans)]
            }
        };
        flow::layout(&units, &self.context, &self.images, width)
    }
}
