use crate::context::{RenderContext, SoftBreakMode};
use crate::flow::{self, FlowItemKind, FlowLayout, FlowUnit};
use crate::halfblocks;
use crate::node::InlineNode;
use crate::resolver::ImageTable;
use ratatui::style::Style;
use ratatui::text::{Line, Span, Text};
use std::sync::Arc;
use url::Url;

/// Navigation target attached to the spans of a link subtree. `url` is the
/// destination resolved against the context's link base, when resolvable.
#[derive(Debug, PartialEq, Eq)]
pub struct LinkTarget {
    pub destination: String,
    pub url: Option<Url>,
}

/// One styled run of the compositor's output, before line layout. Hard
/// breaks travel as their own marker so layout can end lines at them.
#[derive(Clone, Debug)]
pub enum InlineSpan {
    Text {
        span: Span<'static>,
        link: Option<Arc<LinkTarget>>,
    },
    HardBreak,
}

/// A clickable range inside composed text, in display columns.
#[derive(Clone, Debug)]
pub struct LinkSpan {
    pub line: usize,
    pub start_col: u16,
    pub end_col: u16,
    pub target: Arc<LinkTarget>,
}

/// Styled text plus the link geometry the host needs for hit-testing.
#[derive(Clone, Debug, Default)]
pub struct ComposedText {
    pub lines: Vec<Line<'static>>,
    pub links: Vec<LinkSpan>,
}

impl ComposedText {
    pub fn to_text(&self) -> Text<'static> {
        Text::from(self.lines.clone())
    }
}

/// Walk a sequence into styled runs. Style roles accumulate through
/// nesting (strong inside emphasis carries both), soft breaks follow the
/// context policy, and images already present in `images` ride along as
/// half-block glyph runs. Unresolved images contribute nothing.
pub fn collect_spans(
    nodes: &[InlineNode],
    context: &RenderContext,
    images: &ImageTable,
) -> Vec<InlineSpan> {
    let mut collector = Collector {
        context,
        images,
        spans: Vec::new(),
    };
    collector.walk(nodes, context.styles.base, None);
    collector.spans
}

/// Merge a whole sequence into one styled text object, wrapped to `width`.
pub fn compose(
    nodes: &[InlineNode],
    context: &RenderContext,
    images: &ImageTable,
    width: u16,
) -> ComposedText {
    let spans = collect_spans(nodes, context, images);
    from_layout(flow::layout(&[FlowUnit::Text(spans)], context, images, width))
}

fn from_layout(layout: FlowLayout) -> ComposedText {
    let mut text = ComposedText::default();
    for item in layout.items {
        let FlowItemKind::Text { line, links } = item.kind else {
            continue;
        };
        let y = item.y as usize;
        while text.lines.len() <= y {
            text.lines.push(Line::default());
        }
        let target_line = &mut text.lines[y];
        let occupied = target_line.width() as u16;
        if item.x > occupied {
            target_line.push_span(Span::raw(" ".repeat((item.x - occupied) as usize)));
        }
        for range in links {
            text.links.push(LinkSpan {
                line: y,
                start_col: item.x + range.start_col,
                end_col: item.x + range.end_col,
                target: range.target,
            });
        }
        for span in line.spans {
            target_line.push_span(span);
        }
    }
    text
}

struct Collector<'a> {
    context: &'a RenderContext,
    images: &'a ImageTable,
    spans: Vec<InlineSpan>,
}

impl Collector<'_> {
    fn walk(&mut self, nodes: &[InlineNode], style: Style, link: Option<&Arc<LinkTarget>>) {
        let styles = &self.context.styles;
        for node in nodes {
            match node {
                InlineNode::Text(content) => self.push_text(content, style, link),
                InlineNode::Code(content) => {
                    self.push_text(content, style.patch(styles.code), link)
                }
                InlineNode::SoftBreak => match self.context.soft_break {
                    SoftBreakMode::Space => self.push_text(" ", style, link),
                    SoftBreakMode::LineBreak => self.spans.push(InlineSpan::HardBreak),
                },
                InlineNode::LineBreak => self.spans.push(InlineSpan::HardBreak),
                InlineNode::Emphasis(children) => {
                    self.walk(children, style.patch(styles.emphasis), link)
                }
                InlineNode::Strong(children) => {
                    self.walk(children, style.patch(styles.strong), link)
                }
                InlineNode::Strikethrough(children) => {
                    self.walk(children, style.patch(styles.strikethrough), link)
                }
                InlineNode::Link {
                    destination,
                    children,
                } => {
                    let target = Arc::new(LinkTarget {
                        destination: destination.clone(),
                        url: self.context.resolve_link_url(destination),
                    });
                    self.walk(children, style.patch(styles.link), Some(&target));
                }
                InlineNode::Image { source, .. } => self.push_image_glyphs(source, link),
            }
        }
    }

    fn push_text(&mut self, content: &str, style: Style, link: Option<&Arc<LinkTarget>>) {
        if content.is_empty() {
            return;
        }
        self.spans.push(InlineSpan::Text {
            span: Span::styled(content.to_string(), style),
            link: link.cloned(),
        });
    }

    /// Inline rendition of an image on the merged path: a one-row strip of
    /// half-block cells. Not yet resolved means no visual contribution.
    fn push_image_glyphs(&mut self, source: &str, link: Option<&Arc<LinkTarget>>) {
        if !self.context.cell_art {
            return;
        }
        let Some(image) = self.images.get(source) else {
            return;
        };
        for span in halfblocks::glyph_strip(image, self.context.cell_metrics) {
            self.spans.push(InlineSpan::Text {
                span,
                link: link.cloned(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{image, link, solid_image, test_context, text};
    use ratatui::style::Modifier;

    fn line_string(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_nested_styles_accumulate() {
        let nodes = vec![InlineNode::Emphasis(vec![
            text("a"),
            InlineNode::Strong(vec![text("b")]),
        ])];
        let composed = compose(&nodes, &test_context(), &ImageTable::new(), 40);
        assert_eq!(composed.lines.len(), 1);

        let spans = &composed.lines[0].spans;
        assert!(spans[0].style.add_modifier.contains(Modifier::ITALIC));
        assert!(!spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(spans[1].style.add_modifier.contains(Modifier::ITALIC));
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_code_spans_keep_their_background() {
        let nodes = vec![InlineNode::Code("let x".to_string())];
        let composed = compose(&nodes, &test_context(), &ImageTable::new(), 40);
        assert!(composed.lines[0].spans[0].style.bg.is_some());
    }

    #[test]
    fn test_soft_break_policy() {
        let nodes = vec![text("one"), InlineNode::SoftBreak, text("two")];
        let context = test_context();

        let spaced = compose(&nodes, &context, &ImageTable::new(), 40);
        assert_eq!(spaced.lines.len(), 1);
        assert_eq!(line_string(&spaced.lines[0]), "one two");

        let broken = compose(
            &nodes,
            &context.with_soft_break(SoftBreakMode::LineBreak),
            &ImageTable::new(),
            40,
        );
        assert_eq!(broken.lines.len(), 2);
        assert_eq!(line_string(&broken.lines[0]), "one");
        assert_eq!(line_string(&broken.lines[1]), "two");
    }

    #[test]
    fn test_hard_break_always_splits() {
        let nodes = vec![text("a"), InlineNode::LineBreak, text("b")];
        let composed = compose(&nodes, &test_context(), &ImageTable::new(), 40);
        assert_eq!(composed.lines.len(), 2);
    }

    #[test]
    fn test_link_ranges_carry_resolved_urls() {
        let nodes = vec![
            text("go "),
            link("https://example.com/docs", vec![text("here")]),
        ];
        let composed = compose(&nodes, &test_context(), &ImageTable::new(), 40);
        assert_eq!(composed.links.len(), 1);

        let span = &composed.links[0];
        assert_eq!(span.line, 0);
        assert_eq!((span.start_col, span.end_col), (3, 7));
        assert_eq!(
            span.target.url.as_ref().map(Url::as_str),
            Some("https://example.com/docs")
        );
    }

    #[test]
    fn test_unresolved_image_contributes_nothing() {
        let nodes = vec![text("x"), image("missing.png", "M")];
        let composed = compose(&nodes, &test_context(), &ImageTable::new(), 40);
        assert_eq!(composed.lines.len(), 1);
        assert_eq!(line_string(&composed.lines[0]), "x");
    }

    #[test]
    fn test_resolved_image_rides_inline_as_glyphs() {
        let mut images = ImageTable::new();
        images.insert(
            "pic.png".to_string(),
            Arc::new(solid_image(32, 32, [120, 40, 40])),
        );
        let nodes = vec![text("a "), image("pic.png", "P"), text(" b")];
        let composed = compose(&nodes, &test_context(), &images, 40);
        assert_eq!(composed.lines.len(), 1);

        let rendered = line_string(&composed.lines[0]);
        assert!(rendered.starts_with("a "));
        assert!(rendered.ends_with(" b"));
        assert!(rendered.contains('▀'), "no glyph cells in {rendered:?}");
    }
}
