use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Parsed inline markdown content. Sequences are produced by the parser,
/// ordered, and immutable once delivered; structural equality and hashing
/// drive image dedup and re-render invalidation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InlineNode {
    Text(String),
    SoftBreak,
    LineBreak,
    Code(String),
    Emphasis(Vec<InlineNode>),
    Strong(Vec<InlineNode>),
    Strikethrough(Vec<InlineNode>),
    Link {
        destination: String,
        children: Vec<InlineNode>,
    },
    Image {
        source: String,
        alt: String,
        children: Vec<InlineNode>,
    },
}

/// Image reference carried by a node: the raw source, the accessibility
/// text, and the navigation destination when the image sits inside a link.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageData {
    pub source: String,
    pub alt: String,
    pub destination: Option<String>,
}

impl InlineNode {
    /// The image reference this node yields, if any. A link wrapping exactly
    /// one image yields that image with the link destination attached.
    pub fn image_data(&self) -> Option<ImageData> {
        match self {
            InlineNode::Image {
                source,
                alt,
                children,
            } => Some(ImageData {
                source: source.clone(),
                alt: if alt.is_empty() {
                    plain_text(children)
                } else {
                    alt.clone()
                },
                destination: None,
            }),
            InlineNode::Link {
                destination,
                children,
            } => match children.as_slice() {
                [image @ InlineNode::Image { .. }] => image.image_data().map(|data| ImageData {
                    destination: Some(destination.clone()),
                    ..data
                }),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Flatten a sequence to its readable text, dropping style markers.
pub fn plain_text(nodes: &[InlineNode]) -> String {
    let mut out = String::new();
    collect_plain_text(nodes, &mut out);
    out
}

fn collect_plain_text(nodes: &[InlineNode], out: &mut String) {
    for node in nodes {
        match node {
            InlineNode::Text(content) | InlineNode::Code(content) => out.push_str(content),
            InlineNode::SoftBreak => out.push(' '),
            InlineNode::LineBreak => out.push('\n'),
            InlineNode::Emphasis(children)
            | InlineNode::Strong(children)
            | InlineNode::Strikethrough(children)
            | InlineNode::Link { children, .. } => collect_plain_text(children, out),
            InlineNode::Image { alt, children, .. } => {
                if alt.is_empty() {
                    collect_plain_text(children, out);
                } else {
                    out.push_str(alt);
                }
            }
        }
    }
}

/// Unique image references in a sequence, in first-appearance order.
/// Two references are the same image only when source, alt, and
/// destination all match.
pub fn unique_images(nodes: &[InlineNode]) -> Vec<ImageData> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for node in nodes {
        if let Some(data) = node.image_data() {
            if seen.insert(data.clone()) {
                images.push(data);
            }
        }
    }
    images
}

/// True when at least one top-level node carries an image reference.
pub fn has_images(nodes: &[InlineNode]) -> bool {
    nodes.iter().any(|node| node.image_data().is_some())
}

/// Stable identity for a node sequence. Resolution and render caches key
/// on this, so equal content never re-resolves.
pub fn sequence_identity(nodes: &[InlineNode]) -> u64 {
    let mut hasher = DefaultHasher::new();
    nodes.hash(&mut hasher);
    hasher.finish()
}
