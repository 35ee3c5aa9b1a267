//! Shared fixtures for unit and integration tests: node constructors,
//! synthetic images, a deterministic provider, and buffer helpers.

use crate::context::RenderContext;
use crate::node::InlineNode;
use crate::provider::{ImageProvider, ProviderError};
use image::{DynamicImage, Rgba, RgbaImage};
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;
use ratatui::Terminal;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

pub fn text(content: &str) -> InlineNode {
    InlineNode::Text(content.to_string())
}

pub fn code(content: &str) -> InlineNode {
    InlineNode::Code(content.to_string())
}

pub fn link(destination: &str, children: Vec<InlineNode>) -> InlineNode {
    InlineNode::Link {
        destination: destination.to_string(),
        children,
    }
}

pub fn image(source: &str, alt: &str) -> InlineNode {
    InlineNode::Image {
        source: source.to_string(),
        alt: alt.to_string(),
        children: Vec::new(),
    }
}

/// An image wrapped in a link, the markdown `[![alt](src)](dest)` shape.
pub fn linked_image(source: &str, alt: &str, destination: &str) -> InlineNode {
    link(destination, vec![image(source, alt)])
}

pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([rgb[0], rgb[1], rgb[2], 255]),
    ))
}

/// Context with fixed bases and full capabilities, independent of the
/// environment the tests run in.
pub fn test_context() -> RenderContext {
    RenderContext::default()
        .with_base_url(Url::parse("https://example.com/").unwrap())
        .with_image_base_url(Url::parse("https://example.com/assets/").unwrap())
        .with_flow_wrap(true)
}

pub fn test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
    Terminal::new(TestBackend::new(width, height)).unwrap()
}

/// Rows of a buffer as plain strings, styles stripped.
pub fn buffer_text(buf: &Buffer) -> Vec<String> {
    let area = *buf.area();
    (0..area.height)
        .map(|y| {
            (0..area.width)
                .filter_map(|x| buf.cell((area.x + x, area.y + y)))
                .map(|cell| cell.symbol())
                .collect()
        })
        .collect()
}

enum Outcome {
    Success(DynamicImage),
    Failure(String),
}

/// Provider that serves canned outcomes keyed by the last path segment of
/// the requested URL, recording every fetch for assertions.
#[derive(Default)]
pub struct StubProvider {
    outcomes: Mutex<HashMap<String, Outcome>>,
    log: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&self, name: &str, image: DynamicImage) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(name.to_string(), Outcome::Success(image));
    }

    pub fn fail(&self, name: &str, reason: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(name.to_string(), Outcome::Failure(reason.to_string()));
    }

    /// Every fetched name in arrival order.
    pub fn fetches(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, name: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}

impl ImageProvider for StubProvider {
    fn fetch(&self, url: &Url, _alt: &str) -> Result<DynamicImage, ProviderError> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string();
        self.log.lock().unwrap().push(name.clone());

        match self.outcomes.lock().unwrap().get(&name) {
            Some(Outcome::Success(image)) => Ok(image.clone()),
            Some(Outcome::Failure(reason)) => {
                Err(ProviderError::Unavailable(reason.clone()))
            }
            None => Err(ProviderError::NotFound(url.to_string())),
        }
    }
}
