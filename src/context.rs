use crate::color_mode;
use crate::theme::InlineStyles;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use url::Url;

/// How soft breaks inside a sequence render: collapsed to a single space
/// (prose) or kept as line breaks (poetry, addresses).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftBreakMode {
    #[default]
    Space,
    LineBreak,
}

/// Callback invoked when a tappable image is activated. Receives the image
/// URL resolved against the image base, or None when resolution failed.
pub type ImageTapAction = Arc<dyn Fn(Option<&Url>) + Send + Sync>;

/// Terminal cell raster in pixels, as reported by the host terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellMetrics {
    pub width_px: u16,
    pub height_px: u16,
}

impl Default for CellMetrics {
    fn default() -> Self {
        // Common 8x16 raster; hosts with a real cell-size query override this
        Self {
            width_px: 8,
            height_px: 16,
        }
    }
}

/// Host capabilities probed once per process.
#[derive(Clone, Copy, Debug)]
pub struct HostCaps {
    /// 24-bit color, required for half-block image art.
    pub true_color: bool,
    /// Whether the host can stack variable-height flow rows. Forced off
    /// with INKLINE_NO_FLOW_WRAP=1 for hosts that cannot.
    pub flow_wrap: bool,
}

impl HostCaps {
    pub fn detect() -> Self {
        static CAPS: OnceLock<HostCaps> = OnceLock::new();
        *CAPS.get_or_init(|| {
            let true_color = color_mode::supports_true_color();
            let flow_wrap = std::env::var("INKLINE_NO_FLOW_WRAP")
                .map(|v| v != "1")
                .unwrap_or(true);
            let caps = HostCaps {
                true_color,
                flow_wrap,
            };
            debug!("host capabilities: {caps:?}");
            caps
        })
    }
}

/// Cascading, read-only render configuration. An ancestor scope builds one,
/// descendants inherit it unchanged; a subtree that needs a different value
/// makes a copy through the `with_*` constructors rather than mutating a
/// shared instance.
#[derive(Clone)]
pub struct RenderContext {
    /// Base for resolving relative link destinations.
    pub base_url: Option<Url>,
    /// Base for resolving relative image sources.
    pub image_base_url: Option<Url>,
    pub soft_break: SoftBreakMode,
    pub styles: InlineStyles,
    /// Unset means images carry no tap affordance.
    pub image_tap_action: Option<ImageTapAction>,
    pub flow_wrap: bool,
    /// Half-block cell art; off means images degrade to alt placeholders.
    pub cell_art: bool,
    pub cell_metrics: CellMetrics,
}

impl RenderContext {
    pub fn new(styles: InlineStyles) -> Self {
        Self {
            base_url: None,
            image_base_url: None,
            soft_break: SoftBreakMode::default(),
            styles,
            image_tap_action: None,
            flow_wrap: true,
            cell_art: true,
            cell_metrics: CellMetrics::default(),
        }
    }

    /// Context wired to the detected host capabilities.
    pub fn detected(styles: InlineStyles) -> Self {
        let caps = HostCaps::detect();
        let mut context = Self::new(styles);
        context.flow_wrap = caps.flow_wrap;
        context.cell_art = caps.true_color;
        context
    }

    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    pub fn with_image_base_url(mut self, url: Url) -> Self {
        self.image_base_url = Some(url);
        self
    }

    pub fn with_soft_break(mut self, mode: SoftBreakMode) -> Self {
        self.soft_break = mode;
        self
    }

    pub fn with_styles(mut self, styles: InlineStyles) -> Self {
        self.styles = styles;
        self
    }

    /// Scope an image tap callback to this subtree. Every image rendered
    /// under the returned context becomes tappable.
    pub fn with_image_tap_action<F>(mut self, action: F) -> Self
    where
        F: Fn(Option<&Url>) + Send + Sync + 'static,
    {
        self.image_tap_action = Some(Arc::new(action));
        self
    }

    pub fn without_image_tap_action(mut self) -> Self {
        self.image_tap_action = None;
        self
    }

    pub fn with_flow_wrap(mut self, flow_wrap: bool) -> Self {
        self.flow_wrap = flow_wrap;
        self
    }

    pub fn with_cell_metrics(mut self, cell_metrics: CellMetrics) -> Self {
        self.cell_metrics = cell_metrics;
        self
    }

    /// Resolve a possibly-relative image source against the image base.
    pub fn resolve_image_url(&self, source: &str) -> Option<Url> {
        resolve(self.image_base_url.as_ref(), source)
    }

    /// Resolve a link destination against the link base.
    pub fn resolve_link_url(&self, destination: &str) -> Option<Url> {
        resolve(self.base_url.as_ref(), destination)
    }

    /// Gap between adjacent flow units, in cells: a quarter of the em
    /// square, rounded up horizontally. Terminal rows already carry
    /// leading, so the vertical gap usually lands on zero.
    pub fn unit_spacing(&self) -> (u16, u16) {
        let quarter_em = self.cell_metrics.height_px / 4;
        let horizontal = quarter_em
            .div_ceil(self.cell_metrics.width_px.max(1))
            .max(1);
        let vertical = quarter_em / self.cell_metrics.height_px.max(1);
        (horizontal, vertical)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(InlineStyles::default())
    }
}

fn resolve(base: Option<&Url>, reference: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(reference).ok(),
        None => Url::parse(reference).ok(),
    }
}
