// Export modules for use in tests
pub mod color_mode;
pub mod compose;
pub mod context;
pub mod flow;
pub mod halfblocks;
pub mod node;
pub mod panic_handler;
pub mod provider;
pub mod resolver;
pub mod settings;
pub mod theme;
pub mod view;
// Test utilities - only available when test-utils feature is enabled or during tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the types a host embedding a view needs
pub use compose::{compose, ComposedText, LinkSpan};
pub use context::{CellMetrics, HostCaps, ImageTapAction, RenderContext, SoftBreakMode};
pub use node::{ImageData, InlineNode};
pub use provider::{FsImageProvider, ImageProvider, LocalImageProvider, ProviderError, SerialProvider};
pub use resolver::{ImageResolver, ImageTable};
pub use theme::{Base16Palette, InlineStyles};
pub use view::{Activation, InlineView, Strategy};
