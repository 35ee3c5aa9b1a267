//! End-to-end coverage of the inline pipeline: strategy selection, image
//! resolution, flow layout, and pointer activation working together.

use std::sync::{Arc, Mutex};

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use url::Url;

use inkline::test_utils::{
    buffer_text, image, link, linked_image, solid_image, test_context, test_terminal, text,
    StubProvider,
};
use inkline::{Activation, ImageResolver, InlineView, Strategy};

fn rendered_rows(view: &mut InlineView, width: u16, height: u16) -> Vec<String> {
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    view.render(area, &mut buf);
    buffer_text(&buf)
}

#[test]
fn test_duplicate_references_fetch_once() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("a.png", solid_image(16, 16, [200, 30, 30]));

    let mut view = InlineView::new(provider.clone(), test_context());
    view.set_nodes(vec![
        image("a.png", "A"),
        text(" and again "),
        image("a.png", "A"),
    ]);
    view.resolve_images_blocking();

    assert_eq!(provider.fetch_count("a.png"), 1);
    assert_eq!(view.images().len(), 1);
}

#[test]
fn test_sequence_without_images_publishes_immediately() {
    let provider = Arc::new(StubProvider::new());
    let mut view = InlineView::new(provider.clone(), test_context());
    view.set_nodes(vec![text("words, no pictures")]);

    // No worker round-trip: the empty table is ready on the first poll
    assert!(view.poll_images());
    assert!(view.images().is_empty());
    assert!(provider.fetches().is_empty());
}

#[test]
fn test_failed_fetches_leave_their_entries_absent() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("a.png", solid_image(16, 16, [200, 30, 30]));
    provider.fail("b.png", "connection reset");

    let mut view = InlineView::new(provider.clone(), test_context());
    view.set_nodes(vec![image("a.png", "A"), image("b.png", "B")]);
    view.resolve_images_blocking();

    assert_eq!(provider.fetches().len(), 2);
    assert!(view.images().contains_key("a.png"));
    assert!(!view.images().contains_key("b.png"));
}

#[test]
fn test_new_request_supersedes_in_flight_work() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("a.png", solid_image(16, 16, [200, 30, 30]));
    provider.succeed("c.png", solid_image(16, 16, [30, 200, 30]));

    let mut resolver = ImageResolver::new(provider);
    resolver.request(&[image("a.png", "A")], &test_context());
    let table = resolver.resolve_blocking(&[image("c.png", "C")], &test_context());

    // Only the newest generation lands; the superseded batch is dropped
    assert_eq!(table.len(), 1);
    assert!(table.contains_key("c.png"));
    assert!(resolver.poll().is_none());
}

#[test]
fn test_tap_action_plus_images_selects_mixed_flow() {
    let provider = Arc::new(StubProvider::new());

    let mut view = InlineView::new(provider.clone(), test_context());
    view.set_nodes(vec![text("a "), image("x.png", "X")]);
    assert_eq!(view.strategy(), Strategy::MergedText);

    let tappable = test_context().with_image_tap_action(|_| {});
    let mut view = InlineView::new(provider, tappable);
    view.set_nodes(vec![text("a "), image("x.png", "X")]);
    assert_eq!(view.strategy(), Strategy::MixedFlow);
}

#[test]
fn test_flow_shows_placeholder_until_resolution() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("x.png", solid_image(32, 32, [10, 80, 160]));

    let context = test_context().with_image_tap_action(|_| {});
    let mut view = InlineView::new(provider, context);
    view.set_nodes(vec![text("See "), image("x.png", "X")]);

    let before = rendered_rows(&mut view, 40, 10).join("\n");
    assert!(before.contains("[image: X]"), "missing placeholder:\n{before}");

    view.resolve_images_blocking();
    let after = rendered_rows(&mut view, 40, 10).join("\n");
    assert!(!after.contains("[image:"), "placeholder survived:\n{after}");
    assert!(after.contains('▀'), "no half-block art:\n{after}");
}

#[test]
fn test_tap_takes_precedence_over_wrapping_link() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("x.png", solid_image(32, 32, [10, 80, 160]));

    let taps: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&taps);
    let context = test_context().with_image_tap_action(move |url| {
        sink.lock().unwrap().push(url.map(Url::to_string));
    });

    let mut view = InlineView::new(provider, context);
    view.set_nodes(vec![
        text("See "),
        linked_image("x.png", "X", "https://example.com/page"),
    ]);
    view.resolve_images_blocking();
    rendered_rows(&mut view, 40, 10);

    // 32x32 is a wide-tier image: 14 columns after the text box and gap
    let activation = view.activate_at(8, 2);
    let Activation::Tapped(Some(url)) = activation else {
        panic!("expected a tap, got {activation:?}");
    };
    assert_eq!(url.as_str(), "https://example.com/assets/x.png");
    assert_eq!(
        *taps.lock().unwrap(),
        vec![Some("https://example.com/assets/x.png".to_string())]
    );
}

#[test]
fn test_linked_image_without_tap_action_navigates() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("x.png", solid_image(32, 32, [10, 80, 160]));

    let mut view = InlineView::new(provider, test_context());
    view.set_nodes(vec![
        text("go "),
        linked_image("x.png", "X", "https://example.com/page"),
    ]);
    view.resolve_images_blocking();
    rendered_rows(&mut view, 40, 4);

    // merged path: the glyph strip sits right after "go " and carries the link
    assert_eq!(view.activate_at(0, 0), Activation::None);
    let Activation::Navigate(url) = view.activate_at(3, 0) else {
        panic!("expected navigation from the image glyphs");
    };
    assert_eq!(url.as_str(), "https://example.com/page");
}

#[test]
fn test_plain_link_text_navigates() {
    let provider = Arc::new(StubProvider::new());
    let mut view = InlineView::new(provider, test_context());
    view.set_nodes(vec![
        text("read the "),
        link("guide.html", vec![text("guide")]),
    ]);
    rendered_rows(&mut view, 40, 2);

    let Activation::Navigate(url) = view.activate_at(9, 0) else {
        panic!("expected navigation on the link text");
    };
    // relative destination resolved against the link base
    assert_eq!(url.as_str(), "https://example.com/guide.html");
}

#[test]
fn test_single_row_fallback_keeps_order() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("x.png", solid_image(32, 32, [10, 80, 160]));

    let context = test_context()
        .with_image_tap_action(|_| {})
        .with_flow_wrap(false);
    let mut view = InlineView::new(provider, context);
    view.set_nodes(vec![text("lead"), image("x.png", "X"), text("tail")]);
    view.resolve_images_blocking();

    let mut terminal = test_terminal(60, 10);
    terminal
        .draw(|frame| {
            let area = frame.area();
            view.render(area, frame.buffer_mut());
        })
        .unwrap();
    let rows = buffer_text(terminal.backend().buffer());
    assert!(rows[0].starts_with("lead"));
    assert!(rows[0].contains("tail"));
    // wide-tier art occupies rows below the text baseline, nothing wraps
    assert_eq!(view.height_for_width(60), 7);
}

#[test]
fn test_mixed_flow_wraps_units_across_rows() {
    let provider = Arc::new(StubProvider::new());
    provider.succeed("x.png", solid_image(32, 32, [10, 80, 160]));

    let context = test_context().with_image_tap_action(|_| {});
    let mut view = InlineView::new(provider, context);
    view.set_nodes(vec![text("a very long leading run"), image("x.png", "X")]);
    view.resolve_images_blocking();

    // 24 columns: the 14-column image cannot share the first row
    let rows = rendered_rows(&mut view, 24, 12);
    assert!(rows[0].starts_with("a very long leading run"));
    assert!(!rows[0].contains('▀'));
    assert!(rows[1].contains('▀'));
}
