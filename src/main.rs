use std::{fs::File, io::stdout, sync::Arc, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::{DynamicImage, Rgba, RgbaImage};
use log::{debug, error, info};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    widgets::Paragraph,
};
use simplelog::{LevelFilter, WriteLogger};
use url::Url;

// Use modules from the library crate
use inkline::context::{RenderContext, SoftBreakMode};
use inkline::node::InlineNode;
use inkline::panic_handler;
use inkline::provider::{ImageProvider, ProviderError};
use inkline::settings;
use inkline::theme::{self, InlineStyles};
use inkline::view::{Activation, InlineView};

fn main() -> Result<()> {
    // Initialize panic handler first, before any other setup
    panic_handler::initialize_panic_handler();

    WriteLogger::init(
        LevelFilter::Debug,
        simplelog::Config::default(),
        File::create("inkline.log")?,
    )?;

    info!("Starting inkline demo");

    // Terminal initialization
    enable_raw_mode()?;
    let mut stdout = stdout();

    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Load settings from ~/.inkline_settings.yaml
    settings::load_settings();

    let mut app = App::new()?;
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal state
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down inkline demo");
    Ok(())
}

/// Serves procedurally generated images so the demo needs no network and
/// no files on disk. The delay makes the placeholder-to-art swap visible.
struct DemoProvider;

impl ImageProvider for DemoProvider {
    fn fetch(&self, url: &Url, _alt: &str) -> Result<DynamicImage, ProviderError> {
        std::thread::sleep(Duration::from_millis(600));
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        match name {
            "gradient.png" => Ok(gradient(320, 200)),
            "badge.png" => Ok(checkerboard(96, 96)),
            _ => Err(ProviderError::NotFound(url.to_string())),
        }
    }
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgba([r, g, 160, 255])
    }))
}

fn checkerboard(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([235, 203, 139, 255])
        } else {
            Rgba([94, 129, 172, 255])
        }
    }))
}

fn sample_nodes() -> Vec<InlineNode> {
    vec![
        InlineNode::Text("Reading notes with ".to_string()),
        InlineNode::Emphasis(vec![InlineNode::Text("styled".to_string())]),
        InlineNode::Text(" runs, ".to_string()),
        InlineNode::Code("inline code".to_string()),
        InlineNode::Text(" and a ".to_string()),
        InlineNode::Link {
            destination: "https://example.com/guide".to_string(),
            children: vec![InlineNode::Text("reference link".to_string())],
        },
        InlineNode::Text(".".to_string()),
        InlineNode::SoftBreak,
        InlineNode::Text("A tappable chart ".to_string()),
        InlineNode::Image {
            source: "gradient.png".to_string(),
            alt: "gradient chart".to_string(),
            children: Vec::new(),
        },
        InlineNode::Text(" sits in the flow, this badge links out ".to_string()),
        InlineNode::Link {
            destination: "https://example.com/badge".to_string(),
            children: vec![InlineNode::Image {
                source: "badge.png".to_string(),
                alt: "badge".to_string(),
                children: Vec::new(),
            }],
        },
        InlineNode::Text(" and the chart appears once more: ".to_string()),
        InlineNode::Image {
            source: "gradient.png".to_string(),
            alt: "gradient chart".to_string(),
            children: Vec::new(),
        },
    ]
}

struct App {
    view: InlineView,
    styles: InlineStyles,
    soft_break: SoftBreakMode,
    tap_enabled: bool,
    status: String,
    should_quit: bool,
}

impl App {
    fn new() -> Result<Self> {
        let styles = theme::palette_by_name(&settings::get_theme_name())
            .map(InlineStyles::from_palette)
            .unwrap_or_default();
        let soft_break = settings::get_soft_break();
        let tap_enabled = true;

        let context = build_context(styles.clone(), soft_break, tap_enabled)?;
        let mut view = InlineView::new(Arc::new(DemoProvider), context);
        view.set_nodes(sample_nodes());

        Ok(Self {
            view,
            styles,
            soft_break,
            tap_enabled,
            status: String::from("t: toggle tap  s: soft breaks  c: theme  q: quit"),
            should_quit: false,
        })
    }

    fn apply_context(&mut self) -> Result<()> {
        let context = build_context(self.styles.clone(), self.soft_break, self.tap_enabled)?;
        self.view.set_context(context);
        Ok(())
    }

    fn toggle_tap(&mut self) -> Result<()> {
        self.tap_enabled = !self.tap_enabled;
        self.status = if self.tap_enabled {
            "tap action on, images flow as separate boxes".to_string()
        } else {
            "tap action off, images merge into the text".to_string()
        };
        self.apply_context()
    }

    fn toggle_soft_break(&mut self) -> Result<()> {
        self.soft_break = match self.soft_break {
            SoftBreakMode::Space => SoftBreakMode::LineBreak,
            SoftBreakMode::LineBreak => SoftBreakMode::Space,
        };
        settings::set_soft_break(self.soft_break);
        self.status = format!("soft breaks render as {:?}", self.soft_break);
        self.apply_context()
    }

    fn cycle_theme(&mut self) -> Result<()> {
        let names = theme::all_palette_names();
        let current = settings::get_theme_name();
        let next = names
            .iter()
            .position(|&name| name == current)
            .map(|idx| names[(idx + 1) % names.len()])
            .unwrap_or(theme::DEFAULT_PALETTE_NAME);
        settings::set_theme_name(next);

        self.styles = theme::palette_by_name(next)
            .map(InlineStyles::from_palette)
            .unwrap_or_default();
        self.status = format!("theme: {next}");
        self.apply_context()
    }

    fn handle_activation(&mut self, column: u16, row: u16) {
        match self.view.activate_at(column, row) {
            Activation::Tapped(url) => {
                self.status = match url {
                    Some(url) => format!("tapped image {url}"),
                    None => "tapped image with unresolvable source".to_string(),
                };
            }
            Activation::Navigate(url) => {
                self.status = format!("opening {url}");
                if let Err(e) = open::that(url.as_str()) {
                    error!("Failed to open {url}: {e}");
                    self.status = format!("failed to open {url}");
                }
            }
            Activation::None => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let title = Paragraph::new("inkline: inline text and image flow").style(self.styles.strong);
        frame.render_widget(title, chunks[0]);

        let body = chunks[1];
        self.view.render(body, frame.buffer_mut());

        let status = Paragraph::new(self.status.as_str()).style(self.styles.base);
        frame.render_widget(status, chunks[2]);
    }
}

fn build_context(
    styles: InlineStyles,
    soft_break: SoftBreakMode,
    tap_enabled: bool,
) -> Result<RenderContext> {
    let mut context = RenderContext::detected(styles)
        .with_base_url(Url::parse("https://example.com/")?)
        .with_image_base_url(Url::parse("https://inkline.example/assets/")?)
        .with_soft_break(soft_break);

    if let Some(flow_wrap) = settings::get_flow_wrap_override() {
        context = context.with_flow_wrap(flow_wrap);
    }
    if tap_enabled {
        context = context.with_image_tap_action(|url| {
            info!("image tapped: {:?}", url.map(Url::as_str));
        });
    }
    Ok(context)
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut needs_redraw = true;

    loop {
        if app.view.poll_images() {
            debug!("Images resolved, forcing redraw");
            needs_redraw = true;
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            needs_redraw = false;
        }

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                    KeyCode::Char('t') => {
                        app.toggle_tap()?;
                        needs_redraw = true;
                    }
                    KeyCode::Char('s') => {
                        app.toggle_soft_break()?;
                        needs_redraw = true;
                    }
                    KeyCode::Char('c') => {
                        app.cycle_theme()?;
                        needs_redraw = true;
                    }
                    _ => {}
                },
                Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                    app.handle_activation(mouse.column, mouse.row);
                    needs_redraw = true;
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
