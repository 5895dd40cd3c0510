use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
    Frame, Terminal,
};
use std::{
    error::Error,
    io,
    sync::{mpsc::Receiver, Arc},
    time::{Duration, Instant},
};

use sarina::{
    banner, config::NavConfig, navigator::Guidance, position::SimulatedWalker, route::Route,
    session::DeliveredFrame,
};

struct App {
    route: Arc<Route>,
    walker: Arc<SimulatedWalker>,
    frames: Receiver<DeliveredFrame>,
    route_points: Vec<(f64, f64)>,
    walker_point: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    guidance: Guidance,
    frames_seen: u64,
    last_jpeg_bytes: usize,
}

/// Bounds that fit `values` with a margin, never collapsing to a point.
fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = ((hi - lo) * 0.1).max(1e-4);
    [lo - pad, hi + pad]
}

impl App {
    fn new(route: Arc<Route>, walker: Arc<SimulatedWalker>, frames: Receiver<DeliveredFrame>) -> App {
        // plotted as (lon, lat) so north is up
        let route_points: Vec<(f64, f64)> = route.waypoints().iter().map(|p| (p.lon, p.lat)).collect();
        let x_bounds = padded_bounds(route_points.iter().map(|p| p.0));
        let y_bounds = padded_bounds(route_points.iter().map(|p| p.1));
        App {
            route,
            walker,
            frames,
            route_points,
            walker_point: vec![],
            x_bounds,
            y_bounds,
            guidance: Guidance::WaitingForSignal,
            frames_seen: 0,
            last_jpeg_bytes: 0,
        }
    }

    fn on_tick(&mut self) {
        for frame in self.frames.try_iter() {
            self.guidance = frame.guidance;
            self.frames_seen += 1;
            self.last_jpeg_bytes = frame.jpeg.len();
        }
        let p = self.walker.true_position();
        self.walker_point = vec![(p.lon, p.lat)];
    }

    fn scale(&self) -> f64 {
        match self.guidance {
            Guidance::Heading { scale, .. } => scale,
            _ => 0.0,
        }
    }
}

pub fn engage_gui(
    route: Arc<Route>,
    walker: Arc<SimulatedWalker>,
    frames: Receiver<DeliveredFrame>,
) -> Result<(), Box<dyn Error>> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // create app and run it
    let tick_rate = Duration::from_millis(100);
    let app = App::new(route, walker, frames);
    let res = run_app(&mut terminal, app, tick_rate);

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(());
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(f.size());
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(columns[1]);

    let chart = Chart::new(vec![
        Dataset::default()
            .name("Route")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&app.route_points),
        Dataset::default()
            .name("Walker")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Magenta))
            .data(&app.walker_point),
    ])
    .block(
        Block::default()
            .title(app.route.name().unwrap_or(" Route "))
            .borders(Borders::ALL),
    )
    .x_axis(
        Axis::default()
            .title(Span::styled("Lon", Style::default().fg(Color::Red)))
            .style(Style::default().fg(Color::White))
            .bounds(app.x_bounds)
            .labels(
                app.x_bounds
                    .iter()
                    .map(|v| Span::from(format!("{v:.4}")))
                    .collect(),
            ),
    )
    .y_axis(
        Axis::default()
            .title(Span::styled("Lat", Style::default().fg(Color::Red)))
            .style(Style::default().fg(Color::White))
            .bounds(app.y_bounds)
            .labels(
                app.y_bounds
                    .iter()
                    .map(|v| Span::from(format!("{v:.4}")))
                    .collect(),
            ),
    );
    f.render_widget(chart, columns[0]);

    let mut lines = vec![
        Line::from(banner::status_text(&app.guidance, app.route.len())),
        Line::from(""),
    ];
    if let Guidance::Heading {
        bearing_deg,
        draw_angle_deg,
        ..
    } = app.guidance
    {
        lines.push(Line::from(format!("bearing  {bearing_deg:6.1}")));
        lines.push(Line::from(format!("arrow    {draw_angle_deg:6.1}")));
    }
    lines.push(Line::from(format!("frames   {}", app.frames_seen)));
    lines.push(Line::from(format!("jpeg     {} B", app.last_jpeg_bytes)));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press any key to stop",
        Style::default().fg(Color::Magenta),
    )));
    let status = Paragraph::new(lines).block(Block::default().title(" Guidance ").borders(Borders::ALL));
    f.render_widget(status, side[0]);

    let max_scale = NavConfig::default().scale_max;
    let gauge = Gauge::default()
        .block(Block::default().title(" Arrow scale ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Magenta))
        .ratio((app.scale() / max_scale).clamp(0.0, 1.0))
        .label(format!("{:.2}", app.scale()));
    f.render_widget(gauge, side[1]);
}
