use std::{
    io::stdout,
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use crate::{
    banner,
    gui::error::GuiError,
    navigator::Guidance,
    session::{DeliveredFrame, SessionHandle, SessionSummary},
};

use crossterm::{
    event::{self, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use log::warn;
use ratatui::{
    prelude::*,
    widgets::{block::Title, *},
    Terminal,
};

/// Shows the guidance of a running session until the user presses a key
/// or the session ends, then stops the session and returns its summary.
///
/// Every frame that arrives is handed to `on_frame` first.
pub fn watch_session<F>(
    handle: SessionHandle,
    frames: Receiver<DeliveredFrame>,
    route_len: usize,
    on_frame: F,
) -> Result<SessionSummary, GuiError>
where
    F: FnMut(&DeliveredFrame),
{
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let res = watch(&handle, &frames, route_len, on_frame);
    handle.stop();
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    res?;
    Ok(handle.join()?)
}

fn watch<F>(
    handle: &SessionHandle,
    frames: &Receiver<DeliveredFrame>,
    route_len: usize,
    mut on_frame: F,
) -> Result<(), GuiError>
where
    F: FnMut(&DeliveredFrame),
{
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut latest = Guidance::WaitingForSignal;
    let mut delivered = 0u64;

    loop {
        loop {
            match frames.try_recv() {
                Ok(frame) => {
                    on_frame(&frame);
                    latest = frame.guidance;
                    delivered += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Session ended on its own");
                    return Ok(());
                }
            }
        }

        let title = Title::from(" Navigating... ".magenta().bold());
        let text = Paragraph::new(vec![
            Line::from(Span::styled(
                banner::status_text(&latest, route_len),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(" Camera {}, {} frames ", handle.device(), delivered)),
            Line::from(" Press any key to stop ".magenta()),
        ]);
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .borders(Borders::ALL);
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_widget(text.block(block), area);
        })?;

        if !handle.is_running() {
            return Ok(());
        }
        if event::poll(Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(());
                }
            }
        }
    }
}
