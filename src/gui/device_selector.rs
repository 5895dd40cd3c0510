use std::{io::stdout, path::PathBuf, time::Duration};

use crate::gui::error::GuiError;

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// What a key press does to the port list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Pending,
    Picked(usize),
    Cancelled,
}

/// Cursor over a non-empty list of ports, wrapping at both ends.
#[derive(Debug)]
struct PortCursor {
    len: usize,
    at: usize,
}

impl PortCursor {
    fn new(len: usize) -> Option<Self> {
        (len > 0).then_some(Self { len, at: 0 })
    }

    fn on_key(&mut self, code: KeyCode) -> Choice {
        match code {
            KeyCode::Down | KeyCode::Char('j') => self.at = (self.at + 1) % self.len,
            KeyCode::Up | KeyCode::Char('k') => self.at = (self.at + self.len - 1) % self.len,
            KeyCode::Enter => return Choice::Picked(self.at),
            KeyCode::Char('q') | KeyCode::Esc => return Choice::Cancelled,
            _ => {}
        }
        Choice::Pending
    }
}

/// Lets the user pick the serial port their GPS receiver is plugged into.
///
/// Returns `None` if there are no ports or the user quits.
pub fn device_selector(mut available_ports: Vec<PathBuf>) -> Result<Option<PathBuf>, GuiError> {
    let Some(mut cursor) = PortCursor::new(available_ports.len()) else {
        return Ok(None);
    };

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let picked = run_selector(&available_ports, &mut cursor);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(picked?.map(|i| available_ports.swap_remove(i)))
}

fn port_list<'a>(ports: &'a [PathBuf]) -> List<'a> {
    let instructions = Title::from(Line::from(vec![
        " Navigate ".into(),
        "<Up>/<Down>".magenta().bold(),
        " Select ".into(),
        "<Enter>".magenta().bold(),
        " Quit ".into(),
        "<Q> ".magenta().bold(),
    ]));
    let block = Block::default()
        .title(Title::from(" GPS Receiver ".magenta().bold()).alignment(Alignment::Center))
        .title(
            instructions
                .alignment(Alignment::Center)
                .position(Position::Bottom),
        )
        .borders(Borders::ALL);

    List::new(ports.iter().map(|p| p.to_string_lossy()))
        .style(Style::default().fg(Color::White))
        .highlight_symbol(">>")
        .highlight_style(Style::default().fg(Color::Magenta))
        .block(block)
}

fn run_selector(ports: &[PathBuf], cursor: &mut PortCursor) -> Result<Option<usize>, GuiError> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;
    let mut list_state = ListState::default();

    loop {
        list_state.select(Some(cursor.at));
        terminal.draw(|frame| {
            frame.render_stateful_widget(port_list(ports), frame.size(), &mut list_state);
        })?;

        if !event::poll(Duration::from_millis(16))? {
            continue;
        }
        if let event::Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match cursor.on_key(key.code) {
                Choice::Pending => {}
                Choice::Picked(i) => return Ok(Some(i)),
                Choice::Cancelled => return Ok(None),
            }
        }
    }
}
