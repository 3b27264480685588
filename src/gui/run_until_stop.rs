use std::{io::stdout, time::Duration};

use crate::gui::error::GuiError;
use crate::pacer::Pacer;

use crossterm::{
    event::{self, KeyEventKind},
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

/// Runs `tick` on `state` at `tick_rate` ticks per second until the user
/// presses a key, then hands the state back.
///
/// Everything happens on the calling thread. Each tick returns the lines
/// to show in the status panel; the keyboard is polled without waiting,
/// and whatever is left of the tick is slept away.
pub fn run_until_stop<F, T>(mut state: T, tick_rate: f64, tick: F) -> Result<T, GuiError>
where
    F: FnMut(&mut T) -> Vec<String>,
{
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let res = tick_loop(&mut terminal, &mut state, tick_rate, tick);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    res.map(|()| state)
}

fn tick_loop<B, F, T>(
    terminal: &mut Terminal<B>,
    state: &mut T,
    tick_rate: f64,
    mut tick: F,
) -> Result<(), GuiError>
where
    B: Backend,
    F: FnMut(&mut T) -> Vec<String>,
{
    let mut pacer = Pacer::new(tick_rate);
    loop {
        pacer.start();
        let lines = tick(state);

        let title = Title::from(" Locating Light Source... ".yellow().bold());
        let hint = Title::from(Line::from(" Press any key to stop ".bold()));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                hint.alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let text = Paragraph::new(lines.into_iter().map(Line::from).collect::<Vec<_>>());
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_widget(text.block(block), area);
        })?;

        if event::poll(Duration::ZERO)? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(());
                }
            }
        }
        pacer.wait();
    }
}
