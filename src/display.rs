use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier},
    Terminal,
};
use std::io::{self, Stdout};
use std::time::Duration;

/// What a piece of text means on screen; the adapter decides how it looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Normal,
    Banner,
    Heading,
    /// Origin of the last received frame.
    Highlight,
    /// The node currently held in failure memory.
    Failure,
    Emphasis,
}

impl From<Style> for ratatui::style::Style {
    fn from(style: Style) -> Self {
        let base = ratatui::style::Style::default();
        match style {
            Style::Normal => base,
            Style::Banner => base.fg(Color::Green),
            Style::Heading | Style::Highlight => base.fg(Color::Green).add_modifier(Modifier::BOLD),
            Style::Failure => base.fg(Color::Red),
            Style::Emphasis => base.add_modifier(Modifier::BOLD),
        }
    }
}

pub trait Display {
    fn init(&mut self) -> io::Result<()>;
    fn write_at(&mut self, row: u16, col: u16, text: &str, style: Style);
    fn flush(&mut self) -> io::Result<()>;
    fn shutdown(&mut self) -> io::Result<()>;

    /// Whether the user asked to quit through the display's own input.
    fn stop_requested(&mut self) -> io::Result<bool> {
        Ok(false)
    }
}

/// Cell-addressed drawing on top of a ratatui terminal.
///
/// Writes land in a back buffer that persists between frames, so untouched
/// fields keep their last value; `flush` pushes the whole buffer as one frame.
pub struct TerminalDisplay<B: Backend> {
    terminal: Terminal<B>,
    back: Buffer,
    owns_tty: bool,
}

impl TerminalDisplay<CrosstermBackend<Stdout>> {
    pub fn stdout() -> io::Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        let mut display = Self::new(terminal)?;
        display.owns_tty = true;
        Ok(display)
    }
}

impl<B: Backend> TerminalDisplay<B> {
    pub fn new(terminal: Terminal<B>) -> io::Result<Self> {
        let size = terminal.size()?;
        Ok(Self {
            terminal,
            back: Buffer::empty(Rect::new(0, 0, size.width, size.height)),
            owns_tty: false,
        })
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

impl<B: Backend> Display for TerminalDisplay<B> {
    fn init(&mut self) -> io::Result<()> {
        if self.owns_tty {
            enable_raw_mode()?;
            io::stdout().execute(EnterAlternateScreen)?;
        }
        self.terminal.hide_cursor()?;
        self.terminal.clear()
    }

    fn write_at(&mut self, row: u16, col: u16, text: &str, style: Style) {
        let area = self.back.area;
        if row >= area.height || col >= area.width {
            return;
        }
        self.back.set_string(col, row, text, style);
    }

    fn flush(&mut self) -> io::Result<()> {
        let Self { terminal, back, .. } = self;
        terminal.draw(|frame| {
            let area = frame.area();
            if back.area != area {
                back.resize(area);
            }
            frame.buffer_mut().merge(back);
        })?;
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.terminal.show_cursor()?;
        if self.owns_tty {
            disable_raw_mode()?;
            io::stdout().execute(LeaveAlternateScreen)?;
        }
        Ok(())
    }

    fn stop_requested(&mut self) -> io::Result<bool> {
        if !self.owns_tty {
            return Ok(false);
        }
        // Raw mode swallows Ctrl-C, so it has to be read as a key.
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let ctrl_c = key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
