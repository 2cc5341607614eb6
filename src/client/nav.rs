//! Keyboard navigation state machine.
//!
//! Pure state: keys and remote commands go in, [`Effect`]s come out. Timers
//! are returned as [`Effect::Schedule`] and fed back through
//! [`Navigator::on_timer`]; each carries a generation token so a timer that
//! fires after the state moved on does nothing.

use thiserror::Error;

use crate::reload::message::{Command, leading_int};

/// Window for the second `g` of a `gg` chord.
pub const CHORD_WINDOW_MS: u64 = 500;
/// How long an invalid command stays on the prompt.
pub const COMMAND_ERROR_MS: u64 = 2000;

/// Scroll step for `j` / `k`, as a fraction of the viewport height.
pub const LINE_SCROLL: f32 = 0.1;
pub const HALF_PAGE_SCROLL: f32 = 0.5;
pub const PAGE_SCROLL: f32 = 0.9;

const SLIDE_NOT_FOUND: &str = "Error: Slide not found.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("invalid slide reference `{0}`")]
    InvalidSlide(String),

    #[error("slide {number} out of range (deck has {count})")]
    OutOfRange { number: i64, count: usize },

    #[error("no slide contains `{0}`")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Escape,
    Home,
    End,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
}

impl KeyEvent {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false }
    }

    pub fn ch(c: char) -> Self {
        Self::plain(Key::Char(c))
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            key: Key::Char(c),
            ctrl: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Command,
}

/// Command prompt display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptState {
    #[default]
    Hidden,
    /// Prompt text, including the leading `:`
    Input(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ChordReset,
    CommandError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub generation: u64,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ScrollToSlide { number: usize, uid: u64 },
    /// Scroll by a signed fraction of the viewport height
    ScrollBy(f32),
    Prompt(PromptState),
    ToggleHelp,
    ClosePreview,
    Schedule(Timer),
}

/// What navigation needs to know about one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideInfo {
    pub uid: u64,
    pub text: String,
}

#[derive(Debug)]
pub struct Navigator {
    slides: Vec<SlideInfo>,
    mode: Mode,
    buffer: String,
    chord_pending: bool,
    chord_generation: u64,
    error_shown: bool,
    error_generation: u64,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            mode: Mode::Normal,
            buffer: String::new(),
            chord_pending: false,
            chord_generation: 0,
            error_shown: false,
            error_generation: 0,
        }
    }

    /// Replace the slide snapshot. Call after every reconciliation.
    pub fn set_slides(&mut self, slides: Vec<SlideInfo>) {
        self.slides = slides;
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn handle_key(&mut self, event: KeyEvent) -> Vec<Effect> {
        match self.mode {
            Mode::Normal => self.normal_key(event),
            Mode::Command => self.command_key(event),
        }
    }

    /// A scheduled timer fired.
    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        match timer.kind {
            TimerKind::ChordReset if timer.generation == self.chord_generation => {
                self.chord_pending = false;
                Vec::new()
            }
            TimerKind::CommandError
                if timer.generation == self.error_generation && self.error_shown =>
            {
                self.leave_command_mode()
            }
            _ => Vec::new(),
        }
    }

    /// Scroll target for a 1-based slide number.
    pub fn goto(&self, number: i64) -> Result<Effect, NavError> {
        let index = usize::try_from(number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|&i| i < self.slides.len())
            .ok_or(NavError::OutOfRange {
                number,
                count: self.slides.len(),
            })?;
        Ok(Effect::ScrollToSlide {
            number: index + 1,
            uid: self.slides[index].uid,
        })
    }

    /// First slide whose text contains `needle`, ignoring case.
    pub fn find(&self, needle: &str) -> Result<Effect, NavError> {
        let needle_lower = needle.to_lowercase();
        self.slides
            .iter()
            .position(|s| s.text.to_lowercase().contains(&needle_lower))
            .map(|i| Effect::ScrollToSlide {
                number: i + 1,
                uid: self.slides[i].uid,
            })
            .ok_or_else(|| NavError::NotFound(needle.to_string()))
    }

    /// Apply a command pushed by the server.
    pub fn remote(&self, command: &Command) -> Result<Vec<Effect>, NavError> {
        match command {
            Command::Goto { slide } => {
                let number = slide
                    .number()
                    .ok_or_else(|| NavError::InvalidSlide(format!("{slide:?}")))?;
                Ok(vec![self.goto(number)?])
            }
            Command::Find { string } => Ok(vec![self.find(string)?]),
            Command::ClosePreview => Ok(vec![Effect::ClosePreview]),
        }
    }

    // =========================================================================
    // Normal mode
    // =========================================================================

    fn normal_key(&mut self, event: KeyEvent) -> Vec<Effect> {
        let KeyEvent { key, ctrl } = event;

        if key == Key::Char('g') && !ctrl {
            self.chord_generation += 1;
            if self.chord_pending {
                self.chord_pending = false;
                return self.first_slide();
            }
            self.chord_pending = true;
            return vec![Effect::Schedule(Timer {
                kind: TimerKind::ChordReset,
                generation: self.chord_generation,
                delay_ms: CHORD_WINDOW_MS,
            })];
        }

        self.clear_chord();

        match (key, ctrl) {
            (Key::Home, _) => self.first_slide(),
            (Key::End, _) | (Key::Char('G'), false) => self.last_slide(),
            (Key::Char(':'), false) => {
                self.mode = Mode::Command;
                self.buffer.clear();
                vec![self.input_prompt()]
            }
            (Key::Char('j'), _) => vec![Effect::ScrollBy(LINE_SCROLL)],
            (Key::Char('k'), _) => vec![Effect::ScrollBy(-LINE_SCROLL)],
            (Key::Char('d'), true) => vec![Effect::ScrollBy(HALF_PAGE_SCROLL)],
            (Key::Char('u'), true) => vec![Effect::ScrollBy(-HALF_PAGE_SCROLL)],
            (Key::Char('f' | 'n'), true) => vec![Effect::ScrollBy(PAGE_SCROLL)],
            (Key::Char('b' | 'p'), true) => vec![Effect::ScrollBy(-PAGE_SCROLL)],
            (Key::Char('?'), false) => vec![Effect::ToggleHelp],
            _ => Vec::new(),
        }
    }

    fn clear_chord(&mut self) {
        if self.chord_pending {
            self.chord_pending = false;
            self.chord_generation += 1;
        }
    }

    fn first_slide(&self) -> Vec<Effect> {
        self.goto(1).into_iter().collect()
    }

    fn last_slide(&self) -> Vec<Effect> {
        self.goto(self.slides.len() as i64).into_iter().collect()
    }

    // =========================================================================
    // Command mode
    // =========================================================================

    fn command_key(&mut self, event: KeyEvent) -> Vec<Effect> {
        match event.key {
            Key::Escape => self.leave_command_mode(),
            Key::Enter => self.submit(),
            Key::Backspace => {
                self.clear_error();
                self.buffer.pop();
                vec![self.input_prompt()]
            }
            Key::Char(c) if c.is_ascii_digit() && !event.ctrl => {
                self.clear_error();
                self.buffer.push(c);
                vec![self.input_prompt()]
            }
            _ => Vec::new(),
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        let target = leading_int(&self.buffer).map(|n| self.goto(n));
        match target {
            Some(Ok(scroll)) => {
                let mut effects = vec![scroll];
                effects.extend(self.leave_command_mode());
                effects
            }
            _ => {
                self.error_shown = true;
                self.error_generation += 1;
                vec![
                    Effect::Prompt(PromptState::Error(SLIDE_NOT_FOUND.to_string())),
                    Effect::Schedule(Timer {
                        kind: TimerKind::CommandError,
                        generation: self.error_generation,
                        delay_ms: COMMAND_ERROR_MS,
                    }),
                ]
            }
        }
    }

    fn clear_error(&mut self) {
        if self.error_shown {
            self.error_shown = false;
            self.error_generation += 1;
        }
    }

    fn leave_command_mode(&mut self) -> Vec<Effect> {
        self.clear_error();
        self.mode = Mode::Normal;
        self.buffer.clear();
        vec![Effect::Prompt(PromptState::Hidden)]
    }

    fn input_prompt(&self) -> Effect {
        Effect::Prompt(PromptState::Input(format!(":{}", self.buffer)))
    }
}
