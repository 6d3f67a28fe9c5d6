use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::model::ResourceKind;
use crate::ui;

pub mod actions;
pub mod state;
pub mod table;

pub use actions::Dispatcher;
pub use state::{AppState, OverlayState, StatusLevel, StatusMessage};
pub use table::{RowMarks, TableModel, TableRow, TableSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    NextTab,
    PrevTab,
    SelectTab(ResourceKind),
    SelectNext,
    SelectPrevious,
    ColumnLeft,
    ColumnRight,
    NextPage,
    PrevPage,
    StartSearch,
    CycleSelector { forward: bool },
    NextSelector,
    CycleQuickFilter,
    SortColumn,
    ClearFilters,
    Edit,
    Save,
    SaveAll,
    Discard,
    Delete,
    Create,
    Checkout,
    Refresh,
    Help,
}

pub struct App {
    pub config: Arc<AppConfig>,
    dispatcher: Dispatcher,
    state: AppState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, client: ApiClient) -> Result<Self> {
        let mut dispatcher = Dispatcher::spawn(client).context("starting request worker")?;
        let mut state = AppState::new(
            config.view.page_size,
            ResourceKind::from(config.view.default_tab),
        );
        state.refresh_all(&mut dispatcher);
        Ok(Self {
            config,
            dispatcher,
            state,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let palette = self.config.palette();
        let mut last_tick = Instant::now();
        loop {
            let in_flight = self.dispatcher.in_flight();
            terminal
                .draw(|frame| ui::draw_app(frame, &self.state, &palette, in_flight))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        for completion in self.dispatcher.drain() {
            self.state.apply_completion(completion, &mut self.dispatcher);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => self.state.cancel_search(),
                KeyCode::Enter => self.state.finish_search(),
                KeyCode::Backspace => self.state.pop_search_char(),
                KeyCode::Char(ch) if !has_command_modifier(key) => self.state.push_search_char(ch),
                _ => {}
            }
            return;
        }

        if let Some(action) = action_for_key(key) {
            self.handle_action(action);
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let Some(overlay) = self.state.overlay_mut() else {
            return false;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match overlay {
            OverlayState::Help => self.state.close_overlay(),
            OverlayState::ConfirmDelete(_) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.state.confirm_delete(&mut self.dispatcher)
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.state.close_overlay();
                    self.state.set_status_message(Some("Delete cancelled"));
                }
                _ => {}
            },
            OverlayState::EditField(edit) => match key.code {
                KeyCode::Esc => self.state.close_overlay(),
                KeyCode::Enter => self.state.submit_edit(),
                KeyCode::Tab if !edit.choices.is_empty() => {
                    let next = edit
                        .choices
                        .iter()
                        .position(|choice| *choice == edit.input)
                        .map(|index| (index + 1) % edit.choices.len())
                        .unwrap_or(0);
                    edit.input = edit.choices[next].to_string();
                }
                KeyCode::Backspace => state::pop_grapheme(&mut edit.input),
                KeyCode::Char(ch) if !has_command_modifier(key) => edit.input.push(ch),
                _ => {}
            },
            OverlayState::Create(form) => match key.code {
                KeyCode::Esc => self.state.close_overlay(),
                KeyCode::Enter => self.state.submit_form(&mut self.dispatcher),
                KeyCode::Tab | KeyCode::Down => form.focus_next(),
                KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
                KeyCode::Backspace => state::pop_grapheme(form.input_mut()),
                KeyCode::Char(ch) if !has_command_modifier(key) => form.input_mut().push(ch),
                _ => {}
            },
            OverlayState::Checkout(checkout) => match key.code {
                KeyCode::Esc => self.state.close_overlay(),
                KeyCode::Enter => self.state.submit_checkout(&mut self.dispatcher),
                KeyCode::Tab | KeyCode::Down => checkout.focus_next(),
                KeyCode::BackTab | KeyCode::Up => checkout.focus_prev(),
                KeyCode::Char('n') if ctrl => checkout.add_part(),
                KeyCode::Char('x') if ctrl => checkout.remove_part(),
                KeyCode::Char('d') if ctrl => checkout.toggle_damaged(),
                KeyCode::Backspace => state::pop_grapheme(checkout.input_mut()),
                KeyCode::Char(ch) if !has_command_modifier(key) => checkout.input_mut().push(ch),
                _ => {}
            },
        }
        true
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextTab => self.state.cycle_tab(true),
            Action::PrevTab => self.state.cycle_tab(false),
            Action::SelectTab(kind) => self.state.set_tab(kind),
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::ColumnLeft => self.state.move_column(-1),
            Action::ColumnRight => self.state.move_column(1),
            Action::NextPage => self.state.next_page(),
            Action::PrevPage => self.state.prev_page(),
            Action::StartSearch => self.state.begin_search(),
            Action::CycleSelector { forward } => self.state.cycle_selector(forward),
            Action::NextSelector => self.state.focus_next_selector(),
            Action::CycleQuickFilter => self.state.cycle_quick_filter(),
            Action::SortColumn => self.state.sort_by_selected_column(),
            Action::ClearFilters => self.state.clear_filters(),
            Action::Edit => self.state.open_edit(),
            Action::Save => self.state.save_selected(&mut self.dispatcher),
            Action::SaveAll => self.state.save_all(&mut self.dispatcher),
            Action::Discard => self.state.discard_selected(),
            Action::Delete => self.state.request_delete(),
            Action::Create => self.state.open_create(),
            Action::Checkout => self.state.open_checkout(),
            Action::Refresh => self.state.refresh(&mut self.dispatcher),
            Action::Help => self.state.show_help(),
        }
    }
}

fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Refresh),
            _ => None,
        };
    }
    if has_command_modifier(key) {
        return None;
    }
    let action = match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Tab => Action::NextTab,
        KeyCode::BackTab => Action::PrevTab,
        KeyCode::Char('1') => Action::SelectTab(ResourceKind::Inventory),
        KeyCode::Char('2') => Action::SelectTab(ResourceKind::Users),
        KeyCode::Char('3') => Action::SelectTab(ResourceKind::Cars),
        KeyCode::Char('4') => Action::SelectTab(ResourceKind::Logs),
        KeyCode::Char('j') | KeyCode::Down => Action::SelectNext,
        KeyCode::Char('k') | KeyCode::Up => Action::SelectPrevious,
        KeyCode::Char('h') | KeyCode::Left => Action::ColumnLeft,
        KeyCode::Char('l') | KeyCode::Right => Action::ColumnRight,
        KeyCode::Char(']') | KeyCode::PageDown => Action::NextPage,
        KeyCode::Char('[') | KeyCode::PageUp => Action::PrevPage,
        KeyCode::Char('/') => Action::StartSearch,
        KeyCode::Char('f') => Action::CycleSelector { forward: true },
        KeyCode::Char('F') => Action::CycleSelector { forward: false },
        KeyCode::Char('v') => Action::NextSelector,
        KeyCode::Char('L') => Action::CycleQuickFilter,
        KeyCode::Char('o') => Action::SortColumn,
        KeyCode::Char('x') => Action::ClearFilters,
        KeyCode::Char('e') | KeyCode::Enter => Action::Edit,
        KeyCode::Char('s') => Action::Save,
        KeyCode::Char('S') => Action::SaveAll,
        KeyCode::Char('u') => Action::Discard,
        KeyCode::Char('d') => Action::Delete,
        KeyCode::Char('a') => Action::Create,
        KeyCode::Char('c') => Action::Checkout,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Char('?') => Action::Help,
        _ => return None,
    };
    Some(action)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn control_chords_take_priority() {
        assert_eq!(
            action_for_key(press(KeyCode::Char('r'), KeyModifiers::CONTROL)),
            Some(Action::Refresh)
        );
        assert_eq!(
            action_for_key(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(
            action_for_key(press(KeyCode::Char('c'), KeyModifiers::NONE)),
            Some(Action::Checkout)
        );
        assert_eq!(action_for_key(press(KeyCode::Char('s'), KeyModifiers::ALT)), None);
    }

    #[test]
    fn shifted_letters_map_to_bulk_actions() {
        assert_eq!(
            action_for_key(press(KeyCode::Char('S'), KeyModifiers::SHIFT)),
            Some(Action::SaveAll)
        );
        assert_eq!(
            action_for_key(press(KeyCode::Char('3'), KeyModifiers::NONE)),
            Some(Action::SelectTab(ResourceKind::Cars))
        );
    }
}
