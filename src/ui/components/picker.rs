use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// Events emitted by the picker that the parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
  /// An option was chosen (returns the option's id)
  Selected(String),
  /// Picker dismissed without choosing
  Cancelled,
}

/// Centered overlay for choosing one option from a list.
///
/// Options are (id, label) pairs; ids stay strings so the same picker serves
/// numeric entity ids and enum values like roles or statuses.
#[derive(Debug, Clone, Default)]
pub struct Picker {
  active: bool,
  options: Vec<(String, String)>,
  selected: usize,
  title: String,
}

impl Picker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if the picker is currently active
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Show the picker with the given options
  pub fn show(&mut self, title: String, options: Vec<(String, String)>) {
    self.active = true;
    self.options = options;
    self.selected = 0;
    self.title = title;
  }

  /// Hide the picker
  pub fn hide(&mut self) {
    self.active = false;
    self.options.clear();
    self.selected = 0;
  }

  /// Handle a key event
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PickerEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(PickerEvent::Cancelled)
      }
      KeyCode::Enter => {
        if let Some((id, _)) = self.options.get(self.selected) {
          let id = id.clone();
          self.hide();
          KeyResult::Event(PickerEvent::Selected(id))
        } else {
          self.hide();
          KeyResult::Event(PickerEvent::Cancelled)
        }
      }
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.options.is_empty() {
          self.selected = (self.selected + 1) % self.options.len();
        }
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.options.is_empty() {
          self.selected = if self.selected == 0 {
            self.options.len() - 1
          } else {
            self.selected - 1
          };
        }
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  /// Render the picker overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active || self.options.is_empty() {
      return;
    }

    let max_label_len = self
      .options
      .iter()
      .map(|(_, label)| label.len())
      .max()
      .unwrap_or(10)
      .max(self.title.len());
    let width = (max_label_len as u16 + 6)
      .min(area.width.saturating_sub(4))
      .max(20);
    let height = (self.options.len() as u16 + 2)
      .min(area.height.saturating_sub(4))
      .max(3);

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let items: Vec<ListItem> = self
      .options
      .iter()
      .map(|(_, label)| {
        let line = Line::from(vec![Span::styled(
          label.as_str(),
          Style::default().fg(Color::Cyan),
        )]);
        ListItem::new(line)
      })
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected));

    frame.render_stateful_widget(list, inner, &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn options() -> Vec<(String, String)> {
    vec![
      ("11".to_string(), "Ada".to_string()),
      ("12".to_string(), "Grace".to_string()),
    ]
  }

  #[test]
  fn test_inactive_picker_does_not_consume_keys() {
    let mut picker = Picker::new();
    assert_eq!(picker.handle_key(key(KeyCode::Enter)), KeyResult::NotHandled);
  }

  #[test]
  fn test_enter_selects_highlighted_option() {
    let mut picker = Picker::new();
    picker.show("Add member".to_string(), options());
    picker.handle_key(key(KeyCode::Down));

    let result = picker.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(PickerEvent::Selected("12".to_string()))
    );
    assert!(!picker.is_active());
  }

  #[test]
  fn test_selection_wraps() {
    let mut picker = Picker::new();
    picker.show("Add member".to_string(), options());
    picker.handle_key(key(KeyCode::Up));

    let result = picker.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(PickerEvent::Selected("12".to_string()))
    );
  }

  #[test]
  fn test_esc_cancels() {
    let mut picker = Picker::new();
    picker.show("Add member".to_string(), options());

    let result = picker.handle_key(key(KeyCode::Esc));
    assert_eq!(result, KeyResult::Event(PickerEvent::Cancelled));
    assert!(!picker.is_active());
  }
}
