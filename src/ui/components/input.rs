use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Reusable text input buffer with cursor movement.
///
/// Views load the focused field's value into one of these, feed it key
/// events, and write the buffer back into the form on every change.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get the current input value
  pub fn value(&self) -> &str {
    &self.buffer
  }

  /// Replace the buffer (focus moved to a different field)
  pub fn set_value(&mut self, value: &str) {
    self.buffer = value.to_string();
    self.cursor = self.buffer.len();
  }

  /// Check if the input is empty
  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  /// Clear the input
  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  /// Cursor position within the buffer
  pub fn cursor(&self) -> usize {
    self.cursor
  }

  /// Handle a key event. Returns true when the key edited or moved within
  /// the buffer; Enter/Esc/Tab are left for the owning view.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          self.buffer.remove(self.cursor);
        }
        true
      }
      KeyCode::Delete => {
        if self.cursor < self.buffer.len() {
          self.buffer.remove(self.cursor);
        }
        true
      }
      KeyCode::Left => {
        if self.cursor > 0 {
          self.cursor -= 1;
        }
        true
      }
      KeyCode::Right => {
        if self.cursor < self.buffer.len() {
          self.cursor += 1;
        }
        true
      }
      KeyCode::Home => {
        self.cursor = 0;
        true
      }
      KeyCode::End => {
        self.cursor = self.buffer.len();
        true
      }
      KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = 0;
        true
      }
      KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = self.buffer.len();
        true
      }
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
        true
      }
      KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
        true
      }
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_typing_inserts_at_cursor() {
    let mut input = TextInput::new();
    for c in "bug".chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Char('r')));
    assert_eq!(input.value(), "burg");
  }

  #[test]
  fn test_backspace_removes_before_cursor() {
    let mut input = TextInput::new();
    input.set_value("teams");
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "team");
  }

  #[test]
  fn test_ctrl_u_kills_to_start() {
    let mut input = TextInput::new();
    input.set_value("discarded");
    input.handle_key(key(KeyCode::Home));
    input.handle_key(key(KeyCode::End));
    input.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    assert_eq!(input.value(), "");
  }
}
