use crate::app::FormScreen;
use ratatui::prelude::*;

use super::forms;

fn raw_label(_field: &str, value: &str) -> String {
  value.to_string()
}

pub fn draw_login(frame: &mut Frame, area: Rect, screen: &FormScreen) {
  forms::draw_form(
    frame,
    area,
    " Login ",
    "Enter:log in  Ctrl-R:register  Esc:quit",
    screen,
    &raw_label,
  );
}

pub fn draw_register(frame: &mut Frame, area: Rect, screen: &FormScreen) {
  forms::draw_form(
    frame,
    area,
    " Register ",
    "Enter:create account  Ctrl-R:back to login",
    screen,
    &raw_label,
  );
}
