//! Shared form rendering.
//!
//! Every form screen renders the same way: one row per field with the label,
//! the current value (the edit buffer for the focused field), and the
//! field's error once it has been touched.

use crate::api::types::{Category, Member, Team};
use crate::app::{FieldKind, FormScreen};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Map a select field's stored id to its display label.
type LabelFn<'a> = &'a dyn Fn(&str, &str) -> String;

fn raw_label(_field: &str, value: &str) -> String {
  value.to_string()
}

pub fn draw_form(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  hint: &str,
  screen: &FormScreen,
  label_for: LabelFn,
) {
  let block = Block::default()
    .title(title.to_string())
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let label_width = screen
    .fields
    .iter()
    .map(|f| f.label.len())
    .max()
    .unwrap_or(10);

  let mut lines: Vec<Line> = Vec::new();
  for (i, spec) in screen.fields.iter().enumerate() {
    let focused = i == screen.focus;

    let raw = if focused && spec.kind != FieldKind::Select {
      screen.input.value().to_string()
    } else {
      screen.form.value(spec.key).to_string()
    };

    let shown = match spec.kind {
      FieldKind::Secret => "\u{2022}".repeat(raw.chars().count()),
      FieldKind::Select => {
        let label = label_for(spec.key, &raw);
        if focused {
          format!("\u{2190} {} \u{2192}", label)
        } else {
          label
        }
      }
      FieldKind::Text => raw,
    };

    let label_style = if focused {
      Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::Gray)
    };
    let value_style = if focused {
      Style::default().fg(Color::White)
    } else {
      Style::default().fg(Color::DarkGray)
    };

    let mut spans = vec![
      Span::styled(
        format!(" {:>width$}: ", spec.label, width = label_width),
        label_style,
      ),
      Span::styled(shown, value_style),
    ];
    if focused && spec.kind != FieldKind::Select {
      spans.push(Span::styled("\u{2588}", Style::default().fg(Color::White)));
    }
    if let Some(error) = screen.form.visible_error(spec.key) {
      spans.push(Span::styled(
        format!("  {}", error),
        Style::default().fg(Color::Red),
      ));
    }
    lines.push(Line::from(spans));
    lines.push(Line::default());
  }

  lines.push(Line::default());
  let footer = if screen.submitting {
    Line::from(Span::styled(
      " submitting...",
      Style::default().fg(Color::Yellow),
    ))
  } else {
    Line::from(Span::styled(
      format!(" {}", hint),
      Style::default().fg(Color::DarkGray),
    ))
  };
  lines.push(footer);

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn draw_team_form(frame: &mut Frame, area: Rect, screen: &FormScreen) {
  draw_form(
    frame,
    area,
    " New Team ",
    "Enter:create  Esc:back",
    screen,
    &raw_label,
  );
}

pub fn draw_task_form(
  frame: &mut Frame,
  area: Rect,
  screen: &FormScreen,
  editing: Option<u64>,
  categories: &[Category],
  teams: &[Team],
  members: &[Member],
) {
  let title = match editing {
    Some(id) => format!(" Edit Task #{} ", id),
    None => " New Task ".to_string(),
  };

  let label_for = |field: &str, value: &str| -> String {
    if value.is_empty() {
      return "(none)".to_string();
    }
    match field {
      "category_id" => categories
        .iter()
        .find(|c| c.id.to_string() == value)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| format!("#{}", value)),
      "team_id" => teams
        .iter()
        .find(|t| t.id.to_string() == value)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| format!("#{}", value)),
      "user_id" => members
        .iter()
        .find(|m| m.id.to_string() == value)
        .map(|m| m.name.clone())
        .unwrap_or_else(|| format!("#{}", value)),
      _ => value.to_string(),
    }
  };

  draw_form(
    frame,
    area,
    &title,
    "Tab:next  \u{2190}/\u{2192}:change option  Enter:save  Esc:back",
    screen,
    &label_for,
  );
}
