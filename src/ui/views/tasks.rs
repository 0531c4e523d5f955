use crate::api::types::{Priority, Task, TaskStatus};
use crate::query::Query;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

fn status_color(status: TaskStatus) -> Color {
  match status {
    TaskStatus::Completed => Color::Green,
    TaskStatus::InProgress => Color::Yellow,
    TaskStatus::NotStarted => Color::White,
  }
}

fn priority_color(priority: Priority) -> Color {
  match priority {
    Priority::High => Color::Red,
    Priority::Medium => Color::Yellow,
    Priority::Low => Color::Green,
  }
}

fn task_line(task: &Task) -> Line<'_> {
  Line::from(vec![
    Span::styled(
      format!("{:<12}", truncate(task.status.as_str(), 12)),
      Style::default().fg(status_color(task.status)),
    ),
    Span::raw(" "),
    Span::styled(
      format!("{:<7}", task.priority.as_str()),
      Style::default().fg(priority_color(task.priority)),
    ),
    Span::raw(" "),
    Span::styled(
      format!("{:<11}", task.end_date),
      Style::default().fg(Color::DarkGray),
    ),
    Span::raw(" "),
    Span::raw(truncate(&task.title, 60)),
  ])
}

pub fn draw_task_list(
  frame: &mut Frame,
  area: Rect,
  query: Option<&Query<Vec<Task>>>,
  selected: usize,
  search: &str,
) {
  let tasks: &[Task] = query.and_then(|q| q.data()).map(Vec::as_slice).unwrap_or(&[]);
  let loading = query.map(|q| q.is_loading()).unwrap_or(true);
  let fetching = query.map(|q| q.is_fetching()).unwrap_or(false);

  let mut title = if loading {
    " Tasks (loading...) ".to_string()
  } else if fetching {
    format!(" Tasks ({}) ~ ", tasks.len())
  } else if query.and_then(|q| q.refresh_error()).is_some() {
    format!(" Tasks ({}) (refresh failed) ", tasks.len())
  } else {
    format!(" Tasks ({}) ", tasks.len())
  };
  if !search.is_empty() {
    title = format!("{}/{} ", title, search);
  }

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if let Some(error) = query.and_then(|q| q.error()) {
    let paragraph = Paragraph::new(format!("Could not load tasks: {}\n\nPress r to retry.", error))
      .block(block)
      .style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, area);
    return;
  }

  if tasks.is_empty() && !loading {
    let content = if search.is_empty() {
      "No tasks yet. Press n to create one."
    } else {
      "No tasks match the search."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = tasks.iter().map(|t| ListItem::new(task_line(t))).collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}

pub fn draw_trash(frame: &mut Frame, area: Rect, tasks: &[Task], selected: usize, loading: bool) {
  let title = if loading {
    " Trash (loading...) ".to_string()
  } else {
    format!(" Trash ({}) ", tasks.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Magenta));

  if tasks.is_empty() && !loading {
    let paragraph = Paragraph::new("Trash is empty.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = tasks
    .iter()
    .map(|task| {
      let deleted = task.deleted_at.as_deref().unwrap_or("");
      let line = Line::from(vec![
        Span::styled(
          format!("{:<11}", truncate(deleted, 11)),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::raw(truncate(&task.title, 60)),
        Span::styled("  Enter:restore", Style::default().fg(Color::DarkGray)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}

// Titles come off the wire, so cut on char boundaries, not bytes
fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_handles_multibyte_titles() {
    let title = "é".repeat(40);
    assert_eq!(truncate(&title, 12), format!("{}...", "é".repeat(9)));
  }

  #[test]
  fn test_truncate_leaves_short_titles_alone() {
    assert_eq!(truncate("deploy", 12), "deploy");
  }
}
