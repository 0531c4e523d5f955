use crate::api::types::{Member, Team};
use crate::query::Query;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_team_list(
  frame: &mut Frame,
  area: Rect,
  query: Option<&Query<Vec<Team>>>,
  selected: usize,
) {
  let teams: &[Team] = query.and_then(|q| q.data()).map(Vec::as_slice).unwrap_or(&[]);
  let loading = query.map(|q| q.is_loading()).unwrap_or(true);

  let title = if loading {
    " Teams (loading...) ".to_string()
  } else if query.and_then(|q| q.refresh_error()).is_some() {
    format!(" Teams ({}) (refresh failed) ", teams.len())
  } else {
    format!(" Teams ({}) ", teams.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if let Some(error) = query.and_then(|q| q.error()) {
    let paragraph = Paragraph::new(format!("Could not load teams: {}\n\nPress r to retry.", error))
      .block(block)
      .style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, area);
    return;
  }

  if teams.is_empty() && !loading {
    let paragraph = Paragraph::new("No teams yet. Press n to create one (leaders only).")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = teams
    .iter()
    .map(|team| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:<20}", truncate(&team.name, 20)),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(
          format!("{} member(s)", team.members.len()),
          Style::default().fg(Color::DarkGray),
        ),
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

pub fn draw_team_detail(
  frame: &mut Frame,
  area: Rect,
  name: &str,
  members: &[Member],
  selected: usize,
  loading: bool,
) {
  let title = if loading {
    format!(" {} (loading...) ", name)
  } else {
    format!(" {} - {} member(s) ", name, members.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if members.is_empty() && !loading {
    let paragraph = Paragraph::new("No members. Press a to add one.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = members
    .iter()
    .map(|member| {
      let email = member.email.as_deref().unwrap_or("");
      let line = Line::from(vec![
        Span::styled(
          format!("{:<20}", truncate(&member.name, 20)),
          Style::default().fg(Color::White),
        ),
        Span::styled(email.to_string(), Style::default().fg(Color::DarkGray)),
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

// Names come off the wire, so cut on char boundaries, not bytes
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
  fn test_truncate_handles_multibyte_names() {
    let name = "ü".repeat(30);
    assert_eq!(truncate(&name, 20), format!("{}...", "ü".repeat(17)));
  }
}
