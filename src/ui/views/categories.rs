use crate::api::types::{Category, CategoryPage};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_categories(
  frame: &mut Frame,
  area: Rect,
  page: Option<&CategoryPage>,
  recent: &[Category],
  selected: usize,
  loading: bool,
) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(3), // Recently visited
      Constraint::Min(1),    // Paginated list
      Constraint::Length(1), // Page controls
    ])
    .split(area);

  draw_recent(frame, chunks[0], recent);
  draw_page(frame, chunks[1], page, selected, loading);
  draw_page_controls(frame, chunks[2], page);
}

fn draw_recent(frame: &mut Frame, area: Rect, recent: &[Category]) {
  let block = Block::default()
    .title(" Recently visited ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let content = if recent.is_empty() {
    Line::from(Span::styled("(none)", Style::default().fg(Color::DarkGray)))
  } else {
    let mut spans = Vec::new();
    for (i, category) in recent.iter().enumerate() {
      if i > 0 {
        spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
      }
      spans.push(Span::styled(
        category.name.as_str(),
        Style::default().fg(Color::Cyan),
      ));
    }
    Line::from(spans)
  };

  frame.render_widget(Paragraph::new(content).block(block), area);
}

fn draw_page(
  frame: &mut Frame,
  area: Rect,
  page: Option<&CategoryPage>,
  selected: usize,
  loading: bool,
) {
  let categories: &[Category] = page.map(|p| p.data.as_slice()).unwrap_or(&[]);

  let title = if loading {
    " Categories (loading...) ".to_string()
  } else {
    format!(" Categories ({}) ", categories.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if categories.is_empty() && !loading {
    let paragraph = Paragraph::new("No categories.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = categories
    .iter()
    .map(|category| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:<5}", category.id),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(category.name.as_str()),
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

/// Numbered page buttons built from the numeric `meta.links` labels; the
/// previous/next markers the backend mixes in never render.
fn draw_page_controls(frame: &mut Frame, area: Rect, page: Option<&CategoryPage>) {
  let Some(page) = page else {
    return;
  };

  let mut spans = vec![Span::styled(
    " \u{2190}/\u{2192}:page ",
    Style::default().fg(Color::DarkGray),
  )];
  for link in &page.links {
    let Ok(number) = link.label.trim().parse::<u32>() else {
      continue;
    };
    let style = if link.active {
      Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::Cyan)
    };
    spans.push(Span::styled(format!(" {} ", number), style));
  }

  frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
