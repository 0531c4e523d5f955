pub mod components;
mod views;

use crate::app::{App, Mode, ViewState};
use crate::api::types::Role;
use crate::cache::CacheStorage;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Main draw function
pub fn draw<S: CacheStorage>(frame: &mut Frame, app: &App<S>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Breadcrumb header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);

  // Draw current view
  if let Some(view) = app.current_view() {
    match view {
      ViewState::Login { screen } => {
        views::auth::draw_login(frame, chunks[1], screen);
      }
      ViewState::Register { screen } => {
        views::auth::draw_register(frame, chunks[1], screen);
      }
      ViewState::TaskList { selected } => {
        views::tasks::draw_task_list(
          frame,
          chunks[1],
          app.tasks_query(),
          *selected,
          app.search_filter(),
        );
      }
      ViewState::Trash {
        tasks,
        selected,
        loading,
      } => {
        views::tasks::draw_trash(frame, chunks[1], tasks, *selected, *loading);
      }
      ViewState::Categories {
        page,
        recent,
        selected,
        loading,
      } => {
        views::categories::draw_categories(
          frame,
          chunks[1],
          page.as_ref(),
          recent,
          *selected,
          *loading,
        );
      }
      ViewState::Teams { selected } => {
        views::teams::draw_team_list(frame, chunks[1], app.teams_query(), *selected);
      }
      ViewState::TaskForm {
        screen,
        editing,
        categories,
        teams,
        members,
      } => {
        views::forms::draw_task_form(
          frame,
          chunks[1],
          screen,
          *editing,
          categories,
          teams,
          members,
        );
      }
      ViewState::TeamDetail {
        name,
        members,
        selected,
        loading,
        ..
      } => {
        views::teams::draw_team_detail(frame, chunks[1], name, members, *selected, *loading);
      }
      ViewState::TeamForm { screen } => {
        views::forms::draw_team_form(frame, chunks[1], screen);
      }
    }
  }

  // Draw status bar
  draw_status_bar(frame, chunks[2], app);

  // Overlays
  if *app.mode() == Mode::Command {
    draw_command_suggestions(frame, chunks[1], app);
  }
  app.picker().render_overlay(frame, chunks[1]);
  if let Some(notice) = app.notice() {
    if notice.blocking {
      draw_dialog(frame, chunks[1], &notice.text);
    }
  }
}

fn draw_header<S: CacheStorage>(frame: &mut Frame, area: Rect, app: &App<S>) {
  let breadcrumb = app.view_breadcrumb().join(" > ");
  let role = match app.role() {
    Role::Leader => "leader",
    Role::Member => "member",
  };

  let line = Line::from(vec![
    Span::styled(
      format!(" {} ", breadcrumb),
      Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ),
    Span::styled(format!("[{}]", role), Style::default().fg(Color::DarkGray)),
  ]);

  frame.render_widget(Paragraph::new(line), area);
}

fn draw_status_bar<S: CacheStorage>(frame: &mut Frame, area: Rect, app: &App<S>) {
  // A transient notice takes over the status line until the next keypress
  if let Some(notice) = app.notice() {
    if !notice.blocking {
      let paragraph =
        Paragraph::new(notice.text.as_str()).style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, area);
      return;
    }
  }

  let (content, style) = match app.mode() {
    Mode::Normal => {
      let hint = " :command  /search  j/k:nav  Enter:select  q:back  Ctrl-C:quit";
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
    Mode::Command => {
      let cmd = format!(":{}", app.command_input());
      (cmd, Style::default().fg(Color::Yellow))
    }
    Mode::Search => {
      let search = format!("/{}", app.search_filter());
      (search, Style::default().fg(Color::Cyan))
    }
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}

/// Autocomplete list anchored above the status bar while in command mode.
fn draw_command_suggestions<S: CacheStorage>(frame: &mut Frame, area: Rect, app: &App<S>) {
  let suggestions = app.autocomplete_suggestions();
  if suggestions.is_empty() {
    return;
  }

  let height = (suggestions.len() as u16).min(8);
  let width = area.width.min(44);
  let overlay = Rect::new(
    area.x,
    area.y + area.height.saturating_sub(height),
    width,
    height,
  );
  frame.render_widget(Clear, overlay);

  let lines: Vec<Line> = suggestions
    .iter()
    .take(height as usize)
    .enumerate()
    .map(|(i, cmd)| {
      let style = if i == app.selected_suggestion() {
        Style::default().bg(Color::DarkGray).fg(Color::White)
      } else {
        Style::default().fg(Color::Gray)
      };
      Line::from(vec![
        Span::styled(format!(" {:<10}", cmd.name), style.fg(Color::Yellow)),
        Span::styled(cmd.description, style),
      ])
    })
    .collect();

  frame.render_widget(Paragraph::new(lines), overlay);
}

/// Centered blocking dialog, dismissed with Enter/Esc.
fn draw_dialog(frame: &mut Frame, area: Rect, text: &str) {
  let width = area.width.saturating_sub(8).min(50).max(20);
  let height = 5;
  let x = area.x + (area.width.saturating_sub(width)) / 2;
  let y = area.y + (area.height.saturating_sub(height)) / 2;
  let dialog = Rect::new(x, y, width, height);

  frame.render_widget(Clear, dialog);
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red))
    .title(" Not allowed ");
  let paragraph = Paragraph::new(format!("{}\n\n[Enter] dismiss", text))
    .block(block)
    .wrap(Wrap { trim: true });
  frame.render_widget(paragraph, dialog);
}
