use crate::api::cached_client::CachedApiClient;
use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::api::types::{
  Category, CategoryPage, Member, Priority, Role, Task, TaskPayload, TaskStatus, Team,
};
use crate::cache::CacheStorage;
use crate::commands::{self, Command};
use crate::config::Config;
use crate::event::{ApiEvent, Event, EventHandler};
use crate::forms::schemas::{self, reset_assignee};
use crate::forms::{FormState, Values};
use crate::query::Query;
use crate::routes::{self, Route};
use crate::session::{AuthState, SessionStore};
use crate::ui;
use crate::ui::components::{KeyResult, Picker, PickerEvent, TextInput};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
  Search,
}

/// How a form field is edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  /// Rendered masked
  Secret,
  /// Cycled through a fixed option list with Left/Right
  Select,
}

/// Static description of one field on a form screen
#[derive(Debug)]
pub struct FieldSpec {
  pub key: &'static str,
  pub label: &'static str,
  pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
  FieldSpec { key, label, kind }
}

pub const LOGIN_FIELDS: &[FieldSpec] = &[
  field("email", "Email", FieldKind::Text),
  field("password", "Password", FieldKind::Secret),
];

pub const REGISTER_FIELDS: &[FieldSpec] = &[
  field("name", "Name", FieldKind::Text),
  field("email", "Email", FieldKind::Text),
  field("password", "Password", FieldKind::Secret),
  field("password_confirmation", "Confirm password", FieldKind::Secret),
  field("role", "Role", FieldKind::Select),
];

pub const TASK_FIELDS: &[FieldSpec] = &[
  field("title", "Title", FieldKind::Text),
  field("description", "Description", FieldKind::Text),
  field("start_date", "Start date", FieldKind::Text),
  field("end_date", "End date", FieldKind::Text),
  field("status", "Status", FieldKind::Select),
  field("priority", "Priority", FieldKind::Select),
  field("category_id", "Category", FieldKind::Select),
  field("team_id", "Team", FieldKind::Select),
  field("user_id", "Assignee", FieldKind::Select),
];

pub const TEAM_FIELDS: &[FieldSpec] = &[field("name", "Team name", FieldKind::Text)];

/// What a key did to a form screen; the parent decides what happens next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormAction {
  None,
  /// Enter pressed
  Submit,
  /// Esc pressed
  Cancel,
  /// Left/Right on a select field
  Cycle(i32),
}

/// One form-backed screen: validation state, field list, focus, edit buffer.
#[derive(Debug)]
pub struct FormScreen {
  pub form: FormState,
  pub fields: &'static [FieldSpec],
  pub focus: usize,
  pub input: TextInput,
  pub submitting: bool,
}

impl FormScreen {
  pub fn new(form: FormState, fields: &'static [FieldSpec]) -> Self {
    let mut screen = Self {
      form,
      fields,
      focus: 0,
      input: TextInput::new(),
      submitting: false,
    };
    screen.sync_input();
    screen
  }

  pub fn focused(&self) -> &FieldSpec {
    &self.fields[self.focus]
  }

  /// Reload the edit buffer from the form (focus moved or values prefilled)
  pub fn sync_input(&mut self) {
    let value = self.form.value(self.focused().key).to_string();
    self.input.set_value(&value);
  }

  fn focus_next(&mut self) {
    self.form.blur(self.focused().key);
    self.focus = (self.focus + 1) % self.fields.len();
    self.sync_input();
  }

  fn focus_prev(&mut self) {
    self.form.blur(self.focused().key);
    self.focus = if self.focus == 0 {
      self.fields.len() - 1
    } else {
      self.focus - 1
    };
    self.sync_input();
  }

  fn handle_key(&mut self, key: KeyEvent) -> FormAction {
    if self.submitting {
      return FormAction::None;
    }
    match key.code {
      KeyCode::Esc => FormAction::Cancel,
      KeyCode::Enter => FormAction::Submit,
      KeyCode::Tab | KeyCode::Down => {
        self.focus_next();
        FormAction::None
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus_prev();
        FormAction::None
      }
      _ => match self.focused().kind {
        FieldKind::Select => match key.code {
          KeyCode::Left | KeyCode::Char('h') => FormAction::Cycle(-1),
          KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => FormAction::Cycle(1),
          _ => FormAction::None,
        },
        FieldKind::Text | FieldKind::Secret => {
          if self.input.handle_key(key) {
            let field = self.focused().key;
            // Cursor-only keys leave the value untouched and must not mark
            // the form dirty
            if self.input.value() != self.form.value(field) {
              let value = self.input.value().to_string();
              self.form.set_value(field, value);
            }
          }
          FormAction::None
        }
      },
    }
  }
}

/// Step a select field through its option list, wrapping at either end.
fn cycle_value(screen: &mut FormScreen, options: &[(String, String)], delta: i32) {
  if options.is_empty() {
    return;
  }
  let field = screen.focused().key;
  let current = screen.form.value(field);
  let next = match options.iter().position(|(id, _)| id == current) {
    Some(i) => (i as i32 + delta).rem_euclid(options.len() as i32) as usize,
    None => 0,
  };
  let value = options[next].0.clone();
  screen.form.set_value(field, value);
}

fn status_options() -> Vec<(String, String)> {
  TaskStatus::ALL
    .iter()
    .map(|s| (s.as_str().to_string(), s.as_str().to_string()))
    .collect()
}

fn priority_options() -> Vec<(String, String)> {
  Priority::ALL
    .iter()
    .map(|p| (p.as_str().to_string(), p.as_str().to_string()))
    .collect()
}

fn role_options() -> Vec<(String, String)> {
  vec![
    ("member".to_string(), "member".to_string()),
    ("leader".to_string(), "leader".to_string()),
  ]
}

fn parse_status(s: &str) -> Option<TaskStatus> {
  TaskStatus::ALL.iter().copied().find(|v| v.as_str() == s)
}

fn parse_priority(s: &str) -> Option<Priority> {
  Priority::ALL.iter().copied().find(|v| v.as_str() == s)
}

/// Assemble the wire payload from validated form values.
///
/// Select values always come from option lists, so a parse failure here
/// means the form was submitted in a state validation should have blocked.
fn build_task_payload(form: &FormState) -> Option<TaskPayload> {
  Some(TaskPayload {
    title: form.value("title").to_string(),
    description: form.value("description").to_string(),
    start_date: form.value("start_date").to_string(),
    end_date: form.value("end_date").to_string(),
    status: parse_status(form.value("status"))?,
    priority: parse_priority(form.value("priority"))?,
    category_id: form.value("category_id").parse().ok()?,
    team_id: form.value("team_id").parse().ok()?,
    user_id: form.value("user_id").parse().ok(),
  })
}

/// Status-line or dialog message.
#[derive(Debug, Clone)]
pub struct Notice {
  pub text: String,
  /// Blocking notices render as a dialog and must be dismissed with
  /// Enter/Esc; transient ones clear on the next keypress.
  pub blocking: bool,
}

impl Notice {
  fn transient(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      blocking: false,
    }
  }

  fn blocking(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      blocking: true,
    }
  }
}

/// View state - each variant owns its data
#[derive(Debug)]
pub enum ViewState {
  // Anonymous screens
  Login {
    screen: FormScreen,
  },
  Register {
    screen: FormScreen,
  },

  // Root views (set via : commands)
  /// The live task list; its data lives in the polled tasks query
  TaskList {
    selected: usize,
  },
  Trash {
    tasks: Vec<Task>,
    selected: usize,
    loading: bool,
  },
  Categories {
    page: Option<CategoryPage>,
    recent: Vec<Category>,
    selected: usize,
    loading: bool,
  },
  /// Team list; its data lives in the polled teams query
  Teams {
    selected: usize,
  },

  // Detail/form views (pushed via Enter or commands)
  TaskForm {
    screen: FormScreen,
    /// Some(id) when editing, None when creating
    editing: Option<u64>,
    categories: Vec<Category>,
    teams: Vec<Team>,
    members: Vec<Member>,
  },
  TeamDetail {
    team_id: u64,
    name: String,
    members: Vec<Member>,
    selected: usize,
    loading: bool,
  },
  TeamForm {
    screen: FormScreen,
  },
}

impl ViewState {
  fn login() -> Self {
    ViewState::Login {
      screen: FormScreen::new(FormState::new(schemas::login_schema()), LOGIN_FIELDS),
    }
  }

  fn register() -> Self {
    let mut screen = FormScreen::new(FormState::new(schemas::register_schema()), REGISTER_FIELDS);
    screen.form.prefill(
      [("role".to_string(), "member".to_string())]
        .into_iter()
        .collect::<Values>(),
    );
    ViewState::Register { screen }
  }

  fn task_form(editing: Option<u64>) -> Self {
    let mut screen = FormScreen::new(FormState::new(schemas::task_schema()), TASK_FIELDS);
    if editing.is_none() {
      screen.form.prefill(
        [
          ("status".to_string(), "not started".to_string()),
          ("priority".to_string(), "low".to_string()),
        ]
        .into_iter()
        .collect::<Values>(),
      );
    }
    ViewState::TaskForm {
      screen,
      editing,
      categories: Vec::new(),
      teams: Vec::new(),
      members: Vec::new(),
    }
  }

  fn team_form() -> Self {
    ViewState::TeamForm {
      screen: FormScreen::new(FormState::new(schemas::team_schema()), TEAM_FIELDS),
    }
  }

  fn is_form(&self) -> bool {
    matches!(
      self,
      ViewState::Login { .. }
        | ViewState::Register { .. }
        | ViewState::TaskForm { .. }
        | ViewState::TeamForm { .. }
    )
  }

  /// Get the label for this view in the breadcrumb
  fn breadcrumb_label(&self) -> String {
    match self {
      ViewState::Login { .. } => "Login".to_string(),
      ViewState::Register { .. } => "Register".to_string(),
      ViewState::TaskList { .. } => "Tasks".to_string(),
      ViewState::Trash { .. } => "Trash".to_string(),
      ViewState::Categories { .. } => "Categories".to_string(),
      ViewState::Teams { .. } => "Teams".to_string(),
      ViewState::TaskForm { editing: None, .. } => "New Task".to_string(),
      ViewState::TaskForm {
        editing: Some(id), ..
      } => format!("Edit Task #{}", id),
      ViewState::TeamDetail { name, .. } => name.clone(),
      ViewState::TeamForm { .. } => "New Team".to_string(),
    }
  }
}

/// Deferred navigation decided while the view stack is borrowed.
enum After {
  None,
  Pop,
  Navigate(Route),
  Quit,
}

/// Main application state
pub struct App<S: CacheStorage + 'static> {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<ViewState>,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Search filter input (after pressing /)
  search_filter: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Application configuration
  config: Config,

  /// Cached API client
  client: CachedApiClient<S>,

  /// Polled query backing the task list (rebuilt when the search changes)
  tasks_query: Option<Query<Vec<Task>>>,

  /// Polled query backing the team list and the task form's team options
  teams_query: Option<Query<Vec<Team>>>,

  /// Member-selection overlay for team detail
  picker: Picker,

  /// Status-line or dialog message
  notice: Option<Notice>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl<S: CacheStorage + 'static> App<S> {
  pub async fn new(config: Config, storage: S) -> Result<Self> {
    let session = SessionStore::load()?;
    let api = ApiClient::new(&config, session)?;
    let stale_time = chrono::Duration::seconds(config.refresh.stale_secs as i64);
    let client = CachedApiClient::new(api, storage, stale_time);
    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      view_stack: Vec::new(),
      mode: Mode::Normal,
      command_input: String::new(),
      search_filter: String::new(),
      selected_suggestion: 0,
      config,
      client,
      tasks_query: None,
      teams_query: None,
      picker: Picker::new(),
      notice: None,
      event_tx: tx,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Initial route goes through the access gate: a persisted session lands
    // on the task list, otherwise on login
    self.navigate(Route::Tasks);

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.handle_tick(),
      Event::Api(api_event) => self.handle_api_event(api_event),
      Event::ApiFailed(err) => self.handle_api_error(err),
    }
  }

  fn handle_tick(&mut self) {
    if let Some(query) = &mut self.tasks_query {
      query.tick();
      query.poll();
    }
    let teams_changed = if let Some(query) = &mut self.teams_query {
      query.tick();
      query.poll()
    } else {
      false
    };
    if teams_changed {
      self.sync_teams_into_form();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    // A blocking notice owns the keyboard until dismissed
    if let Some(notice) = &self.notice {
      if notice.blocking {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
          self.notice = None;
        }
        return;
      }
      self.notice = None;
    }

    // The member picker overlay gets the keyboard next
    if self.picker.is_active() {
      if let KeyResult::Event(PickerEvent::Selected(id)) = self.picker.handle_key(key) {
        self.add_picked_member(&id);
      }
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
      Mode::Search => self.handle_search_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Form views own the keyboard; list keybindings do not apply there
    if self.view_stack.last().map(ViewState::is_form).unwrap_or(false) {
      self.handle_form_key(key);
      return;
    }

    match key.code {
      // Quit / back
      KeyCode::Char('q') => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      KeyCode::Esc => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Left => self.change_page(-1),
      KeyCode::Right => self.change_page(1),
      KeyCode::Enter => self.enter_selected(),

      // View actions
      KeyCode::Char('n') => self.new_on_current(),
      KeyCode::Char('d') => self.delete_selected(),
      KeyCode::Char('a') => self.add_member_on_current(),
      KeyCode::Char('r') => self.refresh_current(),

      // Mode switches
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }
      KeyCode::Char('/') => {
        if matches!(self.view_stack.last(), Some(ViewState::TaskList { .. })) {
          self.mode = Mode::Search;
          self.search_filter.clear();
        }
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn handle_search_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        if !self.search_filter.is_empty() {
          self.search_filter.clear();
          self.rebuild_tasks_query();
        }
      }
      KeyCode::Enter => {
        // Apply the filter server-side and return to normal mode
        self.mode = Mode::Normal;
        self.rebuild_tasks_query();
      }
      KeyCode::Backspace => {
        self.search_filter.pop();
      }
      KeyCode::Char(c) => {
        self.search_filter.push(c);
      }
      _ => {}
    }
  }

  fn handle_form_key(&mut self, key: KeyEvent) {
    // Ctrl-R toggles between login and register
    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
      match self.view_stack.last() {
        Some(ViewState::Login { .. }) => {
          self.navigate(Route::Register);
          return;
        }
        Some(ViewState::Register { .. }) => {
          self.navigate(Route::Login);
          return;
        }
        _ => {}
      }
    }

    let client = self.client.clone();
    let tx = self.event_tx.clone();
    let mut after = After::None;
    let mut notice = None;

    match self.view_stack.last_mut() {
      Some(ViewState::Login { screen }) => match screen.handle_key(key) {
        FormAction::Cancel => after = After::Quit,
        FormAction::Submit => {
          if !screen.form.can_submit() {
            screen.form.touch_all();
          } else {
            screen.submitting = true;
            let email = screen.form.value("email").to_string();
            let password = screen.form.value("password").to_string();
            tokio::spawn(async move {
              match client.login(&email, &password).await {
                Ok(role) => {
                  let _ = tx.send(Event::Api(ApiEvent::LoggedIn(role)));
                }
                Err(e) => {
                  let _ = tx.send(Event::ApiFailed(e));
                }
              }
            });
          }
        }
        _ => {}
      },

      Some(ViewState::Register { screen }) => match screen.handle_key(key) {
        FormAction::Cancel => after = After::Navigate(Route::Login),
        FormAction::Cycle(delta) => {
          if screen.focused().key == "role" {
            cycle_value(screen, &role_options(), delta);
          }
        }
        FormAction::Submit => {
          if !screen.form.can_submit() {
            screen.form.touch_all();
          } else {
            screen.submitting = true;
            let name = screen.form.value("name").to_string();
            let email = screen.form.value("email").to_string();
            let password = screen.form.value("password").to_string();
            let confirmation = screen.form.value("password_confirmation").to_string();
            let role = screen.form.value("role").to_string();
            tokio::spawn(async move {
              match client
                .register(&name, &email, &password, &confirmation, &role)
                .await
              {
                Ok(role) => {
                  let _ = tx.send(Event::Api(ApiEvent::LoggedIn(role)));
                }
                Err(e) => {
                  let _ = tx.send(Event::ApiFailed(e));
                }
              }
            });
          }
        }
        _ => {}
      },

      Some(ViewState::TaskForm {
        screen,
        editing,
        categories,
        teams,
        members,
      }) => match screen.handle_key(key) {
        FormAction::Cancel => after = After::Pop,
        FormAction::Cycle(delta) => {
          let field = screen.focused().key;
          let options = match field {
            "status" => status_options(),
            "priority" => priority_options(),
            "category_id" => categories
              .iter()
              .map(|c| (c.id.to_string(), c.name.clone()))
              .collect(),
            "team_id" => teams
              .iter()
              .map(|t| (t.id.to_string(), t.name.clone()))
              .collect(),
            "user_id" => members
              .iter()
              .map(|m| (m.id.to_string(), m.name.clone()))
              .collect(),
            _ => Vec::new(),
          };
          let before = screen.form.value("team_id").to_string();
          cycle_value(screen, &options, delta);
          // Changing the team refetches its members; the assignee resets
          // when they arrive
          if field == "team_id" && screen.form.value("team_id") != before {
            if let Ok(team_id) = screen.form.value("team_id").parse::<u64>() {
              tokio::spawn(async move {
                match client.team_members(team_id).await {
                  Ok(members) => {
                    let _ = tx.send(Event::Api(ApiEvent::MembersLoaded { team_id, members }));
                  }
                  Err(e) => {
                    let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
                  }
                }
              });
            }
          }
        }
        FormAction::Submit => {
          if !screen.form.can_submit() {
            screen.form.touch_all();
          } else if let Some(payload) = build_task_payload(&screen.form) {
            screen.submitting = true;
            let editing = *editing;
            tokio::spawn(async move {
              let result = match editing {
                Some(id) => client.update_task(id, &payload).await.map(|_| ()),
                None => client.create_task(&payload).await.map(|_| ()),
              };
              match result {
                Ok(()) => {
                  let _ = tx.send(Event::Api(ApiEvent::TaskMutated));
                }
                Err(e) => {
                  let _ = tx.send(Event::ApiFailed(e));
                }
              }
            });
          } else {
            notice = Some(Notice::transient("Form has unresolved fields"));
          }
        }
        _ => {}
      },

      Some(ViewState::TeamForm { screen }) => match screen.handle_key(key) {
        FormAction::Cancel => after = After::Pop,
        FormAction::Submit => {
          if !screen.form.can_submit() {
            screen.form.touch_all();
          } else {
            screen.submitting = true;
            let name = screen.form.value("name").to_string();
            tokio::spawn(async move {
              match client.create_team(&name).await {
                Ok(_) => {
                  let _ = tx.send(Event::Api(ApiEvent::TeamMutated));
                }
                Err(e) => {
                  let _ = tx.send(Event::ApiFailed(e));
                }
              }
            });
          }
        }
        _ => {}
      },

      _ => {}
    }

    if let Some(n) = notice {
      self.notice = Some(n);
    }
    match after {
      After::None => {}
      After::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }
      After::Navigate(route) => self.navigate(route),
      After::Quit => self.should_quit = true,
    }
  }

  fn execute_command(&mut self) {
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = if !suggestions.is_empty() && self.selected_suggestion < suggestions.len() {
      suggestions[self.selected_suggestion].name.to_string()
    } else {
      self.command_input.trim().to_lowercase()
    };

    match cmd.as_str() {
      "tasks" => self.navigate(Route::Tasks),
      "new" => self.navigate(Route::TaskCreate),
      "trash" => self.navigate(Route::DeletedTasks),
      "categories" => self.navigate(Route::Categories),
      "teams" => self.navigate(Route::Teams),
      "newteam" => self.navigate(Route::TeamCreate),
      "logout" => self.logout(),
      "quit" => {
        self.should_quit = true;
      }
      _ => {
        // Unknown command
      }
    }
    self.command_input.clear();
  }

  /// Route a navigation request through the access gate and build the
  /// target view. Root routes reset the stack; detail routes push onto it.
  fn navigate(&mut self, route: Route) {
    let route = routes::resolve(route, self.client.session().auth_state());
    match route {
      Route::Login => {
        self.view_stack = vec![ViewState::login()];
        self.tasks_query = None;
        self.teams_query = None;
      }
      Route::Register => {
        self.view_stack = vec![ViewState::register()];
        self.tasks_query = None;
        self.teams_query = None;
      }
      Route::Tasks => {
        self.view_stack = vec![ViewState::TaskList { selected: 0 }];
        self.rebuild_tasks_query();
      }
      Route::DeletedTasks => {
        self.view_stack = vec![ViewState::Trash {
          tasks: Vec::new(),
          selected: 0,
          loading: true,
        }];
        self.load_deleted_tasks();
      }
      Route::Categories => {
        self.view_stack = vec![ViewState::Categories {
          page: None,
          recent: Vec::new(),
          selected: 0,
          loading: true,
        }];
        self.load_categories(1);
        self.load_recent_categories();
      }
      Route::Teams => {
        self.view_stack = vec![ViewState::Teams { selected: 0 }];
        self.ensure_teams_query();
      }
      Route::TaskCreate => {
        self.push_task_form(None);
      }
      Route::TaskEdit(id) => {
        self.push_task_form(Some(id));
        self.load_task(id);
      }
      Route::TeamDetail(id) => {
        let name = self
          .teams_query
          .as_ref()
          .and_then(|q| q.data())
          .and_then(|teams| teams.iter().find(|t| t.id == id))
          .map(|t| t.name.clone())
          .unwrap_or_else(|| format!("Team #{}", id));
        self.view_stack.push(ViewState::TeamDetail {
          team_id: id,
          name,
          members: Vec::new(),
          selected: 0,
          loading: true,
        });
        self.load_members(id);
      }
      Route::TeamCreate => {
        self.view_stack.push(ViewState::team_form());
      }
    }
  }

  fn push_task_form(&mut self, editing: Option<u64>) {
    self.view_stack.push(ViewState::task_form(editing));
    self.ensure_teams_query();
    self.sync_teams_into_form();
    self.load_categories(1);
  }

  fn logout(&mut self) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      client.logout().await;
      let _ = tx.send(Event::Api(ApiEvent::LoggedOut));
    });
  }

  // ==========================================================================
  // Data loading
  // ==========================================================================

  fn rebuild_tasks_query(&mut self) {
    let client = self.client.clone();
    let search = self.search_filter.clone();
    let interval = Duration::from_secs(self.config.refresh.interval_secs);

    let mut query = Query::new(move || {
      let client = client.clone();
      let search = search.clone();
      async move {
        let search = (!search.is_empty()).then_some(search);
        client
          .tasks(1, search.as_deref())
          .await
          .map_err(|e| e.to_string())
      }
    })
    .with_refetch_interval(interval);
    query.fetch();
    self.tasks_query = Some(query);
  }

  fn ensure_teams_query(&mut self) {
    if self.teams_query.is_some() {
      return;
    }
    let client = self.client.clone();
    let interval = Duration::from_secs(self.config.refresh.interval_secs);

    let mut query = Query::new(move || {
      let client = client.clone();
      async move { client.teams().await.map_err(|e| e.to_string()) }
    })
    .with_refetch_interval(interval);
    query.fetch();
    self.teams_query = Some(query);
  }

  fn load_deleted_tasks(&self) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.deleted_tasks().await {
        Ok(tasks) => {
          let _ = tx.send(Event::Api(ApiEvent::DeletedTasksLoaded(tasks)));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
        }
      }
    });
  }

  fn load_task(&self, id: u64) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.task(id).await {
        Ok(task) => {
          let _ = tx.send(Event::Api(ApiEvent::TaskLoaded(Box::new(task))));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
        }
      }
    });
  }

  fn load_categories(&self, page: u32) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.categories(page).await {
        Ok(page) => {
          let _ = tx.send(Event::Api(ApiEvent::CategoriesLoaded(page)));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
        }
      }
    });
  }

  fn load_recent_categories(&self) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.recent_categories().await {
        Ok(recent) => {
          let _ = tx.send(Event::Api(ApiEvent::RecentCategoriesLoaded(recent)));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
        }
      }
    });
  }

  fn load_members(&self, team_id: u64) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.team_members(team_id).await {
        Ok(members) => {
          let _ = tx.send(Event::Api(ApiEvent::MembersLoaded { team_id, members }));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
        }
      }
    });
  }

  fn load_users(&self) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.users().await {
        Ok(users) => {
          let _ = tx.send(Event::Api(ApiEvent::UsersLoaded(users)));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
        }
      }
    });
  }

  // ==========================================================================
  // List view actions
  // ==========================================================================

  fn move_selection(&mut self, delta: i32) {
    let tasks_len = self
      .tasks_query
      .as_ref()
      .and_then(|q| q.data())
      .map(Vec::len)
      .unwrap_or(0);
    let teams_len = self
      .teams_query
      .as_ref()
      .and_then(|q| q.data())
      .map(Vec::len)
      .unwrap_or(0);

    if let Some(view) = self.view_stack.last_mut() {
      let (selected, len) = match view {
        ViewState::TaskList { selected } => (selected, tasks_len),
        ViewState::Teams { selected } => (selected, teams_len),
        ViewState::Trash {
          tasks, selected, ..
        } => {
          let len = tasks.len();
          (selected, len)
        }
        ViewState::TeamDetail {
          members, selected, ..
        } => {
          let len = members.len();
          (selected, len)
        }
        ViewState::Categories { page, selected, .. } => {
          let len = page.as_ref().map(|p| p.data.len()).unwrap_or(0);
          (selected, len)
        }
        _ => return,
      };
      if len > 0 {
        *selected = (*selected as i32 + delta).rem_euclid(len as i32) as usize;
      }
    }
  }

  /// Left/Right on the category view steps through the numeric page links.
  fn change_page(&mut self, delta: i32) {
    let target = match self.view_stack.last() {
      Some(ViewState::Categories {
        page: Some(page), ..
      }) => {
        let labels = page.page_numbers();
        if labels.is_empty() {
          return;
        }
        let pos = labels.iter().position(|&p| p == page.page).unwrap_or(0);
        let next = (pos as i32 + delta).clamp(0, labels.len() as i32 - 1) as usize;
        let target = labels[next];
        if target == page.page {
          return;
        }
        target
      }
      _ => return,
    };

    if let Some(ViewState::Categories {
      loading, selected, ..
    }) = self.view_stack.last_mut()
    {
      *loading = true;
      *selected = 0;
    }
    self.load_categories(target);
  }

  fn enter_selected(&mut self) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    let mut after = After::None;

    match self.view_stack.last() {
      Some(ViewState::TaskList { selected }) => {
        if let Some(task) = self
          .tasks_query
          .as_ref()
          .and_then(|q| q.data())
          .and_then(|tasks| tasks.get(*selected))
        {
          after = After::Navigate(Route::TaskEdit(task.id));
        }
      }
      Some(ViewState::Teams { selected }) => {
        if let Some(team) = self
          .teams_query
          .as_ref()
          .and_then(|q| q.data())
          .and_then(|teams| teams.get(*selected))
        {
          after = After::Navigate(Route::TeamDetail(team.id));
        }
      }
      Some(ViewState::Trash { tasks, selected, .. }) => {
        if let Some(task) = tasks.get(*selected) {
          let id = task.id;
          tokio::spawn(async move {
            match client.restore_task(id).await {
              Ok(()) => {
                let _ = tx.send(Event::Api(ApiEvent::TaskMutated));
              }
              Err(e) => {
                let _ = tx.send(Event::ApiFailed(e));
              }
            }
          });
        }
      }
      Some(ViewState::Categories {
        page: Some(page),
        selected,
        ..
      }) => {
        // Opening a category counts as a visit and reorders the recent list
        if let Some(category) = page.data.get(*selected) {
          let id = category.id;
          tokio::spawn(async move {
            if let Err(e) = client.visit_category(id).await {
              let _ = tx.send(Event::ApiFailed(e));
              return;
            }
            match client.recent_categories().await {
              Ok(recent) => {
                let _ = tx.send(Event::Api(ApiEvent::RecentCategoriesLoaded(recent)));
              }
              Err(e) => {
                let _ = tx.send(Event::ApiFailed(ApiError::from_report(e)));
              }
            }
          });
        }
      }
      _ => {}
    }

    if let After::Navigate(route) = after {
      self.navigate(route);
    }
  }

  fn new_on_current(&mut self) {
    match self.view_stack.last() {
      Some(ViewState::TaskList { .. }) | Some(ViewState::Trash { .. }) => {
        self.navigate(Route::TaskCreate)
      }
      Some(ViewState::Teams { .. }) => self.navigate(Route::TeamCreate),
      _ => {}
    }
  }

  fn delete_selected(&mut self) {
    let client = self.client.clone();
    let tx = self.event_tx.clone();

    match self.view_stack.last() {
      Some(ViewState::TaskList { selected }) => {
        if let Some(task) = self
          .tasks_query
          .as_ref()
          .and_then(|q| q.data())
          .and_then(|tasks| tasks.get(*selected))
        {
          let id = task.id;
          tokio::spawn(async move {
            match client.delete_task(id).await {
              Ok(()) => {
                let _ = tx.send(Event::Api(ApiEvent::TaskMutated));
              }
              Err(e) => {
                let _ = tx.send(Event::ApiFailed(e));
              }
            }
          });
        }
      }
      Some(ViewState::Teams { selected }) => {
        if let Some(team) = self
          .teams_query
          .as_ref()
          .and_then(|q| q.data())
          .and_then(|teams| teams.get(*selected))
        {
          let id = team.id;
          tokio::spawn(async move {
            match client.delete_team(id).await {
              Ok(()) => {
                let _ = tx.send(Event::Api(ApiEvent::TeamMutated));
              }
              Err(e) => {
                let _ = tx.send(Event::ApiFailed(e));
              }
            }
          });
        }
      }
      Some(ViewState::TeamDetail {
        team_id,
        members,
        selected,
        ..
      }) => {
        if let Some(member) = members.get(*selected) {
          let team_id = *team_id;
          let user_id = member.id;
          tokio::spawn(async move {
            match client.remove_team_member(team_id, user_id).await {
              Ok(()) => {
                let _ = tx.send(Event::Api(ApiEvent::TeamMutated));
              }
              Err(e) => {
                let _ = tx.send(Event::ApiFailed(e));
              }
            }
          });
        }
      }
      _ => {}
    }
  }

  fn add_member_on_current(&mut self) {
    if matches!(self.view_stack.last(), Some(ViewState::TeamDetail { .. })) {
      // Picker opens once the user list arrives
      self.load_users();
    }
  }

  fn add_picked_member(&mut self, id: &str) {
    let Ok(user_id) = id.parse::<u64>() else {
      return;
    };
    let Some(ViewState::TeamDetail { team_id, .. }) = self.view_stack.last() else {
      return;
    };
    let team_id = *team_id;
    let client = self.client.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match client.add_team_member(team_id, user_id).await {
        Ok(()) => {
          let _ = tx.send(Event::Api(ApiEvent::TeamMutated));
        }
        Err(e) => {
          let _ = tx.send(Event::ApiFailed(e));
        }
      }
    });
  }

  fn refresh_current(&mut self) {
    enum Reload {
      None,
      Trash,
      Categories(u32),
      Members(u64),
    }

    let reload = match self.view_stack.last_mut() {
      Some(ViewState::TaskList { .. }) => {
        if let Some(query) = &mut self.tasks_query {
          query.refetch();
        }
        Reload::None
      }
      Some(ViewState::Teams { .. }) => {
        if let Some(query) = &mut self.teams_query {
          query.refetch();
        }
        Reload::None
      }
      Some(ViewState::Trash { loading, .. }) => {
        *loading = true;
        Reload::Trash
      }
      Some(ViewState::Categories { page, loading, .. }) => {
        let current = page.as_ref().map(|p| p.page).unwrap_or(1);
        *loading = true;
        Reload::Categories(current)
      }
      Some(ViewState::TeamDetail {
        team_id, loading, ..
      }) => {
        *loading = true;
        Reload::Members(*team_id)
      }
      _ => Reload::None,
    };

    match reload {
      Reload::None => {}
      Reload::Trash => self.load_deleted_tasks(),
      Reload::Categories(page) => {
        self.load_categories(page);
        self.load_recent_categories();
      }
      Reload::Members(id) => self.load_members(id),
    }
  }

  // ==========================================================================
  // API completions
  // ==========================================================================

  fn handle_api_event(&mut self, event: ApiEvent) {
    match event {
      ApiEvent::DeletedTasksLoaded(deleted) => {
        if let Some(ViewState::Trash {
          tasks,
          loading,
          selected,
        }) = self.view_stack.last_mut()
        {
          *tasks = deleted;
          *loading = false;
          if *selected >= tasks.len() {
            *selected = tasks.len().saturating_sub(1);
          }
        }
      }

      ApiEvent::TaskLoaded(task) => {
        let team_id = task.team_id;
        if let Some(ViewState::TaskForm {
          screen,
          editing: Some(id),
          ..
        }) = self.view_stack.last_mut()
        {
          if *id == task.id {
            let values: Values = [
              ("title", task.title.clone()),
              ("description", task.description.clone()),
              ("start_date", task.start_date.clone()),
              ("end_date", task.end_date.clone()),
              ("status", task.status.as_str().to_string()),
              ("priority", task.priority.as_str().to_string()),
              (
                "category_id",
                task.category_id.map(|v| v.to_string()).unwrap_or_default(),
              ),
              (
                "team_id",
                task.team_id.map(|v| v.to_string()).unwrap_or_default(),
              ),
              (
                "user_id",
                task.user_id.map(|v| v.to_string()).unwrap_or_default(),
              ),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
            screen.form.prefill(values);
            screen.sync_input();
          }
        }
        // Assignee options come from the task's current team
        if let Some(team_id) = team_id {
          self.load_members(team_id);
        }
      }

      ApiEvent::CategoriesLoaded(loaded) => match self.view_stack.last_mut() {
        Some(ViewState::Categories {
          page,
          loading,
          selected,
          ..
        }) => {
          if *selected >= loaded.data.len() {
            *selected = loaded.data.len().saturating_sub(1);
          }
          *page = Some(loaded);
          *loading = false;
        }
        Some(ViewState::TaskForm { categories, .. }) => {
          *categories = loaded.data;
        }
        _ => {}
      },

      ApiEvent::RecentCategoriesLoaded(loaded) => {
        if let Some(ViewState::Categories { recent, .. }) = self.view_stack.last_mut() {
          *recent = loaded;
        }
      }

      ApiEvent::MembersLoaded { team_id, members } => match self.view_stack.last_mut() {
        Some(ViewState::TeamDetail {
          team_id: current,
          members: list,
          loading,
          selected,
          ..
        }) => {
          if *current == team_id {
            if *selected >= members.len() {
              *selected = members.len().saturating_sub(1);
            }
            *list = members;
            *loading = false;
          }
        }
        Some(ViewState::TaskForm {
          screen,
          members: list,
          ..
        }) => {
          if screen.form.value("team_id") == team_id.to_string() {
            let had_members = !list.is_empty();
            *list = members;
            // A prefilled assignee from an edited task stays; a team switch
            // resets to the first member
            let current_user = screen.form.value("user_id");
            let still_valid = list.iter().any(|m| m.id.to_string() == current_user);
            if had_members || !still_valid {
              reset_assignee(&mut screen.form, list);
            }
            screen.sync_input();
          }
        }
        _ => {}
      },

      ApiEvent::UsersLoaded(users) => {
        if let Some(ViewState::TeamDetail { members, .. }) = self.view_stack.last() {
          // Offer only users who are not members yet
          let options: Vec<(String, String)> = users
            .iter()
            .filter(|u| !members.iter().any(|m| m.id == u.id))
            .map(|u| (u.id.to_string(), u.name.clone()))
            .collect();
          if options.is_empty() {
            self.notice = Some(Notice::transient("Everyone is already on this team"));
          } else {
            self.picker.show("Add member".to_string(), options);
          }
        }
      }

      ApiEvent::LoggedIn(role) => {
        let label = match role {
          Role::Leader => "leader",
          Role::Member => "member",
        };
        self.notice = Some(Notice::transient(format!("Logged in as {}", label)));
        self.navigate(Route::Tasks);
      }

      ApiEvent::LoggedOut => {
        self.navigate(Route::Login);
      }

      ApiEvent::TaskMutated => {
        if let Some(query) = &mut self.tasks_query {
          query.refetch();
        }
        let from_form = matches!(self.view_stack.last(), Some(ViewState::TaskForm { .. }));
        if from_form {
          self.navigate(Route::Tasks);
          self.notice = Some(Notice::transient("Task saved"));
        } else {
          let reload_trash =
            if let Some(ViewState::Trash { loading, .. }) = self.view_stack.last_mut() {
              *loading = true;
              true
            } else {
              false
            };
          if reload_trash {
            self.load_deleted_tasks();
          }
        }
      }

      ApiEvent::TeamMutated => {
        if let Some(query) = &mut self.teams_query {
          query.refetch();
        }
        let from_form = matches!(self.view_stack.last(), Some(ViewState::TeamForm { .. }));
        if from_form {
          self.navigate(Route::Teams);
          self.notice = Some(Notice::transient("Team created"));
        } else {
          let reload = if let Some(ViewState::TeamDetail {
            team_id, loading, ..
          }) = self.view_stack.last_mut()
          {
            *loading = true;
            Some(*team_id)
          } else {
            None
          };
          if let Some(id) = reload {
            self.load_members(id);
          }
        }
      }
    }
  }

  fn handle_api_error(&mut self, err: ApiError) {
    // Unfreeze any form waiting on the failed call
    if let Some(view) = self.view_stack.last_mut() {
      match view {
        ViewState::Login { screen }
        | ViewState::Register { screen }
        | ViewState::TaskForm { screen, .. }
        | ViewState::TeamForm { screen } => screen.submitting = false,
        _ => {}
      }
    }

    // An expired or revoked token drops the session and bounces to login
    if err.is_auth_failure() && self.client.session().auth_state() == AuthState::Authenticated {
      self.client.session().clear();
      self.navigate(Route::Login);
      self.notice = Some(Notice::transient("Session expired, please log in again"));
      return;
    }

    match err {
      ApiError::Forbidden(_) => {
        self.notice = Some(Notice::blocking(
          "Only team leaders can do that. Ask a leader, or register a leader account.",
        ));
      }
      ApiError::Validation(errors) => {
        if let Some(view) = self.view_stack.last_mut() {
          match view {
            ViewState::Login { screen }
            | ViewState::Register { screen }
            | ViewState::TaskForm { screen, .. }
            | ViewState::TeamForm { screen } => screen.form.touch_all(),
            _ => {}
          }
        }
        let text = errors
          .iter()
          .next()
          .map(|(field, msg)| format!("{}: {}", field, msg))
          .unwrap_or_else(|| "Validation failed".to_string());
        self.notice = Some(Notice::transient(text));
      }
      other => {
        self.notice = Some(Notice::transient(other.to_string()));
      }
    }
  }

  /// Reconcile the task form's team options with the polled team list.
  fn sync_teams_into_form(&mut self) {
    let Some(data) = self.teams_query.as_ref().and_then(|q| q.data()).cloned() else {
      return;
    };
    if let Some(ViewState::TaskForm { teams, .. }) = self.view_stack.last_mut() {
      *teams = data;
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&ViewState> {
    self.view_stack.last()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn search_filter(&self) -> &str {
    &self.search_filter
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn picker(&self) -> &Picker {
    &self.picker
  }

  pub fn tasks_query(&self) -> Option<&Query<Vec<Task>>> {
    self.tasks_query.as_ref()
  }

  pub fn teams_query(&self) -> Option<&Query<Vec<Team>>> {
    self.teams_query.as_ref()
  }

  pub fn role(&self) -> Role {
    self.client.session().role()
  }

  pub fn auth_state(&self) -> AuthState {
    self.client.session().auth_state()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}
