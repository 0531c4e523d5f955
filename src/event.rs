use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::error::ApiError;
use crate::api::types::{Category, CategoryPage, Member, Role, Task};

/// Completions sent back from spawned fetch/mutation tasks.
///
/// The live task and team lists are driven by polled queries instead and
/// never arrive through this channel.
#[derive(Debug)]
pub enum ApiEvent {
  DeletedTasksLoaded(Vec<Task>),
  TaskLoaded(Box<Task>),
  CategoriesLoaded(CategoryPage),
  RecentCategoriesLoaded(Vec<Category>),
  MembersLoaded { team_id: u64, members: Vec<Member> },
  UsersLoaded(Vec<Member>),
  LoggedIn(Role),
  LoggedOut,
  /// A task create/update/delete/restore went through
  TaskMutated,
  /// A team create/delete or member add/remove went through
  TeamMutated,
}

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// A backend call completed
  Api(ApiEvent),
  /// A backend call failed; the error drives the notice shown
  ApiFailed(ApiError),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn terminal event reader
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || {
      loop {
        if event::poll(tick_rate).unwrap_or(false) {
          if let Ok(evt) = event::read() {
            if let CrosstermEvent::Key(key) = evt {
              if input_tx.send(Event::Key(key)).is_err() {
                break;
              }
            }
          }
        } else {
          // Tick
          if input_tx.send(Event::Tick).is_err() {
            break;
          }
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender handed to spawned API tasks
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
