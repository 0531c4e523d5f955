pub mod auth;
pub mod categories;
pub mod forms;
pub mod tasks;
pub mod teams;
