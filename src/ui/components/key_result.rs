/// Outcome of feeding a key event to a component.
///
/// Components report back whether they consumed the key and whether the
/// parent view has an event to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, nothing further to do
  Handled,
  /// Key was consumed and produced an event for the parent
  Event(T),
  /// Key was not consumed, parent should try the next handler
  NotHandled,
}
