mod input;
mod key_result;
mod picker;

pub use input::TextInput;
pub use key_result::KeyResult;
pub use picker::{Picker, PickerEvent};
