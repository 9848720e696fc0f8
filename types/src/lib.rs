pub mod session;
pub mod tools;
pub mod audio;
pub mod events;
mod content;

pub use content::items::{FunctionCallItem, FunctionCallOutputItem, Item};
pub use events::{ClientEvent, RelayEvent, ServerEventType};
