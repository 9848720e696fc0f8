mod turn_detection;
mod consts;

pub use turn_detection::{TurnDetection, ServerVadTurnDetection};
pub use consts::*;
