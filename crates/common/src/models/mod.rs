pub mod screenshot;
pub mod signal;
pub mod trade;

pub use screenshot::ScreenshotRef;
pub use signal::{Direction, Signal};
pub use trade::{Trade, TradeEvent, TradeStatus};
