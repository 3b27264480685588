//! The terminal front end: picking a serial device, and showing the
//! running estimate until the user stops it.

mod device_selector;
mod error;
mod run_until_stop;

pub use device_selector::device_selector;
pub use error::GuiError;
pub use run_until_stop::run_until_stop;
