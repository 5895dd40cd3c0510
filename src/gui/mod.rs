//! Terminal screens used by the command line tools.

mod device_selector;
mod error;
mod watch_session;

pub use device_selector::device_selector;
pub use error::GuiError;
pub use watch_session::watch_session;
