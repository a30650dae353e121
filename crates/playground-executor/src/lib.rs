pub mod dispatch;
pub mod session;

pub use dispatch::{assemble, Dispatcher, Execute};
pub use session::{PlaygroundSession, RunOutcome};
