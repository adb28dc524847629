pub mod chrome;
pub mod dom;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod ratelimit;
pub mod selection;
pub mod session;
pub mod sync;

pub use dom::{Anchor, Dom};
pub use driver::{PostbackDriver, PostbackSession, SiteDriver, SiteSession};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use ratelimit::RateLimiter;
pub use selection::SelectionController;
pub use session::SessionHandle;
pub use sync::SyncEngine;
