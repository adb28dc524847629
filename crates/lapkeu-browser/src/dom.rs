use crate::Result;
use async_trait::async_trait;
use lapkeu_core::{Action, Locator};

/// Reference to a resolved element.
///
/// The token is stamped onto the element as a data attribute when the
/// locator resolves, so detachment is observable even after the site
/// regenerates every id in the subtree: a postback that replaces the node
/// drops the stamp with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    token: u64,
}

impl Anchor {
    pub fn new(token: u64) -> Self {
        Self { token }
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Page-level DOM primitives the synchronization engine is built on.
///
/// The production implementation is `SessionHandle`; tests drive the engine
/// against a scripted fake to simulate reload timing.
#[async_trait]
pub trait Dom: Send + Sync {
    /// Find the first element matching the locator and stamp it, or `None`
    /// if the predicate matches nothing right now.
    async fn resolve(&self, locator: &Locator) -> Result<Option<Anchor>>;

    /// Whether a previously resolved element is still in the document.
    async fn is_attached(&self, anchor: &Anchor) -> Result<bool>;

    /// Whether a previously resolved element is visible and enabled.
    async fn is_interactable(&self, anchor: &Anchor) -> Result<bool>;

    /// Execute one field-changing action.
    async fn perform(&self, action: &Action) -> Result<()>;
}
