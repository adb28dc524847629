use crate::dom::{Anchor, Dom};
use crate::{Error, Result};
use lapkeu_core::{Action, Locator};
use std::time::Duration;
use tokio::time::Instant;

/// Turns a field-change action into a wait-confirmed state transition.
///
/// The form reloads part of the page after nearly every field change. The
/// engine executes the action, watches the prior anchor for detachment, then
/// polls for the next expected element. Staleness is only a grace-window
/// hint: reloads that finish too fast (or swap content without replacing the
/// anchor node) never show it, so the next-state predicate is what actually
/// decides.
pub struct SyncEngine<D> {
    dom: D,
    stale_grace: Duration,
    poll_interval: Duration,
}

impl<D: Dom> SyncEngine<D> {
    pub fn new(dom: D, stale_grace: Duration, poll_interval: Duration) -> Self {
        Self {
            dom,
            stale_grace,
            poll_interval,
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    /// Execute the action, then wait for evidence that the resulting reload
    /// completed: the anchor detaching and the next locator resolving to an
    /// interactable element. Fails with `SyncTimeout` when the next state
    /// does not appear in time.
    pub async fn perform_and_sync(
        &self,
        action: &Action,
        anchor: Option<&Anchor>,
        next: &Locator,
        timeout: Duration,
    ) -> Result<Anchor> {
        self.dom.perform(action).await?;

        if let Some(anchor) = anchor {
            self.await_staleness(anchor).await?;
        }

        self.wait_for(next, timeout).await
    }

    /// Poll until the locator resolves to a present and interactable
    /// element.
    pub async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<Anchor> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(anchor) = self.dom.resolve(locator).await? {
                if self.dom.is_interactable(&anchor).await? {
                    return Ok(anchor);
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::SyncTimeout(locator.to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Resolve a locator that must match right now. A predicate that never
    /// matched is `ElementNotFound`, distinct from the wait-shaped timeout.
    pub async fn resolve_required(&self, locator: &Locator) -> Result<Anchor> {
        match self.dom.resolve(locator).await? {
            Some(anchor) => Ok(anchor),
            None => Err(Error::ElementNotFound(locator.to_string())),
        }
    }

    /// Watch the anchor for detachment, giving up quietly after the grace
    /// window.
    async fn await_staleness(&self, anchor: &Anchor) -> Result<()> {
        let deadline = Instant::now() + self.stale_grace;
        while Instant::now() < deadline {
            if !self.dom.is_attached(anchor).await? {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        tracing::debug!(
            "anchor {} never went stale; falling back to next-state polling",
            anchor.token()
        );
        Ok(())
    }
}
