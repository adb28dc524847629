use crate::dom::{Anchor, Dom};
use crate::ratelimit::RateLimiter;
use crate::selection::{SelectionController, fields};
use crate::session::SessionHandle;
use crate::sync::SyncEngine;
use crate::{Error, Result};
use async_trait::async_trait;
use lapkeu_core::{Action, Config, FormSelection, ReportCategory};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One open session against the report site.
///
/// `wait_results` distinguishes three things after submit: the category's
/// results region rendered (`Some(markup)`), the site's explicit no-data
/// notice rendered (`None`), or neither within the timeout (`SyncTimeout`,
/// which callers treat as suspected rate limiting).
#[async_trait]
pub trait SiteSession: Send {
    async fn apply(&mut self, selection: &FormSelection) -> Result<()>;
    async fn submit(&mut self) -> Result<()>;
    async fn wait_results(&mut self, category: ReportCategory) -> Result<Option<String>>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions. The orchestrator is generic over this seam so the phase
/// state machines can be exercised against a scripted site in tests.
#[async_trait]
pub trait SiteDriver: Send + Sync {
    type Session: SiteSession;

    async fn open(&self, signature: &str) -> Result<Self::Session>;
}

/// The production driver: Chrome against the postback form.
pub struct PostbackDriver {
    config: Config,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
}

impl PostbackDriver {
    pub fn new(config: Config, limiter: Arc<RateLimiter>, cancel: CancellationToken) -> Self {
        Self {
            config,
            limiter,
            cancel,
        }
    }
}

#[async_trait]
impl SiteDriver for PostbackDriver {
    type Session = PostbackSession;

    async fn open(&self, signature: &str) -> Result<PostbackSession> {
        let session = SessionHandle::open(&self.config, signature).await?;
        session.navigate(&self.config.report_url).await?;

        Ok(PostbackSession {
            engine: SyncEngine::new(
                session,
                self.config.stale_grace(),
                self.config.poll_interval(),
            ),
            config: self.config.clone(),
            limiter: Arc::clone(&self.limiter),
            cancel: self.cancel.clone(),
            submit_anchor: None,
        })
    }
}

pub struct PostbackSession {
    engine: SyncEngine<SessionHandle>,
    config: Config,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
    submit_anchor: Option<Anchor>,
}

#[async_trait]
impl SiteSession for PostbackSession {
    async fn apply(&mut self, selection: &FormSelection) -> Result<()> {
        let controller = SelectionController::new(
            &self.engine,
            &self.limiter,
            &self.cancel,
            self.config.sync_timeout(),
        );
        self.submit_anchor = Some(controller.apply(selection).await?);
        Ok(())
    }

    async fn submit(&mut self) -> Result<()> {
        let anchor = match self.submit_anchor.take() {
            Some(anchor) => anchor,
            None => {
                self.engine
                    .resolve_required(&fields::show_button())
                    .await?
            }
        };
        if !self.engine.dom().is_interactable(&anchor).await? {
            return Err(Error::ElementNotFound(fields::show_button().to_string()));
        }

        self.limiter.pause_before_action().await;
        tracing::info!("Submitting report request");
        self.engine
            .dom()
            .perform(&Action::Click {
                target: fields::show_button(),
            })
            .await
    }

    async fn wait_results(&mut self, category: ReportCategory) -> Result<Option<String>> {
        let deadline = Instant::now() + self.config.results_timeout();
        let anchor = category.region_anchor();
        let no_data = fields::no_data_notice();

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Some(found) = self.engine.dom().resolve(&anchor).await? {
                tracing::debug!("Results region present for {}", category);
                return Ok(Some(self.engine.dom().region_html(&found).await?));
            }
            if self.engine.dom().resolve(&no_data).await?.is_some() {
                tracing::info!("Site reports no data for {}", category);
                return Ok(None);
            }

            if Instant::now() >= deadline {
                return Err(Error::SyncTimeout(format!("results for {}", category)));
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.engine.dom_mut().close().await
    }
}
