use crate::dom::{Anchor, Dom};
use crate::{Error, Result, chrome};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use lapkeu_core::{Action, Config, Locator};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

/// Attribute used to stamp resolved elements so staleness survives the
/// site's id regeneration.
const STAMP_ATTR: &str = "data-lk";

/// One browser session: launch, navigate, DOM primitives, teardown.
///
/// Exclusively owned by the orchestrator instance driving the current phase;
/// `close` must run on every exit path before the result is handed on.
pub struct SessionHandle {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    next_token: AtomicU64,
}

impl SessionHandle {
    /// Launch a fresh Chrome process and open a blank page.
    pub async fn open(config: &Config, user_agent: &str) -> Result<Self> {
        let chrome_path = chrome::find(config.chrome_path.as_deref())?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(Error::SessionCrash)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::SessionCrash(format!("Failed to launch Chrome: {}", e)))?;

        // The handler stream must be drained for any CDP command to make
        // progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        tracing::debug!("Browser session opened");

        Ok(Self {
            browser,
            page,
            handler_task,
            next_token: AtomicU64::new(1),
        })
    }

    /// Navigate to the report form and wait for the initial load.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        tracing::info!("Navigating to {}", url);
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    /// Markup of the results region anchored at the given element: the
    /// nearest enclosing container that actually holds table rows.
    pub async fn region_html(&self, anchor: &Anchor) -> Result<String> {
        let js = format!(
            r#"(() => {{
                let node = document.querySelector('[{attr}="{token}"]');
                if (!node) return null;
                while (node && node !== document.body) {{
                    if (node.querySelector && node.querySelector('tr')) return node.outerHTML;
                    node = node.parentElement;
                }}
                return null;
            }})()"#,
            attr = STAMP_ATTR,
            token = anchor.token(),
        );

        match self.eval::<Option<String>>(js).await? {
            Some(html) => Ok(html),
            None => Err(Error::ElementNotFound(format!(
                "results region for anchor {}",
                anchor.token()
            ))),
        }
    }

    /// Shut the browser down and stop the handler task.
    pub async fn close(&mut self) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        tracing::debug!("Browser session closed");
        closed
            .map(|_| ())
            .map_err(|e| Error::SessionCrash(format!("Failed to close browser: {}", e)))
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T> {
        let result = self.page.evaluate(js).await?;
        result
            .into_value::<T>()
            .map_err(|e| Error::Cdp(format!("Unexpected evaluation result: {}", e)))
    }

    /// JS expression yielding the first element the locator matches, or
    /// null. Values are embedded as JSON so quoting is always safe.
    fn find_expr(locator: &Locator) -> String {
        match locator {
            Locator::ByAttributeSubstring(fragment) => format!(
                "document.querySelector('[id*=' + {} + ']')",
                js_str(fragment)
            ),
            Locator::ByStructuralRole(role) => {
                format!("document.querySelector('[role=' + {} + ']')", js_str(role))
            }
            Locator::ByVisibleText(text) => format!(
                r#"Array.from(document.querySelectorAll('body *')).find((e) => {{
                    if ((e.textContent || '').trim() !== {text}) return false;
                    return Array.from(e.children).every((c) => (c.textContent || '').trim() === '');
                }}) || null"#,
                text = js_str(text),
            ),
        }
    }
}

#[async_trait]
impl Dom for SessionHandle {
    async fn resolve(&self, locator: &Locator) -> Result<Option<Anchor>> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let js = format!(
            r#"(() => {{
                const el = {find};
                if (!el) return false;
                el.setAttribute('{attr}', '{token}');
                return true;
            }})()"#,
            find = Self::find_expr(locator),
            attr = STAMP_ATTR,
            token = token,
        );

        let found: bool = self.eval(js).await?;
        Ok(found.then(|| Anchor::new(token)))
    }

    async fn is_attached(&self, anchor: &Anchor) -> Result<bool> {
        let js = format!(
            "document.querySelector('[{}=\"{}\"]') !== null",
            STAMP_ATTR,
            anchor.token()
        );
        self.eval(js).await
    }

    async fn is_interactable(&self, anchor: &Anchor) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('[{attr}="{token}"]');
                if (!el) return false;
                if (el.disabled) return false;
                return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
            }})()"#,
            attr = STAMP_ATTR,
            token = anchor.token(),
        );
        self.eval(js).await
    }

    async fn perform(&self, action: &Action) -> Result<()> {
        tracing::debug!("Performing: {}", action);
        let js = action_js(action);
        let status: String = self.eval(js).await?;
        match status.as_str() {
            "ok" => Ok(()),
            "notfound" => Err(Error::ElementNotFound(action.target().to_string())),
            "nomatch" => Err(Error::ElementNotFound(format!(
                "no matching option for {}",
                action
            ))),
            other => Err(Error::Cdp(format!(
                "action {} reported '{}'",
                action, other
            ))),
        }
    }
}

/// JS for one field-changing action. Events are dispatched with bubbling so
/// the site's own postback handlers fire the way a user interaction would.
fn action_js(action: &Action) -> String {
    let find = SessionHandle::find_expr(action.target());
    match action {
        Action::SelectOption { value, .. } => format!(
            r#"(() => {{
                const el = {find};
                if (!el) return 'notfound';
                if (el.tagName !== 'SELECT') return 'notselect';
                const opt = Array.from(el.options).find((o) => (o.textContent || '').trim() === {value});
                if (!opt) return 'nomatch';
                el.value = opt.value;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            find = find,
            value = js_str(value),
        ),
        Action::TypeText { text, .. } => format!(
            r#"(() => {{
                const el = {find};
                if (!el) return 'notfound';
                el.focus();
                el.value = {text};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                el.blur();
                return 'ok';
            }})()"#,
            find = find,
            text = js_str(text),
        ),
        Action::SetChecked { checked, .. } => format!(
            r#"(() => {{
                const el = {find};
                if (!el) return 'notfound';
                if (!!el.checked !== {checked}) {{
                    el.click();
                    if (!!el.checked !== {checked}) {{
                        el.checked = {checked};
                        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    }}
                }}
                return 'ok';
            }})()"#,
            find = find,
            checked = checked,
        ),
        Action::Click { .. } => format!(
            r#"(() => {{
                const el = {find};
                if (!el) return 'notfound';
                el.scrollIntoView({{ block: 'center' }});
                el.click();
                return 'ok';
            }})()"#,
            find = find,
        ),
    }
}

/// Embed a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).expect("string serialization is infallible")
}
