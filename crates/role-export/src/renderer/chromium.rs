// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{DownloadedFile, Locator, NavigationResult, RenderContext, RenderTimeout, Renderer};
use crate::config::ExportConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Interval between element polls while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Explicit configuration (ROLE_EXPORT_CHROMIUM_PATH or --chromium)
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. ~/.role-export/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".role-export/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".role-export/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".role-export/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".role-export/chromium/chrome-linux64/chrome"),
                home.join(".role-export/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer. One instance serves one export run.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(config: &ExportConfig) -> Result<Self> {
        let chrome_path = find_chromium(config.chromium_path.as_ref()).context(
            "Chromium not found. Install Chrome/Chromium or set ROLE_EXPORT_CHROMIUM_PATH.",
        )?;

        let browser_config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1920, 1080)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .request_timeout(Duration::from_millis(
                config
                    .navigation_timeout_ms
                    .max(config.download_timeout_ms),
            ))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("Chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handler.abort();
        closed.context("failed to close Chromium")?;
        tracing::info!("Chromium shut down");
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[derive(Deserialize)]
struct FetchedFile {
    status: u16,
    #[serde(default)]
    disposition: Option<String>,
    #[serde(default)]
    data: String,
}

impl ChromiumContext {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid evaluate params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

/// JS expression yielding the first visible element matching the locator,
/// or `null`.
fn find_element_js(locator: &Locator) -> String {
    let visible = "(el) => !!(el && (el.offsetWidth || el.offsetHeight || el.getClientRects().length))";
    match locator {
        Locator::Css(selector) => {
            let sel = serde_json::Value::from(selector.as_str());
            format!(
                "(() => {{ const visible = {visible}; \
                 return Array.from(document.querySelectorAll({sel})).find(visible) || null; }})()"
            )
        }
        Locator::Button { label } => {
            let label = serde_json::Value::from(label.trim().to_lowercase());
            format!(
                "(() => {{ const visible = {visible}; \
                 const candidates = document.querySelectorAll('button, [role=button], input[type=button], input[type=submit]'); \
                 return Array.from(candidates).find(el => visible(el) && \
                   ((el.innerText || el.value || el.getAttribute('aria-label') || '').trim().toLowerCase() === {label})) || null; }})()"
            )
        }
    }
}

/// Classify a failed `goto`. chromiumoxide's own request deadline surfaces
/// as `CdpError::Timeout` and counts as a navigation timeout.
fn navigation_error(err: CdpError, timeout_ms: u64) -> anyhow::Error {
    match err {
        CdpError::Timeout => RenderTimeout::new("navigation", timeout_ms).into(),
        other => anyhow::anyhow!("navigation failed: {other}"),
    }
}

/// Poll `probe` until it reports `true` or `timeout_ms` runs out.
///
/// Probe errors count as "not yet": while the page is navigating the
/// execution context can vanish between polls.
async fn poll_until<F, Fut>(timeout_ms: u64, interval: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    loop {
        match probe().await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "element probe failed, polling on"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => Err(navigation_error(e, timeout_ms)),
            Err(_) => Err(RenderTimeout::new("navigation", timeout_ms).into()),
        }
    }

    async fn html(&self) -> Result<String> {
        self.eval("document.documentElement.outerHTML".to_string())
            .await
            .context("failed to get HTML")
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn set_cookies(
        &mut self,
        url: &str,
        cookies: &[(String, String)],
        secure: bool,
    ) -> Result<()> {
        let params = cookies
            .iter()
            .map(|(name, value)| {
                CookieParam::builder()
                    .name(name.as_str())
                    .value(value.as_str())
                    .url(url)
                    .path("/")
                    .secure(secure)
                    .http_only(false)
                    .build()
                    .map_err(|e| anyhow::anyhow!("invalid cookie: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;

        if params.is_empty() {
            return Ok(());
        }

        self.page
            .set_cookies(params)
            .await
            .context("failed to install session cookies")?;
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout_ms: u64) -> Result<bool> {
        let probe = format!("{} !== null", find_element_js(locator));
        Ok(poll_until(timeout_ms, POLL_INTERVAL, || self.eval::<bool>(probe.clone())).await)
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            find_element_js(locator)
        );
        if !self.eval::<bool>(script).await? {
            bail!("no element matches {locator}");
        }
        Ok(())
    }

    async fn fetch_linked_file(
        &mut self,
        locator: &Locator,
        timeout_ms: u64,
    ) -> Result<DownloadedFile> {
        let script = format!(
            "(async () => {{ \
               const el = {}; \
               if (!el || !el.href) return {{ status: 0 }}; \
               const resp = await fetch(el.href, {{ credentials: 'include' }}); \
               if (!resp.ok) return {{ status: resp.status }}; \
               const buf = new Uint8Array(await resp.arrayBuffer()); \
               let bin = ''; \
               for (let i = 0; i < buf.length; i += 0x8000) {{ \
                 bin += String.fromCharCode.apply(null, buf.subarray(i, i + 0x8000)); \
               }} \
               return {{ status: resp.status, disposition: resp.headers.get('content-disposition'), data: btoa(bin) }}; \
             }})()",
            find_element_js(locator)
        );

        let fetched: FetchedFile =
            match tokio::time::timeout(Duration::from_millis(timeout_ms), self.eval(script)).await {
                Ok(result) => result?,
                Err(_) => return Err(RenderTimeout::new("download", timeout_ms).into()),
            };

        if fetched.status == 0 {
            bail!("no download link matches {locator}");
        }
        if !(200..300).contains(&fetched.status) {
            bail!("download answered with status {}", fetched.status);
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(fetched.data.as_bytes())
            .context("download payload was not valid base64")?;

        Ok(DownloadedFile {
            suggested_name: fetched
                .disposition
                .as_deref()
                .and_then(super::filename_from_disposition),
            bytes,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_element_js_escapes_selector() {
        let js = find_element_js(&Locator::css(r#"a[href*="viewFile.d2lfile"]"#));
        assert!(js.contains(r#""a[href*=\"viewFile.d2lfile\"]""#));
    }

    #[test]
    fn test_find_element_js_button_label_lowercased() {
        let js = find_element_js(&Locator::button(" Export "));
        assert!(js.contains("=== \"export\""));
    }

    #[test]
    fn test_cdp_timeout_is_navigation_timeout() {
        let err = navigation_error(CdpError::Timeout, 45_000);
        assert!(super::super::is_timeout(&err));
        assert!(err.to_string().contains("45000ms"));
    }

    #[test]
    fn test_other_cdp_errors_are_plain_failures() {
        let err = navigation_error(
            CdpError::ChromeMessage("net::ERR_CONNECTION_RESET".to_string()),
            45_000,
        );
        assert!(!super::super::is_timeout(&err));
        assert!(err.to_string().contains("ERR_CONNECTION_RESET"));
    }

    #[tokio::test]
    async fn test_poll_survives_probe_errors() {
        let mut calls = 0u32;
        let found = poll_until(2_000, Duration::from_millis(1), || {
            calls += 1;
            let n = calls;
            async move {
                match n {
                    1 | 2 => Err(anyhow::anyhow!("Execution context was destroyed")),
                    3 => Ok(false),
                    _ => Ok(true),
                }
            }
        })
        .await;
        assert!(found);
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn test_poll_gives_up_at_deadline() {
        let start = Instant::now();
        let found = poll_until(30, Duration::from_millis(5), || async {
            Err::<bool, _>(anyhow::anyhow!("Cannot find context with specified id"))
        })
        .await;
        assert!(!found);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_wait_click_and_fetch() {
        let renderer = ChromiumRenderer::launch(&ExportConfig::default())
            .await
            .expect("failed to launch Chromium");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<button onclick=\"document.body.dataset.clicked='1'\"> Export </button>",
            10000,
        )
        .await
        .expect("navigation failed");

        let export = Locator::button("export");
        assert!(ctx.wait_for(&export, 2000).await.unwrap());
        ctx.click(&export).await.unwrap();
        let html = ctx.html().await.unwrap();
        assert!(html.contains("data-clicked=\"1\""));

        assert!(!ctx.wait_for(&Locator::css("a.missing"), 300).await.unwrap());

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}
