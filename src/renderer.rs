//! CDP render session
//!
//! One render is one browser process, one tab, and a fully sequential
//! pipeline: launch, load, wait for assets, settle, measure, resize,
//! export. The session owns the browser; dropping the session tears the
//! child process down on success and on every failure path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::Browser;
use tempfile::NamedTempFile;
use url::Url;

use crate::chrome;
use crate::error::{Error, Result};
use crate::measure;
use crate::normalize::normalize_markup;
use crate::{px_to_inches, DeviceKind, MeasuredLayout, RenderConfig, RenderRequest};

/// Surface height used before the content height is known
const INITIAL_SURFACE_HEIGHT_PX: u32 = 800;

/// Poll interval for the network-idle wait
const IDLE_POLL: Duration = Duration::from_millis(100);

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

// Token-substituted page scripts (`{{...}}` placeholders, replaced before
// evaluation). The asset wait races fonts+images against a deadline and
// resolves 'timeout' instead of rejecting, so timing out stays non-fatal.
const ASSET_WAIT_TEMPLATE: &str = r#"
(async () => {
    const deadline = new Promise(resolve => setTimeout(() => resolve('timeout'), {{TIMEOUT_MS}}));
    const assets = (async () => {
        if (document.fonts && document.fonts.ready) {
            await document.fonts.ready;
        }
        const pending = Array.from(document.images)
            .filter(img => !img.complete)
            .map(img => new Promise(resolve => {
                img.addEventListener('load', resolve, { once: true });
                img.addEventListener('error', resolve, { once: true });
            }));
        await Promise.all(pending);
        return 'ok';
    })();
    return await Promise.race([assets, deadline]);
})()
"#;

const CONTENT_WIDTH_TEMPLATE: &str = r#"
(() => {
    const style = document.createElement('style');
    style.textContent = 'body > * { max-width: {{MAX_WIDTH}}px; margin-left: auto; margin-right: auto; }';
    document.head.appendChild(style);
    return true;
})()
"#;

/// Render a request to a PDF file at `request.output`.
///
/// This is the crate's main entry point: it normalizes the markup, runs a
/// [`RenderSession`], and writes the exported document. The returned
/// [`MeasuredLayout`] is the final page size in CSS pixels.
pub fn render(request: &RenderRequest, config: &RenderConfig) -> Result<MeasuredLayout> {
    if request.markup.trim().is_empty() {
        return Err(Error::InvalidInput("markup is empty".into()));
    }
    let width = request.effective_width();
    if width == 0 {
        return Err(Error::InvalidInput("surface width must be positive".into()));
    }

    let markup = normalize_markup(&request.markup, request.device_kind);
    let mobile = request.device_kind == DeviceKind::Mobile;

    let session = RenderSession::start(config.clone(), width, mobile)?;
    let layout = session.run(&markup)?;
    let pdf = session.export_pdf(layout)?;

    std::fs::write(&request.output, &pdf).map_err(|e| {
        Error::Export(format!("failed to write {}: {e}", request.output.display()))
    })?;

    log::info!(
        "wrote {} ({} bytes, {}x{} px)",
        request.output.display(),
        pdf.len(),
        layout.width_px,
        layout.height_px
    );
    Ok(layout)
}

/// A live headless-browser session sized for one render
pub struct RenderSession {
    // Owns the child process; dropping it releases the browser on every path.
    _browser: Browser,
    tab: Arc<Tab>,
    config: RenderConfig,
    width: u32,
    mobile: bool,
}

impl RenderSession {
    /// Launch the browser and prepare a surface of the given width.
    pub fn start(config: RenderConfig, width: u32, mobile: bool) -> Result<Self> {
        let executable = chrome::locate_chrome(config.chrome_path.as_deref())?;
        let options = chrome::launch_options(executable, width, INITIAL_SURFACE_HEIGHT_PX)?;

        let browser = Browser::new(options)
            .map_err(|e| Error::Launch(format!("failed to launch browser: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("failed to create tab: {e}")))?;

        // Method calls must outlive the bounded asset wait.
        tab.set_default_timeout(std::cmp::max(
            Duration::from_secs(20),
            config.asset_timeout * 2,
        ));

        let session = RenderSession {
            _browser: browser,
            tab,
            config,
            width,
            mobile,
        };

        session.apply_surface(width, INITIAL_SURFACE_HEIGHT_PX)?;
        if mobile {
            session
                .tab
                .set_user_agent(MOBILE_USER_AGENT, None, None)
                .map_err(|e| Error::Launch(format!("failed to set user agent: {e}")))?;
        }

        Ok(session)
    }

    /// Load, wait, measure, and resize; returns the final surface size.
    pub fn run(&self, markup: &str) -> Result<MeasuredLayout> {
        // Keep the staged file on disk until the whole pipeline is done.
        let _staged = self.load_markup(markup)?;

        self.wait_for_network_idle();
        self.await_assets();
        std::thread::sleep(self.config.settle_delay);

        if let Some(max_width) = self.config.max_content_width {
            self.constrain_content_width(max_width)?;
        }

        let measured = self.measure()?;
        log::debug!(
            "measured content {}x{} px on a {} px surface",
            measured.width_px,
            measured.height_px,
            self.width
        );

        // The exported page keeps the requested width; only the height is
        // driven by measurement.
        let layout = MeasuredLayout {
            width_px: self.width,
            height_px: measured.height_px,
        };
        self.apply_surface(layout.width_px, layout.height_px)?;
        Ok(layout)
    }

    /// Export a single page at exactly the given size.
    pub fn export_pdf(&self, layout: MeasuredLayout) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            landscape: Some(false),
            display_header_footer: Some(false),
            print_background: Some(true),
            scale: Some(1.0),
            paper_width: Some(px_to_inches(layout.width_px)),
            paper_height: Some(px_to_inches(layout.height_px)),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            page_ranges: Some("1".to_string()),
            ignore_invalid_page_ranges: Some(true),
            prefer_css_page_size: Some(true),
            ..Default::default()
        };

        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| Error::Export(format!("PDF generation failed: {e}")))
    }

    fn load_markup(&self, markup: &str) -> Result<NamedTempFile> {
        let staged = tempfile::Builder::new()
            .prefix("pagefit-")
            .suffix(".html")
            .tempfile()?;
        std::fs::write(staged.path(), markup)?;

        let file_url = Url::from_file_path(staged.path())
            .map_err(|_| Error::Load(format!("not a loadable path: {}", staged.path().display())))?;

        self.tab
            .navigate_to(file_url.as_str())
            .map_err(|e| Error::Load(format!("navigation failed: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::Load(format!("wait for navigation failed: {e}")))?;

        Ok(staged)
    }

    /// Wait until no new resource fetches appear for the configured idle
    /// window, bounded by `network_idle_timeout`. Never fails; a busy page
    /// just proceeds after the bound.
    fn wait_for_network_idle(&self) {
        let start = Instant::now();
        let mut last_seen: i64 = -1;
        let mut stable_since = Instant::now();

        while start.elapsed() < self.config.network_idle_timeout {
            let count = self
                .tab
                .evaluate("performance.getEntriesByType('resource').length", false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_i64())
                .unwrap_or(-1);

            if count == last_seen {
                if stable_since.elapsed() >= self.config.network_idle {
                    log::debug!("network idle after {:?}", start.elapsed());
                    return;
                }
            } else {
                last_seen = count;
                stable_since = Instant::now();
            }
            std::thread::sleep(IDLE_POLL);
        }
        log::debug!(
            "no {:?} idle window within {:?}; proceeding",
            self.config.network_idle,
            self.config.network_idle_timeout
        );
    }

    /// Wait for fonts and images, bounded by the asset timeout. Timing out
    /// or failing here is logged and ignored.
    fn await_assets(&self) {
        let script = ASSET_WAIT_TEMPLATE.replace(
            "{{TIMEOUT_MS}}",
            &self.config.asset_timeout.as_millis().to_string(),
        );

        match self.tab.evaluate(&script, true) {
            Ok(result) => {
                let outcome = result.value.and_then(|v| v.as_str().map(String::from));
                if outcome.as_deref() == Some("timeout") {
                    log::warn!(
                        "assets still loading after {:?}; rendering anyway",
                        self.config.asset_timeout
                    );
                }
            }
            Err(e) => log::warn!("asset wait failed ({e}); rendering anyway"),
        }
    }

    fn constrain_content_width(&self, max_width: u32) -> Result<()> {
        let script = CONTENT_WIDTH_TEMPLATE.replace("{{MAX_WIDTH}}", &max_width.to_string());
        self.tab
            .evaluate(&script, false)
            .map_err(|e| Error::Load(format!("content width constraint failed: {e}")))?;
        Ok(())
    }

    fn measure(&self) -> Result<MeasuredLayout> {
        let script = measure::measurement_script(self.config.measure_strategy);
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::Measure(format!("measurement script failed: {e}")))?;

        let value = result
            .value
            .ok_or_else(|| Error::Measure("measurement script returned nothing".into()))?;
        measure::parse_measured(&value)
    }

    fn apply_surface(&self, width: u32, height: u32) -> Result<()> {
        let params = device_metrics_override(
            width,
            height,
            self.config.device_scale_factor,
            self.mobile,
        )?;
        self.tab
            .call_method(params)
            .map_err(|e| Error::Launch(format!("device metrics override failed: {e}")))?;
        Ok(())
    }
}

/// Build the CDP device-metrics command. The generated protocol struct
/// carries a long tail of optional fields; deserializing the wire form
/// leaves every one of them unset.
fn device_metrics_override(
    width: u32,
    height: u32,
    device_scale_factor: f64,
    mobile: bool,
) -> Result<Emulation::SetDeviceMetricsOverride> {
    serde_json::from_value(serde_json::json!({
        "width": width,
        "height": height,
        "deviceScaleFactor": device_scale_factor,
        "mobile": mobile,
    }))
    .map_err(|e| Error::Other(format!("device metrics override: {e}")))
}
