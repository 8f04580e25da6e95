//! Content-fit PDF rendering for HTML
//!
//! `pagefit` loads HTML markup into a headless Chrome instance, measures the
//! extent of the rendered content, resizes the surface to match, and exports
//! a single-page PDF whose page size tightly bounds the content.
//!
//! # Features
//!
//! - **Width presets**: desktop (600 px), mobile (360 px with mobile
//!   emulation), or a caller-supplied custom width
//! - **Content measurement**: a visible-element scan by default, or a
//!   cheaper scroll-bounds heuristic
//! - **Safe teardown**: the browser process is released on success and on
//!   every failure path
//!
//! # Example
//!
//! ```no_run
//! use pagefit::{DeviceKind, RenderConfig, RenderRequest};
//!
//! # fn main() -> pagefit::Result<()> {
//! let request = RenderRequest {
//!     markup: "<p>Hello</p>".to_string(),
//!     output: "hello.pdf".into(),
//!     viewport_width_px: pagefit::DESKTOP_WIDTH_PX,
//!     device_kind: DeviceKind::Desktop,
//! };
//! let layout = pagefit::render(&request, &RenderConfig::default())?;
//! println!("page: {}x{} px", layout.width_px, layout.height_px);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod chrome;
pub mod measure;
pub mod normalize;
pub mod renderer;

pub use measure::MeasureStrategy;
pub use renderer::{render, RenderSession};

/// Default surface width for the desktop preset, in CSS pixels
pub const DESKTOP_WIDTH_PX: u32 = 600;

/// Fixed surface width for the mobile preset, in CSS pixels
pub const MOBILE_WIDTH_PX: u32 = 360;

/// CSS reference density used to convert pixels to page-size inches
pub const PX_PER_INCH: f64 = 96.0;

/// Convert a pixel measurement to page-size inches at the fixed 96 px/in ratio.
pub fn px_to_inches(px: u32) -> f64 {
    f64::from(px) / PX_PER_INCH
}

/// Width preset selecting the rendering surface and emulation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Desktop,
    Mobile,
    Custom,
}

impl DeviceKind {
    /// Lowercase label, used for the generated document title
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Desktop => "desktop",
            DeviceKind::Mobile => "mobile",
            DeviceKind::Custom => "custom",
        }
    }
}

/// A single render request
///
/// Constructed once per invocation and immutable for the request's
/// lifetime. `markup` may be a full HTML document or a bare fragment;
/// normalization happens inside [`render`].
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// HTML document or fragment to render
    pub markup: String,
    /// Destination path for the exported PDF
    pub output: PathBuf,
    /// Requested surface width in CSS pixels (only honored for `Custom`)
    pub viewport_width_px: u32,
    /// Width preset
    pub device_kind: DeviceKind,
}

impl RenderRequest {
    pub fn new(markup: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        RenderRequest {
            markup: markup.into(),
            output: output.into(),
            viewport_width_px: DESKTOP_WIDTH_PX,
            device_kind: DeviceKind::Desktop,
        }
    }

    /// Resolve the surface width for this request.
    ///
    /// Mobile always uses the fixed mobile width, regardless of
    /// `viewport_width_px`; the custom preset uses the supplied width;
    /// desktop uses the default.
    pub fn effective_width(&self) -> u32 {
        match self.device_kind {
            DeviceKind::Mobile => MOBILE_WIDTH_PX,
            DeviceKind::Custom => self.viewport_width_px,
            DeviceKind::Desktop => DESKTOP_WIDTH_PX,
        }
    }
}

/// Measured extent of the rendered content, in CSS pixels
///
/// Derived once per render after the content settles and consumed
/// immediately to drive the final page size. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasuredLayout {
    pub width_px: u32,
    pub height_px: u32,
}

/// Configuration for the render session
///
/// The defaults mirror the behavior of the scripted tool this crate grew
/// out of: a 2x density multiplier for crisp output, a 500 ms settle delay
/// after assets finish, and a bounded, non-fatal asset wait.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Pixel density multiplier for the rendering surface
    pub device_scale_factor: f64,
    /// Fixed delay applied after asset waits, for final layout/reflow
    pub settle_delay: Duration,
    /// Upper bound on the fonts/images wait; exceeding it is non-fatal
    pub asset_timeout: Duration,
    /// Quiet window that counts as network idle
    pub network_idle: Duration,
    /// Upper bound on waiting for the network-idle window
    pub network_idle_timeout: Duration,
    /// How the content extent is measured
    pub measure_strategy: MeasureStrategy,
    /// Force direct children of `<body>` to this max width, centered
    /// (email-template rendering)
    pub max_content_width: Option<u32>,
    /// Explicit browser executable; otherwise `CHROME` and known install
    /// locations are probed
    pub chrome_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            device_scale_factor: 2.0,
            settle_delay: Duration::from_millis(500),
            asset_timeout: Duration::from_secs(10),
            network_idle: Duration::from_millis(500),
            network_idle_timeout: Duration::from_secs(5),
            measure_strategy: MeasureStrategy::VisibleScan,
            max_content_width: None,
            chrome_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_width_is_fixed() {
        let mut request = RenderRequest::new("<p>hi</p>", "out.pdf");
        request.device_kind = DeviceKind::Mobile;
        request.viewport_width_px = 1024;
        assert_eq!(request.effective_width(), MOBILE_WIDTH_PX);
    }

    #[test]
    fn custom_width_is_honored() {
        let mut request = RenderRequest::new("<p>hi</p>", "out.pdf");
        request.device_kind = DeviceKind::Custom;
        request.viewport_width_px = 610;
        assert_eq!(request.effective_width(), 610);
    }

    #[test]
    fn desktop_ignores_supplied_width() {
        let mut request = RenderRequest::new("<p>hi</p>", "out.pdf");
        request.viewport_width_px = 610;
        assert_eq!(request.effective_width(), DESKTOP_WIDTH_PX);
    }

    #[test]
    fn px_to_inches_uses_css_reference_density() {
        assert_eq!(px_to_inches(600), 6.25);
        assert_eq!(px_to_inches(96), 1.0);
    }

    #[test]
    fn default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.device_scale_factor, 2.0);
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.asset_timeout, Duration::from_secs(10));
        assert_eq!(config.measure_strategy, MeasureStrategy::VisibleScan);
        assert!(config.max_content_width.is_none());
    }

    #[test]
    fn device_kind_deserializes_lowercase() {
        let kind: DeviceKind = serde_json::from_str("\"mobile\"").unwrap();
        assert_eq!(kind, DeviceKind::Mobile);
    }
}
