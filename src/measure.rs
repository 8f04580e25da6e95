//! Content-extent measurement
//!
//! The measurement scripts run inside the page and report the rendered
//! content size as a JSON string (objects returned from CDP `evaluate`
//! arrive as previews without values, so the scripts stringify instead).
//!
//! Two strategies are supported. [`MeasureStrategy::VisibleScan`] walks
//! every element, skips invisible ones, and tracks the lowest bottom edge
//! of anything that actually paints (text, a loaded image, or a background
//! image), plus its bottom margin. [`MeasureStrategy::ScrollBounds`] takes
//! the maximum of the usual scroll/offset height pairs; cheaper, less
//! precise.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::MeasuredLayout;

/// How the rendered content extent is determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeasureStrategy {
    /// Per-element scan of visible, painting content (default)
    #[default]
    VisibleScan,
    /// Maximum of body/document scroll and offset heights
    ScrollBounds,
}

const VISIBLE_SCAN_SCRIPT: &str = r#"
(() => {
    const paints = (el, style) => {
        if (el.tagName === 'IMG') {
            return el.complete && el.naturalHeight > 0;
        }
        if (style.backgroundImage && style.backgroundImage !== 'none') {
            return true;
        }
        for (const node of el.childNodes) {
            if (node.nodeType === Node.TEXT_NODE && node.textContent.trim().length > 0) {
                return true;
            }
        }
        return false;
    };

    let bottom = 0;
    let found = false;
    for (const el of document.querySelectorAll('body *')) {
        const style = window.getComputedStyle(el);
        if (style.display === 'none'
            || style.visibility === 'hidden'
            || parseFloat(style.opacity) === 0) {
            continue;
        }
        if (!paints(el, style)) {
            continue;
        }
        const rect = el.getBoundingClientRect();
        const margin = parseFloat(style.marginBottom) || 0;
        const edge = rect.bottom + window.scrollY + margin;
        if (edge > bottom) {
            bottom = edge;
        }
        found = true;
    }
    if (!found) {
        bottom = document.body.getBoundingClientRect().bottom + window.scrollY;
    }
    const width = Math.max(document.documentElement.clientWidth, window.innerWidth || 0);
    return JSON.stringify({
        width: Math.ceil(width),
        height: Math.ceil(Math.max(bottom, 1)),
    });
})()
"#;

const SCROLL_BOUNDS_SCRIPT: &str = r#"
(() => {
    const body = document.body;
    const doc = document.documentElement;
    const height = Math.max(
        body.scrollHeight, body.offsetHeight,
        doc.clientHeight, doc.scrollHeight, doc.offsetHeight);
    const width = Math.max(doc.clientWidth, window.innerWidth || 0);
    return JSON.stringify({
        width: Math.ceil(width),
        height: Math.ceil(Math.max(height, 1)),
    });
})()
"#;

/// Page script for the given strategy.
pub fn measurement_script(strategy: MeasureStrategy) -> &'static str {
    match strategy {
        MeasureStrategy::VisibleScan => VISIBLE_SCAN_SCRIPT,
        MeasureStrategy::ScrollBounds => SCROLL_BOUNDS_SCRIPT,
    }
}

#[derive(Debug, Deserialize)]
struct RawLayout {
    width: f64,
    height: f64,
}

/// Parse the JSON string returned by a measurement script.
pub fn parse_measured(value: &serde_json::Value) -> Result<MeasuredLayout> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::Measure("measurement script returned a non-string".into()))?;

    let raw: RawLayout = serde_json::from_str(text)
        .map_err(|e| Error::Measure(format!("unparseable measurement result: {e}")))?;

    if !(raw.width.is_finite() && raw.height.is_finite())
        || raw.width < 1.0
        || raw.height < 1.0
    {
        return Err(Error::Measure(format!(
            "implausible content size {}x{}",
            raw.width, raw.height
        )));
    }

    Ok(MeasuredLayout {
        width_px: raw.width.ceil() as u32,
        height_px: raw.height.ceil() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_map_to_distinct_scripts() {
        let fine = measurement_script(MeasureStrategy::VisibleScan);
        let coarse = measurement_script(MeasureStrategy::ScrollBounds);
        assert_ne!(fine, coarse);
        assert!(fine.contains("getComputedStyle"));
        assert!(coarse.contains("scrollHeight"));
    }

    #[test]
    fn scripts_stringify_their_result() {
        for strategy in [MeasureStrategy::VisibleScan, MeasureStrategy::ScrollBounds] {
            assert!(measurement_script(strategy).contains("JSON.stringify"));
        }
    }

    #[test]
    fn parse_valid_result() {
        let value = serde_json::Value::String(r#"{"width":600,"height":842}"#.into());
        let layout = parse_measured(&value).unwrap();
        assert_eq!(layout.width_px, 600);
        assert_eq!(layout.height_px, 842);
    }

    #[test]
    fn parse_fractional_result_rounds_up() {
        let value = serde_json::Value::String(r#"{"width":600.2,"height":841.5}"#.into());
        let layout = parse_measured(&value).unwrap();
        assert_eq!(layout.width_px, 601);
        assert_eq!(layout.height_px, 842);
    }

    #[test]
    fn parse_rejects_non_string() {
        let value = serde_json::json!({"width": 600, "height": 842});
        assert!(matches!(parse_measured(&value), Err(Error::Measure(_))));
    }

    #[test]
    fn parse_rejects_non_positive_sizes() {
        let value = serde_json::Value::String(r#"{"width":600,"height":0}"#.into());
        assert!(matches!(parse_measured(&value), Err(Error::Measure(_))));
    }

    #[test]
    fn parse_rejects_garbage() {
        let value = serde_json::Value::String("not json".into());
        assert!(matches!(parse_measured(&value), Err(Error::Measure(_))));
    }
}
