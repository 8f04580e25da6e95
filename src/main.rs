use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Deserializer};

use pagefit::{
    DeviceKind, MeasureStrategy, MeasuredLayout, RenderConfig, RenderRequest, DESKTOP_WIDTH_PX,
};

/// Render HTML to a content-fit PDF via headless Chrome.
#[derive(Debug, Parser)]
#[command(name = "pagefit", version)]
struct Options {
    /// JSON request blob, e.g.
    /// '{"htmlContent":"<p>Hi</p>","outputPath":"out.pdf","viewType":"mobile"}'
    request: String,

    /// Browser executable to use instead of probing known locations
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Force direct children of <body> to this max width, centered
    /// (email-template rendering)
    #[arg(long, value_name = "PX")]
    max_content_width: Option<u32>,

    /// Measure via scroll/offset heights instead of the visible-element scan
    #[arg(long)]
    coarse_measure: bool,
}

/// Wire format of the positional JSON argument. `deviceWidth` arrives as a
/// number or a numeric string (web callers post form values).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RequestBlob {
    html_content: Option<String>,
    html_path: Option<PathBuf>,
    output_path: PathBuf,
    #[serde(default, deserialize_with = "flexible_width")]
    device_width: Option<u32>,
    view_type: Option<String>,
    #[serde(default)]
    debug: bool,
}

fn flexible_width<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .filter(|&w| w > 0 && w <= u64::from(u32::MAX))
            .map(|w| Some(w as u32))
            .ok_or_else(|| D::Error::custom("deviceWidth must be a positive integer")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&w| w > 0)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("deviceWidth is not a positive integer: {s:?}"))),
        Some(other) => Err(D::Error::custom(format!(
            "deviceWidth must be a number or numeric string, got {other}"
        ))),
    }
}

/// Legacy preset classification, kept for wire compatibility: an explicit
/// mobile viewType wins; otherwise a supplied width that differs from the
/// desktop default means custom.
fn classify(view_type: Option<&str>, device_width: Option<u32>) -> DeviceKind {
    if view_type.is_some_and(|v| v.eq_ignore_ascii_case("mobile")) {
        return DeviceKind::Mobile;
    }
    match device_width {
        Some(width) if width != DESKTOP_WIDTH_PX => DeviceKind::Custom,
        _ => DeviceKind::Desktop,
    }
}

fn build_request(blob: RequestBlob, opts: &Options) -> anyhow::Result<(RenderRequest, RenderConfig)> {
    let markup = match (blob.html_content, &blob.html_path) {
        (Some(_), Some(_)) => {
            anyhow::bail!("htmlContent and htmlPath are mutually exclusive")
        }
        (Some(content), None) => content,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("either htmlContent or htmlPath is required"),
    };

    let device_kind = classify(blob.view_type.as_deref(), blob.device_width);
    let request = RenderRequest {
        markup,
        output: blob.output_path,
        viewport_width_px: blob.device_width.unwrap_or(DESKTOP_WIDTH_PX),
        device_kind,
    };

    let config = RenderConfig {
        measure_strategy: if opts.coarse_measure {
            MeasureStrategy::ScrollBounds
        } else {
            MeasureStrategy::VisibleScan
        },
        max_content_width: opts.max_content_width,
        chrome_path: opts.chrome.clone(),
        ..Default::default()
    };

    Ok((request, config))
}

fn init_logging(debug: bool) {
    let default = if debug { "pagefit=debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .try_init();
}

fn run(opts: &Options) -> anyhow::Result<(PathBuf, MeasuredLayout)> {
    let blob: RequestBlob =
        serde_json::from_str(&opts.request).context("invalid JSON request argument")?;
    init_logging(blob.debug);

    let (request, config) = build_request(blob, opts)?;
    let output = request.output.clone();
    let layout = pagefit::render(&request, &config)?;
    Ok((output, layout))
}

fn main() {
    let opts = Options::parse();
    match run(&opts) {
        Ok((output, layout)) => {
            println!(
                "PDF written to {} ({}x{} px)",
                output.display(),
                layout.width_px,
                layout.height_px
            );
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
