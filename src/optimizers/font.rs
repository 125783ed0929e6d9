use std::ffi::OsString;

use anyhow::Result;
use async_trait::async_trait;

use super::MediaOptimizer;
use super::command::{ScratchDir, run_tool};
use crate::config::FontConfig;

/// Subsets fonts to the configured glyphs with fontTools' `pyftsubset`.
#[derive(Debug, Clone)]
pub struct FontOptimizer {
  config: FontConfig,
}

impl FontOptimizer {
  /// Create an optimizer using the given subset.
  pub fn new(config: FontConfig) -> Self {
    Self { config }
  }
}

/// Input extension and optional `--flavor` for a font media type.
fn font_format(media_type: &str) -> (&'static str, Option<&'static str>) {
  match media_type.to_ascii_lowercase().as_str() {
    "font/woff2" => ("woff2", Some("woff2")),
    "font/woff" => ("woff", Some("woff")),
    "font/otf" => ("otf", None),
    _ => ("ttf", None),
  }
}

#[async_trait]
impl MediaOptimizer for FontOptimizer {
  fn name(&self) -> &str {
    "pyftsubset"
  }

  async fn optimize(&self, bytes: &[u8], media_type: &str) -> Result<Vec<u8>> {
    let (extension, flavor) = font_format(media_type);
    let scratch = ScratchDir::new("inline-font-")?;
    let input = scratch.write(&format!("in.{extension}"), bytes).await?;
    let output_name = format!("out.{extension}");

    let mut args: Vec<OsString> = vec![input.into_os_string()];
    args.push(format!("--text={}", self.config.subset).into());
    let mut output_arg = OsString::from("--output-file=");
    output_arg.push(scratch.path(&output_name));
    args.push(output_arg);
    if let Some(flavor) = flavor {
      args.push(format!("--flavor={flavor}").into());
    }
    run_tool("pyftsubset", args).await?;

    scratch.read(&output_name).await
  }
}
