use std::ffi::OsString;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::MediaOptimizer;
use super::command::{ScratchDir, run_tool};
use crate::config::AudioConfig;

/// Re-encodes audio at the configured bitrate, keeping the original container.
#[derive(Debug, Clone)]
pub struct AudioOptimizer {
  config: AudioConfig,
}

impl AudioOptimizer {
  /// Create an optimizer using the given audio settings.
  pub fn new(config: AudioConfig) -> Self {
    Self { config }
  }
}

/// ffmpeg encoder and file extension for a container that can be shrunk in place.
fn encoder_for(media_type: &str) -> Option<(&'static str, &'static str)> {
  match media_type.to_ascii_lowercase().as_str() {
    "audio/mpeg" | "audio/mp3" => Some(("libmp3lame", "mp3")),
    "audio/mp4" | "audio/aac" | "audio/x-m4a" => Some(("aac", "m4a")),
    "audio/ogg" => Some(("libvorbis", "ogg")),
    _ => None,
  }
}

#[async_trait]
impl MediaOptimizer for AudioOptimizer {
  fn name(&self) -> &str {
    "ffmpeg-audio"
  }

  async fn optimize(&self, bytes: &[u8], media_type: &str) -> Result<Vec<u8>> {
    // WAV and friends would need a container change, which would break the media type.
    let Some((encoder, extension)) = encoder_for(media_type) else {
      bail!("no same-container encoder for {media_type}");
    };

    let scratch = ScratchDir::new("inline-audio-")?;
    let input = scratch.write(&format!("in.{extension}"), bytes).await?;
    let output_name = format!("out.{extension}");

    let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-i"].map(OsString::from).into();
    args.push(input.into_os_string());
    args.extend(["-vn", "-c:a", encoder, "-b:a"].map(OsString::from));
    args.push(format!("{}k", self.config.mp3_kbps).into());
    args.push(scratch.path(&output_name).into_os_string());
    run_tool("ffmpeg", args).await?;

    scratch.read(&output_name).await
  }
}
