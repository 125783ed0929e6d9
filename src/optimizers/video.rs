use std::ffi::OsString;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::MediaOptimizer;
use super::command::{ScratchDir, run_tool};
use crate::config::VideoConfig;

/// Transcodes video with ffmpeg: optional downscale, CRF or bitrate-capped encode.
#[derive(Debug, Clone)]
pub struct VideoOptimizer {
  config: VideoConfig,
}

/// Output container chosen from the input media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
  Mp4,
  WebM,
}

impl Container {
  fn from_media_type(media_type: &str) -> Self {
    if media_type.eq_ignore_ascii_case("video/webm") {
      Self::WebM
    } else {
      Self::Mp4
    }
  }

  fn extension(self) -> &'static str {
    match self {
      Self::Mp4 => "mp4",
      Self::WebM => "webm",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bitrate {
  target: f32,
  max: f32,
  buffer: f32,
}

impl VideoOptimizer {
  /// Create an optimizer using the given video settings.
  pub fn new(config: VideoConfig) -> Self {
    Self { config }
  }

  fn scale_filter(&self, input_width: Option<u32>) -> String {
    match (self.config.max_width, input_width) {
      (Some(max), Some(width)) if max > 0 && width > max => format!("scale={max}:-2"),
      // Even dimensions are required by yuv420p.
      _ => "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
    }
  }

  fn bitrate(&self) -> Option<Bitrate> {
    let target = self.config.target_mbps.filter(|value| *value > 0.0)?;
    let max = target * self.config.max_rate_factor;
    Some(Bitrate {
      target,
      max,
      buffer: max * 2.0,
    })
  }

  fn video_arguments(&self, container: Container, input_width: Option<u32>) -> Vec<String> {
    let config = &self.config;
    let mut args: Vec<String> = vec!["-pix_fmt".into(), "yuv420p".into()];

    match container {
      Container::Mp4 => {
        args.extend([
          "-c:v".into(),
          config.codec.clone(),
          "-preset".into(),
          config.preset.clone(),
          "-crf".into(),
          config.crf.to_string(),
          "-profile:v".into(),
          "high".into(),
          "-level".into(),
          "4.1".into(),
        ]);
        if let Some(tune) = &config.tune {
          args.extend(["-tune".into(), tune.clone()]);
        }
        if config.faststart {
          args.extend(["-movflags".into(), "+faststart".into()]);
        }
      }
      Container::WebM => {
        args.extend([
          "-c:v".into(),
          "libvpx-vp9".into(),
          "-crf".into(),
          config.crf.to_string(),
        ]);
        if self.bitrate().is_none() {
          args.extend(["-b:v".into(), "0".into()]);
        }
      }
    }

    args.extend(["-vf".into(), self.scale_filter(input_width)]);
    if let Some(fps) = config.fps.filter(|fps| *fps > 0.0) {
      args.extend(["-r".into(), fps.to_string()]);
    }
    if let Some(rate) = self.bitrate() {
      args.extend([
        "-b:v".into(),
        format!("{}M", rate.target),
        "-minrate".into(),
        format!("{}M", rate.target),
        "-maxrate".into(),
        format!("{:.2}M", rate.max),
        "-bufsize".into(),
        format!("{:.2}M", rate.buffer),
      ]);
    }
    args
  }

  fn audio_arguments(&self, container: Container) -> Vec<String> {
    let codec = match container {
      Container::Mp4 => "aac",
      Container::WebM => "libopus",
    };
    vec![
      "-c:a".into(),
      codec.into(),
      "-b:a".into(),
      format!("{}k", self.config.audio_kbps),
    ]
  }

  async fn probe_width(&self, input: &std::path::Path) -> Option<u32> {
    let output = run_tool("ffprobe", [
      OsString::from("-v"),
      "error".into(),
      "-select_streams".into(),
      "v:0".into(),
      "-show_entries".into(),
      "stream=width".into(),
      "-of".into(),
      "csv=p=0".into(),
      input.as_os_str().to_os_string(),
    ])
    .await
    .ok()?;
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
  }
}

#[async_trait]
impl MediaOptimizer for VideoOptimizer {
  fn name(&self) -> &str {
    "ffmpeg-video"
  }

  async fn optimize(&self, bytes: &[u8], media_type: &str) -> Result<Vec<u8>> {
    let container = Container::from_media_type(media_type);
    let scratch = ScratchDir::new("inline-video-")?;
    let input = scratch.write("in.bin", bytes).await?;
    let output_name = format!("out.{}", container.extension());
    let output = scratch.path(&output_name);

    let width = self.probe_width(&input).await;
    debug!(?width, "probed video input");
    let video_args = self.video_arguments(container, width);
    let audio_args = self.audio_arguments(container);

    let base = |extra: &[String]| -> Vec<OsString> {
      let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-i"].map(OsString::from).into();
      args.push(input.clone().into_os_string());
      args.extend(video_args.iter().map(Into::into));
      args.extend(extra.iter().map(Into::into));
      args.push(output.clone().into_os_string());
      args
    };

    if self.config.two_pass && self.bitrate().is_some() {
      // Pass logs live in the scratch directory and vanish with it.
      let passlog = scratch.path("2pass").to_string_lossy().into_owned();
      let first = [
        "-an".to_string(),
        "-pass".into(),
        "1".into(),
        "-passlogfile".into(),
        passlog.clone(),
      ];
      run_tool("ffmpeg", base(&first)).await?;

      let mut second = audio_args.clone();
      second.extend(["-pass".into(), "2".into(), "-passlogfile".into(), passlog]);
      run_tool("ffmpeg", base(&second)).await?;
    } else {
      run_tool("ffmpeg", base(&audio_args)).await?;
    }

    scratch.read(&output_name).await
  }
}
