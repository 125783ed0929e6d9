//! Data records produced while resolving and optimising resources.

use std::sync::atomic::{AtomicU64, Ordering};

/// Where a resolved resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
  /// Read from the local filesystem (including override files).
  LocalFile,
  /// Downloaded over the network.
  Remote,
  /// Decoded from an existing embedded payload.
  EmbeddedPayload,
}

impl OriginKind {
  /// Short label used in savings lines.
  pub fn label(self) -> &'static str {
    match self {
      Self::LocalFile => "file",
      Self::Remote => "remote",
      Self::EmbeddedPayload => "embedded",
    }
  }
}

/// Bytes resolved for a reference together with their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
  /// MIME type recorded in the embedded payload.
  pub media_type: String,
  /// Raw resource bytes.
  pub bytes: Vec<u8>,
  /// Where the bytes came from.
  pub origin: OriginKind,
}

/// Outcome of a best-effort optimisation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizationStatus {
  /// The optimizer produced strictly smaller output.
  Reduced,
  /// The optimizer ran but produced output that was not smaller.
  NoGain,
  /// No optimizer is registered for the media type.
  Unsupported,
  /// The optimizer failed; the reason is kept for diagnostics.
  Failed(String),
}

/// Optimised bytes plus the status that produced them.
///
/// `bytes` is never longer than the optimizer's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationResult {
  /// Bytes to embed.
  pub bytes: Vec<u8>,
  /// How the bytes were obtained.
  pub status: OptimizationStatus,
}

impl OptimizationResult {
  /// Compare optimizer output against the original and keep whichever is not larger.
  ///
  /// Output of equal length is accepted so that pass-through optimizers stay cheap, but is
  /// reported as [`OptimizationStatus::NoGain`].
  pub fn from_candidate(original: &[u8], candidate: Vec<u8>) -> Self {
    if candidate.is_empty() && !original.is_empty() {
      return Self::no_gain(original);
    }
    if candidate.len() < original.len() {
      Self {
        bytes: candidate,
        status: OptimizationStatus::Reduced,
      }
    } else if candidate.len() == original.len() {
      Self {
        bytes: candidate,
        status: OptimizationStatus::NoGain,
      }
    } else {
      Self::no_gain(original)
    }
  }

  /// Keep the original bytes because nothing better was produced.
  pub fn no_gain(original: &[u8]) -> Self {
    Self {
      bytes: original.to_vec(),
      status: OptimizationStatus::NoGain,
    }
  }

  /// Keep the original bytes because no optimizer handles the media type.
  pub fn unsupported(original: &[u8]) -> Self {
    Self {
      bytes: original.to_vec(),
      status: OptimizationStatus::Unsupported,
    }
  }

  /// Keep the original bytes because the optimizer failed.
  pub fn failed(original: &[u8], reason: impl Into<String>) -> Self {
    Self {
      bytes: original.to_vec(),
      status: OptimizationStatus::Failed(reason.into()),
    }
  }

  /// True only when the optimizer actually shrank the input.
  pub fn changed(&self) -> bool {
    self.status == OptimizationStatus::Reduced
  }
}

/// Aggregate byte counters for one run. Used for reporting only.
#[derive(Debug, Default)]
pub struct RunStats {
  original_bytes: AtomicU64,
  final_bytes: AtomicU64,
  resources: AtomicU64,
}

impl RunStats {
  /// Record one resolved resource.
  pub fn record(&self, original: usize, final_size: usize) {
    self
      .original_bytes
      .fetch_add(original as u64, Ordering::Relaxed);
    self
      .final_bytes
      .fetch_add(final_size as u64, Ordering::Relaxed);
    self.resources.fetch_add(1, Ordering::Relaxed);
  }

  /// Point-in-time copy of the counters.
  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      original_bytes: self.original_bytes.load(Ordering::Relaxed),
      final_bytes: self.final_bytes.load(Ordering::Relaxed),
      resources: self.resources.load(Ordering::Relaxed),
    }
  }
}

/// Plain copy of [`RunStats`] returned to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  /// Sum of resource sizes before optimisation.
  pub original_bytes: u64,
  /// Sum of resource sizes after optimisation.
  pub final_bytes: u64,
  /// Number of resources resolved.
  pub resources: u64,
}

impl StatsSnapshot {
  /// Bytes saved across the run (never negative).
  pub fn saved_bytes(&self) -> u64 {
    self.original_bytes.saturating_sub(self.final_bytes)
  }
}

/// Percentage saved for a single resource, formatted to one decimal.
pub fn saving_percent(original: usize, final_size: usize) -> String {
  if original == 0 {
    return "0.0".into();
  }
  format!("{:.1}", (1.0 - final_size as f64 / original as f64) * 100.0)
}
