//! Concurrent regex replacement with position-stable reassembly.

use std::future::Future;

use futures::future::try_join_all;
use regex::Regex;

use crate::error::BuildResult;

/// Owned copy of one regex match handed to a replacement transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
  /// Full matched text.
  pub whole: String,
  /// Byte offset of the match in the scanned text.
  pub start: usize,
  groups: Vec<Option<String>>,
}

impl RegexMatch {
  fn from_captures(captures: &regex::Captures<'_>) -> Self {
    let whole = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
    Self {
      whole: whole.to_string(),
      start: captures.get(0).map_or(0, |m| m.start()),
      groups: captures
        .iter()
        .skip(1)
        .map(|group| group.map(|m| m.as_str().to_string()))
        .collect(),
    }
  }

  /// Capture group `index` (1-based, like `regex::Captures::get`).
  pub fn group(&self, index: usize) -> Option<&str> {
    index
      .checked_sub(1)
      .and_then(|i| self.groups.get(i))
      .and_then(|group| group.as_deref())
  }

  /// First group among `indices` that participated in the match.
  pub fn first_group(&self, indices: &[usize]) -> Option<(usize, &str)> {
    indices
      .iter()
      .find_map(|&index| self.group(index).map(|value| (index, value)))
  }
}

/// Replace every non-overlapping match of `pattern` in `text`.
///
/// All transforms are polled concurrently; results are spliced back by match position,
/// so completion order never affects the output. The first error aborts the call.
pub async fn replace_all<F, Fut>(text: &str, pattern: &Regex, transform: F) -> BuildResult<String>
where
  F: Fn(RegexMatch) -> Fut,
  Fut: Future<Output = BuildResult<String>>,
{
  let mut spans = Vec::new();
  let mut matches = Vec::new();
  for captures in pattern.captures_iter(text) {
    let Some(whole) = captures.get(0) else {
      continue;
    };
    spans.push((whole.start(), whole.end()));
    matches.push(RegexMatch::from_captures(&captures));
  }
  if matches.is_empty() {
    return Ok(text.to_string());
  }

  let replacements = try_join_all(matches.into_iter().map(transform)).await?;

  let mut out = String::with_capacity(text.len());
  let mut cursor = 0;
  for ((start, end), replacement) in spans.into_iter().zip(replacements) {
    out.push_str(&text[cursor..start]);
    out.push_str(&replacement);
    cursor = end;
  }
  out.push_str(&text[cursor..]);
  Ok(out)
}
