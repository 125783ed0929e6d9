//! Per-module asset rewriting ahead of bundling.
//!
//! Asset literals belong to the module that spells them, so every module reachable through
//! relative imports is rewritten against its own directory into a mirror of the project
//! tree. The bundler then runs on the mirrored entry. The mirror lives inside the project
//! root so bare imports still find the project's `node_modules`.

use std::collections::{HashSet, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::scripts::process_js_content;
use crate::asset_paths::{normalize_lexically, strip_query_and_fragment};
use crate::context::RunContext;
use crate::error::BuildResult;
use crate::optimizers::ScratchDir;

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "tsx"];

const RESOLVE_SUFFIXES: &[&str] = &[
  ".js", ".mjs", ".cjs", ".jsx", ".ts", ".tsx", ".json", "/index.js", "/index.mjs", "/index.ts",
];

/// Relative specifiers of `from`, `import`, `import()` and `require()` (groups 1-3 by quote).
fn relative_import_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r#"(?:\bfrom|\bimport|\brequire)\s*\(?\s*(?:"(\.{1,2}/[^"]+)"|'(\.{1,2}/[^']+)'|`(\.{1,2}/[^`$]+)`)"#,
    )
    .expect("invalid import regex")
  })
}

/// Rewritten copy of a script's module graph, removed when dropped.
#[derive(Debug)]
pub struct ModuleMirror {
  scratch: ScratchDir,
  entry: PathBuf,
  modules: usize,
}

impl ModuleMirror {
  /// Mirrored counterpart of the original entry script.
  pub fn entry(&self) -> &Path {
    &self.entry
  }

  /// Directory holding the mirrored tree.
  pub fn root(&self) -> &Path {
    self.scratch.root()
  }

  /// Number of files copied into the mirror.
  pub fn module_count(&self) -> usize {
    self.modules
  }
}

/// Relative import specifiers found in a script.
pub fn relative_imports(source: &str) -> Vec<&str> {
  relative_import_pattern()
    .captures_iter(source)
    .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
    .map(|specifier| specifier.as_str())
    .collect()
}

fn is_script(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

async fn is_file(path: &Path) -> bool {
  tokio::fs::metadata(path)
    .await
    .is_ok_and(|meta| meta.is_file())
}

/// File a relative specifier points at, trying the usual extension and index suffixes.
async fn resolve_specifier(module_dir: &Path, specifier: &str) -> Option<PathBuf> {
  let base = normalize_lexically(&module_dir.join(strip_query_and_fragment(specifier)));
  if is_file(&base).await {
    return Some(base);
  }
  for suffix in RESOLVE_SUFFIXES {
    let mut candidate = OsString::from(base.as_os_str());
    candidate.push(suffix);
    let candidate = PathBuf::from(candidate);
    if is_file(&candidate).await {
      return Some(candidate);
    }
  }
  None
}

/// Mirror `entry` and its relatively imported modules with asset literals already inlined.
///
/// Returns `None` when the graph cannot be mirrored (a module outside the project root, an
/// unreadable file, a read-only project); callers then bundle the original entry.
pub async fn mirror_module_graph(ctx: &RunContext, entry: &Path) -> BuildResult<Option<ModuleMirror>> {
  let root = ctx.project_root();
  let Ok(entry_relative) = entry.strip_prefix(root) else {
    debug!("{} lies outside the project root, not mirroring", entry.display());
    return Ok(None);
  };
  let scratch = match ScratchDir::new_in(root, ".inline-modules-") {
    Ok(scratch) => scratch,
    Err(err) => {
      warn!("cannot mirror modules of {}: {err:#}", entry.display());
      return Ok(None);
    }
  };

  let mut seen = HashSet::from([entry.to_path_buf()]);
  let mut queue = VecDeque::from([entry.to_path_buf()]);
  while let Some(module) = queue.pop_front() {
    let Ok(relative) = module.strip_prefix(root) else {
      debug!("{} is imported from outside the project root", module.display());
      return Ok(None);
    };
    let target = scratch.root().join(relative);
    if let Some(parent) = target.parent()
      && let Err(err) = tokio::fs::create_dir_all(parent).await
    {
      warn!("failed to create {}: {err}", parent.display());
      return Ok(None);
    }

    if !is_script(&module) {
      if let Err(err) = tokio::fs::copy(&module, &target).await {
        warn!("failed to mirror {}: {err}", module.display());
        return Ok(None);
      }
      continue;
    }

    let source = match tokio::fs::read_to_string(&module).await {
      Ok(source) => source,
      Err(err) => {
        warn!("failed to read module {}: {err}", module.display());
        return Ok(None);
      }
    };
    let module_dir = module.parent().unwrap_or(root);
    for specifier in relative_imports(&source) {
      if let Some(dependency) = resolve_specifier(module_dir, specifier).await
        && seen.insert(dependency.clone())
      {
        queue.push_back(dependency);
      }
    }

    let rewritten = process_js_content(ctx, &source, module_dir).await?;
    if let Err(err) = tokio::fs::write(&target, rewritten).await {
      warn!("failed to write {}: {err}", target.display());
      return Ok(None);
    }
  }

  debug!("mirrored {} modules for {}", seen.len(), entry.display());
  Ok(Some(ModuleMirror {
    entry: scratch.root().join(entry_relative),
    modules: seen.len(),
    scratch,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  use tempfile::tempdir;

  use crate::config::InlineConfig;
  use crate::optimizers::OptimizerSet;
  use crate::payload::encode_payload;

  const SPRITE: &str = "import cfg from './cfg.json';\nexport const s = 'img/hero.png';";

  fn context(root: &Path) -> RunContext {
    RunContext::new(root, InlineConfig::default()).with_optimizers(OptimizerSet::empty())
  }

  #[test]
  fn finds_relative_specifiers_only() {
    let source = concat!(
      "import a from './a.js';\n",
      "export { b } from \"../shared/b\";\n",
      "import './side-effect.mjs';\n",
      "const c = await import(`./lazy/c.js`);\n",
      "const d = require('./d.cjs');\n",
      "import React from 'react';\n",
      "const e = fromage('./not-an-import.js');\n",
    );
    assert_eq!(
      relative_imports(source),
      vec!["./a.js", "../shared/b", "./side-effect.mjs", "./lazy/c.js", "./d.cjs"]
    );
  }

  #[tokio::test]
  async fn rewrites_each_module_against_its_own_directory() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("js/lib/img")).unwrap();
    fs::create_dir_all(root.join("js/img")).unwrap();
    fs::write(
      root.join("js/main.js"),
      "import { s } from './lib/sprite';\nload('img/bg.png');",
    )
    .unwrap();
    fs::write(root.join("js/lib/sprite.js"), SPRITE).unwrap();
    fs::write(root.join("js/lib/cfg.json"), "{}").unwrap();
    fs::write(root.join("js/lib/img/hero.png"), b"HERO").unwrap();
    fs::write(root.join("js/img/bg.png"), b"BG").unwrap();
    let ctx = context(&root);

    let mirror = mirror_module_graph(&ctx, &root.join("js/main.js"))
      .await
      .unwrap()
      .expect("mirror");
    assert_eq!(mirror.module_count(), 3);
    assert_eq!(mirror.entry(), mirror.root().join("js/main.js"));

    let sprite = fs::read_to_string(mirror.root().join("js/lib/sprite.js")).unwrap();
    let hero = encode_payload("image/png", b"HERO");
    assert!(sprite.ends_with(&format!("export const s = '{hero}';")));
    let main = fs::read_to_string(mirror.entry()).unwrap();
    assert!(main.contains(&format!("load('{}')", encode_payload("image/png", b"BG"))));
    assert!(main.starts_with("import { s } from './lib/sprite';"));
    assert_eq!(fs::read_to_string(mirror.root().join("js/lib/cfg.json")).unwrap(), "{}");

    // Sources are untouched and the mirror disappears with its guard.
    assert_eq!(fs::read_to_string(root.join("js/lib/sprite.js")).unwrap(), SPRITE);
    let mirror_root = mirror.root().to_path_buf();
    drop(mirror);
    assert!(!mirror_root.exists());
  }

  #[tokio::test]
  async fn imports_from_outside_the_project_are_not_mirrored() {
    let dir = tempdir().unwrap();
    let base = dir.path().canonicalize().unwrap();
    let root = base.join("site");
    fs::create_dir_all(&root).unwrap();
    fs::write(base.join("shared.js"), "export const x = 1;").unwrap();
    fs::write(root.join("main.js"), "import { x } from '../shared.js';").unwrap();
    let ctx = context(&root);

    assert!(mirror_module_graph(&ctx, &root.join("main.js")).await.unwrap().is_none());
    let leftovers = fs::read_dir(&root).unwrap().count();
    assert_eq!(leftovers, 1);
  }
}
