//! Content processors that rewrite document text into its single-file form.
//!
//! Each processor takes the whole document (or a stylesheet or script) plus the directory
//! its references are relative to, and returns the rewritten text.

pub mod markup;
pub mod modules;
pub mod scripts;
pub mod styles;

pub use markup::{
  SrcsetCandidate, inline_html_media_attrs, inline_srcset, maybe_minify_html,
  reencode_all_payloads, split_srcset,
};
pub use modules::{ModuleMirror, mirror_module_graph};
pub use scripts::{inline_js_scripts, maybe_minify_js, process_js_content};
pub use styles::{inline_css_links, inline_styles_everywhere, maybe_minify_css, process_css_content};
