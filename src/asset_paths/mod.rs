//! Helpers for classifying, normalising and redirecting resource references.
//!
//! The responsibilities are split into focused submodules so the lexical classification,
//! path normalisation, override candidate expansion and media type lookup can be tested
//! independently of the async resolution code that uses them.

mod candidates;
mod filters;
mod media;
mod normalize;

pub use candidates::{
  CandidateOrigin, OverrideCandidate, generate_override_candidates, project_relative,
};
pub use filters::{ReferenceKind, classify_reference, remote_fetch_url};
pub use media::{
  FALLBACK_MEDIA_TYPE, MEDIA_TYPES, OPTIMIZABLE_EXTENSIONS, is_optimizable_path,
  media_type_for_extension, media_type_for_path,
};
pub use normalize::{
  decode_local_path, normalize_lexically, reference_basename, resolve_local,
  strip_query_and_fragment, to_forward_slashes, url_basename,
};
