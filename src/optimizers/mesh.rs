use std::ffi::OsString;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::MediaOptimizer;
use super::command::{ScratchDir, run_tool};
use crate::config::MeshConfig;

/// Compresses binary glTF with `gltfpack`, retrying without texture compression when the
/// installed build lacks BasisU.
#[derive(Debug, Clone)]
pub struct MeshOptimizer {
  config: MeshConfig,
}

impl MeshOptimizer {
  /// Create an optimizer using the given mesh settings.
  pub fn new(config: MeshConfig) -> Self {
    Self { config }
  }

  fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into(), "-o".into(), output.into()];
    // -cc needs the meshopt decoder at runtime; -kn/-km keep names and materials; -noq avoids
    // quantising animations.
    args.extend(["-cc", "-kn", "-km", "-si"].map(OsString::from));
    args.push(self.config.simplify.to_string().into());
    args.push("-noq".into());
    args
  }
}

fn basis_unavailable(message: &str) -> bool {
  message.contains("BasisU support")
    || message.contains("texture compression is not available")
    || message.contains("built without BasisU")
}

#[async_trait]
impl MediaOptimizer for MeshOptimizer {
  fn name(&self) -> &str {
    "gltfpack"
  }

  async fn optimize(&self, bytes: &[u8], _media_type: &str) -> Result<Vec<u8>> {
    let scratch = ScratchDir::new("inline-mesh-")?;
    let input = scratch.write("in.glb", bytes).await?;
    let output = scratch.path("out.glb");
    let args = self.arguments(&input, &output);

    let mut with_textures = args.clone();
    with_textures.push("-tc".into());
    if let Err(err) = run_tool("gltfpack", with_textures).await {
      if !basis_unavailable(&format!("{err:#}")) {
        return Err(err);
      }
      debug!("gltfpack lacks BasisU, retrying without texture compression");
      run_tool("gltfpack", args).await?;
    }

    scratch.read("out.glb").await
  }
}
