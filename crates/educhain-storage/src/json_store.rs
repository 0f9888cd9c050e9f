use crate::Storage;
use anyhow::{Context, Result};
use educhain_core::Chain;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_INDENT: usize = 4;

/// Chain stored as a pretty-printed JSON array of blocks in a single file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
  path: PathBuf,
  indent: usize,
}

impl JsonFileStore {
  pub fn new<P: AsRef<Path>>(path: P) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      indent: DEFAULT_INDENT,
    }
  }

  pub fn with_indent(mut self, indent: usize) -> Self {
    self.indent = indent;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Storage for JsonFileStore {
  fn save(&self, chain: &Chain) -> Result<()> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent)
        .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file = File::create(&self.path)
      .with_context(|| format!("creating {}", self.path.display()))?;
    let mut writer = BufWriter::new(file);
    chain
      .write_json(&mut writer, self.indent)
      .with_context(|| format!("writing chain to {}", self.path.display()))?;
    writer.flush()?;

    info!(path = %self.path.display(), blocks = chain.len(), "chain saved");
    Ok(())
  }

  fn load(&self, difficulty: usize) -> Result<Chain> {
    let text = fs::read_to_string(&self.path)
      .with_context(|| format!("reading {}", self.path.display()))?;
    let chain = Chain::from_json(&text, difficulty)
      .with_context(|| format!("parsing chain from {}", self.path.display()))?;
    info!(path = %self.path.display(), blocks = chain.len(), "chain loaded");
    Ok(chain)
  }

  fn exists(&self) -> bool {
    self.path.is_file()
  }
}
