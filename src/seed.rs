use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::graph::{is_structured, kind_of};

const ADMIN_SEED: &str = include_str!("../seeds/admin.json");
const PLATFORM_SEED: &str = include_str!("../seeds/platform.json");

/// Nodes written once when a shard is first activated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedSet {
    nodes: Vec<Value>,
}

impl SeedSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Value>) -> Result<Self> {
        if let Some((index, node)) = nodes.iter().enumerate().find(|(_, n)| !is_structured(n)) {
            bail!(
                "seed node {index} must be an object or array, got {}",
                kind_of(node)
            );
        }
        Ok(Self { nodes })
    }

    /// Parse a JSON array of seed nodes.
    pub fn from_json(text: &str) -> Result<Self> {
        let nodes: Vec<Value> =
            serde_json::from_str(text).context("seed data must be a JSON array")?;
        Self::from_nodes(nodes)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing seed file {}", path.display()))
    }

    /// Compiled-in seed documents for the known shards; other names get none.
    pub fn builtin(shard: &str) -> Result<Self> {
        match shard {
            "admin" => Self::from_json(ADMIN_SEED),
            "platform" => Self::from_json(PLATFORM_SEED),
            _ => Ok(Self::empty()),
        }
    }

    pub fn nodes(&self) -> &[Value] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_seeds() {
        let admin = SeedSet::builtin("admin").unwrap();
        assert_eq!(admin.len(), 2);
        assert_eq!(admin.nodes()[1]["ui_texts"]["login_button"], json!("Login"));

        let platform = SeedSet::builtin("platform").unwrap();
        assert_eq!(platform.len(), 2);

        assert!(SeedSet::builtin("billing").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_primitive_seed() {
        let err = SeedSet::from_json(r#"[{"a":1}, 5]"#).unwrap_err();
        assert!(err.to_string().contains("seed node 1"));
        assert!(SeedSet::from_json(r#"{"a":1}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"[{"banner":"hello"}]"#).unwrap();
        let seeds = SeedSet::load(&path).unwrap();
        assert_eq!(seeds.nodes(), &[json!({"banner": "hello"})]);
    }
}
