use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Result};
use parking_lot::Mutex;

use super::FlagStore;

/// Process-local flag store. Can be told to fail its first few calls.
#[derive(Debug, Default)]
pub struct MemoryFlags {
    flags: Mutex<HashMap<(String, String), bool>>,
    failures_left: AtomicU32,
}

impl MemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first `n` operations fail with a storage error.
    pub fn failing(n: u32) -> Self {
        Self {
            flags: Mutex::default(),
            failures_left: AtomicU32::new(n),
        }
    }

    fn maybe_fail(&self) -> Result<()> {
        let left = self
            .failures_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if left.is_ok() {
            bail!("storage unavailable");
        }
        Ok(())
    }
}

impl FlagStore for MemoryFlags {
    fn get_flag(&self, shard: &str, name: &str) -> Result<bool> {
        self.maybe_fail()?;
        let flags = self.flags.lock();
        Ok(flags
            .get(&(shard.to_string(), name.to_string()))
            .copied()
            .unwrap_or(false))
    }

    fn set_flag(&self, shard: &str, name: &str, value: bool) -> Result<()> {
        self.maybe_fail()?;
        self.flags
            .lock()
            .insert((shard.to_string(), name.to_string()), value);
        Ok(())
    }
}
