//! Probe command implementation

use std::path::Path;

use anyhow::{Context, Result};
use shade_core::NamespaceId;
use shade_namespace::{DEFAULT_PROBE_FLAGS, NamespaceRegistry};

pub fn execute(namespace: NamespaceId, now: bool, file: &Path) -> Result<()> {
    let flags = if now {
        libc::RTLD_NOW
    } else {
        DEFAULT_PROBE_FLAGS
    };

    let loaded = NamespaceRegistry::global()
        .probe_path(namespace, file, flags)
        .with_context(|| format!("Failed to probe {}", file.display()))?;

    tracing::debug!(namespace = %namespace, loaded, "Probe complete");
    println!("{}", if loaded { "loaded" } else { "not loaded" });

    Ok(())
}
