//! Config command implementation

use anyhow::{Context, Result};
use shade_core::ConfigStore;

pub fn execute(json: bool) -> Result<()> {
    let config = ConfigStore::global().snapshot();

    if json {
        let rendered =
            serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
        println!("{rendered}");
    } else {
        print!("{config}");
    }

    Ok(())
}
