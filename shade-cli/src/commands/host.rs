//! Host command implementation

use anyhow::Result;
use shade_namespace::NamespaceRegistry;

pub fn execute() -> Result<()> {
    match NamespaceRegistry::global().host_namespace() {
        Some(host) if host.name.is_empty() => {
            println!("main program (link map {:#x})", host.handle.as_raw());
        }
        Some(host) => println!("{} (link map {:#x})", host.name, host.handle.as_raw()),
        None => println!("unknown"),
    }

    Ok(())
}
