use crate::cli::Commands;
use anyhow::Result;

pub mod config;
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub mod host;
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub mod probe;

/// Dispatch command to appropriate handler
pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Config { json } => config::execute(json),

        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        Commands::Probe {
            namespace,
            now,
            file,
        } => probe::execute(namespace, now, &file),

        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        Commands::Host => host::execute(),

        #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
        Commands::Probe { .. } | Commands::Host => {
            anyhow::bail!("Namespace inspection requires the glibc dynamic linker")
        }

        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_version() {
    println!("Shade {}", env!("CARGO_PKG_VERSION"));
    println!("Maximum namespaces: {}", shade_core::MAX_NAMESPACES);
    println!("Static link: {}", shade_core::static_link_enabled());
}
