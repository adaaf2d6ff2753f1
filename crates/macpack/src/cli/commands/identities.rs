//! Identities command

use std::sync::Arc;

use clap::Args;
use console::style;
use serde_json::json;
use tracing::{debug, info};

use macpack_core::config::{find_config, load_config};
use macpack_core::{Config, SigningEnv};
use macpack_signing::{CertificateClass, IdentityResolver, SecurityCli, SecurityTool};

use crate::cli::{output, Cli, OutputFormat};

/// List code signing identities and show which would be used
#[derive(Debug, Args)]
pub struct IdentitiesCommand {
    /// Keychain to search instead of the default search list
    #[arg(long)]
    pub keychain: Option<String>,
}

impl IdentitiesCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(keychain = ?self.keychain, "executing identities command");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let config = match find_config(&cwd) {
            Some(path) => load_config(&path)?,
            None => {
                debug!("no configuration found, using defaults");
                Config::default()
            }
        };

        let security: Arc<dyn SecurityTool> = Arc::new(SecurityCli::new());
        let keychain = self.keychain.as_deref();
        let identities = security.find_identities(keychain).await?;

        let resolver = IdentityResolver::new(Arc::clone(&security), &SigningEnv::from_env());
        let mas_options = config.mas_options();
        let mut selected = Vec::new();
        for (label, class, hint) in [
            ("direct", CertificateClass::DeveloperIdApplication, config.mac.identity.as_deref()),
            ("mas", CertificateClass::MacDeveloperApplication, mas_options.identity.as_deref()),
            (
                "mas-installer",
                CertificateClass::MacDeveloperInstaller,
                mas_options.identity.as_deref(),
            ),
        ] {
            let choice = match resolver.find_identity(class, hint, keychain).await {
                Ok(found) => found.ok_or_else(|| "none".to_string()),
                Err(e) => Err(e.to_string()),
            };
            selected.push((label, choice));
        }

        match cli.format {
            OutputFormat::Json => {
                let selected: serde_json::Map<String, serde_json::Value> = selected
                    .into_iter()
                    .map(|(label, choice)| {
                        let value = match choice {
                            Ok(name) => json!({ "identity": name }),
                            Err(reason) => json!({ "identity": null, "reason": reason }),
                        };
                        (label.to_string(), value)
                    })
                    .collect();
                let output = json!({
                    "identities": identities,
                    "selected": selected,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                println!("{}", style("Signing Identities").bold());
                println!();

                if identities.is_empty() {
                    println!("  {}", style("No signing identities found").dim());
                } else {
                    for id in &identities {
                        let class = id.class.map(|c| c.as_str()).unwrap_or("other");
                        println!("  {} [{}]", style(&id.name).cyan(), class);
                        let short_fp = id.fingerprint.get(..16).unwrap_or(&id.fingerprint);
                        println!("    Fingerprint: {}...", style(short_fp).dim());
                        if let Some(team) = &id.team_id {
                            println!("    Team ID:     {}", team);
                        }
                    }
                }

                println!();
                println!("{}", style("Selected").bold());
                for (label, choice) in &selected {
                    match choice {
                        Ok(name) => println!("{}", output::key_value(label, name)),
                        Err(reason) => println!(
                            "{}",
                            output::key_value(label, &style(reason).yellow().to_string())
                        ),
                    }
                }
            }
        }

        Ok(())
    }
}
