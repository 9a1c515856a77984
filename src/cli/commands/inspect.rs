use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::platform::Platform;

pub fn routes(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let platform = Platform::bootstrap(config)?;
    let summaries = platform.table().summaries();

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            for summary in &summaries {
                println!("{}", summary);
            }
        }
    }
    Ok(())
}

/// Fails (and so exits non-zero) when manifests are invalid or the table cannot be built
pub fn check(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let platform = Platform::bootstrap(config)?;

    let routes = platform.table().len();
    let manifests = platform.manifests.len();
    let packages = platform.pages.registry().slugs();

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": true,
                "routes": routes,
                "manifests": manifests,
                "packages": packages,
                "resources": platform.resources.registered_types(),
            }))?
        ),
        OutputFormat::Text => {
            println!("OK: {} routes from {} manifests", routes, manifests);
            println!("Packages: {}", packages.join(", "));
        }
    }
    Ok(())
}
