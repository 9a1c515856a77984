use serde_json::json;

use crate::auth::{issue_token, JwtSettings};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::types::UserSession;

pub fn handle(
    config: &AppConfig,
    output_format: OutputFormat,
    user: String,
    roles: Vec<String>,
    email: Option<String>,
    org: Option<String>,
) -> anyhow::Result<()> {
    let mut session = UserSession::new(user).with_roles(roles);
    session.email = email;
    session.org_id = org;

    let settings = JwtSettings::from_config(config);
    let token = issue_token(&settings, &session)?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "token": token,
                "user": session,
                "expiresInHours": settings.expiry_hours,
            }))?
        ),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
