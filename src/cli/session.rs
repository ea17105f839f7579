//! Login and logout commands

use crate::api::{ConsoleClient, LoginOutcome};
use crate::cli::LoginArgs;
use std::io::BufRead;

/// Handle `oracle login`
///
/// Prints the issued token so it can be exported as `ORACLE_TOKEN`.
pub async fn handle_login(
    args: &LoginArgs,
    client: &ConsoleClient,
) -> Result<String, Box<dyn std::error::Error>> {
    let password = match &args.password {
        Some(password) => password.clone(),
        None => read_password()?,
    };

    match client.login(&args.name, &password).await? {
        LoginOutcome::Accepted { token_issued: true } => Ok(client
            .guard()
            .credentials()
            .token()
            .unwrap_or_default()),
        LoginOutcome::Accepted { token_issued: false } => {
            Ok("✓ Logged in (the server did not issue a token)".to_string())
        }
        LoginOutcome::Rejected => Err("login rejected: wrong name or password".into()),
    }
}

/// Handle `oracle logout`
pub async fn handle_logout(client: &ConsoleClient) -> Result<String, Box<dyn std::error::Error>> {
    client.logout().await?;
    Ok("✓ Logged out".to_string())
}

fn read_password() -> Result<String, Box<dyn std::error::Error>> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
