//! CLI commands

use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use panel_core::{ClientConfig, GuardDecision, LogNavigator, Route};
use panel_http::{RequestOptions, SessionClient, SessionClientBuilder, SignInRequest};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with a phone number and password
    Login {
        /// Phone number registered with the backend
        #[arg(long)]
        identifier: String,

        #[arg(long, env = "PANEL_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the session on disk so later invocations stay signed in
        #[arg(long)]
        remember: bool,
    },

    /// Sign out and forget stored credentials
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Send an authenticated request and print the JSON response
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,

        /// Endpoint path relative to the API root, e.g. order/
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Ask the backend whether the stored access token is valid
    Verify,

    /// Evaluate the route guard for a view path
    Guard {
        /// View path, e.g. /login or /dashboard
        path: String,
    },

    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a default configuration file
    Init {
        /// Output file path (defaults to the platform config directory)
        output: Option<PathBuf>,
    },
}

impl Commands {
    pub async fn execute(self, config: ClientConfig) -> Result<()> {
        match self {
            Self::Config { command } => command.execute(),
            Self::Login {
                identifier,
                password,
                remember,
            } => login(&session_client(&config)?, identifier, password, remember).await,
            Self::Logout => {
                let client = session_client(&config)?;
                client.load_session().await;
                client.end_session().await;
                println!("Signed out");
                Ok(())
            }
            Self::Whoami => whoami(&session_client(&config)?).await,
            Self::Request { method, path, body } => {
                request(&session_client(&config)?, &method, &path, body.as_deref()).await
            }
            Self::Refresh => {
                let client = session_client(&config)?;
                client.load_session().await;
                if !client.refresh().await {
                    bail!("Token refresh failed");
                }
                println!("Access token refreshed");
                Ok(())
            }
            Self::Verify => {
                let client = session_client(&config)?;
                client.load_session().await;
                let valid = client.verify().await?;
                println!("{}", if valid { "valid" } else { "invalid" });
                Ok(())
            }
            Self::Guard { path } => {
                let client = session_client(&config)?;
                match client.guard(&Route::from_path(&path)).await {
                    GuardDecision::Proceed => println!("proceed {path}"),
                    GuardDecision::Redirect(route) => println!("redirect {route}"),
                }
                Ok(())
            }
        }
    }
}

fn session_client(config: &ClientConfig) -> Result<SessionClient> {
    let client = SessionClientBuilder::from_config(config)
        .navigator(Arc::new(LogNavigator))
        .build()?;
    Ok(client)
}

impl ConfigCommands {
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Init { output } => {
                let path = output.unwrap_or_else(config::default_config_path);
                config::generate_default_config(&path)?;
                println!("Generated configuration at: {}", path.display());
                Ok(())
            }
        }
    }
}

async fn login(
    client: &SessionClient,
    identifier: String,
    password: String,
    remember: bool,
) -> Result<()> {
    client.load_session().await;

    let credentials = SignInRequest::new(identifier, password).remember_me(remember);
    if let Err(err) = client.sign_in(credentials).await {
        let message = client
            .state()
            .error
            .unwrap_or_else(|| "Sign-in failed".to_string());
        return Err(anyhow!(err).context(message));
    }

    if !remember {
        info!("Session is not remembered and ends when this process exits");
    }
    let user = client
        .state()
        .user
        .ok_or_else(|| anyhow!("Signed in but no user recorded"))?;
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

async fn whoami(client: &SessionClient) -> Result<()> {
    match client.load_session().await.user {
        Some(user) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        None => bail!("Not signed in"),
    }
}

async fn request(
    client: &SessionClient,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("Invalid HTTP method: {method}"))?;

    let mut options = RequestOptions::new(method);
    if let Some(body) = body {
        let body: Value = serde_json::from_str(body).map_err(|e| anyhow!("Invalid JSON body: {e}"))?;
        options = options.json(body);
    }

    client.load_session().await;
    let response = client.request(path, options).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
