//! `AuraMail` - headless webmail client.
//!
//! Signs in with credentials from the environment, keeps the configured
//! folder in sync by polling, and logs every change to the mailbox view.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod report;
mod settings;

use anyhow::Context;
use auramail_core::{HttpMailApi, MailboxSession};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use report::ViewReporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auramail=debug,auramail_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AuraMail");

    let settings = settings::load_settings().await?;
    let config = settings
        .sync
        .with_env_overrides()
        .context("Invalid sync configuration")?;

    let email = std::env::var("AURAMAIL_EMAIL").context("AURAMAIL_EMAIL is not set")?;
    let password = std::env::var("AURAMAIL_PASSWORD").context("AURAMAIL_PASSWORD is not set")?;

    let api = HttpMailApi::new(&config).context("Failed to create HTTP client")?;
    let login = api
        .login(&email, &password)
        .await
        .with_context(|| format!("Login failed for {email}"))?;
    info!(
        user = %login.user.email,
        name = login.user.full_name.as_deref().unwrap_or(""),
        api = %config.api_url,
        "Signed in"
    );

    let session = MailboxSession::start(api, login.token, config, settings.start_folder);
    let mut views = session.subscribe();
    let mut reporter = ViewReporter::new(settings.search);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                reporter.report(&view);
                if view.session_expired {
                    warn!("Session expired, sign in again to keep syncing");
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                info!("Shutting down");
                break;
            }
        }
    }

    session.stop();
    Ok(())
}
