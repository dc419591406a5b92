use crate::toast::{TerminalBell, TerminalToasts};
use anyhow::Result;
use colored::Colorize;
use feastline_application::{SyncDependencies, SyncService};
use feastline_core::connection::ConnectionState;
use feastline_core::session::{Role, Session};
use feastline_infrastructure::{ConfigService, FeastlinePaths, FileNotificationCache};
use std::sync::Arc;

pub struct ListenArgs {
    pub user_id: String,
    pub role: Role,
    pub url: Option<String>,
    pub profile: String,
    pub logout: bool,
}

pub async fn run(paths: &FeastlinePaths, args: ListenArgs) -> Result<()> {
    let mut config = ConfigService::new(paths).get_config();
    if let Some(url) = args.url {
        config.channel.base_url = url;
    }

    let cache = FileNotificationCache::for_profile(paths, &args.profile)?;
    let service = SyncService::new(
        &config,
        SyncDependencies {
            transports: Vec::new(),
            cache: Arc::new(cache),
            toasts: Arc::new(TerminalToasts),
            audio: Some(Arc::new(TerminalBell)),
        },
    );

    let session = Session::new(args.user_id, args.role);
    service.start(&session).await?;
    println!(
        "Listening on {} as {} ({}), {} cached notifications, {} unread. Ctrl-C to stop.",
        config.channel.base_url.bold(),
        session.user_id,
        session.role,
        service.store().notifications().len(),
        service.store().unread_count()
    );

    let mut connection = service.subscribe_connection();
    let mut last_state = None;
    let mut retried = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(info) = connection.borrow_and_update().clone() else {
                    continue;
                };
                if last_state == Some(info.state) {
                    continue;
                }
                last_state = Some(info.state);
                match info.state {
                    ConnectionState::Connected => {
                        retried = false;
                        println!("{}", "● connected".green());
                    }
                    ConnectionState::Reconnecting => println!(
                        "{}",
                        format!("● reconnecting (attempt {})", info.reconnect_attempts).yellow()
                    ),
                    ConnectionState::Failed if !retried => {
                        println!("{}", "● gave up reconnecting, retrying once more".red());
                        retried = true;
                        if let Err(err) = service.retry().await {
                            tracing::warn!("[Listen] Retry failed: {}", err);
                            break;
                        }
                    }
                    ConnectionState::Failed => {
                        println!("{}", "● event service unreachable".red());
                        break;
                    }
                    ConnectionState::Connecting | ConnectionState::Disconnected => {}
                }
            }
        }
    }

    service.stop(args.logout).await;
    println!(
        "Stopped. {} notifications, {} unread.",
        service.store().notifications().len(),
        service.store().unread_count()
    );
    Ok(())
}
