use anyhow::Result;
use colored::Colorize;
use feastline_core::cache::NotificationCache;
use feastline_infrastructure::{FeastlinePaths, FileNotificationCache};

pub fn show(paths: &FeastlinePaths, profile: &str) -> Result<()> {
    let cache = FileNotificationCache::for_profile(paths, profile)?;
    let cached = cache.load()?;

    println!(
        "{} {} ({} unread)",
        "Profile".bold(),
        profile,
        cached.unread_count
    );
    if cached.notifications.is_empty() {
        println!("  no cached notifications");
    }
    for record in &cached.notifications {
        let marker = if record.read { " " } else { "*" };
        let title = record.title.as_deref().unwrap_or(record.kind.as_str());
        println!(
            "{} {} [{}] {}: {}",
            marker.yellow(),
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.id.dimmed(),
            title.bold(),
            record.message
        );
    }
    Ok(())
}

pub fn clear(paths: &FeastlinePaths, profile: &str) -> Result<()> {
    let cache = FileNotificationCache::for_profile(paths, profile)?;
    cache.clear()?;
    println!("Cleared cached notifications for profile '{}'", profile);
    Ok(())
}
