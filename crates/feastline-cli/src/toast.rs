//! Terminal presentation of notices.

use colored::Colorize;
use feastline_application::{AudioCue, Notice, NoticeTone, ToastSink};
use feastline_core::FeastlineError;
use feastline_core::error::Result;
use std::io::Write;

pub struct TerminalToasts;

impl ToastSink for TerminalToasts {
    fn show(&self, notice: &Notice) {
        let title = match notice.tone {
            NoticeTone::Success => notice.title.green().bold(),
            NoticeTone::Info => notice.title.cyan().bold(),
            NoticeTone::Error => notice.title.red().bold(),
        };
        println!("{} {}  {}", notice.icon, title, notice.message);
    }
}

/// Rings the terminal bell.
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play(&self, _notice: &Notice) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(b"\x07")
            .and_then(|_| stdout.flush())
            .map_err(|e| FeastlineError::Audio(e.to_string()))
    }
}
