//! Canned Reply Rendering
//!
//! Pure text renderers for the menu, help, and info commands. Given the same
//! name, prefix, and sampled stats these produce byte-identical output — the
//! only impure step is `RuntimeStats::sample`, which the caller invokes.

use std::time::{Duration, Instant};

/// Runtime stats sampled once per `info` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    pub uptime: Duration,
    /// Resident set size in bytes, when the platform exposes it.
    pub rss_bytes: Option<u64>,
}

impl RuntimeStats {
    pub fn sample(started: Instant) -> Self {
        Self {
            uptime: started.elapsed(),
            rss_bytes: resident_memory(),
        }
    }
}

/// Resident memory via getrusage. ru_maxrss is KiB on Linux, bytes on macOS.
#[cfg(unix)]
fn resident_memory() -> Option<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let usage = unsafe { usage.assume_init() };
    #[cfg(target_os = "macos")]
    let bytes = usage.ru_maxrss as u64;
    #[cfg(not(target_os = "macos"))]
    let bytes = (usage.ru_maxrss as u64) * 1024;
    Some(bytes)
}

#[cfg(not(unix))]
fn resident_memory() -> Option<u64> {
    None
}

pub fn alive_text(name: &str) -> String {
    format!("{name} is alive and running! 🚀")
}

pub fn owner_text(name: &str) -> String {
    format!("Bot Owner: {name}\nContact: wa.me/1234567890")
}

pub fn menu_text(name: &str, prefix: &str) -> String {
    format!(
        "╭━━━❰ *{name}* ❱━━━╮\n\
         ┃\n\
         ┃ 📌 *MAIN COMMANDS*\n\
         ┃ • {prefix}menu - Show this menu\n\
         ┃ • {prefix}ping - Check bot response\n\
         ┃ • {prefix}alive - Bot status\n\
         ┃ • {prefix}info - Bot information\n\
         ┃ • {prefix}owner - Contact owner\n\
         ┃\n\
         ┃ ⚙️ *SETTINGS*\n\
         ┃ • {prefix}setprefix [char] - Change prefix\n\
         ┃ • {prefix}typing - Fake typing\n\
         ┃ • {prefix}recording - Fake recording\n\
         ┃\n\
         ┃ 🎮 *FUN*\n\
         ┃ • {prefix}sticker - Create sticker\n\
         ┃ • {prefix}help - Commands help\n\
         ┃\n\
         ┃ 🛡️ *GROUP*\n\
         ┃ • {prefix}tagall - Tag everyone\n\
         ┃\n\
         ╰━━━━━━━━━━━━━━━╯"
    )
}

pub fn help_text(name: &str, prefix: &str) -> String {
    format!(
        "*{name} HELP*\n\
         \n\
         📚 *Getting Started*\n\
         1. Connect the bot using QR code or pairing code\n\
         2. Send {prefix}menu to see all commands\n\
         3. Use commands with your set prefix\n\
         \n\
         🔧 *Configuration*\n\
         - Change prefix: {prefix}setprefix [character]\n\
         - Check status: {prefix}alive\n\
         \n\
         💡 *Tips*\n\
         - Reply to images with {prefix}sticker\n\
         - Report issues to the owner\n\
         \n\
         Version: {version}",
        version = crate::VERSION,
    )
}

pub fn info_text(name: &str, stats: &RuntimeStats) -> String {
    let memory = match stats.rss_bytes {
        Some(bytes) => format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0),
        None => "n/a".to_string(),
    };
    format!(
        "╭─「 *{name}* 」\n\
         │ *Name:* {name}\n\
         │ *Version:* {version}\n\
         │ *Library:* whatsapp-rust\n\
         │ *Platform:* Rust/Tokio\n\
         │ *Uptime:* {uptime}s\n\
         │ *Memory:* {memory}\n\
         ╰──────────────",
        version = crate::VERSION,
        uptime = stats.uptime.as_secs(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> RuntimeStats {
        RuntimeStats {
            uptime: Duration::from_secs(90),
            rss_bytes: Some(32 * 1024 * 1024),
        }
    }

    #[test]
    fn test_renderers_are_deterministic() {
        assert_eq!(menu_text("WACRAB-MD", "."), menu_text("WACRAB-MD", "."));
        assert_eq!(help_text("WACRAB-MD", "."), help_text("WACRAB-MD", "."));
        assert_eq!(
            info_text("WACRAB-MD", &stats()),
            info_text("WACRAB-MD", &stats())
        );
    }

    #[test]
    fn test_menu_embeds_prefix_and_name() {
        let menu = menu_text("WACRAB-MD", "!");
        assert!(menu.contains("*WACRAB-MD*"));
        assert!(menu.contains("!menu"));
        assert!(menu.contains("!setprefix"));
        assert!(!menu.contains(".menu"));
    }

    #[test]
    fn test_help_embeds_prefix() {
        let help = help_text("WACRAB-MD", "#");
        assert!(help.contains("#menu"));
        assert!(help.contains("#setprefix"));
    }

    #[test]
    fn test_info_formats_stats() {
        let info = info_text("WACRAB-MD", &stats());
        assert!(info.contains("*Uptime:* 90s"));
        assert!(info.contains("*Memory:* 32.00 MB"));
    }

    #[test]
    fn test_info_without_memory_reading() {
        let info = info_text(
            "WACRAB-MD",
            &RuntimeStats {
                uptime: Duration::from_secs(5),
                rss_bytes: None,
            },
        );
        assert!(info.contains("*Memory:* n/a"));
    }

    #[test]
    fn test_sample_reports_elapsed_uptime() {
        let stats = RuntimeStats::sample(Instant::now());
        assert!(stats.uptime < Duration::from_secs(5));
    }
}
