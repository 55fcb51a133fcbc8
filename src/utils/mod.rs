// src/utils/mod.rs
use log::info;
use std::str::FromStr;

pub mod timing;

/// Installs the global `fern` logger. Unknown level names fall back to `info`.
pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = log::LevelFilter::from_str(level).unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}][{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("rustls", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

/// Formats a duration as `HH:MM:SS` for progress lines.
pub fn format_eta(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn eta_is_rendered_as_clock_time() {
        assert_eq!(format_eta(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_eta(Duration::from_secs(3725)), "01:02:05");
    }
}
