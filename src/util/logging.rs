use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use crate::config::{LogFormat, LogLevel};

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Render one record as a single-line JSON object
fn json_line(timestamp: &str, level: log::Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "time": timestamp,
        "level": level.as_str().to_lowercase(),
        "target": target,
        "msg": message,
    })
    .to_string()
}

/// Initialize the logging system. `RUST_LOG` refines the configured level.
pub fn init(level: LogLevel, format: LogFormat) {
    let mut builder = Builder::new();
    builder.filter(None, level_filter(level));

    match format {
        LogFormat::Text => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {} - {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = json_line(
                    &chrono::Local::now().to_rfc3339(),
                    record.level(),
                    record.target(),
                    &record.args().to_string(),
                );
                writeln!(buf, "{}", line)
            });
        }
    }

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    // A second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_is_one_object() {
        let line = json_line(
            "2026-01-01T00:00:00+00:00",
            log::Level::Warn,
            "mikrotik_exporter::scrape",
            "Failed to connect device=r1",
        );
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "warn");
        assert_eq!(value["msg"], "Failed to connect device=r1");
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(level_filter(LogLevel::Debug), LevelFilter::Debug);
        assert_eq!(level_filter(LogLevel::Error), LevelFilter::Error);
    }
}
