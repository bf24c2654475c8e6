use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use engine::{EngineConfig, EngineError};
use ui::app::App;

/// Logs to stderr and to `tilecomp.log` in the temp directory. Keep the
/// guard alive until exit so the file gets flushed.
fn setup_logging() -> WorkerGuard {
    let file = tracing_appender::rolling::never(env::temp_dir(), "tilecomp.log");
    let (writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    guard
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, EngineError> {
    match path {
        Some(path) => {
            tracing::info!("loading configuration from {}", path.display());
            EngineConfig::load(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = setup_logging();
    tracing::info!("tilecomp v{}", env!("CARGO_PKG_VERSION"));

    let path = env::args_os().nth(1);
    let config = load_config(path.as_deref().map(Path::new))?;
    let app = App::new(config)?;

    eframe::run_native(
        "tilecomp",
        eframe::NativeOptions::default(),
        Box::new(|_cc| Ok(Box::new(app))),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_without_a_path() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn config_from_file() {
        let path = env::temp_dir().join(format!("tilecomp-test-{}.toml", std::process::id()));
        std::fs::write(&path, "frameskip = 2\nsync_line = 100\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.frameskip, 2);
        assert_eq!(config.sync_line, Some(100));
        assert_eq!(config.screen_width, 320);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let path = env::temp_dir().join("tilecomp-does-not-exist.toml");
        assert!(matches!(load_config(Some(&path)), Err(EngineError::Config(_))));
    }
}
