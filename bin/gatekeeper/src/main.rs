use gatekeeper::{replay, resolve_config};
use gatekeeper_common::plugin_manager::PluginManager;
use gatekeeper_config::LoggerConfig;
use tokio::{
  fs::File,
  io::{stdin, stdout, BufReader},
};
use tracing::subscriber::set_global_default;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;

/// Usage: `gatekeeper [config-file] [requests-file]`
///
/// Use `-` as the config file to read the config from the environment. Without a requests file,
/// records are read from stdin.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let config_file_path = std::env::args().nth(1).filter(|path| path != "-");
  let requests_file_path = std::env::args().nth(2);

  let config = resolve_config(config_file_path.as_deref(), |key| std::env::var(key).ok())?;

  let logger_config = config.logger.clone().unwrap_or_else(LoggerConfig::default);
  let global_logger = gatekeeper_logger::logger_layer::build_logger(
    &logger_config.format,
    &logger_config.filter,
    logger_config.print_performance_info,
  )?;
  set_global_default(tracing_subscriber::registry().with(global_logger))?;

  info!("Gatekeeper process started");
  debug!(config = ?config.admission_control, "configuration loaded");

  let plugin =
    PluginManager::create_plugin::<admission_control_plugin::Plugin>(config.admission_control)
      .await?;
  let manager = PluginManager::new_from_vec(vec![plugin]);

  match requests_file_path {
    Some(path) => {
      let file = File::open(&path).await?;
      replay(&manager, BufReader::new(file), stdout()).await?;
    }
    None => {
      replay(&manager, BufReader::new(stdin()), stdout()).await?;
    }
  }

  Ok(())
}
