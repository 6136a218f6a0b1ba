use chrono::Local;
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Installs the process logger at `level`. `RUST_LOG` takes precedence when set.
///
/// Calling this more than once keeps the first logger.
pub fn init(level: LevelFilter) {
    let env = Env::default().default_filter_or(level.to_string());
    let result = Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if result.is_ok() {
        log::info!("Logging initialized at level {}", level);
    }
}
