use log::LevelFilter;

/// Installs `pretty_env_logger` at the given level. `RUST_LOG` still refines
/// per-module filters. Returns false if a logger was already installed.
pub fn init(level: LevelFilter) -> bool {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    match builder.try_init() {
        Ok(()) => {
            log::info!("Logging initialized at {}", level);
            true
        }
        Err(_) => false,
    }
}
