// Configuration management module
// TOML settings for the Ollama connection, chunking, retrieval, memory and escalation

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChunkingConfig, Config, ConfigError, CorpusConfig, EscalationConfig, EscalationStrategy,
    MemoryConfig, OllamaConfig, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
