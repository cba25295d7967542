use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Location and key shape of the link document.
#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_links_file")]
    pub file: String,
    #[serde(default = "default_key_width")]
    pub key_width: usize,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self { file: default_links_file(), key_width: default_key_width() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self { admin_ids: Vec::new(), admin_token: None, command_prefix: default_command_prefix() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { latency_window: default_latency_window() }
    }
}

fn default_links_file() -> String { "data/links.json".to_string() }
fn default_key_width() -> usize { 4 }
fn default_command_prefix() -> String { "/postno".to_string() }
fn default_latency_window() -> usize { 1000 }

/// Path of the config file: `CONFIG_PATH`, else `config.toml`.
pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

/// Parsed and validated config from `path`, or `None` when the file does not exist.
/// A file that exists but cannot be read, parsed or validated is an error.
pub fn load_file_if_present(path: &str) -> Result<Option<AppConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(anyhow!("cannot read config file {path}: {e}")),
    };
    let mut cfg = load_from_str(&content).map_err(|e| anyhow!("cannot parse config file {path}: {e}"))?;
    cfg.normalize_and_validate()
        .map_err(|e| anyhow!("invalid config file {path}: {e}"))?;
    Ok(Some(cfg))
}

impl AppConfig {
    /// Defaults plus environment, for deployments without a config file.
    pub fn from_env() -> Result<Self> {
        let mut cfg = AppConfig::default();
        if let Ok(host) = std::env::var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            cfg.server.port = port;
        }
        cfg.server.worker_threads = std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());
        cfg.links.file = String::new();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.links.normalize_from_env();
        self.links.validate()?;
        self.bot.normalize_from_env();
        self.bot.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl LinksConfig {
    pub fn normalize_from_env(&mut self) {
        if self.file.trim().is_empty() {
            self.file = std::env::var("LINKS_FILE").unwrap_or_else(|_| default_links_file());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.file.trim().is_empty() {
            return Err(anyhow!("links.file is empty; set it in config.toml or LINKS_FILE"));
        }
        if !(1..=9).contains(&self.key_width) {
            return Err(anyhow!("links.key_width must be within 1..=9"));
        }
        Ok(())
    }
}

impl BotConfig {
    pub fn normalize_from_env(&mut self) {
        if self.admin_ids.is_empty() {
            if let Ok(raw) = std::env::var("ADMIN_IDS") {
                self.admin_ids = parse_admin_ids(&raw);
            }
        }
        if self.admin_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            self.admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.trim().is_empty());
        }
        if self.command_prefix.trim().is_empty() {
            self.command_prefix = default_command_prefix();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.command_prefix.starts_with('/') {
            return Err(anyhow!("bot.command_prefix must start with '/'"));
        }
        Ok(())
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.latency_window == 0 {
            return Err(anyhow!("metrics.latency_window must be >= 1"));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of numeric user ids, skipping junk entries.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() -> Result<()> {
        let cfg = load_from_str("")?;
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.links.file, "data/links.json");
        assert_eq!(cfg.links.key_width, 4);
        assert_eq!(cfg.bot.command_prefix, "/postno");
        assert_eq!(cfg.metrics.latency_window, 1000);
        Ok(())
    }

    #[test]
    fn parses_all_sections() -> Result<()> {
        let mut cfg = load_from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            worker_threads = 0

            [links]
            file = "/var/lib/postlink/links.json"
            key_width = 5

            [bot]
            admin_ids = [42, 7]
            admin_token = "s3cret"

            [metrics]
            latency_window = 50
            "#,
        )?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.worker_threads, Some(4));
        assert_eq!(cfg.links.key_width, 5);
        assert_eq!(cfg.bot.admin_ids, vec![42, 7]);
        assert_eq!(cfg.bot.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(cfg.metrics.latency_window, 50);
        Ok(())
    }

    #[test]
    fn rejects_bad_values() -> Result<()> {
        let mut cfg = load_from_str("[links]\nkey_width = 0\n")?;
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = load_from_str("[metrics]\nlatency_window = 0\n")?;
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = load_from_str("[bot]\ncommand_prefix = \"postno\"\n")?;
        assert!(cfg.normalize_and_validate().is_err());
        Ok(())
    }

    #[test]
    fn missing_file_is_not_an_error() -> Result<()> {
        let path = std::env::temp_dir().join("postlink_configs_does_not_exist.toml");
        assert!(load_file_if_present(&path.to_string_lossy())?.is_none());
        Ok(())
    }

    #[test]
    fn present_but_invalid_file_is_an_error() -> Result<()> {
        let path = std::env::temp_dir().join(format!("postlink_configs_{}.toml", std::process::id()));
        std::fs::write(&path, "[links]\nfile = \"/srv/custom/links.json\"\nkey_width = 0\n")?;
        let err = load_file_if_present(&path.to_string_lossy()).unwrap_err();
        assert!(err.to_string().contains("key_width"), "unexpected error: {err}");

        std::fs::write(&path, "[links\nfile = ")?;
        assert!(load_file_if_present(&path.to_string_lossy()).is_err());

        std::fs::write(&path, "[links]\nfile = \"/srv/custom/links.json\"\nkey_width = 5\n")?;
        let cfg = load_file_if_present(&path.to_string_lossy())?.unwrap();
        assert_eq!(cfg.links.file, "/srv/custom/links.json");
        assert_eq!(cfg.links.key_width, 5);

        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn admin_ids_skip_garbage() {
        assert_eq!(parse_admin_ids("1, 2,abc,, 3 "), vec![1, 2, 3]);
        assert!(parse_admin_ids("").is_empty());
    }
}
