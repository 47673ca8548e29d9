use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::retry::RetryPolicy;

/// Which implementation of the extraction/compilation tools to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    /// Shell out to GNU `xgettext` and `msgfmt`
    Gettext,
    /// In-process extractor and `.mo` compiler
    Native,
}

impl Toolchain {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gettext" => Ok(Self::Gettext),
            "native" => Ok(Self::Native),
            other => anyhow::bail!(
                "Invalid LOCALE_TOOLCHAIN: {}. Expected 'gettext' or 'native'",
                other
            ),
        }
    }
}

/// Access token for the translation service.
///
/// Never printed: `Debug` is redacted and callers only get the raw value
/// through `expose`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Source discovery
    pub repo_root: PathBuf,
    pub source_dirs: Vec<String>,
    pub source_extensions: Vec<String>,
    pub listing_file: PathBuf,

    // Catalog layout
    pub library_dir: PathBuf,
    pub domain: String,
    pub toolchain: Toolchain,

    // Crowdin
    pub crowdin_project: String,
    pub crowdin_file_name: String,
    pub crowdin_archive_prefix: String,
    pub crowdin_api_url: String,
    pub crowdin_download_url: String,
    pub api_key_file: Option<PathBuf>,

    // Network hardening
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let repo_root = PathBuf::from(var("LOCALE_REPO_ROOT", "."));

        let timeout_secs: u64 = var("HTTP_TIMEOUT_SECS", "60")
            .trim()
            .parse()
            .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?;
        if timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than zero");
        }

        let max_attempts: u32 = var("SYNC_MAX_ATTEMPTS", "3")
            .trim()
            .parse()
            .context("SYNC_MAX_ATTEMPTS must be a positive integer")?;
        if max_attempts == 0 {
            anyhow::bail!("SYNC_MAX_ATTEMPTS must be at least 1");
        }

        // Key file defaults to ~/.crowdin_api_key; without HOME there is no default
        let api_key_file = lookup("CROWDIN_API_KEY_FILE")
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").map(|home| Path::new(&home).join(".crowdin_api_key")));

        Ok(Self {
            listing_file: repo_root.join(var("LOCALE_LISTING_FILE", "app.fil")),
            library_dir: repo_root.join(var("LOCALE_LIBRARY_DIR", "lib")),
            source_dirs: split_list(&var("LOCALE_SOURCE_DIRS", "gui,plugins,lib")),
            source_extensions: split_list(&var("LOCALE_SOURCE_EXTENSIONS", "py,kv"))
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
            repo_root,

            domain: var("LOCALE_DOMAIN", "electrum"),
            toolchain: Toolchain::parse(&var("LOCALE_TOOLCHAIN", "gettext"))?,

            crowdin_project: var("CROWDIN_PROJECT", "electrum"),
            crowdin_file_name: var("CROWDIN_FILE_NAME", "electrum-client/messages.pot"),
            crowdin_archive_prefix: var("CROWDIN_ARCHIVE_PREFIX", "electrum-client/locale/"),
            crowdin_api_url: var("CROWDIN_API_URL", "https://api.crowdin.com/api/project")
                .trim_end_matches('/')
                .to_string(),
            crowdin_download_url: var(
                "CROWDIN_DOWNLOAD_URL",
                "https://crowdin.com/backend/download/project",
            )
            .trim_end_matches('/')
            .to_string(),
            api_key_file,

            http_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy::for_attempts(max_attempts),
        })
    }

    /// Directory holding the template and every locale bundle
    pub fn locale_dir(&self) -> PathBuf {
        self.library_dir.join("locale")
    }
}

/// Split a comma-separated list, dropping blanks
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read the single-line token file. A missing file is not an error.
pub fn read_key_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read key file {}", path.display())),
    }
}

/// Pick the credential: environment first, then the key file, else none.
///
/// Blank values count as absent so an empty variable does not mask the file.
pub fn resolve_credential(env_token: Option<String>, file_token: Option<String>) -> Option<Credential> {
    let clean = |token: Option<String>| {
        token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    };

    clean(env_token).or_else(|| clean(file_token)).map(Credential)
}

/// Resolve the credential from the process environment and the configured key file.
///
/// An unreadable key file is logged and treated as absent.
pub fn load_credential(config: &Config) -> Option<Credential> {
    let file_token = match &config.api_key_file {
        Some(path) => read_key_file(path).unwrap_or_else(|e| {
            warn!("Ignoring Crowdin key file: {:#}", e);
            None
        }),
        None => None,
    };

    resolve_credential(std::env::var("CROWDIN_API_KEY").ok(), file_token)
}
