//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `quarry.toml` + `quarry.<env>.toml` + `QUARRY_*` env vars
//! (`QUARRY_SEARCH__PATH` sets `search.path`).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("quarry.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("quarry.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("quarry.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("quarry.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("QUARRY_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    /// The `[search]` section; every key is optional except `path`.
    pub fn backend_settings(&self) -> Result<BackendSettings> {
        if !self.figment.contains("search") {
            return Ok(BackendSettings::default());
        }
        self.get("search")
    }
}

/// Settings for one search backend.
///
/// - `path`: directory holding the store (required, `~` and `$VAR` are expanded)
/// - `stemming_language`: Snowball language name, or `none`
/// - `include_spelling`: compute spelling suggestions for free-text queries
/// - `writer_heap_size`: indexing memory budget in bytes
/// - `lock_retries`/`lock_backoff_ms`: attempts to take the writer lock, and the first delay (doubled each time)
/// - `max_results`: cap on matches that are sorted and faceted per search
/// - `silently_fail`: "more like this" on an unregistered kind returns nothing instead of failing
/// - `highlight_tag`: element name wrapped around highlighted terms
/// - `mlt_max_terms`: expansion terms used by "more like this"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub path: Option<String>,
    pub stemming_language: String,
    pub include_spelling: bool,
    pub writer_heap_size: usize,
    pub lock_retries: u32,
    pub lock_backoff_ms: u64,
    pub max_results: usize,
    pub silently_fail: bool,
    pub highlight_tag: String,
    pub mlt_max_terms: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            path: None,
            stemming_language: "english".to_string(),
            include_spelling: false,
            writer_heap_size: 50_000_000,
            lock_retries: 5,
            lock_backoff_ms: 50,
            max_results: 100_000,
            silently_fail: true,
            highlight_tag: "em".to_string(),
            mlt_max_terms: 40,
        }
    }
}

impl BackendSettings {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self { path: Some(path.as_ref().to_string_lossy().into_owned()), ..Self::default() }
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match self.path.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Ok(expand_path(p)),
            _ => Err(Error::Configuration("search.path is not set".into())),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
