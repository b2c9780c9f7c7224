use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "shopfront-media";
const MEDIA_CONFIG_FILE: &str = "media.json";

pub const DEFAULT_MEDIA_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_MEDIA_DIR: &str = "/frontend/images/products/";
pub const DEFAULT_MAX_IMAGES: usize = 10;
pub const DEFAULT_VISIBLE_THUMBS: usize = 5;
pub const DEFAULT_PLACEHOLDER_ADDRESS: &str = "data:image/svg+xml;utf8,%3Csvg%20xmlns%3D%22http%3A%2F%2Fwww.w3.org%2F2000%2Fsvg%22%20width%3D%22100%22%20height%3D%22100%22%3E%3Crect%20width%3D%22100%25%22%20height%3D%22100%25%22%20fill%3D%22%23f0f0f0%22%2F%3E%3Ctext%20x%3D%2250%25%22%20y%3D%2250%25%22%20alignment-baseline%3D%22middle%22%20text-anchor%3D%22middle%22%20fill%3D%22%23bbb%22%20font-size%3D%2214%22%3ENo%20image%3C%2Ftext%3E%3C%2Fsvg%3E";

/// Media settings from `media.json`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub media_origin: String,
    pub default_media_dir: String,
    pub placeholder_address: String,
    pub max_images: usize,
    pub visible_thumbs: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_origin: DEFAULT_MEDIA_ORIGIN.to_string(),
            default_media_dir: DEFAULT_MEDIA_DIR.to_string(),
            placeholder_address: DEFAULT_PLACEHOLDER_ADDRESS.to_string(),
            max_images: DEFAULT_MAX_IMAGES,
            visible_thumbs: DEFAULT_VISIBLE_THUMBS,
        }
    }
}

impl MediaConfig {
    /// Defaults with the media origin taken from an API base such as
    /// `https://shop.example:8000/api`.
    pub fn from_api_base(api_base: &str) -> Self {
        let mut config = Self::default();
        if let Some(origin) = origin_of(api_base) {
            config.media_origin = origin;
        } else {
            tracing::warn!(api_base, "api base has no scheme; keeping default media origin");
        }
        config
    }
}

/// Scheme and authority of an absolute URL, without path, query or fragment.
fn origin_of(url: &str) -> Option<String> {
    let url = url.trim();
    let (scheme, rest) = url.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .filter(|authority| !authority.is_empty())?;
    Some(format!("{scheme}://{authority}"))
}

pub fn load_media_config() -> MediaConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_media_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_media_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> MediaConfig {
    let path = match app_config_path(APP_DIR, MEDIA_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return MediaConfig::default(),
    };
    if !path.exists() {
        return MediaConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse media.json; using defaults");
            MediaConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read media.json; using defaults");
            MediaConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
