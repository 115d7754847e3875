//! Loading of sector files from the backing store.
//!
//! [`FileProvider`] is the seam between the sector repository and wherever the
//! bytes live. [`AssetFileProvider`] reads from disk natively and over HTTP on
//! the web; [`CachedFileProvider`] puts a [`cache::ResponseCache`] in front of
//! any provider.

use std::{cell::RefCell, path::PathBuf};

use anyhow::Context as _;

use crate::resources::cache::ResponseCache;

pub mod cache;

/// Fetches whole files relative to a model's base url.
#[allow(async_fn_in_trait)]
pub trait FileProvider {
    async fn get_binary_file(&self, base_url: &str, file_name: &str) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileProviderConfig {
    /// Native only: directory that model base urls are resolved against.
    pub asset_root: PathBuf,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("./assets"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetFileProvider {
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    config: FileProviderConfig,
}

impl AssetFileProvider {
    pub fn new(config: FileProviderConfig) -> Self {
        Self { config }
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(base_url: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|err| anyhow::anyhow!("could not read page origin: {:?}", err))?;
    let base = reqwest::Url::parse(&format!("{}/", origin))?;
    let model = base.join(&format!("{}/", base_url.trim_end_matches('/')))?;
    Ok(model.join(file_name)?)
}

impl FileProvider for AssetFileProvider {
    async fn get_binary_file(&self, base_url: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = format_url(base_url, file_name)?;
            reqwest::get(url.clone())
                .await
                .and_then(|response| response.error_for_status())
                .with_context(|| format!("fetching {url}"))?
                .bytes()
                .await?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = self.config.asset_root.join(base_url).join(file_name);
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?
        };

        Ok(data)
    }
}

/// Serves files from a response cache and fills it on misses.
#[derive(Debug)]
pub struct CachedFileProvider<P, C> {
    provider: P,
    cache: RefCell<C>,
}

impl<P: FileProvider, C: ResponseCache> CachedFileProvider<P, C> {
    pub fn new(provider: P, cache: C) -> Self {
        Self {
            provider,
            cache: RefCell::new(cache),
        }
    }

    pub fn cache(&self) -> std::cell::Ref<'_, C> {
        self.cache.borrow()
    }

    fn key(base_url: &str, file_name: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), file_name)
    }
}

impl<P: FileProvider, C: ResponseCache> FileProvider for CachedFileProvider<P, C> {
    async fn get_binary_file(&self, base_url: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
        let key = Self::key(base_url, file_name);
        if let Some(payload) = self.cache.borrow_mut().match_key(&key) {
            return Ok(payload);
        }
        let payload = self.provider.get_binary_file(base_url, file_name).await?;
        self.cache.borrow_mut().put(&key, payload.clone());
        Ok(payload)
    }
}
