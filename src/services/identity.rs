//! Player identity and locale
//!
//! URL query parameters win over stored values; a URL value is written back to
//! storage so it sticks for later visits.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use crate::error::ArcadeError;
use crate::error::Result;

pub const DEFAULT_NICKNAME: &str = "NONAME";
pub const DEFAULT_LOCALE: &str = "en";

/// Which audience the page was opened for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Flavor {
    #[default]
    Idol,
    Celeb,
    Other(String),
}

impl Flavor {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "idol" => Flavor::Idol,
            "celeb" => Flavor::Celeb,
            _ => Flavor::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Flavor::Idol => "idol",
            Flavor::Celeb => "celeb",
            Flavor::Other(s) => s,
        }
    }
}

/// Map loose locale codes onto the ones the string tables use
pub fn normalize_locale(raw: &str) -> String {
    match raw {
        "zh-cn" => "zh-CN".to_string(),
        "zh-tw" => "zh-TW".to_string(),
        "jp" => "ja".to_string(),
        other => other.to_string(),
    }
}

/// String key/value persistence (LocalStorage in the browser)
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<RefCell<T>> {
    fn get(&self, key: &str) -> Option<String> {
        self.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.borrow_mut().set(key, value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Browser LocalStorage
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct LocalStore;

#[cfg(target_arch = "wasm32")]
impl LocalStore {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let storage = Self::storage()
            .ok_or_else(|| ArcadeError::Storage("localStorage unavailable".to_string()))?;
        storage
            .set_item(key, value)
            .map_err(|e| ArcadeError::Storage(format!("saving {}: {:?}", key, e)))
    }
}

/// Decoded `?a=b&c=d` query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

impl QueryParams {
    /// Parse a query string with or without the leading `?`.
    /// Handles `+` and `%XX` escapes; the first occurrence of a key wins.
    pub fn parse(query: &str) -> Self {
        let mut values = HashMap::new();
        for pair in query.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            values.entry(percent_decode(k)).or_insert_with(|| percent_decode(v));
        }
        Self { values }
    }

    /// Non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]));
                match hex {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Resolved identity for one page load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub nickname: String,
    pub flavor: Flavor,
    pub locale: String,
    /// Attached to GAME_END for the native app (URL only, never stored)
    pub log_heart_id: Option<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            nickname: DEFAULT_NICKNAME.to_string(),
            flavor: Flavor::default(),
            locale: DEFAULT_LOCALE.to_string(),
            log_heart_id: None,
        }
    }
}

fn url_or_stored(
    params: &QueryParams,
    store: &mut dyn KeyValueStore,
    key: &str,
    normalize: impl Fn(&str) -> String,
) -> Option<String> {
    if let Some(v) = params.get(key) {
        let v = normalize(v);
        if let Err(e) = store.set(key, &v) {
            log::warn!("{} not remembered: {}", key, e);
        }
        return Some(v);
    }
    store.get(key).filter(|v| !v.is_empty())
}

impl Identity {
    pub fn resolve(params: &QueryParams, store: &mut dyn KeyValueStore) -> Self {
        let nickname = url_or_stored(params, store, "nickname", |s| s.to_string())
            .unwrap_or_else(|| DEFAULT_NICKNAME.to_string());
        let flavor = url_or_stored(params, store, "flavor", |s| s.to_string())
            .map(|f| Flavor::parse(&f))
            .unwrap_or_default();
        let locale = url_or_stored(params, store, "locale", normalize_locale)
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let log_heart_id = params.get("log_heart_id").map(str::to_string);

        Self {
            nickname,
            flavor,
            locale,
            log_heart_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let mut store = MemoryStore::default();
        let id = Identity::resolve(&QueryParams::parse(""), &mut store);
        assert_eq!(id, Identity::default());
        assert_eq!(id.nickname, "NONAME");
        assert_eq!(id.flavor, Flavor::Idol);
        assert_eq!(id.locale, "en");
    }

    #[test]
    fn test_url_wins_and_persists() {
        let mut store = MemoryStore::default();
        store.set("nickname", "OLD").unwrap();
        let params = QueryParams::parse("?nickname=New%20Kid&locale=zh-cn&flavor=celeb&log_heart_id=77");
        let id = Identity::resolve(&params, &mut store);

        assert_eq!(id.nickname, "New Kid");
        assert_eq!(id.locale, "zh-CN");
        assert_eq!(id.flavor, Flavor::Celeb);
        assert_eq!(id.log_heart_id.as_deref(), Some("77"));
        assert_eq!(store.get("nickname").as_deref(), Some("New Kid"));
        assert_eq!(store.get("locale").as_deref(), Some("zh-CN"));
        assert_eq!(store.get("log_heart_id"), None);
    }

    /// Store that refuses every write
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<()> {
            Err(crate::error::ArcadeError::Storage(format!("{} is read-only", key)))
        }
    }

    #[test]
    fn test_url_value_used_when_store_refuses() {
        let id = Identity::resolve(&QueryParams::parse("?nickname=Bo&locale=ja"), &mut ReadOnlyStore);
        assert_eq!(id.nickname, "Bo");
        assert_eq!(id.locale, "ja");
    }

    #[test]
    fn test_stored_used_without_url() {
        let mut store = MemoryStore::default();
        store.set("locale", "ko").unwrap();
        store.set("nickname", "ANN").unwrap();
        let id = Identity::resolve(&QueryParams::parse("?game=runner"), &mut store);
        assert_eq!(id.locale, "ko");
        assert_eq!(id.nickname, "ANN");
    }

    #[test]
    fn test_locale_aliases() {
        assert_eq!(normalize_locale("zh-tw"), "zh-TW");
        assert_eq!(normalize_locale("jp"), "ja");
        assert_eq!(normalize_locale("ko"), "ko");
    }

    #[test]
    fn test_query_decoding() {
        let q = QueryParams::parse("a=1+2&b=%41%42&c=&d=100%");
        assert_eq!(q.get("a"), Some("1 2"));
        assert_eq!(q.get("b"), Some("AB"));
        assert_eq!(q.get("c"), None);
        assert_eq!(q.get("d"), Some("100%"));
    }
}
