use std::env;

use crate::error::Result;
use crate::pager::BackPaging;

pub const DEFAULT_DATABASE_URL: &str = "./market.db";
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub back_paging: BackPaging,
}

impl Config {
    /// Read `DATABASE_URL`, `SERVER_ADDR` and `PAGER_BACK_PAGING`. Call
    /// `dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let back_paging = match lookup("PAGER_BACK_PAGING") {
            Some(mode) => mode.parse()?,
            None => BackPaging::default(),
        };
        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(DEFAULT_DATABASE_URL.to_string()),
            server_addr: lookup("SERVER_ADDR").unwrap_or(DEFAULT_SERVER_ADDR.to_string()),
            back_paging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.server_addr, DEFAULT_SERVER_ADDR);
        assert_eq!(config.back_paging, BackPaging::Replay);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_in(&[
            ("DATABASE_URL", ":memory:"),
            ("SERVER_ADDR", "0.0.0.0:9000"),
            ("PAGER_BACK_PAGING", "restore"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, ":memory:");
        assert_eq!(config.server_addr, "0.0.0.0:9000");
        assert_eq!(config.back_paging, BackPaging::Restore);
    }

    #[test]
    fn test_bad_back_paging_is_rejected() {
        assert!(Config::from_lookup(lookup_in(&[("PAGER_BACK_PAGING", "both")])).is_err());
    }
}
