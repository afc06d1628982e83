use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Secrets shipped in sample `.env` files. Signing with one of these is as
/// good as signing with nothing.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "changeme",
    "secret",
    "your-secret-here",
    "dev-secret-change-me",
];

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database: DatabaseLocation,
    pub jwt_secret: String,
    pub static_dir: PathBuf,
    pub request_timeout: Duration,
    pub seed_path: Option<PathBuf>,
    pub author_signup_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let port: u16 = required("PORT")?
            .trim()
            .parse()
            .context("PORT must be a port number")?;
        let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let database = parse_database_url(&required("DATABASE_URL")?)?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;
                if secs == 0 {
                    bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let author_signup_enabled = match var("AUTHOR_SIGNUP_ENABLED").as_deref().map(str::trim) {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => bail!("AUTHOR_SIGNUP_ENABLED must be true or false, got {other:?}"),
        };

        Ok(Self {
            addr,
            database,
            jwt_secret,
            static_dir: var("STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.into())
                .into(),
            request_timeout,
            seed_path: var("SEED_PATH").filter(|p| !p.trim().is_empty()).map(PathBuf::from),
            author_signup_enabled,
        })
    }
}

fn parse_database_url(raw: &str) -> Result<DatabaseLocation> {
    let path = raw.trim();
    let path = path.strip_prefix("sqlite://").or_else(|| path.strip_prefix("sqlite:")).unwrap_or(path);
    match path {
        "" => bail!("DATABASE_URL has no path"),
        ":memory:" => Ok(DatabaseLocation::Memory),
        file => Ok(DatabaseLocation::File(PathBuf::from(file))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("PORT", "8080"),
        ("DATABASE_URL", "sqlite://data/puzzles.db"),
        ("JWT_SECRET", "a-long-random-value"),
    ];

    #[test]
    fn minimal_env_uses_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.database, DatabaseLocation::File("data/puzzles.db".into()));
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.seed_path.is_none());
        assert!(!config.author_signup_enabled);
    }

    #[test]
    fn each_required_variable_is_enforced() {
        for missing in ["PORT", "DATABASE_URL", "JWT_SECRET"] {
            let pairs: Vec<_> = MINIMAL.iter().copied().filter(|(k, _)| *k != missing).collect();
            let err = parse(&pairs).unwrap_err();
            assert!(err.to_string().contains(missing), "{missing}: {err}");
        }
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        for secret in ["dev-secret-change-me", "   "] {
            let mut pairs = MINIMAL.to_vec();
            pairs[2] = ("JWT_SECRET", secret);
            assert!(parse(&pairs).is_err(), "{secret:?} accepted");
        }
    }

    #[test]
    fn database_url_forms() {
        assert_eq!(parse_database_url(":memory:").unwrap(), DatabaseLocation::Memory);
        assert_eq!(parse_database_url("sqlite::memory:").unwrap(), DatabaseLocation::Memory);
        assert_eq!(
            parse_database_url("sqlite://puzzles.db").unwrap(),
            DatabaseLocation::File("puzzles.db".into())
        );
        assert_eq!(
            parse_database_url("/var/lib/puzzles.db").unwrap(),
            DatabaseLocation::File("/var/lib/puzzles.db".into())
        );
        assert!(parse_database_url("sqlite://").is_err());
    }

    #[test]
    fn optional_overrides() {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend([
            ("HOST", "127.0.0.1"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("SEED_PATH", "seed.json"),
            ("AUTHOR_SIGNUP_ENABLED", "true"),
        ]);
        let config = parse(&pairs).unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.seed_path, Some(PathBuf::from("seed.json")));
        assert!(config.author_signup_enabled);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("REQUEST_TIMEOUT_SECS", "0"));
        assert!(parse(&pairs).is_err());

        let mut pairs = MINIMAL.to_vec();
        pairs[0] = ("PORT", "http");
        assert!(parse(&pairs).is_err());
    }
}
