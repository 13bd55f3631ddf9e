use std::{env, fmt, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Hosted backend: PostgREST under `/rest/v1`, identity under `/auth/v1`.
    Remote { url: String, anon_key: String },
    /// Everything kept in process; data is lost on exit.
    Memory { confirm_email: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub backend: Backend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);
        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/preferences.json"));

        let backend = match lookup("CHECKAPP_BACKEND").as_deref() {
            None | Some("remote") => {
                let url = lookup("SUPABASE_URL")
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| ConfigError("SUPABASE_URL is not set".into()))?;
                let anon_key = lookup("SUPABASE_ANON_KEY")
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| ConfigError("SUPABASE_ANON_KEY is not set".into()))?;
                Backend::Remote { url, anon_key }
            }
            Some("memory") => Backend::Memory {
                confirm_email: lookup("CHECKAPP_CONFIRM_EMAIL").as_deref() == Some("1"),
            },
            Some(other) => {
                return Err(ConfigError(format!(
                    "CHECKAPP_BACKEND must be 'remote' or 'memory', got '{other}'"
                )));
            }
        };

        Ok(Self {
            port,
            data_path,
            backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn memory_backend_with_defaults() {
        let config = config(&[("CHECKAPP_BACKEND", "memory")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_path, PathBuf::from("data/preferences.json"));
        assert_eq!(config.backend, Backend::Memory { confirm_email: false });
    }

    #[test]
    fn remote_backend_requires_credentials() {
        assert!(config(&[]).is_err());
        assert!(config(&[("SUPABASE_URL", "https://x.supabase.co")]).is_err());

        let config = config(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_ANON_KEY", "key"),
            ("PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(matches!(config.backend, Backend::Remote { .. }));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(config(&[("CHECKAPP_BACKEND", "sqlite")]).is_err());
    }
}
