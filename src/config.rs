//! Run settings, read from the environment (optionally seeded from a `.env` file).

use std::fmt;
use std::path::PathBuf;

const DEFAULT_DB_USER: &str = "PSNavigator";
const DEFAULT_SFTP_PORT: u16 = 22;
const DEFAULT_REMOTE_DIR: &str = "/sftp/studyhalls/";
const DEFAULT_KNOWN_HOSTS: &str = "known_hosts";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub user: String,
    pub password: String,
    /// `host:port/database`, or a full `postgres://` URL.
    pub connection: String,
}

impl DatabaseSettings {
    pub fn url(&self) -> String {
        if self.connection.contains("://") {
            self.connection.clone()
        } else {
            format!("postgres://{}", self.connection)
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connection", &self.connection)
            .finish()
    }
}

#[derive(Clone)]
pub struct SftpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub remote_dir: String,
    pub known_hosts: PathBuf,
}

impl fmt::Debug for SftpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("remote_dir", &self.remote_dir)
            .field("known_hosts", &self.known_hosts)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    /// `None` when the upload is skipped for this run.
    pub sftp: Option<SftpSettings>,
}

impl Settings {
    pub fn from_env(upload: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), upload)
    }

    pub fn from_lookup<F>(lookup: F, upload: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let database = DatabaseSettings {
            user: value("POWERSCHOOL_DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: required("POWERSCHOOL_DB_PASSWORD")?,
            connection: required("POWERSCHOOL_PROD_DB")?,
        };

        let sftp = if upload {
            let (host, port) = split_host_port(&required("D118_SFTP_ADDRESS")?)?;
            Some(SftpSettings {
                host,
                port,
                user: required("D118_SFTP_USERNAME")?,
                password: required("D118_SFTP_PASSWORD")?,
                remote_dir: value("STUDYHALL_SFTP_DIR")
                    .unwrap_or_else(|| DEFAULT_REMOTE_DIR.to_string()),
                known_hosts: value("STUDYHALL_KNOWN_HOSTS")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWN_HOSTS)),
            })
        } else {
            None
        };

        Ok(Self { database, sftp })
    }
}

fn split_host_port(address: &str) -> Result<(String, u16), ConfigError> {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "D118_SFTP_ADDRESS",
                reason: format!("`{port}` is not a port number"),
            })?;
            Ok((host.to_string(), port))
        }
        _ => Ok((address.to_string(), DEFAULT_SFTP_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const DB_ONLY: &[(&str, &str)] = &[
        ("POWERSCHOOL_DB_PASSWORD", "hunter2"),
        ("POWERSCHOOL_PROD_DB", "10.0.0.5:5432/psprod"),
    ];

    #[test]
    fn database_defaults_apply() {
        let settings = Settings::from_lookup(env(DB_ONLY), false).unwrap();
        assert_eq!(settings.database.user, "PSNavigator");
        assert_eq!(settings.database.url(), "postgres://10.0.0.5:5432/psprod");
        assert!(settings.sftp.is_none());
    }

    #[test]
    fn full_url_is_used_as_is() {
        let settings = Settings::from_lookup(
            env(&[
                ("POWERSCHOOL_DB_USER", "reporter"),
                ("POWERSCHOOL_DB_PASSWORD", "pw"),
                ("POWERSCHOOL_PROD_DB", "postgres://mirror.internal/ps"),
            ]),
            false,
        )
        .unwrap();
        assert_eq!(settings.database.user, "reporter");
        assert_eq!(settings.database.url(), "postgres://mirror.internal/ps");
    }

    #[test]
    fn missing_password_is_reported() {
        let err = Settings::from_lookup(env(&[("POWERSCHOOL_PROD_DB", "db/ps")]), false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("POWERSCHOOL_DB_PASSWORD")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = Settings::from_lookup(
            env(&[("POWERSCHOOL_DB_PASSWORD", "   "), ("POWERSCHOOL_PROD_DB", "db/ps")]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("POWERSCHOOL_DB_PASSWORD")));
    }

    #[test]
    fn upload_requires_sftp_credentials() {
        let err = Settings::from_lookup(env(DB_ONLY), true).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("D118_SFTP_ADDRESS")));
    }

    #[test]
    fn sftp_settings_parse_host_and_port() {
        let mut pairs = DB_ONLY.to_vec();
        pairs.extend([
            ("D118_SFTP_ADDRESS", "sftp.d118.org:2222"),
            ("D118_SFTP_USERNAME", "studyhalls"),
            ("D118_SFTP_PASSWORD", "secret"),
        ]);
        let sftp = Settings::from_lookup(env(&pairs), true).unwrap().sftp.unwrap();
        assert_eq!(sftp.host, "sftp.d118.org");
        assert_eq!(sftp.port, 2222);
        assert_eq!(sftp.remote_dir, "/sftp/studyhalls/");
        assert_eq!(sftp.known_hosts, PathBuf::from("known_hosts"));
    }

    #[test]
    fn sftp_port_defaults_and_rejects_garbage() {
        assert_eq!(split_host_port("sftp.d118.org").unwrap(), ("sftp.d118.org".to_string(), 22));
        assert!(matches!(
            split_host_port("sftp.d118.org:ssh"),
            Err(ConfigError::Invalid { key: "D118_SFTP_ADDRESS", .. })
        ));
    }

    #[test]
    fn debug_output_hides_passwords() {
        let settings = Settings::from_lookup(env(DB_ONLY), false).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
