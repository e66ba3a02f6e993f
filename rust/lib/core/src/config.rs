use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ServiceError;
use crate::auth::{Administrator, Principal};

/// Configuration shared by the registry and the ledger.
///
/// Built from command-line style flags or a TOML file, then handed to
/// module construction. Read-only afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Directory holding the database file.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb database file.
    /// Defaults to `{data_dir}/custody.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Identity allowed to approve and revoke manufacturers.
    pub admin: Option<String>,

    /// Reject batch registration unless the referenced manufacturer exists
    /// and is approved.
    pub verify_manufacturer: bool,

    /// Let the administrator recall a batch it does not hold.
    pub admin_recall: bool,
}

impl ServiceConfig {
    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--db=PATH`
    /// - `--admin=IDENTITY`
    /// - `--verify-manufacturer`
    /// - `--admin-recall`
    pub fn from_args(args: &[String]) -> Self {
        let mut config = ServiceConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                config.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--db=") {
                config.db_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--admin=") {
                config.admin = Some(val.to_string());
            } else if arg == "--verify-manufacturer" {
                config.verify_manufacturer = true;
            } else if arg == "--admin-recall" {
                config.admin_recall = true;
            }
        }

        config
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Internal(format!("read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ServiceError::Internal(format!("parse config {}: {}", path.display(), e))
        })
    }

    /// Resolve the redb database path, falling back to `{data_dir}/custody.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            self.data_dir
                .as_ref()
                .map(|d| d.join("custody.redb"))
                .unwrap_or_else(|| PathBuf::from("custody.redb"))
        })
    }

    /// The configured administrator. Fails if none (or an empty one) is set.
    pub fn administrator(&self) -> Result<Administrator, ServiceError> {
        match self.admin.as_deref() {
            Some(id) if !id.is_empty() => Ok(Administrator::new(Principal::from(id))),
            _ => Err(ServiceError::Internal(
                "administrator identity not configured".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let args = vec![
            "--data-dir=/tmp/custody".to_string(),
            "--admin=SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string(),
            "--admin-recall".to_string(),
        ];
        let config = ServiceConfig::from_args(&args);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/custody")));
        assert_eq!(
            config.admin.as_deref(),
            Some("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7")
        );
        assert!(config.admin_recall);
        assert!(!config.verify_manufacturer);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert_eq!(config.resolve_db_path(), PathBuf::from("/data/custody.redb"));

        let config = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            db_path: Some(PathBuf::from("/elsewhere/ledger.redb")),
            ..Default::default()
        };
        assert_eq!(config.resolve_db_path(), PathBuf::from("/elsewhere/ledger.redb"));
    }

    #[test]
    fn missing_admin_is_an_error() {
        let err = ServiceConfig::default().administrator().unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        let config = ServiceConfig {
            admin: Some(String::new()),
            ..Default::default()
        };
        assert!(config.administrator().is_err());
    }

    #[test]
    fn load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custody.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/custody\"\nadmin = \"root\"\nverify_manufacturer = true\n",
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/custody")));
        assert!(config.verify_manufacturer);
        assert!(!config.admin_recall);
        assert_eq!(config.administrator().unwrap().principal().as_str(), "root");
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "listen = \"0.0.0.0:8080\"\n").unwrap();
        assert!(ServiceConfig::load(&path).is_err());
    }
}
