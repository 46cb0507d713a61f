//! Configuration parser for loading the deployment file.
//!
//! This module loads the YAML deployment file, selects the active provider
//! and datacenter sections, and layers environment overrides and credentials
//! on top.

use crate::error::{ConfigError, Result, StackfabError};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

use super::spec::{
    Credentials, DatacenterConfig, DeployFile, FabricConfig, ProviderSection,
    DEFAULT_HEAT_API_VERSION,
};

/// Environment variable overriding the Heat endpoint.
pub const HEAT_URL_VAR: &str = "HEAT_URL";

/// Environment variable selecting the Heat API version.
pub const HEAT_API_VERSION_VAR: &str = "HEAT_API_VERSION";

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a deployment file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployFile> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(StackfabError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackfabError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a deployment file from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployFile> {
        debug!("Parsing YAML configuration");

        let file: DeployFile = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StackfabError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for provider: {}", file.system.provider);
        Ok(file)
    }

    /// Loads and resolves the configuration against the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is invalid or a required variable is missing.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<FabricConfig> {
        let file = self.load_file(path)?;
        Self::resolve(&file, |key| std::env::var(key).ok())
    }

    /// Resolves the active provider and datacenter, applying overrides and
    /// credentials from `env`.
    ///
    /// # Errors
    ///
    /// Returns an error if a section is missing or malformed, or a required
    /// variable is missing.
    pub fn resolve<F>(file: &DeployFile, env: F) -> Result<FabricConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = file.system.provider.clone();
        let section: ProviderSection = Self::section(&file.sections, &provider, &provider)?;

        let dc = section.params.dc.clone();
        let mut datacenter: DatacenterConfig =
            Self::section(&section.datacenters, &dc, &format!("{provider}.{dc}"))?;

        if let Some(heat) = env(HEAT_URL_VAR) {
            debug!("Overriding heat endpoint from environment");
            datacenter.heat = heat;
        }

        let heat_api_version =
            env(HEAT_API_VERSION_VAR).unwrap_or_else(|| String::from(DEFAULT_HEAT_API_VERSION));

        let credentials = Self::credentials(&env)?;

        Ok(FabricConfig {
            provider,
            dc,
            zone: section.params.zone,
            datacenter,
            deploy: section.deploy,
            heat_api_version,
            credentials,
        })
    }

    /// Deserializes a named raw section.
    fn section<T: DeserializeOwned>(
        sections: &std::collections::BTreeMap<String, serde_yaml::Value>,
        key: &str,
        path: &str,
    ) -> Result<T> {
        let raw = sections
            .get(key)
            .ok_or_else(|| StackfabError::Config(ConfigError::missing_section(path)))?;

        serde_yaml::from_value(raw.clone()).map_err(|e| {
            StackfabError::Config(ConfigError::ParseError {
                message: format!("Invalid section '{path}': {e}"),
                location: None,
            })
        })
    }

    /// Reads cloud credentials.
    fn credentials<F>(env: &F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            env(name).ok_or_else(|| {
                StackfabError::Config(ConfigError::MissingEnvVar {
                    name: name.to_string(),
                })
            })
        };

        Ok(Credentials {
            username: required("OS_USERNAME")?,
            password: required("OS_PASSWORD")?,
            tenant_id: required("OS_TENANT_ID")?,
            tenant_name: required("OS_TENANT_NAME")?,
            token: env("OS_TOKEN").filter(|t| !t.is_empty()),
        })
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StackfabError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "stackfab.yaml",
    "stackfab.yml",
    "openstack.yaml",
    "openstack.yml",
];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StackfabError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) const SAMPLE: &str = r"
system:
  provider: hpcloud
docker:
  registry: localhost:5000
hpcloud:
  params:
    dc: region-b
    zone: az2
  region-b:
    network: net-manage
    extnet: net-external
    keystone: https://identity.example.com/v3
    neutron: https://network.example.com
    heat: https://orchestration.example.com/v1/t-1
  deploy:
    image: stackfab-base
    image-volume: vol-123
    personality: standard.small
    ssh: stackfab-key
    ssh-user: ubuntu
";

    fn env_with(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = [
            ("OS_USERNAME", "admin"),
            ("OS_PASSWORD", "secret"),
            ("OS_TENANT_ID", "t-1"),
            ("OS_TENANT_NAME", "demo"),
        ]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
        for (k, v) in extra {
            env.insert((*k).to_string(), (*v).to_string());
        }
        env
    }

    #[test]
    fn test_resolve_provider_and_datacenter() {
        let file = ConfigParser::new().parse_yaml(SAMPLE, None).unwrap();
        let env = env_with(&[]);
        let config = ConfigParser::resolve(&file, |k| env.get(k).cloned()).unwrap();

        assert_eq!(config.provider, "hpcloud");
        assert_eq!(config.dc, "region-b");
        assert_eq!(config.zone, "az2");
        assert_eq!(config.manage_network(), "net-manage");
        assert_eq!(config.external_network(), Some("net-external"));
        assert_eq!(config.deploy.ssh_user, "ubuntu");
        assert_eq!(config.deploy.agent_user, "stackfab");
        assert_eq!(config.heat_api_version, "1");
        assert!(config.credentials.token.is_none());
    }

    #[test]
    fn test_heat_overrides_from_env() {
        let file = ConfigParser::new().parse_yaml(SAMPLE, None).unwrap();
        let env = env_with(&[
            ("HEAT_URL", "http://127.0.0.1:8004/v1/t-1"),
            ("HEAT_API_VERSION", "2"),
            ("OS_TOKEN", "tok"),
        ]);
        let config = ConfigParser::resolve(&file, |k| env.get(k).cloned()).unwrap();

        assert_eq!(config.datacenter.heat, "http://127.0.0.1:8004/v1/t-1");
        assert_eq!(config.heat_api_version, "2");
        assert_eq!(config.credentials.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_missing_credentials() {
        let file = ConfigParser::new().parse_yaml(SAMPLE, None).unwrap();
        let mut env = env_with(&[]);
        env.remove("OS_PASSWORD");

        let err = ConfigParser::resolve(&file, |k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Config(ConfigError::MissingEnvVar { ref name }) if name == "OS_PASSWORD"
        ));
    }

    #[test]
    fn test_missing_provider_section() {
        let yaml = "system:\n  provider: nowhere\n";
        let file = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        let env = env_with(&[]);

        let err = ConfigParser::resolve(&file, |k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Config(ConfigError::MissingSection { ref section }) if section == "nowhere"
        ));
    }

    #[test]
    fn test_missing_datacenter_section() {
        let yaml = SAMPLE.replace("dc: region-b", "dc: region-z");
        let file = ConfigParser::new().parse_yaml(&yaml, None).unwrap();
        let env = env_with(&[]);

        let err = ConfigParser::resolve(&file, |k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Config(ConfigError::MissingSection { ref section }) if section == "hpcloud.region-z"
        ));
    }
}
