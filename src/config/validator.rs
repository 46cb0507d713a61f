//! Configuration validation for resolved deployment settings.
//!
//! This module checks a resolved [`FabricConfig`] for values that would only
//! fail later, deep inside a stack creation, and reports them up front.

use crate::error::{ConfigError, Result, StackfabError};
use reqwest::Url;
use tracing::debug;

use super::parser::HEAT_API_VERSION_VAR;
use super::spec::{DEFAULT_HEAT_API_VERSION, DatacenterConfig, DeploySettings, FabricConfig};

/// Validator for resolved configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &FabricConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        let prefix = format!("{}.{}", config.provider, config.dc);

        Self::validate_datacenter(&config.datacenter, &prefix, &mut result);
        Self::validate_deploy(&config.deploy, &config.provider, &mut result);
        Self::validate_heat_version(config, &prefix, &mut result);

        if config.zone.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{}.params.zone", config.provider),
                message: String::from("Availability zone cannot be empty"),
            });
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(StackfabError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    /// Validates datacenter networking and endpoints.
    fn validate_datacenter(dc: &DatacenterConfig, prefix: &str, result: &mut ValidationResult) {
        if dc.network.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.network"),
                message: String::from("Management network id cannot be empty"),
            });
        }

        match dc.extnet.as_deref() {
            None | Some("") => result.warnings.push(format!(
                "{prefix}.extnet: No external network configured; floating IP allocation will fail"
            )),
            Some(_) => {}
        }

        for (name, value) in [
            ("keystone", &dc.keystone),
            ("neutron", &dc.neutron),
            ("heat", &dc.heat),
        ] {
            if let Err(message) = check_endpoint(value) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.{name}"),
                    message,
                });
            }
        }

        if dc.data_iface.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.data-iface"),
                message: String::from("Data interface name cannot be empty"),
            });
        }
    }

    /// Checks the requested Heat API version against the client and the
    /// configured endpoint.
    fn validate_heat_version(config: &FabricConfig, prefix: &str, result: &mut ValidationResult) {
        let version = &config.heat_api_version;
        if version != DEFAULT_HEAT_API_VERSION {
            result.errors.push(ValidationError {
                field: String::from(HEAT_API_VERSION_VAR),
                message: format!(
                    "Heat API version '{version}' is not supported; only '{DEFAULT_HEAT_API_VERSION}' is"
                ),
            });
            return;
        }

        let expected = format!("v{version}");
        let versioned = Url::parse(&config.datacenter.heat)
            .ok()
            .and_then(|url| url.path_segments().and_then(|mut s| s.next()).map(|s| s == expected));
        if versioned == Some(false) {
            result.warnings.push(format!(
                "{prefix}.heat: Endpoint path does not start with /{expected}"
            ));
        }
    }

    /// Validates instance defaults.
    fn validate_deploy(deploy: &DeploySettings, provider: &str, result: &mut ValidationResult) {
        let prefix = format!("{provider}.deploy");

        for (name, value) in [
            ("image", &deploy.image),
            ("personality", &deploy.personality),
            ("ssh", &deploy.ssh),
            ("ssh-user", &deploy.ssh_user),
            ("agent-command", &deploy.agent_command),
        ] {
            if value.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.{name}"),
                    message: format!("'{name}' cannot be empty"),
                });
            }
        }

        if !is_valid_name(&deploy.agent_user) {
            result.errors.push(ValidationError {
                field: format!("{prefix}.agent-user"),
                message: format!(
                    "Agent user '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    deploy.agent_user
                ),
            });
        }

        for (name, value) in [("data-device", &deploy.data_device), ("base-dir", &deploy.base_dir)] {
            if !value.starts_with('/') {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.{name}"),
                    message: format!("Path must be absolute: {value}"),
                });
            }
        }
    }
}

/// Checks that an endpoint is an absolute http(s) URL.
fn check_endpoint(value: &str) -> std::result::Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("Invalid endpoint URL '{value}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("Unsupported endpoint scheme '{other}' in '{value}'")),
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
