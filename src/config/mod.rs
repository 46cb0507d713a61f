//! Configuration module for stackfab.
//!
//! This module handles all configuration-related functionality:
//! - Parsing the YAML deployment file and selecting provider/datacenter sections
//! - Environment overrides and cloud credentials
//! - Validation of resolved values

mod spec;
pub(crate) mod parser;
mod validator;

pub use spec::{
    Credentials, DatacenterConfig, DeployFile, DeploySettings, FabricConfig, ProviderParams,
    ProviderSection, SystemConfig,
};
pub use parser::{ConfigParser, find_config_file};
pub use validator::{ConfigValidator, ValidationResult};
