//! Module parameters
//!
//! Typed arguments for each module, the task file that bundles them with
//! connection settings, and their conversion into a [`DesiredState`].

use crate::domain::ports::{DesiredState, State};
use crate::error::{Error, Result};
use crate::objects::ObjectType;
use crate::transport::ConnectionConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Arguments of the ipspace module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IpspaceParams {
    /// Name of the ipspace to manage
    pub name: String,
    /// Name of an existing ipspace to rename to `name`
    #[serde(default)]
    pub from_name: Option<String>,
    /// Whether the ipspace should exist
    #[serde(default)]
    pub state: State,
}

/// AutoSupport collection type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AutosupportType {
    Test,
    Performance,
    #[default]
    All,
}

impl std::fmt::Display for AutosupportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutosupportType::Test => write!(f, "test"),
            AutosupportType::Performance => write!(f, "performance"),
            AutosupportType::All => write!(f, "all"),
        }
    }
}

/// Arguments of the autosupport invoke module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AutosupportInvokeParams {
    /// Node to send the message from; all nodes when omitted
    #[serde(default)]
    pub name: Option<String>,
    /// Subject line of the message
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: AutosupportType,
    /// Destination overriding the configured one
    #[serde(default)]
    pub uri: Option<String>,
}

/// Arguments of one module run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleParams {
    Ipspace(IpspaceParams),
    AutosupportInvoke(AutosupportInvokeParams),
}

impl ModuleParams {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ModuleParams::Ipspace(_) => ObjectType::Ipspace,
            ModuleParams::AutosupportInvoke(_) => ObjectType::AutosupportMessage,
        }
    }

    /// Validate and convert into the declared target state
    pub fn desired_state(&self) -> Result<DesiredState> {
        match self {
            ModuleParams::Ipspace(params) => {
                if params.name.trim().is_empty() {
                    return Err(Error::Validation("ipspace name must not be empty".into()));
                }
                if params.from_name.as_deref().map(str::trim) == Some("") {
                    return Err(Error::Validation("from_name must not be empty".into()));
                }
                let mut desired = DesiredState::new(params.name.clone()).with_state(params.state);
                desired.from_name = params.from_name.clone();
                Ok(desired)
            }
            ModuleParams::AutosupportInvoke(params) => {
                let mut desired = DesiredState::new(params.name.clone().unwrap_or_default())
                    .with_attribute("type", params.kind.to_string());
                if let Some(message) = &params.message {
                    desired = desired.with_attribute("message", message.clone());
                }
                if let Some(uri) = &params.uri {
                    desired = desired.with_attribute("uri", uri.clone());
                }
                Ok(desired)
            }
        }
    }

    /// JSON schema of a module's arguments
    pub fn schema(object: ObjectType) -> schemars::schema::RootSchema {
        match object {
            ObjectType::Ipspace => schemars::schema_for!(IpspaceParams),
            ObjectType::AutosupportMessage => schemars::schema_for!(AutosupportInvokeParams),
        }
    }
}

/// A complete run read from a YAML or JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub check_mode: bool,
    /// Keyed by module name, e.g. `ipspace: {...}`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub module: ModuleParams,
}

impl Task {
    /// Parse a task document; JSON is accepted as a subset of YAML
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}
