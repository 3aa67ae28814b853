//! Domain Ports - Core types and trait definitions for the reconciler
//!
//! These traits define the boundaries between the reconciliation logic and the
//! storage controller. Transports implement these traits for each backend.

use crate::error::Result;
use crate::objects::ObjectType;
use crate::transport::element::NaElement;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Backend Variants
// =============================================================================

/// API family spoken by the controller for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendVariant {
    /// Structured REST API with uuid-addressed resources
    Modern,
    /// RPC-style ZAPI with XML envelopes and numeric status codes
    Legacy,
}

impl std::fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendVariant::Modern => write!(f, "rest"),
            BackendVariant::Legacy => write!(f, "zapi"),
        }
    }
}

/// Whether the object should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(schemars::JsonSchema, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Present => write!(f, "present"),
            State::Absent => write!(f, "absent"),
        }
    }
}

// =============================================================================
// Objects
// =============================================================================

/// Canonical field name to value, in request order
pub type Attributes = IndexMap<String, String>;

/// Identity used to address an object in a mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectId {
    /// Opaque identifier assigned by the REST backend
    Uuid(String),
    /// Name, as used by ZAPI calls
    Name(String),
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectId::Uuid(uuid) => write!(f, "uuid {}", uuid),
            ObjectId::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A named configuration object as currently stored on the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedObject {
    /// Unique name within its namespace
    pub name: String,
    /// Backend identifier, only known on the modern backend
    pub uuid: Option<String>,
    /// Remaining fields returned by the backend
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ManagedObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Identity to use when mutating this object
    pub fn id(&self) -> ObjectId {
        match &self.uuid {
            Some(uuid) => ObjectId::Uuid(uuid.clone()),
            None => ObjectId::Name(self.name.clone()),
        }
    }
}

/// Target configuration declared by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub name: String,
    /// Existing object to rename into `name`
    pub from_name: Option<String>,
    pub state: State,
    /// Object-specific fields under their canonical names
    pub attributes: Attributes,
}

impl DesiredState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from_name: None,
            state: State::Present,
            attributes: Attributes::new(),
        }
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn renamed_from(mut self, from_name: impl Into<String>) -> Self {
        self.from_name = Some(from_name.into());
        self
    }

    pub fn with_attribute(mut self, field: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }
}

// =============================================================================
// Transport Port
// =============================================================================

/// Lookup filter for a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
}

impl Filter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Raw lookup answer, still in the backend's shape
#[derive(Debug, Clone)]
pub enum FetchResponse {
    /// REST collection body
    Collection(serde_json::Value),
    /// ZAPI `results` element
    Legacy(NaElement),
}

/// Port for CRUD primitives against the controller
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend family this transport speaks
    fn variant(&self) -> BackendVariant;

    /// Look up objects matching a filter
    async fn fetch(&self, object: ObjectType, filter: &Filter) -> Result<FetchResponse>;

    /// Create an object, or fire a one-shot action
    async fn create(&self, object: ObjectType, attrs: &Attributes) -> Result<()>;

    /// Modify fields of an existing object
    async fn update(&self, object: ObjectType, id: &ObjectId, attrs: &Attributes) -> Result<()>;

    /// Delete an existing object
    async fn delete(&self, object: ObjectType, id: &ObjectId) -> Result<()>;

    /// Rename an existing object
    async fn rename(&self, object: ObjectType, id: &ObjectId, new_name: &str) -> Result<()> {
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), new_name.to_string());
        self.update(object, id, &attrs).await
    }
}

// =============================================================================
// Capability Probe Port
// =============================================================================

/// Port for detecting which backend the controller supports
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn is_modern_backend_available(&self) -> bool;
}

// =============================================================================
// Event Sink Port
// =============================================================================

/// Port for backend-side auditing of reconciler runs
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Record that the named module ran
    async fn log_event(&self, source: &str) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type TransportRef = Arc<dyn Transport>;
pub type EventSinkRef = Arc<dyn EventSink>;
