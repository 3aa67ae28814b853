//! ONTAP Reconciler
//!
//! Idempotent management of NetApp ONTAP configuration objects (ipspaces,
//! AutoSupport messages) over either the REST API or the legacy ZAPI.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              Module Runner                                   │
//! │        START → EVENT → FETCH_CURRENT → DECIDE → {ACT | SKIP} → REPORT        │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │  State Fetcher  │  │   Reconciler    │  │      Action Executor        │  │
//! │  │  (normalize)    │  │ (pure decide()) │  │      (check mode)           │  │
//! │  └────────┬────────┘  └─────────────────┘  └─────────────┬───────────────┘  │
//! │           │                                              │                   │
//! │           └──────────────────────┬───────────────────────┘                   │
//! ├──────────────────────────────────┼──────────────────────────────────────────┤
//! │                          Transport (chosen once)                             │
//! │  ┌─────────────────────────────┐  ┌─────────────────────────────────────┐   │
//! │  │        REST (modern)        │  │           ZAPI (legacy)             │   │
//! │  │   /api/..., uuid-addressed  │  │   XML envelopes, errno statuses     │   │
//! │  └─────────────────────────────┘  └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Core types and traits
//! - [`objects`]: Per-object-type descriptors
//! - [`transport`]: REST, ZAPI and in-memory transports
//! - [`reconcile`]: Fetching, deciding and applying
//! - [`runner`]: One run from event to report
//! - [`params`]: Module arguments and task files
//! - [`error`]: Error types and handling

pub mod domain;
pub mod error;
pub mod objects;
pub mod params;
pub mod reconcile;
pub mod runner;
pub mod transport;

// Re-export commonly used types
pub use domain::ports::{
    Attributes, BackendVariant, CapabilityProbe, DesiredState, EventSink, ManagedObject, ObjectId,
    State, Transport,
};

pub use error::{Error, ErrorCategory, Result};

pub use objects::{Lifecycle, ObjectType};

pub use params::{AutosupportInvokeParams, AutosupportType, IpspaceParams, ModuleParams, Task};

pub use reconcile::{decide, ActionExecutor, ActionKind, Decision, Plan, StateFetcher};

pub use runner::{ModuleOutput, ModuleRunner, RunReport};

pub use transport::{
    Connection, ConnectionConfig, MemoryTransport, RestTransport, TransportFactory, UseRest,
    ZapiTransport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
