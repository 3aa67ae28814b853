//! Object Catalog
//!
//! Describes each manageable object type: where it lives on each backend,
//! how its fields are named on the wire, and whether it is a persistent
//! object or a one-shot action.

use crate::domain::ports::{Attributes, BackendVariant, DesiredState};
use serde::{Deserialize, Serialize};

// =============================================================================
// Descriptors
// =============================================================================

/// Whether an object type is reconciled or simply fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Fetched, compared and created/deleted/renamed as needed
    Persistent,
    /// Sent on every run, never fetched
    ActionOnly,
}

/// Names of one field on each backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub canonical: &'static str,
    pub rest: &'static str,
    pub zapi: &'static str,
}

/// REST location of an object type
#[derive(Debug, Clone, Copy)]
pub struct RestResource {
    /// Collection path below `/api/`
    pub collection: &'static str,
    /// Fields requested on lookup
    pub fields: &'static str,
}

/// ZAPI calls for an object type
#[derive(Debug, Clone, Copy)]
pub struct ZapiCalls {
    pub get_iter: Option<&'static str>,
    /// Element wrapping one record in queries and `attributes-list`
    pub info: Option<&'static str>,
    /// Field holding the object name
    pub key_field: &'static str,
    pub create: &'static str,
    pub destroy: Option<&'static str>,
    pub rename: Option<&'static str>,
    pub modify: Option<&'static str>,
    /// Lookup errnos meaning "no such object"
    pub not_found_codes: &'static [&'static str],
}

const IPSPACE_FIELDS: &[FieldMapping] = &[FieldMapping {
    canonical: "name",
    rest: "name",
    zapi: "ipspace",
}];

const AUTOSUPPORT_FIELDS: &[FieldMapping] = &[
    FieldMapping {
        canonical: "message",
        rest: "message",
        zapi: "message",
    },
    FieldMapping {
        canonical: "type",
        rest: "type",
        zapi: "type",
    },
    FieldMapping {
        canonical: "uri",
        rest: "uri",
        zapi: "uri",
    },
    FieldMapping {
        canonical: "node",
        rest: "node.name",
        zapi: "node-name",
    },
];

// =============================================================================
// Object Type
// =============================================================================

/// Object types this crate knows how to manage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Network isolation boundary within a cluster
    Ipspace,
    /// One-shot AutoSupport message sent from one or all nodes
    AutosupportMessage,
}

impl ObjectType {
    /// Human-readable kind used in messages
    pub fn label(&self) -> &'static str {
        match self {
            ObjectType::Ipspace => "ipspace",
            ObjectType::AutosupportMessage => "autosupport message",
        }
    }

    /// Module name reported to the controller's event log
    pub fn module_name(&self) -> &'static str {
        match self {
            ObjectType::Ipspace => "na_ontap_ipspace",
            ObjectType::AutosupportMessage => "na_ontap_autosupport_invoke",
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            ObjectType::Ipspace => Lifecycle::Persistent,
            ObjectType::AutosupportMessage => Lifecycle::ActionOnly,
        }
    }

    pub fn rest(&self) -> RestResource {
        match self {
            ObjectType::Ipspace => RestResource {
                collection: "network/ipspaces",
                fields: "name,uuid",
            },
            ObjectType::AutosupportMessage => RestResource {
                collection: "support/autosupport/messages",
                fields: "node.name,subject,index",
            },
        }
    }

    pub fn zapi(&self) -> ZapiCalls {
        match self {
            ObjectType::Ipspace => ZapiCalls {
                get_iter: Some("net-ipspaces-get-iter"),
                info: Some("net-ipspaces-info"),
                key_field: "ipspace",
                create: "net-ipspaces-create",
                destroy: Some("net-ipspaces-destroy"),
                rename: Some("net-ipspaces-rename"),
                modify: None,
                // 14636: ipspace does not exist, 13073: entry not found
                not_found_codes: &["14636", "13073"],
            },
            ObjectType::AutosupportMessage => ZapiCalls {
                get_iter: None,
                info: None,
                key_field: "node-name",
                create: "autosupport-invoke",
                destroy: None,
                rename: None,
                modify: None,
                not_found_codes: &[],
            },
        }
    }

    pub fn fields(&self) -> &'static [FieldMapping] {
        match self {
            ObjectType::Ipspace => IPSPACE_FIELDS,
            ObjectType::AutosupportMessage => AUTOSUPPORT_FIELDS,
        }
    }

    /// Wire name of a canonical field; unknown fields keep their name
    pub fn wire_name<'a>(&self, canonical: &'a str, variant: BackendVariant) -> &'a str {
        match self.fields().iter().find(|f| f.canonical == canonical) {
            Some(mapping) => match variant {
                BackendVariant::Modern => mapping.rest,
                BackendVariant::Legacy => mapping.zapi,
            },
            None => canonical,
        }
    }

    /// Canonical name of a ZAPI field, if mapped
    pub fn canonical_from_zapi(&self, zapi: &str) -> Option<&'static str> {
        self.fields()
            .iter()
            .find(|f| f.zapi == zapi)
            .map(|f| f.canonical)
    }

    /// Translate canonical attributes to wire names
    pub fn to_wire(&self, attrs: &Attributes, variant: BackendVariant) -> Attributes {
        attrs
            .iter()
            .map(|(k, v)| (self.wire_name(k, variant).to_string(), v.clone()))
            .collect()
    }

    /// Attributes sent on create
    pub fn create_attributes(&self, desired: &DesiredState) -> Attributes {
        match self {
            ObjectType::Ipspace => {
                let mut attrs = Attributes::new();
                attrs.insert("name".to_string(), desired.name.clone());
                attrs
            }
            ObjectType::AutosupportMessage => {
                let mut attrs = desired.attributes.clone();
                if !desired.name.is_empty() {
                    attrs.insert("node".to_string(), desired.name.clone());
                }
                attrs
            }
        }
    }

    /// Verb describing a create in error messages
    pub fn create_verb(&self) -> &'static str {
        match self {
            ObjectType::Ipspace => "provisioning",
            ObjectType::AutosupportMessage => "sending",
        }
    }

    /// Object label for messages, e.g. `ipspace ipspace1`
    pub fn describe(&self, name: &str) -> String {
        match self {
            ObjectType::AutosupportMessage if name.is_empty() => {
                format!("{} on all nodes", self.label())
            }
            ObjectType::AutosupportMessage => format!("{} on node {}", self.label(), name),
            _ => format!("{} {}", self.label(), name),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
