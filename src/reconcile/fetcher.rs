//! State fetcher
//!
//! Reads one object by name and folds both backend response shapes into
//! `Option<ManagedObject>`.

use crate::domain::ports::{FetchResponse, Filter, ManagedObject, TransportRef};
use crate::error::{Error, Result};
use crate::objects::ObjectType;
use crate::transport::element::NaElement;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Looks up the current state of named objects
pub struct StateFetcher {
    transport: TransportRef,
}

impl StateFetcher {
    pub fn new(transport: TransportRef) -> Self {
        Self { transport }
    }

    /// Current object named `name`, or `None` when it does not exist
    pub async fn get(&self, object: ObjectType, name: &str) -> Result<Option<ManagedObject>> {
        let response = match self.transport.fetch(object, &Filter::by_name(name)).await {
            Ok(response) => response,
            Err(err) if is_not_found(object, &err) => {
                debug!("{} {} not found ({})", object, name, err);
                return Ok(None);
            }
            Err(err) => return Err(Error::backend("fetching", object.describe(name), err)),
        };

        let current = normalize(object, name, &response)?;
        debug!(
            "{} {}: {}",
            object,
            name,
            if current.is_some() { "exists" } else { "absent" }
        );
        Ok(current)
    }
}

/// Lookup errors that mean "no such object"
fn is_not_found(object: ObjectType, err: &Error) -> bool {
    err.zapi_code()
        .map(|code| object.zapi().not_found_codes.contains(&code))
        .unwrap_or(false)
}

/// Fold a raw lookup answer into the canonical record
pub fn normalize(
    object: ObjectType,
    name: &str,
    response: &FetchResponse,
) -> Result<Option<ManagedObject>> {
    match response {
        FetchResponse::Collection(body) => from_collection(object, name, body),
        FetchResponse::Legacy(results) => from_legacy(object, results),
    }
}

fn from_collection(object: ObjectType, name: &str, body: &Value) -> Result<Option<ManagedObject>> {
    let unexpected = || Error::UnexpectedShape {
        resource: object.rest().collection.to_string(),
        detail: body.to_string(),
    };

    let map = body.as_object().ok_or_else(unexpected)?;
    if map.is_empty() {
        return Ok(None);
    }
    let records = map
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(unexpected)?;

    // first match wins
    records
        .iter()
        .find(|record| record.get("name").and_then(Value::as_str) == Some(name))
        .map(|record| from_record(object, record))
        .transpose()
}

fn from_record(object: ObjectType, record: &Value) -> Result<ManagedObject> {
    let fields = record.as_object().ok_or_else(|| Error::UnexpectedShape {
        resource: object.rest().collection.to_string(),
        detail: record.to_string(),
    })?;

    let mut extra = BTreeMap::new();
    let mut current = ManagedObject::new("");
    for (key, value) in fields {
        match (key.as_str(), value) {
            ("name", Value::String(name)) => current.name = name.clone(),
            ("uuid", Value::String(uuid)) => current.uuid = Some(uuid.clone()),
            ("uuid", Value::Null) | ("_links", _) => {}
            _ => {
                extra.insert(key.clone(), value.clone());
            }
        }
    }
    current.extra = extra;
    Ok(current)
}

fn from_legacy(object: ObjectType, results: &NaElement) -> Result<Option<ManagedObject>> {
    let zapi = object.zapi();
    let unexpected = |detail: &str| Error::UnexpectedShape {
        resource: zapi.get_iter.unwrap_or(zapi.create).to_string(),
        detail: detail.to_string(),
    };

    let count = match results.child_content("num-records") {
        Some(n) => n
            .trim()
            .parse::<u64>()
            .map_err(|_| unexpected(format!("num-records is not a count: {}", n).as_str()))?,
        None => 0,
    };
    if count < 1 {
        return Ok(None);
    }

    let info_name = zapi.info.ok_or_else(|| unexpected("object type has no info element"))?;
    let info = results
        .child("attributes-list")
        .and_then(|list| list.child(info_name))
        .ok_or_else(|| unexpected("num-records is positive but attributes-list is missing"))?;
    let name = info
        .child_content(zapi.key_field)
        .ok_or_else(|| unexpected("record has no name field"))?;

    let mut current = ManagedObject::new(name);
    for child in &info.children {
        if child.name == zapi.key_field {
            continue;
        }
        if let Some(content) = &child.content {
            let key = object
                .canonical_from_zapi(&child.name)
                .map(String::from)
                .unwrap_or_else(|| child.name.clone());
            current.extra.insert(key, Value::String(content.clone()));
        }
    }
    Ok(Some(current))
}
