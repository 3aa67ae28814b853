//! In-Memory Transport
//!
//! Keeps objects in a map and answers lookups in the response shape of the
//! backend it impersonates. Every call is recorded so callers can assert on
//! what was (or was not) sent.

use crate::domain::ports::{
    Attributes, BackendVariant, EventSink, FetchResponse, Filter, ManagedObject, ObjectId,
    Transport,
};
use crate::error::{Error, Result};
use crate::objects::{Lifecycle, ObjectType};
use crate::transport::element::NaElement;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// A call received by the in-memory transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch { object: ObjectType, name: String },
    Create { object: ObjectType, attrs: Attributes },
    Update { object: ObjectType, id: ObjectId, attrs: Attributes },
    Delete { object: ObjectType, id: ObjectId },
    Rename { object: ObjectType, id: ObjectId, new_name: String },
    Event { source: String },
}

impl Call {
    /// Whether this call changes controller state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Create { .. } | Call::Update { .. } | Call::Delete { .. } | Call::Rename { .. }
        )
    }
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<(ObjectType, String), ManagedObject>,
    calls: Vec<Call>,
    next_uuid: u64,
    lookup_error: Option<(String, String)>,
    mutation_error: Option<String>,
    event_error: Option<String>,
}

/// Transport backed by an in-process map
pub struct MemoryTransport {
    variant: BackendVariant,
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    pub fn new(variant: BackendVariant) -> Self {
        Self {
            variant,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn modern() -> Self {
        Self::new(BackendVariant::Modern)
    }

    pub fn legacy() -> Self {
        Self::new(BackendVariant::Legacy)
    }

    /// Seed an existing object
    pub fn with_object(self, object: ObjectType, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            let record = self.new_record(&mut state, name);
            state.objects.insert((object, name.to_string()), record);
        }
        self
    }

    /// Make every lookup fail with the given status code
    pub fn fail_lookups_with(self, code: &str, reason: &str) -> Self {
        self.state.lock().lookup_error = Some((code.to_string(), reason.to_string()));
        self
    }

    /// Make every mutating call fail
    pub fn fail_mutations_with(self, reason: &str) -> Self {
        self.state.lock().mutation_error = Some(reason.to_string());
        self
    }

    /// Make event logging fail
    pub fn fail_events_with(self, reason: &str) -> Self {
        self.state.lock().event_error = Some(reason.to_string());
        self
    }

    pub fn contains(&self, object: ObjectType, name: &str) -> bool {
        self.state
            .lock()
            .objects
            .contains_key(&(object, name.to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .count()
    }

    fn new_record(&self, state: &mut MemoryState, name: &str) -> ManagedObject {
        let record = ManagedObject::new(name);
        match self.variant {
            BackendVariant::Modern => {
                state.next_uuid += 1;
                record.with_uuid(format!("00000000-0000-0000-0000-{:012x}", state.next_uuid))
            }
            BackendVariant::Legacy => record,
        }
    }

    /// Error in this backend's style for a failed call
    fn backend_error(&self, api: &str, code: &str, reason: &str) -> Error {
        match self.variant {
            BackendVariant::Modern => Error::Api {
                status: 400,
                code: Some(code.to_string()),
                message: reason.to_string(),
            },
            BackendVariant::Legacy => Error::Zapi {
                api: api.to_string(),
                code: code.to_string(),
                reason: reason.to_string(),
            },
        }
    }

    fn check_mutation(&self, state: &MemoryState, api: &str) -> Result<()> {
        match &state.mutation_error {
            Some(reason) => Err(self.backend_error(api, "13001", reason)),
            None => Ok(()),
        }
    }

    fn find_key(
        &self,
        state: &MemoryState,
        object: ObjectType,
        id: &ObjectId,
    ) -> Result<(ObjectType, String)> {
        let found = match (self.variant, id) {
            (BackendVariant::Modern, ObjectId::Uuid(uuid)) => state
                .objects
                .iter()
                .find(|((kind, _), record)| {
                    *kind == object && record.uuid.as_deref() == Some(uuid.as_str())
                }),
            (BackendVariant::Legacy, ObjectId::Name(name)) => state
                .objects
                .get_key_value(&(object, name.clone())),
            (_, other) => {
                return Err(Error::UnexpectedShape {
                    resource: object.label().to_string(),
                    detail: format!("{} backend cannot address {}", self.variant, other),
                })
            }
        };
        found
            .map(|(key, _)| key.clone())
            .ok_or_else(|| self.backend_error(object.label(), "15661", "entry doesn't exist"))
    }

    fn collection_body(records: &[&ManagedObject]) -> Value {
        let records: Vec<Value> = records
            .iter()
            .map(|r| json!({ "name": r.name, "uuid": r.uuid }))
            .collect();
        json!({ "records": records, "num_records": records.len() })
    }

    fn legacy_results(object: ObjectType, records: &[&ManagedObject]) -> NaElement {
        let zapi = object.zapi();
        let mut results = NaElement::new("results");
        results.set_attr("status", "passed");
        if let (Some(info), false) = (zapi.info, records.is_empty()) {
            let mut list = NaElement::new("attributes-list");
            for record in records {
                list.add_child(NaElement::with_children(
                    info,
                    [(zapi.key_field, record.name.as_str())],
                ));
            }
            results.add_child(list);
        }
        results.add_child(NaElement::leaf("num-records", records.len().to_string()));
        results
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn variant(&self) -> BackendVariant {
        self.variant
    }

    async fn fetch(&self, object: ObjectType, filter: &Filter) -> Result<FetchResponse> {
        let mut state = self.state.lock();
        state.calls.push(Call::Fetch {
            object,
            name: filter.name.clone(),
        });
        if let Some((code, reason)) = &state.lookup_error {
            let api = object.zapi().get_iter.unwrap_or(object.rest().collection);
            return Err(self.backend_error(api, code, reason));
        }

        let records: Vec<&ManagedObject> = state
            .objects
            .get(&(object, filter.name.clone()))
            .into_iter()
            .collect();
        debug!("memory fetch {} {}: {} record(s)", object, filter.name, records.len());

        Ok(match self.variant {
            BackendVariant::Modern => FetchResponse::Collection(Self::collection_body(&records)),
            BackendVariant::Legacy => FetchResponse::Legacy(Self::legacy_results(object, &records)),
        })
    }

    async fn create(&self, object: ObjectType, attrs: &Attributes) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Create {
            object,
            attrs: attrs.clone(),
        });
        self.check_mutation(&state, object.zapi().create)?;

        if object.lifecycle() == Lifecycle::ActionOnly {
            return Ok(());
        }
        let name = attrs
            .get("name")
            .cloned()
            .ok_or_else(|| Error::Validation(format!("{} create without a name", object)))?;
        let key = (object, name.clone());
        if state.objects.contains_key(&key) {
            return Err(self.backend_error(object.zapi().create, "13001", "duplicate entry"));
        }
        let record = self.new_record(&mut state, &name);
        state.objects.insert(key, record);
        Ok(())
    }

    async fn update(&self, object: ObjectType, id: &ObjectId, attrs: &Attributes) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Update {
            object,
            id: id.clone(),
            attrs: attrs.clone(),
        });
        self.check_mutation(&state, "modify")?;

        let key = self.find_key(&state, object, id)?;
        if let Some(mut record) = state.objects.remove(&key) {
            for (field, value) in attrs {
                if field == "name" {
                    record.name = value.clone();
                } else {
                    record.extra.insert(field.clone(), Value::String(value.clone()));
                }
            }
            state.objects.insert((object, record.name.clone()), record);
        }
        Ok(())
    }

    async fn delete(&self, object: ObjectType, id: &ObjectId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Delete {
            object,
            id: id.clone(),
        });
        self.check_mutation(&state, object.zapi().destroy.unwrap_or("destroy"))?;

        let key = self.find_key(&state, object, id)?;
        state.objects.remove(&key);
        Ok(())
    }

    async fn rename(&self, object: ObjectType, id: &ObjectId, new_name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Rename {
            object,
            id: id.clone(),
            new_name: new_name.to_string(),
        });
        self.check_mutation(&state, object.zapi().rename.unwrap_or("rename"))?;

        let key = self.find_key(&state, object, id)?;
        if state.objects.contains_key(&(object, new_name.to_string())) {
            return Err(self.backend_error("rename", "13001", "duplicate entry"));
        }
        if let Some(mut record) = state.objects.remove(&key) {
            record.name = new_name.to_string();
            state.objects.insert((object, new_name.to_string()), record);
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for MemoryTransport {
    async fn log_event(&self, source: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Event {
            source: source.to_string(),
        });
        match &state.event_error {
            Some(reason) => Err(self.backend_error("ems-autosupport-log", "13005", reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_modern_fetch_shape() {
        let transport = MemoryTransport::modern().with_object(ObjectType::Ipspace, "ipspace1");

        let response = transport
            .fetch(ObjectType::Ipspace, &Filter::by_name("ipspace1"))
            .await
            .unwrap();
        match response {
            FetchResponse::Collection(body) => {
                assert_eq!(body["num_records"], 1);
                assert_eq!(body["records"][0]["name"], "ipspace1");
                assert!(body["records"][0]["uuid"].is_string());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_legacy_fetch_shape() {
        let transport = MemoryTransport::legacy();

        let response = transport
            .fetch(ObjectType::Ipspace, &Filter::by_name("missing"))
            .await
            .unwrap();
        match response {
            FetchResponse::Legacy(results) => {
                assert_eq!(results.child_content("num-records"), Some("0"));
                assert!(results.child("attributes-list").is_none());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_modern_rejects_name_addressing() {
        let transport = MemoryTransport::modern().with_object(ObjectType::Ipspace, "ipspace1");
        let err = transport
            .delete(ObjectType::Ipspace, &ObjectId::Name("ipspace1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape { .. }));
        assert!(transport.contains(ObjectType::Ipspace, "ipspace1"));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let transport = MemoryTransport::legacy();
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), "ipspace1".into());

        transport.create(ObjectType::Ipspace, &attrs).await.unwrap();
        transport.log_event("na_ontap_ipspace").await.unwrap();

        assert_eq!(transport.mutation_count(), 1);
        assert_eq!(transport.calls().len(), 2);
        assert!(transport.contains(ObjectType::Ipspace, "ipspace1"));
    }
}
