//! ONTAP REST Transport
//!
//! Talks to the controller's `/api/` endpoints. Objects are addressed by the
//! uuid returned from a previous lookup.

use crate::domain::ports::{
    Attributes, BackendVariant, CapabilityProbe, FetchResponse, Filter, ObjectId, Transport,
};
use crate::error::{Error, Result};
use crate::objects::ObjectType;
use crate::transport::ConnectionConfig;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Transport for the ONTAP REST API
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl RestTransport {
    /// Create a new REST transport
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.validate_certs)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/api", config.base_url()),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = format!("{}/{}", self.base_url, path);
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        url
    }

    /// Send one request and return the decoded body
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value> {
        let url = self.url(path, query);
        debug!("REST {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/hal+json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        decode_response(status, &text)
    }

    fn object_path(object: ObjectType, id: &ObjectId, operation: &str) -> Result<String> {
        match id {
            ObjectId::Uuid(uuid) => Ok(format!("{}/{}", object.rest().collection, uuid)),
            ObjectId::Name(name) => Err(Error::UnexpectedShape {
                resource: object.rest().collection.to_string(),
                detail: format!("{} of {} requires a uuid, got only the name", operation, name),
            }),
        }
    }
}

/// Decode a response body; an empty body decodes to `{}`
pub fn decode_response(status: StatusCode, text: &str) -> Result<Value> {
    let json = if text.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_str::<Value>(text) {
            Ok(json) => json,
            Err(_) if !status.is_success() => {
                return Err(Error::Api {
                    status: status.as_u16(),
                    code: None,
                    message: text.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    };

    if let Some(err) = json.get("error") {
        return Err(Error::Api {
            status: status.as_u16(),
            code: err.get("code").and_then(Value::as_str).map(String::from),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            code: None,
            message: text.to_string(),
        });
    }

    Ok(json)
}

/// Build a JSON body from wire-named attributes
fn json_body(object: ObjectType, attrs: &Attributes) -> Value {
    let wire = object.to_wire(attrs, BackendVariant::Modern);
    let map: Map<String, Value> = wire
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Value::Object(map)
}

#[async_trait]
impl Transport for RestTransport {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Modern
    }

    async fn fetch(&self, object: ObjectType, filter: &Filter) -> Result<FetchResponse> {
        let rest = object.rest();
        let body = self
            .send(
                Method::GET,
                rest.collection,
                &[("name", filter.name.as_str()), ("fields", rest.fields)],
                None,
            )
            .await?;
        Ok(FetchResponse::Collection(body))
    }

    async fn create(&self, object: ObjectType, attrs: &Attributes) -> Result<()> {
        info!("POST {} for {}", object.rest().collection, object);
        self.send(
            Method::POST,
            object.rest().collection,
            &[],
            Some(json_body(object, attrs)),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, object: ObjectType, id: &ObjectId, attrs: &Attributes) -> Result<()> {
        let path = Self::object_path(object, id, "update")?;
        info!("PATCH {}", path);
        self.send(Method::PATCH, &path, &[], Some(json_body(object, attrs)))
            .await?;
        Ok(())
    }

    async fn delete(&self, object: ObjectType, id: &ObjectId) -> Result<()> {
        let path = Self::object_path(object, id, "delete")?;
        info!("DELETE {}", path);
        self.send(Method::DELETE, &path, &[], None).await?;
        Ok(())
    }
}

#[async_trait]
impl CapabilityProbe for RestTransport {
    async fn is_modern_backend_available(&self) -> bool {
        match self
            .send(Method::GET, "cluster", &[("fields", "version")], None)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("REST probe failed, falling back to ZAPI: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::normalize;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn transport() -> RestTransport {
        let config = ConnectionConfig {
            hostname: "cluster1.example.com".into(),
            https: true,
            ..Default::default()
        };
        RestTransport::new(&config).unwrap()
    }

    #[test]
    fn test_url_encodes_query() {
        let rest = transport();
        assert_eq!(
            rest.url("network/ipspaces", &[("name", "ip space"), ("fields", "name,uuid")]),
            "https://cluster1.example.com/api/network/ipspaces?name=ip%20space&fields=name%2Cuuid"
        );
        assert_eq!(
            rest.url("cluster", &[]),
            "https://cluster1.example.com/api/cluster"
        );
    }

    #[test]
    fn test_object_path_requires_uuid() {
        let path = RestTransport::object_path(
            ObjectType::Ipspace,
            &ObjectId::Uuid("abc".into()),
            "delete",
        )
        .unwrap();
        assert_eq!(path, "network/ipspaces/abc");

        let err = RestTransport::object_path(
            ObjectType::Ipspace,
            &ObjectId::Name("ipspace1".into()),
            "delete",
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape { .. }));
    }

    #[test]
    fn test_json_body_uses_rest_names() {
        let mut attrs = Attributes::new();
        attrs.insert("node".into(), "node1".into());
        attrs.insert("type".into(), "test".into());

        let body = json_body(ObjectType::AutosupportMessage, &attrs);
        assert_eq!(body["node.name"], "node1");
        assert_eq!(body["type"], "test");
    }

    #[test]
    fn test_decode_error_object() {
        let body = r#"{"error": {"message": "duplicate entry", "code": "1966082"}}"#;
        let err = decode_response(StatusCode::CONFLICT, body).unwrap_err();
        assert_matches!(
            err,
            Error::Api { status: 409, code: Some(ref code), ref message }
                if code == "1966082" && message == "duplicate entry"
        );
    }

    #[test]
    fn test_decode_error_without_json_body() {
        let err = decode_response(StatusCode::BAD_GATEWAY, "<html>proxy error</html>").unwrap_err();
        assert_matches!(
            err,
            Error::Api { status: 502, code: None, ref message } if message.contains("proxy error")
        );
    }

    #[test]
    fn test_decode_empty_body() {
        let body = decode_response(StatusCode::OK, "  ").unwrap();
        assert_eq!(body, json!({}));
        assert_eq!(
            normalize(ObjectType::Ipspace, "ipspace1", &FetchResponse::Collection(body)).unwrap(),
            None
        );
    }

    #[test]
    fn test_decode_records() {
        let body = decode_response(
            StatusCode::OK,
            r#"{"records": [{"name": "ipspace1", "uuid": "u-1"}], "num_records": 1}"#,
        )
        .unwrap();
        assert_eq!(body["records"][0]["uuid"], "u-1");
    }

    #[test]
    fn test_decode_malformed_success_body() {
        let err = decode_response(StatusCode::OK, "{not json").unwrap_err();
        assert_matches!(err, Error::JsonParse(_));
    }
}
