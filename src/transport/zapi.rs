//! ONTAP ZAPI Transport
//!
//! Legacy RPC-style API. Every call is an XML envelope posted to a single
//! servlet; the `results` element's `status` attribute tells success from
//! failure. Objects are addressed by name.

use crate::domain::ports::{
    Attributes, BackendVariant, EventSink, FetchResponse, Filter, ObjectId, Transport,
};
use crate::error::{Error, Result};
use crate::objects::ObjectType;
use crate::transport::element::NaElement;
use crate::transport::ConnectionConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

/// Servlet path receiving every ZAPI call
pub const ZAPI_SERVLET: &str = "/servlets/netapp.servlets.admin.XMLrequest_filer";

const ZAPI_NAMESPACE: &str = "http://www.netapp.com/filer/admin";

/// Transport for the ONTAP ZAPI interface
pub struct ZapiTransport {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
    version: String,
}

impl ZapiTransport {
    /// Create a new ZAPI transport
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.validate_certs)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{}", config.base_url(), ZAPI_SERVLET),
            username: config.username.clone(),
            password: config.password.clone(),
            version: format!("1.{}", config.ontapi.unwrap_or(110)),
        })
    }

    /// Wrap a request in the `netapp` envelope
    fn envelope(&self, request: &NaElement, vserver: Option<&str>) -> String {
        let mut netapp = NaElement::new("netapp");
        netapp.set_attr("version", self.version.as_str());
        netapp.set_attr("xmlns", ZAPI_NAMESPACE);
        if let Some(vserver) = vserver {
            netapp.set_attr("vfiler", vserver);
        }
        netapp.add_child(request.clone());

        let mut xml = String::from(
            "<?xml version='1.0' encoding='utf-8'?>\
             <!DOCTYPE netapp SYSTEM 'file:/etc/netapp_gx.dtd'>",
        );
        netapp.write_xml(&mut xml);
        xml
    }

    /// Invoke a call and return its `results` element on success
    pub async fn invoke(&self, request: &NaElement) -> Result<NaElement> {
        self.invoke_in(request, None).await
    }

    /// Invoke a call tunneled to a vserver
    pub async fn invoke_in(&self, request: &NaElement, vserver: Option<&str>) -> Result<NaElement> {
        debug!("ZAPI {} (vserver: {:?})", request.name, vserver);

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "text/xml; charset=\"UTF-8\"")
            .body(self.envelope(request, vserver))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        decode_response(&request.name, status, &text)
    }

    /// Name of the cluster admin vserver
    async fn admin_vserver(&self) -> Result<Option<String>> {
        let mut query = NaElement::new("query");
        query.add_child(NaElement::with_children(
            "vserver-info",
            [("vserver-type", "admin")],
        ));
        let mut request = NaElement::new("vserver-get-iter");
        request.add_child(query);

        let mut wanted = NaElement::new("vserver-info");
        wanted.add_child(NaElement::new("vserver-name"));
        let mut desired = NaElement::new("desired-attributes");
        desired.add_child(wanted);
        request.add_child(desired);

        let results = self.invoke(&request).await?;
        Ok(results
            .child("attributes-list")
            .and_then(|list| list.child("vserver-info"))
            .and_then(|info| info.child_content("vserver-name"))
            .map(String::from))
    }
}

/// Decode an HTTP answer to a ZAPI call into its `results` element
pub fn decode_response(api: &str, status: StatusCode, text: &str) -> Result<NaElement> {
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            code: None,
            message: text.to_string(),
        });
    }
    check_results(api, NaElement::parse(text)?)
}

/// Turn a response document into its `results` element or a ZAPI error
pub fn check_results(api: &str, root: NaElement) -> Result<NaElement> {
    let results = root
        .children
        .into_iter()
        .find(|c| c.name == "results")
        .ok_or_else(|| Error::UnexpectedShape {
            resource: api.to_string(),
            detail: "response has no results element".into(),
        })?;

    match results.attr("status") {
        Some("passed") => Ok(results),
        _ => Err(Error::Zapi {
            api: api.to_string(),
            code: results.attr("errno").unwrap_or("unknown").to_string(),
            reason: results
                .attr("reason")
                .unwrap_or("no reason given")
                .to_string(),
        }),
    }
}

/// Build the lookup call for one object type
pub fn get_iter_request(object: ObjectType, filter: &Filter) -> Result<NaElement> {
    let zapi = object.zapi();
    let (get_iter, info) = match (zapi.get_iter, zapi.info) {
        (Some(get_iter), Some(info)) => (get_iter, info),
        _ => return Err(unsupported(object, "fetch")),
    };

    let mut query = NaElement::new("query");
    query.add_child(NaElement::with_children(
        info,
        [(zapi.key_field, filter.name.as_str())],
    ));
    let mut request = NaElement::new(get_iter);
    request.add_child(query);
    Ok(request)
}

fn unsupported(object: ObjectType, operation: &str) -> Error {
    Error::Unsupported {
        backend: BackendVariant::Legacy.to_string(),
        operation: operation.into(),
        object: object.label().into(),
    }
}

/// Host name reported in EMS events
fn computer_name() -> String {
    let name = gethostname::gethostname();
    match name.to_string_lossy().trim() {
        "" => "unknown".to_string(),
        name => name.to_string(),
    }
}

fn id_name(id: &ObjectId) -> &str {
    match id {
        ObjectId::Name(name) | ObjectId::Uuid(name) => name,
    }
}

#[async_trait]
impl Transport for ZapiTransport {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Legacy
    }

    async fn fetch(&self, object: ObjectType, filter: &Filter) -> Result<FetchResponse> {
        let request = get_iter_request(object, filter)?;
        let results = self.invoke(&request).await?;
        Ok(FetchResponse::Legacy(results))
    }

    async fn create(&self, object: ObjectType, attrs: &Attributes) -> Result<()> {
        let wire = object.to_wire(attrs, BackendVariant::Legacy);
        let request = NaElement::with_children(object.zapi().create, wire);
        info!("ZAPI {} for {}", request.name, object);
        self.invoke(&request).await?;
        Ok(())
    }

    async fn update(&self, object: ObjectType, id: &ObjectId, attrs: &Attributes) -> Result<()> {
        let zapi = object.zapi();
        let modify = zapi.modify.ok_or_else(|| unsupported(object, "update"))?;

        let mut fields = Attributes::new();
        fields.insert(zapi.key_field.to_string(), id_name(id).to_string());
        fields.extend(object.to_wire(attrs, BackendVariant::Legacy));

        let request = NaElement::with_children(modify, fields);
        info!("ZAPI {} {}", modify, id);
        self.invoke(&request).await?;
        Ok(())
    }

    async fn delete(&self, object: ObjectType, id: &ObjectId) -> Result<()> {
        let zapi = object.zapi();
        let destroy = zapi.destroy.ok_or_else(|| unsupported(object, "delete"))?;

        let request = NaElement::with_children(destroy, [(zapi.key_field, id_name(id))]);
        info!("ZAPI {} {}", destroy, id);
        self.invoke(&request).await?;
        Ok(())
    }

    async fn rename(&self, object: ObjectType, id: &ObjectId, new_name: &str) -> Result<()> {
        let zapi = object.zapi();
        let rename = zapi.rename.ok_or_else(|| unsupported(object, "rename"))?;

        let request = NaElement::with_children(
            rename,
            [(zapi.key_field, id_name(id)), ("new-name", new_name)],
        );
        info!("ZAPI {} {} -> {}", rename, id, new_name);
        self.invoke(&request).await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for ZapiTransport {
    async fn log_event(&self, source: &str) -> Result<()> {
        let cserver = self.admin_vserver().await?;
        let computer_name = computer_name();

        let request = NaElement::with_children(
            "ems-autosupport-log",
            [
                ("computer-name", computer_name.as_str()),
                ("event-id", "12345"),
                ("event-source", source),
                ("app-version", crate::VERSION),
                ("category", "Information"),
                ("event-description", "setup"),
                ("log-level", "6"),
                ("auto-support", "false"),
            ],
        );
        debug!("Logging EMS event for {} via {:?}", source, cserver);
        self.invoke_in(&request, cserver.as_deref()).await?;
        Ok(())
    }
}
