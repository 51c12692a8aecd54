//! C10: smart-sync client (§4.10). Before the network half begins, ask the
//! manifest's `<manifest-server>` for a server-approved manifest via its
//! XML-RPC interface (`GetApprovedManifest(branch[, target])` or
//! `GetManifest(tag)`), persist what it returns, and hand the caller the path
//! to rebind the sync to.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::Client;
use thiserror::Error;

pub const OVERRIDE_MANIFEST_NAME: &str = "smart_sync_override.xml";

#[derive(Debug, Error)]
pub enum SmartSyncError {
    #[error("request to manifest server {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("manifest server rejected the request: {0}")]
    Fault(String),

    #[error("could not parse manifest server response: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("could not write {path}: {source}")]
    Write { path: String, source: std::io::Error },
}

/// A client bound to one manifest server, with persistent cookies the way
/// `repo`'s own smart-sync client keeps a session across the handful of
/// XML-RPC calls a sync can make (one for the approved manifest, potentially
/// more if the caller retries).
pub struct SmartSyncClient {
    http: Client,
    server_url: String,
}

impl SmartSyncClient {
    pub fn new(server_url: impl Into<String>) -> Result<Self, SmartSyncError> {
        let server_url = server_url.into();
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|source| SmartSyncError::Request { url: server_url.clone(), source })?;
        Ok(SmartSyncClient { http, server_url })
    }

    /// `GetApprovedManifest(branch[, target])`: the common case, used when no
    /// explicit tag was requested.
    pub fn get_approved_manifest(
        &self,
        branch: &str,
        target: Option<&str>,
    ) -> Result<String, SmartSyncError> {
        let mut params = vec![branch.to_owned()];
        if let Some(target) = target {
            params.push(target.to_owned());
        }
        self.call("GetApprovedManifest", &params)
    }

    /// `GetManifest(tag)`: used when the user pins smart-sync to a specific
    /// build tag rather than "whatever's currently approved".
    pub fn get_manifest(&self, tag: &str) -> Result<String, SmartSyncError> {
        self.call("GetManifest", &[tag.to_owned()])
    }

    fn call(&self, method: &str, params: &[String]) -> Result<String, SmartSyncError> {
        let body = xmlrpc_request(method, params);
        let response = self
            .http
            .post(&self.server_url)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .map_err(|source| SmartSyncError::Request { url: self.server_url.clone(), source })?;
        let text = response
            .text()
            .map_err(|source| SmartSyncError::Request { url: self.server_url.clone(), source })?;
        parse_xmlrpc_string_response(&text)
    }
}

/// Write `manifest_xml` to `metadata_dir/smart_sync_override.xml` and return
/// its path, so the caller can rebind `manifest.xml` to it before the network
/// half starts.
pub fn write_override(metadata_dir: &Path, manifest_xml: &str) -> Result<PathBuf, SmartSyncError> {
    let path = metadata_dir.join(OVERRIDE_MANIFEST_NAME);
    std::fs::write(&path, manifest_xml)
        .map_err(|source| SmartSyncError::Write { path: path.display().to_string(), source })?;
    Ok(path)
}

fn xmlrpc_request(method: &str, params: &[String]) -> String {
    let mut params_xml = String::new();
    for param in params {
        params_xml.push_str("<param><value><string>");
        params_xml.push_str(&xml_escape(param));
        params_xml.push_str("</string></value></param>");
    }
    format!(
        "<?xml version=\"1.0\"?><methodCall><methodName>{method}</methodName><params>{params_xml}</params></methodCall>"
    )
}

fn xml_escape(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Pull the first `<string>` value out of a `methodResponse`, or turn a
/// `<fault>` into an error. Hand-walked with `quick_xml`'s pull parser rather
/// than a `serde` struct because XML-RPC faults and successes have
/// structurally different bodies under the same root element.
fn parse_xmlrpc_string_response(xml: &str) -> Result<String, SmartSyncError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_fault = false;
    let mut in_string = false;
    let mut fault_message = String::new();
    let mut value = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(tag) => match tag.name().as_ref() {
                b"fault" => in_fault = true,
                b"string" => in_string = true,
                _ => {}
            },
            Event::Text(text) => {
                if in_string {
                    let text = text.unescape()?.into_owned();
                    if in_fault {
                        fault_message.push_str(&text);
                    } else if value.is_none() {
                        value = Some(text);
                    }
                }
            }
            Event::End(tag) => match tag.name().as_ref() {
                b"fault" => in_fault = false,
                b"string" => in_string = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !fault_message.is_empty() {
        return Err(SmartSyncError::Fault(fault_message));
    }
    value.ok_or_else(|| SmartSyncError::Fault("manifest server returned no manifest".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_response() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><params><param><value><string>&lt;manifest/&gt;</string></value></param></params></methodResponse>";
        assert_eq!(parse_xmlrpc_string_response(xml).unwrap(), "<manifest/>");
    }

    #[test]
    fn parses_fault_response() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><fault><value><struct><member><name>faultString</name><value><string>no such branch</string></value></member></struct></value></fault></methodResponse>";
        let err = parse_xmlrpc_string_response(xml).unwrap_err();
        assert!(matches!(err, SmartSyncError::Fault(message) if message == "no such branch"));
    }
}
