use crate::diagnostics::{Diagnostics, Event};
use crate::error::RegistryError;
use crate::registry::{PackageMetadata, RegistryClient, encode_package_name};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
const MAX_METADATA_BYTES: usize = 64 * 1024 * 1024;

/// Blocking client for an npm-compatible registry.
pub struct NpmRegistry {
    client: Client,
    base_url: Url,
    diagnostics: Arc<dyn Diagnostics>,
}

impl NpmRegistry {
    #[cfg(test)]
    pub fn new(registry_url: &str) -> Result<Self, RegistryError> {
        Self::with_diagnostics(registry_url, crate::diagnostics::Silent::shared())
    }

    pub fn with_diagnostics(
        registry_url: &str,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, RegistryError> {
        let base_url = Self::parse_base_url(registry_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("npdu/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Transport {
                url: registry_url.to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url,
            diagnostics,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Address of the metadata document for `package_name`.
    pub fn package_url(&self, package_name: &str) -> Result<Url, RegistryError> {
        let encoded = encode_package_name(package_name);
        self.diagnostics.record(&Event::EncodingName {
            name: package_name.to_string(),
        });
        self.base_url
            .join(&encoded)
            .map_err(|e| RegistryError::InvalidUrl {
                url: format!("{}{}", self.base_url, encoded),
                reason: e.to_string(),
            })
    }

    fn parse_base_url(registry_url: &str) -> Result<Url, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidUrl {
            url: registry_url.to_string(),
            reason,
        };

        let mut parsed = Url::parse(registry_url).map_err(|e| invalid(e.to_string()))?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => return Err(invalid(format!("unsupported scheme '{scheme}'"))),
        }

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }

        // joined names must land under the registry path, not replace its last segment
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        Ok(parsed)
    }
}

impl RegistryClient for NpmRegistry {
    fn fetch(&self, package_name: &str) -> Result<PackageMetadata, RegistryError> {
        let url = self.package_url(package_name)?;
        self.diagnostics.record(&Event::FetchingPackage {
            name: package_name.to_string(),
        });

        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| RegistryError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // reject before buffering anything we are going to throw away
        check_status(status)?;
        check_content_type(content_type.as_deref())?;
        check_length(response.content_length(), MAX_METADATA_BYTES)?;

        let mut body = Vec::new();
        (&mut response)
            .take(MAX_METADATA_BYTES as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| RegistryError::Body {
                url: url.to_string(),
                source: e,
            })?;

        decode_body(&body, MAX_METADATA_BYTES)
    }
}

fn check_status(status: StatusCode) -> Result<(), RegistryError> {
    if status == StatusCode::OK {
        return Ok(());
    }
    let text = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    Err(RegistryError::Status(text))
}

fn check_content_type(content_type: Option<&str>) -> Result<(), RegistryError> {
    let Some(content_type) = content_type else {
        return Err(RegistryError::IncompatibleData);
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        Ok(())
    } else {
        Err(RegistryError::IncompatibleData)
    }
}

/// Rejects a body whose declared length is already over `limit`.
fn check_length(declared: Option<u64>, limit: usize) -> Result<(), RegistryError> {
    match declared {
        Some(length) if length > limit as u64 => Err(RegistryError::TooLarge { limit }),
        _ => Ok(()),
    }
}

/// `body` is read with at most `limit + 1` bytes, so anything longer is oversized.
fn decode_body(body: &[u8], limit: usize) -> Result<PackageMetadata, RegistryError> {
    if body.len() > limit {
        return Err(RegistryError::TooLarge { limit });
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RegistryError::NoResponse);
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves exactly one canned HTTP response and reports the request line.
    fn serve_once(status_line: &str, content_type: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                    break;
                }
            }
            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            tx.send(request_line.trim_end().to_string()).unwrap();
        });

        (address, rx)
    }

    #[test]
    fn rejects_malformed_registry_url() {
        let err = NpmRegistry::new("invalidUri").err().unwrap();
        assert!(matches!(err, RegistryError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = NpmRegistry::new("ftp://registry.example.com").err().unwrap();
        assert!(matches!(err, RegistryError::InvalidUrl { .. }));
    }

    #[test]
    fn resolves_package_paths_under_the_registry() {
        let registry = NpmRegistry::new("https://registry.npmjs.org").unwrap();
        assert_eq!(
            registry.package_url("@types/node").unwrap().as_str(),
            "https://registry.npmjs.org/@types/node"
        );

        let mirror = NpmRegistry::new("https://mirror.example.com/npm").unwrap();
        assert_eq!(
            mirror.package_url("left-pad").unwrap().as_str(),
            "https://mirror.example.com/npm/left-pad"
        );
    }

    #[test]
    fn status_text_becomes_the_error() {
        let err = check_status(StatusCode::NOT_FOUND).unwrap_err();
        assert_eq!(err.to_string(), "Not Found");
        assert!(check_status(StatusCode::OK).is_ok());
    }

    #[test]
    fn only_json_media_types_are_accepted() {
        assert!(check_content_type(Some("application/json; charset=utf-8")).is_ok());
        assert!(check_content_type(Some("application/vnd.npm.install-v1+json")).is_ok());

        let err = check_content_type(Some("text/plain")).unwrap_err();
        assert_eq!(err.to_string(), "Registry returned incompatible data");
        assert!(check_content_type(None).is_err());
    }

    #[test]
    fn empty_body_means_no_response() {
        let err = decode_body(b"", MAX_METADATA_BYTES).unwrap_err();
        assert_eq!(err.to_string(), "No response received");
        assert!(matches!(
            decode_body(b"not json", MAX_METADATA_BYTES),
            Err(RegistryError::Decode(_))
        ));
        assert_eq!(
            decode_body(b"{}", MAX_METADATA_BYTES).unwrap(),
            PackageMetadata::default()
        );
    }

    #[test]
    fn oversized_bodies_are_refused() {
        let err = check_length(Some(65), 64).unwrap_err();
        assert!(matches!(err, RegistryError::TooLarge { limit: 64 }));
        assert!(check_length(Some(64), 64).is_ok());
        assert!(check_length(None, 64).is_ok());

        let body = format!(r#"{{"name":"{}"}}"#, "a".repeat(64));
        assert!(matches!(
            decode_body(body.as_bytes(), 64),
            Err(RegistryError::TooLarge { .. })
        ));
    }

    #[test]
    fn unreachable_registry_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let registry = NpmRegistry::new(&address).unwrap();
        let err = registry.fetch("left-pad").unwrap_err();
        assert!(matches!(err, RegistryError::Transport { .. }));
    }

    #[test]
    fn fetches_metadata_over_http() {
        let body = r#"{"dist-tags":{"latest":"9.4.6"},"versions":{"8.9.2":{},"8.9.3":{},"8.9.4":{}}}"#;
        let (address, requests) = serve_once("200 OK", "application/json", body);

        let registry = NpmRegistry::new(&address).unwrap();
        let metadata = registry.fetch("@types/node").unwrap();

        assert_eq!(metadata.latest(), Some("9.4.6"));
        assert_eq!(metadata.known_versions(), ["8.9.2", "8.9.3", "8.9.4"]);
        assert_eq!(requests.recv().unwrap(), "GET /@types/node HTTP/1.1");
    }

    #[test]
    fn http_error_status_is_reported() {
        let (address, _requests) = serve_once("404 Not Found", "application/json", "{}");
        let registry = NpmRegistry::new(&address).unwrap();

        let err = registry.fetch("missing").unwrap_err();
        assert!(matches!(err, RegistryError::Status(ref text) if text == "Not Found"));
    }

    #[test]
    fn non_json_response_is_incompatible() {
        let (address, _requests) = serve_once("200 OK", "text/plain", "test");
        let registry = NpmRegistry::new(&address).unwrap();

        let err = registry.fetch("npdu").unwrap_err();
        assert!(matches!(err, RegistryError::IncompatibleData));
    }
}
