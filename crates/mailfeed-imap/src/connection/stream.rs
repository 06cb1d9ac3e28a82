//! Implicit-TLS transport.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::Result;

/// An implicit-TLS connection to the server.
pub type ImapStream = TlsStream<TcpStream>;

/// TLS connector trusting the bundled webpki roots.
///
/// Pins the aws-lc-rs provider, so it works whether or not a process-wide
/// default is installed and whichever other providers are compiled in.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens an implicit-TLS connection, usually on port 993.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tcp = TcpStream::connect((host, port)).await?;
    let tls = create_tls_connector()?.connect(server_name, tcp).await?;
    tracing::debug!(host, port, "TLS session established");
    Ok(tls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_builds_without_process_default_provider() {
        assert!(rustls::crypto::CryptoProvider::get_default().is_none());
        assert!(create_tls_connector().is_ok());
    }

    #[tokio::test]
    async fn invalid_host_name_is_rejected_before_dialing() {
        let err = connect_tls("not a host", 993).await;
        assert!(matches!(err, Err(crate::Error::InvalidDnsName(_))));
    }
}
