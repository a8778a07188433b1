use crate::core::errors::{CertificateError, ConnectError};
use crate::core::models::CertificateInfo;
use crate::executors::socks::Connector;
use anyhow::{Context, Result};
use chrono::DateTime;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::time::ASN1Time;

/// Reads the leaf certificate of a TLS endpoint reached through the proxy.
/// Nothing is verified: self-signed and expired certificates are exactly
/// what an audit wants to see.
pub struct CertificateInspector {
    connector: Arc<dyn Connector>,
    tls: TlsConnector,
}

impl CertificateInspector {
    pub fn new(connector: Arc<dyn Connector>) -> Result<Self> {
        let provider = Arc::new(ring::default_provider());
        let verifier = AcceptAnyCertificate {
            schemes: provider.signature_verification_algorithms.supported_schemes(),
        };

        let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(Self {
            connector,
            tls: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Connect and handshake are each bounded by `limit`.
    pub async fn inspect(&self, host: &str, port: u16, limit: Duration) -> Result<CertificateInfo, CertificateError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| CertificateError::Connect(ConnectError::InvalidAddress(host.to_string())))?;

        let stream = self.connector.connect(host, port, limit).await?;

        let tls = match timeout(limit, self.tls.connect(server_name, stream)).await {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => return Err(CertificateError::Handshake(e.to_string())),
            Err(_) => return Err(CertificateError::Handshake("handshake timed out".to_string())),
        };

        let (_, session) = tls.get_ref();
        let leaf = session
            .peer_certificates()
            .and_then(|chain| chain.first())
            .ok_or(CertificateError::NoCertificate)?;

        tracing::debug!("Captured certificate from {}:{} ({} bytes)", host, port, leaf.len());
        parse_certificate(leaf.as_ref())
    }
}

/// Extracts the report fields from a DER-encoded certificate.
pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, CertificateError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| CertificateError::Parse(format!("{:?}", e)))?;

    let mut subject_alt_names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => subject_alt_names.push(dns.to_string()),
                GeneralName::IPAddress(ip) => subject_alt_names.push(format!("IP:{}", hex::encode(ip))),
                GeneralName::RFC822Name(mail) => subject_alt_names.push(format!("email:{}", mail)),
                _ => {}
            }
        }
    }

    let validity = cert.validity();

    Ok(CertificateInfo {
        issuer: cert.issuer().to_string(),
        subject: cert.subject().to_string(),
        not_before: rfc3339(&validity.not_before),
        not_after: rfc3339(&validity.not_after),
        serial: format!("{:x}", cert.serial),
        signature_algorithm: signature_name(&cert.signature_algorithm.algorithm.to_id_string()),
        fingerprint_sha256: hex::encode(Sha256::digest(der)),
        subject_alt_names,
    })
}

fn rfc3339(time: &ASN1Time) -> String {
    DateTime::from_timestamp(time.timestamp(), 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| time.to_string())
}

fn signature_name(oid: &str) -> String {
    let name = match oid {
        "1.2.840.113549.1.1.4" => "md5WithRSAEncryption",
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption",
        "1.2.840.113549.1.1.10" => "rsassaPss",
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption",
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption",
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption",
        "1.2.840.10045.4.1" => "ecdsa-with-SHA1",
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256",
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384",
        "1.2.840.10045.4.3.4" => "ecdsa-with-SHA512",
        "1.3.101.112" => "Ed25519",
        "1.3.101.113" => "Ed448",
        other => other,
    };
    name.to_string()
}

#[derive(Debug)]
struct AcceptAnyCertificate {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}
