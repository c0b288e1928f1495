use std::io;
use std::path::Path;

use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TrustAnchorError {
    #[error("failed to read trust anchor bundle")]
    Read(#[from] io::Error),

    #[error("trust anchor bundle is not valid PEM")]
    InvalidPem(#[source] io::Error),

    #[error("trust anchor bundle contains no certificates")]
    Empty,
}

/// PEM bundle of trusted root certificates for the device transport.
///
/// The bootstrap only loads and validates the bundle; pinning it into a TLS
/// session is the device implementation's concern.
#[derive(Clone, Debug)]
pub struct TrustAnchor {
    pem: String,
    certificates: usize,
}

impl TrustAnchor {
    /// Load a PEM certificate bundle from disk.
    ///
    /// The bundle must contain at least one `CERTIFICATE` block. Non-PEM
    /// content around the blocks is tolerated.
    pub async fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, TrustAnchorError> {
        let path = path.as_ref();
        let contents = fs::read(path).await?;

        let certificates = rustls_pemfile::certs(&mut contents.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(TrustAnchorError::InvalidPem)?
            .len();

        if certificates == 0 {
            return Err(TrustAnchorError::Empty);
        }

        // PEM is ASCII; stray bytes outside the blocks are replaced
        let pem = String::from_utf8_lossy(&contents).into_owned();

        debug!(
            path = %path.display(),
            certificates,
            "loaded trust anchor bundle"
        );

        Ok(Self { pem, certificates })
    }

    #[allow(dead_code)]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Number of certificates in the bundle
    pub fn certificate_count(&self) -> usize {
        self.certificates
    }
}
