use fhub_kernel::prelude::FeatureError;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Serves HTTPS when set.
    pub tls: Option<TlsConfig>,
    /// Time open connections get to finish once a stop is requested.
    pub drain_timeout_ms: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            tls: None,
            drain_timeout_ms: 5_000,
        }
    }
}

impl HttpServerConfig {
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// PEM encoded certificate chain and private key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsConfig {
    /// Checks that both files exist and warns about a key readable by others.
    ///
    /// # Errors
    /// [`FeatureError::Config`] for a missing file, [`FeatureError::Io`] when
    /// the key metadata cannot be read.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if !self.cert.exists() {
            return Err(FeatureError::config(format!("TLS certificate not found at: {}", self.cert.display())));
        }
        if !self.key.exists() {
            return Err(FeatureError::config(format!("TLS key not found at: {}", self.key.display())));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = self.key.metadata()?;
            if metadata.permissions().mode() & 0o077 != 0 {
                tracing::warn!(
                    "SECURITY: TLS private key {} has insecure permissions (should be 600)",
                    self.key.display()
                );
            }
        }
        Ok(())
    }
}
