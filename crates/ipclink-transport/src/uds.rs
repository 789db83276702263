use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::retry::RetryPolicy;

/// Unix domain socket transport for named endpoints.
///
/// Bind/accept on the serving side, connect (optionally with retry) on the
/// client side. The socket file is removed on drop when it is still the one
/// this listener created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    /// Whether the path should be removed on drop.
    cleanup_on_drop: bool,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind and listen on the endpoint's socket path.
    ///
    /// If the path already exists and is a socket, it is removed first (stale
    /// socket cleanup). Must be called from within a tokio runtime.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_mode(endpoint, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind with an explicit permission mode.
    pub fn bind_with_mode(endpoint: &Endpoint, mode: u32) -> Result<Self> {
        let path = endpoint.path().to_path_buf();
        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        // Never remove non-socket files.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(endpoint = %endpoint, ?path, "listening on endpoint");

        Ok(Self {
            listener,
            path,
            created_inode: Some((created.dev(), created.ino())),
            cleanup_on_drop: true,
        })
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(stream)
    }

    /// Make a single connection attempt to an endpoint.
    pub async fn connect(endpoint: &Endpoint) -> Result<UnixStream> {
        let path = endpoint.path();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| TransportError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(endpoint = %endpoint, ?path, "connected to endpoint");
        Ok(stream)
    }

    /// Connect, retrying failed attempts as `policy` allows.
    ///
    /// With `silent` set, per-attempt failures are logged at debug level only.
    pub async fn connect_with_retry(
        endpoint: &Endpoint,
        policy: &RetryPolicy,
        silent: bool,
    ) -> Result<UnixStream> {
        let mut attempt = 1u32;
        loop {
            match UnixStream::connect(endpoint.path()).await {
                Ok(stream) => {
                    debug!(endpoint = %endpoint, attempt, "connected to endpoint");
                    return Ok(stream);
                }
                Err(source) => {
                    let Some(delay) = policy.delay_after(attempt) else {
                        return Err(TransportError::RetriesExhausted {
                            path: endpoint.path().to_path_buf(),
                            attempts: attempt,
                            source,
                        });
                    };
                    if silent {
                        debug!(endpoint = %endpoint, attempt, error = %source, ?delay, "connect failed, retrying");
                    } else {
                        warn!(endpoint = %endpoint, attempt, error = %source, ?delay, "connect failed, retrying");
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if !self.cleanup_on_drop {
            return;
        }
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}
