use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};

/// Default directory holding endpoint sockets.
pub const DEFAULT_SOCKET_ROOT: &str = "/tmp";

/// Default prefix prepended to every endpoint name.
pub const DEFAULT_APP_SPACE: &str = "app.";

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
pub(crate) const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
pub(crate) const MAX_PATH_LEN: usize = 104;

/// Where endpoint sockets live on this host.
///
/// An endpoint named `echo` resolves to `<socket_root>/<app_space>echo`,
/// i.e. `/tmp/app.echo` with the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Directory that contains the socket files.
    pub socket_root: PathBuf,
    /// Prefix for socket file names.
    pub app_space: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            socket_root: PathBuf::from(DEFAULT_SOCKET_ROOT),
            app_space: DEFAULT_APP_SPACE.to_string(),
        }
    }
}

impl EndpointConfig {
    /// Resolve `name` against this configuration.
    pub fn resolve(&self, name: &str) -> Result<Endpoint> {
        Endpoint::resolve(name, self)
    }
}

/// A named local endpoint and the socket path it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    name: String,
    path: PathBuf,
}

impl Endpoint {
    /// Resolve an endpoint name to its socket path.
    pub fn resolve(name: &str, config: &EndpointConfig) -> Result<Self> {
        validate_name(name)?;
        let path = config
            .socket_root
            .join(format!("{}{}", config.app_space, name));
        Self::at_path(name, path)
    }

    /// Use an explicit socket path for a named endpoint.
    pub fn at_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        let path = path.into();

        let len = path.as_os_str().len();
        if len >= MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: MAX_PATH_LEN,
            });
        }

        Ok(Self { name, path })
    }

    /// The endpoint name as callers know it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The socket path backing this endpoint.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.contains('/') || name.contains('\\') {
        "name must not contain path separators"
    } else if name.contains('\0') {
        "name must not contain NUL bytes"
    } else if name == "." || name == ".." {
        "name must not be a relative path component"
    } else {
        return Ok(());
    };

    Err(TransportError::InvalidEndpoint {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_with_default_layout() {
        let endpoint = Endpoint::resolve("echo", &EndpointConfig::default()).unwrap();
        assert_eq!(endpoint.name(), "echo");
        assert_eq!(endpoint.path(), Path::new("/tmp/app.echo"));
        assert_eq!(endpoint.to_string(), "echo");
    }

    #[test]
    fn resolves_with_custom_root_and_app_space() {
        let config = EndpointConfig {
            socket_root: PathBuf::from("/run/user/1000"),
            app_space: "svc-".to_string(),
        };
        let endpoint = config.resolve("worker").unwrap();
        assert_eq!(endpoint.path(), Path::new("/run/user/1000/svc-worker"));
    }

    #[test]
    fn rejects_bad_names() {
        let config = EndpointConfig::default();
        for name in ["", "a/b", "..", "nul\0byte"] {
            let result = config.resolve(name);
            assert!(
                matches!(result, Err(TransportError::InvalidEndpoint { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_path_too_long() {
        let name = "a".repeat(200);
        let result = Endpoint::resolve(&name, &EndpointConfig::default());
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }
}
