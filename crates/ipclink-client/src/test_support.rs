use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ipclink_transport::{Backoff, Endpoint, RetryPolicy};

use crate::connector::ConnectOptions;

/// A fresh directory under /tmp and an endpoint inside it named `name`.
pub(crate) fn unique_endpoint(name: &str) -> (PathBuf, Endpoint) {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let dir = PathBuf::from(format!(
        "/tmp/ilc-{}-{}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let endpoint = Endpoint::at_path(name, dir.join("ep.sock")).expect("endpoint path should fit");
    (dir, endpoint)
}

/// Connect options that retry quickly.
pub(crate) fn fast_options(max_retries: u32) -> ConnectOptions {
    ConnectOptions::default().with_retry(
        RetryPolicy::with_max_retries(max_retries)
            .with_backoff(Backoff::Fixed(Duration::from_millis(10))),
    )
}
