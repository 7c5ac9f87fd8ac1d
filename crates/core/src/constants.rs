//! Constants used throughout the attic core crate.

use std::num::NonZeroU32;

/// Default listen address for the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:5000";

/// Default directory for stored files when no explicit directory is configured.
pub const DEFAULT_STORE_DIR: &str = "uploads";

/// Realm announced in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "attic";

/// Separator for list-valued environment settings.
pub const LIST_SEPARATOR: char = ',';

/// Requests one client may make to the authenticated routes per minute.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: NonZeroU32 = NonZeroU32::new(64).unwrap();

/// Requests one client may make to the authenticated routes per day.
pub const DEFAULT_RATE_LIMIT_PER_DAY: NonZeroU32 = NonZeroU32::new(1024).unwrap();
