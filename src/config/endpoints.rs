//! Wire constants shared by the hosted transport and the CLI.

/// Port the native host binds its HTTP bridge to when nothing else is configured.
pub const DEFAULT_HOST_PORT: u16 = 48678;
pub const LOOPBACK_HOST: &str = "127.0.0.1";

pub const INVOKE_PATH: &str = "/api/invoke";
pub const EVENTS_PATH: &str = "/api/events";
pub const VERIFY_PATH: &str = "/api/auth/verify";
pub const HEALTH_PATH: &str = "/health";

/// Secondary credential header. Hosts that cannot read `Authorization`
/// (proxies that strip it, older bridge builds) look here instead, so every
/// authenticated request carries the token under both names.
pub const TOKEN_HEADER: &str = "x-symphony-token";
pub const TOKEN_QUERY_PARAM: &str = "token";
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Namespaced key the hosted-mode bearer token is persisted under.
pub const TOKEN_STORAGE_KEY: &str = "symphony:web-auth-token";

/// Returned by `get_version` in hosted mode when the host does not report one.
pub const HOSTED_VERSION_PLACEHOLDER: &str = "hosted-web";

pub const HOST_URL_ENV: &str = "SYMPHONY_HOST_URL";
pub const PAGE_HOST_ENV: &str = "SYMPHONY_PAGE_HOST";
pub const TOKEN_IN_QUERY_ENV: &str = "SYMPHONY_EVENTS_TOKEN_IN_QUERY";
pub const DATA_DIR_ENV: &str = "SYMPHONY_DATA_DIR";
