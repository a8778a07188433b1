use crate::core::models::Protocol;

/// Sensitive paths requested on every target.
pub const PATH_CATALOG: &[&str] = &[
    "/robots.txt",
    "/.git/HEAD",
    "/.git/config",
    "/.env",
    "/admin",
    "/config.php",
    "/server-status",
    "/server-info",
    "/phpinfo.php",
    "/.DS_Store",
    "/backup",
    "/.htaccess",
];

/// Ports whose banner is captured on every target.
pub const BANNER_CATALOG: &[(u16, Protocol)] = &[
    (22, Protocol::Ssh),
    (21, Protocol::Ftp),
    (25, Protocol::Smtp),
    (5222, Protocol::Xmpp),
    (8333, Protocol::Bitcoin),
    (6667, Protocol::Irc),
    (5900, Protocol::Vnc),
    (27017, Protocol::Mongodb),
];

/// Response headers copied into the report's metadata section.
pub const METADATA_HEADERS: &[&str] = &[
    "Server",
    "X-Powered-By",
    "X-AspNet-Version",
    "X-Generator",
    "Via",
];

/// Port the certificate inspector dials when the base fetch was plain http.
pub const TLS_PORT: u16 = 443;
