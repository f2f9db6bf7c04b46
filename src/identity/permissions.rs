//! Permission names the console's routes and controls are declared against.

pub const DOCUMENT_READ: &str = "DOCUMENT_READ";
pub const DOCUMENT_CREATE: &str = "DOCUMENT_CREATE";
pub const DOCUMENT_UPDATE: &str = "DOCUMENT_UPDATE";
pub const DOCUMENT_DELETE: &str = "DOCUMENT_DELETE";
pub const FILE_DOWNLOAD: &str = "FILE_DOWNLOAD";

pub const USER_READ: &str = "USER_READ";
pub const USER_CREATE: &str = "USER_CREATE";
pub const USER_UPDATE: &str = "USER_UPDATE";
pub const USER_DELETE: &str = "USER_DELETE";

pub const SYSTEM_CONFIG: &str = "SYSTEM_CONFIG";
pub const LOG_READ: &str = "LOG_READ";
pub const TAG_MANAGE: &str = "TAG_MANAGE";
pub const TYPE_MANAGE: &str = "TYPE_MANAGE";

pub const INVENTORY_READ: &str = "INVENTORY_READ";
pub const INVENTORY_CREATE: &str = "INVENTORY_CREATE";
pub const INVENTORY_UPDATE: &str = "INVENTORY_UPDATE";
pub const INVENTORY_DELETE: &str = "INVENTORY_DELETE";

pub const TRANSFER_READ: &str = "TRANSFER_READ";
pub const TRANSFER_CREATE: &str = "TRANSFER_CREATE";
pub const TRANSFER_UPDATE: &str = "TRANSFER_UPDATE";
pub const TRANSFER_DELETE: &str = "TRANSFER_DELETE";

pub const ALL: &[&str] = &[
    DOCUMENT_READ, DOCUMENT_CREATE, DOCUMENT_UPDATE, DOCUMENT_DELETE, FILE_DOWNLOAD,
    USER_READ, USER_CREATE, USER_UPDATE, USER_DELETE,
    SYSTEM_CONFIG, LOG_READ, TAG_MANAGE, TYPE_MANAGE,
    INVENTORY_READ, INVENTORY_CREATE, INVENTORY_UPDATE, INVENTORY_DELETE,
    TRANSFER_READ, TRANSFER_CREATE, TRANSFER_UPDATE, TRANSFER_DELETE,
];

/// Uppercased, trimmed form used for every permission comparison.
pub fn normalize_permission(name: &str) -> String { name.trim().to_uppercase() }
