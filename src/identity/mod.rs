//! Identity side of the console: who is signed in, what their role may do.
//! Keep the public surface thin and split implementation across sub-modules.

pub mod audit;
pub mod authorizer;
pub mod catalog;
pub mod permissions;
pub mod principal;
pub mod provider;
pub mod session;
pub mod storage;

pub use audit::{ActivityAction, ActivityEvent, AuditSink, NoopAudit};
pub use authorizer::{normalize_role_name, role_matches, Authorizer, PermissionRequirement};
pub use catalog::{CatalogLoader, PermissionCatalog};
pub use principal::{EntityId, LoginReply, Role, UserProfile};
pub use provider::{AuthProvider, LoginRequest, PermissionRecord, RoleDetail, RoleDirectory, RoleSummary};
pub use session::{SessionOptions, SessionState, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, AUTH_TOKEN_KEY, AUTH_USER_KEY};
