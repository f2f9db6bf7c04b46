use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend identifiers arrive as numbers (database ids) or strings (`role_superadmin`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self { EntityId::Number(v) }
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self { EntityId::Text(v.to_string()) }
}

/// Canonical role shape. Every other shape is folded into this one at the session boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: String,
}

impl Role {
    pub fn named<S: Into<String>>(name: S) -> Self { Role { id: None, name: name.into() } }
    pub fn with_id<S: Into<String>>(id: EntityId, name: S) -> Self { Role { id: Some(id), name: name.into() } }
}

/// Role as the backend or an old persisted profile may send it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRole {
    Name(String),
    Object {
        #[serde(default)]
        id: Option<EntityId>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "roleName")]
        role_name: Option<String>,
    },
}

impl RawRole {
    /// `None` when the value carries neither an id nor a usable name.
    pub fn normalize(self) -> Option<Role> {
        match self {
            RawRole::Name(name) => {
                let name = name.trim().to_string();
                if name.is_empty() { None } else { Some(Role::named(name)) }
            }
            RawRole::Object { id, name, role_name } => {
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .or(role_name.filter(|n| !n.trim().is_empty()))
                    .map(|n| n.trim().to_string())
                    .unwrap_or_default();
                if id.is_none() && name.is_empty() { None } else { Some(Role { id, name }) }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    #[serde(default)]
    id: Option<EntityId>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Option<RawRole>,
}

/// Profile of the signed-in user. Deserializing always goes through role normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireUser", rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Option<EntityId>,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
}

impl From<WireUser> for UserProfile {
    fn from(w: WireUser) -> Self {
        UserProfile {
            id: w.id,
            username: w.username.unwrap_or_default(),
            email: w.email,
            full_name: w.full_name,
            role: w.role.and_then(RawRole::normalize),
        }
    }
}

impl UserProfile {
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.name.as_str()).filter(|n| !n.is_empty())
    }
}

/// Body of a successful `POST /auth/login`.
/// Accepts both the flat shape (`{token, id, username, ..., role}`) and the nested one (`{token, user}`).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginReply {
    pub token: String,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(flatten)]
    flat: WireUser,
}

impl LoginReply {
    pub fn into_parts(self) -> (String, UserProfile) {
        let profile = match self.user {
            Some(u) => u,
            None => self.flat.into(),
        };
        (self.token, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> UserProfile { serde_json::from_value(v).unwrap() }

    #[test]
    fn string_role_becomes_named_role() {
        let u = parse(json!({"id": 7, "username": "ana", "role": "ADMIN"}));
        assert_eq!(u.role, Some(Role::named("ADMIN")));
        assert_eq!(u.id, Some(EntityId::Number(7)));
    }

    #[test]
    fn role_name_falls_back_to_role_name_field() {
        let u = parse(json!({"username": "ana", "role": {"id": 3, "roleName": "MANAGER"}}));
        assert_eq!(u.role, Some(Role::with_id(EntityId::Number(3), "MANAGER")));
        let u = parse(json!({"username": "ana", "role": {"id": "role_viewer", "name": "", "roleName": "VIEWER"}}));
        assert_eq!(u.role_name(), Some("VIEWER"));
    }

    #[test]
    fn empty_role_shapes_normalize_to_none() {
        assert_eq!(parse(json!({"username": "x", "role": ""})).role, None);
        assert_eq!(parse(json!({"username": "x", "role": {}})).role, None);
        assert_eq!(parse(json!({"username": "x", "role": null})).role, None);
        assert_eq!(parse(json!({})).role, None);
    }

    #[test]
    fn role_with_id_only_is_kept() {
        let u = parse(json!({"role": {"id": 9}}));
        assert_eq!(u.role, Some(Role { id: Some(EntityId::Number(9)), name: String::new() }));
        assert_eq!(u.role_name(), None);
    }

    #[test]
    fn canonical_profile_survives_persistence() {
        let u = parse(json!({"id": "u1", "username": "demo", "email": "demo@example.com", "fullName": "Demo", "role": "SUPERADMIN"}));
        let text = serde_json::to_string(&u).unwrap();
        assert!(text.contains("\"fullName\":\"Demo\""));
        let back: UserProfile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn login_reply_flat_and_nested() {
        let flat: LoginReply = serde_json::from_value(json!({
            "token": "t1", "id": 1, "username": "ana", "email": "a@x", "fullName": "Ana", "role": {"roleName": "ADMINISTRADOR"}
        })).unwrap();
        let (tok, u) = flat.into_parts();
        assert_eq!(tok, "t1");
        assert_eq!(u.username, "ana");
        assert_eq!(u.role_name(), Some("ADMINISTRADOR"));

        let nested: LoginReply = serde_json::from_value(json!({
            "token": "t2", "user": {"id": "demo_user", "username": "demo", "role": {"id": "role_superadmin", "name": "SUPERADMIN"}}
        })).unwrap();
        let (tok, u) = nested.into_parts();
        assert_eq!(tok, "t2");
        assert_eq!(u.role, Some(Role::with_id(EntityId::from("role_superadmin"), "SUPERADMIN")));
    }

    #[test]
    fn login_reply_requires_token() {
        assert!(serde_json::from_value::<LoginReply>(json!({"username": "ana"})).is_err());
    }
}
