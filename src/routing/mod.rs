//! Declarative route table for the console.
//!
//! Records nest like a layout tree; leaves and named parents without an index child
//! are matchable. A match carries the metadata of every record on its chain so the guard
//! can flatten requirements declared on layouts and pages alike.

pub mod console;
pub mod guard;
pub mod navigator;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GateError, GateResult};

pub use guard::{NavigationDecision, NavigationGuard};
pub use navigator::{NavigationOutcome, Navigator};

fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(d)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

/// Per-record metadata; the only fields the guard reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default, alias = "requiredRole", deserialize_with = "one_or_many")]
    pub required_roles: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub required_permissions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteRecord {
    pub path: String,
    pub name: Option<String>,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new<S: Into<String>>(path: S) -> Self { RouteRecord { path: path.into(), ..Default::default() } }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.meta.requires_auth = true;
        self
    }

    pub fn roles<I: IntoIterator<Item = S>, S: Into<String>>(mut self, roles: I) -> Self {
        self.meta.required_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn permissions<I: IntoIterator<Item = S>, S: Into<String>>(mut self, perms: I) -> Self {
        self.meta.required_permissions.extend(perms.into_iter().map(Into::into));
        self
    }

    pub fn children(mut self, children: Vec<RouteRecord>) -> Self {
        self.children = children;
        self
    }
}

/// Union of the requirements along a matched chain. Declaring roles or permissions implies auth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveRequirement {
    pub requires_auth: bool,
    pub required_roles: Vec<String>,
    pub required_permissions: Vec<String>,
}

impl EffectiveRequirement {
    pub fn flatten(chain: &[RouteMeta]) -> Self {
        let mut out = EffectiveRequirement::default();
        for meta in chain {
            out.requires_auth |= meta.requires_auth;
            for r in &meta.required_roles {
                if !out.required_roles.contains(r) {
                    out.required_roles.push(r.clone());
                }
            }
            for p in &meta.required_permissions {
                if !out.required_permissions.contains(p) {
                    out.required_permissions.push(p.clone());
                }
            }
        }
        out.requires_auth |= !out.required_roles.is_empty() || !out.required_permissions.is_empty();
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Path(String),
    Named { name: String, params: BTreeMap<String, String> },
}

/// Where a navigation wants to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub target: Target,
    pub query: BTreeMap<String, String>,
}

impl Location {
    /// Parses `path?k=v&...`; query values are percent-decoded.
    pub fn path(raw: &str) -> Self {
        let (path, query) = match raw.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (raw, BTreeMap::new()),
        };
        Location { target: Target::Path(path.to_string()), query }
    }

    pub fn named<S: Into<String>>(name: S) -> Self {
        Location { target: Target::Named { name: name.into(), params: BTreeMap::new() }, query: BTreeMap::new() }
    }

    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, k: K, v: V) -> Self {
        if let Target::Named { params, .. } = &mut self.target {
            params.insert(k.into(), v.into());
        }
        self
    }

    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, k: K, v: V) -> Self {
        self.query.insert(k.into(), v.into());
        self
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self { Location::path(raw) }
}

fn decode(s: &str) -> String {
    let plus = s.replace('+', " ");
    urlencoding::decode(&plus).map(|c| c.into_owned()).unwrap_or(plus)
}

fn parse_query(q: &str) -> BTreeMap<String, String> {
    q.split('&')
        .filter(|kv| !kv.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(kv), String::new()),
        })
        .collect()
}

fn encode_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Resolved navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub name: Option<String>,
    pub path: String,
    /// Path plus encoded query; what a return-to redirect carries.
    pub full_path: String,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    /// Metadata of the matched chain, outermost first.
    pub matched: Vec<RouteMeta>,
}

impl RouteMatch {
    pub fn requirement(&self) -> EffectiveRequirement { EffectiveRequirement::flatten(&self.matched) }
    pub fn is_named(&self, name: &str) -> bool { self.name.as_deref() == Some(name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    CatchAll = 1,
    Param = 2,
    Static = 3,
}

#[derive(Debug)]
struct CompiledRoute {
    name: Option<String>,
    pattern: String,
    regex: Regex,
    params: Vec<String>,
    chain: Vec<RouteMeta>,
    rank: (bool, Reverse<Vec<Segment>>),
}

fn join_path(parent: &str, child: &str) -> String {
    let joined = if child.starts_with('/') {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), child)
    };
    normalize_path(&joined)
}

fn normalize_path(p: &str) -> String {
    let trimmed = p.trim();
    let with_root = if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{}", trimmed) };
    let stripped = with_root.trim_end_matches('/');
    if stripped.is_empty() { "/".to_string() } else { stripped.to_string() }
}

fn compile(pattern: &str) -> GateResult<(Regex, Vec<String>, Vec<Segment>)> {
    let mut re = String::from("^");
    let mut params = Vec::new();
    let mut kinds = Vec::new();
    for seg in pattern.split('/').filter(|s| !s.is_empty()) {
        if let Some(p) = seg.strip_prefix(':') {
            if let Some(name) = p.strip_suffix("(.*)") {
                re.push_str("(?:/(.*))?");
                params.push(name.to_string());
                kinds.push(Segment::CatchAll);
            } else {
                re.push_str("/([^/]+)");
                params.push(p.to_string());
                kinds.push(Segment::Param);
            }
        } else {
            re.push('/');
            re.push_str(&regex::escape(seg));
            kinds.push(Segment::Static);
        }
    }
    if kinds.is_empty() {
        re.push('/');
    }
    re.push('$');
    let regex = Regex::new(&re).map_err(|e| GateError::configuration(format!("bad route pattern '{}': {}", pattern, e)))?;
    Ok((regex, params, kinds))
}

#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(records: Vec<RouteRecord>) -> GateResult<Self> {
        let mut routes = Vec::new();
        for r in &records {
            Self::collect(r, "/", &[], &mut routes)?;
        }
        // stable: declaration order breaks ties
        routes.sort_by(|a, b| a.rank.cmp(&b.rank));
        Ok(RouteTable { routes })
    }

    fn collect(rec: &RouteRecord, parent: &str, chain: &[RouteMeta], out: &mut Vec<CompiledRoute>) -> GateResult<()> {
        let pattern = join_path(parent, &rec.path);
        let mut chain = chain.to_vec();
        chain.push(rec.meta.clone());
        // a named parent is shadowed by a child mounted on its own path
        let matchable = rec.children.is_empty() || (rec.name.is_some() && !rec.children.iter().any(|c| c.path.is_empty()));
        if matchable {
            let (regex, params, kinds) = compile(&pattern)?;
            let catch_all = kinds.contains(&Segment::CatchAll);
            out.push(CompiledRoute { name: rec.name.clone(), pattern: pattern.clone(), regex, params, chain: chain.clone(), rank: (catch_all, Reverse(kinds)) });
        }
        for child in &rec.children {
            Self::collect(child, &pattern, &chain, out)?;
        }
        Ok(())
    }

    pub fn resolve(&self, loc: &Location) -> GateResult<RouteMatch> {
        let (route, path, params) = match &loc.target {
            Target::Path(raw) => {
                let path = normalize_path(raw);
                let found = self.routes.iter().find_map(|r| r.regex.captures(&path).map(|caps| (r, caps)));
                let Some((route, caps)) = found else {
                    return Err(GateError::route_not_found(path));
                };
                let params = route
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), caps.get(i + 1).map(|m| decode(m.as_str())).unwrap_or_default()))
                    .collect();
                (route, path.clone(), params)
            }
            Target::Named { name, params } => {
                let route = self
                    .routes
                    .iter()
                    .find(|r| r.name.as_deref() == Some(name.as_str()))
                    .ok_or_else(|| GateError::route_not_found(format!("name '{}'", name)))?;
                (route, Self::fill(route, params)?, params.clone())
            }
        };
        let full_path = if loc.query.is_empty() { path.clone() } else { format!("{}?{}", path, encode_query(&loc.query)) };
        Ok(RouteMatch { name: route.name.clone(), path, full_path, params, query: loc.query.clone(), matched: route.chain.clone() })
    }

    fn fill(route: &CompiledRoute, params: &BTreeMap<String, String>) -> GateResult<String> {
        let mut out = String::new();
        for seg in route.pattern.split('/').filter(|s| !s.is_empty()) {
            match seg.strip_prefix(':') {
                Some(p) => {
                    let (key, catch_all) = match p.strip_suffix("(.*)") {
                        Some(k) => (k, true),
                        None => (p, false),
                    };
                    match params.get(key) {
                        Some(v) if catch_all => {
                            if !v.is_empty() {
                                out.push('/');
                                out.push_str(v.trim_start_matches('/'));
                            }
                        }
                        Some(v) if !v.is_empty() => {
                            out.push('/');
                            out.push_str(&urlencoding::encode(v));
                        }
                        _ if catch_all => {}
                        _ => return Err(GateError::route_not_found(format!("{} (missing param '{}')", route.pattern, key))),
                    }
                }
                None => {
                    out.push('/');
                    out.push_str(seg);
                }
            }
        }
        Ok(if out.is_empty() { "/".into() } else { out })
    }

    /// (name, pattern, effective requirement) per matchable route, in match priority order.
    pub fn entries(&self) -> impl Iterator<Item = (Option<&str>, &str, EffectiveRequirement)> + '_ {
        self.routes.iter().map(|r| (r.name.as_deref(), r.pattern.as_str(), EffectiveRequirement::flatten(&r.chain)))
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}
