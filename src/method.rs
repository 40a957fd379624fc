//! HTTP methods as bit flags, plus the process-wide registry that maps
//! method names to bits. The registry starts with the nine standard
//! methods and can be extended at startup through [`register_method`].

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ops::{BitAnd, BitOr};
use std::sync::{PoisonError, RwLock};

/// A set of HTTP methods, one bit per method.
///
/// The stub bit marks mount points: their handlers exist for introspection
/// and delegation but are not method-specific endpoints by themselves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub(crate) struct MethodKind(pub(crate) u32);

pub(crate) const M_STUB: MethodKind = MethodKind(1);
pub(crate) const M_CONNECT: MethodKind = MethodKind(1 << 1);
pub(crate) const M_DELETE: MethodKind = MethodKind(1 << 2);
pub(crate) const M_GET: MethodKind = MethodKind(1 << 3);
pub(crate) const M_HEAD: MethodKind = MethodKind(1 << 4);
pub(crate) const M_OPTIONS: MethodKind = MethodKind(1 << 5);
pub(crate) const M_PATCH: MethodKind = MethodKind(1 << 6);
pub(crate) const M_POST: MethodKind = MethodKind(1 << 7);
pub(crate) const M_PUT: MethodKind = MethodKind(1 << 8);
pub(crate) const M_TRACE: MethodKind = MethodKind(1 << 9);

impl MethodKind {
    pub(crate) fn contains(self, other: MethodKind) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MethodKind {
    type Output = MethodKind;

    fn bitor(self, rhs: MethodKind) -> MethodKind {
        MethodKind(self.0 | rhs.0)
    }
}

impl BitAnd for MethodKind {
    type Output = MethodKind;

    fn bitand(self, rhs: MethodKind) -> MethodKind {
        MethodKind(self.0 & rhs.0)
    }
}

struct MethodRegistry {
    map: HashMap<String, MethodKind>,
    all: MethodKind,
}

static REGISTRY: Lazy<RwLock<MethodRegistry>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("CONNECT".to_string(), M_CONNECT);
    map.insert("DELETE".to_string(), M_DELETE);
    map.insert("GET".to_string(), M_GET);
    map.insert("HEAD".to_string(), M_HEAD);
    map.insert("OPTIONS".to_string(), M_OPTIONS);
    map.insert("PATCH".to_string(), M_PATCH);
    map.insert("POST".to_string(), M_POST);
    map.insert("PUT".to_string(), M_PUT);
    map.insert("TRACE".to_string(), M_TRACE);

    let all = M_CONNECT
        | M_DELETE
        | M_GET
        | M_HEAD
        | M_OPTIONS
        | M_PATCH
        | M_POST
        | M_PUT
        | M_TRACE;

    RwLock::new(MethodRegistry { map, all })
});

/// Adds `method` to the set of recognized HTTP method names so routes can
/// be registered against it. Standard methods are always recognized;
/// calling this with one of them (or twice with the same name) is a no-op.
///
/// Like route registration, this is meant for startup, before requests are
/// served.
pub fn register_method(method: &str) {
    if method.is_empty() {
        return;
    }

    let name = method.to_uppercase();
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if registry.map.contains_key(&name) {
        return;
    }

    let n = registry.map.len() as u32;
    if n > 30 {
        panic!("trellis: maximum number of http methods reached ({})", n);
    }

    let kind = MethodKind(2 << n);
    registry.map.insert(name, kind);
    registry.all = registry.all | kind;
}

/// Looks up the bit for an upper-case method name.
pub(crate) fn method_kind(name: &str) -> Option<MethodKind> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry.map.get(name).copied()
}

/// Reverse lookup of a single method bit, used when enumerating routes.
pub(crate) fn method_name(kind: MethodKind) -> Option<String> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .map
        .iter()
        .find(|(_, k)| **k == kind)
        .map(|(name, _)| name.clone())
}

/// The union of every recognized method bit, including registered ones.
pub(crate) fn all_methods() -> MethodKind {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner).all
}

/// Snapshot of the registered (name, bit) pairs, sorted by name.
pub(crate) fn registered_methods() -> Vec<(String, MethodKind)> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let mut methods: Vec<_> = registry
        .map
        .iter()
        .map(|(name, kind)| (name.clone(), *kind))
        .collect();
    methods.sort_by(|a, b| a.0.cmp(&b.0));
    methods
}
