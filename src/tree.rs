//! The routing trie: a compressing radix tree over URL patterns. Each node
//! groups its children by segment kind, and matching tries the groups in a
//! fixed order so static literals always beat parameterized alternatives,
//! and parameters beat catch-alls. This is effectively a multidimensional
//! radix search across the kind groups.

use crate::context::RouteContext;
use crate::handler::BoxedHandler;
use crate::method::{self, MethodKind, M_STUB};
use crate::mux::Mux;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// Segment kinds, in match order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) enum NodeKind {
    Static = 0,   // /home
    Regex = 1,    // /{id:[0-9]+}
    Param = 2,    // /{user}
    CatchAll = 3, // /api/v1/*
}

const KINDS: [NodeKind; 4] = [
    NodeKind::Static,
    NodeKind::Regex,
    NodeKind::Param,
    NodeKind::CatchAll,
];

pub(crate) struct Node {
    /// The edge label from the parent. Static nodes hold literal bytes,
    /// regex nodes the anchored expression source; param and catch-all
    /// nodes only need their discriminator byte.
    prefix: String,

    /// First byte of the prefix, used for the binary search within the
    /// static group.
    label: u8,

    /// For parameterized nodes, the delimiter byte that terminates the
    /// capture.
    tail: u8,

    kind: NodeKind,

    /// Compiled matcher for regex nodes.
    rex: Option<Regex>,

    /// Method-bit to endpoint bindings; non-empty only on leaves.
    endpoints: HashMap<MethodKind, Endpoint>,

    /// A nested router reached through catch-all delegation, recorded at
    /// mount time for traversal and 404/405 propagation.
    pub(crate) sub_routes: Option<Mux>,

    /// Child nodes in-order for iteration, grouped by kind.
    children: [Vec<Node>; 4],
}

impl Default for Node {
    fn default() -> Node {
        Node {
            prefix: String::new(),
            label: 0,
            tail: 0,
            kind: NodeKind::Static,
            rex: None,
            endpoints: HashMap::new(),
            sub_routes: None,
            children: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }
}

#[derive(Default)]
pub(crate) struct Endpoint {
    pub(crate) handler: Option<BoxedHandler>,
    pub(crate) pattern: String,
    pub(crate) param_keys: Vec<String>,
}

/// A successful lookup: the endpoint handler plus the nested router on the
/// matched node, if any.
pub(crate) struct RouteMatch {
    pub(crate) handler: Option<BoxedHandler>,
    pub(crate) sub_routes: Option<Mux>,
}

/// Routing details of one leaf, as reported by [`Mux::routes`].
pub struct Route {
    /// The nested router mounted at this leaf, if any.
    pub sub_routes: Option<Mux>,
    /// Method name to handler bindings; the key `"*"` carries the
    /// any-method handler when one was registered.
    pub handlers: BTreeMap<String, BoxedHandler>,
    /// The routing pattern registered for this leaf.
    pub pattern: String,
}

/// The endpoint payload of one insertion, applied at the leaf the descent
/// terminates on.
struct NewEndpoint<'a> {
    method: MethodKind,
    pattern: &'a str,
    handler: BoxedHandler,
    sub_routes: Option<Mux>,
}

impl NewEndpoint<'_> {
    fn commit(&self, node: &mut Node) {
        node.set_endpoint(self.method, self.handler.clone(), self.pattern);
        if let Some(sub) = &self.sub_routes {
            node.sub_routes = Some(sub.clone());
        }
    }
}

impl Node {
    /// Installs `handler` under every method bit of `method` at the leaf
    /// identified by `pattern`, splitting edges as needed. Duplicate
    /// installs overwrite. Pattern validation failures panic; routes are
    /// meant to be registered at startup.
    pub(crate) fn insert_route(
        &mut self,
        method: MethodKind,
        pattern: &str,
        handler: BoxedHandler,
        sub_routes: Option<Mux>,
    ) {
        let endpoint = NewEndpoint {
            method,
            pattern,
            handler,
            sub_routes,
        };
        self.insert(&endpoint, pattern);
    }

    fn insert(&mut self, endpoint: &NewEndpoint<'_>, search: &str) {
        // key exhaustion: this node is the leaf
        if search.is_empty() {
            endpoint.commit(self);
            return;
        }

        let label = search.as_bytes()[0];
        let (seg_kind, seg_tail, seg_end, seg_rex) = if label == b'{' || label == b'*' {
            let seg = pat_next_segment(search);
            (seg.kind, seg.tail, seg.end, seg.rex)
        } else {
            (NodeKind::Static, 0, 0, String::new())
        };
        let rex_prefix = if seg_kind == NodeKind::Regex {
            seg_rex.as_str()
        } else {
            ""
        };

        let idx = match self.edge_index(seg_kind, label, seg_tail, rex_prefix) {
            Some(idx) => idx,
            None => {
                // no edge to attach to, create one
                let child = Node {
                    label,
                    tail: seg_tail,
                    prefix: search.to_string(),
                    ..Node::default()
                };
                self.add_child(child, search, endpoint);
                return;
            }
        };

        if seg_kind != NodeKind::Static {
            // the param group segment is already on the tree from a prior
            // insertion; trim it from the search and continue below it
            self.children[seg_kind as usize][idx].insert(endpoint, &search[seg_end..]);
            return;
        }

        let child = &mut self.children[NodeKind::Static as usize][idx];
        let common = longest_prefix(search, &child.prefix);
        if common == child.prefix.len() {
            child.insert(endpoint, &search[common..]);
            return;
        }

        // split the edge at the common prefix: a fresh intermediate node
        // takes the shared bytes and adopts the existing child
        let mut old = std::mem::take(child);
        let mut split = Node {
            kind: NodeKind::Static,
            label: old.label,
            tail: old.tail,
            prefix: search[..common].to_string(),
            ..Node::default()
        };
        old.label = old.prefix.as_bytes()[common];
        old.prefix = old.prefix[common..].to_string();
        split.attach(old);

        let rest = &search[common..];
        if rest.is_empty() {
            // the new pattern ends inside the split edge
            endpoint.commit(&mut split);
        } else {
            let sub = Node {
                kind: NodeKind::Static,
                label: rest.as_bytes()[0],
                prefix: rest.to_string(),
                ..Node::default()
            };
            split.add_child(sub, rest, endpoint);
        }
        self.children[NodeKind::Static as usize][idx] = split;
    }

    /// Attaches `child` under this node, recursively splitting `search`
    /// into typed nodes: the static run before a `{...}` or `*` group
    /// becomes one static edge, the group itself a param/regex/catch-all
    /// edge, and the remainder is handled by recursion. The endpoint is
    /// committed on the deepest node created.
    fn add_child(&mut self, mut child: Node, search: &str, endpoint: &NewEndpoint<'_>) {
        let seg = pat_next_segment(search);

        if seg.kind == NodeKind::Static {
            // the whole search prefix is static, the child is the leaf
            endpoint.commit(&mut child);
            self.attach(child);
            return;
        }

        if seg.start == 0 {
            // search begins with a param, regex or wildcard group
            if seg.kind == NodeKind::Regex {
                let rex = Regex::new(&seg.rex).unwrap_or_else(|_| {
                    panic!(
                        "trellis: invalid regexp pattern '{}' in route param",
                        seg.rex
                    )
                });
                child.prefix = seg.rex.clone();
                child.rex = Some(rex);
            }
            child.kind = seg.kind;
            child.tail = seg.tail;

            // adjacent param groups are impossible, so any remainder is
            // certainly a static edge next
            if seg.end < search.len() {
                let rest = &search[seg.end..];
                let next = Node {
                    kind: NodeKind::Static,
                    label: rest.as_bytes()[0],
                    prefix: rest.to_string(),
                    ..Node::default()
                };
                child.add_child(next, rest, endpoint);
            } else {
                endpoint.commit(&mut child);
            }
            self.attach(child);
            return;
        }

        // a static run leads up to the group: split it off, then attach
        // the group edge below it
        child.kind = NodeKind::Static;
        child.prefix = search[..seg.start].to_string();
        child.rex = None;

        let rest = &search[seg.start..];
        let next = Node {
            kind: seg.kind,
            label: rest.as_bytes()[0],
            tail: seg.tail,
            ..Node::default()
        };
        child.add_child(next, rest, endpoint);
        self.attach(child);
    }

    fn attach(&mut self, child: Node) {
        let kind = child.kind as usize;
        self.children[kind].push(child);
        self.children[kind].sort_by_key(|n| n.label);
        tail_sort(&mut self.children[kind]);
    }

    fn edge_index(&self, kind: NodeKind, label: u8, tail: u8, rex_prefix: &str) -> Option<usize> {
        self.children[kind as usize].iter().position(|n| {
            n.label == label
                && n.tail == tail
                && (kind != NodeKind::Regex || n.prefix == rex_prefix)
        })
    }

    fn is_leaf(&self) -> bool {
        !self.endpoints.is_empty()
    }

    fn set_endpoint(&mut self, method: MethodKind, handler: BoxedHandler, pattern: &str) {
        let param_keys = pat_param_keys(pattern);
        let all = method::all_methods();

        if method.contains(M_STUB) {
            self.endpoints.entry(M_STUB).or_default().handler = Some(handler.clone());
        }
        if method.contains(all) {
            let endpoint = self.endpoints.entry(all).or_default();
            endpoint.handler = Some(handler.clone());
            endpoint.pattern = pattern.to_string();
            endpoint.param_keys = param_keys.clone();
            for (_, kind) in method::registered_methods() {
                let endpoint = self.endpoints.entry(kind).or_default();
                endpoint.handler = Some(handler.clone());
                endpoint.pattern = pattern.to_string();
                endpoint.param_keys = param_keys.clone();
            }
        } else {
            let endpoint = self.endpoints.entry(method).or_default();
            endpoint.handler = Some(handler);
            endpoint.pattern = pattern.to_string();
            endpoint.param_keys = param_keys;
        }
    }

    /// Resolves `(method, path)` against the trie, recording captures and
    /// the matched pattern in `rctx`. `None` distinguishes "no route" from
    /// "route exists for another method" via the context's
    /// method-not-allowed flag.
    pub(crate) fn find_route(
        &self,
        rctx: &mut RouteContext,
        method: MethodKind,
        path: &str,
    ) -> Option<RouteMatch> {
        rctx.route_pattern.clear();
        rctx.route_params.keys.clear();
        rctx.route_params.values.clear();

        let node = self.walk_find(rctx, method, path)?;

        // promote the winning branch's captures into the params handlers see
        rctx.url_params
            .keys
            .extend(rctx.route_params.keys.iter().cloned());
        rctx.url_params
            .values
            .extend(rctx.route_params.values.iter().cloned());

        let endpoint = node.endpoints.get(&method)?;
        if !endpoint.pattern.is_empty() {
            rctx.route_pattern = endpoint.pattern.clone();
            rctx.route_patterns.push(rctx.route_pattern.clone());
        }

        Some(RouteMatch {
            handler: endpoint.handler.clone(),
            sub_routes: node.sub_routes.clone(),
        })
    }

    /// Recursive traversal of the kind groups. On return,
    /// `rctx.route_params.values` holds exactly one entry per matched
    /// parameter segment; abandoned branches are rewound before the next
    /// alternative is tried.
    fn walk_find<'n>(
        &'n self,
        rctx: &mut RouteContext,
        method: MethodKind,
        path: &str,
    ) -> Option<&'n Node> {
        for kind in KINDS {
            let nodes = &self.children[kind as usize];
            if nodes.is_empty() {
                continue;
            }

            match kind {
                NodeKind::Static => {
                    let label = path.as_bytes().first().copied().unwrap_or(0);
                    let child = match find_edge(nodes, label) {
                        Some(child) if path.starts_with(child.prefix.as_str()) => child,
                        _ => continue,
                    };

                    let rest = &path[child.prefix.len()..];
                    if rest.is_empty() {
                        if let Some(found) = child.leaf_for(rctx, method) {
                            return Some(found);
                        }
                    }
                    if let Some(found) = child.walk_find(rctx, method, rest) {
                        return Some(found);
                    }
                }

                NodeKind::Param | NodeKind::Regex => {
                    // empty param captures match nothing
                    if path.is_empty() {
                        continue;
                    }

                    // serially try each alternative, grouped by tail
                    // delimiter; tail-sort placed the '/'-terminated one last
                    for child in nodes {
                        let p = match path.bytes().position(|b| b == child.tail) {
                            Some(0) if kind == NodeKind::Regex => continue,
                            Some(p) => p,
                            None if child.tail == b'/' => path.len(),
                            None => continue,
                        };

                        let capture = &path[..p];
                        if let (NodeKind::Regex, Some(rex)) = (kind, child.rex.as_ref()) {
                            if !rex.is_match(capture) {
                                continue;
                            }
                        } else if capture.contains('/') {
                            // never capture across a path segment
                            continue;
                        }

                        let prev_len = rctx.route_params.values.len();
                        rctx.route_params.values.push(capture.to_string());

                        let rest = &path[p..];
                        if rest.is_empty() {
                            if let Some(found) = child.leaf_for(rctx, method) {
                                return Some(found);
                            }
                        }
                        if let Some(found) = child.walk_find(rctx, method, rest) {
                            return Some(found);
                        }

                        // dead branch, rewind the capture
                        rctx.route_params.values.truncate(prev_len);
                    }
                }

                NodeKind::CatchAll => {
                    // the remainder of the path, possibly empty, is the capture
                    let child = &nodes[0];
                    let prev_len = rctx.route_params.values.len();
                    rctx.route_params.values.push(path.to_string());
                    if let Some(found) = child.leaf_for(rctx, method) {
                        return Some(found);
                    }
                    rctx.route_params.values.truncate(prev_len);
                }
            }
        }

        None
    }

    /// Endpoint check on a fully-consumed path. A leaf without a handler
    /// for `method` flags the context instead of matching.
    fn leaf_for<'n>(&'n self, rctx: &mut RouteContext, method: MethodKind) -> Option<&'n Node> {
        if !self.is_leaf() {
            return None;
        }
        match self.endpoints.get(&method) {
            Some(endpoint) if endpoint.handler.is_some() => {
                rctx.route_params
                    .keys
                    .extend(endpoint.param_keys.iter().cloned());
                Some(self)
            }
            _ => {
                // the path resolves here, just not for this method
                rctx.method_not_allowed = true;
                None
            }
        }
    }

    /// Reports whether `pattern` already resolves within the trie. Used to
    /// refuse overlapping mounts.
    pub(crate) fn find_pattern(&self, pattern: &str) -> bool {
        let label = match pattern.as_bytes().first() {
            Some(&label) => label,
            None => return false,
        };

        for kind in KINDS {
            if self.children[kind as usize].is_empty() {
                continue;
            }
            let child = match self.kind_edge(kind, label) {
                Some(child) => child,
                None => continue,
            };

            let idx = match child.kind {
                NodeKind::Static => {
                    let idx = longest_prefix(pattern, &child.prefix);
                    if idx < child.prefix.len() {
                        continue;
                    }
                    idx
                }
                NodeKind::Param | NodeKind::Regex => match pattern.find('}') {
                    Some(i) => i + 1,
                    None => continue,
                },
                NodeKind::CatchAll => longest_prefix(pattern, "*"),
            };

            let rest = &pattern[idx..];
            if rest.is_empty() {
                return true;
            }
            return child.find_pattern(rest);
        }
        false
    }

    fn kind_edge(&self, kind: NodeKind, label: u8) -> Option<&Node> {
        let nodes = &self.children[kind as usize];
        match kind {
            NodeKind::CatchAll => nodes.first(),
            _ => find_edge(nodes, label),
        }
    }

    /// Visits every node carrying endpoints or a nested router; `visit`
    /// returns `true` to stop early. Traversal order is deterministic:
    /// within a node, groups in kind order, static children by label.
    fn walk_nodes(&self, visit: &mut dyn FnMut(&Node) -> bool) -> bool {
        if (self.is_leaf() || self.sub_routes.is_some()) && visit(self) {
            return true;
        }
        for group in &self.children {
            for child in group {
                if child.walk_nodes(visit) {
                    return true;
                }
            }
        }
        false
    }

    /// Collects routing information from the tree, grouping method
    /// handlers by their registered pattern.
    pub(crate) fn routes(&self) -> Vec<Route> {
        let all = method::all_methods();
        let mut routes = Vec::new();

        self.walk_nodes(&mut |node| {
            let stub = node
                .endpoints
                .get(&M_STUB)
                .and_then(|endpoint| endpoint.handler.as_ref());
            if stub.is_some() && node.sub_routes.is_none() {
                // a bare mount marker, the active endpoint lives under
                // the catch-all sibling
                return false;
            }

            let mut patterns: BTreeMap<&str, Vec<(MethodKind, &Endpoint)>> = BTreeMap::new();
            for (kind, endpoint) in &node.endpoints {
                if endpoint.pattern.is_empty() {
                    continue;
                }
                patterns
                    .entry(endpoint.pattern.as_str())
                    .or_default()
                    .push((*kind, endpoint));
            }

            for (pattern, endpoints) in patterns {
                let mut handlers = BTreeMap::new();
                for (kind, endpoint) in &endpoints {
                    let handler = match &endpoint.handler {
                        Some(handler) => handler,
                        None => continue,
                    };
                    if *kind == all {
                        handlers.insert("*".to_string(), handler.clone());
                        continue;
                    }
                    if let Some(name) = method::method_name(*kind) {
                        handlers.insert(name, handler.clone());
                    }
                }
                routes.push(Route {
                    sub_routes: node.sub_routes.clone(),
                    handlers,
                    pattern: pattern.to_string(),
                });
            }
            false
        });

        routes
    }
}

/// Binary search over the label byte within one sorted group.
fn find_edge(nodes: &[Node], label: u8) -> Option<&Node> {
    nodes
        .binary_search_by(|n| n.label.cmp(&label))
        .ok()
        .map(|idx| &nodes[idx])
}

/// Pushes the node with `/` as the tail to the end of the group for param
/// nodes. The list order determines the traversal order, so alternatives
/// with a distinct tail are tried first.
fn tail_sort(nodes: &mut [Node]) {
    for i in (0..nodes.len()).rev() {
        if nodes[i].kind > NodeKind::Static && nodes[i].tail == b'/' {
            let last = nodes.len() - 1;
            nodes.swap(i, last);
            return;
        }
    }
}

/// Length of the shared prefix of two strings.
fn longest_prefix(k1: &str, k2: &str) -> usize {
    k1.bytes()
        .zip(k2.bytes())
        .take_while(|(a, b)| a == b)
        .count()
}

/// One parsed pattern segment.
pub(crate) struct Segment<'p> {
    pub(crate) kind: NodeKind,
    pub(crate) key: &'p str,
    /// Anchored regex source for regex params, empty otherwise.
    pub(crate) rex: String,
    pub(crate) tail: u8,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

/// Scans the next segment of a routing pattern: the leading static bytes,
/// then either one `{...}` group or a final `*`.
pub(crate) fn pat_next_segment(pattern: &str) -> Segment<'_> {
    let ps = pattern.find('{');
    let ws = pattern.find('*');

    if ps.is_none() && ws.is_none() {
        // the entire pattern is static
        return Segment {
            kind: NodeKind::Static,
            key: "",
            rex: String::new(),
            tail: 0,
            start: 0,
            end: pattern.len(),
        };
    }

    if let (Some(ps), Some(ws)) = (ps, ws) {
        if ws < ps {
            panic!(
                "trellis: wildcard '*' must be the last pattern in a route, otherwise use a '{{param}}'"
            );
        }
    }

    if let Some(ps) = ps {
        let bytes = pattern.as_bytes();

        // read to the closing brace, tracking nested open/close pairs
        let mut depth = 0usize;
        let mut pe = ps;
        for (i, &b) in bytes[ps..].iter().enumerate() {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        pe = ps + i;
                        break;
                    }
                }
                _ => {}
            }
        }
        if pe == ps {
            panic!("trellis: route param closing delimiter '}}' is missing");
        }

        let mut key = &pattern[ps + 1..pe];
        let pe = pe + 1;

        let tail = if pe < pattern.len() { bytes[pe] } else { b'/' };

        let mut kind = NodeKind::Param;
        let mut rex = String::new();
        if let Some(idx) = key.find(':') {
            kind = NodeKind::Regex;
            rex = key[idx + 1..].to_string();
            key = &key[..idx];
        }

        if !rex.is_empty() {
            if !rex.starts_with('^') {
                rex.insert(0, '^');
            }
            if !rex.ends_with('$') {
                rex.push('$');
            }
        }

        return Segment {
            kind,
            key,
            rex,
            tail,
            start: ps,
            end: pe,
        };
    }

    // wildcard as the finale
    let ws = ws.unwrap_or(0);
    if ws < pattern.len() - 1 {
        panic!(
            "trellis: wildcard '*' must be the last value in a route. trim trailing text or use a '{{param}}' instead"
        );
    }
    Segment {
        kind: NodeKind::CatchAll,
        key: "*",
        rex: String::new(),
        tail: 0,
        start: ws,
        end: pattern.len(),
    }
}

/// Collects the ordered parameter names declared by `pattern`. Duplicate
/// names are a programmer error.
pub(crate) fn pat_param_keys(pattern: &str) -> Vec<String> {
    let mut pat = pattern;
    let mut keys: Vec<String> = Vec::new();
    loop {
        let seg = pat_next_segment(pat);
        if seg.kind == NodeKind::Static {
            return keys;
        }
        if keys.iter().any(|key| key == seg.key) {
            panic!(
                "trellis: routing pattern '{}' contains duplicate param key, '{}'",
                pattern, seg.key
            );
        }
        keys.push(seg.key.to_string());
        pat = &pat[seg.end..];
    }
}
