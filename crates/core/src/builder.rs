//! `GraphBuilder`: expands a set of requested root task names into a fully
//! wired set of [`TaskProxy`]s, detecting unknown references and cycles
//! before anything runs (spec §4.2).

use crate::error::{Error, GraphError};
use crate::proxy::TaskProxy;
use crate::task::TaskRegistry;
use kiln_graph::{Graph, NodeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The fully expanded, wired, and cycle-checked set of proxies for one
/// build invocation.
pub struct BuiltGraph {
    proxies: HashMap<String, Arc<TaskProxy>>,
    roots: Vec<String>,
}

impl BuiltGraph {
    /// Look up a proxy by qualified name.
    #[must_use]
    pub fn get(&self, qualified_name: &str) -> Option<Arc<TaskProxy>> {
        self.proxies.get(qualified_name).cloned()
    }

    /// The proxies corresponding to the requested root names, in request order.
    #[must_use]
    pub fn roots(&self) -> Vec<Arc<TaskProxy>> {
        self.roots
            .iter()
            .filter_map(|name| self.proxies.get(name).cloned())
            .collect()
    }

    /// Every proxy reached during expansion, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<TaskProxy>> {
        self.proxies.values().cloned().collect()
    }
}

/// Walks `name`'s `extends` chain to its ultimate non-extension root (spec
/// §4.3 step 3): requirement edges of an extender are wired to this root
/// rather than to the extender itself, so "the extender's children become
/// the host's children." Bounded by the proxy count as a guard against a
/// cyclic `extends` chain, which `find_cycle` has no visibility into since
/// `extends` edges aren't part of the cycle-detection graph.
fn ultimate_root(proxies: &HashMap<String, Arc<TaskProxy>>, name: &str) -> String {
    let mut current = name.to_string();
    for _ in 0..=proxies.len() {
        match proxies[&current].task().extends() {
            Some(host) => current = host.to_string(),
            None => return current,
        }
    }
    current
}

/// Expands requested task names into a [`BuiltGraph`].
pub struct GraphBuilder<'a> {
    registry: &'a dyn TaskRegistry,
}

impl<'a> GraphBuilder<'a> {
    /// Build against the given task registry.
    #[must_use]
    pub fn new(registry: &'a dyn TaskRegistry) -> Self {
        Self { registry }
    }

    /// Expand `roots` through their `requires`/`extends` closure, dedup by
    /// qualified name, wire every edge, and reject unknown references or
    /// dependency cycles.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownTask`] if a `requires`/`extends` edge
    /// names a task the registry doesn't have, or [`GraphError::Cycle`] if
    /// the `requires` closure of the requested roots contains a cycle.
    pub fn build(&self, roots: &[String]) -> Result<BuiltGraph, Error> {
        let mut proxies: HashMap<String, Arc<TaskProxy>> = HashMap::new();
        let mut graph: Graph<String> = Graph::new();
        let mut node_ids: HashMap<String, NodeId> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut stack: Vec<(String, String)> = roots
            .iter()
            .map(|r| (r.clone(), "<requested root>".to_string()))
            .collect();

        while let Some((name, referenced_by)) = stack.pop() {
            if seen.contains(&name) {
                continue;
            }
            seen.insert(name.clone());

            let task = self
                .registry
                .get(&name)
                .ok_or_else(|| GraphError::UnknownTask {
                    name: name.clone(),
                    referenced_by: referenced_by.clone(),
                })?;

            let node = graph.add_node(name.clone());
            node_ids.insert(name.clone(), node);
            proxies.insert(name.clone(), TaskProxy::new(task.clone()));

            for dep in task.requires() {
                stack.push((dep.clone(), name.clone()));
            }
            if let Some(host) = task.extends() {
                stack.push((host.to_string(), name.clone()));
            }
        }

        // Edge insertion needs both endpoints to already exist as nodes, so
        // this runs as a second pass over the now-complete node set. An
        // extender's own requirement edges are rooted at its ultimate
        // non-extension host (spec §4.3 step 3) rather than at the extender
        // itself, matching the requirement-wiring pass below.
        for (name, proxy) in &proxies {
            let parent_name = ultimate_root(&proxies, name);
            let from = node_ids[&parent_name];
            for dep in proxy.task().requires() {
                let to = node_ids
                    .get(dep)
                    .copied()
                    .expect("dependency was expanded in the first pass");
                graph.add_edge(from, to).map_err(GraphError::from)?;
            }
        }

        if let Some(witness) = kiln_graph::find_cycle(&graph) {
            let names = witness
                .into_iter()
                .map(|id| graph.get(id).cloned().unwrap_or_default())
                .collect();
            return Err(GraphError::Cycle { witness: names }.into());
        }

        for proxy in proxies.values() {
            if let Some(host_name) = proxy.task().extends() {
                let host = proxies[host_name].clone();
                proxy.set_extended_task(Arc::downgrade(&host));
            }
        }

        // Requirement edges (spec §4.3 step 3): an extender's own `requires`
        // are re-parented onto its ultimate non-extension root, so they
        // become requirements of the host instead -- the host then waits on
        // them like any other dependency, before it (and in turn its
        // extensions) ever runs, rather than the extension re-resolving
        // them on its own during the host's execution window. An extender
        // therefore ends up with no requirement edges of its own.
        let mut requires_by_parent: HashMap<String, Vec<String>> = HashMap::new();
        let mut wired_edges: HashSet<(String, String)> = HashSet::new();
        for (name, proxy) in &proxies {
            let parent = ultimate_root(&proxies, name);
            for dep in proxy.task().requires() {
                if wired_edges.insert((parent.clone(), dep.clone())) {
                    requires_by_parent.entry(parent.clone()).or_default().push(dep.clone());
                }
            }
        }

        for (name, proxy) in &proxies {
            if proxy.task().extends().is_some() {
                proxy.set_requires(Vec::new());
                continue;
            }

            let requires: Vec<Arc<TaskProxy>> = requires_by_parent
                .remove(name)
                .unwrap_or_default()
                .iter()
                .map(|dep| proxies[dep].clone())
                .collect();
            for dep in &requires {
                dep.add_ancestor(Arc::downgrade(proxy));
            }
            proxy.set_requires(requires);
        }

        for (name, proxy) in &proxies {
            let extensions: Vec<Arc<TaskProxy>> = proxies
                .values()
                .filter(|candidate| candidate.task().extends() == Some(name.as_str()))
                .cloned()
                .collect();
            proxy.set_extensions(extensions);
        }

        Ok(BuiltGraph {
            proxies,
            roots: roots.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{InMemoryTaskRegistry, tests::StubTask};

    #[test]
    fn expands_transitive_requires() {
        let mut registry = InMemoryTaskRegistry::new();
        registry.register(Arc::new(StubTask::new("c")));
        registry.register(Arc::new(StubTask::new("b").requiring(["c"])));
        registry.register(Arc::new(StubTask::new("a").requiring(["b"])));

        let built = GraphBuilder::new(&registry).build(&["a".to_string()]).unwrap();
        assert!(built.get("a").is_some());
        assert!(built.get("b").is_some());
        assert!(built.get("c").is_some());
        assert_eq!(built.get("a").unwrap().requires()[0].qualified_name(), "b");
    }

    #[test]
    fn unknown_dependency_is_an_error() {
        let mut registry = InMemoryTaskRegistry::new();
        registry.register(Arc::new(StubTask::new("a").requiring(["ghost"])));

        let err = GraphBuilder::new(&registry).build(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::UnknownTask { .. })));
    }

    #[test]
    fn cyclic_requires_is_an_error() {
        let mut registry = InMemoryTaskRegistry::new();
        registry.register(Arc::new(StubTask::new("a").requiring(["b"])));
        registry.register(Arc::new(StubTask::new("b").requiring(["a"])));

        let err = GraphBuilder::new(&registry).build(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn extensions_are_wired_to_their_host() {
        let mut registry = InMemoryTaskRegistry::new();
        registry.register(Arc::new(StubTask::new("host")));
        registry.register(Arc::new(StubTask::new("host.ext").extending("host")));

        let built = GraphBuilder::new(&registry).build(&["host".to_string()]).unwrap();
        let host = built.get("host").unwrap();
        assert_eq!(host.extensions().len(), 1);
        assert_eq!(host.extensions()[0].qualified_name(), "host.ext");
        assert!(built.get("host.ext").unwrap().ensure_not_extension().is_err());
    }

    #[test]
    fn extension_requires_are_reparented_onto_the_host() {
        let mut registry = InMemoryTaskRegistry::new();
        registry.register(Arc::new(StubTask::new("dep")));
        registry.register(Arc::new(StubTask::new("host")));
        registry.register(Arc::new(StubTask::new("host.ext").extending("host").requiring(["dep"])));

        let built = GraphBuilder::new(&registry).build(&["host".to_string()]).unwrap();
        let host = built.get("host").unwrap();
        let ext = built.get("host.ext").unwrap();

        // The extension's own `requires` have moved onto the host; the
        // extension itself ends up with none of its own.
        assert!(ext.requires().is_empty());
        assert_eq!(host.requires().len(), 1);
        assert_eq!(host.requires()[0].qualified_name(), "dep");
    }

    #[test]
    fn extension_requires_reparent_through_a_chained_extends() {
        // `mid` extends `host`, and `leaf_ext` extends `mid` in turn; a
        // requirement declared on `leaf_ext` must land on `host`, the
        // ultimate non-extension root, not on the intermediate `mid`.
        let mut registry = InMemoryTaskRegistry::new();
        registry.register(Arc::new(StubTask::new("dep")));
        registry.register(Arc::new(StubTask::new("host")));
        registry.register(Arc::new(StubTask::new("mid").extending("host")));
        registry.register(Arc::new(StubTask::new("leaf_ext").extending("mid").requiring(["dep"])));

        let built = GraphBuilder::new(&registry).build(&["host".to_string()]).unwrap();
        let host = built.get("host").unwrap();
        let mid = built.get("mid").unwrap();
        let leaf_ext = built.get("leaf_ext").unwrap();

        assert!(leaf_ext.requires().is_empty());
        assert!(mid.requires().is_empty());
        assert_eq!(host.requires().len(), 1);
        assert_eq!(host.requires()[0].qualified_name(), "dep");
    }
}
