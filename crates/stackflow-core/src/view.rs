//! Read-only views of resources paired with the reference arena

use crate::node::ResourceNode;
use crate::reference::RefArena;
use crate::schema::{Property, ResourceSchema};
use crate::value::{Tag, Value};
use serde_json::{Map, Value as Json};

/// How references are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Payload for remote creation; references held through Mutable
    /// attributes are deferred and attached later
    Create,
    /// Everything known so far
    Current,
}

/// Desired state of a collection as far as references allow
#[derive(Debug, Clone, PartialEq)]
pub struct KnownCollection {
    /// Children keyed by name, pending attributes omitted
    pub value: Json,
    /// `[child, ..., keyword]` paths omitted from `value`
    pub pending: Vec<Vec<String>>,
}

/// A resource node together with the arena its references live in
#[derive(Debug, Clone, Copy)]
pub struct ResourceView<'a> {
    node: &'a ResourceNode,
    refs: &'a RefArena,
}

impl<'a> ResourceView<'a> {
    pub fn new(node: &'a ResourceNode, refs: &'a RefArena) -> Self {
        Self { node, refs }
    }

    pub fn node(&self) -> &'a ResourceNode {
        self.node
    }

    pub fn refs(&self) -> &'a RefArena {
        self.refs
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.node.schema()
    }

    pub fn kind(&self) -> &'static str {
        self.node.kind()
    }

    pub fn name(&self) -> &'a str {
        self.node.name()
    }

    pub fn identity(&self) -> Option<&'a str> {
        self.node.identity()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.node.tags()
    }

    /// JSON payload of the node and its collections
    pub fn render(&self, mode: RenderMode) -> Map<String, Json> {
        render_node(self.node, self.refs, mode, &[])
    }

    /// Attribute value if set and free of pending references
    pub fn known_attribute(&self, attribute: &str) -> Option<Json> {
        let value = self.node.get(attribute).ok().flatten()?;
        value.resolved(self.refs)?;
        Some(value.render(self.refs, false))
    }

    /// Rendered collection with every value still waiting on a reference left out.
    ///
    /// Absent collections render as an empty object.
    pub fn known_collection(&self, collection: &str) -> KnownCollection {
        let mut pending = Vec::new();
        let value: Map<String, Json> = self
            .node
            .children(collection)
            .map(|child| {
                let prefix = vec![child.name().to_string()];
                (
                    child.name().to_string(),
                    Json::Object(render_known(child, self.refs, &prefix, &mut pending)),
                )
            })
            .collect();
        KnownCollection {
            value: Json::Object(value),
            pending,
        }
    }

    /// Render the attribute at `[collection, child, ..., keyword]` below this node
    pub fn render_at(&self, path: &[String]) -> Option<Json> {
        let mut node = self.node;
        let (keyword, steps) = path.split_last()?;
        if steps.len() % 2 != 0 {
            return None;
        }
        for step in steps.chunks(2) {
            node = node.child(&step[0], &step[1])?;
        }
        let value = node.get(keyword).ok().flatten()?;
        Some(value.render(self.refs, false))
    }

    /// Dotted paths of unresolved references held through non-Mutable attributes
    pub fn unresolved_immutable_references(&self) -> Vec<String> {
        let mut found = Vec::new();
        collect_unresolved_immutable(self.node, self.refs, &[], &mut found);
        found
    }
}

fn render_node(
    node: &ResourceNode,
    refs: &RefArena,
    mode: RenderMode,
    inherited: &[Property],
) -> Map<String, Json> {
    let mut rendered = Map::new();
    for (keyword, value) in node.attributes() {
        let defer = mode == RenderMode::Create
            && node
                .schema()
                .attribute(keyword)
                .is_some_and(|spec| spec.is_mutable_with(inherited));
        rendered.insert(keyword.to_string(), value.render(refs, defer));
    }
    for (collection, children) in node.collections() {
        let inherited = inherit(node, collection, inherited);
        let children: Map<String, Json> = children
            .iter()
            .map(|(name, child)| {
                (
                    name.clone(),
                    Json::Object(render_node(child, refs, mode, &inherited)),
                )
            })
            .collect();
        rendered.insert(collection.to_string(), Json::Object(children));
    }
    rendered
}

fn inherit(node: &ResourceNode, collection: &str, inherited: &[Property]) -> Vec<Property> {
    let mut properties = inherited.to_vec();
    if let Some(spec) = node.schema().collection(collection) {
        properties.extend(spec.properties().iter().copied());
    }
    properties
}

fn render_known(
    node: &ResourceNode,
    refs: &RefArena,
    prefix: &[String],
    pending: &mut Vec<Vec<String>>,
) -> Map<String, Json> {
    let mut rendered = Map::new();
    for (keyword, value) in node.attributes() {
        if value.resolved(refs).is_none() {
            let mut path = prefix.to_vec();
            path.push(keyword.to_string());
            pending.push(path);
            continue;
        }
        rendered.insert(keyword.to_string(), value.render(refs, false));
    }
    for (collection, children) in node.collections() {
        let children: Map<String, Json> = children
            .iter()
            .map(|(name, child)| {
                let mut path = prefix.to_vec();
                path.extend([collection.to_string(), name.clone()]);
                (
                    name.clone(),
                    Json::Object(render_known(child, refs, &path, pending)),
                )
            })
            .collect();
        rendered.insert(collection.to_string(), Json::Object(children));
    }
    rendered
}

fn collect_unresolved_immutable(
    node: &ResourceNode,
    refs: &RefArena,
    inherited: &[Property],
    found: &mut Vec<String>,
) {
    for (keyword, value) in node.attributes() {
        let mutable = node
            .schema()
            .attribute(keyword)
            .is_some_and(|spec| spec.is_mutable_with(inherited));
        if mutable {
            continue;
        }
        for reference in value.references() {
            if Value::Reference(reference).resolved(refs).is_none() {
                found.push(refs.display(reference));
            }
        }
    }
    for (collection, children) in node.collections() {
        let inherited = inherit(node, collection, inherited);
        for child in children.values() {
            collect_unresolved_immutable(child, refs, &inherited, found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    #[test]
    fn test_create_defers_mutable_references() {
        let mut tree = testing::cyclic_groups();
        tree.fill_defaults().unwrap();
        tree.assign_identity("g2", "2").unwrap();
        tree.resolve_pending().unwrap();

        let view = tree.view("g1").unwrap();
        let created = view.render(RenderMode::Create);
        assert_eq!(
            created["ingress"]["from-g2"]["security_groups"],
            json!([null])
        );
        let current = view.render(RenderMode::Current);
        assert_eq!(current["ingress"]["from-g2"]["security_groups"], json!(["2"]));

        let path: Vec<String> = vec!["ingress".into(), "from-g2".into(), "security_groups".into()];
        assert_eq!(view.render_at(&path), Some(json!(["2"])));
        assert_eq!(view.render_at(&path[..2]), None);
    }

    #[test]
    fn test_known_collection_omits_only_pending_values() {
        let mut tree = testing::cyclic_groups();
        let mut g1 = tree.resource("g1").unwrap().clone();
        g1.fill_defaults().unwrap();
        let view = ResourceView::new(&g1, tree.refs());

        let known = view.known_collection("ingress");
        assert_eq!(
            known.pending,
            vec![vec!["from-g2".to_string(), "security_groups".to_string()]]
        );
        assert_eq!(known.value["from-g2"]["protocol"], json!("all"));
        assert!(known.value["from-g2"].get("security_groups").is_none());

        tree.assign_identity("g2", "7").unwrap();
        tree.resolve_pending().unwrap();
        let view = ResourceView::new(&g1, tree.refs());
        let known = view.known_collection("ingress");
        assert!(known.pending.is_empty());
        assert_eq!(known.value["from-g2"]["security_groups"], json!(["7"]));
    }

    #[test]
    fn test_unresolved_immutable_references() {
        let mut tree = testing::chain_tree();
        let view = tree.view("s").unwrap();
        assert_eq!(view.unresolved_immutable_references(), vec!["n.id"]);
        assert_eq!(view.known_attribute("network"), None);

        tree.assign_identity("n", "1").unwrap();
        tree.resolve_pending().unwrap();
        let view = tree.view("s").unwrap();
        assert!(view.unresolved_immutable_references().is_empty());
        assert_eq!(view.known_attribute("network"), Some(json!("1")));
        let known = view.known_collection("anything");
        assert_eq!(known.value, json!({}));
        assert!(known.pending.is_empty());

        // Mutable references never block creation
        let groups = testing::cyclic_groups();
        assert!(groups.view("g1").unwrap().unresolved_immutable_references().is_empty());
    }
}
