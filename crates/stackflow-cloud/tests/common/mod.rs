use async_trait::async_trait;
use serde_json::Value as Json;
use stackflow_cloud::{
    Backend, Change, CloudError, CreateResponse, InMemoryBackend, RemoteRecord, Result,
};
use stackflow_core::catalog::{instance, network, security_group, subnet};
use stackflow_core::{DefinitionTree, ResourceNode, ResourceView, Tag};

pub fn name_tag(name: &str) -> Vec<Tag> {
    vec![Tag::new("Name", name)]
}

pub fn network(name: &str) -> ResourceNode {
    let mut node = ResourceNode::new(network::schema(), name).unwrap();
    node.set("tags", name_tag(name)).unwrap();
    node.set("cidr_block", "10.0.0.0/16").unwrap();
    node
}

pub fn subnet(tree: &mut DefinitionTree, name: &str, network: &str) -> ResourceNode {
    let mut node = ResourceNode::new(subnet::schema(), name).unwrap();
    node.set("tags", name_tag(name)).unwrap();
    node.set("cidr_block", "10.0.1.0/24").unwrap();
    node.set("availability_zone", "us-east-1a").unwrap();
    node.set("network", tree.reference(&[network, "id"])).unwrap();
    node
}

pub fn instance(tree: &mut DefinitionTree, name: &str, subnet: &str) -> ResourceNode {
    let mut node = ResourceNode::new(instance::schema(), name).unwrap();
    node.set("tags", name_tag(name)).unwrap();
    node.set("availability_zone", "us-east-1a").unwrap();
    node.set("image_id", "ami-12345").unwrap();
    node.set("instance_type", "t2.micro").unwrap();
    node.set("subnet", tree.reference(&[subnet, "id"])).unwrap();
    node
}

/// A group on `network` whose ingress rule `from-<peer>` admits `peer`
pub fn security_group(
    tree: &mut DefinitionTree,
    name: &str,
    network: &str,
    peer: &str,
) -> ResourceNode {
    let mut node = ResourceNode::new(security_group::schema(), name).unwrap();
    node.set("tags", name_tag(name)).unwrap();
    node.set("network", tree.reference(&[network, "id"])).unwrap();
    node.set("description", format!("{} group", name)).unwrap();

    let mut rule =
        ResourceNode::new(security_group::ingress_rule(), format!("from-{}", peer)).unwrap();
    rule.set("protocol", "tcp").unwrap();
    rule.set("from", 443i64).unwrap();
    rule.set("to", 443i64).unwrap();
    rule.set("security_groups", vec![tree.reference(&[peer, "id"])])
        .unwrap();
    node.add_child("ingress", rule).unwrap();
    node
}

/// Instance `i` in subnet `s` on network `n`, declared in reverse
pub fn chain_tree() -> DefinitionTree {
    let mut tree = DefinitionTree::new("chain");
    let i = instance(&mut tree, "i", "s");
    let s = subnet(&mut tree, "s", "n");
    tree.add(i).unwrap();
    tree.add(s).unwrap();
    tree.add(network("n")).unwrap();
    tree
}

/// Network `n` with groups `g1` and `g2` admitting each other
pub fn cyclic_groups() -> DefinitionTree {
    let mut tree = DefinitionTree::new("groups");
    let g1 = security_group(&mut tree, "g1", "n", "g2");
    let g2 = security_group(&mut tree, "g2", "n", "g1");
    tree.add(network("n")).unwrap();
    tree.add(g1).unwrap();
    tree.add(g2).unwrap();
    tree
}

/// In-memory backend whose create fails for one resource name
pub struct FailingBackend {
    pub inner: InMemoryBackend,
    pub fail_on: String,
}

impl FailingBackend {
    pub fn new(fail_on: &str) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            fail_on: fail_on.to_string(),
        }
    }
}

#[async_trait]
impl Backend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<RemoteRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<RemoteRecord>> {
        self.inner.find_by_name(name).await
    }

    async fn find_by_tags(&self, tags: &[Tag]) -> Result<Vec<RemoteRecord>> {
        self.inner.find_by_tags(tags).await
    }

    async fn create_resource(&self, resource: ResourceView<'_>) -> Result<CreateResponse> {
        if resource.name() == self.fail_on {
            return Err(CloudError::IncompleteResource("quota exceeded".to_string()));
        }
        self.inner.create_resource(resource).await
    }

    async fn modify_resource(
        &self,
        resource: ResourceView<'_>,
        path: &[String],
        value: &Json,
    ) -> Result<Json> {
        self.inner.modify_resource(resource, path, value).await
    }

    async fn update_resource(&self, id: &str, changes: &[Change]) -> Result<()> {
        self.inner.update_resource(id, changes).await
    }

    async fn destroy_resource(&self, id: &str) -> Result<()> {
        self.inner.destroy_resource(id).await
    }
}
