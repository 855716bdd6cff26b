//! Fixture builders shared by unit tests

use crate::catalog::{instance, network, security_group, subnet};
use crate::node::ResourceNode;
use crate::tree::DefinitionTree;
use crate::value::{Tag, Value};

pub fn name_tag(name: &str) -> Value {
    Value::from(vec![Tag::new("Name", name)])
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

/// A group whose ingress rule `from-<peer>` admits traffic from `peer`
pub fn security_group(tree: &mut DefinitionTree, name: &str, peer: &str) -> ResourceNode {
    let mut node = ResourceNode::new(security_group::schema(), name).unwrap();
    node.set("tags", name_tag(name)).unwrap();
    node.set("network", "vpc-0").unwrap();
    node.set("description", format!("{} group", name)).unwrap();

    let mut rule =
        ResourceNode::new(security_group::ingress_rule(), format!("from-{}", peer)).unwrap();
    rule.set("security_groups", vec![tree.reference(&[peer, "id"])])
        .unwrap();
    node.add_child("ingress", rule).unwrap();
    node
}

/// Network `n`, subnet `s` on it, instance `i` in the subnet
pub fn chain_tree() -> DefinitionTree {
    let mut tree = DefinitionTree::new("chain");
    let i = instance(&mut tree, "i", "s");
    let s = subnet(&mut tree, "s", "n");
    tree.add(i).unwrap();
    tree.add(s).unwrap();
    tree.add(network("n")).unwrap();
    tree
}

/// Groups `g1` and `g2` admitting each other
pub fn cyclic_groups() -> DefinitionTree {
    let mut tree = DefinitionTree::new("groups");
    let g1 = security_group(&mut tree, "g1", "g2");
    let g2 = security_group(&mut tree, "g2", "g1");
    tree.add(g1).unwrap();
    tree.add(g2).unwrap();
    tree
}
