use crate::data::geometry::PointGeo;
use crate::data::{Attributes, AttributesBuilder};
use crate::errors::Result;

pub type OsmId = u64;

/// A tagged position in the raw entity model.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Node {
    pub id: OsmId,
    pub position: PointGeo,
    pub attributes: Attributes,
}

/// An ordered sequence of resolved nodes. Closed iff the first and last
/// node are the same.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Way {
    pub id: OsmId,
    nodes: Vec<Node>,
    pub attributes: Attributes,
}

impl Way {
    pub fn new(id: OsmId, nodes: Vec<Node>, attributes: Attributes) -> Result<Way> {
        if nodes.len() < 2 {
            return Err("A way needs at least two nodes.".into());
        }
        Ok(Way {
            id,
            nodes,
            attributes,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_closed(&self) -> bool {
        self.nodes[0].id == self.nodes[self.nodes.len() - 1].id
    }

    /// The node sequence without the repeated endpoint of a closed way.
    pub fn non_repeating_nodes(&self) -> &[Node] {
        if self.is_closed() {
            &self.nodes[..self.nodes.len() - 1]
        } else {
            &self.nodes
        }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

/// A role-tagged reference inside a relation. Only way members carry
/// their payload; multipolygon assembly never dereferences the others.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Member {
    pub kind: MemberKind,
    pub role: String,
    pub way: Option<Way>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Relation {
    pub id: OsmId,
    pub members: Vec<Member>,
    pub attributes: Attributes,
}

/// Accumulator for a node under construction. Marked incomplete when the
/// source data turns out to be unusable; an incomplete entity is dropped
/// instead of persisted.
#[derive(Debug)]
pub struct NodeBuilder {
    id: OsmId,
    position: PointGeo,
    attributes: AttributesBuilder,
    incomplete: bool,
}

impl NodeBuilder {
    pub fn new(id: OsmId, position: PointGeo) -> NodeBuilder {
        NodeBuilder {
            id,
            position,
            attributes: AttributesBuilder::new(),
            incomplete: false,
        }
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.put(key, value);
    }

    pub fn set_incomplete(&mut self) {
        self.incomplete = true;
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn build(self) -> Result<Node> {
        if self.incomplete {
            return Err("Cannot build an incomplete node.".into());
        }
        Ok(Node {
            id: self.id,
            position: self.position,
            attributes: self.attributes.build(),
        })
    }
}

#[derive(Debug)]
pub struct WayBuilder {
    id: OsmId,
    nodes: Vec<Node>,
    attributes: AttributesBuilder,
    incomplete: bool,
}

impl WayBuilder {
    pub fn new(id: OsmId) -> WayBuilder {
        WayBuilder {
            id,
            nodes: Vec::new(),
            attributes: AttributesBuilder::new(),
            incomplete: false,
        }
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.put(key, value);
    }

    pub fn set_incomplete(&mut self) {
        self.incomplete = true;
    }

    /// A way with fewer than two nodes is incomplete by definition.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete || self.nodes.len() < 2
    }

    pub fn build(self) -> Result<Way> {
        if self.is_incomplete() {
            return Err("Cannot build an incomplete way.".into());
        }
        Way::new(self.id, self.nodes, self.attributes.build())
    }
}

#[derive(Debug)]
pub struct RelationBuilder {
    id: OsmId,
    members: Vec<Member>,
    attributes: AttributesBuilder,
    incomplete: bool,
}

impl RelationBuilder {
    pub fn new(id: OsmId) -> RelationBuilder {
        RelationBuilder {
            id,
            members: Vec::new(),
            attributes: AttributesBuilder::new(),
            incomplete: false,
        }
    }

    pub fn add_member(&mut self, kind: MemberKind, role: &str, way: Option<Way>) {
        self.members.push(Member {
            kind,
            role: role.to_string(),
            way,
        });
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.put(key, value);
    }

    pub fn set_incomplete(&mut self) {
        self.incomplete = true;
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn build(self) -> Result<Relation> {
        if self.incomplete {
            return Err("Cannot build an incomplete relation.".into());
        }
        Ok(Relation {
            id: self.id,
            members: self.members,
            attributes: self.attributes.build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: OsmId, lon: f64, lat: f64) -> Node {
        let mut builder = NodeBuilder::new(id, PointGeo::new(lon, lat).unwrap());
        builder.set_attribute("name", "n");
        builder.build().unwrap()
    }

    #[test]
    fn way_needs_two_nodes() {
        let mut builder = WayBuilder::new(1);
        builder.add_node(node(1, 0.1, 0.1));
        assert!(builder.is_incomplete());
        assert!(builder.build().is_err());
    }

    #[test]
    fn closed_way_drops_repeated_endpoint() {
        let mut builder = WayBuilder::new(1);
        builder.add_node(node(1, 0.0, 0.0));
        builder.add_node(node(2, 0.1, 0.0));
        builder.add_node(node(3, 0.1, 0.1));
        builder.add_node(node(1, 0.0, 0.0));
        let way = builder.build().unwrap();

        assert!(way.is_closed());
        assert_eq!(way.non_repeating_nodes().len(), 3);
    }

    #[test]
    fn open_way_keeps_all_nodes() {
        let mut builder = WayBuilder::new(1);
        builder.add_node(node(1, 0.0, 0.0));
        builder.add_node(node(2, 0.1, 0.0));
        let way = builder.build().unwrap();

        assert!(!way.is_closed());
        assert_eq!(way.non_repeating_nodes().len(), 2);
    }

    #[test]
    fn incomplete_builders_refuse_to_build() {
        let mut builder = RelationBuilder::new(7);
        builder.set_incomplete();
        assert!(builder.build().is_err());

        let mut builder = NodeBuilder::new(8, PointGeo::new(0.0, 0.0).unwrap());
        builder.set_incomplete();
        assert!(builder.build().is_err());
    }
}
