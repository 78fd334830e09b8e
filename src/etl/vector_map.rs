use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::data::geometry::{PointGeo, PolyLine, Polygon};
use crate::data::graph::GraphBuilder;
use crate::data::osm::{MemberKind, OsmId, Relation, Way};
use crate::data::{Attributed, Attributes, Map, MapBuilder, OsmMapData};
use crate::errors::Result;
use crate::etl::{parse_osm, Etl};
use crate::projection::Projection;

pub const ETL_NAME: &str = "vector_map";
pub const OUTPUT_FILE_NAME: &str = "vector_map.rkyv";

/// Tag keys whose presence marks a closed way as an area even without an
/// explicit area=yes.
const AREA_KEYS: &[&str] = &[
    "aeroway", "amenity", "building", "harbour", "historic", "landuse", "leisure", "man_made",
    "military", "natural", "office", "place", "power", "public_transport", "shop", "sport",
    "tourism", "water", "waterway", "wetland",
];

/// Tag keys retained on polylines; all others are irrelevant to styling.
const LINE_KEYS: &[&str] = &[
    "bridge", "highway", "layer", "man_made", "railway", "tunnel", "waterway",
];

/// Tag keys retained on polygons.
const POLYGON_KEYS: &[&str] = &["building", "landuse", "layer", "leisure", "natural", "waterway"];

fn key_set(keys: &[&str]) -> HashSet<String> {
    keys.iter().map(|key| key.to_string()).collect()
}

fn closed_area(ring: &PolyLine) -> f64 {
    ring.area().unwrap_or(0.0)
}

/// Turns the raw entity model into attributed plane geometry: polygons
/// for area ways and assembled multipolygon relations, polylines for
/// everything else worth drawing.
pub struct VectorMapEtl<'a> {
    projection: &'a dyn Projection,
    area_keys: HashSet<String>,
    line_keys: HashSet<String>,
    polygon_keys: HashSet<String>,
}

impl<'a> VectorMapEtl<'a> {
    pub fn new(projection: &'a dyn Projection) -> VectorMapEtl<'a> {
        VectorMapEtl {
            projection,
            area_keys: key_set(AREA_KEYS),
            line_keys: key_set(LINE_KEYS),
            polygon_keys: key_set(POLYGON_KEYS),
        }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn is_area(&self, attributes: &Attributes) -> bool {
        matches!(attributes.get("area"), Some("1") | Some("yes") | Some("true"))
            || self.area_keys.iter().any(|key| attributes.contains(key))
    }

    fn polyline_from_way(&self, way: &Way, closed: bool) -> Result<PolyLine> {
        let points = way
            .non_repeating_nodes()
            .iter()
            .map(|node| self.projection.project(&node.position))
            .collect();
        if closed {
            PolyLine::closed(points)
        } else {
            PolyLine::open(points)
        }
    }

    /// Traces the closed rings formed by the relation's member ways with
    /// the given role. A graph node of degree other than two means the
    /// ring set is malformed; the whole relation is then dropped by
    /// returning no rings.
    fn rings_for_role(&self, relation: &Relation, role: &str) -> Result<Vec<PolyLine>> {
        let mut graph_builder = GraphBuilder::new();
        let mut positions: HashMap<OsmId, PointGeo> = HashMap::new();

        for member in &relation.members {
            if member.kind != MemberKind::Way || member.role != role {
                continue;
            }
            if let Some(way) = &member.way {
                for pair in way.nodes().windows(2) {
                    graph_builder.add_node(pair[0].id);
                    graph_builder.add_node(pair[1].id);
                    graph_builder.add_edge(&pair[0].id, &pair[1].id)?;
                    positions.insert(pair[0].id, pair[0].position);
                    positions.insert(pair[1].id, pair[1].position);
                }
            }
        }

        let graph = graph_builder.build();
        for node in graph.nodes() {
            if graph.neighbors_of(node)?.len() != 2 {
                debug!(relation_id = relation.id, role = role; "Malformed ring graph, dropping relation rings");
                return Ok(Vec::new());
            }
        }

        let mut unused: HashSet<OsmId> = graph.nodes().iter().copied().collect();
        let mut rings = Vec::new();
        for start in graph.nodes() {
            if !unused.contains(start) {
                continue;
            }
            let mut points = Vec::new();
            let mut current = *start;
            loop {
                unused.remove(&current);
                let position = positions
                    .get(&current)
                    .ok_or("Ring node has no recorded position.")?;
                points.push(self.projection.project(position));
                // The smallest unvisited neighbor keeps the walk
                // deterministic; in a well-formed ring there is at most
                // one candidate except at the start.
                let next = graph
                    .neighbors_of(&current)?
                    .iter()
                    .filter(|neighbor| unused.contains(*neighbor))
                    .min()
                    .copied();
                match next {
                    Some(neighbor) => current = neighbor,
                    None => break,
                }
            }
            rings.push(PolyLine::closed(points)?);
        }
        Ok(rings)
    }

    /// Builds the relation's polygons: outer rings become shells, each
    /// inner ring becomes a hole of the smallest outer ring that contains
    /// it and exceeds its area. Unmatched inner rings are dropped.
    fn assemble_polygons(
        &self,
        relation: &Relation,
        attributes: &Attributes,
    ) -> Result<Vec<Attributed<Polygon>>> {
        let mut outers = self.rings_for_role(relation, "outer")?;
        if outers.is_empty() {
            return Ok(Vec::new());
        }
        outers.sort_by(|a, b| {
            closed_area(a)
                .partial_cmp(&closed_area(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut inners = self.rings_for_role(relation, "inner")?;
        let mut holes: Vec<Vec<PolyLine>> = outers.iter().map(|_| Vec::new()).collect();
        for (index, outer) in outers.iter().enumerate() {
            let outer_area = closed_area(outer);
            let mut i = 0;
            while i < inners.len() {
                let inner = &inners[i];
                if outer.contains_point(inner.first_point()) && outer_area > closed_area(inner) {
                    holes[index].push(inners.remove(i));
                } else {
                    i += 1;
                }
            }
        }

        let mut polygons = Vec::new();
        for (shell, shell_holes) in outers.into_iter().zip(holes) {
            polygons.push(Attributed::new(
                Polygon::new(shell, shell_holes)?,
                attributes.clone(),
            ));
        }
        Ok(polygons)
    }

    pub fn build_map(&self, data: &OsmMapData) -> Result<Map> {
        let mut builder = MapBuilder::new();

        // Iteration over the id-keyed maps is not ordered; sorting keeps
        // the output map (and thus the draw order) deterministic.
        let mut ways: Vec<&Way> = data.ways.values().collect();
        ways.sort_by_key(|way| way.id);
        for way in ways {
            if way.is_closed() && self.is_area(&way.attributes) {
                let kept = way.attributes.keep_only_keys(&self.polygon_keys);
                if !kept.is_empty() {
                    let shell = self.polyline_from_way(way, true)?;
                    builder.add_polygon(Attributed::new(Polygon::with_shell(shell)?, kept));
                }
            } else {
                let kept = way.attributes.keep_only_keys(&self.line_keys);
                if !kept.is_empty() {
                    let polyline = self.polyline_from_way(way, way.is_closed())?;
                    builder.add_polyline(Attributed::new(polyline, kept));
                }
            }
        }

        let mut relations: Vec<&Relation> = data.relations.values().collect();
        relations.sort_by_key(|relation| relation.id);
        for relation in relations {
            if relation.attributes.get("type") != Some("multipolygon") {
                continue;
            }
            let kept = relation.attributes.keep_only_keys(&self.polygon_keys);
            if kept.is_empty() {
                continue;
            }
            for polygon in self.assemble_polygons(relation, &kept)? {
                builder.add_polygon(polygon);
            }
        }

        Ok(builder.build())
    }
}

impl Etl for VectorMapEtl<'_> {
    type Input = OsmMapData;
    type Output = Map;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).exists())
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        fs::remove_file(Self::output_path(dir))?;
        Ok(())
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let mut input_file = File::open(dir.join(parse_osm::OUTPUT_FILE_NAME))?;
        let mut buf = Vec::new();
        input_file.read_to_end(&mut buf)?;
        let data: OsmMapData =
            unsafe { rkyv::from_bytes_unchecked(&buf).map_err(|err| err.to_string())? };
        Ok(data)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        self.build_map(&input)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let bytes = rkyv::to_bytes::<_, 256>(&output).map_err(|err| err.to_string())?;
        let mut output_file = File::create(Self::output_path(dir))?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{Node, NodeBuilder, RelationBuilder, WayBuilder};
    use crate::projection::EquirectangularProjection;

    fn node(id: OsmId, x: f64, y: f64) -> Node {
        NodeBuilder::new(id, PointGeo::new(x, y).unwrap())
            .build()
            .unwrap()
    }

    fn way(id: OsmId, nodes: &[Node], tags: &[(&str, &str)]) -> Way {
        let mut builder = WayBuilder::new(id);
        for node in nodes {
            builder.add_node(node.clone());
        }
        for (key, value) in tags {
            builder.set_attribute(key, value);
        }
        builder.build().unwrap()
    }

    fn relation(id: OsmId, members: Vec<(&str, Way)>, tags: &[(&str, &str)]) -> Relation {
        let mut builder = RelationBuilder::new(id);
        for (role, member_way) in members {
            builder.add_member(MemberKind::Way, role, Some(member_way));
        }
        for (key, value) in tags {
            builder.set_attribute(key, value);
        }
        builder.build().unwrap()
    }

    fn square_nodes(first_id: OsmId, origin: (f64, f64), side: f64) -> Vec<Node> {
        vec![
            node(first_id, origin.0, origin.1),
            node(first_id + 1, origin.0 + side, origin.1),
            node(first_id + 2, origin.0 + side, origin.1 + side),
            node(first_id + 3, origin.0, origin.1 + side),
        ]
    }

    fn closed_way(id: OsmId, nodes: &[Node], tags: &[(&str, &str)]) -> Way {
        let mut ring: Vec<Node> = nodes.to_vec();
        ring.push(nodes[0].clone());
        way(id, &ring, tags)
    }

    fn etl(projection: &EquirectangularProjection) -> VectorMapEtl {
        VectorMapEtl::new(projection)
    }

    #[test]
    fn closed_building_way_becomes_one_polygon() {
        let projection = EquirectangularProjection;
        let nodes = square_nodes(1, (0.0, 0.0), 0.1);
        let mut data = OsmMapData::default();
        let building = closed_way(10, &nodes, &[("building", "yes"), ("name", "gym")]);
        data.ways.insert(10, building);

        let map = etl(&projection).build_map(&data).unwrap();
        assert_eq!(map.polygons().len(), 1);
        assert!(map.polylines().is_empty());

        let polygon = &map.polygons()[0];
        assert!(polygon.value().holes().is_empty());
        assert_eq!(polygon.value().shell().points().len(), 4);
        assert!(polygon.has_attribute("building"));
        assert!(!polygon.has_attribute("name"));
    }

    #[test]
    fn explicit_area_tag_implies_a_polygon() {
        let projection = EquirectangularProjection;
        let nodes = square_nodes(1, (0.0, 0.0), 0.1);
        let mut data = OsmMapData::default();
        data.ways
            .insert(10, closed_way(10, &nodes, &[("area", "yes"), ("waterway", "dock")]));

        let map = etl(&projection).build_map(&data).unwrap();
        assert_eq!(map.polygons().len(), 1);
    }

    #[test]
    fn closed_non_area_way_becomes_a_closed_polyline() {
        let projection = EquirectangularProjection;
        let nodes = square_nodes(1, (0.0, 0.0), 0.1);
        let mut data = OsmMapData::default();
        data.ways
            .insert(10, closed_way(10, &nodes, &[("highway", "residential")]));

        let map = etl(&projection).build_map(&data).unwrap();
        assert!(map.polygons().is_empty());
        assert_eq!(map.polylines().len(), 1);
        assert!(map.polylines()[0].value().is_closed());
    }

    #[test]
    fn way_without_retained_keys_is_skipped() {
        let projection = EquirectangularProjection;
        let a = node(1, 0.0, 0.0);
        let b = node(2, 0.1, 0.0);
        let mut data = OsmMapData::default();
        data.ways.insert(10, way(10, &[a, b], &[("name", "x")]));

        let map = etl(&projection).build_map(&data).unwrap();
        assert!(map.polylines().is_empty());
        assert!(map.polygons().is_empty());
    }

    #[test]
    fn multipolygon_with_hole_assembles_shell_and_hole() {
        let projection = EquirectangularProjection;
        let outer_nodes = square_nodes(1, (0.0, 0.0), 0.1);
        let inner_nodes = square_nodes(5, (0.04, 0.04), 0.02);

        // The outer ring arrives split into two ways sharing endpoints.
        let first_half = way(
            10,
            &[
                outer_nodes[0].clone(),
                outer_nodes[1].clone(),
                outer_nodes[2].clone(),
            ],
            &[],
        );
        let second_half = way(
            11,
            &[
                outer_nodes[2].clone(),
                outer_nodes[3].clone(),
                outer_nodes[0].clone(),
            ],
            &[],
        );
        let inner = closed_way(12, &inner_nodes, &[]);

        let mut data = OsmMapData::default();
        data.relations.insert(
            20,
            relation(
                20,
                vec![("outer", first_half), ("outer", second_half), ("inner", inner)],
                &[("type", "multipolygon"), ("natural", "water")],
            ),
        );

        let map = etl(&projection).build_map(&data).unwrap();
        assert_eq!(map.polygons().len(), 1);

        let polygon = map.polygons()[0].value();
        assert_eq!(polygon.shell().points().len(), 4);
        assert_eq!(polygon.holes().len(), 1);
        assert_eq!(polygon.holes()[0].points().len(), 4);
        assert!(map.polygons()[0].has_attribute("natural"));
    }

    #[test]
    fn nested_outer_rings_claim_the_correct_holes() {
        let projection = EquirectangularProjection;
        let big = square_nodes(1, (0.0, 0.0), 0.2);
        let small = square_nodes(5, (0.05, 0.05), 0.04);
        let small_hole = square_nodes(9, (0.06, 0.06), 0.02);

        let mut data = OsmMapData::default();
        data.relations.insert(
            20,
            relation(
                20,
                vec![
                    ("outer", closed_way(10, &big, &[])),
                    ("outer", closed_way(11, &small, &[])),
                    ("inner", closed_way(12, &small_hole, &[])),
                ],
                &[("type", "multipolygon"), ("landuse", "forest")],
            ),
        );

        let map = etl(&projection).build_map(&data).unwrap();
        assert_eq!(map.polygons().len(), 2);

        // Outer rings are ordered by ascending area, so the small ring
        // comes first and captures the hole nested inside it.
        let small_polygon = map.polygons()[0].value();
        let big_polygon = map.polygons()[1].value();
        assert!(closed_area(small_polygon.shell()) < closed_area(big_polygon.shell()));
        assert_eq!(small_polygon.holes().len(), 1);
        assert!(big_polygon.holes().is_empty());
    }

    #[test]
    fn malformed_ring_graph_drops_the_whole_relation() {
        let projection = EquirectangularProjection;
        let a = square_nodes(1, (0.0, 0.0), 0.1);
        let b = square_nodes(5, (0.2, 0.2), 0.1);
        // Both rings share node 1, giving it degree four.
        let shared = a[0].clone();
        let mut b_ring = vec![shared.clone()];
        b_ring.extend(b[1..].iter().cloned());

        let mut data = OsmMapData::default();
        data.relations.insert(
            20,
            relation(
                20,
                vec![
                    ("outer", closed_way(10, &a, &[])),
                    ("outer", closed_way(11, &b_ring, &[])),
                ],
                &[("type", "multipolygon"), ("natural", "water")],
            ),
        );

        let map = etl(&projection).build_map(&data).unwrap();
        assert!(map.polygons().is_empty());
    }

    #[test]
    fn ring_tracing_partitions_disjoint_rings() {
        let projection = EquirectangularProjection;
        let first = square_nodes(1, (0.0, 0.0), 0.1);
        let second = square_nodes(5, (0.3, 0.3), 0.1);
        let rel = relation(
            20,
            vec![
                ("outer", closed_way(10, &first, &[])),
                ("outer", closed_way(11, &second, &[])),
            ],
            &[("type", "multipolygon")],
        );

        let rings = etl(&projection).rings_for_role(&rel, "outer").unwrap();
        assert_eq!(rings.len(), 2);
        let total_points: usize = rings.iter().map(|ring| ring.points().len()).sum();
        assert_eq!(total_points, 8);
    }

    #[test]
    fn relation_without_multipolygon_type_is_ignored() {
        let projection = EquirectangularProjection;
        let nodes = square_nodes(1, (0.0, 0.0), 0.1);
        let mut data = OsmMapData::default();
        data.relations.insert(
            20,
            relation(
                20,
                vec![("outer", closed_way(10, &nodes, &[]))],
                &[("type", "route"), ("natural", "water")],
            ),
        );

        let map = etl(&projection).build_map(&data).unwrap();
        assert!(map.polygons().is_empty());
    }
}
