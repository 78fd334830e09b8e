use std::collections::{HashMap, HashSet};

use self::geometry::{PolyLine, Polygon};
use self::osm::{Node, OsmId, Relation, Way};

pub mod geometry;
pub mod graph;
pub mod osm;

/// Immutable key/value tag set attached to a map element. Built through
/// [`AttributesBuilder`] and frozen afterwards.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone, PartialEq)]
pub struct Attributes {
    entries: HashMap<String, String>,
}

impl Attributes {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Integer-typed lookup. A missing key or a value that does not parse
    /// as an integer both fall back to `default`.
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    /// Projects the tag set onto `keys_to_keep`, returning a new set
    /// holding only the intersecting keys.
    pub fn keep_only_keys(&self, keys_to_keep: &HashSet<String>) -> Attributes {
        let mut builder = AttributesBuilder::new();
        for key in keys_to_keep {
            if let Some(value) = self.get(key) {
                builder.put(key, value);
            }
        }
        builder.build()
    }
}

#[derive(Debug, Default)]
pub struct AttributesBuilder {
    entries: HashMap<String, String>,
}

impl AttributesBuilder {
    pub fn new() -> AttributesBuilder {
        AttributesBuilder::default()
    }

    /// Inserts a key/value pair, replacing any previous value for the key.
    pub fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn build(self) -> Attributes {
        Attributes {
            entries: self.entries,
        }
    }
}

/// A geometry value paired with the attributes that describe it.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Attributed<T> {
    value: T,
    attributes: Attributes,
}

impl<T> Attributed<T> {
    pub fn new(value: T, attributes: Attributes) -> Attributed<T> {
        Attributed { value, attributes }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    pub fn attribute_value(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    pub fn int_attribute_or(&self, key: &str, default: i32) -> i32 {
        self.attributes.get_int(key, default)
    }
}

/// Raw entity model parsed from the .osm file. Ways carry their resolved
/// node sequences; entities with dangling references were already dropped
/// by the parser.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct OsmMapData {
    pub nodes: HashMap<OsmId, Node>,
    pub ways: HashMap<OsmId, Way>,
    pub relations: HashMap<OsmId, Relation>,
}

/// The reconstructed vector map: attributed polylines and polygons in
/// projected plane coordinates. Sole input of the painting engine.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct Map {
    polylines: Vec<Attributed<PolyLine>>,
    polygons: Vec<Attributed<Polygon>>,
}

impl Map {
    pub fn polylines(&self) -> &[Attributed<PolyLine>] {
        &self.polylines
    }

    pub fn polygons(&self) -> &[Attributed<Polygon>] {
        &self.polygons
    }
}

#[derive(Debug, Default)]
pub struct MapBuilder {
    polylines: Vec<Attributed<PolyLine>>,
    polygons: Vec<Attributed<Polygon>>,
}

impl MapBuilder {
    pub fn new() -> MapBuilder {
        MapBuilder::default()
    }

    pub fn add_polyline(&mut self, polyline: Attributed<PolyLine>) {
        self.polylines.push(polyline);
    }

    pub fn add_polygon(&mut self, polygon: Attributed<Polygon>) {
        self.polygons.push(polygon);
    }

    pub fn build(self) -> Map {
        Map {
            polylines: self.polylines,
            polygons: self.polygons,
        }
    }
}
