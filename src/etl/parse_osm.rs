use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::geometry::PointGeo;
use crate::data::osm::{MemberKind, NodeBuilder, RelationBuilder, WayBuilder};
use crate::data::OsmMapData;
use crate::errors::Result;
use crate::etl::Etl;
use crate::UserConfig;

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_map.rkyv";

/// The entity currently being accumulated by the parser.
enum Context {
    Top,
    Node(NodeBuilder),
    Way(WayBuilder),
    Relation(RelationBuilder),
}

pub struct ParseOsmEtl<'a> {
    config: &'a UserConfig,
}

impl ParseOsmEtl<'_> {
    pub fn new(config: &UserConfig) -> ParseOsmEtl {
        ParseOsmEtl { config }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn create_osm_reader(&self) -> Result<Reader<Box<dyn BufRead>>> {
        let file = File::open(&self.config.osm_path)?;
        let file_reader = BufReader::new(file);
        let input: Box<dyn BufRead> = if self.config.osm_path.ends_with(".xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Ok(reader)
    }

    fn attr_value(el: &BytesStart, name: &[u8]) -> Result<Option<String>> {
        for attribute in el.attributes() {
            let attribute = attribute?;
            if attribute.key.as_ref() == name {
                return Ok(Some(attribute.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    fn required_attr(el: &BytesStart, name: &[u8]) -> Result<String> {
        Self::attr_value(el, name)?.ok_or_else(|| {
            format!(
                "Missing required attribute {:?} on <{:?}>.",
                String::from_utf8_lossy(name),
                String::from_utf8_lossy(el.name().as_ref())
            )
            .into()
        })
    }

    fn start_node(el: &BytesStart) -> Result<NodeBuilder> {
        let id = Self::required_attr(el, b"id")?.parse()?;
        let lat: f64 = Self::required_attr(el, b"lat")?.parse()?;
        let lon: f64 = Self::required_attr(el, b"lon")?.parse()?;
        let position = PointGeo::new(lon.to_radians(), lat.to_radians())?;
        Ok(NodeBuilder::new(id, position))
    }

    /// Resolves a `<nd ref=..>` against the nodes parsed so far. A way
    /// referencing an unknown node becomes incomplete and is dropped.
    fn handle_nd(el: &BytesStart, data: &OsmMapData, way: &mut WayBuilder) -> Result<()> {
        let node_ref = Self::required_attr(el, b"ref")?.parse()?;
        match data.nodes.get(&node_ref) {
            Some(node) => way.add_node(node.clone()),
            None => way.set_incomplete(),
        }
        Ok(())
    }

    fn handle_member(
        el: &BytesStart,
        data: &OsmMapData,
        relation: &mut RelationBuilder,
    ) -> Result<()> {
        let kind = match Self::required_attr(el, b"type")?.as_str() {
            "node" => MemberKind::Node,
            "way" => MemberKind::Way,
            "relation" => MemberKind::Relation,
            other => return Err(format!("Unknown member type {:?}.", other).into()),
        };
        let role = Self::attr_value(el, b"role")?.unwrap_or_default();
        let member_ref = Self::required_attr(el, b"ref")?.parse()?;

        let resolved = match kind {
            MemberKind::Node => {
                if !data.nodes.contains_key(&member_ref) {
                    relation.set_incomplete();
                }
                None
            }
            MemberKind::Way => match data.ways.get(&member_ref) {
                Some(way) => Some(way.clone()),
                None => {
                    relation.set_incomplete();
                    None
                }
            },
            MemberKind::Relation => {
                if !data.relations.contains_key(&member_ref) {
                    relation.set_incomplete();
                }
                None
            }
        };
        relation.add_member(kind, &role, resolved);
        Ok(())
    }

    fn handle_start(el: &BytesStart, data: &OsmMapData, context: &mut Context) -> Result<()> {
        match el.name().as_ref() {
            b"node" => *context = Context::Node(Self::start_node(el)?),
            b"way" => {
                let id = Self::required_attr(el, b"id")?.parse()?;
                *context = Context::Way(WayBuilder::new(id));
            }
            b"relation" => {
                let id = Self::required_attr(el, b"id")?.parse()?;
                *context = Context::Relation(RelationBuilder::new(id));
            }
            b"tag" => {
                let key = Self::required_attr(el, b"k")?;
                let value = Self::required_attr(el, b"v")?;
                match context {
                    Context::Node(builder) => builder.set_attribute(&key, &value),
                    Context::Way(builder) => builder.set_attribute(&key, &value),
                    Context::Relation(builder) => builder.set_attribute(&key, &value),
                    Context::Top => (),
                }
            }
            b"nd" => {
                if let Context::Way(builder) = context {
                    Self::handle_nd(el, data, builder)?;
                }
            }
            b"member" => {
                if let Context::Relation(builder) = context {
                    Self::handle_member(el, data, builder)?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    /// Closes the entity under construction, dropping it when incomplete.
    fn handle_end(name: &[u8], data: &mut OsmMapData, context: &mut Context) {
        let finished = std::mem::replace(context, Context::Top);
        match (name, finished) {
            (b"node", Context::Node(builder)) => match builder.build() {
                Ok(node) => {
                    data.nodes.insert(node.id, node);
                }
                Err(err) => debug!(err = err.message; "Dropping incomplete node"),
            },
            (b"way", Context::Way(builder)) => match builder.build() {
                Ok(way) => {
                    data.ways.insert(way.id, way);
                }
                Err(err) => debug!(err = err.message; "Dropping incomplete way"),
            },
            (b"relation", Context::Relation(builder)) => match builder.build() {
                Ok(relation) => {
                    data.relations.insert(relation.id, relation);
                }
                Err(err) => debug!(err = err.message; "Dropping incomplete relation"),
            },
            (_, unfinished) => *context = unfinished,
        }
    }

    pub fn parse_document<R: BufRead>(mut reader: Reader<R>) -> Result<OsmMapData> {
        let mut buf = Vec::new();
        let mut data = OsmMapData::default();
        let mut context = Context::Top;

        loop {
            match reader.read_event_into(&mut buf) {
                Err(err) => return Err(err.into()),
                Ok(Event::Eof) => break,
                Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_)) => (),
                Ok(Event::Text(_)) => {
                    return Err("Didn't expect to see text content in an OSM file.".into())
                }
                Ok(Event::Start(el)) => Self::handle_start(&el, &data, &mut context)?,
                Ok(Event::Empty(el)) => {
                    Self::handle_start(&el, &data, &mut context)?;
                    Self::handle_end(el.name().as_ref(), &mut data, &mut context);
                }
                Ok(Event::End(el)) => {
                    Self::handle_end(el.name().as_ref(), &mut data, &mut context)
                }
                Ok(_) => (),
            }
            // No borrow is kept across iterations, so the buffer can be
            // cleared to keep memory usage low.
            buf.clear();
        }
        Ok(data)
    }
}

impl Etl for ParseOsmEtl<'_> {
    type Input = ();
    type Output = OsmMapData;

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

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        Ok(())
    }

    fn transform(&mut self, _input: ()) -> Result<Self::Output> {
        let reader = self.create_osm_reader()?;
        Self::parse_document(reader)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let bytes =
            rkyv::to_bytes::<_, 256>(&output).map_err(|err| err.to_string())?;
        let mut output_file = File::create(Self::output_path(dir))?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}
