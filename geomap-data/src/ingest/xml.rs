//! Event-driven parsing of the OSM XML extract.
//!
//! The document is read once with `quick-xml` and split into raw node, way
//! and relation records; the ingest pipeline then processes the kinds in
//! dependency order. Attributes are addressed by name, never by position.
//!
//! Failure granularity follows the loader contract: a document that cannot
//! be read or is not well-formed XML aborts the parse; a single element with
//! unparsable numeric attributes is skipped with a diagnostic and counted.

use std::path::{Path, PathBuf};

use log::warn;
use quick_xml::Reader;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use geomap_core::{Member, MemberKind, MemberRole, Node, Relation, Tags, Way};

/// Raw records split out of one extract document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtract {
    /// Node records in document order.
    pub nodes: Vec<Node>,
    /// Way records in document order.
    pub ways: Vec<Way>,
    /// Relation records in document order.
    pub relations: Vec<Relation>,
    /// Elements skipped over unparsable numeric attributes.
    pub skipped: u64,
}

/// Fatal parse failures. Anything recoverable is counted, not raised.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The extract file could not be opened.
    #[error("failed to open extract at {path}")]
    Open {
        /// Location of the extract.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: quick_xml::Error,
    },
    /// The document is not well-formed XML.
    #[error("malformed extract document")]
    Malformed {
        /// Underlying reader error.
        #[source]
        source: quick_xml::Error,
    },
    /// An element carries syntactically invalid attributes.
    #[error("malformed element attributes")]
    Attributes {
        /// Underlying attribute error.
        #[source]
        source: AttrError,
    },
    /// An attribute value carries an invalid escape sequence.
    #[error("invalid escape sequence in attribute value")]
    Escape,
}

/// Parse an extract document from disk.
///
/// # Errors
///
/// Returns [`ParseError`] when the file cannot be opened or the document is
/// not well-formed.
pub fn parse_extract(path: &Path) -> Result<RawExtract, ParseError> {
    let reader = Reader::from_file(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_with(reader)
}

/// Parse an extract document held in memory. Used by tests and tools that
/// synthesise extracts.
///
/// # Errors
///
/// Returns [`ParseError`] when the document is not well-formed.
pub fn parse_str(source: &str) -> Result<RawExtract, ParseError> {
    parse_with(Reader::from_reader(source.as_bytes()))
}

fn parse_with<R: std::io::BufRead>(mut reader: Reader<R>) -> Result<RawExtract, ParseError> {
    let mut builder = ExtractBuilder::default();
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|source| ParseError::Malformed { source })?
        {
            Event::Eof => break,
            Event::Start(element) => builder.open(&element, false)?,
            Event::Empty(element) => builder.open(&element, true)?,
            Event::End(element) => builder.close(element.name().as_ref()),
            _ => {}
        }
        buf.clear();
    }
    Ok(builder.finish())
}

/// The entity element currently being assembled.
#[derive(Debug)]
enum Container {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

#[derive(Debug, Default)]
struct ExtractBuilder {
    extract: RawExtract,
    current: Option<Container>,
    // Set while skipping the children of an element that failed to parse.
    discarding: bool,
}

impl ExtractBuilder {
    fn open(&mut self, element: &BytesStart<'_>, self_closing: bool) -> Result<(), ParseError> {
        match element.name().as_ref() {
            b"node" => self.open_entity(element, self_closing, Self::parse_node)?,
            b"way" => self.open_entity(element, self_closing, Self::parse_way)?,
            b"relation" => self.open_entity(element, self_closing, Self::parse_relation)?,
            b"tag" => self.apply_tag(element)?,
            b"nd" => self.apply_node_ref(element)?,
            b"member" => self.apply_member(element)?,
            _ => {}
        }
        Ok(())
    }

    fn open_entity(
        &mut self,
        element: &BytesStart<'_>,
        self_closing: bool,
        parse: fn(&Attrs) -> Option<Container>,
    ) -> Result<(), ParseError> {
        let attrs = Attrs::read(element)?;
        match parse(&attrs) {
            Some(container) if self_closing => self.store(container),
            Some(container) => self.current = Some(container),
            None => {
                self.extract.skipped += 1;
                warn!("skipping element with unparsable attributes");
                self.discarding = !self_closing;
            }
        }
        Ok(())
    }

    fn parse_node(attrs: &Attrs) -> Option<Container> {
        let id = attrs.parse::<i64>("id")?;
        let lat = attrs.parse::<f64>("lat")?;
        let lon = attrs.parse::<f64>("lon")?;
        Some(Container::Node(Node::new(id, lat, lon, Tags::new())))
    }

    fn parse_way(attrs: &Attrs) -> Option<Container> {
        let id = attrs.parse::<i64>("id")?;
        Some(Container::Way(Way::new(id, Tags::new(), Vec::new())))
    }

    fn parse_relation(attrs: &Attrs) -> Option<Container> {
        let id = attrs.parse::<i64>("id")?;
        Some(Container::Relation(Relation::new(
            id,
            Tags::new(),
            Vec::new(),
        )))
    }

    fn apply_tag(&mut self, element: &BytesStart<'_>) -> Result<(), ParseError> {
        if self.discarding {
            return Ok(());
        }
        let attrs = Attrs::read(element)?;
        let (Some(key), Some(value)) = (attrs.get("k"), attrs.get("v")) else {
            warn!("ignoring tag element without key/value attributes");
            return Ok(());
        };
        let tags = match &mut self.current {
            Some(Container::Node(node)) => &mut node.tags,
            Some(Container::Way(way)) => &mut way.tags,
            Some(Container::Relation(relation)) => &mut relation.tags,
            None => return Ok(()),
        };
        // Last write wins on duplicate keys.
        tags.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn apply_node_ref(&mut self, element: &BytesStart<'_>) -> Result<(), ParseError> {
        if self.discarding {
            return Ok(());
        }
        let attrs = Attrs::read(element)?;
        let Some(Container::Way(way)) = &mut self.current else {
            return Ok(());
        };
        match attrs.parse::<i64>("ref") {
            Some(node_ref) => way.node_refs.push(node_ref),
            None => {
                // The whole way is unusable once one reference is garbage.
                warn!("skipping way {} with unparsable node reference", way.id);
                self.extract.skipped += 1;
                self.current = None;
                self.discarding = true;
            }
        }
        Ok(())
    }

    fn apply_member(&mut self, element: &BytesStart<'_>) -> Result<(), ParseError> {
        if self.discarding {
            return Ok(());
        }
        let attrs = Attrs::read(element)?;
        let Some(Container::Relation(relation)) = &mut self.current else {
            return Ok(());
        };
        let Some(ref_id) = attrs.parse::<i64>("ref") else {
            warn!(
                "skipping relation {} with unparsable member reference",
                relation.id
            );
            self.extract.skipped += 1;
            self.current = None;
            self.discarding = true;
            return Ok(());
        };
        let role = MemberRole::from_name(attrs.get("role").unwrap_or_default());
        let Some(kind) = attrs.get("type").and_then(MemberKind::from_name) else {
            warn!(
                "relation {}: ignoring member {ref_id} of unknown kind",
                relation.id
            );
            return Ok(());
        };
        relation.members.push(Member::new(ref_id, role, kind));
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        if !matches!(name, b"node" | b"way" | b"relation") {
            return;
        }
        self.discarding = false;
        if let Some(container) = self.current.take() {
            self.store(container);
        }
    }

    fn store(&mut self, container: Container) {
        match container {
            Container::Node(node) => self.extract.nodes.push(node),
            Container::Way(way) => self.extract.ways.push(way),
            Container::Relation(relation) => self.extract.relations.push(relation),
        }
    }

    fn finish(self) -> RawExtract {
        self.extract
    }
}

/// Named attribute access over one element.
struct Attrs {
    values: Vec<(Vec<u8>, String)>,
}

impl Attrs {
    fn read(element: &BytesStart<'_>) -> Result<Self, ParseError> {
        let mut values = Vec::new();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|source| ParseError::Attributes { source })?;
            let value = attribute.unescape_value().map_err(|_| ParseError::Escape)?;
            values.push((attribute.key.as_ref().to_vec(), value.into_owned()));
        }
        Ok(Self { values })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name.as_bytes())
            .map(|(_, value)| value.as_str())
    }

    fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.parse().ok()
    }
}
