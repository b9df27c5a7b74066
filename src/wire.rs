//! Wire serialization of a request: a self-describing element tree in which
//! every composite node carries an `element_type` of `dictionary`, `list` or
//! `leaf`. The writer reproduces the legacy text layout byte-for-byte
//! (13-space header attribute indent, 8-space dictionary indent steps, list
//! nodes holding a single `EncodedString` payload, empty lists omitted).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use camino::Utf8Path;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::domain::{
    DatasetRecord, FileRecord, REQUEST_ATTRIBUTES, RequestAttributes, SUB_REQUEST_ATTRIBUTES,
    SubRequestRecord, SubRequestSpec, Value,
};
use crate::encode;
use crate::error::RequestError;
use crate::store::SubRequestStore;

pub(crate) const ROOT_TAG: &str = "DATAREQ_REQUEST";
const SUBREQUEST_SUFFIX: &str = "_SUBREQUEST";

enum Node {
    Leaf(String),
    Dict(Vec<(String, Node)>),
    List(Vec<Value>),
}

pub(crate) fn serialize(
    attributes: &RequestAttributes,
    store: &SubRequestStore,
    selection: Option<&str>,
) -> Result<String, RequestError> {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n\n");
    out.push_str(&format!("<{ROOT_TAG}>\n\n"));

    let mut header = String::new();
    for name in REQUEST_ATTRIBUTES {
        let value = attributes.get(name).unwrap_or_default();
        header.push_str(&format!("             {name}=\"{value}\"\n"));
    }
    out.push_str(&format!("<Header \n{header}/>\n\n"));

    let types = match selection {
        Some(rtype) => {
            if store.count(rtype) == 0 {
                return Err(RequestError::EmptySelection(rtype.to_string()));
            }
            vec![rtype.to_string()]
        }
        None => store.types(),
    };
    for rtype in &types {
        for ind in 0..store.count(rtype) {
            let record = store.get(ind, rtype)?;
            let name = format!("{}{SUBREQUEST_SUFFIX}", rtype.to_uppercase());
            out.push_str(&dict_to_xml(&name, &record_entries(record), 0));
        }
    }

    out.push_str(&format!("</{ROOT_TAG}>\n"));
    Ok(out)
}

fn record_entries(record: &SubRequestRecord) -> Vec<(String, Node)> {
    let mut attribute_entries = Vec::new();
    for name in SUB_REQUEST_ATTRIBUTES {
        if let Ok(value) = record.attributes.get(name) {
            attribute_entries.push((name.to_string(), value_to_node(&value)));
        }
    }
    for (name, value) in &record.attributes.extra {
        attribute_entries.push((name.clone(), value_to_node(value)));
    }
    vec![
        ("Attributes".to_string(), Node::Dict(attribute_entries)),
        (
            "Files".to_string(),
            Node::List(
                record
                    .files
                    .iter()
                    .map(|file| Value::Map(file.fields.clone()))
                    .collect(),
            ),
        ),
        (
            "Datasets".to_string(),
            Node::List(
                record
                    .datasets
                    .iter()
                    .map(|dataset| Value::Map(dataset.fields.clone()))
                    .collect(),
            ),
        ),
    ]
}

fn value_to_node(value: &Value) -> Node {
    match value {
        Value::Map(map) => Node::Dict(
            map.iter()
                .map(|(key, item)| (key.clone(), value_to_node(item)))
                .collect(),
        ),
        Value::List(items) => Node::List(items.clone()),
        other => Node::Leaf(other.to_string()),
    }
}

fn dict_to_xml(name: &str, entries: &[(String, Node)], indent: usize) -> String {
    let pad = " ".repeat(indent * 8);
    let leaf_pad = " ".repeat((indent + 1) * 8);
    let mut leaves = String::new();
    let mut elements = Vec::new();
    for (key, node) in entries {
        match node {
            Node::Leaf(value) => leaves.push_str(&format!(
                "{leaf_pad}<{key} element_type=\"leaf\"><![CDATA[{value}]]></{key}>\n"
            )),
            Node::Dict(children) => elements.push(dict_to_xml(key, children, indent + 1)),
            Node::List(items) => elements.push(list_to_xml(key, items, indent + 1)),
        }
    }

    let leaf_block = leaves.strip_suffix('\n').unwrap_or(&leaves);
    let mut out = format!("{pad}<{name} element_type=\"dictionary\">\n{leaf_block}\n");
    for element in &elements {
        out.push_str(&pad);
        out.push_str(element);
    }
    out.push_str(&format!("{pad}</{name}>\n"));
    out
}

fn list_to_xml(name: &str, items: &[Value], indent: usize) -> String {
    if items.is_empty() {
        return String::new();
    }
    let pad = " ".repeat(indent * 8);
    let inner_pad = " ".repeat((indent + 1) * 8);
    let payload = encode::encode(&Value::List(items.to_vec()));
    format!(
        "{pad}<{name} element_type=\"list\">\n\
         {inner_pad}<EncodedString element_type=\"leaf\"><![CDATA[{payload}]]></EncodedString>\n\
         {pad}</{name}>\n"
    )
}

/// Parses wire text from `source` directly, or from the file it names when
/// such a file exists.
pub(crate) fn load(source: &str) -> Result<(RequestAttributes, SubRequestStore), RequestError> {
    if Path::new(source).exists() {
        let text = fs::read_to_string(source)
            .map_err(|err| RequestError::Filesystem(format!("read {source}: {err}")))?;
        deserialize(&text)
    } else {
        deserialize(source)
    }
}

pub(crate) fn deserialize(
    text: &str,
) -> Result<(RequestAttributes, SubRequestStore), RequestError> {
    let document = parse_tree(text)?;
    let root = document
        .children
        .iter()
        .find(|node| node.name == ROOT_TAG)
        .ok_or_else(|| malformed(format!("missing {ROOT_TAG} root element")))?;
    let header = root
        .children
        .iter()
        .find(|node| node.name == "Header")
        .ok_or_else(|| malformed("missing Header element"))?;

    let mut attributes = RequestAttributes::default();
    for name in REQUEST_ATTRIBUTES {
        if let Some(value) = header.attribute(name) {
            attributes.set(name, value)?;
        }
    }

    let mut store = SubRequestStore::new();
    for child in &root.children {
        let Some(prefix) = child.name.strip_suffix(SUBREQUEST_SUFFIX) else {
            continue;
        };
        let rtype = prefix.to_lowercase();
        let spec = node_to_spec(child)?;
        store.add(&rtype, spec);
    }
    Ok((attributes, store))
}

pub(crate) fn write_to_path(text: &str, path: &Utf8Path) -> Result<(), RequestError> {
    let parent = path
        .parent()
        .ok_or_else(|| RequestError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| RequestError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("datareq")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| RequestError::Filesystem(err.to_string()))?;
    temp.write_all(text.as_bytes())
        .map_err(|err| RequestError::Filesystem(err.to_string()))?;
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| RequestError::Filesystem(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| RequestError::Filesystem(err.to_string()))?;
    Ok(())
}

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    element_type: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn parse_tree(text: &str) -> Result<XmlNode, RequestError> {
    let mut reader = Reader::from_str(text);
    let mut stack = vec![XmlNode::default()];
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_node(&start)?),
            Ok(Event::Empty(start)) => {
                let node = element_node(&start)?;
                push_child(&mut stack, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| malformed("unbalanced element"))?;
                push_child(&mut stack, node)?;
            }
            Ok(Event::Text(piece)) => {
                let piece = piece
                    .unescape()
                    .map_err(|err| malformed(err.to_string()))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&piece);
                }
            }
            Ok(Event::CData(cdata)) => {
                let bytes = cdata.into_inner();
                let piece = std::str::from_utf8(&bytes)
                    .map_err(|err| malformed(err.to_string()))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(piece);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(malformed(err.to_string())),
        }
    }
    if stack.len() != 1 {
        return Err(malformed("unterminated element"));
    }
    stack.pop().ok_or_else(|| malformed("empty document"))
}

fn element_node(start: &BytesStart<'_>) -> Result<XmlNode, RequestError> {
    let mut node = XmlNode {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..XmlNode::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| malformed(err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| malformed(err.to_string()))?
            .into_owned();
        if key == "element_type" {
            node.element_type = value;
        } else {
            node.attributes.push((key, value));
        }
    }
    Ok(node)
}

fn push_child(stack: &mut Vec<XmlNode>, node: XmlNode) -> Result<(), RequestError> {
    stack
        .last_mut()
        .ok_or_else(|| malformed("unbalanced element"))?
        .children
        .push(node);
    Ok(())
}

fn node_to_spec(node: &XmlNode) -> Result<SubRequestSpec, RequestError> {
    let mut spec = SubRequestSpec::default();
    for child in &node.children {
        match (child.name.as_str(), child.element_type.as_str()) {
            ("Attributes", "dictionary") => {
                for entry in &child.children {
                    if let Some(value) = node_to_value(entry)? {
                        spec.attributes.insert(entry.name.clone(), value);
                    }
                }
            }
            ("Files", "list") => {
                spec.files = decode_records(child)?
                    .into_iter()
                    .map(|fields| FileRecord { fields })
                    .collect();
            }
            ("Datasets", "list") => {
                spec.datasets = decode_records(child)?
                    .into_iter()
                    .map(|fields| DatasetRecord { fields })
                    .collect();
            }
            _ => debug!(element = %child.name, "ignoring unrecognized sub-request element"),
        }
    }
    Ok(spec)
}

fn node_to_value(node: &XmlNode) -> Result<Option<Value>, RequestError> {
    match node.element_type.as_str() {
        "leaf" => Ok(Some(Value::Text(node.text.trim().to_string()))),
        "dictionary" => {
            let mut map = BTreeMap::new();
            for child in &node.children {
                if let Some(value) = node_to_value(child)? {
                    map.insert(child.name.clone(), value);
                }
            }
            Ok(Some(Value::Map(map)))
        }
        "list" => Ok(Some(Value::List(decode_list(node)?))),
        _ => Ok(None),
    }
}

fn decode_list(node: &XmlNode) -> Result<Vec<Value>, RequestError> {
    let Some(leaf) = node
        .children
        .iter()
        .find(|child| child.name == "EncodedString" && child.element_type == "leaf")
    else {
        return Ok(Vec::new());
    };
    match encode::decode(leaf.text.trim())? {
        Value::List(items) => Ok(items),
        other => Err(RequestError::MalformedPayload(format!(
            "list payload decoded to a non-list value: {other}"
        ))),
    }
}

fn decode_records(node: &XmlNode) -> Result<Vec<BTreeMap<String, Value>>, RequestError> {
    decode_list(node)?
        .into_iter()
        .map(|item| match item {
            Value::Map(fields) => Ok(fields),
            other => Err(RequestError::MalformedPayload(format!(
                "record entry is not a field map: {other}"
            ))),
        })
        .collect()
}

fn malformed(message: impl Into<String>) -> RequestError {
    RequestError::MalformedDocument(message.into())
}
