//! Minimal XML-RPC codec: enough to encode a `methodCall` and decode a
//! `methodResponse` (including faults).

use crate::types::{RelayError, Result};
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    DateTime(String),
    Base64(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Nil,
}

impl Value {
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Scalar rendering used for ids returned by the remote.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::String(s) | Value::DateTime(s) | Value::Base64(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Nil => String::new(),
            other => format!("{:?}", other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

pub fn encode_method_call(method: &str, params: &[Value]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    start(&mut writer, "methodCall")?;
    leaf(&mut writer, "methodName", method)?;
    start(&mut writer, "params")?;
    for param in params {
        start(&mut writer, "param")?;
        write_value(&mut writer, param)?;
        end(&mut writer, "param")?;
    }
    end(&mut writer, "params")?;
    end(&mut writer, "methodCall")?;
    Ok(writer.into_inner())
}

/// Decode a `methodResponse` body into its single return value.
/// A `<fault>` response becomes [`RelayError::Fault`].
pub fn decode_response(body: &[u8]) -> Result<Value> {
    let root = parse_tree(body)?;
    if root.name != "methodResponse" {
        return Err(malformed(format!("unexpected root element <{}>", root.name)));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| malformed("fault without value"))
            .and_then(value_from_node)?;
        let code = match value.member("faultCode") {
            Some(Value::Int(code)) => *code,
            _ => 0,
        };
        let message = value
            .member("faultString")
            .map(Value::to_plain_string)
            .unwrap_or_default();
        return Err(RelayError::Fault { code, message });
    }

    root.child("params")
        .and_then(|params| params.child("param"))
        .and_then(|param| param.child("value"))
        .ok_or_else(|| malformed("response without a return value"))
        .and_then(value_from_node)
}

fn malformed(why: impl Into<String>) -> RelayError {
    RelayError::XmlRpc(format!("malformed response: {}", why.into()))
}

type XmlWriter = Writer<Vec<u8>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| RelayError::XmlRpc(format!("failed writing request: {}", e)))
}

fn start(writer: &mut XmlWriter, name: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn leaf(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    start(writer, name)?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    end(writer, name)
}

fn write_value(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    start(writer, "value")?;
    match value {
        Value::String(s) => leaf(writer, "string", s)?,
        Value::Int(i) => leaf(writer, "int", &i.to_string())?,
        Value::Bool(b) => leaf(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Double(d) => leaf(writer, "double", &d.to_string())?,
        Value::DateTime(s) => leaf(writer, "dateTime.iso8601", s)?,
        Value::Base64(s) => leaf(writer, "base64", s)?,
        Value::Nil => emit(writer, Event::Empty(BytesStart::new("nil")))?,
        Value::Array(items) => {
            start(writer, "array")?;
            start(writer, "data")?;
            for item in items {
                write_value(writer, item)?;
            }
            end(writer, "data")?;
            end(writer, "array")?;
        }
        Value::Struct(members) => {
            start(writer, "struct")?;
            for (name, member) in members {
                start(writer, "member")?;
                leaf(writer, "name", name)?;
                write_value(writer, member)?;
                end(writer, "member")?;
            }
            end(writer, "struct")?;
        }
    }
    end(writer, "value")
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(xml: &[u8]) -> Result<Node> {
    // Text is kept verbatim; whitespace inside <string> is significant.
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    // stack[0] is a synthetic document node
    let mut stack = vec![Node::default()];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(Node::named(e.name().as_ref())),
            Ok(Event::Empty(e)) => {
                let node = Node::named(e.name().as_ref());
                top(&mut stack)?.children.push(node);
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(malformed("unbalanced end tag"));
                }
                let node = stack.pop().ok_or_else(|| malformed("unbalanced end tag"))?;
                top(&mut stack)?.children.push(node);
            }
            Ok(Event::Text(e)) => {
                // Blogs echo HTML entities such as &nbsp; back; an entity we
                // cannot resolve is kept as written.
                let text = match e.unescape_with(resolve_html5_entity) {
                    Ok(text) => text.into_owned(),
                    Err(err) => {
                        debug!("Keeping unresolved text verbatim: {}", err);
                        String::from_utf8_lossy(&e).into_owned()
                    }
                };
                top(&mut stack)?.text.push_str(&text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                top(&mut stack)?.text.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(malformed("unexpected end of document"));
    }
    stack
        .pop()
        .and_then(|document| document.children.into_iter().next())
        .ok_or_else(|| malformed("empty document"))
}

fn top(stack: &mut [Node]) -> Result<&mut Node> {
    stack.last_mut().ok_or_else(|| malformed("unbalanced document"))
}

fn value_from_node(value: &Node) -> Result<Value> {
    let typed = match value.children.first() {
        Some(typed) => typed,
        // untyped <value> defaults to string
        None => return Ok(Value::String(value.text.clone())),
    };

    let text = typed.text.trim();
    Ok(match typed.name.as_str() {
        "string" => Value::String(typed.text.clone()),
        "int" | "i4" | "i8" => Value::Int(
            text.parse()
                .map_err(|_| malformed(format!("bad integer {:?}", text)))?,
        ),
        "boolean" => Value::Bool(text == "1" || text.eq_ignore_ascii_case("true")),
        "double" => Value::Double(
            text.parse()
                .map_err(|_| malformed(format!("bad double {:?}", text)))?,
        ),
        "dateTime.iso8601" => Value::DateTime(text.to_string()),
        "base64" => Value::Base64(text.to_string()),
        "nil" => Value::Nil,
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .children
                    .iter()
                    .filter(|c| c.name == "value")
                    .map(value_from_node)
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "struct" => {
            let mut members = Vec::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member
                    .child("name")
                    .map(|n| n.text.trim().to_string())
                    .ok_or_else(|| malformed("struct member without name"))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| malformed("struct member without value"))
                    .and_then(value_from_node)?;
                members.push((name, value));
            }
            Value::Struct(members)
        }
        other => return Err(malformed(format!("unknown value type <{}>", other))),
    })
}
