//! Data-source model.
//!
//! A data source is a named reference to one hardware or computed value. The
//! registry stores each one as an XML body such as
//!
//! ```xml
//! <definition>
//!   <datasource type="TANGO" name="exp_c01">
//!     <device name="p09/counter/exp.01" member="attribute" hostname="haso" port="10000"/>
//!     <record name="Value"/>
//!   </datasource>
//! </definition>
//! ```
//!
//! [`DataSource`] is a closed enum tagged by [`DataSourceKind`]; resolution and
//! emission code branches on the variant rather than on the raw `type` string.

use crate::error::{Result, SelectorError};
use crate::xml::{attribute, DEFINITION_TAG};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default Tango database port; a record only carries `host:port` when a host is declared.
pub const DEFAULT_TANGO_PORT: u16 = 10000;

/// Label used for data sources whose declared name is empty.
pub const UNNAMED_DATA_SOURCE: &str = "__unnamed__";

/// When a data source is read during an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    /// Once at the start of the scan.
    Init,
    /// At every acquisition step.
    Step,
    /// Once at the end of the scan.
    Final,
    /// Metadata only.
    Config,
}

impl Strategy {
    /// Registry spelling of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Init => "INIT",
            Strategy::Step => "STEP",
            Strategy::Final => "FINAL",
            Strategy::Config => "CONFIG",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INIT" => Ok(Strategy::Init),
            "STEP" => Ok(Strategy::Step),
            "FINAL" => Ok(Strategy::Final),
            "CONFIG" => Ok(Strategy::Config),
            other => Err(SelectorError::Xml(format!("unknown strategy mode '{other}'"))),
        }
    }
}

/// Discriminant of [`DataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSourceKind {
    /// Control-system attribute.
    Tango,
    /// Value supplied by the client at scan time.
    Client,
    /// Database query.
    Db,
    /// Python expression evaluated by the writer.
    #[serde(rename = "PYEVAL")]
    PyEval,
    /// Any kind this crate does not model.
    Other,
}

impl DataSourceKind {
    /// Registry spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceKind::Tango => "TANGO",
            DataSourceKind::Client => "CLIENT",
            DataSourceKind::Db => "DB",
            DataSourceKind::PyEval => "PYEVAL",
            DataSourceKind::Other => "OTHER",
        }
    }

    /// Kinds whose availability depends on live hardware.
    pub fn is_hardware_backed(&self) -> bool {
        matches!(self, DataSourceKind::Tango | DataSourceKind::Client)
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for DataSourceKind {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "TANGO" => DataSourceKind::Tango,
            "CLIENT" => DataSourceKind::Client,
            "DB" => DataSourceKind::Db,
            "PYEVAL" => DataSourceKind::PyEval,
            _ => DataSourceKind::Other,
        }
    }
}

/// Kind-specific payload of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum DataSource {
    /// Attribute or property of a control-system device.
    Tango {
        /// Device path, possibly an alias or a multi-segment `domain/family/member`.
        device: String,
        /// `attribute`, `property` or `command`.
        member: String,
        /// Control-system host; `None` for the default database.
        host: Option<String>,
        /// Port on `host`; 10000 when only the host is given.
        port: Option<u16>,
        /// Attribute (or property/command) name.
        record: String,
    },
    /// Client-provided value.
    Client {
        /// Name the client supplies the value under.
        record: String,
    },
    /// Database query result.
    Db {
        /// Database flavour, e.g. `MYSQL`.
        db_type: String,
        /// Query text.
        query: String,
    },
    /// Evaluated Python script.
    #[serde(rename = "PYEVAL")]
    PyEval {
        /// Name the script stores its result under.
        result: String,
        /// Script source.
        script: String,
    },
    /// Unmodelled kind kept verbatim.
    Other {
        /// Kind as written in the registry.
        kind: String,
        /// Record as written in the registry.
        record: String,
    },
}

impl DataSource {
    /// Tag of this variant.
    pub fn kind(&self) -> DataSourceKind {
        match self {
            DataSource::Tango { .. } => DataSourceKind::Tango,
            DataSource::Client { .. } => DataSourceKind::Client,
            DataSource::Db { .. } => DataSourceKind::Db,
            DataSource::PyEval { .. } => DataSourceKind::PyEval,
            DataSource::Other { .. } => DataSourceKind::Other,
        }
    }

    /// Canonical record string.
    ///
    /// TANGO sources yield `host:port/device/attribute` when a host is declared
    /// and `device/attribute` otherwise.
    pub fn record(&self) -> String {
        match self {
            DataSource::Tango {
                device,
                host,
                port,
                record,
                ..
            } => {
                let path = device
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .chain(std::iter::once(record.as_str()))
                    .collect::<Vec<_>>()
                    .join("/");
                match host.as_deref().filter(|h| !h.is_empty()) {
                    Some(host) => {
                        format!("{host}:{}/{path}", port.unwrap_or(DEFAULT_TANGO_PORT))
                    }
                    None => path,
                }
            }
            DataSource::Client { record } | DataSource::Other { record, .. } => record.clone(),
            DataSource::Db { query, .. } => query.clone(),
            DataSource::PyEval { result, .. } => result.clone(),
        }
    }
}

/// A named data source as stored in the configuration registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDefinition {
    /// Declared name; may be empty in hand-written bodies.
    pub name: String,
    /// Kind-specific payload.
    pub source: DataSource,
}

impl DataSourceDefinition {
    /// Definition named `name` backed by `source`.
    pub fn new(name: impl Into<String>, source: DataSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// CLIENT data source reading `record`.
    pub fn client(name: impl Into<String>, record: impl Into<String>) -> Self {
        Self::new(
            name,
            DataSource::Client {
                record: record.into(),
            },
        )
    }

    /// TANGO data source reading `attribute` of `device`.
    pub fn tango(
        name: impl Into<String>,
        device: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            DataSource::Tango {
                device: device.into(),
                member: "attribute".into(),
                host: None,
                port: None,
                record: attribute.into(),
            },
        )
    }

    /// Declared name, or [`UNNAMED_DATA_SOURCE`] when it is empty.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            UNNAMED_DATA_SOURCE
        } else {
            &self.name
        }
    }

    /// Parse a registry body.
    pub fn from_xml(body: &str) -> Result<Self> {
        let mut reader = Reader::from_str(body);
        reader.trim_text(true);

        let mut parsed = RawDataSource::default();
        let mut capture_text = false;
        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => {
                    parsed.open(&e)?;
                    capture_text = matches!(e.name().as_ref(), b"query" | b"result");
                }
                Event::Empty(e) => parsed.open(&e)?,
                Event::Text(t) if capture_text => parsed.text.push_str(&t.unescape()?),
                Event::CData(c) if capture_text => {
                    parsed.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
                Event::End(_) => capture_text = false,
                _ => {}
            }
        }
        parsed.finish()
    }

    /// Serialize as a standalone registry body (`<definition>` root included).
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = crate::xml::document_writer()?;
        writer.write_event(Event::Start(BytesStart::new(DEFINITION_TAG)))?;
        self.write_xml(&mut writer)?;
        writer.write_event(Event::End(BytesEnd::new(DEFINITION_TAG)))?;
        crate::xml::finish(writer)
    }

    /// Write the `<datasource>` element into an existing document.
    pub fn write_xml<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new("datasource");
        start.push_attribute(("type", self.source.kind().as_str()));
        start.push_attribute(("name", self.name.as_str()));
        writer.write_event(Event::Start(start))?;
        match &self.source {
            DataSource::Tango {
                device,
                member,
                host,
                port,
                record,
            } => {
                let mut dev = BytesStart::new("device");
                dev.push_attribute(("name", device.as_str()));
                dev.push_attribute(("member", member.as_str()));
                if let Some(host) = host {
                    dev.push_attribute(("hostname", host.as_str()));
                }
                if let Some(port) = port {
                    dev.push_attribute(("port", port.to_string().as_str()));
                }
                writer.write_event(Event::Empty(dev))?;
                write_record(writer, record)?;
            }
            DataSource::Client { record } | DataSource::Other { record, .. } => {
                write_record(writer, record)?;
            }
            DataSource::Db { db_type, query } => {
                let mut db = BytesStart::new("database");
                db.push_attribute(("dbtype", db_type.as_str()));
                writer.write_event(Event::Empty(db))?;
                writer.write_event(Event::Start(BytesStart::new("query")))?;
                writer.write_event(Event::Text(BytesText::new(query)))?;
                writer.write_event(Event::End(BytesEnd::new("query")))?;
            }
            DataSource::PyEval { result, script } => {
                let mut res = BytesStart::new("result");
                res.push_attribute(("name", result.as_str()));
                writer.write_event(Event::Start(res))?;
                writer.write_event(Event::Text(BytesText::new(script)))?;
                writer.write_event(Event::End(BytesEnd::new("result")))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("datasource")))?;
        Ok(())
    }
}

fn write_record<W: std::io::Write>(writer: &mut Writer<W>, record: &str) -> Result<()> {
    let mut rec = BytesStart::new("record");
    rec.push_attribute(("name", record));
    writer.write_event(Event::Empty(rec))?;
    Ok(())
}

#[derive(Default)]
struct RawDataSource {
    seen: bool,
    name: String,
    kind: String,
    device: String,
    member: Option<String>,
    host: Option<String>,
    port: Option<String>,
    record: Option<String>,
    db_type: Option<String>,
    result: Option<String>,
    text: String,
}

impl RawDataSource {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.name().as_ref() {
            // nested datasources (e.g. PYEVAL inputs) keep the outer identity
            b"datasource" if !self.seen => {
                self.seen = true;
                self.kind = attribute(e, "type")?.unwrap_or_default();
                self.name = attribute(e, "name")?.unwrap_or_default();
            }
            b"device" => {
                self.device = attribute(e, "name")?.unwrap_or_default();
                self.member = attribute(e, "member")?;
                self.host = attribute(e, "hostname")?;
                self.port = attribute(e, "port")?;
            }
            b"record" if self.record.is_none() => {
                self.record = attribute(e, "name")?;
            }
            b"database" => self.db_type = attribute(e, "dbtype")?,
            b"result" => self.result = attribute(e, "name")?,
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<DataSourceDefinition> {
        if !self.seen {
            return Err(SelectorError::Xml("no <datasource> element found".into()));
        }
        let record = self.record.unwrap_or_default();
        let source = match DataSourceKind::from(self.kind.as_str()) {
            DataSourceKind::Tango => DataSource::Tango {
                device: self.device,
                member: self.member.unwrap_or_else(|| "attribute".into()),
                host: self.host.filter(|h| !h.is_empty()),
                port: match self.port.as_deref().map(str::trim) {
                    Some(p) if !p.is_empty() => Some(p.parse::<u16>().map_err(|_| {
                        SelectorError::Xml(format!("invalid Tango port '{p}'"))
                    })?),
                    _ => None,
                },
                record,
            },
            DataSourceKind::Client => DataSource::Client { record },
            DataSourceKind::Db => DataSource::Db {
                db_type: self.db_type.unwrap_or_default(),
                query: self.text.trim().to_string(),
            },
            DataSourceKind::PyEval => DataSource::PyEval {
                result: self.result.unwrap_or_else(|| "result".into()),
                script: self.text.trim().to_string(),
            },
            DataSourceKind::Other => DataSource::Other {
                kind: self.kind,
                record,
            },
        };
        Ok(DataSourceDefinition {
            name: self.name,
            source,
        })
    }
}

/// A Tango record split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TangoAddress {
    /// `host:port` prefix, when the address names one.
    pub host: Option<String>,
    /// Device path or alias (everything between the host and the attribute).
    pub device: String,
    /// Attribute part of the address.
    pub attribute: String,
}

impl TangoAddress {
    /// Split `[tango://][host:port/]device/attribute`.
    ///
    /// A record without any `/` is taken as a bare attribute with no device.
    pub fn parse(record: &str) -> Self {
        let trimmed = record.trim().trim_start_matches("tango://");
        let mut segments: Vec<&str> = trimmed.split('/').collect();
        let host = match segments.first() {
            Some(first) if first.contains(':') && segments.len() > 1 => {
                Some(segments.remove(0).to_string())
            }
            _ => None,
        };
        let attribute = segments.pop().unwrap_or_default().to_string();
        Self {
            host,
            device: segments
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/"),
            attribute,
        }
    }

    /// `device/attribute` without the host prefix.
    pub fn local(&self) -> String {
        if self.device.is_empty() {
            self.attribute.clone()
        } else {
            format!("{}/{}", self.device, self.attribute)
        }
    }

    /// The device part is a single segment, i.e. an alias rather than a full path.
    pub fn is_alias(&self) -> bool {
        !self.device.is_empty() && !self.device.contains('/')
    }
}
