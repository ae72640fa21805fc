//! XML form of requirement documents.
//!
//! The element layout is fixed:
//!
//! ```text
//! Requirement
//! ├── Client            (text)
//! ├── Version           (text)
//! └── Tables
//!     └── Table         @name @pkey?
//!         ├── PrimaryKey
//!         │   └── Key   @name
//!         └── Columns
//!             └── Column        @name
//!                 ├── Function  (text)
//!                 └── Parameters
//!                     └── Parameter @name @value @type
//! ```
//!
//! Reading is a recursive descent over quick-xml events. Unknown elements are
//! skipped; text is taken verbatim so that [`render`] followed by [`parse`]
//! reproduces the same document.

use super::{Column, Key, Parameter, Requirement, Table};
use crate::{Result, error::DataMaskError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const REQUIREMENT: &str = "Requirement";
const CLIENT: &str = "Client";
const VERSION: &str = "Version";
const TABLES: &str = "Tables";
const TABLE: &str = "Table";
const PRIMARY_KEY: &str = "PrimaryKey";
const KEY: &str = "Key";
const COLUMNS: &str = "Columns";
const COLUMN: &str = "Column";
const FUNCTION: &str = "Function";
const PARAMETERS: &str = "Parameters";
const PARAMETER: &str = "Parameter";

const ATTR_NAME: &str = "name";
const ATTR_PKEY: &str = "pkey";
const ATTR_VALUE: &str = "value";
const ATTR_TYPE: &str = "type";

/// Parses an XML requirement document.
pub(crate) fn parse(input: &str) -> Result<Requirement> {
    let mut parser = Parser::new(input);
    let mut requirement = None;

    loop {
        match parser.next()? {
            Event::Start(start) | Event::Empty(start) if requirement.is_some() => {
                return Err(parser.format_error(format!(
                    "unexpected element <{}> after the root element",
                    element_name(&start)
                )));
            }
            Event::Start(start) => {
                parser.expect_root(&start)?;
                requirement = Some(parser.requirement()?);
            }
            Event::Empty(start) => {
                parser.expect_root(&start)?;
                requirement = Some(Requirement::default());
            }
            Event::Text(text) if is_blank(&text) => {}
            Event::Text(_) | Event::CData(_) => {
                return Err(parser.format_error("unexpected text outside the root element"));
            }
            Event::End(end) => {
                return Err(parser.format_error(format!(
                    "unexpected closing tag </{}>",
                    String::from_utf8_lossy(end.local_name().as_ref())
                )));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    requirement.ok_or_else(|| {
        DataMaskError::document_format(None, format!("missing root element <{}>", REQUIREMENT))
    })
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);
        Self { reader }
    }

    fn next(&mut self) -> Result<Event<'a>> {
        self.reader.read_event().map_err(|e| {
            DataMaskError::document_format(Some(self.reader.error_position() as u64), e.to_string())
        })
    }

    fn format_error(&self, message: impl Into<String>) -> DataMaskError {
        DataMaskError::document_format(Some(self.reader.buffer_position() as u64), message)
    }

    fn expect_root(&self, start: &BytesStart<'_>) -> Result<()> {
        if start.local_name().as_ref() == REQUIREMENT.as_bytes() {
            Ok(())
        } else {
            Err(self.format_error(format!(
                "expected root element <{}>, found <{}>",
                REQUIREMENT,
                element_name(start)
            )))
        }
    }

    /// Walks the children of the current element until its closing tag,
    /// handing every child element to `on_child`.
    fn children<F>(&mut self, parent: &str, mut on_child: F) -> Result<()>
    where
        F: FnMut(&mut Self, &BytesStart<'a>, bool) -> Result<()>,
    {
        loop {
            match self.next()? {
                Event::Start(start) => on_child(self, &start, false)?,
                Event::Empty(start) => on_child(self, &start, true)?,
                Event::End(_) => return Ok(()),
                Event::Text(text) if is_blank(&text) => {}
                Event::Text(_) | Event::CData(_) => {
                    return Err(self.format_error(format!("unexpected text inside <{}>", parent)));
                }
                Event::Eof => {
                    return Err(self.format_error(format!(
                        "unexpected end of document inside <{}>",
                        parent
                    )));
                }
                _ => {}
            }
        }
    }

    /// Reads the verbatim text content of a leaf element.
    fn text(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<String> {
        let mut content = String::new();
        if empty {
            return Ok(content);
        }

        loop {
            match self.next()? {
                Event::Text(text) => {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| self.format_error(e.to_string()))?;
                    content.push_str(&unescaped);
                }
                Event::CData(data) => content.push_str(&String::from_utf8_lossy(&data)),
                Event::End(_) => return Ok(content),
                Event::Start(child) | Event::Empty(child) => {
                    return Err(self.format_error(format!(
                        "unexpected element <{}> inside <{}>",
                        element_name(&child),
                        element_name(start)
                    )));
                }
                Event::Eof => {
                    return Err(self.format_error(format!(
                        "unexpected end of document inside <{}>",
                        element_name(start)
                    )));
                }
                _ => {}
            }
        }
    }

    fn skip(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<()> {
        tracing::warn!("Skipping unknown element <{}>", element_name(start));
        if !empty {
            self.reader
                .read_to_end(start.name())
                .map_err(|e| self.format_error(e.to_string()))?;
        }
        Ok(())
    }

    fn attribute(&self, start: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.format_error(e.to_string()))?;
            if attribute.key.local_name().as_ref() == name.as_bytes() {
                let value = attribute
                    .unescape_value()
                    .map_err(|e| self.format_error(e.to_string()))?;
                return Ok(Some(value.into_owned()));
            }
        }
        Ok(None)
    }

    fn required_attribute(&self, start: &BytesStart<'_>, name: &str) -> Result<String> {
        self.attribute(start, name)?.ok_or_else(|| {
            self.format_error(format!(
                "<{}> is missing required attribute '{}'",
                element_name(start),
                name
            ))
        })
    }

    fn requirement(&mut self) -> Result<Requirement> {
        let mut requirement = Requirement::default();
        self.children(REQUIREMENT, |parser, child, empty| {
            match child.local_name().as_ref() {
                name if name == CLIENT.as_bytes() => requirement.client = parser.text(child, empty)?,
                name if name == VERSION.as_bytes() => {
                    requirement.version = parser.text(child, empty)?
                }
                name if name == TABLES.as_bytes() => {
                    if !empty {
                        requirement.tables = parser.tables()?;
                    }
                }
                _ => parser.skip(child, empty)?,
            }
            Ok(())
        })?;
        Ok(requirement)
    }

    fn tables(&mut self) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        self.children(TABLES, |parser, child, empty| {
            if child.local_name().as_ref() == TABLE.as_bytes() {
                tables.push(parser.table(child, empty)?);
                Ok(())
            } else {
                parser.skip(child, empty)
            }
        })?;
        Ok(tables)
    }

    fn table(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<Table> {
        let mut table = Table::new(self.required_attribute(start, ATTR_NAME)?);
        table.primary_key = self.attribute(start, ATTR_PKEY)?;
        if empty {
            return Ok(table);
        }

        self.children(TABLE, |parser, child, empty| {
            match child.local_name().as_ref() {
                name if name == PRIMARY_KEY.as_bytes() => {
                    if !empty {
                        table.primary_keys = parser.keys()?;
                    }
                }
                name if name == COLUMNS.as_bytes() => {
                    if !empty {
                        table.columns = parser.columns()?;
                    }
                }
                _ => parser.skip(child, empty)?,
            }
            Ok(())
        })?;
        Ok(table)
    }

    fn keys(&mut self) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        self.children(PRIMARY_KEY, |parser, child, empty| {
            if child.local_name().as_ref() == KEY.as_bytes() {
                keys.push(Key::new(parser.required_attribute(child, ATTR_NAME)?));
                if !empty {
                    parser.skip(child, empty)?;
                }
                Ok(())
            } else {
                parser.skip(child, empty)
            }
        })?;
        Ok(keys)
    }

    fn columns(&mut self) -> Result<Vec<Column>> {
        let mut columns = Vec::new();
        self.children(COLUMNS, |parser, child, empty| {
            if child.local_name().as_ref() == COLUMN.as_bytes() {
                columns.push(parser.column(child, empty)?);
                Ok(())
            } else {
                parser.skip(child, empty)
            }
        })?;
        Ok(columns)
    }

    fn column(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<Column> {
        let mut column = Column::new(self.required_attribute(start, ATTR_NAME)?, "");
        if empty {
            return Ok(column);
        }

        self.children(COLUMN, |parser, child, empty| {
            match child.local_name().as_ref() {
                name if name == FUNCTION.as_bytes() => {
                    column.function = parser.text(child, empty)?
                }
                name if name == PARAMETERS.as_bytes() => {
                    if !empty {
                        column.parameters = parser.parameters()?;
                    }
                }
                _ => parser.skip(child, empty)?,
            }
            Ok(())
        })?;
        Ok(column)
    }

    fn parameters(&mut self) -> Result<Vec<Parameter>> {
        let mut parameters = Vec::new();
        self.children(PARAMETERS, |parser, child, empty| {
            if child.local_name().as_ref() == PARAMETER.as_bytes() {
                parameters.push(Parameter::with_raw_type(
                    parser.required_attribute(child, ATTR_NAME)?,
                    parser.attribute(child, ATTR_VALUE)?.unwrap_or_default(),
                    parser.required_attribute(child, ATTR_TYPE)?,
                ));
                if !empty {
                    parser.skip(child, empty)?;
                }
                Ok(())
            } else {
                parser.skip(child, empty)
            }
        })?;
        Ok(parameters)
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

/// Renders a requirement document as indented XML.
pub(crate) fn render(requirement: &Requirement) -> Result<Vec<u8>> {
    let mut out = XmlOut {
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
    };

    out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.open(BytesStart::new(REQUIREMENT))?;
    out.leaf(CLIENT, &requirement.client)?;
    out.leaf(VERSION, &requirement.version)?;

    out.open(BytesStart::new(TABLES))?;
    for table in &requirement.tables {
        out.table(table)?;
    }
    out.close(TABLES)?;

    out.close(REQUIREMENT)?;

    let mut bytes = out.writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(|e| {
            DataMaskError::document_format(
                None,
                format!("Failed to render requirement document: {}", e),
            )
        })
    }

    fn open(&mut self, start: BytesStart<'_>) -> Result<()> {
        self.emit(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    /// Writes `<name>text</name>`. The text event is always emitted, even when
    /// empty, so the indenting writer keeps the closing tag on the same line.
    fn leaf(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(BytesStart::new(name))?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn table(&mut self, table: &Table) -> Result<()> {
        let mut start = BytesStart::new(TABLE);
        start.push_attribute((ATTR_NAME, table.name.as_str()));
        if let Some(primary_key) = &table.primary_key {
            start.push_attribute((ATTR_PKEY, primary_key.as_str()));
        }
        self.open(start)?;

        if !table.primary_keys.is_empty() {
            self.open(BytesStart::new(PRIMARY_KEY))?;
            for key in &table.primary_keys {
                let mut element = BytesStart::new(KEY);
                element.push_attribute((ATTR_NAME, key.name.as_str()));
                self.emit(Event::Empty(element))?;
            }
            self.close(PRIMARY_KEY)?;
        }

        self.open(BytesStart::new(COLUMNS))?;
        for column in &table.columns {
            self.column(column)?;
        }
        self.close(COLUMNS)?;

        self.close(TABLE)
    }

    fn column(&mut self, column: &Column) -> Result<()> {
        let mut start = BytesStart::new(COLUMN);
        start.push_attribute((ATTR_NAME, column.name.as_str()));
        self.open(start)?;

        self.leaf(FUNCTION, &column.function)?;

        self.open(BytesStart::new(PARAMETERS))?;
        for parameter in &column.parameters {
            let mut element = BytesStart::new(PARAMETER);
            element.push_attribute((ATTR_NAME, parameter.name.as_str()));
            element.push_attribute((ATTR_VALUE, parameter.value.as_str()));
            element.push_attribute((ATTR_TYPE, parameter.declared_type.as_str()));
            self.emit(Event::Empty(element))?;
        }
        self.close(PARAMETERS)?;

        self.close(COLUMN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::DeclaredType;

    #[test]
    fn test_parse_minimal_document() {
        let xml = r#"<?xml version="1.0"?>
<Requirement>
    <Client>Acme</Client>
    <Version>2.1</Version>
    <Tables>
        <Table name="users" pkey="id">
            <Columns>
                <Column name="ssn">
                    <Function>mask</Function>
                    <Parameters>
                        <Parameter name="keep" value="4" type="Integer"/>
                    </Parameters>
                </Column>
            </Columns>
        </Table>
    </Tables>
</Requirement>"#;

        let requirement = parse(xml).unwrap();
        assert_eq!(requirement.client, "Acme");
        assert_eq!(requirement.version, "2.1");
        let table = &requirement.tables[0];
        assert_eq!(table.name, "users");
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert!(table.primary_keys.is_empty());
        let column = &table.columns[0];
        assert_eq!(column.function, "mask");
        assert_eq!(
            column.parameters[0],
            Parameter::new("keep", "4", DeclaredType::Integer)
        );
    }

    #[test]
    fn test_parse_unescapes_text_and_attributes() {
        let xml = r#"<Requirement>
  <Client>Smith &amp; Sons</Client>
  <Version><![CDATA[1.0 <beta>]]></Version>
  <Tables>
    <Table name="a&quot;b">
      <Columns>
        <Column name="c">
          <Function>f</Function>
          <Parameters>
            <Parameter name="p" value="x &lt; y" type="String"/>
          </Parameters>
        </Column>
      </Columns>
    </Table>
  </Tables>
</Requirement>"#;

        let requirement = parse(xml).unwrap();
        assert_eq!(requirement.client, "Smith & Sons");
        assert_eq!(requirement.version, "1.0 <beta>");
        assert_eq!(requirement.tables[0].name, "a\"b");
        assert_eq!(requirement.tables[0].columns[0].parameters[0].value, "x < y");
    }

    #[test]
    fn test_parse_skips_unknown_elements() {
        let xml = r#"<Requirement>
  <Client>c</Client>
  <Notes><Note>ignored</Note></Notes>
  <Tables>
    <Table name="t"><Comment/></Table>
  </Tables>
</Requirement>"#;

        let requirement = parse(xml).unwrap();
        assert_eq!(requirement.client, "c");
        assert_eq!(requirement.version, "");
        assert_eq!(requirement.tables.len(), 1);
        assert!(requirement.tables[0].columns.is_empty());
    }

    #[test]
    fn test_parse_missing_parameter_value_is_empty() {
        let xml = r#"<Requirement><Tables><Table name="t"><Columns><Column name="c">
            <Parameters><Parameter name="p" type="String[]"/></Parameters>
        </Column></Columns></Table></Tables></Requirement>"#;

        let requirement = parse(xml).unwrap();
        let parameter = &requirement.tables[0].columns[0].parameters[0];
        assert_eq!(parameter.value, "");
        assert_eq!(parameter.declared_type, "String[]");
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("", "missing root"),
            ("<Plan/>", "expected root element"),
            ("<Requirement><Client>x</Requirement>", ""),
            ("<Requirement><Tables>", "unexpected end of document"),
            (
                "<Requirement><Tables><Table pkey=\"id\"/></Tables></Requirement>",
                "missing required attribute 'name'",
            ),
            (
                "<Requirement><Tables><Table name=\"t\"><Columns><Column name=\"c\"><Parameters><Parameter name=\"p\" value=\"1\"/></Parameters></Column></Columns></Table></Tables></Requirement>",
                "missing required attribute 'type'",
            ),
            ("<Requirement/><Requirement/>", "after the root element"),
            ("hello", "unexpected text"),
        ];

        for (xml, expected) in cases {
            match parse(xml) {
                Err(DataMaskError::DocumentFormat { message, .. }) => {
                    assert!(
                        message.contains(expected),
                        "message '{}' for input '{}' should contain '{}'",
                        message,
                        xml,
                        expected
                    );
                }
                other => panic!("expected DocumentFormat for '{}', got {:?}", xml, other),
            }
        }
    }

    #[test]
    fn test_render_layout() {
        let requirement = Requirement::new("c", "1").with_table(
            Table::new("t")
                .with_primary_key("id")
                .with_key("k1")
                .with_column(Column::new("col", "")),
        );

        let xml = String::from_utf8(render(&requirement).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Client>c</Client>"));
        assert!(xml.contains("<Table name=\"t\" pkey=\"id\">"));
        assert!(xml.contains("<Key name=\"k1\"/>"));
        assert!(xml.contains("<Function></Function>"));
        assert_eq!(parse(&xml).unwrap(), requirement);
    }

    #[test]
    fn test_render_then_parse_preserves_whitespace_and_markup() {
        let requirement = Requirement::new("  padded client ", "a<b>&c").with_table(
            Table::new("t").with_column(
                Column::new("c", "fn(\"x\")").with_parameter(Parameter::with_raw_type(
                    "p",
                    " 'quoted' & \"double\" ",
                    "Mystery",
                )),
            ),
        );

        let xml = render(&requirement).unwrap();
        let parsed = parse(std::str::from_utf8(&xml).unwrap()).unwrap();
        assert_eq!(parsed, requirement);
    }
}
