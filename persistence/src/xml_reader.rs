//! FILENAME: persistence/src/xml_reader.rs
//! PURPOSE: Reads SpreadsheetML 2003 (Excel XML) workbooks into a `SpreadsheetDocument`.
//! CONTEXT: Report templates are authored in any spreadsheet program and saved
//! as "XML Spreadsheet 2003". Only the parts the template parser needs are read:
//! styles, column/row/cell layout with merges, cell text, and print settings.

use crate::document::{
    DocCell, DocColumn, DocRow, DocStyle, HeaderFooter, Orientation, SpreadsheetDocument,
    Worksheet,
};
use crate::PersistenceError;
use engine::{
    Alignment, BorderLineStyle, BorderStyle, Borders, CellValue, Color, Fill, FontStyle,
    TextAlign, VerticalAlign,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

pub fn load_spreadsheet_xml(path: &Path) -> Result<SpreadsheetDocument, PersistenceError> {
    let xml = std::fs::read_to_string(path)?;
    parse_spreadsheet_xml(&xml)
}

pub fn parse_spreadsheet_xml(xml: &str) -> Result<SpreadsheetDocument, PersistenceError> {
    let mut reader = Reader::from_str(xml);
    // Leading/trailing blanks inside <Data> are content.
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut state = ReadState::default();
    let mut saw_workbook = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                saw_workbook |= e.local_name().as_ref() == b"Workbook";
                state.open(&e)?;
            }
            Event::Empty(e) => {
                saw_workbook |= e.local_name().as_ref() == b"Workbook";
                state.open(&e)?;
                state.close(e.local_name().as_ref());
            }
            Event::End(e) => state.close(e.local_name().as_ref()),
            Event::Text(t) => {
                let text = t.unescape()?;
                state.text(&text);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                state.text(&String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_workbook {
        return Err(PersistenceError::InvalidFormat(
            "Missing <Workbook> root element".to_string(),
        ));
    }
    Ok(state.doc)
}

#[derive(Default)]
struct ReadState {
    doc: SpreadsheetDocument,
    style: Option<DocStyle>,
    sheet: Option<Worksheet>,
    row: Option<DocRow>,
    cell: Option<DocCell>,
    data_type: Option<String>,
    data_text: Option<String>,
    in_print: bool,
    print_leaf: Option<String>,
}

impl ReadState {
    fn open(&mut self, e: &BytesStart) -> Result<(), PersistenceError> {
        let name = e.local_name();
        let attrs = attributes(e)?;

        match name.as_ref() {
            b"Style" => {
                self.style = Some(DocStyle {
                    id: attrs.get("ID").cloned().unwrap_or_default(),
                    name: attrs.get("Name").cloned(),
                    parent: attrs.get("Parent").cloned(),
                    ..DocStyle::default()
                });
            }
            b"Alignment" => {
                if let Some(style) = self.style.as_mut() {
                    style.style.alignment = Some(Alignment {
                        horizontal: attrs.get("Horizontal").map(|v| TextAlign::from_name(v)).unwrap_or_default(),
                        vertical: attrs.get("Vertical").map(|v| VerticalAlign::from_name(v)).unwrap_or_default(),
                        wrap_text: attrs.get("WrapText").map(|v| parse_bool(v)).unwrap_or(false),
                    });
                }
            }
            b"Border" => {
                if let Some(style) = self.style.as_mut() {
                    let border = BorderStyle {
                        line: attrs.get("LineStyle").map(|v| BorderLineStyle::from_name(v)).unwrap_or_default(),
                        weight: attrs.get("Weight").and_then(|v| v.parse().ok()).unwrap_or(0),
                        color: attrs.get("Color").and_then(|v| Color::from_hex(v)),
                    };
                    let borders = style.style.borders.get_or_insert_with(Borders::default);
                    match attrs.get("Position").map(String::as_str) {
                        Some("Left") => borders.left = Some(border),
                        Some("Top") => borders.top = Some(border),
                        Some("Bottom") => borders.bottom = Some(border),
                        Some("Right") => borders.right = Some(border),
                        _ => {}
                    }
                }
            }
            b"Font" => {
                // <Font> also appears inside rich-text <Data>; only style fonts matter.
                if let Some(style) = self.style.as_mut() {
                    style.style.font = Some(FontStyle {
                        name: attrs.get("FontName").cloned(),
                        family: attrs.get("Family").cloned(),
                        size: attrs.get("Size").and_then(|v| v.parse().ok()),
                        bold: attrs.get("Bold").map(|v| parse_bool(v)).unwrap_or(false),
                        italic: attrs.get("Italic").map(|v| parse_bool(v)).unwrap_or(false),
                        underline: attrs.get("Underline").map(|v| v != "None").unwrap_or(false),
                        color: attrs.get("Color").and_then(|v| Color::from_hex(v)),
                    });
                }
            }
            b"Interior" => {
                if let Some(style) = self.style.as_mut() {
                    style.style.fill = Some(Fill {
                        color: attrs.get("Color").and_then(|v| Color::from_hex(v)),
                        pattern: attrs.get("Pattern").cloned(),
                    });
                }
            }
            b"NumberFormat" => {
                if let Some(style) = self.style.as_mut() {
                    style.style.number_format = attrs.get("Format").cloned();
                }
            }
            b"Worksheet" => {
                let name = attrs.get("Name").cloned().unwrap_or_else(|| {
                    format!("Sheet{}", self.doc.worksheets.len() + 1)
                });
                self.sheet = Some(Worksheet::new(&name));
            }
            b"Column" => {
                if let Some(sheet) = self.sheet.as_mut() {
                    sheet.columns.push(DocColumn {
                        index: parse_index(&attrs),
                        span: attrs.get("Span").and_then(|v| v.parse().ok()).unwrap_or(0),
                        width: attrs.get("Width").and_then(|v| v.parse().ok()),
                        style_id: attrs.get("StyleID").cloned(),
                        hidden: attrs.get("Hidden").map(|v| parse_bool(v)).unwrap_or(false),
                    });
                }
            }
            b"Row" => {
                self.row = Some(DocRow {
                    index: parse_index(&attrs),
                    span: attrs.get("Span").and_then(|v| v.parse().ok()).unwrap_or(0),
                    height: attrs.get("Height").and_then(|v| v.parse().ok()),
                    style_id: attrs.get("StyleID").cloned(),
                    hidden: attrs.get("Hidden").map(|v| parse_bool(v)).unwrap_or(false),
                    cells: Vec::new(),
                });
            }
            b"Cell" => {
                self.cell = Some(DocCell {
                    index: parse_index(&attrs),
                    merge_across: attrs.get("MergeAcross").and_then(|v| v.parse().ok()).unwrap_or(0),
                    merge_down: attrs.get("MergeDown").and_then(|v| v.parse().ok()).unwrap_or(0),
                    style_id: attrs.get("StyleID").cloned(),
                    value: CellValue::Empty,
                });
            }
            b"Data" => {
                if self.cell.is_some() {
                    self.data_type = attrs.get("Type").cloned();
                    self.data_text = Some(String::new());
                }
            }
            b"Layout" => {
                if let Some(sheet) = self.sheet.as_mut() {
                    if attrs.get("Orientation").map(String::as_str) == Some("Landscape") {
                        sheet.page_setup.orientation = Orientation::Landscape;
                    }
                }
            }
            b"Header" | b"Footer" => {
                if let Some(sheet) = self.sheet.as_mut() {
                    let hf = HeaderFooter {
                        text: attrs.get("Data").cloned().unwrap_or_default(),
                        margin: attrs.get("Margin").and_then(|v| v.parse().ok()),
                    };
                    if name.as_ref() == b"Header" {
                        sheet.page_setup.header = Some(hf);
                    } else {
                        sheet.page_setup.footer = Some(hf);
                    }
                }
            }
            b"PageMargins" => {
                if let Some(sheet) = self.sheet.as_mut() {
                    let margins = &mut sheet.page_setup.margins;
                    let read = |key: &str, current: f64| {
                        attrs.get(key).and_then(|v| v.parse().ok()).unwrap_or(current)
                    };
                    margins.left = read("Left", margins.left);
                    margins.right = read("Right", margins.right);
                    margins.top = read("Top", margins.top);
                    margins.bottom = read("Bottom", margins.bottom);
                }
            }
            b"FitToPage" => {
                if let Some(sheet) = self.sheet.as_mut() {
                    sheet.page_setup.fit_to_page = true;
                }
            }
            b"Print" => self.in_print = true,
            leaf if self.in_print => {
                self.print_leaf = Some(String::from_utf8_lossy(leaf).into_owned());
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"Style" => {
                if let Some(style) = self.style.take() {
                    self.doc.styles.push(style);
                }
            }
            b"Worksheet" => {
                if let Some(sheet) = self.sheet.take() {
                    self.doc.worksheets.push(sheet);
                }
            }
            b"Row" => {
                if let (Some(row), Some(sheet)) = (self.row.take(), self.sheet.as_mut()) {
                    sheet.rows.push(row);
                }
            }
            b"Cell" => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.cells.push(cell);
                }
            }
            b"Data" => {
                if let (Some(text), Some(cell)) = (self.data_text.take(), self.cell.as_mut()) {
                    cell.value = typed_value(self.data_type.take().as_deref(), text);
                }
            }
            b"Print" => self.in_print = false,
            _ => {
                if self.in_print {
                    self.print_leaf = None;
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(data) = self.data_text.as_mut() {
            data.push_str(text);
            return;
        }
        let (Some(leaf), Some(sheet)) = (self.print_leaf.as_deref(), self.sheet.as_mut()) else {
            return;
        };
        let value = text.trim().parse::<u32>().ok();
        let setup = &mut sheet.page_setup;
        match leaf {
            "PaperSizeIndex" => setup.paper_size = value,
            "Scale" => setup.scale = value,
            "FitWidth" => setup.fit_width = value,
            "FitHeight" => setup.fit_height = value,
            "HorizontalResolution" => setup.resolution = value,
            _ => {}
        }
    }
}

/// Attribute values keyed by local name (`ss:Index` -> `Index`).
fn attributes(e: &BytesStart) -> Result<HashMap<String, String>, PersistenceError> {
    let mut out = HashMap::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

fn parse_index(attrs: &HashMap<String, String>) -> Option<usize> {
    attrs.get("Index").and_then(|v| v.trim().parse().ok()).filter(|i| *i > 0)
}

fn parse_bool(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed == "1" || trimmed.eq_ignore_ascii_case("true")
}

fn typed_value(data_type: Option<&str>, text: String) -> CellValue {
    match data_type {
        Some("Number") => match text.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(text),
        },
        Some("Boolean") => CellValue::Boolean(parse_bool(&text)),
        _ if text.is_empty() => CellValue::Empty,
        _ => CellValue::Text(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
 xmlns:x="urn:schemas-microsoft-com:office:excel"
 xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <Styles>
  <Style ss:ID="Default" ss:Name="Normal">
   <Font ss:FontName="Arial" ss:Size="10"/>
  </Style>
  <Style ss:ID="s21">
   <Alignment ss:Horizontal="Center" ss:Vertical="Center" ss:WrapText="1"/>
   <Borders>
    <Border ss:Position="Bottom" ss:LineStyle="Continuous" ss:Weight="1"/>
   </Borders>
   <Font ss:Bold="1" ss:Color="#FF0000"/>
   <Interior ss:Color="#FFFF00" ss:Pattern="Solid"/>
   <NumberFormat ss:Format="0.00"/>
  </Style>
 </Styles>
 <Worksheet ss:Name="Report">
  <Table>
   <Column ss:Width="80" ss:Span="1"/>
   <Column ss:Index="4" ss:Width="20"/>
   <Row ss:Height="15">
    <Cell ss:MergeAcross="1" ss:StyleID="s21"><Data ss:Type="String">Title &amp; more</Data></Cell>
    <Cell ss:Index="4"><Data ss:Type="String">[header]</Data></Cell>
   </Row>
   <Row ss:Index="3">
    <Cell><Data ss:Type="Number">42</Data></Cell>
    <Cell><Data ss:Type="String">  padded </Data></Cell>
   </Row>
  </Table>
  <WorksheetOptions xmlns="urn:schemas-microsoft-com:office:excel">
   <PageSetup>
    <Layout x:Orientation="Landscape"/>
    <Header x:Margin="0.3" x:Data="Page &amp;P"/>
    <PageMargins x:Bottom="0.5" x:Left="0.4" x:Right="0.4" x:Top="0.6"/>
   </PageSetup>
   <FitToPage/>
   <Print>
    <FitHeight>0</FitHeight>
    <PaperSizeIndex>9</PaperSizeIndex>
    <Scale>85</Scale>
    <HorizontalResolution>600</HorizontalResolution>
   </Print>
  </WorksheetOptions>
 </Worksheet>
</Workbook>"##;

    #[test]
    fn reads_styles() {
        let doc = parse_spreadsheet_xml(SAMPLE).unwrap();
        assert_eq!(doc.styles.len(), 2);

        let style = doc.style("s21").unwrap();
        let font = style.font.unwrap();
        assert!(font.bold);
        assert_eq!(font.color, Some(Color::new(255, 0, 0)));
        assert_eq!(style.alignment.unwrap().horizontal, TextAlign::Center);
        assert_eq!(style.borders.unwrap().bottom.unwrap().line, BorderLineStyle::Continuous);
        assert_eq!(style.fill.unwrap().color, Some(Color::new(255, 255, 0)));
        assert_eq!(style.number_format.as_deref(), Some("0.00"));
    }

    #[test]
    fn reads_layout_and_values() {
        let doc = parse_spreadsheet_xml(SAMPLE).unwrap();
        let sheet = doc.worksheet("Report").unwrap();

        assert_eq!(sheet.columns.len(), 2);
        assert_eq!(sheet.columns[0].span, 1);
        assert_eq!(sheet.columns[1].index, Some(4));

        assert_eq!(sheet.rows.len(), 2);
        let first = &sheet.rows[0];
        assert_eq!(first.height, Some(15.0));
        assert_eq!(first.cells[0].merge_across, 1);
        assert_eq!(first.cells[0].style_id.as_deref(), Some("s21"));
        assert_eq!(first.cells[0].display(), "Title & more");
        assert_eq!(first.cells[1].index, Some(4));

        let third = &sheet.rows[1];
        assert_eq!(third.index, Some(3));
        assert_eq!(third.cells[0].value, CellValue::Number(42.0));
        assert_eq!(third.cells[1].display(), "  padded ");
    }

    #[test]
    fn reads_page_setup() {
        let doc = parse_spreadsheet_xml(SAMPLE).unwrap();
        let setup = &doc.worksheets[0].page_setup;

        assert_eq!(setup.orientation, Orientation::Landscape);
        assert_eq!(setup.header.as_ref().unwrap().text, "Page &P");
        assert_eq!(setup.header.as_ref().unwrap().margin, Some(0.3));
        assert_eq!(setup.margins.left, 0.4);
        assert!(setup.fit_to_page);
        assert_eq!(setup.fit_height, Some(0));
        assert_eq!(setup.paper_size, Some(9));
        assert_eq!(setup.scale, Some(85));
        assert_eq!(setup.resolution, Some(600));
    }

    #[test]
    fn rejects_non_workbook() {
        assert!(matches!(
            parse_spreadsheet_xml("<html></html>"),
            Err(PersistenceError::InvalidFormat(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.xml");
        std::fs::write(&path, SAMPLE).unwrap();
        let doc = load_spreadsheet_xml(&path).unwrap();
        assert_eq!(doc.worksheets.len(), 1);
    }
}
