//! FILENAME: persistence/src/xml_writer.rs
//! PURPOSE: Writes a `SpreadsheetDocument` as SpreadsheetML 2003 XML.

use crate::document::{Orientation, PageSetup, SpreadsheetDocument, Worksheet};
use crate::PersistenceError;
use engine::{BorderStyle, CellStyle, CellValue};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::path::Path;

const NS_SPREADSHEET: &str = "urn:schemas-microsoft-com:office:spreadsheet";
const NS_OFFICE: &str = "urn:schemas-microsoft-com:office:office";
const NS_EXCEL: &str = "urn:schemas-microsoft-com:office:excel";
const NS_HTML: &str = "http://www.w3.org/TR/REC-html40";

type XmlWriter = Writer<Vec<u8>>;

pub fn save_spreadsheet_xml(doc: &SpreadsheetDocument, path: &Path) -> Result<(), PersistenceError> {
    let xml = write_spreadsheet_xml(doc)?;
    std::fs::write(path, xml)?;
    Ok(())
}

pub fn write_spreadsheet_xml(doc: &SpreadsheetDocument) -> Result<String, PersistenceError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 1);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    start(
        &mut w,
        "Workbook",
        &[
            ("xmlns", NS_SPREADSHEET.to_string()),
            ("xmlns:o", NS_OFFICE.to_string()),
            ("xmlns:x", NS_EXCEL.to_string()),
            ("xmlns:ss", NS_SPREADSHEET.to_string()),
            ("xmlns:html", NS_HTML.to_string()),
        ],
    )?;

    if !doc.styles.is_empty() {
        start(&mut w, "Styles", &[])?;
        for entry in &doc.styles {
            let mut attrs = vec![("ss:ID", entry.id.clone())];
            if let Some(name) = &entry.name {
                attrs.push(("ss:Name", name.clone()));
            }
            if let Some(parent) = &entry.parent {
                attrs.push(("ss:Parent", parent.clone()));
            }
            start(&mut w, "Style", &attrs)?;
            write_style_body(&mut w, &entry.style)?;
            end(&mut w, "Style")?;
        }
        end(&mut w, "Styles")?;
    }

    for sheet in &doc.worksheets {
        write_worksheet(&mut w, sheet)?;
    }

    end(&mut w, "Workbook")?;

    String::from_utf8(w.into_inner())
        .map_err(|e| PersistenceError::InvalidFormat(format!("Writer produced invalid UTF-8: {}", e)))
}

fn write_style_body(w: &mut XmlWriter, style: &CellStyle) -> Result<(), PersistenceError> {
    if let Some(align) = &style.alignment {
        let mut attrs = vec![
            ("ss:Horizontal", align.horizontal.name().to_string()),
            ("ss:Vertical", align.vertical.name().to_string()),
        ];
        if align.wrap_text {
            attrs.push(("ss:WrapText", "1".to_string()));
        }
        empty(w, "Alignment", &attrs)?;
    }

    if let Some(borders) = &style.borders {
        start(w, "Borders", &[])?;
        let edges = [
            ("Left", &borders.left),
            ("Top", &borders.top),
            ("Bottom", &borders.bottom),
            ("Right", &borders.right),
        ];
        for (position, edge) in edges {
            if let Some(border) = edge {
                empty(w, "Border", &border_attrs(position, border))?;
            }
        }
        end(w, "Borders")?;
    }

    if let Some(font) = &style.font {
        let mut attrs = Vec::new();
        if let Some(name) = &font.name {
            attrs.push(("ss:FontName", name.clone()));
        }
        if let Some(family) = &font.family {
            attrs.push(("x:Family", family.clone()));
        }
        if let Some(size) = font.size {
            attrs.push(("ss:Size", size.to_string()));
        }
        if let Some(color) = font.color {
            attrs.push(("ss:Color", color.to_hex()));
        }
        if font.bold {
            attrs.push(("ss:Bold", "1".to_string()));
        }
        if font.italic {
            attrs.push(("ss:Italic", "1".to_string()));
        }
        if font.underline {
            attrs.push(("ss:Underline", "Single".to_string()));
        }
        empty(w, "Font", &attrs)?;
    }

    if let Some(fill) = &style.fill {
        let mut attrs = Vec::new();
        if let Some(color) = fill.color {
            attrs.push(("ss:Color", color.to_hex()));
        }
        if let Some(pattern) = &fill.pattern {
            attrs.push(("ss:Pattern", pattern.clone()));
        }
        empty(w, "Interior", &attrs)?;
    }

    if let Some(format) = &style.number_format {
        empty(w, "NumberFormat", &[("ss:Format", format.clone())])?;
    }

    Ok(())
}

fn border_attrs(position: &str, border: &BorderStyle) -> Vec<(&'static str, String)> {
    let mut attrs = vec![
        ("ss:Position", position.to_string()),
        ("ss:LineStyle", border.line.name().to_string()),
        ("ss:Weight", border.weight.to_string()),
    ];
    if let Some(color) = border.color {
        attrs.push(("ss:Color", color.to_hex()));
    }
    attrs
}

fn write_worksheet(w: &mut XmlWriter, sheet: &Worksheet) -> Result<(), PersistenceError> {
    start(w, "Worksheet", &[("ss:Name", sheet.name.clone())])?;
    start(w, "Table", &[])?;

    for column in &sheet.columns {
        let mut attrs = Vec::new();
        if let Some(index) = column.index {
            attrs.push(("ss:Index", index.to_string()));
        }
        if let Some(style_id) = &column.style_id {
            attrs.push(("ss:StyleID", style_id.clone()));
        }
        if column.hidden {
            attrs.push(("ss:Hidden", "1".to_string()));
        }
        if let Some(width) = column.width {
            attrs.push(("ss:AutoFitWidth", "0".to_string()));
            attrs.push(("ss:Width", width.to_string()));
        }
        if column.span > 0 {
            attrs.push(("ss:Span", column.span.to_string()));
        }
        empty(w, "Column", &attrs)?;
    }

    for row in &sheet.rows {
        let mut attrs = Vec::new();
        if let Some(index) = row.index {
            attrs.push(("ss:Index", index.to_string()));
        }
        if let Some(style_id) = &row.style_id {
            attrs.push(("ss:StyleID", style_id.clone()));
        }
        if row.hidden {
            attrs.push(("ss:Hidden", "1".to_string()));
        }
        if let Some(height) = row.height {
            attrs.push(("ss:AutoFitHeight", "0".to_string()));
            attrs.push(("ss:Height", height.to_string()));
        }
        if row.span > 0 {
            attrs.push(("ss:Span", row.span.to_string()));
        }
        start(w, "Row", &attrs)?;

        for cell in &row.cells {
            let mut attrs = Vec::new();
            if let Some(index) = cell.index {
                attrs.push(("ss:Index", index.to_string()));
            }
            if cell.merge_across > 0 {
                attrs.push(("ss:MergeAcross", cell.merge_across.to_string()));
            }
            if cell.merge_down > 0 {
                attrs.push(("ss:MergeDown", cell.merge_down.to_string()));
            }
            if let Some(style_id) = &cell.style_id {
                attrs.push(("ss:StyleID", style_id.clone()));
            }

            match data_of(&cell.value) {
                Some((data_type, text)) => {
                    start(w, "Cell", &attrs)?;
                    start(w, "Data", &[("ss:Type", data_type.to_string())])?;
                    w.write_event(Event::Text(BytesText::new(&text)))?;
                    end(w, "Data")?;
                    end(w, "Cell")?;
                }
                None => empty(w, "Cell", &attrs)?,
            }
        }

        end(w, "Row")?;
    }

    end(w, "Table")?;
    write_worksheet_options(w, &sheet.page_setup)?;
    end(w, "Worksheet")
}

fn data_of(value: &CellValue) -> Option<(&'static str, String)> {
    match value {
        CellValue::Empty => None,
        CellValue::Number(n) => Some(("Number", n.to_string())),
        CellValue::Boolean(b) => Some(("Boolean", if *b { "1" } else { "0" }.to_string())),
        CellValue::Text(s) => Some(("String", s.clone())),
        CellValue::Error(_) => Some(("String", value.display())),
    }
}

fn write_worksheet_options(w: &mut XmlWriter, setup: &PageSetup) -> Result<(), PersistenceError> {
    start(w, "WorksheetOptions", &[("xmlns", NS_EXCEL.to_string())])?;
    start(w, "PageSetup", &[])?;

    if setup.orientation == Orientation::Landscape {
        empty(w, "Layout", &[("x:Orientation", "Landscape".to_string())])?;
    }
    for (name, hf) in [("Header", &setup.header), ("Footer", &setup.footer)] {
        if let Some(hf) = hf {
            let mut attrs = Vec::new();
            if let Some(margin) = hf.margin {
                attrs.push(("x:Margin", margin.to_string()));
            }
            attrs.push(("x:Data", hf.text.clone()));
            empty(w, name, &attrs)?;
        }
    }
    empty(
        w,
        "PageMargins",
        &[
            ("x:Bottom", setup.margins.bottom.to_string()),
            ("x:Left", setup.margins.left.to_string()),
            ("x:Right", setup.margins.right.to_string()),
            ("x:Top", setup.margins.top.to_string()),
        ],
    )?;
    end(w, "PageSetup")?;

    if setup.fit_to_page {
        empty(w, "FitToPage", &[])?;
    }

    let print_values = [
        ("FitWidth", setup.fit_width),
        ("FitHeight", setup.fit_height),
        ("PaperSizeIndex", setup.paper_size),
        ("Scale", setup.scale),
        ("HorizontalResolution", setup.resolution),
    ];
    if print_values.iter().any(|(_, v)| v.is_some()) {
        start(w, "Print", &[])?;
        empty(w, "ValidPrinterInfo", &[])?;
        for (name, value) in print_values {
            if let Some(value) = value {
                start(w, name, &[])?;
                w.write_event(Event::Text(BytesText::new(&value.to_string())))?;
                end(w, name)?;
            }
        }
        end(w, "Print")?;
    }

    end(w, "WorksheetOptions")
}

fn element<'a>(name: &'a str, attrs: &'a [(&'a str, String)]) -> BytesStart<'a> {
    let mut elem = BytesStart::new(name);
    for (key, value) in attrs {
        elem.push_attribute((*key, value.as_str()));
    }
    elem
}

fn start(w: &mut XmlWriter, name: &str, attrs: &[(&str, String)]) -> Result<(), PersistenceError> {
    w.write_event(Event::Start(element(name, attrs)))?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, String)]) -> Result<(), PersistenceError> {
    w.write_event(Event::Empty(element(name, attrs)))?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<(), PersistenceError> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
