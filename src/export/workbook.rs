//! Spreadsheet artifact: a minimal single-worksheet XLSX package.
//!
//! The package carries four fixed parts and one generated worksheet.
//! Cells are written inline (no shared-string table); numbers keep their
//! numeric type so spreadsheet formulas work on exported scores and
//! counts. Column width hints land in a `<cols>` block.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::data::values::stringify;
use crate::error::ExportError;
use crate::export::resolve::ExportColumn;

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const WORKBOOK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<sheets><sheet name="Export" sheetId="1" r:id="rId1"/></sheets>"#,
    r#"</workbook>"#,
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"</Relationships>"#,
);

pub fn write_xlsx(
    path: &Path,
    columns: &[ExportColumn],
    rows: &[Vec<Value>],
) -> Result<(), ExportError> {
    let sheet = build_worksheet(columns, rows)?;

    let file = File::create(path).map_err(|e| ExportError::Io(e.to_string()))?;
    let mut archive = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", sheet.as_slice()),
    ] {
        archive.start_file(name, options)?;
        archive
            .write_all(body)
            .map_err(|e| ExportError::Io(e.to_string()))?;
    }
    archive.finish()?;
    Ok(())
}

fn build_worksheet(columns: &[ExportColumn], rows: &[Vec<Value>]) -> Result<Vec<u8>, ExportError> {
    let mut xml = Writer::new(Vec::new());
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut worksheet = BytesStart::new("worksheet");
    worksheet.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    ));
    xml.write_event(Event::Start(worksheet))?;

    // The cols block must precede sheetData, and only columns with hints
    // get an entry.
    if columns.iter().any(|c| c.width.is_some()) {
        xml.write_event(Event::Start(BytesStart::new("cols")))?;
        for (index, column) in columns.iter().enumerate() {
            let Some(width) = column.width else {
                continue;
            };
            let position = (index + 1).to_string();
            let mut col = BytesStart::new("col");
            col.push_attribute(("min", position.as_str()));
            col.push_attribute(("max", position.as_str()));
            col.push_attribute(("width", width.to_string().as_str()));
            col.push_attribute(("customWidth", "1"));
            xml.write_event(Event::Empty(col))?;
        }
        xml.write_event(Event::End(BytesEnd::new("cols")))?;
    }

    xml.write_event(Event::Start(BytesStart::new("sheetData")))?;

    let headers: Vec<Value> = columns.iter().map(|c| Value::from(c.header.clone())).collect();
    write_row(&mut xml, 1, &headers)?;
    for (index, row) in rows.iter().enumerate() {
        write_row(&mut xml, index + 2, row)?;
    }

    xml.write_event(Event::End(BytesEnd::new("sheetData")))?;
    xml.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(xml.into_inner())
}

fn write_row(xml: &mut Writer<Vec<u8>>, number: usize, cells: &[Value]) -> Result<(), ExportError> {
    let row_ref = number.to_string();
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_ref.as_str()));
    xml.write_event(Event::Start(row))?;

    for (index, cell) in cells.iter().enumerate() {
        if cell.is_null() {
            continue;
        }
        let cell_ref = format!("{}{}", column_letters(index), number);
        let mut c = BytesStart::new("c");
        c.push_attribute(("r", cell_ref.as_str()));
        match cell {
            Value::Number(n) => {
                c.push_attribute(("t", "n"));
                xml.write_event(Event::Start(c))?;
                xml.write_event(Event::Start(BytesStart::new("v")))?;
                xml.write_event(Event::Text(BytesText::new(&n.to_string())))?;
                xml.write_event(Event::End(BytesEnd::new("v")))?;
            }
            other => {
                c.push_attribute(("t", "inlineStr"));
                xml.write_event(Event::Start(c))?;
                xml.write_event(Event::Start(BytesStart::new("is")))?;
                xml.write_event(Event::Start(BytesStart::new("t")))?;
                xml.write_event(Event::Text(BytesText::new(&stringify(Some(other)))))?;
                xml.write_event(Event::End(BytesEnd::new("t")))?;
                xml.write_event(Event::End(BytesEnd::new("is")))?;
            }
        }
        xml.write_event(Event::End(BytesEnd::new("c")))?;
    }

    xml.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

/// Zero-based column index to spreadsheet letters: 0 -> A, 25 -> Z,
/// 26 -> AA.
fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_package_layout_and_cell_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let columns = vec![
            ExportColumn::new("name", "Name").with_width(24),
            ExportColumn::new("score", "Score"),
        ];
        let rows = vec![
            vec![json!("Alice & Bob"), json!(92)],
            vec![json!(null), json!(50.5)],
        ];

        write_xlsx(&path, &columns, &rows).unwrap();

        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing part {part}");
        }

        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains("Alice &amp; Bob"), "text cells escape");
        assert!(sheet.contains(r#"<c r="B2" t="n"><v>92</v></c>"#));
        assert!(sheet.contains(r#"<col min="1" max="1" width="24" customWidth="1"/>"#));
        assert!(!sheet.contains(r#"r="A3" t="inlineStr""#), "null cell skipped");
        assert!(sheet.contains(r#"<c r="B3" t="n"><v>50.5</v></c>"#));
    }
}
