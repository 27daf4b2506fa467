//! CSV export.
//!
//! One row per record. The header is the sorted union of every record's
//! field names; records missing a field get an empty cell.

use std::collections::BTreeSet;
use std::io::Write;

use csv::Writer;

use crate::error::OutputError;
use crate::models::Record;

/// Byte order mark so spreadsheet tools detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Sorted union of field names across `records`.
pub fn header(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.fields.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Write `records` as CSV to `out`.
pub fn write_csv<W: Write>(mut out: W, records: &[Record]) -> Result<(), OutputError> {
    out.write_all(UTF8_BOM).map_err(csv::Error::from)?;

    let columns = header(records);
    let mut writer = Writer::from_writer(out);
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or_default()))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_union_and_blank_cells() {
        let records = vec![
            Record::from_pairs([("title", "A"), ("price", "1")]),
            Record::from_pairs([("title", "B, with comma"), ("brand", "Acme")]),
        ];
        let mut buf = Vec::new();
        write_csv(&mut buf, &records).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let text = text.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "brand,price,title");
        assert_eq!(lines[1], ",1,A");
        assert_eq!(lines[2], "Acme,,\"B, with comma\"");
    }
}
