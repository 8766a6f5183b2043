use std::path::Path;

use tracing::info;

use notescout_shared::{COLUMNS, Record, Result};

use crate::{Exporter, write_atomic};

/// RFC 4180 CSV with a header row and CRLF line endings.
///
/// A UTF-8 byte-order mark is written first so spreadsheet tools detect the
/// encoding of CJK text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn export(&self, records: &[Record], path: &Path) -> Result<()> {
        let mut out = String::from('\u{feff}');
        push_row(&mut out, COLUMNS);
        for record in records {
            push_row(&mut out, record.values());
        }

        write_atomic(path, &out)?;
        info!(path = %path.display(), rows = records.len(), "exported CSV");
        Ok(())
    }
}

fn push_row(out: &mut String, fields: [&str; 10]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_record, temp_dir};

    const HEADER: &str = "Post URL,Author Name,Likes,Comments,Post Title,Caption,Date Published,Video URL,User URL,Images URL";

    #[test]
    fn quotes_only_when_needed() {
        let mut out = String::new();
        push_field(&mut out, "plain");
        out.push('|');
        push_field(&mut out, "a,b");
        out.push('|');
        push_field(&mut out, "say \"hi\"");
        assert_eq!(out, "plain|\"a,b\"|\"say \"\"hi\"\"\"");
    }

    #[test]
    fn empty_run_writes_header_only() {
        let tmp = temp_dir();
        let path = tmp.join("NIO_xiaohongshu.csv");

        CsvExporter.export(&[], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("\u{feff}{HEADER}\r\n"));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rows_follow_column_order() {
        let tmp = temp_dir();
        let path = tmp.join("out.csv");

        CsvExporter.export(&[sample_record()], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.trim_start_matches('\u{feff}').split("\r\n").collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "https://www.xiaohongshu.com/explore/64f1a2b3c4d5e6f7a8b9c0d1?xsec_token=t&xsec_source=pc_search,\
             driver,1.2万,37,\"NIO ES8, \"\"long\"\" trip\",day one,2023-11-14 22:13:20,,\
             https://www.xiaohongshu.com/user/profile/5f00aa,https://img/1.jpg | https://img/2.jpg"
        );
        assert_eq!(lines[2], "");
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
