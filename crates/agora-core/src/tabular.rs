//! Minimal RFC 4180 CSV writer for flat exports.

/// Accumulates CSV rows into a `String`. Lines end with `\r\n`.
#[derive(Debug, Default)]
pub struct CsvWriter {
    out: String,
}

impl CsvWriter {
    /// Start a document with a header row.
    pub fn with_header(columns: &[&str]) -> Self {
        let mut w = Self::default();
        w.row(columns.iter().copied());
        w
    }

    /// Append one row.
    pub fn row<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        let mut first = true;
        for field in fields {
            if !first {
                self.out.push(',');
            }
            first = false;
            push_field(&mut self.out, field);
        }
        self.out.push_str("\r\n");
    }

    /// The finished document.
    pub fn finish(self) -> String {
        self.out
    }
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
