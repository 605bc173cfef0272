use crate::core::normalize::normalize;
use crate::utils::error::{EtlError, Result};

/// A header plus rows of text cells, as exported by the warehouse system.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A logical column and the header spellings it accepts. Headers are
/// compared after normalization, so `Dir. entrega` matches `DIR ENTREGA`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl ColumnSpec {
    pub const fn new(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }
}

impl Table {
    pub fn parse(name: &str, bytes: &[u8], delimiter: &str) -> Result<Self> {
        let text = decode_text(bytes);
        let delimiter = resolve_delimiter(delimiter, &text);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        tracing::debug!(
            "Parsed table '{}': {} columns, {} rows (delimiter {:?})",
            name,
            headers.len(),
            rows.len(),
            delimiter as char
        );

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn column(&self, spec: &ColumnSpec) -> Option<usize> {
        let wanted: Vec<String> = spec.aliases.iter().map(|a| normalize(a)).collect();
        self.headers
            .iter()
            .position(|h| wanted.contains(&normalize(h)))
    }

    /// Fails with a schema error naming the column when no header matches.
    pub fn require(&self, spec: &ColumnSpec) -> Result<usize> {
        self.column(spec).ok_or_else(|| EtlError::MissingColumnError {
            table: self.name.clone(),
            column: spec.name.to_string(),
            found: self.headers.join(", "),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cell text, empty when the row is short or the column is absent.
pub fn cell(row: &[String], column: Option<usize>) -> &str {
    column
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

pub fn optional_cell(row: &[String], column: Option<usize>) -> Option<String> {
    let value = cell(row, column);
    (!value.is_empty()).then(|| value.to_string())
}

/// UTF-8 (BOM stripped) when valid, otherwise Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("Input is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

fn resolve_delimiter(configured: &str, text: &str) -> u8 {
    match configured {
        ";" => b';',
        "," => b',',
        "|" => b'|',
        "tab" | "\t" => b'\t',
        _ => sniff_delimiter(text),
    }
}

/// Picks the most frequent of `;`, `,` and tab on the header line; `;` wins
/// ties since that is what Spanish-locale exports use.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    [b';', b',', b'\t']
        .into_iter()
        .map(|d| (header.bytes().filter(|b| *b == d).count(), d))
        .fold((0, b';'), |best, candidate| if candidate.0 > best.0 { candidate } else { best })
        .1
}

/// Parses `12.5`, `12,5` and `1.234,5`. Non-finite and malformed values are
/// `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let cleaned = match (text.contains(','), text.contains('.')) {
        (true, true) if text.rfind(',') > text.rfind('.') => text.replace('.', "").replace(',', "."),
        (true, true) => text.replace(',', ""),
        (true, false) => text.replace(',', "."),
        _ => text.to_string(),
    };

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: ColumnSpec = ColumnSpec::new("address", &["Dirección", "Dir. entrega"]);

    #[test]
    fn test_parse_semicolon_table_with_bom() {
        let data = "\u{feff}Exp;Dir. entrega;Población\n1;Calle Sol 4;Alcora\n\n2; Calle Sol 9 ;Alcora\n";
        let table = Table::parse("shipments", data.as_bytes(), "auto").unwrap();

        assert_eq!(table.headers, vec!["Exp", "Dir. entrega", "Población"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][1], "Calle Sol 9");
        assert_eq!(table.require(&ADDRESS).unwrap(), 1);
    }

    #[test]
    fn test_latin1_fallback() {
        let mut data = b"PUEBLO,LATITUD,LONGITUD\n".to_vec();
        data.extend_from_slice(b"Castell\xf3n,39.98,-0.05\n");

        let table = Table::parse("coordinates", &data, "auto").unwrap();
        assert_eq!(table.rows[0][0], "Castellón");
    }

    #[test]
    fn test_missing_column_names_the_column() {
        let table = Table::parse("shipments", b"Exp;Kgs\n1;2\n", ";").unwrap();
        let err = table.require(&ADDRESS).unwrap_err();

        match err {
            EtlError::MissingColumnError { table, column, found } => {
                assert_eq!(table, "shipments");
                assert_eq!(column, "address");
                assert_eq!(found, "Exp, Kgs");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let table = Table::parse("t", b"a;b;c\n1\n", ";").unwrap();
        assert_eq!(cell(&table.rows[0], Some(2)), "");
        assert_eq!(cell(&table.rows[0], None), "");
        assert_eq!(optional_cell(&table.rows[0], Some(0)), Some("1".to_string()));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a,b,c"), b',');
        assert_eq!(sniff_delimiter("a\tb"), b'\t');
        assert_eq!(sniff_delimiter("single"), b';');
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number(" 12,5 "), Some(12.5));
        assert_eq!(parse_number("1.234,5"), Some(1234.5));
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
