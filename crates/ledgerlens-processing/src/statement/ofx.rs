use ledgerlens_core::models::Transaction;

use super::ParsedStatement;

/// Value of an SGML/XML tag inside a transaction block: the text after `<TAG>`
/// up to the next tag or line break.
fn tag_value<'a>(block: &'a str, upper: &str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let start = upper.find(&open)? + open.len();
    let rest = &block[start..];
    let end = rest.find(['<', '\r', '\n']).unwrap_or(rest.len());
    let value = rest[..end].trim();
    (!value.is_empty()).then_some(value)
}

/// `YYYYMMDD...` to `YYYY-MM-DD`; anything else passes through unchanged
fn format_ofx_date(raw: &str) -> String {
    let digits = raw.get(..8).filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
    match digits {
        Some(d) => format!("{}-{}-{}", &d[..4], &d[4..6], &d[6..8]),
        None => raw.to_string(),
    }
}

/// Parse `<STMTTRN>` blocks from OFX 1.x (SGML) or 2.x (XML) text.
pub fn parse_ofx(text: &str, max_rows: usize) -> ParsedStatement {
    // ASCII upper-casing keeps byte offsets aligned with `text`
    let upper = text.to_ascii_uppercase();
    const OPEN: &str = "<STMTTRN>";

    let mut rows = Vec::new();
    let mut truncated = false;
    let mut cursor = 0;

    while let Some(found) = upper[cursor..].find(OPEN) {
        let start = cursor + found + OPEN.len();
        let tail = &upper[start..];
        let end = start
            + [tail.find("</STMTTRN>"), tail.find(OPEN)]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(tail.len());

        if rows.len() == max_rows {
            truncated = true;
            break;
        }

        let block = &text[start..end];
        let block_upper = &upper[start..end];
        let description = tag_value(block, block_upper, "NAME")
            .or_else(|| tag_value(block, block_upper, "MEMO"))
            .unwrap_or_default();
        rows.push(Transaction::new(
            tag_value(block, block_upper, "DTPOSTED")
                .map(format_ofx_date)
                .unwrap_or_default(),
            description,
            tag_value(block, block_upper, "TRNAMT").unwrap_or_default(),
        ));

        cursor = end;
    }

    ParsedStatement { rows, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SGML: &str = "OFXHEADER:100\nDATA:OFXSGML\n<OFX>\n<BANKTRANLIST>\n\
<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>20240115120000[-5:EST]\n<TRNAMT>-42.10\n<NAME>GROCERY MART\n<MEMO>card 1234\n\
<STMTTRN>\n<TRNTYPE>CREDIT\n<DTPOSTED>20240116\n<TRNAMT>1500.00\n<MEMO>Payroll\n\
</BANKTRANLIST>\n</OFX>\n";

    const XML: &str = "<?xml version=\"1.0\"?><OFX><BANKTRANLIST>\
<STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20240201</DTPOSTED><TRNAMT>-9.99</TRNAMT><NAME>Streaming</NAME></STMTTRN>\
</BANKTRANLIST></OFX>";

    #[test]
    fn test_sgml_without_closing_tags() {
        let parsed = parse_ofx(SGML, 500);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.rows[0],
            Transaction::new("2024-01-15", "GROCERY MART", "-42.10")
        );
        assert_eq!(parsed.rows[1].description, "Payroll");
        assert_eq!(parsed.rows[1].date, "2024-01-16");
    }

    #[test]
    fn test_xml_with_closing_tags() {
        let parsed = parse_ofx(XML, 500);
        assert_eq!(parsed.rows, vec![Transaction::new("2024-02-01", "Streaming", "-9.99")]);
    }

    #[test]
    fn test_truncation() {
        let parsed = parse_ofx(SGML, 1);
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.truncated);
    }

    #[test]
    fn test_no_transactions() {
        let parsed = parse_ofx("OFXHEADER:100\n<OFX></OFX>", 500);
        assert!(parsed.rows.is_empty());
        assert!(!parsed.truncated);
    }
}
