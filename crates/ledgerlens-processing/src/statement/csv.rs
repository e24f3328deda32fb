use ledgerlens_core::models::Transaction;

use super::ParsedStatement;
use crate::csv::CsvRecords;
use crate::validator::ValidationError;

const DESCRIPTION_HEADERS: &[&str] = &[
    "description",
    "memo",
    "payee",
    "details",
    "narrative",
    "merchant",
    "name",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountColumns {
    Single(usize),
    Split {
        debit: Option<usize>,
        credit: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    date: usize,
    description: Option<usize>,
    amount: AmountColumns,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Option<Self> {
        let lower: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |pred: &dyn Fn(&str) -> bool| lower.iter().position(|h| pred(h));

        let date = find(&|h| h.contains("date"))?;
        let description = DESCRIPTION_HEADERS
            .iter()
            .find_map(|name| find(&|h| h.contains(name)));
        let amount = match find(&|h| h.contains("amount")) {
            Some(idx) => AmountColumns::Single(idx),
            None => {
                let debit = find(&|h| h.contains("debit") || h.contains("withdrawal"));
                let credit = find(&|h| h.contains("credit") || h.contains("deposit"));
                if debit.is_none() && credit.is_none() {
                    return None;
                }
                AmountColumns::Split { debit, credit }
            }
        };

        Some(Self {
            date,
            description,
            amount,
        })
    }

    /// Headerless files: date, description, amount in the first three columns
    fn positional() -> Self {
        Self {
            date: 0,
            description: Some(1),
            amount: AmountColumns::Single(2),
        }
    }

    fn to_transaction(self, record: &[String]) -> Transaction {
        let cell = |idx: usize| record.get(idx).map(|v| v.trim()).unwrap_or_default();
        let amount = match self.amount {
            AmountColumns::Single(idx) => cell(idx).to_string(),
            AmountColumns::Split { debit, credit } => {
                let credit = credit.map(cell).unwrap_or_default();
                let debit = debit.map(cell).unwrap_or_default();
                if !credit.is_empty() {
                    credit.to_string()
                } else if !debit.is_empty() {
                    format!("-{}", debit.trim_start_matches('-'))
                } else {
                    String::new()
                }
            }
        };
        Transaction::new(
            cell(self.date),
            self.description.map(cell).unwrap_or_default(),
            amount,
        )
    }
}

fn is_blank(record: &[String]) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

/// Parse up to `max_rows` transactions; one extra row is read to detect truncation.
pub fn parse_csv(text: &str, max_rows: usize) -> Result<ParsedStatement, ValidationError> {
    let mut records = CsvRecords::new(text).filter(|r| !is_blank(r));

    let first = match records.next() {
        Some(first) => first,
        None => return Ok(ParsedStatement::default()),
    };

    let (columns, first_data) = match ColumnMap::from_header(&first) {
        Some(columns) => (columns, None),
        None if first.len() >= 3 => (ColumnMap::positional(), Some(first)),
        None => {
            return Err(ValidationError::MalformedFile(
                "CSV has no recognizable transaction columns".to_string(),
            ))
        }
    };

    let mut rows = Vec::new();
    let mut truncated = false;
    for record in first_data.into_iter().chain(records) {
        if rows.len() == max_rows {
            truncated = true;
            break;
        }
        rows.push(columns.to_transaction(&record));
    }

    Ok(ParsedStatement { rows, truncated })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_columns_in_any_order() {
        let text = "Amount,Posting Date,Payee\n-4.50,2024-01-02,Coffee Shop\n";
        let parsed = parse_csv(text, 500).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0], Transaction::new("2024-01-02", "Coffee Shop", "-4.50"));
        assert!(!parsed.truncated);
    }

    #[test]
    fn test_debit_credit_columns() {
        let text = "Date,Details,Debit,Credit\n2024-01-03,Rent,1200.00,\n2024-01-04,Salary,,3000.00\n";
        let parsed = parse_csv(text, 500).unwrap();
        assert_eq!(parsed.rows[0].amount, "-1200.00");
        assert_eq!(parsed.rows[1].amount, "3000.00");
    }

    #[test]
    fn test_headerless_positional() {
        let text = "2024-01-02,Coffee,-3.00\n2024-01-03,Bread,-2.00\n";
        let parsed = parse_csv(text, 500).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].description, "Coffee");
    }

    #[test]
    fn test_truncates_at_max_rows() {
        let mut text = String::from("Date,Description,Amount\n");
        for i in 0..600 {
            text.push_str(&format!("2024-01-01,Item {},-{}.00\n", i, i));
        }
        let parsed = parse_csv(&text, 500).unwrap();
        assert_eq!(parsed.rows.len(), 500);
        assert!(parsed.truncated);
        assert_eq!(parsed.rows[499].description, "Item 499");
    }

    #[test]
    fn test_exactly_max_rows_is_not_truncated() {
        let mut text = String::from("Date,Description,Amount\n");
        for i in 0..5 {
            text.push_str(&format!("2024-01-01,Item {},1\n", i));
        }
        let parsed = parse_csv(&text, 5).unwrap();
        assert_eq!(parsed.rows.len(), 5);
        assert!(!parsed.truncated);
    }

    #[test]
    fn test_blank_lines_skipped_and_header_only_is_empty() {
        let parsed = parse_csv("Date,Description,Amount\n\n,,\n", 500).unwrap();
        assert!(parsed.rows.is_empty());
        assert!(parse_csv("", 500).unwrap().rows.is_empty());
    }

    #[test]
    fn test_unrecognizable_columns() {
        let err = parse_csv("foo,bar\n1,2\n", 500).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_FILE");
    }
}
