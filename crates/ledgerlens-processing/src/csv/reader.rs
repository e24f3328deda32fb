/// Streaming CSV record reader over decoded text.
///
/// Handles quoted fields with doubled quotes and embedded line breaks, and both
/// `\n` and `\r\n` record terminators. Records are produced lazily so callers
/// can stop after the rows they need.
pub struct CsvRecords<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> CsvRecords<'a> {
    pub fn new(input: &'a str) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self { input, pos: 0 }
    }
}

impl Iterator for CsvRecords<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        let bytes = self.input.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }

        let mut record = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = self.input[self.pos..].char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if matches!(chars.peek(), Some((_, '"'))) {
                        field.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(c);
                }
                continue;
            }

            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' | '\n' => {
                    let mut end = self.pos + offset + 1;
                    if c == '\r' && matches!(chars.peek(), Some((_, '\n'))) {
                        end += 1;
                    }
                    self.pos = end;
                    record.push(field);
                    return Some(record);
                }
                _ => field.push(c),
            }
        }

        self.pos = bytes.len();
        record.push(field);
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_records() {
        let records: Vec<_> = CsvRecords::new("a,b,c\n1,2,3\n").collect();
        assert_eq!(records, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
    }

    #[test]
    fn test_quoted_fields() {
        let records: Vec<_> =
            CsvRecords::new("\"Shop, Inc\",\"say \"\"hi\"\"\",\"two\nlines\"\r\nx,y,z").collect();
        assert_eq!(records[0], vec!["Shop, Inc", "say \"hi\"", "two\nlines"]);
        assert_eq!(records[1], vec!["x", "y", "z"]);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_bom_and_empty_lines() {
        let records: Vec<_> = CsvRecords::new("\u{feff}h1,h2\n\n1,2").collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], vec!["h1", "h2"]);
        assert_eq!(records[1], vec![""]);
    }

    #[test]
    fn test_lazy_consumption() {
        let text = "h\n".to_string() + &"r\n".repeat(10_000);
        assert_eq!(CsvRecords::new(&text).take(3).count(), 3);
    }
}
