//! Quoted-CSV record reading and splitting.

use std::io::{self, BufRead};

/// Read one logical record into `buf`. A record spans physical lines while
/// an odd number of quote characters leaves a quoted field open. Returns
/// the number of bytes read (0 at end of file). The trailing line
/// terminator is stripped; newlines inside quoted fields are preserved.
pub(crate) fn read_record<R: BufRead>(reader: &mut R, buf: &mut String) -> io::Result<usize> {
    buf.clear();
    let mut total = 0usize;
    loop {
        let n = reader.read_line(buf)?;
        if n == 0 {
            return Ok(total);
        }
        total += n;
        // Strip the terminator of the line just read.
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        if quotes_balanced(buf) {
            return Ok(total);
        }
        // Quoted field continues past the line break; restore the newline.
        buf.push('\n');
    }
}

/// Whether all quoted fields in `record` are closed.
pub(crate) fn quotes_balanced(record: &str) -> bool {
    record.bytes().filter(|&b| b == b'"').count() % 2 == 0
}

/// Split a logical record into fields. Quoted fields may contain the
/// delimiter, newlines, and doubled-quote escapes.
pub(crate) fn split_record(record: &str, delimiter: u8) -> Vec<String> {
    let delim = delimiter as char;
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delim {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}
