//! Read formats
//!
//! A read call takes one or more formats and returns one result per format.

use std::fmt;

/// What a single read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFormat {
    /// Up to this many bytes
    Count(usize),

    /// One line, without its newline
    #[default]
    Line,

    /// Everything from the cursor to end of file
    All,

    /// One numeric token
    Number,
}

impl ReadFormat {
    /// Parse a single-format token: `n`, `a`, `l`, with or without a leading `*`
    pub fn parse(token: &str) -> Option<Self> {
        match Self::parse_options(token)?.as_slice() {
            [format] => Some(*format),
            _ => None,
        }
    }

    /// Parse an option string. Every letter after the optional `*` is one
    /// read, so `*ln` reads a line and then a number.
    pub fn parse_options(token: &str) -> Option<Vec<Self>> {
        let token = token.strip_prefix('*').unwrap_or(token);
        if token.is_empty() {
            return None;
        }
        token.chars().map(Self::from_option).collect()
    }

    fn from_option(c: char) -> Option<Self> {
        match c {
            'n' => Some(ReadFormat::Number),
            'a' => Some(ReadFormat::All),
            'l' => Some(ReadFormat::Line),
            _ => None,
        }
    }
}

/// A successful read result
#[derive(Debug, Clone, PartialEq)]
pub enum ReadValue {
    Bytes(Vec<u8>),
    Number(f64),
}

impl ReadValue {
    /// Text form; invalid UTF-8 is replaced
    pub fn into_string(self) -> String {
        match self {
            ReadValue::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            ReadValue::Number(n) => crate::value::format_number(n),
        }
    }
}

impl fmt::Display for ReadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadValue::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            ReadValue::Number(n) => write!(f, "{}", crate::value::format_number(*n)),
        }
    }
}

/// Scan one number at the start of `input` after optional whitespace.
///
/// Returns the value and the number of bytes consumed, whitespace included.
pub(crate) fn scan_number(input: &[u8]) -> Option<(f64, usize)> {
    let start = input.iter().position(|b| !b.is_ascii_whitespace())?;
    let mut i = start;

    let negative = match input.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    if input.get(i) == Some(&b'0') && matches!(input.get(i + 1), Some(b'x') | Some(b'X')) {
        let digits_start = i + 2;
        let mut end = digits_start;
        let mut value = 0f64;
        while let Some(digit) = input.get(end).and_then(|b| (*b as char).to_digit(16)) {
            value = value * 16.0 + digit as f64;
            end += 1;
        }
        if end == digits_start {
            return None;
        }
        return Some((if negative { -value } else { value }, end));
    }

    let digits = |mut j: usize| {
        while input.get(j).map_or(false, u8::is_ascii_digit) {
            j += 1;
        }
        j
    };

    let int_end = digits(i);
    let mut end = int_end;
    let mut has_digits = int_end > i;

    if input.get(end) == Some(&b'.') {
        let frac_end = digits(end + 1);
        has_digits |= frac_end > end + 1;
        end = frac_end;
    }
    if !has_digits {
        return None;
    }

    if matches!(input.get(end), Some(b'e') | Some(b'E')) {
        let mut j = end + 1;
        if matches!(input.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        let exp_end = digits(j);
        if exp_end > j {
            end = exp_end;
        }
    }

    let text = std::str::from_utf8(&input[start..end]).ok()?;
    let value: f64 = text.parse().ok()?;
    Some((value, end))
}
