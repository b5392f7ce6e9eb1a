use memchr::memchr;

/// Value written by the access log when a field carries no data.
const ABSENT_MARKER: &[u8] = b"-";

/// Secondary value assumed when a record carries no upstream timing.
pub const DEFAULT_SECONDARY: &[u8] = b"0.0000";

/// The two duration fields pulled out of one record, still as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFields<'a> {
    pub primary: Option<&'a [u8]>,
    /// Defaults to [`DEFAULT_SECONDARY`] when the field is missing, empty or `-`.
    pub secondary: &'a [u8],
}

/// Extracts the primary and secondary duration fields from a single record.
pub trait RecordParser: Send + Sync {
    fn parse<'a>(&self, record: &'a [u8]) -> ParsedFields<'a>;
}

/// Parser for tab separated `key:value` records (LTSV).
#[derive(Debug, Clone)]
pub struct LtsvParser {
    primary_key: Vec<u8>,
    secondary_key: Vec<u8>,
}

impl LtsvParser {
    pub fn new(primary_key: &str, secondary_key: &str) -> Self {
        Self {
            primary_key: primary_key.as_bytes().to_vec(),
            secondary_key: secondary_key.as_bytes().to_vec(),
        }
    }
}

impl RecordParser for LtsvParser {
    /// Linear scan over the fields. Stops at the first field without a colon
    /// and keeps whatever was collected before it.
    fn parse<'a>(&self, record: &'a [u8]) -> ParsedFields<'a> {
        let mut primary = None;
        let mut secondary = None;

        let mut rest = record;
        while !rest.is_empty() {
            let (field, next) = match memchr(b'\t', rest) {
                Some(tab) => (&rest[..tab], &rest[tab + 1..]),
                None => (rest, &rest[rest.len()..]),
            };
            rest = next;

            let Some(colon) = memchr(b':', field) else {
                break;
            };
            let (key, value) = (&field[..colon], &field[colon + 1..]);
            if value == ABSENT_MARKER {
                continue;
            }
            if key == self.primary_key.as_slice() {
                primary = Some(value);
            } else if key == self.secondary_key.as_slice() {
                secondary = Some(value);
            }
        }

        ParsedFields {
            primary,
            secondary: secondary
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_SECONDARY),
        }
    }
}

/// Safe replacement for reading a float straight out of a byte slice.
pub fn parse_f64(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw).ok()?.parse::<f64>().ok()
}
