use crate::error::MalformedRecord;

/// One archived-response record: the unit the whole system indexes and
/// serves. `(urlkey, timestamp, file, compressed_offset)` uniquely
/// identifies a capture; see [`Capture::encode_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub urlkey: String,
    pub timestamp: u64,
    pub original: String,
    pub mimetype: String,
    pub status: u32,
    pub digest: String,
    pub redirecturl: String,
    pub length: u64,
    pub compressed_offset: u64,
    pub file: String,
}

/// The result of classifying one line of ingestion input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestLine {
    /// Blank line, or the ` CDX ...` header line: ignored.
    Ignored,
    /// `@alias <source-url> <target-url>`, not yet canonicalized.
    Alias { source: String, target: String },
    Capture(Capture),
}

/// Classifies and parses one line of ingestion input. `urlkey` in the
/// returned `Capture` is the raw field from the line; callers canonicalize
/// the `source`/`target` of an `Alias` and the `original` URL of a `Capture`
/// themselves, since canonicalization is not this codec's concern.
pub fn parse_ingest_line(line: &str) -> Result<IngestLine, MalformedRecord> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() || trimmed.starts_with(" CDX") {
        return Ok(IngestLine::Ignored);
    }
    if let Some(rest) = trimmed.strip_prefix("@alias ") {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(MalformedRecord::BadAlias {
                found: tokens.len() + 1,
            });
        }
        return Ok(IngestLine::Alias {
            source: tokens[0].to_owned(),
            target: tokens[1].to_owned(),
        });
    }
    Capture::from_cdx_line(trimmed).map(IngestLine::Capture)
}

impl Capture {
    /// Parses a space-delimited CDX-11 record:
    /// `urlkey original timestamp original-url mimetype status digest redirecturl ??? length compressedoffset file`
    ///
    /// Field 2 (`original`, a legacy duplicate-urlkey slot from older CDX
    /// variants) and field 9 (the `???` meta-tag slot) are parsed but not
    /// retained; this system has no use for either.
    pub fn from_cdx_line(line: &str) -> Result<Capture, MalformedRecord> {
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() != 12 {
            return Err(MalformedRecord::WrongArity {
                found: fields.len(),
            });
        }

        let urlkey = fields[0].to_owned();
        if urlkey.contains(' ') {
            return Err(MalformedRecord::UrlkeyContainsSpace(urlkey));
        }
        // fields[1] is the unused legacy "original" duplicate-urlkey slot.
        let timestamp = parse_u64(fields[2], "timestamp")?;
        let original = fields[3].to_owned();
        let mimetype = fields[4].to_owned();
        let status = parse_status(fields[5])?;
        let digest = fields[6].to_owned();
        let redirecturl = fields[7].to_owned();
        // fields[8] is the unused "???" meta-tag slot.
        let length = parse_u64(fields[9], "length")?;
        let compressed_offset = parse_u64(fields[10], "compressedoffset")?;
        let file = fields[11].to_owned();

        Ok(Capture {
            urlkey,
            timestamp,
            original,
            mimetype,
            status,
            digest,
            redirecturl,
            length,
            compressed_offset,
            file,
        })
    }

    /// Formats the inverse of [`Capture::from_cdx_line`].
    pub fn to_cdx_line(&self) -> String {
        let redirecturl = if self.redirecturl.is_empty() {
            "-"
        } else {
            &self.redirecturl
        };
        format!(
            "{urlkey} - {timestamp:014} {original} {mimetype} {status} {digest} {redirecturl} - {length} {offset} {file}",
            urlkey = self.urlkey,
            timestamp = self.timestamp,
            original = self.original,
            mimetype = self.mimetype,
            status = if self.status == 0 { "-".to_owned() } else { self.status.to_string() },
            digest = self.digest,
            redirecturl = redirecturl,
            length = self.length,
            offset = self.compressed_offset,
            file = self.file,
        )
    }

    /// The canonical RocksDB key: `urlkey 0x20 timestamp(14 digits) 0x20 file
    /// 0x20 compressed_offset(8-byte big-endian)`. Lexicographic byte order
    /// over this encoding is `(urlkey, timestamp, file, compressed_offset)`,
    /// which is exactly the order query results must be returned in.
    pub fn encode_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.urlkey.len() + self.file.len() + 24);
        key.extend_from_slice(self.urlkey.as_bytes());
        key.push(b' ');
        key.extend_from_slice(format!("{:014}", self.timestamp).as_bytes());
        key.push(b' ');
        key.extend_from_slice(self.file.as_bytes());
        key.push(b' ');
        key.extend_from_slice(&self.compressed_offset.to_be_bytes());
        key
    }

    /// A key prefix that sorts immediately before any real key for
    /// `urlkey`, i.e. the position a prefix scan should seek to.
    pub fn key_prefix(urlkey: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(urlkey.len() + 1);
        prefix.extend_from_slice(urlkey.as_bytes());
        prefix.push(b' ');
        prefix
    }

    /// Compact binary encoding of every field not in [`Capture::encode_key`]:
    /// `original`, `mimetype`, `status`, `digest`, `redirecturl`, `length`.
    /// Strings are length-prefixed (`u32` big-endian) rather than
    /// delimited, so that no field may smuggle a separator byte.
    pub fn encode_value(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(
            self.original.len() + self.mimetype.len() + self.digest.len() + self.redirecturl.len() + 32,
        );
        push_string(&mut value, &self.original);
        push_string(&mut value, &self.mimetype);
        value.extend_from_slice(&self.status.to_be_bytes());
        push_string(&mut value, &self.digest);
        push_string(&mut value, &self.redirecturl);
        value.extend_from_slice(&self.length.to_be_bytes());
        value
    }

    /// Exact inverse of pairing [`Capture::encode_key`] with
    /// [`Capture::encode_value`].
    pub fn decode_row(key: &[u8], value: &[u8]) -> Result<Capture, MalformedRecord> {
        let (urlkey, timestamp, file, compressed_offset) = decode_key(key)?;

        let mut cursor = value;
        let original = pop_string(&mut cursor)?;
        let mimetype = pop_string(&mut cursor)?;
        let status = pop_u32(&mut cursor)?;
        let digest = pop_string(&mut cursor)?;
        let redirecturl = pop_string(&mut cursor)?;
        let length = pop_u64(&mut cursor)?;

        Ok(Capture {
            urlkey,
            timestamp,
            original,
            mimetype,
            status,
            digest,
            redirecturl,
            length,
            compressed_offset,
            file,
        })
    }
}

fn decode_key(key: &[u8]) -> Result<(String, u64, String, u64), MalformedRecord> {
    // urlkey 0x20 timestamp(14) 0x20 file 0x20 offset(8 bytes)
    if key.len() < 14 + 1 + 1 + 8 {
        return Err(MalformedRecord::TruncatedKey);
    }
    let offset_bytes = &key[key.len() - 8..];
    let compressed_offset = u64::from_be_bytes(offset_bytes.try_into().unwrap());
    let rest = &key[..key.len() - 8];

    let rest = rest
        .strip_suffix(b" ")
        .ok_or(MalformedRecord::TruncatedKey)?;
    let file_start = find_last(rest, b' ').ok_or(MalformedRecord::TruncatedKey)? + 1;
    let file = std::str::from_utf8(&rest[file_start..])
        .map_err(|e| MalformedRecord::Utf8(e.to_string()))?
        .to_owned();

    let rest = &rest[..file_start - 1];
    let rest = rest
        .strip_suffix(b" ")
        .ok_or(MalformedRecord::TruncatedKey)?;
    if rest.len() < 14 {
        return Err(MalformedRecord::TruncatedKey);
    }
    let ts_start = rest.len() - 14;
    let timestamp_str = std::str::from_utf8(&rest[ts_start..])
        .map_err(|e| MalformedRecord::Utf8(e.to_string()))?;
    let timestamp: u64 = timestamp_str
        .parse()
        .map_err(|_| MalformedRecord::BadInteger {
            field: "timestamp",
            value: timestamp_str.to_owned(),
        })?;

    let urlkey_bytes = rest[..ts_start]
        .strip_suffix(b" ")
        .ok_or(MalformedRecord::TruncatedKey)?;
    let urlkey = std::str::from_utf8(urlkey_bytes)
        .map_err(|e| MalformedRecord::Utf8(e.to_string()))?
        .to_owned();

    Ok((urlkey, timestamp, file, compressed_offset))
}

fn find_last(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().rposition(|&b| b == needle)
}

fn push_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn pop_string(cursor: &mut &[u8]) -> Result<String, MalformedRecord> {
    if cursor.len() < 4 {
        return Err(MalformedRecord::TruncatedValue);
    }
    let (len_bytes, rest) = cursor.split_at(4);
    let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    if rest.len() < len {
        return Err(MalformedRecord::TruncatedValue);
    }
    let (s_bytes, rest) = rest.split_at(len);
    *cursor = rest;
    std::str::from_utf8(s_bytes)
        .map(str::to_owned)
        .map_err(|e| MalformedRecord::Utf8(e.to_string()))
}

fn pop_u32(cursor: &mut &[u8]) -> Result<u32, MalformedRecord> {
    if cursor.len() < 4 {
        return Err(MalformedRecord::TruncatedValue);
    }
    let (bytes, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
}

fn pop_u64(cursor: &mut &[u8]) -> Result<u64, MalformedRecord> {
    if cursor.len() < 8 {
        return Err(MalformedRecord::TruncatedValue);
    }
    let (bytes, rest) = cursor.split_at(8);
    *cursor = rest;
    Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
}

fn parse_u64(field: &str, name: &'static str) -> Result<u64, MalformedRecord> {
    if field == "-" {
        return Ok(0);
    }
    field.parse().map_err(|_| MalformedRecord::BadInteger {
        field: name,
        value: field.to_owned(),
    })
}

fn parse_status(field: &str) -> Result<u32, MalformedRecord> {
    if field == "-" {
        return Ok(0);
    }
    field.parse().map_err(|_| MalformedRecord::BadInteger {
        field: "status",
        value: field.to_owned(),
    })
}
