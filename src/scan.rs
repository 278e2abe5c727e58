//! Marked-content scanner for PDF content streams.
//!
//! Finds `BMC`/`BDC` regions tagged `/Artifact` (watermarks, headers,
//! footers, page furniture) and excises them, including any regions nested
//! inside, while preserving every other byte of the stream exactly.
//!
//! A real tokenizer is required here: the marker bytes can legally appear
//! inside string or name operands, so a byte-level pattern match would cut
//! streams apart in the wrong places.

use std::borrow::Cow;

/// The marked-content tag that identifies removable page furniture.
const ARTIFACT_TAG: &[u8] = b"Artifact";

/// Result of scanning one content stream.
#[derive(Debug)]
pub struct ScanOutcome<'a> {
    /// Stream bytes with artifact regions excised. Borrows the input when
    /// nothing was removed.
    pub data: Cow<'a, [u8]>,
    /// True when at least one region was removed.
    pub modified: bool,
    /// Number of top-level artifact regions excised.
    pub regions_removed: usize,
    /// An artifact region was still open at end of stream; its bytes were
    /// left verbatim rather than risking a truncated stream.
    pub unterminated: bool,
    /// Tokenization failed; the stream was passed through unchanged.
    pub malformed: bool,
}

impl ScanOutcome<'_> {
    fn unchanged(input: &[u8], unterminated: bool, malformed: bool) -> ScanOutcome<'_> {
        ScanOutcome {
            data: Cow::Borrowed(input),
            modified: false,
            regions_removed: 0,
            unterminated,
            malformed,
        }
    }
}

/// Content-stream token types.
#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number,
    Bool,
    /// Literal name with `#xx` escapes decoded
    Name(Vec<u8>),
    String,
    HexString,
    /// `[ ... ]`, contents opaque
    Array,
    /// `<< ... >>`, contents opaque
    Dict,
    /// `BI ... ID <binary> EI`, consumed as one unit
    InlineImage,
    Operator(Vec<u8>),
}

/// A token plus the byte range it occupies in the input.
#[derive(Debug)]
struct Span {
    start: usize,
    end: usize,
    kind: TokenKind,
}

#[derive(Debug)]
struct TokenError {
    pos: usize,
    msg: &'static str,
}

type TokenResult<T> = std::result::Result<T, TokenError>;

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Tokenizer over the content-stream mini-language.
///
/// Produces tokens with byte offsets; composite objects (arrays,
/// dictionaries, inline images) come back as single opaque tokens since the
/// scanner only needs their boundaries.
struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Skip whitespace and `%` comments
    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.advance();
            } else if b == b'%' {
                while let Some(c) = self.advance() {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next(&mut self) -> Option<TokenResult<Span>> {
        self.skip_whitespace();
        let start = self.pos;
        let b = self.peek()?;

        let kind = match b {
            b'/' => self.scan_name(),
            b'(' => self.scan_string(),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    self.scan_dict()
                } else {
                    self.scan_hex_string()
                }
            }
            b'[' => self.scan_array(),
            b'+' | b'-' | b'.' => {
                if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'.') {
                    self.scan_number()
                } else {
                    self.scan_keyword()
                }
            }
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_regular(c) => self.scan_keyword(),
            _ => {
                // Stray delimiter (']', '>', '{', '}'): consume it as an
                // operator-shaped token so scanning can continue.
                self.advance();
                Ok(TokenKind::Operator(vec![b]))
            }
        };

        Some(kind.map(|kind| Span {
            start,
            end: self.pos,
            kind,
        }))
    }

    /// `/Name`, decoding `#xx` escapes
    fn scan_name(&mut self) -> TokenResult<TokenKind> {
        self.advance(); // '/'
        let mut name = Vec::new();

        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            if b == b'#' {
                let h1 = self.peek_at(1);
                let h2 = self.peek_at(2);
                if let (Some(c1), Some(c2)) = (h1, h2) {
                    if c1.is_ascii_hexdigit() && c2.is_ascii_hexdigit() {
                        self.advance();
                        self.advance();
                        self.advance();
                        let hi = (c1 as char).to_digit(16).unwrap_or(0) as u8;
                        let lo = (c2 as char).to_digit(16).unwrap_or(0) as u8;
                        name.push(hi << 4 | lo);
                        continue;
                    }
                }
                // Invalid escape: drop the '#', keep going
                self.advance();
            } else {
                name.push(b);
                self.advance();
            }
        }

        Ok(TokenKind::Name(name))
    }

    /// `( ... )` with nested parens, backslash escapes
    fn scan_string(&mut self) -> TokenResult<TokenKind> {
        let start = self.pos;
        self.advance(); // '('
        let mut depth = 1usize;

        while depth > 0 {
            match self.advance() {
                Some(b'\\') => {
                    // The escaped byte never opens or closes the string
                    self.advance();
                }
                Some(b'(') => depth += 1,
                Some(b')') => depth -= 1,
                Some(_) => {}
                None => {
                    return Err(TokenError {
                        pos: start,
                        msg: "unterminated string",
                    })
                }
            }
        }

        Ok(TokenKind::String)
    }

    /// `< hexdigits >`
    fn scan_hex_string(&mut self) -> TokenResult<TokenKind> {
        let start = self.pos;
        self.advance(); // '<'
        loop {
            match self.advance() {
                Some(b'>') => return Ok(TokenKind::HexString),
                Some(_) => {}
                None => {
                    return Err(TokenError {
                        pos: start,
                        msg: "unterminated hex string",
                    })
                }
            }
        }
    }

    /// `[ ... ]`, contents scanned for boundaries only
    fn scan_array(&mut self) -> TokenResult<TokenKind> {
        let start = self.pos;
        self.advance(); // '['
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b']') => {
                    self.advance();
                    return Ok(TokenKind::Array);
                }
                Some(_) => {
                    self.scan_item()?;
                }
                None => {
                    return Err(TokenError {
                        pos: start,
                        msg: "unterminated array",
                    })
                }
            }
        }
    }

    /// `<< ... >>`, contents scanned for boundaries only
    fn scan_dict(&mut self) -> TokenResult<TokenKind> {
        let start = self.pos;
        self.advance(); // '<'
        self.advance(); // '<'
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'>') && self.peek_at(1) == Some(b'>') {
                self.advance();
                self.advance();
                return Ok(TokenKind::Dict);
            }
            match self.peek() {
                Some(_) => {
                    self.scan_item()?;
                }
                None => {
                    return Err(TokenError {
                        pos: start,
                        msg: "unterminated dictionary",
                    })
                }
            }
        }
    }

    /// Scan any single item inside a composite, discarding its kind
    fn scan_item(&mut self) -> TokenResult<()> {
        match self.peek() {
            Some(b'/') => self.scan_name().map(|_| ()),
            Some(b'(') => self.scan_string().map(|_| ()),
            Some(b'<') => {
                if self.peek_at(1) == Some(b'<') {
                    self.scan_dict().map(|_| ())
                } else {
                    self.scan_hex_string().map(|_| ())
                }
            }
            Some(b'[') => self.scan_array().map(|_| ()),
            Some(c) if is_regular(c) => {
                while matches!(self.peek(), Some(b) if is_regular(b)) {
                    self.advance();
                }
                Ok(())
            }
            Some(_) => {
                self.advance();
                Ok(())
            }
            None => Err(TokenError {
                pos: self.pos,
                msg: "unexpected end of data",
            }),
        }
    }

    fn scan_number(&mut self) -> TokenResult<TokenKind> {
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.advance();
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'.') {
            self.advance();
        }
        Ok(TokenKind::Number)
    }

    fn scan_keyword(&mut self) -> TokenResult<TokenKind> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_regular(b)) {
            self.advance();
        }
        let keyword = &self.data[start..self.pos];

        match keyword {
            b"true" | b"false" => Ok(TokenKind::Bool),
            b"BI" => self.scan_inline_image(start),
            _ => Ok(TokenKind::Operator(keyword.to_vec())),
        }
    }

    /// `BI <pairs> ID <binary data> EI`
    ///
    /// The data between `ID` and `EI` is raw binary and must not be
    /// tokenized; `EI` counts only when delimited by whitespace on both
    /// sides (or the end of the stream).
    fn scan_inline_image(&mut self, start: usize) -> TokenResult<TokenKind> {
        // Key/value pairs up to the ID operator
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(c) if is_regular(c) && !c.is_ascii_digit() => {
                    let kw_start = self.pos;
                    while matches!(self.peek(), Some(b) if is_regular(b)) {
                        self.advance();
                    }
                    if &self.data[kw_start..self.pos] == b"ID" {
                        break;
                    }
                }
                Some(_) => {
                    self.scan_item()?;
                }
                None => {
                    return Err(TokenError {
                        pos: start,
                        msg: "inline image without ID",
                    })
                }
            }
        }

        // One whitespace byte separates ID from the data
        if matches!(self.peek(), Some(b) if is_whitespace(b)) {
            self.advance();
        }

        // Binary data runs to a whitespace-delimited EI
        let mut i = self.pos;
        while i + 1 < self.data.len() {
            if self.data[i] == b'E'
                && self.data[i + 1] == b'I'
                && (i == 0 || is_whitespace(self.data[i - 1]))
                && (i + 2 >= self.data.len()
                    || is_whitespace(self.data[i + 2])
                    || is_delimiter(self.data[i + 2]))
            {
                self.pos = i + 2;
                return Ok(TokenKind::InlineImage);
            }
            i += 1;
        }

        Err(TokenError {
            pos: start,
            msg: "inline image without EI",
        })
    }
}

/// Remove every `/Artifact`-tagged marked-content region from a decoded
/// content stream.
///
/// Stateless and re-entrant: takes a byte buffer, returns the cleaned bytes
/// plus flags. When no artifact region is present the input is returned
/// unchanged (borrowed), so callers can skip re-encoding.
///
/// Policy decisions mirror the component contract: a region left open at the
/// end of the stream is preserved verbatim, and a stream that fails to
/// tokenize is passed through untouched; both cases are flagged rather than
/// raised.
pub fn strip_artifacts(input: &[u8]) -> ScanOutcome<'_> {
    let mut tok = Tokenizer::new(input);
    // Offsets of operand tokens accumulated since the last operator
    let mut operands: Vec<(usize, TokenKind)> = Vec::new();
    let mut out: Vec<u8> = Vec::new();
    let mut copied = 0usize;
    let mut depth = 0usize;
    let mut region_start = 0usize;
    let mut removed = 0usize;

    while let Some(token) = tok.next() {
        let span = match token {
            Ok(span) => span,
            Err(e) => {
                tracing::debug!("tokenization failed at byte {}: {}", e.pos, e.msg);
                return ScanOutcome::unchanged(input, false, true);
            }
        };

        if depth > 0 {
            // Inside an artifact region everything is skipped; only the
            // nesting level matters.
            if let TokenKind::Operator(op) = &span.kind {
                match op.as_slice() {
                    b"BMC" | b"BDC" => depth += 1,
                    b"EMC" => {
                        depth -= 1;
                        if depth == 0 {
                            // Excise through EMC plus trailing whitespace so
                            // the surrounding operators stay tidy
                            let mut end = span.end;
                            while end < input.len() && is_whitespace(input[end]) {
                                end += 1;
                            }
                            out.extend_from_slice(&input[copied..region_start]);
                            copied = end;
                            removed += 1;
                        }
                    }
                    _ => {}
                }
            }
            continue;
        }

        match span.kind {
            TokenKind::Operator(ref op) => {
                if matches!(op.as_slice(), b"BMC" | b"BDC") {
                    if let Some(tag_start) = artifact_tag(op, &operands) {
                        depth = 1;
                        region_start = tag_start;
                    }
                }
                // Operands never outlive their operator
                operands.clear();
            }
            TokenKind::InlineImage => operands.clear(),
            kind => operands.push((span.start, kind)),
        }
    }

    let unterminated = depth > 0;

    if removed == 0 {
        return ScanOutcome::unchanged(input, unterminated, false);
    }

    out.extend_from_slice(&input[copied..]);
    ScanOutcome {
        data: Cow::Owned(out),
        modified: true,
        regions_removed: removed,
        unterminated,
        malformed: false,
    }
}

/// Locate the tag operand of a begin-marked-content operator and decide
/// whether it opens an artifact region.
///
/// `BMC` takes one operand (the tag); `BDC` takes a tag plus a property
/// list. Some producers emit `/Artifact BDC` with the property list missing,
/// so a lone operand before `BDC` is accepted as the tag as well.
fn artifact_tag(op: &[u8], operands: &[(usize, TokenKind)]) -> Option<usize> {
    let tag = match (op, operands.len()) {
        (b"BMC", n) if n >= 1 => &operands[n - 1],
        (b"BDC", n) if n >= 2 => &operands[n - 2],
        (b"BDC", 1) => &operands[0],
        _ => return None,
    };
    match &tag.1 {
        TokenKind::Name(name) if name == ARTIFACT_TAG => Some(tag.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(input: &[u8]) -> ScanOutcome<'_> {
        strip_artifacts(input)
    }

    #[test]
    fn test_no_artifact_is_untouched() {
        let input = b"q 1 0 0 1 72 720 cm BT /F1 12 Tf (Hello) Tj ET Q";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert_eq!(outcome.regions_removed, 0);
        assert_eq!(outcome.data.as_ref(), input);
        assert!(matches!(outcome.data, Cow::Borrowed(_)));
    }

    #[test]
    fn test_single_bdc_region_removed_exactly() {
        let input =
            b"BT (keep me) Tj ET /Artifact <</Type /Pagination>> BDC 0 0 100 50 re f EMC q Q";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.regions_removed, 1);
        assert_eq!(outcome.data.as_ref(), b"BT (keep me) Tj ET q Q");
    }

    #[test]
    fn test_bmc_form_removed() {
        let input = b"1 0 0 RG /Artifact BMC (DRAFT) Tj EMC S";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.data.as_ref(), b"1 0 0 RG S");
    }

    #[test]
    fn test_bdc_named_properties_form() {
        let input = b"q Q /Artifact /P1 BDC 10 10 m 20 20 l S EMC BT ET";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.data.as_ref(), b"q Q BT ET");
    }

    #[test]
    fn test_degenerate_bdc_without_properties() {
        // Seen in the wild: BDC with the property list missing entirely
        let input = b"/Artifact BDC 0 0 10 10 re f EMC BT ET";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.data.as_ref(), b"BT ET");
    }

    #[test]
    fn test_nested_region_removed_with_artifact() {
        let input = b"BT ET /Artifact BMC /P <</MCID 0>> BDC (wm) Tj EMC (more) Tj EMC q Q";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.regions_removed, 1);
        assert_eq!(outcome.data.as_ref(), b"BT ET q Q");
    }

    #[test]
    fn test_artifact_inside_other_region_removed() {
        // The enclosing non-artifact region keeps its own markers
        let input = b"/P <</MCID 1>> BDC BT (text) Tj ET /Artifact BMC (wm) Tj EMC EMC";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(
            outcome.data.as_ref(),
            b"/P <</MCID 1>> BDC BT (text) Tj ET EMC".as_slice()
        );
    }

    #[test]
    fn test_non_artifact_region_untouched() {
        let input = b"/Span <</ActualText (x)>> BDC (abc) Tj EMC";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert_eq!(outcome.data.as_ref(), input);
    }

    #[test]
    fn test_marker_bytes_inside_string_ignored() {
        let input = b"(fake /Artifact BMC inside a string EMC) Tj 0 g";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert_eq!(outcome.data.as_ref(), input);
    }

    #[test]
    fn test_marker_bytes_inside_nested_string_ignored() {
        let input = b"(outer (nested /Artifact BMC) \\) still inside EMC) Tj";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert_eq!(outcome.data.as_ref(), input);
    }

    #[test]
    fn test_longer_name_is_not_the_tag() {
        let input = b"/Artifacts BMC (not page furniture) Tj EMC";
        let outcome = strip(input);
        assert!(!outcome.modified);
    }

    #[test]
    fn test_name_hex_escape_matches_tag() {
        // /Artif#61ct decodes to /Artifact
        let input = b"/Artif#61ct BMC (wm) Tj EMC BT ET";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.data.as_ref(), b"BT ET");
    }

    #[test]
    fn test_two_regions_in_one_stream() {
        let input = b"A B /Artifact BMC x EMC C /Artifact BMC y EMC D";
        let outcome = strip(input);
        assert_eq!(outcome.regions_removed, 2);
        assert_eq!(outcome.data.as_ref(), b"A B C D");
    }

    #[test]
    fn test_unterminated_region_left_verbatim() {
        let input = b"BT ET /Artifact BMC (never closed) Tj";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert!(outcome.unterminated);
        assert_eq!(outcome.data.as_ref(), input);
    }

    #[test]
    fn test_unterminated_after_complete_region() {
        let input = b"/Artifact BMC a EMC keep /Artifact BMC open";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert!(outcome.unterminated);
        assert_eq!(outcome.regions_removed, 1);
        assert_eq!(outcome.data.as_ref(), b"keep /Artifact BMC open");
    }

    #[test]
    fn test_malformed_stream_passes_through() {
        let input = b"BT (unterminated string Tj ET /Artifact BMC x EMC";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert!(outcome.malformed);
        assert_eq!(outcome.data.as_ref(), input);
    }

    #[test]
    fn test_inline_image_data_is_opaque() {
        // The binary payload contains marker-like bytes; EI is only
        // recognized when whitespace-delimited
        let mut input = Vec::new();
        input.extend_from_slice(b"BI /W 2 /H 2 /BPC 8 /CS /G ID ");
        input.extend_from_slice(b"\x00EMC\x01EI\x02garbage EI Q");
        let outcome = strip(&input);
        assert!(!outcome.modified);
        assert_eq!(outcome.data.as_ref(), input.as_slice());
    }

    #[test]
    fn test_artifact_after_inline_image() {
        let input = b"BI /W 1 /H 1 /BPC 8 /CS /G ID \xff EI /Artifact BMC x EMC Q";
        let outcome = strip(input);
        assert!(outcome.modified);
        assert_eq!(outcome.data.as_ref(), b"BI /W 1 /H 1 /BPC 8 /CS /G ID \xff EI Q");
    }

    #[test]
    fn test_idempotent() {
        let input = b"BT ET /Artifact <</Subtype /Watermark>> BDC (wm) Tj EMC 0 g";
        let first = strip(input);
        assert!(first.modified);
        let second = strip_artifacts(first.data.as_ref());
        assert!(!second.modified);
        assert_eq!(second.data.as_ref(), first.data.as_ref());
    }

    #[test]
    fn test_comment_skipped() {
        let input = b"% just a comment\nBT ET";
        let outcome = strip(input);
        assert!(!outcome.modified);
        assert_eq!(outcome.data.as_ref(), input);
    }
}
