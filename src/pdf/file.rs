//! Permissive PDF file reader.
//!
//! The reader scans the whole file for `N G obj ... endobj` pairs instead
//! of trusting the xref table; damaged tables and appended updates both
//! come out right, and well-formed files parse the same either way. The
//! trailer is only consulted for `/Root`.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path as FsPath;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use memmap2::Mmap;

use crate::gfx::error::{Error, Result};
use crate::gfx::geometry::Rect;

use super::lexer::{LexBuf, Lexer, Token};
use super::object::{Dict, Name, Object, ObjRef, PdfString, Stream, number_array};

/// US Letter, the fallback when a page has no inheritable `/MediaBox`.
const DEFAULT_MEDIA_BOX: Rect = Rect { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 };

pub struct PdfFile {
    objects: HashMap<u32, Object>,
    trailer: Dict,
    /// Object numbers of page dictionaries, document order.
    pages: Vec<u32>,
}

impl PdfFile {
    pub fn parse_file(path: impl AsRef<FsPath>) -> Result<PdfFile> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot open {}: {e}", path.as_ref().display()),
            ))
        })?;
        // SAFETY: the mapping is read-only and dropped before return.
        let map = unsafe { Mmap::map(&file) }.map_err(Error::Io)?;
        PdfFile::parse_bytes(&map)
    }

    pub fn parse_bytes(data: &[u8]) -> Result<PdfFile> {
        let mut file = PdfFile { objects: HashMap::new(), trailer: Dict::new(), pages: Vec::new() };
        file.scan(data)?;
        if file.objects.is_empty() {
            return Err(Error::format("no objects found"));
        }
        file.collect_pages();
        Ok(file)
    }

    fn scan(&mut self, data: &[u8]) -> Result<()> {
        let mut lx = Lexer::new(data);
        let mut buf = LexBuf::default();
        // Last two integers seen at top level, candidates for "N G obj".
        let mut nums: [i64; 2] = [0, 0];
        loop {
            match lx.next(&mut buf) {
                Token::Eof => break,
                Token::Int => {
                    nums[0] = nums[1];
                    nums[1] = buf.int;
                }
                Token::Keyword => match buf.bytes.as_slice() {
                    b"obj" => {
                        let num = nums[0];
                        let obj = parse_value(&mut lx, &mut buf, data, 0);
                        if (0..=u32::MAX as i64).contains(&num) {
                            // Later definitions win, matching incremental
                            // updates appended to the file.
                            self.objects.insert(num as u32, obj);
                        }
                        skip_to_endobj(&mut lx, &mut buf);
                    }
                    b"trailer" => {
                        let obj = parse_value(&mut lx, &mut buf, data, 0);
                        if let Object::Dict(d) = obj {
                            // Appended updates put the newest trailer last.
                            for (k, v) in d {
                                self.trailer.insert(k, v);
                            }
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    /// Follow reference chains to the referenced object. Dangling
    /// references resolve to `Null`.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        static NULL: Object = Object::Null;
        let mut cur = obj;
        for _ in 0..32 {
            match cur {
                Object::Ref(r) => cur = self.objects.get(&r.num).unwrap_or(&NULL),
                other => return other,
            }
        }
        &NULL
    }

    pub fn object(&self, num: u32) -> Option<&Object> {
        self.objects.get(&num)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Dictionary lookup with reference resolution.
    pub fn get<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a Object> {
        let obj = self.resolve(dict.get(key)?);
        if obj.is_null() { None } else { Some(obj) }
    }

    pub fn get_dict<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a Dict> {
        self.get(dict, key)?.as_dict()
    }

    pub fn get_name<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a str> {
        Some(self.get(dict, key)?.as_name()?.as_str())
    }

    pub fn catalog(&self) -> Option<&Dict> {
        if let Some(root) = self.trailer.get("Root") {
            if let Some(d) = self.resolve(root).as_dict() {
                return Some(d);
            }
        }
        // No usable trailer; hunt for the catalog.
        self.objects.values().find_map(|o| {
            let d = o.as_dict()?;
            (self.get_name(d, "Type") == Some("Catalog")).then_some(d)
        })
    }

    fn collect_pages(&mut self) {
        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        if let Some(catalog) = self.catalog()
            && let Some(root) = catalog.get("Pages")
        {
            self.walk_pages(root, &mut pages, &mut visited, 0);
        }
        if pages.is_empty() {
            // Damaged page tree: fall back to document order.
            let mut nums: Vec<u32> = self
                .objects
                .iter()
                .filter(|(_, o)| {
                    o.as_dict()
                        .is_some_and(|d| self.get_name(d, "Type") == Some("Page"))
                })
                .map(|(n, _)| *n)
                .collect();
            nums.sort_unstable();
            pages = nums;
        }
        self.pages = pages;
    }

    fn walk_pages(
        &self,
        node: &Object,
        pages: &mut Vec<u32>,
        visited: &mut HashSet<u32>,
        depth: usize,
    ) {
        if depth > 64 {
            return;
        }
        let num = match node {
            Object::Ref(r) => {
                if !visited.insert(r.num) {
                    return;
                }
                Some(r.num)
            }
            _ => None,
        };
        let Some(dict) = self.resolve(node).as_dict() else { return };
        match self.get_name(dict, "Type") {
            Some("Page") => {
                if let Some(n) = num {
                    pages.push(n);
                }
            }
            _ => {
                if let Some(kids) = self.get(dict, "Kids").and_then(Object::as_array) {
                    for kid in kids {
                        self.walk_pages(kid, pages, visited, depth + 1);
                    }
                }
            }
        }
    }

    pub fn count_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&Dict> {
        self.objects.get(self.pages.get(index)?)?.as_dict()
    }

    pub fn page_object_number(&self, index: usize) -> Option<u32> {
        self.pages.get(index).copied()
    }

    /// Page index for a page-object number, the map `GoTo` destinations
    /// resolve through.
    pub fn page_from_object_number(&self, num: u32) -> Option<usize> {
        self.pages.iter().position(|&n| n == num)
    }

    /// The page's `/MediaBox`, walking `/Parent` for the inheritable
    /// value.
    pub fn media_box(&self, index: usize) -> Rect {
        let Some(mut dict) = self.page(index) else { return DEFAULT_MEDIA_BOX };
        for _ in 0..64 {
            if let Some(mb) = self.get(dict, "MediaBox").and_then(number_array)
                && mb.len() == 4
            {
                return Rect::new(
                    mb[0].min(mb[2]),
                    mb[1].min(mb[3]),
                    mb[0].max(mb[2]),
                    mb[1].max(mb[3]),
                );
            }
            match self.get_dict(dict, "Parent") {
                Some(parent) => dict = parent,
                None => break,
            }
        }
        DEFAULT_MEDIA_BOX
    }

    /// The page's `/Resources`, walking `/Parent` like `media_box`.
    pub fn page_resources(&self, index: usize) -> Option<&Dict> {
        let mut dict = self.page(index)?;
        for _ in 0..64 {
            if let Some(res) = self.get_dict(dict, "Resources") {
                return Some(res);
            }
            match self.get_dict(dict, "Parent") {
                Some(parent) => dict = parent,
                None => break,
            }
        }
        None
    }

    /// Decoded content stream of a page; `/Contents` arrays concatenate
    /// with a separating newline.
    pub fn page_content(&self, index: usize) -> Option<Bytes> {
        let page = self.page(index)?;
        let contents = self.get(page, "Contents")?;
        let mut out = Vec::new();
        match contents {
            Object::Stream(s) => out.extend_from_slice(&self.decode_stream(s)),
            Object::Array(parts) => {
                for part in parts {
                    if let Some(s) = self.resolve(part).as_stream() {
                        out.extend_from_slice(&self.decode_stream(s));
                        out.push(b'\n');
                    }
                }
            }
            _ => return None,
        }
        Some(Bytes::from(out))
    }

    /// Apply the stream's filter chain. Flate decodes; unknown filters
    /// pass the data through untouched (image-specific filters are the
    /// interpreter's business).
    pub fn decode_stream(&self, stream: &Stream) -> Bytes {
        let mut filters: Vec<String> = Vec::new();
        if let Some(f) = stream.dict.get("Filter") {
            match self.resolve(f) {
                Object::Name(n) => filters.push(n.as_str().to_string()),
                Object::Array(a) => {
                    for f in a {
                        if let Some(n) = self.resolve(f).as_name() {
                            filters.push(n.as_str().to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        let mut data = stream.data.clone();
        for filter in &filters {
            if filter == "FlateDecode" || filter == "Fl" {
                let mut out = Vec::new();
                let mut dec = ZlibDecoder::new(data.as_ref());
                match dec.read_to_end(&mut out) {
                    Ok(_) => data = Bytes::from(out),
                    // Truncated streams keep whatever inflated.
                    Err(_) if !out.is_empty() => data = Bytes::from(out),
                    Err(_) => {}
                }
            }
        }
        data
    }

    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }
}

/// Parse one object starting at the current token position.
fn parse_value(lx: &mut Lexer<'_>, buf: &mut LexBuf, data: &[u8], depth: usize) -> Object {
    if depth > 64 {
        return Object::Null;
    }
    let tok = lx.next(buf);
    parse_value_from(tok, lx, buf, data, depth)
}

fn parse_value_from(
    tok: Token,
    lx: &mut Lexer<'_>,
    buf: &mut LexBuf,
    data: &[u8],
    depth: usize,
) -> Object {
    match tok {
        Token::Int => {
            let first = buf.int;
            // "N G R" makes a reference; anything else rewinds.
            let save = lx.pos();
            if lx.next(buf) == Token::Int {
                let second = buf.int;
                let save2 = lx.pos();
                if lx.next(buf) == Token::Keyword && buf.bytes == b"R" {
                    if (0..=u32::MAX as i64).contains(&first) && (0..=u16::MAX as i64).contains(&second)
                    {
                        return Object::Ref(ObjRef { num: first as u32, r#gen: second as u16 });
                    }
                    return Object::Null;
                }
                lx.seek(save2);
            }
            lx.seek(save);
            Object::Int(first)
        }
        Token::Real => Object::Real(buf.real),
        Token::String => Object::String(PdfString(buf.bytes.clone())),
        Token::Name => Object::Name(Name::intern(&String::from_utf8_lossy(&buf.bytes))),
        Token::True => Object::Bool(true),
        Token::False => Object::Bool(false),
        Token::Null => Object::Null,
        Token::OpenArray => {
            let mut items = Vec::new();
            loop {
                let t = lx.next(buf);
                match t {
                    Token::CloseArray | Token::Eof => break,
                    _ => items.push(parse_value_from(t, lx, buf, data, depth + 1)),
                }
            }
            Object::Array(items)
        }
        Token::OpenDict => {
            let mut dict = Dict::new();
            loop {
                match lx.next(buf) {
                    Token::Name => {
                        let key = Name::intern(&String::from_utf8_lossy(&buf.bytes));
                        let value = parse_value(lx, buf, data, depth + 1);
                        dict.insert(key, value);
                    }
                    Token::CloseDict | Token::Eof => break,
                    // Non-name key: drop it and resynchronize.
                    _ => {}
                }
            }
            // A following "stream" keyword upgrades the dict.
            let save = lx.pos();
            if lx.next(buf) == Token::Keyword && buf.bytes == b"stream" {
                let payload = capture_stream(lx, &dict, data);
                return Object::Stream(Stream { dict, data: payload });
            }
            lx.seek(save);
            Object::Dict(dict)
        }
        _ => Object::Null,
    }
}

/// Read the raw stream payload following a `stream` keyword. `/Length` is
/// honored when it is a plausible inline integer; otherwise the data runs
/// to the next `endstream`.
fn capture_stream(lx: &mut Lexer<'_>, dict: &Dict, data: &[u8]) -> Bytes {
    let mut start = lx.pos();
    // Skip the single EOL after the keyword.
    if data.get(start) == Some(&b'\r') {
        start += 1;
    }
    if data.get(start) == Some(&b'\n') {
        start += 1;
    }
    let by_length = dict
        .get("Length")
        .and_then(Object::as_int)
        .and_then(|len| {
            let len = usize::try_from(len).ok()?;
            let end = start.checked_add(len)?;
            (end <= data.len() && slice_contains(&data[end..(end + 20).min(data.len())], b"endstream"))
                .then_some(end)
        });
    let end = by_length.unwrap_or_else(|| {
        match slice_find(&data[start..], b"endstream") {
            Some(off) => {
                let mut end = start + off;
                // Back off the EOL owned by the marker.
                if end > start && data[end - 1] == b'\n' {
                    end -= 1;
                }
                if end > start && data[end - 1] == b'\r' {
                    end -= 1;
                }
                end
            }
            None => data.len(),
        }
    });
    lx.seek(end);
    Bytes::copy_from_slice(&data[start..end])
}

fn skip_to_endobj(lx: &mut Lexer<'_>, buf: &mut LexBuf) {
    let save = lx.pos();
    match lx.next(buf) {
        Token::Keyword if buf.bytes == b"endobj" => {}
        Token::Eof => {}
        // Junk after the object body; scan forward.
        _ => {
            lx.seek(save);
            match slice_find(lx.remaining(), b"endobj") {
                Some(off) => lx.seek(save + off + b"endobj".len()),
                None => {}
            }
        }
    }
}

fn slice_find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn slice_contains(haystack: &[u8], needle: &[u8]) -> bool {
    slice_find(haystack, needle).is_some()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Assemble a tiny but structurally complete document.
    pub(crate) fn two_page_pdf() -> Vec<u8> {
        let content1 = b"1 0 0 RG 2 w 0 0 m 100 100 l S";
        let content2 = b"0 1 0 rg 10 10 50 50 re f";
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        pdf.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        pdf.extend_from_slice(
            b"2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 200 300] >> endobj\n",
        );
        pdf.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /Contents 5 0 R >> endobj\n");
        pdf.extend_from_slice(
            b"4 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents 6 0 R >> endobj\n",
        );
        for (num, content) in [(5, content1.as_slice()), (6, content2.as_slice())] {
            pdf.extend_from_slice(
                format!("{num} 0 obj << /Length {} >> stream\n", content.len()).as_bytes(),
            );
            pdf.extend_from_slice(content);
            pdf.extend_from_slice(b"\nendstream endobj\n");
        }
        pdf.extend_from_slice(b"trailer << /Root 1 0 R /Size 7 >>\n%%EOF\n");
        pdf
    }

    #[test]
    fn parses_pages_in_order() {
        let f = PdfFile::parse_bytes(&two_page_pdf()).unwrap();
        assert_eq!(f.count_pages(), 2);
        assert_eq!(f.page_object_number(0), Some(3));
        assert_eq!(f.page_object_number(1), Some(4));
        assert_eq!(f.page_from_object_number(4), Some(1));
        assert_eq!(f.page_from_object_number(99), None);
    }

    #[test]
    fn media_box_inherits_from_parent() {
        let f = PdfFile::parse_bytes(&two_page_pdf()).unwrap();
        assert_eq!(f.media_box(0), Rect::new(0.0, 0.0, 200.0, 300.0));
        assert_eq!(f.media_box(1), Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(f.media_box(7), DEFAULT_MEDIA_BOX);
    }

    #[test]
    fn page_content_decodes() {
        let f = PdfFile::parse_bytes(&two_page_pdf()).unwrap();
        let c = f.page_content(1).unwrap();
        assert_eq!(&c[..], b"0 1 0 rg 10 10 50 50 re f");
    }

    #[test]
    fn flate_stream_round_trip() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"0 0 10 10 re f").unwrap();
        let z = enc.finish().unwrap();
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        pdf.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        pdf.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /Contents 4 0 R >> endobj\n");
        pdf.extend_from_slice(
            format!("4 0 obj << /Length {} /Filter /FlateDecode >> stream\n", z.len()).as_bytes(),
        );
        pdf.extend_from_slice(&z);
        pdf.extend_from_slice(b"\nendstream endobj\ntrailer << /Root 1 0 R >>\n");
        let f = PdfFile::parse_bytes(&pdf).unwrap();
        assert_eq!(&f.page_content(0).unwrap()[..], b"0 0 10 10 re f");
    }

    #[test]
    fn missing_length_recovers_via_endstream() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        pdf.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        pdf.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /Contents 4 0 R >> endobj\n");
        pdf.extend_from_slice(b"4 0 obj << >> stream\nhello world\nendstream endobj\n");
        let f = PdfFile::parse_bytes(&pdf).unwrap();
        assert_eq!(&f.page_content(0).unwrap()[..], b"hello world");
    }

    #[test]
    fn later_object_definitions_win() {
        let mut pdf = two_page_pdf();
        // Incremental update replaces the second page's content.
        pdf.extend_from_slice(b"6 0 obj << /Length 9 >> stream\n0 0 1 rg\nendstream endobj\n");
        let f = PdfFile::parse_bytes(&pdf).unwrap();
        assert_eq!(&f.page_content(1).unwrap()[..], b"0 0 1 rg\n");
    }

    #[test]
    fn garbage_input_is_an_error_not_a_panic() {
        assert!(PdfFile::parse_bytes(b"not a pdf at all").is_err());
        assert!(PdfFile::parse_bytes(b"").is_err());
    }

    #[test]
    fn dangling_refs_resolve_to_null() {
        let f = PdfFile::parse_bytes(&two_page_pdf()).unwrap();
        let r = Object::Ref(ObjRef { num: 999, r#gen: 0 });
        assert!(f.resolve(&r).is_null());
    }
}
