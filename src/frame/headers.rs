use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::{self, HeaderMap, Method, Request, Response, StatusCode, Uri};
use log::trace;

use crate::hpack::{self, Header};

use super::head::{Head, Kind, StreamId};
use super::priority::StreamDependency;
use super::Error;

const END_STREAM: u8 = 0x1;
const END_HEADERS: u8 = 0x4;
const PADDED: u8 = 0x8;
const PRIORITY: u8 = 0x20;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeadersFlag(u8);

impl HeadersFlag {
    pub fn load(bits: u8) -> HeadersFlag {
        HeadersFlag(bits & (END_STREAM | END_HEADERS | PADDED | PRIORITY))
    }

    pub fn is_end_stream(&self) -> bool {
        self.0 & END_STREAM == END_STREAM
    }

    pub fn set_end_stream(&mut self) {
        self.0 |= END_STREAM
    }

    pub fn is_end_headers(&self) -> bool {
        self.0 & END_HEADERS == END_HEADERS
    }

    pub fn is_padded(&self) -> bool {
        self.0 & PADDED == PADDED
    }

    pub fn is_priority(&self) -> bool {
        self.0 & PRIORITY == PRIORITY
    }

    pub fn set_priority(&mut self) {
        self.0 |= PRIORITY
    }
}

impl Default for HeadersFlag {
    fn default() -> Self {
        HeadersFlag(END_HEADERS)
    }
}

impl From<HeadersFlag> for u8 {
    fn from(src: HeadersFlag) -> u8 {
        src.0
    }
}

/// Pseudo-headers broken out from regular fields; RFC 7540 §8.1.2.3 requires
/// these to precede regular fields and to appear at most once each.
#[derive(Debug, Default, Clone)]
pub struct Pseudo {
    pub method: Option<Method>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    pub status: Option<StatusCode>,
}

impl Pseudo {
    /// Builds request pseudo-headers (`spec.md` §4.3 step 2): `:path` is the
    /// URI path with `?query` appended only when a query is actually
    /// present, except for the OPTIONS-ping sentinel (`OPTIONS *`), whose
    /// request-target is the literal asterisk rather than a path; `:authority`
    /// drops the port when it's the scheme's default.
    pub fn request(method: Method, uri: &Uri) -> Self {
        let path = if method == Method::OPTIONS && uri.path() == "*" {
            "*".to_string()
        } else {
            let mut path = uri.path().to_string();
            if let Some(query) = uri.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        };

        Pseudo {
            method: Some(method),
            scheme: uri.scheme_str().map(|s| s.to_string()),
            authority: uri.authority().map(|a| authority_without_default_port(a, uri.scheme_str())),
            path: Some(path),
            status: None,
        }
    }

    pub fn response(status: StatusCode) -> Self {
        Pseudo { status: Some(status), ..Pseudo::default() }
    }
}

/// Default port for the two schemes this client ever negotiates ALPN for.
fn default_port(scheme: Option<&str>) -> Option<u16> {
    match scheme {
        Some("http") => Some(80),
        Some("https") => Some(443),
        _ => None,
    }
}

fn authority_without_default_port(authority: &http::uri::Authority, scheme: Option<&str>) -> String {
    match authority.port_u16() {
        Some(port) if Some(port) == default_port(scheme) => authority.host().to_string(),
        _ => authority.to_string(),
    }
}

/// Header frame; this could be either a request or a response.
#[derive(Debug)]
pub struct Headers {
    stream_id: StreamId,
    stream_dep: Option<StreamDependency>,
    pseudo: Pseudo,
    fields: HeaderMap,
    flags: HeadersFlag,
}

/// Remainder of a header block that didn't fit in one HEADERS frame; the
/// caller drives further CONTINUATION frames from this.
pub struct Continuation {
    stream_id: StreamId,
    headers: Vec<Header>,
}

impl Continuation {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Encodes as much of the remainder as fits, returning a further
    /// `Continuation` if there's still more left.
    pub fn encode(mut self, encoder: &mut hpack::Encoder, dst: &mut BytesMut) -> Option<Continuation> {
        let head = Head::new(Kind::Continuation, END_HEADERS, self.stream_id);
        let pos = dst.len();
        head.encode(0, dst);

        let mut iter = self.headers.drain(..).peekable();
        encoder.encode(&mut iter, dst);

        let len = dst.len() - pos - super::HEADER_LEN;
        patch_len(dst, pos, len);

        if self.headers.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

fn patch_len(dst: &mut BytesMut, pos: usize, len: usize) {
    dst[pos] = (len >> 16) as u8;
    dst[pos + 1] = (len >> 8) as u8;
    dst[pos + 2] = len as u8;
}

impl Headers {
    pub fn new(stream_id: StreamId, pseudo: Pseudo, fields: HeaderMap) -> Self {
        Headers {
            stream_id,
            stream_dep: None,
            fields,
            pseudo,
            flags: HeadersFlag::default(),
        }
    }

    pub fn trailers(stream_id: StreamId, fields: HeaderMap) -> Self {
        let mut headers = Headers::new(stream_id, Pseudo::default(), fields);
        headers.flags.set_end_stream();
        headers
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags.is_end_headers()
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags.is_end_stream()
    }

    pub fn set_end_stream(&mut self) {
        self.flags.set_end_stream()
    }

    /// Attaches a stream dependency/weight, encoded as RFC 7540 §6.2's
    /// optional priority fields. No priority tree support beyond this single
    /// weight-against-stream-0 shape (see Non-goals).
    pub fn set_priority(&mut self, dep: StreamDependency) {
        self.stream_dep = Some(dep);
        self.flags.set_priority();
    }

    pub fn pseudo(&self) -> &Pseudo {
        &self.pseudo
    }

    /// Decodes a HEADERS frame payload that has already been reassembled
    /// across any CONTINUATION frames (RFC 7540 §6.10).
    pub fn load(head: Head, mut src: Bytes, decoder: &mut hpack::Decoder) -> Result<Self, Error> {
        let flags = HeadersFlag::load(head.flag());

        if flags.is_padded() {
            if src.is_empty() {
                return Err(Error::TooMuchPadding);
            }
            let pad_len = src.get_u8() as usize;
            if pad_len > src.len() {
                return Err(Error::TooMuchPadding);
            }
            src.truncate(src.len() - pad_len);
        }

        let stream_dep = if flags.is_priority() {
            if src.len() < 5 {
                return Err(Error::PayloadLengthTooShort);
            }
            let raw = src.split_to(5);
            Some(StreamDependency::load(&raw))
        } else {
            None
        };

        let mut pseudo = Pseudo::default();
        let mut fields = HeaderMap::new();
        let mut err = false;

        macro_rules! set_pseudo {
            ($field:ident, $val:expr) => {{
                if pseudo.$field.is_some() {
                    err = true;
                } else {
                    pseudo.$field = Some($val);
                }
            }};
        }

        decoder
            .decode(&mut src, |header| match header {
                Header::Field { name: Some(name), value } => {
                    fields.append(name, value);
                }
                Header::Field { name: None, .. } => err = true,
                Header::Authority(v) => set_pseudo!(authority, v),
                Header::Method(v) => set_pseudo!(method, v),
                Header::Scheme(v) => set_pseudo!(scheme, v),
                Header::Path(v) => set_pseudo!(path, v),
                Header::Status(v) => set_pseudo!(status, v),
            })
            .map_err(Error::Hpack)?;

        if err {
            return Err(Error::Hpack(hpack::DecoderError::RepeatedPseudo));
        }

        Ok(Headers {
            stream_id: head.stream_id(),
            stream_dep,
            fields,
            pseudo,
            flags,
        })
    }

    pub fn into_response(self) -> http::Result<Response<()>> {
        let mut b = Response::builder();

        if let Some(status) = self.pseudo.status {
            b = b.status(status);
        }

        let mut response = b.body(())?;
        *response.headers_mut() = self.fields;

        Ok(response)
    }

    pub fn into_request(self) -> http::Result<Request<()>> {
        let mut b = Request::builder().version(http::Version::HTTP_2);

        if let Some(method) = self.pseudo.method {
            b = b.method(method);
        }

        let mut parts = http::uri::Builder::new();
        if let Some(scheme) = &self.pseudo.scheme {
            parts = parts.scheme(scheme.as_str());
        }
        if let Some(authority) = &self.pseudo.authority {
            parts = parts.authority(authority.as_str());
        }
        if let Some(path) = &self.pseudo.path {
            parts = parts.path_and_query(path.as_str());
        }
        if let Ok(uri) = parts.build() {
            b = b.uri(uri);
        }

        let mut request = b.body(())?;
        *request.headers_mut() = self.fields;

        Ok(request)
    }

    pub fn into_fields(self) -> HeaderMap {
        self.fields
    }

    fn head(&self) -> Head {
        Head::new(Kind::Headers, self.flags.into(), self.stream_id)
    }

    /// Encodes into `dst`, returning a `Continuation` carrying the overflow
    /// if the header block didn't fit.
    pub fn encode(self, encoder: &mut hpack::Encoder, dst: &mut BytesMut) -> Option<Continuation> {
        trace!("encoding HEADERS; stream_id={:?}", self.stream_id);

        let head = self.head();
        let pos = dst.len();
        head.encode(0, dst);

        if let Some(dep) = self.stream_dep {
            dep.encode(dst);
        }

        let mut headers = pseudo_then_fields(self.pseudo, self.fields);
        let mut iter = headers.drain(..).peekable();
        encoder.encode(&mut iter, dst);

        let len = dst.len() - pos - super::HEADER_LEN;
        patch_len(dst, pos, len);

        if headers.is_empty() {
            None
        } else {
            Some(Continuation { stream_id: self.stream_id, headers })
        }
    }
}

fn pseudo_then_fields(pseudo: Pseudo, fields: HeaderMap) -> Vec<Header> {
    let mut out = Vec::with_capacity(fields.len() + 5);

    if let Some(m) = pseudo.method {
        out.push(Header::Method(m));
    }
    if let Some(s) = pseudo.scheme {
        out.push(Header::Scheme(s));
    }
    if let Some(a) = pseudo.authority {
        out.push(Header::Authority(a));
    }
    if let Some(p) = pseudo.path {
        out.push(Header::Path(p));
    }
    if let Some(s) = pseudo.status {
        out.push(Header::Status(s));
    }

    for (name, value) in fields.iter() {
        out.push(Header::Field { name: Some(name.clone()), value: value.clone() });
    }

    out
}

impl From<Headers> for super::Frame {
    fn from(src: Headers) -> Self {
        super::Frame::Headers(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_request_splits_path_and_query() {
        let uri: Uri = "https://example.com/a/b?x=1".parse().unwrap();
        let pseudo = Pseudo::request(Method::GET, &uri);
        assert_eq!(pseudo.path.as_deref(), Some("/a/b?x=1"));
        assert_eq!(pseudo.scheme.as_deref(), Some("https"));
        assert_eq!(pseudo.authority.as_deref(), Some("example.com"));
    }

    #[test]
    fn pseudo_request_without_query_has_no_question_mark() {
        let uri: Uri = "https://example.com/a/b".parse().unwrap();
        let pseudo = Pseudo::request(Method::GET, &uri);
        assert_eq!(pseudo.path.as_deref(), Some("/a/b"));
    }

    #[test]
    fn pseudo_request_strips_default_port_but_keeps_non_default() {
        let https_default: Uri = "https://example.com:443/a".parse().unwrap();
        assert_eq!(Pseudo::request(Method::GET, &https_default).authority.as_deref(), Some("example.com"));

        let http_default: Uri = "http://example.com:80/a".parse().unwrap();
        assert_eq!(Pseudo::request(Method::GET, &http_default).authority.as_deref(), Some("example.com"));

        let non_default: Uri = "https://example.com:8443/a".parse().unwrap();
        assert_eq!(Pseudo::request(Method::GET, &non_default).authority.as_deref(), Some("example.com:8443"));
    }

    #[test]
    fn options_ping_sentinel_path_is_a_literal_asterisk() {
        let uri: Uri = Uri::from_static("*");
        let pseudo = Pseudo::request(Method::OPTIONS, &uri);
        assert_eq!(pseudo.path.as_deref(), Some("*"));
    }
}
