use http::{HeaderName, HeaderValue, Method, StatusCode};

/// A single decoded HPACK field, already split into pseudo-headers vs.
/// regular fields the way the frame layer wants them.
#[derive(Debug)]
pub enum Header {
    Field { name: Option<HeaderName>, value: HeaderValue },
    Authority(String),
    Method(Method),
    Scheme(String),
    Path(String),
    Status(StatusCode),
}

impl Header {
    pub fn name_str(&self) -> &str {
        match self {
            Header::Field { name: Some(name), .. } => name.as_str(),
            Header::Field { name: None, .. } => "",
            Header::Authority(_) => ":authority",
            Header::Method(_) => ":method",
            Header::Scheme(_) => ":scheme",
            Header::Path(_) => ":path",
            Header::Status(_) => ":status",
        }
    }

    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        use std::borrow::Cow;
        match self {
            Header::Field { value, .. } => String::from_utf8_lossy(value.as_bytes()),
            Header::Authority(v) | Header::Scheme(v) | Header::Path(v) => Cow::Borrowed(v.as_str()),
            Header::Method(m) => Cow::Borrowed(m.as_str()),
            Header::Status(s) => Cow::Owned(s.as_str().to_string()),
        }
    }

    pub fn is_pseudo(&self) -> bool {
        !matches!(self, Header::Field { .. })
    }
}
