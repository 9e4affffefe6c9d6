//! HTTP response header handling implementation.
//!
//! A [`ResponseHead`] is the status line plus the ordered header list of a response that has
//! not been written yet. Unlike `http::HeaderMap`, headers keep their emission order.

use std::borrow::Cow;

use http::{HeaderName, HeaderValue, StatusCode, Version};

#[derive(Debug, Clone)]
pub struct ResponseHead {
    version: Version,
    status: StatusCode,
    reason: Cow<'static, str>,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseHead {
    /// A head with the canonical reason phrase of `status`.
    pub fn new(status: StatusCode) -> Self {
        Self::with_reason(status, status.canonical_reason().unwrap_or("Unknown"))
    }

    /// A head with a caller supplied reason phrase, as handed over by application handlers.
    pub fn with_reason(status: StatusCode, reason: impl Into<Cow<'static, str>>) -> Self {
        Self { version: Version::HTTP_11, status, reason: reason.into(), headers: Vec::new() }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Replaces the status, resetting the reason phrase to the canonical one.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.reason = Cow::Borrowed(status.canonical_reason().unwrap_or("Unknown"));
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// Appends a header, keeping any earlier header with the same name.
    pub fn append(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.push((name, value));
        self
    }

    /// Replaces every header named `name` with a single value placed at the end.
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.remove(&name);
        self.headers.push((name, value));
        self
    }

    pub fn remove(&mut self, name: &HeaderName) {
        self.headers.retain(|(existing, _)| existing != name);
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.iter().find(|(existing, _)| existing == name).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.get(name).is_some()
    }

    /// The `Content-Length` the head declares, if any and if parseable.
    pub fn content_length(&self) -> Option<u64> {
        self.get(&http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};

    #[test]
    fn keeps_emission_order_and_duplicates() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.append(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .append(SET_COOKIE, HeaderValue::from_static("a=1"))
            .append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let names: Vec<_> = head.headers().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["content-type", "set-cookie", "set-cookie"]);
        assert_eq!(head.reason(), "OK");
    }

    #[test]
    fn insert_replaces_existing_values() {
        let mut head = ResponseHead::with_reason(StatusCode::NOT_FOUND, "Nope");
        head.append(CONTENT_LENGTH, HeaderValue::from_static("10"));
        head.insert(CONTENT_LENGTH, HeaderValue::from(3u64));

        assert_eq!(head.headers().len(), 1);
        assert_eq!(head.content_length(), Some(3));
        assert_eq!(head.reason(), "Nope");
    }

    #[test]
    fn set_status_resets_reason() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.append(CONTENT_TYPE, HeaderValue::from_static("text/css"));
        head.set_status(StatusCode::PARTIAL_CONTENT);

        assert_eq!(head.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(head.reason(), "Partial Content");
        assert_eq!(head.headers().len(), 1);
    }
}
