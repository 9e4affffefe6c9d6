//! Content types of static files.

use std::path::Path;

use mime::Mime;

/// Maps file extensions to content types and knows which of them are worth compressing.
///
/// Built once, then shared read-only by every connection.
#[derive(Debug, Clone)]
pub struct MimeTable {
    compressible: Vec<Mime>,
}

impl Default for MimeTable {
    fn default() -> Self {
        let mut compressible = vec![
            mime::APPLICATION_JAVASCRIPT,
            mime::APPLICATION_JSON,
            mime::IMAGE_SVG,
            mime::TEXT_XML,
        ];
        for extra in ["application/xml", "application/xhtml+xml", "application/rss+xml", "application/atom+xml", "application/wasm"] {
            if let Ok(mime) = extra.parse::<Mime>() {
                compressible.push(mime);
            }
        }
        Self { compressible }
    }
}

impl MimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The content type for `path` by extension, `application/octet-stream` when unknown.
    pub fn lookup(&self, path: &Path) -> Mime {
        mime_guess::from_path(path).first_or_octet_stream()
    }

    /// Whether responses of this type should be gzipped for clients that accept it.
    pub fn is_compressible(&self, mime: &Mime) -> bool {
        mime.type_() == mime::TEXT || self.compressible.iter().any(|candidate| essence_eq(candidate, mime))
    }

    /// The `Content-Type` header value: the bare type, parameters as guessed. No charset is added.
    pub fn content_type(&self, mime: &Mime) -> String {
        mime.to_string()
    }
}

fn essence_eq(a: &Mime, b: &Mime) -> bool {
    a.essence_str().eq_ignore_ascii_case(b.essence_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_extension() {
        let table = MimeTable::new();
        assert_eq!(table.lookup(Path::new("app.css")).essence_str(), "text/css");
        assert_eq!(table.lookup(Path::new("index.HTML")).essence_str(), "text/html");
        assert_eq!(table.lookup(Path::new("photo.png")).essence_str(), "image/png");
        assert_eq!(table.lookup(Path::new("archive.unknownext")), mime::APPLICATION_OCTET_STREAM);
        assert_eq!(table.lookup(Path::new("LICENSE")), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn compressible_types() {
        let table = MimeTable::new();
        assert!(table.is_compressible(&mime::TEXT_CSS));
        assert!(table.is_compressible(&"text/x-custom".parse().unwrap()));
        assert!(table.is_compressible(&mime::APPLICATION_JSON));
        assert!(table.is_compressible(&mime::IMAGE_SVG));
        assert!(table.is_compressible(&"application/wasm".parse().unwrap()));
        assert!(!table.is_compressible(&mime::IMAGE_PNG));
        assert!(!table.is_compressible(&mime::APPLICATION_OCTET_STREAM));
    }

    #[test]
    fn content_type_is_the_bare_type() {
        let table = MimeTable::new();
        assert_eq!(table.content_type(&table.lookup(Path::new("app.css"))), "text/css");
        assert_eq!(table.content_type(&table.lookup(Path::new("index.html"))), "text/html");
        assert_eq!(table.content_type(&mime::IMAGE_PNG), "image/png");
    }
}
