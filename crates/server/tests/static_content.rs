mod common;

use std::io::{Read, Write};
use std::time::{Duration, SystemTime};

use common::{Response, TestDir, TestServer};
use flate2::read::GzDecoder;
use portico::Server;

const INDEX: &str = "<html><body>hello portico</body></html>";

fn site() -> TestDir {
    let dir = TestDir::new("static");
    dir.write("public/index.html", INDEX);
    dir.write("public/css/site.css", "body { color: black; }\n".repeat(64));
    dir.write("public/digits.txt", "0123456789");
    dir.write("public/empty.txt", "");
    dir.write("secret.txt", "top secret");
    dir
}

fn serve(dir: &TestDir) -> TestServer {
    TestServer::start(Server::builder().static_route("^/", dir.path().join("public")))
}

fn get(path: &str, extra: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n{extra}Connection: close\r\n\r\n")
}

#[test]
fn serves_a_file() {
    let dir = site();
    let server = serve(&dir);

    let response = server.request(&get("/index.html", ""));
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), INDEX);
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert_eq!(response.header("content-length"), Some(INDEX.len().to_string().as_str()));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("connection"), Some("close"));
    assert!(response.header("last-modified").is_some());
    assert!(response.header("date").is_some());
    assert!(response.header("server").unwrap().starts_with("portico/"));
}

#[test]
fn decodes_percent_encoded_paths() {
    let dir = site();
    dir.write("public/with space.txt", "spaced");
    let server = serve(&dir);

    let response = server.request(&get("/with%20space.txt", ""));
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "spaced");
}

#[test]
fn serves_the_directory_index() {
    let dir = site();
    let server = serve(&dir);

    let response = server.request(&get("/", ""));
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), INDEX);
}

#[test]
fn serves_empty_files() {
    let dir = site();
    let server = serve(&dir);

    let response = server.request(&get("/empty.txt", ""));
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-length"), Some("0"));
    assert!(response.body.is_empty());
}

#[test]
fn keeps_the_connection_alive() {
    let dir = site();
    let server = serve(&dir);

    let mut stream = server.connect();
    let requests = format!("GET /digits.txt HTTP/1.1\r\nHost: localhost\r\n\r\n{}", get("/digits.txt", ""));
    stream.write_all(requests.as_bytes()).unwrap();
    let mut received = Vec::new();
    stream.read_to_end(&mut received).unwrap();

    let text = String::from_utf8(received).unwrap();
    assert_eq!(text.matches("HTTP/1.1 200 OK\r\n").count(), 2);
    assert_eq!(text.matches("0123456789").count(), 2);
}

#[test]
fn closes_http_10_connections() {
    let dir = site();
    let server = serve(&dir);

    // no Connection header, the server must still close after the response
    let response = Response::parse(&server.exchange("GET /digits.txt HTTP/1.0\r\n\r\n"));
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "0123456789");
}

#[test]
fn missing_files_and_directories_are_not_found() {
    let dir = site();
    let server = serve(&dir);

    for path in ["/missing.html", "/css", "/css/", "/digits.txt/"] {
        let response = server.request(&get(path, ""));
        assert_eq!(response.status, 404, "{path}");
        assert_eq!(response.text(), "Error 404: Requested content not found!");
    }
}

#[test]
fn paths_cannot_escape_the_content_directory() {
    let dir = site();
    let server = serve(&dir);

    for path in ["/../secret.txt", "/%2e%2e/secret.txt", "/css/../../secret.txt", "/..%2Fsecret.txt"] {
        let response = server.request(&get(path, ""));
        assert_eq!(response.status, 404, "{path}");
        assert!(!response.text().contains("top secret"));
    }
}

#[cfg(unix)]
#[test]
fn symlinks_cannot_escape_the_content_directory() {
    let dir = site();
    std::os::unix::fs::symlink(dir.path().join("secret.txt"), dir.path().join("public/link.txt")).unwrap();
    let server = serve(&dir);

    let response = server.request(&get("/link.txt", ""));
    assert_eq!(response.status, 404);
}

#[test]
fn invalid_content_directory_is_a_server_error() {
    let dir = site();
    let server = TestServer::start(Server::builder().static_route("^/", dir.path().join("nowhere")));

    let response = server.request(&get("/index.html", ""));
    assert_eq!(response.status, 500);
    assert_eq!(response.text(), "Error 500: Internal server error! Invalid content directory.");
}

#[test]
fn routes_match_case_insensitively_and_strip_the_prefix() {
    let dir = site();
    let server = TestServer::start(Server::builder().static_route("^/STATIC/", dir.path().join("public")));

    let response = server.request(&get("/static/digits.txt", ""));
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "0123456789");
}

#[test]
fn compresses_compressible_content() {
    let dir = site();
    let server = serve(&dir);
    let original = std::fs::read(dir.path().join("public/css/site.css")).unwrap();

    let response = server.request(&get("/css/site.css", "Accept-Encoding: deflate, gzip\r\n"));
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-encoding"), Some("gzip"));
    assert_eq!(response.header("content-type"), Some("text/css"));
    assert_eq!(response.header("content-length"), Some(response.body.len().to_string().as_str()));

    let mut decoded = Vec::new();
    GzDecoder::new(&response.body[..]).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn skips_compression_when_not_accepted_or_disabled() {
    let dir = site();
    let server = serve(&dir);
    let response = server.request(&get("/css/site.css", ""));
    assert_eq!(response.header("content-encoding"), None);

    let server = TestServer::start(Server::builder().use_gzip(false).static_route("^/", dir.path().join("public")));
    let response = server.request(&get("/css/site.css", "Accept-Encoding: gzip\r\n"));
    assert_eq!(response.header("content-encoding"), None);
    assert_eq!(response.body, std::fs::read(dir.path().join("public/css/site.css")).unwrap());
}

#[test]
fn serves_byte_ranges() {
    let dir = site();
    let server = serve(&dir);

    let response = server.request(&get("/digits.txt", "Range: bytes=2-5\r\n"));
    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-range"), Some("bytes 2-5/10"));
    assert_eq!(response.header("content-length"), Some("4"));
    assert_eq!(response.text(), "2345");

    let response = server.request(&get("/digits.txt", "Range: bytes=7-\r\n"));
    assert_eq!(response.status, 206);
    assert_eq!(response.text(), "789");

    // the whole file is an ordinary 200
    let response = server.request(&get("/digits.txt", "Range: bytes=0-9\r\n"));
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-range"), None);
    assert_eq!(response.text(), "0123456789");
}

#[test]
fn rejects_unsatisfiable_ranges() {
    let dir = site();
    let server = serve(&dir);

    for range in ["bytes=5-2", "bytes=3-10", "bytes=0-1,4-5", "lines=1-2", "bytes=-"] {
        let response = server.request(&get("/digits.txt", &format!("Range: {range}\r\n")));
        assert_eq!(response.status, 416, "{range}");
        assert_eq!(response.header("content-range"), Some("bytes */10"), "{range}");
        assert!(response.body.is_empty(), "{range}");
    }
}

#[test]
fn answers_not_modified() {
    let dir = site();
    let server = serve(&dir);

    let later = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(3600));
    let response = server.request(&get("/index.html", &format!("If-Modified-Since: {later}\r\n")));
    assert_eq!(response.status, 304);
    assert!(response.body.is_empty());
    assert!(response.header("last-modified").is_some());
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("cache-control"), Some("max-age=3600"));

    let earlier = httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400));
    let response = server.request(&get("/index.html", &format!("If-Modified-Since: {earlier}\r\n")));
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), INDEX);
}

#[test]
fn head_sends_headers_only() {
    let dir = site();
    let server = serve(&dir);

    let raw = server.exchange("HEAD /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    let response = Response::parse(&raw);
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-length"), Some(INDEX.len().to_string().as_str()));
    assert!(response.body.is_empty());
}

#[test]
fn other_methods_are_not_allowed() {
    let dir = site();
    let server = serve(&dir);

    let raw = "POST /index.html HTTP/1.1\r\nHost: localhost\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc";
    let response = server.request(raw);
    assert_eq!(response.status, 405);
    assert_eq!(response.header("allow"), Some("GET, HEAD"));
    assert_eq!(response.text(), "405 Method Not Allowed");
}

#[test]
fn first_matching_route_wins() {
    let dir = site();
    dir.write("other/digits.txt", "abcdefghij");
    let server = TestServer::start(
        Server::builder().static_route("^/files/", dir.path().join("other")).static_route("^/", dir.path().join("public")),
    );

    assert_eq!(server.request(&get("/files/digits.txt", "")).text(), "abcdefghij");
    assert_eq!(server.request(&get("/digits.txt", "")).text(), "0123456789");
}
