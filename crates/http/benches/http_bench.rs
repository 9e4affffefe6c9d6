use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{HeaderValue, StatusCode, header};
use portico_http::codec::{RequestDecoder, ResponseEncoder};
use portico_http::connection::{ConnectionConfig, HttpConnection, ResponseWriter};
use portico_http::handler::Handler;
use portico_http::protocol::{HttpError, Message, PayloadSize, PeerInfo, Request, ResponseHead};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Decoder, Encoder};

const SIMPLE_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

const BROWSER_REQUEST: &[u8] = b"GET /static/css/site.css?v=42 HTTP/1.1\r\n\
Host: localhost:8000\r\n\
User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0\r\n\
Accept: text/css,*/*;q=0.1\r\n\
Accept-Language: en-US,en;q=0.5\r\n\
Accept-Encoding: gzip, deflate, br\r\n\
Connection: keep-alive\r\n\
Referer: http://localhost:8000/\r\n\
If-Modified-Since: Tue, 15 Nov 1994 08:12:31 GMT\r\n\
Cache-Control: max-age=0\r\n\r\n";

struct HelloWorld;

#[async_trait]
impl Handler for HelloWorld {
    async fn call(&self, _request: &mut Request<'_>, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
        writer.send_response(ResponseHead::new(StatusCode::OK), Bytes::from_static(b"Hello World!")).await?;
        Ok(())
    }
}

fn bench_request_decoder(c: &mut Criterion) {
    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(SIMPLE_REQUEST);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });

    c.bench_function("decode_browser_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(BROWSER_REQUEST);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let mut head = ResponseHead::new(StatusCode::OK);
            head.append(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            let message = Message::<_, Bytes>::Header((head, PayloadSize::Length(12)));
            encoder.encode(message, &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let handler = Arc::new(HelloWorld);
    let mut request = SIMPLE_REQUEST.to_vec();
    request.extend_from_slice(b"GET /close HTTP/1.1\r\nConnection: close\r\n\r\n");

    c.bench_function("process_keep_alive_pair", |b| {
        b.to_async(&runtime).iter(|| {
            let handler = handler.clone();
            let request = request.clone();
            async move {
                let (mut client, server) = tokio::io::duplex(16 * 1024);
                client.write_all(&request).await.unwrap();
                let (reader, writer) = tokio::io::split(server);
                let connection = HttpConnection::new(reader, writer, PeerInfo::default(), ConnectionConfig::default());
                black_box(connection.process(handler).await.unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_http_connection);
criterion_main!(benches);
