// src/reload/server.rs

//! Minimal HTTP/1.1 front for the browser.
//!
//! Only the request head is parsed. `GET /__wpwatch/events` becomes a
//! Server-Sent-Events stream fed by the [`ClientRegistry`], `GET
//! /__wpwatch/client.js` serves the browser script, and every other request is
//! forwarded to the upstream site with its `Host` header rewritten. Upstream
//! HTML gets the client script tag inserted before `</body>`; every other
//! response is relayed byte-for-byte.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::{ClientRegistry, Upstream};

pub const EVENTS_PATH: &str = "/__wpwatch/events";
pub const CLIENT_PATH: &str = "/__wpwatch/client.js";

const CLIENT_JS: &str = include_str!("client.js");
const MAX_HEAD: usize = 16 * 1024;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// `<script>` tag loading the client from `origin` (empty for same-origin).
pub fn client_tag(origin: &str) -> String {
    format!("<script async src=\"{origin}{CLIENT_PATH}\"></script>")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Events,
    Client,
    Upstream,
}

/// Parsed request line plus where the head ends in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestHead {
    method: String,
    path: String,
    head_len: usize,
}

impl RequestHead {
    fn parse(buf: &[u8]) -> Option<Self> {
        let head_len = find_head_end(buf)?;
        let head = std::str::from_utf8(&buf[..head_len]).ok()?;
        let mut parts = head.lines().next()?.split_whitespace();
        let method = parts.next()?.to_string();
        let path = parts.next()?.to_string();
        Some(Self {
            method,
            path,
            head_len,
        })
    }

    fn route(&self) -> Route {
        let path = self.path.split('?').next().unwrap_or_default();
        match (self.method.as_str(), path) {
            ("GET", EVENTS_PATH) => Route::Events,
            ("GET", CLIENT_PATH) => Route::Client,
            _ => Route::Upstream,
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Rewrite `Host` for the upstream and ask it to close after one response,
/// so follow-up requests from the browser come back through the router.
/// `Accept-Encoding` is dropped so HTML arrives uncompressed.
fn rewrite_head(head: &str, upstream: &Upstream) -> String {
    let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
    let mut out = String::with_capacity(head.len() + 32);
    if let Some(request_line) = lines.next() {
        out.push_str(request_line);
        out.push_str("\r\n");
    }
    for line in lines {
        let name = line.split(':').next().unwrap_or_default().trim();
        if ["host", "connection", "keep-alive", "proxy-connection", "accept-encoding"]
            .iter()
            .any(|h| name.eq_ignore_ascii_case(h))
        {
            continue;
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(&format!("Host: {}\r\nConnection: close\r\n\r\n", upstream.host_header()));
    out
}

/// Accepts browser connections for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct ReloadServer {
    registry: Arc<ClientRegistry>,
    upstream: Option<Upstream>,
}

impl ReloadServer {
    pub fn new(registry: Arc<ClientRegistry>, upstream: Option<Upstream>) -> Self {
        Self { registry, upstream }
    }

    /// Accept connections until the task is dropped or aborted.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("reading listener address")?;
        match &self.upstream {
            Some(upstream) => info!(%addr, %upstream, "reload server listening; proxying upstream"),
            None => info!(%addr, "reload server listening; no project_url, reload endpoints only"),
        }
        self.accept_loop(listener).await;
        Ok(())
    }

    /// Accept errors are logged and retried; the loop only ends with the task.
    async fn accept_loop<I: Incoming + Send>(self, mut incoming: I) {
        loop {
            let (stream, peer) = match incoming.next_conn().await {
                Ok(conn) => conn,
                Err(err) if is_connection_error(&err) => {
                    debug!(error = %err, "connection dropped while accepting");
                    continue;
                }
                Err(err) => {
                    // Typically descriptor exhaustion; give in-flight connections time to close.
                    warn!(error = %err, "accepting connection failed; retrying");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(err) = server.handle(stream).await {
                    debug!(%peer, error = %format!("{err:#}"), "connection closed with error");
                }
            });
        }
    }

    async fn handle(&self, mut stream: TcpStream) -> Result<()> {
        let buf = read_head(&mut stream).await?;
        let Some(request) = RequestHead::parse(&buf) else {
            return respond(&mut stream, "400 Bad Request", "text/plain", b"bad request").await;
        };
        debug!(method = %request.method, path = %request.path, "request");

        match request.route() {
            Route::Events => self.stream_events(stream).await,
            Route::Client => {
                respond(
                    &mut stream,
                    "200 OK",
                    "application/javascript; charset=utf-8",
                    CLIENT_JS.as_bytes(),
                )
                .await
            }
            Route::Upstream => self.tunnel(stream, buf, request.head_len).await,
        }
    }

    async fn stream_events(&self, mut stream: TcpStream) -> Result<()> {
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  Content-Type: text/event-stream\r\n\
                  Cache-Control: no-cache\r\n\
                  Connection: keep-alive\r\n\
                  Access-Control-Allow-Origin: *\r\n\r\n\
                  : connected\n\n",
            )
            .await
            .context("writing event stream head")?;

        let (id, mut rx) = self.registry.connect();
        let (mut reader, mut writer) = stream.split();
        let mut scratch = [0u8; 512];

        let outcome: Result<()> = loop {
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else { break Ok(()) };
                    if let Err(err) = writer.write_all(message.to_sse().as_bytes()).await {
                        break Err(err.into());
                    }
                }
                read = reader.read(&mut scratch) => {
                    // Browsers never send on this stream; EOF means they left.
                    match read {
                        Ok(0) => break Ok(()),
                        Ok(_) => continue,
                        Err(err) => break Err(err.into()),
                    }
                }
            }
        };

        self.registry.disconnect(id);
        outcome
    }

    async fn tunnel(&self, mut client: TcpStream, buf: Vec<u8>, head_len: usize) -> Result<()> {
        let Some(upstream) = &self.upstream else {
            return respond(
                &mut client,
                "502 Bad Gateway",
                "text/plain",
                b"wpwatch: no project_url configured; only /__wpwatch/* is served",
            )
            .await;
        };

        let mut server = match TcpStream::connect(upstream.addr()).await {
            Ok(s) => s,
            Err(err) => {
                warn!(%upstream, error = %err, "upstream unreachable");
                let body = format!("wpwatch: cannot reach {upstream}: {err}");
                return respond(&mut client, "502 Bad Gateway", "text/plain", body.as_bytes()).await;
            }
        };

        let head = std::str::from_utf8(&buf[..head_len]).context("request head is not UTF-8")?;
        server
            .write_all(rewrite_head(head, upstream).as_bytes())
            .await
            .context("forwarding request head")?;
        server
            .write_all(&buf[head_len..])
            .await
            .context("forwarding request body")?;

        let (mut client_rd, mut client_wr) = client.split();
        let (mut server_rd, mut server_wr) = server.split();
        let upload = async {
            if let Err(err) = tokio::io::copy(&mut client_rd, &mut server_wr).await {
                debug!(error = %err, "request upload ended");
            }
            std::future::pending::<()>().await
        };

        tokio::select! {
            relayed = relay_response(&mut server_rd, &mut client_wr) => relayed,
            () = upload => Ok(()),
        }
    }
}

/// Where the reload server gets its connections from.
pub(crate) trait Incoming {
    fn next_conn(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Incoming for TcpListener {
    fn next_conn(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        self.accept()
    }
}

/// Errors that concern only the connection being accepted.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Response head as sent by the upstream.
struct ResponseHead<'a>(&'a str);

impl ResponseHead<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.0.split("\r\n").skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    /// Plain HTML the client tag can be spliced into.
    fn is_injectable(&self) -> bool {
        let html = self
            .header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));
        let plain = self
            .header("content-encoding")
            .is_none_or(|enc| enc.eq_ignore_ascii_case("identity"));
        html && plain
    }

    fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
    }

    fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.parse().ok()
    }

    /// Same head with the framing replaced for a body of `len` bytes.
    fn with_length(&self, len: usize) -> String {
        let mut out = String::with_capacity(self.0.len() + 32);
        for line in self.0.split("\r\n").filter(|l| !l.is_empty()) {
            let name = line.split(':').next().unwrap_or_default().trim();
            if ["content-length", "transfer-encoding", "connection", "keep-alive"]
                .iter()
                .any(|h| name.eq_ignore_ascii_case(h))
            {
                continue;
            }
            out.push_str(line);
            out.push_str("\r\n");
        }
        out.push_str(&format!("Content-Length: {len}\r\nConnection: close\r\n\r\n"));
        out
    }
}

/// Relay one upstream response to the browser, injecting the client tag
/// into HTML pages.
async fn relay_response<R, W>(upstream: &mut R, client: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let head_len = loop {
        if let Some(end) = find_head_end(&raw) {
            break end;
        }
        let n = upstream.read(&mut chunk).await.context("reading upstream response")?;
        if n == 0 || raw.len() > MAX_HEAD {
            raw.extend_from_slice(&chunk[..n]);
            return pass_through(&raw, upstream, client).await;
        }
        raw.extend_from_slice(&chunk[..n]);
    };

    let head_text = match std::str::from_utf8(&raw[..head_len]) {
        Ok(text) => text.to_owned(),
        Err(_) => return pass_through(&raw, upstream, client).await,
    };
    let head = ResponseHead(&head_text);
    if !head.is_injectable() {
        return pass_through(&raw, upstream, client).await;
    }

    // Upstream was asked to close, so the body ends at EOF.
    upstream
        .read_to_end(&mut raw)
        .await
        .context("reading upstream body")?;
    let body = &raw[head_len..];
    let body = if head.is_chunked() {
        decode_chunked(body)
    } else {
        let len = head.content_length().unwrap_or(body.len()).min(body.len());
        Some(body[..len].to_vec())
    };
    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => return pass_through(&raw, upstream, client).await,
    };

    let body = inject_client_tag(&body);
    client
        .write_all(head.with_length(body.len()).as_bytes())
        .await
        .context("writing response head")?;
    client.write_all(&body).await.context("writing response body")?;
    client.shutdown().await.context("closing response")?;
    Ok(())
}

async fn pass_through<R, W>(already: &[u8], upstream: &mut R, client: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    client.write_all(already).await.context("relaying response")?;
    tokio::io::copy(upstream, client)
        .await
        .context("relaying response")?;
    client.shutdown().await.context("closing response")?;
    Ok(())
}

/// Decode a complete `Transfer-Encoding: chunked` body. Trailers are dropped.
fn decode_chunked(mut raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    loop {
        let line_end = raw.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&raw[..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        raw = &raw[line_end + 2..];
        if size == 0 {
            return Some(out);
        }
        out.extend_from_slice(raw.get(..size)?);
        raw = raw.get(size + 2..)?;
    }
}

/// Insert the client tag before the last `</body>`, or append it. Pages
/// that already load the client are left alone.
fn inject_client_tag(body: &[u8]) -> Vec<u8> {
    if body.windows(CLIENT_PATH.len()).any(|w| w == CLIENT_PATH.as_bytes()) {
        return body.to_vec();
    }
    let lower = body.to_ascii_lowercase();
    let at = lower
        .windows(7)
        .rposition(|w| w == b"</body>")
        .unwrap_or(body.len());
    let tag = client_tag("");
    let mut out = Vec::with_capacity(body.len() + tag.len());
    out.extend_from_slice(&body[..at]);
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&body[at..]);
    out
}

async fn read_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.context("reading request")?;
        if n == 0 {
            bail!("connection closed before the request head ended");
        }
        buf.extend_from_slice(&chunk[..n]);
        if find_head_end(&buf).is_some() {
            return Ok(buf);
        }
        if buf.len() > MAX_HEAD {
            bail!("request head exceeds {MAX_HEAD} bytes");
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) -> Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_path_ignoring_query() {
        let head = RequestHead::parse(b"GET /__wpwatch/events?x=1 HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
        assert_eq!(head.route(), Route::Events);
        let head = RequestHead::parse(b"GET /__wpwatch/client.js HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.route(), Route::Client);
        let head = RequestHead::parse(b"POST /__wpwatch/events HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.route(), Route::Upstream);
        assert!(RequestHead::parse(b"GET / HTTP/1.1\r\n").is_none());
    }

    #[test]
    fn head_rewrite_replaces_host_and_connection() {
        let upstream = Upstream::parse("http://mytheme.local").unwrap();
        let out = rewrite_head(
            "GET /about/ HTTP/1.1\r\nHost: localhost:3000\r\nAccept: text/html\r\nAccept-Encoding: gzip, br\r\nConnection: keep-alive\r\n\r\n",
            &upstream,
        );
        assert_eq!(
            out,
            "GET /about/ HTTP/1.1\r\nAccept: text/html\r\nHost: mytheme.local\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn client_tag_goes_before_the_last_closing_body() {
        let page = b"<html><BODY><p>&lt;/body&gt;</p></Body></html>";
        let out = String::from_utf8(inject_client_tag(page)).unwrap();
        assert_eq!(
            out,
            "<html><BODY><p>&lt;/body&gt;</p><script async src=\"/__wpwatch/client.js\"></script></Body></html>"
        );

        let fragment = String::from_utf8(inject_client_tag(b"<p>hi</p>")).unwrap();
        assert!(fragment.ends_with(&client_tag("")));
        assert_eq!(inject_client_tag(out.as_bytes()), out.as_bytes());
    }

    #[test]
    fn chunked_bodies_are_decoded() {
        assert_eq!(
            decode_chunked(b"5;ext=1\r\nhello\r\n7\r\n, world\r\n0\r\nX-Trailer: 1\r\n\r\n").unwrap(),
            b"hello, world"
        );
        assert!(decode_chunked(b"5\r\nhel").is_none());
    }

    #[tokio::test]
    async fn html_responses_get_the_client_tag_and_a_new_length() {
        let mut upstream: &[u8] =
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=UTF-8\r\nTransfer-Encoding: chunked\r\n\r\nd\r\n<body></body>\r\n0\r\n\r\n";
        let mut client = Vec::new();
        relay_response(&mut upstream, &mut client).await.unwrap();

        let body = format!("<body>{}</body>", client_tag(""));
        let expected = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        assert_eq!(String::from_utf8(client).unwrap(), expected);
    }

    #[tokio::test]
    async fn other_responses_are_relayed_untouched() {
        let response: &[u8] =
            b"HTTP/1.1 200 OK\r\nContent-Type: text/css\r\nContent-Length: 14\r\n\r\nbody{margin:0}";
        let mut upstream = response;
        let mut client = Vec::new();
        relay_response(&mut upstream, &mut client).await.unwrap();
        assert_eq!(client, response);

        let gzipped: &[u8] =
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Encoding: gzip\r\n\r\n\x1f\x8b";
        let mut upstream = gzipped;
        let mut client = Vec::new();
        relay_response(&mut upstream, &mut client).await.unwrap();
        assert_eq!(client, gzipped);
    }

    /// Fails a scripted number of accepts before handing out real connections.
    struct FlakyListener {
        errors: Vec<io::Error>,
        listener: TcpListener,
    }

    impl Incoming for FlakyListener {
        fn next_conn(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
            let failure = self.errors.pop();
            let listener = &self.listener;
            async move {
                match failure {
                    Some(err) => Err(err),
                    None => listener.accept().await,
                }
            }
        }
    }

    #[tokio::test]
    async fn accept_errors_do_not_stop_the_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let flaky = FlakyListener {
            errors: vec![
                io::Error::from(io::ErrorKind::ConnectionAborted),
                io::Error::other("too many open files"),
            ],
            listener,
        };
        let server = ReloadServer::new(Arc::new(ClientRegistry::new()), None);
        let task = tokio::spawn(server.accept_loop(flaky));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /__wpwatch/client.js HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(!task.is_finished());
        task.abort();
    }
}
