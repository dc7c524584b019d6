//! Fake command server for tests
//!
//! Listens on an ephemeral localhost port and answers each request line
//! through a responder closure. Connections are served one at a time, which
//! matches the real server.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lvdac::Config;
use parking_lot::Mutex;

/// What the fake server does with one request
pub enum Reply {
    /// Send these chunks, flushing and pausing briefly between them
    Chunks(Vec<Vec<u8>>),

    /// Send these bytes, then close the connection
    CloseAfter(Vec<u8>),
}

impl Reply {
    /// A single-chunk reply with the standard terminator appended
    pub fn frame(payload: &str) -> Self {
        Reply::Chunks(vec![format!("{}\r\n\r\n", payload).into_bytes()])
    }
}

/// Shared observations of the fake server
#[derive(Default)]
struct Observed {
    requests: Mutex<Vec<String>>,
    connections: AtomicUsize,
    violations: AtomicUsize,
}

pub struct FakePeer {
    port: u16,
    observed: Arc<Observed>,
}

impl FakePeer {
    /// Start serving with `responder`
    pub fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let observed = Arc::new(Observed::default());
        let shared = Arc::clone(&observed);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                shared.connections.fetch_add(1, Ordering::SeqCst);
                serve(stream, &responder, &shared);
            }
        });

        Self { port, observed }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Config pointing at this server with test-friendly timeouts
    pub fn config(&self) -> Config {
        Config::builder()
            .host("127.0.0.1")
            .port(self.port)
            .connect_timeout_ms(2000)
            .read_timeout_ms(5000)
            .build()
    }

    /// Request lines received so far, without `\r\n`
    pub fn requests(&self) -> Vec<String> {
        self.observed.requests.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.observed.connections.load(Ordering::SeqCst)
    }

    /// Times a request arrived while another was still unanswered
    pub fn violations(&self) -> usize {
        self.observed.violations.load(Ordering::SeqCst)
    }
}

/// Command name of a request line
pub fn command_name(request: &str) -> &str {
    request.split('(').next().unwrap_or("")
}

/// Parameters of a request line
pub fn command_params(request: &str) -> Vec<String> {
    let inner = request
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .unwrap_or("");
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(", ").map(str::to_string).collect()
}

fn serve<F>(mut stream: TcpStream, responder: &F, observed: &Observed)
where
    F: Fn(&str) -> Reply,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        // Accumulate one request line
        let line_end = loop {
            if let Some(pos) = buffer.windows(2).position(|w| w == b"\r\n") {
                break pos;
            }
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            }
        };

        let request = String::from_utf8_lossy(&buffer[..line_end]).to_string();
        let leftover = buffer.len() > line_end + 2;
        buffer.drain(..line_end + 2);

        if leftover || sent_more_before_reply(&mut stream) {
            observed.violations.fetch_add(1, Ordering::SeqCst);
        }
        observed.requests.lock().push(request.clone());

        match responder(&request) {
            Reply::Chunks(chunks) => {
                for part in chunks {
                    if stream.write_all(&part).and_then(|_| stream.flush()).is_err() {
                        return;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
            Reply::CloseAfter(bytes) => {
                let _ = stream.write_all(&bytes);
                let _ = stream.flush();
                return;
            }
        }
    }
}

/// Whether the client wrote anything else while its request was pending
fn sent_more_before_reply(stream: &mut TcpStream) -> bool {
    thread::sleep(Duration::from_millis(10));
    if stream.set_nonblocking(true).is_err() {
        return false;
    }
    let mut probe = [0u8; 64];
    let extra = matches!(stream.peek(&mut probe), Ok(n) if n > 0);
    let _ = stream.set_nonblocking(false);
    extra
}
