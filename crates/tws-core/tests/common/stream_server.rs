//! Minimal HTTP/1.1 server that streams newline-delimited lines for integration tests.
//!
//! Answers every request with the configured status. For 200 it writes the
//! configured lines and then keeps the connection open, sending a `\r\n`
//! keep-alive periodically until the client goes away.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StreamServerOptions {
    pub status: u16,
    pub lines: Vec<String>,
    pub keep_alive_every: Duration,
}

impl Default for StreamServerOptions {
    fn default() -> Self {
        Self {
            status: 200,
            lines: Vec::new(),
            keep_alive_every: Duration::from_millis(200),
        }
    }
}

pub struct StreamServer {
    /// Base endpoint, e.g. "http://127.0.0.1:12345/2/tweets/search".
    pub endpoint: String,
    /// Raw request heads received so far.
    pub requests: Arc<Mutex<Vec<String>>>,
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(opts: StreamServerOptions) -> StreamServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let opts = opts.clone();
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &opts, &seen));
        }
    });
    StreamServer {
        endpoint: format!("http://127.0.0.1:{}/2/tweets/search", port),
        requests,
    }
}

/// An endpoint on a port nothing listens on.
pub fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/2/tweets/search", port)
}

fn handle(mut stream: TcpStream, opts: &StreamServerOptions, seen: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    seen.lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf[..n]).into_owned());

    if opts.status != 200 {
        let response = format!(
            "HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            opts.status
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n";
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for line in &opts.lines {
        if stream.write_all(format!("{}\r\n", line).as_bytes()).is_err() {
            return;
        }
    }
    loop {
        thread::sleep(opts.keep_alive_every);
        if stream.write_all(b"\r\n").is_err() || stream.flush().is_err() {
            return;
        }
    }
}
