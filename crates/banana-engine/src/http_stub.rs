//! One-shot HTTP responder for exercising the Gemini client over a real socket.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};

pub(crate) struct StubServer {
    pub base: String,
    handle: JoinHandle<Result<String>>,
}

impl StubServer {
    /// Answers the first connection with `status` and a JSON `body`.
    pub(crate) fn respond_once(status: &str, body: &str) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").context("bind stub listener")?;
        let base = format!("http://{}", listener.local_addr()?);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || -> Result<String> {
            let (stream, _) = listener.accept()?;
            let mut reader = BufReader::new(stream.try_clone()?);
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or_default();
                    }
                }
                head.push_str(&line);
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body)?;
            let mut stream = stream;
            stream.write_all(response.as_bytes())?;
            stream.flush()?;
            Ok(head)
        });
        Ok(Self { base, handle })
    }

    /// Request line and headers the client sent.
    pub(crate) fn request_head(self) -> Result<String> {
        self.handle
            .join()
            .map_err(|_| anyhow!("stub server thread panicked"))?
    }
}

/// An address nothing is listening on.
pub(crate) fn closed_base() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind stub listener")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}
