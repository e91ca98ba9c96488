//! Scripted artifact source

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::{Mutex, MutexGuard};

use crate::host::transport::{ArtifactResponse, ArtifactSource, TransportError};

#[derive(Debug, Clone)]
struct Served {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    /// Fail with an I/O error after `body` has been read
    break_after_body: bool,
}

#[derive(Debug, Default)]
struct SourceState {
    served: HashMap<String, Served>,
    fetched: Vec<String>,
}

/// In-process artifact source
#[derive(Debug, Default)]
pub struct MockArtifactSource {
    state: Mutex<SourceState>,
}

impl MockArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, url: &str, served: Served) -> &Self {
        self.lock().served.insert(url.to_string(), served);
        self
    }

    /// Serve `body` with `status` at `url`
    pub fn serve(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.insert(
            url,
            Served {
                status,
                headers: vec![("content-type".to_string(), "application/octet-stream".to_string())],
                body: body.into(),
                break_after_body: false,
            },
        )
    }

    /// Serve `partial` with status 200, then fail the stream
    pub fn serve_broken(&self, url: &str, partial: impl Into<Vec<u8>>) -> &Self {
        self.insert(
            url,
            Served {
                status: 200,
                headers: Vec::new(),
                body: partial.into(),
                break_after_body: true,
            },
        )
    }

    /// URLs fetched so far
    pub fn fetched(&self) -> Vec<String> {
        self.lock().fetched.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetched.len()
    }
}

impl ArtifactSource for MockArtifactSource {
    fn fetch(&self, url: &str) -> Result<ArtifactResponse, TransportError> {
        let mut state = self.lock();
        state.fetched.push(url.to_string());

        let served = state
            .served
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::ConnectionFailed(format!("nothing served at {}", url)))?;

        let body: Box<dyn Read + Send> = if served.break_after_body {
            Box::new(BrokenStream {
                data: Cursor::new(served.body),
            })
        } else {
            Box::new(Cursor::new(served.body))
        };

        Ok(ArtifactResponse {
            status: served.status,
            headers: served.headers,
            body,
        })
    }
}

/// Yields its data, then errors instead of signalling EOF
struct BrokenStream {
    data: Cursor<Vec<u8>>,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream interrupted"));
        }
        Ok(n)
    }
}
