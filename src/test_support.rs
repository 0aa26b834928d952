//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest, StreamingResponse};

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

enum TextReply {
    Body(String),
    Status(u16),
    Unreachable,
}

struct StreamReply {
    status: u16,
    chunks: Vec<Vec<u8>>,
    break_after: bool,
}

/// [`HttpClient`] answering from a script and recording every request.
#[derive(Default)]
pub struct FakeHttp {
    texts: Mutex<HashMap<String, TextReply>>,
    streams: Mutex<VecDeque<StreamReply>>,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<HttpRequest>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: &str, body: impl Into<String>) -> Self {
        self.texts
            .lock()
            .insert(url.to_string(), TextReply::Body(body.into()));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.texts
            .lock()
            .insert(url.to_string(), TextReply::Status(status));
        self
    }

    pub fn with_unreachable(self, url: &str) -> Self {
        self.texts
            .lock()
            .insert(url.to_string(), TextReply::Unreachable);
        self
    }

    /// Queue a streamed POST reply delivered as the given reads.
    pub fn push_stream(&self, status: u16, reads: &[&str]) {
        self.push(status, reads, false);
    }

    /// Queue a streamed reply whose connection drops after the given reads.
    pub fn push_broken_stream(&self, reads: &[&str]) {
        self.push(200, reads, true);
    }

    fn push(&self, status: u16, reads: &[&str], break_after: bool) {
        self.streams.lock().push_back(StreamReply {
            status,
            chunks: reads.iter().map(|r| r.as_bytes().to_vec()).collect(),
            break_after,
        });
    }

    pub fn get_count(&self, url: &str) -> usize {
        self.gets.lock().iter().filter(|u| *u == url).count()
    }

    pub fn total_gets(&self) -> usize {
        self.gets.lock().len()
    }

    pub fn posts(&self) -> Vec<HttpRequest> {
        self.posts.lock().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.gets.lock().push(url.to_string());
        match self.texts.lock().get(url) {
            Some(TextReply::Body(body)) => Ok(body.clone()),
            Some(TextReply::Status(status)) => Err(Error::Fetch {
                url: url.to_string(),
                status: Some(*status),
                reason: format!("HTTP {status}"),
            }),
            Some(TextReply::Unreachable) => Err(Error::fetch(url, "connection refused")),
            None => Err(Error::Fetch {
                url: url.to_string(),
                status: Some(404),
                reason: "HTTP 404".into(),
            }),
        }
    }

    async fn post_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let url = request.url.clone();
        self.posts.lock().push(request);
        let reply = self
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| Error::fetch(&url, "no scripted reply"))?;

        let mut reads: Vec<Result<Vec<u8>>> = reply.chunks.into_iter().map(Ok).collect();
        if reply.break_after {
            reads.push(Err(Error::fetch(&url, "connection reset")));
        }
        Ok(StreamingResponse {
            status: reply.status,
            body: stream::iter(reads).boxed(),
        })
    }
}
