//! Fake transports for pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::http_client::{RequestIdentity, Transport, TransportError, TransportResponse};

pub type Scripted = Result<TransportResponse, TransportError>;

pub fn ok(body: String) -> Scripted {
    Ok(TransportResponse { status: 200, body })
}

pub fn status(code: u16) -> Scripted {
    Ok(TransportResponse {
        status: code,
        body: String::new(),
    })
}

/// A lookup page padded past the minimum body size.
pub fn page(inner: &str) -> String {
    format!(
        "<html><body>{}<p>{}</p></body></html>",
        inner,
        "lorem ipsum dolor sit amet ".repeat(60)
    )
}

pub fn reputation_page(reputation: &str) -> String {
    page(&format!(
        r#"<div id="userReputation"><h3>{}</h3></div>"#,
        reputation
    ))
}

/// Replays canned responses in order, repeating the last one, and records
/// the identity each request was sent with.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    identities: Mutex<Vec<RequestIdentity>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            identities: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identities in request order.
    pub fn identities(&self) -> Vec<RequestIdentity> {
        self.identities.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(
        &self,
        _url: &Url,
        identity: &RequestIdentity,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.identities.lock().unwrap().push(identity.clone());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// Answers per URL; `None` never answers.
pub struct RoutedTransport<F> {
    route: F,
    calls: AtomicUsize,
}

impl<F> RoutedTransport<F> {
    pub fn new(route: F) -> Arc<Self>
    where
        F: Fn(&Url) -> Option<Scripted> + Send + Sync,
    {
        Arc::new(Self {
            route,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> Transport for RoutedTransport<F>
where
    F: Fn(&Url) -> Option<Scripted> + Send + Sync,
{
    async fn get(
        &self,
        url: &Url,
        _identity: &RequestIdentity,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (self.route)(url) {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }
}
