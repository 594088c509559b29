use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::proto::{read_sentence, write_sentence};
use super::{Reply, Sentence};
use crate::error::{ExporterError, Result};

/// Byte stream a client can talk over (plain TCP, TLS, or an in-memory pipe)
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// A RouterOS API session.
///
/// Commands are serialized: concurrent callers each wait for the previous
/// request/response exchange to finish. The socket is closed by [`Client::close`]
/// or when the client is dropped.
pub struct Client {
    stream: Mutex<Option<Box<dyn Stream>>>,
}

impl Client {
    /// Wrap an already established stream
    pub fn new<S: Stream + 'static>(stream: S) -> Self {
        Self {
            stream: Mutex::new(Some(Box::new(stream))),
        }
    }

    /// Authenticate with the plain-text login used since RouterOS 6.43
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let name = format!("=name={}", username);
        let password = format!("=password={}", password);
        let reply = self.run(&["/login", name.as_str(), password.as_str()]).await?;

        if reply.done.get("ret").is_some() {
            return Err(ExporterError::Protocol(
                "device requested legacy challenge-response login, which is not supported"
                    .to_string(),
            ));
        }

        debug!("Logged in as {}", username);
        Ok(())
    }

    /// Send a command and wait for its complete reply.
    ///
    /// A `!trap` answer becomes [`ExporterError::Trap`] and leaves the session
    /// usable. Transport failures and `!fatal` drop the session.
    pub async fn run<S: AsRef<str>>(&self, words: &[S]) -> Result<Reply> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| ExporterError::Connection("connection is closed".to_string()))?;

        match exchange(stream, words).await {
            Err(e @ ExporterError::Trap(_)) => Err(e),
            Err(e) => {
                warn!("Dropping RouterOS session after error: {}", e);
                *guard = None;
                Err(e)
            }
            Ok(reply) => Ok(reply),
        }
    }

    /// Shut the session down. Later commands fail with a connection error.
    pub async fn close(&self) {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            if let Err(e) = stream.shutdown().await {
                trace!("Error shutting down RouterOS stream: {}", e);
            }
        }
    }
}

async fn exchange<S: AsRef<str>>(stream: &mut Box<dyn Stream>, words: &[S]) -> Result<Reply> {
    if let Some(command) = words.first() {
        trace!("Sending RouterOS command {}", command.as_ref());
    }
    write_sentence(stream, words).await?;

    let mut reply = Reply::default();
    let mut trap: Option<String> = None;

    loop {
        let raw = read_sentence(stream).await?;
        let Some(first) = raw.first() else {
            continue;
        };

        match first.as_str() {
            "!re" => reply.re.push(Sentence::parse(&raw)),
            "!done" => {
                reply.done = Sentence::parse(&raw);
                break;
            }
            "!trap" => {
                let sentence = Sentence::parse(&raw);
                trap = Some(sentence.get("message").unwrap_or("unknown error").to_string());
            }
            "!fatal" => {
                let reason = raw.get(1).cloned().unwrap_or_default();
                return Err(ExporterError::Fatal(reason));
            }
            "!empty" => {}
            other => {
                return Err(ExporterError::Protocol(format!(
                    "unexpected reply word {:?}",
                    other
                )));
            }
        }
    }

    match trap {
        Some(message) => Err(ExporterError::Trap(message)),
        None => Ok(reply),
    }
}
