//! JSON-lines bridge to an external signing program.
//!
//! The bridge is spawned once per run. It must print `{"type":"ready"}` on
//! startup, then answer each request line with exactly one response line.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use notescout_shared::{NoteScoutError, Result, SignerConfig};

use crate::{SignatureHeaders, Signer};

/// How long a bridge gets to exit after `shutdown` before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestMessage<'a> {
    Sign {
        id: String,
        uri: &'a str,
        body: &'a str,
        cookie: &'a str,
    },
    SearchId {
        id: String,
    },
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseMessage {
    Ready,
    Signature {
        id: String,
        headers: BTreeMap<String, String>,
    },
    SearchId {
        id: String,
        search_id: String,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Bridge handle
// ---------------------------------------------------------------------------

/// Handle to the spawned signing subprocess.
struct BridgeHandle {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
    /// Set once the pipe is unusable; every later call fails fast.
    broken: bool,
}

impl BridgeHandle {
    fn spawn(config: &SignerConfig) -> Result<Self> {
        info!(cmd = %config.command, args = ?config.args, "spawning signing bridge");

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()); // Bridge logs go to parent stderr
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            NoteScoutError::signer(format!(
                "failed to spawn bridge: {e}. Is `{}` installed?",
                config.command
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| NoteScoutError::signer("failed to capture bridge stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NoteScoutError::signer("failed to capture bridge stdout"))?;

        let mut handle = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
            broken: false,
        };

        match handle.read_message()? {
            ResponseMessage::Ready => {
                info!("signing bridge is ready");
                Ok(handle)
            }
            other => Err(NoteScoutError::signer(format!(
                "expected ready message, got: {other:?}"
            ))),
        }
    }

    fn next_id(&mut self) -> String {
        self.request_counter += 1;
        format!("req-{}", self.request_counter)
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).map_err(|e| {
            self.broken = true;
            NoteScoutError::signer(format!("bridge read error: {e}"))
        })?;

        if read == 0 {
            self.broken = true;
            return Err(NoteScoutError::signer("bridge closed stdout unexpectedly"));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            self.broken = true;
            let preview: String = line.trim_end().chars().take(200).collect();
            NoteScoutError::signer(format!("invalid bridge message: {e} (got: {preview})"))
        })
    }

    fn write_message(&mut self, message: &RequestMessage<'_>) -> Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| NoteScoutError::signer(format!("failed to serialize request: {e}")))?;

        writeln!(self.stdin, "{json}")
            .and_then(|()| self.stdin.flush())
            .map_err(|e| {
                self.broken = true;
                NoteScoutError::signer(format!("failed to write to bridge stdin: {e}"))
            })
    }

    /// Send one request and read its response, checking the correlation id.
    fn exchange<'a>(
        &mut self,
        build: impl FnOnce(String) -> RequestMessage<'a>,
    ) -> Result<ResponseMessage> {
        if self.broken {
            return Err(NoteScoutError::signer("bridge is no longer available"));
        }

        let id = self.next_id();
        self.write_message(&build(id.clone()))?;
        let response = self.read_message()?;

        let response_id = match &response {
            ResponseMessage::Signature { id, .. } | ResponseMessage::SearchId { id, .. } => {
                Some(id.as_str())
            }
            ResponseMessage::Error { id, .. } => id.as_deref(),
            ResponseMessage::Ready => None,
        };
        if let Some(response_id) = response_id {
            if response_id != id {
                // Out of sync: later lines would be attributed to the wrong request.
                self.broken = true;
                return Err(NoteScoutError::signer(format!(
                    "bridge answered {response_id} to request {id}"
                )));
            }
        }

        Ok(response)
    }

    fn sign(&mut self, uri: &str, body: &str, cookie: &str) -> Result<SignatureHeaders> {
        let response = self.exchange(|id| RequestMessage::Sign {
            id,
            uri,
            body,
            cookie,
        })?;

        match response {
            ResponseMessage::Signature { headers, .. } => {
                debug!(uri, headers = headers.len(), "request signed");
                SignatureHeaders::new(headers)
            }
            ResponseMessage::Error { error, .. } => Err(NoteScoutError::signer(error)),
            other => Err(NoteScoutError::signer(format!(
                "unexpected response to sign request: {other:?}"
            ))),
        }
    }

    fn search_id(&mut self) -> Result<String> {
        match self.exchange(|id| RequestMessage::SearchId { id })? {
            ResponseMessage::SearchId { search_id, .. } if !search_id.is_empty() => Ok(search_id),
            ResponseMessage::SearchId { .. } => {
                Err(NoteScoutError::signer("bridge returned an empty search id"))
            }
            ResponseMessage::Error { error, .. } => Err(NoteScoutError::signer(error)),
            other => Err(NoteScoutError::signer(format!(
                "unexpected response to search_id request: {other:?}"
            ))),
        }
    }
}

impl BridgeHandle {
    /// Poll for exit until `grace` elapses. Returns `true` once the child is gone.
    fn wait_for_exit(&mut self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    info!(?status, "signing bridge exited");
                    return true;
                }
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                Ok(None) => return false,
                Err(e) => {
                    warn!("bridge wait error: {e}");
                    return false;
                }
            }
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        if !self.broken {
            let _ = self.write_message(&RequestMessage::Shutdown);
        }
        if !self.broken && self.wait_for_exit(SHUTDOWN_GRACE) {
            return;
        }
        warn!(broken = self.broken, "killing signing bridge");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ---------------------------------------------------------------------------
// Public signer
// ---------------------------------------------------------------------------

/// [`Signer`] backed by a long-lived bridge subprocess.
pub struct BridgeSigner {
    handle: Mutex<BridgeHandle>,
}

impl BridgeSigner {
    /// Spawn the bridge and wait for its ready signal.
    ///
    /// Fails if the program cannot be started or never reports ready; callers
    /// treat that as fatal for the whole run.
    pub fn spawn(config: &SignerConfig) -> Result<Self> {
        Ok(Self {
            handle: Mutex::new(BridgeHandle::spawn(config)?),
        })
    }

    fn with_handle<T>(&self, f: impl FnOnce(&mut BridgeHandle) -> Result<T>) -> Result<T> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| NoteScoutError::signer("bridge lock poisoned"))?;
        f(&mut handle)
    }
}

impl Signer for BridgeSigner {
    fn sign(&self, uri: &str, body: &str, cookie: &str) -> Result<SignatureHeaders> {
        self.with_handle(|h| h.sign(uri, body, cookie))
    }

    fn new_search_id(&self) -> Result<String> {
        self.with_handle(|h| h.search_id())
    }
}
