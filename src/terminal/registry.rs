use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex as StdMutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{broadcast, Mutex};

/// Last-N-bytes tail kept per session so a reconnect can replay recent
/// output instead of leaving a gap. 64KiB per session, per §4.5's "bounded
/// window (implementation-defined)".
const RING_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyState {
    Creating,
    Running,
    Closing,
    Exited,
}

/// What the reader task publishes on `output_tx`: raw bytes, or the
/// terminal event that ends the stream for every subscriber.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    Data(Vec<u8>),
    Error(String),
    Exited(Option<i32>),
}

struct RingBuffer {
    buf: VecDeque<u8>,
}

impl RingBuffer {
    fn new() -> Self {
        Self {
            buf: VecDeque::with_capacity(RING_BUFFER_CAPACITY),
        }
    }

    fn push(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().copied());
        while self.buf.len() > RING_BUFFER_CAPACITY {
            self.buf.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        self.buf.iter().copied().collect()
    }
}

pub struct PtySession {
    pub id: String,
    pub state: StdMutex<PtyState>,
    writer: Arc<StdMutex<Box<dyn Write + Send>>>,
    master: Box<dyn MasterPty + Send>,
    child: StdMutex<Box<dyn Child + Send + Sync>>,
    pub output_tx: broadcast::Sender<PtyEvent>,
    tail: StdMutex<RingBuffer>,
}

impl PtySession {
    pub fn write_input(&self, data: &[u8]) -> std::io::Result<()> {
        if *self.state.lock().unwrap() != PtyState::Running {
            return Ok(());
        }
        let mut w = self.writer.lock().unwrap();
        w.write_all(data)?;
        w.flush()
    }

    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        if *self.state.lock().unwrap() != PtyState::Running {
            return Ok(());
        }
        self.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })?;
        Ok(())
    }

    pub fn buffered_tail(&self) -> Vec<u8> {
        self.tail.lock().unwrap().snapshot()
    }

    pub fn kill(&self) {
        *self.state.lock().unwrap() = PtyState::Closing;
        let _ = self.child.lock().unwrap().kill();
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.child
            .lock()
            .unwrap()
            .try_wait()
            .ok()
            .flatten()
            .map(|status| status.exit_code() as i32)
    }
}

/// Process-wide map of live PTY sessions, keyed by the client-chosen session
/// id. Kept global (not per-socket) so a reconnect with the same id can
/// rebind to the still-running child under the detach policy.
#[derive(Default)]
pub struct PtyRegistry {
    sessions: Mutex<HashMap<String, Arc<PtySession>>>,
}

pub struct SpawnParams {
    pub id: String,
    pub cwd: String,
    pub shell: Option<String>,
    pub cols: u16,
    pub rows: u16,
}

impl PtyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PtySession>> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    pub async fn spawn(&self, params: SpawnParams) -> anyhow::Result<Arc<PtySession>> {
        let pty_system = native_pty_system();
        let pair = pty_system.openpty(PtySize {
            rows: params.rows,
            cols: params.cols,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        let shell = params.shell.unwrap_or_else(default_shell);
        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(&params.cwd);

        let child = pair.slave.spawn_command(cmd)?;
        let writer = pair.master.take_writer()?;
        let mut reader = pair.master.try_clone_reader()?;

        let (output_tx, _) = broadcast::channel::<PtyEvent>(256);
        let tx_for_reader = output_tx.clone();

        let session = Arc::new(PtySession {
            id: params.id.clone(),
            state: StdMutex::new(PtyState::Running),
            writer: Arc::new(StdMutex::new(writer)),
            master: pair.master,
            child: StdMutex::new(child),
            output_tx,
            tail: StdMutex::new(RingBuffer::new()),
        });

        let session_for_reader = session.clone();
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            let read_error = loop {
                match reader.read(&mut buf) {
                    Ok(0) => break None,
                    Ok(n) => {
                        session_for_reader
                            .tail
                            .lock()
                            .unwrap()
                            .push(&buf[..n]);
                        let _ = tx_for_reader.send(PtyEvent::Data(buf[..n].to_vec()));
                    }
                    Err(e) => break Some(e),
                }
            };

            *session_for_reader.state.lock().unwrap() = PtyState::Exited;
            if let Some(e) = read_error {
                let _ = tx_for_reader.send(PtyEvent::Error(e.to_string()));
            }
            let code = session_for_reader.exit_code();
            let _ = tx_for_reader.send(PtyEvent::Exited(code));
        });

        self.sessions
            .lock()
            .await
            .insert(params.id.clone(), session.clone());

        Ok(session)
    }
}

fn default_shell() -> String {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}
