//! Per-connection state and the outbound queue feeding the single
//! writer task.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Notify;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// An outbound frame plus its drop class. When the queue is full the
/// oldest droppable frame goes first; critical frames (CHARACTER_REMOVE,
/// CHANGE_MAP, LOGGED, ERROR_MSG, ...) are never discarded.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub bytes: Vec<u8>,
    pub critical: bool,
}

/// Bounded outbound queue. FIFO per session; one writer task drains it,
/// so bytes from concurrent senders never interleave on the wire.
#[derive(Debug)]
pub struct Outbox {
    frames: Mutex<VecDeque<OutboundFrame>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(16),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues a frame. On overflow the oldest droppable frame is
    /// discarded; a queue full of critical frames grows instead.
    pub fn push(&self, frame: OutboundFrame) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut frames = self.frames.lock();
            if frames.len() >= self.capacity {
                if let Some(pos) = frames.iter().position(|f| !f.critical) {
                    frames.remove(pos);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Next frame, or `None` once closed and drained.
    pub async fn recv(&self) -> Option<OutboundFrame> {
        loop {
            if let Some(frame) = self.frames.lock().pop_front() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy of the queued frames; test and diagnostics aid.
    pub fn frames_snapshot(&self) -> Vec<OutboundFrame> {
        self.frames.lock().iter().cloned().collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionAuth {
    pub user_id: Option<i32>,
    pub username: String,
}

/// One connected client. Created on accept, torn down when either side
/// closes; dropping the roster entries is the disconnect path's job.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub peer: SocketAddr,
    pub outbox: Arc<Outbox>,
    auth: Mutex<SessionAuth>,
}

impl Session {
    pub fn new(peer: SocketAddr, outbox_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            outbox: Arc::new(Outbox::new(outbox_capacity)),
            auth: Mutex::new(SessionAuth::default()),
        })
    }

    pub fn user_id(&self) -> Option<i32> {
        self.auth.lock().user_id
    }

    pub fn username(&self) -> String {
        self.auth.lock().username.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.lock().user_id.is_some()
    }

    pub fn authenticate(&self, user_id: i32, username: &str) {
        let mut auth = self.auth.lock();
        auth.user_id = Some(user_id);
        auth.username = username.to_string();
    }

    pub fn close(&self) {
        self.outbox.close();
    }
}

/// Drains a session outbox into the socket. Runs until the outbox closes
/// or the peer stops accepting bytes.
pub async fn writer_task(outbox: Arc<Outbox>, mut writer: OwnedWriteHalf) {
    while let Some(frame) = outbox.recv().await {
        if let Err(err) = writer.write_all(&frame.bytes).await {
            log::info!("connection closed (send): {err}");
            outbox.close();
            break;
        }
    }
    let _ = writer.shutdown().await;
}
