//! In-memory transport for connection tests.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::core::TransportError;
use crate::transport::{Dialer, FrameSink, FrameSource, PeerAddress};

#[derive(Default)]
pub(crate) struct MockState {
    /// Dial attempts, failed ones included.
    pub attempts: usize,
    /// Peers dialed successfully.
    pub dialed: Vec<PeerAddress>,
    /// Fail this many upcoming dials.
    pub fail_dials: usize,
    /// Never complete a dial while set.
    pub hang_dials: bool,
    /// Fail every write while set.
    pub fail_writes: bool,
    /// Frames written, across all sessions.
    pub written: Vec<Vec<u8>>,
    /// Sink closes requested.
    pub closes: usize,
    /// Frames queued before the next session exists.
    pending: Vec<Vec<u8>>,
    /// Inbound feed per session, in dial order.
    sessions: Vec<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockDialer {
    state: Arc<Mutex<MockState>>,
}

impl MockDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Deliver `frame` on the newest session, or on the next one dialed.
    pub fn push(&self, frame: Vec<u8>) {
        let mut state = self.state();
        match state.sessions.last().and_then(Option::as_ref) {
            Some(tx) => tx.send(frame).unwrap(),
            None => state.pending.push(frame),
        }
    }

    /// End the inbound stream of session `index` (0 = first dial).
    pub fn close_session(&self, index: usize) {
        self.state().sessions[index] = None;
    }

    /// End the inbound stream of the newest session.
    pub fn close_inbound(&self) {
        let last = self.state().sessions.len() - 1;
        self.close_session(last);
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state().written.clone()
    }
}

pub(crate) struct MockSink {
    state: Arc<Mutex<MockState>>,
}

pub(crate) struct MockSource {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Dialer for MockDialer {
    type Sink = MockSink;
    type Source = MockSource;

    async fn dial(&self, peer: &PeerAddress) -> Result<(MockSink, MockSource), TransportError> {
        tokio::task::yield_now().await;
        let hang = self.state().hang_dials;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();
        state.attempts += 1;
        if state.fail_dials > 0 {
            state.fail_dials -= 1;
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for frame in state.pending.drain(..) {
            tx.send(frame).unwrap();
        }
        state.sessions.push(Some(tx));
        state.dialed.push(*peer);

        let sink = MockSink {
            state: Arc::clone(&self.state),
        };
        Ok((sink, MockSource { rx }))
    }
}

impl FrameSink for MockSink {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        state.written.push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

impl FrameSource for MockSource {
    async fn next_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}
