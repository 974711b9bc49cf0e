//! Calloop event source for overlay requests
//!
//! The controller and the sequencer thread both talk to the overlay. Requests
//! go through a crossbeam channel and a ping wakes the event loop, so the
//! overlay is only ever touched on the loop thread.

use calloop::{
    EventSource, Poll, PostAction, Readiness, Token, TokenFactory,
    ping::{Ping, PingSource, make_ping},
};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::io;

use crate::grid::Letter;
use crate::sink::{PresentationSink, SinkError};
use crate::state::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayRequest {
    SetMode(Mode, Option<Letter>),
    Repaint,
}

/// Sending side, shared as the presentation sink
pub struct OverlayHandle {
    sender: Sender<OverlayRequest>,
    ping: Ping,
}

impl OverlayHandle {
    fn send(&self, request: OverlayRequest) -> Result<(), SinkError> {
        self.sender
            .send(request)
            .map_err(|_| SinkError::Disconnected)?;
        self.ping.ping();
        Ok(())
    }
}

impl PresentationSink for OverlayHandle {
    fn set_mode(&self, mode: Mode, first_letter: Option<Letter>) -> Result<(), SinkError> {
        self.send(OverlayRequest::SetMode(mode, first_letter))
    }

    fn request_repaint(&self) -> Result<(), SinkError> {
        self.send(OverlayRequest::Repaint)
    }
}

/// Event source that delivers overlay requests to the calloop event loop
pub struct OverlaySource {
    receiver: Receiver<OverlayRequest>,
    ping_source: PingSource,
}

impl OverlaySource {
    /// Create the source and the handle that feeds it
    pub fn new() -> io::Result<(Self, OverlayHandle)> {
        let (ping, ping_source) = make_ping()?;
        let (sender, receiver) = unbounded();
        Ok((
            Self {
                receiver,
                ping_source,
            },
            OverlayHandle { sender, ping },
        ))
    }
}

impl EventSource for OverlaySource {
    type Event = OverlayRequest;
    type Metadata = ();
    type Ret = ();
    type Error = io::Error;

    fn process_events<F>(
        &mut self,
        readiness: Readiness,
        token: Token,
        mut callback: F,
    ) -> Result<PostAction, Self::Error>
    where
        F: FnMut(Self::Event, &mut Self::Metadata) -> Self::Ret,
    {
        // PingError is infallible here; only the wake-up needs clearing
        let _ = self.ping_source.process_events(readiness, token, |_, _| {});

        loop {
            match self.receiver.try_recv() {
                Ok(request) => callback(request, &mut ()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(PostAction::Remove),
            }
        }

        Ok(PostAction::Continue)
    }

    fn register(
        &mut self,
        poll: &mut Poll,
        token_factory: &mut TokenFactory,
    ) -> calloop::Result<()> {
        self.ping_source.register(poll, token_factory)
    }

    fn reregister(
        &mut self,
        poll: &mut Poll,
        token_factory: &mut TokenFactory,
    ) -> calloop::Result<()> {
        self.ping_source.reregister(poll, token_factory)
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        self.ping_source.unregister(poll)
    }
}
