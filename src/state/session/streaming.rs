use super::super::event::SessionEvent;
use super::state::{lock, ChatSession, SendOutcome};
use crate::api::{Frame, FrameReader};
use crate::error::ChatError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DecodePhase {
    AwaitingFirstByte,
    Streaming,
    Done,
    Error,
}

impl ChatSession {
    /// Applies frames to the trailing assistant message until the body ends,
    /// a fatal frame arrives, or the turn is cancelled.
    pub(super) async fn stream_reply(
        &self,
        mut reader: FrameReader,
        generation: u64,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        let mut phase = DecodePhase::AwaitingFirstByte;
        let mut reply = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish_cancelled(generation),
                next = reader.next_frame() => next,
            };

            match next {
                Ok(Some(Frame::Text(fragment))) => {
                    reply.push_str(&fragment);
                    let first_fragment = phase == DecodePhase::AwaitingFirstByte;
                    {
                        let mut state = lock(&self.state);
                        if state.generation != generation {
                            tracing::debug!("history replaced mid-stream; abandoning reply");
                            return SendOutcome::Superseded;
                        }
                        if first_fragment {
                            state.is_typing = false;
                        }
                        state.set_reply_content(&reply);
                    }

                    if first_fragment {
                        phase = DecodePhase::Streaming;
                        tracing::debug!(?phase, "first reply fragment received");
                        self.emit(SessionEvent::Typing(false));
                    }
                    self.emit(SessionEvent::Fragment(fragment));
                }
                Ok(Some(Frame::Error(message))) => {
                    tracing::debug!(phase = ?DecodePhase::Error, "server sent an error frame");
                    return self.fail_turn(generation, ChatError::Stream(message));
                }
                Ok(None) => {
                    tracing::debug!(
                        phase = ?DecodePhase::Done,
                        chars = reply.chars().count(),
                        "reply stream finished"
                    );
                    return self.complete_turn(generation);
                }
                Err(error) => {
                    tracing::debug!(phase = ?DecodePhase::Error, "reading reply stream failed");
                    return self.fail_turn(generation, error);
                }
            }
        }
    }

    fn complete_turn(&self, generation: u64) -> SendOutcome {
        let mut state = lock(&self.state);
        if state.generation != generation {
            return SendOutcome::Superseded;
        }
        state.remove_empty_reply();
        SendOutcome::Completed
    }
}
