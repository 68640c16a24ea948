//! Through-mode transfers: the caller produces or consumes the bytes.
//!
//! A [`SendThrough`] is driven step by step: `initiate_request`, then
//! `transform_to_block` + `write_when_possible` for each chunk, then
//! `finalize_request` (or `transfer_in_error`). A [`RecvThrough`] hands a
//! [`RecvThroughHandler`] to the transport and waits.
//!
//! No record is kept for a failed through-mode transfer.

use std::sync::Arc;
use std::time::Instant;

use ferry_protocol::{DataBlock, ErrorCode, Packet};
use ferry_transfer::{TransferRequest, checksum_bytes};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::outcome::RunOutcome;
use crate::runner::{ClientContext, ClientRunner, InitKind, Prepared};
use crate::session::{RecvThroughHandler, Session, SharedRecvHandler, ThroughRole};

struct ActiveStream {
    session: Box<dyn Session>,
    prepared: Prepared,
    next_rank: u32,
    eof_written: bool,
}

/// Sending side of a through-mode transfer.
pub struct SendThrough {
    runner: ClientRunner,
    request: TransferRequest,
    active: Option<ActiveStream>,
    finished: bool,
}

impl SendThrough {
    pub fn new(ctx: ClientContext, request: TransferRequest) -> Self {
        Self {
            runner: ClientRunner::new(ctx),
            request,
            active: None,
            finished: false,
        }
    }

    /// Not supported: block production is paced by the caller, so this type
    /// is driven with `initiate_request` and `finalize_request`.
    pub async fn run(&mut self) -> RunOutcome {
        warn!("send-through transfers are driven with initiate_request and finalize_request");
        RunOutcome::failed(
            ErrorCode::Internal,
            "run() is not available on a send-through transfer",
            None,
            Instant::now(),
        )
    }

    /// Creates the record and opens the session, with the usual retries.
    pub async fn initiate_request(&mut self) -> Result<(), RunOutcome> {
        let started = Instant::now();
        if self.active.is_some() || self.finished {
            return Err(RunOutcome::failed(
                ErrorCode::Internal,
                "send-through transfer already initiated",
                None,
                started,
            ));
        }

        let mut prepared =
            self.runner
                .init_request(&self.request, InitKind::SendThrough, started)?;
        let session = match self
            .runner
            .connect_with_retry(&mut prepared, ThroughRole::Send)
            .await
        {
            Ok(session) => session,
            Err(outcome) => {
                self.finished = true;
                return Err(outcome);
            }
        };

        debug!(
            host = %prepared.host.host_id,
            special_id = prepared.record.special_id(),
            "send-through ready"
        );
        let next_rank = prepared.record.rank;
        self.active = Some(ActiveStream {
            session,
            prepared,
            next_rank,
            eof_written: false,
        });
        Ok(())
    }

    /// Wraps caller bytes into the next block. `None` yields the empty
    /// end-of-file block.
    pub fn transform_to_block(&mut self, data: Option<&[u8]>) -> Result<DataBlock, ClientError> {
        let active = self.active_mut()?;
        let rank = active.next_rank;
        active.next_rank += 1;

        let Some(data) = data else {
            return Ok(DataBlock::end_of_file(rank));
        };
        let digest = active
            .prepared
            .record
            .mode
            .has_hash()
            .then(|| checksum_bytes(data));
        Ok(DataBlock {
            rank,
            data: data.to_vec(),
            digest,
            eof: false,
        })
    }

    /// Sends a block once the channel is writable. Does not return before
    /// the transport reports writability, which bounds buffered data.
    pub async fn write_when_possible(&mut self, block: DataBlock) -> Result<(), ClientError> {
        let active = self.active_mut()?;
        active.session.writable().await?;
        let eof = block.eof;
        active.session.send(Packet::Data(block), true).await?;
        if eof {
            active.eof_written = true;
        }
        Ok(())
    }

    /// Ends the stream, waits for the partner's acknowledgement and closes
    /// the request.
    pub async fn finalize_request(&mut self) -> RunOutcome {
        let Some(mut active) = self.active.take() else {
            return self.not_initiated();
        };
        self.finished = true;

        if !active.eof_written {
            let block = DataBlock::end_of_file(active.next_rank);
            active.next_rank += 1;
            if let Err(e) = write_block(active.session.as_mut(), block).await {
                return self.abort(active, e.code(), e.to_string()).await;
            }
        }

        let last_rank = active.next_rank.saturating_sub(1);
        if let Err(e) = active
            .session
            .send(Packet::EndTransfer { last_rank }, true)
            .await
        {
            return self.abort(active, e.code(), e.to_string()).await;
        }

        let timeout = self.runner.context().config.completion_timeout;
        match active.session.await_completion(timeout).await {
            Ok(completion) if completion.success => {
                let end = Packet::EndRequest {
                    code: ErrorCode::CompleteOk,
                };
                if let Err(e) = active.session.send(end, true).await {
                    return self.abort(active, e.code(), e.to_string()).await;
                }
                active.session.close().await;
                let rank = completion.rank.or(Some(last_rank));
                self.runner.complete(&mut active.prepared, rank)
            }
            Ok(completion) => {
                let cause = completion
                    .message
                    .unwrap_or_else(|| completion.code.message().to_string());
                self.abort(active, completion.code, cause).await
            }
            Err(e) => self.abort(active, e.code(), e.to_string()).await,
        }
    }

    /// Gives up: tells the partner, closes the session, drops the record.
    pub async fn transfer_in_error(&mut self, cause: &str) -> RunOutcome {
        let Some(active) = self.active.take() else {
            return self.not_initiated();
        };
        self.finished = true;
        self.abort(active, ErrorCode::TransferError, cause.to_string())
            .await
    }

    async fn abort(&self, mut active: ActiveStream, code: ErrorCode, cause: String) -> RunOutcome {
        let packet = Packet::Error {
            code: ErrorCode::TransferError,
            message: cause.clone(),
        };
        if let Err(e) = active.session.send(packet, true).await {
            debug!(error = %e, "cannot send error packet");
        }
        active.session.close().await;
        self.runner.terminate(&mut active.prepared, code, cause)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveStream, ClientError> {
        self.active
            .as_mut()
            .ok_or_else(|| ClientError::NotConnected("send-through transfer not initiated".into()))
    }

    fn not_initiated(&self) -> RunOutcome {
        RunOutcome::failed(
            ErrorCode::Internal,
            "send-through transfer not initiated",
            None,
            Instant::now(),
        )
    }
}

async fn write_block(session: &mut dyn Session, block: DataBlock) -> Result<(), ClientError> {
    session.writable().await?;
    session.send(Packet::Data(block), true).await
}

/// Receiving side of a through-mode transfer.
pub struct RecvThrough {
    runner: ClientRunner,
    request: TransferRequest,
}

impl RecvThrough {
    pub fn new(ctx: ClientContext, request: TransferRequest) -> Self {
        Self {
            runner: ClientRunner::new(ctx),
            request,
        }
    }

    /// Runs the transfer; `handler` receives every inbound block.
    pub async fn run(&self, handler: Box<dyn RecvThroughHandler>) -> RunOutcome {
        let started = Instant::now();
        let mut prepared =
            match self
                .runner
                .init_request(&self.request, InitKind::RecvThrough, started)
            {
                Ok(prepared) => prepared,
                Err(outcome) => return outcome,
            };

        let shared: SharedRecvHandler = Arc::new(tokio::sync::Mutex::new(handler));
        let session = match self
            .runner
            .connect_with_retry(&mut prepared, ThroughRole::Recv(shared))
            .await
        {
            Ok(session) => session,
            Err(outcome) => return outcome,
        };
        self.runner.finish_transfer(session, prepared).await
    }
}
