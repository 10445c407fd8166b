//! Command submission and reply draining.
//!
//! Replies on the administrative reply queue cannot be attributed to a
//! request once several requests overlap, so a [`Replies`] stream holds the
//! dispatcher mutably: the next command cannot be issued until the previous
//! stream has been dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{CollectError, TransportError};
use crate::health::CollectorMetrics;
use crate::pcf::{self, Command, Message, MessageBuilder};

/// Upper bound on replies discarded while clearing the reply queue.
const MAX_STALE_REPLIES: usize = 10_000;

/// Request/reply transport to the queue manager's command server.
pub trait AdminChannel: Send {
    /// Put a command message on the command queue.
    fn submit(
        &mut self,
        message: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Get the next reply, waiting at most `timeout`. `Ok(None)` means no
    /// message arrived in time.
    fn receive(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}

/// The kinds of query this collector issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Live status (`INQUIRE_Q_STATUS`, queue status type).
    QueueStatus,
    /// Interval counters, reset by the query (`RESET_Q_STATS`).
    ResetQueueStats,
    /// Configured attributes (`INQUIRE_Q`).
    QueueAttributes,
    /// Names of defined queues (`INQUIRE_Q_NAMES`).
    QueueNames,
}

impl QueryKind {
    pub const fn command(self) -> Command {
        match self {
            Self::QueueStatus => Command::InquireQueueStatus,
            Self::ResetQueueStats => Command::ResetQueueStats,
            Self::QueueAttributes => Command::InquireQueue,
            Self::QueueNames => Command::InquireQueueNames,
        }
    }

    /// Build the command message for one name pattern.
    pub fn build(self, pattern: &str) -> Vec<u8> {
        let builder = MessageBuilder::command(self.command()).string(pcf::MQCA_Q_NAME, pattern);
        let builder = match self {
            Self::QueueStatus => builder.integer(pcf::MQIACF_Q_STATUS_TYPE, pcf::MQIACF_Q_STATUS),
            Self::ResetQueueStats => builder,
            Self::QueueAttributes => builder.integer_list(
                pcf::MQIACF_Q_ATTRS,
                &[pcf::MQIA_MAX_Q_DEPTH, pcf::MQIA_USAGE, pcf::MQCA_Q_DESC],
            ),
            Self::QueueNames => builder.integer(pcf::MQIA_Q_TYPE, pcf::MQQT_ALL),
        };
        builder.build()
    }
}

/// Issues one query at a time over an [`AdminChannel`].
pub struct Dispatcher<C> {
    channel: C,
    reply_timeout: Duration,
    metrics: Option<Arc<CollectorMetrics>>,
}

impl<C: AdminChannel> Dispatcher<C> {
    pub fn new(channel: C, reply_timeout: Duration) -> Self {
        Self {
            channel,
            reply_timeout,
            metrics: None,
        }
    }

    pub fn set_metrics(&mut self, metrics: Arc<CollectorMetrics>) {
        self.metrics = Some(metrics);
    }

    pub fn metrics(&self) -> Option<&CollectorMetrics> {
        self.metrics.as_deref()
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Submit a query and return the stream of its replies.
    pub async fn query(
        &mut self,
        kind: QueryKind,
        pattern: &str,
    ) -> Result<Replies<'_, C>, CollectError> {
        let command = kind.command();
        self.clear_replies(command).await;

        let message = kind.build(pattern);
        debug!(%command, pattern, bytes = message.len(), "submitting command");

        if let Some(m) = self.metrics.as_deref() {
            m.queries.with_label_values(&[command.as_str()]).inc();
        }

        if let Err(source) = self.channel.submit(message).await {
            if let Some(m) = self.metrics.as_deref() {
                m.query_errors
                    .with_label_values(&[command.as_str(), "transport"])
                    .inc();
            }
            return Err(CollectError::Transport { command, source });
        }

        Ok(Replies {
            dispatcher: self,
            command,
            received: 0,
            done: false,
        })
    }

    /// Discard replies left over from an earlier, abandoned query.
    async fn clear_replies(&mut self, command: Command) {
        let mut discarded = 0;
        while discarded < MAX_STALE_REPLIES {
            match self.channel.receive(Duration::ZERO).await {
                Ok(Some(_)) => discarded += 1,
                Ok(None) => break,
                Err(e) => {
                    warn!(%command, error = %e, "clearing reply queue failed");
                    break;
                }
            }
        }

        if discarded > 0 {
            debug!(%command, discarded, "discarded stale replies");
            if let Some(m) = self.metrics.as_deref() {
                m.stale_replies
                    .with_label_values(&[command.as_str()])
                    .inc_by(discarded as f64);
            }
        }
    }
}

/// Replies to one submitted command, received on demand.
///
/// The stream ends after a message flagged as last, or when a receive times
/// out. A timeout is not an error: a pattern may match nothing.
pub struct Replies<'a, C> {
    dispatcher: &'a mut Dispatcher<C>,
    command: Command,
    received: usize,
    done: bool,
}

impl<C: AdminChannel> Replies<'_, C> {
    pub fn command(&self) -> Command {
        self.command
    }

    /// Number of replies received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Receive the next reply, or `None` once the set is complete.
    pub async fn next(&mut self) -> Result<Option<Message>, CollectError> {
        if self.done {
            return Ok(None);
        }

        let timeout = self.dispatcher.reply_timeout;
        let command = self.command;
        let label = command.as_str();

        let bytes = match self.dispatcher.channel.receive(timeout).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.done = true;
                debug!(%command, received = self.received, "reply wait timed out");
                if let Some(m) = self.dispatcher.metrics() {
                    m.reply_timeouts.with_label_values(&[label]).inc();
                }
                return Ok(None);
            }
            Err(source) => {
                self.done = true;
                if let Some(m) = self.dispatcher.metrics() {
                    m.query_errors
                        .with_label_values(&[label, "transport"])
                        .inc();
                }
                return Err(CollectError::Transport { command, source });
            }
        };

        let message = match pcf::read_message(&bytes) {
            Ok(message) => message,
            Err(source) => {
                self.done = true;
                if let Some(m) = self.dispatcher.metrics() {
                    m.query_errors
                        .with_label_values(&[label, "protocol"])
                        .inc();
                }
                return Err(CollectError::Protocol { command, source });
            }
        };

        self.received += 1;
        if message.header.is_last() {
            self.done = true;
        }

        trace!(
            %command,
            seq = message.header.msg_seq_number,
            last = message.header.is_last(),
            comp_code = message.header.comp_code,
            reason = message.header.reason,
            "received reply",
        );
        if let Some(m) = self.dispatcher.metrics() {
            m.replies_received.with_label_values(&[label]).inc();
        }

        Ok(Some(message))
    }

    /// Record a reply that carried no usable object name.
    pub fn mark_skipped(&self, message: &Message) {
        debug!(
            command = %self.command,
            comp_code = message.header.comp_code,
            reason = message.header.reason,
            parameters = message.header.parameter_count,
            "skipping reply without object name",
        );
        if let Some(m) = self.dispatcher.metrics() {
            m.replies_skipped
                .with_label_values(&[self.command.as_str()])
                .inc();
        }
    }
}
