//! Typed FIFO channels
//!
//! A channel is a queue shared by every task holding a handle to it. Tasks
//! that cannot make progress register on one of the two wait queues and
//! park; the other side wakes them through the scheduler. Wake-ups are
//! hints: a woken task polls again and re-checks the channel.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::runtime::{RuntimeError, Value};
use crate::error::Span;
use super::executor::{Scheduler, TaskId};

#[derive(Clone)]
pub struct Channel {
    state: Rc<RefCell<ChannelState>>,
    scheduler: Scheduler,
}

struct ChannelState {
    buffer: VecDeque<Value>,
    /// `None` means unbounded
    capacity: Option<usize>,
    closed: bool,
    recv_waiters: VecDeque<TaskId>,
    send_waiters: VecDeque<TaskId>,
}

impl Channel {
    pub fn new(scheduler: &Scheduler, capacity: Option<usize>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ChannelState {
                buffer: VecDeque::new(),
                capacity,
                closed: false,
                recv_waiters: VecDeque::new(),
                send_waiters: VecDeque::new(),
            })),
            scheduler: scheduler.clone(),
        }
    }

    pub fn same_channel(&self, other: &Channel) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn len(&self) -> usize {
        self.state.borrow().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive the next value; resolves to `None` once the channel is
    /// closed and drained
    pub fn recv(&self, span: Span) -> RecvFuture {
        RecvFuture {
            channel: self.clone(),
            span,
        }
    }

    /// Send `value`, waiting for buffer space on a full bounded channel
    pub fn send(&self, value: Value, span: Span) -> SendFuture {
        SendFuture {
            channel: self.clone(),
            value: Some(value),
            span,
        }
    }

    /// Close the channel and wake every waiting task. Closing twice is an
    /// error.
    pub fn close(&self, span: Span) -> Result<(), RuntimeError> {
        let waiters: Vec<TaskId> = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.closed {
                return Err(RuntimeError::invalid_argument("channel is already closed", span));
            }
            state.closed = true;
            state
                .recv_waiters
                .drain(..)
                .chain(state.send_waiters.drain(..))
                .collect()
        };
        for task in waiters {
            self.scheduler.wake(task);
        }
        Ok(())
    }

    fn wake_one(&self, which: fn(&mut ChannelState) -> &mut VecDeque<TaskId>) {
        let task = which(&mut self.state.borrow_mut()).pop_front();
        if let Some(task) = task {
            self.scheduler.wake(task);
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Channel")
            .field("buffered", &state.buffer.len())
            .field("capacity", &state.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

pub struct RecvFuture {
    channel: Channel,
    span: Span,
}

impl Future for RecvFuture {
    type Output = Option<Value>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let channel = &self.channel;
        let popped = channel.state.borrow_mut().buffer.pop_front();
        if let Some(value) = popped {
            channel.wake_one(|s| &mut s.send_waiters);
            return Poll::Ready(Some(value));
        }
        if channel.is_closed() {
            return Poll::Ready(None);
        }

        let task = channel.scheduler.current();
        {
            let mut state = channel.state.borrow_mut();
            if !state.recv_waiters.contains(&task) {
                state.recv_waiters.push_back(task);
            }
        }
        channel.scheduler.block("receive", self.span);
        Poll::Pending
    }
}

pub struct SendFuture {
    channel: Channel,
    value: Option<Value>,
    span: Span,
}

impl Future for SendFuture {
    type Output = Result<(), RuntimeError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let channel = this.channel.clone();
        let task = channel.scheduler.current();

        {
            let mut state = channel.state.borrow_mut();
            if state.closed {
                state.send_waiters.retain(|t| *t != task);
                return Poll::Ready(Err(RuntimeError::send_on_closed(this.span)));
            }
            let full = state.capacity.is_some_and(|cap| state.buffer.len() >= cap);
            if full {
                if !state.send_waiters.contains(&task) {
                    state.send_waiters.push_back(task);
                }
                drop(state);
                channel.scheduler.block("send", this.span);
                return Poll::Pending;
            }
            if let Some(value) = this.value.take() {
                state.buffer.push_back(value);
            }
        }

        channel.wake_one(|s| &mut s.recv_waiters);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ErrorKind;

    #[test]
    fn test_fifo_order() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, None);
        let ch = channel.clone();
        let report = scheduler.run(Box::pin(async move {
            for i in 1..=3 {
                ch.send(Value::Int(i), Span::default()).await?;
            }
            let mut seen = Vec::new();
            for _ in 0..3 {
                seen.push(ch.recv(Span::default()).await);
            }
            assert_eq!(seen, vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3))]);
            Ok::<(), RuntimeError>(())
        }));
        assert!(report.is_clean());
    }

    #[test]
    fn test_closed_channel_drains_then_ends() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, None);
        let ch = channel.clone();
        let report = scheduler.run(Box::pin(async move {
            ch.send(Value::Int(7), Span::default()).await?;
            ch.close(Span::default())?;
            assert_eq!(ch.recv(Span::default()).await, Some(Value::Int(7)));
            assert_eq!(ch.recv(Span::default()).await, None);
            let err = ch.send(Value::Int(8), Span::default()).await;
            assert_eq!(err.map_err(|e| e.kind), Err(ErrorKind::SendOnClosedChannel));
            Ok::<(), RuntimeError>(())
        }));
        assert!(report.is_clean());
    }

    #[test]
    fn test_close_fails_parked_sender() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, Some(1));
        let handle = scheduler.clone();
        let (sender, closer) = (channel.clone(), channel.clone());
        let report = scheduler.run(Box::pin(async move {
            handle.spawn(
                "sender",
                Box::pin(async move {
                    sender.send(Value::Int(1), Span::default()).await?;
                    sender.send(Value::Int(2), Span::new(10, 11, 2, 5)).await
                }),
            );
            let gate = Channel::new(&handle, None);
            let opener = gate.clone();
            handle.spawn(
                "closer",
                Box::pin(async move {
                    closer.close(Span::default())?;
                    opener.send(Value::None, Span::default()).await
                }),
            );
            gate.recv(Span::default()).await;
            assert_eq!(channel.recv(Span::default()).await, Some(Value::Int(1)));
            assert_eq!(channel.recv(Span::default()).await, None);
            Ok(())
        }));
        assert!(report.main_error.is_none());
        assert!(report.deadlock.is_none());
        assert_eq!(report.task_errors.len(), 1);
        let (task, err) = &report.task_errors[0];
        assert_eq!(task, "sender");
        assert_eq!(err.kind, ErrorKind::SendOnClosedChannel);
        assert_eq!(err.span.line, 2);
    }

    #[test]
    fn test_close_ends_every_parked_receiver() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, None);
        let handle = scheduler.clone();
        let ends = Rc::new(RefCell::new(Vec::new()));
        let (main_channel, main_ends) = (channel.clone(), Rc::clone(&ends));
        let report = scheduler.run(Box::pin(async move {
            for name in ["a", "b", "c"] {
                let rx = main_channel.clone();
                let log = Rc::clone(&main_ends);
                handle.spawn(
                    name,
                    Box::pin(async move {
                        let received = rx.recv(Span::default()).await;
                        log.borrow_mut().push((name, received));
                        Ok(())
                    }),
                );
            }
            // Let all three receivers park on the empty channel
            let gate = Channel::new(&handle, None);
            let opener = gate.clone();
            let closer = main_channel.clone();
            handle.spawn(
                "closer",
                Box::pin(async move {
                    closer.close(Span::default())?;
                    opener.send(Value::None, Span::default()).await
                }),
            );
            gate.recv(Span::default()).await;
            Ok(())
        }));
        assert!(report.is_clean());
        assert_eq!(*ends.borrow(), vec![("a", None), ("b", None), ("c", None)]);
    }

    #[test]
    fn test_double_close_is_an_error() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, Some(1));
        assert!(channel.close(Span::default()).is_ok());
        assert!(channel.close(Span::default()).is_err());
    }
}
