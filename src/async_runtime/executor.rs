//! Cooperative task scheduler
//!
//! Tasks are futures polled one at a time from a FIFO run queue on the
//! current thread. A task only suspends inside a channel operation, which
//! marks it blocked before returning `Pending`; it becomes runnable again
//! when the other side of the channel wakes it. There is no preemption and
//! no parallelism, so shared state lives in `Rc<RefCell<..>>`.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use tracing::trace;

use crate::error::Span;
use crate::runtime::RuntimeError;

/// Task ID for tracking tasks; the main task is always 0
pub type TaskId = usize;

pub const MAIN_TASK: TaskId = 0;

/// Future driven by the scheduler
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Runnable,
    Running,
    /// Parked on a channel operation
    Blocked(&'static str),
    Finished,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Operation the task is parked on, while blocked
    pub waiting_at: Option<Span>,
    /// Closure calls currently active in this task
    pub depth: usize,
}

impl Task {
    fn new(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            state: TaskState::Runnable,
            waiting_at: None,
            depth: 0,
        }
    }
}

/// Tasks left parked when nothing could run
#[derive(Debug, Clone, PartialEq)]
pub struct Deadlock {
    pub message: String,
    /// Where the main task is parked, or the first parked task if main
    /// already finished
    pub span: Span,
}

/// Outcome of one scheduler run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Uncaught error of the main task; the run stops as soon as it occurs
    pub main_error: Option<RuntimeError>,
    /// Uncaught errors of spawned tasks, in the order they happened
    pub task_errors: Vec<(String, RuntimeError)>,
    pub deadlock: Option<Deadlock>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.main_error.is_none() && self.task_errors.is_empty() && self.deadlock.is_none()
    }
}

#[derive(Default)]
struct SchedState {
    tasks: BTreeMap<TaskId, Task>,
    run_queue: VecDeque<TaskId>,
    current: TaskId,
    next_id: TaskId,
    spawned: Vec<(TaskId, TaskFuture<'static>)>,
}

/// Handle to the scheduler, shared by the interpreter and every channel
#[derive(Clone, Default)]
pub struct Scheduler {
    state: Rc<RefCell<SchedState>>,
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task being polled right now
    pub fn current(&self) -> TaskId {
        self.state.borrow().current
    }

    /// Enqueue a new task. It does not start until the scheduler picks it.
    pub fn spawn(&self, name: impl Into<String>, future: TaskFuture<'static>) -> TaskId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        let name = name.into();
        trace!(task = id, name = %name, "spawn");
        state.tasks.insert(id, Task::new(id, name));
        state.run_queue.push_back(id);
        state.spawned.push((id, future));
        id
    }

    /// Mark the current task as parked on `reason` at `span`
    pub fn block(&self, reason: &'static str, span: Span) {
        let mut state = self.state.borrow_mut();
        let current = state.current;
        if let Some(task) = state.tasks.get_mut(&current) {
            trace!(task = current, reason, "block");
            task.state = TaskState::Blocked(reason);
            task.waiting_at = Some(span);
        }
    }

    /// Enter a call on the current task; returns the new call depth
    pub fn enter_call(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let current = state.current;
        match state.tasks.get_mut(&current) {
            Some(task) => {
                task.depth += 1;
                task.depth
            }
            None => 0,
        }
    }

    pub fn exit_call(&self) {
        let mut state = self.state.borrow_mut();
        let current = state.current;
        if let Some(task) = state.tasks.get_mut(&current) {
            task.depth = task.depth.saturating_sub(1);
        }
    }

    /// Make a blocked task runnable again
    pub fn wake(&self, id: TaskId) {
        let mut state = self.state.borrow_mut();
        let woken = match state.tasks.get_mut(&id) {
            Some(task) if matches!(task.state, TaskState::Blocked(_)) => {
                task.state = TaskState::Runnable;
                task.waiting_at = None;
                true
            }
            _ => false,
        };
        if woken {
            trace!(task = id, "wake");
            state.run_queue.push_back(id);
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.values().cloned().collect()
    }

    /// Run `main` and every task it spawns until nothing is runnable
    pub fn run<'a>(&self, main: TaskFuture<'a>) -> RunReport {
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut report = RunReport::default();

        let mut main = Some(main);
        let mut spawned: BTreeMap<TaskId, TaskFuture<'static>> = BTreeMap::new();
        {
            let mut state = self.state.borrow_mut();
            state.tasks.insert(MAIN_TASK, Task::new(MAIN_TASK, "main".to_string()));
            state.run_queue.push_front(MAIN_TASK);
        }

        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let fresh: Vec<_> = state.spawned.drain(..).collect();
                spawned.extend(fresh);
                let next = state.run_queue.pop_front();
                if let Some(id) = next {
                    state.current = id;
                    if let Some(task) = state.tasks.get_mut(&id) {
                        task.state = TaskState::Running;
                    }
                }
                next
            };
            let Some(id) = next else { break };

            let poll = if id == MAIN_TASK {
                match main.as_mut() {
                    Some(future) => future.as_mut().poll(&mut cx),
                    None => continue,
                }
            } else {
                match spawned.get_mut(&id) {
                    Some(future) => future.as_mut().poll(&mut cx),
                    None => continue,
                }
            };

            match poll {
                Poll::Ready(result) => {
                    let name = self.finish(id);
                    if id == MAIN_TASK {
                        main = None;
                    } else {
                        spawned.remove(&id);
                    }
                    if let Err(err) = result {
                        if id == MAIN_TASK {
                            report.main_error = Some(err);
                            break;
                        }
                        trace!(task = id, error = %err, "task failed");
                        report.task_errors.push((name, err));
                    }
                }
                Poll::Pending => {
                    // Pending without parking is a yield.
                    let mut state = self.state.borrow_mut();
                    let requeue = matches!(
                        state.tasks.get(&id).map(|t| t.state),
                        Some(TaskState::Running)
                    );
                    if requeue {
                        if let Some(task) = state.tasks.get_mut(&id) {
                            task.state = TaskState::Runnable;
                        }
                        state.run_queue.push_back(id);
                    }
                }
            }
        }

        if report.main_error.is_none() {
            report.deadlock = self.blocked_summary();
        }
        self.reset();
        report
    }

    fn finish(&self, id: TaskId) -> String {
        let mut state = self.state.borrow_mut();
        trace!(task = id, "finish");
        match state.tasks.get_mut(&id) {
            Some(task) => {
                task.state = TaskState::Finished;
                task.name.clone()
            }
            None => String::new(),
        }
    }

    fn blocked_summary(&self) -> Option<Deadlock> {
        let state = self.state.borrow();
        let blocked: Vec<(&Task, &'static str)> = state
            .tasks
            .values()
            .filter_map(|task| match task.state {
                TaskState::Blocked(reason) => Some((task, reason)),
                _ => None,
            })
            .collect();
        // Tasks are keyed by id, so main comes first when it is parked
        let span = blocked.first()?.0.waiting_at.unwrap_or_default();
        let names: Vec<String> = blocked
            .iter()
            .map(|(task, reason)| format!("{} (waiting to {})", task.name, reason))
            .collect();
        Some(Deadlock {
            message: format!("all tasks are blocked: {}", names.join(", ")),
            span,
        })
    }

    /// Forget every task so the next run starts fresh
    fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.tasks.clear();
        state.run_queue.clear();
        state.spawned.clear();
        state.current = MAIN_TASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_runtime::Channel;
    use crate::error::Span;
    use crate::runtime::Value;

    #[test]
    fn test_spawned_tasks_start_after_spawner_suspends() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let task_log = Rc::clone(&log);
        let main_log = Rc::clone(&log);
        let handle = scheduler.clone();
        let report = scheduler.run(Box::pin(async move {
            handle.spawn(
                "worker",
                Box::pin(async move {
                    task_log.borrow_mut().push("worker");
                    Ok(())
                }),
            );
            main_log.borrow_mut().push("main");
            Ok(())
        }));
        assert!(report.is_clean());
        assert_eq!(*log.borrow(), vec!["main", "worker"]);
    }

    #[test]
    fn test_rendezvous_between_tasks() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, None);
        let producer = channel.clone();
        let handle = scheduler.clone();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        let report = scheduler.run(Box::pin(async move {
            handle.spawn(
                "producer",
                Box::pin(async move {
                    for i in 0..5 {
                        producer.send(Value::Int(i), Span::default()).await?;
                    }
                    producer.close(Span::default())
                }),
            );
            while let Some(value) = channel.recv(Span::default()).await {
                sink.borrow_mut().push(value);
            }
            Ok(())
        }));
        assert!(report.is_clean());
        assert_eq!(received.borrow().len(), 5);
    }

    #[test]
    fn test_mutual_wait_is_one_deadlock() {
        let scheduler = Scheduler::new();
        let a = Channel::new(&scheduler, None);
        let b = Channel::new(&scheduler, None);
        let (a2, b2) = (a.clone(), b.clone());
        let handle = scheduler.clone();
        let report = scheduler.run(Box::pin(async move {
            handle.spawn(
                "other",
                Box::pin(async move {
                    let _ = a2.recv(Span::default()).await;
                    b2.send(Value::Int(1), Span::default()).await
                }),
            );
            let _ = b.recv(Span::default()).await;
            a.send(Value::Int(1), Span::default()).await
        }));
        assert!(report.main_error.is_none());
        let deadlock = report.deadlock.map(|d| d.message).unwrap_or_default();
        assert!(deadlock.contains("main"));
        assert!(deadlock.contains("other"));
        assert!(scheduler.tasks().is_empty());
    }

    #[test]
    fn test_deadlock_points_at_main_operation() {
        let scheduler = Scheduler::new();
        let channel = Channel::new(&scheduler, None);
        let report = scheduler.run(Box::pin(async move {
            let _ = channel.recv(Span::new(20, 24, 3, 9)).await;
            Ok(())
        }));
        let deadlock = report.deadlock.unwrap_or_else(|| panic!("expected a deadlock"));
        assert_eq!((deadlock.span.line, deadlock.span.column), (3, 9));
        assert!(deadlock.message.contains("main (waiting to receive)"));
    }

    #[test]
    fn test_call_depth_is_per_task() {
        let scheduler = Scheduler::new();
        let handle = scheduler.clone();
        let inner = scheduler.clone();
        let report = scheduler.run(Box::pin(async move {
            assert_eq!(handle.enter_call(), 1);
            assert_eq!(handle.enter_call(), 2);
            handle.spawn(
                "worker",
                Box::pin(async move {
                    assert_eq!(inner.enter_call(), 1);
                    inner.exit_call();
                    Ok(())
                }),
            );
            handle.exit_call();
            assert_eq!(handle.enter_call(), 2);
            Ok(())
        }));
        assert!(report.is_clean());
    }

    #[test]
    fn test_task_error_does_not_stop_main() {
        let scheduler = Scheduler::new();
        let handle = scheduler.clone();
        let report = scheduler.run(Box::pin(async move {
            handle.spawn(
                "failing",
                Box::pin(async move {
                    Err(RuntimeError::invalid_argument("boom", Span::default()))
                }),
            );
            Ok(())
        }));
        assert!(report.main_error.is_none());
        assert_eq!(report.task_errors.len(), 1);
        assert_eq!(report.task_errors[0].0, "failing");
    }
}
