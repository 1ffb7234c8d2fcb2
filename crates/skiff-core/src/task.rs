use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// A FIFO queue of deferred tasks ("next tick").
///
/// Work scheduled here never runs inside the caller's turn. The owner drains
/// the queue from the top of its loop:
/// 1. **Schedule**: publishers and handlers push closures.
/// 2. **Pop**: one task is taken off the front, releasing the queue borrow.
/// 3. **Run**: the task executes and may schedule more work.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task at the back of the queue.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Run the task at the front of the queue. Returns `false` when empty.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the task runs, tasks may schedule.
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks scheduled while
    /// draining. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}
