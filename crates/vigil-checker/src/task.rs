//! Tasks: one probe request bound to one concrete target.

use crate::request::ProbeRequest;
use vigil_core::Response;

/// Lifecycle of a task from creation to its terminal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Built by the runner, not yet handed to a pool.
    Created,
    /// Accepted by a worker pool, waiting for or holding a worker.
    Dispatched,
    /// A worker is performing the network probe.
    Executing,
    /// A terminal response has been recorded.
    Completed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed)
    }
}

/// The unit of dispatch: a request paired with a response slot that is
/// filled exactly once.
#[derive(Debug, Clone)]
pub struct Task {
    pub request: ProbeRequest,
    pub response: Option<Response>,
    state: TaskState,
}

impl Task {
    pub fn new(request: ProbeRequest) -> Self {
        Self {
            request,
            response: None,
            state: TaskState::Created,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Mark the task as accepted by a pool.
    pub fn dispatched(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Dispatched;
        }
    }

    /// Mark the task as executing on a worker.
    pub fn executing(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Executing;
        }
    }

    /// Record the terminal response. The first recorded response wins;
    /// later calls are ignored so a task never yields two outcomes.
    pub fn complete(&mut self, response: Response) {
        if self.response.is_none() {
            self.response = Some(response);
        }
        self.state = TaskState::Completed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpRequest;
    use vigil_core::CheckError;

    fn sample_task() -> Task {
        Task::new(ProbeRequest::Http(HttpRequest {
            method: "GET".to_owned(),
            url: "http://127.0.0.1:8080/health".to_owned(),
            host: String::new(),
            headers: Vec::new(),
            body: String::new(),
            insecure_skip_verify: false,
        }))
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut task = sample_task();
        assert_eq!(task.state(), TaskState::Created);
        task.dispatched();
        assert_eq!(task.state(), TaskState::Dispatched);
        task.executing();
        assert_eq!(task.state(), TaskState::Executing);
        task.complete(Response::default());
        assert!(task.state().is_terminal());
    }

    #[test]
    fn test_first_response_wins() {
        let mut task = sample_task();
        task.complete(Response::from_error(CheckError::Timeout("read".to_owned())));
        task.complete(Response::default());
        assert!(task.response.as_ref().map(Response::is_error).unwrap_or(false));
    }

    #[test]
    fn test_no_transition_out_of_completed() {
        let mut task = sample_task();
        task.complete(Response::default());
        task.executing();
        assert_eq!(task.state(), TaskState::Completed);
    }
}
