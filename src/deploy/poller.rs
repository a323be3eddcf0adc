//! Readiness poller
//!
//! Repeatedly lists a stack's services and their tasks until every monitored
//! service runs at least its desired number of replicas. Control plane
//! failures during the wait are expected while a rollout is in flight, so
//! they only cost a cycle; the wait ends on success, on timeout, or when the
//! caller cancels it.

use super::policy::{ExcludeByName, MonitorPolicy};
use super::sink::StatusSink;
use super::ControlPlane;
use crate::error::{BerthError, Result};
use crate::swarm::task::sort_newest_first;
use crate::swarm::{ServiceDescriptor, TaskDescriptor};
use futures::future::join_all;
use std::future::Future;
use std::pin::{pin, Pin};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Timing knobs for one wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Total budget for the stack to converge, counted after the initial delay
    pub timeout: Duration,
    /// Pause between readiness checks
    pub poll_interval: Duration,
    /// Pause before the first query, while the control plane materializes
    /// the updated services
    pub initial_delay: Duration,
    /// Pause before re-listing when no services are visible yet
    pub empty_retry_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
            initial_delay: Duration::from_secs(10),
            empty_retry_delay: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    /// Check the durations are usable
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(BerthError::InvalidArgument(
                "readiness timeout must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(BerthError::InvalidArgument(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval > self.timeout {
            warn!(
                "Poll interval {:?} exceeds timeout {:?}; only one check will run",
                self.poll_interval, self.timeout
            );
        }
        Ok(())
    }
}

/// What to wait for
#[derive(Debug, Clone)]
pub struct PollRequest {
    /// Stack whose namespace label selects the services
    pub stack_name: String,
    /// Timing
    pub config: PollConfig,
}

impl PollRequest {
    /// Create a request with the given timing
    pub fn new(stack_name: &str, config: PollConfig) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            config,
        }
    }
}

/// Run-state of one monitored service in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReadiness {
    /// Service name
    pub name: String,
    /// Running tasks, `None` when the task query failed this cycle
    pub running: Option<u64>,
    /// Replica target
    pub desired: u64,
    /// Why the service is not ready yet, when known
    pub detail: Option<String>,
}

impl ServiceReadiness {
    fn observe(service: &ServiceDescriptor, tasks: Result<Vec<TaskDescriptor>>) -> Self {
        let desired = service.desired();

        match tasks {
            Ok(mut tasks) => {
                let running = tasks.iter().filter(|t| t.is_running()).count() as u64;
                let detail = if running >= desired {
                    None
                } else {
                    sort_newest_first(&mut tasks);
                    tasks.iter().find(|t| !t.is_running()).map(|t| {
                        match t.error().or_else(|| t.message()) {
                            Some(text) => format!("{}: {}", t.state(), text),
                            None => t.state().to_string(),
                        }
                    })
                };
                Self {
                    name: service.name.clone(),
                    running: Some(running),
                    desired,
                    detail,
                }
            }
            Err(e) => {
                warn!("Failed to list tasks for service {}: {}", service.name, e);
                Self {
                    name: service.name.clone(),
                    running: None,
                    desired,
                    detail: Some(format!("tasks unavailable: {}", e)),
                }
            }
        }
    }

    /// Running count meets the replica target
    pub fn is_ready(&self) -> bool {
        self.running.is_some_and(|running| running >= self.desired)
    }

    /// Display line with the name padded to `width`
    pub fn status_line(&self, width: usize) -> String {
        let running = self
            .running
            .map(|r| r.to_string())
            .unwrap_or_else(|| "?".to_string());
        let mut line = format!(
            "{} {:<width$} {}/{}",
            if self.is_ready() { "✓" } else { "…" },
            self.name,
            running,
            self.desired,
            width = width
        );
        if let Some(ref detail) = self.detail {
            line.push_str("  ");
            line.push_str(detail);
        }
        line
    }
}

/// Per-service readiness for one cycle; discarded after the verdict
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessSnapshot {
    /// Monitored services
    pub services: Vec<ServiceReadiness>,
}

impl ReadinessSnapshot {
    /// Every monitored service is ready
    pub fn all_ready(&self) -> bool {
        self.services.iter().all(ServiceReadiness::is_ready)
    }

    /// Services still short of their target
    pub fn pending(&self) -> Vec<ServiceReadiness> {
        self.services
            .iter()
            .filter(|s| !s.is_ready())
            .cloned()
            .collect()
    }

    /// One display line per monitored service
    pub fn status_lines(&self) -> Vec<String> {
        let width = self.services.iter().map(|s| s.name.len()).max().unwrap_or(0);
        self.services.iter().map(|s| s.status_line(width)).collect()
    }
}

/// Outcome of a wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every monitored service reached its target
    Ready { elapsed: Duration, cycles: u32 },
    /// The budget ran out first
    TimedOut {
        elapsed: Duration,
        cycles: u32,
        /// Services that were not ready on the last evaluated cycle
        pending: Vec<ServiceReadiness>,
    },
    /// The caller stopped the wait
    Cancelled { elapsed: Duration, cycles: u32 },
}

impl Verdict {
    /// Whether the stack converged
    pub fn is_ready(&self) -> bool {
        matches!(self, Verdict::Ready { .. })
    }
}

/// Polls a stack until it converges
pub struct ReadinessPoller<'a> {
    control_plane: &'a dyn ControlPlane,
    policy: Box<dyn MonitorPolicy + 'a>,
    sink: &'a mut dyn StatusSink,
}

impl<'a> ReadinessPoller<'a> {
    /// Create a poller that skips `*init*` services
    pub fn new(control_plane: &'a dyn ControlPlane, sink: &'a mut dyn StatusSink) -> Self {
        Self {
            control_plane,
            policy: Box::new(ExcludeByName::default()),
            sink,
        }
    }

    /// Replace the rule deciding which services are monitored
    pub fn with_policy(mut self, policy: impl MonitorPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Wait until the stack is ready or the timeout elapses
    pub async fn wait_for_ready(&mut self, request: &PollRequest) -> Result<Verdict> {
        self.wait_for_ready_until(request, std::future::pending())
            .await
    }

    /// Like [`wait_for_ready`](Self::wait_for_ready), ending early with
    /// [`Verdict::Cancelled`] once `cancel` completes
    pub async fn wait_for_ready_until<C>(
        &mut self,
        request: &PollRequest,
        cancel: C,
    ) -> Result<Verdict>
    where
        C: Future<Output = ()>,
    {
        let config = &request.config;
        config.validate()?;
        let stack = request.stack_name.as_str();
        let mut cancel = pin!(cancel);

        info!(
            "Waiting for stack {} to converge (timeout {:?})",
            stack, config.timeout
        );

        if race(sleep(config.initial_delay), &mut cancel).await.is_none() {
            return Ok(Verdict::Cancelled {
                elapsed: Duration::ZERO,
                cycles: 0,
            });
        }

        let started = Instant::now();
        let mut cycles = 0u32;
        let mut last: Option<ReadinessSnapshot> = None;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= config.timeout {
                warn!("Stack {} did not converge within {:?}", stack, config.timeout);
                return Ok(Verdict::TimedOut {
                    elapsed,
                    cycles,
                    pending: last.map(|s| s.pending()).unwrap_or_default(),
                });
            }

            let Some(listed) = race(self.control_plane.list_services(stack), &mut cancel).await
            else {
                return Ok(Verdict::Cancelled { elapsed, cycles });
            };

            let pause = match listed {
                Err(e) => {
                    warn!("Failed to list services for stack {}: {}", stack, e);
                    self.sink
                        .render(&[format!("Control plane unavailable, retrying: {}", e)]);
                    config.poll_interval
                }
                Ok(services) if services.is_empty() => {
                    debug!("No services visible yet for stack {}", stack);
                    self.sink
                        .render(&[format!("Waiting for services of stack {} to appear", stack)]);
                    config.empty_retry_delay
                }
                Ok(services) => {
                    let Some(snapshot) = race(self.evaluate(services), &mut cancel).await else {
                        return Ok(Verdict::Cancelled {
                            elapsed: started.elapsed(),
                            cycles,
                        });
                    };
                    cycles += 1;
                    self.sink.render(&snapshot.status_lines());

                    if snapshot.all_ready() {
                        let elapsed = started.elapsed();
                        info!(
                            "Stack {} ready after {:?} ({} checks)",
                            stack, elapsed, cycles
                        );
                        return Ok(Verdict::Ready { elapsed, cycles });
                    }

                    debug!(
                        "Stack {} not ready: {} of {} services pending",
                        stack,
                        snapshot.pending().len(),
                        snapshot.services.len()
                    );
                    last = Some(snapshot);
                    config.poll_interval
                }
            };

            let remaining = config.timeout.saturating_sub(started.elapsed());
            if race(sleep(pause.min(remaining)), &mut cancel).await.is_none() {
                return Ok(Verdict::Cancelled {
                    elapsed: started.elapsed(),
                    cycles,
                });
            }
        }
    }

    /// Fetch tasks for every monitored service and join before judging
    async fn evaluate(&self, services: Vec<ServiceDescriptor>) -> ReadinessSnapshot {
        let monitored: Vec<ServiceDescriptor> = services
            .into_iter()
            .filter(|s| {
                let keep = self.policy.is_monitored(s);
                if !keep {
                    debug!("Skipping excluded service {}", s.name);
                }
                keep
            })
            .collect();

        let tasks = join_all(
            monitored
                .iter()
                .map(|s| self.control_plane.list_tasks(&s.id)),
        )
        .await;

        ReadinessSnapshot {
            services: monitored
                .iter()
                .zip(tasks)
                .map(|(service, tasks)| ServiceReadiness::observe(service, tasks))
                .collect(),
        }
    }
}

/// Drive `fut` unless `cancel` completes first
async fn race<T, C>(fut: impl Future<Output = T>, cancel: &mut Pin<&mut C>) -> Option<T>
where
    C: Future<Output = ()>,
{
    tokio::select! {
        value = fut => Some(value),
        _ = cancel.as_mut() => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::sink::RecordingSink;
    use crate::swarm::task::TaskStatus;
    use crate::swarm::TaskState;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// What one `list_services` call sees
    enum Step {
        Fail,
        Stack(Vec<(ServiceDescriptor, Vec<TaskDescriptor>)>),
    }

    /// Replays steps in order, repeating the last one
    struct ScriptedControlPlane {
        steps: Mutex<VecDeque<Step>>,
        tasks: Mutex<HashMap<String, Vec<TaskDescriptor>>>,
        failing_tasks: Vec<String>,
        service_calls: Mutex<u32>,
    }

    impl ScriptedControlPlane {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                tasks: Mutex::new(HashMap::new()),
                failing_tasks: Vec::new(),
                service_calls: Mutex::new(0),
            }
        }

        fn steady(services: Vec<(ServiceDescriptor, Vec<TaskDescriptor>)>) -> Self {
            Self::new(vec![Step::Stack(services)])
        }

        fn calls(&self) -> u32 {
            *self.service_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ControlPlane for ScriptedControlPlane {
        async fn list_services(&self, _stack_name: &str) -> Result<Vec<ServiceDescriptor>> {
            *self.service_calls.lock().unwrap() += 1;
            let mut steps = self.steps.lock().unwrap();
            let step = if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                match steps.front().unwrap() {
                    Step::Fail => Step::Fail,
                    Step::Stack(s) => Step::Stack(s.clone()),
                }
            };

            match step {
                Step::Fail => Err(BerthError::Transport {
                    status: 502,
                    message: "Bad Gateway".to_string(),
                }),
                Step::Stack(services) => {
                    let mut tasks = self.tasks.lock().unwrap();
                    tasks.clear();
                    let mut listed = Vec::new();
                    for (service, service_tasks) in services {
                        tasks.insert(service.id.clone(), service_tasks);
                        listed.push(service);
                    }
                    Ok(listed)
                }
            }
        }

        async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskDescriptor>> {
            if self.failing_tasks.iter().any(|id| id == service_id) {
                return Err(BerthError::Transport {
                    status: 500,
                    message: "task list failed".to_string(),
                });
            }
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .get(service_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn service(name: &str, desired: Option<u64>) -> ServiceDescriptor {
        ServiceDescriptor::new(&format!("id-{}", name), name, desired)
    }

    fn task(state: TaskState) -> TaskDescriptor {
        TaskDescriptor {
            id: "task".to_string(),
            status: TaskStatus {
                state,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn running(n: usize) -> Vec<TaskDescriptor> {
        (0..n).map(|_| task(TaskState::Running)).collect()
    }

    fn config(timeout_secs: u64, interval_secs: u64) -> PollConfig {
        PollConfig {
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_secs(interval_secs),
            initial_delay: Duration::from_secs(10),
            empty_retry_delay: Duration::from_secs(1),
        }
    }

    fn assert_near(actual: Duration, secs: u64) {
        let expected = Duration::from_secs(secs);
        let drift = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            drift < Duration::from_millis(50),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    fn demo_stack(b_running: usize) -> Vec<(ServiceDescriptor, Vec<TaskDescriptor>)> {
        vec![
            (service("demo_a", Some(2)), running(2)),
            (service("demo_b", Some(1)), running(b_running)),
            (
                service("demo_init", Some(1)),
                vec![task(TaskState::Complete)],
            ),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_stack_ready() {
        let plane = ScriptedControlPlane::steady(demo_stack(1));
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(60, 5));

        let begin = Instant::now();
        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();

        assert_eq!(
            verdict,
            Verdict::Ready {
                elapsed: Duration::ZERO,
                cycles: 1
            }
        );
        // Returned right after the grace delay, not at the end of the budget
        assert_near(begin.elapsed(), 10);
        assert_eq!(plane.calls(), 1);

        let lines = sink.last().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.contains("demo_init")));
        assert!(lines[0].contains("demo_a") && lines[0].contains("2/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_service_times_out() {
        let plane = ScriptedControlPlane::steady(demo_stack(0));
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(12, 5));

        let begin = Instant::now();
        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();

        match verdict {
            Verdict::TimedOut {
                elapsed,
                cycles,
                pending,
            } => {
                assert_eq!(cycles, 3);
                assert_near(elapsed, 12);
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].name, "demo_b");
                assert_eq!(pending[0].running, Some(0));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_near(begin.elapsed(), 22);
        assert_eq!(sink.frames.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_count_matches_budget() {
        for (timeout, interval, expected) in [(30, 5, 6), (10, 3, 4), (5, 10, 1)] {
            let plane = ScriptedControlPlane::steady(demo_stack(0));
            let mut sink = RecordingSink::new();
            let request = PollRequest::new("demo", config(timeout, interval));

            let verdict = ReadinessPoller::new(&plane, &mut sink)
                .wait_for_ready(&request)
                .await
                .unwrap();

            match verdict {
                Verdict::TimedOut { cycles, .. } => assert_eq!(cycles, expected),
                other => panic!("expected timeout, got {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_list_failure_is_retried() {
        let plane = ScriptedControlPlane::new(vec![
            Step::Stack(demo_stack(0)),
            Step::Fail,
            Step::Stack(demo_stack(1)),
        ]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(60, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();

        match verdict {
            Verdict::Ready { elapsed, cycles } => {
                assert_eq!(cycles, 2);
                assert_near(elapsed, 10);
            }
            other => panic!("expected ready, got {:?}", other),
        }
        assert_eq!(plane.calls(), 3);
        assert!(sink.frames[1][0].contains("Control plane unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_service_list_is_not_ready() {
        let plane = ScriptedControlPlane::new(vec![
            Step::Stack(vec![]),
            Step::Stack(vec![]),
            Step::Stack(vec![]),
            Step::Stack(demo_stack(1)),
        ]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(60, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();

        // Three short retries, then ready on the first evaluated cycle
        match verdict {
            Verdict::Ready { elapsed, cycles } => {
                assert_eq!(cycles, 1);
                assert_near(elapsed, 3);
            }
            other => panic!("expected ready, got {:?}", other),
        }
        assert!(sink.frames[0][0].contains("Waiting for services of stack demo"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_visible_stack_times_out() {
        let plane = ScriptedControlPlane::steady(vec![]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("ghost", config(10, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();

        match verdict {
            Verdict::TimedOut {
                cycles, pending, ..
            } => {
                assert_eq!(cycles, 0);
                assert!(pending.is_empty());
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // Re-listed every second rather than every poll interval
        assert_eq!(plane.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_service_never_blocks() {
        let plane = ScriptedControlPlane::steady(vec![
            (service("demo_web", Some(1)), running(1)),
            (
                service("demo_db-init", Some(3)),
                vec![task(TaskState::Failed)],
            ),
        ]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(30, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();
        assert!(verdict.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_excluded_services_is_ready() {
        let plane = ScriptedControlPlane::steady(vec![(
            service("demo_init", Some(1)),
            vec![task(TaskState::Complete)],
        )]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(30, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::Ready { cycles: 1, .. }));
        assert_eq!(sink.frames.len(), 1);
        assert!(sink.last().unwrap().is_empty());
        assert_eq!(plane.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        let plane = ScriptedControlPlane::steady(vec![
            (service("demo_web", Some(1)), running(1)),
            (service("demo_worker", Some(2)), running(0)),
        ]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(30, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .with_policy(|s: &ServiceDescriptor| !s.name.ends_with("_worker"))
            .wait_for_ready(&request)
            .await
            .unwrap();
        assert!(verdict.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verdict_ignores_service_order() {
        let cases: Vec<(Vec<(ServiceDescriptor, Vec<TaskDescriptor>)>, bool)> = vec![
            (vec![(service("s_a", Some(3)), running(3))], true),
            (vec![(service("s_a", Some(3)), running(4))], true),
            (vec![(service("s_a", Some(3)), running(2))], false),
            (
                vec![
                    (service("s_a", None), running(1)),
                    (service("s_b", Some(2)), running(2)),
                ],
                true,
            ),
            (
                vec![
                    (service("s_a", None), running(0)),
                    (service("s_b", Some(2)), running(2)),
                ],
                false,
            ),
            (vec![(service("s_zero", Some(0)), vec![])], true),
        ];

        for (services, expected) in cases {
            let mut reversed = services.clone();
            reversed.reverse();

            for order in [services.clone(), reversed] {
                let plane = ScriptedControlPlane::steady(order);
                let mut sink = RecordingSink::new();
                let request = PollRequest::new("s", config(4, 5));
                let verdict = ReadinessPoller::new(&plane, &mut sink)
                    .wait_for_ready(&request)
                    .await
                    .unwrap();
                assert_eq!(verdict.is_ready(), expected);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unspecified_replicas_need_one_running() {
        let plane = ScriptedControlPlane::steady(vec![(
            service("demo_api", None),
            vec![task(TaskState::Starting), task(TaskState::Shutdown)],
        )]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(10, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();
        assert!(!verdict.is_ready());
        assert!(sink.last().unwrap()[0].contains("0/1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_query_failure_marks_service_unknown() {
        let mut plane = ScriptedControlPlane::steady(vec![
            (service("demo_web", Some(1)), running(1)),
            (service("demo_api", Some(1)), running(1)),
        ]);
        plane.failing_tasks = vec!["id-demo_api".to_string()];
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(10, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();

        match verdict {
            Verdict::TimedOut { pending, .. } => {
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].running, None);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        let lines = sink.last().unwrap();
        assert!(lines[0].contains("1/1"));
        assert!(lines[1].contains("?/1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_line_shows_latest_task_error() {
        let mut failed = task(TaskState::Failed);
        failed.status.err = Some("task: non-zero exit (1)".to_string());
        let plane =
            ScriptedControlPlane::steady(vec![(service("demo_web", Some(1)), vec![failed])]);
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(5, 5));

        ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready(&request)
            .await
            .unwrap();
        assert!(sink.last().unwrap()[0].ends_with("failed: task: non-zero exit (1)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let plane = ScriptedControlPlane::steady(demo_stack(0));
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(300, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready_until(&request, sleep(Duration::from_secs(22)))
            .await
            .unwrap();

        match verdict {
            Verdict::Cancelled { elapsed, cycles } => {
                assert_eq!(cycles, 3);
                assert_near(elapsed, 12);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_initial_delay() {
        let plane = ScriptedControlPlane::steady(demo_stack(1));
        let mut sink = RecordingSink::new();
        let request = PollRequest::new("demo", config(300, 5));

        let verdict = ReadinessPoller::new(&plane, &mut sink)
            .wait_for_ready_until(&request, sleep(Duration::from_secs(1)))
            .await
            .unwrap();

        assert!(matches!(verdict, Verdict::Cancelled { cycles: 0, .. }));
        assert_eq!(plane.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejects_zero_durations() {
        let plane = ScriptedControlPlane::steady(vec![]);
        let mut sink = RecordingSink::new();
        let mut poller = ReadinessPoller::new(&plane, &mut sink);

        let zero_timeout = PollRequest::new("demo", config(0, 5));
        assert!(matches!(
            poller.wait_for_ready(&zero_timeout).await,
            Err(BerthError::InvalidArgument(_))
        ));

        let zero_interval = PollRequest::new("demo", config(5, 0));
        assert!(matches!(
            poller.wait_for_ready(&zero_interval).await,
            Err(BerthError::InvalidArgument(_))
        ));
        assert_eq!(plane.calls(), 0);
    }

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.initial_delay, Duration::from_secs(10));
        assert_eq!(config.empty_retry_delay, Duration::from_secs(5));
    }
}
