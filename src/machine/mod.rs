use crate::queue::Queue;
use crate::utils::ActiveFlag;
use arc_swap::ArcSwap;
use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Name reserved for "no state designated".
pub const NULL_STATE: &str = "__null__";

/// Shared handle to a state callback.
pub type StateFn = Arc<dyn Fn() + Send + Sync>;

/// Shared handle to a transition guard.
pub type GuardFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Worker sizing and idle knobs for a [`StateMachine`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MachineConfig {
    /// Number of pool workers (`None` = logical CPU count).
    pub pool_size: Option<usize>,

    /// Sleep at the deep end of the idle ladder, in microseconds (`None` = 2).
    pub idle_sleep_us: Option<u64>,
}

/// Named-state graph with predicate-guarded transitions and a worker pool
/// executing per-state callbacks.
///
/// States and transitions are registered up front; `start` snapshots the
/// graph and brings up one state-handler thread plus a pool draining the
/// callback queue. The handler enqueues the present state's callback, then
/// evaluates that state's outgoing guards in insertion order — the first
/// guard returning `true` selects the next state. Guard and callback panics
/// are logged and swallowed; they never take the machine down.
///
/// `stop` flips the shared active flag and joins every worker. Dropping the
/// machine stops it. Reaching the final state is an attribute only — the
/// machine halts on explicit `stop`, never on its own.
pub struct StateMachine {
    states: HashMap<String, StateFn>,
    transitions: HashMap<String, Vec<(String, GuardFn)>>,
    initial: String,
    terminal: String,
    present: Arc<ArcSwap<String>>,
    active: ActiveFlag,
    handler: Option<thread::JoinHandle<()>>,
    pool: Vec<thread::JoinHandle<()>>,
    config: MachineConfig,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            states: HashMap::new(),
            transitions: HashMap::new(),
            initial: NULL_STATE.to_string(),
            terminal: NULL_STATE.to_string(),
            present: Arc::new(ArcSwap::from_pointee(NULL_STATE.to_string())),
            active: ActiveFlag::new(false),
            handler: None,
            pool: Vec::new(),
            config,
        }
    }

    /// Register a state with a no-op callback.
    /// Returns `false` if the name is already taken.
    pub fn add_state(&mut self, name: impl Into<String>) -> bool {
        self.add_state_with(name, || {})
    }

    /// Register a state with a callback run by the pool on every visit.
    /// Returns `false` if the name is already taken.
    pub fn add_state_with(
        &mut self,
        name: impl Into<String>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> bool {
        let name = name.into();
        if self.states.contains_key(&name) {
            return false;
        }

        self.states.insert(name, Arc::new(callback));
        true
    }

    /// Register an unconditional transition.
    /// Returns `false` if either state is unknown.
    pub fn add_transition(&mut self, from: &str, to: &str) -> bool {
        self.add_transition_when(from, to, || true)
    }

    /// Register a guarded transition; the edge fires when the guard returns
    /// `true`. Edges out of one state keep insertion order; re-adding an
    /// edge replaces its guard in place. Returns `false` if either state is
    /// unknown.
    pub fn add_transition_when(
        &mut self,
        from: &str,
        to: &str,
        guard: impl Fn() -> bool + Send + Sync + 'static,
    ) -> bool {
        if !self.states.contains_key(from) || !self.states.contains_key(to) {
            return false;
        }

        let guard: GuardFn = Arc::new(guard);
        let edges = self.transitions.entry(from.to_string()).or_default();

        match edges.iter_mut().find(|(name, _)| name == to) {
            Some(edge) => edge.1 = guard,
            None => edges.push((to.to_string(), guard)),
        }

        true
    }

    /// Designate the state the handler starts from. Does not change the
    /// present state. Returns `false` if the name is unknown.
    pub fn set_initial_state(&mut self, name: &str) -> bool {
        if !self.states.contains_key(name) {
            return false;
        }

        self.initial = name.to_string();
        true
    }

    /// Designate a recognized terminal state. The machine never halts on
    /// reaching it; termination is by explicit [`stop`](Self::stop).
    /// Returns `false` if the name is unknown.
    pub fn set_final_state(&mut self, name: &str) -> bool {
        if !self.states.contains_key(name) {
            return false;
        }

        self.terminal = name.to_string();
        true
    }

    /// Name of the state the handler currently holds.
    pub fn present_state(&self) -> String {
        self.present.load().as_ref().clone()
    }

    /// Whether the workers are running.
    pub fn is_active(&self) -> bool {
        self.active.get_acquire()
    }

    /// Set the initial state and start. The name must be registered.
    pub fn start_at(&mut self, initial: &str) -> bool {
        if !self.set_initial_state(initial) {
            tracing::warn!("[StateMachine] start_at: unknown state {initial:?}");
            return false;
        }

        self.start()
    }

    /// Bring up the state handler and the worker pool.
    ///
    /// Returns `true` if already running. Returns `false` (logged) when no
    /// initial state is set, the pool cannot be sized, or a worker fails to
    /// launch; partially spawned workers are joined before returning.
    pub fn start(&mut self) -> bool {
        if self.active.get_acquire() {
            return true;
        }

        if self.initial == NULL_STATE {
            tracing::warn!("[StateMachine] start rejected: no initial state");
            return false;
        }

        if !self.states.contains_key(&self.initial) {
            tracing::warn!(
                "[StateMachine] start rejected: unknown initial state {:?}",
                self.initial
            );
            return false;
        }

        let pool_size = match self.config.pool_size {
            Some(0) => {
                tracing::error!("[StateMachine] start rejected: pool_size override is zero");
                return false;
            }
            Some(n) => n,
            None => match thread::available_parallelism() {
                Ok(n) => n.get(),
                Err(e) => {
                    tracing::error!("[StateMachine] cannot size worker pool: {e}");
                    return false;
                }
            },
        };

        let callbacks: Arc<Queue<StateFn>> = Queue::new_arc();
        let states = Arc::new(self.states.clone());
        let transitions = Arc::new(self.transitions.clone());
        let idle_sleep = Duration::from_micros(self.config.idle_sleep_us.unwrap_or(2));

        self.active.set_release(true);

        for index in 0..pool_size {
            let worker = pool_worker(self.active.clone(), callbacks.clone(), idle_sleep);
            let spawned = thread::Builder::new()
                .name(format!("flux-machine-pool-{index}"))
                .spawn(worker);

            match spawned {
                Ok(join) => self.pool.push(join),
                Err(e) => {
                    tracing::error!("[StateMachine] cannot start pool worker: {e}");
                    self.stop();
                    return false;
                }
            }
        }

        self.present.store(Arc::new(self.initial.clone()));

        let handler = state_handler(
            self.active.clone(),
            self.present.clone(),
            states,
            transitions,
            callbacks,
            idle_sleep,
        );
        let spawned = thread::Builder::new()
            .name("flux-machine-handler".to_string())
            .spawn(handler);

        match spawned {
            Ok(join) => self.handler = Some(join),
            Err(e) => {
                tracing::error!("[StateMachine] cannot start state handler: {e}");
                self.stop();
                return false;
            }
        }

        tracing::debug!(
            "[StateMachine] started: initial {:?}, pool of {pool_size}",
            self.initial
        );

        true
    }

    /// Stop the workers and join them all. Idempotent.
    pub fn stop(&mut self) {
        self.active.set_release(false);

        if let Some(handler) = self.handler.take() {
            let _ = handler.join();
        }

        for worker in self.pool.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StateMachine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pool worker loop: drain the callback queue, survive panics.
fn pool_worker(
    active: ActiveFlag,
    callbacks: Arc<Queue<StateFn>>,
    idle_sleep: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        let backoff = Backoff::new();
        let mut spins: u32 = 0;

        while active.get_acquire() {
            match callbacks.try_dequeue() {
                Some(callback) => {
                    spins = 0;
                    backoff.reset();

                    if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                        tracing::error!("[StateMachine] state callback panicked");
                    }
                }
                None => {
                    spins = spins.saturating_add(1);
                    if spins < 64 {
                        backoff.spin();
                    } else if spins < 256 {
                        backoff.snooze();
                    } else {
                        thread::sleep(idle_sleep);
                    }
                }
            }
        }
    }
}

/// State-handler loop: enqueue the present state's callback, then follow
/// the first outgoing edge whose guard fires. A panicking guard reads as
/// `false`.
fn state_handler(
    active: ActiveFlag,
    present: Arc<ArcSwap<String>>,
    states: Arc<HashMap<String, StateFn>>,
    transitions: Arc<HashMap<String, Vec<(String, GuardFn)>>>,
    callbacks: Arc<Queue<StateFn>>,
    idle_sleep: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        let backoff = Backoff::new();
        let mut spins: u32 = 0;

        while active.get_acquire() {
            let name = present.load_full();

            if let Some(callback) = states.get(name.as_str()) {
                callbacks.enqueue(callback.clone());
            }

            let mut moved = false;
            if let Some(edges) = transitions.get(name.as_str()) {
                for (to, guard) in edges {
                    match panic::catch_unwind(AssertUnwindSafe(|| guard())) {
                        Ok(true) => {
                            present.store(Arc::new(to.clone()));
                            moved = true;
                            break;
                        }
                        Ok(false) => {}
                        Err(_) => {
                            tracing::error!(
                                "[StateMachine] guard {:?} -> {to:?} panicked, treated as false",
                                name.as_str()
                            );
                        }
                    }
                }
            }

            if moved {
                spins = 0;
                backoff.reset();
            } else {
                spins = spins.saturating_add(1);
                if spins < 64 {
                    backoff.spin();
                } else if spins < 256 {
                    backoff.snooze();
                } else {
                    thread::sleep(idle_sleep);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_micros(200));
        }
        false
    }

    #[test]
    fn registration_rejects_duplicates_and_unknowns() {
        let mut machine = StateMachine::new();

        assert!(machine.add_state("up"));
        assert!(!machine.add_state("up"));
        assert!(machine.add_state("down"));

        assert!(machine.add_transition("up", "down"));
        assert!(!machine.add_transition("up", "missing"));
        assert!(!machine.add_transition("missing", "down"));

        assert!(machine.set_initial_state("up"));
        assert!(!machine.set_initial_state("missing"));
        assert!(machine.set_final_state("down"));
        assert!(!machine.set_final_state("missing"));
    }

    #[test]
    fn start_without_initial_state_fails() {
        let mut machine = StateMachine::new();
        machine.add_state("only");

        assert!(!machine.start());
        assert!(!machine.is_active());
    }

    #[test]
    fn start_with_zero_pool_override_fails() {
        let mut machine = StateMachine::with_config(MachineConfig {
            pool_size: Some(0),
            idle_sleep_us: None,
        });
        machine.add_state("only");
        machine.set_initial_state("only");

        assert!(!machine.start());
    }

    #[test]
    fn duplicate_start_is_a_no_op() {
        let mut machine = StateMachine::new();
        machine.add_state("only");

        assert!(machine.start_at("only"));
        assert!(machine.start());
        machine.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let mut machine = StateMachine::new();
        machine.add_state("only");
        assert!(machine.start_at("only"));

        machine.stop();
        machine.stop();
        assert!(!machine.is_active());
    }

    #[test]
    fn callbacks_run_while_parked_in_a_state() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let mut machine = StateMachine::new();
        machine.add_state_with("tick", move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        assert!(machine.start_at("tick"));
        assert!(wait_until(Duration::from_secs(1), || {
            hits.load(Ordering::Relaxed) > 0
        }));
        machine.stop();
    }

    #[test]
    fn guarded_cycle_returns_to_start() {
        let up_hits = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(AtomicBool::new(false));

        let mut machine = StateMachine::new();
        {
            let counter = up_hits.clone();
            machine.add_state_with("up", move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        machine.add_state("down");
        machine.add_transition("up", "down");
        {
            let release = release.clone();
            // fires exactly once per release
            machine.add_transition_when("down", "up", move || {
                release.swap(false, Ordering::AcqRel)
            });
        }

        assert!(machine.start_at("up"));

        // the unconditional edge moves the machine off "up" immediately
        assert!(wait_until(Duration::from_secs(1), || {
            up_hits.load(Ordering::Relaxed) > 0
        }));

        let before = up_hits.load(Ordering::Relaxed);
        release.store(true, Ordering::Release);

        // after the guard fires once, "up" is visited again
        assert!(wait_until(Duration::from_secs(1), || {
            up_hits.load(Ordering::Relaxed) > before
        }));

        let stop_started = Instant::now();
        machine.stop();
        assert!(stop_started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn panicking_guard_reads_as_false() {
        let reached = Arc::new(AtomicBool::new(false));
        let strayed = Arc::new(AtomicBool::new(false));

        let mut machine = StateMachine::new();
        machine.add_state("start");
        {
            let strayed = strayed.clone();
            machine.add_state_with("dead_end", move || {
                strayed.store(true, Ordering::Release);
            });
        }
        {
            let reached = reached.clone();
            machine.add_state_with("goal", move || {
                reached.store(true, Ordering::Release);
            });
        }

        // the first edge always panics; the handler must fall through to
        // the second
        machine.add_transition_when("start", "dead_end", || panic!("guard fault"));
        machine.add_transition_when("start", "goal", || true);

        assert!(machine.start_at("start"));
        assert!(wait_until(Duration::from_secs(1), || {
            reached.load(Ordering::Acquire)
        }));
        assert!(!strayed.load(Ordering::Acquire));
        machine.stop();
    }

    #[test]
    fn panicking_callback_does_not_kill_the_pool() {
        let survivors = Arc::new(AtomicUsize::new(0));

        let mut machine = StateMachine::new();
        {
            let counter = survivors.clone();
            machine.add_state_with("faulty", move || {
                counter.fetch_add(1, Ordering::Relaxed);
                panic!("callback fault");
            });
        }

        assert!(machine.start_at("faulty"));
        assert!(wait_until(Duration::from_secs(1), || {
            survivors.load(Ordering::Relaxed) >= 2
        }));
        machine.stop();
    }

    #[test]
    fn replacing_an_edge_swaps_its_guard() {
        let mut machine = StateMachine::new();
        machine.add_state("a");
        machine.add_state("b");

        assert!(machine.add_transition_when("a", "b", || false));
        assert!(machine.add_transition("a", "b"));

        assert!(machine.start_at("a"));
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut reached = false;
        while Instant::now() < deadline {
            if machine.present_state() == "b" {
                reached = true;
                break;
            }
            thread::sleep(Duration::from_micros(200));
        }
        assert!(reached);
        machine.stop();
    }
}
