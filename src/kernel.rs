//! Contains the [`Kernel`] type
//!
//! The kernel holds everything the switch protocol needs: the task pool, the
//! master policy, which task is running, the switch-inhibit flag and the tick
//! counters. It is the only thing that ever asks the [`Port`] to switch.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

use alloc::boxed::Box;

use crate::{
    Lock, TaskId, TaskState, log,
    policy::{AdmitError, DelayPolicy, Policy},
    port::{Port, TimerTarget},
    task::TaskPool,
};

/// What the timer interrupt is allowed to do
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Mode {
    /// Tasks only switch when they call [`Kernel::yield_now`]. The timer
    /// still counts ticks, so delayed tasks still become due.
    Cooperative,
    /// The timer also switches tasks, on every tick.
    #[default]
    Preemptive,
}

/// Kernel settings, fixed when the kernel is built
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Whether the timer interrupt switches tasks
    pub mode: Mode,
    /// How many tasks can be alive at once
    pub max_tasks: usize,
    /// The heartbeat changes level every this many ticks. Zero turns it off.
    pub heartbeat_period: u32,
}

impl Config {
    /// Default number of task slots
    pub const DEFAULT_MAX_TASKS: usize = 8;

    /// Default heartbeat period, in ticks
    pub const DEFAULT_HEARTBEAT_PERIOD: u32 = 100;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: Mode::default(),
            max_tasks: Config::DEFAULT_MAX_TASKS,
            heartbeat_period: Config::DEFAULT_HEARTBEAT_PERIOD,
        }
    }
}

/// Why a task could not be spawned
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SpawnError {
    /// Every task slot holds a live task
    PoolFull,
    /// The port cannot start a task on a stack this small
    StackTooSmall {
        /// The size asked for
        requested: usize,
        /// The smallest size the port supports
        minimum: usize,
    },
}

impl core::fmt::Display for SpawnError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SpawnError::PoolFull => write!(fmt, "no free task slot"),
            SpawnError::StackTooSmall { requested, minimum } => write!(
                fmt,
                "stack of {} bytes is smaller than the minimum of {}",
                requested, minimum
            ),
        }
    }
}

impl core::error::Error for SpawnError {}

/// Sets up a [`Kernel`]
pub struct KernelBuilder<P> {
    port: P,
    config: Config,
}

impl<P: Port> KernelBuilder<P> {
    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Choose whether the timer switches tasks
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Choose how many tasks can be alive at once
    pub fn max_tasks(mut self, max_tasks: usize) -> Self {
        self.config.max_tasks = max_tasks;
        self
    }

    /// Choose how many ticks pass between heartbeat changes
    pub fn heartbeat_period(mut self, ticks: u32) -> Self {
        self.config.heartbeat_period = ticks;
        self
    }

    /// Build the kernel, with `master` as the policy that picks every task
    pub fn build<S: Policy>(self, master: S) -> Kernel<P, S> {
        Kernel {
            state: UnsafeCell::new(State {
                tasks: TaskPool::new(self.config.max_tasks),
                current: None,
                ambient: P::Context::default(),
                master,
            }),
            inhibit: AtomicBool::new(false),
            pending_ticks: AtomicU32::new(0),
            ticks: AtomicU32::new(0),
            beats: AtomicU32::new(0),
            port: self.port,
            config: self.config,
        }
    }
}

/// The parts of the kernel only touched with switching held off
struct State<C, S> {
    tasks: TaskPool<C>,
    /// Index of the running task, or `None` when the ambient context runs
    current: Option<usize>,
    /// Where we go when no task is ready
    ambient: C,
    master: S,
}

/// A task scheduler, driving tasks through a [`Port`] as chosen by a
/// [`Policy`].
///
/// Tasks get hold of the kernel through a `&'static` reference, so a kernel
/// normally lives in a `static` or is leaked.
pub struct Kernel<P: Port, S> {
    /// Only accessed with switching inhibited, or inside `Port::critical`
    /// with the inhibit flag clear.
    state: UnsafeCell<State<P::Context, S>>,
    /// The switch-inhibit flag. Set while any [`Lock`] is held.
    inhibit: AtomicBool,
    /// Ticks not yet given to the policy
    pending_ticks: AtomicU32,
    /// Ticks since the kernel was built
    ticks: AtomicU32,
    /// Ticks counted towards the heartbeat
    beats: AtomicU32,
    port: P,
    config: Config,
}

/// SAFETY: The state in the `UnsafeCell` is only touched by the code that
/// holds the single (logical) CPU: either with switching inhibited, so no
/// other task can run, or inside the port's critical section, so the timer
/// interrupt cannot run.
unsafe impl<P, S> Sync for Kernel<P, S>
where
    P: Port + Sync,
    P::Context: Send,
    S: Send,
{
}

impl<P: Port> Kernel<P, ()> {
    /// Start building a kernel that runs on the given port
    pub fn builder(port: P) -> KernelBuilder<P> {
        KernelBuilder {
            port,
            config: Config::default(),
        }
    }
}

impl<P: Port, S: Policy> Kernel<P, S> {
    /// Create a task which runs `entry_fn` on its own `stack_bytes` byte
    /// stack.
    ///
    /// The task does nothing until it is admitted to the master policy and
    /// selected.
    pub fn spawn<F>(&self, stack_bytes: usize, entry_fn: F) -> Result<TaskId, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        if stack_bytes < P::MIN_STACK {
            return Err(SpawnError::StackTooSmall {
                requested: stack_bytes,
                minimum: P::MIN_STACK,
            });
        }
        let _lock = self.lock();
        // SAFETY: switching is inhibited
        let state = unsafe { self.state() };
        let task = state
            .tasks
            .insert(stack_bytes, Box::new(entry_fn))
            .ok_or(SpawnError::PoolFull)?;
        log::debug!("Spawned {} with {=usize} byte stack", task, stack_bytes);
        Ok(task)
    }

    /// Admit a task to the master policy
    pub fn admit(&self, task: TaskId) -> Result<(), AdmitError> {
        let _lock = self.lock();
        // SAFETY: switching is inhibited
        let state = unsafe { self.state() };
        if !state.tasks.is_live(task) {
            return Err(AdmitError::NotLive);
        }
        state.master.admit(task)
    }

    /// Remove a task from the master policy, so it is never selected again.
    ///
    /// Evicting the running task does not stop it: follow up with
    /// [`Kernel::yield_now`] to actually leave it. Returns `true` if the
    /// policy held the task.
    pub fn evict(&self, task: TaskId) -> bool {
        let _lock = self.lock();
        // SAFETY: switching is inhibited
        let state = unsafe { self.state() };
        state.master.evict(task)
    }

    /// Look at or change the master policy, with switching inhibited
    pub fn with_policy<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let _lock = self.lock();
        // SAFETY: switching is inhibited
        let state = unsafe { self.state() };
        f(&mut state.master)
    }

    /// Stop task switching until the returned [`Lock`] is dropped
    pub fn lock(&self) -> Lock<'_> {
        Lock::new(&self.inhibit)
    }

    /// Is task switching currently inhibited?
    pub fn is_locked(&self) -> bool {
        self.inhibit.load(Ordering::Acquire)
    }

    /// Which task is running, or `None` if it's the ambient context
    pub fn current(&self) -> Option<TaskId> {
        self.port.critical(|| {
            // SAFETY: we are in the port's critical section and only read
            let state = unsafe { self.state() };
            state.current.map(|idx| state.tasks.id_at(idx))
        })
    }

    /// Where a task is in its lifecycle, or `None` if the id is stale
    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        self.port.critical(|| {
            // SAFETY: we are in the port's critical section and only read
            let state = unsafe { self.state() };
            state.tasks.get(task).map(|slot| slot.state)
        })
    }

    /// How many tasks are alive (created or started)
    pub fn live_tasks(&self) -> usize {
        self.port.critical(|| {
            // SAFETY: we are in the port's critical section and only read
            unsafe { self.state() }.tasks.live()
        })
    }

    /// Ticks counted since the kernel was built
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// The settings this kernel was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The port this kernel runs on
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Start running tasks.
    ///
    /// Call this from the ambient context (e.g. `main`). It returns whenever
    /// no task is ready, and can be called again later to carry on.
    pub fn run(&'static self) {
        log::info!("Scheduler running, {} mode", self.config.mode);
        self.reschedule();
        log::debug!("Back in the ambient context");
    }

    /// Let another task run.
    ///
    /// Does nothing while a [`Lock`] is held, or if the policy picks the
    /// calling task again.
    pub fn yield_now(&'static self) {
        self.reschedule();
    }

    /// Call this once per timer period, from the timer interrupt.
    ///
    /// Counts the tick and drives the heartbeat. In [`Mode::Preemptive`] it
    /// then runs the switch protocol, which may switch away from the code
    /// that was interrupted.
    pub fn timer_interrupt(&'static self) {
        self.port.critical(|| {
            self.bump(&self.ticks);
            self.bump(&self.pending_ticks);
            self.beat();
        });
        match self.config.mode {
            Mode::Preemptive => self.reschedule(),
            Mode::Cooperative => self.port.critical(|| {
                if !self.is_locked() {
                    // SAFETY: switching is not inhibited and we are in the
                    // port's critical section
                    let state = unsafe { self.state() };
                    self.deliver_ticks(&mut state.master);
                }
            }),
        }
    }

    /// Get at the kernel state.
    ///
    /// # Safety
    ///
    /// Either switching must be inhibited (and the caller is task or ambient
    /// code), or the caller must be inside `Port::critical` with switching
    /// not inhibited. The reference must not be held across a switch.
    #[allow(clippy::mut_from_ref)]
    unsafe fn state(&self) -> &mut State<P::Context, S> {
        unsafe { &mut *self.state.get() }
    }

    /// Add one to a counter. Must be called inside `Port::critical`.
    ///
    /// A load and a store, because Armv6-M has no atomic read-modify-write.
    fn bump(&self, counter: &AtomicU32) {
        counter.store(counter.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
    }

    /// Advance the heartbeat. Must be called inside `Port::critical`.
    fn beat(&self) {
        let period = self.config.heartbeat_period;
        if period == 0 {
            return;
        }
        let beats = self.beats.load(Ordering::Relaxed).wrapping_add(1);
        self.beats.store(beats, Ordering::Relaxed);
        if beats % period == 0 {
            self.port.heartbeat((beats / period) % 2 == 1);
        }
    }

    /// Hand any ticks that arrived while switching was inhibited to the
    /// policy. Must be called inside `Port::critical`.
    fn deliver_ticks(&self, master: &mut S) {
        let pending = self.pending_ticks.load(Ordering::Relaxed);
        self.pending_ticks.store(0, Ordering::Relaxed);
        for _ in 0..pending {
            master.tick();
        }
    }

    /// The switch protocol
    fn reschedule(&'static self) {
        self.port.critical(|| {
            if self.is_locked() {
                log::trace!("Switching inhibited");
                return;
            }
            // SAFETY: switching is not inhibited, so no task is part way
            // through changing the state, and we are in the port's critical
            // section.
            let state = unsafe { self.state() };
            self.deliver_ticks(&mut state.master);
            let next = Self::select_live(state);
            if let Some((from, to)) = self.plan(state, next) {
                // SAFETY: `plan` gives us pointers into the task pool, which
                // never moves, and into `self`, which is 'static.
                unsafe { self.port.switch(from, to) };
            }
        });
    }

    /// Ask the policy for a task, skipping any that are no longer alive.
    fn select_live(state: &mut State<P::Context, S>) -> Option<TaskId> {
        loop {
            let task = state.master.select()?;
            if state.tasks.is_live(task) {
                return Some(task);
            }
            log::warning!("Policy picked dead task {}, evicting it", task);
            if !state.master.evict(task) {
                panic!("Policy picked {} but does not hold it", task);
            }
        }
    }

    /// Work out which contexts to switch between, and make `next` the
    /// current task.
    ///
    /// Returns `None` if `next` is already running. A task selected for the
    /// first time gets a fresh context on its own stack.
    fn plan(
        &'static self,
        state: &mut State<P::Context, S>,
        next: Option<TaskId>,
    ) -> Option<(*mut P::Context, *const P::Context)> {
        if state.current == next.map(TaskId::index) {
            return None;
        }

        let to: *const P::Context = match next {
            None => {
                log::trace!("Nothing ready");
                &raw const state.ambient
            }
            Some(task) => {
                let slot = state.tasks.slot_mut(task.index());
                if slot.state == TaskState::Created {
                    log::debug!("Starting {}", task);
                    let Some(stack) = slot.stack.as_mut() else {
                        panic!("Task {} has no stack", task);
                    };
                    slot.state = TaskState::Started;
                    // SAFETY: the stack belongs to this task alone until it
                    // terminates
                    slot.context = unsafe {
                        self.port.prepare(
                            stack,
                            task_entry::<P, S>,
                            self as *const Self as usize,
                            task.index(),
                        )
                    };
                }
                &raw const slot.context
            }
        };

        let from: *mut P::Context = match state.current {
            None => &raw mut state.ambient,
            Some(idx) => &raw mut state.tasks.slot_mut(idx).context,
        };

        log::trace!("Switch to {}", next);
        state.current = next.map(TaskId::index);
        Some((from, to))
    }

    /// A task's entry function has returned.
    ///
    /// Evict it, then switch away for the last time.
    fn terminate(&'static self, index: usize) {
        let _task = {
            let _lock = self.lock();
            // SAFETY: switching is inhibited
            let state = unsafe { self.state() };
            let task = state.tasks.id_at(index);
            state.master.evict(task);
            let slot = state.tasks.slot_mut(index);
            slot.state = TaskState::Terminated;
            slot.entry_fn = None;
            task
        };
        log::debug!("{} finished", _task);

        self.port.critical(|| {
            // We ignore the inhibit flag here: a finished task cannot carry
            // on running.
            // SAFETY: we are in the port's critical section, and the task
            // that could have been changing the state is us.
            let state = unsafe { self.state() };
            self.deliver_ticks(&mut state.master);
            let next = Self::select_live(state);
            if let Some((from, to)) = self.plan(state, next) {
                // SAFETY: as for `reschedule`. Nothing switches back to a
                // terminated task.
                unsafe { self.port.exit(from, to) };
            }
        });
    }
}

impl<P: Port, S: DelayPolicy> Kernel<P, S> {
    /// Admit a task to the master policy, to become ready after `countdown`
    /// ticks.
    ///
    /// See [`DelayPolicy::admit_delayed`]. Returns the countdown actually
    /// used.
    pub fn admit_delayed(
        &self,
        task: TaskId,
        countdown: u32,
        retry_on_collision: bool,
    ) -> Result<u32, AdmitError> {
        let _lock = self.lock();
        // SAFETY: switching is inhibited
        let state = unsafe { self.state() };
        if !state.tasks.is_live(task) {
            return Err(AdmitError::NotLive);
        }
        state
            .master
            .admit_delayed(task, countdown, retry_on_collision)
    }
}

impl<P, S> TimerTarget for Kernel<P, S>
where
    P: Port,
    S: Policy,
{
    fn timer_interrupt(&'static self) {
        Kernel::timer_interrupt(self);
    }
}

/// Every task starts here, on its own stack.
///
/// `kernel` is the address of the kernel and `index` the task's pool slot.
extern "C-unwind" fn task_entry<P, S>(kernel: usize, index: usize)
where
    P: Port + 'static,
    S: Policy + 'static,
{
    // SAFETY: `Kernel::plan` passed the address of a 'static kernel
    let kernel: &'static Kernel<P, S> = unsafe { &*(kernel as *const Kernel<P, S>) };

    let entry_fn = {
        let _lock = kernel.lock();
        // SAFETY: switching is inhibited
        let state = unsafe { kernel.state() };
        state.tasks.slot_mut(index).entry_fn.take()
    };

    // However the entry function ends, this task must leave the scheduler
    scopeguard::defer! {
        kernel.terminate(index);
    }

    if let Some(entry_fn) = entry_fn {
        entry_fn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::{Combined, DelayOrdered, RoundRobin},
        port::hosted::Hosted,
    };
    use alloc::{boxed::Box, vec::Vec};
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    const STACK: usize = 1024;

    type Journal = Arc<Mutex<Vec<&'static str>>>;

    fn leak<S: Policy + Send + 'static>(kernel: Kernel<Hosted, S>) -> &'static Kernel<Hosted, S> {
        Box::leak(Box::new(kernel))
    }

    fn note(journal: &Journal, entry: &'static str) {
        journal.lock().unwrap().push(entry);
    }

    fn entries(journal: &Journal) -> Vec<&'static str> {
        journal.lock().unwrap().clone()
    }

    /// Wraps a round-robin, counting calls so tests can see when the
    /// switch protocol consulted it.
    struct Watched {
        inner: RoundRobin,
        selects: Arc<AtomicUsize>,
        ticks: Arc<AtomicUsize>,
    }

    impl Policy for Watched {
        fn select(&mut self) -> Option<TaskId> {
            self.selects.fetch_add(1, Ordering::SeqCst);
            self.inner.select()
        }

        fn admit(&mut self, task: TaskId) -> Result<(), AdmitError> {
            self.inner.admit(task)
        }

        fn evict(&mut self, task: TaskId) -> bool {
            self.inner.evict(task)
        }

        fn tick(&mut self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn round_robin_interleaves_then_survivor_runs_alone() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(2, false)));
        let journal = Journal::default();

        let j = journal.clone();
        let a = kernel
            .spawn(STACK, move || {
                for _ in 0..3 {
                    note(&j, "A");
                    kernel.yield_now();
                }
            })
            .unwrap();
        let j = journal.clone();
        let b = kernel
            .spawn(STACK, move || {
                for _ in 0..6 {
                    note(&j, "B");
                    kernel.yield_now();
                }
            })
            .unwrap();
        kernel.admit(a).unwrap();
        kernel.admit(b).unwrap();

        kernel.run();

        assert_eq!(
            entries(&journal),
            ["A", "B", "A", "B", "A", "B", "B", "B", "B"]
        );
        assert_eq!(kernel.task_state(a), Some(TaskState::Terminated));
        assert_eq!(kernel.task_state(b), Some(TaskState::Terminated));
        assert!(kernel.with_policy(|p| p.is_empty()));
        assert_eq!(kernel.current(), None);
    }

    #[test]
    fn nothing_admitted_means_run_returns_at_once() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(2, false)));
        let task = kernel.spawn(STACK, || {}).unwrap();
        kernel.run();
        assert_eq!(kernel.task_state(task), Some(TaskState::Created));
    }

    #[test]
    fn evicted_task_is_parked_until_readmitted() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(2, false)));
        let journal = Journal::default();
        let j = journal.clone();
        let task = kernel
            .spawn(STACK, move || {
                note(&j, "before");
                let me = kernel.current().unwrap();
                kernel.evict(me);
                kernel.yield_now();
                note(&j, "after");
            })
            .unwrap();
        kernel.admit(task).unwrap();

        kernel.run();
        assert_eq!(entries(&journal), ["before"]);
        assert_eq!(kernel.task_state(task), Some(TaskState::Started));

        kernel.admit(task).unwrap();
        kernel.run();
        assert_eq!(entries(&journal), ["before", "after"]);
        assert_eq!(kernel.task_state(task), Some(TaskState::Terminated));
    }

    #[test]
    fn yield_does_nothing_while_locked() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(2, false)));
        let journal = Journal::default();
        let j = journal.clone();
        let a = kernel
            .spawn(STACK, move || {
                {
                    let _lock = kernel.lock();
                    note(&j, "A1");
                    kernel.yield_now();
                    kernel.timer_interrupt();
                    note(&j, "A2");
                }
                kernel.yield_now();
                note(&j, "A3");
            })
            .unwrap();
        let j = journal.clone();
        let b = kernel.spawn(STACK, move || note(&j, "B")).unwrap();
        kernel.admit(a).unwrap();
        kernel.admit(b).unwrap();

        kernel.run();
        assert_eq!(entries(&journal), ["A1", "A2", "B", "A3"]);
        assert!(!kernel.is_locked());
    }

    #[test]
    fn lock_hides_intermediate_state_from_the_timer() {
        let selects = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(AtomicUsize::new(0));
        let kernel = leak(Kernel::builder(Hosted::new()).build(Watched {
            inner: RoundRobin::new(2, false),
            selects: selects.clone(),
            ticks: ticks.clone(),
        }));
        let task = kernel.spawn(STACK, || {}).unwrap();

        // fire the timer before, between and after every step
        let lock = kernel.lock();
        kernel.timer_interrupt();
        kernel.admit(task).unwrap();
        kernel.timer_interrupt();
        assert!(kernel.evict(task));
        kernel.timer_interrupt();
        assert_eq!(selects.load(Ordering::SeqCst), 0);
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        drop(lock);

        // the held-back ticks arrive with the next uninhibited switch
        kernel.timer_interrupt();
        assert_eq!(selects.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert_eq!(kernel.now(), 4);
        assert_eq!(kernel.task_state(task), Some(TaskState::Created));
    }

    #[test]
    fn preemption_brings_in_a_due_delay_task() {
        let policy = Combined::new(DelayOrdered::new(2, false), RoundRobin::new(2, true));
        let kernel = leak(Kernel::builder(Hosted::new()).build(policy));
        let journal = Journal::default();

        let j = journal.clone();
        let plain = kernel
            .spawn(STACK, move || {
                for _ in 0..6 {
                    note(&j, "P");
                    kernel.timer_interrupt();
                }
            })
            .unwrap();
        let j = journal.clone();
        let delayed = kernel.spawn(STACK, move || note(&j, "D")).unwrap();
        kernel.admit(plain).unwrap();
        assert_eq!(kernel.admit_delayed(delayed, 3, false), Ok(3));

        kernel.run();

        assert_eq!(entries(&journal), ["P", "P", "P", "D", "P", "P", "P"]);
        assert_eq!(kernel.now(), 6);
        // termination cleared the delayed task out of both members
        kernel.with_policy(|p| {
            assert_eq!(p.delayed().occupied(), 0);
            assert!(p.round().is_empty());
        });
    }

    #[test]
    fn cooperative_timer_counts_but_never_switches() {
        let policy = Combined::new(DelayOrdered::new(2, false), RoundRobin::new(2, false));
        let kernel = leak(
            Kernel::builder(Hosted::new())
                .mode(Mode::Cooperative)
                .build(policy),
        );
        let journal = Journal::default();
        let j = journal.clone();
        let a = kernel
            .spawn(STACK, move || {
                note(&j, "A");
                kernel.timer_interrupt();
                kernel.timer_interrupt();
                note(&j, "A");
                kernel.yield_now();
                note(&j, "A");
            })
            .unwrap();
        let j = journal.clone();
        let d = kernel.spawn(STACK, move || note(&j, "D")).unwrap();
        kernel.admit(a).unwrap();
        kernel.admit_delayed(d, 2, false).unwrap();

        kernel.run();
        // the ticks made D due, but it only ran once A yielded
        assert_eq!(entries(&journal), ["A", "A", "D", "A"]);
        assert_eq!(kernel.now(), 2);
    }

    #[test]
    fn terminated_slot_is_reused() {
        let kernel = leak(
            Kernel::builder(Hosted::new())
                .max_tasks(1)
                .build(RoundRobin::new(1, false)),
        );
        let first = kernel.spawn(STACK, || {}).unwrap();
        assert_eq!(kernel.spawn(STACK, || {}), Err(SpawnError::PoolFull));
        kernel.admit(first).unwrap();
        kernel.run();
        assert_eq!(kernel.live_tasks(), 0);

        let second = kernel.spawn(STACK, || {}).unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second, first);
        assert_eq!(kernel.task_state(first), None);
        assert_eq!(kernel.task_state(second), Some(TaskState::Created));
        assert_eq!(kernel.admit(first), Err(AdmitError::NotLive));
    }

    #[test]
    fn dead_duplicate_left_by_legacy_evict_is_skipped() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(4, false)));
        let journal = Journal::default();
        let j = journal.clone();
        let a = kernel.spawn(STACK, move || note(&j, "A")).unwrap();
        let j = journal.clone();
        let b = kernel.spawn(STACK, move || note(&j, "B")).unwrap();
        // A twice in a row: evicting it on exit leaves one copy behind
        kernel.admit(a).unwrap();
        kernel.admit(a).unwrap();
        kernel.admit(b).unwrap();

        kernel.run();
        assert_eq!(entries(&journal), ["A", "B"]);
        assert!(kernel.with_policy(|p| p.is_empty()));
    }

    #[test]
    fn spawn_rejects_tiny_stacks() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(1, false)));
        assert_eq!(
            kernel.spawn(8, || {}),
            Err(SpawnError::StackTooSmall {
                requested: 8,
                minimum: Hosted::MIN_STACK
            })
        );
    }

    #[test]
    fn countdowns_seen_under_a_lock_lag_behind_now() {
        let policy = Combined::new(DelayOrdered::new(2, false), RoundRobin::new(2, false));
        let kernel = leak(Kernel::builder(Hosted::new()).build(policy));
        let task = kernel.spawn(STACK, || {}).unwrap();
        kernel.admit_delayed(task, 5, false).unwrap();

        let lock = kernel.lock();
        kernel.timer_interrupt();
        kernel.timer_interrupt();
        assert_eq!(kernel.now(), 2);
        assert_eq!(kernel.with_policy(|p| p.delayed().countdown(task)), Some(5));
        drop(lock);

        // the next tick brings the two held back with it
        kernel.timer_interrupt();
        assert_eq!(kernel.with_policy(|p| p.delayed().countdown(task)), Some(2));
    }

    #[test]
    fn builder_settings_are_kept() {
        let kernel = Kernel::builder(Hosted::new())
            .mode(Mode::Cooperative)
            .max_tasks(3)
            .heartbeat_period(0)
            .build(RoundRobin::new(1, false));
        assert_eq!(
            *kernel.config(),
            Config {
                mode: Mode::Cooperative,
                max_tasks: 3,
                heartbeat_period: 0,
            }
        );
        let defaults = Kernel::builder(Hosted::new()).build(RoundRobin::new(1, false));
        assert_eq!(*defaults.config(), Config::default());
    }

    #[test]
    fn heartbeat_toggles_every_period() {
        let kernel = leak(
            Kernel::builder(Hosted::new())
                .heartbeat_period(2)
                .build(RoundRobin::new(1, false)),
        );
        for _ in 0..6 {
            kernel.timer_interrupt();
        }
        assert_eq!(kernel.port().heartbeats(), [true, false, true]);
    }

    #[test]
    fn panicking_task_still_leaves_the_scheduler() {
        let kernel = leak(Kernel::builder(Hosted::new()).build(RoundRobin::new(2, false)));
        let journal = Journal::default();
        let bad = kernel.spawn(STACK, || panic!("task went wrong")).unwrap();
        let j = journal.clone();
        let good = kernel.spawn(STACK, move || note(&j, "good")).unwrap();
        kernel.admit(bad).unwrap();
        kernel.admit(good).unwrap();

        kernel.run();
        assert_eq!(entries(&journal), ["good"]);
        assert_eq!(kernel.task_state(bad), Some(TaskState::Terminated));
    }
}

// End of File
