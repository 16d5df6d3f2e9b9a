//! Controller session: the run/pause/stop state machine
//!
//! A control program implements [`RobotProgram`]. The session owns the
//! thread that drives it:
//!
//! ```text
//! Created ──start──▶ Running ◀──unpause── Paused
//!    │                  │ └──────pause──────▶ │
//!    └──────stop────────┴────────stop─────────┴──▶ Stopped
//! ```
//!
//! The driver calls `init` once, then `step` repeatedly. Stop is observed
//! only at the top of an iteration, so an in-progress `step` always
//! completes. A paused session blocks on a condition variable instead of
//! spinning.

use super::robot::Robot;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle state of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Paused,
    /// Terminal
    Stopped,
}

/// A control program driven by a [`Session`]
pub trait RobotProgram: Send {
    /// Runs once before the first iteration
    fn init(&mut self, robot: &mut Robot) -> Result<()>;

    /// One iteration of the control loop
    fn step(&mut self, robot: &mut Robot) -> Result<()>;
}

/// State shared between a session, its handles and its robot
#[derive(Debug)]
pub struct Control {
    state: Mutex<SessionState>,
    changed: Condvar,
    iterations: AtomicU64,
}

impl Control {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Created),
            changed: Condvar::new(),
            iterations: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == SessionState::Stopped
    }

    /// Completed `step` calls
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Apply a transition if the current state allows it
    fn transition(&self, allowed: &[SessionState], next: SessionState) -> bool {
        let mut state = self.state.lock();
        if !allowed.contains(&state) {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }

    pub(crate) fn begin(&self) -> bool {
        self.transition(&[SessionState::Created], SessionState::Running)
    }

    pub fn pause(&self) -> bool {
        self.transition(&[SessionState::Running], SessionState::Paused)
    }

    pub fn unpause(&self) -> bool {
        self.transition(&[SessionState::Paused], SessionState::Running)
    }

    pub fn stop(&self) -> bool {
        self.transition(
            &[
                SessionState::Created,
                SessionState::Running,
                SessionState::Paused,
            ],
            SessionState::Stopped,
        )
    }

    /// Block while paused; false once the session is stopped
    fn wait_until_runnable(&self) -> bool {
        let mut state = self.state.lock();
        while *state == SessionState::Paused {
            self.changed.wait(&mut state);
        }
        *state != SessionState::Stopped
    }

    /// Sleep for up to `timeout`, waking early on any state change
    ///
    /// Returns false if the session is stopped.
    pub fn sleep(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Stopped {
            return false;
        }
        self.changed.wait_for(&mut state, timeout);
        *state != SessionState::Stopped
    }

    fn count_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable remote control for a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    name: Arc<str>,
    control: Arc<Control>,
}

impl SessionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pause(&self) {
        if self.control.pause() {
            log::info!("Session '{}' paused", self.name);
        }
    }

    pub fn unpause(&self) {
        if self.control.unpause() {
            log::info!("Session '{}' resumed", self.name);
        }
    }

    pub fn stop(&self) {
        if self.control.stop() {
            log::info!("Session '{}' stop requested", self.name);
        }
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn iterations(&self) -> u64 {
        self.control.iterations()
    }
}

/// One control program driving one robot
pub struct Session {
    handle: SessionHandle,
    pending: Option<(Robot, Box<dyn RobotProgram>)>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl Session {
    /// Create a session; the robot's control state becomes the session's
    pub fn new(name: &str, robot: Robot, program: impl RobotProgram + 'static) -> Self {
        let handle = SessionHandle {
            name: Arc::from(name),
            control: robot.control(),
        };
        Self {
            handle,
            pending: Some((robot, Box::new(program))),
            thread: None,
        }
    }

    /// Spawn the session thread
    ///
    /// `init` runs exactly once even if `stop` races with the start.
    pub fn start(&mut self) -> Result<()> {
        let (robot, program) = self.pending.take().ok_or(Error::AlreadyStarted)?;
        let control = self.handle.control.clone();
        control.begin();

        let name = self.handle.name.to_string();
        let thread = thread::Builder::new()
            .name(format!("session-{}", name))
            .spawn(move || {
                log::info!("Session '{}' started", name);
                let result = drive(program, robot, &control);
                control.stop();
                match &result {
                    Ok(()) => log::info!(
                        "Session '{}' stopped after {} iteration(s)",
                        name,
                        control.iterations()
                    ),
                    Err(e) => log::error!("Session '{}' failed: {}", name, e),
                }
                result
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn unpause(&self) {
        self.handle.unpause();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn iterations(&self) -> u64 {
        self.handle.iterations()
    }

    /// Wait for the session thread and return the program's result
    ///
    /// Does not request a stop; call [`Session::stop`] first unless the
    /// program is expected to fail on its own.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::Other(format!("session '{}' panicked", self.handle.name)))?,
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // A detached session thread would otherwise loop forever
        self.handle.control.stop();
    }
}

/// Fixed scheduling contract around a program's `init`/`step`
fn drive(mut program: Box<dyn RobotProgram>, mut robot: Robot, control: &Control) -> Result<()> {
    program.init(&mut robot)?;
    while control.wait_until_runnable() {
        program.step(&mut robot)?;
        control.count_iteration();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::link::CommandLink;
    use crate::oi::LinkCommand;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct NullLink;

    impl CommandLink for NullLink {
        fn transact(&mut self, _cmd: &LinkCommand) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default, Clone)]
    struct Counters {
        inits: Arc<AtomicUsize>,
        steps: Arc<AtomicUsize>,
    }

    struct Counting(Counters);

    impl RobotProgram for Counting {
        fn init(&mut self, _robot: &mut Robot) -> Result<()> {
            self.0.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn step(&mut self, _robot: &mut Robot) -> Result<()> {
            self.0.steps.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            Ok(())
        }
    }

    fn counting_session(name: &str) -> (Session, Counters) {
        let counters = Counters::default();
        let session = Session::new(name, Robot::new(NullLink), Counting(counters.clone()));
        (session, counters)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_start_then_stop_runs_init_once() {
        let (mut session, counters) = counting_session("quick");
        session.start().unwrap();
        session.stop();
        let handle = session.handle();
        session.join().unwrap();

        assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), SessionState::Stopped);
        assert_eq!(
            handle.iterations() as usize,
            counters.steps.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_no_steps_after_stop() {
        let (mut session, counters) = counting_session("stopper");
        session.start().unwrap();
        wait_for(|| counters.steps.load(Ordering::SeqCst) > 3);
        session.stop();
        let handle = session.handle();
        session.join().unwrap();

        let after_join = counters.steps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counters.steps.load(Ordering::SeqCst), after_join);
        assert_eq!(handle.iterations() as usize, after_join);
    }

    #[test]
    fn test_pause_suspends_steps() {
        let (mut session, counters) = counting_session("pauser");
        session.start().unwrap();
        wait_for(|| counters.steps.load(Ordering::SeqCst) > 0);

        session.pause();
        assert_eq!(session.state(), SessionState::Paused);
        // Let an in-flight step finish
        thread::sleep(Duration::from_millis(10));
        let paused_at = counters.steps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counters.steps.load(Ordering::SeqCst), paused_at);

        session.unpause();
        wait_for(|| counters.steps.load(Ordering::SeqCst) > paused_at + 2);

        session.stop();
        session.join().unwrap();
    }

    #[test]
    fn test_stop_while_paused() {
        let (mut session, counters) = counting_session("paused-stop");
        session.start().unwrap();
        wait_for(|| counters.inits.load(Ordering::SeqCst) == 1);
        session.pause();
        session.stop();
        session.join().unwrap();
        assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (mut session, _counters) = counting_session("twice");
        session.start().unwrap();
        assert!(matches!(session.start(), Err(Error::AlreadyStarted)));
        session.stop();
        session.join().unwrap();
    }

    #[test]
    fn test_program_error_stops_session() {
        struct Failing;

        impl RobotProgram for Failing {
            fn init(&mut self, _robot: &mut Robot) -> Result<()> {
                Ok(())
            }

            fn step(&mut self, _robot: &mut Robot) -> Result<()> {
                Err(Error::Disconnected)
            }
        }

        let mut session = Session::new("failing", Robot::new(NullLink), Failing);
        session.start().unwrap();
        let handle = session.handle();
        assert!(matches!(session.join(), Err(Error::Disconnected)));
        assert_eq!(handle.state(), SessionState::Stopped);
        assert_eq!(handle.iterations(), 0);
    }

    #[test]
    fn test_state_transitions() {
        let control = Control::new();
        assert!(!control.pause());
        assert!(control.begin());
        assert!(!control.begin());
        assert!(control.pause());
        assert!(!control.pause());
        assert!(control.unpause());
        assert!(control.stop());
        assert!(!control.unpause());
        assert!(!control.stop());
        assert!(!control.sleep(Duration::from_millis(1)));
    }
}
