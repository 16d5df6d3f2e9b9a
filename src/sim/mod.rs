//! Robot simulation
//!
//! - [`SimRobot`]: one simulated Create
//! - [`SimulationCore`]: shared world holding every robot and the
//!   controller sessions attached to it
//! - [`RobotHandle`]: a robot inside the core; usable as a repeater target
//!   and as a controller's [`CommandLink`]
//! - [`SimPort`]: a [`Transport`](crate::transport::Transport) that feeds
//!   raw OI bytes into a simulated robot

pub mod physics;
mod port;
mod robot;

pub use port::SimPort;
pub use robot::{LedState, OiMode, SimRobot};

use crate::controller::{CommandLink, SessionHandle};
use crate::error::Result;
use crate::oi::LinkCommand;
use parking_lot::Mutex;
use std::sync::Arc;

/// Receiving end of repeater dispatch in simulation mode
pub trait SimulatedRobot: Send {
    /// Apply a command; `Some` carries response bytes for the controller
    fn execute(&mut self, cmd: &LinkCommand) -> Option<Vec<u8>>;
}

impl SimulatedRobot for SimRobot {
    fn execute(&mut self, cmd: &LinkCommand) -> Option<Vec<u8>> {
        SimRobot::execute(self, cmd)
    }
}

impl<S: SimulatedRobot + ?Sized> SimulatedRobot for Box<S> {
    fn execute(&mut self, cmd: &LinkCommand) -> Option<Vec<u8>> {
        (**self).execute(cmd)
    }
}

#[derive(Default)]
struct CoreState {
    robots: Vec<Arc<Mutex<SimRobot>>>,
    sessions: Vec<SessionHandle>,
}

/// Shared simulation world
///
/// IR bytes sent by one robot are delivered to every other robot.
#[derive(Default)]
pub struct SimulationCore {
    state: Mutex<CoreState>,
}

impl SimulationCore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a robot to the world
    pub fn add_robot(self: &Arc<Self>, robot: SimRobot) -> RobotHandle {
        let mut state = self.state.lock();
        let index = state.robots.len();
        log::info!("Simulation: added robot '{}' (#{})", robot.name(), index);
        let robot = Arc::new(Mutex::new(robot));
        state.robots.push(robot.clone());
        RobotHandle {
            index,
            robot,
            core: self.clone(),
        }
    }

    pub fn robot_count(&self) -> usize {
        self.state.lock().robots.len()
    }

    /// Register a controller session driving one of the robots
    pub fn attach_session(&self, session: SessionHandle) {
        log::debug!("Simulation: attached session '{}'", session.name());
        self.state.lock().sessions.push(session);
    }

    /// Active controller sessions
    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.state.lock().sessions.clone()
    }

    pub fn pause_all(&self) {
        self.sessions().iter().for_each(SessionHandle::pause);
    }

    pub fn resume_all(&self) {
        self.sessions().iter().for_each(SessionHandle::unpause);
    }

    /// Stop every session and forget them
    pub fn stop_all(&self) {
        let sessions = std::mem::take(&mut self.state.lock().sessions);
        sessions.iter().for_each(SessionHandle::stop);
    }

    /// Advance every manually clocked robot
    pub fn step_all(&self, dt: f32) {
        for robot in self.robots() {
            robot.lock().step(dt);
        }
    }

    fn robots(&self) -> Vec<Arc<Mutex<SimRobot>>> {
        self.state.lock().robots.clone()
    }

    fn broadcast_ir(&self, from: usize, codes: &[u8]) {
        for (index, robot) in self.robots().iter().enumerate() {
            if index == from {
                continue;
            }
            let mut robot = robot.lock();
            for code in codes {
                robot.receive_ir(*code);
            }
        }
    }
}

/// A robot inside a [`SimulationCore`]
#[derive(Clone)]
pub struct RobotHandle {
    index: usize,
    robot: Arc<Mutex<SimRobot>>,
    core: Arc<SimulationCore>,
}

impl RobotHandle {
    /// Read robot state
    pub fn inspect<T>(&self, f: impl FnOnce(&SimRobot) -> T) -> T {
        f(&self.robot.lock())
    }

    /// Advance this robot by `dt` simulated seconds
    pub fn step(&self, dt: f32) {
        self.robot.lock().step(dt);
    }

    pub fn core(&self) -> &Arc<SimulationCore> {
        &self.core
    }
}

impl SimulatedRobot for RobotHandle {
    fn execute(&mut self, cmd: &LinkCommand) -> Option<Vec<u8>> {
        let (reply, sent_ir) = {
            let mut robot = self.robot.lock();
            let reply = robot.execute(cmd);
            (reply, robot.take_ir_outbox())
        };
        if !sent_ir.is_empty() {
            self.core.broadcast_ir(self.index, &sent_ir);
        }
        reply
    }
}

impl CommandLink for RobotHandle {
    fn transact(&mut self, cmd: &LinkCommand) -> Result<Vec<u8>> {
        Ok(self.execute(cmd).unwrap_or_default())
    }
}
