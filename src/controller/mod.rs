//! Robot controller: what a control program is written against
//!
//! - [`RobotProgram`]: user-supplied `init`/`step`
//! - [`Session`]: owns the thread and the run/pause/stop state machine
//! - [`Robot`]: clamped drive, IR and wait primitives
//! - [`CommandLink`]: where the robot's commands go (simulation, text pipe)

pub mod limits;
pub mod link;
pub mod robot;
pub mod session;

pub use link::{CommandLink, LineLink};
pub use robot::Robot;
pub use session::{Control, RobotProgram, Session, SessionHandle, SessionState};
