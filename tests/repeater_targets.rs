//! Repeater driving simulated robots through both dispatch paths

use setu::config::SimulationConfig;
use setu::oi::{Demo, SensorFrame};
use setu::oi::text::parse_response;
use setu::repeater::{LineOutcome, Repeater, Target};
use setu::sim::{OiMode, RobotHandle, SimPort, SimRobot, SimulationCore};
use std::io::Cursor;

fn manual_robot(core: &std::sync::Arc<SimulationCore>, name: &str) -> RobotHandle {
    core.add_robot(SimRobot::new(name, &SimulationConfig::default()).with_manual_clock())
}

fn run_script(repeater: &mut Repeater<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<LineOutcome> {
    let mut outcomes = Vec::new();
    loop {
        match repeater.run_once().unwrap() {
            LineOutcome::EndOfStream => return outcomes,
            outcome => outcomes.push(outcome),
        }
    }
}

const SCRIPT: &str = "\
START
SAFE

LED 8 128 255
0x91 0x0064 0x0032
BOGUS 1
SENSORS
";

#[test]
fn simulated_target_applies_script() {
    let core = SimulationCore::new();
    let robot = manual_robot(&core, "sim");
    let mut repeater = Repeater::new(
        Cursor::new(SCRIPT.as_bytes().to_vec()),
        Vec::new(),
        Target::Simulated(Box::new(robot.clone())),
    );

    let outcomes = run_script(&mut repeater);
    assert_eq!(
        outcomes,
        vec![
            LineOutcome::Dispatched,
            LineOutcome::Dispatched,
            LineOutcome::Empty,
            LineOutcome::Dispatched,
            LineOutcome::Dispatched,
            LineOutcome::Dropped,
            LineOutcome::Dispatched,
        ]
    );

    assert_eq!(robot.inspect(SimRobot::mode), OiMode::Safe);
    assert_eq!(robot.inspect(|r| r.leds().color), 128);
    // Right wheel first on the wire
    assert_eq!(robot.inspect(SimRobot::wheel_speeds), (50.0, 100.0));

    let (_, written, _) = repeater.into_parts();
    let text = String::from_utf8(written).unwrap();
    let frame = SensorFrame::from_bytes(&parse_response(&text).unwrap()).unwrap();
    assert_eq!(frame.ir(), None);
}

#[test]
fn loopback_target_matches_simulated_target() {
    let core = SimulationCore::new();
    let direct = manual_robot(&core, "direct");
    let looped = manual_robot(&core, "looped");

    let mut a = Repeater::new(
        Cursor::new(SCRIPT.as_bytes().to_vec()),
        Vec::new(),
        Target::Simulated(Box::new(direct.clone())),
    );
    let mut b = Repeater::new(
        Cursor::new(SCRIPT.as_bytes().to_vec()),
        Vec::new(),
        Target::Serial(Box::new(SimPort::new(looped.clone()))),
    );
    run_script(&mut a);
    run_script(&mut b);

    assert_eq!(
        direct.inspect(SimRobot::mode),
        looped.inspect(SimRobot::mode)
    );
    assert_eq!(
        direct.inspect(SimRobot::wheel_speeds),
        looped.inspect(SimRobot::wheel_speeds)
    );
    assert_eq!(direct.inspect(SimRobot::leds), looped.inspect(SimRobot::leds));

    let (_, out_a, _) = a.into_parts();
    let (_, out_b, _) = b.into_parts();
    assert_eq!(out_a, out_b);
}

#[test]
fn ir_sent_through_one_repeater_reaches_the_other_robot() {
    let core = SimulationCore::new();
    let sender = manual_robot(&core, "sender");
    let listener = manual_robot(&core, "listener");

    let mut repeater = Repeater::new(
        Cursor::new(b"START\nFULL\nSEND_IR 137\n".to_vec()),
        Vec::new(),
        Target::Simulated(Box::new(sender)),
    );
    run_script(&mut repeater);

    assert_eq!(listener.inspect(SimRobot::ir_received), 137);
}

#[test]
fn demo_and_power_lines() {
    let core = SimulationCore::new();
    let robot = manual_robot(&core, "demo");
    let mut repeater = Repeater::new(
        Cursor::new(b"PowerOff\nRobotIsOn\nPowerOn\nSTART\nDEMO 3\nRobotIsOn\n".to_vec()),
        Vec::new(),
        Target::Simulated(Box::new(robot.clone())),
    );
    run_script(&mut repeater);

    assert_eq!(robot.inspect(SimRobot::demo), Some(Demo::Mouse));
    assert_eq!(robot.inspect(SimRobot::mode), OiMode::Passive);
    let (_, written, _) = repeater.into_parts();
    assert_eq!(String::from_utf8(written).unwrap(), "0x00\n0x01\n");
}
