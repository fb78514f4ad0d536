use super::*;

#[test]
fn test_mock_io_replays_script_then_holds() {
    let io = MockIo::new(Level::High);
    io.push_read(Level::Low);
    io.push_read_error();
    io.push_read(Level::Low);

    assert_eq!(io.read_pin(17).unwrap(), Level::Low);
    assert!(io.read_pin(17).is_err());
    assert_eq!(io.read_pin(17).unwrap(), Level::Low);
    // Queue drained: last successful level repeats
    assert_eq!(io.read_pin(17).unwrap(), Level::Low);

    io.set_level(Level::High);
    assert_eq!(io.read_pin(17).unwrap(), Level::High);
}

#[test]
fn test_mock_io_records_writes_and_bias() {
    let io = MockIo::new(Level::Low);
    io.setup_input(17, Bias::PullUp).unwrap();
    io.write_pin(27, Level::High).unwrap();
    io.write_pin(27, Level::Low).unwrap();

    assert_eq!(io.input_bias(17), Some(Bias::PullUp));
    assert_eq!(io.writes(), vec![(27, Level::High), (27, Level::Low)]);
}

#[test]
fn test_simulator_respects_polarity() {
    let simulator = KeyboardDoorSimulator::new(Level::Low);
    assert_eq!(simulator.read_pin(17).unwrap(), Level::High);

    assert!(simulator.toggle());
    assert_eq!(simulator.read_pin(17).unwrap(), Level::Low);

    assert!(!simulator.toggle());
    assert_eq!(simulator.read_pin(17).unwrap(), Level::High);

    let inverted = KeyboardDoorSimulator::new(Level::High);
    inverted.toggle();
    assert_eq!(inverted.read_pin(4).unwrap(), Level::High);
}

#[test]
fn test_simulator_clone_shares_door_state() {
    let simulator = KeyboardDoorSimulator::new(Level::Low);
    let keyboard_side = simulator.clone();

    assert!(keyboard_side.toggle());
    assert!(simulator.is_door_open());
    assert_eq!(simulator.read_pin(17).unwrap(), Level::Low);
}

#[test]
fn test_level_serde_names() {
    let level: Level = serde_json::from_str("\"low\"").unwrap();
    assert_eq!(level, Level::Low);
    let bias: Bias = serde_json::from_str("\"pull_down\"").unwrap();
    assert_eq!(bias, Bias::PullDown);
}
