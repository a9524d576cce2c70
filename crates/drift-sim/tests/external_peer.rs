//! A running simulation accepts messages from a process outside it

use std::time::Duration;

use drift_core::NodeId;
use drift_runtime::{Action, ActionWeights, EventKind, LogEvent};
use drift_sim::{Simulation, SimulationConfig};
use drift_transport::deliver;
use drift_wire::Message;

fn free_port() -> u16 {
    let scratch = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    scratch.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_external_message_advances_clock() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let config = SimulationConfig::default()
        .with_nodes(1)
        .with_base_port(port)
        .with_tick_rates(20, 20)
        .with_duration(Duration::from_millis(1500))
        .with_poll_interval(Duration::from_millis(20))
        .with_weights(ActionWeights::only(Action::Internal))
        .with_log_dir(dir.path());

    let sim = tokio::task::spawn_blocking(move || Simulation::new(config)?.run());

    let payload = Message::new(NodeId::new(7), 100).encode().unwrap();
    let addr = format!("127.0.0.1:{}", port).parse().unwrap();
    let mut delivered = false;
    for _ in 0..40 {
        if deliver(addr, &payload, Duration::from_millis(200)).await.is_ok() {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(delivered);

    let report = sim.await.unwrap().unwrap();
    assert!(report.is_success());

    let log = std::fs::read_to_string(dir.path().join("machine_0.log")).unwrap();
    let events: Vec<LogEvent> = log.lines().map(|l| LogEvent::parse_line(l).unwrap()).collect();

    let received: Vec<&LogEvent> = events
        .iter()
        .filter(|e| e.kind == EventKind::Receive)
        .collect();
    assert_eq!(received.len(), 1);
    assert!(received[0].logical_clock > 100);
    assert_eq!(received[0].detail, "From VM 7, Queue Length: 0");

    // Every later event builds on the received clock
    let after: Vec<u64> = events
        .iter()
        .skip_while(|e| e.kind != EventKind::Receive)
        .map(|e| e.logical_clock)
        .collect();
    assert!(after.windows(2).all(|w| w[1] == w[0] + 1));
}
