//! End-to-end scenarios driving a real scheduling loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tickstate::logging::init_logging;
use tickstate::{MachineConfig, Phase, State, StateMachine};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Step {
    Idle,
    Busy,
    Stop,
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn incrementing(hits: &Arc<AtomicUsize>) -> impl Fn(&serde_json::Value) + Send + Sync + 'static {
    let hits = Arc::clone(hits);
    move |_: &serde_json::Value| {
        hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn idle_then_stop_scenario() {
    init_logging("debug");

    let counted = counter();
    let done = counter();

    let mut machine = StateMachine::new("scenario", Duration::from_millis(10));
    machine.enable_state_trace(true);
    machine
        .register_states(vec![
            State::new(Step::Idle).with_action(incrementing(&counted)),
            State::new(Step::Stop).with_action(incrementing(&done)),
        ])
        .unwrap();

    machine.startup().unwrap();
    assert_eq!(machine.get_state(), Some(Step::Idle));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(counted.load(Ordering::SeqCst) > 0);

    let started = Instant::now();
    machine.move_to_state(&Step::Stop).unwrap();
    machine.shutdown().await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(150));
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(machine.phase(), Phase::Stopped);
}

#[tokio::test]
async fn interval_action_fires_on_multiples_of_its_ticks() {
    let fired = counter();

    let mut machine = StateMachine::new("interval", Duration::from_millis(5));
    machine
        .register_states(vec![
            State::new(Step::Busy).every(3).with_action(incrementing(&fired)),
            State::new(Step::Stop).with_action(|_| {}),
        ])
        .unwrap();

    machine.startup().unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    machine.pause();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let observed = machine.tick_count(&Step::Busy).unwrap();
    let fired_count = fired.load(Ordering::SeqCst) as u64;
    assert!(observed >= 3);
    assert_eq!(fired_count, observed / 3);

    machine.shutdown().await.unwrap();
}

#[tokio::test]
async fn revisited_state_resumes_its_tick_count() {
    let mut machine = StateMachine::new("resume-ticks", Duration::from_millis(5));
    machine
        .register_states(vec![
            State::new(Step::Idle),
            State::new(Step::Busy),
            State::new(Step::Stop),
        ])
        .unwrap();

    machine.startup().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    machine.move_to_state(&Step::Busy).unwrap();
    let idle_ticks = machine.tick_count(&Step::Idle).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    machine.move_to_state(&Step::Idle).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(machine.tick_count(&Step::Idle).unwrap() > idle_ticks);
    machine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_only_observe_registered_keys() {
    let mut machine = StateMachine::new("race", Duration::from_millis(1));
    machine
        .register_states(vec![
            State::new(Step::Idle).with_action(|_| {}),
            State::new(Step::Busy).with_action(|_| {}),
            State::new(Step::Stop).with_action(|_| {}),
        ])
        .unwrap();
    machine.startup().unwrap();
    let machine = Arc::new(machine);

    let mover = {
        let machine = Arc::clone(&machine);
        tokio::spawn(async move {
            for i in 0..1000 {
                let target = if i % 2 == 0 { Step::Busy } else { Step::Idle };
                machine.move_to_state(&target).unwrap();
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let machine = Arc::clone(&machine);
            tokio::spawn(async move {
                for _ in 0..1000 {
                    let state = machine.get_state();
                    assert!(matches!(state, Some(Step::Idle | Step::Busy)));
                }
            })
        })
        .collect();

    mover.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    machine.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_slow_stopping_interval() {
    let done = counter();

    let mut machine = StateMachine::new("slow-stop", Duration::from_millis(5));
    machine
        .register_states(vec![
            State::new(Step::Idle),
            State::new(Step::Stop).every(4).with_action(incrementing(&done)),
        ])
        .unwrap();

    machine.startup().unwrap();
    machine.shutdown().await.unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert!(machine.tick_count(&Step::Stop).unwrap() >= 4);
}

#[tokio::test]
async fn leaving_the_stopping_state_resumes_normal_dispatch() {
    let idle = counter();
    let done = counter();

    let mut machine = StateMachine::new("round-trip", Duration::from_millis(5));
    machine
        .register_states(vec![
            State::new(Step::Idle).with_action(incrementing(&idle)),
            State::new(Step::Stop).with_action(incrementing(&done)),
        ])
        .unwrap();

    machine.startup().unwrap();
    machine.move_to_state(&Step::Stop).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(done.load(Ordering::SeqCst) >= 1);

    machine.move_to_state(&Step::Idle).unwrap();
    let before = idle.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(idle.load(Ordering::SeqCst) > before);

    // The latch is already released, so shutdown does not wait for a new stop.
    machine.shutdown().await.unwrap();
    assert_eq!(machine.get_state(), Some(Step::Stop));
    assert_eq!(machine.phase(), Phase::Stopped);
}

#[tokio::test]
async fn save_restore_across_running_loop() {
    let mut machine = StateMachine::new("maintenance", Duration::from_millis(5));
    machine
        .register_states(vec![
            State::new(Step::Idle),
            State::new(Step::Busy),
            State::new(Step::Stop),
        ])
        .unwrap();
    machine.startup().unwrap();

    machine.move_to_state(&Step::Busy).unwrap();
    machine.save_state();
    machine.move_to_state(&Step::Idle).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    machine.restore_state().unwrap();
    assert_eq!(machine.get_state(), Some(Step::Busy));

    machine.shutdown().await.unwrap();
}

#[tokio::test]
async fn configured_machine_runs_string_keys() {
    let config: MachineConfig =
        serde_json::from_str(r#"{"name": "registerer", "precision_ms": 5, "trace": true}"#)
            .unwrap();
    let exported = counter();

    let mut machine = StateMachine::from_config(&config).unwrap();
    machine
        .register_states(vec![
            State::new("export".to_string())
                .with_args(serde_json::json!({"endpoint": "registerer/status"}))
                .with_action({
                    let exported = Arc::clone(&exported);
                    move |args: &serde_json::Value| {
                        assert_eq!(args["endpoint"], "registerer/status");
                        exported.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            State::new("offline".to_string()).with_action(|_| {}),
        ])
        .unwrap();

    machine.startup().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    machine.shutdown().await.unwrap();

    assert!(exported.load(Ordering::SeqCst) >= 2);
    assert_eq!(machine.get_state(), Some("offline".to_string()));
}
