//! End-to-end tests driving real worker threads.
//!
//! Timers are kept short and every wait polls with a generous deadline,
//! so the assertions hold on slow machines too.

use statewire::builder::{DefinitionBuilder, EventBuilder, TransitionBuilder};
use statewire::config::{EVENT_CONFIG_DIR, STATE_CONFIG_FILE, TRANSITION_CONFIG_DIR};
use statewire::core::{Condition, MachineDefinition, StateInfo, TransitionRule};
use statewire::machine::{FiniteStateMachine, Lifecycle, MachineRegistry};
use statewire::validation::ConfigViolation;
use statewire::{FsmError, STATE_TIMEOUT_EVENT};
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const PATIENCE: Duration = Duration::from_secs(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

fn in_state(machine: &FiniteStateMachine, state: &str) -> bool {
    machine.current_state().as_deref() == Some(state)
}

type Log = Arc<Mutex<Vec<String>>>;

/// Record exits and enters as `exit:<state>` / `enter:<state>`.
fn record_path(machine: &FiniteStateMachine) -> Log {
    let log: Log = Arc::default();
    let exits = Arc::clone(&log);
    machine
        .set_exit_state_callback(move |states| {
            let mut log = exits.lock().unwrap();
            log.extend(states.iter().map(|s| format!("exit:{}", s)));
        })
        .unwrap();
    let enters = Arc::clone(&log);
    machine
        .set_enter_state_callback(move |states| {
            let mut log = enters.lock().unwrap();
            log.extend(states.iter().map(|s| format!("enter:{}", s)));
        })
        .unwrap();
    log
}

/// Record `(name, handled)` of every non-internal event reaching the post-event callback.
fn record_events(machine: &FiniteStateMachine) -> Arc<Mutex<Vec<(String, bool)>>> {
    let log: Arc<Mutex<Vec<(String, bool)>>> = Arc::default();
    let sink = Arc::clone(&log);
    machine
        .set_post_event_callback(move |event, handled| {
            if !event.is_internal() {
                sink.lock()
                    .unwrap()
                    .push((event.name().to_string(), handled));
            }
        })
        .unwrap();
    log
}

fn count(log: &Arc<Mutex<Vec<(String, bool)>>>, name: &str) -> usize {
    log.lock().unwrap().iter().filter(|(n, _)| n == name).count()
}

fn nested_definition() -> MachineDefinition {
    DefinitionBuilder::new()
        .state("A")
        .child("A1", "A")
        .child("A1a", "A1")
        .child("A2", "A")
        .child("A2a", "A2")
        .initial("A1a")
        .add_transition(TransitionRule::new("A1a", "A2a").on("go"))
        .add_transition(TransitionRule::new("A", "A2a").on("reset"))
        .add_transition(TransitionRule::new("A1a", "A1a").on("poke"))
        .build()
        .unwrap()
}

#[test]
fn sustained_condition_switches_power_on() {
    init_tracing();
    let definition = DefinitionBuilder::new()
        .state("OFF")
        .state("ON")
        .initial("OFF")
        .transition(
            TransitionBuilder::new()
                .from("OFF")
                .to("ON")
                .when(Condition::new("power", 1, 100).sustained_for(Duration::from_millis(300))),
        )
        .unwrap()
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("power");
    machine.init(&definition).unwrap();
    let path = record_path(&machine);
    machine.start().unwrap();

    let started = Instant::now();
    machine.set_condition_value("power", 50);
    thread::sleep(Duration::from_millis(100));
    assert!(in_state(&machine, "OFF"));

    assert!(wait_until(PATIENCE, || in_state(&machine, "ON")));
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(*path.lock().unwrap(), vec!["exit:OFF", "enter:ON"]);
    assert_eq!(machine.condition_value("power"), 50);

    machine.stop();
}

#[test]
fn value_change_restarts_the_sustain_window() {
    let definition = DefinitionBuilder::new()
        .state("OFF")
        .state("ON")
        .initial("OFF")
        .add_transition(TransitionRule::new("OFF", "ON").with_condition(
            Condition::new("power", 1, 100).sustained_for(Duration::from_millis(300)),
        ))
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("power-reset");
    machine.init(&definition).unwrap();
    machine.start().unwrap();

    machine.set_condition_value("power", 50);
    thread::sleep(Duration::from_millis(150));
    machine.set_condition_value("power", 0);
    thread::sleep(Duration::from_millis(400));
    assert!(in_state(&machine, "OFF"));

    machine.set_condition_value("power", 60);
    assert!(wait_until(PATIENCE, || in_state(&machine, "ON")));

    machine.stop();
}

#[test]
fn nested_transition_exits_leaf_first_and_enters_root_first() {
    let machine = FiniteStateMachine::new("nested");
    machine.init(&nested_definition()).unwrap();
    let path = record_path(&machine);
    machine.start().unwrap();

    machine.handle_event("go");
    assert!(wait_until(PATIENCE, || in_state(&machine, "A2a")));
    assert_eq!(
        *path.lock().unwrap(),
        vec!["exit:A1a", "exit:A1", "enter:A2", "enter:A2a"]
    );

    let last = machine.history().last().cloned().unwrap();
    assert_eq!(last.from, "A1a");
    assert_eq!(last.event, "go");
    machine.stop();
}

#[test]
fn ancestor_rule_exits_from_the_current_leaf() {
    let machine = FiniteStateMachine::new("ancestor");
    machine.init(&nested_definition()).unwrap();
    let path = record_path(&machine);
    machine.start().unwrap();

    machine.handle_event("reset");
    assert!(wait_until(PATIENCE, || in_state(&machine, "A2a")));
    assert_eq!(
        *path.lock().unwrap(),
        vec!["exit:A1a", "exit:A1", "enter:A2", "enter:A2a"]
    );
    machine.stop();
}

#[test]
fn self_transition_reports_empty_lists() {
    let machine = FiniteStateMachine::new("self");
    machine.init(&nested_definition()).unwrap();
    let transitions: Arc<Mutex<Vec<(Vec<String>, Vec<String>)>>> = Arc::default();
    let sink = Arc::clone(&transitions);
    machine
        .set_transition_callback(move |exited, _event, entered| {
            sink.lock()
                .unwrap()
                .push((exited.to_vec(), entered.to_vec()));
        })
        .unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    machine.handle_event("poke");
    assert!(wait_until(PATIENCE, || count(&events, "poke") == 1));

    assert!(in_state(&machine, "A1a"));
    let nothing: (Vec<String>, Vec<String>) = (Vec::new(), Vec::new());
    assert_eq!(*transitions.lock().unwrap(), vec![nothing]);
    assert_eq!(events.lock().unwrap()[0], ("poke".to_string(), true));
    assert!(machine.history().last().unwrap().is_self_transition());
    machine.stop();
}

#[test]
fn unknown_event_is_reported_unhandled() {
    let machine = FiniteStateMachine::new("unhandled");
    machine.init(&nested_definition()).unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    machine.handle_event("nothing-listens");
    assert!(wait_until(PATIENCE, || count(&events, "nothing-listens") == 1));
    assert!(!events.lock().unwrap()[0].1);
    assert!(in_state(&machine, "A1a"));
    assert!(machine.history().is_empty());
    machine.stop();
}

fn alarm_definition(level: bool) -> MachineDefinition {
    let hot = EventBuilder::new("hot").when(Condition::new("temperature", 80, 200));
    let hot = if level { hot.level() } else { hot.edge() };
    DefinitionBuilder::new()
        .state("IDLE")
        .state("ALARM")
        .initial("IDLE")
        .event(hot)
        .unwrap()
        .add_transition(TransitionRule::new("IDLE", "ALARM").on("hot"))
        .add_transition(TransitionRule::new("ALARM", "IDLE").on("hot_RESET"))
        .build()
        .unwrap()
}

#[test]
fn edge_event_fires_once_and_resets() {
    let machine = FiniteStateMachine::new("edge");
    machine.init(&alarm_definition(false)).unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    machine.set_condition_value("temperature", 90);
    assert!(wait_until(PATIENCE, || in_state(&machine, "ALARM")));

    machine.set_condition_value("temperature", 95);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(count(&events, "hot"), 1);

    machine.set_condition_value("temperature", 20);
    assert!(wait_until(PATIENCE, || in_state(&machine, "IDLE")));
    assert_eq!(count(&events, "hot_RESET"), 1);
    assert_eq!(machine.condition_value("hot"), 0);

    machine.stop();
}

#[test]
fn level_event_fires_on_every_matching_change() {
    let machine = FiniteStateMachine::new("level");
    machine.init(&alarm_definition(true)).unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    for (i, value) in [90, 95, 100].into_iter().enumerate() {
        machine.set_condition_value("temperature", value);
        assert!(wait_until(PATIENCE, || count(&events, "hot") == i + 1));
    }
    assert!(in_state(&machine, "ALARM"));
    assert_eq!(machine.condition_value("hot"), 1);

    machine.set_condition_value("temperature", 10);
    thread::sleep(Duration::from_millis(150));
    assert_eq!(count(&events, "hot_RESET"), 0);
    assert_eq!(machine.condition_value("hot"), 0);

    machine.stop();
}

#[test]
fn state_timeout_fires_once() {
    let definition = DefinitionBuilder::new()
        .timed_state("WAIT", Duration::from_millis(200))
        .state("DONE")
        .initial("WAIT")
        .add_transition(TransitionRule::new("WAIT", "DONE").on(STATE_TIMEOUT_EVENT))
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("timeout");
    machine.init(&definition).unwrap();
    let events = record_events(&machine);
    let started = Instant::now();
    machine.start().unwrap();

    assert!(wait_until(PATIENCE, || in_state(&machine, "DONE")));
    assert!(started.elapsed() >= Duration::from_millis(150));

    thread::sleep(Duration::from_millis(500));
    assert_eq!(count(&events, STATE_TIMEOUT_EVENT), 1);
    machine.stop();
}

#[test]
fn unconsumed_state_timeout_repeats_every_period() {
    let definition = DefinitionBuilder::new()
        .timed_state("WAIT", Duration::from_millis(100))
        .state("DONE")
        .initial("WAIT")
        .add_transition(TransitionRule::new("WAIT", "DONE").on("leave"))
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("timeout-repeat");
    machine.init(&definition).unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    assert!(wait_until(PATIENCE, || count(&events, STATE_TIMEOUT_EVENT) >= 3));
    assert!(in_state(&machine, "WAIT"));
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .filter(|(name, _)| name == STATE_TIMEOUT_EVENT)
        .all(|(_, handled)| !handled));

    // Leaving the state disarms the watchdog
    machine.handle_event("leave");
    assert!(wait_until(PATIENCE, || in_state(&machine, "DONE")));
    let fired = count(&events, STATE_TIMEOUT_EVENT);
    thread::sleep(Duration::from_millis(350));
    assert_eq!(count(&events, STATE_TIMEOUT_EVENT), fired);
    machine.stop();
}

#[test]
fn concurrent_events_never_overlap_transitions() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let definition = DefinitionBuilder::new()
        .state("A")
        .state("B")
        .initial("A")
        .add_transition(TransitionRule::new("A", "B").on("go"))
        .add_transition(TransitionRule::new("B", "A").on("go"))
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("concurrent");
    machine.init(&definition).unwrap();

    let busy = Arc::new(AtomicBool::new(false));
    let fired = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    {
        let busy = Arc::clone(&busy);
        let fired = Arc::clone(&fired);
        let overlaps = Arc::clone(&overlaps);
        machine
            .set_transition_callback(move |_, _, _| {
                fired.fetch_add(1, Ordering::SeqCst);
                if busy.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
    }
    {
        let busy = Arc::clone(&busy);
        machine
            .set_enter_state_callback(move |_| busy.store(false, Ordering::SeqCst))
            .unwrap();
    }
    let events = record_events(&machine);
    machine.start().unwrap();

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..PER_THREAD {
                    machine.handle_event("go");
                }
            });
        }
    });

    let total = THREADS * PER_THREAD;
    assert!(wait_until(PATIENCE, || count(&events, "go") == total));
    assert!(fired.load(Ordering::SeqCst) <= total);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    machine.stop();
}

#[test]
fn leaving_a_state_early_cancels_its_timeout() {
    let definition = DefinitionBuilder::new()
        .timed_state("WAIT", Duration::from_millis(300))
        .state("DONE")
        .state("EXPIRED")
        .initial("WAIT")
        .add_transition(TransitionRule::new("WAIT", "DONE").on("leave"))
        .add_transition(TransitionRule::new("WAIT", "EXPIRED").on(STATE_TIMEOUT_EVENT))
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("early");
    machine.init(&definition).unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    machine.handle_event("leave");
    assert!(wait_until(PATIENCE, || in_state(&machine, "DONE")));
    thread::sleep(Duration::from_millis(500));

    assert!(in_state(&machine, "DONE"));
    assert_eq!(count(&events, STATE_TIMEOUT_EVENT), 0);
    machine.stop();
}

#[test]
fn conditions_select_between_rules_on_one_event() {
    let definition = DefinitionBuilder::new()
        .state("IDLE")
        .state("FIRST")
        .state("SECOND")
        .initial("IDLE")
        .add_transition(
            TransitionRule::new("IDLE", "FIRST")
                .on("go")
                .with_condition(Condition::new("mode", 1, 1)),
        )
        .add_transition(
            TransitionRule::new("IDLE", "SECOND")
                .on("go")
                .with_condition(Condition::new("mode", 2, 2)),
        )
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("ordering");
    machine.init(&definition).unwrap();
    machine.start().unwrap();

    machine.set_condition_value("mode", 2);
    assert!(wait_until(PATIENCE, || machine.condition_value("mode") == 2));
    machine.handle_event("go");
    assert!(wait_until(PATIENCE, || in_state(&machine, "SECOND")));
    machine.stop();
}

#[test]
fn first_registered_rule_wins() {
    let definition = DefinitionBuilder::new()
        .state("IDLE")
        .state("FIRST")
        .state("SECOND")
        .initial("IDLE")
        .add_transition(TransitionRule::new("IDLE", "FIRST").on("go"))
        .add_transition(TransitionRule::new("IDLE", "SECOND").on("go"))
        .build()
        .unwrap();

    let machine = FiniteStateMachine::new("first-match");
    machine.init(&definition).unwrap();
    machine.start().unwrap();

    machine.handle_event("go");
    assert!(wait_until(PATIENCE, || !in_state(&machine, "IDLE")));
    assert!(in_state(&machine, "FIRST"));
    machine.stop();
}

#[test]
fn pre_event_filter_rejects_events() {
    let machine = FiniteStateMachine::new("filtered");
    machine.init(&nested_definition()).unwrap();
    machine
        .set_pre_event_callback(|_state, event| event.name() != "go")
        .unwrap();
    let events = record_events(&machine);
    machine.start().unwrap();

    machine.handle_event("go");
    assert!(wait_until(PATIENCE, || count(&events, "go") == 1));
    assert_eq!(events.lock().unwrap()[0], ("go".to_string(), false));
    assert!(in_state(&machine, "A1a"));

    machine.handle_event("reset");
    assert!(wait_until(PATIENCE, || in_state(&machine, "A2a")));
    machine.stop();
}

#[test]
fn events_queued_before_start_are_processed() {
    let machine = FiniteStateMachine::new("buffered");
    machine.init(&nested_definition()).unwrap();
    machine.handle_event("go");
    assert!(in_state(&machine, "A1a"));

    machine.start().unwrap();
    assert!(wait_until(PATIENCE, || in_state(&machine, "A2a")));
    machine.stop();
}

#[test]
fn lifecycle_misuse_is_rejected() {
    let machine = FiniteStateMachine::new("lifecycle");
    assert!(matches!(machine.start(), Err(FsmError::NotInitialized)));

    machine.init(&nested_definition()).unwrap();
    assert!(matches!(
        machine.init(&nested_definition()),
        Err(FsmError::AlreadyInitialized)
    ));

    machine.start().unwrap();
    assert!(matches!(machine.start(), Err(FsmError::AlreadyRunning)));

    machine.stop();
    machine.stop();
    assert_eq!(machine.lifecycle(), Lifecycle::Stopped);

    machine.start().unwrap();
    machine.handle_event("go");
    assert!(wait_until(PATIENCE, || in_state(&machine, "A2a")));
    machine.stop();
}

#[test]
fn invalid_definition_reports_every_violation() {
    let definition = MachineDefinition {
        states: vec![StateInfo::new("A"), StateInfo::new("B").with_parent("Ghost")],
        initial_state: "Nowhere".to_string(),
        transitions: vec![TransitionRule::new("A", "C")],
        events: Vec::new(),
    };

    let machine = FiniteStateMachine::new("invalid");
    match machine.init(&definition) {
        Err(FsmError::InvalidDefinition(violations)) => {
            assert_eq!(violations.len(), 3);
            assert!(violations.contains(&ConfigViolation::UnknownInitialState {
                state: "Nowhere".to_string()
            }));
        }
        other => panic!("expected invalid definition, got {:?}", other),
    }
    assert_eq!(machine.lifecycle(), Lifecycle::Created);
    assert_eq!(machine.current_state(), None);
}

#[test]
fn callbacks_are_locked_while_running() {
    let machine = FiniteStateMachine::new("locked");
    machine.init(&nested_definition()).unwrap();
    machine.start().unwrap();

    assert!(matches!(
        machine.set_post_event_callback(|_, _| {}),
        Err(FsmError::CallbacksLocked)
    ));

    machine.stop();
    assert!(machine.set_post_event_callback(|_, _| {}).is_ok());
}

#[test]
fn stop_from_a_callback_does_not_deadlock() {
    let machine = Arc::new(FiniteStateMachine::new("self-stop"));
    machine.init(&nested_definition()).unwrap();
    let handle = Arc::downgrade(&machine);
    machine
        .set_enter_state_callback(move |_| {
            if let Some(machine) = handle.upgrade() {
                machine.stop();
            }
        })
        .unwrap();
    machine.start().unwrap();

    machine.handle_event("go");
    assert!(wait_until(PATIENCE, || machine.lifecycle() == Lifecycle::Stopped));
    assert!(in_state(&machine, "A2a"));
}

#[test]
fn machine_loads_configuration_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(
        root.join(STATE_CONFIG_FILE),
        r#"{"states": [{"name": "OFF"}, {"name": "ON"}], "initial_state": "OFF"}"#,
    )
    .unwrap();
    fs::create_dir(root.join(EVENT_CONFIG_DIR)).unwrap();
    fs::write(
        root.join(EVENT_CONFIG_DIR).join("switch.json"),
        r#"{"name": "switch_on", "conditions": [{"name": "switch", "range": [1, 1]}]}"#,
    )
    .unwrap();
    fs::create_dir(root.join(TRANSITION_CONFIG_DIR)).unwrap();
    fs::write(
        root.join(TRANSITION_CONFIG_DIR).join("off_on.json"),
        r#"{"from": "OFF", "to": "ON", "event": "switch_on"}"#,
    )
    .unwrap();

    let machine = FiniteStateMachine::new("configured");
    machine.init_from_path(root).unwrap();
    machine.start().unwrap();

    machine.set_condition_value("switch", 1);
    assert!(wait_until(PATIENCE, || in_state(&machine, "ON")));
    machine.stop();
}

#[test]
fn registry_stops_removed_machines() {
    let registry = MachineRegistry::new();
    let machine = registry.create("hvac");
    machine.init(&nested_definition()).unwrap();
    machine.start().unwrap();

    assert!(Arc::ptr_eq(&machine, &registry.create("hvac")));
    registry.create("lights");
    assert_eq!(registry.names(), vec!["hvac", "lights"]);

    let removed = registry.remove("hvac").unwrap();
    assert_eq!(removed.lifecycle(), Lifecycle::Stopped);
    assert!(registry.get("hvac").is_none());
    assert_eq!(registry.len(), 1);
}
