//! End-to-end scenarios: ordering, wildcard, payload and lifecycle.

use parking_lot::Mutex;
use statekit::{
    Disposer, HistoryRecorder, Machine, MachineError, State, StateChange, Transition,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<(String, String, String)>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn recorder(
    log: &Log,
    label: &'static str,
) -> impl Fn(&StateChange<&'static str>) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |change| {
        log.lock().push((
            label.to_owned(),
            change.from.name().to_owned(),
            change.to.name().to_owned(),
        ));
    }
}

#[test]
fn leave_then_enter_then_transition_channel() {
    init_tracing();
    let machine: Machine<&'static str> = Machine::new("M");
    let a = machine.new_state("A").unwrap();
    let b = machine.new_state("B").unwrap();
    let go = machine.new_transition("go", &[a.clone()], &b).unwrap();
    machine.start(&a).unwrap();

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    go.on_invoke(recorder(&log, "go"));
    b.on_enter(recorder(&log, "B.enter"));
    a.on_leave(recorder(&log, "A.leave"));

    assert!(go.invoke(None).unwrap());

    let expected: Vec<(String, String, String)> = ["A.leave", "B.enter", "go"]
        .iter()
        .map(|label| (label.to_string(), "A".to_string(), "B".to_string()))
        .collect();
    assert_eq!(*log.lock(), expected);
}

struct Door {
    machine: Machine,
    open: State,
    closed: State,
    broken: State,
    close: Transition,
    smash: Transition,
}

fn door() -> Door {
    let machine: Machine = Machine::new("door");
    let open = machine.new_state("Open").unwrap();
    let closed = machine.new_state("Closed").unwrap();
    let broken = machine.new_state("Broken").unwrap();
    let close = machine
        .new_transition("close", &[open.clone()], &closed)
        .unwrap();
    let smash = machine
        .new_transition("break", &[State::ANY], &broken)
        .unwrap();
    Door {
        machine,
        open,
        closed,
        broken,
        close,
        smash,
    }
}

#[test]
fn wildcard_transition_is_legal_from_anywhere() {
    let from_open = door();
    from_open.machine.start(&from_open.open).unwrap();
    assert!(from_open.smash.invoke(None).unwrap());
    assert!(from_open.broken.is_active());

    let from_closed = door();
    from_closed.machine.start(&from_closed.open).unwrap();
    assert!(from_closed.close.invoke(None).unwrap());
    assert!(from_closed.closed.is_active());
    assert!(from_closed.smash.invoke(None).unwrap());
    assert!(from_closed.broken.is_active());

    // Broken -> Broken through the wildcard.
    assert!(from_closed.smash.invoke(None).unwrap());
    assert!(from_closed.broken.is_active());
}

#[test]
fn self_transition_fires_leave_and_enter() {
    let machine: Machine<&'static str> = Machine::new("door");
    let broken = machine.new_state("Broken").unwrap();
    let smash = machine
        .new_transition("break", &[State::ANY], &broken)
        .unwrap();
    machine.start(&broken).unwrap();

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    broken.on_leave(recorder(&log, "leave"));
    broken.on_enter(recorder(&log, "enter"));

    assert!(smash.invoke(None).unwrap());

    let labels: Vec<String> = log.lock().iter().map(|(l, _, _)| l.clone()).collect();
    assert_eq!(labels, vec!["leave", "enter"]);
}

#[test]
fn payload_reaches_transition_and_target_subscribers() {
    let machine: Machine<&'static str> = Machine::new("door");
    let open = machine.new_state("Open").unwrap();
    let closed = machine.new_state("Closed").unwrap();
    let close = machine
        .new_transition("close", &[open.clone()], &closed)
        .unwrap();

    let payloads = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let sink = payloads.clone();
        close.on_invoke(move |change| sink.lock().push(change.payload));
    }
    let sink = payloads.clone();
    closed.on_enter(move |change| sink.lock().push(change.payload));

    machine.start(&open).unwrap();
    assert!(close.invoke(Some("15w")).unwrap());

    assert_eq!(*payloads.lock(), vec![Some("15w"); 3]);
}

#[test]
fn repeated_invocations_produce_distinct_events() {
    let machine: Machine = Machine::new("counter");
    let idle = machine.new_state("Idle").unwrap();
    let tick = machine.new_transition("tick", &[idle.clone()], &idle).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    tick.on_invoke(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    machine.start(&idle).unwrap();
    assert!(tick.invoke(None).unwrap());
    assert!(tick.invoke(None).unwrap());

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn late_subscriber_sees_only_future_changes() {
    let machine: Machine<&'static str> = Machine::new("M");
    let a = machine.new_state("A").unwrap();
    let b = machine.new_state("B").unwrap();
    let there = machine.new_transition("there", &[a.clone()], &b).unwrap();
    let back = machine.new_transition("back", &[b.clone()], &a).unwrap();

    machine.start(&a).unwrap();
    there.invoke(None).unwrap();

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    b.on_enter(recorder(&log, "B.enter"));
    a.on_enter(recorder(&log, "A.enter"));

    back.invoke(None).unwrap();

    assert_eq!(
        *log.lock(),
        vec![("A.enter".to_string(), "B".to_string(), "A".to_string())]
    );
}

#[test]
fn illegal_transition_is_distinguishable_from_veto() {
    init_tracing();
    let machine: Machine = Machine::new("door");
    let open = machine.new_state("Open").unwrap();
    let closed = machine.new_state("Closed").unwrap();
    let close = machine
        .new_transition("close", &[open.clone()], &closed)
        .unwrap();
    close.cancel_if(|_| true);

    machine.start(&open).unwrap();
    assert!(!close.invoke(None).unwrap());

    let reopen = machine.new_transition("open", &[closed.clone()], &open);
    assert!(matches!(reopen, Err(MachineError::IllegalMutation { .. })));

    let machine: Machine = Machine::new("door");
    let open = machine.new_state("Open").unwrap();
    let closed = machine.new_state("Closed").unwrap();
    let reopen = machine
        .new_transition("open", &[closed.clone()], &open)
        .unwrap();
    machine.start(&open).unwrap();

    let err = reopen.invoke(None).unwrap_err();
    match &err {
        MachineError::IllegalTransition {
            transition,
            from,
            to,
        } => {
            assert_eq!(transition.name(), "open");
            assert_eq!(from, &open);
            assert_eq!(to, &open);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("'open'"));
}

#[test]
fn unsubscribed_observer_is_not_called() {
    let machine: Machine = Machine::new("M");
    let a = machine.new_state("A").unwrap();
    let b = machine.new_state("B").unwrap();
    let go = machine.new_transition("go", &[a.clone()], &b).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let sub = b.on_enter(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    sub.unsubscribe();

    machine.start(&a).unwrap();
    go.invoke(None).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn host_teardown_releases_machine_and_recorder() {
    let machine: Machine = Machine::new("widget");
    let idle = machine.new_state("Idle").unwrap();
    let busy = machine.new_state("Busy").unwrap();
    let work = machine.new_transition("work", &[idle.clone()], &busy).unwrap();
    let recorder = Arc::new(HistoryRecorder::attach(&machine));

    let subscriptions = [
        idle.on_leave(|_| {}),
        busy.on_enter(|_| {}),
        work.on_invoke(|_| {}),
    ];
    {
        let disposer = Disposer::new();
        disposer.adopt(machine.clone());
        let held = recorder.clone();
        disposer.register(move || held.detach());
    }

    assert!(subscriptions.iter().all(|s| !s.is_active()));
    assert!(!recorder.is_attached());

    machine.start(&idle).unwrap();
    assert!(work.invoke(None).unwrap());
    assert!(recorder.is_empty());
}

#[test]
fn machine_is_usable_across_threads() {
    init_tracing();
    let machine: Machine<u32> = Machine::new("shared");
    let a = machine.new_state("A").unwrap();
    let b = machine.new_state("B").unwrap();
    let flip = machine
        .new_transition("flip", &[a.clone(), b.clone()], &a)
        .unwrap();
    let flop = machine
        .new_transition("flop", &[a.clone(), b.clone()], &b)
        .unwrap();
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    machine.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    machine.start(&a).unwrap();

    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let flip = flip.clone();
            let flop = flop.clone();
            std::thread::spawn(move || {
                for n in 0..25 {
                    if (i + n) % 2 == 0 {
                        assert!(flip.invoke(Some(n)).unwrap());
                    } else {
                        assert!(flop.invoke(Some(n)).unwrap());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One change for start plus one per invocation.
    assert_eq!(changes.load(Ordering::SeqCst), 101);
    assert!(a.is_active() || b.is_active());
}
