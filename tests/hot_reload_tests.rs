//! Integration tests for periodic re-injection.
//!
//! Timing-based: periods are short and assertions poll with a generous
//! deadline so slow CI machines do not flake.

use props_injector::providers::SystemProperties;
use props_injector::{
    Binding, BindingSet, Configurable, HotReload, Injector, InjectorConfig, shared,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const PERIOD: Duration = Duration::from_millis(100);
const DEADLINE: Duration = Duration::from_secs(5);

/// Poll `check` until it holds or the deadline passes.
fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    check()
}

fn injector_for(root: &Path) -> Injector {
    Injector::builder()
        .config(InjectorConfig::default().with_resource_roots(vec![root.to_path_buf()]))
        .system_properties(Arc::new(SystemProperties::new()))
        .build()
}

#[derive(Default)]
struct Live {
    message: String,
}

impl Configurable for Live {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("message", |l: &mut Live, v: String| l.message = v)
            .bind(Binding::property("live.properties", "message"));
    }

    fn hot_reload() -> Option<HotReload> {
        Some(HotReload::every(PERIOD))
    }

    fn managed_name() -> Option<String> {
        Some("live".to_string())
    }
}

#[derive(Default)]
struct Once {
    message: String,
}

impl Configurable for Once {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("message", |o: &mut Once, v: String| o.message = v)
            .bind(Binding::property("live.properties", "message"));
    }
}

#[derive(Default)]
struct Rarely {
    message: String,
}

impl Configurable for Rarely {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("message", |r: &mut Rarely, v: String| r.message = v)
            .bind(Binding::property("live.properties", "message"));
    }

    fn hot_reload() -> Option<HotReload> {
        Some(HotReload::every(Duration::MAX))
    }
}

#[test]
fn file_change_picked_up_by_next_pass() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("live.properties");
    std::fs::write(&file, "message=old\n").unwrap();
    let injector = injector_for(temp.path());

    let live = shared(Live::default());
    let handle = injector.inject(&live).unwrap().expect("scheduled");
    assert_eq!(live.read().message, "old");
    assert_eq!(handle.period(), PERIOD);

    std::fs::write(&file, "message=new\n").unwrap();
    thread::sleep(PERIOD + PERIOD / 2);
    assert!(eventually(|| live.read().message == "new"));

    let managed = injector.managed_objects();
    let object = managed.get("props_injector:name=live").expect("registered");
    assert!(eventually(|| managed
        .get("props_injector:name=live")
        .is_some_and(|o| o.refreshes > 0)));
    assert_eq!(object.identity, Arc::as_ptr(&live) as *const () as usize);
}

#[test]
fn unscheduled_targets_keep_cached_values() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("live.properties");
    std::fs::write(&file, "message=old\n").unwrap();
    let injector = injector_for(temp.path());

    let once = shared(Once::default());
    assert!(injector.inject(&once).unwrap().is_none());
    assert!(!injector.is_scheduled(&once));

    std::fs::write(&file, "message=new\n").unwrap();
    thread::sleep(PERIOD * 3);
    assert_eq!(once.read().message, "old");
}

#[test]
fn reinjecting_does_not_schedule_twice() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("live.properties"), "message=a\n").unwrap();
    let injector = injector_for(temp.path());

    let live = shared(Live::default());
    let first = injector.inject(&live).unwrap().expect("scheduled");
    let second = injector.inject(&live).unwrap().expect("scheduled");
    assert_eq!(injector.scheduled(), 1);
    assert!(injector.is_scheduled(&live));

    second.cancel();
    assert!(first.is_cancelled());
}

#[test]
fn cancelled_target_stops_refreshing() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("live.properties");
    std::fs::write(&file, "message=old\n").unwrap();
    let injector = injector_for(temp.path());

    let live = shared(Live::default());
    let handle = injector.inject(&live).unwrap().expect("scheduled");
    handle.cancel();
    assert!(eventually(|| !injector.is_scheduled(&live)));

    std::fs::write(&file, "message=new\n").unwrap();
    thread::sleep(PERIOD * 3);
    assert_eq!(live.read().message, "old");
}

#[test]
fn failing_pass_keeps_task_scheduled() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("live.properties");
    std::fs::write(&file, "message=old\n").unwrap();
    let injector = injector_for(temp.path());

    let live = shared(Live::default());
    let _handle = injector.inject(&live).unwrap().expect("scheduled");

    std::fs::remove_file(&file).unwrap();
    thread::sleep(PERIOD * 3);
    assert!(injector.is_scheduled(&live));
    assert_eq!(live.read().message, "old");

    std::fs::write(&file, "message=back\n").unwrap();
    assert!(eventually(|| live.read().message == "back"));
}

#[test]
fn dropped_target_is_unregistered() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("live.properties"), "message=a\n").unwrap();
    let injector = injector_for(temp.path());

    let live = shared(Live::default());
    let _handle = injector.inject(&live).unwrap().expect("scheduled");
    drop(live);

    assert!(eventually(|| injector.scheduled() == 0));
}

#[test]
fn shutdown_cancels_every_registration() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("live.properties"), "message=a\n").unwrap();
    let injector = injector_for(temp.path());

    let a = shared(Live::default());
    let b = shared(Live::default());
    let handle_a = injector.inject(&a).unwrap().expect("scheduled");
    let handle_b = injector.inject(&b).unwrap().expect("scheduled");
    assert_eq!(injector.scheduled(), 2);

    injector.shutdown();
    assert!(handle_a.is_cancelled());
    assert!(handle_b.is_cancelled());
    assert_eq!(injector.scheduled(), 0);
}

#[test]
fn unbounded_period_still_injects_and_schedules() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("live.properties"), "message=once\n").unwrap();
    let injector = injector_for(temp.path());

    let rarely = shared(Rarely::default());
    let handle = injector.inject(&rarely).unwrap().expect("scheduled");
    assert_eq!(rarely.read().message, "once");
    assert!(!handle.is_cancelled());
    assert!(injector.is_scheduled(&rarely));
    assert!(handle.period() < Duration::MAX);
}
