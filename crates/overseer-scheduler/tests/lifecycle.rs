// End-to-end lifecycle tests: real cron clock, real processes.
// Timings are deliberately generous — cron resolution is one second.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use overseer_runner::{ProcessRunner, TokioProcessRunner};
use overseer_scheduler::{CronClock, Mission, Scheduler, ShellMission};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("overseer_scheduler=debug,overseer_runner=debug")
        .try_init();
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn non_overlapping_sleep_mission_tracks_at_most_one_pid() {
    init_tracing();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
    let scheduler = Scheduler::new(Arc::new(CronClock::new()), Arc::clone(&runner));

    let finishes = Arc::new(AtomicUsize::new(0));
    let mission = Arc::new(
        ShellMission::new("a", "* * * * * *", "sleep", runner)
            .args(["1"])
            .on_finish({
                let finishes = Arc::clone(&finishes);
                move || {
                    finishes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
    );
    scheduler
        .add_mission(Arc::clone(&mission) as Arc<dyn Mission>)
        .unwrap();
    scheduler.start();

    // Sample the PID set for ~3.5 firing periods.
    let mut max_seen = 0usize;
    for _ in 0..70 {
        max_seen = max_seen.max(mission.pids().len());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    scheduler.stop().await;

    assert!(max_seen <= 1, "overlap policy violated: saw {max_seen} PIDs");
    let done = finishes.load(Ordering::SeqCst);
    assert!((2..=5).contains(&done), "expected 2-5 completed runs, saw {done}");
    assert!(mission.pids().is_empty());
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn failing_command_routes_to_error_hook_not_finish() {
    init_tracing();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
    let scheduler = Scheduler::new(Arc::new(CronClock::new()), Arc::clone(&runner));

    let errors = Arc::new(AtomicUsize::new(0));
    let finishes = Arc::new(AtomicUsize::new(0));
    let mission = Arc::new(
        ShellMission::new("b", "* * * * * *", "sh", runner)
            .args(["-c", "exit 3"])
            .on_error({
                let errors = Arc::clone(&errors);
                move |failure| {
                    assert!(
                        failure.to_string().contains("exit code 3"),
                        "unexpected failure: {failure}"
                    );
                    errors.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .on_finish({
                let finishes = Arc::clone(&finishes);
                move || {
                    finishes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
    );
    scheduler.add_mission(mission).unwrap();
    scheduler.start();

    wait_until("error hook", || errors.load(Ordering::SeqCst) >= 1).await;
    scheduler.stop().await;

    assert_eq!(finishes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn destroy_force_kills_a_permanent_mission() {
    init_tracing();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
    let scheduler = Scheduler::new(Arc::new(CronClock::new()), Arc::clone(&runner))
        .with_grace_period(Duration::from_millis(200));

    let mission = Arc::new(
        ShellMission::new("daemon", "* * * * * *", "sleep", runner)
            .args(["600"])
            .permanent(true),
    );
    scheduler
        .add_mission(Arc::clone(&mission) as Arc<dyn Mission>)
        .unwrap();
    scheduler.start();

    wait_until("daemon spawn", || mission.is_running()).await;
    scheduler.destroy().await;

    assert!(mission.pids().is_empty());
    assert!(!scheduler.is_running());

    // Destroying again is a no-op.
    scheduler.destroy().await;
}

#[tokio::test]
async fn disable_spares_the_running_instance() {
    init_tracing();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
    let scheduler = Scheduler::new(Arc::new(CronClock::new()), Arc::clone(&runner));

    let finishes = Arc::new(AtomicUsize::new(0));
    let mission = Arc::new(
        ShellMission::new("c", "* * * * * *", "sleep", runner)
            .args(["2"])
            .on_finish({
                let finishes = Arc::clone(&finishes);
                move || {
                    finishes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
    );
    scheduler
        .add_mission(Arc::clone(&mission) as Arc<dyn Mission>)
        .unwrap();
    scheduler.start();

    wait_until("first spawn", || mission.is_running()).await;
    let pid = mission.pids()[0];
    mission.disable();

    // The in-flight instance keeps its PID until it exits on its own.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(mission.pids(), vec![pid]);

    wait_until("natural exit", || mission.pids().is_empty()).await;
    // No further spawns once disabled.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(mission.pids().is_empty());
    assert_eq!(finishes.load(Ordering::SeqCst), 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn remove_mission_unregisters_and_stops_it() {
    init_tracing();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
    let scheduler = Scheduler::new(Arc::new(CronClock::new()), Arc::clone(&runner));

    let mission = Arc::new(
        ShellMission::new("tmp", "* * * * * *", "sleep", runner).args(["600"]),
    );
    scheduler
        .add_mission(Arc::clone(&mission) as Arc<dyn Mission>)
        .unwrap();
    scheduler.start();

    wait_until("spawn", || mission.is_running()).await;
    scheduler.remove_mission("tmp").await.unwrap();
    wait_until("drain", || mission.pids().is_empty()).await;
    assert!(scheduler.mission_names().is_empty());

    // Removing a name that was never registered is fine.
    scheduler.remove_mission("ghost").await.unwrap();

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}
