// End-to-end sampling loop tests with scripted probes

mod common;

use common::{celsius, unavailable, PanickingProbe, ScriptedProbe};
use sensetop::config::AppConfig;
use sensetop::data::{SampleAggregator, UnavailableReason};
use sensetop::sampler::{SamplingLoop, TickOutcome};
use sensetop::scheduler::Scheduler;
use std::time::Duration;

fn config(sample_ms: u64, render_ms: u64, threshold: u32) -> AppConfig {
    AppConfig {
        sample_interval_ms: sample_ms,
        render_interval_ms: render_ms,
        failure_threshold: threshold,
        history_capacity: 16,
        ..AppConfig::default()
    }
}

fn started(config: &AppConfig, probes: Vec<Box<dyn sensetop::probes::SensorProbe>>) -> SamplingLoop {
    let mut sampling = SamplingLoop::from_config(config, probes).expect("sampling loop");
    sampling.scheduler_mut().start().expect("start");
    sampling
}

#[test]
fn test_every_registered_probe_has_one_entry_per_snapshot() {
    let mut aggregator = SampleAggregator::new(Duration::from_secs(1));
    aggregator
        .register(ScriptedProbe::boxed("cpu_temp", vec![celsius("cpu_temp", "Core0", 40.0)]))
        .unwrap();
    aggregator.register(Box::new(PanickingProbe)).unwrap();
    aggregator
        .register(ScriptedProbe::boxed(
            "gpu",
            vec![unavailable(UnavailableReason::NotPresent)],
        ))
        .unwrap();

    for tick in 1..=5 {
        let snapshot = aggregator.collect(tick);
        assert_eq!(snapshot.tick(), tick);
        let ids: Vec<&str> = snapshot.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["cpu_temp", "panicking", "gpu"]);
    }
    assert_eq!(aggregator.health("panicking").unwrap().panics, 5);
}

#[test]
fn test_cpu_temp_goes_stale_exactly_at_threshold() {
    let script = vec![
        celsius("cpu_temp", "Core0", 55.0),
        celsius("cpu_temp", "Core0", 55.0),
        celsius("cpu_temp", "Core0", 55.0),
        unavailable(UnavailableReason::TransientError),
        unavailable(UnavailableReason::TransientError),
    ];
    let mut sampling = started(
        &config(1000, 1000, 2),
        vec![ScriptedProbe::boxed("cpu_temp", script)],
    );

    let mut stale_by_tick = Vec::new();
    for _ in 0..5 {
        sampling.on_interval();
        stale_by_tick.push(sampling.model().panel("cpu_temp").unwrap().is_stale());
    }
    assert_eq!(stale_by_tick, vec![false, false, false, false, true]);

    let panel = sampling.model().panel("cpu_temp").unwrap();
    assert_eq!(panel.series("Core0").unwrap().latest(), Some(55.0));
    assert_eq!(panel.series("Core0").unwrap().len(), 3);
}

#[test]
fn test_absent_gpu_never_goes_stale() {
    let mut sampling = started(
        &config(1000, 1000, 1),
        vec![ScriptedProbe::boxed(
            "gpu",
            vec![unavailable(UnavailableReason::NotPresent)],
        )],
    );
    for _ in 0..20 {
        sampling.on_interval();
        let panel = sampling.model().panel("gpu").unwrap();
        assert!(!panel.is_stale());
        assert_eq!(panel.consecutive_failures(), 0);
    }
}

#[test]
fn test_panicking_probe_does_not_stop_the_loop() {
    let mut sampling = started(
        &config(1000, 1000, 3),
        vec![
            Box::new(PanickingProbe),
            ScriptedProbe::boxed("cpu_temp", vec![celsius("cpu_temp", "Core0", 42.0)]),
        ],
    );
    for _ in 0..3 {
        sampling.on_interval();
    }
    assert!(sampling.model().panel("panicking").unwrap().is_stale());
    let cpu = sampling.model().panel("cpu_temp").unwrap();
    assert!(!cpu.is_stale());
    assert_eq!(cpu.series("Core0").unwrap().len(), 3);
}

#[test]
fn test_ticks_advance_by_one_and_freeze_while_paused() {
    let mut sampling = started(
        &config(1000, 1000, 3),
        vec![ScriptedProbe::boxed("cpu_temp", vec![celsius("cpu_temp", "Core0", 42.0)])],
    );

    let mut ticks = Vec::new();
    for step in 0..8 {
        if step == 3 {
            sampling.scheduler_mut().pause().unwrap();
        }
        if step == 6 {
            sampling.scheduler_mut().resume().unwrap();
        }
        if let TickOutcome::Sampled { tick, .. } = sampling.on_interval() {
            ticks.push(tick);
        }
    }
    assert_eq!(ticks, vec![1, 2, 3, 4, 5]);
    assert_eq!(sampling.model().last_tick(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_ten_seconds_at_one_second_sampling_three_second_render() {
    let mut sampling = started(
        &config(1000, 3000, 3),
        vec![ScriptedProbe::boxed("cpu_temp", vec![celsius("cpu_temp", "Core0", 42.0)])],
    );
    let mut ticker = sampling.scheduler().interval();
    let start = tokio::time::Instant::now();

    let mut samples = 0;
    let mut renders = 0;
    while start.elapsed() < Duration::from_secs(10) {
        ticker.tick().await;
        if start.elapsed() >= Duration::from_secs(10) {
            break;
        }
        let outcome = sampling.on_interval();
        if matches!(outcome, TickOutcome::Sampled { .. }) {
            samples += 1;
        }
        if outcome.should_render() {
            renders += 1;
        }
    }

    assert_eq!(samples, 10);
    // Ticks 1, 4, 7 and 10.
    assert_eq!(renders, 4);
}

#[test]
fn test_scheduler_render_ratio_rounds() {
    let scheduler = Scheduler::new(Duration::from_millis(400), Duration::from_millis(1000));
    assert_eq!(scheduler.render_every(), 3);
}
