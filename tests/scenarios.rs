//! 端到端场景：样本槽 → 控制循环 → 内存台灯

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use mood_lamp::{
    BackoffConfig, Clock, ControlLoop, DeviceAddress, EmotionLabel, EmotionSample, EmotionSmoother,
    LampConnection, LightPolicy, LinkState, LoopConfig, LoopEvent, ManualClock, MockTransport,
    SampleSlot, SmootherConfig, TokioClock,
};

const TICK: Duration = Duration::from_millis(250);
const IO_TIMEOUT: Duration = Duration::from_secs(3);
const WARM: [u8; 5] = [0xAA, 85, 255, 200, 100];
const COOL: [u8; 5] = [0xAA, 45, 150, 180, 255];

struct Harness {
    control: ControlLoop,
    slot: SampleSlot,
    mock: MockTransport,
    clock: ManualClock,
    events: mpsc::UnboundedReceiver<LoopEvent>,
}

impl Harness {
    fn new() -> Self {
        let slot = SampleSlot::new();
        let mock = MockTransport::new();
        let clock = ManualClock::new();
        let (tx, events) = mpsc::unbounded_channel();

        let connection = LampConnection::new(
            DeviceAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            Box::new(mock.clone()),
            IO_TIMEOUT,
            BackoffConfig::default(),
        );
        let control = ControlLoop::new(
            LoopConfig {
                tick: TICK,
                reassert_interval: None,
                farewell: None,
            },
            slot.clone(),
            EmotionSmoother::new(SmootherConfig::default()),
            LightPolicy::new(),
            connection,
            Arc::new(clock.clone()),
        )
        .with_event_channel(tx);

        Self { control, slot, mock, clock, events }
    }

    /// 以固定 tick 周期推进 `duration`，每 `every` 产生一个样本
    async fn run_for(&mut self, duration: Duration, sample: Option<(EmotionLabel, f32)>, every: Duration) {
        let start = self.clock.elapsed();
        let mut next_sample = start;
        while self.clock.elapsed() < start + duration {
            if let Some((label, confidence)) = sample {
                if self.clock.elapsed() >= next_sample {
                    self.slot.publish(EmotionSample::new(label, confidence, self.clock.now()));
                    next_sample += every;
                }
            }
            self.control.tick().await;
            self.clock.advance(TICK);
        }
    }

    fn drain_events(&mut self) -> Vec<LoopEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.mock.sent().iter().map(|b| b.to_vec()).collect()
    }
}

fn count(events: &[LoopEvent], pred: impl Fn(&LoopEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[tokio::test]
async fn happy_stream_sets_warm_light_once() {
    let mut h = Harness::new();

    // 3 秒内 6 个 happy 样本
    h.run_for(Duration::from_secs(3), Some((EmotionLabel::Happy, 0.9)), Duration::from_millis(500)).await;

    assert_eq!(h.control.stable().map(|s| s.label), Some(EmotionLabel::Happy));
    assert_eq!(h.sent(), vec![WARM.to_vec()]);

    let events = h.drain_events();
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::StableChanged { to: EmotionLabel::Happy, .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::CommandSent { .. })), 1);
    assert_eq!(h.control.stats().samples, 6);
}

#[tokio::test]
async fn dropped_lamp_gets_next_command_once_after_backoff() {
    let mut h = Harness::new();
    h.run_for(Duration::from_secs(2), Some((EmotionLabel::Happy, 0.9)), Duration::from_millis(500)).await;
    assert_eq!(h.sent(), vec![WARM.to_vec()]);
    h.drain_events();

    // 下一次写入时台灯掉线
    h.mock.fail_sends(1);
    let mut failed_at = None;
    for _ in 0..12 {
        h.slot.publish(EmotionSample::new(EmotionLabel::Sad, 0.9, h.clock.now()));
        h.control.tick().await;
        h.clock.advance(TICK);
        if failed_at.is_none() && matches!(h.control.link_state(), LinkState::Backoff { .. }) {
            failed_at = Some(h.clock.elapsed() - TICK);
            break;
        }
    }
    let failed_at = failed_at.expect("send failure should enter backoff");
    let attempts_at_failure = h.mock.connect_attempts();

    // 退避期间不重连、不发送
    while h.clock.elapsed() < failed_at + Duration::from_secs(1) {
        h.slot.publish(EmotionSample::new(EmotionLabel::Sad, 0.9, h.clock.now()));
        let report = h.control.tick().await;
        assert!(report.sent.is_none());
        h.clock.advance(TICK);
    }
    assert_eq!(h.mock.connect_attempts(), attempts_at_failure);

    // 到期后重连并补发一次
    h.run_for(Duration::from_secs(3), Some((EmotionLabel::Sad, 0.9)), Duration::from_millis(500)).await;
    assert_eq!(h.control.link_state(), LinkState::Connected);
    assert_eq!(h.sent(), vec![WARM.to_vec(), COOL.to_vec()]);

    let events = h.drain_events();
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::SendFailed { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::BackoffScheduled { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::Connected { reconnect: true })), 1);
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::CommandSent { .. })), 1);
    assert_eq!(h.control.stats().reconnects, 1);
}

#[tokio::test]
async fn silent_link_drop_resyncs_current_command() {
    let mut h = Harness::new();
    h.run_for(Duration::from_secs(2), Some((EmotionLabel::Sad, 0.9)), Duration::from_millis(500)).await;
    assert_eq!(h.sent(), vec![COOL.to_vec()]);

    h.mock.drop_link();
    h.run_for(Duration::from_secs(3), None, TICK).await;

    assert_eq!(h.control.link_state(), LinkState::Connected);
    assert_eq!(h.sent(), vec![COOL.to_vec(), COOL.to_vec()]);
    assert_eq!(h.control.stats().link_losses, 1);
}

#[tokio::test]
async fn low_confidence_stream_changes_nothing() {
    let mut h = Harness::new();
    h.run_for(Duration::from_secs(2), Some((EmotionLabel::Happy, 0.9)), Duration::from_millis(500)).await;
    assert_eq!(h.sent(), vec![WARM.to_vec()]);
    h.drain_events();

    // 10 秒的低置信度 sad
    h.run_for(Duration::from_secs(10), Some((EmotionLabel::Sad, 0.1)), Duration::from_millis(250)).await;

    let events = h.drain_events();
    assert_eq!(count(&events, |e| matches!(e, LoopEvent::StableChanged { .. })), 0);
    assert_eq!(h.control.stable().map(|s| s.label), Some(EmotionLabel::Happy));
    assert_eq!(h.sent(), vec![WARM.to_vec()]);
}

#[tokio::test]
async fn oscillating_labels_never_reach_the_lamp() {
    let mut h = Harness::new();
    let labels = [EmotionLabel::Happy, EmotionLabel::Angry, EmotionLabel::Sad];
    for i in 0..24 {
        // 每个标签只持续 1 秒 (< 1.5 秒驻留)
        h.run_for(Duration::from_secs(1), Some((labels[i % 3], 0.95)), Duration::from_millis(250)).await;
    }
    assert!(h.control.stable().is_none());
    assert!(h.sent().is_empty());
    assert_eq!(h.control.stats().stable_changes, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_hung_tick_and_releases_session() {
    let h = Harness::new();
    h.mock.set_hang(true);
    let mock = h.mock.clone();

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(h.control.run(stop_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.connect_attempts(), 1);

    stop_tx.send(true).unwrap();
    let stats = tokio::time::timeout(TICK, handle)
        .await
        .expect("loop should stop within one tick")
        .unwrap();

    assert_eq!(stats.commands_sent, 0);
    assert!(mock.disconnects() >= 1);
    assert!(!mock.is_link_up());
}

#[tokio::test(start_paused = true)]
async fn unreachable_lamp_waits_out_backoff_after_each_timeout() {
    let mock = MockTransport::new();
    mock.set_hang(true);

    let connection = LampConnection::new(
        DeviceAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
        Box::new(mock.clone()),
        IO_TIMEOUT,
        BackoffConfig::default(),
    );
    let control = ControlLoop::new(
        LoopConfig {
            tick: TICK,
            reassert_interval: None,
            farewell: None,
        },
        SampleSlot::new(),
        EmotionSmoother::new(SmootherConfig::default()),
        LightPolicy::new(),
        connection,
        Arc::new(TokioClock),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(control.run(stop_rx));
    tokio::time::sleep(Duration::from_secs(20)).await;
    stop_tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    // 0s 超时 3s → 4s 超时 7s → 9s 超时 12s → 16s
    let attempts = mock.connect_log();
    assert!(attempts.len() >= 4, "only {} connect attempts", attempts.len());

    let mut delay = Duration::from_secs(1);
    for pair in attempts.windows(2) {
        let idle = (pair[1] - pair[0]).saturating_sub(IO_TIMEOUT);
        assert!(idle >= delay, "idle {:?} after timeout, backoff was {:?}", idle, delay);
        delay = (delay * 2).min(Duration::from_secs(30));
    }
    assert_eq!(stats.commands_sent, 0);
    assert_eq!(stats.reconnects, 0);
}
