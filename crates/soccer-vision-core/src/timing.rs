//! Per-stage wall-clock accounting, averaged over a window of frames.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};

/// Averaged cost of one stage over the frames since the last reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub calls: u64,
    pub total: Duration,
    /// Calls per frame.
    pub calls_per_frame: f64,
    /// Milliseconds per frame.
    pub ms_per_frame: f64,
    /// Microseconds per call.
    pub us_per_call: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct StageTotal {
    calls: u64,
    total: Duration,
}

/// Stage timing registry owned by a pipeline instance.
///
/// Call [`StageTimings::end_frame`] once per frame; every `report_every`
/// frames the averages are logged at `info` and the counters start over.
/// `report_every == 0` disables the periodic report.
#[derive(Clone, Debug)]
pub struct StageTimings {
    report_every: u32,
    frames: u32,
    stages: BTreeMap<&'static str, StageTotal>,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl StageTimings {
    pub fn new(report_every: u32) -> Self {
        Self {
            report_every,
            frames: 0,
            stages: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        let entry = self.stages.entry(stage).or_default();
        entry.calls += 1;
        entry.total += elapsed;
    }

    /// Run `f`, charging its duration to `stage`.
    pub fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(stage, start.elapsed());
        out
    }

    /// Close a frame. Returns the flushed summaries when a report was due.
    pub fn end_frame(&mut self) -> Option<Vec<StageSummary>> {
        self.frames += 1;
        if self.report_every == 0 || self.frames < self.report_every {
            return None;
        }
        let summaries = self.snapshot();
        info!("stage timings over {} frames", self.frames);
        for s in &summaries {
            info!(
                "{:>24} | calls/frame {:>8.2} | ms/frame {:>8.3} | us/call {:>9.1}",
                s.stage, s.calls_per_frame, s.ms_per_frame, s.us_per_call
            );
        }
        self.reset();
        Some(summaries)
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.stages.clear();
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Current averages, sorted by stage name.
    pub fn snapshot(&self) -> Vec<StageSummary> {
        let frames = f64::from(self.frames.max(1));
        self.stages
            .iter()
            .map(|(stage, t)| {
                let secs = t.total.as_secs_f64();
                StageSummary {
                    stage: (*stage).to_string(),
                    calls: t.calls,
                    total: t.total,
                    calls_per_frame: t.calls as f64 / frames,
                    ms_per_frame: secs * 1.0e3 / frames,
                    us_per_call: if t.calls == 0 {
                        0.0
                    } else {
                        secs * 1.0e6 / t.calls as f64
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_frames_and_resets_on_report() {
        let mut timings = StageTimings::new(2);
        timings.record("ball", Duration::from_millis(4));
        timings.record("ball", Duration::from_millis(2));
        assert!(timings.end_frame().is_none());
        timings.record("field", Duration::from_millis(1));

        let report = timings.end_frame().expect("second frame must flush");
        assert_eq!(report.len(), 2);
        let ball = &report[0];
        assert_eq!(ball.stage, "ball");
        assert_eq!(ball.calls, 2);
        assert!((ball.ms_per_frame - 3.0).abs() < 1e-9);
        assert!((ball.us_per_call - 3000.0).abs() < 1e-6);
        assert_eq!(timings.frames(), 0, "report must reset the window");
        assert!(timings.snapshot().is_empty());
    }

    #[test]
    fn zero_window_never_reports() {
        let mut timings = StageTimings::new(0);
        let value = timings.time("noop", || 7);
        assert_eq!(value, 7);
        assert!(timings.end_frame().is_none());
        assert_eq!(timings.snapshot()[0].calls, 1);
    }
}
