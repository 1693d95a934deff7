use serde::Serialize;
use std::time::Duration;

use crate::pipeline::types::Decision;

/// EWMA smoothing factor for cycle timings.
const ALPHA: f32 = 0.1;

/// Running counters for the inference loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopStats {
    pub cycles: u64,
    pub violations: u64,
    pub alerts_raised: u64,
    /// Violating cycles that found the gate already cooling.
    pub alerts_suppressed: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub avg_cycle_us: f32,
    pub max_cycle_us: u64,
    pub last_decision: Option<Decision>,
    pub last_confidence: Option<f32>,
}

impl LoopStats {
    pub fn record_cycle(
        &mut self,
        decision: Decision,
        confidence: f32,
        alert_raised: bool,
        elapsed: Duration,
    ) {
        let elapsed_us = elapsed.as_micros() as u64;
        self.cycles += 1;
        if decision == Decision::Violating {
            self.violations += 1;
            if alert_raised {
                self.alerts_raised += 1;
            } else {
                self.alerts_suppressed += 1;
            }
        }
        self.consecutive_failures = 0;
        self.avg_cycle_us = if self.cycles == 1 {
            elapsed_us as f32
        } else {
            Self::update_ewma(self.avg_cycle_us, elapsed_us)
        };
        self.max_cycle_us = self.max_cycle_us.max(elapsed_us);
        self.last_decision = Some(decision);
        self.last_confidence = Some(confidence);
    }

    pub fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    fn update_ewma(current: f32, new_value: u64) -> f32 {
        current * (1.0 - ALPHA) + new_value as f32 * ALPHA
    }
}
