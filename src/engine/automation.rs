// -------------------------------------------------------------------------------------------------

/// Max number of pending automation events per parameter.
const MAX_AUTOMATION_EVENTS: usize = 32;

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum AutomationEvent {
    SetValue { value: f32, time: f64 },
    LinearRamp { value: f32, time: f64 },
}

impl AutomationEvent {
    fn time(&self) -> f64 {
        match self {
            Self::SetValue { time, .. } | Self::LinearRamp { time, .. } => *time,
        }
    }

    fn value(&self) -> f32 {
        match self {
            Self::SetValue { value, .. } | Self::LinearRamp { value, .. } => *value,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Time-tagged value automation of a gain parameter.
///
/// Supports jumps to a value at a time and linear ramps which start at the previous event's
/// value and time. Before the first event, the parameter has its initial value.
///
/// Event storage is allocated upfront, so adding events never allocates. Events which no longer
/// affect values at or after the current time are pruned when adding new ones. When the storage
/// still is full after pruning, new events are ignored.
#[derive(Debug, Clone)]
pub(crate) struct GainAutomation {
    initial: f32,
    events: Vec<AutomationEvent>,
}

impl GainAutomation {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::with_capacity(MAX_AUTOMATION_EVENTS),
        }
    }

    /// Jump to `value` at `time`. `now` is the current evaluation time.
    pub fn set_value_at(&mut self, value: f32, time: f64, now: f64) -> bool {
        self.insert(AutomationEvent::SetValue { value, time }, now)
    }

    /// Ramp to `value`, reaching it at `time`. `now` is the current evaluation time.
    pub fn linear_ramp_to(&mut self, value: f32, time: f64, now: f64) -> bool {
        self.insert(AutomationEvent::LinearRamp { value, time }, now)
    }

    #[cfg(test)]
    fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Evaluate the automation at the given time.
    pub fn value_at(&self, time: f64) -> f32 {
        let next_index = self.events.partition_point(|e| e.time() <= time);
        let (prev_value, prev_time) = match next_index.checked_sub(1) {
            Some(index) => (self.events[index].value(), self.events[index].time()),
            None => (self.initial, f64::NEG_INFINITY),
        };
        match self.events.get(next_index) {
            Some(AutomationEvent::LinearRamp { value, time: ramp_end }) => {
                if !prev_time.is_finite() || *ramp_end <= prev_time {
                    // ramps without a start point hold the previous value until they end
                    prev_value
                } else {
                    let fraction = ((time - prev_time) / (ramp_end - prev_time)) as f32;
                    prev_value + (value - prev_value) * fraction
                }
            }
            _ => prev_value,
        }
    }

    fn insert(&mut self, event: AutomationEvent, now: f64) -> bool {
        self.prune(now);
        if self.events.len() >= MAX_AUTOMATION_EVENTS {
            return false;
        }
        let insert_pos = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(insert_pos, event);
        true
    }

    /// Remove all events before the last one at or before `now`: values from `now` on only
    /// depend on that event and the ones following it.
    fn prune(&mut self, now: f64) {
        let current = self.events.partition_point(|e| e.time() <= now);
        if current > 1 {
            self.events.drain(..current - 1);
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn grain_envelope() {
        let mut gain = GainAutomation::new(1.0);
        gain.set_value_at(0.0, 1.0, 0.0);
        gain.linear_ramp_to(0.8, 1.4, 0.0);
        gain.linear_ramp_to(0.0, 1.8, 0.0);

        assert_near(gain.value_at(0.5), 1.0);
        assert_near(gain.value_at(1.0), 0.0);
        assert_near(gain.value_at(1.2), 0.4);
        assert_near(gain.value_at(1.4), 0.8);
        assert_near(gain.value_at(1.6), 0.4);
        assert_near(gain.value_at(1.8), 0.0);
        assert_near(gain.value_at(10.0), 0.0);
    }

    #[test]
    fn set_values() {
        let mut gain = GainAutomation::new(0.5);
        gain.set_value_at(0.25, 2.0, 0.0);
        gain.set_value_at(0.75, 1.0, 0.0);
        assert_near(gain.value_at(0.0), 0.5);
        assert_near(gain.value_at(1.5), 0.75);
        assert_near(gain.value_at(2.5), 0.25);
    }

    #[test]
    fn past_events_get_pruned() {
        let mut gain = GainAutomation::new(1.0);
        for step in 0..1000 {
            let now = step as f64 * 0.1;
            assert!(gain.set_value_at(step as f32, now, now));
        }
        assert_eq!(gain.event_count(), 2);
        assert_near(gain.value_at(99.95), 999.0);

        // running ramps keep their start point
        let mut gain = GainAutomation::new(1.0);
        gain.set_value_at(0.0, 1.0, 0.0);
        gain.linear_ramp_to(1.0, 2.0, 0.0);
        gain.linear_ramp_to(0.0, 3.0, 0.0);
        gain.set_value_at(0.5, 4.0, 1.5);
        assert_eq!(gain.event_count(), 4);
        gain.set_value_at(0.5, 5.0, 2.5);
        assert_eq!(gain.event_count(), 4);
        assert_near(gain.value_at(2.5), 0.5);
    }

    #[test]
    fn full_event_storage_ignores_new_events() {
        let mut gain = GainAutomation::new(1.0);
        for step in 0..MAX_AUTOMATION_EVENTS {
            assert!(gain.set_value_at(0.0, 10.0 + step as f64, 0.0));
        }
        assert!(!gain.linear_ramp_to(1.0, 100.0, 0.0));
        assert_eq!(gain.event_count(), MAX_AUTOMATION_EVENTS);
        // once time moved on, there's space again
        assert!(gain.linear_ramp_to(1.0, 100.0, 50.0));
    }
}
