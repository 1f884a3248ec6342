//! Multi-touch voice allocation: one independent, periodic grain trigger stream per contact.

use std::{collections::HashMap, time::Duration};

use crate::timer::{TaskId, TimerQueue};

// -------------------------------------------------------------------------------------------------

/// Shortest repeat interval of contact trigger timers, reached at density 1.
pub const MIN_TRIGGER_INTERVAL: Duration = Duration::from_millis(100);

// -------------------------------------------------------------------------------------------------

/// Identifies a single pointer or touch contact, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u64);

// -------------------------------------------------------------------------------------------------

/// Kind of a [`PointerEvent`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display, strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
    Cancel,
    Leave,
}

/// A pointer or touch event in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub id: ContactId,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, id: ContactId, x: f32, y: f32) -> Self {
        Self { kind, id, x, y }
    }

    pub fn down(id: u64, x: f32, y: f32) -> Self {
        Self::new(PointerEventKind::Down, ContactId(id), x, y)
    }

    pub fn moved(id: u64, x: f32, y: f32) -> Self {
        Self::new(PointerEventKind::Move, ContactId(id), x, y)
    }

    pub fn up(id: u64) -> Self {
        Self::new(PointerEventKind::Up, ContactId(id), 0.0, 0.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// A held down contact and its live position.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchContact {
    pub id: ContactId,
    pub x: f32,
    pub y: f32,
    trigger: Option<TaskId>,
}

impl TouchContact {
    /// True when the contact repeatedly triggers grains while being held.
    pub fn is_repeating(&self) -> bool {
        self.trigger.is_some()
    }
}

// -------------------------------------------------------------------------------------------------

/// Tracks active contacts and their repeating grain trigger timers.
///
/// Each contact owns exactly one repeating timer (unless density is zero), which is cancelled
/// synchronously when the contact ends. Ticks are polled via [`Self::poll_due`].
#[derive(Debug, Default)]
pub struct TouchVoiceTracker {
    contacts: HashMap<ContactId, TouchContact>,
    timers: TimerQueue<ContactId>,
}

impl TouchVoiceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeat interval of grain triggers for the given density: `100ms / density`, clamped to
    /// [`MIN_TRIGGER_INTERVAL`].
    ///
    /// Returns `None` for zero or invalid densities and for densities so low that the interval
    /// can't be represented as a `Duration`: such contacts only fire their initial grain.
    pub fn trigger_interval(density: f32) -> Option<Duration> {
        if density.is_nan() || density <= 0.0 {
            return None;
        }
        let interval = Duration::try_from_secs_f64(1.0 / (density as f64 * 10.0)).ok()?;
        Some(interval.max(MIN_TRIGGER_INTERVAL))
    }

    /// True while at least one contact is active.
    pub fn is_playing(&self) -> bool {
        !self.contacts.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.contacts.len()
    }

    /// Number of live repeating trigger timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn contact(&self, id: ContactId) -> Option<&TouchContact> {
        self.contacts.get(&id)
    }

    /// Due time of the next contact trigger tick, if any.
    pub fn next_due(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    /// Register a new contact at `now`, repeating triggers with the given density.
    ///
    /// Returns true when a new contact got added, so an initial grain should be fired right away.
    /// Contacts which already are active only update their position.
    pub fn on_contact_start(
        &mut self,
        id: ContactId,
        x: f32,
        y: f32,
        density: f32,
        now: Duration,
    ) -> bool {
        if self.contacts.contains_key(&id) {
            self.on_contact_move(id, x, y);
            return false;
        }
        let trigger = Self::trigger_interval(density).and_then(|interval| {
            let first_due = now.checked_add(interval)?;
            Some(self.timers.schedule_repeating(first_due, interval, id))
        });
        log::debug!(
            "contact {} started at ({x:.1}, {y:.1}), repeating: {}",
            id.0,
            trigger.is_some()
        );
        self.contacts.insert(id, TouchContact { id, x, y, trigger });
        true
    }

    /// Update the live position of an active contact. Unknown contacts are ignored.
    pub fn on_contact_move(&mut self, id: ContactId, x: f32, y: f32) {
        if let Some(contact) = self.contacts.get_mut(&id) {
            contact.x = x;
            contact.y = y;
        }
    }

    /// Stop a contact's trigger timer and remove it. Returns false for unknown contacts.
    pub fn on_contact_end(&mut self, id: ContactId) -> bool {
        match self.contacts.remove(&id) {
            Some(contact) => {
                if let Some(trigger) = contact.trigger {
                    self.timers.cancel(trigger);
                }
                log::debug!("contact {} ended", id.0);
                true
            }
            None => false,
        }
    }

    /// Stop all trigger timers and remove all contacts.
    pub fn on_teardown(&mut self) {
        if !self.contacts.is_empty() {
            log::debug!("releasing {} active contacts", self.contacts.len());
        }
        self.timers.clear();
        self.contacts.clear();
    }

    /// Pop the next contact trigger tick which is due at or before `now`, returning the due
    /// time and the contact at its live position.
    pub fn poll_due(&mut self, now: Duration) -> Option<(Duration, &TouchContact)> {
        while let Some((_, due, id)) = self.timers.pop_due(now) {
            if self.contacts.contains_key(&id) {
                return self.contacts.get(&id).map(|contact| (due, contact));
            }
        }
        None
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    /// Poll the tracker every 10ms until `until`, counting ticks per contact.
    fn count_ticks(tracker: &mut TouchVoiceTracker, until: Duration) -> HashMap<ContactId, usize> {
        let mut ticks = HashMap::new();
        let mut now = Duration::ZERO;
        while now <= until {
            while let Some((_, contact)) = tracker.poll_due(now) {
                *ticks.entry(contact.id).or_insert(0) += 1;
            }
            now += ms(10);
        }
        ticks
    }

    #[test]
    fn intervals() {
        assert_eq!(TouchVoiceTracker::trigger_interval(1.0), Some(ms(100)));
        assert_eq!(TouchVoiceTracker::trigger_interval(0.5), Some(ms(200)));
        assert_eq!(TouchVoiceTracker::trigger_interval(0.0), None);
        let interval = TouchVoiceTracker::trigger_interval(0.85).unwrap();
        assert!(interval > ms(117) && interval < ms(118));

        assert_eq!(TouchVoiceTracker::trigger_interval(f32::NAN), None);
        let interval = TouchVoiceTracker::trigger_interval(0.005).unwrap();
        assert!(interval > ms(19_999) && interval < ms(20_001));
        assert_eq!(TouchVoiceTracker::trigger_interval(1e-30), None);
        assert_eq!(
            TouchVoiceTracker::trigger_interval(f32::INFINITY),
            Some(MIN_TRIGGER_INTERVAL)
        );
    }

    #[test]
    fn tiny_density_does_not_repeat() {
        let mut tracker = TouchVoiceTracker::new();
        assert!(tracker.on_contact_start(ContactId(1), 0.0, 0.0, 1e-30, Duration::ZERO));
        assert!(!tracker.contact(ContactId(1)).unwrap().is_repeating());
        assert_eq!(tracker.timer_count(), 0);
    }

    #[test]
    fn late_polls_skip_missed_ticks() {
        let mut tracker = TouchVoiceTracker::new();
        tracker.on_contact_start(ContactId(1), 0.0, 0.0, 1.0, Duration::ZERO);
        let (due, _) = tracker.poll_due(ms(2050)).unwrap();
        assert_eq!(due, ms(2000));
        assert!(tracker.poll_due(ms(2050)).is_none());
        assert_eq!(tracker.next_due(), Some(ms(2100)));
    }

    #[test]
    fn concurrent_contacts() {
        let mut tracker = TouchVoiceTracker::new();
        let (a, b) = (ContactId(1), ContactId(2));
        assert!(tracker.on_contact_start(a, 10.0, 10.0, 1.0, Duration::ZERO));
        assert!(tracker.on_contact_start(b, 20.0, 20.0, 0.5, Duration::ZERO));
        assert!(tracker.is_playing());
        assert_eq!(tracker.timer_count(), tracker.active_count());

        let ticks = count_ticks(&mut tracker, ms(1000));
        assert!(ticks[&a].abs_diff(10) <= 1);
        assert!(ticks[&b].abs_diff(5) <= 1);
    }

    #[test]
    fn moves_update_live_position() {
        let mut tracker = TouchVoiceTracker::new();
        let id = ContactId(7);
        tracker.on_contact_start(id, 10.0, 10.0, 1.0, Duration::ZERO);
        tracker.on_contact_move(id, 50.0, 60.0);
        // unknown contacts are ignored
        tracker.on_contact_move(ContactId(8), 1.0, 1.0);
        assert!(tracker.contact(ContactId(8)).is_none());

        let (due, contact) = tracker.poll_due(ms(100)).unwrap();
        assert_eq!(due, ms(100));
        assert_eq!((contact.x, contact.y), (50.0, 60.0));

        // a second down is treated as move
        assert!(!tracker.on_contact_start(id, 70.0, 80.0, 1.0, ms(150)));
        assert_eq!(tracker.timer_count(), 1);
        let contact = tracker.contact(id).unwrap();
        assert_eq!((contact.x, contact.y), (70.0, 80.0));
    }

    #[test]
    fn ending_contacts_stops_ticks() {
        let mut tracker = TouchVoiceTracker::new();
        let (a, b) = (ContactId(1), ContactId(2));
        tracker.on_contact_start(a, 0.0, 0.0, 1.0, Duration::ZERO);
        tracker.on_contact_start(b, 0.0, 0.0, 1.0, Duration::ZERO);
        assert_eq!(count_ticks(&mut tracker, ms(300))[&a], 3);

        assert!(tracker.on_contact_end(a));
        assert!(!tracker.on_contact_end(a));
        assert!(tracker.is_playing());
        let ticks = count_ticks(&mut tracker, ms(1000));
        assert!(!ticks.contains_key(&a));
        assert_eq!(ticks[&b], 7);

        assert!(tracker.on_contact_end(b));
        assert!(!tracker.is_playing());
        assert_eq!(tracker.timer_count(), 0);
    }

    #[test]
    fn zero_density_fires_no_ticks() {
        let mut tracker = TouchVoiceTracker::new();
        assert!(tracker.on_contact_start(ContactId(1), 0.0, 0.0, 0.0, Duration::ZERO));
        assert!(!tracker.contact(ContactId(1)).unwrap().is_repeating());
        assert_eq!(tracker.timer_count(), 0);
        assert!(tracker.poll_due(ms(10_000)).is_none());
        assert!(tracker.is_playing());
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut tracker = TouchVoiceTracker::new();
        tracker.on_teardown();
        assert!(!tracker.is_playing());

        tracker.on_contact_start(ContactId(1), 0.0, 0.0, 1.0, Duration::ZERO);
        tracker.on_contact_start(ContactId(2), 0.0, 0.0, 0.3, Duration::ZERO);
        tracker.on_teardown();
        tracker.on_teardown();
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(tracker.timer_count(), 0);
        assert!(tracker.next_due().is_none());
    }

    #[test]
    fn event_kind_names() {
        assert_eq!(PointerEventKind::from_str("leave").ok(), Some(PointerEventKind::Leave));
        assert_eq!(PointerEventKind::Cancel.to_string(), "cancel");
    }
}
