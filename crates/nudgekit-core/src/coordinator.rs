//! Surface arbitration.
//!
//! Every trigger funnels through here, and this is the only code that
//! decides which surface is visible. The invariant is strict: at most one
//! interruptive surface at a time. A trigger that fires while another
//! surface is up either waits in the queue or is dropped, per policy;
//! queued triggers drain highest-priority-first, so concurrent firings
//! resolve the same way every run.
//!
//! Per surface the lifecycle is
//! `Idle -> Armed -> Visible -> {Dismissed | ClickedThrough | Converted}`,
//! with the last three terminal for the page view. There is no un-showing:
//! a visible surface leaves the screen only through an explicit
//! resolution.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::{ArbitrationPolicy, TriggersConfig};
use crate::events::{Event, SuppressReason};
use crate::gate::{Eligibility, FrequencyGate};
use crate::surface::{SurfacePhase, SurfaceState, TriggerKey};

/// Single point of arbitration for all surfaces on a page.
pub struct EngagementCoordinator {
    rules: TriggersConfig,
    policy: ArbitrationPolicy,
    gate: FrequencyGate,
    surfaces: HashMap<TriggerKey, SurfaceState>,
    /// Armed surfaces waiting for the visible one to resolve.
    pending: Vec<TriggerKey>,
}

impl EngagementCoordinator {
    pub fn new(rules: TriggersConfig, policy: ArbitrationPolicy, gate: FrequencyGate) -> Self {
        let surfaces = TriggerKey::ALL
            .into_iter()
            .map(|key| (key, SurfaceState::new(key)))
            .collect();
        Self {
            rules,
            policy,
            gate,
            surfaces,
            pending: Vec::new(),
        }
    }

    /// The currently visible surface, if any.
    pub fn visible_surface(&self) -> Option<TriggerKey> {
        self.surfaces
            .values()
            .find(|s| s.phase == SurfacePhase::Visible)
            .map(|s| s.trigger_key)
    }

    pub fn surface(&self, key: TriggerKey) -> &SurfaceState {
        &self.surfaces[&key]
    }

    pub fn surfaces(&self) -> Vec<&SurfaceState> {
        TriggerKey::ALL.iter().map(|key| &self.surfaces[key]).collect()
    }

    /// Armed surfaces waiting their turn, in drain order.
    pub fn pending(&self) -> Vec<TriggerKey> {
        let mut keys = self.pending.clone();
        keys.sort_by_key(|k| k.priority());
        keys
    }

    pub fn gate(&self) -> &FrequencyGate {
        &self.gate
    }

    /// A trigger proposes showing its surface.
    ///
    /// Consults the rule and the frequency gate, then either shows the
    /// surface, queues it behind the visible one, or suppresses it with
    /// a reason. Suppressed surfaces stay Idle so a later trigger of the
    /// same kind could still propose them.
    pub fn offer(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        let rule = self.rules.rule(key).clone();
        if !rule.enabled {
            return vec![suppressed(key, SuppressReason::Disabled, now)];
        }
        if self.phase(key) != SurfacePhase::Idle {
            return vec![suppressed(key, SuppressReason::AlreadyResolved, now)];
        }
        match self.gate.check(key, rule.cooldown_hours, now) {
            Eligibility::CoolingDown { .. } => {
                return vec![suppressed(key, SuppressReason::CooldownActive, now)];
            }
            Eligibility::DismissedThisSession => {
                return vec![suppressed(key, SuppressReason::DismissedThisSession, now)];
            }
            Eligibility::Eligible => {}
        }

        if self.visible_surface().is_some() {
            return match self.policy {
                ArbitrationPolicy::Queue => {
                    self.set_phase(key, SurfacePhase::Armed);
                    self.pending.push(key);
                    vec![Event::SurfaceQueued {
                        trigger_key: key,
                        at: now,
                    }]
                }
                ArbitrationPolicy::Drop => {
                    vec![suppressed(key, SuppressReason::SurfaceBusy, now)]
                }
            };
        }

        vec![self.show(key, now)]
    }

    /// Resolve the visible surface as dismissed. Records the dismissal
    /// in the scope its rule names and lets a queued surface proceed.
    pub fn dismiss(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        match self.phase(key) {
            SurfacePhase::Visible => {}
            // Dismissing a queued surface cancels it before it shows.
            SurfacePhase::Armed => self.pending.retain(|k| *k != key),
            _ => return Vec::new(),
        }
        let scope = self.rules.rule(key).dismiss_scope;
        self.set_phase(key, SurfacePhase::Dismissed);
        self.gate.record_dismissed(key, scope, now);
        let mut events = vec![Event::SurfaceDismissed {
            trigger_key: key,
            scope,
            at: now,
        }];
        events.extend(self.drain_pending(now));
        events
    }

    /// Resolve the visible surface as clicked through to the CTA.
    /// Refreshes the shown stamp so the cooldown counts from the click.
    pub fn click_through(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        if self.phase(key) != SurfacePhase::Visible {
            return Vec::new();
        }
        self.set_phase(key, SurfacePhase::ClickedThrough);
        self.gate.record_shown(key, now);
        let mut events = vec![Event::SurfaceClicked {
            trigger_key: key,
            at: now,
        }];
        events.extend(self.drain_pending(now));
        events
    }

    /// Resolve the visible surface as converted.
    pub fn convert(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        if self.phase(key) != SurfacePhase::Visible {
            return Vec::new();
        }
        self.set_phase(key, SurfacePhase::Converted);
        let mut events = vec![Event::SurfaceConverted {
            trigger_key: key,
            at: now,
        }];
        events.extend(self.drain_pending(now));
        events
    }

    /// Toggle the expanded-detail flag on the visible surface.
    pub fn toggle_expanded(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        let Some(state) = self.surfaces.get_mut(&key) else {
            return Vec::new();
        };
        if state.phase != SurfacePhase::Visible {
            return Vec::new();
        }
        state.expanded_detail = !state.expanded_detail;
        vec![Event::SurfaceExpanded {
            trigger_key: key,
            expanded: state.expanded_detail,
            at: now,
        }]
    }

    /// Promote the best queued surface once nothing is visible. Gate
    /// eligibility is re-checked at drain time; a surface that went
    /// ineligible while waiting falls back to Idle.
    fn drain_pending(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        while self.visible_surface().is_none() {
            let Some(best) = self.pending.iter().copied().min_by_key(|k| k.priority()) else {
                break;
            };
            self.pending.retain(|k| *k != best);

            let rule = self.rules.rule(best).clone();
            match self.gate.check(best, rule.cooldown_hours, now) {
                Eligibility::Eligible => {
                    events.push(self.show(best, now));
                }
                Eligibility::CoolingDown { .. } => {
                    self.set_phase(best, SurfacePhase::Idle);
                    events.push(suppressed(best, SuppressReason::CooldownActive, now));
                }
                Eligibility::DismissedThisSession => {
                    self.set_phase(best, SurfacePhase::Idle);
                    events.push(suppressed(best, SuppressReason::DismissedThisSession, now));
                }
            }
        }
        events
    }

    fn show(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Event {
        self.set_phase(key, SurfacePhase::Visible);
        self.gate.record_shown(key, now);
        Event::SurfaceShown {
            trigger_key: key,
            at: now,
        }
    }

    fn phase(&self, key: TriggerKey) -> SurfacePhase {
        self.surfaces[&key].phase
    }

    fn set_phase(&mut self, key: TriggerKey, phase: SurfacePhase) {
        if let Some(state) = self.surfaces.get_mut(&key) {
            state.phase = phase;
        }
    }
}

impl std::fmt::Debug for EngagementCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngagementCoordinator")
            .field("policy", &self.policy)
            .field("pending", &self.pending)
            .field("visible", &self.visible_surface())
            .finish_non_exhaustive()
    }
}

fn suppressed(key: TriggerKey, reason: SuppressReason, at: DateTime<Utc>) -> Event {
    Event::SurfaceSuppressed {
        trigger_key: key,
        reason,
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngagementConfig;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn coordinator(policy: ArbitrationPolicy) -> EngagementCoordinator {
        let cfg = EngagementConfig::default();
        EngagementCoordinator::new(cfg.triggers, policy, FrequencyGate::in_memory())
    }

    fn visible_count(coord: &EngagementCoordinator) -> usize {
        coord
            .surfaces()
            .iter()
            .filter(|s| s.phase == SurfacePhase::Visible)
            .count()
    }

    #[test]
    fn first_offer_shows_and_stamps_the_gate() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        let events = coord.offer(TriggerKey::FloatingCta, t0());

        assert!(matches!(events[0], Event::SurfaceShown { trigger_key: TriggerKey::FloatingCta, .. }));
        assert_eq!(coord.visible_surface(), Some(TriggerKey::FloatingCta));
        assert!(!coord
            .gate()
            .is_eligible(TriggerKey::FloatingCta, 24.0, t0() + Duration::hours(1)));
    }

    #[test]
    fn second_offer_queues_behind_visible() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::FloatingCta, t0());
        let events = coord.offer(TriggerKey::ExitIntentModal, t0() + Duration::seconds(5));

        assert!(matches!(events[0], Event::SurfaceQueued { trigger_key: TriggerKey::ExitIntentModal, .. }));
        assert_eq!(visible_count(&coord), 1);
        assert_eq!(coord.surface(TriggerKey::ExitIntentModal).phase, SurfacePhase::Armed);
    }

    #[test]
    fn drop_policy_discards_instead_of_queueing() {
        let mut coord = coordinator(ArbitrationPolicy::Drop);
        coord.offer(TriggerKey::FloatingCta, t0());
        let events = coord.offer(TriggerKey::ExitIntentModal, t0() + Duration::seconds(5));

        assert!(matches!(
            events[0],
            Event::SurfaceSuppressed {
                reason: SuppressReason::SurfaceBusy,
                ..
            }
        ));
        assert_eq!(coord.surface(TriggerKey::ExitIntentModal).phase, SurfacePhase::Idle);
    }

    #[test]
    fn dismissal_releases_the_queue_in_priority_order() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::CountdownBanner, t0());
        // Lower priority queued first, higher priority queued second.
        coord.offer(TriggerKey::FloatingCta, t0() + Duration::seconds(1));
        coord.offer(TriggerKey::ExitIntentModal, t0() + Duration::seconds(2));

        let events = coord.dismiss(TriggerKey::CountdownBanner, t0() + Duration::seconds(10));
        assert!(matches!(events[0], Event::SurfaceDismissed { .. }));
        assert!(matches!(
            events[1],
            Event::SurfaceShown {
                trigger_key: TriggerKey::ExitIntentModal,
                ..
            }
        ));
        // The floating CTA is still waiting its turn.
        assert_eq!(coord.pending(), vec![TriggerKey::FloatingCta]);
        assert_eq!(visible_count(&coord), 1);
    }

    #[test]
    fn never_two_visible_under_any_interleaving() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        let mut now = t0();
        let offers = [
            TriggerKey::CountdownBanner,
            TriggerKey::ExitIntentModal,
            TriggerKey::FloatingCta,
            TriggerKey::ExitIntentOffer,
        ];
        for (i, key) in offers.iter().enumerate() {
            now += Duration::seconds(1);
            coord.offer(*key, now);
            assert!(visible_count(&coord) <= 1, "offer {i} broke the invariant");
        }
        // Resolve everything one step at a time, checking after each.
        while let Some(visible) = coord.visible_surface() {
            now += Duration::seconds(1);
            coord.dismiss(visible, now);
            assert!(visible_count(&coord) <= 1);
        }
    }

    #[test]
    fn disabled_rule_suppresses() {
        let mut cfg = EngagementConfig::default();
        cfg.triggers.floating_cta.enabled = false;
        let mut coord = EngagementCoordinator::new(
            cfg.triggers,
            ArbitrationPolicy::Queue,
            FrequencyGate::in_memory(),
        );

        let events = coord.offer(TriggerKey::FloatingCta, t0());
        assert!(matches!(
            events[0],
            Event::SurfaceSuppressed {
                reason: SuppressReason::Disabled,
                ..
            }
        ));
    }

    #[test]
    fn cooldown_suppresses_reoffer_after_resolution() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::FloatingCta, t0());
        coord.dismiss(TriggerKey::FloatingCta, t0() + Duration::seconds(5));

        // Durable-scope dismissal: the cooldown from the show stamp rules.
        let events = coord.offer(TriggerKey::FloatingCta, t0() + Duration::hours(1));
        assert!(matches!(
            events[0],
            Event::SurfaceSuppressed {
                reason: SuppressReason::AlreadyResolved,
                ..
            }
        ));
    }

    #[test]
    fn session_dismissal_blocks_other_surface_sharing_nothing() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        // Modal rule is session-scope by default.
        coord.offer(TriggerKey::ExitIntentModal, t0());
        coord.dismiss(TriggerKey::ExitIntentModal, t0() + Duration::seconds(3));

        // Same page view: terminal phase wins the suppression reason.
        let again = coord.offer(TriggerKey::ExitIntentModal, t0() + Duration::seconds(9));
        assert!(matches!(
            again[0],
            Event::SurfaceSuppressed {
                reason: SuppressReason::AlreadyResolved,
                ..
            }
        ));
        // Other keys stay unaffected.
        let other = coord.offer(TriggerKey::FloatingCta, t0() + Duration::seconds(10));
        assert!(matches!(other[0], Event::SurfaceShown { .. }));
    }

    #[test]
    fn click_through_is_terminal_and_refreshes_shown() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::FloatingCta, t0());
        let click_at = t0() + Duration::minutes(2);
        let events = coord.click_through(TriggerKey::FloatingCta, click_at);

        assert!(matches!(events[0], Event::SurfaceClicked { .. }));
        assert_eq!(
            coord.surface(TriggerKey::FloatingCta).phase,
            SurfacePhase::ClickedThrough
        );
        let record = coord.gate().record(TriggerKey::FloatingCta).unwrap();
        assert_eq!(record.last_shown_at, Some(click_at));
    }

    #[test]
    fn convert_resolves_and_releases() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::ExitIntentOffer, t0());
        coord.offer(TriggerKey::FloatingCta, t0() + Duration::seconds(1));

        let events = coord.convert(TriggerKey::ExitIntentOffer, t0() + Duration::seconds(30));
        assert!(matches!(events[0], Event::SurfaceConverted { .. }));
        assert!(matches!(
            events[1],
            Event::SurfaceShown {
                trigger_key: TriggerKey::FloatingCta,
                ..
            }
        ));
    }

    #[test]
    fn expand_toggles_only_while_visible() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        assert!(coord.toggle_expanded(TriggerKey::FloatingCta, t0()).is_empty());

        coord.offer(TriggerKey::FloatingCta, t0());
        let events = coord.toggle_expanded(TriggerKey::FloatingCta, t0() + Duration::seconds(2));
        assert!(matches!(events[0], Event::SurfaceExpanded { expanded: true, .. }));
        assert!(coord.surface(TriggerKey::FloatingCta).expanded_detail);

        let events = coord.toggle_expanded(TriggerKey::FloatingCta, t0() + Duration::seconds(3));
        assert!(matches!(events[0], Event::SurfaceExpanded { expanded: false, .. }));
    }

    #[test]
    fn dismissing_a_queued_surface_cancels_it() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::CountdownBanner, t0());
        coord.offer(TriggerKey::FloatingCta, t0() + Duration::seconds(1));

        coord.dismiss(TriggerKey::FloatingCta, t0() + Duration::seconds(2));
        assert!(coord.pending().is_empty());

        // Resolving the banner now promotes nothing.
        let events = coord.dismiss(TriggerKey::CountdownBanner, t0() + Duration::seconds(3));
        assert_eq!(events.len(), 1);
        assert_eq!(coord.visible_surface(), None);
    }

    #[test]
    fn queued_surface_recheck_on_drain() {
        let mut coord = coordinator(ArbitrationPolicy::Queue);
        coord.offer(TriggerKey::CountdownBanner, t0());
        coord.offer(TriggerKey::ExitIntentOffer, t0() + Duration::seconds(1));

        // The visitor dismisses the queued offer for the session while it
        // waits (e.g. via a per-surface "don't show again" control).
        coord.dismiss(TriggerKey::ExitIntentOffer, t0() + Duration::seconds(2));
        coord.offer(TriggerKey::ExitIntentOffer, t0() + Duration::seconds(3));

        let events = coord.dismiss(TriggerKey::CountdownBanner, t0() + Duration::seconds(4));
        // Nothing promoted: the offer is terminal, not pending.
        assert_eq!(events.len(), 1);
        assert_eq!(coord.visible_surface(), None);
    }
}
