//! Integration tests for the engagement engine.
//!
//! Exercises full cross-module flows: cooldowns persisting across page
//! views over the same durable store, telemetry landing in the SQLite
//! archive, and scenario replays holding the one-visible-surface
//! invariant under competing triggers.

use chrono::{DateTime, Duration, TimeZone, Utc};
use nudgekit_core::telemetry::SqliteSink;
use nudgekit_core::{
    EngagementConfig, EngagementSession, Event, InteractionType, MemoryStore, PageSignal,
    ScenarioAction, SessionScenario, SqliteStore, SuppressReason, TriggerKey,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn quiet_config() -> EngagementConfig {
    // No countdown, scarcity pinned at its floor so nothing fires on its own.
    let mut cfg = EngagementConfig::default();
    cfg.scarcity.initial = 5;
    cfg.scarcity.floor = 5;
    cfg
}

fn open_session(db_path: &std::path::Path, cfg: EngagementConfig, now: DateTime<Utc>) -> EngagementSession {
    let store = SqliteStore::open(db_path).unwrap();
    EngagementSession::new(
        cfg,
        Box::new(store),
        Box::new(nudgekit_core::MemorySink::new()),
        now,
    )
}

#[test]
fn test_cooldown_survives_page_reload() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("profile.db");

    // First page view: exit intent fires, the modal shows, cooldown starts.
    let mut first = open_session(&db_path, quiet_config(), t0());
    first.start(t0());
    let events = first.handle_signal(&PageSignal::PointerLeft { y: -3.0 }, t0() + Duration::seconds(15));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SurfaceShown {
            trigger_key: TriggerKey::ExitIntentModal,
            ..
        }
    )));
    first.end(t0() + Duration::seconds(20));
    drop(first);

    // Reload one hour later: the 72h modal cooldown is still running, so
    // the fired intent is suppressed rather than shown.
    let reload_at = t0() + Duration::hours(1);
    let mut second = open_session(&db_path, quiet_config(), reload_at);
    second.start(reload_at);
    let events =
        second.handle_signal(&PageSignal::PointerLeft { y: -3.0 }, reload_at + Duration::seconds(15));
    assert!(events.iter().any(|e| matches!(e, Event::ExitIntentFired { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SurfaceSuppressed {
            trigger_key: TriggerKey::ExitIntentModal,
            reason: SuppressReason::CooldownActive,
            ..
        }
    )));
    second.end(reload_at + Duration::seconds(20));
    drop(second);

    // A visit past the cooldown window shows the modal again.
    let later = t0() + Duration::hours(73);
    let mut third = open_session(&db_path, quiet_config(), later);
    third.start(later);
    let events =
        third.handle_signal(&PageSignal::PointerLeft { y: -3.0 }, later + Duration::seconds(15));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SurfaceShown {
            trigger_key: TriggerKey::ExitIntentModal,
            ..
        }
    )));
}

#[test]
fn test_session_dismissal_does_not_outlive_the_tab() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("profile.db");

    // The floating CTA dismisses durably by default; flip it to session
    // scope so only the tab remembers.
    let mut cfg = quiet_config();
    cfg.set_in_memory("triggers.floating_cta.dismiss_scope", "session")
        .unwrap();
    cfg.set_in_memory("triggers.floating_cta.cooldown_hours", "0").unwrap();

    let mut first = open_session(&db_path, cfg.clone(), t0());
    first.start(t0());
    // Dwell fires the scroll trigger at 30s; dismiss it in-session.
    let events = first.pump(t0() + Duration::seconds(30));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SurfaceShown {
            trigger_key: TriggerKey::FloatingCta,
            ..
        }
    )));
    first.dismiss(TriggerKey::FloatingCta, t0() + Duration::seconds(35));
    first.end(t0() + Duration::seconds(40));
    drop(first);

    // A fresh tab over the same profile: zero cooldown and no session
    // mark, so the CTA shows again.
    let reload_at = t0() + Duration::minutes(5);
    let mut second = open_session(&db_path, cfg, reload_at);
    second.start(reload_at);
    let events = second.pump(reload_at + Duration::seconds(30));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SurfaceShown {
            trigger_key: TriggerKey::FloatingCta,
            ..
        }
    )));
}

#[test]
fn test_interactions_land_in_the_sqlite_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("telemetry.db");

    {
        let sink = SqliteSink::open(&archive_path).unwrap();
        let mut session = EngagementSession::new(
            quiet_config(),
            Box::new(MemoryStore::new()),
            Box::new(sink),
            t0(),
        );
        session.start(t0());
        session.handle_signal(&PageSignal::PointerLeft { y: -1.0 }, t0() + Duration::seconds(15));
        session.click_through(TriggerKey::ExitIntentModal, t0() + Duration::seconds(20));
        session.record_conversion("signup", t0() + Duration::seconds(45));
        session.end(t0() + Duration::seconds(50));
    }

    let archive = SqliteSink::open(&archive_path).unwrap();
    let summary = archive.funnel_summary().unwrap();
    assert_eq!(summary.views, 1);
    assert_eq!(summary.cta_clicks, 1);
    assert_eq!(summary.conversions, 1);
    assert_eq!(summary.distinct_sessions, 1);

    let rows = archive.funnel_by_trigger().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].trigger_key, "exitIntentModal");
    assert_eq!(rows[0].views, 1);
    assert_eq!(rows[0].cta_clicks, 1);
}

#[test]
fn test_replay_never_shows_two_surfaces_at_once() {
    // Countdown banner grabs the screen at start; scroll and exit intent
    // both fire later and must wait their turn one at a time.
    let mut cfg = quiet_config();
    cfg.countdown.target = Some(t0() + Duration::seconds(300));

    let run = SessionScenario::new("contention", t0())
        .with_config(cfg)
        .with_step(
            12,
            ScenarioAction::Signal {
                signal: PageSignal::ViewportResized {
                    width: 1280,
                    height: 800,
                },
            },
        )
        .with_step(
            13,
            ScenarioAction::Signal {
                signal: PageSignal::DocumentResized { height: 4000 },
            },
        )
        .with_step(
            14,
            ScenarioAction::Signal {
                signal: PageSignal::Scrolled { scroll_y: 2600.0 },
            },
        )
        .with_step(
            16,
            ScenarioAction::Signal {
                signal: PageSignal::PointerMoved { y: -2.0 },
            },
        )
        .with_step(
            40,
            ScenarioAction::Dismiss {
                trigger_key: TriggerKey::CountdownBanner,
            },
        )
        .with_step(
            50,
            ScenarioAction::Dismiss {
                trigger_key: TriggerKey::ExitIntentModal,
            },
        )
        .with_step(
            60,
            ScenarioAction::Dismiss {
                trigger_key: TriggerKey::FloatingCta,
            },
        )
        .with_run_for(70)
        .run();

    // Replay the shown/resolved transitions and assert the invariant.
    let mut visible: Option<TriggerKey> = None;
    for event in &run.events {
        match event {
            Event::SurfaceShown { trigger_key, .. } => {
                assert!(
                    visible.is_none(),
                    "{trigger_key} shown while {visible:?} was still visible"
                );
                visible = Some(*trigger_key);
            }
            Event::SurfaceDismissed { trigger_key, .. }
            | Event::SurfaceClicked { trigger_key, .. }
            | Event::SurfaceConverted { trigger_key, .. } => {
                assert_eq!(visible, Some(*trigger_key));
                visible = None;
            }
            _ => {}
        }
    }

    // Exit intent queued ahead of the scroll trigger, so after the banner
    // resolves the modal shows before the CTA.
    let shown_order: Vec<TriggerKey> = run
        .events
        .iter()
        .filter_map(|e| match e {
            Event::SurfaceShown { trigger_key, .. } => Some(*trigger_key),
            _ => None,
        })
        .collect();
    assert_eq!(
        shown_order,
        vec![
            TriggerKey::CountdownBanner,
            TriggerKey::ExitIntentModal,
            TriggerKey::FloatingCta,
        ]
    );

    let kinds: Vec<InteractionType> = run
        .interactions
        .iter()
        .map(|i| i.interaction_type)
        .collect();
    assert_eq!(kinds.iter().filter(|k| **k == InteractionType::View).count(), 3);
    assert_eq!(
        kinds.iter().filter(|k| **k == InteractionType::Dismiss).count(),
        3
    );
}

#[test]
fn test_exit_intent_stays_quiet_after_a_hundred_signals() {
    let mut session = EngagementSession::in_memory(quiet_config(), t0());
    session.start(t0());
    let fired_at = t0() + Duration::seconds(15);

    let events = session.handle_signal(&PageSignal::PointerLeft { y: -5.0 }, fired_at);
    assert!(events.iter().any(|e| matches!(e, Event::ExitIntentFired { .. })));

    for i in 0..100 {
        let later = fired_at + Duration::seconds(i + 1);
        let again = session.handle_signal(&PageSignal::PointerLeft { y: -5.0 }, later);
        assert!(
            again.iter().all(|e| !matches!(e, Event::ExitIntentFired { .. })),
            "detector refired on signal {i}"
        );
    }
}
