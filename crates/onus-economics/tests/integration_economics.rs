//! Integration tests for the OnusOne economic engine
//!
//! These tests drive a full engine through the cycle scheduler against a
//! manual clock and verify decay, treasury tax, pool and payout behavior
//! end to end.

use onus_economics::decay::pearson_correlation;
use onus_economics::{
    CongestionLevel, ContentRegistration, ContentType, EconomicCycleScheduler, EconomicEngine,
    EconomicEvent, EconomicsConfig, EconomicsError, ManualClock, NetworkMetricsUpdate,
    QualityUpdate, UserProfileUpdate,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn create_engine() -> (Arc<Mutex<EconomicEngine>>, ManualClock, EconomicCycleScheduler) {
    let clock = ManualClock::new(1_700_000_000);
    let config = EconomicsConfig::default();
    let engine = EconomicEngine::new(config.clone(), Arc::new(clock.clone())).unwrap();
    let engine = Arc::new(Mutex::new(engine));
    let scheduler = EconomicCycleScheduler::new(Arc::clone(&engine), &config.scheduler);
    (engine, clock, scheduler)
}

fn post(id: &str, quality: f64) -> ContentRegistration {
    ContentRegistration {
        id: id.to_string(),
        user_id: "alice".to_string(),
        content_type: ContentType::Post,
        quality_score: quality,
        stake_amount: 100,
    }
}

mod decay_scenario_tests {
    use super::*;

    #[test]
    fn test_calm_network_day() {
        let (engine, clock, mut scheduler) = create_engine();
        {
            let mut e = engine.lock();
            e.update_network_metrics(&NetworkMetricsUpdate::default().health(90.0).message_volume(500));
            let content = e.register_content(post("post-1", 50.0)).unwrap();
            assert!((content.acceleration_factor - 0.8).abs() < 1e-12);
        }

        for _ in 0..(24 * 60) {
            let now = clock.advance_minutes(1);
            scheduler.run_due(now);
        }

        let e = engine.lock();
        let content = e.get_content("post-1").expect("still live after one day");
        // 2.5 * 1.0 * 0.8 * 24 = 48 points
        assert!((content.decay_score - 52.0).abs() < 0.01, "score {}", content.decay_score);
        assert_eq!(e.treasury().expired_content, 0);
    }

    #[test]
    fn test_critical_congestion_expires_once() {
        let (engine, clock, mut scheduler) = create_engine();
        let mut rx = {
            let mut e = engine.lock();
            e.update_network_metrics(&NetworkMetricsUpdate::default().health(90.0).message_volume(9_600));
            assert_eq!(e.current_congestion(), CongestionLevel::Critical);

            let content = e.register_content(post("post-1", 50.0)).unwrap();
            assert!(content.acceleration_factor >= 5.0);
            e.subscribe()
        };

        let mut taxes = Vec::new();
        let mut expired_at_minute = None;
        for minute in 1..=(24 * 60) {
            let now = clock.advance_minutes(1);
            scheduler.run_due(now);

            while let Ok(event) = rx.try_recv() {
                if let EconomicEvent::ContentDecayed { expired } = event {
                    expired_at_minute.get_or_insert(minute);
                    taxes.extend(expired);
                }
            }
        }

        assert_eq!(taxes.len(), 1);
        assert_eq!(taxes[0].content_id, "post-1");
        assert_eq!(taxes[0].tax_amount, 10);
        // 100 / (2.5 * 8) = 5 hours
        let minute = expired_at_minute.unwrap();
        assert!((299..=301).contains(&minute), "expired at minute {minute}");

        let e = engine.lock();
        assert!(e.get_content("post-1").is_none());
        assert_eq!(e.treasury().total_collected, 10);
    }

    #[test]
    fn test_score_never_increases_between_ticks() {
        let (engine, clock, mut scheduler) = create_engine();
        engine.lock().register_content(post("post-1", 30.0)).unwrap();

        let mut last = 100.0;
        for step in 0..600 {
            if step == 200 {
                engine
                    .lock()
                    .update_network_metrics(&NetworkMetricsUpdate::default().message_volume(8_500));
            }
            let now = clock.advance_minutes(1);
            scheduler.run_due(now);

            let e = engine.lock();
            let Some(content) = e.get_content("post-1") else {
                break;
            };
            assert!(content.decay_score <= last);
            last = content.decay_score;
        }
    }
}

mod preservation_tests {
    use super::*;

    #[test]
    fn test_preserved_content_is_frozen() {
        let (engine, clock, mut scheduler) = create_engine();
        {
            let mut e = engine.lock();
            e.register_content(post("keep", 60.0)).unwrap();
            e.register_content(post("drop", 60.0)).unwrap();
            let preserved = e.preserve_content("keep", "featured").unwrap();
            assert_eq!(preserved.acceleration_factor, 0.0);
            assert_eq!(e.get_decay_metrics().decaying_content, 1);
        }

        for _ in 0..(3 * 24 * 60) {
            let now = clock.advance_minutes(1);
            scheduler.run_due(now);
        }

        let mut e = engine.lock();
        assert!(e.get_content("drop").is_none());
        assert_eq!(e.get_content("keep").unwrap().decay_score, 100.0);

        // Network changes leave preserved items alone
        e.update_network_metrics(&NetworkMetricsUpdate::default().message_volume(9_999));
        assert_eq!(e.get_content("keep").unwrap().acceleration_factor, 0.0);

        let restored = e.remove_preservation("keep").unwrap();
        assert!(restored.decay_rate > 0.0);
        assert!(restored.acceleration_factor >= 5.0);
        assert_eq!(e.get_decay_metrics().decaying_content, 1);
    }

    #[test]
    fn test_unknown_content_operations() {
        let (engine, _clock, _scheduler) = create_engine();
        let mut e = engine.lock();

        assert!(matches!(
            e.preserve_content("nope", "x"),
            Err(EconomicsError::ContentNotFound(_))
        ));
        assert!(e.remove_preservation("nope").unwrap_err().is_not_found());
        assert!(e
            .update_content_quality("nope", &QualityUpdate::uniform(80.0))
            .is_err());
    }
}

mod metrics_tests {
    use super::*;

    #[test]
    fn test_quality_decay_correlation_helper() {
        let r = pearson_correlation(&[90.0, 80.0, 10.0, 20.0], &[95.0, 85.0, 15.0, 25.0]);
        assert!(r > 0.99);
    }

    #[test]
    fn test_live_correlation_tracks_quality() {
        let (engine, clock, mut scheduler) = create_engine();
        {
            let mut e = engine.lock();
            for (id, quality) in [("a", 95.0), ("b", 75.0), ("c", 55.0), ("d", 20.0)] {
                e.register_content(post(id, quality)).unwrap();
            }
        }
        for _ in 0..(6 * 60) {
            let now = clock.advance_minutes(1);
            scheduler.run_due(now);
        }

        let metrics = engine.lock().get_decay_metrics();
        assert_eq!(metrics.total_content, 4);
        assert!(metrics.quality_decay_correlation > 0.8);
        assert!(metrics.estimated_burn_rate > 0.0);
        assert_eq!(metrics.congestion_level, CongestionLevel::Low);
    }
}

mod payout_tests {
    use super::*;

    #[test]
    fn test_hourly_payouts_with_pool() {
        let (engine, clock, mut scheduler) = create_engine();
        let mut rx = {
            let mut e = engine.lock();
            let pool = e.create_stake_pool("alice", 60_000).unwrap();
            e.join_stake_pool(&pool.id, "bob", 40_000).unwrap();
            assert!((e.get_pool(&pool.id).unwrap().pool_multiplier - 1.4).abs() < 1e-9);

            for user in ["alice", "bob"] {
                e.update_user_profile(
                    user,
                    UserProfileUpdate {
                        node_uptime: Some(98.0),
                        reputation_score: Some(80.0),
                        ..UserProfileUpdate::default()
                    },
                );
            }
            e.subscribe()
        };

        for _ in 0..(2 * 60) {
            let now = clock.advance_minutes(1);
            scheduler.run_due(now);
        }

        let mut payouts = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EconomicEvent::PayoutCalculated { payout } = event {
                payouts.push(payout);
            }
        }
        assert_eq!(payouts.len(), 4);
        for p in &payouts {
            assert!(p.pool_bonus > 0.0);
            assert!(p.network_bonus > 0.0);
            assert_eq!(p.final_payout, p.base_reward - p.tax_deduction);
            assert!((0.15..=0.30).contains(&p.tax_rate));
        }

        let e = engine.lock();
        let paid: f64 = payouts.iter().map(|p| p.final_payout).sum();
        assert!((e.treasury().total_rewards_paid - paid).abs() < 1e-9);
        assert!(e.get_user_profile("alice").unwrap().total_earnings > 0.0);
    }

    #[test]
    fn test_full_pool_rejects_newcomers() {
        let clock = ManualClock::new(0);
        let mut config = EconomicsConfig::default();
        config.pools.max_participants = 1;
        let mut engine = EconomicEngine::new(config, Arc::new(clock)).unwrap();

        let pool = engine.create_stake_pool("alice", 500).unwrap();
        let err = engine.join_stake_pool(&pool.id, "bob", 500).unwrap_err();
        assert!(matches!(err, EconomicsError::PoolFull { max: 1, .. }));
        assert!(err.is_recoverable());
    }
}
