//! End-to-end dispatch lifecycle scenarios

use crate::test_utils::*;

use lifeline_core::time::current_timestamp_ms;
use lifeline_domain::incident::{Breadcrumb, IncidentStatus};
use lifeline_domain::responder::ResponderStatus;
use lifeline_domain::types::{Coordinate, Region};
use lifeline_dispatch::{DispatchError, DispatchPath, ResponderPing};

#[tokio::test]
async fn test_automatic_match_binds_nearest_unit() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, audit) =
        seeded_coordinator(&[("near", -6.1755, 106.8273)]).await;

    let (incident, assignment) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    let assignment = assignment.expect("nearest unit should match");

    assert_eq!(assignment.responder_id, "near");
    assert_eq!(assignment.path, DispatchPath::Auto);
    assert_eq!(incident.status, IncidentStatus::Dispatched);
    assert_eq!(incident.responder_id.as_deref(), Some("near"));
    assert!(incident.dispatched_at_ms.is_some());
    assert!(incident.eta_minutes.is_some());

    let responder = index.get("near").await.unwrap();
    assert_eq!(responder.status, ResponderStatus::Busy);

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].incident_id, incident.id);
    assert_eq!(events[0].responder_id, "near");
    assert_eq!(events[0].path, DispatchPath::Auto);
    assert!(events[0].distance_km.is_some());
}

#[tokio::test]
async fn test_candidates_attempted_in_distance_order() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) = seeded_coordinator(&[
        ("far", -6.2500, 106.9000),
        ("near", -6.1755, 106.8273),
        ("mid", -6.1900, 106.8400),
    ])
    .await;

    let (_, assignment) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert_eq!(assignment.unwrap().responder_id, "near");
}

#[tokio::test]
async fn test_no_candidates_leaves_incident_active() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, audit) = seeded_coordinator(&[]).await;

    let (incident, assignment) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert!(assignment.is_none());
    assert_eq!(incident.status, IncidentStatus::Active);
    assert!(incident.responder_id.is_none());
    assert!(audit.events().is_empty());

    // A direct assign attempt surfaces the soft error for retry logic
    let err = coordinator.assign(&incident.id, None).await.unwrap_err();
    assert!(matches!(err, DispatchError::NoCandidateFound { .. }));
    assert!(err.is_retryable());

    // Roster untouched
    assert!(index.roster_snapshot().await.is_empty());
}

#[tokio::test]
async fn test_stale_unit_is_never_matched() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, _audit) = seeded_coordinator(&[]).await;

    let mut silent = available_unit("silent", -6.1755, 106.8273);
    // Last ping was 10 minutes ago, past the 5-minute freshness window
    silent.position_timestamp_ms = Some(current_timestamp_ms() - 600_000);
    index.register(silent).await;

    let (incident, assignment) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert!(assignment.is_none());
    assert_eq!(incident.status, IncidentStatus::Active);
    assert_eq!(
        index.get("silent").await.unwrap().status,
        ResponderStatus::Available
    );
}

#[tokio::test]
async fn test_manual_dispatch_to_busy_unit_is_rejected() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, _audit) = seeded_coordinator(&[
        ("unit-a", -6.1755, 106.8273),
        ("unit-b", -6.1900, 106.8400),
    ])
    .await;

    // First incident takes unit-a automatically
    let (_, first) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert_eq!(first.unwrap().responder_id, "unit-a");

    // Operator insists on unit-a for a second incident
    let second = coordinator
        .create_incident(panic_request("user-2", lat, lon))
        .await
        .unwrap();
    let err = coordinator
        .assign(&second.id, Some("unit-a"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::ResponderUnavailable {
            status: ResponderStatus::Busy,
            ..
        }
    ));
    assert!(err.is_retryable());

    // Incident unchanged, no automatic substitute
    let snapshot = coordinator.incident_snapshot(&second.id).await.unwrap();
    assert_eq!(snapshot.status, IncidentStatus::Active);
    assert!(snapshot.responder_id.is_none());
    assert_eq!(
        index.get("unit-b").await.unwrap().status,
        ResponderStatus::Available
    );
}

#[tokio::test]
async fn test_manual_dispatch_emits_manual_path_event() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, audit) =
        seeded_coordinator(&[("chosen", -6.1900, 106.8400)]).await;

    let incident = coordinator
        .create_incident(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    let assignment = coordinator
        .assign(&incident.id, Some("chosen"))
        .await
        .unwrap();

    assert_eq!(assignment.path, DispatchPath::Manual);
    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, DispatchPath::Manual);
}

#[tokio::test]
async fn test_cancel_after_dispatch_is_invalid() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) =
        seeded_coordinator(&[("near", -6.1755, 106.8273)]).await;

    let (incident, _) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert_eq!(incident.status, IncidentStatus::Dispatched);

    let err = coordinator
        .cancel(&incident.id, "user-1")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition(_)));
    assert!(!err.is_retryable());

    let snapshot = coordinator.incident_snapshot(&incident.id).await.unwrap();
    assert_eq!(snapshot.status, IncidentStatus::Dispatched);
}

#[tokio::test]
async fn test_cancel_before_dispatch_is_false_alarm() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) = seeded_coordinator(&[]).await;

    let incident = coordinator
        .create_incident(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    coordinator.cancel(&incident.id, "user-1").await.unwrap();

    let closed = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(closed.status, IncidentStatus::FalseAlarm);
    assert!(closed.resolved_at_ms.is_some());

    // Another user cannot cancel someone else's incident
    let other = coordinator
        .create_incident(panic_request("user-2", lat, lon))
        .await
        .unwrap();
    let err = coordinator.cancel(&other.id, "user-1").await.unwrap_err();
    assert!(matches!(err, DispatchError::IncidentNotFound(_)));
}

#[tokio::test]
async fn test_profile_gate_rejects_creation() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) = seeded_coordinator(&[]).await;

    let mut request = panic_request("user-1", lat, lon);
    request.profile = None;
    let err = coordinator.create_incident(request).await.unwrap_err();
    assert!(matches!(err, DispatchError::ProfileIncomplete { .. }));
    assert!(!err.is_retryable());

    let mut request = panic_request("user-1", lat, lon);
    if let Some(profile) = request.profile.as_mut() {
        profile.blood_type = None;
    }
    let err = coordinator.create_incident(request).await.unwrap_err();
    assert!(matches!(err, DispatchError::ProfileIncomplete { .. }));
}

#[tokio::test]
async fn test_resolution_roundtrip_and_metrics() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, _audit) =
        seeded_coordinator(&[("near", -6.1755, 106.8273)]).await;

    let (incident, _) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();

    // Only the assigned responder may resolve
    let err = coordinator
        .resolve(&incident.id, "impostor", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition(_)));

    let minutes = coordinator
        .resolve(&incident.id, "near", Some("victim safe".to_string()))
        .await
        .unwrap();

    let resolved = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(resolved.status, IncidentStatus::Resolved);
    assert_eq!(resolved.response_time_minutes, Some(minutes));
    assert_eq!(resolved.resolution_notes.as_deref(), Some("victim safe"));

    // response_time ≈ (resolved_at − created_at) / 60000, two decimals
    let expected =
        (resolved.resolved_at_ms.unwrap() - resolved.created_at_ms) as f64 / 60_000.0;
    assert!((minutes - expected).abs() < 0.01);

    let responder = index.get("near").await.unwrap();
    assert_eq!(responder.status, ResponderStatus::Available);
    assert_eq!(responder.handled_count, 1);
    assert_eq!(responder.average_response_minutes, Some(minutes));
}

#[tokio::test]
async fn test_breadcrumbs_move_incident_and_stay_bounded() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) = seeded_coordinator(&[]).await;

    let incident = coordinator
        .create_incident(panic_request("user-1", lat, lon))
        .await
        .unwrap();

    let base_ms = current_timestamp_ms();
    for step in 0..40u64 {
        let crumb = Breadcrumb {
            latitude: lat + step as f64 * 0.0001,
            longitude: lon,
            timestamp_ms: base_ms + step * 30_000,
            accuracy_m: Some(5.0),
        };
        coordinator
            .record_breadcrumb(&incident.id, "user-1", crumb)
            .await
            .unwrap();
    }

    let tracked = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(tracked.breadcrumbs.len(), 30);
    // Oldest dropped first; the newest sample is the incident's point now
    assert_eq!(tracked.breadcrumbs[0].timestamp_ms, base_ms + 10 * 30_000);
    assert!((tracked.latitude - (lat + 39.0 * 0.0001)).abs() < 1e-9);

    // Closed incidents refuse breadcrumbs
    coordinator.cancel(&incident.id, "user-1").await.unwrap();
    let err = coordinator
        .record_breadcrumb(
            &incident.id,
            "user-1",
            Breadcrumb {
                latitude: lat,
                longitude: lon,
                timestamp_ms: base_ms + 2_000_000,
                accuracy_m: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::IncidentNotActive { .. }));
}

#[tokio::test]
async fn test_responder_pings_extend_trail_while_dispatched() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, _audit) =
        seeded_coordinator(&[("near", -6.1755, 106.8273)]).await;

    let (incident, _) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();

    let base_ms = current_timestamp_ms();
    for step in 0..60u64 {
        coordinator
            .record_responder_ping(ResponderPing {
                responder_id: "near".to_string(),
                latitude: -6.1755 + step as f64 * 0.0001,
                longitude: 106.8273,
                timestamp_ms: base_ms + step * 1_000,
                speed_kmh: Some(35.0),
            })
            .await
            .unwrap();
    }

    let tracked = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(tracked.responder_trail.len(), 50);
    assert_eq!(
        tracked.responder_trail.last().unwrap().timestamp_ms,
        base_ms + 59_000
    );

    // The roster followed the pings
    let responder = index.get("near").await.unwrap();
    assert_eq!(responder.position_timestamp_ms, Some(base_ms + 59_000));

    // After resolution, pings keep updating the roster but no trail grows
    coordinator.resolve(&incident.id, "near", None).await.unwrap();
    coordinator
        .record_responder_ping(ResponderPing {
            responder_id: "near".to_string(),
            latitude: -6.20,
            longitude: 106.83,
            timestamp_ms: base_ms + 120_000,
            speed_kmh: None,
        })
        .await
        .unwrap();
    let closed = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(closed.responder_trail.len(), 50);
}

#[tokio::test]
async fn test_nearby_candidates_report() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) = seeded_coordinator(&[
        ("near", -6.1755, 106.8273),
        ("mid", -6.1800, 106.8300),
        ("far-out", -6.9000, 107.6000), // outside the 5 km report radius
    ])
    .await;

    let incident = coordinator
        .create_incident(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    let report = coordinator.nearby_candidates(&incident.id).await.unwrap();

    let ids: Vec<&str> = report.iter().map(|row| row.responder_id.as_str()).collect();
    assert_eq!(ids, vec!["near", "mid"]);
    for row in &report {
        // Two-decimal kilometers
        assert!((row.distance_km * 100.0).fract().abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_expiry_sweep_frees_committed_responder() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, _audit) =
        seeded_coordinator(&[("near", -6.1755, 106.8273)]).await;

    let (incident, _) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    let idle = coordinator
        .create_incident(panic_request("user-2", lat, lon))
        .await
        .unwrap();

    let timeout_ms = coordinator.config().matching.incident_timeout_ms();
    let expired = coordinator
        .expire_overdue(current_timestamp_ms() + timeout_ms + 1_000)
        .await;
    assert_eq!(expired.len(), 2);

    let swept = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(swept.status, IncidentStatus::Expired);
    let swept = coordinator.incident(&idle.id).await.unwrap();
    assert_eq!(swept.status, IncidentStatus::Expired);

    // The rolling unit is available again, with no resolution credited
    let responder = index.get("near").await.unwrap();
    assert_eq!(responder.status, ResponderStatus::Available);
    assert_eq!(responder.handled_count, 0);

    // Expired incidents are never matched again
    let err = coordinator.assign(&incident.id, None).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition(_)));
}

#[tokio::test]
async fn test_operator_reassignment_moves_the_incident() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, audit) = seeded_coordinator(&[
        ("near", -6.1755, 106.8273),
        ("backup", -6.1900, 106.8400),
    ])
    .await;

    let (incident, _) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert_eq!(incident.responder_id.as_deref(), Some("near"));

    let assignment = coordinator.reassign(&incident.id, "backup").await.unwrap();
    assert_eq!(assignment.responder_id, "backup");
    assert_eq!(assignment.path, DispatchPath::Manual);

    let moved = coordinator.incident(&incident.id).await.unwrap();
    assert_eq!(moved.status, IncidentStatus::Dispatched);
    assert_eq!(moved.responder_id.as_deref(), Some("backup"));

    assert_eq!(index.get("near").await.unwrap().status, ResponderStatus::Available);
    assert_eq!(index.get("backup").await.unwrap().status, ResponderStatus::Busy);

    // Reassignment is operator-only; a fresh incident cannot use it
    let fresh = coordinator
        .create_incident(panic_request("user-2", lat, lon))
        .await
        .unwrap();
    let err = coordinator.reassign(&fresh.id, "near").await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition(_)));

    assert_eq!(audit.events().len(), 2);
}

#[tokio::test]
async fn test_region_annotation_on_creation() {
    let (lat, lon) = INCIDENT_POINT;
    let config = lifeline_core::config::EngineConfig::default_config();
    let index = std::sync::Arc::new(lifeline_spatial::ResponderIndex::new(
        config.matching.freshness_window_ms(),
    ));
    let audit = std::sync::Arc::new(lifeline_dispatch::MemoryAuditLog::new());
    let coordinator = lifeline_dispatch::DispatchCoordinator::new(index, audit, config)
        .with_regions(vec![Region {
            name: "Jakarta Pusat".to_string(),
            boundary: vec![
                Coordinate::new(-6.1, 106.7),
                Coordinate::new(-6.1, 106.9),
                Coordinate::new(-6.3, 106.9),
                Coordinate::new(-6.3, 106.7),
            ],
        }]);

    let inside = coordinator
        .create_incident(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert_eq!(inside.region.as_deref(), Some("Jakarta Pusat"));

    let outside = coordinator
        .create_incident(panic_request("user-2", -7.8, 110.4))
        .await
        .unwrap();
    assert!(outside.region.is_none());
}

#[tokio::test]
async fn test_live_feeds_for_console() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) =
        seeded_coordinator(&[("near", -6.1755, 106.8273)]).await;

    let (dispatched, _) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    let open = coordinator
        .create_incident(panic_request("user-2", lat, lon))
        .await
        .unwrap();
    let cancelled = coordinator
        .create_incident(panic_request("user-3", lat, lon))
        .await
        .unwrap();
    coordinator.cancel(&cancelled.id, "user-3").await.unwrap();

    let live = coordinator.live_incidents().await;
    let ids: Vec<&str> = live.iter().map(|s| s.id.as_str()).collect();
    assert!(ids.contains(&dispatched.id.as_str()));
    assert!(ids.contains(&open.id.as_str()));
    assert!(!ids.contains(&cancelled.id.as_str()));

    let map = coordinator.responder_map().await;
    assert_eq!(map.len(), 1);
    assert_eq!(map[0].id, "near");
}
