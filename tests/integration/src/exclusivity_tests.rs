//! Exclusive-assignment protocol under concurrent contention

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::test_utils::*;

use lifeline_domain::incident::IncidentStatus;
use lifeline_domain::responder::ResponderStatus;
use lifeline_domain::types::Coordinate;
use lifeline_dispatch::DispatchError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_unit_single_winner_automatic() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, index, audit) =
        seeded_coordinator(&[("only", -6.1755, 106.8273)]).await;
    let coordinator = Arc::new(coordinator);

    // Sixteen incidents race for the one available unit
    let mut incident_ids = Vec::new();
    for i in 0..16 {
        let incident = coordinator
            .create_incident(panic_request(&format!("user-{i}"), lat, lon))
            .await
            .unwrap();
        incident_ids.push(incident.id);
    }

    let mut handles = Vec::new();
    for incident_id in incident_ids.clone() {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            // Scramble arrival order
            let jitter_us = rand::thread_rng().gen_range(0..500);
            sleep(Duration::from_micros(jitter_us)).await;
            coordinator.assign(&incident_id, None).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(assignment) => {
                winners += 1;
                assert_eq!(assignment.responder_id, "only");
            }
            Err(DispatchError::NoCandidateFound { .. }) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(index.get("only").await.unwrap().status, ResponderStatus::Busy);
    assert_eq!(audit.events().len(), 1);

    // Exactly one incident is dispatched, the rest stayed active
    let mut dispatched = 0;
    for incident_id in &incident_ids {
        let snapshot = coordinator.incident_snapshot(incident_id).await.unwrap();
        match snapshot.status {
            IncidentStatus::Dispatched => dispatched += 1,
            IncidentStatus::Active => {}
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(dispatched, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_unit_single_winner_manual() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) =
        seeded_coordinator(&[("only", -6.1755, 106.8273)]).await;
    let coordinator = Arc::new(coordinator);

    let mut incident_ids = Vec::new();
    for i in 0..8 {
        let incident = coordinator
            .create_incident(panic_request(&format!("user-{i}"), lat, lon))
            .await
            .unwrap();
        incident_ids.push(incident.id);
    }

    let mut handles = Vec::new();
    for incident_id in incident_ids {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator.assign(&incident_id, Some("only")).await
        }));
    }

    let mut winners = 0;
    let mut unavailable = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(DispatchError::ResponderUnavailable { .. }) => unavailable += 1,
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(unavailable, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_responder_committed_to_two_incidents() {
    let (lat, lon) = INCIDENT_POINT;
    // Fewer units than incidents: every unit gets contended
    let (coordinator, _index, _audit) = seeded_coordinator(&[
        ("unit-a", -6.1755, 106.8273),
        ("unit-b", -6.1800, 106.8300),
        ("unit-c", -6.1850, 106.8350),
    ])
    .await;
    let coordinator = Arc::new(coordinator);

    let mut incident_ids = Vec::new();
    for i in 0..12 {
        let incident = coordinator
            .create_incident(panic_request(&format!("user-{i}"), lat, lon))
            .await
            .unwrap();
        incident_ids.push(incident.id);
    }

    let mut handles = Vec::new();
    for incident_id in incident_ids.clone() {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator.assign(&incident_id, None).await
        }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    // Invariant: no two dispatched incidents share a responder
    let mut seen = HashSet::new();
    let mut dispatched = 0;
    for incident_id in &incident_ids {
        let incident = coordinator.incident(incident_id).await.unwrap();
        if incident.status == IncidentStatus::Dispatched {
            dispatched += 1;
            let responder_id = incident.responder_id.clone().unwrap();
            assert!(
                seen.insert(responder_id.clone()),
                "responder {responder_id} committed twice"
            );
        }
    }
    assert_eq!(dispatched, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pings_keep_latest_position() {
    let (coordinator, index, _audit) =
        seeded_coordinator(&[("mover", -6.1755, 106.8273)]).await;
    let coordinator = Arc::new(coordinator);

    let base_ms = lifeline_core::time::current_timestamp_ms();
    let mut handles = Vec::new();
    for step in 0..64u64 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .record_responder_ping(lifeline_dispatch::ResponderPing {
                    responder_id: "mover".to_string(),
                    latitude: -6.1755 + step as f64 * 0.0001,
                    longitude: 106.8273,
                    timestamp_ms: base_ms + step,
                    speed_kmh: None,
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whatever the arrival order, the newest report wins
    let responder = index.get("mover").await.unwrap();
    assert_eq!(responder.position_timestamp_ms, Some(base_ms + 63));
    let expected = Coordinate::new(-6.1755 + 63.0 * 0.0001, 106.8273);
    assert_eq!(responder.position, Some(expected));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pings_never_block_matching() {
    let (lat, lon) = INCIDENT_POINT;
    let (coordinator, _index, _audit) = seeded_coordinator(&[
        ("unit-a", -6.1755, 106.8273),
        ("unit-b", -6.1800, 106.8300),
    ])
    .await;
    let coordinator = Arc::new(coordinator);

    // A continuous ping stream for one unit while the other is matched
    let pinger = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let base_ms = lifeline_core::time::current_timestamp_ms();
            for step in 0..200u64 {
                coordinator
                    .record_responder_ping(lifeline_dispatch::ResponderPing {
                        responder_id: "unit-b".to_string(),
                        latitude: -6.1800,
                        longitude: 106.8300,
                        timestamp_ms: base_ms + step,
                        speed_kmh: Some(20.0),
                    })
                    .await
                    .unwrap();
            }
        })
    };

    let (_, assignment) = coordinator
        .create_and_assign(panic_request("user-1", lat, lon))
        .await
        .unwrap();
    assert!(assignment.is_some());

    pinger.await.unwrap();
}
