//! # Concurrent Access
//!
//! One shared [`Ledger`] hammered from many OS threads. Every operation is a
//! single write unit, so the invariants must hold no matter how the threads
//! interleave.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;

use serde_json::json;

use agora_audit::{verify_chain, BundleEvent, NewAuditEvent};
use agora_core::{OptionId, PollId, TenantId, UserId};
use agora_crypto::{derive_nullifier, UserSecret};
use agora_ledger::{Actor, Ledger, NewConsultation, NewPoll, TransactionalStore};
use agora_state::{ConsultationStage, ConsultationThresholds, PollOption, StageWindows, TimeWindow};

const THREADS: usize = 16;

fn tenant() -> TenantId {
    TenantId::new("metropole").unwrap()
}

fn official() -> Actor {
    Actor::new(tenant(), UserId::new("registrar").unwrap())
}

fn opt(id: &str) -> OptionId {
    OptionId::new(id).unwrap()
}

fn active_poll(ledger: &Ledger) -> PollId {
    let poll = ledger
        .create_poll(
            &official(),
            NewPoll {
                id: Some(PollId::new("P-race").unwrap()),
                title: "Night buses".into(),
                options: (1..=4)
                    .map(|i| PollOption { id: opt(&format!("O{i}")), text: format!("Route {i}") })
                    .collect(),
                window: TimeWindow::unbounded(),
            },
        )
        .unwrap()
        .value
        .id;
    ledger.open_poll(&official(), &poll).unwrap();
    poll
}

#[test]
fn racing_casts_for_one_nullifier_leave_one_live_row() {
    let ledger = Ledger::in_memory();
    let poll = active_poll(&ledger);
    let secret = UserSecret::from_slice(&[42; 32]).unwrap();
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|s| {
        for i in 0..THREADS {
            let (ledger, poll, secret, barrier) = (&ledger, &poll, &secret, &barrier);
            s.spawn(move || {
                barrier.wait();
                for round in 0..50 {
                    let choice = opt(&format!("O{}", (i + round) % 4 + 1));
                    ledger
                        .cast_vote_with_secret(&tenant(), poll, secret, &choice)
                        .unwrap();
                }
            });
        }
    });

    let nullifier = derive_nullifier(&poll, &secret);
    let live = ledger.store().read(|t| t.votes.live_count(&poll));
    assert_eq!(live, 1);

    let status = ledger.has_voted(&tenant(), &poll, &nullifier).unwrap();
    let results = ledger.get_results(&tenant(), &poll, &nullifier).unwrap();
    assert_eq!(results.total_votes, 1);
    let winner = results.options.iter().find(|o| o.count == 1).unwrap();
    assert_eq!(Some(winner.option_id.clone()), status.option_id);

    let history = ledger.vote_history(&tenant(), &poll, &nullifier).unwrap();
    assert_eq!(history.iter().filter(|v| v.is_live()).count(), 1);
}

#[test]
fn many_voters_in_parallel_are_all_counted() {
    let ledger = Ledger::in_memory();
    let poll = active_poll(&ledger);

    std::thread::scope(|s| {
        for i in 0..THREADS {
            let (ledger, poll) = (&ledger, &poll);
            s.spawn(move || {
                for j in 0..25u8 {
                    let secret = UserSecret::from_slice(&[i as u8 + 1, j + 1].repeat(16)).unwrap();
                    ledger
                        .cast_vote_with_secret(&tenant(), poll, &secret, &opt("O2"))
                        .unwrap();
                }
            });
        }
    });

    ledger.close_poll(&official(), &poll).unwrap();
    let results = ledger.get_public_results(&tenant(), &poll).unwrap();
    assert_eq!(results.total_votes, (THREADS * 25) as u64);
    assert_eq!(results.options[1].count, (THREADS * 25) as u64);
}

#[test]
fn concurrent_transitions_have_exactly_one_winner() {
    let ledger = Ledger::in_memory();
    let poll = ledger
        .create_consultation(
            &official(),
            NewConsultation {
                id: None,
                title: "Canal banks".into(),
                windows: StageWindows::default(),
                thresholds: ConsultationThresholds { min_ideas_for_stage2: 2, shortlist_size: 1 },
            },
        )
        .unwrap()
        .value
        .poll
        .id;
    for n in 0..3 {
        let author = Actor::new(tenant(), UserId::new(format!("author-{n}")).unwrap());
        ledger.submit_idea(&author, &poll, &format!("Idea {n}"), "").unwrap();
    }

    let successes = AtomicUsize::new(0);
    let barrier = Barrier::new(THREADS);
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            let (ledger, poll, successes, barrier) = (&ledger, &poll, &successes, &barrier);
            s.spawn(move || {
                barrier.wait();
                if ledger
                    .transition_stage(&official(), poll, ConsultationStage::ShortlistSelection)
                    .is_ok()
                {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    let view = ledger.get_consultation(&official(), &poll).unwrap();
    assert_eq!(view.info.stage, ConsultationStage::ShortlistSelection);
    assert_eq!(view.info.transitions.len(), 1);

    let transitions = ledger
        .audit_events(&tenant())
        .iter()
        .filter(|e| e.event_type == "consultation.stage_transitioned")
        .count();
    assert_eq!(transitions, 1);
}

#[test]
fn concurrent_appends_produce_a_valid_chain() {
    let ledger = Ledger::in_memory();
    let other = TenantId::new("satellite").unwrap();

    std::thread::scope(|s| {
        for i in 0..THREADS {
            let (ledger, other) = (&ledger, &other);
            s.spawn(move || {
                for j in 0..20 {
                    let target = if j % 2 == 0 { tenant() } else { other.clone() };
                    ledger
                        .append_audit(NewAuditEvent::new(
                            target,
                            "poll.created",
                            "poll",
                            format!("T{i}-{j}"),
                            json!({ "thread": i, "seq": j }),
                        ))
                        .unwrap();
                }
            });
        }
    });

    for t in [tenant(), other] {
        let events: Vec<BundleEvent> = ledger.audit_events(&t).iter().map(BundleEvent::from).collect();
        assert_eq!(events.len(), THREADS * 10);
        let v = verify_chain(&events);
        assert!(v.valid, "{t}: {:?}", v.errors);
    }
}
