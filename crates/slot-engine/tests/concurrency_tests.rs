//! Concurrency tests: racing hold attempts from independent threads must
//! serialize per tutor — exactly one winner per slot, never a double hold.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, TimeZone, Utc, Weekday};
use serde_json::json;
use slot_engine::{
    overlaps, AvailabilityRule, RuleDay, ScheduleError, Scheduler, SchedulerConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// A tutor in UTC with Monday 09:00-12:00 availability and 60-minute sessions.
/// 2026-03-16 is a Monday.
fn monday_tutor() -> Arc<Scheduler> {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler
        .register_tutor(
            "alice",
            "UTC",
            60,
            vec![AvailabilityRule {
                day: RuleDay::Weekly(Weekday::Mon),
                start_time: "09:00:00".parse().unwrap(),
                end_time: "12:00:00".parse().unwrap(),
            }],
            vec![],
        )
        .unwrap();
    Arc::new(scheduler)
}

// ── Scenario E: two simultaneous holds for the identical slot ───────────────

#[test]
fn simultaneous_holds_for_one_slot_have_exactly_one_winner() {
    let scheduler = monday_tutor();
    let now = utc(2026, 3, 15, 12, 0);
    let start = utc(2026, 3, 16, 10, 0);

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["consumer-x", "consumer-y"]
        .into_iter()
        .map(|consumer| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                scheduler.create_hold("alice", consumer, start, 60, now)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ScheduleError::Conflict(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(scheduler.live_holds("alice", now).unwrap().len(), 1);
}

// ── Many threads hammering every slot ───────────────────────────────────────

#[test]
fn hammering_all_slots_never_produces_overlapping_holds() {
    let scheduler = monday_tutor();
    let now = utc(2026, 3, 15, 12, 0);
    let starts = [
        utc(2026, 3, 16, 9, 0),
        utc(2026, 3, 16, 10, 0),
        utc(2026, 3, 16, 11, 0),
    ];

    let thread_count = 8;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let consumer = format!("consumer-{i}");
                barrier.wait();
                let mut won = 0;
                for start in starts {
                    if scheduler
                        .create_hold("alice", &consumer, start, 60, now)
                        .is_ok()
                    {
                        won += 1;
                    }
                }
                won
            })
        })
        .collect();

    let total_wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total_wins, starts.len(), "each slot has exactly one winner");

    let holds = scheduler.live_holds("alice", now).unwrap();
    assert_eq!(holds.len(), starts.len());
    for (i, a) in holds.iter().enumerate() {
        for b in &holds[i + 1..] {
            assert!(
                !overlaps(a.start_at, a.end_at, b.start_at, b.end_at),
                "holds {} and {} overlap",
                a.id,
                b.id
            );
        }
    }
}

// ── Concurrent finalize of one hold ─────────────────────────────────────────

#[test]
fn concurrent_finalizes_of_one_hold_book_exactly_once() {
    let scheduler = monday_tutor();
    let now = utc(2026, 3, 15, 12, 0);

    let hold = scheduler
        .create_hold("alice", "consumer-x", utc(2026, 3, 16, 10, 0), 60, now)
        .unwrap();

    let thread_count = 4;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            let hold_id = hold.id;
            thread::spawn(move || {
                barrier.wait();
                scheduler.finalize_booking(hold_id, "consumer-x", "student-1", json!({}), now)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let booked = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(booked, 1, "a hold can be consumed exactly once");
    assert_eq!(scheduler.confirmed_bookings("alice").unwrap().len(), 1);
}

// ── Mixed hold/finalize traffic keeps the invariant ─────────────────────────

#[test]
fn mixed_traffic_keeps_the_interval_set_disjoint() {
    let scheduler = monday_tutor();
    let now = utc(2026, 3, 15, 12, 0);
    let starts = [
        utc(2026, 3, 16, 9, 0),
        utc(2026, 3, 16, 10, 0),
        utc(2026, 3, 16, 11, 0),
    ];

    let thread_count = 6;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let consumer = format!("consumer-{i}");
                barrier.wait();
                for start in starts {
                    if let Ok(hold) = scheduler.create_hold("alice", &consumer, start, 60, now) {
                        // Winners immediately try to book.
                        let _ = scheduler.finalize_booking(
                            hold.id,
                            &consumer,
                            "student-1",
                            json!({}),
                            now,
                        );
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let holds = scheduler.live_holds("alice", now).unwrap();
    let bookings = scheduler.confirmed_bookings("alice").unwrap();
    let intervals: Vec<_> = holds
        .iter()
        .map(|h| (h.start_at, h.end_at))
        .chain(bookings.iter().map(|b| (b.start_at, b.end_at)))
        .collect();

    assert_eq!(intervals.len(), starts.len());
    for (i, a) in intervals.iter().enumerate() {
        for b in &intervals[i + 1..] {
            assert!(!overlaps(a.0, a.1, b.0, b.1));
        }
    }
}
