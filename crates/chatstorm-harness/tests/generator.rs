#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chatstorm_core::protocol::envelope::ChannelId;
use chatstorm_harness::sim::generator::ALPHABET;
use chatstorm_harness::sim::{Action, ChannelDirectory, ChannelSet, ChannelState, MessageGenerator, SessionId};
use tokio::time::Duration;

#[test]
fn text_length_within_drawn_bounds() {
    let mut g = MessageGenerator::new(Some(1));
    for _ in 0..500 {
        let t = g.draw_text(5, 40);
        assert!((5..=40).contains(&t.drawn_len), "drawn {}", t.drawn_len);
        assert!(t.text.len() <= t.drawn_len);
        assert_eq!(t.text, t.text.trim());
        assert!(t.text.bytes().all(|b| ALPHABET.contains(&b)));
    }
}

#[test]
fn zero_length_text_is_empty() {
    let mut g = MessageGenerator::new(Some(2));
    assert_eq!(g.random_text(0, 0), "");
}

#[test]
fn seeded_generators_replay() {
    let mut a = MessageGenerator::new(Some(99));
    let mut b = MessageGenerator::new(Some(99));
    for _ in 0..20 {
        assert_eq!(a.random_text(1, 30), b.random_text(1, 30));
        assert_eq!(a.choose_action(), b.choose_action());
    }
}

#[test]
fn switch_fraction_converges() {
    let mut g = MessageGenerator::new(Some(42));
    let n = 20_000;
    let switches = (0..n)
        .filter(|_| g.choose_action() == Action::Switch)
        .count();
    let frac = switches as f64 / n as f64;
    assert!((0.08..=0.12).contains(&frac), "switch fraction {frac}");
}

#[test]
fn think_time_within_bounds() {
    let mut g = MessageGenerator::new(Some(3));
    for _ in 0..200 {
        let d = g.think_time(2000, 4000);
        assert!(d >= Duration::from_millis(2000) && d <= Duration::from_millis(4000));
    }
    assert_eq!(g.think_time(7, 7), Duration::from_millis(7));
}

#[test]
fn picks_stay_in_one_indexed_range() {
    let mut g = MessageGenerator::new(Some(5));
    let set = ChannelSet::new(5);
    let mut seen = [false; 5];
    for _ in 0..1000 {
        let c = set.pick(g.rng());
        assert!(set.contains(c));
        seen[(c.get() - 1) as usize] = true;
    }
    assert!(seen.iter().all(|s| *s));
    assert!(!set.contains(ChannelId(0)));
    assert!(!set.contains(ChannelId(6)));
}

#[test]
fn switching_to_current_channel_is_noop() {
    let mut state = ChannelState::new();
    assert_eq!(state.current(), None);
    assert_eq!(state.switch_target(ChannelId(3)), Some(ChannelId(3)));

    state.commit(ChannelId(3));
    assert_eq!(state.switch_target(ChannelId(3)), None);
    assert_eq!(state.switch_target(ChannelId(1)), Some(ChannelId(1)));
}

#[test]
fn single_channel_never_switches_after_join() {
    let mut g = MessageGenerator::new(Some(8));
    let set = ChannelSet::new(1);
    let mut state = ChannelState::new();
    state.commit(set.pick(g.rng()));
    for _ in 0..100 {
        assert_eq!(state.switch_target(set.pick(g.rng())), None);
    }
}

#[test]
fn directory_tracks_moves_and_release() {
    let dir = ChannelDirectory::new();
    dir.assign(SessionId(0), ChannelId(1));
    dir.assign(SessionId(1), ChannelId(1));
    dir.assign(SessionId(2), ChannelId(2));
    assert_eq!(dir.members(ChannelId(1)), vec![SessionId(0), SessionId(1)]);

    dir.assign(SessionId(1), ChannelId(2));
    assert_eq!(dir.current(SessionId(1)), Some(ChannelId(2)));
    assert_eq!(dir.members(ChannelId(1)), vec![SessionId(0)]);
    assert_eq!(dir.occupancy(), vec![(ChannelId(1), 1), (ChannelId(2), 2)]);

    dir.release(SessionId(0));
    assert_eq!(dir.current(SessionId(0)), None);
    assert_eq!(dir.occupancy(), vec![(ChannelId(2), 2)]);
}
