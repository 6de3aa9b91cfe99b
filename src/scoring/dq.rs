use crate::models::VoteRecord;
use std::collections::BTreeMap;

/// Folds votes into one verdict per poll.
///
/// A poll starts out correct the first time it is seen and is ANDed with every
/// later vote for it, so one incorrect vote marks the whole poll incorrect no
/// matter where it appears in the history.
pub fn fold_poll_correctness(votes: &[VoteRecord]) -> BTreeMap<&str, bool> {
    let mut verdicts: BTreeMap<&str, bool> = BTreeMap::new();

    for vote in votes {
        let verdict = verdicts.entry(vote.poll_id.as_str()).or_insert(true);
        *verdict = *verdict && vote.is_correct;
    }

    verdicts
}

pub fn overall_dq(polls_taken: usize, polls_incorrect: usize) -> f64 {
    if polls_taken == 0 {
        return 0.0;
    }
    polls_incorrect as f64 / polls_taken as f64
}

/// Number of polls whose verdict is incorrect.
pub fn count_incorrect(verdicts: &BTreeMap<&str, bool>) -> usize {
    verdicts.values().filter(|correct| !**correct).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tally {
        polls_taken: usize,
        polls_incorrect: usize,
        overall_dq: f64,
    }

    fn tally(votes: &[VoteRecord]) -> Tally {
        let verdicts = fold_poll_correctness(votes);
        let polls_incorrect = count_incorrect(&verdicts);
        Tally {
            polls_taken: verdicts.len(),
            polls_incorrect,
            overall_dq: overall_dq(verdicts.len(), polls_incorrect),
        }
    }

    fn vote(poll_id: &str, is_correct: bool) -> VoteRecord {
        VoteRecord {
            poll_id: poll_id.to_string(),
            is_correct,
            points_earned: 0,
            stage: Some(0),
            level: Some(1),
        }
    }

    #[test]
    fn one_incorrect_vote_marks_the_poll_incorrect_in_either_order() {
        let forward = vec![vote("a", true), vote("a", false)];
        let backward = vec![vote("a", false), vote("a", true)];

        for votes in [forward, backward] {
            let verdicts = fold_poll_correctness(&votes);
            assert_eq!(verdicts.get("a"), Some(&false));
            let t = tally(&votes);
            assert_eq!(t.polls_taken, 1);
            assert_eq!(t.polls_incorrect, 1);
            assert_eq!(t.overall_dq, 1.0);
        }
    }

    #[test]
    fn later_correct_votes_never_restore_a_poll() {
        let votes = vec![vote("a", false), vote("a", true), vote("a", true)];
        assert_eq!(fold_poll_correctness(&votes).get("a"), Some(&false));
    }

    #[test]
    fn dq_is_share_of_incorrect_polls() {
        let votes = vec![
            vote("a", true),
            vote("b", false),
            vote("c", true),
            vote("c", true),
            vote("d", true),
        ];
        let t = tally(&votes);
        assert_eq!(t.polls_taken, 4);
        assert_eq!(t.polls_incorrect, 1);
        assert_eq!(t.overall_dq, 0.25);
    }

    #[test]
    fn empty_history_has_zero_dq() {
        let t = tally(&[]);
        assert_eq!(t.polls_taken, 0);
        assert_eq!(t.polls_incorrect, 0);
        assert_eq!(t.overall_dq, 0.0);
    }

    #[test]
    fn dq_stays_within_bounds() {
        let votes: Vec<VoteRecord> = (0..20)
            .map(|i| vote(&format!("p{}", i % 7), i % 3 == 0))
            .collect();
        let t = tally(&votes);
        assert!(t.polls_incorrect <= t.polls_taken);
        assert!((0.0..=1.0).contains(&t.overall_dq));
    }
}
