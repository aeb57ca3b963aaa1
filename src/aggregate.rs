use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::codeforces::{RatingChange, Submission};
use crate::models::{
    ContestRecord, ProblemKey, ProblemSummary, SolvedProblem, StatWindows, Statistics, Window,
    WindowedStats,
};

/// Divisor of the overall solved-per-day figure, independent of how long the
/// student has been tracked.
pub const OVERALL_RATE_DAYS: f64 = 90.0;

pub const ACTIVITY_DAYS: i64 = 7;

pub fn aggregate(
    contest_history: &[RatingChange],
    submissions: &[Submission],
    now: DateTime<Utc>,
) -> Statistics {
    let contest_history = contest_history.iter().map(contest_record).collect();
    let (solved_problems, heatmap) = solved_problems(submissions);

    let overall = summarize(&solved_problems.iter().collect::<Vec<_>>());
    let mut windows = StatWindows::default();
    for window in Window::ALL {
        *windows.get_mut(window) = windowed_stats(&solved_problems, window, now);
    }

    Statistics {
        contest_history,
        total_solved: overall.total,
        average_difficulty: overall.average,
        average_solved_per_day: round2(overall.total as f64 / OVERALL_RATE_DAYS),
        most_difficult: overall.most_difficult,
        difficulty_buckets: overall.buckets,
        heatmap,
        windows,
        solved_problems,
    }
}

pub fn contest_record(change: &RatingChange) -> ContestRecord {
    ContestRecord {
        contest_id: change.contest_id,
        contest_name: change.contest_name.clone(),
        rank: change.rank,
        old_rating: change.old_rating,
        new_rating: change.new_rating,
        rating_change: change.new_rating - change.old_rating,
        contest_date: from_epoch(change.rating_update_time_seconds),
        problems_unsolved: 0,
    }
}

/// Chronologically first accepted submission per problem, plus the per-day
/// count of those first solves.
///
/// Codeforces lists submissions newest first, so accepted submissions are
/// walked by creation time; equal timestamps keep their source order.
/// Ties for the hardest problem therefore resolve to the earliest solve.
pub fn solved_problems(
    submissions: &[Submission],
) -> (Vec<SolvedProblem>, BTreeMap<NaiveDate, u32>) {
    let mut accepted: Vec<&Submission> = submissions.iter().filter(|s| s.is_accepted()).collect();
    accepted.sort_by_key(|s| s.creation_time_seconds);

    let mut seen: HashSet<ProblemKey> = HashSet::new();
    let mut solved = Vec::new();
    let mut heatmap: BTreeMap<NaiveDate, u32> = BTreeMap::new();

    for submission in accepted {
        let key = ProblemKey {
            contest_id: submission.problem.contest_id,
            index: submission.problem.index.clone(),
        };
        if seen.contains(&key) {
            continue;
        }

        let solved_at = from_epoch(submission.creation_time_seconds);
        *heatmap.entry(solved_at.date_naive()).or_insert(0) += 1;

        solved.push(SolvedProblem {
            problem_id: key.to_string(),
            name: submission.problem.name.clone(),
            rating: submission.problem.rating.unwrap_or(0),
            tags: submission.problem.tags.clone(),
            solved_at,
            key: key.clone(),
        });
        seen.insert(key);
    }

    (solved, heatmap)
}

pub fn windowed_stats(
    solved: &[SolvedProblem],
    window: Window,
    now: DateTime<Utc>,
) -> WindowedStats {
    let cutoff = now - Duration::days(window.days());
    let in_window: Vec<&SolvedProblem> = solved
        .iter()
        .filter(|p| p.solved_at >= cutoff && p.solved_at <= now)
        .collect();

    let summary = summarize(&in_window);
    WindowedStats {
        total_solved: summary.total,
        average_difficulty: summary.average,
        solved_per_day: round2(summary.total as f64 / window.days() as f64),
        difficulty_buckets: summary.buckets,
        most_difficult: summary.most_difficult,
    }
}

pub fn bucket_for(rating: u32) -> u32 {
    rating / 100 * 100
}

/// A student is inactive when none of the last seven calendar days, today
/// included, has a first solve.
pub fn is_inactive(heatmap: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> bool {
    !(0..ACTIVITY_DAYS).any(|days_ago| heatmap.contains_key(&(today - Duration::days(days_ago))))
}

struct Summary {
    total: u32,
    average: u32,
    most_difficult: Option<ProblemSummary>,
    buckets: BTreeMap<u32, u32>,
}

fn summarize(problems: &[&SolvedProblem]) -> Summary {
    let mut buckets: BTreeMap<u32, u32> = BTreeMap::new();
    let mut hardest: Option<&SolvedProblem> = None;
    let mut rating_sum: u64 = 0;

    for problem in problems {
        *buckets.entry(bucket_for(problem.rating)).or_insert(0) += 1;
        rating_sum += u64::from(problem.rating);
        if hardest.map_or(true, |h| problem.rating > h.rating) {
            hardest = Some(*problem);
        }
    }

    let total = problems.len() as u32;
    let average = if total == 0 {
        0
    } else {
        (rating_sum as f64 / total as f64).round() as u32
    };

    Summary {
        total,
        average,
        most_difficult: hardest.map(SolvedProblem::summary),
        buckets,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn from_epoch(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codeforces::Problem;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn submission(
        verdict: &str,
        contest_id: i64,
        index: &str,
        rating: Option<u32>,
        at: DateTime<Utc>,
    ) -> Submission {
        Submission {
            verdict: Some(verdict.to_string()),
            creation_time_seconds: at.timestamp(),
            problem: Problem {
                contest_id: Some(contest_id),
                index: index.to_string(),
                name: format!("Problem {contest_id}{index}"),
                rating,
                tags: vec!["greedy".to_string()],
            },
        }
    }

    #[test]
    fn contest_records_keep_source_order_and_delta() {
        let history = vec![
            RatingChange {
                contest_id: 1900,
                contest_name: "Round 1".to_string(),
                rank: 812,
                old_rating: 1500,
                new_rating: 1563,
                rating_update_time_seconds: 1_700_000_000,
            },
            RatingChange {
                contest_id: 1850,
                contest_name: "Round 0".to_string(),
                rank: 2301,
                old_rating: 1563,
                new_rating: 1490,
                rating_update_time_seconds: 1_690_000_000,
            },
        ];

        let stats = aggregate(&history, &[], now());
        assert_eq!(stats.contest_history.len(), 2);
        assert_eq!(stats.contest_history[0].contest_id, 1900);
        assert_eq!(stats.contest_history[0].rating_change, 63);
        assert_eq!(stats.contest_history[1].rating_change, -73);
        assert_eq!(stats.contest_history[0].contest_date.timestamp(), 1_700_000_000);
    }

    #[test]
    fn duplicate_accepted_submissions_count_once_at_first_time() {
        let t0 = now() - Duration::days(3);
        let submissions = vec![
            submission("OK", 1, "A", Some(800), t0 + Duration::days(1)),
            submission("OK", 1, "A", Some(800), t0),
            submission("WRONG_ANSWER", 1, "A", Some(800), t0 - Duration::hours(1)),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.total_solved, 1);
        assert_eq!(stats.solved_problems[0].solved_at, t0);
        assert_eq!(stats.solved_problems[0].problem_id, "1-A");
        assert_eq!(stats.heatmap.len(), 1);
        assert_eq!(stats.heatmap.get(&t0.date_naive()), Some(&1));
    }

    #[test]
    fn end_to_end_example() {
        let t0 = now() - Duration::days(5);
        let t1 = now() - Duration::days(2);
        let submissions = vec![
            submission("OK", 1, "A", Some(800), t0),
            submission("OK", 1, "A", Some(800), t0 + Duration::seconds(10)),
            submission("OK", 1, "B", Some(1200), t1),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.total_solved, 2);
        assert_eq!(stats.average_difficulty, 1000);
        assert_eq!(stats.most_difficult.as_ref().map(|p| p.rating), Some(1200));
        assert_eq!(stats.heatmap.len(), 2);
        assert_eq!(stats.heatmap.get(&t0.date_naive()), Some(&1));
        assert_eq!(stats.heatmap.get(&t1.date_naive()), Some(&1));
    }

    #[test]
    fn same_day_solves_share_a_heatmap_entry() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 27, 8, 0, 0).unwrap();
        let submissions = vec![
            submission("OK", 1, "A", Some(800), t0),
            submission("OK", 1, "B", Some(1200), t0 + Duration::hours(3)),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.heatmap.len(), 1);
        assert_eq!(stats.heatmap.get(&t0.date_naive()), Some(&2));
    }

    #[test]
    fn buckets_floor_to_hundreds_and_keep_unrated() {
        assert_eq!(bucket_for(237), 200);
        assert_eq!(bucket_for(0), 0);
        assert_eq!(bucket_for(3500), 3500);

        let t = now() - Duration::days(1);
        let submissions = vec![
            submission("OK", 1, "A", Some(237), t),
            submission("OK", 1, "B", None, t),
            submission("OK", 1, "C", Some(299), t),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.difficulty_buckets.get(&200), Some(&2));
        assert_eq!(stats.difficulty_buckets.get(&0), Some(&1));
        assert_eq!(stats.solved_problems[1].rating, 0);
    }

    #[test]
    fn no_solves_yields_empty_statistics() {
        let submissions = vec![submission("TIME_LIMIT_EXCEEDED", 1, "A", Some(800), now())];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.total_solved, 0);
        assert_eq!(stats.average_difficulty, 0);
        assert_eq!(stats.average_solved_per_day, 0.0);
        assert!(stats.most_difficult.is_none());
        assert!(stats.difficulty_buckets.is_empty());
        assert!(stats.heatmap.is_empty());
        assert_eq!(stats.windows.d7, WindowedStats::default());
    }

    #[test]
    fn hardest_problem_ties_resolve_to_earliest_solve() {
        let t = now() - Duration::days(1);
        // Newest first, as Codeforces lists them.
        let submissions = vec![
            submission("OK", 6, "D", Some(1600), t + Duration::minutes(5)),
            submission("OK", 5, "C", Some(1600), t),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.most_difficult.map(|p| p.problem_id), Some("5-C".to_string()));
    }

    #[test]
    fn windows_are_nested_subsets() {
        let submissions = vec![
            submission("OK", 1, "A", Some(800), now() - Duration::days(2)),
            submission("OK", 1, "B", Some(1000), now() - Duration::days(20)),
            submission("OK", 1, "C", Some(1400), now() - Duration::days(60)),
            submission("OK", 1, "D", Some(1900), now() - Duration::days(200)),
        ];

        let stats = aggregate(&[], &submissions, now());
        let w = &stats.windows;
        assert_eq!(w.d7.total_solved, 1);
        assert_eq!(w.d30.total_solved, 2);
        assert_eq!(w.d90.total_solved, 3);
        assert_eq!(stats.total_solved, 4);
        assert!(w.d7.total_solved <= w.d30.total_solved);
        assert!(w.d30.total_solved <= w.d90.total_solved);
        assert!(w.d90.total_solved <= stats.total_solved);

        assert_eq!(w.d30.average_difficulty, 900);
        assert_eq!(w.d90.most_difficult.as_ref().map(|p| p.rating), Some(1400));
        assert_eq!(stats.most_difficult.as_ref().map(|p| p.rating), Some(1900));
        assert_eq!(w.d7.difficulty_buckets.get(&800), Some(&1));
        assert!(w.d7.difficulty_buckets.get(&1000).is_none());
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let submissions = vec![submission("OK", 1, "A", Some(800), now() - Duration::days(7))];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.windows.d7.total_solved, 1);
    }

    #[test]
    fn per_day_rates_round_to_two_places() {
        let t = now() - Duration::days(1);
        let submissions = vec![
            submission("OK", 1, "A", Some(800), t),
            submission("OK", 1, "B", Some(900), t),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.windows.d7.solved_per_day, 0.29);
        assert_eq!(stats.windows.d30.solved_per_day, 0.07);
        assert_eq!(stats.windows.d90.solved_per_day, 0.02);
        assert_eq!(stats.average_solved_per_day, 0.02);
        assert_eq!(stats.average_difficulty, 850);
    }

    #[test]
    fn average_difficulty_rounds_to_nearest() {
        let t = now() - Duration::days(1);
        let submissions = vec![
            submission("OK", 1, "A", Some(800), t),
            submission("OK", 1, "B", Some(801), t),
        ];

        let stats = aggregate(&[], &submissions, now());
        assert_eq!(stats.average_difficulty, 801);
    }

    #[test]
    fn inactivity_looks_at_last_seven_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut heatmap = BTreeMap::new();
        assert!(is_inactive(&heatmap, today));

        heatmap.insert(today - Duration::days(7), 3);
        assert!(is_inactive(&heatmap, today));

        heatmap.insert(today - Duration::days(6), 1);
        assert!(!is_inactive(&heatmap, today));

        let mut only_today = BTreeMap::new();
        only_today.insert(today, 1);
        assert!(!is_inactive(&only_today, today));
    }
}
