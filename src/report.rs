use std::fmt::Write;

use chrono::{Duration, NaiveDate};

use crate::aggregate::{is_inactive, ACTIVITY_DAYS};
use crate::models::{Student, Window};

pub fn build_report(student: &Student, today: NaiveDate) -> String {
    let mut output = String::new();
    let handle = student.handle.as_deref().unwrap_or("(no handle)");

    let _ = writeln!(output, "# Codeforces Progress Report");
    let _ = writeln!(output, "Generated for {} ({}) on {}", student.name, handle, today);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "- Rating: {} (max {})",
        student.current_rating, student.max_rating
    );
    match student.last_synced {
        Some(at) => {
            let _ = writeln!(output, "- Last synced: {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
        None => {
            let _ = writeln!(output, "- Last synced: never");
        }
    }

    let Some(stats) = &student.statistics else {
        let _ = writeln!(output);
        let _ = writeln!(output, "No statistics yet. Run a sync first.");
        return output;
    };

    let _ = writeln!(output);
    let _ = writeln!(output, "## Problem Solving");
    let _ = writeln!(
        output,
        "- {} problems solved, average difficulty {}, {:.2} per day",
        stats.total_solved, stats.average_difficulty, stats.average_solved_per_day
    );
    if let Some(hardest) = &stats.most_difficult {
        let _ = writeln!(
            output,
            "- Hardest: {} {} (rated {})",
            hardest.problem_id, hardest.name, hardest.rating
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Windows");
    for window in Window::ALL {
        let windowed = stats.windows.get(window);
        let hardest = windowed
            .most_difficult
            .as_ref()
            .map(|p| format!("{} ({})", p.problem_id, p.rating))
            .unwrap_or_else(|| "none".to_string());
        let _ = writeln!(
            output,
            "- Last {} days: {} solved, average difficulty {}, {:.2} per day, hardest {}",
            window.days(),
            windowed.total_solved,
            windowed.average_difficulty,
            windowed.solved_per_day,
            hardest
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Difficulty Mix");
    if stats.difficulty_buckets.is_empty() {
        let _ = writeln!(output, "No solved problems recorded.");
    } else {
        for (bucket, count) in &stats.difficulty_buckets {
            let _ = writeln!(output, "- {}-{}: {}", bucket, bucket + 99, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Contests");
    if stats.contest_history.is_empty() {
        let _ = writeln!(output, "No rated contests.");
    } else {
        for contest in stats.contest_history.iter().rev().take(5) {
            let _ = writeln!(
                output,
                "- {} on {}: rank {}, {} -> {} ({:+})",
                contest.contest_name,
                contest.contest_date.date_naive(),
                contest.rank,
                contest.old_rating,
                contest.new_rating,
                contest.rating_change
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Last {ACTIVITY_DAYS} Days");
    for days_ago in (0..ACTIVITY_DAYS).rev() {
        let day = today - Duration::days(days_ago);
        let solved = stats.heatmap.get(&day).copied().unwrap_or(0);
        let _ = writeln!(output, "- {}: {}", day, solved);
    }
    if is_inactive(&stats.heatmap, today) {
        let _ = writeln!(output, "Inactive for the last {ACTIVITY_DAYS} days.");
    }

    output
}
