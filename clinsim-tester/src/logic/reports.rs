use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use super::StrategyResult;

fn success_rate(results: &[StrategyResult]) -> f64 {
    let passed = results.iter().filter(|r| r.passed).count();
    clinsim_core::numbers::percent_of(passed, results.len()).unwrap_or(0.0)
}

fn grade_summary(result: &StrategyResult) -> String {
    if result.grades.is_empty() {
        return "-".to_string();
    }
    result
        .grades
        .iter()
        .map(|(grade, count)| format!("{grade}×{count}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[StrategyResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Case Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "============================".cyan())?;

    let total_runs = results.len();
    let passed_runs = results.iter().filter(|r| r.passed).count();

    writeln!(out, "Total runs: {total_runs}")?;
    writeln!(out, "Passed: {}", passed_runs.to_string().green())?;
    writeln!(out, "Failed: {}", (total_runs - passed_runs).to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(out, "{} {}", status, result.label().bold())?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(
            out,
            "   Composite: mean {:.1} (min {}, max {}) | grades {}",
            result.mean_composite,
            result.min_composite,
            result.max_composite,
            grade_summary(result)
        )?;
        writeln!(
            out,
            "   Reveal rate: {:.1}% | mean CP spent {:.1}",
            result.reveal_rate, result.mean_cp_spent
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    if let (Some(best), Some(worst)) = (
        results
            .iter()
            .max_by(|a, b| a.mean_composite.total_cmp(&b.mean_composite)),
        results
            .iter()
            .min_by(|a, b| a.mean_composite.total_cmp(&b.mean_composite)),
    ) {
        writeln!(out, "{}", "🎯 Score Spread".bright_yellow().bold())?;
        writeln!(out, "{}", "==============".yellow())?;
        writeln!(
            out,
            "Best: {} ({:.1})",
            best.label().green(),
            best.mean_composite
        )?;
        writeln!(
            out,
            "Worst: {} ({:.1})",
            worst.label().yellow(),
            worst.mean_composite
        )?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[StrategyResult],
) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[StrategyResult],
) -> Result<()> {
    writeln!(out, "# Clinsim Case Test Results\n")?;

    let total_runs = results.len();
    let passed_runs = results.iter().filter(|r| r.passed).count();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total runs**: {total_runs}")?;
    writeln!(out, "- **Passed**: {passed_runs}")?;
    writeln!(out, "- **Failed**: {}", total_runs - passed_runs)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    writeln!(
        out,
        "| Run | Status | Iterations | Mean composite | Grades | Reveal rate |"
    )?;
    writeln!(out, "| --- | --- | --- | --- | --- | --- |")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "| {} | {} | {}/{} | {:.1} | {} | {:.1}% |",
            result.label(),
            status,
            result.successful_iterations,
            result.iterations_run,
            result.mean_composite,
            grade_summary(result),
            result.reveal_rate
        )?;
    }

    let failing: Vec<&StrategyResult> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failing {
            writeln!(out, "### {}\n", result.label())?;
            for failure in &result.failures {
                writeln!(out, "- {failure}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}
