//! Formatted terminal output.
//!
//! Formatting lives here so fitting code never builds strings and output
//! changes stay local.

use crate::data::ValidationReport;
use crate::domain::{FitResult, RankBy};
use crate::report::{RankedModel, Report};

/// Full run summary: dataset line, ranking table, failures, best model.
pub fn format_run_summary(report: &Report) -> String {
    let mut out = String::new();
    let d = &report.dataset;

    out.push_str("=== passfit - module outcome model comparison ===\n");
    out.push_str(&format!(
        "Backend: {} | ranked by {}\n",
        report.model_backend.display_name(),
        rank_label(report.rank_by)
    ));
    out.push_str(&format!(
        "Data: raw {}x{} -> clean {}x{} -> processed {}x{} | train={} test={}\n",
        d.raw_shape[0],
        d.raw_shape[1],
        d.clean_shape[0],
        d.clean_shape[1],
        d.processed_shape[0],
        d.processed_shape[1],
        d.n_train,
        d.n_test,
    ));

    out.push('\n');
    out.push_str(&format_ranking(&report.models));

    if !report.failures.is_empty() {
        out.push_str("\nFailed models:\n");
        for f in &report.failures {
            out.push_str(&format!("- {}\n", f.error));
        }
    }

    if let Some(best) = report.best() {
        out.push_str(&format!("\nBest model: {} ({})\n", best.fit.model_id, best.fit.formula));
        if let Some(desc) = &best.fit.description {
            out.push_str(&format!("  {desc}\n"));
        }
        out.push_str(&format_coefficients(&best.fit));
    }

    out
}

/// Ranking table, one row per fitted model.
pub fn format_ranking(models: &[RankedModel]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>4} {:>3} {:<48} {:>8} {:>8} {:>6} {:>8} {:>10}\n",
            "rank", "id", "formula", "acc", "base", "auc", "logloss", "aic"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<3} {:-<48} {:-<8} {:-<8} {:-<6} {:-<8} {:-<10}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for m in models {
        let fit = &m.fit;
        out.push_str(
            format!(
                "{:>4} {:>3} {:<48} {:>8.4} {:>8.4} {:>6} {:>8.4} {:>10.2}\n",
                m.rank,
                fit.model_id,
                truncate(&fit.formula, 48),
                fit.test.accuracy,
                fit.test.baseline_accuracy,
                fit.test.auc.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string()),
                fit.test.log_loss,
                fit.quality.aic,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn format_coefficients(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("  {:<32} {:>12} {:>10} {:>8}\n", "term", "estimate", "std_err", "z"));
    for c in &fit.coefficients {
        out.push_str(
            format!(
                "  {:<32} {:>12.6} {:>10} {:>8}\n",
                truncate(&c.name, 32),
                c.estimate,
                c.std_error.map(|v| format!("{v:.6}")).unwrap_or_else(|| "-".to_string()),
                c.z.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string()),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!(
        "  n={} iterations={} logLik={:.3} pseudo-R2={:.4} BIC={:.2}\n",
        fit.quality.n_obs,
        fit.quality.iterations,
        fit.quality.log_likelihood,
        fit.quality.pseudo_r2,
        fit.quality.bic,
    ));
    out
}

/// One block per validated dataset, for `passfit validate`.
pub fn format_validation(reports: &[ValidationReport]) -> String {
    let mut out = String::new();
    for r in reports {
        let status = if r.is_valid() { "ok" } else { "FAILED" };
        out.push_str(&format!("{}: [{}, {}] {status}\n", r.dataset, r.shape[0], r.shape[1]));
        for m in &r.mismatches {
            out.push_str(&format!("  - {m}\n"));
        }
    }
    out
}

fn rank_label(rank_by: RankBy) -> &'static str {
    match rank_by {
        RankBy::Accuracy => "test accuracy (desc)",
        RankBy::Aic => "AIC (asc)",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
