use std::fmt::Write;

use chrono::Datelike;

use crate::models::{DashboardStats, Department, Report, ReportStatus};

pub fn dashboard_stats(reports: &[Report]) -> DashboardStats {
    DashboardStats {
        total: reports.len(),
        pending: reports.iter().filter(|r| r.status.is_pending()).count(),
        resolved: reports
            .iter()
            .filter(|r| r.status == ReportStatus::Resolved)
            .count(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecapFilter {
    /// `(year, month)` of the visit date.
    pub month: Option<(i32, u32)>,
    pub department_id: Option<String>,
    pub status: Option<ReportStatus>,
}

impl RecapFilter {
    pub fn matches(&self, report: &Report) -> bool {
        if let Some((year, month)) = self.month {
            if report.visit_date.year() != year || report.visit_date.month() != month {
                return false;
            }
        }
        if let Some(department_id) = &self.department_id {
            if &report.department_id != department_id {
                return false;
            }
        }
        self.status.map_or(true, |status| report.status == status)
    }

    pub fn apply(&self, reports: &[Report]) -> Vec<Report> {
        reports.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Parses `YYYY-MM`.
pub fn parse_month(value: &str) -> Option<(i32, u32)> {
    let (year, month) = value.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn department_name<'a>(departments: &'a [Department], id: &'a str) -> &'a str {
    departments
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.name.as_str())
        .unwrap_or("N/A")
}

pub fn build_recap(scope: Option<&str>, reports: &[Report], departments: &[Department]) -> String {
    let stats = dashboard_stats(reports);
    let mut output = String::new();

    let _ = writeln!(output, "# School Visit Report Recap");
    let _ = writeln!(output, "Generated for {}", scope.unwrap_or("all reports"));
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Total {} | In progress {} | Resolved {}",
        stats.total, stats.pending, stats.resolved
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if reports.is_empty() {
        let _ = writeln!(output, "No reports recorded for this selection.");
    } else {
        for status in ReportStatus::ALL {
            let count = reports.iter().filter(|r| r.status == status).count();
            if count > 0 {
                let _ = writeln!(output, "- {}: {} reports", status, count);
            }
        }
    }

    let mut per_department: Vec<(&str, usize)> = Vec::new();
    for report in reports {
        match per_department
            .iter_mut()
            .find(|(id, _)| *id == report.department_id)
        {
            Some(entry) => entry.1 += 1,
            None => per_department.push((report.department_id.as_str(), 1)),
        }
    }
    per_department.sort_by(|a, b| b.1.cmp(&a.1));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reports per Department");

    if per_department.is_empty() {
        let _ = writeln!(output, "No reports recorded for this selection.");
    } else {
        for (department_id, count) in per_department {
            let _ = writeln!(
                output,
                "- {}: {} reports",
                department_name(departments, department_id),
                count
            );
        }
    }

    let mut recent = reports.to_vec();
    recent.sort_by(|a, b| b.visit_date.cmp(&a.visit_date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Visits");

    if recent.is_empty() {
        let _ = writeln!(output, "No reports recorded for this selection.");
    } else {
        for report in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) on {} by {} [{}]: {}",
                report.school_name,
                report.level,
                report.district,
                report.visit_date,
                report.author_name,
                report.status,
                report.findings
            );
            if let Some(feedback) = report
                .department_head_feedback
                .as_deref()
                .filter(|f| !f.trim().is_empty())
            {
                let _ = writeln!(output, "  - Feedback: {}", feedback);
            }
        }
    }

    output
}
