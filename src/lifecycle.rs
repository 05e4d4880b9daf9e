use chrono::Utc;

use crate::error::WorkflowError;
use crate::models::{Report, ReportStatus, Role, User};

/// Reports the viewer may see, in collection order.
///
/// `department_filter` only narrows the admin view; other roles are already
/// scoped by author or department.
pub fn visible_reports(
    viewer: &User,
    reports: &[Report],
    department_filter: Option<&str>,
) -> Vec<Report> {
    reports
        .iter()
        .filter(|report| can_view(viewer, report))
        .filter(|report| match (&viewer.role, department_filter) {
            (Role::Admin, Some(department_id)) => report.department_id == department_id,
            _ => true,
        })
        .cloned()
        .collect()
}

pub fn can_view(viewer: &User, report: &Report) -> bool {
    match &viewer.role {
        Role::Admin => true,
        Role::Supervisor => report.author_id == viewer.id,
        Role::DepartmentHead {
            department_id: Some(department_id),
        } => report.department_id == *department_id,
        Role::DepartmentHead {
            department_id: None,
        }
        | Role::Unknown { .. } => false,
    }
}

/// Department head response. Any status may be set directly; only
/// `Resolved` needs non-blank feedback.
pub fn apply_response(
    report: &Report,
    status: ReportStatus,
    feedback: &str,
) -> Result<Report, WorkflowError> {
    if status == ReportStatus::Resolved && feedback.trim().is_empty() {
        return Err(WorkflowError::FeedbackRequired);
    }

    Ok(Report {
        status,
        department_head_feedback: Some(feedback.to_string()),
        updated_at: Utc::now(),
        ..report.clone()
    })
}

pub fn mark_read_on_first_view(report: &Report, viewer: &User) -> Report {
    let is_department_head = matches!(viewer.role, Role::DepartmentHead { .. });
    if is_department_head && report.status == ReportStatus::Submitted {
        Report {
            status: ReportStatus::Read,
            updated_at: Utc::now(),
            ..report.clone()
        }
    } else {
        report.clone()
    }
}
