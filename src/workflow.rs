use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::lifecycle;
use crate::models::{
    Attachment, DashboardStats, Department, NewUser, Report, ReportDraft, ReportStatus, Role,
    User,
};
use crate::report;
use crate::repository::Repository;
use crate::storage::KeyValueStore;

/// Application context: session, collections and the repository they are
/// mirrored into. Every successful mutation is persisted before returning.
pub struct Workspace<S> {
    repo: Repository<S>,
    current_user: Option<User>,
    departments: Vec<Department>,
    users: Vec<User>,
    reports: Vec<Report>,
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn required(value: &str, field: &'static str) -> Result<String, WorkflowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::MissingField(field));
    }
    Ok(value.to_string())
}

impl<S: KeyValueStore> Workspace<S> {
    pub fn open(store: S) -> Result<Self, WorkflowError> {
        let mut repo = Repository::new(store);
        let current_user = repo.load_current_user()?;
        let departments = repo.load_departments()?;
        let users = repo.load_users()?;
        let reports = repo.load_reports()?;

        Ok(Self {
            repo,
            current_user,
            departments,
            users,
            reports,
        })
    }

    /// Writes every collection, materialising seed data on a fresh store.
    pub fn persist_all(&mut self) -> Result<(), WorkflowError> {
        self.repo.save_current_user(self.current_user.as_ref())?;
        self.repo.save_departments(&self.departments)?;
        self.repo.save_users(&self.users)?;
        self.repo.save_reports(&self.reports)?;
        Ok(())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    fn viewer(&self) -> Result<&User, WorkflowError> {
        self.current_user.as_ref().ok_or(WorkflowError::NotLoggedIn)
    }

    fn require_admin(&self, action: &'static str) -> Result<&User, WorkflowError> {
        let viewer = self.viewer()?;
        match viewer.role {
            Role::Admin => Ok(viewer),
            _ => Err(WorkflowError::Forbidden {
                role: viewer.role.label(),
                action,
            }),
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<&User, WorkflowError> {
        let user = self
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username.trim()))
            .ok_or_else(|| WorkflowError::UnknownUser(username.to_string()))?;

        if user.password.as_deref() != Some(password) {
            return Err(WorkflowError::WrongPassword);
        }

        let user = user.clone();
        self.repo.save_current_user(Some(&user))?;
        info!(user_id = %user.id, "logged in as {}", user.username);
        Ok(&*self.current_user.insert(user))
    }

    pub fn logout(&mut self) -> Result<(), WorkflowError> {
        self.repo.save_current_user(None)?;
        if let Some(user) = self.current_user.take() {
            info!(user_id = %user.id, "logged out");
        }
        Ok(())
    }

    pub fn departments(&self) -> Result<&[Department], WorkflowError> {
        self.viewer()?;
        Ok(&self.departments)
    }

    pub fn department_name(&self, id: &str) -> Option<&str> {
        self.departments
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.as_str())
    }

    pub fn visible_reports(
        &self,
        department_filter: Option<&str>,
    ) -> Result<Vec<Report>, WorkflowError> {
        let viewer = self.viewer()?;
        Ok(lifecycle::visible_reports(
            viewer,
            &self.reports,
            department_filter,
        ))
    }

    pub fn dashboard(
        &self,
        department_filter: Option<&str>,
    ) -> Result<(Vec<Report>, DashboardStats), WorkflowError> {
        let reports = self.visible_reports(department_filter)?;
        let stats = report::dashboard_stats(&reports);
        Ok((reports, stats))
    }

    pub fn submit_report(&mut self, draft: ReportDraft) -> Result<Report, WorkflowError> {
        let author = self.viewer()?;
        if author.role != Role::Supervisor {
            return Err(WorkflowError::Forbidden {
                role: author.role.label(),
                action: "submit visit reports",
            });
        }
        if self.department_name(&draft.department_id).is_none() {
            return Err(WorkflowError::DepartmentNotFound(draft.department_id));
        }

        let now = Utc::now();
        let report = Report {
            id: new_id("LAP"),
            author_id: author.id.clone(),
            author_name: author.full_name.clone(),
            department_id: draft.department_id,
            school_name: required(&draft.school_name, "school name")?,
            level: required(&draft.level, "level")?,
            district: required(&draft.district, "district")?,
            visit_date: draft.visit_date,
            findings: required(&draft.findings, "findings")?,
            recommendation: required(&draft.recommendation, "recommendation")?,
            status: ReportStatus::Submitted,
            attachments: draft
                .attachment_urls
                .into_iter()
                .map(|url| Attachment {
                    id: Uuid::new_v4().simple().to_string(),
                    url,
                })
                .collect(),
            created_at: now,
            updated_at: now,
            department_head_feedback: None,
        };

        self.reports.insert(0, report.clone());
        self.repo.save_reports(&self.reports)?;
        info!(report_id = %report.id, department_id = %report.department_id, "report submitted");
        Ok(report)
    }

    fn visible_position(&self, id: &str) -> Result<usize, WorkflowError> {
        let viewer = self.viewer()?;
        self.reports
            .iter()
            .position(|r| r.id == id && lifecycle::can_view(viewer, r))
            .ok_or_else(|| WorkflowError::ReportNotFound(id.to_string()))
    }

    /// Opens a report for the viewer; a department head's first look marks it read.
    pub fn open_report(&mut self, id: &str) -> Result<Report, WorkflowError> {
        let index = self.visible_position(id)?;
        let viewer = self.viewer()?;
        let viewed = lifecycle::mark_read_on_first_view(&self.reports[index], viewer);

        if viewed != self.reports[index] {
            self.reports[index] = viewed.clone();
            self.repo.save_reports(&self.reports)?;
            info!(report_id = %viewed.id, "report marked as {}", viewed.status);
        }
        Ok(viewed)
    }

    /// Without new feedback text the report keeps its earlier feedback.
    pub fn respond(
        &mut self,
        id: &str,
        status: ReportStatus,
        feedback: Option<&str>,
    ) -> Result<Report, WorkflowError> {
        let viewer = self.viewer()?;
        if !matches!(viewer.role, Role::DepartmentHead { .. }) {
            return Err(WorkflowError::Forbidden {
                role: viewer.role.label(),
                action: "respond to reports",
            });
        }

        let index = self.visible_position(id)?;
        let current = &self.reports[index];
        let feedback = match feedback {
            Some(feedback) => feedback,
            None => current.department_head_feedback.as_deref().unwrap_or(""),
        };
        let updated = lifecycle::apply_response(current, status, feedback)?;
        self.reports[index] = updated.clone();
        self.repo.save_reports(&self.reports)?;
        info!(report_id = %updated.id, "report status set to {}", updated.status);
        Ok(updated)
    }

    pub fn delete_report(&mut self, id: &str) -> Result<(), WorkflowError> {
        self.require_admin("delete reports")?;
        let before = self.reports.len();
        self.reports.retain(|r| r.id != id);
        if self.reports.len() == before {
            return Err(WorkflowError::ReportNotFound(id.to_string()));
        }
        self.repo.save_reports(&self.reports)?;
        info!(report_id = %id, "report deleted");
        Ok(())
    }

    pub fn users(&self) -> Result<&[User], WorkflowError> {
        self.require_admin("list users")?;
        Ok(&self.users)
    }

    pub fn add_user(&mut self, new_user: NewUser) -> Result<User, WorkflowError> {
        self.require_admin("add users")?;

        let username = required(&new_user.username, "username")?.to_lowercase();
        let full_name = required(&new_user.full_name, "full name")?;
        if new_user.password.trim().is_empty() {
            return Err(WorkflowError::MissingField("password"));
        }
        if self
            .users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&username))
        {
            return Err(WorkflowError::DuplicateUsername(username));
        }
        if let Role::DepartmentHead { department_id } = &new_user.role {
            let department_id = department_id
                .as_deref()
                .ok_or(WorkflowError::MissingField("department"))?;
            if self.department_name(department_id).is_none() {
                return Err(WorkflowError::DepartmentNotFound(department_id.to_string()));
            }
        }

        let user = User {
            id: new_id("u"),
            username,
            full_name,
            password: Some(new_user.password),
            role: new_user.role,
        };
        self.users.push(user.clone());
        self.repo.save_users(&self.users)?;
        info!(user_id = %user.id, "user {} registered as {}", user.username, user.role.label());
        Ok(user)
    }

    pub fn remove_user(&mut self, id: &str) -> Result<(), WorkflowError> {
        let admin = self.require_admin("remove users")?;
        if admin.id == id {
            return Err(WorkflowError::CannotRemoveSelf);
        }

        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        if self.users.len() == before {
            return Err(WorkflowError::UserNotFound(id.to_string()));
        }
        self.repo.save_users(&self.users)?;
        info!(user_id = %id, "user removed");
        Ok(())
    }

    pub fn add_department(&mut self, name: &str) -> Result<Department, WorkflowError> {
        self.require_admin("manage departments")?;
        let department = Department {
            id: new_id("b"),
            name: required(name, "department name")?,
        };
        self.departments.push(department.clone());
        self.repo.save_departments(&self.departments)?;
        info!(department_id = %department.id, "department {} added", department.name);
        Ok(department)
    }

    /// Reports and accounts still pointing at the department are left as-is.
    pub fn remove_department(&mut self, id: &str) -> Result<(), WorkflowError> {
        self.require_admin("manage departments")?;
        let before = self.departments.len();
        self.departments.retain(|d| d.id != id);
        if self.departments.len() == before {
            return Err(WorkflowError::DepartmentNotFound(id.to_string()));
        }
        self.repo.save_departments(&self.departments)?;
        info!(department_id = %id, "department removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore, SafeStore};
    use chrono::NaiveDate;

    fn workspace() -> Workspace<MemoryStore> {
        Workspace::open(MemoryStore::new()).unwrap()
    }

    fn draft(department_id: &str) -> ReportDraft {
        ReportDraft {
            department_id: department_id.to_string(),
            school_name: " SMP Negeri 1 Magetan ".to_string(),
            level: "SMP".to_string(),
            district: "Magetan".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
            findings: "Toilet siswa rusak".to_string(),
            recommendation: "Perbaikan sanitasi".to_string(),
            attachment_urls: vec!["data:image/png;base64,AAAA".to_string()],
        }
    }

    fn submit_as(ws: &mut Workspace<MemoryStore>, username: &str, department_id: &str) -> Report {
        ws.login(username, if username == "ary" { "321" } else { "123" })
            .unwrap();
        ws.submit_report(draft(department_id)).unwrap()
    }

    #[test]
    fn login_matches_username_case_insensitively() {
        let mut ws = workspace();
        let user = ws.login("PENGAWAS1", "123").unwrap();
        assert_eq!(user.id, "u2");
        assert_eq!(ws.current_user().map(|u| u.id.as_str()), Some("u2"));

        assert!(matches!(
            ws.login("pengawas1", "999"),
            Err(WorkflowError::WrongPassword)
        ));
        assert!(matches!(
            ws.login("nobody", "123"),
            Err(WorkflowError::UnknownUser(_))
        ));
    }

    #[test]
    fn session_survives_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ws = Workspace::open(SafeStore::new(FileStore::new(dir.path()))).unwrap();
            ws.login("admin", "123").unwrap();
        }
        let mut ws = Workspace::open(SafeStore::new(FileStore::new(dir.path()))).unwrap();
        assert_eq!(ws.current_user().map(|u| u.id.as_str()), Some("u1"));

        ws.logout().unwrap();
        let ws = Workspace::open(SafeStore::new(FileStore::new(dir.path()))).unwrap();
        assert!(ws.current_user().is_none());
    }

    #[test]
    fn submissions_are_prepended_and_persisted() {
        let mut ws = workspace();
        let first = submit_as(&mut ws, "pengawas1", "b1");
        let second = submit_as(&mut ws, "pengawas1", "b3");

        assert_eq!(first.status, ReportStatus::Submitted);
        assert_eq!(first.school_name, "SMP Negeri 1 Magetan");
        assert_eq!(first.author_name, "Budi Santoso, M.Pd");
        assert_eq!(first.attachments.len(), 1);
        assert!(first.id.starts_with("LAP-"));

        let visible = ws.visible_reports(None).unwrap();
        assert_eq!(visible[0].id, second.id);
        assert_eq!(visible[1].id, first.id);

        let stored = ws.repo.load_reports().unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn only_supervisors_submit_to_known_departments() {
        let mut ws = workspace();
        ws.login("admin", "123").unwrap();
        assert!(matches!(
            ws.submit_report(draft("b1")),
            Err(WorkflowError::Forbidden { .. })
        ));

        ws.login("pengawas1", "123").unwrap();
        assert!(matches!(
            ws.submit_report(draft("b99")),
            Err(WorkflowError::DepartmentNotFound(_))
        ));

        let mut blank = draft("b1");
        blank.findings = "  ".to_string();
        assert!(matches!(
            ws.submit_report(blank),
            Err(WorkflowError::MissingField("findings"))
        ));
    }

    #[test]
    fn department_head_first_open_marks_read() {
        let mut ws = workspace();
        let report = submit_as(&mut ws, "pengawas1", "b1");

        ws.login("kabid_dikdas", "123").unwrap();
        let opened = ws.open_report(&report.id).unwrap();
        assert_eq!(opened.status, ReportStatus::Read);
        assert!(opened.updated_at >= report.updated_at);

        let again = ws.open_report(&report.id).unwrap();
        assert_eq!(again, opened);
        assert_eq!(ws.repo.load_reports().unwrap()[0].status, ReportStatus::Read);
    }

    #[test]
    fn reports_outside_the_viewers_scope_are_not_found() {
        let mut ws = workspace();
        let report = submit_as(&mut ws, "pengawas1", "b1");

        ws.login("kabid_ptk", "123").unwrap();
        assert!(matches!(
            ws.open_report(&report.id),
            Err(WorkflowError::ReportNotFound(_))
        ));

        ws.login("ary", "321").unwrap();
        assert!(ws.visible_reports(None).unwrap().is_empty());

        ws.login("admin", "123").unwrap();
        let opened = ws.open_report(&report.id).unwrap();
        assert_eq!(opened.status, ReportStatus::Submitted);
    }

    #[test]
    fn department_head_response_follows_feedback_rule() {
        let mut ws = workspace();
        let report = submit_as(&mut ws, "pengawas1", "b1");

        assert!(matches!(
            ws.respond(&report.id, ReportStatus::Acknowledged, None),
            Err(WorkflowError::Forbidden { .. })
        ));

        ws.login("kabid_dikdas", "123").unwrap();
        assert!(matches!(
            ws.respond(&report.id, ReportStatus::Resolved, Some(" ")),
            Err(WorkflowError::FeedbackRequired)
        ));
        assert_eq!(
            ws.repo.load_reports().unwrap()[0].status,
            ReportStatus::Submitted
        );

        let resolved = ws
            .respond(&report.id, ReportStatus::Resolved, Some("Sudah diperbaiki"))
            .unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        let (_, stats) = ws.dashboard(None).unwrap();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn responding_without_feedback_keeps_earlier_note() {
        let mut ws = workspace();
        let report = submit_as(&mut ws, "pengawas1", "b1");

        ws.login("kabid_dikdas", "123").unwrap();
        ws.respond(&report.id, ReportStatus::Acknowledged, Some("Jadwalkan rapat"))
            .unwrap();
        let kept = ws
            .respond(&report.id, ReportStatus::Resolved, None)
            .unwrap();
        assert_eq!(kept.status, ReportStatus::Resolved);
        assert_eq!(kept.department_head_feedback.as_deref(), Some("Jadwalkan rapat"));

        let cleared = ws
            .respond(&report.id, ReportStatus::Acknowledged, Some(""))
            .unwrap();
        assert_eq!(cleared.department_head_feedback.as_deref(), Some(""));
    }

    #[test]
    fn resolving_without_any_feedback_is_still_rejected() {
        let mut ws = workspace();
        let report = submit_as(&mut ws, "pengawas1", "b1");

        ws.login("kabid_dikdas", "123").unwrap();
        assert!(matches!(
            ws.respond(&report.id, ReportStatus::Resolved, None),
            Err(WorkflowError::FeedbackRequired)
        ));
    }

    #[test]
    fn unreadable_stored_report_does_not_wipe_the_others() {
        let mut store = MemoryStore::new();
        store
            .set(
                crate::repository::REPORTS_KEY,
                r#"[
                    {"id":"LAP-2","userId":"u2","userName":"Budi","bidangId":"b1","namaSekolah":"SD 1","jenjang":"SD","kecamatan":"Plaosan","tanggalKunjungan":"2026-02-02","uraianTemuan":"a","rekomendasi":"b","status":"Diproses","fotos":[],"createdAt":"2026-02-02T08:00:00Z","updatedAt":"2026-02-02T08:00:00Z"},
                    {"id":"LAP-1","userId":"u2","userName":"Budi","bidangId":"b1","namaSekolah":"SD 2","jenjang":"SD","kecamatan":"Plaosan","tanggalKunjungan":"2026-02-01","uraianTemuan":"a","rekomendasi":"b","status":"Terkirim","fotos":[],"createdAt":"2026-02-01T08:00:00Z","updatedAt":"2026-02-01T08:00:00Z"}
                ]"#,
            )
            .unwrap();

        let mut ws = Workspace::open(store).unwrap();
        submit_as(&mut ws, "pengawas1", "b1");
        let stored = ws.repo.load_reports().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].id, "LAP-1");
    }

    #[test]
    fn only_admin_deletes_reports() {
        let mut ws = workspace();
        let report = submit_as(&mut ws, "pengawas1", "b1");
        assert!(matches!(
            ws.delete_report(&report.id),
            Err(WorkflowError::Forbidden { .. })
        ));

        ws.login("admin", "123").unwrap();
        ws.delete_report(&report.id).unwrap();
        assert!(ws.visible_reports(None).unwrap().is_empty());
        assert!(matches!(
            ws.delete_report(&report.id),
            Err(WorkflowError::ReportNotFound(_))
        ));
        assert!(ws.repo.load_reports().unwrap().is_empty());
    }

    #[test]
    fn admin_filter_narrows_dashboard() {
        let mut ws = workspace();
        submit_as(&mut ws, "pengawas1", "b1");
        submit_as(&mut ws, "ary", "b3");

        ws.login("admin", "123").unwrap();
        let (all, _) = ws.dashboard(None).unwrap();
        assert_eq!(all.len(), 2);
        let (filtered, stats) = ws.dashboard(Some("b3")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(stats.total, 1);
        assert_eq!(filtered[0].author_id, "u5");
    }

    #[test]
    fn admin_registers_users_with_unique_usernames() {
        let mut ws = workspace();
        ws.login("admin", "123").unwrap();

        let user = ws
            .add_user(NewUser {
                username: "  Siti.Aminah ".to_string(),
                full_name: " Siti Aminah, S.Pd ".to_string(),
                password: "X7K2PQ".to_string(),
                role: Role::Supervisor,
            })
            .unwrap();
        assert_eq!(user.username, "siti.aminah");
        assert_eq!(user.full_name, "Siti Aminah, S.Pd");

        let duplicate = ws.add_user(NewUser {
            username: "SITI.AMINAH".to_string(),
            full_name: "Another".to_string(),
            password: "abc".to_string(),
            role: Role::Supervisor,
        });
        assert!(matches!(duplicate, Err(WorkflowError::DuplicateUsername(_))));

        let headless = ws.add_user(NewUser {
            username: "kabid_baru".to_string(),
            full_name: "Kabid Baru".to_string(),
            password: "abc".to_string(),
            role: Role::DepartmentHead {
                department_id: None,
            },
        });
        assert!(matches!(headless, Err(WorkflowError::MissingField("department"))));

        ws.login("siti.aminah", "X7K2PQ").unwrap();
        assert!(matches!(ws.users(), Err(WorkflowError::Forbidden { .. })));
    }

    #[test]
    fn admin_cannot_remove_self() {
        let mut ws = workspace();
        ws.login("admin", "123").unwrap();
        assert!(matches!(
            ws.remove_user("u1"),
            Err(WorkflowError::CannotRemoveSelf)
        ));

        ws.remove_user("u7").unwrap();
        assert_eq!(ws.users().unwrap().len(), 6);
        assert!(matches!(
            ws.remove_user("u7"),
            Err(WorkflowError::UserNotFound(_))
        ));
    }

    #[test]
    fn admin_manages_departments() {
        let mut ws = workspace();
        ws.login("admin", "123").unwrap();

        assert!(matches!(
            ws.add_department("   "),
            Err(WorkflowError::MissingField(_))
        ));
        let department = ws.add_department("Bidang SMP").unwrap();
        assert!(department.id.starts_with("b-"));
        assert_eq!(ws.departments().unwrap().len(), 5);

        ws.remove_department(&department.id).unwrap();
        assert_eq!(ws.departments().unwrap().len(), 4);
        assert_eq!(ws.repo.load_departments().unwrap().len(), 4);
    }

    #[test]
    fn logged_out_workspace_refuses_reads() {
        let ws = workspace();
        assert!(matches!(
            ws.visible_reports(None),
            Err(WorkflowError::NotLoggedIn)
        ));
        assert!(matches!(ws.departments(), Err(WorkflowError::NotLoggedIn)));
    }
}
