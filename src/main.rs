use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

mod config;
mod error;
mod lifecycle;
mod logging;
mod models;
mod report;
mod repository;
mod storage;
mod workflow;

use config::Config;
use models::{NewUser, Report, ReportDraft, ReportStatus, Role};
use storage::{FileStore, SafeStore};
use workflow::Workspace;

#[derive(Parser)]
#[command(name = "e-lapor")]
#[command(about = "School visit reporting for supervisors, department heads and administrators", long_about = None)]
struct Cli {
    /// Directory holding the stored JSON entries (overrides ELAPOR_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write seed departments and accounts to an empty data directory
    Init,
    /// Start a session
    Login { username: String, password: String },
    /// End the current session
    Logout,
    /// Show the logged-in account
    Whoami,
    /// List the reports visible to the current account
    Reports {
        /// Department id (administrators only)
        #[arg(long)]
        department: Option<String>,
    },
    /// Show one report
    Show { id: String },
    /// Submit a visit report (supervisors)
    Submit {
        #[arg(long)]
        department: String,
        #[arg(long)]
        school: String,
        #[arg(long, default_value = "SD")]
        level: String,
        #[arg(long)]
        district: String,
        /// Visit date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        visit_date: Option<NaiveDate>,
        #[arg(long)]
        findings: String,
        #[arg(long)]
        recommendation: String,
        /// Photo URL; repeat for several
        #[arg(long = "photo")]
        photos: Vec<String>,
    },
    /// Respond to a report (department heads)
    Respond {
        id: String,
        #[arg(long, value_parser = parse_status)]
        status: ReportStatus,
        /// Keeps the earlier feedback when omitted
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Delete a report (administrators)
    Delete { id: String },
    /// Manage accounts (administrators)
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage departments
    Departments {
        #[command(subcommand)]
        command: DepartmentCommands,
    },
    /// Write a markdown recap of the visible reports
    Recap {
        /// Visit month, YYYY-MM
        #[arg(long, value_parser = parse_month_arg)]
        month: Option<(i32, u32)>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<ReportStatus>,
        #[arg(long, default_value = "recap.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    List,
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        password: String,
        /// admin, supervisor or head
        #[arg(long, default_value = "supervisor")]
        role: String,
        /// Department id, required for department heads
        #[arg(long)]
        department: Option<String>,
    },
    Remove { id: String },
}

#[derive(Subcommand)]
enum DepartmentCommands {
    List,
    Add { name: String },
    Remove { id: String },
}

fn parse_status(value: &str) -> Result<ReportStatus, String> {
    ReportStatus::parse(value).ok_or_else(|| format!("unknown status {value}"))
}

fn parse_month_arg(value: &str) -> Result<(i32, u32), String> {
    report::parse_month(value).ok_or_else(|| format!("expected YYYY-MM, got {value}"))
}

fn parse_role(role: &str, department: Option<String>) -> anyhow::Result<Role> {
    match role.trim().to_ascii_lowercase().as_str() {
        "admin" => Ok(Role::Admin),
        "supervisor" | "pengawas" => Ok(Role::Supervisor),
        "head" | "bidang" | "kabid" => Ok(Role::DepartmentHead {
            department_id: department,
        }),
        other => anyhow::bail!("unknown role {other}"),
    }
}

fn print_report_line<S: storage::KeyValueStore>(ws: &Workspace<S>, report: &Report) {
    println!(
        "- {} {} ({}) on {} by {} [{}] {}",
        report.id,
        report.school_name,
        report.level,
        report.visit_date,
        report.author_name,
        ws.department_name(&report.department_id).unwrap_or("N/A"),
        report.status
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = Config::from_env().with_data_dir(cli.data_dir);

    let store = SafeStore::new(FileStore::new(&config.data_dir));
    let mut ws = Workspace::open(store).context("failed to load stored state")?;

    match cli.command {
        Commands::Init => {
            ws.persist_all()?;
            println!("Data ready in {}.", config.data_dir.display());
        }
        Commands::Login { username, password } => {
            tokio::time::sleep(config.login_latency()).await;
            let user = ws.login(&username, &password)?;
            println!("Logged in as {} ({}).", user.full_name, user.role.label());
        }
        Commands::Logout => {
            ws.logout()?;
            println!("Logged out.");
        }
        Commands::Whoami => match ws.current_user() {
            Some(user) => {
                println!("{} ({}, {})", user.full_name, user.username, user.role.label());
                if let Role::DepartmentHead {
                    department_id: Some(department_id),
                } = &user.role
                {
                    println!(
                        "Department: {}",
                        ws.department_name(department_id).unwrap_or(department_id)
                    );
                }
            }
            None => println!("Not logged in."),
        },
        Commands::Reports { department } => {
            let (reports, stats) = ws.dashboard(department.as_deref())?;
            println!(
                "Total {} | In progress {} | Resolved {}",
                stats.total, stats.pending, stats.resolved
            );
            if reports.is_empty() {
                println!("No reports yet.");
            }
            for report in reports.iter() {
                print_report_line(&ws, report);
            }
        }
        Commands::Show { id } => {
            let report = ws.open_report(&id)?;
            print_report_line(&ws, &report);
            println!("District: {}", report.district);
            println!("Findings: {}", report.findings);
            println!("Recommendation: {}", report.recommendation);
            for attachment in report.attachments.iter() {
                println!("Photo {}: {} bytes", attachment.id, attachment.url.len());
            }
            if let Some(feedback) = report.department_head_feedback.as_deref() {
                println!("Department feedback: {feedback}");
            }
            println!("Last updated {}.", report.updated_at.to_rfc3339());
        }
        Commands::Submit {
            department,
            school,
            level,
            district,
            visit_date,
            findings,
            recommendation,
            photos,
        } => {
            let draft = ReportDraft {
                department_id: department,
                school_name: school,
                level,
                district,
                visit_date: visit_date.unwrap_or_else(|| Utc::now().date_naive()),
                findings,
                recommendation,
                attachment_urls: photos,
            };
            tokio::time::sleep(config.submit_latency()).await;
            let report = ws.submit_report(draft)?;
            println!("Report {} submitted.", report.id);
        }
        Commands::Respond {
            id,
            status,
            feedback,
        } => {
            let report = ws.respond(&id, status, feedback.as_deref())?;
            println!("Report {} updated with status {}.", report.id, report.status);
        }
        Commands::Delete { id } => {
            ws.delete_report(&id)?;
            println!("Report {id} deleted.");
        }
        Commands::Users { command } => match command {
            UserCommands::List => {
                for user in ws.users()?.iter() {
                    let role = match &user.role {
                        Role::DepartmentHead {
                            department_id: Some(department_id),
                        } => ws.department_name(department_id).unwrap_or("BIDANG"),
                        role => role.label(),
                    };
                    println!("- {} {} ({}) {}", user.id, user.username, user.full_name, role);
                }
            }
            UserCommands::Add {
                username,
                full_name,
                password,
                role,
                department,
            } => {
                let role = parse_role(&role, department)?;
                let user = ws.add_user(NewUser {
                    username,
                    full_name,
                    password,
                    role,
                })?;
                println!("Account {} created for {}.", user.username, user.full_name);
            }
            UserCommands::Remove { id } => {
                ws.remove_user(&id)?;
                println!("User {id} removed.");
            }
        },
        Commands::Departments { command } => match command {
            DepartmentCommands::List => {
                for department in ws.departments()?.iter() {
                    println!("- {} {}", department.id, department.name);
                }
            }
            DepartmentCommands::Add { name } => {
                let department = ws.add_department(&name)?;
                println!("Department {} added as {}.", department.name, department.id);
            }
            DepartmentCommands::Remove { id } => {
                ws.remove_department(&id)?;
                println!("Department {id} removed.");
            }
        },
        Commands::Recap {
            month,
            department,
            status,
            out,
        } => {
            let filter = report::RecapFilter {
                month,
                department_id: department,
                status,
            };
            let reports = filter.apply(&ws.visible_reports(None)?);
            let scope = filter
                .department_id
                .as_deref()
                .and_then(|id| ws.department_name(id))
                .map(str::to_string);
            let recap = report::build_recap(scope.as_deref(), &reports, ws.departments()?);
            std::fs::write(&out, recap)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Recap written to {}.", out.display());
        }
    }

    Ok(())
}
