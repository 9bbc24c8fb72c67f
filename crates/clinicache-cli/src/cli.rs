//! Command-line interface definition.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use clinicache_core::api::DEFAULT_SEARCH_LIMIT;
use clinicache_core::models::AppointmentStatus;

/// Offline-first hospital doctors and appointments.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "clinicache", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print records as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert sample data into an empty store.
    Seed,

    /// Manage doctors.
    Doctors {
        #[command(subcommand)]
        command: DoctorCommand,
    },

    /// Manage appointments.
    Appointments {
        #[command(subcommand)]
        command: AppointmentCommand,
    },

    /// Search openFDA drug labels.
    Drugs(DrugArgs),

    /// Manage the offline cache of the web client.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Show or change user preferences.
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DoctorCommand {
    /// List every doctor.
    List,
    /// Show one doctor.
    Show { id: u64 },
    /// Add a doctor.
    Add {
        name: String,
        specialty: String,
        email: String,
        phone: String,
    },
    /// Change one field of a doctor.
    Update {
        id: u64,
        #[arg(value_enum)]
        field: DoctorField,
        value: String,
    },
    /// Delete a doctor without appointments.
    Delete { id: u64 },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorField {
    Name,
    Specialty,
    Email,
    Phone,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AppointmentCommand {
    /// List every appointment.
    List,
    /// Show one appointment.
    Show { id: u64 },
    /// Appointments assigned to a doctor.
    ByDoctor { doctor_id: u64 },
    /// Match patient, reason or doctor name; no term lists everything.
    Search { term: Vec<String> },
    /// Book an appointment.
    Add {
        patient: String,
        doctor_id: u64,
        /// RFC 3339, or "YYYY-MM-DD HH:MM" in UTC.
        #[arg(value_parser = parse_date)]
        date: DateTime<Utc>,
        reason: String,
    },
    /// Change an appointment's status (pending, confirmed, cancelled, completed).
    Status { id: u64, status: AppointmentStatus },
    /// Delete an appointment.
    Delete { id: u64 },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DrugArgs {
    /// Search terms.
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Use the built-in sample instead of the network.
    #[arg(long)]
    pub offline: bool,

    /// Maximum number of labels.
    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: u32,
}

impl DrugArgs {
    pub fn query(&self) -> String {
        self.query.join(" ")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CacheCommand {
    /// Precache the app shell and activate it.
    Install,
    /// Purge cache buckets of other versions.
    Activate,
    /// Fetch a path through the cache.
    Fetch {
        path: String,
        /// Treat the request as a page navigation.
        #[arg(long)]
        navigate: bool,
    },
    /// List buckets and cached URLs.
    List,
    /// Empty the current bucket.
    Clear,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum PrefsCommand {
    Show,
    /// Set theme, fontSize, notifications or language.
    Set { key: String, value: String },
    Reset,
}

/// Parse an RFC 3339 timestamp, or a naive date/time taken as UTC.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Ok(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("invalid date {:?}, expected RFC 3339 or YYYY-MM-DD HH:MM", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("clinicache").chain(args.iter().copied()))
    }

    #[test]
    fn test_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_json_flag_anywhere() {
        let cli = parse(&["doctors", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert_eq!(
            cli.command,
            Command::Doctors {
                command: DoctorCommand::List
            }
        );
        assert!(parse(&["--json", "seed"]).unwrap().json);
    }

    #[test]
    fn test_doctor_commands() {
        assert_eq!(
            parse(&["doctors", "add", "Dr. House", "Diagnóstico", "house@example.com", "555-0100"])
                .unwrap()
                .command,
            Command::Doctors {
                command: DoctorCommand::Add {
                    name: "Dr. House".to_string(),
                    specialty: "Diagnóstico".to_string(),
                    email: "house@example.com".to_string(),
                    phone: "555-0100".to_string(),
                }
            }
        );
        assert_eq!(
            parse(&["doctors", "update", "2", "phone", "5559999"]).unwrap().command,
            Command::Doctors {
                command: DoctorCommand::Update {
                    id: 2,
                    field: DoctorField::Phone,
                    value: "5559999".to_string(),
                }
            }
        );
        assert!(parse(&["doctors", "update", "2", "salary", "1"]).is_err());
        assert!(parse(&["doctors", "delete", "three"]).is_err());
        assert!(parse(&["doctors", "add", "only-a-name"]).is_err());
    }

    #[test]
    fn test_appointment_commands() {
        assert_eq!(
            parse(&["appointments", "add", "Juanín", "2", "2025-03-11 14:30", "Dolor de cabeza"])
                .unwrap()
                .command,
            Command::Appointments {
                command: AppointmentCommand::Add {
                    patient: "Juanín".to_string(),
                    doctor_id: 2,
                    date: Utc.with_ymd_and_hms(2025, 3, 11, 14, 30, 0).unwrap(),
                    reason: "Dolor de cabeza".to_string(),
                }
            }
        );
        assert_eq!(
            parse(&["appointments", "status", "1", "confirmada"]).unwrap().command,
            Command::Appointments {
                command: AppointmentCommand::Status {
                    id: 1,
                    status: AppointmentStatus::Confirmed,
                }
            }
        );
        assert_eq!(
            parse(&["appointments", "by-doctor", "4"]).unwrap().command,
            Command::Appointments {
                command: AppointmentCommand::ByDoctor { doctor_id: 4 }
            }
        );
        assert_eq!(
            parse(&["appointments", "search", "dolor", "de"]).unwrap().command,
            Command::Appointments {
                command: AppointmentCommand::Search {
                    term: vec!["dolor".to_string(), "de".to_string()]
                }
            }
        );
        assert!(parse(&["appointments", "status", "1", "lost"]).is_err());
        assert!(parse(&["appointments", "add", "Tulio", "1", "10/03/2025", "Control"]).is_err());
    }

    #[test]
    fn test_drugs_flags() {
        let cli = parse(&["drugs", "--offline", "ibuprofeno", "--limit", "3"]).unwrap();
        let Command::Drugs(args) = cli.command else {
            panic!("expected drugs command");
        };
        assert_eq!(args.query(), "ibuprofeno");
        assert!(args.offline);
        assert_eq!(args.limit, 3);

        let Command::Drugs(args) = parse(&["drugs", "acido", "folico"]).unwrap().command else {
            panic!("expected drugs command");
        };
        assert_eq!(args.query(), "acido folico");
        assert_eq!(args.limit, DEFAULT_SEARCH_LIMIT);

        assert!(parse(&["drugs"]).is_err());
        assert!(parse(&["drugs", "aspirin", "--limit"]).is_err());
    }

    #[test]
    fn test_cache_fetch_navigate() {
        assert_eq!(
            parse(&["cache", "fetch", "--navigate", "/citas"]).unwrap().command,
            Command::Cache {
                command: CacheCommand::Fetch {
                    path: "/citas".to_string(),
                    navigate: true,
                }
            }
        );
        assert_eq!(
            parse(&["cache", "fetch", "/manifest.json"]).unwrap().command,
            Command::Cache {
                command: CacheCommand::Fetch {
                    path: "/manifest.json".to_string(),
                    navigate: false,
                }
            }
        );
    }

    #[test]
    fn test_unknown_or_missing_command() {
        assert!(parse(&["billing"]).is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        assert_eq!(parse_date("2025-03-10T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_date("2025-03-10T07:00:00-03:00").unwrap(), expected);
        assert_eq!(parse_date("2025-03-10 10:00").unwrap(), expected);
        assert_eq!(
            parse_date("2025-03-10").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()
        );
        assert!(parse_date("10/03/2025").is_err());
    }
}
