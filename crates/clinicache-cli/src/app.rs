//! Wires the core services together and runs one command.
//!
//! Every service is constructed once here and borrowed by the command
//! handlers; nothing is global.
//!
//! One process is one session: visited pages and search terms go to a
//! memory-backed `SessionService` and are only reported at debug level.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use clinicache_core::api::{offline_sample, DrugApiClient};
use clinicache_core::config::Config;
use clinicache_core::models::{
    Appointment, AppointmentPatch, AppointmentStatus, Doctor, DoctorPatch, DrugSearchResponse,
};
use clinicache_core::offline::{
    CacheStorage, HttpFetcher, Registration, Request, ServiceWorker, UpdateStatus,
    WorkerMessage, WorkerReply,
};
use clinicache_core::prefs::{
    FileBackend, MemoryBackend, PreferencesService, SessionService,
};
use clinicache_core::store::{Database, StoreError};
use clinicache_core::utils::truncate_string;

use crate::cli::{
    AppointmentCommand, CacheCommand, Command, DoctorCommand, DoctorField, PrefsCommand,
};

// ============================================================================
// Constants
// ============================================================================

/// Column widths for list output.
const NAME_WIDTH: usize = 24;
const REASON_WIDTH: usize = 32;

/// Maximum characters of a drug label section shown per result.
const DRUG_TEXT_WIDTH: usize = 160;

/// Where each service keeps its files.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub preferences: PathBuf,
}

impl AppPaths {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            data_dir: config.data_dir()?,
            cache_dir: config.cache_dir()?,
            preferences: Config::preferences_path()?,
        })
    }
}

pub struct App {
    config: Config,
    json: bool,
    db: Database,
    storage: Arc<CacheStorage>,
    preferences: PreferencesService<FileBackend>,
    session: SessionService<MemoryBackend>,
    drugs: DrugApiClient,
}

impl App {
    pub fn new(config: Config, paths: AppPaths, json: bool) -> Result<Self> {
        let db = Database::open(&paths.data_dir).with_context(|| {
            format!("Failed to open data store at {}", paths.data_dir.display())
        })?;
        let storage = CacheStorage::new(paths.cache_dir.clone()).with_context(|| {
            format!("Failed to open cache storage at {}", paths.cache_dir.display())
        })?;
        let drugs = DrugApiClient::with_base_url(&config.drug_api_base)
            .context("Failed to create drug API client")?;

        Ok(Self {
            config,
            json,
            db,
            storage: Arc::new(storage),
            preferences: PreferencesService::new(FileBackend::new(paths.preferences)),
            session: SessionService::new(MemoryBackend::new()),
            drugs,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        debug!(?command, "Running command");
        match command {
            Command::Seed => self.seed(),
            Command::Doctors { command } => {
                self.visit("/doctors");
                self.doctors(command)
            }
            Command::Appointments { command } => {
                self.visit("/appointments");
                self.appointments(command)
            }
            Command::Drugs(args) => {
                self.visit("/drugs");
                self.search_drugs(&args.query(), args.limit, !args.offline).await
            }
            Command::Cache { command } => self.cache(command).await,
            Command::Prefs { command } => self.prefs(command),
        }
    }

    /// Session bookkeeping; failures only matter for this process, so they are logged.
    fn visit(&self, page: &str) {
        if let Err(e) = self.session.update_last_visited_page(page) {
            warn!(page, error = %e, "Failed to record last visited page");
        }
        match self.session.record_page_visit(page) {
            Ok(count) => debug!(page, count, "Page visit recorded"),
            Err(e) => warn!(page, error = %e, "Failed to record page visit"),
        }
    }

    fn remember_search(&self, term: &str) {
        if let Err(e) = self.session.add_to_search_history(term) {
            warn!(term, error = %e, "Failed to record search");
        }
        debug!(recent = ?self.session.recent_searches(), "Search history");
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }

    // ===== Store =====

    fn seed(&self) -> Result<()> {
        let seeded = self.db.seed_if_empty().context("Failed to seed sample data")?;
        let counts = self.db.counts()?;
        if seeded {
            println!(
                "Seeded {} doctors and {} appointments",
                counts.doctors, counts.appointments
            );
        } else {
            println!("Store already has {} doctors, nothing seeded", counts.doctors);
        }
        Ok(())
    }

    fn doctors(&self, cmd: DoctorCommand) -> Result<()> {
        match cmd {
            DoctorCommand::List => {
                let doctors = self.db.list_doctors()?;
                self.emit(&doctors, || print_doctors(&doctors))
            }
            DoctorCommand::Show { id } => {
                let doctor = self
                    .db
                    .get_doctor(id)?
                    .with_context(|| format!("Doctor {} not found", id))?;
                let appointments = self.db.appointments_by_doctor(id)?;
                self.emit(&doctor, || {
                    print_doctor(&doctor);
                    println!("Appointments: {}", appointments.len());
                })
            }
            DoctorCommand::Add {
                name,
                specialty,
                email,
                phone,
            } => {
                let id = self.db.add_doctor(Doctor::new(name, specialty, email, phone))?;
                info!(id, "Doctor added");
                println!("Added doctor {}", id);
                Ok(())
            }
            DoctorCommand::Update { id, field, value } => {
                let patch = doctor_patch(field, value);
                let doctor = self.db.update_doctor(id, patch)?;
                self.emit(&doctor, || print_doctor(&doctor))
            }
            DoctorCommand::Delete { id } => match self.db.delete_doctor(id) {
                Ok(true) => {
                    println!("Deleted doctor {}", id);
                    Ok(())
                }
                Ok(false) => {
                    println!("Doctor {} does not exist", id);
                    Ok(())
                }
                Err(e @ StoreError::DoctorHasAppointments { .. }) => {
                    bail!("{}. Reassign or delete the appointments first.", e)
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    fn appointments(&self, cmd: AppointmentCommand) -> Result<()> {
        match cmd {
            AppointmentCommand::List => {
                let appointments = self.db.list_appointments()?;
                self.emit(&appointments, || self.print_appointments(&appointments))
            }
            AppointmentCommand::Show { id } => {
                let appointment = self
                    .db
                    .get_appointment(id)?
                    .with_context(|| format!("Appointment {} not found", id))?;
                self.emit(&appointment, || self.print_appointment(&appointment))
            }
            AppointmentCommand::ByDoctor { doctor_id } => {
                let appointments = self.db.appointments_by_doctor(doctor_id)?;
                self.emit(&appointments, || self.print_appointments(&appointments))
            }
            AppointmentCommand::Search { term } => {
                let term = term.join(" ");
                self.remember_search(&term);
                let appointments = self.db.search_appointments(&term)?;
                self.emit(&appointments, || self.print_appointments(&appointments))
            }
            AppointmentCommand::Add {
                patient,
                doctor_id,
                date,
                reason,
            } => {
                if self.db.get_doctor(doctor_id)?.is_none() {
                    warn!(doctor_id, "Appointment references an unknown doctor");
                }
                let id = self.db.add_appointment(Appointment::new(
                    patient,
                    doctor_id,
                    date,
                    reason,
                    AppointmentStatus::Pending,
                ))?;
                info!(id, "Appointment added");
                println!("Added appointment {}", id);
                Ok(())
            }
            AppointmentCommand::Status { id, status } => {
                let appointment = self
                    .db
                    .update_appointment(id, AppointmentPatch::status(status))?;
                println!("Appointment {} is now {}", appointment.id, appointment.status);
                Ok(())
            }
            AppointmentCommand::Delete { id } => {
                if self.db.delete_appointment(id)? {
                    println!("Deleted appointment {}", id);
                } else {
                    println!("Appointment {} does not exist", id);
                }
                Ok(())
            }
        }
    }

    fn doctor_name(&self, id: u64) -> String {
        match self.db.get_doctor(id) {
            Ok(Some(doctor)) => doctor.name,
            _ => format!("#{}", id),
        }
    }

    fn print_appointments(&self, appointments: &[Appointment]) {
        if appointments.is_empty() {
            println!("No appointments");
            return;
        }
        for a in appointments {
            println!(
                "{:>4}  {}  {:<w$}  {:<w$}  {:<10}  {}",
                a.id,
                a.formatted_date(),
                truncate_string(&a.patient_name, NAME_WIDTH),
                truncate_string(&self.doctor_name(a.doctor_id), NAME_WIDTH),
                a.status,
                truncate_string(&a.reason, REASON_WIDTH),
                w = NAME_WIDTH,
            );
        }
    }

    fn print_appointment(&self, a: &Appointment) {
        println!("Appointment {}", a.id);
        println!("  Patient: {}", a.patient_name);
        println!("  Doctor:  {}", self.doctor_name(a.doctor_id));
        println!("  Date:    {}", a.formatted_date());
        println!("  Reason:  {}", a.reason);
        println!("  Status:  {}", a.status);
    }

    // ===== Drugs =====

    async fn search_drugs(&self, query: &str, limit: u32, online: bool) -> Result<()> {
        self.remember_search(query);
        let response = match self.drugs.search_or_offline(query, limit, online).await {
            Ok(response) => response,
            Err(e) if e.is_offline() => {
                warn!(error = %e, "Drug API unreachable, using offline sample");
                eprintln!("Drug API unreachable, showing sample data");
                offline_sample()
            }
            Err(e) => return Err(e).context("Drug search failed"),
        };
        self.emit(&response, || print_drugs(&response))
    }

    // ===== Offline cache =====

    fn worker(&self) -> Result<ServiceWorker<HttpFetcher>> {
        let fetcher = HttpFetcher::new(&self.config.origin)
            .with_context(|| format!("Invalid origin: {}", self.config.origin))?;
        Ok(ServiceWorker::new(
            Arc::clone(&self.storage),
            fetcher,
            self.config.cache_version.as_str(),
        ))
    }

    async fn cache(&self, cmd: CacheCommand) -> Result<()> {
        match cmd {
            CacheCommand::Install => {
                let mut registration = Registration::new();
                let status = registration
                    .register(self.worker()?)
                    .await
                    .with_context(|| format!("Failed to precache from {}", self.config.origin))?;
                match status {
                    UpdateStatus::ContentCached => println!("Content cached for offline use"),
                    UpdateStatus::NewContentAvailable => println!("New content available"),
                }
                if let WorkerReply::Cached(urls) = registration.post_message(WorkerMessage::ListCached)? {
                    println!("{} ({} entries)", self.config.cache_version, urls.len());
                }
                registration.unregister().await;
                Ok(())
            }
            CacheCommand::Activate => {
                let mut worker = self.worker()?;
                let deleted = worker.activate().await?;
                if deleted.is_empty() {
                    println!("No stale cache buckets");
                } else {
                    for name in &deleted {
                        println!("Deleted {}", name);
                    }
                }
                Ok(())
            }
            CacheCommand::Fetch { path, navigate } => {
                let worker = self.worker()?;
                let request = if navigate {
                    Request::navigate(path)
                } else {
                    Request::get(path)
                };
                let response = worker.handle_fetch(&request).await;
                worker.settle().await;

                println!("{} {}", response.status, response.status_text);
                if let Some(content_type) = response.header("content-type") {
                    println!("Content-Type: {}", content_type);
                }
                println!("{} bytes", response.body.len());
                Ok(())
            }
            CacheCommand::List => {
                let buckets = self.storage.keys()?;
                if buckets.is_empty() {
                    println!("No cache buckets");
                }
                for name in buckets {
                    let marker = if name == self.config.cache_version { "*" } else { " " };
                    let urls = self.storage.open(&name)?.keys()?;
                    println!("{} {} ({} entries)", marker, name, urls.len());
                    for url in urls {
                        println!("    {}", url);
                    }
                }
                Ok(())
            }
            CacheCommand::Clear => {
                match self.worker()?.handle_message(WorkerMessage::ClearCache)? {
                    WorkerReply::Cleared(count) => println!("Removed {} cached entries", count),
                    other => debug!(?other, "Unexpected worker reply"),
                }
                Ok(())
            }
        }
    }

    // ===== Preferences =====

    fn prefs(&self, cmd: PrefsCommand) -> Result<()> {
        let preferences = match cmd {
            PrefsCommand::Show => self.preferences.get(),
            PrefsCommand::Set { key, value } => self
                .preferences
                .update(&key, &value)
                .context("Failed to save preferences")?,
            PrefsCommand::Reset => self
                .preferences
                .reset()
                .context("Failed to reset preferences")?,
        };
        self.emit(&preferences, || {
            println!("theme:         {}", preferences.theme);
            println!("fontSize:      {}", preferences.font_size);
            println!("notifications: {}", preferences.notifications);
            println!("language:      {}", preferences.language);
        })
    }
}

fn doctor_patch(field: DoctorField, value: String) -> DoctorPatch {
    let mut patch = DoctorPatch::default();
    match field {
        DoctorField::Name => patch.name = Some(value),
        DoctorField::Specialty => patch.specialty = Some(value),
        DoctorField::Email => patch.email = Some(value),
        DoctorField::Phone => patch.phone = Some(value),
    }
    patch
}

fn print_doctors(doctors: &[Doctor]) {
    if doctors.is_empty() {
        println!("No doctors");
        return;
    }
    for d in doctors {
        println!(
            "{:>4}  {:<w$}  {:<20}  {:<28}  {}",
            d.id,
            truncate_string(&d.name, NAME_WIDTH),
            truncate_string(&d.specialty, 20),
            truncate_string(&d.email, 28),
            d.formatted_phone(),
            w = NAME_WIDTH,
        );
    }
}

fn print_doctor(d: &Doctor) {
    println!("Doctor {}", d.id);
    println!("  Name:      {}", d.name);
    println!("  Specialty: {}", d.specialty);
    println!("  Email:     {}", d.email);
    println!("  Phone:     {}", d.formatted_phone());
}

fn print_drugs(response: &DrugSearchResponse) {
    if response.is_empty() {
        println!("No drugs found");
        return;
    }
    if let Some(disclaimer) = response.meta.as_ref().and_then(|m| m.disclaimer.as_deref()) {
        println!("{}\n", truncate_string(disclaimer, DRUG_TEXT_WIDTH));
    }
    for label in &response.results {
        println!("{} ({})", label.brand_name(), label.generic_name());
        println!("  Indications: {}", truncate_string(label.indications(), DRUG_TEXT_WIDTH));
        println!("  Dosage:      {}", truncate_string(label.dosage(), DRUG_TEXT_WIDTH));
        println!("  Warning:     {}", truncate_string(label.warning(), DRUG_TEXT_WIDTH));
        println!();
    }
}
