//! The hospital database: doctors, appointments and the index between them.
//!
//! All operations take the same lock, so guard-then-act sequences such as
//! `delete_doctor` and `seed_if_empty` are atomic for every caller sharing
//! a `Database`.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info};

use super::collection::Collection;
use super::error::{Result, StoreError};
use super::seed::{sample_appointments, sample_doctors};
use crate::models::{Appointment, AppointmentPatch, Doctor, DoctorPatch};
use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub doctors: usize,
    pub appointments: usize,
}

struct Tables {
    doctors: Collection<Doctor>,
    appointments: Collection<Appointment>,
    // doctor id -> appointment ids
    by_doctor: HashMap<u64, BTreeSet<u64>>,
}

impl Tables {
    fn new(doctors: Collection<Doctor>, appointments: Collection<Appointment>) -> Self {
        let mut tables = Self {
            doctors,
            appointments,
            by_doctor: HashMap::new(),
        };
        tables.rebuild_index();
        tables
    }

    fn rebuild_index(&mut self) {
        self.by_doctor.clear();
        for appointment in self.appointments.iter() {
            self.by_doctor
                .entry(appointment.doctor_id)
                .or_default()
                .insert(appointment.id);
        }
    }

    fn index(&mut self, doctor_id: u64, appointment_id: u64) {
        self.by_doctor.entry(doctor_id).or_default().insert(appointment_id);
    }

    fn unindex(&mut self, doctor_id: u64, appointment_id: u64) {
        if let Some(ids) = self.by_doctor.get_mut(&doctor_id) {
            ids.remove(&appointment_id);
            if ids.is_empty() {
                self.by_doctor.remove(&doctor_id);
            }
        }
    }

    fn appointments_for(&self, doctor_id: u64) -> Vec<Appointment> {
        self.by_doctor
            .get(&doctor_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.appointments.get(*id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct Database {
    inner: Mutex<Tables>,
}

impl Database {
    /// Open the database stored in `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let doctors = Collection::open(dir)?;
        let appointments = Collection::open(dir)?;
        info!(path = %dir.display(), "Opened hospital database");
        Ok(Self {
            inner: Mutex::new(Tables::new(doctors, appointments)),
        })
    }

    /// A database that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Tables::new(Collection::in_memory(), Collection::in_memory())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let tables = self.lock()?;
        Ok(StoreCounts {
            doctors: tables.doctors.len(),
            appointments: tables.appointments.len(),
        })
    }

    // ===== Doctors =====

    pub fn list_doctors(&self) -> Result<Vec<Doctor>> {
        Ok(self.lock()?.doctors.list())
    }

    pub fn get_doctor(&self, id: u64) -> Result<Option<Doctor>> {
        Ok(self.lock()?.doctors.get(id).cloned())
    }

    pub fn add_doctor(&self, doctor: Doctor) -> Result<u64> {
        let id = self.lock()?.doctors.insert(doctor)?;
        debug!(id, "Added doctor");
        Ok(id)
    }

    pub fn update_doctor(&self, id: u64, patch: DoctorPatch) -> Result<Doctor> {
        self.lock()?.doctors.update_with(id, |doctor| patch.apply(doctor))
    }

    /// Delete a doctor that has no appointments.
    ///
    /// Returns `Ok(false)` if the doctor does not exist and
    /// `StoreError::DoctorHasAppointments` if any appointment references it.
    pub fn delete_doctor(&self, id: u64) -> Result<bool> {
        let mut tables = self.lock()?;
        let count = tables.by_doctor.get(&id).map_or(0, BTreeSet::len);
        if count > 0 {
            return Err(StoreError::DoctorHasAppointments { id, count });
        }
        let removed = tables.doctors.remove(id)?.is_some();
        if removed {
            debug!(id, "Deleted doctor");
        }
        Ok(removed)
    }

    // ===== Appointments =====

    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        Ok(self.lock()?.appointments.list())
    }

    pub fn get_appointment(&self, id: u64) -> Result<Option<Appointment>> {
        Ok(self.lock()?.appointments.get(id).cloned())
    }

    pub fn add_appointment(&self, appointment: Appointment) -> Result<u64> {
        let mut tables = self.lock()?;
        let doctor_id = appointment.doctor_id;
        let id = tables.appointments.insert(appointment)?;
        tables.index(doctor_id, id);
        debug!(id, doctor_id, "Added appointment");
        Ok(id)
    }

    pub fn update_appointment(&self, id: u64, patch: AppointmentPatch) -> Result<Appointment> {
        let mut tables = self.lock()?;
        let previous_doctor = tables
            .appointments
            .get(id)
            .map(|a| a.doctor_id)
            .ok_or(StoreError::NotFound {
                collection: "appointments",
                id,
            })?;

        let updated = tables
            .appointments
            .update_with(id, |appointment| patch.apply(appointment))?;
        if updated.doctor_id != previous_doctor {
            tables.unindex(previous_doctor, id);
            tables.index(updated.doctor_id, id);
        }
        Ok(updated)
    }

    /// Returns `Ok(false)` if no appointment has this id.
    pub fn delete_appointment(&self, id: u64) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables.appointments.remove(id)? {
            Some(removed) => {
                tables.unindex(removed.doctor_id, id);
                debug!(id, "Deleted appointment");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Appointments whose `doctor_id` equals `doctor_id`, via the doctor index.
    pub fn appointments_by_doctor(&self, doctor_id: u64) -> Result<Vec<Appointment>> {
        Ok(self.lock()?.appointments_for(doctor_id))
    }

    /// Case-insensitive match on patient name, reason or the assigned doctor's name.
    /// A blank term returns every appointment.
    pub fn search_appointments(&self, term: &str) -> Result<Vec<Appointment>> {
        let tables = self.lock()?;
        let term = term.trim();
        if term.is_empty() {
            return Ok(tables.appointments.list());
        }

        Ok(tables
            .appointments
            .iter()
            .filter(|a| {
                contains_ignore_case(&a.patient_name, term)
                    || contains_ignore_case(&a.reason, term)
                    || tables
                        .doctors
                        .get(a.doctor_id)
                        .is_some_and(|d| contains_ignore_case(&d.name, term))
            })
            .cloned()
            .collect())
    }

    /// Insert the sample doctors and appointments if there are no doctors yet.
    /// Returns whether anything was inserted.
    ///
    /// All or nothing: if the appointments cannot be written, the seeded
    /// doctors are removed again so a later call can retry.
    pub fn seed_if_empty(&self) -> Result<bool> {
        let mut tables = self.lock()?;
        if !tables.doctors.is_empty() {
            debug!(count = tables.doctors.len(), "Doctors already present, skipping seed");
            return Ok(false);
        }

        let previous_next_id = tables.doctors.next_id();
        let doctor_ids = tables.doctors.insert_many(sample_doctors())?;
        let appointment_ids = match tables
            .appointments
            .insert_many(sample_appointments(&doctor_ids))
        {
            Ok(ids) => ids,
            Err(e) => {
                if let Err(undo) = tables.doctors.rollback_insert(&doctor_ids, previous_next_id) {
                    error!(error = %undo, "Failed to roll back seeded doctors");
                }
                return Err(e);
            }
        };
        tables.rebuild_index();

        info!(
            doctors = doctor_ids.len(),
            appointments = appointment_ids.len(),
            "Seeded sample data"
        );
        Ok(true)
    }
}
