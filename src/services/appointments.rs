use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;

use crate::models::SlotRow;

const SLOT_COLUMNS: [&str; 7] = [
    "appointment_id",
    "patient_name",
    "doctor_name",
    "speciality",
    "date",
    "time_slot",
    "status",
];

// Appointment slots backed by one CSV file. Columns the clinic added by
// hand are preserved on rewrite; the canonical seven are the contract.
pub struct SlotStore {
    path: PathBuf,
    lock: Mutex<()>,
}

struct SlotTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SlotTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column(name).and_then(|c| row.get(c)).map(String::as_str)
    }

    fn slot_row(&self, row: &[String]) -> SlotRow {
        let get = |name: &str| self.cell(row, name).unwrap_or_default().to_string();
        SlotRow {
            appointment_id: get("appointment_id"),
            patient_name: get("patient_name"),
            doctor_name: get("doctor_name"),
            speciality: get("speciality"),
            date: get("date"),
            time_slot: get("time_slot"),
            status: get("status"),
        }
    }
}

impl SlotStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn load_table(&self) -> anyhow::Result<SlotTable> {
        if !self.path.exists() {
            let table = SlotTable {
                headers: SLOT_COLUMNS.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            };
            self.save_table(&table)?;
            return Ok(table);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open slot table: {}", self.path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read slot table header: {}", self.path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| {
                format!("failed to read slot table row: {}", self.path.display())
            })?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(SlotTable { headers, rows })
    }

    fn save_table(&self, table: &SlotTable) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory: {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("failed to write slot table: {}", self.path.display()))?;
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    // A filter naming a column the table lacks is skipped, not an error.
    pub fn list_available(
        &self,
        speciality: Option<&str>,
        date: Option<&str>,
    ) -> anyhow::Result<Vec<SlotRow>> {
        let _guard = self.guard();
        let table = self.load_table()?;
        if table.rows.is_empty() {
            return Ok(Vec::new());
        }
        let Some(status_col) = table.column("status") else {
            return Ok(Vec::new());
        };
        let speciality_col = table.column("speciality");
        let date_col = table.column("date");

        Ok(table
            .rows
            .iter()
            .filter(|row| {
                let available = row
                    .get(status_col)
                    .is_some_and(|s| s.to_lowercase() == "available");
                let speciality_ok = match (speciality, speciality_col) {
                    (Some(want), Some(col)) => row
                        .get(col)
                        .is_some_and(|s| s.to_lowercase() == want.to_lowercase()),
                    _ => true,
                };
                let date_ok = match (date, date_col) {
                    (Some(want), Some(col)) => row.get(col).map(String::as_str) == Some(want),
                    _ => true,
                };
                available && speciality_ok && date_ok
            })
            .map(|row| table.slot_row(row))
            .collect())
    }

    // First available slot for the speciality, earliest (date, time_slot)
    // first, optionally pinned to an exact date. Unbookable situations
    // come back as explanatory strings, not errors.
    pub fn book(
        &self,
        patient_name: &str,
        reason: &str,
        speciality: &str,
        preferred_date: Option<&str>,
    ) -> anyhow::Result<String> {
        let _guard = self.guard();
        let mut table = self.load_table()?;
        let file = self.file_name();

        if table.rows.is_empty() {
            return Ok(format!(
                "No appointment data found in {file}. Please add some rows first."
            ));
        }

        let (Some(status_col), Some(speciality_col)) =
            (table.column("status"), table.column("speciality"))
        else {
            return Ok(format!(
                "{file} is missing required columns: 'status' and/or 'speciality'. \
                 Please include them and try again."
            ));
        };
        let date_col = table.column("date");
        let time_col = table.column("time_slot");

        let mut matching: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let available = row
                    .get(status_col)
                    .is_some_and(|s| s.to_lowercase() == "available");
                let speciality_ok = row
                    .get(speciality_col)
                    .is_some_and(|s| s.to_lowercase() == speciality.to_lowercase());
                let date_ok = match (preferred_date, date_col) {
                    (Some(want), Some(col)) => row.get(col).map(String::as_str) == Some(want),
                    _ => true,
                };
                available && speciality_ok && date_ok
            })
            .map(|(i, _)| i)
            .collect();

        if matching.is_empty() {
            return Ok(format!(
                "No available slots found for speciality '{speciality}' on {}.",
                preferred_date.unwrap_or("any date")
            ));
        }

        let sort_key = |i: usize| {
            let row = &table.rows[i];
            let cell = |col: Option<usize>| {
                col.and_then(|c| row.get(c)).cloned().unwrap_or_default()
            };
            (cell(date_col), cell(time_col))
        };
        matching.sort_by_key(|&i| sort_key(i));
        let target = matching[0];

        if let Some(name_col) = table.column("patient_name") {
            table.rows[target][name_col] = patient_name.to_string();
        }
        table.rows[target][status_col] = "booked".to_string();
        self.save_table(&table)?;

        let row = &table.rows[target];
        let field = |name: &str| table.cell(row, name).unwrap_or("N/A").to_string();
        Ok(format!(
            "✅ Appointment booked!\n\
             Patient: {patient_name}\n\
             Doctor: {} ({})\n\
             Date: {}\n\
             Time: {}\n\
             Reason: {reason}",
            field("doctor_name"),
            field("speciality"),
            field("date"),
            field("time_slot"),
        ))
    }
}
