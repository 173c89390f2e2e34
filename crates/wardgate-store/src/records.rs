use rusqlite::{params, OptionalExtension, Row};

use crate::{RecordStore, StoreResult};

/// Patient registration as submitted.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub aadhaar: String,
    pub image_path: Option<String>,
    pub patient_code: String,
}

/// Stored patient row.
#[derive(Debug, Clone)]
pub struct Patient {
    pub id: i64,
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub aadhaar: String,
    pub image_path: Option<String>,
    pub patient_code: String,
    pub created_at: String,
}

impl Patient {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            fullname: row.get("fullname")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            aadhaar: row.get("aadhaar")?,
            image_path: row.get("image_path")?,
            patient_code: row.get("patient_code")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Visitor registration as submitted.
#[derive(Debug, Clone)]
pub struct NewVisitor {
    pub name: String,
    pub phone: String,
    pub patient_code: String,
    pub ward: String,
    pub image_path: String,
}

/// Stored visitor row.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub patient_code: String,
    pub ward: String,
    pub image_path: String,
    pub created_at: String,
}

impl Visitor {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            patient_code: row.get("patient_code")?,
            ward: row.get("ward")?,
            image_path: row.get("image_path")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl RecordStore {
    /// Insert a patient row, returning its id.
    pub async fn insert_patient(&self, patient: NewPatient) -> StoreResult<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO patients (fullname, email, phone, aadhaar, image_path, patient_code)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        patient.fullname,
                        patient.email,
                        patient.phone,
                        patient.aadhaar,
                        patient.image_path,
                        patient.patient_code,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Whether any patient carries exactly this code.
    pub async fn patient_exists(&self, code: &str) -> StoreResult<bool> {
        let code = code.to_owned();
        let exists = self
            .conn
            .call(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT 1 FROM patients WHERE patient_code = ?1 LIMIT 1",
                        params![code],
                        |_| Ok(()),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(exists)
    }

    /// Patients carrying this code, oldest first.
    ///
    /// Inspection helper for admin tooling and tests; no HTTP route exposes
    /// patient details.
    pub async fn patients_by_code(&self, code: &str) -> StoreResult<Vec<Patient>> {
        let code = code.to_owned();
        let patients = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM patients WHERE patient_code = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![code], Patient::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(patients)
    }

    /// Insert a visitor row, returning its id.
    pub async fn insert_visitor(&self, visitor: NewVisitor) -> StoreResult<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO visitors (name, phone, patient_code, ward, image_path)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        visitor.name,
                        visitor.phone,
                        visitor.patient_code,
                        visitor.ward,
                        visitor.image_path,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Visitors registered against a patient code, oldest first.
    ///
    /// Inspection helper for admin tooling and tests.
    pub async fn visitors_for_patient(&self, code: &str) -> StoreResult<Vec<Visitor>> {
        let code = code.to_owned();
        let visitors = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM visitors WHERE patient_code = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![code], Visitor::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(visitors)
    }

    /// Row counts as (patients, visitors).
    pub async fn counts(&self) -> StoreResult<(i64, i64)> {
        let counts = self
            .conn
            .call(|conn| {
                let patients: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
                let visitors: i64 = conn.query_row("SELECT COUNT(*) FROM visitors", [], |row| row.get(0))?;
                Ok((patients, visitors))
            })
            .await?;
        Ok(counts)
    }
}
