use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::{Department, Report, Role, User};
use crate::storage::KeyValueStore;

pub const CURRENT_USER_KEY: &str = "currentUser";
pub const DEPARTMENTS_KEY: &str = "bidang";
pub const USERS_KEY: &str = "users";
pub const REPORTS_KEY: &str = "laporan";

/// Typed view over the four persisted entries.
pub struct Repository<S> {
    store: S,
}

impl<S: KeyValueStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load_current_user(&mut self) -> Result<Option<User>, StorageError> {
        self.load_or(CURRENT_USER_KEY, || None)
    }

    pub fn save_current_user(&mut self, user: Option<&User>) -> Result<(), StorageError> {
        match user {
            Some(user) => self.save(CURRENT_USER_KEY, user),
            None => self.store.remove(CURRENT_USER_KEY),
        }
    }

    pub fn load_departments(&mut self) -> Result<Vec<Department>, StorageError> {
        self.load_collection(DEPARTMENTS_KEY, default_departments)
    }

    pub fn save_departments(&mut self, departments: &[Department]) -> Result<(), StorageError> {
        self.save(DEPARTMENTS_KEY, departments)
    }

    pub fn load_users(&mut self) -> Result<Vec<User>, StorageError> {
        self.load_collection(USERS_KEY, default_users)
    }

    pub fn save_users(&mut self, users: &[User]) -> Result<(), StorageError> {
        self.save(USERS_KEY, users)
    }

    pub fn load_reports(&mut self) -> Result<Vec<Report>, StorageError> {
        self.load_collection(REPORTS_KEY, Vec::new)
    }

    pub fn save_reports(&mut self, reports: &[Report]) -> Result<(), StorageError> {
        self.save(REPORTS_KEY, reports)
    }

    /// Missing or malformed entries resolve to `default`.
    fn load_or<T, F>(&mut self, key: &str, default: F) -> Result<T, StorageError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let Some(raw) = self.store.get(key)? else {
            debug!("no stored {key}, using defaults");
            return Ok(default());
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!("stored {key} is malformed, using defaults: {err}");
                Ok(default())
            }
        }
    }

    /// Like `load_or`, but a well-formed list keeps every record that still
    /// parses; unreadable records are skipped with a warning.
    fn load_collection<T, F>(&mut self, key: &str, default: F) -> Result<Vec<T>, StorageError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        let Some(raw) = self.store.get(key)? else {
            debug!("no stored {key}, using defaults");
            return Ok(default());
        };

        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("stored {key} is malformed, using defaults: {err}");
                return Ok(default());
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let id = entry
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<no id>")
                .to_string();
            match serde_json::from_value(entry) {
                Ok(record) => records.push(record),
                Err(err) => warn!("skipping unreadable {key} record {index} (id {id}): {err}"),
            }
        }
        Ok(records)
    }

    fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &raw)
    }
}

pub fn default_departments() -> Vec<Department> {
    [
        ("b1", "Bidang Dikdas"),
        ("b3", "Bidang PTK (Pendidik & Tenaga Kependidikan)"),
        ("b4", "Bidang PAUD dan PNF"),
        ("b5", "Bidang Umum dan Kesekretariatan"),
    ]
    .into_iter()
    .map(|(id, name)| Department {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

pub fn default_users() -> Vec<User> {
    let head = |department_id: &str| Role::DepartmentHead {
        department_id: Some(department_id.to_string()),
    };

    let users = vec![
        ("u1", "admin", "Administrator Dinas", Role::Admin, "123"),
        ("u2", "pengawas1", "Budi Santoso, M.Pd", Role::Supervisor, "123"),
        ("u3", "kabid_dikdas", "Irawan, M.Pd (Kabid Dikdas)", head("b1"), "123"),
        (
            "u4",
            "kabid_ptk",
            "Diantina Wiwied Pribadi, S.Sos, M.Si (Kabid PTK)",
            head("b3"),
            "123",
        ),
        ("u5", "ary", "ARY WAHYU K", Role::Supervisor, "321"),
        ("u6", "kabid_paud", "Hj. Ratna Sari (Kabid PAUD PNF)", head("b4"), "123"),
        ("u7", "darwati", "Darwati", Role::Supervisor, "234"),
    ];

    users
        .into_iter()
        .map(|(id, username, full_name, role, password)| User {
            id: id.to_string(),
            username: username.to_string(),
            full_name: full_name.to_string(),
            password: Some(password.to_string()),
            role,
        })
        .collect()
}
