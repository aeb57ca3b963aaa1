use anyhow::{bail, Context};
use tracing::info;

use crate::error::{StoreError, SyncError};
use crate::models::Student;
use crate::sync::SyncEngine;

pub struct NewStudent<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub handle: &'a str,
}

/// Validates the handle against Codeforces and stores a new student seeded
/// with the current ratings. Statistics stay empty until the first sync.
pub async fn register(engine: &SyncEngine, new: NewStudent<'_>) -> anyhow::Result<Student> {
    let name = new.name.trim();
    let email = new.email.trim();
    let handle = new.handle.trim();
    if name.is_empty() || email.is_empty() || handle.is_empty() {
        bail!("name, email and handle are required");
    }

    if engine
        .store()
        .find_by_handle(handle)
        .await
        .map_err(|err| SyncError::persist(handle, err))?
        .is_some()
    {
        let duplicate = StoreError::DuplicateHandle(handle.to_string());
        return Err(SyncError::persist(handle, duplicate).into());
    }

    let profile = engine
        .client()
        .get_profile(handle)
        .await
        .map_err(|err| SyncError::from_client(handle, err))?;

    let mut student = Student::new(name, email, new.phone.map(str::trim), handle);
    student.current_rating = profile.rating.unwrap_or(0);
    student.max_rating = profile.max_rating.unwrap_or(0);
    student.last_synced = Some(engine.clock().now());

    engine
        .store()
        .insert(&student)
        .await
        .map_err(|err| SyncError::persist(handle, err))?;
    info!(handle = %handle, name = %name, "student registered");

    Ok(student)
}

/// Moves a student to a new handle, dropping statistics computed for the old
/// one, and syncs the new handle straight away.
pub async fn change_handle(engine: &SyncEngine, old: &str, new: &str) -> anyhow::Result<Student> {
    let new = new.trim();
    let mut student = engine
        .store()
        .find_by_handle(old)
        .await
        .map_err(|err| SyncError::persist(old, err))?
        .ok_or_else(|| SyncError::NotFound(old.to_string()))?;

    if new.is_empty() || new == old {
        return Ok(student);
    }

    if engine
        .store()
        .find_by_handle(new)
        .await
        .map_err(|err| SyncError::persist(new, err))?
        .is_some()
    {
        let duplicate = StoreError::DuplicateHandle(new.to_string());
        return Err(SyncError::persist(new, duplicate).into());
    }

    engine
        .client()
        .get_profile(new)
        .await
        .map_err(|err| SyncError::from_client(new, err))?;

    student.change_handle(new);
    engine
        .store()
        .save(&student)
        .await
        .map_err(|err| SyncError::persist(new, err))?;
    info!(old = %old, new = %new, "handle changed, cached statistics cleared");

    engine
        .sync(new)
        .await
        .with_context(|| format!("handle changed but first sync of {new} failed"))
}

/// Turns inactivity reminders on or off for one student. Re-enabling does
/// not reset the notified flag, so an ongoing episode stays notified.
pub async fn set_reminders(
    engine: &SyncEngine,
    handle: &str,
    enabled: bool,
) -> anyhow::Result<Student> {
    let mut student = engine
        .store()
        .find_by_handle(handle)
        .await
        .map_err(|err| SyncError::persist(handle, err))?
        .ok_or_else(|| SyncError::NotFound(handle.to_string()))?;

    if student.reminders_disabled == !enabled {
        return Ok(student);
    }

    student.reminders_disabled = !enabled;
    engine
        .store()
        .save(&student)
        .await
        .map_err(|err| SyncError::persist(handle, err))?;
    info!(handle = %handle, enabled, "reminder preference updated");

    Ok(student)
}
