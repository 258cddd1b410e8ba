//! Medicine definitions, hardware-slot exclusivity, and stock tracking.
//!
//! A medicine is a prescribed drug with an ordered list of daily times and a
//! dispenser slot. At most one *active* medicine may occupy a given
//! (user, slot) pair. Medicines are never hard-deleted; deactivating one
//! clears the active flag and leaves historical dose logs untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::storage::Storage;
use crate::types::TimeOfDay;

/// How often a medicine is taken. Informational; the concrete schedule is
/// driven by the `times` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Once per day.
    #[default]
    Daily,
    /// Twice per day.
    TwiceDaily,
    /// Three times per day.
    ThriceDaily,
    /// Four times per day.
    FourTimesDaily,
    /// Taken on demand; still scheduled for reminders.
    AsNeeded,
    /// Anything else.
    Custom,
}

/// Coarse medicine category used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MedicineCategory {
    /// Painkillers.
    PainRelief,
    /// Antibiotics.
    Antibiotic,
    /// Vitamins.
    Vitamin,
    /// Dietary supplements.
    Supplement,
    /// Long-running chronic-disease medication.
    ChronicDisease,
    /// Everything else.
    #[default]
    Other,
}

/// A prescribed medicine definition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Medicine {
    /// Unique id.
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// Medicine name.
    #[schema(example = "Aspirin")]
    pub name: String,

    /// Dosage description.
    #[schema(example = "100mg")]
    pub dosage: String,

    /// Daily times, 24-hour `HH:MM`.
    #[schema(value_type = Vec<String>, example = json!(["08:00", "20:00"]))]
    pub times: Vec<TimeOfDay>,

    /// Frequency category.
    pub frequency: Frequency,

    /// Dispenser slot identifier.
    #[schema(example = "3")]
    pub slot: String,

    /// Total prescribed quantity.
    pub quantity: u32,

    /// Doses remaining in the dispenser. Never negative.
    pub remaining: u32,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Known side effects.
    #[serde(default)]
    pub side_effects: String,

    /// Intake instructions.
    #[serde(default)]
    pub instructions: String,

    /// Prescribing doctor.
    #[serde(default)]
    pub prescribed_by: String,

    /// Start of the validity window.
    pub start_date: DateTime<Utc>,

    /// Optional end of the validity window; no doses are scheduled past it.
    pub end_date: Option<DateTime<Utc>>,

    /// Category tag.
    pub category: MedicineCategory,

    /// Active flag; cleared on soft delete.
    pub is_active: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Whether the remaining count is at or below `threshold`.
    #[must_use]
    pub const fn is_low_stock(&self, threshold: u32) -> bool {
        self.remaining <= threshold
    }

    /// Decrement the remaining count by one, floored at zero.
    ///
    /// Returns `true` when the counter actually moved, `false` when it was
    /// already zero (the caller decides whether to surface that).
    pub fn decrement_remaining(&mut self) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }
}

/// Payload for registering a medicine.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewMedicine {
    /// Medicine name.
    #[schema(example = "Aspirin")]
    pub name: String,

    /// Dosage description.
    #[schema(example = "100mg")]
    pub dosage: String,

    /// Daily times, 24-hour `HH:MM`. At least one required.
    #[schema(value_type = Vec<String>, example = json!(["08:00", "20:00"]))]
    pub times: Vec<TimeOfDay>,

    /// Frequency category.
    #[serde(default)]
    pub frequency: Frequency,

    /// Dispenser slot identifier.
    #[schema(example = "3")]
    pub slot: String,

    /// Total prescribed quantity. Must be positive.
    pub quantity: u32,

    /// Doses currently loaded; defaults to `quantity`.
    #[serde(default)]
    pub remaining: Option<u32>,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Known side effects.
    #[serde(default)]
    pub side_effects: String,

    /// Intake instructions.
    #[serde(default)]
    pub instructions: String,

    /// Prescribing doctor.
    #[serde(default)]
    pub prescribed_by: String,

    /// Start of the validity window; defaults to now.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    /// Optional end of the validity window.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    /// Category tag.
    #[serde(default)]
    pub category: MedicineCategory,
}

/// Partial update for a medicine. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MedicinePatch {
    /// New name.
    pub name: Option<String>,
    /// New dosage.
    pub dosage: Option<String>,
    /// New daily times.
    #[schema(value_type = Option<Vec<String>>)]
    pub times: Option<Vec<TimeOfDay>>,
    /// New frequency.
    pub frequency: Option<Frequency>,
    /// New slot; re-validated for exclusivity.
    pub slot: Option<String>,
    /// New total quantity.
    pub quantity: Option<u32>,
    /// New remaining count (e.g., after a refill).
    pub remaining: Option<u32>,
    /// New description.
    pub description: Option<String>,
    /// New side effects.
    pub side_effects: Option<String>,
    /// New instructions.
    pub instructions: Option<String>,
    /// New prescriber.
    pub prescribed_by: Option<String>,
    /// New validity end.
    pub end_date: Option<DateTime<Utc>>,
    /// New category.
    pub category: Option<MedicineCategory>,
    /// Re-activate or deactivate.
    pub is_active: Option<bool>,
}

/// Listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedicineFilter {
    /// Only medicines with this active flag.
    pub is_active: Option<bool>,
    /// Only medicines in this category.
    pub category: Option<MedicineCategory>,
}

/// Owns all medicine definitions and enforces slot exclusivity.
#[derive(Debug)]
pub struct MedicineRegistry {
    storage: Storage,
    medicines: Vec<Medicine>,
}

impl MedicineRegistry {
    /// Load the registry from storage.
    pub fn load(storage: Storage) -> Result<Self> {
        let medicines = storage.load_medicines()?;
        Ok(Self { storage, medicines })
    }

    /// Register a new medicine for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SlotConflict`] when an active medicine of the
    /// same user already occupies the requested slot, or a validation error
    /// for malformed input.
    pub fn register(&mut self, user_id: Uuid, new: NewMedicine) -> Result<Medicine> {
        validate_definition(&new)?;
        self.ensure_slot_free(user_id, &new.slot, None)?;

        let now = Utc::now();
        let medicine = Medicine {
            id: Uuid::new_v4(),
            user_id,
            name: new.name.trim().to_string(),
            dosage: new.dosage.trim().to_string(),
            times: new.times,
            frequency: new.frequency,
            slot: new.slot.trim().to_string(),
            quantity: new.quantity,
            remaining: new.remaining.unwrap_or(new.quantity),
            description: new.description,
            side_effects: new.side_effects,
            instructions: new.instructions,
            prescribed_by: new.prescribed_by,
            start_date: new.start_date.unwrap_or(now),
            end_date: new.end_date,
            category: new.category,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.medicines.push(medicine.clone());
        self.persist()?;
        Ok(medicine)
    }

    /// Apply a partial update.
    ///
    /// When the slot changes, exclusivity is re-validated against all
    /// *other* active medicines of the user.
    pub fn update(&mut self, user_id: Uuid, id: Uuid, patch: MedicinePatch) -> Result<Medicine> {
        // All validation happens against the current row before anything is
        // mutated, so a rejected patch leaves the medicine untouched.
        let current = self.get(user_id, id)?;
        if patch.times.as_ref().is_some_and(Vec::is_empty) {
            return Err(CoreError::ValidationFailed {
                field: "times",
                message: "at least one time is required".into(),
            });
        }
        if let Some(remaining) = patch.remaining {
            let quantity = patch.quantity.unwrap_or(current.quantity);
            if remaining > quantity {
                return Err(CoreError::ValidationFailed {
                    field: "remaining",
                    message: "remaining cannot exceed quantity".into(),
                });
            }
        }
        if let Some(slot) = &patch.slot {
            if *slot != current.slot {
                self.ensure_slot_free(user_id, slot, Some(id))?;
            }
        }

        let medicine = self
            .medicines
            .iter_mut()
            .find(|m| m.id == id && m.user_id == user_id)
            .ok_or(CoreError::MedicineNotFound)?;

        if let Some(name) = patch.name {
            medicine.name = name.trim().to_string();
        }
        if let Some(dosage) = patch.dosage {
            medicine.dosage = dosage.trim().to_string();
        }
        if let Some(times) = patch.times {
            medicine.times = times;
        }
        if let Some(frequency) = patch.frequency {
            medicine.frequency = frequency;
        }
        if let Some(slot) = patch.slot {
            medicine.slot = slot.trim().to_string();
        }
        if let Some(quantity) = patch.quantity {
            medicine.quantity = quantity;
        }
        if let Some(remaining) = patch.remaining {
            medicine.remaining = remaining;
        }
        if let Some(description) = patch.description {
            medicine.description = description;
        }
        if let Some(side_effects) = patch.side_effects {
            medicine.side_effects = side_effects;
        }
        if let Some(instructions) = patch.instructions {
            medicine.instructions = instructions;
        }
        if let Some(prescribed_by) = patch.prescribed_by {
            medicine.prescribed_by = prescribed_by;
        }
        if let Some(end_date) = patch.end_date {
            medicine.end_date = Some(end_date);
        }
        if let Some(category) = patch.category {
            medicine.category = category;
        }
        if let Some(is_active) = patch.is_active {
            medicine.is_active = is_active;
        }
        medicine.updated_at = Utc::now();

        let snapshot = medicine.clone();
        self.persist()?;
        Ok(snapshot)
    }

    /// Soft-delete: clear the active flag. Existing dose logs are untouched.
    pub fn deactivate(&mut self, user_id: Uuid, id: Uuid) -> Result<()> {
        let medicine = self
            .medicines
            .iter_mut()
            .find(|m| m.id == id && m.user_id == user_id)
            .ok_or(CoreError::MedicineNotFound)?;
        medicine.is_active = false;
        medicine.updated_at = Utc::now();
        self.persist()
    }

    /// Decrement the stock of a medicine after a confirmed dose.
    ///
    /// Returns `true` when the counter moved, `false` when it was already
    /// at zero (clamped, not an error; the dose was still taken).
    pub fn decrement_stock(&mut self, id: Uuid) -> Result<bool> {
        let medicine = self
            .medicines
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(CoreError::MedicineNotFound)?;
        let moved = medicine.decrement_remaining();
        medicine.updated_at = Utc::now();
        self.persist()?;
        Ok(moved)
    }

    /// Get a medicine owned by `user_id`.
    pub fn get(&self, user_id: Uuid, id: Uuid) -> Result<&Medicine> {
        self.medicines
            .iter()
            .find(|m| m.id == id && m.user_id == user_id)
            .ok_or(CoreError::MedicineNotFound)
    }

    /// List a user's medicines, newest first.
    #[must_use]
    pub fn list(&self, user_id: Uuid, filter: MedicineFilter) -> Vec<&Medicine> {
        let mut items: Vec<&Medicine> = self
            .medicines
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| filter.is_active.map_or(true, |a| m.is_active == a))
            .filter(|m| filter.category.map_or(true, |c| m.category == c))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    /// Active medicines with `remaining <= threshold`, ascending by remaining.
    #[must_use]
    pub fn list_low_stock(&self, user_id: Uuid, threshold: u32) -> Vec<&Medicine> {
        let mut items: Vec<&Medicine> = self
            .medicines
            .iter()
            .filter(|m| m.user_id == user_id && m.is_active && m.is_low_stock(threshold))
            .collect();
        items.sort_by_key(|m| m.remaining);
        items
    }

    /// Active medicines of a user, for the dispenser slot map.
    #[must_use]
    pub fn active_for_user(&self, user_id: Uuid) -> Vec<&Medicine> {
        self.medicines
            .iter()
            .filter(|m| m.user_id == user_id && m.is_active)
            .collect()
    }

    fn ensure_slot_free(&self, user_id: Uuid, slot: &str, exclude: Option<Uuid>) -> Result<()> {
        let occupied = self.medicines.iter().find(|m| {
            m.user_id == user_id
                && m.is_active
                && m.slot == slot.trim()
                && exclude != Some(m.id)
        });
        match occupied {
            Some(holder) => Err(CoreError::SlotConflict {
                slot: slot.trim().to_string(),
                medicine: holder.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn persist(&self) -> Result<()> {
        self.storage.save_medicines(&self.medicines)
    }
}

fn validate_definition(new: &NewMedicine) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(CoreError::ValidationFailed {
            field: "name",
            message: "medicine name is required".into(),
        });
    }
    if new.dosage.trim().is_empty() {
        return Err(CoreError::ValidationFailed {
            field: "dosage",
            message: "dosage is required".into(),
        });
    }
    if new.slot.trim().is_empty() {
        return Err(CoreError::ValidationFailed {
            field: "slot",
            message: "hardware slot is required".into(),
        });
    }
    if new.times.is_empty() {
        return Err(CoreError::ValidationFailed {
            field: "times",
            message: "at least one time is required".into(),
        });
    }
    if new.quantity == 0 {
        return Err(CoreError::ValidationFailed {
            field: "quantity",
            message: "quantity must be a positive number".into(),
        });
    }
    if let Some(remaining) = new.remaining {
        if remaining > new.quantity {
            return Err(CoreError::ValidationFailed {
                field: "remaining",
                message: "remaining cannot exceed quantity".into(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, MedicineRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        (dir, MedicineRegistry::load(storage).unwrap())
    }

    fn aspirin(slot: &str) -> NewMedicine {
        NewMedicine {
            name: "Aspirin".into(),
            dosage: "100mg".into(),
            times: vec!["08:00".parse().unwrap()],
            frequency: Frequency::Daily,
            slot: slot.into(),
            quantity: 30,
            remaining: None,
            description: String::new(),
            side_effects: String::new(),
            instructions: String::new(),
            prescribed_by: String::new(),
            start_date: None,
            end_date: None,
            category: MedicineCategory::PainRelief,
        }
    }

    #[test]
    fn test_register_defaults_remaining_to_quantity() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        let medicine = reg.register(user, aspirin("1")).unwrap();
        assert_eq!(medicine.remaining, 30);
        assert!(medicine.is_active);
    }

    #[test]
    fn test_slot_conflict_for_active_medicine() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        reg.register(user, aspirin("1")).unwrap();

        let mut second = aspirin("1");
        second.name = "Metformin".into();
        let err = reg.register(user, second).unwrap_err();
        assert!(matches!(err, CoreError::SlotConflict { .. }));
    }

    #[test]
    fn test_deactivate_frees_the_slot() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        let first = reg.register(user, aspirin("1")).unwrap();
        reg.deactivate(user, first.id).unwrap();

        let mut second = aspirin("1");
        second.name = "Metformin".into();
        assert!(reg.register(user, second).is_ok());
    }

    #[test]
    fn test_same_slot_for_different_users_is_fine() {
        let (_dir, mut reg) = registry();
        reg.register(Uuid::new_v4(), aspirin("1")).unwrap();
        assert!(reg.register(Uuid::new_v4(), aspirin("1")).is_ok());
    }

    #[test]
    fn test_update_slot_revalidates_exclusivity() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        reg.register(user, aspirin("1")).unwrap();
        let mut second = aspirin("2");
        second.name = "Metformin".into();
        let second = reg.register(user, second).unwrap();

        let patch = MedicinePatch {
            slot: Some("1".into()),
            ..MedicinePatch::default()
        };
        let err = reg.update(user, second.id, patch).unwrap_err();
        assert!(matches!(err, CoreError::SlotConflict { .. }));

        // Keeping the same slot is not a conflict with itself.
        let patch = MedicinePatch {
            slot: Some("2".into()),
            name: Some("Metformin XR".into()),
            ..MedicinePatch::default()
        };
        assert!(reg.update(user, second.id, patch).is_ok());
    }

    #[test]
    fn test_update_foreign_medicine_is_not_found() {
        let (_dir, mut reg) = registry();
        let owner = Uuid::new_v4();
        let medicine = reg.register(owner, aspirin("1")).unwrap();

        let err = reg
            .update(Uuid::new_v4(), medicine.id, MedicinePatch::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::MedicineNotFound));
    }

    #[test]
    fn test_decrement_stock_clamps_at_zero() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        let mut new = aspirin("1");
        new.quantity = 2;
        let medicine = reg.register(user, new).unwrap();

        assert!(reg.decrement_stock(medicine.id).unwrap());
        assert!(reg.decrement_stock(medicine.id).unwrap());
        // Already empty: clamped, no error, reported as not moved.
        assert!(!reg.decrement_stock(medicine.id).unwrap());
        assert_eq!(reg.get(user, medicine.id).unwrap().remaining, 0);
    }

    #[test]
    fn test_low_stock_threshold_boundaries() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        let mut new = aspirin("1");
        new.quantity = 30;
        new.remaining = Some(5);
        reg.register(user, new).unwrap();

        assert_eq!(reg.list_low_stock(user, 7).len(), 1);
        assert_eq!(reg.list_low_stock(user, 5).len(), 1);
        assert!(reg.list_low_stock(user, 3).is_empty());
    }

    #[test]
    fn test_low_stock_sorted_ascending() {
        let (_dir, mut reg) = registry();
        let user = Uuid::new_v4();
        for (slot, remaining) in [("1", 6), ("2", 2), ("3", 4)] {
            let mut new = aspirin(slot);
            new.name = format!("Med {slot}");
            new.remaining = Some(remaining);
            reg.register(user, new).unwrap();
        }

        let low = reg.list_low_stock(user, 7);
        let counts: Vec<u32> = low.iter().map(|m| m.remaining).collect();
        assert_eq!(counts, vec![2, 4, 6]);
    }

    #[test]
    fn test_validation_rejects_empty_times() {
        let (_dir, mut reg) = registry();
        let mut new = aspirin("1");
        new.times.clear();
        let err = reg.register(Uuid::new_v4(), new).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ValidationFailed { field: "times", .. }
        ));
    }

    #[test]
    fn test_remaining_cannot_exceed_quantity() {
        let (_dir, mut reg) = registry();
        let mut new = aspirin("1");
        new.remaining = Some(60);
        assert!(reg.register(Uuid::new_v4(), new).is_err());
    }
}
