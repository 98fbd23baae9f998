//! Stamping records with the current datamark before they are persisted.
//!
//! A record type opts in by implementing [`Stampable`], listing the slots
//! that receive the datamark. A [`Stamper`] is called by the persistence
//! layer just before a record is created or updated; it reads the datamark
//! once and writes it into every applicable slot.

use std::{fmt, sync::Arc};

use crate::{DatamarkService, domain::Result};

/// When a slot receives the datamark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampOn {
    /// Only when the record is first persisted.
    Create,
    /// Whenever the record is persisted or updated.
    CreateAndUpdate,
}

/// A field of a record that receives the datamark.
pub struct DatamarkSlot<E: ?Sized> {
    name: &'static str,
    on: StampOn,
    set: fn(&mut E, String),
}

impl<E: ?Sized> DatamarkSlot<E> {
    /// A slot stamped only when the record is created.
    #[must_use]
    pub const fn on_create(name: &'static str, set: fn(&mut E, String)) -> Self {
        Self {
            name,
            on: StampOn::Create,
            set,
        }
    }

    /// A slot stamped on every create and update.
    #[must_use]
    pub const fn always(name: &'static str, set: fn(&mut E, String)) -> Self {
        Self {
            name,
            on: StampOn::CreateAndUpdate,
            set,
        }
    }

    /// Returns the name of the field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns when the slot is stamped.
    #[must_use]
    pub const fn stamp_on(&self) -> StampOn {
        self.on
    }
}

impl<E: ?Sized> fmt::Debug for DatamarkSlot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatamarkSlot")
            .field("name", &self.name)
            .field("on", &self.on)
            .finish_non_exhaustive()
    }
}

/// A record with fields that carry the datamark.
///
/// # Example
///
/// ```
/// use datamark::stamp::{DatamarkSlot, Stampable};
///
/// struct User {
///     name: String,
///     created_datamark: String,
///     modified_datamark: String,
/// }
///
/// impl Stampable for User {
///     const SLOTS: &'static [DatamarkSlot<Self>] = &[
///         DatamarkSlot::on_create("created_datamark", |u: &mut Self, d| u.created_datamark = d),
///         DatamarkSlot::always("modified_datamark", |u: &mut Self, d| u.modified_datamark = d),
///     ];
/// }
/// ```
pub trait Stampable: 'static {
    /// The slots of this record type.
    const SLOTS: &'static [DatamarkSlot<Self>];
}

/// Applies the datamark of one service to records before they are saved.
#[derive(Debug, Clone)]
pub struct Stamper {
    service: Arc<DatamarkService>,
}

impl Stamper {
    /// Creates a stamper backed by `service`.
    #[must_use]
    pub const fn new(service: Arc<DatamarkService>) -> Self {
        Self { service }
    }

    /// Stamps every slot of a record that is about to be created.
    ///
    /// # Errors
    ///
    /// Returns the service's failure unchanged; the record is not modified
    /// and the save should be aborted.
    pub fn pre_persist<E: Stampable>(&self, entity: &mut E) -> Result<()> {
        self.stamp(entity, |_| true)
    }

    /// Stamps the slots of a record that is about to be updated.
    ///
    /// Slots marked [`StampOn::Create`] are left untouched.
    ///
    /// # Errors
    ///
    /// Returns the service's failure unchanged; the record is not modified
    /// and the save should be aborted.
    pub fn pre_update<E: Stampable>(&self, entity: &mut E) -> Result<()> {
        self.stamp(entity, |slot| slot.on == StampOn::CreateAndUpdate)
    }

    fn stamp<E: Stampable>(
        &self,
        entity: &mut E,
        applies: impl Fn(&DatamarkSlot<E>) -> bool,
    ) -> Result<()> {
        let mut slots = E::SLOTS.iter().filter(|slot| applies(slot)).peekable();
        if slots.peek().is_none() {
            return Ok(());
        }

        let datamark = self.service.get()?;
        for slot in slots {
            tracing::trace!("Stamping {} with '{datamark}'", slot.name);
            (slot.set)(entity, datamark.to_string());
        }
        Ok(())
    }
}
