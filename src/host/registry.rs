use log::*;
use std::{
    boxed::Box,
    vec::Vec,
    };
use crate::{
    Error,
    config::Millis,
    link::SlotLink,
    module::System,
    slot::SlotDriver,
    };


/// slot of any module type, as stored in the registry
pub type BoxedSlot = Box<dyn SlotDriver + Send>;
/// slot of any module type, borrowed from the registry
pub type DynSlot = dyn SlotDriver + Send + 'static;

/**
    arena of the slots of one controller board, indexed by slot number

    owned by whoever drives the ticks and passed by reference to anything that needs to inspect a link
*/
pub struct SlotRegistry {
    slots: Vec<Option<BoxedSlot>>,
}

impl SlotRegistry {
    /// registry of a board with `count` empty slots
    pub fn new(count: usize) -> Self {
        Self {slots: (0 .. count).map(|_| None).collect()}
    }
    /// number of physical slots, populated or not
    pub fn capacity(&self) -> usize  {self.slots.len()}
    /// number of populated slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
    pub fn is_empty(&self) -> bool  {self.len() == 0}

    /// populate a slot, fails if already populated
    pub fn insert(&mut self, slot: BoxedSlot) -> Result<(), Error> {
        let index = usize::from(slot.link().slot);
        let place = self.slots.get_mut(index).ok_or(Error::SlotEmpty)?;
        if place.is_some()
            {return Err(Error::SlotOccupied)}
        info!("slot {}: {} inserted", index, slot.link().kind.name());
        *place = Some(slot);
        Ok(())
    }
    /// the module of a slot was unplugged, returns its engine in the reset state
    pub fn remove(&mut self, index: u8) -> Result<BoxedSlot, Error> {
        let mut slot = self.slots.get_mut(usize::from(index))
            .and_then(Option::take)
            .ok_or(Error::SlotEmpty)?;
        slot.remove();
        Ok(slot)
    }
    pub fn get(&self, index: u8) -> Option<&DynSlot> {
        self.slots.get(usize::from(index))?.as_deref()
    }
    pub fn get_mut(&mut self, index: u8) -> Option<&mut DynSlot> {
        self.slots.get_mut(usize::from(index))?.as_deref_mut()
    }
    pub fn link(&self, index: u8) -> Option<&SlotLink> {
        self.get(index).map(|slot| slot.link())
    }
    /// populated slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = &DynSlot> {
        self.slots.iter().filter_map(|slot| slot.as_deref())
    }
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DynSlot> {
        self.slots.iter_mut().filter_map(|slot| slot.as_deref_mut())
    }
    pub fn links(&self) -> impl Iterator<Item = &SlotLink> {
        self.iter().map(|slot| slot.link())
    }

    /// handshake with every populated slot, returns the number of modules that answered
    pub fn bring_up_all(&mut self) -> usize {
        self.iter_mut()
            .map(|slot| slot.bring_up())
            .filter(Result::is_ok)
            .count()
    }
    /// one tick of every populated slot
    pub fn tick_all(&mut self, now: Millis, system: &mut dyn System) {
        for slot in self.iter_mut() {
            slot.tick(now, system);
        }
    }
}
