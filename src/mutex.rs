use core::{
    cell::UnsafeCell,
    sync::atomic::AtomicBool,
    sync::atomic::Ordering::*,
    ops::{Deref, DerefMut},
    };

/**
    spin lock guarding data shared between the slot tick and a higher priority task

    critical sections under this lock are meant to be a few copies long, so contenders simply spin
*/
pub struct BusyMutex<T> {
    value: UnsafeCell<T>,
    locked: AtomicBool,
}
// SAFETY: access to `value` is serialized by `locked`
unsafe impl<T: Send> Sync for BusyMutex<T> {}

impl<T> BusyMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value), 
            locked: AtomicBool::new(false),
        }
    }
    pub fn try_lock(&self) -> Option<BusyMutexGuard<'_, T>> {
        BusyMutexGuard::try_new(self)
    }
    /// busy wait until lock is acquired
    pub fn blocking_lock(&self) -> BusyMutexGuard<'_, T> {
        loop {
            if let Some(guard) = BusyMutexGuard::try_new(self) 
                {break guard}
            core::hint::spin_loop();
        }
    }
    /// run a short critical section
    pub fn with<R>(&self, action: impl FnOnce(&mut T) -> R) -> R {
        action(&mut self.blocking_lock())
    }
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}
impl<T: Default> Default for BusyMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
impl<T> From<T> for BusyMutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

pub struct BusyMutexGuard<'m, T> {
    mutex: &'m BusyMutex<T>,
}
impl<'m, T> BusyMutexGuard<'m, T> {
    fn try_new(mutex: &'m BusyMutex<T>) -> Option<Self> {
        if mutex.locked.compare_exchange(false, true, Acquire, Relaxed).is_ok()
            {Some(Self {mutex})}
        else 
            {None}
    }
}
impl<T> Deref for BusyMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the guard owns the lock
        unsafe {& *self.mutex.value.get()}
    }
}
impl<T> DerefMut for BusyMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard owns the lock
        unsafe {&mut *self.mutex.value.get()}
    }
}
impl<T> Drop for BusyMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Release);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_access() {
        let mutex = BusyMutex::new(3u32);
        let guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        mutex.with(|value| *value += 1);
        assert_eq!(*mutex.try_lock().unwrap(), 4);
    }
}
