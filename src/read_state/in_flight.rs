use parking_lot::Mutex;
use std::collections::HashSet;

/// Per-item single-flight marker.
///
/// At most one [`InFlightToken`] exists per id at a time; the id is released
/// when the token is dropped, whether the guarded call succeeded, failed, or
/// was cancelled.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<i64>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or return `None` if a call for it is already running.
    pub fn try_claim(&self, id: i64) -> Option<InFlightToken<'_>> {
        if self.ids.lock().insert(id) {
            Some(InFlightToken { owner: self, id })
        } else {
            None
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct InFlightToken<'a> {
    owner: &'a InFlight,
    id: i64,
}

impl InFlightToken<'_> {
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Drop for InFlightToken<'_> {
    fn drop(&mut self) {
        self.owner.ids.lock().remove(&self.id);
    }
}
