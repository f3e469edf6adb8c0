use std::{collections::HashMap, fmt::Debug, hash::Hash};

use tracing::{debug, warn};

/// Open/close state of one named dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogEntry<N, P> {
    pub name: N,
    pub is_open: bool,
    pub payload: Option<P>,
}

/// Fixed set of independent dialogs owned by one parent component.
///
/// Names are declared up front. Touching an undeclared name trips a debug assertion; release
/// builds log it and ignore the call.
#[derive(Debug, Clone)]
pub struct DialogRegistry<N, P> {
    entries: HashMap<N, DialogEntry<N, P>>,
}

impl<N, P> DialogRegistry<N, P>
where
    N: Clone + Eq + Hash + Debug,
    P: Debug,
{
    pub fn new(names: impl IntoIterator<Item = N>) -> Self {
        let entries = names
            .into_iter()
            .map(|name| {
                let entry = DialogEntry {
                    name: name.clone(),
                    is_open: false,
                    payload: None,
                };
                (name, entry)
            })
            .collect();
        Self { entries }
    }

    pub fn is_declared(&self, name: &N) -> bool {
        self.entries.contains_key(name)
    }

    /// Open `name`, replacing any payload it already carries.
    pub fn open(&mut self, name: &N, payload: Option<P>) {
        let Some(entry) = self.entry_mut(name) else {
            return;
        };
        let reopened = entry.is_open;
        entry.is_open = true;
        entry.payload = payload;
        debug!(dialog = ?name, reopened, "dialog opened");
    }

    /// Close `name` and drop its payload.
    pub fn close(&mut self, name: &N) {
        let Some(entry) = self.entry_mut(name) else {
            return;
        };
        entry.is_open = false;
        entry.payload = None;
        debug!(dialog = ?name, "dialog closed");
    }

    pub fn close_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.is_open = false;
            entry.payload = None;
        }
    }

    pub fn is_open(&self, name: &N) -> bool {
        self.entry(name).is_some_and(|entry| entry.is_open)
    }

    pub fn payload_of(&self, name: &N) -> Option<&P> {
        self.entry(name)?.payload.as_ref()
    }

    pub fn entry(&self, name: &N) -> Option<&DialogEntry<N, P>> {
        let entry = self.entries.get(name);
        if entry.is_none() {
            report_undeclared(name);
        }
        entry
    }

    /// Names of the dialogs that are currently open, in no particular order.
    pub fn open_dialogs(&self) -> impl Iterator<Item = &N> {
        self.entries
            .values()
            .filter(|entry| entry.is_open)
            .map(|entry| &entry.name)
    }

    /// Controller bound to one dialog name.
    pub fn controller(&mut self, name: N) -> DialogController<'_, N, P> {
        if !self.is_declared(&name) {
            report_undeclared(&name);
        }
        DialogController {
            registry: self,
            name,
        }
    }

    fn entry_mut(&mut self, name: &N) -> Option<&mut DialogEntry<N, P>> {
        let entry = self.entries.get_mut(name);
        if entry.is_none() {
            report_undeclared(name);
        }
        entry
    }
}

fn report_undeclared<N: Debug>(name: &N) {
    if cfg!(debug_assertions) {
        panic!("dialog {name:?} was not declared in this registry");
    }
    warn!(dialog = ?name, "ignoring access to undeclared dialog");
}

/// Handle for one named dialog, handed to the component that renders it.
#[derive(Debug)]
pub struct DialogController<'a, N, P> {
    registry: &'a mut DialogRegistry<N, P>,
    name: N,
}

impl<N, P> DialogController<'_, N, P>
where
    N: Clone + Eq + Hash + Debug,
    P: Debug,
{
    pub fn name(&self) -> &N {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.registry.is_open(&self.name)
    }

    pub fn payload(&self) -> Option<&P> {
        self.registry.payload_of(&self.name)
    }

    pub fn open(&mut self, payload: Option<P>) {
        self.registry.open(&self.name, payload);
    }

    pub fn close(&mut self) {
        self.registry.close(&self.name);
    }
}
