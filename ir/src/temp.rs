//! Virtual registers, control-flow labels and the context that hands them
//! out.

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// A virtual register. Resolved to a physical register only by the
/// register allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "t{}", _0)]
pub struct Temp(pub(crate) usize);

impl Temp {
    pub fn num(self) -> usize {
        self.0
    }
}

/// A control-flow target.
///
/// Labels compare by their identity `id`, the name is only used for
/// printing. Named labels are interned by [`IrContext::named_label`], so all
/// references to one name within a context share the same id.
#[derive(Clone)]
pub struct Label {
    id: usize,
    name: Rc<str>,
}

impl Label {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.name)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.name)
    }
}

/// All mutable state of one compilation unit: the Temp and Label counters
/// and the table of interned label names.
#[derive(Debug, Default)]
pub struct IrContext {
    next_temp: usize,
    next_label: usize,
    named_labels: HashMap<String, Label>,
}

impl IrContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_temp(&mut self) -> Temp {
        let temp = Temp(self.next_temp);
        self.next_temp += 1;
        temp
    }

    /// A fresh anonymous label, printed as `L<n>`.
    pub fn new_label(&mut self) -> Label {
        let id = self.next_label_id();
        Label {
            id,
            name: format!("L{}", id).into(),
        }
    }

    /// The label called `name`. Requesting the same name twice yields the
    /// same label.
    pub fn named_label(&mut self, name: &str) -> Label {
        if let Some(label) = self.named_labels.get(name) {
            return label.clone();
        }
        let label = Label {
            id: self.next_label_id(),
            name: name.into(),
        };
        self.named_labels.insert(name.to_owned(), label.clone());
        label
    }

    /// Number of temps handed out so far.
    pub fn num_temps(&self) -> usize {
        self.next_temp
    }

    fn next_label_id(&mut self) -> usize {
        let id = self.next_label;
        self.next_label += 1;
        id
    }
}
