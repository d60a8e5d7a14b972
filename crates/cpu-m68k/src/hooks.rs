//! Control-flow hook registry.
//!
//! Debuggers, API patchers and profilers attach callbacks here to watch or
//! intercept exceptions, subroutine calls and returns, stack frame setup and
//! program counter / stack pointer changes. The interpreter only ever sees
//! the registry, never the subsystems behind it.
//!
//! Every installation yields a [`HookHandle`]. Handles are generational:
//! removing a handle twice, or removing a handle whose slot has since been
//! reused, is a harmless no-op.

use std::fmt;

use crate::registers::Registers;

/// How an SP change came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
    /// Replaced outright (register load, mode switch).
    Changed,
    /// Moved towards higher addresses (pop, UNLK).
    Incremented,
    /// Moved towards lower addresses (push, LINK).
    Decremented,
}

/// Intercepts an exception before its frame is built. Return true when
/// handled; the default processing is then skipped.
pub type ExceptionHook<B> = Box<dyn FnMut(&mut Registers, &mut B, u8) -> bool>;
/// Observes a JSR: `(return_address, destination)`.
pub type JsrHook = Box<dyn FnMut(u32, u32) -> bool>;
/// Observes an RTE or RTS: the address being returned to.
pub type ReturnHook = Box<dyn FnMut(u32) -> bool>;
/// Observes a LINK: the signed displacement.
pub type LinkHook = Box<dyn FnMut(i32)>;
/// Observes a new program counter.
pub type NewPcHook = Box<dyn FnMut(u32)>;
/// Observes a stack pointer change.
pub type NewSpHook = Box<dyn FnMut(StackChange)>;

/// Which list a hook lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Exception,
    Jsr,
    JsrIndirect,
    Link,
    Rte,
    Rts,
    NewPc,
    NewSp,
}

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle {
    kind: HookKind,
    /// Vector number for exception hooks, zero otherwise.
    key: u8,
    slot: u32,
    generation: u32,
}

impl HookHandle {
    #[must_use]
    pub const fn kind(&self) -> HookKind {
        self.kind
    }

    /// The exception vector, for exception hooks.
    #[must_use]
    pub const fn vector(&self) -> Option<u8> {
        match self.kind {
            HookKind::Exception => Some(self.key),
            _ => None,
        }
    }
}

struct Slot<F> {
    hook: Option<F>,
    generation: u32,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Insertion-ordered list with O(1) removal by slot.
///
/// Slots form a doubly linked list in registration order; vacated slots go
/// on a free list and are reused with a bumped generation.
pub(crate) struct HookList<F> {
    slots: Vec<Slot<F>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<F> Default for HookList<F> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }
}

impl<F> HookList<F> {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Append `hook`, returning its `(slot, generation)`.
    pub(crate) fn push(&mut self, hook: F) -> (u32, u32) {
        let idx = if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.hook = Some(hook);
            slot.prev = self.tail;
            slot.next = None;
            idx
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                hook: Some(hook),
                generation: 0,
                prev: self.tail,
                next: None,
            });
            idx
        };

        match self.tail {
            Some(t) => self.slots[t as usize].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
        (idx, self.slots[idx as usize].generation)
    }

    /// Unlink the hook at `slot` if it still belongs to `generation`.
    pub(crate) fn remove(&mut self, slot: u32, generation: u32) -> bool {
        let Some(entry) = self.slots.get_mut(slot as usize) else {
            return false;
        };
        if entry.generation != generation || entry.hook.is_none() {
            return false;
        }

        entry.hook = None;
        let (prev, next) = (entry.prev.take(), entry.next.take());
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(slot);
        self.len -= 1;
        true
    }

    /// Call `f` on every hook in registration order.
    pub(crate) fn for_each(&mut self, mut f: impl FnMut(&mut F)) {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let slot = &mut self.slots[idx as usize];
            cursor = slot.next;
            if let Some(hook) = slot.hook.as_mut() {
                f(hook);
            }
        }
    }

    /// Call every hook and OR their results. No hook is skipped.
    pub(crate) fn any(&mut self, mut f: impl FnMut(&mut F) -> bool) -> bool {
        let mut handled = false;
        self.for_each(|hook| handled |= f(hook));
        handled
    }
}

/// Every hook list the interpreter consults.
pub struct HookRegistry<B> {
    exception: Vec<HookList<ExceptionHook<B>>>,
    jsr: HookList<JsrHook>,
    jsr_indirect: HookList<JsrHook>,
    link: HookList<LinkHook>,
    rte: HookList<ReturnHook>,
    rts: HookList<ReturnHook>,
    new_pc: HookList<NewPcHook>,
    new_sp: HookList<NewSpHook>,
}

impl<B> Default for HookRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for HookRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exception: usize = self.exception.iter().map(HookList::len).sum();
        f.debug_struct("HookRegistry")
            .field("exception", &exception)
            .field("jsr", &self.jsr.len())
            .field("jsr_indirect", &self.jsr_indirect.len())
            .field("link", &self.link.len())
            .field("rte", &self.rte.len())
            .field("rts", &self.rts.len())
            .field("new_pc", &self.new_pc.len())
            .field("new_sp", &self.new_sp.len())
            .finish()
    }
}

impl<B> HookRegistry<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            exception: (0..256).map(|_| HookList::default()).collect(),
            jsr: HookList::default(),
            jsr_indirect: HookList::default(),
            link: HookList::default(),
            rte: HookList::default(),
            rts: HookList::default(),
            new_pc: HookList::default(),
            new_sp: HookList::default(),
        }
    }

    fn handle(kind: HookKind, key: u8, (slot, generation): (u32, u32)) -> HookHandle {
        HookHandle {
            kind,
            key,
            slot,
            generation,
        }
    }

    pub fn install_exception(&mut self, vector: u8, hook: ExceptionHook<B>) -> HookHandle {
        let at = self.exception[usize::from(vector)].push(hook);
        Self::handle(HookKind::Exception, vector, at)
    }

    pub fn install_jsr(&mut self, hook: JsrHook) -> HookHandle {
        Self::handle(HookKind::Jsr, 0, self.jsr.push(hook))
    }

    pub fn install_jsr_indirect(&mut self, hook: JsrHook) -> HookHandle {
        Self::handle(HookKind::JsrIndirect, 0, self.jsr_indirect.push(hook))
    }

    pub fn install_link(&mut self, hook: LinkHook) -> HookHandle {
        Self::handle(HookKind::Link, 0, self.link.push(hook))
    }

    pub fn install_rte(&mut self, hook: ReturnHook) -> HookHandle {
        Self::handle(HookKind::Rte, 0, self.rte.push(hook))
    }

    pub fn install_rts(&mut self, hook: ReturnHook) -> HookHandle {
        Self::handle(HookKind::Rts, 0, self.rts.push(hook))
    }

    pub fn install_new_pc(&mut self, hook: NewPcHook) -> HookHandle {
        Self::handle(HookKind::NewPc, 0, self.new_pc.push(hook))
    }

    pub fn install_new_sp(&mut self, hook: NewSpHook) -> HookHandle {
        Self::handle(HookKind::NewSp, 0, self.new_sp.push(hook))
    }

    /// Remove exactly the registration `handle` names.
    ///
    /// Returns false if it was already removed.
    pub fn remove(&mut self, handle: HookHandle) -> bool {
        let HookHandle {
            kind,
            key,
            slot,
            generation,
        } = handle;
        match kind {
            HookKind::Exception => self.exception[usize::from(key)].remove(slot, generation),
            HookKind::Jsr => self.jsr.remove(slot, generation),
            HookKind::JsrIndirect => self.jsr_indirect.remove(slot, generation),
            HookKind::Link => self.link.remove(slot, generation),
            HookKind::Rte => self.rte.remove(slot, generation),
            HookKind::Rts => self.rts.remove(slot, generation),
            HookKind::NewPc => self.new_pc.remove(slot, generation),
            HookKind::NewSp => self.new_sp.remove(slot, generation),
        }
    }

    /// Number of live registrations of `kind` (all vectors, for exceptions).
    #[must_use]
    pub fn count(&self, kind: HookKind) -> usize {
        match kind {
            HookKind::Exception => self.exception.iter().map(HookList::len).sum(),
            HookKind::Jsr => self.jsr.len(),
            HookKind::JsrIndirect => self.jsr_indirect.len(),
            HookKind::Link => self.link.len(),
            HookKind::Rte => self.rte.len(),
            HookKind::Rts => self.rts.len(),
            HookKind::NewPc => self.new_pc.len(),
            HookKind::NewSp => self.new_sp.len(),
        }
    }

    pub(crate) fn call_exception(&mut self, regs: &mut Registers, bus: &mut B, vector: u8) -> bool {
        self.exception[usize::from(vector)].any(|hook| hook(regs, bus, vector))
    }

    pub(crate) fn call_jsr(&mut self, return_address: u32, dest: u32) -> bool {
        self.jsr.any(|hook| hook(return_address, dest))
    }

    pub(crate) fn call_jsr_indirect(&mut self, return_address: u32, dest: u32) -> bool {
        self.jsr_indirect.any(|hook| hook(return_address, dest))
    }

    pub(crate) fn call_rte(&mut self, dest: u32) -> bool {
        self.rte.any(|hook| hook(dest))
    }

    pub(crate) fn call_rts(&mut self, dest: u32) -> bool {
        self.rts.any(|hook| hook(dest))
    }

    pub(crate) fn call_link(&mut self, displacement: i32) {
        self.link.for_each(|hook| hook(displacement));
    }

    pub(crate) fn call_new_pc(&mut self, pc: u32) {
        self.new_pc.for_each(|hook| hook(pc));
    }

    pub(crate) fn call_new_sp(&mut self, change: StackChange) {
        self.new_sp.for_each(|hook| hook(change));
    }
}
