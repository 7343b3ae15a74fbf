#![forbid(unsafe_code)]

//! Branch context propagation.
//!
//! A [`BranchContext`] names the branch and view mode one logical operation
//! runs against. Callers either pass it explicitly or bind it for the
//! duration of a closure with [`BranchContext::scope`]; bindings are
//! per-thread and nest, so concurrent operations never share a slot.

use crate::ids::BranchName;
use crate::kinds::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Branch rows overlay trunk rows; untouched records fall back to trunk.
    #[default]
    Merged,
    /// Only rows literally stored under the branch.
    BranchOnly,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Merged => "merged",
            ViewMode::BranchOnly => "branch_only",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value.trim() {
            "merged" => Ok(Self::Merged),
            "branch_only" => Ok(Self::BranchOnly),
            other => Err(ParseEnumError {
                field: "view_mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchContext {
    branch: BranchName,
    view_mode: ViewMode,
}

impl Default for BranchContext {
    fn default() -> Self {
        Self::trunk()
    }
}

impl BranchContext {
    pub fn trunk() -> Self {
        Self::new(BranchName::trunk())
    }

    pub fn new(branch: BranchName) -> Self {
        Self {
            branch,
            view_mode: ViewMode::Merged,
        }
    }

    pub fn with_view_mode(mut self, view_mode: ViewMode) -> Self {
        self.view_mode = view_mode;
        self
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    /// View mode is branch-relative, so switching always resets it to
    /// [`ViewMode::Merged`].
    pub fn switch_branch(&mut self, branch: BranchName) {
        self.branch = branch;
        self.view_mode = ViewMode::Merged;
    }

    pub fn is_trunk(&self) -> bool {
        self.branch.is_trunk()
    }

    /// Context bound on this thread by the innermost [`BranchContext::scope`],
    /// or the trunk context when nothing is bound.
    pub fn current() -> Self {
        SCOPES.with(|scopes| {
            scopes
                .borrow()
                .last()
                .map(|(_, ctx)| ctx.clone())
                .unwrap_or_default()
        })
    }

    /// Binds `self` as the current context until the guard drops. Guards
    /// may drop in any order; each unbinds only its own context.
    pub fn enter(self) -> ContextGuard {
        let id = NEXT_SCOPE.with(|next| {
            let id = next.get();
            next.set(id.wrapping_add(1));
            id
        });
        SCOPES.with(|scopes| scopes.borrow_mut().push((id, self)));
        ContextGuard {
            id,
            _not_send: PhantomData,
        }
    }

    pub fn scope<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Switches the branch of the innermost bound context. Returns `false`
    /// when nothing is bound on this thread.
    pub fn switch_current(branch: BranchName) -> bool {
        SCOPES.with(|scopes| match scopes.borrow_mut().last_mut() {
            Some((_, ctx)) => {
                ctx.switch_branch(branch);
                true
            }
            None => false,
        })
    }
}

thread_local! {
    static SCOPES: RefCell<Vec<(u64, BranchContext)>> = const { RefCell::new(Vec::new()) };
    static NEXT_SCOPE: Cell<u64> = const { Cell::new(0) };
}

/// Unbinds its context on drop. Tied to the thread that created it.
#[must_use = "the context is unbound as soon as the guard drops"]
pub struct ContextGuard {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            if let Some(pos) = scopes.iter().rposition(|(id, _)| *id == self.id) {
                scopes.remove(pos);
            }
        });
    }
}
