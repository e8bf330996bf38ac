//! Central allocator for injected identifier names.
//!
//! All injected identifiers share the `livepack` prefix. During the pass they
//! are allocated with a provisional `livepack_<body>` name; every user
//! identifier seen is checked against the prefix pattern, and if any user
//! name has the shape `livepack<n>_...` the suffix counter is raised past
//! `n`. At the end of the pass, a non-zero counter rewrites every injected
//! name to `livepack<counter>_<body>`, which guarantees no collision with any
//! identifier in the source, however the source was constructed.

use std::fmt::Write;

/// Common prefix of every injected identifier.
pub const NAME_PREFIX: &str = "livepack";

/// Fixed prefix of tracker comments. Not renamed with the identifier prefix:
/// comments cannot collide with bindings, and downstream tooling parses this
/// exact string.
pub const TRACKER_COMMENT_PREFIX: &str = "livepack_track:";

/// Body of the marker comment prepended to every transformed module.
pub const TRANSFORMED_MARKER: &str = "livepack_track:transform";

/// The `<body>` part of an injected identifier name.
///
/// Kept structured rather than as a formatted string so the finalize pass can
/// re-render names under the final prefix without parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalName {
    Tracker,
    GetScopeId,
    ScopeId(u32),
    Temp(u32),
    FnInfo(u32),
    GetSources,
    Eval,
    Preval,
    GetEval,
}

impl InternalName {
    /// Renders the `<body>` part of the name.
    pub fn body(&self) -> String {
        match self {
            Self::Tracker => "tracker".to_owned(),
            Self::GetScopeId => "getScopeId".to_owned(),
            Self::ScopeId(block_id) => format!("scopeId_{block_id}"),
            Self::Temp(n) => format!("temp_{n}"),
            Self::FnInfo(fn_id) => format!("getFnInfo_{fn_id}"),
            Self::GetSources => "getSources".to_owned(),
            Self::Eval => "eval".to_owned(),
            Self::Preval => "preval".to_owned(),
            Self::GetEval => "getEval".to_owned(),
        }
    }
}

/// Allocator and collision tracker for injected names.
#[derive(Debug, Default)]
pub struct IdentTable {
    suffix_counter: u32,
    next_temp: u32,
    finalized: bool,
}

impl IdentTable {
    /// Creates a table. `suffix_counter` seeds the collision counter, used
    /// when instrumenting code from inside `eval` so names keep avoiding the
    /// outer module's reservations.
    pub fn new(suffix_counter: u32) -> Self {
        Self {
            suffix_counter,
            next_temp: 0,
            finalized: false,
        }
    }

    /// Allocates the next temp slot name.
    pub fn alloc_temp(&mut self) -> InternalName {
        let n = self.next_temp;
        self.next_temp += 1;
        InternalName::Temp(n)
    }

    /// Records a user identifier. If it matches `livepack<n>_...` (with `n`
    /// absent meaning 0), the suffix counter is raised to `n + 1`.
    pub fn note_user_name(&mut self, name: &str) {
        let Some(rest) = name.strip_prefix(NAME_PREFIX) else {
            return;
        };
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let after_digits = &rest[digits_len..];
        if !after_digits.starts_with('_') {
            return;
        }
        let n = if digits_len == 0 {
            0
        } else {
            // A suffix too large for u32 cannot be outdone; saturate.
            rest[..digits_len].parse::<u32>().unwrap_or(u32::MAX)
        };
        let candidate = n.saturating_add(1);
        if candidate > self.suffix_counter {
            self.suffix_counter = candidate;
        }
    }

    /// Renders the provisional in-pass name for an internal identifier.
    pub fn provisional(name: &InternalName) -> String {
        format!("{NAME_PREFIX}_{}", name.body())
    }

    /// Locks the counter. Must be called exactly once, after the last user
    /// identifier has been noted and before final names are rendered.
    pub fn finalize(&mut self) -> u32 {
        debug_assert!(!self.finalized, "identifier table finalized twice");
        self.finalized = true;
        self.suffix_counter
    }

    /// Renders the final name for an internal identifier. Only meaningful
    /// after [`finalize`](Self::finalize).
    pub fn final_name(&self, name: &InternalName) -> String {
        let mut out = String::with_capacity(NAME_PREFIX.len() + 12);
        out.push_str(NAME_PREFIX);
        if self.suffix_counter > 0 {
            write!(out, "{}", self.suffix_counter).expect("writing to String cannot fail");
        }
        out.push('_');
        out.push_str(&name.body());
        out
    }

    /// Whether the collision counter forces a rename of provisional names.
    pub fn needs_rename(&self) -> bool {
        self.suffix_counter > 0
    }

    pub fn suffix_counter(&self) -> u32 {
        self.suffix_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrelated_names_leave_counter_at_zero() {
        let mut table = IdentTable::new(0);
        table.note_user_name("foo");
        table.note_user_name("livepackish");
        table.note_user_name("livepack9");
        assert_eq!(table.suffix_counter(), 0);
    }

    #[test]
    fn bare_prefix_name_raises_counter_to_one() {
        let mut table = IdentTable::new(0);
        table.note_user_name("livepack_tracker");
        assert_eq!(table.suffix_counter(), 1);
    }

    #[test]
    fn numbered_prefix_name_raises_counter_past_it() {
        let mut table = IdentTable::new(0);
        table.note_user_name("livepack3_x");
        assert_eq!(table.suffix_counter(), 4);
        // Lower-numbered names do not lower the counter.
        table.note_user_name("livepack1_y");
        assert_eq!(table.suffix_counter(), 4);
    }

    #[test]
    fn final_names_carry_the_counter() {
        let mut table = IdentTable::new(0);
        table.note_user_name("livepack_x");
        table.finalize();
        assert_eq!(table.final_name(&InternalName::Tracker), "livepack1_tracker");
        assert_eq!(table.final_name(&InternalName::ScopeId(7)), "livepack1_scopeId_7");
    }

    #[test]
    fn zero_counter_keeps_plain_prefix() {
        let mut table = IdentTable::new(0);
        table.finalize();
        assert_eq!(table.final_name(&InternalName::Temp(0)), "livepack_temp_0");
    }

    #[test]
    fn temp_allocation_is_sequential() {
        let mut table = IdentTable::new(0);
        assert_eq!(table.alloc_temp(), InternalName::Temp(0));
        assert_eq!(table.alloc_temp(), InternalName::Temp(1));
    }
}
