use crate::constants::columns;
use crate::types::{IdentifierSet, JoinKey};

/// Membership filtering mode for an optional identifier set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipMode {
    /// No membership filtering.
    All,
    /// Emit only rows whose key is inside the configured set (validation).
    IncludeOnly,
    /// Emit only rows whose key is outside the configured set
    /// (training minus validation).
    ExcludeOnly,
}

/// Routing decision for one joined row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Extract and emit the row.
    Emit,
    /// Skip: the discriminator marks a non-contextual placement.
    NonContextual,
    /// Skip: key membership does not match the configured mode.
    Membership,
}

/// Pure per-row routing decision: placement discriminator plus key membership.
///
/// The router holds no mutable state and performs no I/O, so it can be
/// exercised entirely independently of the join.
#[derive(Clone, Debug)]
pub struct RowRouter {
    contextual_only: bool,
    mode: MembershipMode,
    ids: Option<IdentifierSet>,
}

impl Default for RowRouter {
    fn default() -> Self {
        Self {
            contextual_only: true,
            mode: MembershipMode::All,
            ids: None,
        }
    }
}

impl RowRouter {
    /// Router with the default policy: contextual rows only, no membership filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the contextual-placement discriminator filter.
    pub fn contextual_only(mut self, contextual_only: bool) -> Self {
        self.contextual_only = contextual_only;
        self
    }

    /// Filter rows by key membership in `ids` under `mode`.
    pub fn with_membership(mut self, mode: MembershipMode, ids: IdentifierSet) -> Self {
        self.mode = mode;
        self.ids = Some(ids);
        self
    }

    /// True when the join must supply a discriminator value per row.
    pub fn wants_discriminator(&self) -> bool {
        self.contextual_only
    }

    /// Decide the route for one row.
    ///
    /// `discriminator` is the row-type value when the stream carries one.
    /// Membership filtering applies only when a set is configured; with no
    /// set, every key passes.
    pub fn decide(&self, discriminator: Option<&str>, key: JoinKey) -> Route {
        if self.contextual_only && discriminator != Some(columns::CONTEXTUAL) {
            return Route::NonContextual;
        }
        let Some(ids) = &self.ids else {
            return Route::Emit;
        };
        match self.mode {
            MembershipMode::All => Route::Emit,
            MembershipMode::IncludeOnly if ids.contains(&key) => Route::Emit,
            MembershipMode::ExcludeOnly if !ids.contains(&key) => Route::Emit,
            _ => Route::Membership,
        }
    }

    /// Convenience predicate over [`RowRouter::decide`].
    pub fn admits(&self, discriminator: Option<&str>, key: JoinKey) -> bool {
        self.decide(discriminator, key) == Route::Emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(keys: &[JoinKey]) -> IdentifierSet {
        keys.iter().copied().collect()
    }

    #[test]
    fn discriminator_gates_non_contextual_rows() {
        let router = RowRouter::new();
        assert_eq!(router.decide(Some("3"), 1), Route::Emit);
        assert_eq!(router.decide(Some("1"), 1), Route::NonContextual);
        assert_eq!(router.decide(None, 1), Route::NonContextual);

        let any = RowRouter::new().contextual_only(false);
        assert_eq!(any.decide(Some("1"), 1), Route::Emit);
        assert_eq!(any.decide(None, 1), Route::Emit);
    }

    #[test]
    fn membership_modes_partition_the_key_space() {
        let validation = ids(&[2, 4]);
        let include =
            RowRouter::new().with_membership(MembershipMode::IncludeOnly, validation.clone());
        let exclude = RowRouter::new().with_membership(MembershipMode::ExcludeOnly, validation);

        for key in 1..=5 {
            let in_validation = include.admits(Some("3"), key);
            let in_training = exclude.admits(Some("3"), key);
            // Every key lands in exactly one partition.
            assert_ne!(in_validation, in_training, "key {key}");
        }
        assert!(include.admits(Some("3"), 2));
        assert!(exclude.admits(Some("3"), 1));
    }

    #[test]
    fn no_configured_set_means_no_filtering() {
        let router = RowRouter::new();
        for key in [1, 99, -7] {
            assert!(router.admits(Some("3"), key));
        }
    }

    #[test]
    fn all_mode_ignores_the_set() {
        let router = RowRouter::new().with_membership(MembershipMode::All, ids(&[1]));
        assert!(router.admits(Some("3"), 1));
        assert!(router.admits(Some("3"), 2));
    }
}
