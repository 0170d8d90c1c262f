//! The position-lifecycle status enum driving [`crate::core::trader::Trader`].

/// Invariant: a [`super::Position`] exists iff `status` is one of
/// `EnteringPosition`, `InPosition`, `ClosingPosition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Initial,
    Ready,
    EnteringPosition,
    InPosition,
    ClosingPosition,
    Sleeping,
}

impl Status {
    #[must_use]
    pub const fn holds_position(self) -> bool {
        matches!(
            self,
            Self::EnteringPosition | Self::InPosition | Self::ClosingPosition
        )
    }
}
