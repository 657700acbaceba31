use almox_core::UserId;

/// Acting user for a request.
///
/// Identity is established upstream; the API only carries it through to
/// the ledger's `performed_by`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: UserId,
}

impl ActorContext {
    pub fn new(actor: UserId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }
}
