use bitflags::bitflags;

bitflags! {
    /// Per-process attribute bits, guarded by the record lock.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ProcFlags: u32 {
        /// System-critical process. Its protection can never be changed.
        const SYSTEM = 1 << 0;
        /// Shielded from reclamation (e.g. the out-of-memory killer).
        const PROTECTED = 1 << 1;
        /// Children created from now on are born protected.
        const INHERIT_PROTECTED = 1 << 2;
        /// Tracing and debugging of the process is refused.
        const NOTRACE = 1 << 3;
        /// `NOTRACE` only lasts until the next exec.
        const NOTRACE_EXEC = 1 << 4;
    }
}

impl ProcFlags {
    /// Bits a child copies from its parent at fork.
    pub(crate) fn inherited(self) -> Self {
        let mut flags = self & (Self::NOTRACE | Self::NOTRACE_EXEC);
        if self.contains(Self::INHERIT_PROTECTED) {
            flags |= Self::PROTECTED | Self::INHERIT_PROTECTED;
        }
        flags
    }
}
