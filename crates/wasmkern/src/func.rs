use crate::engine::executor::LinkedCode;
use wasmkern_ir::InstrSeq;

/// A function body ready for execution by an [`Engine`].
///
/// The body is linked for [`DispatchStrategy::Direct`] the first time it is
/// executed with that strategy. Linking happens exactly once, even if the
/// body is executed by many threads at the same time.
///
/// [`Engine`]: crate::Engine
/// [`DispatchStrategy::Direct`]: crate::DispatchStrategy::Direct
#[derive(Debug)]
pub struct FuncBody {
    /// The validated instructions of the body.
    instrs: InstrSeq,
    /// The instructions linked to their direct threaded handlers.
    linked: spin::Once<LinkedCode>,
}

impl From<InstrSeq> for FuncBody {
    fn from(instrs: InstrSeq) -> Self {
        Self::new(instrs)
    }
}

impl FuncBody {
    /// Creates a new [`FuncBody`] from `instrs`.
    pub fn new(instrs: InstrSeq) -> Self {
        Self {
            instrs,
            linked: spin::Once::new(),
        }
    }

    /// Returns the [`InstrSeq`] of the [`FuncBody`].
    pub fn instrs(&self) -> &InstrSeq {
        &self.instrs
    }

    /// Returns the number of registers needed to execute the [`FuncBody`].
    pub fn len_registers(&self) -> usize {
        self.instrs.len_registers()
    }

    /// Returns `true` if the [`FuncBody`] has already been linked.
    pub fn is_linked(&self) -> bool {
        self.linked.is_completed()
    }

    /// Returns the [`LinkedCode`] of the [`FuncBody`], linking it if necessary.
    pub fn linked(&self) -> &LinkedCode {
        self.linked.call_once(|| LinkedCode::link(&self.instrs))
    }
}
