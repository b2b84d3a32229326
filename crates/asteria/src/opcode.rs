//! Operator opcodes, execution status codes, and proper-tail-call awareness
//! (§4.7, §4.8, §4.9). Numbering follows the original implementation's
//! `Xop`/`AIR_Status`/`PTC_Aware` enums (`enums.hpp`) so that anyone who has
//! read the original source recognizes the vocabulary immediately.

/// An operator opcode (§4.7 operator table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Xop {
    IncPost,
    DecPost,
    Subscr,
    Pos,
    Neg,
    NotB,
    NotL,
    IncPre,
    DecPre,
    Unset,
    Countof,
    Typeof,
    Sqrt,
    IsNan,
    IsInf,
    Abs,
    Sign,
    Round,
    Floor,
    Ceil,
    Trunc,
    IRound,
    IFloor,
    ICeil,
    ITrunc,
    Lzcnt,
    Tzcnt,
    Popcnt,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLte,
    CmpGte,
    Cmp3way,
    CmpUn,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Sll,
    Srl,
    Sla,
    Sra,
    AndB,
    OrB,
    XorB,
    Fma,
    Head,
    Tail,
    Random,
    AddM,
    SubM,
    MulM,
    AddS,
    SubS,
    MulS,
    Assign,
    IsVoid,
}

impl Xop {
    pub fn arity(self) -> usize {
        match self {
            Xop::Fma => 3,
            Xop::Subscr
            | Xop::CmpEq
            | Xop::CmpNe
            | Xop::CmpLt
            | Xop::CmpGt
            | Xop::CmpLte
            | Xop::CmpGte
            | Xop::Cmp3way
            | Xop::CmpUn
            | Xop::Add
            | Xop::Sub
            | Xop::Mul
            | Xop::Div
            | Xop::Mod
            | Xop::Sll
            | Xop::Srl
            | Xop::Sla
            | Xop::Sra
            | Xop::AndB
            | Xop::OrB
            | Xop::XorB
            | Xop::AddM
            | Xop::SubM
            | Xop::MulM
            | Xop::AddS
            | Xop::SubS
            | Xop::MulS
            | Xop::Assign => 2,
            _ => 1,
        }
    }
}

/// The kind of enclosing loop a `break`/`continue` targets, or `Unspec` if
/// the source used the bare keyword without a qualifying loop-kind hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Unspec,
    Switch,
    While,
    For,
}

/// Status returned by every AIR/AVMC node after execution (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirStatus {
    Next,
    ReturnVoid,
    ReturnRef,
    BreakUnspec,
    BreakSwitch,
    BreakWhile,
    BreakFor,
    ContinueUnspec,
    ContinueWhile,
    ContinueFor,
}

impl AirStatus {
    pub fn is_next(self) -> bool {
        matches!(self, AirStatus::Next)
    }

    pub fn break_for(kind: LoopKind) -> Self {
        match kind {
            LoopKind::Unspec => AirStatus::BreakUnspec,
            LoopKind::Switch => AirStatus::BreakSwitch,
            LoopKind::While => AirStatus::BreakWhile,
            LoopKind::For => AirStatus::BreakFor,
        }
    }

    pub fn continue_for(kind: LoopKind) -> Self {
        match kind {
            LoopKind::Unspec | LoopKind::Switch => AirStatus::ContinueUnspec,
            LoopKind::While => AirStatus::ContinueWhile,
            LoopKind::For => AirStatus::ContinueFor,
        }
    }

    /// Whether a `while` loop consumes this status (continue) or lets a
    /// matching break propagate out as "loop finished".
    pub fn matches_while_continue(self) -> bool {
        matches!(self, AirStatus::ContinueUnspec | AirStatus::ContinueWhile)
    }

    pub fn matches_while_break(self) -> bool {
        matches!(self, AirStatus::BreakUnspec | AirStatus::BreakWhile)
    }

    pub fn matches_for_continue(self) -> bool {
        matches!(self, AirStatus::ContinueUnspec | AirStatus::ContinueFor)
    }

    pub fn matches_for_break(self) -> bool {
        matches!(self, AirStatus::BreakUnspec | AirStatus::BreakFor)
    }

    pub fn matches_switch_break(self) -> bool {
        matches!(self, AirStatus::BreakUnspec | AirStatus::BreakSwitch)
    }
}

/// Whether a call site is eligible for the proper-tail-call trampoline, and
/// in which mode (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtcAware {
    None,
    ByRef,
    ByVal,
    Void,
}
