//! Error taxonomy for the whole pipeline.
//!
//! Mirrors the teacher's split between an internal, richly-typed error
//! enum (`ExcType`/`RunError` in the teacher) and a thin value the host
//! sees. Here `SeniError` plays both roles since Seni has no exception
//! handling at the language level (§7: all errors are fatal to the current
//! program run).

use std::fmt;

/// Where in the pipeline an error originated. Kept separate from the error
/// payload so hosts can branch on phase without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Compile,
    Runtime,
    Serialize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeniError {
    // --- Parse errors (§7) ---
    MismatchedBracket { pos: usize, expected: char },
    UnterminatedString { pos: usize },
    NonAlterableInBraces { pos: usize },
    WordTableOverflow { range: &'static str },

    // --- Compile errors (§7) ---
    UndefinedName { name: String },
    DestructureShapeMismatch { expected: usize, found: usize },
    TooManyTopLevelFunctions,
    TooManyLocals,
    TooManyGlobals,
    UnsupportedAlterableShape,
    LoopMissingBound,
    LoopConflictingBound,
    TraitProgramTooLarge { budget: usize, found: usize },

    // --- Runtime errors (§7) ---
    StackOverflow,
    StackUnderflow,
    TypeMismatch { op: &'static str, found: &'static str },
    BadSegment { segment: &'static str },
    UnboundNative { iname: u32 },
    HeapExhausted,

    // --- Serialization errors (§7) ---
    TruncatedStream,
    MalformedStream { detail: String },
    GeneCountMismatch { expected: usize, found: usize },
    VersionMismatch { expected: u32, found: u32 },
}

impl SeniError {
    #[must_use]
    pub fn phase(&self) -> Phase {
        use SeniError::{
            BadSegment, DestructureShapeMismatch, GeneCountMismatch, HeapExhausted, LoopConflictingBound,
            LoopMissingBound, MalformedStream, MismatchedBracket, NonAlterableInBraces, StackOverflow,
            StackUnderflow, TooManyGlobals, TooManyLocals, TooManyTopLevelFunctions, TraitProgramTooLarge,
            TruncatedStream, TypeMismatch, UnboundNative, UndefinedName, UnsupportedAlterableShape,
            UnterminatedString, VersionMismatch, WordTableOverflow,
        };
        match self {
            MismatchedBracket { .. } | UnterminatedString { .. } | NonAlterableInBraces { .. } => Phase::Parse,
            WordTableOverflow { .. } => Phase::Parse,
            UndefinedName { .. }
            | DestructureShapeMismatch { .. }
            | TooManyTopLevelFunctions
            | TooManyLocals
            | TooManyGlobals
            | UnsupportedAlterableShape
            | LoopMissingBound
            | LoopConflictingBound
            | TraitProgramTooLarge { .. } => Phase::Compile,
            StackOverflow | StackUnderflow | TypeMismatch { .. } | BadSegment { .. } | UnboundNative { .. }
            | HeapExhausted => Phase::Runtime,
            TruncatedStream | MalformedStream { .. } | GeneCountMismatch { .. } | VersionMismatch { .. } => {
                Phase::Serialize
            }
        }
    }
}

impl fmt::Display for SeniError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MismatchedBracket { pos, expected } => {
                write!(f, "mismatched bracket at byte {pos}, expected '{expected}'")
            }
            Self::UnterminatedString { pos } => write!(f, "unterminated string starting at byte {pos}"),
            Self::NonAlterableInBraces { pos } => {
                write!(f, "node inside '{{...}}' at byte {pos} is not alterable (must be INT/FLOAT/NAME/LIST/VECTOR)")
            }
            Self::WordTableOverflow { range } => write!(f, "word table '{range}' range is full"),
            Self::UndefinedName { name } => write!(f, "undefined name '{name}'"),
            Self::DestructureShapeMismatch { expected, found } => {
                write!(f, "destructuring expected {expected} elements, found {found}")
            }
            Self::TooManyTopLevelFunctions => write!(f, "too many top-level functions"),
            Self::TooManyLocals => write!(f, "too many locals in a single frame"),
            Self::TooManyGlobals => write!(f, "too many globals"),
            Self::UnsupportedAlterableShape => write!(f, "alterable node has an unsupported shape"),
            Self::LoopMissingBound => write!(f, "loop/fence requires exactly one of 'to' or 'upto'"),
            Self::LoopConflictingBound => write!(f, "loop/fence cannot take both 'to' and 'upto'"),
            Self::TraitProgramTooLarge { budget, found } => {
                write!(f, "trait program of {found} instructions exceeds the budget of {budget}")
            }
            Self::StackOverflow => write!(f, "stack overflow"),
            Self::StackUnderflow => write!(f, "stack underflow"),
            Self::TypeMismatch { op, found } => write!(f, "type mismatch in {op}: found {found}"),
            Self::BadSegment { segment } => write!(f, "bad memory segment '{segment}'"),
            Self::UnboundNative { iname } => write!(f, "native function {iname} has no binding"),
            Self::HeapExhausted => write!(f, "heap exhausted: free list empty after sweep"),
            Self::TruncatedStream => write!(f, "serialized stream truncated"),
            Self::MalformedStream { detail } => write!(f, "malformed serialized stream: {detail}"),
            Self::GeneCountMismatch { expected, found } => {
                write!(f, "gene count {found} does not match trait list of {expected}")
            }
            Self::VersionMismatch { expected, found } => {
                write!(f, "serialization version mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl std::error::Error for SeniError {}

pub type SeniResult<T> = Result<T, SeniError>;
